use anyhow::Result;
use serde::Serialize;

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// One JSON document per line, for piping master rows into other tools.
pub fn render_json_lines(rows: &[serde_json::Value]) -> Result<String> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_lines_has_one_row_per_line() {
        let rows = vec![json!({ "id": 1 }), json!({ "id": 2, "name": "Scale" })];
        let out = render_json_lines(&rows).expect("render");
        assert_eq!(out.lines().count(), 2);
        assert_eq!(out.lines().nth(1), Some(r#"{"id":2,"name":"Scale"}"#));
    }
}
