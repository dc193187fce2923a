use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use serde_json::Value;

use crate::api::{MasterSummary, ServerOutlook};
use crate::dosage::{DosageChartRow, DosageResult, Preset};
use crate::records::{BonsaiRecord, PestDiseaseRecord, PesticideLogRecord, WorkLogRecord};
use crate::season::{format_month_range, Month};
use crate::treatment::{
    Confidence, MonthlyRiskView, RecommendationSummary, SeasonalOutlook, TreatmentRecommendation,
};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn dash<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn render_dosage_table(
    water_ml: Option<f64>,
    ratio: Option<f64>,
    result: Option<&DosageResult>,
) -> String {
    let mut table = new_table();
    table.set_header(vec!["Water", "Dilution", "Concentrate"]);
    let amount = match result {
        Some(result) => Cell::new(result.to_string()).fg(Color::Green),
        None => Cell::new("not computable").fg(Color::Red),
    };
    table.add_row(Row::from(vec![
        Cell::new(water_ml.map(|w| format!("{w}ml")).unwrap_or_else(|| "-".to_string())),
        Cell::new(ratio.map(|r| format!("{r}x")).unwrap_or_else(|| "-".to_string())),
        amount,
    ]));
    table.to_string()
}

pub fn render_chart_table(rows: &[DosageChartRow]) -> String {
    let mut table = new_table();
    let mut header = vec!["Water".to_string()];
    if let Some(first) = rows.first() {
        header.extend(first.dosages.iter().map(|(ratio, _)| Preset::dilution(*ratio).label));
    }
    table.set_header(header);
    for row in rows {
        let mut cells = vec![Preset::water(row.water_volume_ml).label];
        cells.extend(row.dosages.iter().map(|(_, result)| dash(result.as_ref())));
        table.add_row(cells);
    }
    table.to_string()
}

fn view_tables(view: &MonthlyRiskView, top: usize) -> String {
    let mut out = format!("{} ({})\n", view.month, view.season);

    if view.active_risks.is_empty() {
        out.push_str("No pests or diseases are active this month.\n");
        return out;
    }

    let mut risks = new_table();
    risks.set_header(vec!["Pest / disease", "Type", "Active", "Probability"]);
    for risk in &view.active_risks {
        risks.add_row(vec![
            risk.record.name.clone(),
            risk.record.kind.to_string(),
            format_month_range(risk.record.start_month, risk.record.end_month),
            risk.occurrence_probability
                .map(|p| format!("{p}/5"))
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    out.push_str(&risks.to_string());
    out.push('\n');

    if view.ranked_treatments.is_empty() {
        out.push_str("No pesticide is linked to this month's risks.\n");
        return out;
    }

    let mut treatments = new_table();
    treatments.set_header(vec![
        "Rank",
        "Pesticide",
        "Type",
        "Avg effectiveness",
        "Interval",
        "Targets",
        "Warning",
    ]);
    for (idx, t) in view.ranked_treatments.iter().take(top).enumerate() {
        let warning = match &t.warning {
            Some(w) => Cell::new(w).fg(Color::Yellow),
            None => Cell::new("-"),
        };
        treatments.add_row(Row::from(vec![
            Cell::new(idx + 1),
            Cell::new(&t.pesticide.name),
            Cell::new(t.kind.to_string()),
            Cell::new(format!("{:.2}", t.avg_effectiveness)),
            Cell::new(format!("{}d", t.pesticide.interval_days)),
            Cell::new(t.targets.join(", ")),
            warning,
        ]));
    }
    out.push_str(&treatments.to_string());
    out.push('\n');
    out
}

pub fn render_risk_view(view: &MonthlyRiskView, top: usize) -> String {
    view_tables(view, top)
}

pub fn render_outlook(outlook: &SeasonalOutlook, top: usize) -> String {
    let mut out = String::new();
    out.push_str("This month: ");
    out.push_str(&view_tables(&outlook.current, top));
    out.push_str("\nNext month: ");
    out.push_str(&view_tables(&outlook.next, top));
    out.push_str(&format!(
        "\nNote: {}\nNote: {}",
        outlook.disclaimer.combination_warning, outlook.disclaimer.concentration_warning
    ));
    out
}

pub fn render_server_outlook(outlook: &ServerOutlook) -> String {
    let mut out = String::new();
    for (label, month) in [
        ("This month", &outlook.current_month),
        ("Next month", &outlook.next_month),
    ] {
        let name = Month::new(i64::from(month.month))
            .map(|m| m.to_string())
            .unwrap_or_else(|| month.month.to_string());
        out.push_str(&format!(
            "{label}: {name} ({})\n",
            month.season.as_deref().unwrap_or("-")
        ));

        let mut risks = new_table();
        risks.set_header(vec!["Pest / disease", "Type", "Probability"]);
        for risk in &month.risks {
            risks.add_row(vec![
                risk.pest_disease_name.clone(),
                dash(risk.pest_disease_type.as_ref()),
                risk.occurrence_probability
                    .map(|p| format!("{p}/5"))
                    .unwrap_or_else(|| "-".to_string()),
            ]);
        }
        out.push_str(&risks.to_string());
        out.push('\n');

        let mut recs = new_table();
        recs.set_header(vec!["Pesticide", "Type", "Avg effectiveness", "Warning"]);
        for rec in &month.recommendations {
            recs.add_row(vec![
                rec.pesticide_name.clone(),
                dash(rec.pesticide_type.as_ref()),
                rec.avg_effectiveness
                    .map(|v| format!("{v:.2}"))
                    .unwrap_or_else(|| "-".to_string()),
                dash(rec.warning.as_ref()),
            ]);
        }
        out.push_str(&recs.to_string());
        out.push('\n');
    }
    if let Some(disclaimer) = &outlook.disclaimer {
        for note in [&disclaimer.combination_warning, &disclaimer.concentration_warning]
            .into_iter()
            .flatten()
        {
            out.push_str(&format!("Note: {note}\n"));
        }
    }
    out
}

fn confidence_cell(confidence: Confidence) -> Cell {
    let color = match confidence {
        Confidence::High => Color::Green,
        Confidence::Medium => Color::Yellow,
        Confidence::Low => Color::Red,
    };
    Cell::new(format!("{confidence:?}").to_uppercase()).fg(color)
}

fn wait_label(rec: &TreatmentRecommendation) -> String {
    match rec.wait_days {
        Some(0) => "due now".to_string(),
        Some(days) => format!("in {days}d"),
        None => "-".to_string(),
    }
}

pub fn render_recommendation_table(summary: &RecommendationSummary) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Kind",
        "Pesticide",
        "Confidence",
        "Avg effectiveness",
        "Interval",
        "Next application",
        "Reason",
    ]);
    for rec in [&summary.insecticide, &summary.fungicide] {
        let reason = match &rec.warning {
            Some(warning) => format!("{} (warning: {warning})", rec.reason),
            None => rec.reason.clone(),
        };
        table.add_row(Row::from(vec![
            Cell::new(rec.kind.to_string()),
            Cell::new(dash(rec.pesticide_name.as_ref())),
            confidence_cell(rec.confidence),
            Cell::new(
                rec.avg_effectiveness
                    .map(|v| format!("{v:.2}"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(
                rec.interval_days
                    .map(|d| format!("{d}d"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(wait_label(rec)),
            Cell::new(reason),
        ]));
    }
    format!("{}\n{}", summary.month, table)
}

/// Twelve-character strip marking the months a window covers.
pub fn calendar_strip(record: &PestDiseaseRecord) -> String {
    Month::all()
        .map(|m| if record.is_active_in(m) { '#' } else { '.' })
        .collect()
}

pub fn render_calendar_table(records: &[PestDiseaseRecord]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Pest / disease", "Type", "Active", "JFMAMJJASOND"]);
    for record in records {
        table.add_row(vec![
            record.name.clone(),
            record.kind.to_string(),
            format_month_range(record.start_month, record.end_month),
            calendar_strip(record),
        ]);
    }
    table.to_string()
}

pub fn render_logs_table(logs: &[PesticideLogRecord]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "ID", "Date", "Bonsai", "Pesticide", "Dosage", "Water", "Dilution", "Notes",
    ]);
    for log in logs {
        table.add_row(vec![
            log.id.to_string(),
            log.usage_date.clone(),
            log.bonsai_name
                .clone()
                .or_else(|| log.bonsai_id.map(|id| format!("#{id}")))
                .unwrap_or_else(|| "-".to_string()),
            log.pesticide_name.clone(),
            dash(log.dosage.as_ref()),
            dash(log.water_amount.as_ref()),
            dash(log.dilution_ratio.as_ref()),
            dash(log.notes.as_ref()),
        ]);
    }
    table.to_string()
}

pub fn render_bonsai_table(bonsai: &[BonsaiRecord]) -> String {
    let mut table = new_table();
    table.set_header(vec!["ID", "Name", "Species", "Notes"]);
    for tree in bonsai {
        table.add_row(vec![
            tree.id.to_string(),
            tree.name.clone(),
            tree.species_name
                .clone()
                .or_else(|| tree.species_id.map(|id| format!("#{id}")))
                .unwrap_or_else(|| "-".to_string()),
            dash(tree.notes.as_ref()),
        ]);
    }
    table.to_string()
}

pub fn render_work_logs_table(logs: &[WorkLogRecord]) -> String {
    let mut table = new_table();
    table.set_header(vec!["ID", "Date", "Work", "Minutes", "Description", "Notes"]);
    for log in logs {
        table.add_row(vec![
            log.id.to_string(),
            log.date.clone(),
            log.work_type.clone(),
            dash(log.duration),
            dash(log.description.as_ref()),
            dash(log.notes.as_ref()),
        ]);
    }
    table.to_string()
}

pub fn render_summary_table(summary: &MasterSummary) -> String {
    let mut table = new_table();
    table.set_header(vec!["Table", "Rows"]);
    for (master, count) in summary.counts() {
        table.add_row(vec![master.to_string(), count.to_string()]);
    }
    table.to_string()
}

/// Column names for loosely-typed master rows, in first-seen order (the
/// `preserve_order` feature keeps each row's keys as the API sent them).
pub fn master_columns(rows: &[Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        if let Some(object) = row.as_object() {
            for key in object.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    if let Some(pos) = columns.iter().position(|c| c == "id") {
        let id = columns.remove(pos);
        columns.insert(0, id);
    }
    columns
}

pub fn master_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn render_master_table(rows: &[Value]) -> String {
    let columns = master_columns(rows);
    let mut table = new_table();
    table.set_header(columns.clone());
    for row in rows {
        table.add_row(
            columns
                .iter()
                .map(|c| master_cell(row.get(c)))
                .collect::<Vec<_>>(),
        );
    }
    table.to_string()
}
