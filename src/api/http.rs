use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{CareApi, ClientError, ClientResult, MasterSummary, MasterTable, ServerOutlook};
use crate::records::{
    BonsaiRecord, EffectivenessRecord, NewBonsai, NewPesticideLog, NewWorkLog, PestDiseaseRecord,
    PesticideLogRecord, PesticideRecord, ProhibitedPesticideRecord, ReferenceData, SpeciesRecord,
    SpeciesRiskRecord, WorkLogRecord,
};
use crate::session::Session;

const USER_AGENT: &str = concat!("bonsai-care/", env!("CARGO_PKG_VERSION"));
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 6;
const ERROR_PREVIEW_CHARS: usize = 180;

pub struct HttpCareApi {
    client: Client,
    base_url: String,
}

impl HttpCareApi {
    pub fn new(base_url: &str, timeout_secs: u64) -> ClientResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|source| ClientError::Transport {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        session: Option<&Session>,
    ) -> (RequestBuilder, String) {
        let url = self.url(path);
        let mut builder = self.client.request(method, &url);
        if let Some(session) = session {
            builder = builder.query(&[("user_id", session.user_id)]);
        }
        (builder, url)
    }

    async fn send(
        &self,
        method: &'static str,
        builder: RequestBuilder,
        url: String,
    ) -> ClientResult<Value> {
        debug!("{method} {url}");
        let response = builder.send().await.map_err(|source| ClientError::Transport {
            url: url.clone(),
            source,
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|source| ClientError::Transport {
            url: url.clone(),
            source,
        })?;
        if !status.is_success() {
            return Err(ClientError::Status {
                method,
                url,
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        let value: Value =
            serde_json::from_str(&body).map_err(|source| ClientError::Decode { url, source })?;
        check_envelope(&value)?;
        Ok(value)
    }

    async fn get(&self, path: &str, session: Option<&Session>) -> ClientResult<Value> {
        let (builder, url) = self.request(Method::GET, path, session);
        self.send("GET", builder, url).await
    }

    async fn delete(&self, path: &str, session: &Session) -> ClientResult<Value> {
        let (builder, url) = self.request(Method::DELETE, path, Some(session));
        self.send("DELETE", builder, url).await
    }

    /// POSTs `body` with the session's `user_id` merged into it, the way the
    /// bonsai, work-log and master editors submit.
    async fn post_as_user<B: Serialize + Sync>(
        &self,
        path: &str,
        session: &Session,
        body: &B,
    ) -> ClientResult<Value> {
        let payload = with_user_id(body, session)?;
        let (builder, url) = self.request(Method::POST, path, None);
        self.send("POST", builder.json(&payload), url).await
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        path: &str,
        session: &Session,
    ) -> ClientResult<Vec<T>> {
        let value = self.get(path, Some(session)).await?;
        Ok(decode_rows(&value, path))
    }
}

#[async_trait]
impl CareApi for HttpCareApi {
    async fn is_admin(&self, session: &Session) -> ClientResult<bool> {
        let value = self
            .get(&format!("/api/user/is-admin/{}", session.user_id), None)
            .await?;
        Ok(value
            .get("is_admin")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    async fn fetch_reference_data(&self, session: &Session) -> ClientResult<ReferenceData> {
        let species_path = master_path(MasterTable::Species);
        let pest_diseases_path = master_path(MasterTable::PestDiseases);
        let effectiveness_path = master_path(MasterTable::PesticideEffectiveness);
        let species_risks_path = master_path(MasterTable::SpeciesPestDiseases);
        let prohibited_path = master_path(MasterTable::SpeciesProhibitedPesticides);

        let (species, pesticides, pest_diseases, effectiveness, species_risks, prohibited) = tokio::try_join!(
            self.get_rows::<SpeciesRecord>(&species_path, session),
            self.get_rows::<PesticideRecord>("/api/pesticides/list", session),
            self.get_rows::<PestDiseaseRecord>(&pest_diseases_path, session),
            self.get_rows::<EffectivenessRecord>(&effectiveness_path, session),
            self.get_rows::<SpeciesRiskRecord>(&species_risks_path, session),
            self.get_rows::<ProhibitedPesticideRecord>(&prohibited_path, session),
        )?;
        debug!(
            "reference data: {} species, {} pesticides, {} pests/diseases, {} effectiveness links",
            species.len(),
            pesticides.len(),
            pest_diseases.len(),
            effectiveness.len()
        );
        Ok(ReferenceData {
            species,
            pesticides,
            pest_diseases,
            effectiveness,
            species_risks,
            prohibited,
        })
    }

    async fn fetch_bonsai(&self, session: &Session) -> ClientResult<Vec<BonsaiRecord>> {
        let value = self
            .get(&format!("/api/bonsai/user/{}", session.user_id), None)
            .await?;
        Ok(decode_rows(&value, "bonsai"))
    }

    async fn create_bonsai(
        &self,
        session: &Session,
        bonsai: &NewBonsai,
    ) -> ClientResult<Option<u64>> {
        let value = self.post_as_user("/api/bonsai", session, bonsai).await?;
        Ok(value.get("id").and_then(Value::as_u64))
    }

    async fn delete_bonsai(&self, session: &Session, bonsai_id: u64) -> ClientResult<()> {
        self.delete(&format!("/api/bonsai/{bonsai_id}"), session)
            .await?;
        Ok(())
    }

    async fn fetch_pesticide_logs(
        &self,
        session: &Session,
        bonsai_id: Option<u64>,
    ) -> ClientResult<Vec<PesticideLogRecord>> {
        match bonsai_id {
            Some(id) => self.get_rows(&format!("/api/pesticides/{id}"), session).await,
            None => {
                let value = self
                    .get(&format!("/api/pesticides/user/{}", session.user_id), None)
                    .await?;
                Ok(decode_rows(&value, "pesticide logs"))
            }
        }
    }

    async fn create_pesticide_log(
        &self,
        session: &Session,
        log: &NewPesticideLog,
    ) -> ClientResult<()> {
        let (builder, url) =
            self.request(Method::POST, "/api/pesticides/enhanced-log", Some(session));
        self.send("POST", builder.json(log), url).await?;
        Ok(())
    }

    async fn delete_pesticide_log(&self, session: &Session, log_id: u64) -> ClientResult<()> {
        self.delete(&format!("/api/pesticides/log/{log_id}"), session)
            .await?;
        Ok(())
    }

    async fn fetch_work_types(&self) -> ClientResult<Vec<String>> {
        let value = self.get("/api/work-logs/work-types", None).await?;
        Ok(decode_rows(&value, "work types"))
    }

    async fn fetch_work_logs(
        &self,
        session: &Session,
        bonsai_id: u64,
    ) -> ClientResult<Vec<WorkLogRecord>> {
        self.get_rows(&format!("/api/work-logs/{bonsai_id}"), session)
            .await
    }

    async fn create_work_log(
        &self,
        session: &Session,
        bonsai_id: u64,
        log: &NewWorkLog,
    ) -> ClientResult<Option<WorkLogRecord>> {
        let value = self
            .post_as_user(&format!("/api/work-logs/{bonsai_id}"), session, log)
            .await?;
        let created = value
            .get("log")
            .cloned()
            .and_then(|log| serde_json::from_value(log).ok());
        if created.is_none() {
            debug!("work log response carried no log row");
        }
        Ok(created)
    }

    async fn delete_work_log(&self, session: &Session, log_id: u64) -> ClientResult<()> {
        self.delete(&format!("/api/work-logs/log/{log_id}"), session)
            .await?;
        Ok(())
    }

    async fn fetch_server_outlook(
        &self,
        session: &Session,
        bonsai_id: u64,
    ) -> ClientResult<ServerOutlook> {
        let path = format!("/api/pesticides/monthly-risks/{bonsai_id}");
        let value = self.get(&path, Some(session)).await?;
        serde_json::from_value(value).map_err(|source| ClientError::Decode {
            url: self.url(&path),
            source,
        })
    }

    async fn fetch_master(
        &self,
        session: &Session,
        table: MasterTable,
    ) -> ClientResult<Vec<Value>> {
        let value = self.get(&master_path(table), Some(session)).await?;
        Ok(list_items(&value).cloned().unwrap_or_default())
    }

    async fn create_master(
        &self,
        session: &Session,
        table: MasterTable,
        row: &Value,
    ) -> ClientResult<()> {
        self.post_as_user(&master_path(table), session, row).await?;
        Ok(())
    }

    async fn delete_master(
        &self,
        session: &Session,
        table: MasterTable,
        id: u64,
    ) -> ClientResult<()> {
        self.delete(&format!("{}/{id}", master_path(table)), session)
            .await?;
        Ok(())
    }

    async fn fetch_master_summary(&self, session: &Session) -> ClientResult<MasterSummary> {
        let path = "/api/admin/master/summary";
        let value = self.get(path, Some(session)).await?;
        serde_json::from_value(value).map_err(|source| ClientError::Decode {
            url: self.url(path),
            source,
        })
    }
}

fn with_user_id<B: Serialize>(body: &B, session: &Session) -> ClientResult<Value> {
    let mut payload = serde_json::to_value(body).map_err(ClientError::Encode)?;
    match payload.as_object_mut() {
        Some(object) => {
            object.insert("user_id".to_string(), Value::from(session.user_id));
            Ok(payload)
        }
        None => Err(ClientError::Rejected(format!(
            "request body must be a JSON object, got {}",
            value_kind(&payload)
        ))),
    }
}

fn master_path(table: MasterTable) -> String {
    format!("/api/admin/master/{}", table.as_path())
}

/// `{ "success": false, "error": "..." }` is a failure even with a 2xx status.
fn check_envelope(value: &Value) -> ClientResult<()> {
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("request was not successful")
            .to_string();
        return Err(ClientError::Rejected(message));
    }
    Ok(())
}

fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    body.chars().take(ERROR_PREVIEW_CHARS).collect()
}

/// Finds the row array in a bare array or a `{data|items|...: [...]}` wrapper.
fn list_items(value: &Value) -> Option<&Vec<Value>> {
    if let Some(array) = value.as_array() {
        return Some(array);
    }
    let object = value.as_object()?;
    for key in ["data", "items", "results", "logs", "bonsai", "pesticides"] {
        if let Some(array) = object.get(key).and_then(Value::as_array) {
            return Some(array);
        }
    }
    None
}

/// Decodes each row on its own so one malformed row does not sink the list.
fn decode_rows<T: DeserializeOwned>(value: &Value, what: &str) -> Vec<T> {
    let Some(items) = list_items(value) else {
        if !value.is_null() {
            warn!("expected a list for {what}, got {}", value_kind(value));
        }
        return Vec::new();
    };
    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        match serde_json::from_value::<T>(item.clone()) {
            Ok(row) => out.push(row),
            Err(err) => warn!("skipping malformed {what} row {idx}: {err}"),
        }
    }
    out
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unsuccessful_envelope_surfaces_server_error() {
        let value = json!({ "success": false, "error": "permission denied" });
        match check_envelope(&value) {
            Err(ClientError::Rejected(message)) => assert_eq!(message, "permission denied"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(check_envelope(&json!({ "success": true, "is_admin": true })).is_ok());
        assert!(check_envelope(&json!([1, 2, 3])).is_ok());
    }

    #[test]
    fn error_message_prefers_json_error_field() {
        assert_eq!(error_message(r#"{"error":"not found"}"#), "not found");
        let html = "<html>".repeat(100);
        assert_eq!(error_message(&html).chars().count(), ERROR_PREVIEW_CHARS);
    }

    #[test]
    fn decodes_rows_from_wrapped_lists_and_skips_bad_rows() {
        let payload = json!({
            "data": [
                { "id": 1, "name": "Aphid", "type": "pest", "start_month": 4, "end_month": 10 },
                { "id": "oops", "name": "Broken" },
                { "id": 2, "name": "Rust", "type": "disease" }
            ]
        });
        let rows: Vec<PestDiseaseRecord> = decode_rows(&payload, "pest-diseases");
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(rows[1].start_month, None);
    }

    #[test]
    fn non_list_payload_decodes_to_empty() {
        let rows: Vec<PestDiseaseRecord> = decode_rows(&json!({ "message": "ok" }), "x");
        assert!(rows.is_empty());
    }

    #[test]
    fn posted_bodies_carry_the_session_user() {
        let log = NewWorkLog {
            date: "2024-03-02".to_string(),
            work_type: "Pruning".to_string(),
            description: String::new(),
            notes: String::new(),
            duration: Some(30),
        };
        let payload = with_user_id(&log, &Session::new(7)).expect("payload");
        assert_eq!(payload["user_id"], 7);
        assert_eq!(payload["work_type"], "Pruning");
        assert_eq!(payload["duration"], 30);

        let rejected = with_user_id(&json!([1, 2]), &Session::new(7));
        assert!(matches!(rejected, Err(ClientError::Rejected(_))));
    }

    #[test]
    fn work_types_decode_from_a_string_list() {
        let types: Vec<String> = decode_rows(&json!(["Pruning", "Wiring", 3]), "work types");
        assert_eq!(types, vec!["Pruning", "Wiring"]);
    }

    #[test]
    fn master_paths_use_table_slugs() {
        assert_eq!(
            master_path(MasterTable::SpeciesProhibitedPesticides),
            "/api/admin/master/species-prohibited-pesticides"
        );
    }

    #[test]
    fn base_url_is_normalized() {
        let api = HttpCareApi::new("http://localhost:5000/ ", 5).expect("client");
        assert_eq!(api.url("/api/bonsai"), "http://localhost:5000/api/bonsai");
    }
}
