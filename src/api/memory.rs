use std::path::Path;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use chrono::Local;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::api::{
    CareApi, ClientError, ClientResult, MasterSummary, MasterTable, ServerDisclaimer, ServerMonth,
    ServerOutlook, ServerRecommendation, ServerRisk,
};
use crate::records::{
    BonsaiRecord, EffectivenessRecord, NewBonsai, NewPesticideLog, NewWorkLog, PestDiseaseRecord,
    PesticideLogRecord, PesticideRecord, ProhibitedPesticideRecord, ReferenceData, SpeciesRecord,
    SpeciesRiskRecord, WorkLogRecord,
};
use crate::season::Month;
use crate::session::Session;
use crate::treatment::{build_outlook, MonthlyRiskView};

/// Shape of an offline fixture file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub reference: ReferenceData,
    #[serde(default)]
    pub bonsai: Vec<BonsaiRecord>,
    #[serde(default)]
    pub logs: Vec<PesticideLogRecord>,
    #[serde(default)]
    pub work_types: Vec<String>,
    #[serde(default)]
    pub work_logs: Vec<WorkLogRecord>,
    #[serde(default)]
    pub admins: Vec<u64>,
}

/// A [`CareApi`] that serves everything from memory. Writes are kept for the
/// life of the process only.
pub struct MemoryCareApi {
    reference: Mutex<ReferenceData>,
    bonsai: Mutex<Vec<BonsaiRecord>>,
    logs: Mutex<Vec<PesticideLogRecord>>,
    work_types: Vec<String>,
    work_logs: Mutex<Vec<WorkLogRecord>>,
    admins: Vec<u64>,
}

impl MemoryCareApi {
    pub fn new(reference: ReferenceData) -> Self {
        Self::from_fixture(Fixture {
            reference,
            ..Fixture::default()
        })
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        Self {
            reference: Mutex::new(fixture.reference),
            bonsai: Mutex::new(fixture.bonsai),
            logs: Mutex::new(fixture.logs),
            work_types: fixture.work_types,
            work_logs: Mutex::new(fixture.work_logs),
            admins: fixture.admins,
        }
    }

    pub fn load(path: &Path) -> ClientResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| ClientError::Fixture(format!("reading {}: {err}", path.display())))?;
        let fixture: Fixture = serde_json::from_str(&raw)
            .map_err(|err| ClientError::Fixture(format!("parsing {}: {err}", path.display())))?;
        info!(
            "loaded fixture {} ({} pesticides, {} bonsai, {} logs)",
            path.display(),
            fixture.reference.pesticides.len(),
            fixture.bonsai.len(),
            fixture.logs.len()
        );
        Ok(Self::from_fixture(fixture))
    }

    pub fn with_bonsai(mut self, bonsai: Vec<BonsaiRecord>) -> Self {
        self.bonsai = Mutex::new(bonsai);
        self
    }

    pub fn with_work_types(mut self, work_types: Vec<String>) -> Self {
        self.work_types = work_types;
        self
    }

    pub fn with_admins(mut self, admins: Vec<u64>) -> Self {
        self.admins = admins;
        self
    }

    fn ensure_admin(&self, session: &Session, method: &'static str) -> ClientResult<()> {
        if self.admins.contains(&session.user_id) {
            Ok(())
        } else {
            Err(ClientError::Status {
                method,
                url: "memory://admin".to_string(),
                status: 403,
                message: "admin access required".to_string(),
            })
        }
    }

    async fn bonsai(&self, bonsai_id: u64) -> ClientResult<BonsaiRecord> {
        self.bonsai
            .lock()
            .await
            .iter()
            .find(|b| b.id == bonsai_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("bonsai {bonsai_id}")))
    }
}

#[async_trait]
impl CareApi for MemoryCareApi {
    async fn is_admin(&self, session: &Session) -> ClientResult<bool> {
        Ok(self.admins.contains(&session.user_id))
    }

    async fn fetch_reference_data(&self, _session: &Session) -> ClientResult<ReferenceData> {
        Ok(self.reference.lock().await.clone())
    }

    async fn fetch_bonsai(&self, _session: &Session) -> ClientResult<Vec<BonsaiRecord>> {
        Ok(self.bonsai.lock().await.clone())
    }

    async fn create_bonsai(
        &self,
        _session: &Session,
        bonsai: &NewBonsai,
    ) -> ClientResult<Option<u64>> {
        let name = bonsai.name.trim();
        if name.is_empty() {
            return Err(ClientError::Rejected("bonsai name is required".to_string()));
        }
        let species_name = match bonsai.species_id {
            Some(species_id) => {
                let reference = self.reference.lock().await;
                let species = reference
                    .species(species_id)
                    .ok_or_else(|| ClientError::NotFound(format!("species {species_id}")))?;
                Some(species.name.clone())
            }
            None => None,
        };
        let mut trees = self.bonsai.lock().await;
        let id = next_id(trees.iter().map(|b| Some(b.id)));
        trees.push(BonsaiRecord {
            id,
            name: name.to_string(),
            species_id: bonsai.species_id,
            species_name,
            notes: bonsai.notes.clone().filter(|n| !n.trim().is_empty()),
        });
        debug!("stored bonsai {id} ({name})");
        Ok(Some(id))
    }

    async fn delete_bonsai(&self, _session: &Session, bonsai_id: u64) -> ClientResult<()> {
        let removed = remove_where(&mut *self.bonsai.lock().await, |b| b.id == bonsai_id);
        if !removed {
            return Err(ClientError::NotFound(format!("bonsai {bonsai_id}")));
        }
        self.logs
            .lock()
            .await
            .retain(|log| log.bonsai_id != Some(bonsai_id));
        self.work_logs
            .lock()
            .await
            .retain(|log| log.bonsai_id != Some(bonsai_id));
        Ok(())
    }

    async fn fetch_pesticide_logs(
        &self,
        _session: &Session,
        bonsai_id: Option<u64>,
    ) -> ClientResult<Vec<PesticideLogRecord>> {
        let logs = self.logs.lock().await;
        Ok(logs
            .iter()
            .filter(|log| bonsai_id.is_none() || log.bonsai_id == bonsai_id)
            .cloned()
            .collect())
    }

    async fn create_pesticide_log(
        &self,
        _session: &Session,
        log: &NewPesticideLog,
    ) -> ClientResult<()> {
        let bonsai = self.bonsai(log.bonsai_id).await?;
        if log.pesticide_name.trim().is_empty() {
            return Err(ClientError::Rejected("pesticide name is required".to_string()));
        }
        let mut logs = self.logs.lock().await;
        let id = next_id(logs.iter().map(|l| Some(l.id)));
        logs.push(PesticideLogRecord {
            id,
            bonsai_id: Some(bonsai.id),
            bonsai_name: Some(bonsai.name.clone()),
            pesticide_name: log.pesticide_name.trim().to_string(),
            usage_date: log.usage_date.clone(),
            dosage: optional(&log.dosage),
            water_amount: optional(&log.water_amount),
            dilution_ratio: optional(&log.dilution_ratio),
            notes: optional(&log.notes),
        });
        debug!("stored pesticide log {id} for bonsai {}", bonsai.id);
        Ok(())
    }

    async fn delete_pesticide_log(&self, _session: &Session, log_id: u64) -> ClientResult<()> {
        let mut logs = self.logs.lock().await;
        let before = logs.len();
        logs.retain(|log| log.id != log_id);
        if logs.len() == before {
            return Err(ClientError::NotFound(format!("pesticide log {log_id}")));
        }
        Ok(())
    }

    async fn fetch_work_types(&self) -> ClientResult<Vec<String>> {
        Ok(self.work_types.clone())
    }

    async fn fetch_work_logs(
        &self,
        _session: &Session,
        bonsai_id: u64,
    ) -> ClientResult<Vec<WorkLogRecord>> {
        self.bonsai(bonsai_id).await?;
        let mut logs: Vec<WorkLogRecord> = self
            .work_logs
            .lock()
            .await
            .iter()
            .filter(|log| log.bonsai_id == Some(bonsai_id))
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
        Ok(logs)
    }

    async fn create_work_log(
        &self,
        _session: &Session,
        bonsai_id: u64,
        log: &NewWorkLog,
    ) -> ClientResult<Option<WorkLogRecord>> {
        let bonsai = self.bonsai(bonsai_id).await?;
        let work_type = log.work_type.trim();
        if work_type.is_empty() {
            return Err(ClientError::Rejected("work type is required".to_string()));
        }
        if !self.work_types.is_empty() && !self.work_types.iter().any(|t| t == work_type) {
            return Err(ClientError::Rejected(format!("unknown work type: {work_type}")));
        }
        if log.date.trim().is_empty() {
            return Err(ClientError::Rejected("work date is required".to_string()));
        }
        let mut logs = self.work_logs.lock().await;
        let record = WorkLogRecord {
            id: next_id(logs.iter().map(|l| Some(l.id))),
            bonsai_id: Some(bonsai.id),
            date: log.date.trim().to_string(),
            work_type: work_type.to_string(),
            description: optional(&log.description),
            notes: optional(&log.notes),
            duration: log.duration,
            created_at: Some(Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()),
        };
        logs.push(record.clone());
        debug!("stored work log {} for bonsai {}", record.id, bonsai.id);
        Ok(Some(record))
    }

    async fn delete_work_log(&self, _session: &Session, log_id: u64) -> ClientResult<()> {
        if remove_where(&mut *self.work_logs.lock().await, |log| log.id == log_id) {
            Ok(())
        } else {
            Err(ClientError::NotFound(format!("work log {log_id}")))
        }
    }

    async fn fetch_server_outlook(
        &self,
        _session: &Session,
        bonsai_id: u64,
    ) -> ClientResult<ServerOutlook> {
        let species_id = self.bonsai(bonsai_id).await?.species_id;
        let reference = self.reference.lock().await;
        let outlook = build_outlook(&reference, species_id, Month::current());
        Ok(ServerOutlook {
            current_month: server_month(&outlook.current),
            next_month: server_month(&outlook.next),
            disclaimer: Some(ServerDisclaimer {
                combination_warning: Some(outlook.disclaimer.combination_warning),
                concentration_warning: Some(outlook.disclaimer.concentration_warning),
            }),
        })
    }

    async fn fetch_master(
        &self,
        session: &Session,
        table: MasterTable,
    ) -> ClientResult<Vec<Value>> {
        self.ensure_admin(session, "GET")?;
        let reference = self.reference.lock().await;
        let rows = match table {
            MasterTable::Species => serde_json::to_value(&reference.species),
            MasterTable::Pesticides => serde_json::to_value(&reference.pesticides),
            MasterTable::PestDiseases => serde_json::to_value(&reference.pest_diseases),
            MasterTable::PesticideEffectiveness => serde_json::to_value(&reference.effectiveness),
            MasterTable::SpeciesPestDiseases => serde_json::to_value(&reference.species_risks),
            MasterTable::SpeciesProhibitedPesticides => {
                serde_json::to_value(&reference.prohibited)
            }
        }
        .map_err(|err| ClientError::Fixture(format!("serializing {table}: {err}")))?;
        Ok(match rows {
            Value::Array(rows) => rows,
            _ => Vec::new(),
        })
    }

    async fn create_master(
        &self,
        session: &Session,
        table: MasterTable,
        row: &Value,
    ) -> ClientResult<()> {
        self.ensure_admin(session, "POST")?;
        let mut guard = self.reference.lock().await;
        let reference = &mut *guard;
        match table {
            MasterTable::Species => {
                let next = next_id(reference.species.iter().map(|r| Some(r.id)));
                let record: SpeciesRecord = master_row(table, row, next)?;
                ensure_new(reference.species(record.id).is_none(), table, record.id)?;
                reference.species.push(record);
            }
            MasterTable::Pesticides => {
                let next = next_id(reference.pesticides.iter().map(|r| Some(r.id)));
                let record: PesticideRecord = master_row(table, row, next)?;
                ensure_new(reference.pesticide(record.id).is_none(), table, record.id)?;
                reference.pesticides.push(record);
            }
            MasterTable::PestDiseases => {
                let next = next_id(reference.pest_diseases.iter().map(|r| Some(r.id)));
                let record: PestDiseaseRecord = master_row(table, row, next)?;
                ensure_new(reference.pest_disease(record.id).is_none(), table, record.id)?;
                reference.pest_diseases.push(record);
            }
            MasterTable::PesticideEffectiveness => {
                let next = next_id(reference.effectiveness.iter().map(|r| r.id));
                let record: EffectivenessRecord = master_row(table, row, next)?;
                ensure_known(
                    reference.pesticide(record.pesticide_id).is_some(),
                    "pesticide",
                    record.pesticide_id,
                )?;
                ensure_known(
                    reference.pest_disease(record.pest_disease_id).is_some(),
                    "pest/disease",
                    record.pest_disease_id,
                )?;
                if !record.has_valid_level() {
                    return Err(ClientError::Rejected(format!(
                        "effectiveness level must be {}-{}, got {}",
                        EffectivenessRecord::MIN_LEVEL,
                        EffectivenessRecord::MAX_LEVEL,
                        record.level
                    )));
                }
                reference.effectiveness.push(record);
            }
            MasterTable::SpeciesPestDiseases => {
                let next = next_id(reference.species_risks.iter().map(|r| r.id));
                let record: SpeciesRiskRecord = master_row(table, row, next)?;
                ensure_known(
                    reference.species(record.species_id).is_some(),
                    "species",
                    record.species_id,
                )?;
                ensure_known(
                    reference.pest_disease(record.pest_disease_id).is_some(),
                    "pest/disease",
                    record.pest_disease_id,
                )?;
                reference.species_risks.push(record);
            }
            MasterTable::SpeciesProhibitedPesticides => {
                let next = next_id(reference.prohibited.iter().map(|r| r.id));
                let record: ProhibitedPesticideRecord = master_row(table, row, next)?;
                ensure_known(
                    reference.species(record.species_id).is_some(),
                    "species",
                    record.species_id,
                )?;
                ensure_known(
                    reference.pesticide(record.pesticide_id).is_some(),
                    "pesticide",
                    record.pesticide_id,
                )?;
                reference.prohibited.push(record);
            }
        }
        debug!("added {table} row");
        Ok(())
    }

    async fn delete_master(
        &self,
        session: &Session,
        table: MasterTable,
        id: u64,
    ) -> ClientResult<()> {
        self.ensure_admin(session, "DELETE")?;
        let mut reference = self.reference.lock().await;
        let removed = match table {
            MasterTable::Species => remove_where(&mut reference.species, |r| r.id == id),
            MasterTable::Pesticides => remove_where(&mut reference.pesticides, |r| r.id == id),
            MasterTable::PestDiseases => {
                remove_where(&mut reference.pest_diseases, |r| r.id == id)
            }
            MasterTable::PesticideEffectiveness => {
                remove_where(&mut reference.effectiveness, |r| r.id == Some(id))
            }
            MasterTable::SpeciesPestDiseases => {
                remove_where(&mut reference.species_risks, |r| r.id == Some(id))
            }
            MasterTable::SpeciesProhibitedPesticides => {
                remove_where(&mut reference.prohibited, |r| r.id == Some(id))
            }
        };
        if removed {
            Ok(())
        } else {
            Err(ClientError::NotFound(format!("{table} row {id}")))
        }
    }

    async fn fetch_master_summary(&self, session: &Session) -> ClientResult<MasterSummary> {
        self.ensure_admin(session, "GET")?;
        let reference = self.reference.lock().await;
        let count = |rows: usize| rows as u64;
        Ok(MasterSummary {
            species_count: count(reference.species.len()),
            pesticides_count: count(reference.pesticides.len()),
            pest_diseases_count: count(reference.pest_diseases.len()),
            effectiveness_count: count(reference.effectiveness.len()),
            species_risks_count: count(reference.species_risks.len()),
            prohibited_count: count(reference.prohibited.len()),
        })
    }
}

fn next_id(ids: impl Iterator<Item = Option<u64>>) -> u64 {
    ids.flatten().max().unwrap_or(0) + 1
}

fn optional(text: &str) -> Option<String> {
    Some(text.trim().to_string()).filter(|s| !s.is_empty())
}

/// Decodes an admin-submitted row, filling in `next_id` when no id is given.
fn master_row<T: DeserializeOwned>(
    table: MasterTable,
    row: &Value,
    next_id: u64,
) -> ClientResult<T> {
    let Some(object) = row.as_object() else {
        return Err(ClientError::Rejected(format!("{table} row must be a JSON object")));
    };
    let mut object = object.clone();
    object.remove("user_id");
    if object.get("id").map_or(true, Value::is_null) {
        object.insert("id".to_string(), Value::from(next_id));
    }
    serde_json::from_value(Value::Object(object))
        .map_err(|err| ClientError::Rejected(format!("invalid {table} row: {err}")))
}

fn ensure_new(is_new: bool, table: MasterTable, id: u64) -> ClientResult<()> {
    if is_new {
        Ok(())
    } else {
        Err(ClientError::Rejected(format!("{table} row {id} already exists")))
    }
}

fn ensure_known(exists: bool, what: &str, id: u64) -> ClientResult<()> {
    if exists {
        Ok(())
    } else {
        Err(ClientError::NotFound(format!("{what} {id}")))
    }
}

fn remove_where<T>(rows: &mut Vec<T>, matches: impl Fn(&T) -> bool) -> bool {
    let before = rows.len();
    rows.retain(|row| !matches(row));
    rows.len() != before
}

fn server_month(view: &MonthlyRiskView) -> ServerMonth {
    ServerMonth {
        month: view.month.number(),
        season: Some(view.season.to_string()),
        risks: view
            .active_risks
            .iter()
            .map(|risk| ServerRisk {
                pest_disease_name: risk.record.name.clone(),
                pest_disease_type: Some(risk.record.kind.as_slug().to_string()),
                occurrence_probability: risk.occurrence_probability,
            })
            .collect(),
        recommendations: view
            .ranked_treatments
            .iter()
            .map(|t| ServerRecommendation {
                pesticide_name: t.pesticide.name.clone(),
                pesticide_type: Some(t.kind.as_slug().to_string()),
                avg_effectiveness: Some(t.avg_effectiveness),
                warning: t.warning.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treatment::monthly::fixtures::reference_data;

    fn api() -> MemoryCareApi {
        MemoryCareApi::new(reference_data())
            .with_bonsai(vec![
                BonsaiRecord {
                    id: 10,
                    name: "Kuromatsu".to_string(),
                    species_id: Some(1),
                    species_name: Some("Japanese black pine".to_string()),
                    notes: None,
                },
                BonsaiRecord {
                    id: 11,
                    name: "Shohin maple".to_string(),
                    species_id: None,
                    species_name: None,
                    notes: None,
                },
            ])
            .with_work_types(vec!["Pruning".to_string(), "Repotting".to_string()])
            .with_admins(vec![1])
    }

    fn work(date: &str, work_type: &str) -> NewWorkLog {
        NewWorkLog {
            date: date.to_string(),
            work_type: work_type.to_string(),
            description: "cut back new shoots".to_string(),
            notes: " ".to_string(),
            duration: Some(20),
        }
    }

    fn new_log(bonsai_id: u64, name: &str) -> NewPesticideLog {
        NewPesticideLog {
            bonsai_id,
            pesticide_name: name.to_string(),
            usage_date: "2024-07-01".to_string(),
            dosage: "0.50ml".to_string(),
            water_amount: "500".to_string(),
            dilution_ratio: "1000".to_string(),
            notes: String::new(),
        }
    }

    #[tokio::test]
    async fn logs_can_be_added_filtered_and_deleted() {
        let api = api();
        let session = Session::new(2);
        api.create_pesticide_log(&session, &new_log(10, "Orthene"))
            .await
            .expect("create");
        api.create_pesticide_log(&session, &new_log(11, "Topsin M"))
            .await
            .expect("create");

        let pine = api.fetch_pesticide_logs(&session, Some(10)).await.expect("logs");
        assert_eq!(pine.len(), 1);
        assert_eq!(pine[0].bonsai_name.as_deref(), Some("Kuromatsu"));
        assert_eq!(pine[0].dosage.as_deref(), Some("0.50ml"));
        assert_eq!(pine[0].notes, None);

        api.delete_pesticide_log(&session, pine[0].id).await.expect("delete");
        let all = api.fetch_pesticide_logs(&session, None).await.expect("logs");
        assert_eq!(all.len(), 1);
        assert!(matches!(
            api.delete_pesticide_log(&session, 99).await,
            Err(ClientError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn log_for_unknown_bonsai_is_rejected() {
        let api = api();
        let result = api
            .create_pesticide_log(&Session::new(2), &new_log(404, "Orthene"))
            .await;
        assert!(matches!(result, Err(ClientError::NotFound(_))));
    }

    #[tokio::test]
    async fn master_tables_require_admin() {
        let api = api();
        let denied = api.fetch_master(&Session::new(2), MasterTable::Pesticides).await;
        assert!(matches!(denied, Err(ClientError::Status { status: 403, .. })));

        let admin = Session::new(1);
        let rows = api
            .fetch_master(&admin, MasterTable::Pesticides)
            .await
            .expect("rows");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["type"], "insecticide");

        api.delete_master(&admin, MasterTable::PesticideEffectiveness, 4)
            .await
            .expect("delete");
        let data = api.fetch_reference_data(&admin).await.expect("data");
        assert_eq!(data.effectiveness.len(), 3);
        assert!(api
            .delete_master(&admin, MasterTable::Species, 42)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn master_writes_report_their_method_when_denied() {
        let api = api();
        let user = Session::new(2);
        let denied = api
            .create_master(&user, MasterTable::Species, &serde_json::json!({ "name": "Juniper" }))
            .await;
        assert!(matches!(
            denied,
            Err(ClientError::Status { method: "POST", status: 403, .. })
        ));
        let denied = api.delete_master(&user, MasterTable::Species, 1).await;
        assert!(matches!(
            denied,
            Err(ClientError::Status { method: "DELETE", status: 403, .. })
        ));
        assert!(api.fetch_master_summary(&user).await.is_err());
    }

    #[tokio::test]
    async fn master_rows_are_added_with_ids_and_reference_checks() {
        let api = api();
        let admin = Session::new(1);
        api.create_master(
            &admin,
            MasterTable::Species,
            &serde_json::json!({ "name": "Shimpaku juniper", "user_id": 1 }),
        )
        .await
        .expect("species");
        api.create_master(
            &admin,
            MasterTable::SpeciesProhibitedPesticides,
            &serde_json::json!({ "species_id": 2, "pesticide_id": 3, "severity": "warning" }),
        )
        .await
        .expect("prohibited");

        let data = api.fetch_reference_data(&admin).await.expect("data");
        assert_eq!(data.species(2).map(|s| s.name.as_str()), Some("Shimpaku juniper"));
        assert_eq!(data.prohibited.last().and_then(|p| p.id), Some(2));

        let duplicate = api
            .create_master(
                &admin,
                MasterTable::Pesticides,
                &serde_json::json!({ "id": 1, "name": "Again", "type": "insecticide" }),
            )
            .await;
        assert!(matches!(duplicate, Err(ClientError::Rejected(_))));

        let dangling = api
            .create_master(
                &admin,
                MasterTable::PesticideEffectiveness,
                &serde_json::json!({
                    "pesticide_id": 9,
                    "pest_disease_id": 1,
                    "effectiveness_level": 3
                }),
            )
            .await;
        assert!(matches!(dangling, Err(ClientError::NotFound(_))));

        let out_of_range = api
            .create_master(
                &admin,
                MasterTable::PesticideEffectiveness,
                &serde_json::json!({
                    "pesticide_id": 1,
                    "pest_disease_id": 2,
                    "effectiveness_level": 6
                }),
            )
            .await;
        assert!(matches!(out_of_range, Err(ClientError::Rejected(_))));

        let not_an_object = api
            .create_master(&admin, MasterTable::Species, &serde_json::json!(["Juniper"]))
            .await;
        assert!(matches!(not_an_object, Err(ClientError::Rejected(_))));

        let summary = api.fetch_master_summary(&admin).await.expect("summary");
        assert_eq!(summary.species_count, 2);
        assert_eq!(summary.pesticides_count, 3);
        assert_eq!(summary.effectiveness_count, 4);
        assert_eq!(summary.prohibited_count, data.prohibited.len() as u64);
    }

    #[tokio::test]
    async fn bonsai_can_be_registered_and_removed_with_its_logs() {
        let api = api();
        let session = Session::new(2);
        let id = api
            .create_bonsai(
                &session,
                &NewBonsai {
                    name: " Goyomatsu ".to_string(),
                    species_id: Some(1),
                    notes: Some(String::new()),
                },
            )
            .await
            .expect("create")
            .expect("id");
        assert_eq!(id, 12);
        let tree = find_tree(&api, &session, id).await;
        assert_eq!(tree.name, "Goyomatsu");
        assert_eq!(tree.species_name.as_deref(), Some("Japanese black pine"));
        assert_eq!(tree.notes, None);

        let unknown_species = api
            .create_bonsai(
                &session,
                &NewBonsai {
                    name: "Mystery".to_string(),
                    species_id: Some(99),
                    notes: None,
                },
            )
            .await;
        assert!(matches!(unknown_species, Err(ClientError::NotFound(_))));
        let unnamed = api
            .create_bonsai(
                &session,
                &NewBonsai {
                    name: "  ".to_string(),
                    species_id: None,
                    notes: None,
                },
            )
            .await;
        assert!(matches!(unnamed, Err(ClientError::Rejected(_))));

        api.create_pesticide_log(&session, &new_log(id, "Orthene"))
            .await
            .expect("pesticide log");
        api.create_work_log(&session, id, &work("2024-04-01", "Pruning"))
            .await
            .expect("work log");
        api.delete_bonsai(&session, id).await.expect("delete");

        assert!(api.fetch_bonsai(&session).await.expect("bonsai").iter().all(|b| b.id != id));
        assert!(api
            .fetch_pesticide_logs(&session, Some(id))
            .await
            .expect("logs")
            .is_empty());
        assert!(matches!(
            api.fetch_work_logs(&session, id).await,
            Err(ClientError::NotFound(_))
        ));
        assert!(matches!(
            api.delete_bonsai(&session, id).await,
            Err(ClientError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn work_logs_are_validated_listed_newest_first_and_deleted() {
        let api = api();
        let session = Session::new(2);
        assert_eq!(
            api.fetch_work_types().await.expect("types"),
            vec!["Pruning", "Repotting"]
        );

        let older = api
            .create_work_log(&session, 10, &work("2024-03-01", "Repotting"))
            .await
            .expect("create")
            .expect("row");
        assert_eq!(older.notes, None);
        assert_eq!(older.description.as_deref(), Some("cut back new shoots"));
        assert!(older.created_at.is_some());
        api.create_work_log(&session, 10, &work("2024-05-20", "Pruning"))
            .await
            .expect("create");
        api.create_work_log(&session, 11, &work("2024-05-21", "Pruning"))
            .await
            .expect("create");

        let logs = api.fetch_work_logs(&session, 10).await.expect("logs");
        assert_eq!(
            logs.iter().map(|l| l.date.as_str()).collect::<Vec<_>>(),
            vec!["2024-05-20", "2024-03-01"]
        );

        let untyped = api.create_work_log(&session, 10, &work("2024-06-01", "")).await;
        assert!(matches!(untyped, Err(ClientError::Rejected(_))));
        let unknown = api
            .create_work_log(&session, 10, &work("2024-06-01", "Defoliation"))
            .await;
        assert!(matches!(unknown, Err(ClientError::Rejected(_))));
        let no_tree = api
            .create_work_log(&session, 404, &work("2024-06-01", "Pruning"))
            .await;
        assert!(matches!(no_tree, Err(ClientError::NotFound(_))));

        api.delete_work_log(&session, older.id).await.expect("delete");
        assert_eq!(api.fetch_work_logs(&session, 10).await.expect("logs").len(), 1);
        assert!(matches!(
            api.delete_work_log(&session, older.id).await,
            Err(ClientError::NotFound(_))
        ));
    }

    async fn find_tree(api: &MemoryCareApi, session: &Session, id: u64) -> BonsaiRecord {
        crate::api::find_bonsai(api, session, id).await.expect("bonsai")
    }

    #[tokio::test]
    async fn server_outlook_mirrors_local_aggregation() {
        let api = api();
        let outlook = api
            .fetch_server_outlook(&Session::new(2), 10)
            .await
            .expect("outlook");
        let current = Month::current();
        assert_eq!(outlook.current_month.month, current.number());
        assert_eq!(outlook.next_month.month, current.next().number());
        assert!(outlook.disclaimer.is_some());
    }

    #[tokio::test]
    async fn bundled_sample_fixture_loads() {
        let fixture: Fixture =
            serde_json::from_str(include_str!("../../fixtures/sample.json")).expect("fixture");
        let api = MemoryCareApi::from_fixture(fixture);
        let session = Session::new(1);
        assert!(api.is_admin(&session).await.expect("admin"));
        let logs = api.fetch_pesticide_logs(&session, Some(10)).await.expect("logs");
        assert_eq!(logs[0].dilution_ratio.as_deref(), Some("1000"));
        let data = api.fetch_reference_data(&session).await.expect("data");
        assert_eq!(data.pesticides.len(), 4);
        assert_eq!(data.prohibited.len(), 2);
        assert!(!api.fetch_work_types().await.expect("types").is_empty());
        let work = api.fetch_work_logs(&session, 10).await.expect("work logs");
        assert_eq!(work[0].work_type, "Wiring");
    }

    #[test]
    fn fixture_parses_with_missing_sections() {
        let fixture: Fixture =
            serde_json::from_str(r#"{ "bonsai": [{ "id": 1, "name": "Juniper" }] }"#)
                .expect("fixture");
        assert_eq!(fixture.bonsai.len(), 1);
        assert!(fixture.reference.pesticides.is_empty());
        assert!(fixture.admins.is_empty());
    }
}
