pub mod schema;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub use schema::{
    BonsaiRecord, EffectivenessRecord, KindParseError, NewBonsai, NewPesticideLog, NewWorkLog,
    PestDiseaseKind, PestDiseaseRecord, PesticideKind, PesticideLogRecord, PesticideRecord,
    ProhibitedPesticideRecord, Severity, SpeciesRecord, SpeciesRiskRecord, WorkLogRecord,
};

/// In-memory copy of the master tables the risk planner works from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReferenceData {
    #[serde(default)]
    pub species: Vec<SpeciesRecord>,
    #[serde(default)]
    pub pesticides: Vec<PesticideRecord>,
    #[serde(default)]
    pub pest_diseases: Vec<PestDiseaseRecord>,
    #[serde(default)]
    pub effectiveness: Vec<EffectivenessRecord>,
    #[serde(default)]
    pub species_risks: Vec<SpeciesRiskRecord>,
    #[serde(default)]
    pub prohibited: Vec<ProhibitedPesticideRecord>,
}

impl ReferenceData {
    pub fn pesticide(&self, id: u64) -> Option<&PesticideRecord> {
        self.pesticides.iter().find(|p| p.id == id)
    }

    pub fn pest_disease(&self, id: u64) -> Option<&PestDiseaseRecord> {
        self.pest_diseases.iter().find(|p| p.id == id)
    }

    pub fn species(&self, id: u64) -> Option<&SpeciesRecord> {
        self.species.iter().find(|s| s.id == id)
    }

    pub fn risks_for_species(&self, species_id: u64) -> impl Iterator<Item = &SpeciesRiskRecord> {
        self.species_risks
            .iter()
            .filter(move |r| r.species_id == species_id)
    }

    pub fn restrictions_for_species(
        &self,
        species_id: u64,
    ) -> impl Iterator<Item = &ProhibitedPesticideRecord> {
        self.prohibited
            .iter()
            .filter(move |r| r.species_id == species_id)
    }
}

/// Accepts a JSON string, number or null for free-text numeric form fields.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
