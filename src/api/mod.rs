//! Access to the remote bonsai-care API.
//!
//! [`CareApi`] is the seam the CLI and the local REST service talk to; the
//! HTTP implementation lives in [`http`], an offline fixture-backed one in
//! [`memory`].

pub mod http;
pub mod memory;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::records::{
    BonsaiRecord, NewBonsai, NewPesticideLog, NewWorkLog, PesticideLogRecord, ReferenceData,
    WorkLogRecord,
};
use crate::session::Session;

pub use http::HttpCareApi;
pub use memory::MemoryCareApi;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url} returned {status}: {message}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        message: String,
    },
    #[error("server rejected the request: {0}")]
    Rejected(String),
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("{0} not found")]
    NotFound(String),
    #[error("fixture error: {0}")]
    Fixture(String),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Admin-editable master tables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum MasterTable {
    Species,
    Pesticides,
    PestDiseases,
    PesticideEffectiveness,
    SpeciesPestDiseases,
    SpeciesProhibitedPesticides,
}

impl MasterTable {
    pub const ALL: [MasterTable; 6] = [
        MasterTable::Species,
        MasterTable::Pesticides,
        MasterTable::PestDiseases,
        MasterTable::PesticideEffectiveness,
        MasterTable::SpeciesPestDiseases,
        MasterTable::SpeciesProhibitedPesticides,
    ];

    pub fn as_path(&self) -> &'static str {
        match self {
            Self::Species => "species",
            Self::Pesticides => "pesticides",
            Self::PestDiseases => "pest-diseases",
            Self::PesticideEffectiveness => "pesticide-effectiveness",
            Self::SpeciesPestDiseases => "species-pest-diseases",
            Self::SpeciesProhibitedPesticides => "species-prohibited-pesticides",
        }
    }
}

impl Display for MasterTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_path())
    }
}

#[derive(Debug, Error)]
#[error("unknown master table: {0}")]
pub struct MasterTableParseError(pub String);

impl FromStr for MasterTable {
    type Err = MasterTableParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "species" => Ok(Self::Species),
            "pesticides" | "pesticide" => Ok(Self::Pesticides),
            "pest-diseases" | "pests" => Ok(Self::PestDiseases),
            "pesticide-effectiveness" | "effectiveness" => Ok(Self::PesticideEffectiveness),
            "species-pest-diseases" | "species-risks" => Ok(Self::SpeciesPestDiseases),
            "species-prohibited-pesticides" | "prohibited" => {
                Ok(Self::SpeciesProhibitedPesticides)
            }
            _ => Err(MasterTableParseError(s.to_string())),
        }
    }
}

/// Row counts per master table, as shown on the admin dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MasterSummary {
    #[serde(default)]
    pub species_count: u64,
    #[serde(default)]
    pub pesticides_count: u64,
    #[serde(default)]
    pub pest_diseases_count: u64,
    #[serde(default)]
    pub effectiveness_count: u64,
    #[serde(default)]
    pub species_risks_count: u64,
    #[serde(default)]
    pub prohibited_count: u64,
}

impl MasterSummary {
    pub fn count(&self, table: MasterTable) -> u64 {
        match table {
            MasterTable::Species => self.species_count,
            MasterTable::Pesticides => self.pesticides_count,
            MasterTable::PestDiseases => self.pest_diseases_count,
            MasterTable::PesticideEffectiveness => self.effectiveness_count,
            MasterTable::SpeciesPestDiseases => self.species_risks_count,
            MasterTable::SpeciesProhibitedPesticides => self.prohibited_count,
        }
    }

    /// Counts in [`MasterTable::ALL`] order.
    pub fn counts(&self) -> [(MasterTable, u64); 6] {
        MasterTable::ALL.map(|table| (table, self.count(table)))
    }
}

/// The server's own pre-aggregated monthly risk answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerOutlook {
    pub current_month: ServerMonth,
    pub next_month: ServerMonth,
    #[serde(default)]
    pub disclaimer: Option<ServerDisclaimer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerMonth {
    pub month: u8,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub risks: Vec<ServerRisk>,
    #[serde(default)]
    pub recommendations: Vec<ServerRecommendation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerRisk {
    pub pest_disease_name: String,
    #[serde(default)]
    pub pest_disease_type: Option<String>,
    #[serde(default)]
    pub occurrence_probability: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerRecommendation {
    pub pesticide_name: String,
    #[serde(default)]
    pub pesticide_type: Option<String>,
    #[serde(default)]
    pub avg_effectiveness: Option<f64>,
    #[serde(default)]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerDisclaimer {
    #[serde(default)]
    pub combination_warning: Option<String>,
    #[serde(default)]
    pub concentration_warning: Option<String>,
}

#[async_trait]
pub trait CareApi: Send + Sync {
    async fn is_admin(&self, session: &Session) -> ClientResult<bool>;
    async fn fetch_reference_data(&self, session: &Session) -> ClientResult<ReferenceData>;
    async fn fetch_bonsai(&self, session: &Session) -> ClientResult<Vec<BonsaiRecord>>;
    /// Registers a tree for the session user; returns its id when the API
    /// reports one.
    async fn create_bonsai(&self, session: &Session, bonsai: &NewBonsai)
        -> ClientResult<Option<u64>>;
    /// Deletes a tree together with its logs.
    async fn delete_bonsai(&self, session: &Session, bonsai_id: u64) -> ClientResult<()>;
    async fn fetch_pesticide_logs(
        &self,
        session: &Session,
        bonsai_id: Option<u64>,
    ) -> ClientResult<Vec<PesticideLogRecord>>;
    async fn create_pesticide_log(
        &self,
        session: &Session,
        log: &NewPesticideLog,
    ) -> ClientResult<()>;
    async fn delete_pesticide_log(&self, session: &Session, log_id: u64) -> ClientResult<()>;
    async fn fetch_work_types(&self) -> ClientResult<Vec<String>>;
    async fn fetch_work_logs(
        &self,
        session: &Session,
        bonsai_id: u64,
    ) -> ClientResult<Vec<WorkLogRecord>>;
    async fn create_work_log(
        &self,
        session: &Session,
        bonsai_id: u64,
        log: &NewWorkLog,
    ) -> ClientResult<Option<WorkLogRecord>>;
    async fn delete_work_log(&self, session: &Session, log_id: u64) -> ClientResult<()>;
    async fn fetch_server_outlook(
        &self,
        session: &Session,
        bonsai_id: u64,
    ) -> ClientResult<ServerOutlook>;
    async fn fetch_master(
        &self,
        session: &Session,
        table: MasterTable,
    ) -> ClientResult<Vec<serde_json::Value>>;
    /// Adds a row to a master table. `row` is the table's JSON shape; the id
    /// may be left out.
    async fn create_master(
        &self,
        session: &Session,
        table: MasterTable,
        row: &serde_json::Value,
    ) -> ClientResult<()>;
    async fn delete_master(&self, session: &Session, table: MasterTable, id: u64)
        -> ClientResult<()>;
    async fn fetch_master_summary(&self, session: &Session) -> ClientResult<MasterSummary>;
}

/// Looks up one of the session user's trees.
pub async fn find_bonsai(
    api: &dyn CareApi,
    session: &Session,
    bonsai_id: u64,
) -> ClientResult<BonsaiRecord> {
    api.fetch_bonsai(session)
        .await?
        .into_iter()
        .find(|b| b.id == bonsai_id)
        .ok_or_else(|| ClientError::NotFound(format!("bonsai {bonsai_id}")))
}
