use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::records::lenient_string;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PesticideKind {
    Insecticide,
    Fungicide,
}

impl PesticideKind {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Insecticide => "insecticide",
            Self::Fungicide => "fungicide",
        }
    }
}

impl Display for PesticideKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PestDiseaseKind {
    Pest,
    Disease,
}

impl PestDiseaseKind {
    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Pest => "pest",
            Self::Disease => "disease",
        }
    }
}

impl Display for PestDiseaseKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Prohibited,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Prohibited => write!(f, "prohibited"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown {field}: {value}")]
pub struct KindParseError {
    pub field: &'static str,
    pub value: String,
}

impl FromStr for PesticideKind {
    type Err = KindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insecticide" | "insect" => Ok(Self::Insecticide),
            "fungicide" | "fungus" => Ok(Self::Fungicide),
            _ => Err(KindParseError {
                field: "pesticide type",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for PestDiseaseKind {
    type Err = KindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pest" => Ok(Self::Pest),
            "disease" => Ok(Self::Disease),
            _ => Err(KindParseError {
                field: "pest/disease type",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for Severity {
    type Err = KindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warning" | "warn" => Ok(Self::Warning),
            "prohibited" | "ng" => Ok(Self::Prohibited),
            _ => Err(KindParseError {
                field: "severity",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PesticideRecord {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PesticideKind,
    #[serde(default = "default_interval_days")]
    pub interval_days: u32,
    #[serde(default)]
    pub active_ingredient: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A pest or disease with its seasonal window.
///
/// Bounds stay raw so that a malformed row still deserialises; it is simply
/// never active (see [`crate::season::MonthWindow::from_bounds`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PestDiseaseRecord {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PestDiseaseKind,
    #[serde(default)]
    pub start_month: Option<i64>,
    #[serde(default)]
    pub end_month: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EffectivenessRecord {
    #[serde(default)]
    pub id: Option<u64>,
    pub pesticide_id: u64,
    pub pest_disease_id: u64,
    #[serde(rename = "effectiveness_level", alias = "level")]
    pub level: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

impl EffectivenessRecord {
    pub const MIN_LEVEL: i64 = 1;
    pub const MAX_LEVEL: i64 = 5;

    pub fn has_valid_level(&self) -> bool {
        (Self::MIN_LEVEL..=Self::MAX_LEVEL).contains(&self.level)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeciesRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub scientific_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub care_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeciesRiskRecord {
    #[serde(default)]
    pub id: Option<u64>,
    pub species_id: u64,
    pub pest_disease_id: u64,
    #[serde(default = "default_probability")]
    pub occurrence_probability: u8,
    #[serde(default)]
    pub start_month: Option<i64>,
    #[serde(default)]
    pub end_month: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProhibitedPesticideRecord {
    #[serde(default)]
    pub id: Option<u64>,
    pub species_id: u64,
    pub pesticide_id: u64,
    pub severity: Severity,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BonsaiRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub species_id: Option<u64>,
    #[serde(default)]
    pub species_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PesticideLogRecord {
    pub id: u64,
    #[serde(default)]
    pub bonsai_id: Option<u64>,
    #[serde(default)]
    pub bonsai_name: Option<String>,
    pub pesticide_name: String,
    #[serde(alias = "date")]
    pub usage_date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub dosage: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub water_amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub dilution_ratio: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Body of an "enhanced" pesticide log submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPesticideLog {
    pub bonsai_id: u64,
    pub pesticide_name: String,
    pub usage_date: String,
    pub dosage: String,
    pub water_amount: String,
    pub dilution_ratio: String,
    pub notes: String,
}

/// Body of a bonsai registration. The owner is the session user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewBonsai {
    pub name: String,
    #[serde(default)]
    pub species_id: Option<u64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A care task done on a tree: pruning, repotting, wiring and so on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkLogRecord {
    pub id: u64,
    #[serde(default)]
    pub bonsai_id: Option<u64>,
    #[serde(alias = "work_date")]
    pub date: String,
    pub work_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Minutes spent.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewWorkLog {
    pub date: String,
    pub work_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub duration: Option<u32>,
}

fn default_interval_days() -> u32 {
    14
}

fn default_probability() -> u8 {
    3
}
