pub mod monthly;
pub mod ranking;
pub mod recommendations;

use serde::{Deserialize, Serialize};

use crate::records::{PestDiseaseRecord, PesticideKind, PesticideRecord};
use crate::season::{Month, Season};

pub use monthly::{build_monthly_view, build_outlook, species_risks_for_month};
pub use ranking::{apply_species_restrictions, rank_treatments};
pub use recommendations::{reapplication_wait_days, summarize_recommendations};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedTreatment {
    pub pesticide: PesticideRecord,
    pub kind: PesticideKind,
    pub avg_effectiveness: f64,
    /// Names of the active risks this pesticide has an effectiveness link to.
    pub targets: Vec<String>,
    #[serde(default)]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveRisk {
    pub record: PestDiseaseRecord,
    /// 1-5 occurrence probability from the species risk table, if known.
    pub occurrence_probability: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlyRiskView {
    pub month: Month,
    pub season: Season,
    pub active_risks: Vec<ActiveRisk>,
    pub ranked_treatments: Vec<RankedTreatment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Disclaimer {
    pub combination_warning: String,
    pub concentration_warning: String,
}

impl Default for Disclaimer {
    fn default() -> Self {
        Self {
            combination_warning: "Check label compatibility before tank-mixing an insecticide with a fungicide.".to_string(),
            concentration_warning: "Follow the label dilution; stronger mixes can scorch foliage on small trees.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonalOutlook {
    pub species_id: Option<u64>,
    pub current: MonthlyRiskView,
    pub next: MonthlyRiskView,
    pub disclaimer: Disclaimer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_effectiveness(avg: f64) -> Self {
        if avg >= 4.0 {
            Self::High
        } else if avg >= 3.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreatmentRecommendation {
    pub kind: PesticideKind,
    pub pesticide_name: Option<String>,
    pub avg_effectiveness: Option<f64>,
    pub interval_days: Option<u32>,
    pub confidence: Confidence,
    pub reason: String,
    /// Days left before the product may be applied again; 0 means due now.
    pub wait_days: Option<i64>,
    #[serde(default)]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationSummary {
    pub month: Month,
    pub insecticide: TreatmentRecommendation,
    pub fungicide: TreatmentRecommendation,
}
