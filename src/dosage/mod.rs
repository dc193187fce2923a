//! Concentrate dosage from a water volume and a dilution ratio.
//!
//! Everything here is a pure function of its inputs. Incomplete or invalid
//! input yields `None` ("not computable") rather than an error so a form can
//! show an empty dosage field while the user is still choosing values.

pub mod calculator;
pub mod presets;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

pub use calculator::{compute_dosage, compute_dosage_from_fields, parse_quantity};
pub use presets::{
    dosage_chart, DosageChartRow, FieldSelection, Preset, CUSTOM_SELECTION,
    DEFAULT_DILUTION_PRESETS, DEFAULT_WATER_PRESETS_ML,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DosageUnit {
    #[serde(rename = "µl")]
    Microliter,
    #[serde(rename = "ml")]
    Milliliter,
}

impl DosageUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Microliter => "µl",
            Self::Milliliter => "ml",
        }
    }
}

impl Display for DosageUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DosageResult {
    pub amount: f64,
    pub unit: DosageUnit,
    /// Decimal places the amount was rounded to.
    pub decimals: usize,
}

impl Display for DosageResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.*}{}", self.decimals, self.amount, self.unit)
    }
}
