use serde::{Deserialize, Serialize};

use crate::dosage::calculator::{compute_dosage, parse_quantity};
use crate::dosage::DosageResult;

/// Drop-down value that switches a field to free-form input.
pub const CUSTOM_SELECTION: &str = "custom";

pub const DEFAULT_WATER_PRESETS_ML: [f64; 6] = [100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0];
pub const DEFAULT_DILUTION_PRESETS: [f64; 7] =
    [100.0, 200.0, 500.0, 1000.0, 2000.0, 3000.0, 5000.0];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Preset {
    pub value: f64,
    pub label: String,
}

impl Preset {
    pub fn water(ml: f64) -> Self {
        let label = if ml >= 1000.0 && (ml % 1000.0) == 0.0 {
            format!("{}L ({}ml)", ml / 1000.0, ml)
        } else {
            format!("{ml}ml")
        };
        Self { value: ml, label }
    }

    pub fn dilution(ratio: f64) -> Self {
        Self {
            value: ratio,
            label: format!("{ratio}x"),
        }
    }
}

/// A preset drop-down paired with a free-form override field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldSelection {
    pub selected: String,
    #[serde(default)]
    pub custom: String,
}

impl FieldSelection {
    pub fn is_custom(&self) -> bool {
        self.selected.trim().eq_ignore_ascii_case(CUSTOM_SELECTION)
    }

    /// The text that actually carries the value.
    pub fn effective_text(&self) -> &str {
        if self.is_custom() {
            &self.custom
        } else {
            &self.selected
        }
    }

    pub fn resolve(&self) -> Option<f64> {
        parse_quantity(self.effective_text())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DosageChartRow {
    pub water_volume_ml: f64,
    pub dosages: Vec<(f64, Option<DosageResult>)>,
}

pub fn dosage_chart(waters_ml: &[f64], ratios: &[f64]) -> Vec<DosageChartRow> {
    waters_ml
        .iter()
        .map(|water| DosageChartRow {
            water_volume_ml: *water,
            dosages: ratios
                .iter()
                .map(|ratio| (*ratio, compute_dosage(*water, *ratio)))
                .collect(),
        })
        .collect()
}
