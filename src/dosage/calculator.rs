use crate::dosage::presets::CUSTOM_SELECTION;
use crate::dosage::{DosageResult, DosageUnit};

/// Below this many millilitres the amount is reported in microlitres.
const MICROLITER_CUTOVER_ML: f64 = 0.1;
/// At or above this many millilitres two decimals are shown.
const FINE_PRECISION_CUTOVER_ML: f64 = 1.0;

pub fn compute_dosage(water_volume_ml: f64, dilution_ratio: f64) -> Option<DosageResult> {
    if !is_positive_finite(water_volume_ml) || !is_positive_finite(dilution_ratio) {
        return None;
    }
    let raw_ml = water_volume_ml / dilution_ratio;
    if !raw_ml.is_finite() {
        return None;
    }

    let result = if raw_ml < MICROLITER_CUTOVER_ML {
        DosageResult {
            amount: round_to(raw_ml * 1000.0, 1),
            unit: DosageUnit::Microliter,
            decimals: 1,
        }
    } else if raw_ml < FINE_PRECISION_CUTOVER_ML {
        DosageResult {
            amount: round_to(raw_ml, 1),
            unit: DosageUnit::Milliliter,
            decimals: 1,
        }
    } else {
        DosageResult {
            amount: round_to(raw_ml, 2),
            unit: DosageUnit::Milliliter,
            decimals: 2,
        }
    };
    result.amount.is_finite().then_some(result)
}

/// Same as [`compute_dosage`] but over the raw text of two form fields.
pub fn compute_dosage_from_fields(water: &str, ratio: &str) -> Option<DosageResult> {
    compute_dosage(parse_quantity(water)?, parse_quantity(ratio)?)
}

/// Reads the leading number of a form field: `"500"`, `"500ml"`, `" 1000x"`,
/// `"1e3"`.
///
/// Empty fields, the `custom` placeholder and text without a leading number
/// give `None`. An exponent only counts when it has digits, so `"2e"` is 2.
pub fn parse_quantity(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(CUSTOM_SELECTION) {
        return None;
    }
    let sanitized = trimmed.replace(',', "").replace('_', "");
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (idx, ch) in sanitized.char_indices() {
        match ch {
            '0'..='9' => {
                seen_digit = true;
                end = idx + 1;
            }
            '.' if !seen_dot => {
                seen_dot = true;
                end = idx + 1;
            }
            '+' | '-' if idx == 0 => end = 1,
            _ => break,
        }
    }
    if !seen_digit {
        return None;
    }
    end += exponent_len(&sanitized[end..]);
    sanitized[..end].parse::<f64>().ok()
}

/// Length of a well-formed `e[+-]digits` prefix, or 0.
fn exponent_len(rest: &str) -> usize {
    let bytes = rest.as_bytes();
    if !matches!(bytes.first(), Some(b'e' | b'E')) {
        return 0;
    }
    let mut idx = 1;
    if matches!(bytes.get(idx), Some(b'+' | b'-')) {
        idx += 1;
    }
    let digits = bytes[idx..].iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        0
    } else {
        idx + digits
    }
}

fn is_positive_finite(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Values too large to scale are already far past any displayed precision
/// and are returned as is.
fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}
