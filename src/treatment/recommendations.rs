use chrono::NaiveDate;

use crate::records::{PesticideKind, PesticideLogRecord};
use crate::treatment::{
    Confidence, MonthlyRiskView, RankedTreatment, RecommendationSummary, TreatmentRecommendation,
};

/// Best insecticide and best fungicide for the month.
///
/// `logs` are the past applications on the same tree; when the recommended
/// product was used recently the summary says how long to wait.
pub fn summarize_recommendations(
    view: &MonthlyRiskView,
    logs: &[PesticideLogRecord],
    today: NaiveDate,
) -> RecommendationSummary {
    RecommendationSummary {
        month: view.month,
        insecticide: recommend_kind(view, PesticideKind::Insecticide, logs, today),
        fungicide: recommend_kind(view, PesticideKind::Fungicide, logs, today),
    }
}

fn recommend_kind(
    view: &MonthlyRiskView,
    kind: PesticideKind,
    logs: &[PesticideLogRecord],
    today: NaiveDate,
) -> TreatmentRecommendation {
    let Some(best) = view.ranked_treatments.iter().find(|t| t.kind == kind) else {
        return TreatmentRecommendation {
            kind,
            pesticide_name: None,
            avg_effectiveness: None,
            interval_days: None,
            confidence: Confidence::Low,
            reason: format!("no {kind} is linked to the risks active in {}", view.month),
            wait_days: None,
            warning: None,
        };
    };

    let wait_days = reapplication_wait_days(
        logs,
        &best.pesticide.name,
        best.pesticide.interval_days,
        today,
    );
    TreatmentRecommendation {
        kind,
        pesticide_name: Some(best.pesticide.name.clone()),
        avg_effectiveness: Some(best.avg_effectiveness),
        interval_days: Some(best.pesticide.interval_days),
        confidence: Confidence::from_effectiveness(best.avg_effectiveness),
        reason: reason_line(best),
        wait_days,
        warning: best.warning.clone(),
    }
}

fn reason_line(treatment: &RankedTreatment) -> String {
    format!(
        "targets {} (avg effectiveness {:.1}/5)",
        treatment.targets.join(", "),
        treatment.avg_effectiveness
    )
}

/// Days until `pesticide_name` may be applied again, or `None` when there is
/// no dated application of it in `logs`. Zero means it is due.
pub fn reapplication_wait_days(
    logs: &[PesticideLogRecord],
    pesticide_name: &str,
    interval_days: u32,
    today: NaiveDate,
) -> Option<i64> {
    let needle = pesticide_name.trim();
    let last = logs
        .iter()
        .filter(|log| log.pesticide_name.trim().eq_ignore_ascii_case(needle))
        .filter_map(|log| parse_usage_date(&log.usage_date))
        .filter(|date| *date <= today)
        .max()?;
    let elapsed = (today - last).num_days();
    Some((i64::from(interval_days) - elapsed).max(0))
}

fn parse_usage_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::season::Month;
    use crate::treatment::monthly::build_monthly_view;
    use crate::treatment::monthly::fixtures::reference_data;

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    fn log(id: u64, name: &str, usage_date: &str) -> PesticideLogRecord {
        PesticideLogRecord {
            id,
            bonsai_id: Some(1),
            bonsai_name: None,
            pesticide_name: name.to_string(),
            usage_date: usage_date.to_string(),
            dosage: None,
            water_amount: None,
            dilution_ratio: None,
            notes: None,
        }
    }

    #[test]
    fn picks_best_of_each_kind_with_confidence() {
        let data = reference_data();
        let view = build_monthly_view(&data, Some(1), Month::new(7).expect("month"));
        let summary = summarize_recommendations(&view, &[], date("2024-07-10"));
        assert_eq!(summary.insecticide.pesticide_name.as_deref(), Some("Sumithion"));
        assert_eq!(summary.insecticide.confidence, Confidence::High);
        assert_eq!(summary.insecticide.interval_days, Some(7));
        assert!(summary.insecticide.warning.is_some());
        assert_eq!(summary.fungicide.pesticide_name.as_deref(), Some("Topsin M"));
        assert_eq!(summary.fungicide.confidence, Confidence::Medium);
        assert_eq!(summary.fungicide.wait_days, None);
    }

    #[test]
    fn missing_kind_yields_low_confidence_placeholder() {
        let data = reference_data();
        let view = build_monthly_view(&data, None, Month::JANUARY);
        let summary = summarize_recommendations(&view, &[], date("2024-01-10"));
        assert_eq!(summary.fungicide.pesticide_name, None);
        assert_eq!(summary.fungicide.confidence, Confidence::Low);
        assert!(summary.fungicide.reason.contains("fungicide"));
    }

    #[test]
    fn wait_days_count_from_latest_application() {
        let logs = vec![
            log(1, "Sumithion", "2024-06-01"),
            log(2, "sumithion", "2024-07-05T09:30:00"),
            log(3, "Orthene", "2024-07-09"),
            log(4, "Sumithion", "not a date"),
        ];
        let today = date("2024-07-08");
        assert_eq!(reapplication_wait_days(&logs, "Sumithion", 7, today), Some(4));
        assert_eq!(reapplication_wait_days(&logs, "Sumithion", 2, today), Some(0));
        assert_eq!(reapplication_wait_days(&logs, "Topsin M", 10, today), None);
        // applications dated after today are ignored
        assert_eq!(reapplication_wait_days(&logs, "Orthene", 14, today), None);
    }

    #[test]
    fn confidence_thresholds() {
        assert_eq!(Confidence::from_effectiveness(4.0), Confidence::High);
        assert_eq!(Confidence::from_effectiveness(3.5), Confidence::Medium);
        assert_eq!(Confidence::from_effectiveness(2.9), Confidence::Low);
    }
}
