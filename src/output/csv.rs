use anyhow::Result;
use serde_json::Value;

use crate::dosage::DosageChartRow;
use crate::output::table::{master_cell, master_columns};
use crate::records::{PesticideLogRecord, WorkLogRecord};
use crate::treatment::{MonthlyRiskView, RecommendationSummary};

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn chart_to_csv(rows: &[DosageChartRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["water_ml", "dilution_ratio", "amount", "unit", "display"])?;
    for row in rows {
        for (ratio, result) in &row.dosages {
            let (amount, unit, display) = match result {
                Some(r) => (
                    format!("{:.*}", r.decimals, r.amount),
                    r.unit.to_string(),
                    r.to_string(),
                ),
                None => (String::new(), String::new(), String::new()),
            };
            writer.write_record([
                row.water_volume_ml.to_string(),
                ratio.to_string(),
                amount,
                unit,
                display,
            ])?;
        }
    }
    finish(writer)
}

pub fn treatments_to_csv(view: &MonthlyRiskView, top: usize) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "month",
        "rank",
        "pesticide",
        "type",
        "avg_effectiveness",
        "interval_days",
        "targets",
        "warning",
    ])?;
    for (idx, t) in view.ranked_treatments.iter().take(top).enumerate() {
        writer.write_record([
            view.month.number().to_string(),
            (idx + 1).to_string(),
            t.pesticide.name.clone(),
            t.kind.to_string(),
            format!("{:.4}", t.avg_effectiveness),
            t.pesticide.interval_days.to_string(),
            t.targets.join("; "),
            t.warning.clone().unwrap_or_default(),
        ])?;
    }
    finish(writer)
}

pub fn recommendations_to_csv(summary: &RecommendationSummary) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "month",
        "kind",
        "pesticide",
        "confidence",
        "avg_effectiveness",
        "interval_days",
        "wait_days",
        "reason",
    ])?;
    for rec in [&summary.insecticide, &summary.fungicide] {
        writer.write_record([
            summary.month.number().to_string(),
            rec.kind.to_string(),
            rec.pesticide_name.clone().unwrap_or_default(),
            format!("{:?}", rec.confidence).to_lowercase(),
            rec.avg_effectiveness
                .map(|v| format!("{v:.4}"))
                .unwrap_or_default(),
            rec.interval_days.map(|d| d.to_string()).unwrap_or_default(),
            rec.wait_days.map(|d| d.to_string()).unwrap_or_default(),
            rec.reason.clone(),
        ])?;
    }
    finish(writer)
}

pub fn logs_to_csv(logs: &[PesticideLogRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "id",
        "usage_date",
        "bonsai_id",
        "pesticide_name",
        "dosage",
        "water_amount",
        "dilution_ratio",
        "notes",
    ])?;
    for log in logs {
        writer.write_record([
            log.id.to_string(),
            log.usage_date.clone(),
            log.bonsai_id.map(|id| id.to_string()).unwrap_or_default(),
            log.pesticide_name.clone(),
            log.dosage.clone().unwrap_or_default(),
            log.water_amount.clone().unwrap_or_default(),
            log.dilution_ratio.clone().unwrap_or_default(),
            log.notes.clone().unwrap_or_default(),
        ])?;
    }
    finish(writer)
}

pub fn work_logs_to_csv(logs: &[WorkLogRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "id",
        "date",
        "bonsai_id",
        "work_type",
        "duration_min",
        "description",
        "notes",
    ])?;
    for log in logs {
        writer.write_record([
            log.id.to_string(),
            log.date.clone(),
            log.bonsai_id.map(|id| id.to_string()).unwrap_or_default(),
            log.work_type.clone(),
            log.duration.map(|d| d.to_string()).unwrap_or_default(),
            log.description.clone().unwrap_or_default(),
            log.notes.clone().unwrap_or_default(),
        ])?;
    }
    finish(writer)
}

pub fn master_to_csv(rows: &[Value]) -> Result<String> {
    let columns = master_columns(rows);
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(&columns)?;
    for row in rows {
        writer.write_record(columns.iter().map(|c| master_cell(row.get(c))))?;
    }
    finish(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dosage::dosage_chart;

    #[test]
    fn chart_csv_leaves_uncomputable_cells_blank() {
        let rows = dosage_chart(&[500.0], &[1000.0, 0.0]);
        let out = chart_to_csv(&rows).expect("csv");
        let lines = out.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "water_ml,dilution_ratio,amount,unit,display");
        assert_eq!(lines[1], "500,1000,0.5,ml,0.5ml");
        assert_eq!(lines[2], "500,0,,,");
    }

    #[test]
    fn work_log_csv_has_one_line_per_log() {
        let logs = vec![WorkLogRecord {
            id: 1,
            bonsai_id: Some(10),
            date: "2024-02-18".to_string(),
            work_type: "Repotting".to_string(),
            description: Some("moved to a shallower pot".to_string()),
            notes: None,
            duration: Some(90),
            created_at: None,
        }];
        let out = work_logs_to_csv(&logs).expect("csv");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "1,2024-02-18,10,Repotting,90,moved to a shallower pot,");
    }

    #[test]
    fn master_csv_quotes_embedded_commas() {
        let rows = vec![serde_json::json!({ "id": 1, "notes": "spray early, avoid sun" })];
        let out = master_to_csv(&rows).expect("csv");
        assert!(out.contains("\"spray early, avoid sun\""));
    }
}
