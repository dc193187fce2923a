use crate::records::{PestDiseaseRecord, ReferenceData};
use crate::season::{active_risks_for_month, Month, MonthWindow};
use crate::treatment::ranking::{apply_species_restrictions, rank_treatments};
use crate::treatment::{ActiveRisk, Disclaimer, MonthlyRiskView, SeasonalOutlook};

/// Species risk links active in `month`, most probable first.
///
/// A link's own month bounds take precedence over the pest/disease window
/// when both are set. Links pointing at unknown pests/diseases are skipped.
pub fn species_risks_for_month(
    data: &ReferenceData,
    species_id: u64,
    month: Month,
) -> Vec<ActiveRisk> {
    let mut risks = Vec::new();
    for link in data.risks_for_species(species_id) {
        let Some(record) = data.pest_disease(link.pest_disease_id) else {
            continue;
        };
        let window = MonthWindow::from_bounds(link.start_month, link.end_month)
            .or_else(|| record.window());
        if !window.is_some_and(|w| w.contains(month)) {
            continue;
        }
        if risks
            .iter()
            .any(|r: &ActiveRisk| r.record.id == record.id)
        {
            continue;
        }
        risks.push(ActiveRisk {
            record: record.clone(),
            occurrence_probability: Some(link.occurrence_probability),
        });
    }
    risks.sort_by(|a, b| b.occurrence_probability.cmp(&a.occurrence_probability));
    risks
}

/// Risks and ranked treatments for one month.
///
/// With a species the species risk table and its pesticide restrictions
/// apply; without one every pest/disease active that month is considered.
pub fn build_monthly_view(
    data: &ReferenceData,
    species_id: Option<u64>,
    month: Month,
) -> MonthlyRiskView {
    let active_risks = match species_id {
        Some(id) => species_risks_for_month(data, id, month),
        None => active_risks_for_month(&data.pest_diseases, month)
            .into_iter()
            .map(|record| ActiveRisk {
                record,
                occurrence_probability: None,
            })
            .collect(),
    };

    let records: Vec<PestDiseaseRecord> = active_risks.iter().map(|r| r.record.clone()).collect();
    let mut ranked_treatments = rank_treatments(&records, &data.effectiveness, &data.pesticides);
    if let Some(id) = species_id {
        ranked_treatments =
            apply_species_restrictions(ranked_treatments, data.restrictions_for_species(id));
    }

    MonthlyRiskView {
        month,
        season: month.season(),
        active_risks,
        ranked_treatments,
    }
}

pub fn build_outlook(data: &ReferenceData, species_id: Option<u64>, month: Month) -> SeasonalOutlook {
    SeasonalOutlook {
        species_id,
        current: build_monthly_view(data, species_id, month),
        next: build_monthly_view(data, species_id, month.next()),
        disclaimer: Disclaimer::default(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::records::*;

    pub fn reference_data() -> ReferenceData {
        ReferenceData {
            species: vec![SpeciesRecord {
                id: 1,
                name: "Japanese black pine".to_string(),
                scientific_name: Some("Pinus thunbergii".to_string()),
                category: Some("conifer".to_string()),
                description: None,
                care_notes: None,
            }],
            pesticides: vec![
                PesticideRecord {
                    id: 1,
                    name: "Orthene".to_string(),
                    kind: PesticideKind::Insecticide,
                    interval_days: 14,
                    active_ingredient: Some("acephate".to_string()),
                    description: None,
                },
                PesticideRecord {
                    id: 2,
                    name: "Sumithion".to_string(),
                    kind: PesticideKind::Insecticide,
                    interval_days: 7,
                    active_ingredient: Some("fenitrothion".to_string()),
                    description: None,
                },
                PesticideRecord {
                    id: 3,
                    name: "Topsin M".to_string(),
                    kind: PesticideKind::Fungicide,
                    interval_days: 10,
                    active_ingredient: Some("thiophanate-methyl".to_string()),
                    description: None,
                },
            ],
            pest_diseases: vec![
                PestDiseaseRecord {
                    id: 1,
                    name: "Aphid".to_string(),
                    kind: PestDiseaseKind::Pest,
                    start_month: Some(4),
                    end_month: Some(10),
                    description: None,
                },
                PestDiseaseRecord {
                    id: 2,
                    name: "Pine needle blight".to_string(),
                    kind: PestDiseaseKind::Disease,
                    start_month: Some(6),
                    end_month: Some(9),
                    description: None,
                },
                PestDiseaseRecord {
                    id: 3,
                    name: "Scale".to_string(),
                    kind: PestDiseaseKind::Pest,
                    start_month: Some(11),
                    end_month: Some(2),
                    description: None,
                },
                PestDiseaseRecord {
                    id: 4,
                    name: "Unscheduled".to_string(),
                    kind: PestDiseaseKind::Pest,
                    start_month: None,
                    end_month: None,
                    description: None,
                },
            ],
            effectiveness: vec![
                EffectivenessRecord {
                    id: Some(1),
                    pesticide_id: 1,
                    pest_disease_id: 1,
                    level: 4,
                    notes: None,
                },
                EffectivenessRecord {
                    id: Some(2),
                    pesticide_id: 2,
                    pest_disease_id: 1,
                    level: 4,
                    notes: None,
                },
                EffectivenessRecord {
                    id: Some(3),
                    pesticide_id: 1,
                    pest_disease_id: 3,
                    level: 5,
                    notes: None,
                },
                EffectivenessRecord {
                    id: Some(4),
                    pesticide_id: 3,
                    pest_disease_id: 2,
                    level: 3,
                    notes: None,
                },
            ],
            species_risks: vec![
                SpeciesRiskRecord {
                    id: Some(1),
                    species_id: 1,
                    pest_disease_id: 1,
                    occurrence_probability: 2,
                    start_month: None,
                    end_month: None,
                    notes: None,
                },
                SpeciesRiskRecord {
                    id: Some(2),
                    species_id: 1,
                    pest_disease_id: 2,
                    occurrence_probability: 5,
                    start_month: Some(5),
                    end_month: Some(9),
                    notes: None,
                },
            ],
            prohibited: vec![ProhibitedPesticideRecord {
                id: Some(1),
                species_id: 1,
                pesticide_id: 2,
                severity: Severity::Warning,
                reason: Some("may discolour new candles".to_string()),
                notes: None,
            }],
        }
    }
}
