use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::records::{
    EffectivenessRecord, PestDiseaseRecord, PesticideRecord, ProhibitedPesticideRecord, Severity,
};
use crate::treatment::RankedTreatment;

/// Ranks pesticides by their mean effectiveness against the active risks.
///
/// Pesticides with no usable link to any active risk are left out. Ties on
/// effectiveness go to the shorter `interval_days`, then to input order.
pub fn rank_treatments(
    active_risks: &[PestDiseaseRecord],
    effectiveness: &[EffectivenessRecord],
    pesticides: &[PesticideRecord],
) -> Vec<RankedTreatment> {
    if active_risks.is_empty() {
        return Vec::new();
    }
    let risk_position: BTreeMap<u64, usize> = active_risks
        .iter()
        .enumerate()
        .map(|(idx, risk)| (risk.id, idx))
        .collect();

    let mut ranked = Vec::new();
    for pesticide in pesticides {
        let mut total = 0i64;
        let mut count = 0i64;
        let mut addressed: Vec<usize> = Vec::new();
        for link in effectiveness {
            if link.pesticide_id != pesticide.id || !link.has_valid_level() {
                continue;
            }
            let Some(position) = risk_position.get(&link.pest_disease_id) else {
                continue;
            };
            total += link.level;
            count += 1;
            if !addressed.contains(position) {
                addressed.push(*position);
            }
        }
        if count == 0 {
            continue;
        }
        addressed.sort_unstable();
        ranked.push(RankedTreatment {
            pesticide: pesticide.clone(),
            kind: pesticide.kind,
            avg_effectiveness: total as f64 / count as f64,
            targets: addressed
                .into_iter()
                .map(|idx| active_risks[idx].name.clone())
                .collect(),
            warning: None,
        });
    }

    ranked.sort_by(compare_ranked);
    ranked
}

fn compare_ranked(a: &RankedTreatment, b: &RankedTreatment) -> Ordering {
    b.avg_effectiveness
        .total_cmp(&a.avg_effectiveness)
        .then_with(|| a.pesticide.interval_days.cmp(&b.pesticide.interval_days))
}

/// Drops pesticides prohibited for one species and annotates the ones that
/// only carry a warning. `restrictions` are that species' rows, as given by
/// [`crate::records::ReferenceData::restrictions_for_species`].
pub fn apply_species_restrictions<'a>(
    ranked: Vec<RankedTreatment>,
    restrictions: impl IntoIterator<Item = &'a ProhibitedPesticideRecord>,
) -> Vec<RankedTreatment> {
    let restrictions: Vec<&ProhibitedPesticideRecord> = restrictions.into_iter().collect();
    ranked
        .into_iter()
        .filter_map(|mut treatment| {
            let mut matching = restrictions
                .iter()
                .filter(|r| r.pesticide_id == treatment.pesticide.id)
                .peekable();
            if matching.peek().is_none() {
                return Some(treatment);
            }
            let mut warnings = Vec::new();
            for restriction in matching {
                match restriction.severity {
                    Severity::Prohibited => return None,
                    Severity::Warning => warnings.push(
                        restriction
                            .reason
                            .clone()
                            .unwrap_or_else(|| "use with caution on this species".to_string()),
                    ),
                }
            }
            treatment.warning = Some(warnings.join("; "));
            Some(treatment)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{PestDiseaseKind, PesticideKind, ReferenceData};

    fn risk(id: u64, name: &str) -> PestDiseaseRecord {
        PestDiseaseRecord {
            id,
            name: name.to_string(),
            kind: PestDiseaseKind::Pest,
            start_month: Some(1),
            end_month: Some(12),
            description: None,
        }
    }

    fn pesticide(id: u64, name: &str, kind: PesticideKind, interval_days: u32) -> PesticideRecord {
        PesticideRecord {
            id,
            name: name.to_string(),
            kind,
            interval_days,
            active_ingredient: None,
            description: None,
        }
    }

    fn link(pesticide_id: u64, pest_disease_id: u64, level: i64) -> EffectivenessRecord {
        EffectivenessRecord {
            id: None,
            pesticide_id,
            pest_disease_id,
            level,
            notes: None,
        }
    }

    #[test]
    fn empty_active_risks_recommend_nothing() {
        let pesticides = vec![pesticide(1, "Orthene", PesticideKind::Insecticide, 14)];
        let links = vec![link(1, 1, 5)];
        assert!(rank_treatments(&[], &links, &pesticides).is_empty());
    }

    #[test]
    fn averages_levels_across_active_risks_only() {
        let active = vec![risk(1, "Aphid"), risk(2, "Scale")];
        let pesticides = vec![pesticide(10, "Sumithion", PesticideKind::Insecticide, 10)];
        let links = vec![link(10, 1, 5), link(10, 2, 3), link(10, 99, 1)];
        let ranked = rank_treatments(&active, &links, &pesticides);
        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].avg_effectiveness - 4.0).abs() < 1e-9);
        assert_eq!(ranked[0].targets, vec!["Aphid".to_string(), "Scale".to_string()]);
        assert_eq!(ranked[0].kind, PesticideKind::Insecticide);
    }

    #[test]
    fn pesticides_without_links_are_excluded() {
        let active = vec![risk(1, "Aphid")];
        let pesticides = vec![
            pesticide(10, "Linked", PesticideKind::Insecticide, 10),
            pesticide(11, "Unlinked", PesticideKind::Insecticide, 10),
        ];
        let links = vec![link(10, 1, 2), link(11, 42, 5)];
        let ranked = rank_treatments(&active, &links, &pesticides);
        assert_eq!(
            ranked.iter().map(|r| r.pesticide.id).collect::<Vec<_>>(),
            vec![10]
        );
    }

    #[test]
    fn equal_effectiveness_prefers_shorter_interval() {
        let active = vec![risk(1, "Powdery mildew")];
        let pesticides = vec![
            pesticide(1, "Fortnightly", PesticideKind::Fungicide, 14),
            pesticide(2, "Weekly", PesticideKind::Fungicide, 7),
        ];
        let links = vec![link(1, 1, 4), link(2, 1, 4)];
        let ranked = rank_treatments(&active, &links, &pesticides);
        assert_eq!(ranked[0].pesticide.interval_days, 7);
        assert_eq!(ranked[1].pesticide.interval_days, 14);
    }

    #[test]
    fn higher_effectiveness_wins_over_interval() {
        let active = vec![risk(1, "Aphid")];
        let pesticides = vec![
            pesticide(1, "Weekly", PesticideKind::Insecticide, 7),
            pesticide(2, "Strong", PesticideKind::Insecticide, 30),
        ];
        let links = vec![link(1, 1, 2), link(2, 1, 5)];
        let ranked = rank_treatments(&active, &links, &pesticides);
        assert_eq!(ranked[0].pesticide.name, "Strong");
    }

    #[test]
    fn out_of_range_levels_are_ignored() {
        let active = vec![risk(1, "Aphid")];
        let pesticides = vec![pesticide(1, "Orthene", PesticideKind::Insecticide, 14)];
        let links = vec![link(1, 1, 9), link(1, 1, 0), link(1, 1, 3)];
        let ranked = rank_treatments(&active, &links, &pesticides);
        assert!((ranked[0].avg_effectiveness - 3.0).abs() < 1e-9);

        let only_bad = vec![link(1, 1, 7)];
        assert!(rank_treatments(&active, &only_bad, &pesticides).is_empty());
    }

    #[test]
    fn species_restrictions_drop_or_annotate() {
        let active = vec![risk(1, "Aphid")];
        let pesticides = vec![
            pesticide(1, "Banned", PesticideKind::Insecticide, 14),
            pesticide(2, "Careful", PesticideKind::Insecticide, 14),
            pesticide(3, "Fine", PesticideKind::Insecticide, 14),
        ];
        let links = vec![link(1, 1, 5), link(2, 1, 4), link(3, 1, 3)];
        let restrictions = vec![
            ProhibitedPesticideRecord {
                id: None,
                species_id: 7,
                pesticide_id: 1,
                severity: Severity::Prohibited,
                reason: Some("leaf burn".to_string()),
                notes: None,
            },
            ProhibitedPesticideRecord {
                id: None,
                species_id: 7,
                pesticide_id: 2,
                severity: Severity::Warning,
                reason: Some("test on one branch first".to_string()),
                notes: None,
            },
            ProhibitedPesticideRecord {
                id: None,
                species_id: 8,
                pesticide_id: 3,
                severity: Severity::Prohibited,
                reason: None,
                notes: None,
            },
        ];
        let data = ReferenceData {
            prohibited: restrictions,
            ..ReferenceData::default()
        };
        let ranked = rank_treatments(&active, &links, &pesticides);
        let filtered = apply_species_restrictions(ranked, data.restrictions_for_species(7));
        assert_eq!(
            filtered.iter().map(|r| r.pesticide.name.as_str()).collect::<Vec<_>>(),
            vec!["Careful", "Fine"]
        );
        assert_eq!(filtered[0].warning.as_deref(), Some("test on one branch first"));
        assert_eq!(filtered[1].warning, None);
    }
}
