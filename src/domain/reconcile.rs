//! Mapping of backend machine labels onto catalog ids.

use tracing::{debug, warn};

use crate::domain::catalog::MachineCatalog;
use crate::domain::IdentificationCandidate;

/// Minimum similarity for a fuzzy label match.
pub const MIN_MATCH_SCORE: f64 = 0.65;

/// Below this match score a reconciled label cannot auto-navigate.
pub const FIRM_MATCH_SCORE: f64 = 0.9;

/// Confidence cap applied to labels matched with a score below [`FIRM_MATCH_SCORE`].
pub const FUZZY_CONFIDENCE_CAP: f64 = 0.6;

/// Score given when one normalized label contains the other.
const CONTAINMENT_SCORE: f64 = 0.95;

/// A label as returned by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCandidate {
    pub label: String,
    pub confidence: f64,
}

impl RemoteCandidate {
    pub fn new(label: impl Into<String>, confidence: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// A catalog machine matched to a label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMatch {
    pub machine_id: String,
    /// 1.0 for an exact match.
    pub score: f64,
}

/// Lowercase, replace non-alphanumerics with spaces, collapse whitespace.
pub fn normalize_label(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Find the catalog machine a label refers to.
pub fn match_label(catalog: &MachineCatalog, label: &str) -> Option<LabelMatch> {
    let wanted = normalize_label(label);
    if wanted.is_empty() {
        return None;
    }

    let mut best: Option<LabelMatch> = None;

    for machine in catalog.iter() {
        for known in machine.labels() {
            let known = normalize_label(known);
            if known.is_empty() {
                continue;
            }

            if known == wanted {
                return Some(LabelMatch {
                    machine_id: machine.id.clone(),
                    score: 1.0,
                });
            }

            let mut score = strsim::normalized_levenshtein(&wanted, &known);
            if known.contains(&wanted) || wanted.contains(&known) {
                score = score.max(CONTAINMENT_SCORE);
            }

            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(LabelMatch {
                    machine_id: machine.id.clone(),
                    score,
                });
            }
        }
    }

    best.filter(|b| b.score >= MIN_MATCH_SCORE)
}

/// Turn backend labels into catalog candidates, highest confidence first.
///
/// Unknown labels are dropped; a machine named twice keeps its first entry.
/// Equal confidences keep the backend's order.
pub fn reconcile_candidates(
    catalog: &MachineCatalog,
    remote: &[RemoteCandidate],
) -> Vec<IdentificationCandidate> {
    let mut candidates: Vec<IdentificationCandidate> = Vec::with_capacity(remote.len());

    for entry in remote {
        let Some(matched) = match_label(catalog, &entry.label) else {
            warn!(label = %entry.label, "Backend label does not match any catalog machine");
            continue;
        };

        if candidates.iter().any(|c| c.machine_id == matched.machine_id) {
            continue;
        }

        let mut confidence = entry.confidence.clamp(0.0, 1.0);
        if matched.score < FIRM_MATCH_SCORE {
            confidence = confidence.min(FUZZY_CONFIDENCE_CAP);
        }

        if matched.score < 1.0 {
            debug!(
                label = %entry.label,
                machine_id = %matched.machine_id,
                score = matched.score,
                "Backend label normalized"
            );
        }

        candidates.push(IdentificationCandidate::new(matched.machine_id, confidence));
    }

    // Vec::sort_by is stable.
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::tests::sample_catalog;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Seated-Leg   PRESS!! "), "seated leg press");
        assert_eq!(normalize_label("---"), "");
    }

    #[test]
    fn test_exact_matches_on_id_name_and_keyword() {
        let catalog = sample_catalog();
        assert_eq!(match_label(&catalog, "leg-press").unwrap().machine_id, "leg-press");
        assert_eq!(match_label(&catalog, "Seated Leg Press").unwrap().score, 1.0);
        assert_eq!(match_label(&catalog, "Leg Sled").unwrap().machine_id, "leg-press");
    }

    #[test]
    fn test_containment_match() {
        let catalog = sample_catalog();
        let matched = match_label(&catalog, "Lat Pulldown Machine").unwrap();
        assert_eq!(matched.machine_id, "lat-pulldown");
        assert!(matched.score >= 0.95);
    }

    #[test]
    fn test_unknown_label_rejected() {
        let catalog = sample_catalog();
        assert!(match_label(&catalog, "Unknown").is_none());
        assert!(match_label(&catalog, "").is_none());
    }

    #[test]
    fn test_reconcile_sorts_and_drops_unknown() {
        let catalog = sample_catalog();
        let remote = vec![
            RemoteCandidate::new("chest-press", 0.40),
            RemoteCandidate::new("Smith Machine Squat Rack Deluxe", 0.95),
            RemoteCandidate::new("leg-press", 0.82),
        ];
        let candidates = reconcile_candidates(&catalog, &remote);
        assert_eq!(
            candidates,
            vec![
                IdentificationCandidate::new("leg-press", 0.82),
                IdentificationCandidate::new("chest-press", 0.40),
            ]
        );
    }

    #[test]
    fn test_reconcile_keeps_backend_order_on_ties() {
        let catalog = sample_catalog();
        let remote = vec![
            RemoteCandidate::new("treadmill", 0.7),
            RemoteCandidate::new("lat-pulldown", 0.7),
            RemoteCandidate::new("chest-press", 0.7),
        ];
        let ids: Vec<_> = reconcile_candidates(&catalog, &remote)
            .into_iter()
            .map(|c| c.machine_id)
            .collect();
        assert_eq!(ids, vec!["treadmill", "lat-pulldown", "chest-press"]);
    }

    #[test]
    fn test_reconcile_deduplicates_and_clamps() {
        let catalog = sample_catalog();
        let remote = vec![
            RemoteCandidate::new("Treadmill", 1.4),
            RemoteCandidate::new("treadmill", 0.3),
        ];
        let candidates = reconcile_candidates(&catalog, &remote);
        assert_eq!(candidates, vec![IdentificationCandidate::new("treadmill", 1.0)]);
    }

    #[test]
    fn test_fuzzy_match_caps_confidence() {
        let catalog = sample_catalog();
        // One letter short of "treadmill", and not a substring of it.
        let remote = vec![RemoteCandidate::new("Tredmill", 0.9)];
        let candidates = reconcile_candidates(&catalog, &remote);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].machine_id, "treadmill");
        assert!(candidates[0].confidence <= FUZZY_CONFIDENCE_CAP);
    }
}
