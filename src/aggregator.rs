//! Score aggregation
//!
//! Reduces a session's per-frame score history into the final categorical
//! report.

use crate::risk::{classify_risk, overall_risk};
use crate::types::{AnalysisReport, CategoryResult, Marker};
use chrono::Utc;

/// Mean used for a category with no samples
pub const EMPTY_CATEGORY_SCORE: f64 = 50.0;

/// Aggregate per-category score sequences and markers into a report.
///
/// Each category's mean is classified before rounding, so a mean of 69.6 is
/// reported as 70 with a moderate tier.
pub fn aggregate(
    eye_contact: &[f64],
    repetitive_movements: &[f64],
    social_reciprocity: &[f64],
    markers: Vec<Marker>,
) -> AnalysisReport {
    let eye = category_result(eye_contact);
    let repetitive = category_result(repetitive_movements);
    let social = category_result(social_reciprocity);

    let overall = overall_risk(&[eye.risk, repetitive.risk, social.risk]);
    let samples_analyzed = eye_contact
        .len()
        .max(repetitive_movements.len())
        .max(social_reciprocity.len());

    AnalysisReport {
        session_id: None,
        eye_contact: eye,
        repetitive_movements: repetitive,
        social_reciprocity: social,
        overall_risk: overall,
        detected_markers: markers,
        samples_analyzed,
        generated_at: Utc::now(),
    }
}

fn category_result(scores: &[f64]) -> CategoryResult {
    let avg = mean(scores).unwrap_or(EMPTY_CATEGORY_SCORE);
    CategoryResult {
        score: avg.round(),
        risk: classify_risk(avg),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RiskTier;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_end_to_end_scenario() {
        let report = aggregate(&[80.0, 90.0], &[20.0, 30.0], &[60.0, 55.0], Vec::new());

        assert_eq!(
            report.eye_contact,
            CategoryResult {
                score: 85.0,
                risk: RiskTier::Low
            }
        );
        assert_eq!(
            report.repetitive_movements,
            CategoryResult {
                score: 25.0,
                risk: RiskTier::High
            }
        );
        assert_eq!(
            report.social_reciprocity,
            CategoryResult {
                score: 58.0,
                risk: RiskTier::Moderate
            }
        );
        assert_eq!(report.overall_risk, RiskTier::High);
        assert_eq!(report.samples_analyzed, 2);
    }

    #[test]
    fn test_empty_sequences_default_to_50() {
        let report = aggregate(&[], &[], &[], Vec::new());

        assert_eq!(report.eye_contact.score, 50.0);
        assert_eq!(report.repetitive_movements.score, 50.0);
        assert_eq!(report.social_reciprocity.score, 50.0);
        // Three moderates
        assert_eq!(report.overall_risk, RiskTier::Moderate);
        assert_eq!(report.samples_analyzed, 0);
    }

    #[test]
    fn test_all_low() {
        let report = aggregate(&[90.0], &[70.0], &[100.0], Vec::new());
        assert_eq!(report.overall_risk, RiskTier::Low);
    }

    #[test]
    fn test_classifies_before_rounding() {
        let report = aggregate(&[69.6], &[39.6], &[80.0], Vec::new());

        assert_eq!(report.eye_contact.score, 70.0);
        assert_eq!(report.eye_contact.risk, RiskTier::Moderate);
        assert_eq!(report.repetitive_movements.score, 40.0);
        assert_eq!(report.repetitive_movements.risk, RiskTier::High);
    }

    #[test]
    fn test_markers_carried_through() {
        let marker = Marker {
            id: "eye-contact-a".to_string(),
            category: crate::types::Category::EyeContact,
            x: 1.0,
            y: 2.0,
            size: 40.0,
            timestamp: 0.0,
            duration: 3.0,
        };
        let report = aggregate(&[75.0], &[75.0], &[75.0], vec![marker.clone()]);
        assert_eq!(report.detected_markers, vec![marker]);
    }
}
