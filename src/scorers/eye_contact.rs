use super::{qualifying, HeuristicScorer};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::types::{Category, Detection, ScoreOutcome};

const EYE_CONTACT_LABELS: [&str; 2] = ["person", "face"];

/// Scores how close the primary person/face is to the frame center.
///
/// The first candidate in detector order is the primary one; detectors
/// typically emit boxes sorted by confidence. Distance from the center is
/// normalized by the half-width and half-height of the reference frame, so a
/// box centered on a corner scores 0.
#[derive(Debug, Clone)]
pub struct EyeContactScorer {
    confidence_threshold: f64,
    frame_width: f64,
    frame_height: f64,
}

impl EyeContactScorer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            frame_width: config.reference_width,
            frame_height: config.reference_height,
        }
    }
}

impl Default for EyeContactScorer {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl HeuristicScorer for EyeContactScorer {
    fn category(&self) -> Category {
        Category::EyeContact
    }

    fn score(&mut self, detections: &[Detection]) -> Result<ScoreOutcome, AnalysisError> {
        let faces = qualifying(
            self.category(),
            detections,
            &EYE_CONTACT_LABELS,
            self.confidence_threshold,
        )?;

        let Some(primary) = faces.first() else {
            return Ok(ScoreOutcome::zero());
        };

        let (cx, cy) = primary.bbox.center();
        let half_w = self.frame_width / 2.0;
        let half_h = self.frame_height / 2.0;
        let distance = (((cx - half_w) / half_w).powi(2) + ((cy - half_h) / half_h).powi(2)).sqrt();

        let score = (100.0 * (1.0 - distance)).clamp(0.0, 100.0);
        Ok(ScoreOutcome::new(score, faces))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorers::test_support::det;

    #[test]
    fn test_centered_face_scores_100() {
        let mut scorer = EyeContactScorer::default();
        let outcome = scorer.score(&[det("face", 0.9, 270.0, 190.0, 370.0, 290.0)]).unwrap();
        assert_eq!(outcome.score, 100.0);
        assert_eq!(outcome.contributing.len(), 1);
    }

    #[test]
    fn test_corner_face_scores_0() {
        let mut scorer = EyeContactScorer::default();
        let outcome = scorer.score(&[det("person", 0.9, 0.0, 0.0, 0.0, 0.0)]).unwrap();
        assert_eq!(outcome.score, 0.0);
        // Still contributes a marker candidate
        assert_eq!(outcome.contributing.len(), 1);
    }

    #[test]
    fn test_half_way_to_edge() {
        let mut scorer = EyeContactScorer::default();
        // Center at (480, 240): normalized distance 0.5
        let outcome = scorer.score(&[det("face", 0.9, 430.0, 190.0, 530.0, 290.0)]).unwrap();
        assert!((outcome.score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_low_confidence_ignored() {
        let mut scorer = EyeContactScorer::default();
        let outcome = scorer.score(&[det("face", 0.7, 270.0, 190.0, 370.0, 290.0)]).unwrap();
        assert_eq!(outcome, ScoreOutcome::zero());
    }

    #[test]
    fn test_uses_first_candidate_in_detector_order() {
        let mut scorer = EyeContactScorer::default();
        let outcome = scorer
            .score(&[
                det("person", 0.75, 0.0, 0.0, 0.0, 0.0),
                det("face", 0.99, 270.0, 190.0, 370.0, 290.0),
            ])
            .unwrap();
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.contributing.len(), 2);
    }

    #[test]
    fn test_respects_reference_frame() {
        let config = AnalysisConfig::default().with_reference_frame(1280.0, 720.0);
        let mut scorer = EyeContactScorer::new(&config);
        let outcome = scorer.score(&[det("face", 0.9, 590.0, 310.0, 690.0, 410.0)]).unwrap();
        assert_eq!(outcome.score, 100.0);
    }
}
