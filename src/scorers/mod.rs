//! Heuristic scorers
//!
//! Each scorer turns one frame's detections into a score in [0, 100] and the
//! detections that contributed to it:
//!
//! - **Eye contact**: how centered the first person/face box is
//! - **Repetitive movement**: whether recent person-box displacements repeat
//! - **Social reciprocity**: how close the first two person boxes are
//!
//! Scorers return `Result`, but the sampling loop only ever calls them through
//! [`score_soft`], which turns any fault into a zero score for that frame.

mod eye_contact;
mod repetitive;
mod social;

pub use eye_contact::EyeContactScorer;
pub use repetitive::RepetitiveMovementScorer;
pub use social::SocialReciprocityScorer;

use crate::error::AnalysisError;
use crate::types::{Category, Detection, ScoreOutcome};

/// Trait for per-frame heuristic scorers
pub trait HeuristicScorer {
    /// Category this scorer measures
    fn category(&self) -> Category;

    /// Score the current frame's detections
    fn score(&mut self, detections: &[Detection]) -> Result<ScoreOutcome, AnalysisError>;

    /// Drop any cross-frame state
    fn reset(&mut self) {}
}

/// Run a scorer, converting any fault into [`ScoreOutcome::zero`]
pub fn score_soft<S: HeuristicScorer + ?Sized>(scorer: &mut S, detections: &[Detection]) -> ScoreOutcome {
    match scorer.score(detections) {
        Ok(outcome) => outcome,
        Err(e) => {
            log::warn!("{} scorer failed, scoring frame as 0: {}", scorer.category(), e);
            ScoreOutcome::zero()
        }
    }
}

/// Detections whose label matches one of `labels` and whose confidence is
/// strictly above `threshold`, in detector order.
///
/// A label match with a non-finite box or confidence is a scorer fault.
pub(crate) fn qualifying(
    category: Category,
    detections: &[Detection],
    labels: &[&str],
    threshold: f64,
) -> Result<Vec<Detection>, AnalysisError> {
    let mut out = Vec::new();
    for det in detections {
        if !labels.iter().any(|l| det.has_label(l)) {
            continue;
        }
        if !det.is_finite() {
            return Err(AnalysisError::ScorerFault {
                category: category.to_string(),
                reason: format!("non-finite detection for label '{}'", det.label),
            });
        }
        if det.score > threshold {
            out.push(det.clone());
        }
    }
    Ok(out)
}

/// Linear falloff: 100 at distance 0, 0 at `scale` and beyond
pub(crate) fn falloff_score(distance: f64, scale: f64) -> f64 {
    (100.0 * (1.0 - distance / scale)).clamp(0.0, 100.0)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::types::{BoundingBox, Detection};

    pub fn det(label: &str, score: f64, xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Detection {
        Detection::new(label, score, BoundingBox::new(xmin, ymin, xmax, ymax))
    }

    /// Confident person box with its top-left corner at (x, y)
    pub fn person_at(x: f64, y: f64) -> Detection {
        det("person", 0.95, x, y, x + 100.0, y + 200.0)
    }
}
