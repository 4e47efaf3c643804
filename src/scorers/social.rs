use super::{falloff_score, qualifying, HeuristicScorer};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::types::{Category, Detection, ScoreOutcome};

/// Score given to a lone person, with nobody to interact with
const SINGLE_PERSON_SCORE: f64 = 50.0;

/// Scores proximity between the two most prominent people in frame
#[derive(Debug, Clone)]
pub struct SocialReciprocityScorer {
    confidence_threshold: f64,
    distance_scale: f64,
}

impl SocialReciprocityScorer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            distance_scale: config.social_distance_scale,
        }
    }
}

impl Default for SocialReciprocityScorer {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl HeuristicScorer for SocialReciprocityScorer {
    fn category(&self) -> Category {
        Category::SocialReciprocity
    }

    fn score(&mut self, detections: &[Detection]) -> Result<ScoreOutcome, AnalysisError> {
        let persons = qualifying(
            self.category(),
            detections,
            &["person"],
            self.confidence_threshold,
        )?;

        let score = match persons.as_slice() {
            [] => return Ok(ScoreOutcome::zero()),
            [_] => SINGLE_PERSON_SCORE,
            [first, second, ..] => {
                let (x1, y1) = first.bbox.center();
                let (x2, y2) = second.bbox.center();
                let distance = ((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt();
                falloff_score(distance, self.distance_scale)
            }
        };

        Ok(ScoreOutcome::new(score, persons))
    }
}
