use super::{qualifying, HeuristicScorer};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::types::{BoundingBox, Category, Detection, ScoreOutcome};
use std::collections::VecDeque;

/// Score for a patterned (repeating) displacement sequence
const REPETITIVE_SCORE: f64 = 70.0;

/// Score when movement is present but not patterned
const NON_REPETITIVE_SCORE: f64 = 30.0;

/// Consecutive displacements closer than this count as the same pattern
const PATTERN_TOLERANCE: f64 = 10.0;

/// The earlier displacement must exceed this for movement to count
const MIN_MOVEMENT: f64 = 5.0;

/// Prior frames needed before a classification is attempted
const REQUIRED_HISTORY: usize = 3;

/// Detects repeating motion from the primary person's box across frames.
///
/// Keeps a rolling history of the primary person box from previous frames.
/// Once three are available, the L1 displacement of the top-left corner
/// between consecutive boxes gives `[d1, d2]`; the motion is repetitive when
/// `|d2 - d1| < 10` and `d1 > 5`.
#[derive(Debug, Clone)]
pub struct RepetitiveMovementScorer {
    confidence_threshold: f64,
    history: VecDeque<BoundingBox>,
    history_len: usize,
}

impl RepetitiveMovementScorer {
    pub fn new(config: &AnalysisConfig) -> Self {
        let history_len = config.motion_history_len.max(REQUIRED_HISTORY);
        Self {
            confidence_threshold: config.confidence_threshold,
            history: VecDeque::with_capacity(history_len),
            history_len,
        }
    }

    /// Number of prior frames currently retained
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn classify(&self) -> f64 {
        let skip = self.history.len().saturating_sub(REQUIRED_HISTORY);
        let recent: Vec<&BoundingBox> = self.history.iter().skip(skip).collect();
        let displacements: Vec<f64> = recent
            .windows(2)
            .map(|pair| (pair[1].xmin - pair[0].xmin).abs() + (pair[1].ymin - pair[0].ymin).abs())
            .collect();

        match displacements.as_slice() {
            [earlier, latest] if (latest - earlier).abs() < PATTERN_TOLERANCE && *earlier > MIN_MOVEMENT => {
                REPETITIVE_SCORE
            }
            _ => NON_REPETITIVE_SCORE,
        }
    }

    fn remember(&mut self, bbox: BoundingBox) {
        self.history.push_back(bbox);
        while self.history.len() > self.history_len {
            self.history.pop_front();
        }
    }
}

impl Default for RepetitiveMovementScorer {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl HeuristicScorer for RepetitiveMovementScorer {
    fn category(&self) -> Category {
        Category::RepetitiveMovement
    }

    fn score(&mut self, detections: &[Detection]) -> Result<ScoreOutcome, AnalysisError> {
        let persons = qualifying(
            self.category(),
            detections,
            &["person"],
            self.confidence_threshold,
        )?;

        let Some(primary) = persons.first().map(|d| d.bbox) else {
            return Ok(ScoreOutcome::zero());
        };

        let outcome = if self.history.is_empty() {
            ScoreOutcome::zero()
        } else if self.history.len() < REQUIRED_HISTORY {
            ScoreOutcome::new(0.0, persons)
        } else {
            ScoreOutcome::new(self.classify(), persons)
        };

        self.remember(primary);
        Ok(outcome)
    }

    fn reset(&mut self) {
        self.history.clear();
    }
}
