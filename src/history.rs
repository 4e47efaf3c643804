//! Per-session score history
//!
//! Append-only, per-category score sequences accumulated by the sampling loop
//! for one session. The aggregator reduces them into the final report.

use crate::types::{clamp_score, Category, ScoreSample};
use serde::{Deserialize, Serialize};

/// Score samples for one session, one ordered sequence per category
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreHistory {
    eye_contact: Vec<ScoreSample>,
    repetitive_movements: Vec<ScoreSample>,
    social_reciprocity: Vec<ScoreSample>,
    /// Frames recorded so far; the next frame's index
    frames_recorded: u64,
}

impl ScoreHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sampled frame's three scores. Returns the frame index.
    ///
    /// Scores are clamped into [0, 100] on entry.
    pub fn record_frame(
        &mut self,
        timestamp: f64,
        eye_contact: f64,
        repetitive_movements: f64,
        social_reciprocity: f64,
    ) -> u64 {
        let frame_index = self.frames_recorded;
        let sample = |category, score| ScoreSample {
            category,
            frame_index,
            timestamp,
            score: clamp_score(score),
        };

        self.eye_contact.push(sample(Category::EyeContact, eye_contact));
        self.repetitive_movements
            .push(sample(Category::RepetitiveMovement, repetitive_movements));
        self.social_reciprocity
            .push(sample(Category::SocialReciprocity, social_reciprocity));

        self.frames_recorded += 1;
        frame_index
    }

    pub fn samples(&self, category: Category) -> &[ScoreSample] {
        match category {
            Category::EyeContact => &self.eye_contact,
            Category::RepetitiveMovement => &self.repetitive_movements,
            Category::SocialReciprocity => &self.social_reciprocity,
        }
    }

    /// Bare score values for one category, in arrival order
    pub fn scores(&self, category: Category) -> Vec<f64> {
        self.samples(category).iter().map(|s| s.score).collect()
    }

    /// Number of frames recorded
    pub fn frame_count(&self) -> usize {
        self.frames_recorded as usize
    }

    pub fn is_empty(&self) -> bool {
        self.frames_recorded == 0
    }

    pub fn clear(&mut self) {
        self.eye_contact.clear();
        self.repetitive_movements.clear();
        self.social_reciprocity.clear();
        self.frames_recorded = 0;
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
