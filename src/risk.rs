//! Risk classification
//!
//! Maps category scores to risk tiers and combines three tiers into an overall
//! tier. Scores are "higher is better": a high score is a low risk.

use crate::types::RiskTier;

/// Scores at or above this are low risk
pub const LOW_RISK_MIN_SCORE: f64 = 70.0;

/// Scores at or above this (and below the low threshold) are moderate risk
pub const MODERATE_RISK_MIN_SCORE: f64 = 40.0;

/// Classify a score in [0, 100] into a risk tier
pub fn classify_risk(score: f64) -> RiskTier {
    if score >= LOW_RISK_MIN_SCORE {
        RiskTier::Low
    } else if score >= MODERATE_RISK_MIN_SCORE {
        RiskTier::Moderate
    } else {
        RiskTier::High
    }
}

/// Combine per-category tiers into the overall tier.
///
/// Any high tier wins. Otherwise two or more moderate tiers, or one moderate
/// alongside two lows, give moderate. Only all-low gives low.
pub fn overall_risk(tiers: &[RiskTier; 3]) -> RiskTier {
    let count = |tier: RiskTier| tiers.iter().filter(|t| **t == tier).count();
    let high = count(RiskTier::High);
    let moderate = count(RiskTier::Moderate);
    let low = count(RiskTier::Low);

    if high >= 1 {
        RiskTier::High
    } else if moderate >= 2 || (moderate == 1 && low == 2) {
        RiskTier::Moderate
    } else {
        RiskTier::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RiskTier::*;

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(classify_risk(70.0), Low);
        assert_eq!(classify_risk(69.0), Moderate);
        assert_eq!(classify_risk(40.0), Moderate);
        assert_eq!(classify_risk(39.0), High);
    }

    #[test]
    fn test_extremes() {
        assert_eq!(classify_risk(100.0), Low);
        assert_eq!(classify_risk(0.0), High);
        assert_eq!(classify_risk(69.999), Moderate);
        assert_eq!(classify_risk(39.999), High);
    }

    #[test]
    fn test_classification_holds_across_range() {
        for tenth in 0..=1000 {
            let score = tenth as f64 / 10.0;
            let expected = if score >= 70.0 {
                Low
            } else if score < 40.0 {
                High
            } else {
                Moderate
            };
            assert_eq!(classify_risk(score), expected, "score {score}");
        }
    }

    #[test]
    fn test_overall_table() {
        assert_eq!(overall_risk(&[Low, Low, Low]), Low);
        assert_eq!(overall_risk(&[Moderate, Moderate, Low]), Moderate);
        assert_eq!(overall_risk(&[Low, Moderate, Low]), Moderate);
        assert_eq!(overall_risk(&[High, Low, Low]), High);
        assert_eq!(overall_risk(&[Moderate, Moderate, Moderate]), Moderate);
        assert_eq!(overall_risk(&[Low, Low, High]), High);
    }

    #[test]
    fn test_single_moderate_is_order_independent() {
        assert_eq!(overall_risk(&[Moderate, Low, Low]), Moderate);
        assert_eq!(overall_risk(&[Low, Moderate, Low]), Moderate);
        assert_eq!(overall_risk(&[Low, Low, Moderate]), Moderate);
    }
}
