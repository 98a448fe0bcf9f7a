//! Per-strategy entry rules.
//!
//! The memecoin rule fuses launch metrics into a composite score; the
//! altcoin rule is a threshold test over the external indicator reading.
//! Both are pure functions so they test without any async plumbing.

use crate::domain::{EntrySignal, RiskAssessment};

/// Liquidity at or above this contributes full weight to the launch score.
const LAUNCH_LIQUIDITY_SATURATION_ETH: f64 = 0.05;
/// Holder count at or above this contributes full weight.
const LAUNCH_HOLDER_SATURATION: f64 = 200.0;
const LAUNCH_WEIGHT_LIQUIDITY: f64 = 0.4;
const LAUNCH_WEIGHT_HOLDERS: f64 = 0.3;
const LAUNCH_WEIGHT_SAFETY: f64 = 0.3;
/// Composite score a launch must reach to be sniped.
pub const LAUNCH_SCORE_MIN: f64 = 0.5;

/// Composite quality score for a fresh launch, in [0, 1].
pub fn launch_score(liquidity_eth: f64, holder_count: u64, assessment: &RiskAssessment) -> f64 {
    let liquidity = (liquidity_eth / LAUNCH_LIQUIDITY_SATURATION_ETH).clamp(0.0, 1.0);
    let holders = (holder_count as f64 / LAUNCH_HOLDER_SATURATION).clamp(0.0, 1.0);
    let safety = 1.0 - assessment.score;
    liquidity * LAUNCH_WEIGHT_LIQUIDITY
        + holders * LAUNCH_WEIGHT_HOLDERS
        + safety * LAUNCH_WEIGHT_SAFETY
}

/// Parameters for the altcoin swing entry rule.
#[derive(Debug, Clone, Copy)]
pub struct SwingEntryRule {
    pub rsi_entry_max: f64,
    pub min_volume_change_pct: f64,
}

impl SwingEntryRule {
    /// Oversold RSI, positive MACD momentum and a volume pickup together.
    pub fn is_met(&self, signal: &EntrySignal) -> bool {
        signal.rsi <= self.rsi_entry_max
            && signal.macd_histogram > 0.0
            && signal.volume_change_pct >= self.min_volume_change_pct
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CheckOutcome, RiskFactors, TokenAddress};

    fn assessment(score_factors: RiskFactors) -> RiskAssessment {
        let token = TokenAddress::new("0x00000000000000000000000000000000000000ff").unwrap();
        RiskAssessment::from_factors(token, score_factors)
    }

    fn clean_factors() -> RiskFactors {
        RiskFactors {
            honeypot: CheckOutcome::Clear,
            unverified: CheckOutcome::Clear,
            liquidity_below_min: false,
            holders_below_min: false,
        }
    }

    #[test]
    fn test_strong_launch_scores_high() {
        let score = launch_score(0.1, 500, &assessment(clean_factors()));
        // Saturated liquidity and holders, clean checks: perfect score.
        approx::assert_relative_eq!(score, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_partial_liquidity_scales_linearly() {
        // Half the liquidity saturation point contributes half its weight.
        let score = launch_score(0.025, 500, &assessment(clean_factors()));
        approx::assert_relative_eq!(score, 0.8, epsilon = 1e-9);
    }

    #[test]
    fn test_weak_launch_scores_below_threshold() {
        let factors = RiskFactors {
            unverified: CheckOutcome::Confirmed,
            holders_below_min: true,
            ..clean_factors()
        };
        let score = launch_score(0.012, 20, &assessment(factors));
        assert!(score < LAUNCH_SCORE_MIN);
    }

    #[test]
    fn test_swing_rule_requires_all_conditions() {
        let rule = SwingEntryRule {
            rsi_entry_max: 35.0,
            min_volume_change_pct: 20.0,
        };
        let good = EntrySignal {
            rsi: 28.0,
            macd_histogram: 0.2,
            volume_change_pct: 45.0,
        };
        assert!(rule.is_met(&good));
        assert!(!rule.is_met(&EntrySignal { rsi: 60.0, ..good }));
        assert!(!rule.is_met(&EntrySignal {
            macd_histogram: -0.1,
            ..good
        }));
        assert!(!rule.is_met(&EntrySignal {
            volume_change_pct: 5.0,
            ..good
        }));
    }
}
