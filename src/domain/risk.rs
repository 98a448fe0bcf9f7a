//! Risk assessment model.
//!
//! The score is a clamped sum of fixed penalties over independent factors,
//! with one override: a confirmed honeypot forces the maximum score no
//! matter how healthy the other factors look. An unknown honeypot outcome
//! (check timed out or errored) is penalized rather than ignored, so the
//! check fails closed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::token::TokenAddress;

/// Per-factor penalties, summed then clamped to [0, 1].
pub const PENALTY_UNVERIFIED: f64 = 0.2;
pub const PENALTY_LOW_LIQUIDITY: f64 = 0.3;
pub const PENALTY_FEW_HOLDERS: f64 = 0.2;
pub const PENALTY_HONEYPOT_UNKNOWN: f64 = 0.25;

/// Three-valued outcome of a security check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    /// The risk condition was positively confirmed.
    Confirmed,
    /// The check completed and found nothing.
    Clear,
    /// The check timed out or errored; treated as elevated risk.
    Unknown,
}

/// Raw factor flags feeding the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub honeypot: CheckOutcome,
    /// Confirmed means the contract source is NOT verified.
    pub unverified: CheckOutcome,
    pub liquidity_below_min: bool,
    pub holders_below_min: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub token: TokenAddress,
    pub score: f64,
    pub factors: RiskFactors,
    pub assessed_at: DateTime<Utc>,
}

impl RiskAssessment {
    pub fn from_factors(token: TokenAddress, factors: RiskFactors) -> Self {
        let score = match factors.honeypot {
            // Override, not a weight: a confirmed scam is never diluted by
            // good holder or liquidity metrics.
            CheckOutcome::Confirmed => 1.0,
            honeypot => {
                let mut s = 0.0;
                if honeypot == CheckOutcome::Unknown {
                    s += PENALTY_HONEYPOT_UNKNOWN;
                }
                match factors.unverified {
                    CheckOutcome::Clear => {}
                    // Unverified source and an unreachable explorer carry
                    // the same penalty.
                    CheckOutcome::Confirmed | CheckOutcome::Unknown => s += PENALTY_UNVERIFIED,
                }
                if factors.liquidity_below_min {
                    s += PENALTY_LOW_LIQUIDITY;
                }
                if factors.holders_below_min {
                    s += PENALTY_FEW_HOLDERS;
                }
                s.min(1.0)
            }
        };
        Self {
            token,
            score,
            factors,
            assessed_at: Utc::now(),
        }
    }

    pub fn is_honeypot(&self) -> bool {
        self.factors.honeypot == CheckOutcome::Confirmed
    }

    /// Number of checks that neither confirmed nor cleared.
    pub fn unknown_checks(&self) -> usize {
        [self.factors.honeypot, self.factors.unverified]
            .iter()
            .filter(|o| **o == CheckOutcome::Unknown)
            .count()
    }

    pub fn age_secs(&self) -> i64 {
        (Utc::now() - self.assessed_at).num_seconds()
    }
}
