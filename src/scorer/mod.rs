//! Security Risk Scorer
//!
//! Fuses external oracle checks and local snapshot thresholds into a
//! bounded [`RiskAssessment`]. Oracle checks run concurrently under
//! independent timeouts and fail closed: a timeout or transport error is
//! `CheckOutcome::Unknown` and penalized, never treated as safe.
//!
//! A confirmed honeypot scores 1.0 and blacklists the token immediately,
//! so neither strategy ever re-evaluates it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{
    BlacklistReason, CheckOutcome, RiskAssessment, RiskFactors, SharedBlacklist, TokenAddress,
    TokenSnapshot,
};
use crate::ports::SecurityOracle;

pub struct ScorerSettings {
    pub min_liquidity_eth: f64,
    pub min_holders: u64,
    pub check_timeout: Duration,
    pub assessment_ttl: Duration,
}

pub struct RiskScorer {
    oracle: Arc<dyn SecurityOracle>,
    blacklist: SharedBlacklist,
    settings: ScorerSettings,
    cache: Mutex<HashMap<TokenAddress, RiskAssessment>>,
}

impl RiskScorer {
    pub fn new(
        oracle: Arc<dyn SecurityOracle>,
        blacklist: SharedBlacklist,
        settings: ScorerSettings,
    ) -> Self {
        Self {
            oracle,
            blacklist,
            settings,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Assess a token. Returns a cached assessment when one younger than
    /// the TTL exists; otherwise runs the full check set.
    pub async fn assess(&self, token: &TokenAddress, snapshot: &TokenSnapshot) -> RiskAssessment {
        if let Some(cached) = self.cached(token).await {
            debug!(token = %token, score = cached.score, "risk cache hit");
            return cached;
        }

        let (honeypot, unverified) = tokio::join!(
            self.run_check("honeypot", self.oracle.check_honeypot(token)),
            self.verification_outcome(token, snapshot),
        );

        let factors = RiskFactors {
            honeypot,
            unverified,
            liquidity_below_min: snapshot.liquidity_eth < self.settings.min_liquidity_eth,
            holders_below_min: snapshot.holder_count < self.settings.min_holders,
        };
        let assessment = RiskAssessment::from_factors(token.clone(), factors);

        if assessment.is_honeypot() {
            warn!(token = %token, "honeypot confirmed, blacklisting");
            self.blacklist
                .add(token.clone(), BlacklistReason::Honeypot)
                .await;
        }

        debug!(
            token = %token,
            score = assessment.score,
            ?factors,
            "risk assessed"
        );
        self.cache
            .lock()
            .await
            .insert(token.clone(), assessment.clone());
        assessment
    }

    async fn cached(&self, token: &TokenAddress) -> Option<RiskAssessment> {
        let cache = self.cache.lock().await;
        cache
            .get(token)
            .filter(|a| a.age_secs() < self.settings.assessment_ttl.as_secs() as i64)
            .cloned()
    }

    /// The snapshot may already carry a verification flag from the feed;
    /// only fall back to the explorer oracle when it does not.
    async fn verification_outcome(
        &self,
        token: &TokenAddress,
        snapshot: &TokenSnapshot,
    ) -> CheckOutcome {
        match snapshot.verified {
            Some(true) => CheckOutcome::Clear,
            Some(false) => CheckOutcome::Confirmed,
            None => {
                self.run_check("verification", self.oracle.check_verified(token))
                    .await
            }
        }
    }

    async fn run_check(
        &self,
        name: &str,
        check: impl std::future::Future<Output = Result<CheckOutcome, crate::ports::OracleError>>,
    ) -> CheckOutcome {
        match tokio::time::timeout(self.settings.check_timeout, check).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                warn!(check = name, %err, "security check failed, treating as unknown");
                CheckOutcome::Unknown
            }
            Err(_) => {
                warn!(check = name, "security check timed out, treating as unknown");
                CheckOutcome::Unknown
            }
        }
    }
}
