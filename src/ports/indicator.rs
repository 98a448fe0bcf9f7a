use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{EntrySignal, TokenAddress};

#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Indicator service error: {0}")]
    Service(String),

    #[error("No data for {0}")]
    NoData(TokenAddress),
}

/// Latest indicator state for a token, with the price it was computed at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorReading {
    pub signal: EntrySignal,
    pub price_usd: f64,
}

/// External technical-analysis collaborator. The indicator math itself is
/// out of scope; this port only consumes its latest readings.
#[async_trait]
pub trait IndicatorSource: Send + Sync {
    async fn latest_reading(
        &self,
        token: &TokenAddress,
    ) -> Result<Option<IndicatorReading>, IndicatorError>;
}
