//! Trait seams between the trading core and the outside world.
//!
//! The core depends only on these traits; concrete chain, venue, oracle and
//! notification implementations live in `crate::adapters`.

pub mod chain_feed;
pub mod dex;
pub mod indicator;
pub mod mocks;
pub mod notifier;
pub mod security;

pub use chain_feed::{ChainFeed, ChainFeedError, FeedEvent};
pub use dex::{DexAdapter, DexError, Quote, SwapBounds};
pub use indicator::{IndicatorError, IndicatorReading, IndicatorSource};
pub use notifier::{Notifier, NotifierError, NotifierEvent};
pub use security::{OracleError, SecurityOracle};
