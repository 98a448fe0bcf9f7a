//! Order execution: venue routing, nonce serialization, and the capital
//! choreography around fills.

pub mod lifecycle;
pub mod nonce;
pub mod router;

pub use lifecycle::{ExitParams, LifecycleError, LifecycleSettings, TradeLifecycle};
pub use nonce::{NonceError, NonceManager, WalletChain};
pub use router::{ExecutionError, ExecutionRouter, RouterSettings};
