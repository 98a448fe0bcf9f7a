//! Core domain model: tokens, orders, positions, capital, and risk.
//!
//! Pure types and state machines with no I/O. Everything that touches the
//! chain or an external service lives behind the ports in `crate::ports`.

pub mod blacklist;
pub mod events;
pub mod ledger;
pub mod order;
pub mod position;
pub mod risk;
pub mod token;

pub use blacklist::{Blacklist, BlacklistEntry, BlacklistReason, SharedBlacklist};
pub use events::{ChainEvent, EntrySignal, LaunchEvent, SignalEvent};
pub use ledger::{CapitalAccount, Ledger, LedgerError, PnlRecord, Reservation, SharedLedger};
pub use order::{Fill, OrderId, Side, StrategyId, TradeOrder};
pub use position::{ExitReason, Position, PositionError, PositionId, PositionState};
pub use risk::{CheckOutcome, RiskAssessment, RiskFactors};
pub use token::{Token, TokenAddress, TokenError, TokenSnapshot};
