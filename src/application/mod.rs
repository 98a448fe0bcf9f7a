//! Application Layer
//!
//! The orchestrator that wires monitor, scorer, evaluator, router and
//! position manager into a running engine, plus its command surface.

pub mod orchestrator;

pub use orchestrator::{
    CommandError, EngineStatus, Orchestrator, OrchestratorError, StrategyHandle,
};
