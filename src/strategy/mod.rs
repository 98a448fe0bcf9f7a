//! Opportunity evaluation: entry rules and the event-to-order pipeline.

pub mod evaluator;
pub mod rules;

pub use evaluator::{Evaluator, EvaluatorSettings, Rejection, SizedOrder, Verdict};
pub use rules::{launch_score, SwingEntryRule, LAUNCH_SCORE_MIN};
