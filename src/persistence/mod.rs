//! Engine state persistence
//!
//! Crash recovery module that persists the ledger, live positions and the
//! blacklist to a JSON state file, enabling recovery after unexpected
//! shutdowns. The file is rewritten after every position or ledger change
//! and loaded once at startup before any loop starts.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    Blacklist, BlacklistEntry, Ledger, Position, PositionState, TokenAddress,
};

/// Default state file name
pub const DEFAULT_STATE_FILE: &str = "state.json";

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Failed to serialize state: {0}")]
    SerializationError(String),

    #[error("Failed to deserialize state: {0}")]
    DeserializationError(String),

    #[error("Failed to write state file: {0}")]
    WriteError(String),

    #[error("Failed to read state file: {0}")]
    ReadError(String),

    #[error("Failed to create directory: {0}")]
    DirectoryError(String),
}

/// Everything that must survive a restart.
#[derive(Debug, Serialize, Deserialize)]
pub struct EngineState {
    pub saved_at: DateTime<Utc>,
    pub ledger: Ledger,
    pub positions: Vec<Position>,
    pub blacklist: Vec<(TokenAddress, BlacklistEntry)>,
}

/// Recovery status after loading the state file
#[derive(Debug)]
pub enum RecoveryStatus {
    /// No state file: first run
    Fresh,
    /// State recovered successfully
    Recovered(EngineState),
    /// State file corrupted, manual intervention needed
    Corrupted(String),
}

impl EngineState {
    pub fn new(
        ledger: Ledger,
        positions: Vec<Position>,
        blacklist: Vec<(TokenAddress, BlacklistEntry)>,
    ) -> Self {
        Self {
            saved_at: Utc::now(),
            ledger,
            positions,
            blacklist,
        }
    }

    /// Reconcile in-flight work that cannot resume after a crash:
    /// unconfirmed entries fail, unconfirmed exits return to open, and
    /// whatever capital was merely reserved returns to available.
    pub fn normalize(&mut self) -> Result<(), crate::domain::LedgerError> {
        self.ledger.reconcile_after_restart()?;
        for position in &mut self.positions {
            match position.state {
                PositionState::Opening => position.state = PositionState::Failed,
                PositionState::Closing => {
                    position.state = PositionState::Open;
                    position.exit_reason = None;
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn blacklist_set(&self) -> Blacklist {
        let mut set = Blacklist::new();
        for (token, entry) in &self.blacklist {
            set.add(token.clone(), entry.reason);
        }
        set
    }

    /// Save state to disk. The write goes through a sibling temp file and
    /// rename so a crash mid-write never corrupts the previous snapshot.
    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| PersistError::DirectoryError(e.to_string()))?;
            }
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| PersistError::SerializationError(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| PersistError::WriteError(e.to_string()))?;
        fs::rename(&tmp, path).map_err(|e| PersistError::WriteError(e.to_string()))?;
        Ok(())
    }

    /// Load state from disk, distinguishing "no file" from "bad file".
    pub fn load(path: &Path) -> RecoveryStatus {
        if !path.exists() {
            return RecoveryStatus::Fresh;
        }
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => return RecoveryStatus::Corrupted(e.to_string()),
        };
        match serde_json::from_str::<EngineState>(&content) {
            Ok(state) => RecoveryStatus::Recovered(state),
            Err(e) => RecoveryStatus::Corrupted(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlacklistReason, StrategyId, Token};
    use rust_decimal_macros::dec;

    fn token(n: u8) -> Token {
        Token::unnamed(TokenAddress::new(&format!("0x{:040x}", n)).unwrap())
    }

    fn sample_state() -> EngineState {
        let mut ledger = Ledger::new(dec!(80), dec!(500));
        let mut open = Position::opening(token(1), StrategyId::Memecoin, dec!(8));
        let pid = open.id;
        let reservation = ledger.reserve(StrategyId::Memecoin, dec!(8)).unwrap();
        ledger.commit(&reservation, pid).unwrap();
        open.confirm_entry(0.001, 8000.0, "0xentry", 2.0, 0.7).unwrap();

        let mut blacklist = Blacklist::new();
        blacklist.add(token(9).address, BlacklistReason::Honeypot);
        let entries = blacklist
            .iter()
            .map(|(t, e)| (t.clone(), e.clone()))
            .collect();
        EngineState::new(ledger, vec![open], entries)
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = sample_state();
        state.save(&path).unwrap();

        let loaded = match EngineState::load(&path) {
            RecoveryStatus::Recovered(state) => state,
            other => panic!("unexpected status {other:?}"),
        };
        assert_eq!(loaded.positions.len(), 1);
        assert_eq!(loaded.positions[0].state, PositionState::Open);
        assert_eq!(
            loaded.ledger.account(StrategyId::Memecoin).allocated,
            dec!(8)
        );
        assert!(loaded.blacklist_set().contains(&token(9).address));
        loaded.ledger.verify().unwrap();
    }

    #[test]
    fn test_missing_file_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let status = EngineState::load(&dir.path().join("absent.json"));
        assert!(matches!(status, RecoveryStatus::Fresh));
    }

    #[test]
    fn test_corrupted_file_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        let status = EngineState::load(&path);
        assert!(matches!(status, RecoveryStatus::Corrupted(_)));
    }

    #[test]
    fn test_normalize_reconciles_inflight_work() {
        let mut ledger = Ledger::new(dec!(80), dec!(500));
        // Crash happened with $8 reserved and an Opening position.
        let _reservation = ledger.reserve(StrategyId::Memecoin, dec!(8)).unwrap();
        let opening = Position::opening(token(2), StrategyId::Memecoin, dec!(8));
        let mut state = EngineState::new(ledger, vec![opening], Vec::new());

        state.normalize().unwrap();
        assert_eq!(state.positions[0].state, PositionState::Failed);
        assert_eq!(
            state.ledger.account(StrategyId::Memecoin).available,
            dec!(80)
        );
        assert_eq!(
            state.ledger.account(StrategyId::Memecoin).reserved,
            dec!(0)
        );
    }
}
