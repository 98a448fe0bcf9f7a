//! Token blacklist shared by both strategies.
//!
//! Tokens land here on confirmed honeypots, repeated sell failures, or by
//! operator command. Membership is checked first in every entry evaluation
//! and is persisted across restarts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::token::TokenAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlacklistReason {
    Honeypot,
    VerificationFailed,
    RugPull,
    Manual,
}

impl std::fmt::Display for BlacklistReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Honeypot => write!(f, "honeypot confirmed"),
            Self::VerificationFailed => write!(f, "verification failed"),
            Self::RugPull => write!(f, "rug pull"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub reason: BlacklistReason,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Blacklist {
    entries: HashMap<TokenAddress, BlacklistEntry>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the token was newly added.
    pub fn add(&mut self, token: TokenAddress, reason: BlacklistReason) -> bool {
        if self.entries.contains_key(&token) {
            return false;
        }
        self.entries.insert(
            token,
            BlacklistEntry {
                reason,
                added_at: Utc::now(),
            },
        );
        true
    }

    pub fn remove(&mut self, token: &TokenAddress) -> bool {
        self.entries.remove(token).is_some()
    }

    pub fn contains(&self, token: &TokenAddress) -> bool {
        self.entries.contains_key(token)
    }

    pub fn entry(&self, token: &TokenAddress) -> Option<&BlacklistEntry> {
        self.entries.get(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TokenAddress, &BlacklistEntry)> {
        self.entries.iter()
    }
}

/// Blacklist behind an async rwlock; reads vastly outnumber writes.
#[derive(Debug, Clone, Default)]
pub struct SharedBlacklist {
    inner: Arc<tokio::sync::RwLock<Blacklist>>,
}

impl SharedBlacklist {
    pub fn new(blacklist: Blacklist) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(blacklist)),
        }
    }

    pub async fn contains(&self, token: &TokenAddress) -> bool {
        self.inner.read().await.contains(token)
    }

    pub async fn add(&self, token: TokenAddress, reason: BlacklistReason) -> bool {
        self.inner.write().await.add(token, reason)
    }

    pub async fn remove(&self, token: &TokenAddress) -> bool {
        self.inner.write().await.remove(token)
    }

    pub async fn snapshot(&self) -> Vec<(TokenAddress, BlacklistEntry)> {
        self.inner
            .read()
            .await
            .iter()
            .map(|(t, e)| (t.clone(), e.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: char) -> TokenAddress {
        TokenAddress::new(&format!("0x{}{}", "ab".repeat(19) + "a", last)).unwrap()
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut bl = Blacklist::new();
        assert!(bl.add(addr('1'), BlacklistReason::Honeypot));
        assert!(!bl.add(addr('1'), BlacklistReason::Manual));
        // First reason wins.
        assert_eq!(
            bl.entry(&addr('1')).unwrap().reason,
            BlacklistReason::Honeypot
        );
    }

    #[test]
    fn test_remove() {
        let mut bl = Blacklist::new();
        bl.add(addr('2'), BlacklistReason::Manual);
        assert!(bl.remove(&addr('2')));
        assert!(!bl.contains(&addr('2')));
        assert!(!bl.remove(&addr('2')));
    }
}
