//! Shared position registry.
//!
//! The position manager drives transitions; the evaluator only reads it
//! (no re-entry while a token already has a live position), and the
//! orchestrator snapshots it for status display and persistence.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Position, PositionId, StrategyId, TokenAddress};

#[derive(Debug, Default)]
pub struct PositionBook {
    positions: HashMap<PositionId, Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, position: Position) {
        self.positions.insert(position.id, position);
    }

    pub fn get(&self, id: &PositionId) -> Option<&Position> {
        self.positions.get(id)
    }

    pub fn get_mut(&mut self, id: &PositionId) -> Option<&mut Position> {
        self.positions.get_mut(id)
    }

    pub fn has_live_for(&self, token: &TokenAddress) -> bool {
        self.positions
            .values()
            .any(|p| p.is_live() && p.token.address == *token)
    }

    pub fn live(&self) -> impl Iterator<Item = &Position> {
        self.positions.values().filter(|p| p.is_live())
    }

    pub fn live_for_strategy(&self, strategy: StrategyId) -> Vec<Position> {
        self.positions
            .values()
            .filter(|p| p.is_live() && p.strategy == strategy)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Position> {
        self.positions.values().cloned().collect()
    }

    /// Drop closed/failed positions, keeping live ones. Returns the pruned.
    pub fn prune_terminal(&mut self) -> Vec<Position> {
        let terminal: Vec<PositionId> = self
            .positions
            .values()
            .filter(|p| !p.is_live())
            .map(|p| p.id)
            .collect();
        terminal
            .into_iter()
            .filter_map(|id| self.positions.remove(&id))
            .collect()
    }
}

/// Book behind an async rwlock.
#[derive(Debug, Clone, Default)]
pub struct SharedPositionBook {
    inner: Arc<tokio::sync::RwLock<PositionBook>>,
}

impl SharedPositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, position: Position) {
        self.inner.write().await.insert(position);
    }

    pub async fn has_live_for(&self, token: &TokenAddress) -> bool {
        self.inner.read().await.has_live_for(token)
    }

    pub async fn snapshot(&self) -> Vec<Position> {
        self.inner.read().await.all()
    }

    pub async fn live(&self) -> Vec<Position> {
        self.inner.read().await.live().cloned().collect()
    }

    pub async fn with_book<T>(&self, f: impl FnOnce(&PositionBook) -> T) -> T {
        f(&*self.inner.read().await)
    }

    pub async fn with_book_mut<T>(&self, f: impl FnOnce(&mut PositionBook) -> T) -> T {
        f(&mut *self.inner.write().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Token;
    use rust_decimal_macros::dec;

    fn token(n: u8) -> TokenAddress {
        TokenAddress::new(&format!("0x{:040x}", n)).unwrap()
    }

    #[test]
    fn test_has_live_for_matches_by_address() {
        let mut book = PositionBook::new();
        book.insert(Position::opening(
            Token::unnamed(token(1)),
            StrategyId::Memecoin,
            dec!(8),
        ));
        assert!(book.has_live_for(&token(1)));
        assert!(!book.has_live_for(&token(2)));
    }

    #[test]
    fn test_terminal_positions_are_not_live() {
        let mut book = PositionBook::new();
        let mut position =
            Position::opening(Token::unnamed(token(1)), StrategyId::Memecoin, dec!(8));
        position.fail_entry().unwrap();
        let id = position.id;
        book.insert(position);
        assert!(!book.has_live_for(&token(1)));
        let pruned = book.prune_terminal();
        assert_eq!(pruned.len(), 1);
        assert!(book.get(&id).is_none());
    }
}
