//! Position tracking and lifecycle management.

pub mod book;
pub mod manager;

pub use book::{PositionBook, SharedPositionBook};
pub use manager::{ManagerSettings, PositionManager};
