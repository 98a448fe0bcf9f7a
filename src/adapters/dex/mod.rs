//! DEX Adapters
//!
//! Venue adapters for the v2-style routers on Base and the ABI calldata
//! codec they share.

pub mod calldata;
pub mod router;

pub use router::{build_venues, RouterAdapter, VenueSpec, USDC_ADDRESS};
