//! CLI Adapter
//!
//! Clap command definitions for the `basehound` binary.

mod commands;

pub use commands::{
    BlacklistCmd, BuyCmd, CliApp, Command, PositionsCmd, RunCmd, SellCmd, StatusCmd,
};
