//! Command-line interface for Gantry

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
