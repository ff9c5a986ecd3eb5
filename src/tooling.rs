//! Tooling layer: the command-line surface over the capability host.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
