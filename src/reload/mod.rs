//! Reload pipeline for individual capability files.

mod controller;

pub use controller::{ReloadController, ReloadOutcome, Reloader};
