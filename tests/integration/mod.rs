//! Integration tests for tooldeck

mod cli_contracts;
mod demos;
mod hot_reload;
mod support;
