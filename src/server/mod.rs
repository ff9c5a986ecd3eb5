//! stdio protocol server exposing capabilities as tools.

pub mod protocol;
mod session;

pub use session::{Outbound, StdioServer};
