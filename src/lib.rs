//! tooldeck: hot-reloading capability host
//!
//! Exposes a directory of capability files (description, input schema and an
//! executable behavior) to a protocol client, and keeps the exposed set in
//! sync with the filesystem as files are added, edited or removed.

pub mod adapter;
pub mod capability;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod registry;
pub mod reload;
pub mod server;
pub mod sink;
pub mod tooling;
pub mod types;
pub mod watch;

pub use adapter::{CapabilityAdapter, ExecutionContext, ResponseEnvelope};
pub use error::{ApiError, BehaviorError, LoadError};
pub use host::CapabilityHost;
pub use registry::{CapabilityRegistry, SharedRegistry};
pub use reload::{ReloadController, ReloadOutcome};
pub use sink::{CapabilitySink, ExposedCapability, MemorySink};
