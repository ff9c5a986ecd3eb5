//! Capability registry: the single source of truth for what is live.

mod table;

pub use table::{
    CapabilityRegistry, FileRegistration, RegisteredCapability, RegistryDelta, SharedRegistry,
};
