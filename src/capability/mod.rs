//! Capability descriptors and the loader that produces them from files.

mod behavior;
pub mod descriptor;
pub mod loader;
pub mod schema;

pub use descriptor::{
    is_capability_descriptor, Behavior, CapabilityDescriptor, CommandSpec, OutputMode,
    TemplateSpec,
};
pub use loader::{
    has_recognized_extension, is_supported_extension, recognized_extensions, LoadOutcome,
    LoadedModule, ModuleLoader, DEFAULT_EXTENSIONS,
};
pub use schema::InputShape;
