//! Filesystem watching for the capability directory.
//!
//! Raw notify events are filtered, collapsed into a pending set, and drained
//! into reload batches once the directory has been quiet for the debounce
//! window.

mod events;
mod notifier;
mod runtime;

pub use events::{
    compile_ignore_pattern, default_ignore_patterns, ChangeFilter, PendingChangeSet, WatchConfig,
};
pub use notifier::Notifier;
pub use runtime::{BatchReport, ChangeScheduler, SchedulerHandle};
