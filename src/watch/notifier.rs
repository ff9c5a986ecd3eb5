//! Batch completion notifier.

use super::runtime::BatchReport;
use crate::sink::CapabilitySink;
use std::sync::Arc;
use tracing::{info, warn};

/// Announces "capability list changed" once per non-empty batch.
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn CapabilitySink>,
}

impl Notifier {
    pub fn new(sink: Arc<dyn CapabilitySink>) -> Self {
        Self { sink }
    }

    /// Fire for a finished batch. Per-file failures do not suppress the
    /// announcement; an empty batch never fires. Returns whether it fired.
    pub async fn batch_completed(&self, report: &BatchReport) -> bool {
        if report.files.is_empty() {
            return false;
        }
        match self.sink.notify_list_changed().await {
            Ok(()) => info!(files = report.files.len(), "Announced capability list change"),
            Err(e) => warn!(error = %e, "Failed to announce capability list change"),
        }
        true
    }
}
