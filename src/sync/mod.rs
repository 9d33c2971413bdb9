//! Reconciliation of the companion app's export into the catalog.

pub mod acquire;
pub mod descriptor;
pub mod engine;

use thiserror::Error;

pub use acquire::{
    Acquired, CommandClipboard, PayloadAcquirer, PayloadSource, RelayBuffer, SurfaceClipboard,
};
pub use descriptor::{DescriptorError, ExternalDescriptor};
pub use engine::{SyncEngine, SyncOutcome, SyncReport};

/// Whole-sync failures. Per-descriptor failures never surface here.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Could not read the companion app export from the clipboard. Paste it manually.")]
    NoPayload,
    #[error("Clipboard content is not valid JSON: {0}")]
    MalformedPayload(String),
    #[error("No video data found in clipboard")]
    NoData,
}

impl SyncError {
    /// Every whole-sync failure is recoverable by pasting the export by hand.
    pub fn needs_manual_paste(&self) -> bool {
        match self {
            SyncError::NoPayload | SyncError::MalformedPayload(_) | SyncError::NoData => true,
        }
    }
}
