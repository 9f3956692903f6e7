//! Lifecycle events broadcast to catalog subscribers

use std::path::PathBuf;

use crate::mirror::SessionId;

/// Things that happened, as opposed to the state slots which say what *is*
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    /// A refresh finished and the device list was replaced
    DevicesUpdated { count: usize },

    /// An app fetch finished and the app list was replaced
    AppsUpdated { device_id: String, count: usize },

    /// A mirroring session is running
    MirrorStarted {
        device_id: String,
        session_id: SessionId,
        package_id: Option<String>,
    },

    /// A mirroring session could not be started
    MirrorFailed { device_id: String, message: String },

    /// stderr from a live session
    MirrorOutput { device_id: String, chunk: String },

    /// A mirroring session ended. `error` is set for unsuccessful exits.
    MirrorExited {
        device_id: String,
        session_id: SessionId,
        code: Option<i32>,
        error: Option<String>,
    },

    /// A screenshot was saved
    ScreenshotSaved { device_id: String, path: PathBuf },

    /// An operation failed; the same text is on the error slot
    Error { message: String },
}

impl CatalogEvent {
    /// Device this event concerns, if any
    pub fn device_id(&self) -> Option<&str> {
        match self {
            CatalogEvent::AppsUpdated { device_id, .. }
            | CatalogEvent::MirrorStarted { device_id, .. }
            | CatalogEvent::MirrorFailed { device_id, .. }
            | CatalogEvent::MirrorOutput { device_id, .. }
            | CatalogEvent::MirrorExited { device_id, .. }
            | CatalogEvent::ScreenshotSaved { device_id, .. } => Some(device_id),
            CatalogEvent::DevicesUpdated { .. } | CatalogEvent::Error { .. } => None,
        }
    }

    /// The session on `device_id` is over (ended or never started)
    pub fn ends_session_on(&self, device_id: &str) -> bool {
        matches!(
            self,
            CatalogEvent::MirrorExited { device_id: d, .. }
            | CatalogEvent::MirrorFailed { device_id: d, .. } if d == device_id
        )
    }
}
