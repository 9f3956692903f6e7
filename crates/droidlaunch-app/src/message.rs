//! Message types for the catalog loop (TEA pattern)

use std::path::PathBuf;

use droidlaunch_core::{Application, Device};
use droidlaunch_daemon::MirrorTarget;

use crate::mirror::{MirrorEvent, SessionId};
use crate::state::RequestId;

/// Everything the catalog loop reacts to
#[derive(Debug, Clone)]
pub enum Message {
    // ─────────────────────────────────────────────────────────
    // Consumer requests
    // ─────────────────────────────────────────────────────────
    /// Rediscover adb, start the daemon and list devices
    Refresh,

    /// List user-facing apps on a device
    FetchApps { device_id: String },

    /// Mirror one app on its own display
    LaunchApp {
        package_id: String,
        device_id: String,
    },

    /// Mirror the whole screen
    MirrorDevice { device_id: String },

    /// Stop the session on a device
    StopMirroring { device_id: String },

    /// Stop processing messages
    Shutdown,

    // ─────────────────────────────────────────────────────────
    // Background results
    // ─────────────────────────────────────────────────────────
    /// Device listing finished
    DevicesLoaded {
        request_id: RequestId,
        result: Result<Vec<Device>, String>,
    },

    /// App listing finished
    AppsLoaded {
        request_id: RequestId,
        device_id: String,
        result: Result<Vec<Application>, String>,
    },

    /// A mirroring session was (or failed to be) started
    MirrorLaunched {
        device_id: String,
        target: MirrorTarget,
        result: Result<SessionId, String>,
    },

    /// Output or exit from a running session
    Mirror(MirrorEvent),

    /// A screenshot was written, or failed
    ScreenshotFinished {
        device_id: String,
        result: Result<PathBuf, String>,
    },
}
