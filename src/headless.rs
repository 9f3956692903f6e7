//! JSON event output (`--json`)
//!
//! Events are written to stdout as NDJSON, one object per line, each with an
//! `"event"` tag and a millisecond `timestamp`.
//!
//! ```json
//! {"event":"device","device_id":"emulator-5554","name":"Pixel 6","timestamp":1704700001000}
//! {"event":"mirror_started","device_id":"emulator-5554","session_id":1,"package_id":null,"timestamp":1704700002000}
//! ```

use std::io::{self, Write};

use chrono::Utc;
use droidlaunch_app::CatalogEvent;
use droidlaunch_core::{Application, Device};
use serde::Serialize;
use tracing::error;

/// Events emitted in JSON mode
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// A connected, authorized device
    Device {
        device_id: String,
        name: String,
        timestamp: i64,
    },

    /// A user-facing app on a device
    App {
        device_id: String,
        package_id: String,
        name: String,
        timestamp: i64,
    },

    MirrorStarted {
        device_id: String,
        session_id: u64,
        package_id: Option<String>,
        timestamp: i64,
    },

    /// stderr from the mirroring tool
    MirrorOutput {
        device_id: String,
        output: String,
        timestamp: i64,
    },

    MirrorExited {
        device_id: String,
        code: Option<i32>,
        error: Option<String>,
        timestamp: i64,
    },

    ScreenshotSaved {
        device_id: String,
        path: String,
        timestamp: i64,
    },

    /// Result of locating one external tool
    Tool {
        tool: String,
        path: Option<String>,
        message: Option<String>,
        timestamp: i64,
    },

    ConfigCreated { path: String, timestamp: i64 },

    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                return;
            }
        };

        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", json) {
            error!("Failed to write headless event to stdout: {}", e);
            return;
        }

        if let Err(e) = stdout.flush() {
            error!("Failed to flush headless stdout: {}", e);
        }
    }

    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    pub fn device(device: &Device) -> Self {
        Self::Device {
            device_id: device.id.clone(),
            name: device.display_name.clone(),
            timestamp: Self::now(),
        }
    }

    pub fn app(device_id: &str, app: &Application) -> Self {
        Self::App {
            device_id: device_id.to_string(),
            package_id: app.package_id.clone(),
            name: app.display_name.clone(),
            timestamp: Self::now(),
        }
    }

    pub fn tool(tool: &str, path: Option<String>, message: Option<String>) -> Self {
        Self::Tool {
            tool: tool.to_string(),
            path,
            message,
            timestamp: Self::now(),
        }
    }

    pub fn config_created(path: &str) -> Self {
        Self::ConfigCreated {
            path: path.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn error(message: impl Into<String>, fatal: bool) -> Self {
        Self::Error {
            message: message.into(),
            fatal,
            timestamp: Self::now(),
        }
    }

    /// JSON form of a catalog lifecycle event, if it has one
    pub fn from_catalog(event: &CatalogEvent) -> Option<Self> {
        let timestamp = Self::now();
        let converted = match event {
            CatalogEvent::MirrorStarted {
                device_id,
                session_id,
                package_id,
            } => Self::MirrorStarted {
                device_id: device_id.clone(),
                session_id: *session_id,
                package_id: package_id.clone(),
                timestamp,
            },
            CatalogEvent::MirrorOutput { device_id, chunk } => Self::MirrorOutput {
                device_id: device_id.clone(),
                output: chunk.clone(),
                timestamp,
            },
            CatalogEvent::MirrorExited {
                device_id,
                code,
                error,
                ..
            } => Self::MirrorExited {
                device_id: device_id.clone(),
                code: *code,
                error: error.clone(),
                timestamp,
            },
            CatalogEvent::ScreenshotSaved { device_id, path } => Self::ScreenshotSaved {
                device_id: device_id.clone(),
                path: path.display().to_string(),
                timestamp,
            },
            CatalogEvent::MirrorFailed { message, .. } | CatalogEvent::Error { message } => {
                Self::Error {
                    message: message.clone(),
                    fatal: false,
                    timestamp,
                }
            }
            CatalogEvent::DevicesUpdated { .. } | CatalogEvent::AppsUpdated { .. } => {
                return None
            }
        };
        Some(converted)
    }
}
