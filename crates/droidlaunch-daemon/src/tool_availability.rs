//! Tool availability snapshot
//!
//! Summarises whether `adb` and `scrcpy` could be located, for diagnostics
//! (`droidlaunch doctor`) and for UIs that want to grey out mirroring when
//! scrcpy is missing.

use std::path::PathBuf;

use crate::locator::{ExecutableLocator, Tool};

/// Availability of the external tools
#[derive(Debug, Clone, Default)]
pub struct ToolAvailability {
    /// Resolved `adb` path, if found
    pub adb_path: Option<PathBuf>,

    /// Resolved `scrcpy` path, if found
    pub scrcpy_path: Option<PathBuf>,
}

impl ToolAvailability {
    /// Re-run discovery for both tools
    pub fn check(locator: &ExecutableLocator) -> Self {
        Self {
            adb_path: locator.discover(Tool::Adb).ok(),
            scrcpy_path: locator.discover(Tool::Scrcpy).ok(),
        }
    }

    pub fn path(&self, tool: Tool) -> Option<&PathBuf> {
        match tool {
            Tool::Adb => self.adb_path.as_ref(),
            Tool::Scrcpy => self.scrcpy_path.as_ref(),
        }
    }

    /// User-facing message when `tool` is unavailable
    pub fn missing_message(&self, tool: Tool) -> Option<String> {
        if self.path(tool).is_some() {
            None
        } else {
            Some(format!(
                "{} not found. {}",
                tool.display_name(),
                tool.install_hint()
            ))
        }
    }

    /// Devices can be listed at all
    pub fn can_list_devices(&self) -> bool {
        self.adb_path.is_some()
    }

    /// Mirroring needs both tools: scrcpy talks to the device through adb
    pub fn can_mirror(&self) -> bool {
        self.adb_path.is_some() && self.scrcpy_path.is_some()
    }
}
