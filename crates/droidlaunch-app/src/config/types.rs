//! Configuration types for droidlaunch
//!
//! Defines `Settings` (the `config.toml` schema) and its sections. Every field
//! has a default, so an empty or partial file is valid.

use std::path::PathBuf;
use std::time::Duration;

use droidlaunch_daemon::{
    default_search_dirs, AppMetadata, DaemonOptions, ExecutableLocator, MirrorOptions, Tool,
};
use serde::{Deserialize, Serialize};

/// Global application settings from `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub tools: ToolSettings,

    #[serde(default)]
    pub daemon: DaemonSettings,

    #[serde(default)]
    pub mirror: MirrorSettings,

    #[serde(default)]
    pub apps: AppSettings,
}

/// Executable discovery
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ToolSettings {
    /// Extra `adb` candidates, searched before the built-in list
    #[serde(default)]
    pub adb_paths: Vec<PathBuf>,

    /// Extra `scrcpy` candidates, searched before the built-in list
    #[serde(default)]
    pub scrcpy_paths: Vec<PathBuf>,

    /// Fall back to a `$PATH` lookup when no candidate matches
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            adb_paths: Vec::new(),
            scrcpy_paths: Vec::new(),
            search_path: true,
        }
    }
}

/// Bridge daemon startup
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DaemonSettings {
    /// Wait after `start-server` before querying (milliseconds)
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Extra `start-server` attempts on failure
    #[serde(default)]
    pub start_retries: u32,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
            start_retries: 0,
        }
    }
}

fn default_settle_delay_ms() -> u64 {
    500
}

/// Mirroring session options
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MirrorSettings {
    #[serde(default = "default_max_size")]
    pub max_size: u32,

    #[serde(default = "default_keyboard")]
    pub keyboard: String,

    #[serde(default = "default_true")]
    pub stay_awake: bool,

    #[serde(default = "default_true")]
    pub turn_screen_off: bool,

    /// Prepended to `PATH` for the mirroring tool
    #[serde(default = "default_search_dirs")]
    pub extra_search_dirs: Vec<PathBuf>,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            keyboard: default_keyboard(),
            stay_awake: true,
            turn_screen_off: true,
            extra_search_dirs: default_search_dirs(),
        }
    }
}

fn default_max_size() -> u32 {
    900
}

fn default_keyboard() -> String {
    "aoa".to_string()
}

fn default_true() -> bool {
    true
}

/// App listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppSettings {
    /// Package metadata JSON to use instead of the bundled table
    #[serde(default)]
    pub metadata_path: Option<PathBuf>,
}

impl Settings {
    pub fn daemon_options(&self) -> DaemonOptions {
        DaemonOptions {
            settle_delay: Duration::from_millis(self.daemon.settle_delay_ms),
            start_retries: self.daemon.start_retries,
        }
    }

    pub fn mirror_options(&self) -> MirrorOptions {
        MirrorOptions {
            max_size: self.mirror.max_size,
            keyboard: self.mirror.keyboard.clone(),
            stay_awake: self.mirror.stay_awake,
            turn_screen_off: self.mirror.turn_screen_off,
            extra_search_dirs: self.mirror.extra_search_dirs.clone(),
        }
    }

    /// Locator over the built-in candidates plus any configured paths
    pub fn locator(&self) -> ExecutableLocator {
        ExecutableLocator::new()
            .with_extra_candidates(Tool::Adb, self.tools.adb_paths.clone())
            .with_extra_candidates(Tool::Scrcpy, self.tools.scrcpy_paths.clone())
            .with_path_search(self.tools.search_path)
    }

    /// Package metadata: the configured file, else the bundled table
    pub fn metadata(&self) -> AppMetadata {
        AppMetadata::load_or_empty(self.apps.metadata_path.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.tools.search_path);
        assert_eq!(settings.daemon.settle_delay_ms, 500);
        assert_eq!(settings.daemon.start_retries, 0);
        assert_eq!(settings.mirror.max_size, 900);
        assert_eq!(settings.mirror.keyboard, "aoa");
        assert!(settings.mirror.stay_awake);
        assert!(settings.mirror.turn_screen_off);
        assert!(settings.apps.metadata_path.is_none());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let settings: Settings = toml::from_str(
            r#"
[mirror]
max_size = 1280

[tools]
search_path = false
"#,
        )
        .unwrap();

        assert_eq!(settings.mirror.max_size, 1280);
        assert_eq!(settings.mirror.keyboard, "aoa");
        assert!(!settings.tools.search_path);
        assert_eq!(settings.daemon, DaemonSettings::default());
    }

    #[test]
    fn test_daemon_options_conversion() {
        let mut settings = Settings::default();
        settings.daemon.settle_delay_ms = 250;
        settings.daemon.start_retries = 2;

        let options = settings.daemon_options();
        assert_eq!(options.settle_delay, Duration::from_millis(250));
        assert_eq!(options.start_retries, 2);
    }

    #[test]
    fn test_mirror_options_conversion() {
        let mut settings = Settings::default();
        settings.mirror.keyboard = "uhid".to_string();
        settings.mirror.extra_search_dirs = vec![PathBuf::from("/custom/bin")];

        let options = settings.mirror_options();
        assert_eq!(options.keyboard, "uhid");
        assert_eq!(options.extra_search_dirs, vec![PathBuf::from("/custom/bin")]);
    }

    #[test]
    fn test_locator_puts_configured_paths_first() {
        let mut settings = Settings::default();
        settings.tools.adb_paths = vec![PathBuf::from("/custom/adb")];

        let locator = settings.locator();
        assert_eq!(locator.candidates(Tool::Adb)[0], PathBuf::from("/custom/adb"));
    }
}
