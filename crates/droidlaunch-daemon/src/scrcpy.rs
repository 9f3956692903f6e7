//! Mirroring tool (`scrcpy`) command construction
//!
//! Building the argument list and environment is kept pure so the exact
//! command line can be tested without spawning anything.

use std::path::{Path, PathBuf};

use crate::process::EnvOverrides;

/// What a mirroring session shows
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MirrorTarget {
    /// One app on its own virtual display
    App { package_id: String },

    /// The whole device screen
    Screen,
}

impl MirrorTarget {
    pub fn app(package_id: impl Into<String>) -> Self {
        MirrorTarget::App {
            package_id: package_id.into(),
        }
    }

    pub fn package_id(&self) -> Option<&str> {
        match self {
            MirrorTarget::App { package_id } => Some(package_id),
            MirrorTarget::Screen => None,
        }
    }
}

/// Tunables for app sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorOptions {
    /// `--max-size`: longest edge of the mirrored video
    pub max_size: u32,

    /// `--keyboard=<mode>` (`aoa`, `uhid`, `sdk`)
    pub keyboard: String,

    /// `--stay-awake`
    pub stay_awake: bool,

    /// `-S`: turn the physical screen off while mirroring
    pub turn_screen_off: bool,

    /// Directories put in front of `PATH` for the mirroring tool
    pub extra_search_dirs: Vec<PathBuf>,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            max_size: 900,
            keyboard: "aoa".to_string(),
            stay_awake: true,
            turn_screen_off: true,
            extra_search_dirs: default_search_dirs(),
        }
    }
}

/// Install directories where `adb` is commonly found
pub fn default_search_dirs() -> Vec<PathBuf> {
    ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"]
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

/// Argument list for a session on `device_id`
pub fn build_scrcpy_args(device_id: &str, target: &MirrorTarget, options: &MirrorOptions) -> Vec<String> {
    let mut args = vec!["--serial".to_string(), device_id.to_string()];

    match target {
        MirrorTarget::App { package_id } => {
            if options.stay_awake {
                args.push("--stay-awake".to_string());
            }
            if options.turn_screen_off {
                args.push("-S".to_string());
            }
            args.extend([
                "--window-title".to_string(),
                package_id.clone(),
                "--new-display".to_string(),
                "--max-size".to_string(),
                options.max_size.to_string(),
                "--no-audio".to_string(),
                format!("--keyboard={}", options.keyboard),
                "--start-app".to_string(),
                package_id.clone(),
            ]);
        }
        MirrorTarget::Screen => {
            args.extend(["--window-title".to_string(), device_id.to_string()]);
        }
    }

    args
}

/// Environment that lets the mirroring tool find the same `adb` we use
pub fn scrcpy_environment(adb_path: &Path, options: &MirrorOptions) -> EnvOverrides {
    EnvOverrides::new()
        .var("ADB", adb_path.to_string_lossy())
        .prepend_path(options.extra_search_dirs.iter().cloned())
}
