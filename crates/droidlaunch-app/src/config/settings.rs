//! Settings loading from `config.toml`

use std::path::{Path, PathBuf};

use droidlaunch_core::prelude::*;

use super::types::Settings;

const APP_DIR: &str = "droidlaunch";
const CONFIG_FILENAME: &str = "config.toml";

/// Per-user configuration directory (`<config_dir>/droidlaunch`)
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}

/// Path of the settings file inside `config_dir`
pub fn config_file(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILENAME)
}

/// Load settings from `<config_dir>/config.toml`.
///
/// Returns defaults if the file doesn't exist or can't be parsed.
pub fn load_settings(config_dir: &Path) -> Settings {
    let config_path = config_file(config_dir);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match read_settings(&config_path) {
        Ok(settings) => {
            debug!("Loaded settings from {:?}", config_path);
            settings
        }
        Err(e) => {
            warn!("Ignoring {:?} ({}), using defaults", config_path, e);
            Settings::default()
        }
    }
}

fn read_settings(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    let settings = toml::from_str(&content)?;
    Ok(settings)
}

/// Load settings from the per-user directory, or defaults if there is none
pub fn load_user_settings() -> Settings {
    match default_config_dir() {
        Some(dir) => load_settings(&dir),
        None => {
            warn!("No user config directory on this platform, using defaults");
            Settings::default()
        }
    }
}

/// Write a commented default `config.toml` into `config_dir`.
///
/// An existing file is left untouched. Returns the file path.
pub fn init_config_dir(config_dir: &Path) -> Result<PathBuf> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).map_err(|e| {
            Error::config(format!("Failed to create {}: {}", config_dir.display(), e))
        })?;
    }

    let config_path = config_file(config_dir);
    if config_path.exists() {
        debug!("{:?} already exists, leaving it alone", config_path);
        return Ok(config_path);
    }

    let default_content = r#"# droidlaunch configuration

[tools]
# Extra locations checked before the built-in candidates
adb_paths = []
scrcpy_paths = []
# Fall back to searching $PATH
search_path = true

[daemon]
settle_delay_ms = 500   # Wait after `adb start-server` before querying
start_retries = 0       # Re-run start-server this many times on failure

[mirror]
max_size = 900          # Longest edge of the mirrored window
keyboard = "aoa"        # aoa, uhid or sdk
stay_awake = true
turn_screen_off = true
extra_search_dirs = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"]

[apps]
# JSON file mapping package id -> { name, is_background }
# metadata_path = "/path/to/package_names_mapping.json"
"#;

    std::fs::write(&config_path, default_content)
        .map_err(|e| Error::config(format!("Failed to write {:?}: {}", config_path, e)))?;
    info!("Created default config at {:?}", config_path);

    Ok(config_path)
}
