//! Test utilities for daemon types
//!
//! Fixture builders for devices, apps and metadata, plus shell scripts that
//! stand in for `adb` and `scrcpy`.

use std::path::{Path, PathBuf};

use droidlaunch_core::{Application, Device};
use tempfile::TempDir;

use crate::locator::ExecutableLocator;
use crate::packages::AppMetadata;

/// Creates a connected test device.
pub fn test_device(id: &str, name: &str) -> Device {
    Device::new(id, name)
}

/// Creates a test application with the default icon hint.
pub fn test_app(package_id: &str, name: &str) -> Application {
    Application::new(package_id, name)
}

/// Builds a metadata table from `(package_id, name, is_background)` triples.
pub fn test_metadata(entries: &[(&str, &str, bool)]) -> AppMetadata {
    let mut metadata = AppMetadata::empty();
    for (package_id, name, is_background) in entries {
        metadata.insert(*package_id, *name, *is_background);
    }
    metadata
}

/// Writes an executable `#!/bin/sh` script named `name` into `dir`.
///
/// `body` runs with the tool's arguments in `$@`.
pub fn write_fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write fake tool");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod fake tool");
    }

    path
}

/// A temp directory holding fake `adb`/`scrcpy` scripts.
///
/// A tool given as `None` is left absent, so discovery for it fails.
pub struct FakeTools {
    pub dir: TempDir,
    pub adb: Option<PathBuf>,
    pub scrcpy: Option<PathBuf>,
}

impl FakeTools {
    pub fn new(adb_body: Option<&str>, scrcpy_body: Option<&str>) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let adb = adb_body.map(|body| write_fake_tool(dir.path(), "adb", body));
        let scrcpy = scrcpy_body.map(|body| write_fake_tool(dir.path(), "scrcpy", body));
        Self { dir, adb, scrcpy }
    }

    /// Locator that only considers this directory (no `$PATH` fallback)
    pub fn locator(&self) -> ExecutableLocator {
        ExecutableLocator::from_candidates(
            vec![self.dir.path().join("adb")],
            vec![self.dir.path().join("scrcpy")],
        )
    }

    /// Path the fake tools may append a record of their invocations to
    pub fn log_path(&self) -> PathBuf {
        self.dir.path().join("calls.log")
    }

    /// Lines appended to [`FakeTools::log_path`] so far
    pub fn logged_calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.log_path())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// `adb` script answering `start-server`, `devices -l` and `pm list packages`
/// with canned output; every call is appended to `calls.log` next to it.
pub fn scripted_adb_body(devices_output: &str, packages_output: &str) -> String {
    format!(
        r#"echo "$@" >> "$(dirname "$0")/calls.log"
case "$*" in
  start-server) exit 0 ;;
  "devices -l") printf '%s' '{devices}' ;;
  *"pm list packages"*) printf '%s' '{packages}' ;;
  *) exit 0 ;;
esac"#,
        devices = devices_output.replace('\'', r"'\''"),
        packages = packages_output.replace('\'', r"'\''"),
    )
}
