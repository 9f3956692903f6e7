//! Package list parsing and the application metadata table
//!
//! `adb shell pm list packages` prints one `package:<id>` line per installed
//! package, system packages included. Only packages present in the metadata
//! table and not flagged as background services are shown to users.

use std::collections::HashMap;
use std::path::Path;

use droidlaunch_core::prelude::*;
use droidlaunch_core::Application;
use serde::{Deserialize, Serialize};

/// Metadata shipped with the crate
const BUNDLED_METADATA: &str = include_str!("../resources/package_names_mapping.json");

/// Display metadata for one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// User-facing app name
    pub name: String,

    /// Services, providers and other packages without a user-facing UI
    pub is_background: bool,
}

/// Allow-list of packages keyed by package id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppMetadata {
    entries: HashMap<String, PackageInfo>,
}

impl AppMetadata {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a `{ "<package id>": { "name": ..., "is_background": ... } }` document.
    ///
    /// The document must be a JSON object. Individual entries missing either
    /// field are skipped.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: HashMap<String, serde_json::Value> = serde_json::from_str(json)?;

        let entries = raw
            .into_iter()
            .filter_map(
                |(package_id, value)| match serde_json::from_value::<PackageInfo>(value) {
                    Ok(info) => Some((package_id, info)),
                    Err(e) => {
                        debug!("Skipping metadata entry {}: {}", package_id, e);
                        None
                    }
                },
            )
            .collect();

        Ok(Self { entries })
    }

    /// Read and parse a metadata file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read package metadata {}", path.display()))?;
        Self::from_json_str(&content)
    }

    /// The table bundled with this crate, or empty if it cannot be parsed
    pub fn bundled() -> Self {
        Self::from_json_str(BUNDLED_METADATA).unwrap_or_else(|e| {
            warn!("Bundled package metadata is invalid: {}", e);
            Self::empty()
        })
    }

    /// Load `path` if given, else the bundled table.
    ///
    /// Any failure degrades to an empty table: every package is then filtered
    /// out and the app list comes back empty rather than as an error.
    pub fn load_or_empty(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::bundled();
        };

        match Self::load(path) {
            Ok(metadata) => {
                info!(
                    "Loaded {} package metadata entries from {}",
                    metadata.len(),
                    path.display()
                );
                metadata
            }
            Err(e) => {
                warn!(
                    "Failed to load package metadata from {}: {}",
                    path.display(),
                    e
                );
                Self::empty()
            }
        }
    }

    pub fn insert(
        &mut self,
        package_id: impl Into<String>,
        name: impl Into<String>,
        is_background: bool,
    ) {
        self.entries.insert(
            package_id.into(),
            PackageInfo {
                name: name.into(),
                is_background,
            },
        );
    }

    pub fn get(&self, package_id: &str) -> Option<&PackageInfo> {
        self.entries.get(package_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Package id from a `package:<id>` line.
///
/// The line must contain exactly one colon; anything else is not a package line.
pub fn parse_package_line(line: &str) -> Option<&str> {
    let mut parts = line.split(':');
    let (_prefix, package_id) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let package_id = package_id.trim();
    (!package_id.is_empty()).then_some(package_id)
}

/// Parse `pm list packages` output into user-facing apps, sorted by name.
pub fn parse_package_list(output: &str, metadata: &AppMetadata) -> Vec<Application> {
    let mut seen = std::collections::HashSet::new();

    let mut apps: Vec<Application> = output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let Some(package_id) = parse_package_line(line) else {
                trace!("Skipping package listing line: {:?}", line);
                return None;
            };

            match metadata.get(package_id) {
                Some(info) if !info.is_background => {
                    seen.insert(package_id.to_string())
                        .then(|| Application::new(package_id, info.name.clone()))
                }
                Some(_) => {
                    trace!("Skipping background package {}", package_id);
                    None
                }
                None => {
                    trace!("No metadata for package {}", package_id);
                    None
                }
            }
        })
        .collect();

    apps.sort_by(|a, b| a.display_name.cmp(&b.display_name));
    debug!("Parsed {} user-facing apps", apps.len());
    apps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_metadata;
    use tempfile::TempDir;

    fn metadata() -> AppMetadata {
        test_metadata(&[
            ("com.google.android.youtube", "YouTube", false),
            ("com.android.chrome", "Chrome", false),
            ("com.whatsapp", "WhatsApp", false),
            ("com.android.systemui", "System UI", true),
        ])
    }

    #[test]
    fn test_parse_package_line() {
        assert_eq!(parse_package_line("package:com.whatsapp"), Some("com.whatsapp"));
        assert_eq!(parse_package_line("package: com.whatsapp \r"), Some("com.whatsapp"));
        assert_eq!(parse_package_line("com.whatsapp"), None);
        assert_eq!(parse_package_line("package:a:b"), None);
        assert_eq!(parse_package_line("package:"), None);
    }

    #[test]
    fn test_allow_list_filter_and_sort() {
        let output = "package:com.whatsapp\n\
                      package:com.android.systemui\n\
                      package:com.unknown.app\n\
                      package:com.google.android.youtube\n\
                      package:com.android.chrome\n";

        let apps = parse_package_list(output, &metadata());
        let names: Vec<&str> = apps.iter().map(|a| a.display_name.as_str()).collect();
        assert_eq!(names, vec!["Chrome", "WhatsApp", "YouTube"]);
        assert_eq!(apps[0].package_id, "com.android.chrome");
        assert_eq!(apps[0].icon_hint, droidlaunch_core::DEFAULT_ICON_HINT);
    }

    #[test]
    fn test_duplicate_lines_appear_once() {
        let output = "package:com.whatsapp\npackage:com.whatsapp\n";
        let apps = parse_package_list(output, &metadata());
        assert_eq!(apps.len(), 1);
    }

    #[test]
    fn test_empty_metadata_filters_everything() {
        let output = "package:com.whatsapp\npackage:com.android.chrome\n";
        assert!(parse_package_list(output, &AppMetadata::empty()).is_empty());
    }

    #[test]
    fn test_parsing_is_idempotent() {
        let output = "package:com.whatsapp\npackage:com.android.chrome\n";
        let m = metadata();
        assert_eq!(parse_package_list(output, &m), parse_package_list(output, &m));
    }

    #[test]
    fn test_from_json_skips_incomplete_entries() {
        let json = r#"{
            "com.whatsapp": { "name": "WhatsApp", "is_background": false },
            "com.no.flag": { "name": "No Flag" },
            "com.no.name": { "is_background": false }
        }"#;
        let metadata = AppMetadata::from_json_str(json).unwrap();
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata.get("com.whatsapp").unwrap().name, "WhatsApp");
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(AppMetadata::from_json_str("[1, 2]").is_err());
        assert!(AppMetadata::from_json_str("not json").is_err());
    }

    #[test]
    fn test_load_or_empty_on_missing_file() {
        let dir = TempDir::new().unwrap();
        let metadata = AppMetadata::load_or_empty(Some(&dir.path().join("missing.json")));
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_load_or_empty_on_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mapping.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(AppMetadata::load_or_empty(Some(&path)).is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mapping.json");
        std::fs::write(
            &path,
            r#"{"com.example.app": {"name": "Example", "is_background": false}}"#,
        )
        .unwrap();

        let metadata = AppMetadata::load_or_empty(Some(&path));
        assert_eq!(metadata.len(), 1);
    }

    #[test]
    fn test_bundled_metadata_parses() {
        let metadata = AppMetadata::bundled();
        assert!(!metadata.is_empty());
        assert!(metadata.get("com.android.systemui").unwrap().is_background);
        assert!(!metadata.get("com.android.chrome").unwrap().is_background);
    }
}
