//! Executable discovery for the bridge daemon (`adb`) and mirroring tool (`scrcpy`)
//!
//! Candidates are checked in priority order: package-manager installs first,
//! then user-local SDK/tool directories, then bundled app paths. The first
//! path that exists and is executable wins. Results are cached per tool until
//! discovery is re-run; stale paths are not detected automatically.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use droidlaunch_core::prelude::*;

/// An external tool this crate drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Adb,
    Scrcpy,
}

impl Tool {
    /// File name of the executable
    pub fn binary_name(&self) -> &'static str {
        match self {
            Tool::Adb => "adb",
            Tool::Scrcpy => "scrcpy",
        }
    }

    /// Name used in user-facing messages
    pub fn display_name(&self) -> &'static str {
        match self {
            Tool::Adb => "ADB",
            Tool::Scrcpy => "scrcpy",
        }
    }

    /// Install guidance shown when the tool cannot be found
    pub fn install_hint(&self) -> &'static str {
        match self {
            Tool::Adb => {
                "Install Android Platform Tools (e.g. `brew install android-platform-tools`)."
            }
            Tool::Scrcpy => "Install scrcpy (e.g. `brew install scrcpy`).",
        }
    }

    /// Built-in candidate paths in priority order
    pub fn default_candidates(&self) -> Vec<PathBuf> {
        let home = dirs::home_dir();
        let mut paths: Vec<PathBuf> = Vec::new();

        match self {
            Tool::Adb => {
                // Package managers
                paths.push("/opt/homebrew/bin/adb".into());
                paths.push("/usr/local/bin/adb".into());
                paths.push("/usr/bin/adb".into());
                paths.push("/home/linuxbrew/.linuxbrew/bin/adb".into());

                // User-local SDK installs
                for var in ["ANDROID_HOME", "ANDROID_SDK_ROOT"] {
                    if let Ok(sdk) = std::env::var(var) {
                        paths.push(Path::new(&sdk).join("platform-tools").join("adb"));
                    }
                }
                if let Some(home) = &home {
                    paths.push(home.join("Library/Android/sdk/platform-tools/adb"));
                    paths.push(home.join("Android/Sdk/platform-tools/adb"));
                    paths.push(home.join(".android-sdk/platform-tools/adb"));
                }

                // System-wide SDK bundle
                paths.push("/Library/Android/sdk/platform-tools/adb".into());
            }
            Tool::Scrcpy => {
                paths.push("/opt/homebrew/bin/scrcpy".into());
                paths.push("/usr/local/bin/scrcpy".into());
                paths.push("/usr/bin/scrcpy".into());
                paths.push("/snap/bin/scrcpy".into());

                if let Some(home) = &home {
                    paths.push(home.join(".local/bin/scrcpy"));
                }

                paths.push("/Applications/scrcpy.app/Contents/MacOS/scrcpy".into());
            }
        }

        paths
    }

    fn not_found(&self) -> Error {
        Error::executable_not_found(self.display_name(), self.install_hint())
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Return the first candidate that exists and is executable.
///
/// Pure apart from filesystem stat calls.
pub fn locate(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| is_executable(p)).cloned()
}

/// Whether `path` is a regular file the current user may execute
pub fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}

/// Resolves and caches tool paths
#[derive(Debug)]
pub struct ExecutableLocator {
    candidates: HashMap<Tool, Vec<PathBuf>>,
    search_path: bool,
    cache: Mutex<HashMap<Tool, PathBuf>>,
}

impl Default for ExecutableLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutableLocator {
    /// Locator over the built-in candidate lists, falling back to `$PATH`
    pub fn new() -> Self {
        let candidates = [Tool::Adb, Tool::Scrcpy]
            .into_iter()
            .map(|tool| (tool, tool.default_candidates()))
            .collect();

        Self {
            candidates,
            search_path: true,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Locator that only ever looks at the given paths
    pub fn from_candidates(adb: Vec<PathBuf>, scrcpy: Vec<PathBuf>) -> Self {
        let candidates = HashMap::from([(Tool::Adb, adb), (Tool::Scrcpy, scrcpy)]);

        Self {
            candidates,
            search_path: false,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Put user-configured paths ahead of the existing candidates
    pub fn with_extra_candidates(mut self, tool: Tool, extra: Vec<PathBuf>) -> Self {
        let list = self.candidates.entry(tool).or_default();
        let mut merged = extra;
        merged.append(list);
        *list = merged;
        self
    }

    /// Enable or disable the final `$PATH` lookup
    pub fn with_path_search(mut self, enabled: bool) -> Self {
        self.search_path = enabled;
        self
    }

    /// Candidate list for `tool`, in the order it is searched
    pub fn candidates(&self, tool: Tool) -> &[PathBuf] {
        self.candidates
            .get(&tool)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Run discovery for `tool`, replacing any cached path.
    ///
    /// On failure the cached entry is cleared, so later callers do not keep
    /// using a path that has gone away.
    pub fn discover(&self, tool: Tool) -> Result<PathBuf> {
        debug!("Discovering {} among {:?}", tool, self.candidates(tool));

        let found = locate(self.candidates(tool)).or_else(|| {
            if self.search_path {
                which::which(tool.binary_name())
                    .inspect_err(|e| trace!("{} not on PATH: {}", tool, e))
                    .ok()
            } else {
                None
            }
        });

        let mut cache = self.lock_cache();
        match found {
            Some(path) => {
                info!("{} found at: {}", tool, path.display());
                cache.insert(tool, path.clone());
                Ok(path)
            }
            None => {
                warn!("{} not found in any known location", tool);
                cache.remove(&tool);
                Err(tool.not_found())
            }
        }
    }

    /// Cached path for `tool`, discovering it on first use
    pub fn resolve(&self, tool: Tool) -> Result<PathBuf> {
        if let Some(path) = self.cached(tool) {
            return Ok(path);
        }
        self.discover(tool)
    }

    /// Cached path for `tool` without touching the filesystem
    pub fn cached(&self, tool: Tool) -> Option<PathBuf> {
        self.lock_cache().get(&tool).cloned()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<Tool, PathBuf>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
