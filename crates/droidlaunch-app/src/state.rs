//! Catalog state
//!
//! Owned exclusively by the catalog loop; consumers only ever see snapshots
//! published on watch channels.

use droidlaunch_core::{Application, Device};

/// Monotonically increasing tag for refreshes and app fetches
pub type RequestId = u64;

/// Everything the catalog publishes, plus request bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogState {
    pub devices: Vec<Device>,
    pub apps: Vec<Application>,
    /// Last error, overwritten by every operation
    pub error: Option<String>,
    pub loading: bool,

    last_request: RequestId,
    pending_refresh: Option<RequestId>,
    pending_fetch: Option<RequestId>,
}

impl CatalogState {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_request(&mut self) -> RequestId {
        self.last_request += 1;
        self.last_request
    }

    /// Start a refresh; any earlier refresh result becomes stale
    pub fn begin_refresh(&mut self) -> RequestId {
        let id = self.next_request();
        self.pending_refresh = Some(id);
        self.loading = true;
        id
    }

    /// Take ownership of a refresh result if it is the latest one.
    ///
    /// Clears `loading` when it is.
    pub fn complete_refresh(&mut self, id: RequestId) -> bool {
        if self.pending_refresh != Some(id) {
            return false;
        }
        self.pending_refresh = None;
        self.loading = false;
        true
    }

    /// Start an app fetch; clears the current list immediately
    pub fn begin_fetch(&mut self) -> RequestId {
        let id = self.next_request();
        self.pending_fetch = Some(id);
        self.apps.clear();
        id
    }

    /// Take ownership of an app fetch result if it is the latest one
    pub fn complete_fetch(&mut self, id: RequestId) -> bool {
        if self.pending_fetch != Some(id) {
            return false;
        }
        self.pending_fetch = None;
        true
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}
