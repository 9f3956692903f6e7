//! # droidlaunch-core - Core Domain Types
//!
//! Foundation crate for droidlaunch. Provides domain types, error handling,
//! process event definitions and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`Device`] - A connected, authorized Android device
//! - [`DeviceState`] - Connection state token from `adb devices -l`
//! - [`Application`] - A user-facing app installed on a device
//! - [`SessionPhase`] - Mirroring session lifecycle
//!
//! ### Events (`events`)
//! - [`ProcessEvent`] - stderr chunks and the single exit notification of a streamed process
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Error taxonomy for tool discovery, spawning and command failures
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//! - [`ResultExt`] - Extension trait for adding error context
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use droidlaunch_core::prelude::*;
//! ```

pub mod error;
pub mod events;
pub mod logging;
pub mod types;

/// Prelude for common imports used throughout all droidlaunch crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, trace, warn};
}

pub use error::{Error, Result, ResultExt};
pub use events::ProcessEvent;
pub use types::{
    Application, Device, DeviceState, SessionPhase, DEFAULT_ICON_HINT, UNKNOWN_DEVICE_NAME,
};
