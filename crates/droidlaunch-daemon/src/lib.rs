//! # droidlaunch-daemon - External Tool Management
//!
//! Locates and drives the two external tools droidlaunch depends on: the
//! `adb` bridge daemon and the `scrcpy` mirroring tool.
//!
//! Depends on [`droidlaunch_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Discovery
//! - [`ExecutableLocator`], [`Tool`] - Find tool binaries among prioritized candidates
//! - [`ToolAvailability`] - Snapshot of which tools were found
//!
//! ### Process Execution
//! - [`CommandRunner`] - Blocking command execution seam ([`SystemRunner`] for real processes)
//! - [`spawn_streaming()`], [`StreamingProcess`] - Long-lived processes with live stderr
//!
//! ### Bridge Daemon
//! - [`Adb`] - `start-server`, device and package listing, screenshots
//! - [`parse_device_list()`] - Parse `adb devices -l`
//! - [`parse_package_list()`], [`AppMetadata`] - Parse and filter `pm list packages`
//!
//! ### Mirroring
//! - [`build_scrcpy_args()`], [`scrcpy_environment()`] - Command line for a session

pub mod adb;
pub mod devices;
pub mod locator;
pub mod packages;
pub mod process;
pub mod scrcpy;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod tool_availability;

pub use adb::{Adb, DaemonOptions, DEFAULT_SETTLE_DELAY};
pub use devices::{parse_device_line, parse_device_list, DeviceEntry};
pub use locator::{is_executable, locate, ExecutableLocator, Tool};
pub use packages::{parse_package_line, parse_package_list, AppMetadata, PackageInfo};
pub use process::{
    describe, spawn_streaming, CommandOutput, CommandRunner, EnvOverrides, LocalCommandRunner,
    StreamingProcess, SystemRunner, DEFAULT_COMMAND_TIMEOUT,
};
pub use scrcpy::{
    build_scrcpy_args, default_search_dirs, scrcpy_environment, MirrorOptions, MirrorTarget,
};
pub use tool_availability::ToolAvailability;
