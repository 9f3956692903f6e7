//! Core domain types

use serde::{Deserialize, Serialize};

/// Display name used when the bridge reports no `model:` detail for a device
pub const UNKNOWN_DEVICE_NAME: &str = "Android Device";

/// Icon hint given to every application; icon mapping happens in the UI layer
pub const DEFAULT_ICON_HINT: &str = "android";

/// A device reported by `adb devices -l` in the `device` state.
///
/// Recomputed wholesale on every refresh; never diffed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Bridge serial, unique per device
    pub id: String,

    /// Model name with underscores turned into spaces
    pub display_name: String,

    pub connected: bool,
}

impl Device {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            connected: true,
        }
    }
}

/// Connection state token from the device listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    Device,
    Unauthorized,
    Offline,
    NoPermissions,
}

impl DeviceState {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "device" => Some(DeviceState::Device),
            "unauthorized" => Some(DeviceState::Unauthorized),
            "offline" => Some(DeviceState::Offline),
            "no permissions" => Some(DeviceState::NoPermissions),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Device => "device",
            DeviceState::Unauthorized => "unauthorized",
            DeviceState::Offline => "offline",
            DeviceState::NoPermissions => "no permissions",
        }
    }

    /// Only fully authorized devices can be queried or mirrored
    pub fn is_usable(&self) -> bool {
        matches!(self, DeviceState::Device)
    }
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-facing application installed on a device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    /// Reverse-domain package id, unique key
    pub package_id: String,

    /// Name taken from the metadata table
    pub display_name: String,

    pub icon_hint: String,
}

impl Application {
    pub fn new(package_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            package_id: package_id.into(),
            display_name: display_name.into(),
            icon_hint: DEFAULT_ICON_HINT.to_string(),
        }
    }
}

/// Lifecycle of one mirroring session.
///
/// `Launching -> Terminated` happens directly when the spawn itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    NotStarted,
    Launching,
    Running,
    Terminated,
}
