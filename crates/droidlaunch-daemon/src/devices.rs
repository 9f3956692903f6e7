//! Device list parsing
//!
//! Parses the output of `adb devices -l`:
//!
//! ```text
//! List of devices attached
//! emulator-5554          device product:sdk_gphone64 model:Pixel_6 device:emu64a transport_id:1
//! R58M12345              unauthorized usb:1-1 transport_id:2
//! ```

use std::sync::LazyLock;

use droidlaunch_core::prelude::*;
use droidlaunch_core::{Device, DeviceState, UNKNOWN_DEVICE_NAME};
use regex::Regex;

/// `<serial> <state> [details...]`
static DEVICE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\s+(device|unauthorized|offline|no permissions)\s*(.*)$")
        .expect("Invalid device line regex")
});

/// `model:<value>` inside the details
static MODEL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"model:(\S+)").expect("Invalid model regex"));

const LISTING_HEADER: &str = "list of devices attached";

/// One recognised line of the listing, in any state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub id: String,
    pub state: DeviceState,
    /// Raw `model:` value, underscores intact
    pub model: Option<String>,
}

impl DeviceEntry {
    /// Model with underscores shown as spaces, or the generic placeholder
    pub fn display_name(&self) -> String {
        self.model
            .as_deref()
            .map(|m| m.replace('_', " "))
            .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string())
    }
}

/// Parse a single listing line.
///
/// `None` for the header, blank lines and anything that does not look like a
/// device entry.
pub fn parse_device_line(line: &str) -> Option<DeviceEntry> {
    let line = line.trim();
    if line.is_empty() || line.to_lowercase().contains(LISTING_HEADER) {
        return None;
    }

    let caps = DEVICE_LINE.captures(line)?;
    let id = caps.get(1)?.as_str().to_string();
    let state = DeviceState::parse(caps.get(2)?.as_str())?;
    let model = caps
        .get(3)
        .and_then(|details| MODEL_TOKEN.captures(details.as_str()))
        .and_then(|m| m.get(1))
        .map(|m| m.as_str().to_string());

    Some(DeviceEntry { id, state, model })
}

/// Parse the full listing into connected, authorized devices.
///
/// Input order is preserved. Lines in any state other than `device` are
/// dropped, as are lines that do not match at all.
pub fn parse_device_list(output: &str) -> Vec<Device> {
    output
        .lines()
        .filter_map(|line| {
            let Some(entry) = parse_device_line(line) else {
                if !line.trim().is_empty() {
                    trace!("Skipping device listing line: {:?}", line);
                }
                return None;
            };

            if !entry.state.is_usable() {
                debug!("Excluding device {} in state '{}'", entry.id, entry.state);
                return None;
            }

            Some(Device::new(entry.id.clone(), entry.display_name()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "List of devices attached
emulator-5554          device product:sdk_gphone64_arm64 model:Pixel_6 device:emu64a transport_id:1
R58M12345ABC           unauthorized usb:1-1 transport_id:2
192.168.1.20:5555      offline transport_id:3
0123456789ABCDEF       no permissions (user in plugdev group; are your udev rules wrong?); see [http://developer.android.com/tools/device.html]
HT7A1B234567           device usb:1-2 product:walleye model:Pixel_2 device:walleye transport_id:4

";

    #[test]
    fn test_parse_single_device_with_model() {
        let devices = parse_device_list("emulator-5554  device  model:Pixel_6");
        assert_eq!(devices, vec![Device::new("emulator-5554", "Pixel 6")]);
        assert!(devices[0].connected);
    }

    #[test]
    fn test_only_device_state_is_kept() {
        let devices = parse_device_list(SAMPLE);
        let ids: Vec<&str> = devices.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["emulator-5554", "HT7A1B234567"]);
        assert_eq!(devices[1].display_name, "Pixel 2");
    }

    #[test]
    fn test_header_and_blank_lines_yield_nothing() {
        assert!(parse_device_list("List of devices attached\n\n").is_empty());
        assert!(parse_device_list("").is_empty());
    }

    #[test]
    fn test_missing_model_uses_placeholder() {
        let devices = parse_device_list("ABC123\tdevice usb:1-1 transport_id:5");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].display_name, UNKNOWN_DEVICE_NAME);
    }

    #[test]
    fn test_bare_device_line_without_details() {
        let devices = parse_device_list("ABC123\tdevice");
        assert_eq!(devices, vec![Device::new("ABC123", UNKNOWN_DEVICE_NAME)]);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let output = "* daemon not running; starting now at tcp:5037\n\
                      * daemon started successfully\n\
                      garbage\n\
                      emulator-5556 device model:sdk_gphone_x86\n\
                      emulator-5558 booting\n";
        let devices = parse_device_list(output);
        assert_eq!(devices, vec![Device::new("emulator-5556", "sdk gphone x86")]);
    }

    #[test]
    fn test_parse_device_line_states() {
        let entry = parse_device_line("R58M12345ABC  unauthorized usb:1-1").unwrap();
        assert_eq!(entry.state, DeviceState::Unauthorized);
        assert_eq!(entry.model, None);

        let entry = parse_device_line("0123  no permissions (udev)").unwrap();
        assert_eq!(entry.state, DeviceState::NoPermissions);

        let entry = parse_device_line("10.0.0.5:5555 offline").unwrap();
        assert_eq!(entry.state, DeviceState::Offline);
    }

    #[test]
    fn test_header_case_insensitive() {
        assert!(parse_device_line("LIST OF DEVICES ATTACHED").is_none());
    }

    #[test]
    fn test_parsing_is_idempotent() {
        assert_eq!(parse_device_list(SAMPLE), parse_device_list(SAMPLE));
    }

    #[test]
    fn test_windows_line_endings() {
        let devices = parse_device_list("List of devices attached\r\nemulator-5554\tdevice model:Pixel_6\r\n\r\n");
        assert_eq!(devices, vec![Device::new("emulator-5554", "Pixel 6")]);
    }
}
