//! TEA update function
//!
//! `update` is the only place catalog state changes. It never does I/O: work
//! is handed back as an [`UpdateAction`] for the loop to run in the background,
//! and the result comes back as another [`Message`].

use droidlaunch_core::prelude::*;
use droidlaunch_daemon::MirrorTarget;

use crate::event::CatalogEvent;
use crate::message::Message;
use crate::mirror::MirrorEvent;
use crate::state::{CatalogState, RequestId};

/// Background work requested by `update`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateAction {
    /// Locate adb, start the daemon, list devices
    DiscoverDevices { request_id: RequestId },

    /// List packages on a device
    FetchApps {
        request_id: RequestId,
        device_id: String,
    },

    /// Start a mirroring session
    StartMirror {
        device_id: String,
        target: MirrorTarget,
    },

    /// Stop the session on a device
    StopMirror { device_id: String },
}

/// Result of processing a message
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Optional action for the loop to perform
    pub action: Option<UpdateAction>,
    /// Optional event for subscribers
    pub event: Option<CatalogEvent>,
}

impl UpdateResult {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn action(action: UpdateAction) -> Self {
        Self {
            action: Some(action),
            event: None,
        }
    }

    pub fn event(event: CatalogEvent) -> Self {
        Self {
            action: None,
            event: Some(event),
        }
    }
}

/// Apply `msg` to `state`
pub fn update(state: &mut CatalogState, msg: Message) -> UpdateResult {
    match msg {
        Message::Refresh => {
            let request_id = state.begin_refresh();
            debug!("Refresh #{} started", request_id);
            UpdateResult::action(UpdateAction::DiscoverDevices { request_id })
        }

        Message::DevicesLoaded { request_id, result } => {
            if !state.complete_refresh(request_id) {
                debug!("Dropping stale device list from refresh #{}", request_id);
                return UpdateResult::none();
            }

            match result {
                Ok(devices) => {
                    let count = devices.len();
                    state.devices = devices;
                    state.clear_error();
                    UpdateResult::event(CatalogEvent::DevicesUpdated { count })
                }
                Err(message) => {
                    warn!("Device refresh failed: {}", message);
                    state.devices.clear();
                    state.set_error(message.clone());
                    UpdateResult::event(CatalogEvent::Error { message })
                }
            }
        }

        Message::FetchApps { device_id } => {
            let request_id = state.begin_fetch();
            debug!("App fetch #{} for {} started", request_id, device_id);
            UpdateResult::action(UpdateAction::FetchApps {
                request_id,
                device_id,
            })
        }

        Message::AppsLoaded {
            request_id,
            device_id,
            result,
        } => {
            if !state.complete_fetch(request_id) {
                debug!(
                    "Dropping stale app list for {} from fetch #{}",
                    device_id, request_id
                );
                return UpdateResult::none();
            }

            match result {
                Ok(apps) => {
                    let count = apps.len();
                    state.apps = apps;
                    state.clear_error();
                    UpdateResult::event(CatalogEvent::AppsUpdated { device_id, count })
                }
                Err(message) => {
                    warn!("App fetch for {} failed: {}", device_id, message);
                    state.apps.clear();
                    state.set_error(message.clone());
                    UpdateResult::event(CatalogEvent::Error { message })
                }
            }
        }

        Message::LaunchApp {
            package_id,
            device_id,
        } => UpdateResult::action(UpdateAction::StartMirror {
            device_id,
            target: MirrorTarget::app(package_id),
        }),

        Message::MirrorDevice { device_id } => UpdateResult::action(UpdateAction::StartMirror {
            device_id,
            target: MirrorTarget::Screen,
        }),

        Message::StopMirroring { device_id } => {
            UpdateResult::action(UpdateAction::StopMirror { device_id })
        }

        Message::MirrorLaunched {
            device_id,
            target,
            result,
        } => match result {
            Ok(session_id) => {
                state.clear_error();
                UpdateResult::event(CatalogEvent::MirrorStarted {
                    device_id,
                    session_id,
                    package_id: target.package_id().map(str::to_string),
                })
            }
            Err(message) => {
                state.set_error(message.clone());
                UpdateResult::event(CatalogEvent::MirrorFailed { device_id, message })
            }
        },

        Message::Mirror(event) => handle_mirror_event(state, event),

        Message::ScreenshotFinished { device_id, result } => match result {
            Ok(path) => {
                state.clear_error();
                UpdateResult::event(CatalogEvent::ScreenshotSaved { device_id, path })
            }
            Err(message) => {
                state.set_error(message.clone());
                UpdateResult::event(CatalogEvent::Error { message })
            }
        },

        // Handled by the loop itself
        Message::Shutdown => UpdateResult::none(),
    }
}

fn handle_mirror_event(state: &mut CatalogState, event: MirrorEvent) -> UpdateResult {
    let failure = event.failure_message();

    match event {
        MirrorEvent::Output {
            device_id, chunk, ..
        } => UpdateResult::event(CatalogEvent::MirrorOutput { device_id, chunk }),

        MirrorEvent::Exited {
            device_id,
            session_id,
            code,
            ..
        } => {
            // A clean exit leaves the error slot alone
            if let Some(message) = &failure {
                state.set_error(message.clone());
            }
            UpdateResult::event(CatalogEvent::MirrorExited {
                device_id,
                session_id,
                code,
                error: failure,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use droidlaunch_core::{Application, Device};

    fn loaded_devices(request_id: RequestId, devices: Vec<Device>) -> Message {
        Message::DevicesLoaded {
            request_id,
            result: Ok(devices),
        }
    }

    fn started_refresh(state: &mut CatalogState) -> RequestId {
        match update(state, Message::Refresh).action {
            Some(UpdateAction::DiscoverDevices { request_id }) => request_id,
            other => panic!("expected DiscoverDevices, got {:?}", other),
        }
    }

    fn started_fetch(state: &mut CatalogState, device_id: &str) -> RequestId {
        let msg = Message::FetchApps {
            device_id: device_id.to_string(),
        };
        match update(state, msg).action {
            Some(UpdateAction::FetchApps { request_id, .. }) => request_id,
            other => panic!("expected FetchApps, got {:?}", other),
        }
    }

    #[test]
    fn test_refresh_sets_loading() {
        let mut state = CatalogState::new();
        started_refresh(&mut state);
        assert!(state.loading);
    }

    #[test]
    fn test_refresh_success_replaces_devices_and_clears_error() {
        let mut state = CatalogState::new();
        state.set_error("old");
        state.devices = vec![Device::new("gone", "Gone")];

        let id = started_refresh(&mut state);
        let result = update(&mut state, loaded_devices(id, vec![Device::new("a", "A")]));

        assert_eq!(state.devices, vec![Device::new("a", "A")]);
        assert_eq!(state.error, None);
        assert!(!state.loading);
        assert_eq!(result.event, Some(CatalogEvent::DevicesUpdated { count: 1 }));
    }

    #[test]
    fn test_refresh_failure_empties_devices() {
        let mut state = CatalogState::new();
        state.devices = vec![Device::new("a", "A")];

        let id = started_refresh(&mut state);
        update(
            &mut state,
            Message::DevicesLoaded {
                request_id: id,
                result: Err("ADB not found. Install it.".to_string()),
            },
        );

        assert!(state.devices.is_empty());
        assert_eq!(state.error.as_deref(), Some("ADB not found. Install it."));
        assert!(!state.loading);
    }

    #[test]
    fn test_stale_refresh_is_dropped() {
        let mut state = CatalogState::new();
        let first = started_refresh(&mut state);
        let second = started_refresh(&mut state);

        let result = update(&mut state, loaded_devices(first, vec![Device::new("old", "Old")]));
        assert_eq!(result, UpdateResult::none());
        assert!(state.devices.is_empty());
        assert!(state.loading);

        update(&mut state, loaded_devices(second, vec![Device::new("new", "New")]));
        assert_eq!(state.devices[0].id, "new");
        assert!(!state.loading);
    }

    #[test]
    fn test_fetch_clears_apps_immediately() {
        let mut state = CatalogState::new();
        state.apps = vec![Application::new("com.x", "X")];
        started_fetch(&mut state, "dev1");
        assert!(state.apps.is_empty());
    }

    #[test]
    fn test_out_of_order_fetch_results_keep_latest() {
        let mut state = CatalogState::new();
        let first = started_fetch(&mut state, "dev1");
        let second = started_fetch(&mut state, "dev1");

        update(
            &mut state,
            Message::AppsLoaded {
                request_id: second,
                device_id: "dev1".into(),
                result: Ok(vec![Application::new("com.new", "New")]),
            },
        );
        // The older request completes last
        update(
            &mut state,
            Message::AppsLoaded {
                request_id: first,
                device_id: "dev1".into(),
                result: Ok(vec![Application::new("com.old", "Old")]),
            },
        );

        assert_eq!(state.apps, vec![Application::new("com.new", "New")]);
    }

    #[test]
    fn test_fetch_failure_sets_error_and_empties_apps() {
        let mut state = CatalogState::new();
        let id = started_fetch(&mut state, "dev1");
        update(
            &mut state,
            Message::AppsLoaded {
                request_id: id,
                device_id: "dev1".into(),
                result: Err("device offline".into()),
            },
        );
        assert!(state.apps.is_empty());
        assert_eq!(state.error.as_deref(), Some("device offline"));
    }

    #[test]
    fn test_fetch_does_not_touch_loading() {
        let mut state = CatalogState::new();
        started_fetch(&mut state, "dev1");
        assert!(!state.loading);
    }

    #[test]
    fn test_launch_and_mirror_delegate() {
        let mut state = CatalogState::new();
        let result = update(
            &mut state,
            Message::LaunchApp {
                package_id: "com.x".into(),
                device_id: "dev1".into(),
            },
        );
        assert_eq!(
            result.action,
            Some(UpdateAction::StartMirror {
                device_id: "dev1".into(),
                target: MirrorTarget::app("com.x"),
            })
        );

        let result = update(&mut state, Message::MirrorDevice { device_id: "dev1".into() });
        assert_eq!(
            result.action,
            Some(UpdateAction::StartMirror {
                device_id: "dev1".into(),
                target: MirrorTarget::Screen,
            })
        );

        let result = update(&mut state, Message::StopMirroring { device_id: "dev1".into() });
        assert_eq!(
            result.action,
            Some(UpdateAction::StopMirror { device_id: "dev1".into() })
        );
    }

    #[test]
    fn test_launch_failure_is_published() {
        let mut state = CatalogState::new();
        let result = update(
            &mut state,
            Message::MirrorLaunched {
                device_id: "dev1".into(),
                target: MirrorTarget::Screen,
                result: Err("scrcpy not found. Install scrcpy.".into()),
            },
        );
        assert_eq!(state.error.as_deref(), Some("scrcpy not found. Install scrcpy."));
        assert!(matches!(result.event, Some(CatalogEvent::MirrorFailed { .. })));
    }

    #[test]
    fn test_launch_success_clears_error() {
        let mut state = CatalogState::new();
        state.set_error("old");
        let result = update(
            &mut state,
            Message::MirrorLaunched {
                device_id: "dev1".into(),
                target: MirrorTarget::app("com.x"),
                result: Ok(7),
            },
        );
        assert_eq!(state.error, None);
        assert_eq!(
            result.event,
            Some(CatalogEvent::MirrorStarted {
                device_id: "dev1".into(),
                session_id: 7,
                package_id: Some("com.x".into()),
            })
        );
    }

    #[test]
    fn test_failed_exit_sets_error_clean_exit_does_not() {
        let mut state = CatalogState::new();
        let exited = |code| {
            Message::Mirror(MirrorEvent::Exited {
                device_id: "dev1".into(),
                session_id: 1,
                code,
                stderr: "boom".into(),
                stop_requested: false,
            })
        };

        update(&mut state, exited(Some(0)));
        assert_eq!(state.error, None);

        let result = update(&mut state, exited(Some(2)));
        assert!(state.error.as_deref().unwrap().contains("boom"));
        assert!(matches!(
            result.event,
            Some(CatalogEvent::MirrorExited { error: Some(_), .. })
        ));
    }
}
