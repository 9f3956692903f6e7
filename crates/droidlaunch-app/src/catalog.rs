//! DeviceCatalog - the consumer-facing orchestrator
//!
//! A single loop task owns [`CatalogState`]. Consumer calls, background results
//! and mirroring events all arrive there as [`Message`]s, go through
//! [`update`], and the resulting state is published on four watch channels
//! (devices, apps, error, loading). Lifecycle events go out on a broadcast
//! channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use droidlaunch_core::prelude::*;
use droidlaunch_core::{Application, Device, SessionPhase};
use droidlaunch_daemon::{
    AppMetadata, CommandRunner, ExecutableLocator, SystemRunner, ToolAvailability,
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::actions::{handle_action, ActionContext};
use crate::config::Settings;
use crate::event::CatalogEvent;
use crate::handler::update;
use crate::message::Message;
use crate::mirror::{MirrorEvent, MirrorSessionManager};
use crate::state::CatalogState;

/// Capacity of the lifecycle event broadcast
const EVENT_CAPACITY: usize = 256;

/// How long `shutdown` waits for mirroring sessions to exit
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Senders for the published state slots
struct Publishers {
    devices: watch::Sender<Vec<Device>>,
    apps: watch::Sender<Vec<Application>>,
    error: watch::Sender<Option<String>>,
    loading: watch::Sender<bool>,
    events: broadcast::Sender<CatalogEvent>,
}

impl Publishers {
    /// Push `state` to every slot whose value changed
    fn publish(&self, state: &CatalogState) {
        replace_if_changed(&self.devices, &state.devices);
        replace_if_changed(&self.apps, &state.apps);
        replace_if_changed(&self.error, &state.error);
        replace_if_changed(&self.loading, &state.loading);
    }

    fn emit(&self, event: CatalogEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

fn replace_if_changed<T: Clone + PartialEq>(tx: &watch::Sender<T>, value: &T) {
    tx.send_if_modified(|current| {
        if current == value {
            false
        } else {
            *current = value.clone();
            true
        }
    });
}

/// Device and app discovery plus mirroring, behind observable state
pub struct DeviceCatalog<R = SystemRunner> {
    msg_tx: mpsc::UnboundedSender<Message>,
    ctx: Arc<ActionContext<R>>,
    devices: watch::Receiver<Vec<Device>>,
    apps: watch::Receiver<Vec<Application>>,
    error: watch::Receiver<Option<String>>,
    loading: watch::Receiver<bool>,
    events: broadcast::Sender<CatalogEvent>,
    loop_task: Option<JoinHandle<()>>,
}

impl DeviceCatalog<SystemRunner> {
    /// Catalog over real processes, configured from `settings`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(settings: &Settings) -> Self {
        Self::with_runner(settings, SystemRunner::new(), settings.locator())
    }
}

impl<R> DeviceCatalog<R>
where
    R: CommandRunner + Send + Sync + 'static,
{
    /// Catalog with an injected command runner and locator
    pub fn with_runner(settings: &Settings, runner: R, locator: ExecutableLocator) -> Self {
        Self::with_parts(settings, runner, locator, settings.metadata())
    }

    /// Catalog with every dependency supplied explicitly
    pub fn with_parts(
        settings: &Settings,
        runner: R,
        locator: ExecutableLocator,
        metadata: AppMetadata,
    ) -> Self {
        let locator = Arc::new(locator);
        let (mirror_tx, mirror_rx) = mpsc::unbounded_channel();
        let mirror = Arc::new(MirrorSessionManager::new(
            Arc::clone(&locator),
            settings.mirror_options(),
            mirror_tx,
        ));

        let ctx = Arc::new(ActionContext {
            runner: Arc::new(runner),
            locator,
            metadata: Arc::new(metadata),
            daemon: settings.daemon_options(),
            mirror,
        });

        let state = CatalogState::new();
        let (devices_tx, devices) = watch::channel(state.devices.clone());
        let (apps_tx, apps) = watch::channel(state.apps.clone());
        let (error_tx, error) = watch::channel(state.error.clone());
        let (loading_tx, loading) = watch::channel(state.loading);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let publishers = Publishers {
            devices: devices_tx,
            apps: apps_tx,
            error: error_tx,
            loading: loading_tx,
            events: events.clone(),
        };

        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let loop_task = tokio::spawn(run_loop(
            state,
            msg_rx,
            mirror_rx,
            msg_tx.clone(),
            publishers,
            Arc::clone(&ctx),
        ));

        Self {
            msg_tx,
            ctx,
            devices,
            apps,
            error,
            loading,
            events,
            loop_task: Some(loop_task),
        }
    }

    fn send(&self, msg: Message) {
        if self.msg_tx.send(msg).is_err() {
            warn!("Catalog loop has stopped, message dropped");
        }
    }

    // ─────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────

    /// Rediscover adb, start the daemon and replace the device list
    pub fn refresh(&self) {
        self.send(Message::Refresh);
    }

    /// Clear the app list and load it for `device_id`
    pub fn fetch_apps(&self, device_id: &str) {
        self.send(Message::FetchApps {
            device_id: device_id.to_string(),
        });
    }

    /// Mirror `package_id` on its own display of `device_id`
    pub fn launch_app(&self, package_id: &str, device_id: &str) {
        self.send(Message::LaunchApp {
            package_id: package_id.to_string(),
            device_id: device_id.to_string(),
        });
    }

    /// Mirror the whole screen of `device_id`
    pub fn mirror_device(&self, device_id: &str) {
        self.send(Message::MirrorDevice {
            device_id: device_id.to_string(),
        });
    }

    /// Ask the session on `device_id` to exit
    pub fn stop_mirroring(&self, device_id: &str) {
        self.send(Message::StopMirroring {
            device_id: device_id.to_string(),
        });
    }

    /// Save a PNG of the device screen to `dest`.
    ///
    /// The outcome is also reflected on the error slot.
    pub async fn capture_screenshot(&self, device_id: &str, dest: &Path) -> Result<PathBuf> {
        let result = match self.ctx.adb() {
            Ok(adb) => adb.capture_screenshot(device_id, dest).await,
            Err(e) => Err(e),
        };

        self.send(Message::ScreenshotFinished {
            device_id: device_id.to_string(),
            result: result
                .as_ref()
                .map(Clone::clone)
                .map_err(|e| e.user_message()),
        });

        result
    }

    /// Stop all mirroring sessions, then the loop
    pub async fn shutdown(mut self) {
        if !self.ctx.mirror.shutdown(SHUTDOWN_TIMEOUT).await {
            warn!("Some mirroring sessions did not exit in time");
        }

        self.send(Message::Shutdown);
        if let Some(task) = self.loop_task.take() {
            if let Err(e) = task.await {
                error!("Catalog loop ended abnormally: {}", e);
            }
        }
    }

    // ─────────────────────────────────────────────────────────
    // Observable state
    // ─────────────────────────────────────────────────────────

    pub fn devices(&self) -> watch::Receiver<Vec<Device>> {
        self.devices.clone()
    }

    pub fn apps(&self) -> watch::Receiver<Vec<Application>> {
        self.apps.clone()
    }

    pub fn error(&self) -> watch::Receiver<Option<String>> {
        self.error.clone()
    }

    pub fn loading(&self) -> watch::Receiver<bool> {
        self.loading.clone()
    }

    /// Lifecycle events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────

    pub fn active_sessions(&self) -> Vec<String> {
        self.ctx.mirror.active_sessions()
    }

    pub fn is_mirroring(&self, device_id: &str) -> bool {
        self.ctx.mirror.is_mirroring(device_id)
    }

    pub fn session_phase(&self, device_id: &str) -> SessionPhase {
        self.ctx.mirror.phase(device_id)
    }

    /// Re-run discovery for both tools
    pub fn tool_availability(&self) -> ToolAvailability {
        ToolAvailability::check(&self.ctx.locator)
    }
}

impl<R> Drop for DeviceCatalog<R> {
    fn drop(&mut self) {
        if let Some(task) = self.loop_task.take() {
            task.abort();
        }
    }
}

/// The single writer of catalog state
async fn run_loop<R>(
    mut state: CatalogState,
    mut msg_rx: mpsc::UnboundedReceiver<Message>,
    mut mirror_rx: mpsc::UnboundedReceiver<MirrorEvent>,
    msg_tx: mpsc::UnboundedSender<Message>,
    publishers: Publishers,
    ctx: Arc<ActionContext<R>>,
) where
    R: CommandRunner + Send + Sync + 'static,
{
    debug!("Catalog loop started");

    loop {
        // Messages first: a launch result is queued before its session can
        // report anything, so MirrorStarted always precedes that session's exit
        let msg = tokio::select! {
            biased;
            Some(msg) = msg_rx.recv() => msg,
            Some(event) = mirror_rx.recv() => Message::Mirror(event),
            else => break,
        };

        if matches!(msg, Message::Shutdown) {
            // Deliver exits that raced with the shutdown request
            while let Ok(event) = mirror_rx.try_recv() {
                process(&mut state, Message::Mirror(event), &publishers, &ctx, &msg_tx);
            }
            break;
        }

        process(&mut state, msg, &publishers, &ctx, &msg_tx);
    }

    debug!("Catalog loop finished");
}

fn process<R>(
    state: &mut CatalogState,
    msg: Message,
    publishers: &Publishers,
    ctx: &Arc<ActionContext<R>>,
    msg_tx: &mpsc::UnboundedSender<Message>,
) where
    R: CommandRunner + Send + Sync + 'static,
{
    trace!("Catalog message: {:?}", msg);
    let result = update(state, msg);

    // State first, so subscribers reacting to an event see matching slots
    publishers.publish(state);

    if let Some(event) = result.event {
        publishers.emit(event);
    }

    if let Some(action) = result.action {
        handle_action(action, ctx, msg_tx.clone());
    }
}
