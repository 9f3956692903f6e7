//! Mirroring session management
//!
//! At most one `scrcpy` session per device. Each session is a
//! [`StreamingProcess`] plus a watcher task that forwards its stderr and turns
//! its exit into a [`MirrorEvent::Exited`]. The watcher, not `stop()`, removes
//! the session from the table.
//!
//! Starting a session for a device that already has one detaches the old
//! session's observer first (no further events for it) and then terminates the
//! old process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use droidlaunch_core::prelude::*;
use droidlaunch_core::{ProcessEvent, SessionPhase};
use droidlaunch_daemon::{
    build_scrcpy_args, scrcpy_environment, spawn_streaming, ExecutableLocator, MirrorOptions,
    MirrorTarget, StreamingProcess, Tool,
};
use tokio::sync::mpsc;

/// Unique per-manager session identifier
pub type SessionId = u64;

/// Buffered stderr events per session before the reader waits
const PROCESS_EVENT_BUFFER: usize = 64;

/// Poll interval while waiting for sessions to wind down
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Notifications from running sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorEvent {
    /// A stderr chunk from a live session
    Output {
        device_id: String,
        session_id: SessionId,
        chunk: String,
    },

    /// A session's process exited. Sent once per session, never for a
    /// superseded one.
    Exited {
        device_id: String,
        session_id: SessionId,
        code: Option<i32>,
        stderr: String,
        /// The exit followed a `stop()` or `shutdown()`
        stop_requested: bool,
    },
}

impl MirrorEvent {
    pub fn device_id(&self) -> &str {
        match self {
            MirrorEvent::Output { device_id, .. } | MirrorEvent::Exited { device_id, .. } => {
                device_id
            }
        }
    }

    /// User-facing failure text for an unsuccessful exit, `None` otherwise.
    ///
    /// A signal exit after a stop request is a clean stop, not a failure.
    pub fn failure_message(&self) -> Option<String> {
        let MirrorEvent::Exited {
            device_id,
            code,
            stderr,
            stop_requested,
            ..
        } = self
        else {
            return None;
        };

        match code {
            Some(0) => None,
            None if *stop_requested => None,
            _ => {
                let status = match code {
                    Some(c) => format!("exit code {}", c),
                    None => "terminated by signal".to_string(),
                };
                let mut message = format!("Mirroring failed for device {} ({})", device_id, status);
                let detail = stderr.trim();
                if !detail.is_empty() {
                    message.push_str(".\n");
                    message.push_str(detail);
                }
                Some(message)
            }
        }
    }
}

/// A live session
#[derive(Debug)]
struct MirrorSession {
    id: SessionId,
    process: StreamingProcess,
    phase: SessionPhase,
    stop_requested: bool,
}

#[derive(Debug, Default)]
struct SessionTable {
    live: HashMap<String, MirrorSession>,
    /// Phase of the most recent session per device, kept after it ends
    last_phase: HashMap<String, SessionPhase>,
    /// Set by `shutdown()`; later launches are refused
    closed: bool,
}

impl SessionTable {
    fn set_phase(&mut self, device_id: &str, phase: SessionPhase) {
        self.last_phase.insert(device_id.to_string(), phase);
    }

    fn is_current(&self, device_id: &str, session_id: SessionId) -> bool {
        self.live
            .get(device_id)
            .is_some_and(|session| session.id == session_id)
    }
}

/// Launches, tracks and stops mirroring sessions
#[derive(Debug)]
pub struct MirrorSessionManager {
    locator: Arc<ExecutableLocator>,
    options: MirrorOptions,
    table: Arc<Mutex<SessionTable>>,
    next_id: AtomicU64,
    events: mpsc::UnboundedSender<MirrorEvent>,
}

impl MirrorSessionManager {
    pub fn new(
        locator: Arc<ExecutableLocator>,
        options: MirrorOptions,
        events: mpsc::UnboundedSender<MirrorEvent>,
    ) -> Self {
        Self {
            locator,
            options,
            table: Arc::new(Mutex::new(SessionTable::default())),
            next_id: AtomicU64::new(1),
            events,
        }
    }

    /// Mirror a single app on its own virtual display
    pub fn launch_app(&self, device_id: &str, package_id: &str) -> Result<SessionId> {
        self.start(device_id, MirrorTarget::app(package_id))
    }

    /// Mirror the whole screen
    pub fn mirror_device(&self, device_id: &str) -> Result<SessionId> {
        self.start(device_id, MirrorTarget::Screen)
    }

    /// Start a session, superseding any existing one for `device_id`.
    ///
    /// Re-runs `scrcpy` discovery every time. Must be called from within a
    /// Tokio runtime.
    pub fn start(&self, device_id: &str, target: MirrorTarget) -> Result<SessionId> {
        self.start_with(device_id, target, |_| {})
    }

    /// Like [`start`](Self::start), calling `on_launched` with the outcome
    /// before the session can report any output or exit.
    ///
    /// Blocks on discovery and process spawn, so async callers should run it
    /// on a blocking task.
    pub fn start_with(
        &self,
        device_id: &str,
        target: MirrorTarget,
        on_launched: impl FnOnce(&Result<SessionId>),
    ) -> Result<SessionId> {
        self.lock().set_phase(device_id, SessionPhase::Launching);

        let (process, process_rx) = match self.spawn_process(device_id, &target) {
            Ok(spawned) => spawned,
            Err(e) => return self.launch_failed(device_id, e, on_launched),
        };

        let session_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let pid = process.id();
        let mut session = MirrorSession {
            id: session_id,
            process,
            phase: SessionPhase::Running,
            stop_requested: false,
        };

        {
            let mut table = self.lock();
            if table.closed {
                session.process.detach_observer();
                session.process.terminate();
                drop(table);
                let e = Error::SpawnFailed {
                    program: Tool::Scrcpy.binary_name().to_string(),
                    reason: "mirroring is shutting down".to_string(),
                };
                return self.launch_failed(device_id, e, on_launched);
            }
            if let Some(mut old) = table.live.remove(device_id) {
                info!(
                    "Superseding mirroring session {} on {} with {}",
                    old.id, device_id, session_id
                );
                old.process.detach_observer();
                old.process.terminate();
            }
            table.live.insert(device_id.to_string(), session);
            table.set_phase(device_id, SessionPhase::Running);
        }

        let result = Ok(session_id);
        on_launched(&result);

        tokio::spawn(watch_session(
            device_id.to_string(),
            session_id,
            process_rx,
            Arc::clone(&self.table),
            self.events.clone(),
        ));

        info!(
            "Mirroring session {} running on {} ({:?}, pid {:?})",
            session_id, device_id, target, pid
        );
        result
    }

    fn launch_failed(
        &self,
        device_id: &str,
        e: Error,
        on_launched: impl FnOnce(&Result<SessionId>),
    ) -> Result<SessionId> {
        error!("Could not start mirroring for {}: {}", device_id, e);
        self.lock().set_phase(device_id, SessionPhase::Terminated);
        let result = Err(e);
        on_launched(&result);
        result
    }

    fn spawn_process(
        &self,
        device_id: &str,
        target: &MirrorTarget,
    ) -> Result<(StreamingProcess, mpsc::Receiver<ProcessEvent>)> {
        let scrcpy = self.locator.discover(Tool::Scrcpy)?;
        let adb = self.locator.resolve(Tool::Adb)?;

        let args = build_scrcpy_args(device_id, target, &self.options);
        let env = scrcpy_environment(&adb, &self.options);

        let (tx, rx) = mpsc::channel(PROCESS_EVENT_BUFFER);
        let process = spawn_streaming(&scrcpy, &args, &env, tx)?;
        Ok((process, rx))
    }

    /// Ask the session on `device_id` to exit.
    ///
    /// Cleanup happens when the exit is observed. Returns `false` (and logs)
    /// when there is no session.
    pub fn stop(&self, device_id: &str) -> bool {
        let mut table = self.lock();
        match table.live.get_mut(device_id) {
            Some(session) => {
                info!("Stopping mirroring session {} on {}", session.id, device_id);
                session.stop_requested = true;
                session.process.terminate();
                true
            }
            None => {
                info!("No mirroring session on {} to stop", device_id);
                false
            }
        }
    }

    /// Device ids with a live session, sorted
    pub fn active_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().live.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_mirroring(&self, device_id: &str) -> bool {
        self.lock().live.contains_key(device_id)
    }

    /// Phase of the current or most recent session on `device_id`
    pub fn phase(&self, device_id: &str) -> SessionPhase {
        let table = self.lock();
        table
            .live
            .get(device_id)
            .map(|session| session.phase)
            .or_else(|| table.last_phase.get(device_id).copied())
            .unwrap_or_default()
    }

    /// Stop every session and wait up to `limit` for them to exit.
    ///
    /// Launches that finish afterwards are terminated and reported as
    /// failed. Returns whether all sessions are gone.
    pub async fn shutdown(&self, limit: Duration) -> bool {
        {
            let mut table = self.lock();
            table.closed = true;
            if table.live.is_empty() {
                return true;
            }
            info!("Stopping {} mirroring session(s)", table.live.len());
            for session in table.live.values_mut() {
                session.stop_requested = true;
                session.process.terminate();
            }
        }

        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if self.lock().live.is_empty() {
                return true;
            }
            tokio::time::sleep(SHUTDOWN_POLL).await;
        }

        let remaining = self.active_sessions();
        warn!("Mirroring sessions still running after shutdown: {:?}", remaining);
        remaining.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, SessionTable> {
        lock_table(&self.table)
    }
}

fn lock_table(table: &Mutex<SessionTable>) -> MutexGuard<'_, SessionTable> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Per-session watcher: forwards stderr, then retires the session on exit.
///
/// Events for a session that is no longer current (superseded) are dropped
/// even if they were queued before its observer was detached.
async fn watch_session(
    device_id: String,
    session_id: SessionId,
    mut process_rx: mpsc::Receiver<ProcessEvent>,
    table: Arc<Mutex<SessionTable>>,
    events: mpsc::UnboundedSender<MirrorEvent>,
) {
    while let Some(event) = process_rx.recv().await {
        match event {
            ProcessEvent::Stderr(chunk) => {
                if !lock_table(&table).is_current(&device_id, session_id) {
                    continue;
                }
                let _ = events.send(MirrorEvent::Output {
                    device_id: device_id.clone(),
                    session_id,
                    chunk,
                });
            }
            ProcessEvent::Exited { code, stderr } => {
                let stop_requested = {
                    let mut table = lock_table(&table);
                    if !table.is_current(&device_id, session_id) {
                        debug!("Ignoring exit of superseded session {}", session_id);
                        return;
                    }
                    let session = table.live.remove(&device_id);
                    table.set_phase(&device_id, SessionPhase::Terminated);
                    session.is_some_and(|s| s.stop_requested)
                };

                info!(
                    "Mirroring session {} on {} exited with {:?}",
                    session_id, device_id, code
                );
                let _ = events.send(MirrorEvent::Exited {
                    device_id,
                    session_id,
                    code,
                    stderr,
                    stop_requested,
                });
                return;
            }
        }
    }

    debug!("Watcher for session {} finished without an exit event", session_id);
}
