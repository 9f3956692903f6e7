//! External process execution
//!
//! Two modes:
//! - **Blocking** ([`CommandRunner::run`]): spawn, wait for exit, collect all of
//!   stdout/stderr. Used for short-lived `adb` commands.
//! - **Streaming** ([`spawn_streaming`]): spawn and return a [`StreamingProcess`]
//!   immediately. stderr is read in chunks on a background task and forwarded as
//!   [`ProcessEvent::Stderr`]; a single [`ProcessEvent::Exited`] carrying the exit
//!   code and the full accumulated stderr is sent when the process ends. Used for
//!   long-lived `scrcpy` sessions.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use droidlaunch_core::prelude::*;
use droidlaunch_core::ProcessEvent;

/// Default upper bound for a blocking command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a terminated process gets to exit before it is force-killed
const TERMINATE_GRACE: Duration = Duration::from_secs(3);

/// How long to keep draining stderr after exit.
///
/// Grandchildren (an adb server started by scrcpy, for instance) can inherit
/// the pipe and keep it open indefinitely.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

const STDERR_CHUNK_SIZE: usize = 4096;

// ─────────────────────────────────────────────────────────────────────────────
// Environment
// ─────────────────────────────────────────────────────────────────────────────

/// Environment changes applied on top of the inherited environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    vars: Vec<(String, String)>,
    path_prepend: Vec<PathBuf>,
}

impl EnvOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable (last write for a key wins)
    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.vars.retain(|(k, _)| *k != key);
        self.vars.push((key, value.into()));
        self
    }

    /// Directories to put in front of the inherited `PATH`
    pub fn prepend_path<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.path_prepend.extend(dirs.into_iter().map(Into::into));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty() && self.path_prepend.is_empty()
    }

    /// The `PATH` value the child will see, if it is being changed
    pub fn path_value(&self) -> Option<OsString> {
        if self.path_prepend.is_empty() {
            return None;
        }

        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let dirs = self
            .path_prepend
            .iter()
            .cloned()
            .chain(std::env::split_paths(&inherited));

        match std::env::join_paths(dirs) {
            Ok(joined) => Some(joined),
            Err(e) => {
                warn!("Cannot build PATH from {:?}: {}", self.path_prepend, e);
                None
            }
        }
    }

    fn apply(&self, command: &mut Command) {
        for (key, value) in &self.vars {
            command.env(key, value);
        }
        if let Some(path) = self.path_value() {
            command.env("PATH", path);
        }
    }
}

/// Human-readable command line used in logs and error messages
pub fn describe(program: &Path, args: &[String]) -> String {
    let name = program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string());

    if args.is_empty() {
        name
    } else {
        format!("{} {}", name, args.join(" "))
    }
}

fn spawn_error(program: &Path, e: std::io::Error) -> Error {
    Error::spawn_failed(program.display().to_string(), e.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Blocking mode
// ─────────────────────────────────────────────────────────────────────────────

/// Collected result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout on success, [`Error::CommandFailed`] with stderr otherwise
    pub fn into_stdout(self, command: &str) -> Result<String> {
        if self.success() {
            Ok(self.stdout)
        } else {
            Err(Error::command_failed(command, self.code, self.stderr))
        }
    }
}

/// Runs a command to completion.
///
/// The seam the daemon manager and catalog are written against, so tests can
/// substitute canned output.
#[trait_variant::make(CommandRunner: Send)]
pub trait LocalCommandRunner {
    /// Spawn `program`, wait for it to exit and collect its output.
    ///
    /// A non-zero exit is *not* an error here; only failing to spawn is.
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        env: &EnvOverrides,
    ) -> Result<CommandOutput>;
}

/// [`CommandRunner`] backed by real child processes
#[derive(Debug, Clone, Copy)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_COMMAND_TIMEOUT),
        }
    }
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every command by `timeout` (`None` waits forever)
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        env: &EnvOverrides,
    ) -> Result<CommandOutput> {
        let command_line = describe(program, args);
        info!("Running: {}", command_line);

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true); // a timed-out command must not linger
        env.apply(&mut command);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| {
                    Error::command_failed(
                        command_line.as_str(),
                        None,
                        format!("timed out after {}s", limit.as_secs()),
                    )
                })?,
            None => command.output().await,
        }
        .map_err(|e| spawn_error(program, e))?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!("{} exited with {:?}", command_line, result.code);
        debug!("{} stdout: {}", command_line, result.stdout);
        if !result.stderr.is_empty() {
            debug!("{} stderr: {}", command_line, result.stderr);
        }

        Ok(result)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Streaming mode
// ─────────────────────────────────────────────────────────────────────────────

/// A long-lived child process with live stderr capture.
///
/// The `Child` is owned by a background wait task. This handle keeps a
/// terminate channel, the shared stderr buffer, and the observer token.
/// Cancelling the observer (see [`StreamingProcess::detach_observer`]) stops all
/// further [`ProcessEvent`]s for this process, including `Exited`; stderr is
/// still drained into the buffer so the child never blocks on a full pipe.
#[derive(Debug)]
pub struct StreamingProcess {
    program: String,
    pid: Option<u32>,
    /// Consumed on first terminate request (or on drop)
    terminate_tx: Option<oneshot::Sender<()>>,
    exited: Arc<AtomicBool>,
    exit_notify: Arc<Notify>,
    stderr: Arc<Mutex<String>>,
    observer: CancellationToken,
}

/// Spawn `program` in streaming mode.
///
/// Events go to `event_tx`. Must be called from within a Tokio runtime.
pub fn spawn_streaming(
    program: &Path,
    args: &[String],
    env: &EnvOverrides,
    event_tx: mpsc::Sender<ProcessEvent>,
) -> Result<StreamingProcess> {
    let command_line = describe(program, args);
    info!("Spawning: {}", command_line);

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    env.apply(&mut command);

    let mut child = command.spawn().map_err(|e| spawn_error(program, e))?;

    let pid = child.id();
    info!("{} started with PID: {:?}", command_line, pid);

    let stderr = Arc::new(Mutex::new(String::new()));
    let observer = CancellationToken::new();

    let stderr_task = match child.stderr.take() {
        Some(pipe) => tokio::spawn(stderr_reader(
            pipe,
            Arc::clone(&stderr),
            event_tx.clone(),
            observer.clone(),
        )),
        None => tokio::spawn(async {}),
    };

    if let Some(pipe) = child.stdout.take() {
        tokio::spawn(stdout_reader(pipe));
    }

    let exited = Arc::new(AtomicBool::new(false));
    let exit_notify = Arc::new(Notify::new());
    let (terminate_tx, terminate_rx) = oneshot::channel::<()>();

    tokio::spawn(wait_for_exit(
        child,
        terminate_rx,
        stderr_task,
        ExitReport {
            stderr: Arc::clone(&stderr),
            event_tx,
            observer: observer.clone(),
            exited: Arc::clone(&exited),
            exit_notify: Arc::clone(&exit_notify),
        },
    ));

    Ok(StreamingProcess {
        program: command_line,
        pid,
        terminate_tx: Some(terminate_tx),
        exited,
        exit_notify,
        stderr,
        observer,
    })
}

/// Shared state the wait task publishes into once the child is gone
struct ExitReport {
    stderr: Arc<Mutex<String>>,
    event_tx: mpsc::Sender<ProcessEvent>,
    observer: CancellationToken,
    exited: Arc<AtomicBool>,
    exit_notify: Arc<Notify>,
}

/// Background task: owns `child`, waits for it to exit, emits the single `Exited`.
async fn wait_for_exit(
    mut child: Child,
    terminate_rx: oneshot::Receiver<()>,
    mut stderr_task: JoinHandle<()>,
    report: ExitReport,
) {
    let code: Option<i32> = tokio::select! {
        result = child.wait() => exit_code(result),
        Ok(()) = terminate_rx => {
            info!("Terminate requested for PID {:?}", child.id());
            terminate_gracefully(&mut child).await
        }
    };

    // Let the reader hand over the last chunk before snapshotting the buffer.
    if tokio::time::timeout(STDERR_DRAIN_TIMEOUT, &mut stderr_task)
        .await
        .is_err()
    {
        debug!("stderr still open after exit, abandoning reader");
        stderr_task.abort();
    }

    report.exited.store(true, Ordering::Release);
    report.exit_notify.notify_waiters();

    if report.observer.is_cancelled() {
        debug!("Process exited with {:?} after its observer was detached", code);
        return;
    }

    let stderr = lock(&report.stderr).clone();
    debug!("Sending ProcessEvent::Exited {{ code: {:?} }}", code);
    let _ = report
        .event_tx
        .send(ProcessEvent::Exited { code, stderr })
        .await;
}

fn exit_code(result: std::io::Result<std::process::ExitStatus>) -> Option<i32> {
    match result {
        Ok(status) => {
            info!("Process exited with status: {:?}", status);
            status.code()
        }
        Err(e) => {
            error!("Error waiting for process: {}", e);
            None
        }
    }
}

/// SIGTERM, then SIGKILL if the process outlives the grace period
async fn terminate_gracefully(child: &mut Child) -> Option<i32> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: plain kill(2) on a PID we spawned and have not reaped yet
            // (the Child is still owned here, so the PID cannot be recycled).
            let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if rc != 0 {
                warn!(
                    "SIGTERM to {} failed: {}",
                    pid,
                    std::io::Error::last_os_error()
                );
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = child.start_kill() {
            error!("Failed to kill process: {}", e);
        }
    }

    match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
        Ok(result) => exit_code(result),
        Err(_) => {
            warn!("Process ignored SIGTERM, force killing");
            if let Err(e) = child.kill().await {
                error!("Failed to kill process: {}", e);
            }
            exit_code(child.wait().await)
        }
    }
}

/// Read stderr in chunks, append to the shared buffer, forward while observed
async fn stderr_reader(
    mut stderr: ChildStderr,
    buffer: Arc<Mutex<String>>,
    tx: mpsc::Sender<ProcessEvent>,
    observer: CancellationToken,
) {
    let mut chunk = [0u8; STDERR_CHUNK_SIZE];
    let mut pending: Vec<u8> = Vec::new();
    let mut forwarding = true;

    loop {
        let n = match stderr.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("stderr read failed: {}", e);
                break;
            }
        };

        pending.extend_from_slice(&chunk[..n]);
        let text = take_utf8_prefix(&mut pending);
        if text.is_empty() {
            continue;
        }

        trace!("stderr: {}", text.trim_end());
        lock(&buffer).push_str(&text);

        if forwarding && !observer.is_cancelled() && tx.send(ProcessEvent::Stderr(text)).await.is_err()
        {
            debug!("stderr channel closed, buffering only");
            forwarding = false;
        }
    }

    if !pending.is_empty() {
        lock(&buffer).push_str(&String::from_utf8_lossy(&pending));
    }

    debug!("stderr reader finished");
}

/// stdout is not part of any contract; keep it drained and visible in the log
async fn stdout_reader(stdout: ChildStdout) {
    let mut reader = BufReader::new(stdout).lines();

    while let Ok(Some(line)) = reader.next_line().await {
        trace!("stdout: {}", line);
    }

    debug!("stdout reader finished");
}

/// Split off the longest valid UTF-8 prefix of `bytes`.
///
/// An incomplete multi-byte sequence at the end stays in `bytes` for the next
/// chunk; invalid bytes elsewhere are replaced.
fn take_utf8_prefix(bytes: &mut Vec<u8>) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => {
            let text = text.to_string();
            bytes.clear();
            text
        }
        Err(e) if e.error_len().is_none() => {
            let valid = e.valid_up_to();
            let rest = bytes.split_off(valid);
            let text = String::from_utf8_lossy(bytes).into_owned();
            *bytes = rest;
            text
        }
        Err(_) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            bytes.clear();
            text
        }
    }
}

fn lock(buffer: &Mutex<String>) -> std::sync::MutexGuard<'_, String> {
    buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StreamingProcess {
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Ask the process to exit (SIGTERM, escalating to SIGKILL).
    ///
    /// Returns `false` if a terminate was already requested or the process has
    /// exited. Cleanup happens when `Exited` arrives, not here.
    pub fn terminate(&mut self) -> bool {
        if self.has_exited() {
            return false;
        }
        match self.terminate_tx.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Stop delivering events for this process. Idempotent.
    pub fn detach_observer(&self) {
        self.observer.cancel();
    }

    pub fn is_observed(&self) -> bool {
        !self.observer.is_cancelled()
    }

    /// Everything written to stderr so far
    pub fn accumulated_stderr(&self) -> String {
        lock(&self.stderr).clone()
    }

    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        !self.has_exited()
    }

    /// Wait until the process has exited, or `limit` elapses.
    ///
    /// Returns whether the process has exited.
    pub async fn wait_for_exit(&self, limit: Duration) -> bool {
        // Create the notified() future before the final check so a
        // notification between the two cannot be missed.
        let notified = self.exit_notify.notified();
        if self.has_exited() {
            return true;
        }
        tokio::time::timeout(limit, notified).await.is_ok() || self.has_exited()
    }
}

impl Drop for StreamingProcess {
    fn drop(&mut self) {
        if self.has_exited() {
            return;
        }
        if let Some(tx) = self.terminate_tx.take() {
            warn!("StreamingProcess for {} dropped while still running", self.program);
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::write_fake_tool;
    use tempfile::TempDir;

    fn sh() -> PathBuf {
        PathBuf::from("/bin/sh")
    }

    fn script(body: &str) -> Vec<String> {
        vec!["-c".to_string(), body.to_string()]
    }

    async fn run_with(
        runner: &SystemRunner,
        args: &[String],
        env: &EnvOverrides,
    ) -> Result<CommandOutput> {
        CommandRunner::run(runner, &sh(), args, env).await
    }

    async fn next_exit(rx: &mut mpsc::Receiver<ProcessEvent>) -> Option<(Option<i32>, String)> {
        for _ in 0..100 {
            match tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
                Ok(Some(ProcessEvent::Exited { code, stderr })) => return Some((code, stderr)),
                Ok(Some(_)) => continue,
                Ok(None) => return None,
                Err(_) => continue,
            }
        }
        None
    }

    #[test]
    fn test_describe_uses_file_name() {
        let line = describe(
            Path::new("/opt/homebrew/bin/adb"),
            &["devices".to_string(), "-l".to_string()],
        );
        assert_eq!(line, "adb devices -l");
        assert_eq!(describe(Path::new("/usr/bin/adb"), &[]), "adb");
    }

    #[test]
    fn test_env_overrides_last_write_wins() {
        let env = EnvOverrides::new().var("ADB", "/a").var("ADB", "/b");
        assert_eq!(env.get("ADB"), Some("/b"));
        assert!(env.path_value().is_none());
    }

    #[test]
    fn test_env_overrides_prepend_path() {
        let env = EnvOverrides::new().prepend_path(["/opt/homebrew/bin", "/usr/local/bin"]);
        let path = env.path_value().unwrap();
        let dirs: Vec<PathBuf> = std::env::split_paths(&path).collect();
        assert_eq!(dirs[0], PathBuf::from("/opt/homebrew/bin"));
        assert_eq!(dirs[1], PathBuf::from("/usr/local/bin"));
    }

    #[test]
    fn test_take_utf8_prefix_keeps_split_sequence() {
        // "é" is 0xC3 0xA9; feed the first byte alone
        let mut bytes = vec![b'o', b'k', 0xC3];
        assert_eq!(take_utf8_prefix(&mut bytes), "ok");
        assert_eq!(bytes, vec![0xC3]);

        bytes.push(0xA9);
        assert_eq!(take_utf8_prefix(&mut bytes), "é");
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_command_output_into_stdout() {
        let ok = CommandOutput {
            code: Some(0),
            stdout: "out".into(),
            stderr: String::new(),
        };
        assert_eq!(ok.into_stdout("adb devices").unwrap(), "out");

        let failed = CommandOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: "boom".into(),
        };
        let err = failed.into_stdout("adb devices").unwrap_err();
        assert!(matches!(err, Error::CommandFailed { code: Some(1), .. }));
    }

    #[tokio::test]
    async fn test_run_collects_output_and_exit_code() {
        let output = run_with(
            &SystemRunner::new(),
            &script("echo hello; echo oops >&2; exit 3"),
            &EnvOverrides::new(),
        )
        .await
            .unwrap();

        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_run_applies_env_overrides() {
        let env = EnvOverrides::new()
            .var("DROIDLAUNCH_TEST_VAR", "value-1")
            .prepend_path(["/droidlaunch/test/bin"]);
        let output = run_with(
            &SystemRunner::new(),
            &script("echo $DROIDLAUNCH_TEST_VAR; echo $PATH"),
            &env,
        )
        .await
            .unwrap();

        let mut lines = output.stdout.lines();
        assert_eq!(lines.next(), Some("value-1"));
        assert!(lines.next().unwrap().starts_with("/droidlaunch/test/bin"));
    }

    #[tokio::test]
    async fn test_run_spawn_failure_is_reported() {
        let result = CommandRunner::run(
            &SystemRunner::new(),
            Path::new("/nonexistent/droidlaunch/adb"),
            &[],
            &EnvOverrides::new(),
        )
        .await;

        match result {
            Err(Error::SpawnFailed { program, reason }) => {
                assert!(program.contains("/nonexistent/droidlaunch/adb"));
                assert!(!reason.is_empty());
            }
            other => panic!("expected SpawnFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let runner = SystemRunner::with_timeout(Some(Duration::from_millis(200)));
        let result = run_with(&runner, &script("sleep 5"), &EnvOverrides::new()).await;

        assert!(matches!(result, Err(Error::CommandFailed { code: None, .. })));
    }

    #[tokio::test]
    async fn test_streaming_exit_carries_code_and_stderr() {
        let (tx, mut rx) = mpsc::channel(16);
        let process = spawn_streaming(
            &sh(),
            &script("echo first >&2; echo second >&2; exit 2"),
            &EnvOverrides::new(),
            tx,
        )
        .unwrap();

        let (code, stderr) = next_exit(&mut rx).await.expect("Exited event");
        assert_eq!(code, Some(2));
        assert_eq!(stderr, "first\nsecond\n");
        assert!(process.wait_for_exit(Duration::from_secs(1)).await);
        assert_eq!(process.accumulated_stderr(), "first\nsecond\n");
    }

    #[tokio::test]
    async fn test_streaming_stderr_visible_while_running() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut process = spawn_streaming(
            &sh(),
            &script("echo starting >&2; sleep 30"),
            &EnvOverrides::new(),
            tx,
        )
        .unwrap();

        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(ProcessEvent::Stderr(chunk))) => assert_eq!(chunk, "starting\n"),
            other => panic!("expected stderr chunk, got {:?}", other),
        }
        assert!(process.is_running());
        assert_eq!(process.accumulated_stderr(), "starting\n");

        assert!(process.terminate());
        assert!(!process.terminate(), "second terminate is a no-op");
        let (code, _) = next_exit(&mut rx).await.expect("Exited after terminate");
        assert_eq!(code, None, "killed by signal");
    }

    #[tokio::test]
    async fn test_streaming_exit_fires_exactly_once() {
        let (tx, mut rx) = mpsc::channel(16);
        let _process =
            spawn_streaming(&sh(), &script("exit 0"), &EnvOverrides::new(), tx).unwrap();

        let mut exited_count = 0usize;
        let deadline = tokio::time::sleep(Duration::from_millis(1500));
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(ProcessEvent::Exited { .. }) => exited_count += 1,
                    Some(_) => {}
                    None => break,
                },
                _ = &mut deadline => break,
            }
        }

        assert_eq!(exited_count, 1);
    }

    #[tokio::test]
    async fn test_detached_observer_suppresses_events() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut process = spawn_streaming(
            &sh(),
            &script("sleep 0.2; echo late >&2; exit 1"),
            &EnvOverrides::new(),
            tx,
        )
        .unwrap();

        process.detach_observer();
        assert!(!process.is_observed());
        assert!(process.wait_for_exit(Duration::from_secs(5)).await);

        // The wait task drops its sender without sending anything
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(event, Ok(None)), "got {:?}", event);

        // stderr is still captured for diagnostics
        assert_eq!(process.accumulated_stderr(), "late\n");
        assert!(!process.terminate());
    }

    #[tokio::test]
    async fn test_streaming_spawn_failure() {
        let dir = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::channel(16);
        let result = spawn_streaming(
            &dir.path().join("scrcpy"),
            &[],
            &EnvOverrides::new(),
            tx,
        );
        assert!(matches!(result, Err(Error::SpawnFailed { .. })));
    }

    #[tokio::test]
    async fn test_streaming_runs_script_tool() {
        let dir = TempDir::new().unwrap();
        let tool = write_fake_tool(dir.path(), "scrcpy", "echo \"$@\" >&2; exit 0");
        let (tx, mut rx) = mpsc::channel(16);

        let _process = spawn_streaming(
            &tool,
            &["--serial".to_string(), "abc".to_string()],
            &EnvOverrides::new(),
            tx,
        )
        .unwrap();

        let (code, stderr) = next_exit(&mut rx).await.unwrap();
        assert_eq!(code, Some(0));
        assert_eq!(stderr.trim(), "--serial abc");
    }
}
