//! Bridge daemon (`adb`) commands
//!
//! [`Adb`] wraps a resolved `adb` path and a [`CommandRunner`]. Every command
//! is short-lived and runs in blocking mode; a non-zero exit becomes
//! [`Error::CommandFailed`] carrying the tool's stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use droidlaunch_core::prelude::*;
use droidlaunch_core::{Application, Device};

use crate::devices::parse_device_list;
use crate::packages::{parse_package_list, AppMetadata};
use crate::process::{describe, CommandRunner, EnvOverrides};

/// Default wait after `start-server` before the daemon is queried
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Wait between waking the screen and capturing it
const WAKE_DELAY: Duration = Duration::from_millis(500);

const PRIMARY_SCREENSHOT_PATH: &str = "/sdcard/droidlaunch_screenshot.png";
const FALLBACK_SCREENSHOT_PATH: &str = "/data/local/tmp/droidlaunch_screenshot.png";

/// How the daemon is brought up before queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonOptions {
    /// Fixed delay observed after a successful `start-server`
    pub settle_delay: Duration,

    /// Extra `start-server` attempts after a failure, one settle delay apart
    pub start_retries: u32,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            start_retries: 0,
        }
    }
}

/// Handle to a located `adb` executable
#[derive(Debug)]
pub struct Adb<R> {
    path: PathBuf,
    runner: Arc<R>,
}

impl<R> Clone for Adb<R> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            runner: Arc::clone(&self.runner),
        }
    }
}

impl<R: CommandRunner + Sync> Adb<R> {
    pub fn new(path: impl Into<PathBuf>, runner: Arc<R>) -> Self {
        Self {
            path: path.into(),
            runner,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `adb <args>` and return stdout, failing on a non-zero exit.
    ///
    /// stderr alone is not a failure: `start-server` reports progress there.
    pub async fn run(&self, args: &[String]) -> Result<String> {
        let output = self
            .runner
            .run(&self.path, args, &EnvOverrides::new())
            .await?;
        output.into_stdout(&describe(&self.path, args))
    }

    async fn run_for_device(&self, device_id: &str, args: &[&str]) -> Result<String> {
        let mut full = vec!["-s".to_string(), device_id.to_string()];
        full.extend(args.iter().map(|a| a.to_string()));
        self.run(&full).await
    }

    /// `adb start-server`; already running counts as success
    pub async fn start_server(&self) -> Result<()> {
        self.run(&["start-server".to_string()]).await.map(|_| ())
    }

    /// Start the daemon and wait for it to settle.
    ///
    /// With `start_retries > 0`, a failing `start-server` is re-run up to that
    /// many extra times. The last failure is returned if none succeed.
    pub async fn ensure_running(&self, options: DaemonOptions) -> Result<()> {
        let mut attempt = 0u32;

        loop {
            match self.start_server().await {
                Ok(()) => break,
                Err(e) if attempt < options.start_retries => {
                    attempt += 1;
                    warn!(
                        "adb start-server failed ({}), retry {}/{}",
                        e, attempt, options.start_retries
                    );
                    tokio::time::sleep(options.settle_delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        debug!("adb server started, settling for {:?}", options.settle_delay);
        tokio::time::sleep(options.settle_delay).await;
        Ok(())
    }

    /// Connected, authorized devices from `adb devices -l`
    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        let output = self
            .run(&["devices".to_string(), "-l".to_string()])
            .await?;
        let devices = parse_device_list(&output);
        info!("Found {} device(s)", devices.len());
        Ok(devices)
    }

    /// User-facing apps installed on `device_id`
    pub async fn list_packages(
        &self,
        device_id: &str,
        metadata: &AppMetadata,
    ) -> Result<Vec<Application>> {
        let output = self
            .run_for_device(device_id, &["shell", "pm", "list", "packages"])
            .await?;
        Ok(parse_package_list(&output, metadata))
    }

    /// Capture the device screen as PNG into `dest`.
    ///
    /// Wakes the screen first. If writing to shared storage fails, the capture
    /// is retried under `/data/local/tmp`. The on-device file is removed
    /// afterwards on a best-effort basis.
    pub async fn capture_screenshot(&self, device_id: &str, dest: &Path) -> Result<PathBuf> {
        info!("Capturing screenshot of {} to {}", device_id, dest.display());

        if let Err(e) = self
            .run_for_device(device_id, &["shell", "input", "keyevent", "KEYCODE_WAKEUP"])
            .await
        {
            warn!("Could not wake {}: {}", device_id, e);
        }
        tokio::time::sleep(WAKE_DELAY).await;

        let remote = match self
            .run_for_device(device_id, &["shell", "screencap", "-p", PRIMARY_SCREENSHOT_PATH])
            .await
        {
            Ok(_) => PRIMARY_SCREENSHOT_PATH,
            Err(e) => {
                warn!("screencap to shared storage failed ({}), trying fallback", e);
                self.run_for_device(
                    device_id,
                    &["shell", "screencap", "-p", FALLBACK_SCREENSHOT_PATH],
                )
                .await?;
                FALLBACK_SCREENSHOT_PATH
            }
        };

        let dest_str = dest.to_string_lossy();
        let pulled = self
            .run_for_device(device_id, &["pull", remote, dest_str.as_ref()])
            .await;

        if let Err(e) = self.run_for_device(device_id, &["shell", "rm", remote]).await {
            debug!("Could not remove {} from {}: {}", remote, device_id, e);
        }

        pulled?;
        Ok(dest.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{CommandOutput, LocalCommandRunner};
    use crate::test_utils::test_metadata;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned outputs and records every invocation
    #[derive(Default)]
    struct ScriptedRunner {
        responses: Mutex<VecDeque<CommandOutput>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedRunner {
        fn with(responses: Vec<CommandOutput>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|args| args.join(" "))
                .collect()
        }
    }

    impl CommandRunner for ScriptedRunner {
        async fn run(
            &self,
            _program: &Path,
            args: &[String],
            _env: &EnvOverrides,
        ) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(args.to_vec());
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ok("")))
        }
    }

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn failed(code: i32, stderr: &str) -> CommandOutput {
        CommandOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    fn fast() -> DaemonOptions {
        DaemonOptions {
            settle_delay: Duration::from_millis(1),
            start_retries: 0,
        }
    }

    #[tokio::test]
    async fn test_ensure_running_success_with_stderr() {
        let runner = ScriptedRunner::with(vec![CommandOutput {
            code: Some(0),
            stdout: String::new(),
            stderr: "* daemon started successfully\n".to_string(),
        }]);
        let adb = Adb::new("/usr/bin/adb", Arc::clone(&runner));

        tokio_test::assert_ok!(adb.ensure_running(fast()).await);
        assert_eq!(runner.calls(), vec!["start-server"]);
    }

    #[tokio::test]
    async fn test_ensure_running_propagates_stderr() {
        let runner = ScriptedRunner::with(vec![failed(1, "cannot bind to port 5037")]);
        let adb = Adb::new("/usr/bin/adb", runner);

        let err = adb.ensure_running(fast()).await.unwrap_err();
        assert!(matches!(err, Error::CommandFailed { code: Some(1), .. }));
        assert_eq!(err.user_message(), "cannot bind to port 5037");
    }

    #[tokio::test]
    async fn test_ensure_running_retries() {
        let runner = ScriptedRunner::with(vec![failed(1, "busy"), failed(1, "busy"), ok("")]);
        let adb = Adb::new("/usr/bin/adb", Arc::clone(&runner));

        let options = DaemonOptions {
            start_retries: 2,
            ..fast()
        };
        adb.ensure_running(options).await.unwrap();
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_running_waits_settle_delay() {
        let runner = ScriptedRunner::with(vec![ok("")]);
        let adb = Adb::new("/usr/bin/adb", runner);
        let options = DaemonOptions {
            settle_delay: Duration::from_millis(500),
            start_retries: 0,
        };

        let started = tokio::time::Instant::now();
        adb.ensure_running(options).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_running_settles_between_retries() {
        let runner = ScriptedRunner::with(vec![failed(1, "busy"), failed(1, "busy"), ok("")]);
        let adb = Adb::new("/usr/bin/adb", Arc::clone(&runner));
        let options = DaemonOptions {
            settle_delay: Duration::from_millis(500),
            start_retries: 2,
        };

        let started = tokio::time::Instant::now();
        adb.ensure_running(options).await.unwrap();
        // Two retry waits plus the final settle
        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_list_devices() {
        let runner = ScriptedRunner::with(vec![ok(
            "List of devices attached\nemulator-5554\tdevice model:Pixel_6\n\n",
        )]);
        let adb = Adb::new("/usr/bin/adb", Arc::clone(&runner));

        let devices = adb.list_devices().await.unwrap();
        assert_eq!(devices, vec![Device::new("emulator-5554", "Pixel 6")]);
        assert_eq!(runner.calls(), vec!["devices -l"]);
    }

    #[tokio::test]
    async fn test_list_packages_targets_device() {
        let runner = ScriptedRunner::with(vec![ok("package:com.whatsapp\npackage:com.x\n")]);
        let adb = Adb::new("/usr/bin/adb", Arc::clone(&runner));
        let metadata = test_metadata(&[("com.whatsapp", "WhatsApp", false)]);

        let apps = adb.list_packages("dev1", &metadata).await.unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(runner.calls(), vec!["-s dev1 shell pm list packages"]);
    }

    #[tokio::test]
    async fn test_list_packages_failure() {
        let runner = ScriptedRunner::with(vec![failed(1, "error: device 'dev1' not found")]);
        let adb = Adb::new("/usr/bin/adb", runner);

        let err = adb
            .list_packages("dev1", &AppMetadata::empty())
            .await
            .unwrap_err();
        assert!(err.user_message().contains("not found"));
    }

    #[tokio::test]
    async fn test_capture_screenshot_primary_path() {
        let runner = ScriptedRunner::with(vec![]);
        let adb = Adb::new("/usr/bin/adb", Arc::clone(&runner));

        let dest = adb
            .capture_screenshot("dev1", Path::new("/tmp/shot.png"))
            .await
            .unwrap();
        assert_eq!(dest, PathBuf::from("/tmp/shot.png"));
        assert_eq!(
            runner.calls(),
            vec![
                "-s dev1 shell input keyevent KEYCODE_WAKEUP",
                "-s dev1 shell screencap -p /sdcard/droidlaunch_screenshot.png",
                "-s dev1 pull /sdcard/droidlaunch_screenshot.png /tmp/shot.png",
                "-s dev1 shell rm /sdcard/droidlaunch_screenshot.png",
            ]
        );
    }

    #[tokio::test]
    async fn test_capture_screenshot_fallback_path() {
        let runner = ScriptedRunner::with(vec![
            ok(""),
            failed(1, "/sdcard: Permission denied"),
            ok(""),
            ok(""),
            ok(""),
        ]);
        let adb = Adb::new("/usr/bin/adb", Arc::clone(&runner));

        adb.capture_screenshot("dev1", Path::new("/tmp/shot.png"))
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(
            calls[2],
            "-s dev1 shell screencap -p /data/local/tmp/droidlaunch_screenshot.png"
        );
        assert_eq!(
            calls[3],
            "-s dev1 pull /data/local/tmp/droidlaunch_screenshot.png /tmp/shot.png"
        );
    }

    #[tokio::test]
    async fn test_capture_screenshot_pull_failure() {
        let runner = ScriptedRunner::with(vec![
            ok(""),
            ok(""),
            failed(1, "remote object does not exist"),
            ok(""),
        ]);
        let adb = Adb::new("/usr/bin/adb", Arc::clone(&runner));

        let err = adb
            .capture_screenshot("dev1", Path::new("/tmp/shot.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
        // Cleanup still ran
        assert_eq!(runner.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_local_runner_variant_is_usable() {
        // The Send variant also satisfies the local trait
        let runner = ScriptedRunner::with(vec![ok("hi")]);
        let output = LocalCommandRunner::run(
            runner.as_ref(),
            Path::new("/usr/bin/adb"),
            &[],
            &EnvOverrides::new(),
        )
        .await
        .unwrap();
        assert_eq!(output.stdout, "hi");
    }
}
