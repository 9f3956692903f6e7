//! Command-line front end over [`DeviceCatalog`]

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use droidlaunch_app::config;
use droidlaunch_app::{CatalogEvent, DeviceCatalog};
use droidlaunch_core::prelude::*;
use droidlaunch_daemon::Tool;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::headless::HeadlessEvent;

/// droidlaunch - launch Android apps and mirror devices via adb and scrcpy
#[derive(Parser, Debug)]
#[command(name = "droidlaunch", version)]
#[command(about = "Launch Android apps and mirror devices via adb and scrcpy", long_about = None)]
pub struct Args {
    /// Emit NDJSON events instead of human-readable text
    #[arg(long, global = true)]
    pub json: bool,

    /// Read config.toml from this directory instead of the user config dir
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List connected, authorized devices
    Devices,

    /// List user-facing apps on a device
    Apps {
        /// Device serial
        device: String,
    },

    /// Mirror one app on its own virtual display
    Launch {
        /// Device serial
        device: String,
        /// Package id, e.g. com.whatsapp
        package: String,
    },

    /// Mirror the whole device screen
    Mirror {
        /// Device serial
        device: String,
    },

    /// Save a PNG screenshot
    Screenshot {
        /// Device serial
        device: String,
        /// Destination file (default: droidlaunch-<device>-<time>.png)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Show where adb and scrcpy were found
    Doctor,

    /// Write a default config.toml
    InitConfig,
}

/// Human or JSON output
#[derive(Debug, Clone, Copy)]
struct Output {
    json: bool,
}

impl Output {
    fn error(&self, message: &str) {
        if self.json {
            HeadlessEvent::error(message, true).emit();
        } else {
            eprintln!("error: {}", message);
        }
    }

    /// Print a catalog event; `MirrorOutput` is passed through verbatim
    fn catalog_event(&self, event: &CatalogEvent) {
        if self.json {
            if let Some(json) = HeadlessEvent::from_catalog(event) {
                json.emit();
            }
            return;
        }

        match event {
            CatalogEvent::MirrorStarted {
                device_id,
                package_id: Some(package_id),
                ..
            } => eprintln!("Mirroring {} on {} (Ctrl-C to stop)", package_id, device_id),
            CatalogEvent::MirrorStarted { device_id, .. } => {
                eprintln!("Mirroring {} (Ctrl-C to stop)", device_id)
            }
            CatalogEvent::MirrorOutput { chunk, .. } => eprint!("{}", chunk),
            CatalogEvent::MirrorExited {
                device_id,
                error: None,
                ..
            } => eprintln!("Mirroring of {} ended", device_id),
            CatalogEvent::ScreenshotSaved { path, .. } => println!("{}", path.display()),
            _ => {}
        }
    }
}

fn config_dir(args: &Args) -> Option<PathBuf> {
    args.config_dir.clone().or_else(config::default_config_dir)
}

/// Run the parsed command. Returns whether it succeeded.
pub async fn run(args: Args) -> Result<bool> {
    let out = Output { json: args.json };
    let config_dir = config_dir(&args);

    if args.command == Command::InitConfig {
        let Some(dir) = config_dir else {
            out.error("No user config directory on this platform; pass --config-dir");
            return Ok(false);
        };
        let path = config::init_config_dir(&dir)?;
        if out.json {
            HeadlessEvent::config_created(&path.display().to_string()).emit();
        } else {
            println!("{}", path.display());
        }
        return Ok(true);
    }

    let settings = match &args.config_dir {
        Some(dir) => config::load_settings(dir),
        None => config::load_user_settings(),
    };
    let catalog = DeviceCatalog::new(&settings);

    let ok = match &args.command {
        Command::Devices => list_devices(&catalog, out).await,
        Command::Apps { device } => list_apps(&catalog, device, out).await,
        Command::Launch { device, package } => {
            let events = catalog.subscribe();
            catalog.launch_app(package, device);
            follow_session(&catalog, events, device, out).await
        }
        Command::Mirror { device } => {
            let events = catalog.subscribe();
            catalog.mirror_device(device);
            follow_session(&catalog, events, device, out).await
        }
        Command::Screenshot { device, output } => {
            let dest = output.clone().unwrap_or_else(|| default_screenshot_path(device));
            screenshot(&catalog, device, &dest, out).await
        }
        Command::Doctor => doctor(&catalog, config_dir.as_deref(), out),
        Command::InitConfig => true,
    };

    catalog.shutdown().await;
    Ok(ok)
}

/// Wait for the first event `pick` accepts
async fn next_matching<T>(
    events: &mut broadcast::Receiver<CatalogEvent>,
    mut pick: impl FnMut(CatalogEvent) -> Option<T>,
) -> Option<T> {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(found) = pick(event) {
                    return Some(found);
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!("Missed {} catalog events", skipped),
            Err(RecvError::Closed) => return None,
        }
    }
}

async fn list_devices(catalog: &DeviceCatalog, out: Output) -> bool {
    let mut events = catalog.subscribe();
    catalog.refresh();

    let outcome = next_matching(&mut events, |event| match event {
        CatalogEvent::DevicesUpdated { .. } => Some(Ok(())),
        CatalogEvent::Error { message } => Some(Err(message)),
        _ => None,
    })
    .await;

    match outcome {
        Some(Ok(())) => {
            let devices = catalog.devices().borrow().clone();
            for device in &devices {
                if out.json {
                    HeadlessEvent::device(device).emit();
                } else {
                    println!("{}\t{}", device.id, device.display_name);
                }
            }
            if devices.is_empty() && !out.json {
                eprintln!("No devices connected");
            }
            true
        }
        Some(Err(message)) => {
            out.error(&message);
            false
        }
        None => false,
    }
}

async fn list_apps(catalog: &DeviceCatalog, device_id: &str, out: Output) -> bool {
    let mut events = catalog.subscribe();
    catalog.fetch_apps(device_id);

    let outcome = next_matching(&mut events, |event| match event {
        CatalogEvent::AppsUpdated { .. } => Some(Ok(())),
        CatalogEvent::Error { message } => Some(Err(message)),
        _ => None,
    })
    .await;

    match outcome {
        Some(Ok(())) => {
            for app in catalog.apps().borrow().iter() {
                if out.json {
                    HeadlessEvent::app(device_id, app).emit();
                } else {
                    println!("{}\t{}", app.package_id, app.display_name);
                }
            }
            true
        }
        Some(Err(message)) => {
            out.error(&message);
            false
        }
        None => false,
    }
}

/// Stay attached until the session on `device_id` ends.
///
/// The first Ctrl-C asks the session to stop; the exit is still awaited.
async fn follow_session(
    catalog: &DeviceCatalog,
    mut events: broadcast::Receiver<CatalogEvent>,
    device_id: &str,
    out: Output,
) -> bool {
    let mut stop_sent = false;

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) if event.device_id() == Some(device_id) => {
                    out.catalog_event(&event);
                    match event {
                        CatalogEvent::MirrorFailed { message, .. } => {
                            if !out.json {
                                out.error(&message);
                            }
                            return false;
                        }
                        CatalogEvent::MirrorExited { error, .. } => {
                            if let (Some(message), false) = (&error, out.json) {
                                out.error(message);
                            }
                            return error.is_none();
                        }
                        _ => {}
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!("Missed {} catalog events", skipped),
                Err(RecvError::Closed) => return false,
            },
            signal = tokio::signal::ctrl_c(), if !stop_sent => {
                if let Err(e) = signal {
                    warn!("Cannot listen for Ctrl-C: {}", e);
                }
                info!("Interrupt received, stopping mirroring on {}", device_id);
                catalog.stop_mirroring(device_id);
                stop_sent = true;
            }
        }
    }
}

fn default_screenshot_path(device_id: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let safe_id: String = device_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    PathBuf::from(format!("droidlaunch-{}-{}.png", safe_id, stamp))
}

async fn screenshot(catalog: &DeviceCatalog, device_id: &str, dest: &Path, out: Output) -> bool {
    let mut events = catalog.subscribe();

    match catalog.capture_screenshot(device_id, dest).await {
        Ok(_) => {
            // Printed from the event so JSON and text share one path
            if let Some(event) = next_matching(&mut events, |event| {
                matches!(event, CatalogEvent::ScreenshotSaved { .. }).then_some(event)
            })
            .await
            {
                out.catalog_event(&event);
            }
            true
        }
        Err(e) => {
            out.error(&e.user_message());
            false
        }
    }
}

fn doctor(catalog: &DeviceCatalog, config_dir: Option<&Path>, out: Output) -> bool {
    let availability = catalog.tool_availability();

    for tool in [Tool::Adb, Tool::Scrcpy] {
        let path = availability.path(tool).map(|p| p.display().to_string());
        let message = availability.missing_message(tool);

        if out.json {
            HeadlessEvent::tool(tool.binary_name(), path, message).emit();
        } else {
            match (path, message) {
                (Some(path), _) => println!("{:<8} {}", tool.binary_name(), path),
                (None, Some(message)) => println!("{:<8} missing: {}", tool.binary_name(), message),
                (None, None) => {}
            }
        }
    }

    if !out.json {
        if availability.can_list_devices() && !availability.can_mirror() {
            println!("Device and app listing work; mirroring needs scrcpy");
        }
        if let Some(dir) = config_dir {
            println!("{:<8} {}", "config", config::config_file(dir).display());
        }
        if let Ok(log_file) = droidlaunch_core::logging::get_current_log_file() {
            println!("{:<8} {}", "log", log_file.display());
        }
    }

    availability.can_list_devices()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_launch() {
        let args = Args::parse_from(["droidlaunch", "--json", "launch", "dev1", "com.whatsapp"]);
        assert!(args.json);
        assert_eq!(
            args.command,
            Command::Launch {
                device: "dev1".into(),
                package: "com.whatsapp".into()
            }
        );
    }

    #[test]
    fn test_parse_screenshot_output() {
        let args = Args::parse_from(["droidlaunch", "screenshot", "dev1", "-o", "/tmp/a.png"]);
        assert_eq!(
            args.command,
            Command::Screenshot {
                device: "dev1".into(),
                output: Some(PathBuf::from("/tmp/a.png"))
            }
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["droidlaunch", "devices", "--config-dir", "/tmp/cfg"]);
        assert_eq!(args.config_dir, Some(PathBuf::from("/tmp/cfg")));
    }

    #[test]
    fn test_default_screenshot_path_is_file_safe() {
        let path = default_screenshot_path("192.168.1.20:5555");
        let name = path.to_string_lossy();
        assert!(name.starts_with("droidlaunch-192_168_1_20_5555-"));
        assert!(name.ends_with(".png"));
    }
}
