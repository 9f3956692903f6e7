//! droidlaunch - launch Android apps and mirror devices via adb and scrcpy
//!
//! This is the binary entry point. All logic lives in the library.

use std::process::ExitCode;

use clap::Parser;
use droidlaunch::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;

    let args = Args::parse();

    // Logging goes to a file; a read-only data dir must not block the command
    if let Err(e) = droidlaunch_core::logging::init() {
        eprintln!("warning: file logging disabled: {}", e);
    }

    let ok = droidlaunch::run(args).await?;
    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
