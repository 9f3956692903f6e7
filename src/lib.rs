//! droidlaunch library
//!
//! The command-line front end and JSON output. Device discovery, app listing
//! and mirroring live in the `droidlaunch-*` workspace crates.

pub mod cli;
pub mod headless;

pub use cli::{run, Args, Command};
