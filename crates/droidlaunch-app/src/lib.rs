//! # droidlaunch-app - Catalog State and Session Orchestration
//!
//! Composes the tool drivers from [`droidlaunch_daemon`] into a reactive
//! [`DeviceCatalog`]. The catalog follows The Elm Architecture:
//!
//! - **State**: [`CatalogState`], owned by a single loop task
//! - **Messages**: [`Message`] from consumers, background tasks and sessions
//! - **Update**: [`handler::update`] applies a message and may request an [`UpdateAction`]
//! - **Actions**: [`actions::handle_action`] runs I/O off the loop and reports back
//!
//! ## Public API
//!
//! - [`DeviceCatalog`] - `refresh`, `fetch_apps`, `launch_app`, `mirror_device`,
//!   `stop_mirroring`, `capture_screenshot`, `shutdown`; `devices`/`apps`/
//!   `error`/`loading` watch slots and a [`CatalogEvent`] broadcast
//! - [`MirrorSessionManager`] - One `scrcpy` session per device
//! - [`config::Settings`] - `config.toml` schema and loading

pub mod actions;
pub mod catalog;
pub mod config;
pub mod event;
pub mod handler;
pub mod message;
pub mod mirror;
pub mod state;

pub use catalog::{DeviceCatalog, SHUTDOWN_TIMEOUT};
pub use config::Settings;
pub use event::CatalogEvent;
pub use handler::{update, UpdateAction, UpdateResult};
pub use message::Message;
pub use mirror::{MirrorEvent, MirrorSessionManager, SessionId};
pub use state::{CatalogState, RequestId};
