//! Configuration file parsing for droidlaunch
//!
//! Settings live in `<config_dir>/droidlaunch/config.toml`.

pub mod settings;
pub mod types;

pub use settings::{
    config_file, default_config_dir, init_config_dir, load_settings, load_user_settings,
};
pub use types::*;
