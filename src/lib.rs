pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;

pub use crate::config::LauncherSettings;
pub use crate::core::{engine::LaunchEngine, venv::VenvBootstrap};
pub use crate::utils::error::{BootstrapError, Result};
