pub mod engine;
pub mod process;
pub mod venv;

pub use crate::domain::model::{ActiveEnvironment, LaunchOutcome, Phase, PlannedStep};
pub use crate::domain::ports::{Bootstrap, ConfigProvider};
pub use crate::utils::error::Result;
