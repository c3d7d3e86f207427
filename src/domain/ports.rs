use crate::domain::model::{ActiveEnvironment, PlannedStep};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Resolved launcher settings. Relative paths are relative to `workdir`.
pub trait ConfigProvider: Send + Sync {
    fn workdir(&self) -> &Path;
    fn env_dir(&self) -> &Path;
    fn manifest(&self) -> &Path;
    fn entry_point(&self) -> &Path;
    fn interpreter(&self) -> &str;
    fn upgrade_installer(&self) -> bool;
}

#[async_trait]
pub trait Bootstrap: Send + Sync {
    /// Creates the environment if its directory is absent. Returns `true`
    /// when it was created by this call.
    async fn ensure_environment(&self) -> Result<bool>;

    async fn activate_environment(&self) -> Result<ActiveEnvironment>;

    async fn install_dependencies(&self, env: &ActiveEnvironment) -> Result<()>;

    /// Runs the bot until it exits and returns its exit code.
    async fn launch_bot(&self, env: &ActiveEnvironment) -> Result<i32>;

    /// The steps `ensure`/`activate`/`install`/`launch` would take, without
    /// running anything.
    fn plan(&self) -> Vec<PlannedStep>;
}
