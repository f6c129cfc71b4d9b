//! CLI command implementations

pub mod cache;
pub mod config;
pub mod key;
pub mod provision;
pub mod save;

pub use cache::execute as cache;
pub use config::execute as config;
pub use key::execute as key;
pub use provision::execute as provision;
pub use save::execute as save;

use crate::cache::LocalCacheStore;
use crate::cli::args::EnvArgs;
use crate::config::{Config, ConfigManager};
use crate::error::VenvResult;
use crate::platform::PlatformContext;
use crate::provision::{ProvisionRequest, VenvProvisioner};
use crate::python::PythonInterpreter;
use tracing::debug;

/// Build a provisioner from CLI arguments layered over the config
pub(crate) async fn build_provisioner(
    env: &EnvArgs,
    config: &Config,
) -> VenvResult<(VenvProvisioner, ProvisionRequest)> {
    let platform =
        PlatformContext::resolve(env.os.clone(), env.arch.clone(), env.workspace.clone())?;
    debug!(
        "Platform: {} ({}) {} in {}",
        platform.os,
        platform.family,
        platform.arch,
        platform.workspace.display()
    );

    let program = env.python.as_deref().unwrap_or(&config.venv.python);
    let python = match env.python_version.as_deref() {
        Some(version) => PythonInterpreter::with_version(program, version),
        None => PythonInterpreter::resolve(program).await?,
    };

    let cache_dir = env
        .cache_dir
        .clone()
        .unwrap_or_else(|| ConfigManager::cache_dir(config));
    debug!("Cache store: {}", cache_dir.display());

    let provisioner = VenvProvisioner::new(
        platform,
        python,
        config.venv.root.clone(),
        Box::new(LocalCacheStore::new(cache_dir)),
    );
    let request = ProvisionRequest::new(env.name.clone(), env.cache_seed.clone());
    Ok((provisioner, request))
}
