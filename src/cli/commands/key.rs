//! Key command - print the cache key for an environment

use super::build_provisioner;
use crate::cli::args::KeyArgs;
use crate::config::Config;
use crate::error::VenvResult;

/// Execute the key command
pub async fn execute(args: KeyArgs, config: &Config) -> VenvResult<()> {
    let (provisioner, request) = build_provisioner(&args.env, config).await?;
    println!("{}", provisioner.cache_key(&request)?);
    Ok(())
}
