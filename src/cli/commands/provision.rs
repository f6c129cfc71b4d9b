//! Provision command - restore or create a virtual environment

use super::build_provisioner;
use crate::cli::args::ProvisionArgs;
use crate::config::Config;
use crate::error::VenvResult;
use crate::outputs::{GithubFiles, StepOutputs};
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the provision command
pub async fn execute(args: ProvisionArgs, config: &Config) -> VenvResult<()> {
    let ctx = UiContext::detect();
    let (provisioner, request) = build_provisioner(&args.env, config).await?;
    let provisioner = provisioner.with_restore(config.cache.enabled && !args.no_restore);

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!(
        "Provisioning {} (Python {})...",
        request.name,
        provisioner.python().version()
    ));

    let outcome = match provisioner.provision(&request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            spinner.stop_error(&format!("Failed to provision {}", request.name));
            return Err(e);
        }
    };

    if outcome.cache_hit {
        spinner.stop(&format!("Restored {} from cache", request.name));
    } else {
        spinner.stop(&format!("Created {}", request.name));
    }
    ui::key_value(&ctx, "cache-key", outcome.cache_key.as_str());
    ui::key_value(
        &ctx,
        "python",
        &outcome.environment.executable.display().to_string(),
    );

    StepOutputs::from(&outcome)
        .emit(args.format, &GithubFiles::from_env())
        .await
}
