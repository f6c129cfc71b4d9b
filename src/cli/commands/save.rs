//! Save command - publish an environment to the cache after the job

use super::build_provisioner;
use crate::cache::format_bytes;
use crate::cli::args::SaveArgs;
use crate::config::Config;
use crate::error::VenvResult;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the save command
pub async fn execute(args: SaveArgs, config: &Config) -> VenvResult<()> {
    let ctx = UiContext::detect();
    let (provisioner, request) = build_provisioner(&args.env, config).await?;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Saving {} to cache...", request.name));

    match provisioner.save(&request).await {
        Ok(info) => {
            spinner.stop(&format!(
                "Saved {} ({})",
                request.name,
                format_bytes(info.size_bytes)
            ));
            ui::key_value(&ctx, "cache-key", &info.key);
            Ok(())
        }
        Err(e) => {
            spinner.stop_error(&format!("Failed to save {}", request.name));
            Err(e)
        }
    }
}
