//! User-supplied setup scripts, run unprivileged through `bash -c`.

use super::steps::StepContext;
use crate::blueprint::Script;
use crate::command_runner::CommandRequest;
use crate::error::{ProvisionError, Result};

/// Run every script in order. The first failure stops the rest.
pub fn run_scripts(ctx: &StepContext<'_>, scripts: &[Script]) -> Result<()> {
    if scripts.is_empty() {
        ctx.log.line("No setup scripts configured.");
        return Ok(());
    }

    for script in scripts {
        ctx.log.line(format!("Running script: {}", script.name));
        ctx.run(CommandRequest::new("bash").args(["-c", script.command.as_str()]))
            .map_err(|e| ProvisionError::step(format!("script {} failed: {}", script.name, e)))?;
    }
    Ok(())
}
