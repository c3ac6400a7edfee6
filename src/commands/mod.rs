// Register application subcommands.
// Each module corresponds to a specific `setup-rexon` command-line action.

// Writes the built-in provisioning document to disk.
pub mod generate;
// Probes, plans and executes the installation.
pub mod now;
// Prints the plan without executing it.
pub mod plan;
// Prints the detected environment profile.
pub mod probe;
// Displays the version of setup-rexon.
pub mod version;

use crate::cli::cmd_enums::SelectionArgs;
use crate::libs::orchestrator::RunOptions;
use crate::libs::utilities::path_helpers::{default_install_dir, expand_path};
use crate::schemas::errors::ProvisionError;
use std::path::PathBuf;
use std::time::Duration;

/// `--install-dir` with `~`/`$VAR` expanded, else `~/.rexon`.
pub(crate) fn resolve_install_dir(raw: Option<&str>) -> PathBuf {
    raw.map(expand_path).unwrap_or_else(default_install_dir)
}

pub(crate) fn run_options(selection: &SelectionArgs, interactive: bool) -> RunOptions {
    RunOptions {
        install_dir: resolve_install_dir(selection.install_dir.as_deref()),
        presets: selection
            .set
            .iter()
            .map(|assignment| (assignment.name.clone(), assignment.value.clone()))
            .collect(),
        interactive,
        default_timeout: Duration::from_secs(selection.timeout.max(1)),
    }
}

/// Exit code for a command that failed before producing a report.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ProvisionError>()
        .map(ProvisionError::exit_code)
        .unwrap_or(1)
}
