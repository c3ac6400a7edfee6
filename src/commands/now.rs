// This file contains the primary logic for the `setup-rexon now` command.
// It loads the provisioning document, probes the host, resolves choices,
// plans, and executes the plan, then prints the report.

use crate::cli::cmd_enums::SelectionArgs;
use crate::commands::run_options;
use crate::libs::config_loading::load_config;
use crate::libs::executor::{ExecutionEvent, execute};
use crate::libs::orchestrator::prepare;
use crate::libs::prober::SystemHost;
use crate::libs::prompt::TerminalLineSource;
use crate::libs::report_emitter::{describe_plan, summarize};
use crate::libs::utilities::command_runner::SystemRunner;
use crate::schemas::report::OutcomeStatus;
use crate::{log_debug, log_info};
use anyhow::{Context, Result};
use colored::Colorize;
use std::io::IsTerminal;

/// Runs the whole installation and returns the process exit code.
pub fn run(selection: SelectionArgs, dry_run: bool, json: bool) -> Result<i32> {
    log_debug!("Entered now::run() function.");

    let (config, _source) = load_config(selection.config.as_deref())?;
    let interactive = !selection.non_interactive && std::io::stdin().is_terminal();
    let options = run_options(&selection, interactive);
    log_info!("Installing into {}", options.install_dir.display().to_string().cyan());

    let runner = SystemRunner::new().context("failed to start the command runtime")?;
    let host = SystemHost::new(&runner);
    let prepared = prepare(&config, &host, &mut TerminalLineSource, &options)?;

    if dry_run {
        log_info!("Dry run: nothing will be executed.");
        if json {
            println!("{}", serde_json::to_string_pretty(&prepared.plan)?);
        } else {
            print!("{}", describe_plan(&prepared.plan));
        }
        return Ok(0);
    }

    let report = execute(&prepared.plan, &runner, &mut |event| match event {
        ExecutionEvent::Started { .. } => {}
        ExecutionEvent::Finished { outcome } => {
            let label = outcome.status.label();
            let colored_label = match outcome.status {
                OutcomeStatus::Succeeded => label.green(),
                OutcomeStatus::Skipped { .. } => label.blue(),
                OutcomeStatus::Failed { .. } => label.red(),
            };
            log_info!("[Executor] {} {}", outcome.action_id.bold(), colored_label);
        }
    });

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to serialize the report")?
        );
    } else {
        print!("{}", summarize(&report));
    }
    Ok(report.status.exit_code())
}
