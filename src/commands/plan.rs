// `setup-rexon plan`: probe and plan exactly like `now`, but never prompt and
// never execute. Choices come from `--set` or their defaults.

use crate::cli::cmd_enums::SelectionArgs;
use crate::commands::run_options;
use crate::libs::config_loading::load_config;
use crate::libs::orchestrator::prepare;
use crate::libs::prober::SystemHost;
use crate::libs::prompt::TerminalLineSource;
use crate::libs::report_emitter::describe_plan;
use crate::libs::utilities::command_runner::SystemRunner;
use anyhow::{Context, Result};

pub fn run(selection: SelectionArgs, json: bool) -> Result<i32> {
    let (config, _source) = load_config(selection.config.as_deref())?;
    let options = run_options(&selection, false);

    let runner = SystemRunner::new().context("failed to start the command runtime")?;
    let host = SystemHost::new(&runner);
    let prepared = prepare(&config, &host, &mut TerminalLineSource, &options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&prepared.plan)?);
    } else {
        for notice in &prepared.choices.notices {
            println!("note: {notice}");
        }
        print!("{}", describe_plan(&prepared.plan));
    }
    Ok(0)
}
