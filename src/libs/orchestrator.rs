// Wires the five stages of a run together: probe the host, resolve choices,
// plan, and (for `provision`) execute. Commands and scenario tests both go
// through here so the stage order lives in one place.
//
// Re-planning after a changed answer means calling `prepare` again; a plan is
// never patched in place.

use crate::libs::executor::{ExecutionEvent, execute};
use crate::libs::planner::{PlanSettings, plan};
use crate::libs::prober::{HostProbe, ProbeTargets, probe};
use crate::libs::prompt::{LineSource, resolve};
use crate::libs::utilities::command_runner::CommandRunner;
use crate::log_debug;
use crate::schemas::config::ProvisionConfig;
use crate::schemas::environment::EnvironmentProfile;
use crate::schemas::errors::ProvisionError;
use crate::schemas::plan::{InstallPlan, UserChoices};
use crate::schemas::report::ProvisionReport;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default per-action timeout when an action sets none.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(1800);

/// Everything a run needs besides the configuration and the host.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub install_dir: PathBuf,
    /// `--set name=value` presets.
    pub presets: BTreeMap<String, String>,
    /// Prompt for choices without a preset.
    pub interactive: bool,
    pub default_timeout: Duration,
}

impl RunOptions {
    pub fn new(install_dir: PathBuf) -> Self {
        RunOptions {
            install_dir,
            presets: BTreeMap::new(),
            interactive: false,
            default_timeout: DEFAULT_ACTION_TIMEOUT,
        }
    }
}

/// Output of the planning stages, before anything touches the host.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub profile: EnvironmentProfile,
    pub choices: UserChoices,
    pub plan: InstallPlan,
}

/// Probes the host and builds its profile.
pub fn probe_host(
    config: &ProvisionConfig,
    host: &dyn HostProbe,
    options: &RunOptions,
) -> Result<EnvironmentProfile, ProvisionError> {
    let targets = ProbeTargets::for_config(config, &options.install_dir);
    probe(host, &targets)
}

/// Probe, prompt and plan. Fails before any side effect on
/// `UnsupportedEnvironment`, `UnsatisfiableCapability`, `PlanCycle` or a
/// prompt I/O error.
pub fn prepare(
    config: &ProvisionConfig,
    host: &dyn HostProbe,
    source: &mut dyn LineSource,
    options: &RunOptions,
) -> Result<PreparedRun, ProvisionError> {
    let profile = probe_host(config, host, options)?;
    let choices = resolve(&config.choices, &options.presets, source, options.interactive)?;
    let settings = PlanSettings {
        install_dir: options.install_dir.clone(),
        default_timeout: options.default_timeout,
        non_interactive: !options.interactive,
    };
    let plan = plan(&profile, config, &choices, &settings)?;
    log_debug!("[Orchestrator] Prepared {} step(s) for {}", plan.steps.len(), profile.os_family);
    Ok(PreparedRun { profile, choices, plan })
}

/// A complete run: `prepare`, then execute the plan through `runner`.
pub fn provision(
    config: &ProvisionConfig,
    host: &dyn HostProbe,
    runner: &dyn CommandRunner,
    source: &mut dyn LineSource,
    options: &RunOptions,
    on_event: &mut dyn FnMut(ExecutionEvent<'_>),
) -> Result<(PreparedRun, ProvisionReport), ProvisionError> {
    let prepared = prepare(config, host, source, options)?;
    let report = execute(&prepared.plan, runner, on_event);
    Ok((prepared, report))
}
