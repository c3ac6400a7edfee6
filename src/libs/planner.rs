// This module turns the provisioning document into a concrete `InstallPlan`
// for one host. It is the only place that reasons about capabilities,
// dependencies and idempotence; the executor just walks the result.
//
// Planning steps:
// 1. Select capabilities: required ones always, gated ones only when their
//    choice is affirmative.
// 2. Expand each capability into its actions plus their transitive
//    dependencies, resolving every action's command variant for the host's OS
//    family. A required capability with an unsupported action fails the whole
//    plan; an optional one is dropped and listed as unavailable.
// 3. Order the selected actions topologically over `depends_on`, breaking ties
//    by declaration order.
// 4. Render placeholders (values are shell-quoted inside `sh -c` scripts),
//    apply privilege wrapping, and mark steps whose effect is already present
//    as `AlreadySatisfied`.
//
// Planning never touches the host: it only reads the profile.

use crate::libs::prober::host_placeholders;
use crate::libs::utilities::templating::{Rendered, render, render_shell};
use crate::libs::utilities::version_parse::{meets_minimum, parse_min_version};
use crate::schemas::config::{ActionSpec, Capability, CapabilitySpec, Invocation, ProvisionConfig};
use crate::schemas::environment::{EnvironmentProfile, OsFamily};
use crate::schemas::errors::ProvisionError;
use crate::schemas::plan::{
    InstallPlan, PlannedStep, RenderedArtifact, StepDisposition, UnavailableCapability, UserChoices,
};
use crate::{log_debug, log_info, log_warn};
use colored::Colorize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Run-wide knobs that shape the plan.
#[derive(Debug, Clone)]
pub struct PlanSettings {
    pub install_dir: PathBuf,
    /// Used for actions without their own `timeout_secs`.
    pub default_timeout: Duration,
    /// Adds `-n` to `sudo` so a password prompt fails instead of hanging.
    pub non_interactive: bool,
}

/// Builds the install plan for `profile`.
///
/// # Errors
/// * `UnsatisfiableCapability` if a required capability reaches an action
///   with no variant for `profile.os_family`.
/// * `PlanCycle` if the selected actions' dependencies form a cycle.
pub fn plan(
    profile: &EnvironmentProfile,
    config: &ProvisionConfig,
    choices: &UserChoices,
    settings: &PlanSettings,
) -> Result<InstallPlan, ProvisionError> {
    log_debug!("[Planner] Planning for {} with choices {:?}", profile.os_family, choices.values);
    let index: HashMap<&str, usize> = config
        .actions
        .iter()
        .enumerate()
        .map(|(i, action)| (action.id.as_str(), i))
        .collect();

    // Steps 1 and 2: selection and expansion.
    let mut selected: BTreeSet<usize> = BTreeSet::new();
    let mut critical: HashSet<usize> = HashSet::new();
    let mut owner: HashMap<usize, &CapabilitySpec> = HashMap::new();
    let mut unavailable = Vec::new();

    for spec in &config.capabilities {
        if let Some(gate) = &spec.gated_by {
            if !choices.is_affirmative(gate) {
                log_debug!("[Planner] {} declined via choice '{}'", spec.capability, gate);
                continue;
            }
        }

        let closure = dependency_closure(config, &index, &spec.actions)?;
        if let Some(&missing) = closure
            .iter()
            .find(|&&i| config.actions[i].variant_for(profile.os_family).is_none())
        {
            let action = config.actions[missing].id.clone();
            if spec.is_required() {
                return Err(ProvisionError::UnsatisfiableCapability {
                    capability: spec.capability.to_string(),
                    action,
                    os_family: profile.os_family.to_string(),
                });
            }
            log_warn!(
                "[Planner] Optional {} is not available on {}: action '{}' is unsupported. Leaving it out.",
                spec.capability.to_string().yellow(),
                profile.os_family,
                action
            );
            unavailable.push(UnavailableCapability {
                capability: spec.capability.to_string(),
                action,
            });
            continue;
        }

        for &i in &closure {
            selected.insert(i);
            owner.entry(i).or_insert(spec);
            if spec.is_required() {
                critical.insert(i);
            }
        }
    }

    // Step 3: ordering.
    let order = topological_order(config, &index, &selected)?;

    // Step 4: rendering and satisfaction.
    let mut vars = choices.values.clone();
    vars.extend(host_placeholders(
        profile.os_family,
        &profile.architecture,
        profile.package_manager,
        &settings.install_dir,
    ));

    let mut steps = order
        .iter()
        .map(|&i| build_step(&config.actions[i], owner[&i], critical.contains(&i), profile, &vars, settings))
        .collect::<Result<Vec<_>, _>>()?;
    mark_satisfied(&mut steps, config, &index, &owner, profile, &vars);

    let pending = steps.iter().filter(|s| s.disposition == StepDisposition::Execute).count();
    log_info!(
        "[Planner] Plan ready: {} step(s), {} to run, {} already satisfied.",
        steps.len().to_string().bold(),
        pending.to_string().green(),
        (steps.len() - pending).to_string().blue()
    );

    Ok(InstallPlan {
        os_family: profile.os_family,
        steps,
        unavailable,
    })
}

/// The capability's actions plus everything they transitively depend on.
fn dependency_closure(
    config: &ProvisionConfig,
    index: &HashMap<&str, usize>,
    roots: &[String],
) -> Result<BTreeSet<usize>, ProvisionError> {
    let mut closure = BTreeSet::new();
    let mut stack: Vec<&str> = roots.iter().map(String::as_str).collect();
    while let Some(id) = stack.pop() {
        let &i = index
            .get(id)
            .ok_or_else(|| ProvisionError::Config(format!("unknown action '{id}'")))?;
        if closure.insert(i) {
            stack.extend(config.actions[i].depends_on.iter().map(String::as_str));
        }
    }
    Ok(closure)
}

/// Kahn's algorithm over the selected actions. The ready set is ordered by
/// declaration index, so ties always resolve in declaration order.
fn topological_order(
    config: &ProvisionConfig,
    index: &HashMap<&str, usize>,
    selected: &BTreeSet<usize>,
) -> Result<Vec<usize>, ProvisionError> {
    let mut indegree: BTreeMap<usize, usize> = selected.iter().map(|&i| (i, 0)).collect();
    let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();

    for &i in selected {
        for dependency in &config.actions[i].depends_on {
            let d = index[dependency.as_str()];
            if let Some(degree) = indegree.get_mut(&i) {
                *degree += 1;
            }
            dependents.entry(d).or_default().push(i);
        }
    }

    let mut ready: BTreeSet<usize> = indegree
        .iter()
        .filter_map(|(&i, &degree)| (degree == 0).then_some(i))
        .collect();
    let mut order = Vec::with_capacity(selected.len());

    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &dependent in dependents.get(&i).map(Vec::as_slice).unwrap_or_default() {
            if let Some(degree) = indegree.get_mut(&dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(dependent);
                }
            }
        }
    }

    if order.len() != selected.len() {
        let placed: HashSet<usize> = order.iter().copied().collect();
        let actions = selected
            .iter()
            .filter(|i| !placed.contains(i))
            .map(|&i| config.actions[i].id.clone())
            .collect();
        return Err(ProvisionError::PlanCycle { actions });
    }
    Ok(order)
}

fn render_logged(action_id: &str, text: &str, vars: &BTreeMap<String, String>) -> String {
    warn_unknown(action_id, render(text, vars))
}

fn warn_unknown(action_id: &str, rendered: Rendered) -> String {
    if !rendered.unknown.is_empty() {
        log_warn!(
            "[Planner] Action '{}' uses unknown placeholders: {}. Leaving them as written.",
            action_id,
            rendered.unknown.join(", ").yellow()
        );
    }
    rendered.text
}

/// Position of the script in `<shell> [opts] -c <script> [args]`, for the shells
/// whose scripts get quoted placeholder values.
fn shell_script_index(program: &str, args: &[String]) -> Option<usize> {
    let name = Path::new(program).file_name()?.to_str()?;
    if !matches!(name, "sh" | "bash" | "dash" | "zsh") {
        return None;
    }
    let script = args.iter().position(|arg| arg == "-c")? + 1;
    (script < args.len()).then_some(script)
}

fn build_step(
    action: &ActionSpec,
    spec: &CapabilitySpec,
    critical: bool,
    profile: &EnvironmentProfile,
    vars: &BTreeMap<String, String>,
    settings: &PlanSettings,
) -> Result<PlannedStep, ProvisionError> {
    let variant = action
        .variant_for(profile.os_family)
        .ok_or_else(|| ProvisionError::UnsatisfiableCapability {
            capability: spec.capability.to_string(),
            action: action.id.clone(),
            os_family: profile.os_family.to_string(),
        })?;
    let program = render_logged(&action.id, &variant.program, vars);
    let script = shell_script_index(&program, &variant.args);
    let rendered = Invocation {
        args: variant
            .args
            .iter()
            .enumerate()
            .map(|(i, arg)| match script {
                Some(position) if position == i => warn_unknown(&action.id, render_shell(arg, vars)),
                _ => render_logged(&action.id, arg, vars),
            })
            .collect(),
        program,
        env: variant
            .env
            .iter()
            .map(|(key, value)| (key.clone(), render_logged(&action.id, value, vars)))
            .collect(),
    };
    let invocation = if action.requires_privilege {
        elevate(rendered, profile, settings.non_interactive, &action.id)
    } else {
        rendered
    };

    Ok(PlannedStep {
        id: action.id.clone(),
        description: render_logged(&action.id, &action.description, vars),
        capability: spec.capability.name().to_string(),
        invocation,
        artifacts: action
            .artifacts
            .iter()
            .map(|artifact| RenderedArtifact {
                path: render_logged(&action.id, &artifact.path, vars),
                contents: render_logged(&action.id, &artifact.template, vars),
            })
            .collect(),
        idempotent: action.idempotent,
        requires_privilege: action.requires_privilege,
        depends_on: action.depends_on.clone(),
        critical,
        timeout: action
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(settings.default_timeout),
        follow_up: action.follow_up.as_ref().map(|text| render_logged(&action.id, text, vars)),
        disposition: StepDisposition::Execute,
    })
}

/// Wraps a privileged invocation in `sudo` when the run is not already root.
/// Termux has no root and needs none for `pkg`, and Homebrew refuses to run as
/// root, so neither family is wrapped. Without `sudo` the command runs as-is
/// and its failure is reported like any other.
fn elevate(invocation: Invocation, profile: &EnvironmentProfile, non_interactive: bool, action_id: &str) -> Invocation {
    if profile.privileged || matches!(profile.os_family, OsFamily::Termux | OsFamily::Macos) {
        return invocation;
    }
    if !profile.has_tool("sudo") {
        log_warn!(
            "[Planner] Action '{}' needs root but sudo was not found; it will run unprivileged.",
            action_id.yellow()
        );
        return invocation;
    }

    let mut args = Vec::new();
    if non_interactive {
        args.push("-n".to_string());
    }
    if !invocation.env.is_empty() {
        args.push("env".to_string());
        args.extend(invocation.env.iter().map(|(key, value)| format!("{key}={value}")));
    }
    args.push(invocation.program);
    args.extend(invocation.args);
    Invocation {
        program: "sudo".to_string(),
        args,
        env: BTreeMap::new(),
    }
}

/// Minimum version for an action's `provides`: its own, else the owning
/// `RuntimePresent` capability's when it names the same tool.
fn effective_minimum(action: &ActionSpec, spec: &CapabilitySpec) -> Option<semver::Version> {
    let requirement = action.provides.as_ref()?;
    let raw = requirement.min_version.as_deref().or(match &spec.capability {
        Capability::RuntimePresent { name, min_version } if *name == requirement.tool => min_version.as_deref(),
        _ => None,
    })?;
    parse_min_version(raw).ok().flatten()
}

/// Decides `AlreadySatisfied` for every step, last to first so dependents are
/// settled before the steps they depend on.
///
/// * `provides`: tool detected at the required version.
/// * `creates`: marker path detected.
/// * neither: satisfied when it has dependents and all of them are satisfied.
fn mark_satisfied(
    steps: &mut [PlannedStep],
    config: &ProvisionConfig,
    index: &HashMap<&str, usize>,
    owner: &HashMap<usize, &CapabilitySpec>,
    profile: &EnvironmentProfile,
    vars: &BTreeMap<String, String>,
) {
    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
    for step in steps.iter() {
        for dependency in &step.depends_on {
            dependents.entry(dependency.clone()).or_default().push(step.id.clone());
        }
    }

    let mut satisfied: HashSet<String> = HashSet::new();
    for position in (0..steps.len()).rev() {
        let i = index[steps[position].id.as_str()];
        let action = &config.actions[i];

        let tool_check = action.provides.as_ref().map(|requirement| {
            let minimum = effective_minimum(action, owner[&i]);
            profile.has_tool(&requirement.tool)
                && meets_minimum(profile.tool_version(&requirement.tool), minimum.as_ref())
        });
        let path_check = action
            .creates
            .as_ref()
            .map(|raw| profile.has_path(&render(raw, vars).text));

        let done = match (tool_check, path_check) {
            (None, None) => dependents
                .get(&action.id)
                .is_some_and(|ids| ids.iter().all(|id| satisfied.contains(id))),
            (tool, path) => tool.unwrap_or(true) && path.unwrap_or(true),
        };

        if done {
            log_debug!("[Planner] '{}' is already satisfied.", action.id);
            satisfied.insert(action.id.clone());
            steps[position].disposition = StepDisposition::AlreadySatisfied;
        }
    }
}
