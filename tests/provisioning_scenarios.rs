//! End-to-end provisioning scenarios.
//!
//! A simulated host and command runner share one `World`: running an action
//! "installs" a tool or creates a path in it, and the next probe sees the
//! change. No real command is executed.

use setup_rexon::libs::executor::ExecutionEvent;
use setup_rexon::libs::prober::HostProbe;
use setup_rexon::libs::prompt::LineSource;
use setup_rexon::libs::report_emitter::summarize;
use setup_rexon::libs::utilities::command_runner::{CommandOutput, CommandRunner, RunError};
use setup_rexon::schemas::config::{ChoicePoint, Invocation, ProvisionConfig};
use setup_rexon::schemas::plan::StepDisposition;
use setup_rexon::schemas::report::{OutcomeStatus, ProvisionReport, ProvisionStatus, SkipReason};
use setup_rexon::{ProvisionError, RunOptions, provision};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

const INSTALL_DIR: &str = "/srv/rexon";

struct World {
    os_release: String,
    package_tool: &'static str,
    tools: RefCell<BTreeMap<String, String>>,
    paths: RefCell<BTreeSet<String>>,
    failing: HashSet<String>,
    ran: RefCell<Vec<String>>,
}

impl World {
    fn debian() -> Self {
        World {
            os_release: "ID=debian\nVERSION_ID=\"12\"\n".into(),
            package_tool: "apt-get",
            tools: RefCell::new(BTreeMap::new()),
            paths: RefCell::new(BTreeSet::new()),
            failing: HashSet::new(),
            ran: RefCell::new(Vec::new()),
        }
    }

    fn rhel() -> Self {
        World {
            os_release: "ID=\"rocky\"\nID_LIKE=\"rhel centos fedora\"\n".into(),
            package_tool: "dnf",
            ..World::debian()
        }
    }

    fn failing(mut self, targets: &[&str]) -> Self {
        self.failing = targets.iter().map(|t| t.to_string()).collect();
        self
    }

    fn ran(&self) -> Vec<String> {
        self.ran.borrow().clone()
    }
}

impl HostProbe for World {
    fn kernel_name(&self) -> String {
        "linux".into()
    }

    fn machine_arch(&self) -> String {
        "x86_64".into()
    }

    fn os_release(&self) -> Option<String> {
        Some(self.os_release.clone())
    }

    fn resolve_executable(&self, name: &str) -> Option<PathBuf> {
        (name == self.package_tool || self.tools.borrow().contains_key(name))
            .then(|| PathBuf::from("/usr/bin").join(name))
    }

    fn version_output(&self, path: &Path, _args: &[String]) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        self.tools.borrow().get(name).map(|version| format!("{name} version {version}\n"))
    }

    fn path_exists(&self, path: &str) -> bool {
        self.paths.borrow().contains(path)
    }

    fn effective_uid(&self) -> Option<u32> {
        Some(0)
    }
}

/// `install-tool <name> <version>` and `touch-path <path>` mutate the world;
/// anything whose first argument is in `failing` exits 1.
impl CommandRunner for World {
    fn run(&self, invocation: &Invocation, _limit: Duration) -> Result<CommandOutput, RunError> {
        let target = invocation.args.first().cloned().unwrap_or_default();
        self.ran.borrow_mut().push(target.clone());
        if self.failing.contains(&target) {
            return Ok(CommandOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: format!("E: Unable to locate package {target}"),
            });
        }
        match invocation.program.as_str() {
            "install-tool" => {
                let version = invocation.args.get(1).cloned().unwrap_or_default();
                self.tools.borrow_mut().insert(target, version);
            }
            "touch-path" => {
                self.paths.borrow_mut().insert(target);
            }
            other => panic!("unexpected program {other}"),
        }
        Ok(CommandOutput {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

struct NoTerminal;

impl LineSource for NoTerminal {
    fn read_line(&mut self, choice: &ChoicePoint) -> io::Result<String> {
        panic!("non-interactive run asked for '{}'", choice.name)
    }
}

const TWO_RUNTIMES: &str = r#"
choices:
  - name: reverse_proxy
    prompt: Configure nginx?
    allowed: ["yes", "no"]
    default: "no"
capabilities:
  - kind: runtime_present
    name: node
    min_version: "18"
    actions: [install-node]
  - kind: runtime_present
    name: git
    min_version: any
    actions: [install-git]
  - kind: service_configured
    name: reverse_proxy
    actions: [configure-proxy]
    gated_by: reverse_proxy
actions:
  - id: install-node
    description: Install Node.js
    provides: { tool: node }
    requires_privilege: true
    variants:
      debian: { program: install-tool, args: [node, "20.11.1"] }
      alpine: { program: install-tool, args: [node, "20.11.1"] }
  - id: install-git
    description: Install git
    provides: { tool: git }
    requires_privilege: true
    variants:
      any: { program: install-tool, args: [git, "2.43.0"] }
  - id: configure-proxy
    description: Configure nginx
    creates: /etc/nginx/conf.d/rexon.conf
    variants:
      any: { program: touch-path, args: [/etc/nginx/conf.d/rexon.conf] }
"#;

const FULL_STACK: &str = r#"
capabilities:
  - kind: runtime_present
    name: node
    min_version: "18"
    actions: [install-node]
  - kind: runtime_present
    name: git
    actions: [install-git]
  - kind: service_configured
    name: rexon
    actions: [install-rexon]
  - kind: service_configured
    name: tunnel
    actions: [install-tunnel]
    optional: true
actions:
  - id: base-packages
    description: Install curl
    provides: { tool: curl }
    variants:
      any: { program: install-tool, args: [curl, "8.5.0"] }
  - id: install-node
    description: Install Node.js
    provides: { tool: node }
    depends_on: [base-packages]
    variants:
      any: { program: install-tool, args: [node, "20.11.1"] }
  - id: install-git
    description: Install git
    provides: { tool: git }
    variants:
      any: { program: install-tool, args: [git, "2.43.0"] }
  - id: install-rexon
    description: Install Rexon
    creates: "{{install_dir}}/bin/rexon"
    depends_on: [install-node, install-git]
    variants:
      any: { program: touch-path, args: ["{{install_dir}}/bin/rexon"] }
  - id: install-tunnel
    description: Install the tunnel agent
    provides: { tool: cloudflared }
    follow_up: cloudflared tunnel login
    variants:
      any: { program: install-tool, args: [cloudflared, "2024.1.0"] }
"#;

fn config(yaml: &str) -> ProvisionConfig {
    let config: ProvisionConfig = serde_yaml::from_str(yaml).unwrap();
    config.validate().unwrap();
    config
}

fn options(presets: &[(&str, &str)]) -> RunOptions {
    let mut options = RunOptions::new(PathBuf::from(INSTALL_DIR));
    options.presets = presets.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    options
}

fn run(world: &World, config: &ProvisionConfig, presets: &[(&str, &str)]) -> Result<ProvisionReport, ProvisionError> {
    provision(config, world, world, &mut NoTerminal, &options(presets), &mut |_: ExecutionEvent<'_>| {})
        .map(|(_, report)| report)
}

fn status_of<'a>(report: &'a ProvisionReport, id: &str) -> &'a OutcomeStatus {
    &report.outcome(id).unwrap_or_else(|| panic!("no outcome for {id}")).status
}

#[test]
fn test_debian_two_runtimes_complete_in_declaration_order() {
    let world = World::debian();
    let report = run(&world, &config(TWO_RUNTIMES), &[]).unwrap();

    let ids: Vec<&str> = report.outcomes.iter().map(|o| o.action_id.as_str()).collect();
    assert_eq!(ids, vec!["install-node", "install-git"]);
    assert!(report.outcomes.iter().all(|o| o.status == OutcomeStatus::Succeeded));
    assert_eq!(report.status, ProvisionStatus::Complete);
    assert_eq!(report.status.exit_code(), 0);
    assert_eq!(world.ran(), vec!["node", "git"]);
}

#[test]
fn test_declined_reverse_proxy_never_appears() {
    let world = World::debian();
    let report = run(&world, &config(TWO_RUNTIMES), &[("reverse_proxy", "no")]).unwrap();
    assert!(report.outcome("configure-proxy").is_none());

    let accepted = World::debian();
    let report = run(&accepted, &config(TWO_RUNTIMES), &[("reverse_proxy", "yes")]).unwrap();
    assert_eq!(status_of(&report, "configure-proxy"), &OutcomeStatus::Succeeded);
}

#[test]
fn test_rhel_without_variant_fails_before_any_side_effect() {
    let world = World::rhel();
    let err = run(&world, &config(TWO_RUNTIMES), &[]).unwrap_err();
    assert!(matches!(err, ProvisionError::UnsatisfiableCapability { ref action, .. } if action == "install-node"));
    assert_eq!(err.exit_code(), 5);
    assert!(world.ran().is_empty());
}

#[test]
fn test_required_failure_aborts_the_rest_of_the_plan() {
    let world = World::debian().failing(&["node"]);
    let report = run(&world, &config(FULL_STACK), &[]).unwrap();

    assert_eq!(report.status, ProvisionStatus::Aborted);
    assert_eq!(report.status.exit_code(), 3);
    assert_eq!(world.ran(), vec!["curl", "node"]);
    assert_eq!(status_of(&report, "base-packages"), &OutcomeStatus::Succeeded);
    assert!(status_of(&report, "install-node").is_failed());
    assert_eq!(
        status_of(&report, "install-rexon"),
        &OutcomeStatus::Skipped { reason: SkipReason::BlockedByFailedDependency }
    );
    // Independent actions, optional or not, do not run once the run is aborted.
    assert_eq!(
        status_of(&report, "install-git"),
        &OutcomeStatus::Skipped { reason: SkipReason::RunAborted }
    );
    assert_eq!(
        status_of(&report, "install-tunnel"),
        &OutcomeStatus::Skipped { reason: SkipReason::RunAborted }
    );

    let summary = summarize(&report);
    assert!(summary.contains("Unable to locate package node"));
    assert!(summary.contains("install-tunnel: cloudflared tunnel login"));
}

#[test]
fn test_optional_failure_is_partial_and_required_path_completes() {
    let world = World::debian().failing(&["cloudflared"]);
    let report = run(&world, &config(FULL_STACK), &[]).unwrap();

    assert_eq!(report.status, ProvisionStatus::PartiallyFailed);
    assert_eq!(report.status.exit_code(), 2);
    for outcome in report.outcomes.iter().filter(|o| o.critical) {
        assert_eq!(outcome.status, OutcomeStatus::Succeeded, "{}", outcome.action_id);
    }
    let tunnel = report.outcome("install-tunnel").unwrap();
    assert!(tunnel.status.is_failed());
    assert_eq!(tunnel.follow_up.as_deref(), Some("cloudflared tunnel login"));
}

#[test]
fn test_second_run_only_skips_what_the_first_run_did() {
    let world = World::debian();
    let config = config(FULL_STACK);

    let first = run(&world, &config, &[]).unwrap();
    assert_eq!(first.status, ProvisionStatus::Complete);
    let first_ran = world.ran().len();
    assert_eq!(first_ran, first.outcomes.len());

    let second = run(&world, &config, &[]).unwrap();
    assert_eq!(second.status, ProvisionStatus::Complete);
    for outcome in &second.outcomes {
        assert_eq!(
            outcome.status,
            OutcomeStatus::Skipped { reason: SkipReason::AlreadySatisfied },
            "{} ran again",
            outcome.action_id
        );
    }
    assert_eq!(world.ran().len(), first_ran, "no command runs on the second pass");
}

#[test]
fn test_plan_respects_dependencies_and_reports_satisfied_steps() {
    let world = World::debian();
    world.tools.borrow_mut().insert("git".into(), "2.39.2".into());
    let prepared = setup_rexon::prepare(&config(FULL_STACK), &world, &mut NoTerminal, &options(&[])).unwrap();

    for (position, step) in prepared.plan.steps.iter().enumerate() {
        for dependency in &step.depends_on {
            assert!(prepared.plan.position(dependency).unwrap() < position);
        }
    }
    assert_eq!(
        prepared.plan.step("install-git").unwrap().disposition,
        StepDisposition::AlreadySatisfied
    );
    assert_eq!(
        prepared.plan.step("install-rexon").unwrap().invocation.args,
        vec![format!("{INSTALL_DIR}/bin/rexon")]
    );
    assert!(world.ran().is_empty());
}
