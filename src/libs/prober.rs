// This module inspects the host and builds the run's `EnvironmentProfile`:
// OS family, package manager, architecture, privilege level, the versions of a
// fixed list of candidate tools, and which `creates` marker paths already exist.
//
// Probing is read-only. All host access goes through the `HostProbe` trait so
// the detection cascade can be exercised against scripted hosts in tests.

use crate::libs::utilities::command_runner::CommandRunner;
use crate::libs::utilities::platform::{KernelKind, normalize_arch, normalize_kernel, os_release_ids};
use crate::libs::utilities::templating::render;
use crate::libs::utilities::version_parse::parse_version_output;
use crate::schemas::config::{Invocation, ProvisionConfig, ToolProbe};
use crate::schemas::environment::{Architecture, EnvironmentProfile, OsFamily, PackageManager, ToolPresence};
use crate::schemas::errors::ProvisionError;
use crate::{log_debug, log_info, log_warn};
use colored::Colorize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tools probed on every run, whatever the configuration says.
pub const CANDIDATE_TOOLS: &[&str] = &[
    "sh",
    "curl",
    "git",
    "node",
    "npm",
    "nginx",
    "cloudflared",
    "sudo",
    "systemctl",
    "termux-info",
    "apt-get",
    "dnf",
    "yum",
    "apk",
    "brew",
    "pkg",
];

/// Directories checked when an executable is not on PATH.
const FALLBACK_DIRS: &[&str] = &[
    "/usr/local/bin",
    "/usr/bin",
    "/usr/sbin",
    "/sbin",
    "/opt/homebrew/bin",
    "/data/data/com.termux/files/usr/bin",
];

const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Read-only access to the facts the prober needs.
pub trait HostProbe {
    /// Kernel / OS name, e.g. `std::env::consts::OS`.
    fn kernel_name(&self) -> String;
    /// Machine architecture, e.g. `std::env::consts::ARCH`.
    fn machine_arch(&self) -> String;
    /// Contents of the os-release file, if any.
    fn os_release(&self) -> Option<String>;
    /// Full path of an executable, if it can be resolved.
    fn resolve_executable(&self, name: &str) -> Option<PathBuf>;
    /// Output of running `path args..`, if it exited successfully.
    fn version_output(&self, path: &Path, args: &[String]) -> Option<String>;
    fn path_exists(&self, path: &str) -> bool;
    fn effective_uid(&self) -> Option<u32>;
}

/// The real host, probed through a [`CommandRunner`] for version checks.
pub struct SystemHost<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> SystemHost<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        SystemHost { runner }
    }

    fn run_quiet(&self, invocation: &Invocation) -> Option<String> {
        match self.runner.run(invocation, VERSION_TIMEOUT) {
            Ok(output) if output.success() => {
                // Some tools (nginx -v) print their version on stderr.
                if output.stdout.trim().is_empty() { Some(output.stderr) } else { Some(output.stdout) }
            }
            Ok(output) => {
                log_debug!("[Prober] '{}' exited with {:?}", invocation, output.exit_code);
                None
            }
            Err(e) => {
                log_debug!("[Prober] '{}' could not run: {}", invocation, e);
                None
            }
        }
    }
}

impl HostProbe for SystemHost<'_> {
    fn kernel_name(&self) -> String {
        std::env::consts::OS.to_string()
    }

    fn machine_arch(&self) -> String {
        std::env::consts::ARCH.to_string()
    }

    fn os_release(&self) -> Option<String> {
        ["/etc/os-release", "/usr/lib/os-release"]
            .iter()
            .find_map(|path| std::fs::read_to_string(path).ok())
    }

    fn resolve_executable(&self, name: &str) -> Option<PathBuf> {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
        let home_dirs = dirs::home_dir()
            .map(|home| vec![home.join(".local/bin"), home.join("bin")])
            .unwrap_or_default();
        FALLBACK_DIRS
            .iter()
            .map(PathBuf::from)
            .chain(home_dirs)
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    fn version_output(&self, path: &Path, args: &[String]) -> Option<String> {
        let invocation = Invocation {
            program: path.to_string_lossy().into_owned(),
            args: args.to_vec(),
            env: BTreeMap::new(),
        };
        self.run_quiet(&invocation)
    }

    fn path_exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn effective_uid(&self) -> Option<u32> {
        self.run_quiet(&Invocation::new("id", &["-u"]))
            .and_then(|out| out.trim().parse().ok())
    }
}

/// What to look for beyond the OS signature.
#[derive(Debug, Clone)]
pub struct ProbeTargets {
    pub tools: Vec<ToolProbe>,
    /// `creates` paths; may use the `install_dir`, `os_family`, `arch` and
    /// `package_manager` placeholders.
    pub marker_paths: Vec<String>,
    pub install_dir: PathBuf,
}

impl ProbeTargets {
    /// Candidate list, then the configuration's `probe_tools` (which override
    /// version arguments by name), then every tool an action `provides`.
    pub fn for_config(config: &ProvisionConfig, install_dir: &Path) -> Self {
        let mut tools: Vec<ToolProbe> = CANDIDATE_TOOLS.iter().map(|name| ToolProbe::named(name)).collect();
        for probe in &config.probe_tools {
            match tools.iter_mut().find(|known| known.name == probe.name) {
                Some(known) => known.version_args = probe.version_args.clone(),
                None => tools.push(probe.clone()),
            }
        }
        for action in &config.actions {
            if let Some(requirement) = &action.provides {
                if !tools.iter().any(|known| known.name == requirement.tool) {
                    tools.push(ToolProbe::named(&requirement.tool));
                }
            }
        }
        let marker_paths = config.actions.iter().filter_map(|action| action.creates.clone()).collect();
        ProbeTargets {
            tools,
            marker_paths,
            install_dir: install_dir.to_path_buf(),
        }
    }
}

/// Placeholder values derived from the host, shared by the prober (marker
/// paths) and the planner (commands, artifacts).
pub fn host_placeholders(
    os_family: OsFamily,
    architecture: &Architecture,
    package_manager: PackageManager,
    install_dir: &Path,
) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    vars.insert("install_dir".to_string(), install_dir.to_string_lossy().into_owned());
    vars.insert("os_family".to_string(), os_family.key().to_string());
    vars.insert("arch".to_string(), architecture.as_str().to_string());
    vars.insert("package_manager".to_string(), package_manager.key().to_string());
    vars
}

/// Identifies OS family and package manager. First match wins:
/// Termux marker, Alpine signature, Linux + apt, Linux + dnf/yum, Darwin.
fn detect_family(host: &dyn HostProbe, kernel: KernelKind) -> Result<(OsFamily, PackageManager), ProvisionError> {
    if host.resolve_executable("termux-info").is_some() {
        return Ok((OsFamily::Termux, PackageManager::TermuxApt));
    }

    let release_ids = host.os_release().map(|contents| os_release_ids(&contents)).unwrap_or_default();
    if release_ids.iter().any(|id| id == "alpine") {
        return Ok((OsFamily::Alpine, PackageManager::Apk));
    }

    if kernel == KernelKind::Linux {
        if host.resolve_executable("apt-get").is_some() {
            return Ok((OsFamily::Debian, PackageManager::Apt));
        }
        if host.resolve_executable("dnf").is_some() {
            return Ok((OsFamily::Rhel, PackageManager::Dnf));
        }
        if host.resolve_executable("yum").is_some() {
            return Ok((OsFamily::Rhel, PackageManager::Yum));
        }
    }

    if kernel == KernelKind::Darwin {
        return Ok((OsFamily::Macos, PackageManager::Brew));
    }

    Err(ProvisionError::UnsupportedEnvironment {
        details: format!(
            "kernel '{}', os-release ids [{}], no apt-get/dnf/yum found",
            host.kernel_name(),
            release_ids.join(", ")
        ),
    })
}

fn detect_tool(host: &dyn HostProbe, probe: &ToolProbe) -> ToolPresence {
    let Some(path) = host.resolve_executable(&probe.name) else {
        return ToolPresence::Absent;
    };
    let version = host
        .version_output(&path, &probe.version_args)
        .and_then(|output| parse_version_output(&output));
    log_debug!(
        "[Prober] Found {} at {} (version {:?})",
        probe.name.cyan(),
        path.display(),
        version.as_ref().map(ToString::to_string)
    );
    ToolPresence::Present { version }
}

/// Builds the environment profile for this run.
///
/// Fails only with `UnsupportedEnvironment`; missing tools are recorded as
/// `Absent`, never treated as errors.
pub fn probe(host: &dyn HostProbe, targets: &ProbeTargets) -> Result<EnvironmentProfile, ProvisionError> {
    log_debug!("[Prober] Probing host environment...");
    let kernel = host.kernel_name();
    let (os_family, package_manager) = detect_family(host, normalize_kernel(&kernel))?;
    let architecture = normalize_arch(&host.machine_arch());
    log_info!(
        "[Prober] Detected {} on {} (package manager: {})",
        os_family.to_string().bright_blue().bold(),
        architecture.to_string().cyan(),
        package_manager.to_string().yellow()
    );

    let detected_tools = targets
        .tools
        .iter()
        .map(|probe| (probe.name.clone(), detect_tool(host, probe)))
        .collect();

    let vars = host_placeholders(os_family, &architecture, package_manager, &targets.install_dir);
    let mut detected_paths = BTreeSet::new();
    for raw in &targets.marker_paths {
        let rendered = render(raw, &vars);
        if !rendered.unknown.is_empty() {
            log_warn!(
                "[Prober] Marker path '{}' uses unknown placeholders: {}",
                raw,
                rendered.unknown.join(", ")
            );
        }
        if host.path_exists(&rendered.text) {
            detected_paths.insert(rendered.text);
        }
    }

    Ok(EnvironmentProfile {
        os_family,
        architecture,
        package_manager,
        kernel,
        privileged: host.effective_uid() == Some(0),
        detected_tools,
        detected_paths,
    })
}
