// `setup-rexon probe`: print the environment profile for this host.

use crate::commands::resolve_install_dir;
use crate::libs::config_loading::load_config;
use crate::libs::orchestrator::{RunOptions, probe_host};
use crate::libs::prober::SystemHost;
use crate::libs::utilities::command_runner::SystemRunner;
use crate::schemas::environment::{EnvironmentProfile, ToolPresence};
use anyhow::{Context, Result};
use colored::Colorize;
use std::fmt::Write;

pub fn run(config: Option<String>, install_dir: Option<String>, json: bool) -> Result<i32> {
    let (config, _source) = load_config(config.as_deref())?;
    let options = RunOptions::new(resolve_install_dir(install_dir.as_deref()));

    let runner = SystemRunner::new().context("failed to start the command runtime")?;
    let profile = probe_host(&config, &SystemHost::new(&runner), &options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        print!("{}", describe_profile(&profile));
    }
    Ok(0)
}

fn describe_profile(profile: &EnvironmentProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "OS family:       {}", profile.os_family.to_string().bold());
    let _ = writeln!(out, "Architecture:    {}", profile.architecture);
    let _ = writeln!(out, "Package manager: {}", profile.package_manager);
    let _ = writeln!(out, "Kernel:          {}", profile.kernel);
    let _ = writeln!(out, "Privileged:      {}", if profile.privileged { "yes" } else { "no" });
    let _ = writeln!(out, "Tools:");
    for (name, presence) in &profile.detected_tools {
        let state = match presence {
            ToolPresence::Present { version: Some(version) } => version.to_string().green(),
            ToolPresence::Present { version: None } => "present".green(),
            ToolPresence::Absent => "absent".dimmed(),
        };
        let _ = writeln!(out, "  {name:<14} {state}");
    }
    if !profile.detected_paths.is_empty() {
        let _ = writeln!(out, "Existing paths:");
        for path in &profile.detected_paths {
            let _ = writeln!(out, "  {path}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::environment::{Architecture, OsFamily, PackageManager};
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn test_describe_profile_lists_tools() {
        let mut tools = BTreeMap::new();
        tools.insert(
            "node".to_string(),
            ToolPresence::Present { version: Some(semver::Version::new(20, 11, 1)) },
        );
        tools.insert("git".to_string(), ToolPresence::Absent);
        let profile = EnvironmentProfile {
            os_family: OsFamily::Debian,
            architecture: Architecture::Arm64,
            package_manager: PackageManager::Apt,
            kernel: "linux".into(),
            privileged: false,
            detected_tools: tools,
            detected_paths: BTreeSet::from(["/home/u/.rexon/bin/rexon".to_string()]),
        };
        let text = describe_profile(&profile);
        assert!(text.contains("Debian"));
        assert!(text.contains("arm64"));
        assert!(text.contains("20.11.1"));
        assert!(text.contains("absent"));
        assert!(text.contains("/home/u/.rexon/bin/rexon"));
    }
}
