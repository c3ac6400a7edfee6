//! # Provisioning Configuration Schema
//!
//! This module defines the declarative document the planner works from: the
//! capabilities a run must satisfy, the actions that satisfy them (one command
//! variant per OS family), the choice points the prompt layer resolves, and
//! extra tools the prober should look for.
//!
//! ## Usage Example
//!
//! ```yaml
//! choices:
//!   - name: reverse_proxy
//!     prompt: Configure an nginx reverse proxy?
//!     allowed: ["yes", "no"]
//!     default: "no"
//! capabilities:
//!   - kind: runtime_present
//!     name: git
//!     actions: [install-git]
//! actions:
//!   - id: install-git
//!     description: Install git
//!     provides: { tool: git }
//!     requires_privilege: true
//!     variants:
//!       debian: { program: apt-get, args: [install, -y, git] }
//!       macos: { program: brew, args: [install, git] }
//!       rhel: unsupported
//! ```

use crate::libs::utilities::templating::shell_quote;
use crate::libs::utilities::version_parse::parse_min_version;
use crate::schemas::environment::OsFamily;
use crate::schemas::errors::ProvisionError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

// ============================================================================
// CAPABILITIES
// ============================================================================

/// An abstract requirement the run must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Capability {
    /// A runtime or tool is installed, optionally at a minimum version.
    RuntimePresent {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_version: Option<String>,
    },
    /// A service is installed and configured.
    ServiceConfigured { name: String },
}

impl Capability {
    pub fn name(&self) -> &str {
        match self {
            Capability::RuntimePresent { name, .. } | Capability::ServiceConfigured { name } => name,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Capability::RuntimePresent { name, min_version: Some(min) } => {
                write!(f, "RuntimePresent({name}, >= {min})")
            }
            Capability::RuntimePresent { name, min_version: None } => write!(f, "RuntimePresent({name})"),
            Capability::ServiceConfigured { name } => write!(f, "ServiceConfigured({name})"),
        }
    }
}

/// A capability together with the actions that satisfy it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySpec {
    #[serde(flatten)]
    pub capability: Capability,
    /// Action ids, in the order they were declared for this capability.
    pub actions: Vec<String>,
    /// Optional capabilities never abort the run when their actions fail.
    #[serde(default)]
    pub optional: bool,
    /// Name of a choice point that must be affirmative for this capability to
    /// be planned at all. Gated capabilities are always optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gated_by: Option<String>,
}

impl CapabilitySpec {
    pub fn is_required(&self) -> bool {
        !self.optional && self.gated_by.is_none()
    }
}

// ============================================================================
// ACTIONS
// ============================================================================

/// Key of an action's variant table: one entry per OS family plus `any`, the
/// fallback for families without their own entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKey {
    Debian,
    Rhel,
    Alpine,
    Macos,
    Termux,
    Any,
}

impl VariantKey {
    /// The table key holding `family`'s own variant; `Unknown` has none.
    pub fn for_family(family: OsFamily) -> Option<VariantKey> {
        match family {
            OsFamily::Debian => Some(VariantKey::Debian),
            OsFamily::Rhel => Some(VariantKey::Rhel),
            OsFamily::Alpine => Some(VariantKey::Alpine),
            OsFamily::Macos => Some(VariantKey::Macos),
            OsFamily::Termux => Some(VariantKey::Termux),
            OsFamily::Unknown => None,
        }
    }
}

/// Marker written as the literal string `unsupported` in the variant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsupportedMarker {
    Unsupported,
}

/// One OS-specific way of running an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandVariant {
    Run(Invocation),
    Unsupported(UnsupportedMarker),
}

/// An executable invocation: program, arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Invocation {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: BTreeMap::new(),
        }
    }
}

/// Renders the invocation as a copy-pasteable shell command line.
impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{key}={} ", shell_quote(value))?;
        }
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// The tool (and optional minimum version) an action installs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRequirement {
    pub tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
}

/// A file rendered from a template and written right before the action's command.
/// Its grammar belongs to whatever consumes it (nginx, systemd, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    pub path: String,
    pub template: String,
}

fn default_true() -> bool {
    true
}

/// A concrete unit of work with one command variant per OS family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    pub id: String,
    pub description: String,
    /// Satisfied when this tool is detected at the required version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provides: Option<ToolRequirement>,
    /// Satisfied when this path exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creates: Option<String>,
    /// `false` marks a command that is unsafe to repeat after a partial run; such
    /// an action needs `provides` or `creates`, and its failures ask for cleanup.
    #[serde(default = "default_true")]
    pub idempotent: bool,
    #[serde(default)]
    pub requires_privilege: bool,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Manual instruction printed when this optional action did not run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactSpec>,
    pub variants: BTreeMap<VariantKey, CommandVariant>,
}

impl ActionSpec {
    /// The invocation to run on `family`: its own entry, else `any`.
    /// `None` means unsupported, either explicitly or by omission.
    pub fn variant_for(&self, family: OsFamily) -> Option<&Invocation> {
        let chosen = VariantKey::for_family(family)
            .and_then(|key| self.variants.get(&key))
            .or_else(|| self.variants.get(&VariantKey::Any));
        match chosen {
            Some(CommandVariant::Run(invocation)) => Some(invocation),
            _ => None,
        }
    }
}

// ============================================================================
// CHOICES AND PROBES
// ============================================================================

/// A user-configurable decision resolved by the prompt layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoicePoint {
    pub name: String,
    pub prompt: String,
    pub allowed: Vec<String>,
    pub default: String,
}

impl ChoicePoint {
    pub fn accepts(&self, value: &str) -> bool {
        self.allowed.iter().any(|allowed| allowed == value)
    }
}

fn default_version_args() -> Vec<String> {
    vec!["--version".to_string()]
}

/// A tool the prober should look for, and how to ask it for its version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolProbe {
    pub name: String,
    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,
}

impl ToolProbe {
    pub fn named(name: &str) -> Self {
        ToolProbe {
            name: name.to_string(),
            version_args: default_version_args(),
        }
    }
}

// ============================================================================
// DOCUMENT
// ============================================================================

/// The whole provisioning document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionConfig {
    #[serde(default)]
    pub choices: Vec<ChoicePoint>,
    #[serde(default)]
    pub probe_tools: Vec<ToolProbe>,
    #[serde(default)]
    pub capabilities: Vec<CapabilitySpec>,
    #[serde(default)]
    pub actions: Vec<ActionSpec>,
}

impl ProvisionConfig {
    pub fn action(&self, id: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|action| action.id == id)
    }

    pub fn choice(&self, name: &str) -> Option<&ChoicePoint> {
        self.choices.iter().find(|choice| choice.name == name)
    }

    /// Checks the cross-references that serde cannot.
    ///
    /// Dependency cycles are not checked here; the planner reports them as
    /// `PlanCycle` with the offending ids.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        let mut seen_actions = HashSet::new();
        for action in &self.actions {
            if !seen_actions.insert(action.id.as_str()) {
                return Err(ProvisionError::Config(format!("duplicate action id '{}'", action.id)));
            }
            if action.timeout_secs == Some(0) {
                return Err(ProvisionError::Config(format!("action '{}' has a zero timeout", action.id)));
            }
            // Without a satisfaction check a non-idempotent action would run again on every re-run.
            if !action.idempotent && action.provides.is_none() && action.creates.is_none() {
                return Err(ProvisionError::Config(format!(
                    "action '{}' is not idempotent and declares neither `provides` nor `creates`",
                    action.id
                )));
            }
            if let Some(requirement) = &action.provides {
                check_min_version(&action.id, requirement.min_version.as_deref())?;
            }
        }
        for action in &self.actions {
            for dependency in &action.depends_on {
                if !seen_actions.contains(dependency.as_str()) {
                    return Err(ProvisionError::Config(format!(
                        "action '{}' depends on unknown action '{dependency}'",
                        action.id
                    )));
                }
            }
        }

        let mut seen_choices = HashSet::new();
        for choice in &self.choices {
            if !seen_choices.insert(choice.name.as_str()) {
                return Err(ProvisionError::Config(format!("duplicate choice '{}'", choice.name)));
            }
            if !choice.accepts(&choice.default) {
                return Err(ProvisionError::Config(format!(
                    "default '{}' of choice '{}' is not one of its allowed values ({})",
                    choice.default,
                    choice.name,
                    choice.allowed.join(", ")
                )));
            }
        }

        for spec in &self.capabilities {
            if spec.actions.is_empty() {
                return Err(ProvisionError::Config(format!("capability '{}' lists no actions", spec.capability)));
            }
            for id in &spec.actions {
                if !seen_actions.contains(id.as_str()) {
                    return Err(ProvisionError::Config(format!(
                        "capability '{}' references unknown action '{id}'",
                        spec.capability
                    )));
                }
            }
            if let Some(gate) = &spec.gated_by {
                if !seen_choices.contains(gate.as_str()) {
                    return Err(ProvisionError::Config(format!(
                        "capability '{}' is gated by undeclared choice '{gate}'",
                        spec.capability
                    )));
                }
            }
            if let Capability::RuntimePresent { name, min_version } = &spec.capability {
                check_min_version(name, min_version.as_deref())?;
            }
        }
        Ok(())
    }
}

fn check_min_version(owner: &str, min_version: Option<&str>) -> Result<(), ProvisionError> {
    if let Some(raw) = min_version {
        parse_min_version(raw)
            .map_err(|e| ProvisionError::Config(format!("'{owner}' has an invalid min_version: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
choices:
  - name: reverse_proxy
    prompt: Configure nginx?
    allowed: ["yes", "no"]
    default: "no"
probe_tools:
  - name: nginx
    version_args: ["-v"]
capabilities:
  - kind: runtime_present
    name: node
    min_version: "18"
    actions: [install-node]
  - kind: service_configured
    name: reverse_proxy
    actions: [install-nginx]
    gated_by: reverse_proxy
actions:
  - id: install-node
    description: Install Node.js
    provides: { tool: node, min_version: "18" }
    requires_privilege: true
    variants:
      debian: { program: apt-get, args: [install, -y, nodejs] }
      rhel: unsupported
  - id: install-nginx
    description: Install nginx
    variants:
      any: { program: sh, args: ["-c", "echo nginx"] }
"#;

    fn sample() -> ProvisionConfig {
        serde_yaml::from_str(SAMPLE).unwrap()
    }

    #[test]
    fn test_parse_sample_document() {
        let config = sample();
        assert!(config.validate().is_ok());
        assert_eq!(config.capabilities.len(), 2);
        assert_eq!(
            config.capabilities[0].capability,
            Capability::RuntimePresent { name: "node".into(), min_version: Some("18".into()) }
        );
        assert!(config.capabilities[0].is_required());
        assert!(!config.capabilities[1].is_required());
        assert_eq!(config.probe_tools[0].version_args, vec!["-v".to_string()]);

        let node = config.action("install-node").unwrap();
        assert!(node.idempotent, "idempotent defaults to true");
        assert!(node.depends_on.is_empty());
    }

    #[test]
    fn test_variant_lookup_prefers_own_family_then_any() {
        let config = sample();
        let node = config.action("install-node").unwrap();
        assert_eq!(node.variant_for(OsFamily::Debian).unwrap().program, "apt-get");
        assert!(node.variant_for(OsFamily::Rhel).is_none(), "explicit unsupported");
        assert!(node.variant_for(OsFamily::Alpine).is_none(), "omitted means unsupported");

        let nginx = config.action("install-nginx").unwrap();
        assert_eq!(nginx.variant_for(OsFamily::Termux).unwrap().program, "sh");
        assert!(nginx.variant_for(OsFamily::Unknown).is_some());
    }

    #[test]
    fn test_validate_rejects_unknown_dependency() {
        let mut config = sample();
        config.actions[0].depends_on.push("missing".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown action 'missing'"));
    }

    #[test]
    fn test_validate_rejects_default_outside_allowed_set() {
        let mut config = sample();
        config.choices[0].default = "maybe".into();
        assert!(matches!(config.validate(), Err(ProvisionError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_undeclared_gate() {
        let mut config = sample();
        config.capabilities[1].gated_by = Some("tunnel".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("undeclared choice 'tunnel'"));
    }

    #[test]
    fn test_validate_rejects_duplicate_action_ids() {
        let mut config = sample();
        let copy = config.actions[0].clone();
        config.actions.push(copy);
        assert!(config.validate().unwrap_err().to_string().contains("duplicate action id"));
    }

    #[test]
    fn test_validate_requires_a_check_for_non_idempotent_actions() {
        let mut config = sample();
        config.actions[1].idempotent = false;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("'install-nginx' is not idempotent"));

        config.actions[1].creates = Some("/etc/nginx/nginx.conf".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invocation_display_quotes_when_needed() {
        let invocation = Invocation::new("sh", &["-c", "echo 'hi there'"]);
        assert_eq!(invocation.to_string(), r"sh -c 'echo '\''hi there'\'''");
        assert_eq!(Invocation::new("apt-get", &["install", "-y", "git"]).to_string(), "apt-get install -y git");
    }
}
