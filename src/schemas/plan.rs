//! # Install Plan Schema
//!
//! Planner inputs (`UserChoices`) and its output (`InstallPlan`). A plan is
//! fully concrete: placeholders are rendered, privilege wrapping is applied and
//! satisfaction is decided, so the executor only has to walk it in order.

use crate::schemas::config::Invocation;
use crate::schemas::environment::OsFamily;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Resolved answers to the configuration's choice points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserChoices {
    pub values: BTreeMap<String, String>,
    /// Human-readable corrections made while resolving (invalid input replaced
    /// by a default).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<String>,
}

impl UserChoices {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }

    /// `yes`, `y`, `true`, `1` or `on` (any case). An absent choice is not affirmative.
    pub fn is_affirmative(&self, name: &str) -> bool {
        self.get(name).is_some_and(|value| {
            matches!(value.trim().to_lowercase().as_str(), "yes" | "y" | "true" | "1" | "on")
        })
    }
}

/// Whether a step runs or was found already done at plan time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDisposition {
    Execute,
    AlreadySatisfied,
}

/// A file with its final path and contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedArtifact {
    pub path: String,
    pub contents: String,
}

/// One action, resolved for this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub id: String,
    pub description: String,
    /// Name of the first capability (in declaration order) that pulled this step in.
    pub capability: String,
    pub invocation: Invocation,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<RenderedArtifact>,
    pub idempotent: bool,
    pub requires_privilege: bool,
    pub depends_on: Vec<String>,
    /// On the dependency closure of a required capability.
    pub critical: bool,
    pub timeout: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
    pub disposition: StepDisposition,
}

/// An optional capability left out because this OS family cannot run it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableCapability {
    pub capability: String,
    pub action: String,
}

/// Ordered, dependency-respecting steps for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallPlan {
    pub os_family: OsFamily,
    pub steps: Vec<PlannedStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable: Vec<UnavailableCapability>,
}

impl InstallPlan {
    pub fn step(&self, id: &str) -> Option<&PlannedStep> {
        self.steps.iter().find(|step| step.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.id == id)
    }

    /// Steps that will actually run a command.
    pub fn pending(&self) -> impl Iterator<Item = &PlannedStep> {
        self.steps
            .iter()
            .filter(|step| step.disposition == StepDisposition::Execute)
    }
}
