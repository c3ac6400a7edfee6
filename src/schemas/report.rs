//! # Provisioning Report Schema
//!
//! Per-action outcomes appended by the executor, and the run-level status
//! derived from them once the executor loop ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why an action did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The planner found the action's effect already present.
    AlreadySatisfied,
    /// An action it depends on (directly or transitively) failed or was blocked.
    BlockedByFailedDependency,
    /// A critical action failed earlier and the run stopped.
    RunAborted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SkipReason::AlreadySatisfied => write!(f, "already satisfied"),
            SkipReason::BlockedByFailedDependency => write!(f, "blocked by failed dependency"),
            SkipReason::RunAborted => write!(f, "run aborted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Skipped {
        reason: SkipReason,
    },
    Failed {
        /// `None` when the command timed out, could not start, or was killed by a signal.
        exit_code: Option<i32>,
        stderr: String,
        timed_out: bool,
    },
}

impl OutcomeStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, OutcomeStatus::Failed { .. })
    }

    pub fn label(&self) -> String {
        match self {
            OutcomeStatus::Succeeded => "succeeded".to_string(),
            OutcomeStatus::Skipped { reason } => format!("skipped ({reason})"),
            OutcomeStatus::Failed { timed_out: true, .. } => "failed (timeout)".to_string(),
            OutcomeStatus::Failed { exit_code: Some(code), .. } => format!("failed (exit {code})"),
            OutcomeStatus::Failed { .. } => "failed".to_string(),
        }
    }
}

/// What happened to one planned action. Never modified once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action_id: String,
    pub description: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
    pub duration_ms: u64,
    pub critical: bool,
    #[serde(default = "default_idempotent")]
    pub idempotent: bool,
    /// Manual step shown when an optional action did not complete, or cleanup
    /// needed after a non-idempotent action failed partway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,
}

fn default_idempotent() -> bool {
    true
}

impl ActionOutcome {
    /// A failed action whose command may have left the host half-changed.
    pub fn needs_cleanup(&self) -> bool {
        self.status.is_failed() && !self.idempotent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStatus {
    Complete,
    PartiallyFailed,
    Aborted,
}

impl ProvisionStatus {
    /// Process exit code: 0, 2 and 3 respectively.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProvisionStatus::Complete => 0,
            ProvisionStatus::PartiallyFailed => 2,
            ProvisionStatus::Aborted => 3,
        }
    }
}

impl fmt::Display for ProvisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProvisionStatus::Complete => write!(f, "Complete"),
            ProvisionStatus::PartiallyFailed => write!(f, "PartiallyFailed"),
            ProvisionStatus::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Final result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub status: ProvisionStatus,
    /// In plan order.
    pub outcomes: Vec<ActionOutcome>,
    /// Optional capabilities dropped at plan time, as `capability (action)`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unavailable: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ProvisionReport {
    pub fn outcome(&self, action_id: &str) -> Option<&ActionOutcome> {
        self.outcomes.iter().find(|outcome| outcome.action_id == action_id)
    }
}
