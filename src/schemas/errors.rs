//! # Provisioning Error Taxonomy
//!
//! Fatal errors raised before or around execution. Failures of individual
//! actions are not errors: they are recorded as `ActionOutcome`s in the report
//! and folded into the run-level status.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a provisioning run.
///
/// Planning-time variants (`UnsupportedEnvironment`, `UnsatisfiableCapability`,
/// `PlanCycle`, `Config`) are raised before any command touches the host, so
/// re-running after fixing the cause is always safe.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// No supported OS signature matched the host.
    #[error("Unsupported environment: {details}")]
    UnsupportedEnvironment {
        /// What the prober saw (kernel name, os-release ID, package managers found).
        details: String,
    },

    /// A required capability has no runnable variant for the host's OS family.
    #[error("Capability '{capability}' cannot be satisfied on {os_family}: action '{action}' is unsupported")]
    UnsatisfiableCapability {
        /// Name of the capability that cannot be met.
        capability: String,
        /// The action (own or transitive dependency) lacking a variant.
        action: String,
        /// Display name of the host's OS family.
        os_family: String,
    },

    /// The declared `depends_on` relation contains a cycle.
    #[error("Dependency cycle between actions: {}", actions.join(" -> "))]
    PlanCycle {
        /// Ids of the actions that could not be ordered, in declaration order.
        actions: Vec<String>,
    },

    /// The configuration document is unreadable or invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Reading interactive input failed.
    #[error("Prompt failed: {0}")]
    Prompt(String),

    /// A file the run needs could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ProvisionError {
    /// Process exit code for this error.
    ///
    /// The run-level codes for `PartiallyFailed` (2) and `Aborted` (3) live on
    /// `ProvisionStatus`; these cover the fatal planning-time errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProvisionError::UnsupportedEnvironment { .. } => 4,
            ProvisionError::UnsatisfiableCapability { .. } => 5,
            ProvisionError::PlanCycle { .. } => 6,
            ProvisionError::Config(_) | ProvisionError::Prompt(_) | ProvisionError::Io { .. } => 1,
        }
    }
}
