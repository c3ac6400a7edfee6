// setup-rexon: probes a host, plans the Rexon installation from a declarative
// provisioning document, executes the plan and reports per-action outcomes.

pub mod cli;
pub mod commands;
pub mod libs;
pub mod logger;
pub mod schemas;

pub use libs::orchestrator::{PreparedRun, RunOptions, prepare, provision};
pub use schemas::errors::ProvisionError;
