// Data structures shared across the crate: the provisioning document, the
// environment profile, the install plan, the report, and the error taxonomy.

// The YAML document: capabilities, actions, choice points, probe targets.
pub mod config;
// What the prober learns about the host.
pub mod environment;
// Fatal errors of a provisioning run.
pub mod errors;
// Planner inputs and output.
pub mod plan;
// Executor output.
pub mod report;
