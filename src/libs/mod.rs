// Core provisioning logic, leaf-first: probe, prompt, plan, execute, report.

// Locates, parses and validates the provisioning document.
pub mod config_loading;
// The Rexon provisioning document compiled into the binary.
pub mod default_config;
// Walks the plan and records outcomes; the only stage with side effects.
pub mod executor;
// Runs the stages in order for the command layer and scenario tests.
pub mod orchestrator;
// Turns capabilities and the host profile into an ordered install plan.
pub mod planner;
// Detects OS family, package manager, architecture and installed tools.
pub mod prober;
// Resolves choice points from presets, terminal input or defaults.
pub mod prompt;
// Human-readable plan and report rendering.
pub mod report_emitter;
pub mod utilities;
