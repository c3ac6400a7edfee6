// This is the main module file for the `utilities` directory.
// It declares the helpers shared by the prober, planner and executor.

// Bounded-time process execution behind the `CommandRunner` trait.
pub mod command_runner;
// `~` / `$VAR` expansion and the default directories.
pub mod path_helpers;
// Architecture, kernel and os-release normalization.
pub mod platform;
// `{{placeholder}}` substitution.
pub mod templating;
// Version extraction and minimum-version comparison.
pub mod version_parse;
