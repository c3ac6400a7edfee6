use crate::cli::type_enums::ChoiceAssignment;
use clap::{Args, Parser, Subcommand};

/// Defines the command-line interface (CLI) for 'setup-rexon'.
#[derive(Parser)]
#[command(name = "setup-rexon")]
#[command(about = "Probe this host, then plan and run the Rexon installation", long_about = None)]
pub struct Cli {
    /// Enables detailed debug output for troubleshooting.
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by the commands that build a plan.
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Path to a provisioning document (defaults to ~/.setup-rexon/provision.yaml, then the built-in one).
    #[arg(long, env = "SETUP_REXON_CONFIG")]
    pub config: Option<String>,
    /// Where Rexon is installed (default: ~/.rexon).
    #[arg(long)]
    pub install_dir: Option<String>,
    /// Never prompt; every choice without a --set uses its default.
    #[arg(short = 'y', long)]
    pub non_interactive: bool,
    /// Preset a choice, e.g. --set node_version=22 (repeatable).
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub set: Vec<ChoiceAssignment>,
    /// Timeout in seconds for actions that do not declare their own.
    #[arg(long, value_name = "SECS", default_value_t = 1800)]
    pub timeout: u64,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the current version of the tool.
    Version,
    /// Probe, plan and execute the installation.
    Now {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Print the plan and stop before executing anything.
        #[arg(long)]
        dry_run: bool,
        /// Print the final report as JSON on stdout.
        #[arg(long)]
        json: bool,
    },
    /// Probe and print the plan without prompting or executing.
    Plan {
        #[command(flatten)]
        selection: SelectionArgs,
        /// Print the plan as JSON on stdout.
        #[arg(long)]
        json: bool,
    },
    /// Print what the prober detects on this host.
    Probe {
        /// Path to a provisioning document; adds its tools and marker paths to the probe.
        #[arg(long, env = "SETUP_REXON_CONFIG")]
        config: Option<String>,
        /// Install directory used to resolve marker paths (default: ~/.rexon).
        #[arg(long)]
        install_dir: Option<String>,
        /// Print the profile as JSON on stdout.
        #[arg(long)]
        json: bool,
    },
    /// Write the built-in provisioning document to disk as a starting point.
    Generate {
        /// Destination (default: ~/.setup-rexon/provision.yaml).
        #[arg(long)]
        output: Option<String>,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}
