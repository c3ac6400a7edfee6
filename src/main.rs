use clap::Parser;
use setup_rexon::cli::cmd_enums::{Cli, Commands};
use setup_rexon::commands::{exit_code_for, generate, now, plan, probe, version};
use setup_rexon::{log_error, logger};

fn main() {
    let cli = Cli::parse();
    logger::init(cli.debug);

    let result = match cli.command {
        Commands::Version => version::run(),
        Commands::Now { selection, dry_run, json } => now::run(selection, dry_run, json),
        Commands::Plan { selection, json } => plan::run(selection, json),
        Commands::Probe { config, install_dir, json } => probe::run(config, install_dir, json),
        Commands::Generate { output, force } => generate::run(output, force),
    };

    let code = match result {
        Ok(code) => code,
        Err(err) => {
            log_error!("{:#}", err);
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}
