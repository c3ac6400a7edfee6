// src/commands/generate.rs
// Writes the built-in provisioning document to disk so users can start from a
// working configuration instead of an empty file.

use crate::libs::config_loading::USER_CONFIG_FILE;
use crate::libs::default_config::BUILTIN_CONFIG;
use crate::libs::utilities::path_helpers::{expand_path, setup_rexon_dir};
use crate::{log_debug, log_info, log_warn};
use anyhow::{Context, Result, bail};
use colored::Colorize;
use std::fs;
use std::path::Path;

/// The main entry point for the `generate` command.
///
/// # Arguments
/// * `output`: destination file; defaults to `~/.setup-rexon/provision.yaml`.
/// * `force`: overwrite an existing file instead of leaving it alone.
pub fn run(output: Option<String>, force: bool) -> Result<i32> {
    log_debug!("[Generate] Starting generation with output: {:?}", output);

    let target = match output.as_deref() {
        Some(raw) => expand_path(raw),
        None => setup_rexon_dir()
            .map(|dir| dir.join(USER_CONFIG_FILE))
            .context("could not determine the home directory; pass --output")?,
    };

    if write_config(&target, force)? {
        log_info!("[Generate] Wrote the Rexon provisioning document to {}", target.display().to_string().green());
        log_info!("[Generate] Edit it, then run `setup-rexon now` (it is picked up automatically from ~/.setup-rexon).");
    }
    Ok(0)
}

/// Writes the built-in document to `target`. Returns `false` when an existing
/// file was left untouched.
fn write_config(target: &Path, force: bool) -> Result<bool> {
    if target.is_dir() {
        bail!("{} is a directory", target.display());
    }
    if target.exists() && !force {
        log_warn!(
            "[Generate] Skipping existing file {}. Use --force to overwrite it.",
            target.display().to_string().yellow()
        );
        return Ok(false);
    }
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(target, BUILTIN_CONFIG).with_context(|| format!("failed to write {}", target.display()))?;
    Ok(true)
}
