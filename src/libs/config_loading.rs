use crate::libs::default_config::BUILTIN_CONFIG;
use crate::libs::utilities::path_helpers::{expand_path, setup_rexon_dir};
use crate::schemas::config::ProvisionConfig;
use crate::schemas::errors::ProvisionError;
use crate::{log_debug, log_info};
use colored::Colorize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up under `~/.setup-rexon/` when no path is given.
pub const USER_CONFIG_FILE: &str = "provision.yaml";

/// Where the provisioning document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config` or `SETUP_REXON_CONFIG`.
    Explicit(PathBuf),
    /// `~/.setup-rexon/provision.yaml`.
    UserDefault(PathBuf),
    /// Compiled into the binary.
    BuiltIn,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigSource::Explicit(path) | ConfigSource::UserDefault(path) => write!(f, "{}", path.display()),
            ConfigSource::BuiltIn => write!(f, "built-in Rexon configuration"),
        }
    }
}

/// Picks the configuration source.
///
/// An explicit path is used as given (and must exist when loaded). Otherwise
/// `<user_dir>/provision.yaml` is used if present, else the built-in document.
pub fn resolve_source(explicit: Option<&str>, user_dir: Option<&Path>) -> ConfigSource {
    if let Some(raw) = explicit.filter(|raw| !raw.trim().is_empty()) {
        return ConfigSource::Explicit(expand_path(raw));
    }
    match user_dir.map(|dir| dir.join(USER_CONFIG_FILE)) {
        Some(candidate) if candidate.is_file() => ConfigSource::UserDefault(candidate),
        Some(candidate) => {
            log_debug!("[Config] No user configuration at {}", candidate.display());
            ConfigSource::BuiltIn
        }
        None => ConfigSource::BuiltIn,
    }
}

/// Parses and validates a provisioning document.
pub fn parse_config(contents: &str, origin: &str) -> Result<ProvisionConfig, ProvisionError> {
    let config: ProvisionConfig = serde_yaml::from_str(contents)
        .map_err(|e| ProvisionError::Config(format!("failed to parse {origin}: {e}")))?;
    config.validate().map_err(|e| match e {
        ProvisionError::Config(message) => ProvisionError::Config(format!("{origin}: {message}")),
        other => other,
    })?;
    log_debug!(
        "[Config] {} declares {} capabilities, {} actions, {} choices",
        origin,
        config.capabilities.len(),
        config.actions.len(),
        config.choices.len()
    );
    Ok(config)
}

/// Loads the configuration from `source`.
pub fn load_from(source: &ConfigSource) -> Result<ProvisionConfig, ProvisionError> {
    let config = match source {
        ConfigSource::Explicit(path) | ConfigSource::UserDefault(path) => {
            let contents = fs::read_to_string(path).map_err(|source| ProvisionError::Io {
                path: path.clone(),
                source,
            })?;
            parse_config(&contents, &path.display().to_string())?
        }
        ConfigSource::BuiltIn => parse_config(BUILTIN_CONFIG, "built-in configuration")?,
    };
    log_info!("[Config] Using {}", source.to_string().cyan());
    Ok(config)
}

/// Resolves and loads in one step, using `~/.setup-rexon` as the user directory.
pub fn load_config(explicit: Option<&str>) -> Result<(ProvisionConfig, ConfigSource), ProvisionError> {
    let source = resolve_source(explicit, setup_rexon_dir().as_deref());
    let config = load_from(&source)?;
    Ok((config, source))
}
