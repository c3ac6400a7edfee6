// Path helpers shared by the command layer and the configuration loader.
use std::path::PathBuf;

/// Expands `~` and `$VAR`/`${VAR}` in a user-supplied path.
///
/// Unset variables are left in place rather than failing, so a typo shows up
/// verbatim in the logged path instead of aborting the run.
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

/// `~/.setup-rexon`, where the user's own provisioning document lives.
pub fn setup_rexon_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".setup-rexon"))
}

/// Default install directory for the Rexon application: `~/.rexon`.
pub fn default_install_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".rexon"))
        .unwrap_or_else(|| PathBuf::from(".rexon"))
}
