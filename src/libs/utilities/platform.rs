// Normalization helpers for the raw platform strings the prober collects:
// CPU architecture names, kernel names and `/etc/os-release` contents.
use crate::log_warn;
use crate::schemas::environment::Architecture;
use colored::Colorize;

/// Normalizes the many spellings of a CPU architecture (as reported by
/// `std::env::consts::ARCH`, `uname -m` or release asset names).
///
/// # Arguments
/// * `arch`: e.g. "x86_64", "AMD64", "aarch64", "armv7l".
///
/// # Returns
/// * `Architecture`: unknown spellings are kept lowercase in `Architecture::Other`.
pub fn normalize_arch(arch: &str) -> Architecture {
    match arch.trim().to_lowercase().as_str() {
        "x86_64" | "amd64" | "x64" => Architecture::Amd64,
        "aarch64" | "arm64" => Architecture::Arm64,
        "arm" | "armv7" | "armv7l" | "armhf" => Architecture::Armv7,
        other => {
            log_warn!("[Prober] Unknown architecture '{}', keeping it as-is.", other.purple());
            Architecture::Other(other.to_string())
        }
    }
}

/// Kernel family derived from a kernel or OS name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelKind {
    Linux,
    Darwin,
    Other,
}

/// Maps `std::env::consts::OS` or `uname -s` output to a kernel family.
pub fn normalize_kernel(kernel: &str) -> KernelKind {
    match kernel.trim().to_lowercase().as_str() {
        "linux" | "android" => KernelKind::Linux,
        "macos" | "darwin" => KernelKind::Darwin,
        _ => KernelKind::Other,
    }
}

/// Extracts the lowercase `ID` and `ID_LIKE` entries of an os-release file.
///
/// `ID_LIKE` may hold several space-separated ids (`ID_LIKE="rhel centos fedora"`).
pub fn os_release_ids(contents: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for line in contents.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim() != "ID" && key.trim() != "ID_LIKE" {
            continue;
        }
        let value = value.trim().trim_matches('"').trim_matches('\'');
        ids.extend(value.split_whitespace().map(str::to_lowercase));
    }
    ids
}
