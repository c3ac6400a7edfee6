//! # Environment Profile Schema
//!
//! The structured description of the host produced once per run by the prober.
//! Nothing mutates a profile after it is built; re-probing builds a new one.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Operating system family, the key used to pick an action's command variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Debian,
    Rhel,
    Alpine,
    Macos,
    Termux,
    Unknown,
}

impl OsFamily {
    /// The lowercase key used in configuration files and placeholders.
    pub fn key(&self) -> &'static str {
        match self {
            OsFamily::Debian => "debian",
            OsFamily::Rhel => "rhel",
            OsFamily::Alpine => "alpine",
            OsFamily::Macos => "macos",
            OsFamily::Termux => "termux",
            OsFamily::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OsFamily::Debian => write!(f, "Debian"),
            OsFamily::Rhel => write!(f, "RHEL"),
            OsFamily::Alpine => write!(f, "Alpine"),
            OsFamily::Macos => write!(f, "macOS"),
            OsFamily::Termux => write!(f, "Termux"),
            OsFamily::Unknown => write!(f, "Unknown"),
        }
    }
}

/// CPU architecture, normalized from the many spellings found in the wild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Amd64,
    Arm64,
    Armv7,
    Other(String),
}

impl Architecture {
    /// Debian-style architecture name, as used by most release asset names.
    pub fn as_str(&self) -> &str {
        match self {
            Architecture::Amd64 => "amd64",
            Architecture::Arm64 => "arm64",
            Architecture::Armv7 => "armv7",
            Architecture::Other(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Native package manager of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Apk,
    Brew,
    TermuxApt,
}

impl PackageManager {
    pub fn key(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
            PackageManager::Apk => "apk",
            PackageManager::Brew => "brew",
            PackageManager::TermuxApt => "termux_apt",
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// What the prober found for one candidate tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ToolPresence {
    /// Resolvable on this host. `version` is `None` when the version output
    /// could not be parsed.
    Present { version: Option<semver::Version> },
    Absent,
}

impl ToolPresence {
    pub fn is_present(&self) -> bool {
        matches!(self, ToolPresence::Present { .. })
    }
}

/// Structured result of probing the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    pub os_family: OsFamily,
    pub architecture: Architecture,
    pub package_manager: PackageManager,
    /// Raw kernel name the detection started from (e.g. "linux", "macos").
    pub kernel: String,
    /// Running with effective uid 0.
    pub privileged: bool,
    /// Every candidate tool, present or absent.
    pub detected_tools: BTreeMap<String, ToolPresence>,
    /// The `creates` marker paths that exist on disk.
    pub detected_paths: BTreeSet<String>,
}

impl EnvironmentProfile {
    /// Detected version of `tool`, or `None` when absent or unparsed.
    pub fn tool_version(&self, tool: &str) -> Option<&semver::Version> {
        match self.detected_tools.get(tool) {
            Some(ToolPresence::Present { version }) => version.as_ref(),
            _ => None,
        }
    }

    pub fn has_tool(&self, tool: &str) -> bool {
        self.detected_tools.get(tool).is_some_and(ToolPresence::is_present)
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.detected_paths.contains(path)
    }
}
