//! Version extraction and comparison for detected tools.

use regex::Regex;
use semver::Version;
use std::sync::LazyLock;

// `major.minor` with an optional `.patch`, anywhere in the output.
static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("version pattern is valid"));

/// Parses the first version found in a tool's `--version` output.
///
/// Handles the usual shapes:
/// - `v20.11.1` (node) -> 20.11.1
/// - `git version 2.43.0` -> 2.43.0
/// - `nginx version: nginx/1.24.0` -> 1.24.0
/// - `Python 3.12` -> 3.12.0
pub fn parse_version_output(output: &str) -> Option<Version> {
    let caps = VERSION_PATTERN.captures(output)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    let patch = caps.get(3).map_or(Some(0), |m| m.as_str().parse().ok())?;
    Some(Version::new(major, minor, patch))
}

/// Parses a configured minimum version.
///
/// `"any"` and the empty string mean "presence is enough" (`Ok(None)`).
/// Partial versions are padded with zeros: `"18"` is `18.0.0`.
pub fn parse_min_version(raw: &str) -> Result<Option<Version>, String> {
    let trimmed = raw.trim().trim_start_matches('v');
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("any") {
        return Ok(None);
    }
    let mut parts = [0u64; 3];
    let pieces: Vec<&str> = trimmed.split('.').collect();
    if pieces.len() > 3 {
        return Err(format!("'{raw}' has more than three components"));
    }
    for (slot, piece) in parts.iter_mut().zip(&pieces) {
        *slot = piece.parse().map_err(|_| format!("'{raw}' is not a version"))?;
    }
    Ok(Some(Version::new(parts[0], parts[1], parts[2])))
}

/// Whether `detected` meets `minimum`. With no minimum, any detected version
/// (even an unparsed one) is enough; with a minimum, an unparsed version is not.
pub fn meets_minimum(detected: Option<&Version>, minimum: Option<&Version>) -> bool {
    match (detected, minimum) {
        (_, None) => true,
        (Some(found), Some(min)) => found >= min,
        (None, Some(_)) => false,
    }
}
