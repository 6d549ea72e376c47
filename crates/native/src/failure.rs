//! Classification of failed package manager runs.

use lockscan_core::Error;
use std::path::Path;

/// Substrings (lowercase) that identify registry or connectivity problems.
const NETWORK_PATTERNS: &[&str] = &[
    "enotfound",
    "econnrefused",
    "econnreset",
    "etimedout",
    "eai_again",
    "enetunreach",
    "getaddrinfo",
    "socket hang up",
    "network request",
    "network error",
    "network connectivity",
    "network timeout",
    "err_pnpm_meta_fetch_fail",
    "err_pnpm_fetch_",
    "unable to get local issuer certificate",
    "self signed certificate",
];

/// Substrings (lowercase) that identify packages declared but not installed.
const MISSING_PATTERNS: &[&str] = &[
    "missing:",
    "elsproblems",
    "unmet dependency",
    "not installed",
    "err_pnpm_no_modules",
    "run `pnpm install`",
    "run \"npm install\"",
    "run `npm install`",
    "run `yarn install`",
    "cannot find module",
];

/// Turn a failed run into an error whose [`lockscan_core::FailureKind`]
/// matches the cause reported on stderr.
#[must_use]
pub fn classify(command: &str, exit_code: Option<i32>, stderr: &str, manifest: &Path) -> Error {
    let lowered = stderr.to_lowercase();

    if let Some(line) = first_matching_line(stderr, &lowered, NETWORK_PATTERNS) {
        return Error::NetworkFailure {
            command: command.to_string(),
            message: line,
        };
    }
    if let Some(line) = first_matching_line(stderr, &lowered, MISSING_PATTERNS) {
        return Error::MissingInstalledDependencies {
            manifest: manifest.to_path_buf(),
            message: line,
        };
    }

    Error::ProcessFailure {
        command: command.to_string(),
        exit_code,
        stderr: stderr.trim().to_string(),
    }
}

fn first_matching_line(original: &str, lowered: &str, patterns: &[&str]) -> Option<String> {
    // Lowercasing keeps line boundaries, so both iterators stay aligned.
    original
        .lines()
        .zip(lowered.lines())
        .find(|(_, line)| patterns.iter().any(|pattern| line.contains(pattern)))
        .map(|(line, _)| line.trim().to_string())
}
