//! Error types shared by every lockscan crate.
//!
//! The taxonomy mirrors the two resolution strategies: parse-side errors
//! (`FileNotFound`, `Parse`) come out of the static path, process-side errors
//! (`ProcessTimeout`, `ProcessFailure`, `NetworkFailure`,
//! `MissingInstalledDependencies`) come out of the native path. Everything
//! except [`Error::Cancelled`] and [`Error::Configuration`] is recoverable.

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for lockscan operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while scanning a workspace.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A manifest or lockfile that was expected to exist is missing.
    #[error("File not found: {}", path.display())]
    #[diagnostic(
        code(lockscan::file_not_found),
        help("Ensure the manifest or lockfile exists and is readable")
    )]
    FileNotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// Malformed JSON, YAML or yarn lockfile text.
    #[error("Failed to parse {format}{}: {message}", path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    #[diagnostic(
        code(lockscan::parse_failed),
        help("The file may be corrupted. Try regenerating it with your package manager")
    )]
    Parse {
        /// Short name of the format being parsed (e.g. "package-lock.json").
        format: &'static str,
        /// Path of the file, when the text came from disk.
        path: Option<PathBuf>,
        /// Description of the parse failure.
        message: String,
    },

    /// A native package manager command exceeded its deadline.
    #[error("Command '{command}' timed out after {seconds} seconds")]
    #[diagnostic(
        code(lockscan::process_timeout),
        help("Increase the command timeout or use the static scanning mode")
    )]
    ProcessTimeout {
        /// The command line that was running.
        command: String,
        /// The deadline that was exceeded.
        seconds: u64,
    },

    /// A native command exited unsuccessfully and its output was unusable.
    #[error("Command '{command}' failed{}: {stderr}", exit_code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    #[diagnostic(code(lockscan::process_failure))]
    ProcessFailure {
        /// The command line that failed.
        command: String,
        /// Exit code, if the process exited normally.
        exit_code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// A native command failed because the registry could not be reached.
    #[error("Network failure while running '{command}': {message}")]
    #[diagnostic(
        code(lockscan::network_failure),
        help("Check your network connection or registry configuration")
    )]
    NetworkFailure {
        /// The command line that failed.
        command: String,
        /// The matching error text.
        message: String,
    },

    /// The package manager reports that declared packages are not installed.
    #[error("Dependencies declared in {} are not installed: {message}", manifest.display())]
    #[diagnostic(
        code(lockscan::missing_installed_dependencies),
        help("Run your package manager's install command (e.g. 'npm install')")
    )]
    MissingInstalledDependencies {
        /// The manifest whose dependencies are missing.
        manifest: PathBuf,
        /// Details about what is missing.
        message: String,
    },

    /// Generic recoverable failure carrying the original cause.
    #[error("{message}")]
    #[diagnostic(code(lockscan::unknown))]
    Unknown {
        /// Description of the failure.
        message: String,
        /// The original cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O error occurred.
    #[error("I/O error during {operation}{}: {source}", path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    #[diagnostic(
        code(lockscan::io_error),
        help("Check that the referenced paths exist and that you have permission to read them")
    )]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Optional path where the error occurred.
        path: Option<PathBuf>,
        /// Description of the operation being performed.
        operation: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(lockscan::configuration))]
    Configuration {
        /// Description of what is invalid.
        message: String,
    },

    /// The scan was cancelled by the caller.
    #[error("Scan cancelled")]
    #[diagnostic(code(lockscan::cancelled))]
    Cancelled,
}

impl Error {
    /// Create a parse error for the given format.
    #[must_use]
    pub fn parse(format: &'static str, path: Option<&Path>, message: impl Into<String>) -> Self {
        Self::Parse {
            format,
            path: path.map(Path::to_path_buf),
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    ///
    /// A `NotFound` I/O error becomes [`Error::FileNotFound`] when a path is known.
    #[must_use]
    pub fn io(source: std::io::Error, path: Option<&Path>, operation: impl Into<String>) -> Self {
        match path {
            Some(path) if source.kind() == std::io::ErrorKind::NotFound => Self::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => Self::Io {
                source,
                path: path.map(Path::to_path_buf),
                operation: operation.into(),
            },
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a generic error without an underlying cause.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
            source: None,
        }
    }

    /// Whether a scan can continue after this error (for example by falling
    /// back to another strategy or skipping the affected manifest).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Configuration { .. })
    }

    /// Failure classification used to pick the user-facing fallback notice.
    #[must_use]
    pub const fn failure_kind(&self) -> FailureKind {
        match self {
            Self::NetworkFailure { .. } => FailureKind::Network,
            Self::MissingInstalledDependencies { .. } => FailureKind::MissingDependencies,
            _ => FailureKind::Other,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            path: None,
            operation: "file operation".to_string(),
        }
    }
}

/// Coarse classification of native-strategy failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// DNS, connection or registry timeout problems.
    Network,
    /// Declared packages are not present in `node_modules`.
    MissingDependencies,
    /// Anything else, including process timeouts and parse failures.
    Other,
}

impl FailureKind {
    /// Classify an error.
    #[must_use]
    pub const fn of(error: &Error) -> Self {
        error.failure_kind()
    }

    /// The message shown to the user when a fallback happens for this reason.
    #[must_use]
    pub const fn fallback_message(self) -> &'static str {
        match self {
            Self::Network => {
                "Package manager could not reach the registry; using lockfile data instead"
            }
            Self::MissingDependencies => {
                "Dependencies are not installed; run your package manager's install command for exact results. Using lockfile data instead"
            }
            Self::Other => "Package manager command failed; using lockfile data instead",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::MissingDependencies => write!(f, "missing-dependencies"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Diagnostic;

    #[test]
    fn test_parse_error_display() {
        let error = Error::parse(
            "pnpm-lock.yaml",
            Some(Path::new("/repo/pnpm-lock.yaml")),
            "invalid indentation",
        );

        let message = error.to_string();
        assert!(message.contains("Failed to parse pnpm-lock.yaml"));
        assert!(message.contains("/repo/pnpm-lock.yaml"));
        assert!(message.contains("invalid indentation"));
    }

    #[test]
    fn test_parse_error_without_path() {
        let error = Error::parse("yarn.lock", None, "missing version");
        assert_eq!(
            error.to_string(),
            "Failed to parse yarn.lock: missing version"
        );
    }

    #[test]
    fn test_io_not_found_becomes_file_not_found() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error = Error::io(io_error, Some(Path::new("/repo/package.json")), "reading");
        assert!(matches!(error, Error::FileNotFound { .. }));
        assert!(error.to_string().contains("/repo/package.json"));
    }

    #[test]
    fn test_io_error_keeps_operation() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = Error::io(io_error, None, "opening directory");
        let message = error.to_string();
        assert!(message.contains("I/O error during opening directory"));
        assert!(!message.contains(" at "));
    }

    #[test]
    fn test_process_failure_display() {
        let error = Error::ProcessFailure {
            command: "npm ls --all --json".to_string(),
            exit_code: Some(1),
            stderr: "npm ERR! code ELSPROBLEMS".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("exit code 1"));
        assert!(message.contains("ELSPROBLEMS"));
    }

    #[test]
    fn test_recoverability() {
        assert!(!Error::Cancelled.is_recoverable());
        assert!(!Error::configuration("bad mode").is_recoverable());
        assert!(
            Error::ProcessTimeout {
                command: "pnpm ls".to_string(),
                seconds: 5,
            }
            .is_recoverable()
        );
        assert!(Error::unknown("boom").is_recoverable());
    }

    #[test]
    fn test_failure_kind_classification() {
        let network = Error::NetworkFailure {
            command: "npm ls".to_string(),
            message: "getaddrinfo ENOTFOUND".to_string(),
        };
        assert_eq!(FailureKind::of(&network), FailureKind::Network);

        let missing = Error::MissingInstalledDependencies {
            manifest: PathBuf::from("/repo/package.json"),
            message: "missing: react@18".to_string(),
        };
        assert_eq!(FailureKind::of(&missing), FailureKind::MissingDependencies);

        let timeout = Error::ProcessTimeout {
            command: "yarn list".to_string(),
            seconds: 1,
        };
        assert_eq!(FailureKind::of(&timeout), FailureKind::Other);
    }

    #[test]
    fn test_fallback_messages_are_distinct() {
        let messages = [
            FailureKind::Network.fallback_message(),
            FailureKind::MissingDependencies.fallback_message(),
            FailureKind::Other.fallback_message(),
        ];
        assert_ne!(messages[0], messages[1]);
        assert_ne!(messages[1], messages[2]);
        assert_ne!(messages[0], messages[2]);
    }

    #[test]
    fn test_diagnostic_codes() {
        let error = Error::FileNotFound {
            path: PathBuf::from("/test"),
        };
        assert_eq!(
            error.code().map(|c| c.to_string()),
            Some("lockscan::file_not_found".to_string())
        );
        assert!(error.help().is_some());

        let error = Error::MissingInstalledDependencies {
            manifest: PathBuf::from("/test/package.json"),
            message: "missing".to_string(),
        };
        assert!(error.code().is_some());
        assert!(error.help().is_some());
    }
}
