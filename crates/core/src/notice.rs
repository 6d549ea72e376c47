//! User-facing notices raised while scanning.
//!
//! A notice tells the user that the scan result is less exact than it could
//! be, for example because the package manager could not reach the registry
//! and lockfile data was used instead. The scanner raises at most one notice
//! per [`FailureKind`] per scan call.

use crate::error::FailureKind;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Mutex;

/// A single user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    /// Failure classification that caused the notice.
    pub kind: FailureKind,
    /// Message for the user.
    pub message: String,
    /// Manifest directory where the failure was first seen.
    pub target: PathBuf,
}

impl Notice {
    /// Build the fallback notice for a failure kind.
    #[must_use]
    pub fn fallback(kind: FailureKind, target: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            message: kind.fallback_message().to_string(),
            target: target.into(),
        }
    }
}

/// Receiver for notices.
pub trait NoticeSink: Send + Sync {
    /// Deliver a notice to the user.
    fn notify(&self, notice: &Notice);
}

/// Sink that writes notices to the tracing subscriber as warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNoticeSink;

impl NoticeSink for TracingNoticeSink {
    fn notify(&self, notice: &Notice) {
        tracing::warn!(
            kind = %notice.kind,
            target_dir = %notice.target.display(),
            "{}",
            notice.message
        );
    }
}

/// Sink that keeps every notice in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct CollectingNoticeSink {
    notices: Mutex<Vec<Notice>>,
}

impl CollectingNoticeSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the notices received so far.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl NoticeSink for CollectingNoticeSink {
    fn notify(&self, notice: &Notice) {
        self.notices
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(notice.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_keeps_order() {
        let sink = CollectingNoticeSink::new();
        sink.notify(&Notice::fallback(FailureKind::Network, "/repo/a"));
        sink.notify(&Notice::fallback(FailureKind::Other, "/repo/b"));

        let notices = sink.notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].kind, FailureKind::Network);
        assert_eq!(notices[1].target, PathBuf::from("/repo/b"));
    }

    #[test]
    fn test_fallback_notice_uses_kind_message() {
        let notice = Notice::fallback(FailureKind::MissingDependencies, "/repo");
        assert_eq!(
            notice.message,
            FailureKind::MissingDependencies.fallback_message()
        );
    }
}
