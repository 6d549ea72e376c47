//! Shared bookkeeping for one tree-build pass.
//!
//! Every parser and CLI adapter builds its trees through a [`TreeBuilder`]:
//! a `(name, version)` pair is expanded into children at most once per pass,
//! later occurrences become leaf references. The builder also carries the
//! cancellation token so that long loops can bail out between nodes.

use crate::error::{Error, Result};
use crate::types::package_id;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// Dedup and cancellation state for a single tree-build pass.
#[derive(Debug)]
pub struct TreeBuilder<'a> {
    expanded: HashSet<String>,
    cancel: &'a CancellationToken,
}

impl<'a> TreeBuilder<'a> {
    /// Start a new pass.
    #[must_use]
    pub fn new(cancel: &'a CancellationToken) -> Self {
        Self {
            expanded: HashSet::new(),
            cancel,
        }
    }

    /// Claim the expansion of `name@version`.
    ///
    /// Returns `true` the first time a pair is seen in this pass and `false`
    /// for every later occurrence, which callers emit as a leaf reference.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] once the token has been cancelled.
    pub fn claim(&mut self, name: &str, version: &str) -> Result<bool> {
        self.checkpoint()?;
        Ok(self.expanded.insert(package_id(name, version)))
    }

    /// Fail fast if the pass has been cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] once the token has been cancelled.
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Number of distinct pairs expanded so far.
    #[must_use]
    pub fn expanded_count(&self) -> usize {
        self.expanded.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_once() {
        let token = CancellationToken::new();
        let mut builder = TreeBuilder::new(&token);

        assert!(builder.claim("d", "1.0.0").unwrap());
        assert!(!builder.claim("d", "1.0.0").unwrap());
        assert!(builder.claim("d", "2.0.0").unwrap());
        assert_eq!(builder.expanded_count(), 2);
    }

    #[test]
    fn test_cancelled_pass_fails() {
        let token = CancellationToken::new();
        let mut builder = TreeBuilder::new(&token);
        token.cancel();

        assert!(matches!(builder.claim("a", "1.0.0"), Err(Error::Cancelled)));
        assert!(matches!(builder.checkpoint(), Err(Error::Cancelled)));
    }
}
