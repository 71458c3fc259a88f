//! Resolution failure taxonomy.

use pagehand_core_types::{SelectorEngine, UnknownEngine};
use thiserror::Error;

use cdp_driver::{DriverError, DriverErrorKind};

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The selector never matched within the wait deadline.
    #[error("no element matched {engine} selector '{selector}' within {timeout_ms}ms")]
    NotFound {
        engine: SelectorEngine,
        selector: String,
        timeout_ms: u64,
    },

    /// The element has no renderable geometry; pointer actions cannot
    /// proceed.
    #[error("element has no renderable bounding box")]
    BoundingBoxUnavailable,

    #[error(transparent)]
    UnsupportedEngine(#[from] UnknownEngine),

    /// A request that violates its own invariants (empty selector, zero
    /// wait deadline).
    #[error("invalid resolve request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl ResolveError {
    /// Collapse a driver wait timeout into the typed not-found outcome,
    /// keeping every other driver failure untouched.
    pub(crate) fn from_wait(
        err: DriverError,
        engine: SelectorEngine,
        selector: &str,
        timeout_ms: u64,
    ) -> Self {
        if matches!(err.kind, DriverErrorKind::WaitTimeout) {
            ResolveError::NotFound {
                engine,
                selector: selector.to_string(),
                timeout_ms,
            }
        } else {
            ResolveError::Driver(err)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::NotFound { .. })
    }
}
