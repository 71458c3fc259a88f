//! Helper action failure taxonomy.

use thiserror::Error;

use cdp_driver::DriverError;
use element_resolver::ResolveError;

#[derive(Debug, Error)]
pub enum ActionError {
    /// Resolution produced no element and the action cannot proceed.
    #[error("no element found for selector '{selector}'")]
    NotFound { selector: String },

    /// Caller passed an unrecognized action mode tag.
    #[error("invalid mode '{0}'")]
    InvalidMode(String),

    /// The resolved element lacks something the action needs, like an
    /// anchor without an href.
    #[error("element for selector '{selector}' has no usable {what}")]
    MissingProperty {
        selector: String,
        what: &'static str,
    },

    /// A per-element failure inside a sequential multi-element loop,
    /// reported with the selector and the position it stopped at.
    #[error("action failed for selector '{selector}' at element {index}: {source}")]
    Element {
        selector: String,
        index: usize,
        #[source]
        source: Box<ActionError>,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl ActionError {
    pub(crate) fn element(
        selector: &str,
        index: usize,
        source: impl Into<ActionError>,
    ) -> Self {
        ActionError::Element {
            selector: selector.to_string(),
            index,
            source: Box::new(source.into()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            ActionError::NotFound { .. } => true,
            ActionError::Resolve(err) => err.is_not_found(),
            _ => false,
        }
    }
}
