//! Resolve request shape shared by every helper.

use serde::{Deserialize, Serialize};

use cdp_driver::QueryScope;
use pagehand_core_types::SelectorEngine;

use crate::error::ResolveError;

/// Default wait deadline applied by helpers that opt into waiting.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// One resolution job: which engine, which selector, how many elements and
/// whether to wait for the first match to appear.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub engine: SelectorEngine,
    pub selector: String,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub wait_for_selector: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub scope: QueryScope,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl ResolveRequest {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(SelectorEngine::Css, selector)
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::new(SelectorEngine::XPath, selector)
    }

    pub fn new(engine: SelectorEngine, selector: impl Into<String>) -> Self {
        Self {
            engine,
            selector: selector.into(),
            multiple: false,
            wait_for_selector: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            scope: QueryScope::Document,
        }
    }

    pub fn multiple(mut self, flag: bool) -> Self {
        self.multiple = flag;
        self
    }

    pub fn wait(mut self, flag: bool) -> Self {
        self.wait_for_selector = flag;
        self
    }

    pub fn timeout_ms(mut self, deadline: u64) -> Self {
        self.timeout_ms = deadline;
        self
    }

    pub fn scoped(mut self, scope: QueryScope) -> Self {
        self.scope = scope;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ResolveError> {
        if self.selector.trim().is_empty() {
            return Err(ResolveError::InvalidRequest("selector is empty".into()));
        }
        if self.wait_for_selector && self.timeout_ms == 0 {
            return Err(ResolveError::InvalidRequest(
                "wait_for_selector requires a positive timeout".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_selector_and_zero_wait() {
        assert!(ResolveRequest::css("  ").validate().is_err());
        assert!(ResolveRequest::css("#id")
            .wait(true)
            .timeout_ms(0)
            .validate()
            .is_err());
        assert!(ResolveRequest::css("#id").validate().is_ok());
    }

    #[test]
    fn deserializes_with_defaults() {
        let request: ResolveRequest =
            serde_json::from_str(r##"{"engine":"css","selector":"#email"}"##).unwrap();
        assert!(!request.multiple);
        assert!(!request.wait_for_selector);
        assert_eq!(request.timeout_ms, DEFAULT_TIMEOUT_MS);
    }
}
