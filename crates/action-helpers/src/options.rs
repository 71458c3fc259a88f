//! Target options shared by every selector-driven helper.

use serde::{Deserialize, Serialize};

use cdp_driver::QueryScope;
use element_resolver::{ResolveRequest, DEFAULT_TIMEOUT_MS};
use pagehand_core_types::SelectorEngine;

use crate::error::ActionError;

/// Which element(s) a helper acts on. The engine arrives as its wire tag
/// and is validated on use, so an unrecognized tag fails loudly instead of
/// deserializing into a default.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetOptions {
    pub selector: String,
    /// `"css"` or `"xpath"`.
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub wait_for_selector: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Structural selector of an iframe whose content document becomes the
    /// query scope.
    #[serde(default)]
    pub frame: Option<String>,
}

fn default_engine() -> String {
    "css".to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl TargetOptions {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            engine: "css".to_string(),
            multiple: false,
            wait_for_selector: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            frame: None,
        }
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Self {
            engine: "xpath".to_string(),
            ..Self::css(selector)
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

    pub fn frame(mut self, selector: impl Into<String>) -> Self {
        self.frame = Some(selector.into());
        self
    }

    pub(crate) fn to_request(&self) -> Result<ResolveRequest, ActionError> {
        let engine = SelectorEngine::parse(&self.engine)
            .map_err(|err| ActionError::Resolve(err.into()))?;
        let scope = match &self.frame {
            Some(frame) => QueryScope::Frame(frame.clone()),
            None => QueryScope::Document,
        };
        Ok(ResolveRequest::new(engine, self.selector.clone())
            .multiple(self.multiple)
            .wait(self.wait_for_selector)
            .timeout_ms(self.timeout_ms)
            .scoped(scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_are_rejected() {
        let raw = r##"{"selector":"#x","engines":"css"}"##;
        assert!(serde_json::from_str::<TargetOptions>(raw).is_err());
    }

    #[test]
    fn unknown_engine_tag_fails_on_use() {
        let target = TargetOptions {
            engine: "regex".to_string(),
            ..TargetOptions::css("#x")
        };
        assert!(target.to_request().is_err());
    }

    #[test]
    fn defaults_match_documented_values() {
        let target: TargetOptions =
            serde_json::from_str(r##"{"selector":"#email"}"##).unwrap();
        assert_eq!(target.engine, "css");
        assert_eq!(target.timeout_ms, 5_000);
        assert!(!target.multiple);
        assert!(!target.wait_for_selector);
        assert!(target.frame.is_none());
    }

    #[test]
    fn frame_selects_nested_document_scope() {
        let request = TargetOptions::css("#pay")
            .frame("iframe#checkout")
            .to_request()
            .unwrap();
        assert!(matches!(request.scope, QueryScope::Frame(sel) if sel == "iframe#checkout"));
    }
}
