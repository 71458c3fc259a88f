//! Keyboard helpers: focus an element and type into it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use pagehand_core_types::PageId;

use crate::error::ActionError;
use crate::options::TargetOptions;
use crate::Actions;

const FOCUS_FN: &str = "function() { this.focus(); }";

/// How the value is delivered to the focused element.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyAction {
    /// One key press per character, with an optional delay in between.
    Press,
    /// The whole string in a single insertion.
    PressMultiple,
}

impl KeyAction {
    pub fn parse(tag: &str) -> Result<Self, ActionError> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "press" => Ok(KeyAction::Press),
            "pressmultiple" => Ok(KeyAction::PressMultiple),
            other => Err(ActionError::InvalidMode(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PressKeyOptions {
    /// `"press"` or `"pressMultiple"`.
    pub action: String,
    pub value: String,
    /// Pause between characters in `press` mode.
    #[serde(default)]
    pub delay_ms: u64,
}

impl PressKeyOptions {
    pub fn press(value: impl Into<String>) -> Self {
        Self {
            action: "press".to_string(),
            value: value.into(),
            delay_ms: 0,
        }
    }

    pub fn press_multiple(value: impl Into<String>) -> Self {
        Self {
            action: "pressMultiple".to_string(),
            value: value.into(),
            delay_ms: 0,
        }
    }

    pub fn delay_ms(mut self, delay: u64) -> Self {
        self.delay_ms = delay;
        self
    }
}

impl Actions {
    /// Focus the first matching element and type the value into it.
    pub async fn press_key(
        &self,
        page: PageId,
        target: &TargetOptions,
        options: &PressKeyOptions,
    ) -> Result<(), ActionError> {
        let action = KeyAction::parse(&options.action)?;

        let handles = self.resolve_required(page, target).await?;
        let element = &handles[0];

        let outcome = async {
            self.driver()
                .call_function(element, FOCUS_FN, Vec::new())
                .await?;

            debug!(
                target: "action-helpers",
                selector = %target.selector,
                ?action,
                chars = options.value.chars().count(),
                "typing into element"
            );
            match action {
                KeyAction::Press => {
                    self.driver()
                        .type_chars(page, &options.value, options.delay_ms)
                        .await?
                }
                KeyAction::PressMultiple => {
                    self.driver().insert_text(page, &options.value).await?
                }
            }
            Ok::<(), ActionError>(())
        }
        .await;

        self.resolver().release_all(&handles).await;
        outcome
    }
}
