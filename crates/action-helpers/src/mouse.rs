//! Click and hover helpers.

use serde::{Deserialize, Serialize};
use tracing::debug;

use element_resolver::{DEFAULT_HIGHLIGHT_COLOR, DEFAULT_POINTER_STEPS};
use pagehand_core_types::PageId;

use crate::error::ActionError;
use crate::options::TargetOptions;
use crate::Actions;

const MOUSEOVER_FN: &str = "function() {\n    this.dispatchEvent(new MouseEvent('mouseover', { bubbles: true, cancelable: true }));\n}";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PointerOptions {
    #[serde(default = "default_pointer_steps")]
    pub pointer_steps: u32,
    #[serde(default)]
    pub highlight: bool,
    #[serde(default = "default_highlight_color")]
    pub highlight_color: String,
}

fn default_pointer_steps() -> u32 {
    DEFAULT_POINTER_STEPS
}

fn default_highlight_color() -> String {
    DEFAULT_HIGHLIGHT_COLOR.to_string()
}

impl Default for PointerOptions {
    fn default() -> Self {
        Self {
            pointer_steps: DEFAULT_POINTER_STEPS,
            highlight: false,
            highlight_color: default_highlight_color(),
        }
    }
}

impl Actions {
    /// Position over each matched element and click its center.
    pub async fn click(
        &self,
        page: PageId,
        target: &TargetOptions,
        options: &PointerOptions,
    ) -> Result<usize, ActionError> {
        let handles = self.resolve_required(page, target).await?;
        let mut processed = 0;

        let mut outcome = Ok(());
        for (index, element) in handles.iter().enumerate() {
            let result = async {
                if options.highlight {
                    self.resolver()
                        .highlight(element, &options.highlight_color)
                        .await?;
                }
                let bbox = self
                    .resolver()
                    .position_over(element, options.pointer_steps)
                    .await?;
                let (cx, cy) = bbox.center();
                debug!(target: "action-helpers", selector = %target.selector, x = cx, y = cy, "clicking");
                self.driver().click_at(page, cx, cy).await?;
                Ok::<(), ActionError>(())
            }
            .await;

            if let Err(err) = result {
                outcome = Err(ActionError::element(&target.selector, index, err));
                break;
            }
            processed += 1;
        }

        self.resolver().release_all(&handles).await;
        outcome.map(|_| processed)
    }

    /// Position over each matched element and dispatch a synthetic
    /// `mouseover` so hover-gated interfaces react.
    pub async fn hover(
        &self,
        page: PageId,
        target: &TargetOptions,
        options: &PointerOptions,
    ) -> Result<usize, ActionError> {
        let handles = self.resolve_required(page, target).await?;
        let mut processed = 0;

        let mut outcome = Ok(());
        for (index, element) in handles.iter().enumerate() {
            let result = async {
                self.resolver()
                    .position_over(element, options.pointer_steps)
                    .await?;
                self.driver()
                    .call_function(element, MOUSEOVER_FN, Vec::new())
                    .await?;
                Ok::<(), ActionError>(())
            }
            .await;

            if let Err(err) = result {
                outcome = Err(ActionError::element(&target.selector, index, err));
                break;
            }
            processed += 1;
        }

        self.resolver().release_all(&handles).await;
        outcome.map(|_| processed)
    }
}
