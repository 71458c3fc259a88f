//! Scrolling: page deltas and scrolling elements into view.

use serde::{Deserialize, Serialize};
use serde_json::json;

use pagehand_core_types::PageId;

use crate::error::ActionError;
use crate::options::TargetOptions;
use crate::Actions;

const SCROLL_INTO_VIEW_FN: &str = "function(smooth) {\n    this.scrollIntoView({ behavior: smooth ? 'smooth' : 'auto', block: 'center', inline: 'nearest' });\n}";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScrollOptions {
    #[serde(default)]
    pub smooth: bool,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self { smooth: false }
    }
}

impl Actions {
    /// Scroll the page window by a pixel delta.
    pub async fn scroll_by(
        &self,
        page: PageId,
        delta_x: f64,
        delta_y: f64,
        options: &ScrollOptions,
    ) -> Result<(), ActionError> {
        let behavior = if options.smooth { "smooth" } else { "auto" };
        let expression = format!(
            "window.scrollBy({})",
            json!({ "left": delta_x, "top": delta_y, "behavior": behavior })
        );
        self.driver().evaluate(page, &expression).await?;
        Ok(())
    }

    /// Scroll each matched element into view, strictly in document order.
    /// Returns the number of elements scrolled.
    pub async fn scroll_into_view(
        &self,
        page: PageId,
        target: &TargetOptions,
        options: &ScrollOptions,
    ) -> Result<usize, ActionError> {
        let handles = self.resolve_required(page, target).await?;
        let mut processed = 0;

        let mut outcome = Ok(());
        for (index, element) in handles.iter().enumerate() {
            if let Err(err) = self
                .driver()
                .call_function(element, SCROLL_INTO_VIEW_FN, vec![json!(options.smooth)])
                .await
            {
                outcome = Err(ActionError::element(&target.selector, index, err));
                break;
            }
            processed += 1;
        }

        self.resolver().release_all(&handles).await;
        outcome.map(|_| processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{actions_with_mock, object_handle, value_result};

    #[tokio::test]
    async fn scroll_by_evaluates_window_scroll() {
        let (actions, transport, page) = actions_with_mock();

        actions
            .scroll_by(page, 0.0, 400.0, &ScrollOptions::default())
            .await
            .unwrap();

        let recorded = transport.recorded();
        let expr = recorded[0].1["expression"].as_str().unwrap();
        assert!(expr.starts_with("window.scrollBy("));
        assert!(expr.contains("\"top\":400.0"));
    }

    #[tokio::test]
    async fn scrolls_each_match_in_order() {
        let (actions, transport, page) = actions_with_mock();
        // xpath multi: count, snapshot, length, three conversions, release.
        transport.push_response(value_result(serde_json::json!(3)));
        transport.push_response(object_handle("arr-1"));
        transport.push_response(value_result(serde_json::json!(3)));
        transport.push_response(object_handle("li-0"));
        transport.push_response(object_handle("li-1"));
        transport.push_response(object_handle("li-2"));

        let processed = actions
            .scroll_into_view(
                page,
                &TargetOptions::xpath("//li").multiple(true),
                &ScrollOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(processed, 3);
    }

    #[tokio::test]
    async fn failure_mid_loop_reports_selector_and_position() {
        let (actions, transport, page) = actions_with_mock();
        transport.push_response(value_result(serde_json::json!(3)));
        transport.push_response(object_handle("arr-1"));
        transport.push_response(value_result(serde_json::json!(3)));
        transport.push_response(object_handle("li-0"));
        transport.push_response(object_handle("li-1"));
        transport.push_response(object_handle("li-2"));
        transport.push_response(serde_json::json!({})); // release array
        transport.push_response(value_result(serde_json::Value::Null)); // scroll li-0
        transport.push_response(value_result(serde_json::Value::Null)); // scroll li-1
        transport.push_response(serde_json::json!("__fail__")); // scroll li-2

        let err = actions
            .scroll_into_view(
                page,
                &TargetOptions::xpath("//li").multiple(true),
                &ScrollOptions::default(),
            )
            .await
            .unwrap_err();

        match err {
            ActionError::Element { selector, index, .. } => {
                assert_eq!(selector, "//li");
                assert_eq!(index, 2);
            }
            other => panic!("expected Element, got {other:?}"),
        }
    }
}
