//! HTML fragment insertion relative to a resolved element.

use serde::{Deserialize, Serialize};
use serde_json::json;

use pagehand_core_types::PageId;

use crate::error::ActionError;
use crate::options::TargetOptions;
use crate::Actions;

const INSERT_ADJACENT_FN: &str =
    "function(position, html) { this.insertAdjacentHTML(position, html); }";
const REPLACE_FN: &str = "function(html) { this.outerHTML = html; }";

/// Where the fragment lands relative to the element.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InsertPosition {
    FirstChild,
    LastChild,
    Before,
    After,
    Replace,
}

impl InsertPosition {
    pub fn parse(tag: &str) -> Result<Self, ActionError> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "first_child" | "firstchild" => Ok(InsertPosition::FirstChild),
            "last_child" | "lastchild" => Ok(InsertPosition::LastChild),
            "before" => Ok(InsertPosition::Before),
            "after" => Ok(InsertPosition::After),
            "replace" => Ok(InsertPosition::Replace),
            other => Err(ActionError::InvalidMode(other.to_string())),
        }
    }

    fn adjacent_keyword(self) -> Option<&'static str> {
        match self {
            InsertPosition::FirstChild => Some("afterbegin"),
            InsertPosition::LastChild => Some("beforeend"),
            InsertPosition::Before => Some("beforebegin"),
            InsertPosition::After => Some("afterend"),
            InsertPosition::Replace => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InsertHtmlOptions {
    pub html: String,
    /// `"first_child"`, `"last_child"`, `"before"`, `"after"` or
    /// `"replace"`.
    #[serde(default = "default_position")]
    pub position: String,
}

fn default_position() -> String {
    "last_child".to_string()
}

impl Actions {
    /// Insert a fragment relative to every matched element. Returns the
    /// number of elements touched.
    pub async fn insert_html(
        &self,
        page: PageId,
        target: &TargetOptions,
        options: &InsertHtmlOptions,
    ) -> Result<usize, ActionError> {
        let position = InsertPosition::parse(&options.position)?;

        let handles = self.resolve_required(page, target).await?;
        let mut processed = 0;

        let mut outcome = Ok(());
        for (index, element) in handles.iter().enumerate() {
            let result = match position.adjacent_keyword() {
                Some(keyword) => {
                    self.driver()
                        .call_function(
                            element,
                            INSERT_ADJACENT_FN,
                            vec![json!(keyword), json!(options.html)],
                        )
                        .await
                }
                None => {
                    self.driver()
                        .call_function(element, REPLACE_FN, vec![json!(options.html)])
                        .await
                }
            };

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{actions_with_mock, object_handle};

    #[tokio::test]
    async fn first_child_maps_to_afterbegin() {
        let (actions, transport, page) = actions_with_mock();
        transport.push_response(object_handle("div-1"));

        let options = InsertHtmlOptions {
            html: "<span>x</span>".to_string(),
            position: "first_child".to_string(),
        };
        actions
            .insert_html(page, &TargetOptions::css("#list"), &options)
            .await
            .unwrap();

        let recorded = transport.recorded();
        let call = recorded
            .iter()
            .find(|(method, _)| method == "Runtime.callFunctionOn")
            .unwrap();
        assert_eq!(call.1["arguments"][0]["value"], "afterbegin");
        assert_eq!(call.1["arguments"][1]["value"], "<span>x</span>");
    }

    #[tokio::test]
    async fn replace_swaps_outer_html() {
        let (actions, transport, page) = actions_with_mock();
        transport.push_response(object_handle("div-1"));

        let options = InsertHtmlOptions {
            html: "<div>new</div>".to_string(),
            position: "replace".to_string(),
        };
        actions
            .insert_html(page, &TargetOptions::css("#old"), &options)
            .await
            .unwrap();

        let recorded = transport.recorded();
        let call = recorded
            .iter()
            .find(|(method, _)| method == "Runtime.callFunctionOn")
            .unwrap();
        assert!(call.1["functionDeclaration"]
            .as_str()
            .unwrap()
            .contains("outerHTML"));
    }

    #[tokio::test]
    async fn unknown_position_is_invalid() {
        let (actions, transport, page) = actions_with_mock();

        let options = InsertHtmlOptions {
            html: "<b>x</b>".to_string(),
            position: "inside".to_string(),
        };
        let err = actions
            .insert_html(page, &TargetOptions::css("#x"), &options)
            .await
            .unwrap_err();

        assert!(matches!(err, ActionError::InvalidMode(tag) if tag == "inside"));
        assert!(transport.recorded().is_empty());
    }
}
