//! DOM attribute read/write via in-page evaluation.

use serde_json::json;

use pagehand_core_types::{OneOrMany, PageId};

use crate::error::ActionError;
use crate::options::TargetOptions;
use crate::Actions;

const GET_ATTRIBUTE_FN: &str = "function(name) { return this.getAttribute(name); }";
const SET_ATTRIBUTE_FN: &str = "function(name, value) { this.setAttribute(name, value); }";

impl Actions {
    /// Read an attribute from every matched element. A missing attribute is
    /// `None` for that element.
    pub async fn get_attribute(
        &self,
        page: PageId,
        target: &TargetOptions,
        name: &str,
    ) -> Result<OneOrMany<Option<String>>, ActionError> {
        let handles = self.resolve_required(page, target).await?;

        let mut values = Vec::with_capacity(handles.len());
        let mut outcome = Ok(());
        for (index, element) in handles.iter().enumerate() {
            match self
                .driver()
                .call_function(element, GET_ATTRIBUTE_FN, vec![json!(name)])
                .await
            {
                Ok(raw) => values.push(raw.as_str().map(str::to_string)),
                Err(err) => {
                    outcome = Err(ActionError::element(&target.selector, index, err));
                    break;
                }
            }
        }

        self.resolver().release_all(&handles).await;
        outcome.map(|_| OneOrMany::from_results(values))
    }

    /// Write an attribute on every matched element. Returns the number of
    /// elements updated.
    pub async fn set_attribute(
        &self,
        page: PageId,
        target: &TargetOptions,
        name: &str,
        value: &str,
    ) -> Result<usize, ActionError> {
        let handles = self.resolve_required(page, target).await?;
        let mut processed = 0;

        let mut outcome = Ok(());
        for (index, element) in handles.iter().enumerate() {
            if let Err(err) = self
                .driver()
                .call_function(element, SET_ATTRIBUTE_FN, vec![json!(name), json!(value)])
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
    async fn single_match_returns_bare_value() {
        let (actions, transport, page) = actions_with_mock();
        transport.push_response(object_handle("a-1"));
        transport.push_response(value_result(serde_json::json!("https://example.com")));

        let value = actions
            .get_attribute(page, &TargetOptions::css("a.primary"), "href")
            .await
            .unwrap();

        assert_eq!(
            value,
            OneOrMany::One(Some("https://example.com".to_string()))
        );
    }

    #[tokio::test]
    async fn multiple_matches_return_ordered_list() {
        let (actions, transport, page) = actions_with_mock();
        // css multi: array handle, length, then one conversion per node.
        transport.push_response(object_handle("arr-1"));
        transport.push_response(value_result(serde_json::json!(2)));
        transport.push_response(object_handle("a-1"));
        transport.push_response(object_handle("a-2"));
        transport.push_response(serde_json::json!({})); // release array
        transport.push_response(value_result(serde_json::json!("one")));
        transport.push_response(value_result(serde_json::Value::Null));

        let value = actions
            .get_attribute(
                page,
                &TargetOptions::css("a").multiple(true),
                "data-label",
            )
            .await
            .unwrap();

        assert_eq!(
            value,
            OneOrMany::Many(vec![Some("one".to_string()), None])
        );
    }

    #[tokio::test]
    async fn set_attribute_passes_name_and_value() {
        let (actions, transport, page) = actions_with_mock();
        transport.push_response(object_handle("div-1"));

        let processed = actions
            .set_attribute(page, &TargetOptions::css("#banner"), "data-state", "done")
            .await
            .unwrap();
        assert_eq!(processed, 1);

        let recorded = transport.recorded();
        let call = recorded
            .iter()
            .find(|(method, _)| method == "Runtime.callFunctionOn")
            .unwrap();
        assert_eq!(call.1["arguments"][0]["value"], "data-state");
        assert_eq!(call.1["arguments"][1]["value"], "done");
    }
}
