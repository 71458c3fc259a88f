//! Text extraction: rendered text, raw text content or full markup.

use serde::{Deserialize, Serialize};

use pagehand_core_types::{OneOrMany, PageId};

use crate::error::ActionError;
use crate::options::TargetOptions;
use crate::Actions;

const INNER_TEXT_FN: &str = "function() { return this.innerText; }";
const TEXT_CONTENT_FN: &str = "function() { return this.textContent; }";
const MARKUP_FN: &str = "function() { return this.outerHTML; }";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TextMode {
    /// Rendered text, as a user would see it.
    InnerText,
    /// Raw text content including hidden nodes.
    TextContent,
    /// The element's full markup.
    Markup,
}

impl TextMode {
    pub fn parse(tag: &str) -> Result<Self, ActionError> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "inner_text" | "innertext" => Ok(TextMode::InnerText),
            "text_content" | "textcontent" => Ok(TextMode::TextContent),
            "markup" | "html" => Ok(TextMode::Markup),
            other => Err(ActionError::InvalidMode(other.to_string())),
        }
    }

    fn reader(self) -> &'static str {
        match self {
            TextMode::InnerText => INNER_TEXT_FN,
            TextMode::TextContent => TEXT_CONTENT_FN,
            TextMode::Markup => MARKUP_FN,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextOptions {
    /// `"inner_text"`, `"text_content"` or `"markup"`.
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_mode() -> String {
    "inner_text".to_string()
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            mode: default_mode(),
        }
    }
}

impl Actions {
    /// Read text from every matched element, trimmed.
    pub async fn read_text(
        &self,
        page: PageId,
        target: &TargetOptions,
        options: &TextOptions,
    ) -> Result<OneOrMany<String>, ActionError> {
        let mode = TextMode::parse(&options.mode)?;

        let handles = self.resolve_required(page, target).await?;

        let mut values = Vec::with_capacity(handles.len());
        let mut outcome = Ok(());
        for (index, element) in handles.iter().enumerate() {
            match self
                .driver()
                .call_function(element, mode.reader(), Vec::new())
                .await
            {
                Ok(raw) => values.push(raw.as_str().unwrap_or_default().trim().to_string()),
                Err(err) => {
                    outcome = Err(ActionError::element(&target.selector, index, err));
                    break;
                }
            }
        }

        self.resolver().release_all(&handles).await;
        outcome.map(|_| OneOrMany::from_results(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{actions_with_mock, object_handle, value_result};

    #[tokio::test]
    async fn rendered_text_is_trimmed_exactly() {
        let (actions, transport, page) = actions_with_mock();
        transport.push_response(object_handle("btn-1"));
        transport.push_response(value_result(serde_json::json!("  Sign In \n")));

        let text = actions
            .read_text(
                page,
                &TargetOptions::css("#email"),
                &TextOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(text, OneOrMany::One("Sign In".to_string()));
    }

    #[tokio::test]
    async fn markup_mode_reads_outer_html() {
        let (actions, transport, page) = actions_with_mock();
        transport.push_response(object_handle("p-1"));
        transport.push_response(value_result(serde_json::json!("<p>hi</p>")));

        let text = actions
            .read_text(
                page,
                &TargetOptions::css("p"),
                &TextOptions {
                    mode: "markup".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(text, OneOrMany::One("<p>hi</p>".to_string()));

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
    async fn unknown_mode_is_invalid() {
        let (actions, transport, page) = actions_with_mock();

        let err = actions
            .read_text(
                page,
                &TargetOptions::css("p"),
                &TextOptions {
                    mode: "shadow".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ActionError::InvalidMode(tag) if tag == "shadow"));
        assert!(transport.recorded().is_empty());
    }
}
