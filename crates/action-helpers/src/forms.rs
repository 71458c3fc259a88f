//! Form control helpers: text inputs, selects, radios and checkboxes.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use cdp_driver::RemoteHandle;
use element_resolver::{DEFAULT_HIGHLIGHT_COLOR, DEFAULT_POINTER_STEPS};
use pagehand_core_types::{OneOrMany, PageId};

use crate::error::ActionError;
use crate::options::TargetOptions;
use crate::Actions;

const READ_VALUE_FN: &str = "function() { return this.value; }";
const READ_CHECKED_FN: &str = "function() { return !!this.checked; }";

const SELECT_OPTION_FN: &str = "function(value, index) {\n    const options = Array.from(this.options || []);\n    let target = -1;\n    if (value !== null && value !== undefined) {\n        target = options.findIndex(option => option.value === value);\n    } else if (index === 'last') {\n        target = options.length - 1;\n    } else if (index !== null && index !== undefined) {\n        target = index;\n    }\n    if (!Number.isInteger(target) || target < 0 || target >= options.length) {\n        return false;\n    }\n    this.selectedIndex = target;\n    this.dispatchEvent(new Event('input', { bubbles: true }));\n    this.dispatchEvent(new Event('change', { bubbles: true }));\n    return true;\n}";

/// Where a select option sits. Positions count from 1, matching how users
/// describe dropdowns; `argument` converts to what the page-side function
/// expects.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SelectPosition {
    First,
    Last,
    Nth(usize),
}

impl SelectPosition {
    fn parse(tag: &str) -> Result<Self, ActionError> {
        let trimmed = tag.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "first" => return Ok(SelectPosition::First),
            "last" => return Ok(SelectPosition::Last),
            _ => {}
        }
        match trimmed.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(SelectPosition::Nth(n)),
            _ => Err(ActionError::InvalidMode(trimmed.to_string())),
        }
    }

    /// The DOM counts from 0; `"last"` stays symbolic because the option
    /// count is only known in the page.
    fn argument(self) -> Value {
        match self {
            SelectPosition::First => json!(0),
            SelectPosition::Last => json!("last"),
            SelectPosition::Nth(n) => json!(n - 1),
        }
    }
}

/// Kind of form control the options apply to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FormKind {
    Text,
    Select,
    Radio,
    Checkbox,
}

impl FormKind {
    pub fn parse(tag: &str) -> Result<Self, ActionError> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(FormKind::Text),
            "select" => Ok(FormKind::Select),
            "radio" => Ok(FormKind::Radio),
            "checkbox" => Ok(FormKind::Checkbox),
            other => Err(ActionError::InvalidMode(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormOptions {
    /// `"text"`, `"select"`, `"radio"` or `"checkbox"`.
    pub kind: String,
    /// Text to type, or the option value to select.
    #[serde(default)]
    pub value: Option<String>,
    /// Select an option by position instead of value: `"first"`, `"last"`
    /// or a 1-based numeric index.
    #[serde(default)]
    pub position: Option<String>,
    /// Desired state for radios and checkboxes.
    #[serde(default)]
    pub selected: bool,
    /// Pause between typed characters.
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default = "default_clear")]
    pub clear_before_type: bool,
    #[serde(default)]
    pub highlight: bool,
    #[serde(default = "default_highlight_color")]
    pub highlight_color: String,
    #[serde(default = "default_pointer_steps")]
    pub pointer_steps: u32,
}

fn default_clear() -> bool {
    true
}

fn default_highlight_color() -> String {
    DEFAULT_HIGHLIGHT_COLOR.to_string()
}

fn default_pointer_steps() -> u32 {
    DEFAULT_POINTER_STEPS
}

impl FormOptions {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            value: Some(value.into()),
            position: None,
            selected: false,
            delay_ms: 0,
            clear_before_type: true,
            highlight: false,
            highlight_color: default_highlight_color(),
            pointer_steps: DEFAULT_POINTER_STEPS,
        }
    }

    pub fn select_value(value: impl Into<String>) -> Self {
        Self {
            kind: "select".to_string(),
            ..Self::text(value)
        }
    }

    pub fn checkbox(selected: bool) -> Self {
        Self {
            kind: "checkbox".to_string(),
            value: None,
            selected,
            ..Self::text("")
        }
    }

    pub fn radio() -> Self {
        Self {
            kind: "radio".to_string(),
            value: None,
            selected: true,
            ..Self::text("")
        }
    }
}

impl Actions {
    /// Fill every matched form control in document order. Returns the
    /// number of elements processed.
    pub async fn fill_form(
        &self,
        page: PageId,
        target: &TargetOptions,
        options: &FormOptions,
    ) -> Result<usize, ActionError> {
        let kind = FormKind::parse(&options.kind)?;
        let position = match kind {
            FormKind::Select => options
                .position
                .as_deref()
                .map(SelectPosition::parse)
                .transpose()?,
            _ => None,
        };

        let handles = self.resolve_required(page, target).await?;
        let mut processed = 0;

        let mut outcome = Ok(());
        for (index, element) in handles.iter().enumerate() {
            if let Err(err) = self
                .fill_one(page, target, options, kind, position, element)
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

    /// Read `value` from every matched form control.
    pub async fn form_value(
        &self,
        page: PageId,
        target: &TargetOptions,
    ) -> Result<OneOrMany<String>, ActionError> {
        let handles = self.resolve_required(page, target).await?;

        let mut values = Vec::with_capacity(handles.len());
        let mut outcome = Ok(());
        for (index, element) in handles.iter().enumerate() {
            match self
                .driver()
                .call_function(element, READ_VALUE_FN, Vec::new())
                .await
            {
                Ok(raw) => values.push(raw.as_str().unwrap_or_default().to_string()),
                Err(err) => {
                    outcome = Err(ActionError::element(&target.selector, index, err));
                    break;
                }
            }
        }

        self.resolver().release_all(&handles).await;
        outcome.map(|_| OneOrMany::from_results(values))
    }

    async fn fill_one(
        &self,
        page: PageId,
        target: &TargetOptions,
        options: &FormOptions,
        kind: FormKind,
        position: Option<SelectPosition>,
        element: &RemoteHandle,
    ) -> Result<(), ActionError> {
        if options.highlight {
            self.resolver()
                .highlight(element, &options.highlight_color)
                .await?;
        }

        debug!(
            target: "action-helpers",
            selector = %target.selector,
            ?kind,
            "filling form control"
        );
        match kind {
            FormKind::Text => self.fill_text(page, target, options, element).await,
            FormKind::Select => self.fill_select(target, options, position, element).await,
            FormKind::Radio => {
                if options.selected {
                    let bbox = self
                        .resolver()
                        .position_over(element, options.pointer_steps)
                        .await?;
                    let (cx, cy) = bbox.center();
                    self.driver().click_at(page, cx, cy).await?;
                }
                Ok(())
            }
            FormKind::Checkbox => {
                let checked = self
                    .driver()
                    .call_function(element, READ_CHECKED_FN, Vec::new())
                    .await?
                    .as_bool()
                    .unwrap_or(false);
                if checked != options.selected {
                    let bbox = self
                        .resolver()
                        .position_over(element, options.pointer_steps)
                        .await?;
                    let (cx, cy) = bbox.center();
                    self.driver().click_at(page, cx, cy).await?;
                }
                Ok(())
            }
        }
    }

    async fn fill_text(
        &self,
        page: PageId,
        target: &TargetOptions,
        options: &FormOptions,
        element: &RemoteHandle,
    ) -> Result<(), ActionError> {
        let value = options.value.as_deref().ok_or(ActionError::MissingProperty {
            selector: target.selector.clone(),
            what: "value to type",
        })?;

        let bbox = self
            .resolver()
            .position_over(element, options.pointer_steps)
            .await?;
        let (cx, cy) = bbox.center();

        if options.clear_before_type {
            // Triple click selects the existing text, Backspace removes it.
            self.driver().click_at_with_count(page, cx, cy, 3).await?;
            self.driver().press_key(page, "Backspace", None).await?;
        } else {
            self.driver().click_at(page, cx, cy).await?;
        }

        self.driver()
            .type_chars(page, value, options.delay_ms)
            .await?;
        Ok(())
    }

    async fn fill_select(
        &self,
        target: &TargetOptions,
        options: &FormOptions,
        position: Option<SelectPosition>,
        element: &RemoteHandle,
    ) -> Result<(), ActionError> {
        let value_arg = options
            .value
            .as_ref()
            .map(|v| json!(v))
            .unwrap_or(Value::Null);
        let index_arg = position.map(SelectPosition::argument).unwrap_or(Value::Null);

        let matched = self
            .driver()
            .call_function(element, SELECT_OPTION_FN, vec![value_arg, index_arg])
            .await?
            .as_bool()
            .unwrap_or(false);

        if !matched {
            return Err(ActionError::MissingProperty {
                selector: target.selector.clone(),
                what: "matching option",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{actions_with_mock, bbox_result, object_handle, value_result};

    fn low_steps(mut options: FormOptions) -> FormOptions {
        options.pointer_steps = 1;
        options
    }

    #[tokio::test]
    async fn checkbox_clicks_only_when_state_differs() {
        let (actions, transport, page) = actions_with_mock();
        transport.push_response(object_handle("box-1"));
        transport.push_response(value_result(serde_json::json!(false)));
        transport.push_response(bbox_result(0.0, 0.0, 20.0, 20.0));

        actions
            .fill_form(
                page,
                &TargetOptions::css("#opt-in"),
                &low_steps(FormOptions::checkbox(true)),
            )
            .await
            .unwrap();

        let methods = transport.methods();
        assert!(methods.iter().any(|m| m == "Input.dispatchMouseEvent"));
    }

    #[tokio::test]
    async fn checkbox_in_requested_state_stays_untouched() {
        let (actions, transport, page) = actions_with_mock();
        transport.push_response(object_handle("box-1"));
        transport.push_response(value_result(serde_json::json!(true)));

        actions
            .fill_form(
                page,
                &TargetOptions::css("#opt-in"),
                &low_steps(FormOptions::checkbox(true)),
            )
            .await
            .unwrap();

        let methods = transport.methods();
        assert!(!methods.iter().any(|m| m == "Input.dispatchMouseEvent"));
    }

    #[tokio::test]
    async fn text_clears_with_triple_click_then_types() {
        let (actions, transport, page) = actions_with_mock();
        transport.push_response(object_handle("input-1"));
        transport.push_response(bbox_result(0.0, 0.0, 100.0, 20.0));

        actions
            .fill_form(
                page,
                &TargetOptions::css("#name"),
                &low_steps(FormOptions::text("ok")),
            )
            .await
            .unwrap();

        let recorded = transport.recorded();
        let triple = recorded
            .iter()
            .find(|(method, params)| {
                method == "Input.dispatchMouseEvent" && params["clickCount"] == 3
            })
            .expect("triple click dispatched");
        assert_eq!(triple.1["type"], "mousePressed");

        let backspace = recorded
            .iter()
            .find(|(method, params)| {
                method == "Input.dispatchKeyEvent" && params["key"] == "Backspace"
            })
            .expect("backspace dispatched");
        assert_eq!(backspace.1["type"], "rawKeyDown");

        let typed: Vec<_> = recorded
            .iter()
            .filter(|(method, params)| {
                method == "Input.dispatchKeyEvent" && params["type"] == "keyDown"
            })
            .collect();
        assert_eq!(typed.len(), 2);
    }

    #[tokio::test]
    async fn select_by_value_reports_missing_option() {
        let (actions, transport, page) = actions_with_mock();
        transport.push_response(object_handle("select-1"));
        transport.push_response(value_result(serde_json::json!(false)));

        let err = actions
            .fill_form(
                page,
                &TargetOptions::css("#country"),
                &FormOptions::select_value("atlantis"),
            )
            .await
            .unwrap_err();

        match err {
            ActionError::Element { selector, index, source } => {
                assert_eq!(selector, "#country");
                assert_eq!(index, 0);
                assert!(matches!(
                    *source,
                    ActionError::MissingProperty { what: "matching option", .. }
                ));
            }
            other => panic!("expected Element, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn select_passes_value_and_position_arguments() {
        let (actions, transport, page) = actions_with_mock();
        transport.push_response(object_handle("select-1"));
        transport.push_response(value_result(serde_json::json!(true)));

        let mut options = FormOptions::select_value("us");
        options.position = None;
        actions
            .fill_form(page, &TargetOptions::css("#country"), &options)
            .await
            .unwrap();

        let recorded = transport.recorded();
        let call = recorded
            .iter()
            .find(|(method, _)| method == "Runtime.callFunctionOn")
            .unwrap();
        assert_eq!(call.1["arguments"][0]["value"], "us");
        assert_eq!(call.1["arguments"][1]["value"], serde_json::Value::Null);
    }

    #[test]
    fn select_positions_count_from_one() {
        assert_eq!(SelectPosition::parse("first").unwrap().argument(), json!(0));
        assert_eq!(SelectPosition::parse("last").unwrap().argument(), json!("last"));
        assert_eq!(SelectPosition::parse("1").unwrap().argument(), json!(0));
        assert_eq!(SelectPosition::parse("3").unwrap().argument(), json!(2));
        assert!(SelectPosition::parse("0").is_err());
        assert!(SelectPosition::parse("middle").is_err());
    }

    #[tokio::test]
    async fn select_by_position_sends_zero_based_index() {
        let (actions, transport, page) = actions_with_mock();
        transport.push_response(object_handle("select-1"));
        transport.push_response(value_result(serde_json::json!(true)));

        let mut options = FormOptions::select_value("");
        options.value = None;
        options.position = Some("2".to_string());
        actions
            .fill_form(page, &TargetOptions::css("#country"), &options)
            .await
            .unwrap();

        let recorded = transport.recorded();
        let call = recorded
            .iter()
            .find(|(method, _)| method == "Runtime.callFunctionOn")
            .unwrap();
        assert_eq!(call.1["arguments"][0]["value"], serde_json::Value::Null);
        // Position 2 is the second option, index 1 in the DOM.
        assert_eq!(call.1["arguments"][1]["value"], 1);
    }

    #[tokio::test]
    async fn select_position_zero_is_rejected_before_any_traffic() {
        let (actions, transport, page) = actions_with_mock();

        let mut options = FormOptions::select_value("");
        options.value = None;
        options.position = Some("0".to_string());
        let err = actions
            .fill_form(page, &TargetOptions::css("#country"), &options)
            .await
            .unwrap_err();

        assert!(matches!(err, ActionError::InvalidMode(tag) if tag == "0"));
        assert!(transport.recorded().is_empty());
    }

    #[tokio::test]
    async fn form_value_unwraps_single_result() {
        let (actions, transport, page) = actions_with_mock();
        transport.push_response(object_handle("input-1"));
        transport.push_response(value_result(serde_json::json!("hello")));

        let value = actions
            .form_value(page, &TargetOptions::css("#name"))
            .await
            .unwrap();
        assert_eq!(value, OneOrMany::One("hello".to_string()));
    }

    #[tokio::test]
    async fn unknown_kind_is_invalid_mode() {
        let (actions, transport, page) = actions_with_mock();

        let mut options = FormOptions::text("x");
        options.kind = "slider".to_string();
        let err = actions
            .fill_form(page, &TargetOptions::css("#x"), &options)
            .await
            .unwrap_err();

        assert!(matches!(err, ActionError::InvalidMode(tag) if tag == "slider"));
        assert!(transport.recorded().is_empty());
    }
}
