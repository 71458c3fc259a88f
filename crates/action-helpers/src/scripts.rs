//! Script injection: immediate evaluation and new-document registration.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use cdp_driver::{CdpDriver, DriverError};
use pagehand_core_types::PageId;

use crate::error::ActionError;
use crate::Actions;

/// Active new-document script registration. Disposing removes the script
/// for future navigations.
pub struct ScriptRegistration {
    driver: Arc<CdpDriver>,
    page: PageId,
    identifier: String,
}

impl ScriptRegistration {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub async fn dispose(self) -> Result<(), DriverError> {
        debug!(target: "action-helpers", identifier = %self.identifier, "removing init script");
        self.driver
            .remove_init_script(self.page, &self.identifier)
            .await
    }
}

impl Actions {
    /// Evaluate a script in the page and return its value.
    pub async fn evaluate_script(
        &self,
        page: PageId,
        source: &str,
    ) -> Result<Value, ActionError> {
        Ok(self.driver().evaluate(page, source).await?)
    }

    /// Register a script to run in every new document before navigation
    /// completes.
    pub async fn register_init_script(
        &self,
        page: PageId,
        source: &str,
    ) -> Result<ScriptRegistration, ActionError> {
        let identifier = self.driver().add_init_script(page, source).await?;
        Ok(ScriptRegistration {
            driver: self.driver().clone(),
            page,
            identifier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{actions_with_mock, value_result};

    #[tokio::test]
    async fn evaluate_returns_script_value() {
        let (actions, transport, page) = actions_with_mock();
        transport.push_response(value_result(serde_json::json!(42)));

        let value = actions
            .evaluate_script(page, "6 * 7")
            .await
            .unwrap();
        assert_eq!(value, serde_json::json!(42));
    }

    #[tokio::test]
    async fn registration_disposes_by_identifier() {
        let (actions, transport, page) = actions_with_mock();
        transport.push_response(serde_json::json!({ "identifier": "init-3" }));

        let registration = actions
            .register_init_script(page, "window.__flag = true")
            .await
            .unwrap();
        assert_eq!(registration.identifier(), "init-3");

        registration.dispose().await.unwrap();

        let recorded = transport.recorded();
        assert_eq!(recorded[1].0, "Page.removeScriptToEvaluateOnNewDocument");
        assert_eq!(recorded[1].1["identifier"], "init-3");
    }
}
