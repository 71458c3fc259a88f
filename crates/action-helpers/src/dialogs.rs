//! Per-page dialog auto-acceptance as an explicit registration.

use std::sync::Arc;

use tracing::debug;

use cdp_driver::CdpDriver;
use pagehand_core_types::PageId;

use crate::Actions;

/// While this guard lives, javascript dialogs opening on the page are
/// accepted automatically. Dropping it stops the behavior.
pub struct DialogAutoAccept {
    driver: Arc<CdpDriver>,
    page: PageId,
}

impl DialogAutoAccept {
    pub fn page(&self) -> PageId {
        self.page
    }
}

impl Drop for DialogAutoAccept {
    fn drop(&mut self) {
        debug!(target: "action-helpers", "dialog auto-accept disabled");
        self.driver.set_dialog_auto_accept(self.page, false);
    }
}

impl Actions {
    /// Accept every javascript dialog on the page until the returned guard
    /// is dropped.
    pub fn accept_dialogs(&self, page: PageId) -> DialogAutoAccept {
        self.driver().set_dialog_auto_accept(page, true);
        debug!(target: "action-helpers", "dialog auto-accept enabled");
        DialogAutoAccept {
            driver: self.driver().clone(),
            page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::actions_with_mock;
    use cdp_driver::TransportEvent;

    #[tokio::test]
    async fn guard_scopes_auto_acceptance() {
        let (actions, transport, page) = actions_with_mock();

        let dialog_event = || TransportEvent {
            method: "Page.javascriptDialogOpening".into(),
            params: serde_json::json!({ "message": "continue?" }),
            session_id: Some("sess-1".into()),
        };

        {
            let _guard = actions.accept_dialogs(page);
            actions.driver().handle_event(dialog_event()).await;
        }
        actions.driver().handle_event(dialog_event()).await;

        let methods = transport.methods();
        // Only the dialog opening inside the guard scope was answered.
        assert_eq!(methods, vec!["Page.handleJavaScriptDialog"]);
    }
}
