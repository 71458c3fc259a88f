//! Pointer visualization overlay.
//!
//! Installs a small in-page widget that renders the synthetic pointer as a
//! visible dot and reflects button presses, so automated runs can be watched
//! and recorded. Installation is an explicit per-page registration returning
//! a guard; disposing the guard unregisters the widget for future documents.

use std::sync::Arc;

use tracing::debug;

use cdp_driver::{CdpDriver, DriverError};
use pagehand_core_types::PageId;

use crate::error::ResolveError;
use crate::resolver::ElementResolver;

const POINTER_WIDGET: &str = r#"(() => {
    if (window !== window.parent || window.__pagehandPointer) { return; }
    window.__pagehandPointer = true;
    const install = () => {
        const box = document.createElement('pagehand-pointer');
        const style = document.createElement('style');
        style.innerHTML = `
            pagehand-pointer {
                pointer-events: none;
                position: absolute;
                top: 0; left: 0;
                width: 20px; height: 20px;
                background: rgba(0, 0, 0, .4);
                border: 1px solid white;
                border-radius: 10px;
                margin: -10px 0 0 -10px;
                padding: 0;
                transition: background .2s, border-radius .2s, border-color .2s;
                z-index: 2147483647;
            }
            pagehand-pointer.button-1 {
                transition: none;
                background: rgba(0, 0, 0, .9);
            }
            pagehand-pointer.button-2 {
                transition: none;
                border-color: rgba(0, 0, 255, .9);
            }
            pagehand-pointer.button-3 {
                transition: none;
                border-radius: 4px;
            }
        `;
        document.head.appendChild(style);
        document.body.appendChild(box);
        document.addEventListener('mousemove', event => {
            box.style.left = event.pageX + 'px';
            box.style.top = event.pageY + 'px';
            updateButtons(event.buttons);
        }, true);
        document.addEventListener('mousedown', event => {
            updateButtons(event.buttons);
            box.classList.add('button-' + event.which);
        }, true);
        document.addEventListener('mouseup', event => {
            updateButtons(event.buttons);
            box.classList.remove('button-' + event.which);
        }, true);
        function updateButtons(buttons) {
            for (let i = 0; i < 5; i++) {
                box.classList.toggle('button-' + i, Boolean(buttons & (1 << i)));
            }
        }
    };
    if (document.readyState === 'loading') {
        document.addEventListener('DOMContentLoaded', install, false);
    } else {
        install();
    }
})()"#;

/// Active overlay registration. Call [`PointerOverlay::dispose`] to stop the
/// widget from being installed into future documents; the copy already
/// running in the current document stays until the next navigation.
pub struct PointerOverlay {
    driver: Arc<CdpDriver>,
    page: PageId,
    identifier: String,
}

impl PointerOverlay {
    pub fn page(&self) -> PageId {
        self.page
    }

    pub async fn dispose(self) -> Result<(), DriverError> {
        debug!(target: "element-resolver", identifier = %self.identifier, "removing pointer overlay");
        self.driver
            .remove_init_script(self.page, &self.identifier)
            .await
    }
}

impl ElementResolver {
    /// Install the pointer widget on a page: registered for every new
    /// document and evaluated in the current one so it appears without a
    /// reload.
    pub async fn install_pointer_overlay(
        &self,
        page: PageId,
    ) -> Result<PointerOverlay, ResolveError> {
        let identifier = self.driver().add_init_script(page, POINTER_WIDGET).await?;
        self.driver().evaluate(page, POINTER_WIDGET).await?;
        debug!(target: "element-resolver", identifier = %identifier, "pointer overlay installed");
        Ok(PointerOverlay {
            driver: self.driver().clone(),
            page,
            identifier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::driver_with_mock;

    #[tokio::test]
    async fn installs_for_new_documents_and_current_one() {
        let (driver, transport, page) = driver_with_mock();
        transport.push_response(serde_json::json!({ "identifier": "init-7" }));

        let resolver = ElementResolver::new(driver);
        let overlay = resolver.install_pointer_overlay(page).await.unwrap();

        let recorded = transport.recorded();
        assert_eq!(recorded[0].0, "Page.addScriptToEvaluateOnNewDocument");
        assert!(recorded[0].1["source"]
            .as_str()
            .unwrap()
            .contains("pagehand-pointer"));
        assert_eq!(recorded[1].0, "Runtime.evaluate");

        overlay.dispose().await.unwrap();
        let recorded = transport.recorded();
        assert_eq!(recorded[2].0, "Page.removeScriptToEvaluateOnNewDocument");
        assert_eq!(recorded[2].1["identifier"], "init-7");
    }
}
