//! Helper actions composing resolve, position and act.
//!
//! Every helper follows the same shape: resolve the target (css or xpath,
//! single or multiple, optionally waiting for appearance), position the
//! pointer over each element, perform exactly one action per element in
//! document order, aggregate per-element results and release the handles.

use std::sync::Arc;

use cdp_driver::{CdpDriver, RemoteHandle};
use element_resolver::ElementResolver;
use pagehand_core_types::PageId;

pub mod attributes;
pub mod cookies;
pub mod dialogs;
pub mod error;
pub mod forms;
pub mod html;
pub mod keyboard;
pub mod links;
pub mod mouse;
pub mod options;
pub mod scripts;
pub mod scroll;
pub mod text;

pub use dialogs::DialogAutoAccept;
pub use error::ActionError;
pub use forms::{FormKind, FormOptions};
pub use html::{InsertHtmlOptions, InsertPosition};
pub use keyboard::{KeyAction, PressKeyOptions};
pub use mouse::PointerOptions;
pub use options::TargetOptions;
pub use scripts::ScriptRegistration;
pub use scroll::ScrollOptions;
pub use text::{TextMode, TextOptions};

pub struct Actions {
    resolver: ElementResolver,
}

impl Actions {
    pub fn new(driver: Arc<CdpDriver>) -> Self {
        Self {
            resolver: ElementResolver::new(driver),
        }
    }

    pub fn resolver(&self) -> &ElementResolver {
        &self.resolver
    }

    pub fn driver(&self) -> &Arc<CdpDriver> {
        self.resolver.driver()
    }

    /// Resolve a target that the action cannot proceed without. An empty
    /// resolution is the typed not-found outcome carrying the selector.
    pub(crate) async fn resolve_required(
        &self,
        page: PageId,
        target: &TargetOptions,
    ) -> Result<Vec<RemoteHandle>, ActionError> {
        let request = target.to_request()?;
        let handles = self.resolver.resolve(page, &request).await?;
        if handles.is_empty() {
            return Err(ActionError::NotFound {
                selector: target.selector.clone(),
            });
        }
        Ok(handles)
    }
}
