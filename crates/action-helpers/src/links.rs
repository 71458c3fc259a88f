//! Anchor following: resolve a link, read its destination and navigate.

use tracing::info;

use pagehand_core_types::PageId;

use crate::error::ActionError;
use crate::options::TargetOptions;
use crate::Actions;

const READ_HREF_FN: &str = "function() { return this.href || null; }";

impl Actions {
    /// Resolve an anchor, read its absolute destination and navigate the
    /// page there. Returns the url followed.
    pub async fn follow_link(
        &self,
        page: PageId,
        target: &TargetOptions,
    ) -> Result<String, ActionError> {
        let handles = self.resolve_required(page, target).await?;
        let element = &handles[0];

        let href = self
            .driver()
            .call_function(element, READ_HREF_FN, Vec::new())
            .await
            .map(|raw| raw.as_str().map(str::to_string));
        self.resolver().release_all(&handles).await;

        let href = href?.ok_or(ActionError::MissingProperty {
            selector: target.selector.clone(),
            what: "href",
        })?;

        info!(target: "action-helpers", url = %href, "following link");
        self.driver().navigate(page, &href).await?;
        Ok(href)
    }
}
