//! Pointer positioning over resolved elements.

use serde_json::json;
use tracing::debug;

use cdp_driver::RemoteHandle;
use pagehand_core_types::BoundingBox;

use crate::error::ResolveError;
use crate::resolver::ElementResolver;

/// Number of mouse-moved events dispatched per positioning trajectory.
pub const DEFAULT_POINTER_STEPS: u32 = 10;

/// Border color used when marking an element before acting on it.
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "red";

const BOUNDING_BOX_FN: &str = "function() {\n    const rect = this.getBoundingClientRect();\n    if (!rect) { return null; }\n    return { x: rect.x, y: rect.y, width: rect.width, height: rect.height };\n}";

const HIGHLIGHT_FN: &str =
    "function(color) { this.style.border = '2px solid ' + color; }";

impl ElementResolver {
    /// Read the element's current box and move the pointer to its center in
    /// a smooth fixed-step trajectory. A missing or zero-area box fails
    /// before any pointer event is dispatched.
    pub async fn position_over(
        &self,
        handle: &RemoteHandle,
        steps: u32,
    ) -> Result<BoundingBox, ResolveError> {
        let raw = self
            .driver()
            .call_function(handle, BOUNDING_BOX_FN, Vec::new())
            .await?;

        let bbox: BoundingBox = match serde_json::from_value(raw) {
            Ok(bbox) => bbox,
            Err(_) => return Err(ResolveError::BoundingBoxUnavailable),
        };
        if !bbox.has_area() {
            return Err(ResolveError::BoundingBoxUnavailable);
        }

        let (cx, cy) = bbox.center();
        debug!(target: "element-resolver", x = cx, y = cy, steps, "positioning pointer");
        self.driver()
            .move_pointer(handle.page, cx, cy, steps)
            .await?;
        Ok(bbox)
    }

    /// Draw the marking border on an element.
    pub async fn highlight(
        &self,
        handle: &RemoteHandle,
        color: &str,
    ) -> Result<(), ResolveError> {
        self.driver()
            .call_function(handle, HIGHLIGHT_FN, vec![json!(color)])
            .await?;
        Ok(())
    }
}
