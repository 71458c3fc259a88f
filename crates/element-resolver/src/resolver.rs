//! The element resolver: one reusable wait/count/branch/fetch/convert
//! pipeline shared by every helper action.

use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use cdp_driver::{CdpDriver, RemoteHandle};
use pagehand_core_types::{PageId, SelectorEngine};

use crate::error::ResolveError;
use crate::request::ResolveRequest;
use crate::scripts;

pub struct ElementResolver {
    driver: Arc<CdpDriver>,
}

impl ElementResolver {
    pub fn new(driver: Arc<CdpDriver>) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &Arc<CdpDriver> {
        &self.driver
    }

    /// Resolve a selector into zero or more live element handles in
    /// document order. When `multiple` is false the result holds at most
    /// the first match.
    pub async fn resolve(
        &self,
        page: PageId,
        request: &ResolveRequest,
    ) -> Result<Vec<RemoteHandle>, ResolveError> {
        request.validate()?;

        if request.wait_for_selector {
            self.wait_for_appearance(page, request).await?;
        }

        let handles = match (request.engine, request.multiple) {
            (SelectorEngine::Css, false) => {
                self.single(page, &scripts::css_first(&request.scope, &request.selector))
                    .await?
            }
            (SelectorEngine::Css, true) => {
                self.collect_array(page, &scripts::css_all(&request.scope, &request.selector))
                    .await?
            }
            (SelectorEngine::XPath, false) => {
                self.single(page, &scripts::xpath_first(&request.scope, &request.selector))
                    .await?
            }
            (SelectorEngine::XPath, true) => self.resolve_xpath_multi(page, request).await?,
        };

        cdp_driver::metrics::global().record_resolution(request.engine.as_str());
        debug!(
            target: "element-resolver",
            engine = %request.engine,
            selector = %request.selector,
            matched = handles.len(),
            "resolved selector"
        );
        Ok(handles)
    }

    async fn wait_for_appearance(
        &self,
        page: PageId,
        request: &ResolveRequest,
    ) -> Result<(), ResolveError> {
        let outcome = match request.engine {
            SelectorEngine::Css => {
                self.driver
                    .wait_for_selector(page, &request.scope, &request.selector, request.timeout_ms)
                    .await
            }
            SelectorEngine::XPath => {
                let predicate = format!(
                    "({}) !== null",
                    scripts::xpath_first(&request.scope, &request.selector)
                );
                self.driver
                    .wait_for_predicate(page, &predicate, request.timeout_ms)
                    .await
            }
        };

        outcome.map_err(|err| {
            ResolveError::from_wait(err, request.engine, &request.selector, request.timeout_ms)
        })
    }

    /// Count first, then fetch. Counting the ordered snapshot is cheap; the
    /// per-node handle conversion is not, so it only happens once more than
    /// one match is confirmed present.
    async fn resolve_xpath_multi(
        &self,
        page: PageId,
        request: &ResolveRequest,
    ) -> Result<Vec<RemoteHandle>, ResolveError> {
        let count_expr = scripts::xpath_count(&request.scope, &request.selector);
        let count = self
            .driver
            .evaluate(page, &count_expr)
            .await?
            .as_u64()
            .unwrap_or(0);

        if count == 0 {
            return Ok(Vec::new());
        }
        if count == 1 {
            return self
                .single(page, &scripts::xpath_first(&request.scope, &request.selector))
                .await;
        }

        let snapshot_expr = scripts::xpath_snapshot(&request.scope, &request.selector);
        self.collect_array(page, &snapshot_expr).await
    }

    async fn single(
        &self,
        page: PageId,
        expression: &str,
    ) -> Result<Vec<RemoteHandle>, ResolveError> {
        match self.driver.evaluate_handle(page, expression).await? {
            Some(handle) => Ok(vec![handle]),
            None => Ok(Vec::new()),
        }
    }

    /// Evaluate an array-producing expression and convert each entry into
    /// its own handle, one round trip per node. The array object itself is
    /// released afterwards.
    async fn collect_array(
        &self,
        page: PageId,
        expression: &str,
    ) -> Result<Vec<RemoteHandle>, ResolveError> {
        let Some(array) = self.driver.evaluate_handle(page, expression).await? else {
            return Ok(Vec::new());
        };

        let result = self.convert_array_items(&array).await;
        self.driver.release_handle(&array).await;
        result
    }

    async fn convert_array_items(
        &self,
        array: &RemoteHandle,
    ) -> Result<Vec<RemoteHandle>, ResolveError> {
        let length = self
            .driver
            .call_function(array, "function() { return this.length; }", Vec::new())
            .await?
            .as_u64()
            .unwrap_or(0);

        let mut handles = Vec::with_capacity(length as usize);
        for index in 0..length {
            let item = self
                .driver
                .call_function_handle(
                    array,
                    "function(i) { return this[i]; }",
                    vec![json!(index)],
                )
                .await?;
            if let Some(handle) = item {
                handles.push(handle);
            }
        }
        Ok(handles)
    }

    /// Release every handle in a resolution result, best effort.
    pub async fn release_all(&self, handles: &[RemoteHandle]) {
        for handle in handles {
            self.driver.release_handle(handle).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{driver_with_mock, evaluate_value, object_handle};
    use cdp_driver::DriverErrorKind;

    #[tokio::test]
    async fn css_single_returns_first_match_only() {
        let (driver, transport, page) = driver_with_mock();
        transport.push_response(object_handle("node-1"));

        let resolver = ElementResolver::new(driver);
        let handles = resolver
            .resolve(page, &ResolveRequest::css("#email"))
            .await
            .unwrap();

        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].object_id, "node-1");

        let recorded = transport.recorded();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].1["expression"]
            .as_str()
            .unwrap()
            .contains("querySelector("));
    }

    #[tokio::test]
    async fn css_single_without_match_is_empty() {
        let (driver, transport, page) = driver_with_mock();
        transport.push_response(serde_json::json!({
            "result": { "type": "object", "subtype": "null" },
        }));

        let resolver = ElementResolver::new(driver);
        let handles = resolver
            .resolve(page, &ResolveRequest::css(".missing"))
            .await
            .unwrap();
        assert!(handles.is_empty());
    }

    #[tokio::test]
    async fn xpath_multi_zero_matches_skips_fetch() {
        let (driver, transport, page) = driver_with_mock();
        transport.push_response(evaluate_value(serde_json::json!(0)));

        let resolver = ElementResolver::new(driver);
        let handles = resolver
            .resolve(page, &ResolveRequest::xpath("//li").multiple(true))
            .await
            .unwrap();

        assert!(handles.is_empty());
        // Only the count evaluation went out.
        assert_eq!(transport.recorded().len(), 1);
    }

    #[tokio::test]
    async fn xpath_multi_single_match_uses_first_node_path() {
        let (driver, transport, page) = driver_with_mock();
        transport.push_response(evaluate_value(serde_json::json!(1)));
        transport.push_response(object_handle("only-one"));

        let resolver = ElementResolver::new(driver);
        let handles = resolver
            .resolve(page, &ResolveRequest::xpath("//li").multiple(true))
            .await
            .unwrap();

        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].object_id, "only-one");

        let recorded = transport.recorded();
        assert_eq!(recorded.len(), 2);
        assert!(recorded[1].1["expression"]
            .as_str()
            .unwrap()
            .contains("FIRST_ORDERED_NODE_TYPE"));
    }

    #[tokio::test]
    async fn xpath_multi_converts_each_node_individually() {
        let (driver, transport, page) = driver_with_mock();
        transport.push_response(evaluate_value(serde_json::json!(3)));
        transport.push_response(object_handle("arr-1"));
        transport.push_response(evaluate_value(serde_json::json!(3)));
        transport.push_response(object_handle("n-0"));
        transport.push_response(object_handle("n-1"));
        transport.push_response(object_handle("n-2"));

        let resolver = ElementResolver::new(driver);
        let handles = resolver
            .resolve(page, &ResolveRequest::xpath("//li").multiple(true))
            .await
            .unwrap();

        assert_eq!(
            handles.iter().map(|h| h.object_id.as_str()).collect::<Vec<_>>(),
            vec!["n-0", "n-1", "n-2"]
        );

        let recorded = transport.recorded();
        // count + snapshot + length + 3 conversions + release.
        assert_eq!(recorded.len(), 7);
        let conversions = recorded
            .iter()
            .filter(|(method, _)| method == "Runtime.callFunctionOn")
            .count();
        assert_eq!(conversions, 4);
        assert_eq!(recorded[6].0, "Runtime.releaseObject");
    }

    #[tokio::test]
    async fn wait_timeout_surfaces_typed_not_found() {
        let (driver, transport, page) = driver_with_mock();
        for _ in 0..64 {
            transport.push_response(evaluate_value(serde_json::json!(false)));
        }

        let resolver = ElementResolver::new(driver);
        let err = resolver
            .resolve(
                page,
                &ResolveRequest::css("#never").wait(true).timeout_ms(15),
            )
            .await
            .unwrap_err();

        match err {
            ResolveError::NotFound { selector, .. } => assert_eq!(selector, "#never"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn completed_resolutions_are_counted() {
        let (driver, transport, page) = driver_with_mock();
        transport.push_response(object_handle("node-1"));

        // The counter is process-wide, so assert growth rather than an
        // absolute value.
        let before = cdp_driver::metrics::global().snapshot().resolutions;
        let resolver = ElementResolver::new(driver);
        resolver
            .resolve(page, &ResolveRequest::css("#email"))
            .await
            .unwrap();
        let after = cdp_driver::metrics::global().snapshot().resolutions;
        assert!(after > before);
    }

    #[tokio::test]
    async fn driver_failures_propagate_unmodified() {
        let (driver, transport, page) = driver_with_mock();
        transport.push_response(serde_json::json!("__fail__"));

        let resolver = ElementResolver::new(driver);
        let err = resolver
            .resolve(page, &ResolveRequest::css("#x"))
            .await
            .unwrap_err();

        match err {
            ResolveError::Driver(inner) => {
                assert!(matches!(inner.kind, DriverErrorKind::CdpIo));
            }
            other => panic!("expected Driver, got {other:?}"),
        }
    }
}
