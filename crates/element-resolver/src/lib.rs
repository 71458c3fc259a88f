//! Element resolution and pointer positioning.
//!
//! Every helper action funnels through one pipeline: resolve a selector
//! (css or xpath, single or multiple, optionally waiting for appearance)
//! into live element handles, position the pointer over each, then act.

pub mod error;
pub mod overlay;
pub mod pointer;
pub mod request;
pub mod resolver;
pub mod scripts;

pub use error::ResolveError;
pub use overlay::PointerOverlay;
pub use pointer::{DEFAULT_HIGHLIGHT_COLOR, DEFAULT_POINTER_STEPS};
pub use request::{ResolveRequest, DEFAULT_TIMEOUT_MS};
pub use resolver::ElementResolver;

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use cdp_driver::{
        CdpDriver, CdpTransport, CommandTarget, DriverConfig, DriverError, DriverErrorKind,
        TransportEvent,
    };
    use pagehand_core_types::PageId;

    /// Transport double recording every command and replaying canned
    /// responses in order. An empty queue answers `{}`; the `"__fail__"`
    /// sentinel produces a driver i/o error.
    #[derive(Default)]
    pub struct MockTransport {
        commands: Mutex<Vec<(String, Value)>>,
        responses: Mutex<VecDeque<Value>>,
    }

    impl MockTransport {
        pub fn push_response(&self, value: Value) {
            self.responses.lock().unwrap().push_back(value);
        }

        pub fn recorded(&self) -> Vec<(String, Value)> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CdpTransport for MockTransport {
        async fn start(&self) -> Result<(), DriverError> {
            Ok(())
        }

        async fn next_event(&self) -> Option<TransportEvent> {
            futures::future::pending::<()>().await;
            None
        }

        async fn send_command(
            &self,
            _target: CommandTarget,
            method: &str,
            params: Value,
        ) -> Result<Value, DriverError> {
            self.commands
                .lock()
                .unwrap()
                .push((method.to_string(), params));
            let canned = self.responses.lock().unwrap().pop_front();
            match canned {
                Some(Value::String(tag)) if tag == "__fail__" => Err(DriverError::new(
                    DriverErrorKind::CdpIo,
                )
                .with_hint("mock transport failure")),
                Some(value) => Ok(value),
                None => Ok(json!({})),
            }
        }
    }

    pub fn driver_with_mock() -> (Arc<CdpDriver>, Arc<MockTransport>, PageId) {
        let transport = Arc::new(MockTransport::default());
        let cfg = DriverConfig {
            poll_interval_ms: 1,
            ..DriverConfig::default()
        };
        let driver = CdpDriver::with_transport(cfg, transport.clone());
        let page = PageId::new();
        driver.bind_session(page, "sess-1");
        (driver, transport, page)
    }

    /// `Runtime.evaluate` response carrying a by-value result.
    pub fn evaluate_value(value: Value) -> Value {
        json!({ "result": { "value": value } })
    }

    /// `Runtime.callFunctionOn` response carrying a by-value result.
    pub fn call_value(value: Value) -> Value {
        json!({ "result": { "value": value } })
    }

    /// Response carrying a remote object id.
    pub fn object_handle(object_id: &str) -> Value {
        json!({ "result": { "type": "object", "objectId": object_id } })
    }
}
