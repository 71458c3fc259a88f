//! High-level driver facade over the CDP transport.
//!
//! The driver owns the page registry, routes commands to the right session,
//! tracks per-page pointer position and runs the event loop that keeps the
//! registry in sync with browser-side target lifecycle events.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pagehand_core_types::{PageId, SessionId};

use crate::commands::{Cookie, CookieDeletion, CookieParam};
use crate::config::DriverConfig;
use crate::error::{DriverError, DriverErrorKind};
use crate::metrics;
use crate::registry::Registry;
use crate::transport::{CdpTransport, ChromiumTransport, CommandTarget, TransportEvent};

/// Opaque reference to a live DOM node, backed by a CDP remote object id.
/// Valid until the page navigates or the handle is released.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteHandle {
    pub page: PageId,
    pub object_id: String,
}

pub struct CdpDriver {
    cfg: DriverConfig,
    registry: Registry,
    transport: Arc<dyn CdpTransport>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// CDP target id -> page.
    targets: DashMap<String, PageId>,
    /// CDP session id -> page.
    sessions: DashMap<String, PageId>,
    /// Last dispatched pointer coordinates per page; (0, 0) until moved.
    pointer_positions: DashMap<PageId, (f64, f64)>,
    /// Pages whose JavaScript dialogs get accepted automatically.
    dialog_accept: DashMap<PageId, bool>,
}

impl CdpDriver {
    pub fn new(cfg: DriverConfig) -> Arc<Self> {
        let transport: Arc<dyn CdpTransport> = if cfg.use_real_chrome {
            Arc::new(ChromiumTransport::new(cfg.clone()))
        } else {
            Arc::new(crate::transport::NoopTransport)
        };
        Self::with_transport(cfg, transport)
    }

    pub fn with_transport(cfg: DriverConfig, transport: Arc<dyn CdpTransport>) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            registry: Registry::new(),
            transport,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            targets: DashMap::new(),
            sessions: DashMap::new(),
            pointer_positions: DashMap::new(),
            dialog_accept: DashMap::new(),
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.cfg
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Connect the transport and spawn the event loop.
    pub async fn start(self: &Arc<Self>) -> Result<(), DriverError> {
        self.transport.start().await?;

        let driver = self.clone();
        let handle = tokio::spawn(async move {
            driver.event_loop().await;
        });
        self.tasks.lock().await.push(handle);

        info!(target: "cdp-driver", "driver started");
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        info!(target: "cdp-driver", "driver stopped");
    }

    async fn event_loop(self: Arc<Self>) {
        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = self.transport.next_event() => event,
            };

            let Some(event) = event else {
                debug!(target: "cdp-driver", "event stream ended");
                break;
            };

            metrics::global().record_event();
            self.handle_event(event).await;
        }
    }

    /// Apply one transport event to driver state. The event loop calls this
    /// for every event; embedders feeding events from elsewhere can too.
    pub async fn handle_event(&self, event: TransportEvent) {
        match event.method.as_str() {
            "Target.attachedToTarget" => {
                let cdp_session = event.params["sessionId"].as_str().unwrap_or_default();
                let target_id = event.params["targetInfo"]["targetId"]
                    .as_str()
                    .unwrap_or_default();
                if cdp_session.is_empty() || target_id.is_empty() {
                    return;
                }
                if let Some(page) = self.targets.get(target_id).map(|kv| *kv.value()) {
                    self.sessions.insert(cdp_session.to_string(), page);
                    self.registry.set_cdp_session(&page, cdp_session.to_string());
                    debug!(target: "cdp-driver", %target_id, "session attached");
                }
            }
            "Target.detachedFromTarget" => {
                if let Some(cdp_session) = event.params["sessionId"].as_str() {
                    self.sessions.remove(cdp_session);
                }
            }
            "Target.targetDestroyed" => {
                if let Some(target_id) = event.params["targetId"].as_str() {
                    if let Some((_, page)) = self.targets.remove(target_id) {
                        self.registry.remove_page(&page);
                        self.pointer_positions.remove(&page);
                        self.dialog_accept.remove(&page);
                        debug!(target: "cdp-driver", %target_id, "target destroyed");
                    }
                }
            }
            "Target.targetInfoChanged" => {
                let target_id = event.params["targetInfo"]["targetId"]
                    .as_str()
                    .unwrap_or_default();
                let url = event.params["targetInfo"]["url"].as_str().unwrap_or_default();
                if let Some(page) = self.targets.get(target_id).map(|kv| *kv.value()) {
                    if !url.is_empty() {
                        self.registry.set_recent_url(&page, url.to_string());
                    }
                }
            }
            "Page.javascriptDialogOpening" => {
                self.handle_dialog_opening(&event).await;
            }
            _ => {}
        }
    }

    async fn handle_dialog_opening(&self, event: &TransportEvent) {
        let Some(cdp_session) = event.session_id.as_deref() else {
            return;
        };
        let Some(page) = self.sessions.get(cdp_session).map(|kv| *kv.value()) else {
            return;
        };
        if !self.dialog_accept.get(&page).map(|kv| *kv.value()).unwrap_or(false) {
            return;
        }

        let message = event.params["message"].as_str().unwrap_or_default();
        debug!(target: "cdp-driver", %message, "auto-accepting dialog");
        if let Err(err) = self
            .send_raw(
                CommandTarget::Session(cdp_session.to_string()),
                "Page.handleJavaScriptDialog",
                json!({ "accept": true }),
            )
            .await
        {
            warn!(target: "cdp-driver", ?err, "failed to accept dialog");
        }
    }

    // -- command plumbing ---------------------------------------------------

    async fn send_raw(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, DriverError> {
        let metrics = metrics::global();
        metrics.record_command(method);
        let started = Instant::now();
        let outcome = self.transport.send_command(target, method, params).await;
        metrics.record_command_outcome(method, started.elapsed(), outcome.is_ok());
        outcome
    }

    pub async fn send_browser_command(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Value, DriverError> {
        self.send_raw(CommandTarget::Browser, method, params).await
    }

    pub async fn send_page_command(
        &self,
        page: PageId,
        method: &str,
        params: Value,
    ) -> Result<Value, DriverError> {
        let cdp_session = self.registry.get_cdp_session(&page).ok_or_else(|| {
            DriverError::new(DriverErrorKind::Detached)
                .with_hint(format!("no live session for page {:?}", page.0))
        })?;
        self.send_raw(CommandTarget::Session(cdp_session), method, params)
            .await
    }

    // -- page lifecycle -----------------------------------------------------

    /// Create a new tab, attach to it and enable the domains the helpers
    /// rely on.
    pub async fn create_page(&self, url: &str) -> Result<PageId, DriverError> {
        let created = self
            .send_browser_command("Target.createTarget", json!({ "url": url }))
            .await?;
        let target_id = created["targetId"]
            .as_str()
            .ok_or_else(|| {
                DriverError::new(DriverErrorKind::Internal)
                    .with_hint("Target.createTarget returned no targetId")
            })?
            .to_string();

        let page = PageId::new();
        self.targets.insert(target_id.clone(), page);
        self.registry
            .insert_page(page, SessionId::new(), Some(target_id.clone()), None);

        let attached = self
            .send_browser_command(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let cdp_session = attached["sessionId"]
            .as_str()
            .ok_or_else(|| {
                DriverError::new(DriverErrorKind::Internal)
                    .with_hint("Target.attachToTarget returned no sessionId")
            })?
            .to_string();
        self.sessions.insert(cdp_session.clone(), page);
        self.registry.set_cdp_session(&page, cdp_session);

        self.send_page_command(page, "Page.enable", json!({})).await?;
        self.send_page_command(page, "Runtime.enable", json!({})).await?;
        self.registry.set_recent_url(&page, url.to_string());

        Ok(page)
    }

    /// Navigate and wait until the document is usable.
    pub async fn navigate(&self, page: PageId, url: &str) -> Result<(), DriverError> {
        let result = self
            .send_page_command(page, "Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(error_text) = result["errorText"].as_str() {
            if !error_text.is_empty() {
                return Err(DriverError::new(DriverErrorKind::CdpIo)
                    .with_hint(format!("navigation failed: {error_text}")));
            }
        }
        self.registry.set_recent_url(&page, url.to_string());
        self.wait_for_page_ready(page).await
    }

    async fn wait_for_page_ready(&self, page: PageId) -> Result<(), DriverError> {
        let deadline = Duration::from_millis(self.cfg.default_deadline_ms);
        let poll = Duration::from_millis(self.cfg.poll_interval_ms.max(10));
        let started = Instant::now();

        loop {
            let state = self.evaluate(page, "document.readyState").await?;
            if matches!(state.as_str(), Some("complete") | Some("interactive")) {
                return Ok(());
            }
            if started.elapsed() >= deadline {
                metrics::global().record_wait_timeout();
                return Err(DriverError::new(DriverErrorKind::WaitTimeout)
                    .with_hint("page did not become ready before the deadline"));
            }
            tokio::time::sleep(poll).await;
        }
    }

    // -- script evaluation --------------------------------------------------

    /// Evaluate an expression and return the JSON value it produced.
    pub async fn evaluate(&self, page: PageId, expression: &str) -> Result<Value, DriverError> {
        let result = self
            .send_page_command(
                page,
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        Self::check_exception(&result)?;
        Ok(result["result"]["value"].clone())
    }

    /// Evaluate an expression and keep the result alive in the page as a
    /// remote object.
    pub async fn evaluate_handle(
        &self,
        page: PageId,
        expression: &str,
    ) -> Result<Option<RemoteHandle>, DriverError> {
        let result = self
            .send_page_command(
                page,
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": false,
                    "awaitPromise": true,
                }),
            )
            .await?;
        Self::check_exception(&result)?;

        if result["result"]["subtype"].as_str() == Some("null") {
            return Ok(None);
        }
        Ok(result["result"]["objectId"]
            .as_str()
            .map(|object_id| RemoteHandle {
                page,
                object_id: object_id.to_string(),
            }))
    }

    /// Call a function with a remote object as `this`, returning its JSON
    /// result.
    pub async fn call_function(
        &self,
        handle: &RemoteHandle,
        declaration: &str,
        args: Vec<Value>,
    ) -> Result<Value, DriverError> {
        let result = self
            .send_page_command(
                handle.page,
                "Runtime.callFunctionOn",
                json!({
                    "objectId": handle.object_id,
                    "functionDeclaration": declaration,
                    "arguments": args.into_iter().map(|v| json!({ "value": v })).collect::<Vec<_>>(),
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        Self::check_exception(&result)?;
        Ok(result["result"]["value"].clone())
    }

    /// Call a function with a remote object as `this` and keep the result as
    /// a new remote object.
    pub async fn call_function_handle(
        &self,
        handle: &RemoteHandle,
        declaration: &str,
        args: Vec<Value>,
    ) -> Result<Option<RemoteHandle>, DriverError> {
        let result = self
            .send_page_command(
                handle.page,
                "Runtime.callFunctionOn",
                json!({
                    "objectId": handle.object_id,
                    "functionDeclaration": declaration,
                    "arguments": args.into_iter().map(|v| json!({ "value": v })).collect::<Vec<_>>(),
                    "returnByValue": false,
                    "awaitPromise": true,
                }),
            )
            .await?;
        Self::check_exception(&result)?;

        if result["result"]["subtype"].as_str() == Some("null") {
            return Ok(None);
        }
        Ok(result["result"]["objectId"]
            .as_str()
            .map(|object_id| RemoteHandle {
                page: handle.page,
                object_id: object_id.to_string(),
            }))
    }

    /// Release a remote object. Best effort: a handle invalidated by
    /// navigation is already gone and the failure is only logged.
    pub async fn release_handle(&self, handle: &RemoteHandle) {
        let result = self
            .send_page_command(
                handle.page,
                "Runtime.releaseObject",
                json!({ "objectId": handle.object_id }),
            )
            .await;
        if let Err(err) = result {
            debug!(target: "cdp-driver", ?err, "release of remote object failed");
        }
    }

    fn check_exception(result: &Value) -> Result<(), DriverError> {
        if let Some(details) = result.get("exceptionDetails") {
            if !details.is_null() {
                let text = details["exception"]["description"]
                    .as_str()
                    .or_else(|| details["text"].as_str())
                    .unwrap_or("evaluation failed");
                return Err(DriverError::new(DriverErrorKind::Evaluation)
                    .with_hint(text.to_string())
                    .with_data(details.clone()));
            }
        }
        Ok(())
    }

    // -- waiting ------------------------------------------------------------

    /// Poll an expression until it evaluates truthy or the deadline expires.
    pub async fn wait_for_predicate(
        &self,
        page: PageId,
        expression: &str,
        timeout_ms: u64,
    ) -> Result<(), DriverError> {
        let deadline = Duration::from_millis(timeout_ms);
        let poll = Duration::from_millis(self.cfg.poll_interval_ms.max(10));
        let started = Instant::now();

        loop {
            let value = self.evaluate(page, expression).await?;
            if is_truthy(&value) {
                return Ok(());
            }
            if started.elapsed() >= deadline {
                metrics::global().record_wait_timeout();
                return Err(DriverError::new(DriverErrorKind::WaitTimeout)
                    .with_hint(format!("predicate stayed falsy for {timeout_ms}ms")));
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Poll until a structural selector matches at least one node inside the
    /// given scope.
    pub async fn wait_for_selector(
        &self,
        page: PageId,
        scope: &crate::commands::QueryScope,
        selector: &str,
        timeout_ms: u64,
    ) -> Result<(), DriverError> {
        let selector_literal = serde_json::to_string(selector)
            .map_err(|err| DriverError::new(DriverErrorKind::Internal).with_hint(err.to_string()))?;
        let expression = format!(
            "(() => {{ const scope = {}; return !!(scope && scope.querySelector({})); }})()",
            scope.expression(),
            selector_literal
        );
        self.wait_for_predicate(page, &expression, timeout_ms).await
    }

    // -- pointer ------------------------------------------------------------

    pub fn pointer_position(&self, page: PageId) -> (f64, f64) {
        self.pointer_positions
            .get(&page)
            .map(|kv| *kv.value())
            .unwrap_or((0.0, 0.0))
    }

    /// Move the pointer to `(x, y)` in `steps` evenly spaced increments,
    /// dispatching one mouse-moved event per step. The final event lands
    /// exactly on the target.
    pub async fn move_pointer(
        &self,
        page: PageId,
        x: f64,
        y: f64,
        steps: u32,
    ) -> Result<(), DriverError> {
        let steps = steps.max(1);
        let (from_x, from_y) = self.pointer_position(page);

        for step in 1..=steps {
            let fraction = f64::from(step) / f64::from(steps);
            let px = from_x + (x - from_x) * fraction;
            let py = from_y + (y - from_y) * fraction;
            self.send_page_command(
                page,
                "Input.dispatchMouseEvent",
                json!({
                    "type": "mouseMoved",
                    "x": px,
                    "y": py,
                    "button": "none",
                }),
            )
            .await?;
        }

        self.pointer_positions.insert(page, (x, y));
        Ok(())
    }

    /// Press and release the left button at `(x, y)`.
    pub async fn click_at(&self, page: PageId, x: f64, y: f64) -> Result<(), DriverError> {
        self.click_at_with_count(page, x, y, 1).await
    }

    /// Click with an explicit click count; a count of 3 selects the whole
    /// text of an input, matching a human triple-click.
    pub async fn click_at_with_count(
        &self,
        page: PageId,
        x: f64,
        y: f64,
        click_count: u32,
    ) -> Result<(), DriverError> {
        for kind in ["mousePressed", "mouseReleased"] {
            self.send_page_command(
                page,
                "Input.dispatchMouseEvent",
                json!({
                    "type": kind,
                    "x": x,
                    "y": y,
                    "button": "left",
                    "clickCount": click_count,
                }),
            )
            .await?;
        }
        self.pointer_positions.insert(page, (x, y));
        Ok(())
    }

    // -- keyboard -----------------------------------------------------------

    /// Dispatch a full key press: key-down then key-up. `text` carries the
    /// produced character for printable keys.
    pub async fn press_key(
        &self,
        page: PageId,
        key: &str,
        text: Option<&str>,
    ) -> Result<(), DriverError> {
        let mut down = json!({
            "type": if text.is_some() { "keyDown" } else { "rawKeyDown" },
            "key": key,
        });
        if let Some(text) = text {
            down["text"] = json!(text);
        }
        self.send_page_command(page, "Input.dispatchKeyEvent", down)
            .await?;
        self.send_page_command(
            page,
            "Input.dispatchKeyEvent",
            json!({ "type": "keyUp", "key": key }),
        )
        .await?;
        Ok(())
    }

    /// Type text one character at a time, pausing `delay_ms` between
    /// characters.
    pub async fn type_chars(
        &self,
        page: PageId,
        text: &str,
        delay_ms: u64,
    ) -> Result<(), DriverError> {
        let mut first = true;
        for ch in text.chars() {
            if !first && delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            first = false;
            let ch = ch.to_string();
            self.press_key(page, &ch, Some(&ch)).await?;
        }
        Ok(())
    }

    /// Insert text directly without synthesizing key events.
    pub async fn insert_text(&self, page: PageId, text: &str) -> Result<(), DriverError> {
        self.send_page_command(page, "Input.insertText", json!({ "text": text }))
            .await?;
        Ok(())
    }

    // -- cookies ------------------------------------------------------------

    pub async fn get_cookies(
        &self,
        page: PageId,
        urls: Option<Vec<String>>,
    ) -> Result<Vec<Cookie>, DriverError> {
        let params = match urls {
            Some(urls) => json!({ "urls": urls }),
            None => json!({}),
        };
        let result = self
            .send_page_command(page, "Network.getCookies", params)
            .await?;
        serde_json::from_value(result["cookies"].clone()).map_err(|err| {
            DriverError::new(DriverErrorKind::Internal)
                .with_hint(format!("malformed cookie payload: {err}"))
        })
    }

    pub async fn set_cookies(
        &self,
        page: PageId,
        cookies: Vec<CookieParam>,
    ) -> Result<(), DriverError> {
        let cookies = serde_json::to_value(cookies).map_err(|err| {
            DriverError::new(DriverErrorKind::Internal).with_hint(err.to_string())
        })?;
        self.send_page_command(page, "Network.setCookies", json!({ "cookies": cookies }))
            .await?;
        Ok(())
    }

    pub async fn delete_cookies(
        &self,
        page: PageId,
        deletions: Vec<CookieDeletion>,
    ) -> Result<(), DriverError> {
        for deletion in deletions {
            let params = serde_json::to_value(&deletion).map_err(|err| {
                DriverError::new(DriverErrorKind::Internal).with_hint(err.to_string())
            })?;
            self.send_page_command(page, "Network.deleteCookies", params)
                .await?;
        }
        Ok(())
    }

    // -- page scripts and dialogs -------------------------------------------

    /// Register a script that runs in every new document on this page.
    /// Returns the identifier needed to unregister it.
    pub async fn add_init_script(
        &self,
        page: PageId,
        source: &str,
    ) -> Result<String, DriverError> {
        let result = self
            .send_page_command(
                page,
                "Page.addScriptToEvaluateOnNewDocument",
                json!({ "source": source }),
            )
            .await?;
        result["identifier"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                DriverError::new(DriverErrorKind::Internal)
                    .with_hint("addScriptToEvaluateOnNewDocument returned no identifier")
            })
    }

    pub async fn remove_init_script(
        &self,
        page: PageId,
        identifier: &str,
    ) -> Result<(), DriverError> {
        self.send_page_command(
            page,
            "Page.removeScriptToEvaluateOnNewDocument",
            json!({ "identifier": identifier }),
        )
        .await?;
        Ok(())
    }

    /// Toggle automatic acceptance of JavaScript dialogs on a page.
    pub fn set_dialog_auto_accept(&self, page: PageId, enabled: bool) {
        if enabled {
            self.dialog_accept.insert(page, true);
        } else {
            self.dialog_accept.remove(&page);
        }
    }

    /// Register an externally attached page under an existing CDP session.
    pub fn bind_session(&self, page: PageId, cdp_session: &str) {
        self.sessions.insert(cdp_session.to_string(), page);
        self.registry
            .insert_page(page, SessionId::new(), None, Some(cdp_session.to_string()));
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::error::{DriverError, DriverErrorKind};
    use crate::transport::{CdpTransport, CommandTarget, TransportEvent};

    /// Transport double that records every command and replays canned
    /// responses in order. An empty queue answers `{}`.
    #[derive(Default)]
    pub struct MockTransport {
        pub commands: Mutex<Vec<(String, Value)>>,
        pub responses: Mutex<VecDeque<Value>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

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
}
