//! CDP transports.
//!
//! The driver talks through the `CdpTransport` trait. `ChromiumTransport`
//! backs it with a websocket link to a launched or attached Chromium; the
//! link is opened on first use and reopened if the pump task dies.

use std::collections::HashMap;
use std::convert::TryInto;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::target::SessionId as CdpSessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, CdpJsonEventMessage, Message, Response};
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::error::{DriverError, DriverErrorKind};
use crate::util::extract_ws_url;

const LAUNCH_WAIT: Duration = Duration::from_secs(20);

/// Raw CDP event forwarded to the driver's event loop.
#[derive(Clone, Debug)]
pub struct TransportEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

/// Destination for a CDP command: the browser endpoint or a page session.
#[derive(Clone, Debug)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn start(&self) -> Result<(), DriverError>;
    async fn next_event(&self) -> Option<TransportEvent>;
    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, DriverError>;
}

/// Transport that refuses every command; used when no browser is available.
#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl CdpTransport for NoopTransport {
    async fn start(&self) -> Result<(), DriverError> {
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        None
    }

    async fn send_command(
        &self,
        _target: CommandTarget,
        method: &str,
        _params: Value,
    ) -> Result<Value, DriverError> {
        Err(DriverError::new(DriverErrorKind::Internal)
            .with_hint(format!("transport not available for method {method}")))
    }
}

pub struct ChromiumTransport {
    cfg: DriverConfig,
    link: Mutex<Option<Arc<Link>>>,
}

impl ChromiumTransport {
    pub fn new(cfg: DriverConfig) -> Self {
        Self {
            cfg,
            link: Mutex::new(None),
        }
    }

    async fn link(&self) -> Result<Arc<Link>, DriverError> {
        let mut guard = self.link.lock().await;
        if let Some(link) = guard.as_ref() {
            if link.is_open() {
                return Ok(link.clone());
            }
            warn!(target: "cdp-driver", "cdp link lost, reopening");
        }

        let link = Arc::new(Link::open(&self.cfg).await?);
        *guard = Some(link.clone());
        Ok(link)
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn start(&self) -> Result<(), DriverError> {
        self.send_command(
            CommandTarget::Browser,
            "Target.setDiscoverTargets",
            json!({ "discover": true }),
        )
        .await?;
        self.send_command(
            CommandTarget::Browser,
            "Target.setAutoAttach",
            json!({
                "autoAttach": true,
                "waitForDebuggerOnStart": false,
                "flatten": true,
            }),
        )
        .await?;
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        match self.link().await {
            Ok(link) => link.next_event().await,
            Err(err) => {
                warn!(target: "cdp-driver", ?err, "transport not ready");
                None
            }
        }
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, DriverError> {
        let link = self.link().await?;
        link.request(
            target,
            method,
            params,
            Duration::from_millis(self.cfg.default_deadline_ms),
        )
        .await
    }
}

struct Outbound {
    target: CommandTarget,
    method: String,
    params: Value,
    reply: oneshot::Sender<Result<Value, DriverError>>,
}

/// One live websocket connection plus the pump task that owns it.
struct Link {
    outbound: mpsc::Sender<Outbound>,
    events: Mutex<mpsc::Receiver<TransportEvent>>,
    open: Arc<AtomicBool>,
    pump: JoinHandle<()>,
    child: Mutex<Option<Child>>,
}

impl Link {
    async fn open(cfg: &DriverConfig) -> Result<Self, DriverError> {
        let (child, ws_url) = match cfg.websocket_url.clone() {
            Some(url) => (None, url),
            None => {
                let (child, url) = launch(cfg).await?;
                (Some(child), url)
            }
        };

        let conn = Connection::<CdpEventMessage>::connect(&ws_url)
            .await
            .map_err(|err| DriverError::new(DriverErrorKind::CdpIo).with_hint(err.to_string()))?;

        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let (events_tx, events_rx) = mpsc::channel(256);
        let open = Arc::new(AtomicBool::new(true));

        let heartbeat = Duration::from_millis(cfg.heartbeat_interval_ms.max(100));
        let pump = tokio::spawn(pump(conn, outbound_rx, events_tx, open.clone(), heartbeat));

        info!(target: "cdp-driver", url = %ws_url, "cdp link opened");

        Ok(Self {
            outbound: outbound_tx,
            events: Mutex::new(events_rx),
            open,
            pump,
            child: Mutex::new(child),
        })
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    async fn request(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, DriverError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.outbound
            .send(Outbound {
                target,
                method: method.to_string(),
                params,
                reply: reply_tx,
            })
            .await
            .map_err(|_| {
                DriverError::new(DriverErrorKind::CdpIo).with_hint("cdp link is closed")
            })?;

        match tokio::time::timeout(deadline, reply_rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(DriverError::new(DriverErrorKind::CdpIo)
                .with_hint("cdp link dropped the command")),
            Err(_) => Err(DriverError::new(DriverErrorKind::WaitTimeout).with_hint(format!(
                "{method} got no response within {}ms",
                deadline.as_millis()
            ))),
        }
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        self.events.lock().await.recv().await
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.open.store(false, Ordering::Relaxed);
        self.pump.abort();

        let child = self.child.try_lock().ok().and_then(|mut guard| guard.take());
        if let Some(mut child) = child {
            match tokio::runtime::Handle::try_current() {
                Ok(rt) => {
                    rt.spawn(async move {
                        if let Err(err) = child.kill().await {
                            warn!(target: "cdp-driver", ?err, "failed to kill chromium child");
                        }
                    });
                }
                Err(_) => {
                    debug!(target: "cdp-driver", "dropping chromium child without a runtime to reap it");
                }
            }
        }
    }
}

/// Single owner of the websocket: routes commands out, matches responses to
/// their callers by call id, forwards events, and pings the browser while
/// idle so a half-dead connection is noticed between commands.
async fn pump(
    mut conn: Connection<CdpEventMessage>,
    mut outbound: mpsc::Receiver<Outbound>,
    events: mpsc::Sender<TransportEvent>,
    open: Arc<AtomicBool>,
    heartbeat: Duration,
) {
    let mut pending: HashMap<CallId, oneshot::Sender<Result<Value, DriverError>>> = HashMap::new();
    let mut idle = interval_at(Instant::now() + heartbeat, heartbeat);
    idle.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            request = outbound.recv() => {
                let Some(request) = request else { break };
                idle.reset();
                submit(&mut conn, request, &mut pending);
            }
            message = conn.next() => match message {
                Some(Ok(Message::Response(response))) => {
                    // Heartbeat responses have no pending entry and fall
                    // through here.
                    if let Some(reply) = pending.remove(&response.id) {
                        let _ = reply.send(unpack_response(response));
                    }
                }
                Some(Ok(Message::Event(event))) => match decode_event(event) {
                    Ok(payload) => {
                        if events.send(payload).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(target: "cdp-driver", ?err, "dropping undecodable event"),
                },
                Some(Err(err)) => {
                    let failure = classify_cdp_error(err);
                    warn!(target: "cdp-driver", %failure, "cdp connection failed");
                    for (_, reply) in pending.drain() {
                        let _ = reply.send(Err(failure.clone()));
                    }
                    break;
                }
                None => {
                    let gone = DriverError::new(DriverErrorKind::CdpIo)
                        .with_hint("cdp connection closed");
                    for (_, reply) in pending.drain() {
                        let _ = reply.send(Err(gone.clone()));
                    }
                    break;
                }
            },
            _ = idle.tick() => {
                let _ = conn.submit_command(
                    "Browser.getVersion".to_string().into(),
                    None,
                    json!({}),
                );
            }
        }
    }

    open.store(false, Ordering::Relaxed);
    debug!(target: "cdp-driver", "cdp pump stopped");
}

fn submit(
    conn: &mut Connection<CdpEventMessage>,
    request: Outbound,
    pending: &mut HashMap<CallId, oneshot::Sender<Result<Value, DriverError>>>,
) {
    let session = match request.target {
        CommandTarget::Browser => None,
        CommandTarget::Session(id) => Some(CdpSessionId::from(id)),
    };

    match conn.submit_command(request.method.into(), session, request.params) {
        Ok(call_id) => {
            pending.insert(call_id, request.reply);
        }
        Err(err) => {
            let _ = request.reply.send(Err(DriverError::new(DriverErrorKind::CdpIo)
                .with_hint(err.to_string())));
        }
    }
}

fn unpack_response(response: Response) -> Result<Value, DriverError> {
    if let Some(error) = response.error {
        let retriable = error.code >= 500;
        return Err(DriverError::new(DriverErrorKind::CdpIo)
            .with_hint(format!("cdp error {}: {}", error.code, error.message))
            .retriable(retriable));
    }
    response.result.ok_or_else(|| {
        DriverError::new(DriverErrorKind::Internal).with_hint("cdp response carried no payload")
    })
}

fn decode_event(event: CdpEventMessage) -> Result<TransportEvent, DriverError> {
    let raw: CdpJsonEventMessage = event.try_into().map_err(|err| {
        DriverError::new(DriverErrorKind::Internal)
            .with_hint(format!("undecodable cdp event: {err}"))
    })?;
    Ok(TransportEvent {
        method: raw.method.into_owned(),
        params: raw.params,
        session_id: raw.session_id,
    })
}

fn classify_cdp_error(err: CdpError) -> DriverError {
    let hint = err.to_string();
    let kind = match &err {
        CdpError::Timeout => DriverErrorKind::WaitTimeout,
        CdpError::JavascriptException(_) => DriverErrorKind::Evaluation,
        CdpError::FrameNotFound(_) => DriverErrorKind::Detached,
        CdpError::Serde(_) => DriverErrorKind::Internal,
        _ => DriverErrorKind::CdpIo,
    };
    let retriable = matches!(
        kind,
        DriverErrorKind::WaitTimeout | DriverErrorKind::CdpIo
    );
    DriverError::new(kind).with_hint(hint).retriable(retriable)
}

async fn launch(cfg: &DriverConfig) -> Result<(Child, String), DriverError> {
    let config = browser_config(cfg)?;
    let mut child = config.launch().map_err(|err| {
        DriverError::new(DriverErrorKind::Internal)
            .with_hint(format!("chromium failed to start: {err}"))
    })?;
    let ws_url = extract_ws_url(&mut child, LAUNCH_WAIT).await?;
    Ok((child, ws_url))
}

fn browser_config(cfg: &DriverConfig) -> Result<BrowserConfig, DriverError> {
    let executable = (!cfg.executable.as_os_str().is_empty()).then(|| cfg.executable.clone());
    if let Some(path) = &executable {
        if !path.exists() {
            return Err(DriverError::new(DriverErrorKind::CdpIo)
                .with_hint(format!("chrome executable not found at {}", path.display()))
                .with_data(json!({
                    "expected": path,
                    "hint": "Set PAGEHAND_CHROME to the full path of chrome/chromium.",
                })));
        }
    }

    let profile = if cfg.user_data_dir.is_absolute() {
        cfg.user_data_dir.clone()
    } else {
        std::env::current_dir()
            .map_err(|err| {
                DriverError::new(DriverErrorKind::Internal)
                    .with_hint(format!("cannot resolve cwd for the profile dir: {err}"))
            })?
            .join(&cfg.user_data_dir)
    };
    fs::create_dir_all(&profile).map_err(|err| {
        DriverError::new(DriverErrorKind::Internal)
            .with_hint(format!("cannot create profile dir: {err}"))
    })?;

    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
        .launch_timeout(LAUNCH_WAIT)
        .user_data_dir(profile)
        .args(chrome_args(cfg.headless));
    if !cfg.headless {
        builder = builder.with_head();
    }
    if sandbox_disabled() {
        builder = builder.no_sandbox();
    }
    if let Some(path) = executable {
        builder = builder.chrome_executable(path);
    }

    builder.build().map_err(|err| {
        DriverError::new(DriverErrorKind::Internal)
            .with_hint(format!("unusable browser config: {err}"))
    })
}

fn chrome_args(headless: bool) -> Vec<&'static str> {
    let mut args = vec![
        "--no-first-run",
        "--no-default-browser-check",
        "--disable-background-networking",
        "--disable-dev-shm-usage",
        "--disable-extensions",
        "--disable-popup-blocking",
        "--disable-sync",
        "--password-store=basic",
        "--remote-allow-origins=*",
        "--use-mock-keychain",
    ];
    if headless {
        args.extend(["--headless=new", "--hide-scrollbars", "--mute-audio"]);
    }
    args
}

fn sandbox_disabled() -> bool {
    std::env::var("PAGEHAND_DISABLE_SANDBOX")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
