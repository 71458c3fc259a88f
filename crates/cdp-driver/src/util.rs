//! Launch-time helpers.

use std::collections::VecDeque;
use std::time::Duration;

use chromiumoxide::async_process::Child;
use futures::io::BufReader;
use futures::{AsyncBufReadExt, StreamExt};
use tokio::time::timeout;

use crate::error::{DriverError, DriverErrorKind};

const STDERR_PREVIEW_LINES: usize = 8;

/// Pick the devtools websocket endpoint out of one stderr line, if present.
/// Page-level endpoints do not count; only the browser endpoint does.
fn devtools_url(line: &str) -> Option<&str> {
    let start = line.find("ws://")?;
    let url = line[start..].trim();
    url.contains("/devtools/browser/").then_some(url)
}

/// Watch a freshly spawned Chromium's stderr until it announces the devtools
/// websocket url. Keeps the last few lines around so a startup failure
/// reports what the browser actually said.
pub(crate) async fn extract_ws_url(
    child: &mut Child,
    wait: Duration,
) -> Result<String, DriverError> {
    let stderr = child.stderr.take().ok_or_else(|| {
        DriverError::new(DriverErrorKind::Internal)
            .with_hint("chromium was spawned without a stderr pipe")
    })?;
    let mut lines = BufReader::new(stderr).lines();
    let mut preview: VecDeque<String> = VecDeque::new();

    let scan = async {
        while let Some(line) = lines.next().await {
            let line = line.map_err(|err| {
                DriverError::new(DriverErrorKind::CdpIo)
                    .with_hint(format!("reading chromium stderr failed: {err}"))
            })?;
            if let Some(url) = devtools_url(&line) {
                return Ok(url.to_string());
            }
            if preview.len() == STDERR_PREVIEW_LINES {
                preview.pop_front();
            }
            preview.push_back(line);
        }
        let said = preview.iter().cloned().collect::<Vec<_>>().join(" | ");
        Err(DriverError::new(DriverErrorKind::CdpIo).with_hint(format!(
            "chromium exited before announcing a devtools endpoint; last stderr: {said}"
        )))
    };

    match timeout(wait, scan).await {
        Ok(outcome) => outcome,
        Err(_) => Err(DriverError::new(DriverErrorKind::WaitTimeout).with_hint(format!(
            "chromium did not announce a devtools endpoint within {}s",
            wait.as_secs()
        ))),
    }
}
