//! One-shot device probing — spec.md §4.7/§6, scenario E6.

use std::sync::Mutex as StdMutex;

use tokio::sync::oneshot;

use crate::config::SessionConfig;
use crate::driver::{Handler, Session};
use crate::error::{Fault, ProbeResult};
use crate::transport::Transport;
use crate::types::Response;

enum Outcome {
    Responded,
    Idle,
    Faulted(Fault),
}

/// Starts a session, waits for the first of a response, an idle
/// notification, or a fault, then stops the session and maps the outcome to
/// a `ProbeResult` (spec.md §6).
struct ProbeHandler {
    tx: StdMutex<Option<oneshot::Sender<Outcome>>>,
}

impl ProbeHandler {
    fn new() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: StdMutex::new(Some(tx)) }, rx)
    }

    fn complete(&self, outcome: Outcome) {
        if let Some(tx) = self.tx.lock().unwrap().take() {
            let _ = tx.send(outcome);
        }
    }
}

impl Handler for ProbeHandler {
    fn on_response(&self, _response: Response) {
        self.complete(Outcome::Responded);
    }

    fn on_idle(&self) {
        self.complete(Outcome::Idle);
    }

    fn on_fault(&self, fault: Fault) {
        self.complete(Outcome::Faulted(fault));
    }
}

/// Probes a device reachable via `open`. Returns `ProbeResult::Ok` as soon as
/// any well-formed response arrives, `ProbeResult::Unresponsive` if the idle
/// timeout elapses first without one, or the mapped fault otherwise.
pub async fn probe<T>(
    open: impl FnOnce() -> std::io::Result<T> + Send + 'static,
    config: SessionConfig,
) -> ProbeResult
where
    T: Transport,
{
    let (handler, rx) = ProbeHandler::new();
    let session = Session::start(open, handler, config);
    let result = match rx.await {
        Ok(Outcome::Responded) => ProbeResult::Ok,
        Ok(Outcome::Idle) => ProbeResult::Unresponsive,
        Ok(Outcome::Faulted(fault)) => fault.into(),
        Err(_) => ProbeResult::Exception,
    };
    session.stop();
    result
}

#[cfg(feature = "serial")]
/// Convenience wrapper over [`probe`] that opens a real serial port at
/// `path` (spec.md §6 "probe(path)").
pub async fn probe_path(path: impl Into<String>) -> ProbeResult {
    let path = path.into();
    probe(move || crate::transport::serial::open(&path), SessionConfig::default()).await
}
