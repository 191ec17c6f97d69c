//! Driver Loop + Public Facade — spec.md §4.7, §4.5, §4.6, §6.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncWriteExt, WriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::codec::{checksum_valid, classify, encode_frame, read_raw_frame, FrameKind};
use crate::config::SessionConfig;
use crate::decode::decode;
use crate::error::{DriverError, Fault};
use crate::nonce::NonceTracker;
use crate::transport::Transport;
use crate::types::{
    ACResponse, ConfigResponse, DCResponse, InterfaceFlags, InterfaceResponse, LEDResponse,
    Response, ResponseKind, StateResponse, SwitchState, VersionResponse,
};
use crate::variable::VariableRegistry;
use crate::waiter::WaiterTable;

/// Application callbacks invoked from the driver loop — spec.md §6.
///
/// All three must return promptly: they run inline on the single task that
/// also owns the transport reader, so a blocking callback stalls the session.
pub trait Handler: Send + Sync + 'static {
    /// A frame was decoded into a typed response. Delivered whether or not a
    /// waiting request method also claimed it.
    fn on_response(&self, response: Response);
    /// No frame arrived before the idle timeout elapsed. Not a fault; the
    /// session keeps running.
    fn on_idle(&self) {}
    /// The session has terminated. No further responses will be delivered.
    fn on_fault(&self, fault: Fault) {}
}

/// Owns the transport, the variable registry, the nonce slot, and the waiter
/// table for one MK2/MK3 conversation — spec.md §3 "Session".
pub struct Session<T: Transport> {
    writer: Arc<Mutex<Option<WriteHalf<T>>>>,
    waiters: Arc<Mutex<WaiterTable>>,
    config: SessionConfig,
    task: JoinHandle<()>,
    stopped: Arc<AtomicBool>,
}

impl<T: Transport> Session<T> {
    /// Starts a session. `open` is called once, synchronously, on the
    /// driver's own task: on failure the handler sees `Fault::Inaccessible`
    /// and the session never reaches `Running` (spec.md §4.7 "Opening").
    ///
    /// Returns immediately; the driver loop and startup handshake run in the
    /// background.
    pub fn start<H>(
        open: impl FnOnce() -> std::io::Result<T> + Send + 'static,
        handler: H,
        config: SessionConfig,
    ) -> Session<T>
    where
        H: Handler,
    {
        let writer = Arc::new(Mutex::new(None));
        let waiters = Arc::new(Mutex::new(WaiterTable::new()));
        let stopped = Arc::new(AtomicBool::new(false));
        let handler = Arc::new(handler);

        let task = tokio::spawn(drive(
            open,
            handler,
            Arc::clone(&writer),
            Arc::clone(&waiters),
            config,
            Arc::clone(&stopped),
        ));

        Session { writer, waiters, config, task, stopped }
    }

    /// Terminates the session cleanly (spec.md §4.7 "Terminated"). Requests
    /// issued after this returns are no-ops that resolve to `None`.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.task.abort();
    }

    async fn request(
        &self,
        command: u8,
        payload: &[u8],
        kind: ResponseKind,
        predicate: Option<Box<dyn Fn(&Response) -> bool + Send + Sync>>,
        request_timeout: Duration,
    ) -> Option<Response> {
        if self.stopped.load(Ordering::Acquire) {
            return None;
        }
        let (id, rx) = self.waiters.lock().await.register(kind, predicate);
        send_frame(&self.writer, command, payload).await;
        match timeout(request_timeout, rx).await {
            Ok(Ok(response)) => Some(response),
            _ => {
                self.waiters.lock().await.remove(id);
                None
            }
        }
    }

    /// Requests the firmware version (spec.md §4.5 'V').
    pub async fn version(&self) -> Option<VersionResponse> {
        match self.request(b'V', &[], ResponseKind::Version, None, self.config.request_timeout).await {
            Some(Response::Version(v)) => Some(v),
            _ => None,
        }
    }

    /// Requests LED state (spec.md §4.5 'L').
    pub async fn led(&self) -> Option<LEDResponse> {
        match self.request(b'L', &[], ResponseKind::Led, None, self.config.request_timeout).await {
            Some(Response::Led(v)) => Some(v),
            _ => None,
        }
    }

    /// Requests DC telemetry (spec.md §4.5 'F' subcode 0).
    pub async fn dc(&self) -> Option<DCResponse> {
        match self.request(b'F', &[0], ResponseKind::Dc, None, self.config.request_timeout).await {
            Some(Response::Dc(v)) => Some(v),
            _ => None,
        }
    }

    /// Requests AC telemetry for `phase` (1..=4). The waiter disambiguates
    /// by phase since AC frames stream continuously for every phase
    /// (spec.md §4.6).
    pub async fn ac(&self, phase: u8) -> Option<ACResponse> {
        let predicate: Box<dyn Fn(&Response) -> bool + Send + Sync> =
            Box::new(move |r: &Response| matches!(r, Response::Ac(a) if a.ac_phase == phase));
        match self
            .request(b'F', &[phase], ResponseKind::Ac, Some(predicate), self.config.request_timeout)
            .await
        {
            Some(Response::Ac(v)) => Some(v),
            _ => None,
        }
    }

    /// Requests device configuration (spec.md §4.5 'F' subcode 5).
    pub async fn config(&self) -> Option<ConfigResponse> {
        match self
            .request(b'F', &[5], ResponseKind::Config, None, self.config.config_request_timeout)
            .await
        {
            Some(Response::Config(v)) => Some(v),
            _ => None,
        }
    }

    /// Requests interface GPIO flags (spec.md §4.5 'H' with no payload).
    pub async fn interface(&self) -> Option<InterfaceResponse> {
        match self
            .request(b'H', &[], ResponseKind::Interface, None, self.config.request_timeout)
            .await
        {
            Some(Response::Interface(v)) => Some(v),
            _ => None,
        }
    }

    /// Sets interface GPIO flags (spec.md §4.5 'H' with payload). Fire and
    /// forget: the device's ack ('H' reply) is delivered to the handler like
    /// any other response, not awaited here.
    pub async fn set_interface(&self, flags: InterfaceFlags) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        send_frame(&self.writer, b'H', &[flags.bits()]).await;
    }

    /// Requests the switch state / current limit change and awaits the
    /// device's acknowledgement (spec.md §4.5 'S').
    pub async fn state(&self, state: SwitchState, current_limit: Option<f64>) -> Option<StateResponse> {
        let payload = encode_state_payload(state, current_limit);
        match self
            .request(b'S', &payload, ResponseKind::State, None, self.config.request_timeout)
            .await
        {
            Some(Response::State(v)) => Some(v),
            _ => None,
        }
    }

    /// Fire-and-forget variant of [`Session::state`] — for callers that only
    /// care about the handler's `on_response` callback (spec.md §4.6
    /// "simpler fire-and-forget model").
    pub async fn send_state(&self, state: SwitchState, current_limit: Option<f64>) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        let payload = encode_state_payload(state, current_limit);
        send_frame(&self.writer, b'S', &payload).await;
    }
}

/// Encodes the 'S' request payload (spec.md §4.5 "State encoding boundaries").
fn encode_state_payload(state: SwitchState, current_limit: Option<f64>) -> [u8; 5] {
    let value: u16 = match current_limit {
        None => 0x8000,
        Some(c) if c <= 0.0 => 0,
        Some(c) => (c * 10.0).floor().min(0x7FFF as f64) as u16,
    };
    [state as u8, (value & 0xFF) as u8, (value >> 8) as u8, 0x01, 0x80]
}

async fn send_frame<T: Transport>(
    writer: &Arc<Mutex<Option<WriteHalf<T>>>>,
    command: u8,
    payload: &[u8],
) {
    let frame = encode_frame(command, payload);
    let mut guard = writer.lock().await;
    if let Some(w) = guard.as_mut() {
        trace!(frame = ?frame, "frame out");
        // Write errors are swallowed: the read half is the sole authority on
        // session health (spec.md §7).
        if let Err(err) = w.write_all(&frame).await {
            warn!(error = %err, "write failed, awaiting read-side fault");
        }
    }
}

async fn pump_variable_request<T: Transport>(
    writer: &Arc<Mutex<Option<WriteHalf<T>>>>,
    registry: &mut VariableRegistry,
    nonce: &mut NonceTracker,
) {
    if registry.is_complete() {
        return;
    }
    let Some(id) = registry.next_request(Instant::now()) else {
        return;
    };
    send_frame(writer, b'A', &[0x01, 0x00]).await;
    let letter = nonce.begin_request();
    send_frame(writer, letter, &VariableRegistry::request_payload(id)).await;
    debug!(id, "variable-info request sent");
}

async fn handle_msg<H: Handler>(
    msg: &[u8],
    registry: &mut VariableRegistry,
    nonce: &mut NonceTracker,
    waiters: &Arc<Mutex<WaiterTable>>,
    handler: &Arc<H>,
) {
    if let FrameKind::Command(letter) = classify(msg) {
        if matches!(letter, b'W' | b'X' | b'Y' | b'Z') {
            if nonce.accept(letter) {
                registry.handle_reply(msg);
            }
            return;
        }
    }
    if let Some(response) = decode(msg, registry) {
        waiters.lock().await.try_fulfill(&response);
        handler.on_response(response);
    }
}

async fn drive<T, H>(
    open: impl FnOnce() -> std::io::Result<T> + Send + 'static,
    handler: Arc<H>,
    writer_slot: Arc<Mutex<Option<WriteHalf<T>>>>,
    waiters: Arc<Mutex<WaiterTable>>,
    config: SessionConfig,
    stopped: Arc<AtomicBool>,
) where
    T: Transport,
    H: Handler,
{
    let transport = match open() {
        Ok(t) => t,
        Err(err) => {
            let err = DriverError::Open(err);
            error!(error = %err, "failed to open transport");
            handler.on_fault(err.fault());
            return;
        }
    };
    info!("transport opened");
    let (mut reader, writer) = tokio::io::split(transport);
    *writer_slot.lock().await = Some(writer);

    let mut registry = VariableRegistry::new(config.variable_info_timeout);
    let mut nonce = NonceTracker::new();

    // Startup actions: send Version and pump the first variable-info
    // request before entering the read loop (spec.md §4.7). The legacy 'R'
    // reset frame is intentionally not sent.
    send_frame(&writer_slot, b'V', &[]).await;
    pump_variable_request(&writer_slot, &mut registry, &mut nonce).await;

    loop {
        if stopped.load(Ordering::Acquire) {
            break;
        }
        match timeout(config.idle_timeout, read_raw_frame(&mut reader)).await {
            Ok(Ok(raw)) => {
                if checksum_valid(&raw) {
                    handle_msg(&raw.msg, &mut registry, &mut nonce, &waiters, &handler).await;
                } else {
                    warn!("checksum mismatch, dropping frame");
                }
                pump_variable_request(&writer_slot, &mut registry, &mut nonce).await;
            }
            Ok(Err(err)) => {
                let err = DriverError::Io(err);
                error!(error = %err, "transport read failed");
                handler.on_fault(err.fault());
                break;
            }
            Err(_elapsed) => {
                debug!("idle timeout elapsed");
                handler.on_idle();
                pump_variable_request(&writer_slot, &mut registry, &mut nonce).await;
            }
        }
    }

    *writer_slot.lock().await = None;
    info!("driver loop terminated");
}
