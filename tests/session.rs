//! Integration tests driving a full `Session` over an in-memory duplex
//! transport, covering the concrete scenarios named in spec.md §8.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use victron_mk3::{Fault, Handler, Response, Session, SessionConfig, SwitchState};

/// Builds a raw inbound frame from its `msg` body (everything but the
/// trailing checksum byte), the same way the production codec validates:
/// `(length + sum(msg)) mod 256 == 0`.
fn build_raw_frame(body: &[u8]) -> Vec<u8> {
    let length = body.len() as u8;
    let partial_sum: u32 = length as u32 + body.iter().map(|&b| b as u32).sum::<u32>();
    let checksum = ((256 - (partial_sum % 256)) % 256) as u8;
    let mut frame = vec![length];
    frame.extend_from_slice(body);
    frame.push(checksum);
    frame
}

/// Builds one command-frame reply (`msg[0] == 0xFF`) for the mock device
/// side of the duplex pair.
fn build_frame(command: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![0xFF, command];
    body.extend_from_slice(payload);
    build_raw_frame(&body)
}

/// Builds a 15-byte Info(AC) frame (`msg[0]==0x20`, `msg[5]==0x08` ⇒ phase 1)
/// with all telemetry fields zeroed — enough to exercise the bootstrap gate
/// and decoding path without asserting on specific physical values.
fn build_ac_info_frame() -> Vec<u8> {
    build_raw_frame(&[0x20, 0, 0, 0, 0x04, 0x08, 0, 0, 0, 0, 0, 0, 0, 0, 0])
}

/// Reads one frame off the mock device's end of the duplex: a length byte
/// then `L+1` further bytes (command marker + subtype + payload + checksum).
async fn read_frame(stream: &mut DuplexStream) -> (u8, Vec<u8>) {
    let mut len_byte = [0u8; 1];
    stream.read_exact(&mut len_byte).await.unwrap();
    let mut rest = vec![0u8; len_byte[0] as usize + 1];
    stream.read_exact(&mut rest).await.unwrap();
    assert_eq!(rest[0], 0xFF);
    (rest[1], rest[2..rest.len() - 1].to_vec())
}

/// Responds to every bootstrap ('A' + W/X/Y/Z) request with a well-formed,
/// neutral (unsigned, scale=1, offset=0) variable-info reply so the
/// registry completes quickly, echoing whichever W/X/Y/Z letter was used.
async fn answer_bootstrap_request(device: &mut DuplexStream, letter: u8) {
    // payload -> msg = [0xFF, letter, 0x8E, scale_lo, scale_hi, 0x8F, offset_lo, offset_hi]
    // so msg[2]==0x8E and msg[5]==0x8F, per the variable-info reply shape.
    let reply = build_frame(letter, &[0x8E, 1, 0, 0x8F, 0, 0]);
    device.write_all(&reply).await.unwrap();
}

/// Shares its recorded state via `Arc` so the test can keep observing it
/// after the original value has been moved into `Session::start`.
#[derive(Clone, Default)]
struct RecordingHandler {
    responses: Arc<std::sync::Mutex<Vec<Response>>>,
    idle_count: Arc<AtomicUsize>,
    fault: Arc<std::sync::Mutex<Option<Fault>>>,
}

impl Handler for RecordingHandler {
    fn on_response(&self, response: Response) {
        self.responses.lock().unwrap().push(response);
    }

    fn on_idle(&self) {
        self.idle_count.fetch_add(1, Ordering::SeqCst);
    }

    fn on_fault(&self, fault: Fault) {
        *self.fault.lock().unwrap() = Some(fault);
    }
}

fn fast_config() -> SessionConfig {
    SessionConfig {
        idle_timeout: Duration::from_millis(80),
        variable_info_timeout: Duration::from_millis(50),
        request_timeout: Duration::from_millis(200),
        config_request_timeout: Duration::from_millis(200),
    }
}

#[tokio::test]
async fn e1_version_request_round_trips_through_session() {
    let (client, mut device) = tokio::io::duplex(4096);
    let handler = RecordingHandler::default();
    let session = Session::start(move || Ok(client), handler, fast_config());

    // Drain the startup 'V' request and reply to it.
    let (letter, _payload) = read_frame(&mut device).await;
    assert_eq!(letter, b'V');
    device.write_all(&build_frame(b'V', &[0x01, 0x02, 0x03, 0x04])).await.unwrap();

    let version = session.version().await;
    // The startup request's reply already satisfied the implicit waiter
    // created by `version()` only if it arrives after registration; to avoid
    // the race, also answer the explicit request below.
    if version.is_none() {
        let (letter, _payload) = read_frame(&mut device).await;
        assert_eq!(letter, b'V');
        device.write_all(&build_frame(b'V', &[0x01, 0x02, 0x03, 0x04])).await.unwrap();
        let version = session.version().await.expect("version reply");
        assert_eq!(version.version, 0x0403_0201);
    } else {
        assert_eq!(version.unwrap().version, 0x0403_0201);
    }

    session.stop();
}

#[tokio::test]
async fn e4_state_request_encoding() {
    let (client, mut device) = tokio::io::duplex(4096);
    let handler = RecordingHandler::default();
    let session = Session::start(move || Ok(client), handler, fast_config());

    // Drain and ignore the startup 'V' request.
    let _ = read_frame(&mut device).await;

    let send = tokio::spawn(async move {
        session.send_state(SwitchState::On, Some(16.0)).await;
        session
    });

    let (letter, payload) = read_frame(&mut device).await;
    assert_eq!(letter, b'S');
    assert_eq!(payload, vec![0x03, 0xA0, 0x00, 0x01, 0x80]);

    let session = send.await.unwrap();
    session.stop();
}

#[tokio::test]
async fn e5_idle_notifications_fire_without_faulting() {
    let (client, device) = tokio::io::duplex(4096);
    let handler = RecordingHandler::default();
    let observed = handler.clone();
    let session = Session::start(move || Ok(client), handler, fast_config());

    // Device never speaks; let idle timeouts elapse a few times.
    tokio::time::sleep(Duration::from_millis(350)).await;
    drop(device);

    assert!(observed.idle_count.load(Ordering::SeqCst) >= 2);
    assert!(observed.fault.lock().unwrap().is_none());

    session.stop();
}

#[tokio::test]
async fn e6_probe_reports_unresponsive_for_a_mute_device() {
    let (client, _device) = tokio::io::duplex(4096);
    let result = victron_mk3::probe(move || Ok(client), fast_config()).await;
    assert_eq!(result, victron_mk3::ProbeResult::Unresponsive);
}

#[tokio::test]
async fn e6_probe_reports_ok_when_device_responds() {
    let (client, mut device) = tokio::io::duplex(4096);
    tokio::spawn(async move {
        let (letter, _payload) = read_frame(&mut device).await;
        assert_eq!(letter, b'V');
        device.write_all(&build_frame(b'V', &[1, 0, 0, 0])).await.unwrap();
        // Keep the connection alive so probe's stop() doesn't race a drop.
        tokio::time::sleep(Duration::from_millis(500)).await;
    });
    let result = victron_mk3::probe(move || Ok(client), fast_config()).await;
    assert_eq!(result, victron_mk3::ProbeResult::Ok);
}

#[tokio::test]
async fn bootstrap_gates_ac_telemetry_until_registry_complete() {
    let (client, mut device) = tokio::io::duplex(8192);
    let handler = RecordingHandler::default();
    let observed = handler.clone();
    let session = Session::start(move || Ok(client), handler, fast_config());

    // Drain the startup 'V' request, then the first 'A' + W-family
    // bootstrap request — leave it unanswered so the registry stays
    // incomplete.
    let _ = read_frame(&mut device).await;
    let _ = read_frame(&mut device).await;
    let (first_letter, _payload) = read_frame(&mut device).await;

    // An Info(AC) frame arriving before bootstrap completes must be dropped:
    // no response reaches the handler.
    device.write_all(&build_ac_info_frame()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(observed.responses.lock().unwrap().is_empty());

    // Answer the outstanding request and the remaining seven ids.
    answer_bootstrap_request(&mut device, first_letter).await;
    for _ in 0..7 {
        let _ = read_frame(&mut device).await; // 'A'
        let (letter, _payload) = read_frame(&mut device).await;
        answer_bootstrap_request(&mut device, letter).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Now an Info(AC) frame decodes and reaches the handler.
    device.write_all(&build_ac_info_frame()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(observed.responses.lock().unwrap().iter().any(|r| matches!(r, Response::Ac(_))));

    session.stop();
}
