//! Variable Registry — bootstrap variable-scale metadata, spec.md §4.2.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Variable ids fetched during bootstrap, in issuance order. Id 6 is
/// intentionally skipped (spec.md §9 Open Questions: undocumented).
const REQUIRED_IDS: [u8; 8] = [0, 1, 2, 3, 4, 5, 7, 8];

/// Per-variable (signed, scale, offset) metadata used to rescale raw
/// telemetry integers to physical units — spec.md §4.2 "Variable parse function".
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct VariableInfo {
    pub signed: bool,
    pub scale: f64,
    pub offset: i32,
}

impl VariableInfo {
    /// Parses a little-endian 1/2/3-byte telemetry field using this
    /// variable's scale/offset, applying two's-complement if signed.
    pub fn parse(&self, raw: &[u8]) -> f64 {
        let width = raw.len();
        debug_assert!((1..=3).contains(&width), "unsupported field width {width}");

        let mut value: i64 = 0;
        for (i, &byte) in raw.iter().enumerate() {
            value |= (byte as i64) << (8 * i);
        }
        if self.signed {
            let sign_bit = 1i64 << (width * 8 - 1);
            if value >= sign_bit {
                value -= 1i64 << (width * 8);
            }
        }
        self.scale * (value as f64 + self.offset as f64)
    }
}

/// Parses a variable-info reply payload (spec.md §4.2). Returns `None` if
/// the reply does not match the expected shape (`msg[2]==0x8E && msg[5]==0x8F`).
fn parse_variable_info_reply(msg: &[u8]) -> Option<VariableInfo> {
    if msg.len() < 8 || msg[2] != 0x8E || msg[5] != 0x8F {
        return None;
    }
    let mut scale_raw = (msg[3] as u32) | ((msg[4] as u32) << 8);
    let mut signed = false;
    if scale_raw >= 0x8000 {
        scale_raw = 0x10000 - scale_raw;
        signed = true;
    }
    let scale = if scale_raw >= 0x4000 {
        1.0 / (0x8000 - scale_raw) as f64
    } else {
        scale_raw as f64
    };
    let offset = (msg[6] as i32) | ((msg[7] as i32) << 8);
    Some(VariableInfo { signed, scale, offset })
}

/// Tracks the bootstrap sequence that populates per-variable scale metadata.
/// Info frames (AC/DC telemetry) cannot be decoded until `is_complete()`.
pub(crate) struct VariableRegistry {
    pending: VecDeque<u8>,
    info: HashMap<u8, VariableInfo>,
    last_request_at: Option<Instant>,
    request_timeout: Duration,
}

impl VariableRegistry {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            pending: REQUIRED_IDS.iter().copied().collect(),
            info: HashMap::new(),
            last_request_at: None,
            request_timeout,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn get(&self, id: u8) -> Option<&VariableInfo> {
        self.info.get(&id)
    }

    /// Returns the variable id to (re-)request now, or `None` if a request
    /// for the current id was already sent within the last
    /// `request_timeout`. The caller is responsible for actually sending the
    /// 'A' address frame and the W-family request.
    pub fn next_request(&mut self, now: Instant) -> Option<u8> {
        let id = *self.pending.front()?;
        if let Some(sent_at) = self.last_request_at {
            if now.duration_since(sent_at) < self.request_timeout {
                return None;
            }
        }
        self.last_request_at = Some(now);
        Some(id)
    }

    /// The payload for the W-family variable-info request for `id`
    /// (spec.md §4.2: `[0x36, id & 0xFF, id >> 8]`).
    pub fn request_payload(id: u8) -> [u8; 3] {
        [0x36, id & 0xFF, (id >> 8) & 0xFF]
    }

    /// Handles a reply routed through the nonce tracker for the currently
    /// outstanding bootstrap request. Clears the pending-request deadline
    /// regardless of whether the reply was well-formed, so a malformed reply
    /// triggers an immediate retry rather than waiting out the timeout.
    pub fn handle_reply(&mut self, msg: &[u8]) {
        self.last_request_at = None;
        let Some(mut parsed) = parse_variable_info_reply(msg) else {
            return;
        };
        if let Some(id) = self.pending.pop_front() {
            // Known-hardware correction: the Multiplus II emits negative AC
            // inverter current values for variable id 3 despite reporting it
            // as unsigned (spec.md §4.2).
            if id == 3 {
                parsed.signed = true;
            }
            self.info.insert(id, parsed);
        }
    }
}
