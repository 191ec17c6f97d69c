//! Frame encoding/decoding — spec.md §4.1.
//!
//! Outbound: `[len=n+2][0xFF][command][payload...][checksum]`.
//! Inbound:  `[len L][payload L+1 bytes]`, checksum folded into the payload's
//! last byte such that `(L + sum(payload)) mod 256 == 0`.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Builds a complete outbound frame for command byte `command` with payload
/// `data`. The returned bytes are ready to write to the transport as-is.
pub(crate) fn encode_frame(command: u8, data: &[u8]) -> Vec<u8> {
    let mut msg = vec![0u8; data.len() + 4];
    msg[0] = (data.len() + 2) as u8;
    msg[1] = 0xFF;
    msg[2] = command;
    msg[3..3 + data.len()].copy_from_slice(data);
    let sum: u32 = msg[..msg.len() - 1].iter().map(|&b| b as u32).sum();
    msg[msg.len() - 1] = ((256 - (sum % 256)) % 256) as u8;
    msg
}

/// One inbound frame as read off the wire: the length byte and the `L+1`
/// bytes that followed it (payload + checksum).
pub(crate) struct RawFrame {
    pub length: u8,
    pub msg: Vec<u8>,
}

/// `true` if the frame's checksum is valid: `(L + sum(msg)) mod 256 == 0`.
pub(crate) fn checksum_valid(frame: &RawFrame) -> bool {
    let sum: u32 = frame.length as u32 + frame.msg.iter().map(|&b| b as u32).sum::<u32>();
    sum % 256 == 0
}

/// Reads exactly one raw frame from `reader`: a length byte, then `L+1`
/// further bytes. Does not validate the checksum — call `checksum_valid`.
///
/// Returns `Err` on transport failure or end of stream, which the caller
/// (the driver loop) treats as an I/O fault.
pub(crate) async fn read_raw_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> std::io::Result<RawFrame> {
    let mut len_byte = [0u8; 1];
    reader.read_exact(&mut len_byte).await?;
    let length = len_byte[0];
    let mut msg = vec![0u8; length as usize + 1];
    reader.read_exact(&mut msg).await?;
    Ok(RawFrame { length, msg })
}

/// Frame type discrimination on a validated `msg` (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    /// `msg[0] == 0xFF`, subtype is the ASCII letter at `msg[1]`.
    Command(u8),
    /// `msg[0] == 0x20`, length >= 15.
    Info,
    /// `msg[0] == 0x41`, length >= 13.
    Config,
    /// Anything else — ignored.
    Unknown,
}

pub(crate) fn classify(msg: &[u8]) -> FrameKind {
    if msg.len() >= 2 && msg[0] == 0xFF {
        FrameKind::Command(msg[1])
    } else if msg.len() >= 15 && msg[0] == 0x20 {
        FrameKind::Info
    } else if msg.len() >= 13 && msg[0] == 0x41 {
        FrameKind::Config
    } else {
        FrameKind::Unknown
    }
}
