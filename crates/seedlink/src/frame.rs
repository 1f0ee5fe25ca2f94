//! SeedLink packet framing.
//!
//! A data packet is an 8-byte header (`SL` followed by a six digit hex
//! sequence number) and a 512-byte miniSEED record. `SLINFO` packets carry
//! XML responses to INFO requests and are never data.

use bytes::{Buf, Bytes, BytesMut};
use ingest_core::decode::RECORD_LEN;

pub const HEADER_LEN: usize = 8;
pub const PACKET_LEN: usize = HEADER_LEN + RECORD_LEN;

const SIGNATURE: &[u8] = b"SL";
const INFO_SIGNATURE: &[u8] = b"SLINFO";
const ERROR_RESPONSE: &[u8] = b"ERROR";

/// A framed packet from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Record { sequence: u32, record: Bytes },
    Info { record: Bytes },
    /// The server answered with `ERROR` instead of data.
    ServerError,
}

/// Malformed bytes in the packet stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid seedlink frame: {0}")]
pub struct FrameError(pub String);

/// Splits one frame off the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed.
pub fn next_frame(buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
    if buf.starts_with(ERROR_RESPONSE) {
        buf.clear();
        return Ok(Some(Frame::ServerError));
    }

    if buf.len() < HEADER_LEN {
        let n = buf.len().min(SIGNATURE.len());
        if buf[..n] != SIGNATURE[..n] && !ERROR_RESPONSE.starts_with(&buf[..]) {
            return Err(FrameError(format!(
                "unexpected bytes {:?}",
                String::from_utf8_lossy(&buf[..])
            )));
        }
        return Ok(None);
    }

    if !buf.starts_with(SIGNATURE) {
        return Err(FrameError(format!(
            "bad signature {:?}",
            String::from_utf8_lossy(&buf[..HEADER_LEN])
        )));
    }

    let info = buf.starts_with(INFO_SIGNATURE);
    let sequence = if info {
        None
    } else {
        Some(parse_sequence(&buf[2..HEADER_LEN])?)
    };

    if buf.len() < PACKET_LEN {
        return Ok(None);
    }

    let mut packet = buf.split_to(PACKET_LEN);
    packet.advance(HEADER_LEN);
    let record = packet.freeze();

    Ok(Some(match sequence {
        Some(sequence) => Frame::Record { sequence, record },
        None => Frame::Info { record },
    }))
}

fn parse_sequence(digits: &[u8]) -> Result<u32, FrameError> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| u32::from_str_radix(s, 16).ok())
        .ok_or_else(|| {
            FrameError(format!(
                "bad sequence number {:?}",
                String::from_utf8_lossy(digits)
            ))
        })
}
