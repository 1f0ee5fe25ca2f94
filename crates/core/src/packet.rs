//! Packets as delivered by a live stream source.

use async_trait::async_trait;
use bytes::Bytes;

/// Whether a payload carries waveform samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadClass {
    /// Waveform data record.
    Data,
    /// Log, timing, or other non-sample record.
    Other,
}

/// A raw record received from the source, not yet decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPacket {
    /// Source sequence number, if the transport carries one.
    pub sequence: Option<u32>,
    pub class: PayloadClass,
    pub payload: Bytes,
}

impl RawPacket {
    pub fn data(payload: impl Into<Bytes>) -> Self {
        Self {
            sequence: None,
            class: PayloadClass::Data,
            payload: payload.into(),
        }
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn is_data(&self) -> bool {
        self.class == PayloadClass::Data
    }
}

/// Result of one collect call on a stream source.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// A complete record arrived.
    Data(RawPacket),
    /// Nothing available right now.
    Idle,
    /// The source has shut down.
    Terminated,
    /// The transport delivered malformed framing.
    Invalid(String),
}

/// A live source of packets.
///
/// `collect` waits for the next packet but must return [`Packet::Idle`]
/// periodically when nothing arrives, so callers can check liveness.
#[async_trait]
pub trait PacketSource: Send {
    async fn collect(&mut self) -> Packet;
}
