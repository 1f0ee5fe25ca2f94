//! Stream identity and waveform record types.

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decode::DecodedHeader;

/// The (network, station, channel, location) tuple naming one sensor channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamIdentity {
    pub network: String,
    pub station: String,
    pub channel: String,
    pub location: String,
}

impl StreamIdentity {
    /// Builds an identity, trimming fixed-width padding from every field.
    pub fn new(
        network: impl AsRef<str>,
        station: impl AsRef<str>,
        channel: impl AsRef<str>,
        location: impl AsRef<str>,
    ) -> Self {
        Self {
            network: trim_field(network.as_ref()),
            station: trim_field(station.as_ref()),
            channel: trim_field(channel.as_ref()),
            location: trim_field(location.as_ref()),
        }
    }
}

impl fmt::Display for StreamIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

/// Strips spaces, NULs and other control characters from both ends of a
/// fixed-width header field.
pub fn trim_field(raw: &str) -> String {
    raw.trim_matches(|c: char| c.is_whitespace() || c.is_control())
        .to_string()
}

/// One timestamped payload belonging to a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub identity: StreamIdentity,
    pub start_time: DateTime<Utc>,
    /// Receipt time minus the payload's nominal end time. May be negative.
    pub latency: TimeDelta,
    pub raw: Bytes,
}

impl Record {
    /// Builds a record from a decoded header, measuring latency against `now`.
    pub fn from_header(header: DecodedHeader, raw: Bytes, now: DateTime<Utc>) -> Self {
        Self {
            latency: latency(now, header.end_time),
            identity: header.identity,
            start_time: header.start_time,
            raw,
        }
    }

    /// Latency in fractional seconds, as persisted.
    pub fn latency_secs(&self) -> f64 {
        self.latency.num_microseconds().unwrap_or(i64::MAX) as f64 / 1_000_000.0
    }
}

/// Latency is `now - end_time`, negative when the payload claims to end in the future.
pub fn latency(now: DateTime<Utc>, end_time: DateTime<Utc>) -> TimeDelta {
    now.signed_duration_since(end_time)
}
