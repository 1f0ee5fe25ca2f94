//! miniSEED record and SeedLink packet builders.

use bytes::Bytes;
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use ingest_core::decode::RECORD_LEN;
use ingest_core::{Record, StreamIdentity};

/// Builder for a big-endian SEED 2.x data record.
#[derive(Debug, Clone)]
pub struct MiniSeedRecord {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub start: DateTime<Utc>,
    pub samples: u16,
    pub rate_factor: i16,
    pub rate_multiplier: i16,
}

impl MiniSeedRecord {
    /// A 100 Hz record for `NZ.WEL.10.HHZ` starting at `start`.
    pub fn wel(start: DateTime<Utc>) -> Self {
        Self {
            network: "NZ".into(),
            station: "WEL".into(),
            location: "10".into(),
            channel: "HHZ".into(),
            start,
            samples: 100,
            rate_factor: 100,
            rate_multiplier: 1,
        }
    }

    pub fn station(mut self, station: &str) -> Self {
        self.station = station.into();
        self
    }

    /// A record with no samples, as used for log messages.
    pub fn without_samples(mut self) -> Self {
        self.samples = 0;
        self.rate_factor = 0;
        self.rate_multiplier = 0;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut raw = vec![0u8; RECORD_LEN];
        raw[0..6].copy_from_slice(b"000001");
        raw[6] = b'D';
        raw[7] = b' ';
        put_padded(&mut raw[8..13], &self.station);
        put_padded(&mut raw[13..15], &self.location);
        put_padded(&mut raw[15..18], &self.channel);
        put_padded(&mut raw[18..20], &self.network);

        raw[20..22].copy_from_slice(&(self.start.year() as u16).to_be_bytes());
        raw[22..24].copy_from_slice(&(self.start.ordinal() as u16).to_be_bytes());
        raw[24] = self.start.hour() as u8;
        raw[25] = self.start.minute() as u8;
        raw[26] = self.start.second() as u8;
        let fract = (self.start.timestamp_subsec_micros() / 100) as u16;
        raw[28..30].copy_from_slice(&fract.to_be_bytes());

        raw[30..32].copy_from_slice(&self.samples.to_be_bytes());
        raw[32..34].copy_from_slice(&self.rate_factor.to_be_bytes());
        raw[34..36].copy_from_slice(&self.rate_multiplier.to_be_bytes());
        raw[44..46].copy_from_slice(&64u16.to_be_bytes());
        raw
    }
}

fn put_padded(field: &mut [u8], value: &str) {
    field.fill(b' ');
    let bytes = value.as_bytes();
    let n = bytes.len().min(field.len());
    field[..n].copy_from_slice(&bytes[..n]);
}

/// Frames a record as a SeedLink data packet.
pub fn seedlink_packet(sequence: u32, record: &[u8]) -> Vec<u8> {
    let mut out = format!("SL{:06X}", sequence).into_bytes();
    out.extend_from_slice(record);
    out
}

/// The `NZ.WEL.10.HHZ` identity.
pub fn wel_identity() -> StreamIdentity {
    StreamIdentity::new("NZ", "WEL", "HHZ", "10")
}

/// 2020-01-01T00:00:00Z
pub fn epoch_2020() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
}

/// A record ready for the store, with 512 bytes of payload.
pub fn record(identity: StreamIdentity, start_time: DateTime<Utc>) -> Record {
    Record {
        identity,
        start_time,
        latency: chrono::TimeDelta::seconds(1),
        raw: Bytes::from(vec![0u8; RECORD_LEN]),
    }
}
