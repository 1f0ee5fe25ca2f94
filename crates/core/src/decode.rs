//! Decoding of miniSEED (SEED 2.x) fixed data headers.
//!
//! Only the 48-byte fixed section is read: enough to name the stream and
//! place the record in time. Sample payloads are stored opaque.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

use crate::error::DecodeError;
use crate::packet::PayloadClass;
use crate::record::StreamIdentity;

/// Length of the SEED fixed section of data header.
pub const FIXED_HEADER_LEN: usize = 48;

/// Record length carried by SeedLink.
pub const RECORD_LEN: usize = 512;

/// Activity flag bit 1: time correction has already been applied.
const TIME_CORRECTION_APPLIED: u8 = 0x02;

/// Header fields needed to build a record.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedHeader {
    pub identity: StreamIdentity,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub sample_count: u16,
    pub sample_rate: f64,
}

/// Turns a raw record into header fields.
pub trait Decoder: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<DecodedHeader, DecodeError>;
}

/// Decoder for SEED 2.x records of either byte order.
#[derive(Debug, Clone, Copy, Default)]
pub struct MiniSeedDecoder;

impl MiniSeedDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Classifies a record: only records carrying samples at a known rate are data.
    pub fn payload_class(&self, raw: &[u8]) -> PayloadClass {
        match self.decode(raw) {
            Ok(h) if h.sample_count > 0 && h.sample_rate > 0.0 => PayloadClass::Data,
            _ => PayloadClass::Other,
        }
    }
}

impl Decoder for MiniSeedDecoder {
    fn decode(&self, raw: &[u8]) -> Result<DecodedHeader, DecodeError> {
        if raw.len() < FIXED_HEADER_LEN {
            return Err(DecodeError::truncated(raw.len(), FIXED_HEADER_LEN));
        }

        if !raw[0..6]
            .iter()
            .all(|b| b.is_ascii_digit() || *b == b' ' || *b == 0)
        {
            return Err(DecodeError::malformed("sequence number is not numeric"));
        }

        let quality = raw[6];
        if !matches!(quality, b'D' | b'R' | b'Q' | b'M') {
            return Err(DecodeError::malformed(format!(
                "invalid quality indicator 0x{:02x}",
                quality
            )));
        }

        let station = ascii_field(&raw[8..13]);
        let location = ascii_field(&raw[13..15]);
        let channel = ascii_field(&raw[15..18]);
        let network = ascii_field(&raw[18..20]);
        let identity = StreamIdentity::new(network, station, channel, location);
        if identity.station.is_empty() || identity.network.is_empty() {
            return Err(DecodeError::malformed("empty station or network code"));
        }

        let order = ByteOrder::detect(&raw[20..22])?;

        let year = order.u16(&raw[20..22]);
        let day = order.u16(&raw[22..24]);
        let hour = raw[24];
        let minute = raw[25];
        let second = raw[26];
        let fract = order.u16(&raw[28..30]);

        let sample_count = order.u16(&raw[30..32]);
        let rate_factor = order.i16(&raw[32..34]);
        let rate_multiplier = order.i16(&raw[34..36]);
        let activity_flags = raw[36];
        let time_correction = order.i32(&raw[40..44]);

        if hour > 23 || minute > 59 || second > 60 {
            return Err(DecodeError::malformed(format!(
                "invalid time of day {:02}:{:02}:{:02}",
                hour, minute, second
            )));
        }

        let date = NaiveDate::from_yo_opt(year as i32, day as u32).ok_or_else(|| {
            DecodeError::malformed(format!("invalid day-of-year {} for {}", day, year))
        })?;

        let mut start_time = date
            .and_hms_opt(hour as u32, minute as u32, 0)
            .ok_or_else(|| DecodeError::malformed("invalid start time"))?
            .and_utc()
            + TimeDelta::seconds(second as i64)
            + TimeDelta::microseconds(fract as i64 * 100);

        if activity_flags & TIME_CORRECTION_APPLIED == 0 && time_correction != 0 {
            start_time += TimeDelta::microseconds(time_correction as i64 * 100);
        }

        let sample_rate = nominal_sample_rate(rate_factor, rate_multiplier);
        let end_time = if sample_count > 0 && sample_rate > 0.0 {
            let span = (sample_count as f64 - 1.0) / sample_rate;
            let span = TimeDelta::microseconds((span * 1_000_000.0).round() as i64);
            start_time
                .checked_add_signed(span)
                .ok_or_else(|| {
                    DecodeError::malformed(format!(
                        "record span out of range ({} samples at {} Hz)",
                        sample_count, sample_rate
                    ))
                })?
        } else {
            start_time
        };

        Ok(DecodedHeader {
            identity,
            start_time,
            end_time,
            sample_count,
            sample_rate,
        })
    }
}

/// Nominal sample rate in Hz from the SEED factor and multiplier.
pub fn nominal_sample_rate(factor: i16, multiplier: i16) -> f64 {
    let mut rate = match factor {
        f if f > 0 => f as f64,
        f if f < 0 => -1.0 / f as f64,
        _ => return 0.0,
    };

    if multiplier > 0 {
        rate *= multiplier as f64;
    } else if multiplier < 0 {
        rate = -rate / multiplier as f64;
    }

    rate
}

fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    /// Picks the byte order under which the BTIME year is plausible.
    fn detect(year: &[u8]) -> Result<Self, DecodeError> {
        let plausible = |y: u16| (1900..=2100).contains(&y);
        let be = u16::from_be_bytes([year[0], year[1]]);
        let le = u16::from_le_bytes([year[0], year[1]]);

        if plausible(be) {
            Ok(Self::Big)
        } else if plausible(le) {
            Ok(Self::Little)
        } else {
            Err(DecodeError::malformed(format!(
                "implausible start year (be={}, le={})",
                be, le
            )))
        }
    }

    fn u16(self, b: &[u8]) -> u16 {
        let b = [b[0], b[1]];
        match self {
            Self::Big => u16::from_be_bytes(b),
            Self::Little => u16::from_le_bytes(b),
        }
    }

    fn i16(self, b: &[u8]) -> i16 {
        self.u16(b) as i16
    }

    fn i32(self, b: &[u8]) -> i32 {
        let b = [b[0], b[1], b[2], b[3]];
        match self {
            Self::Big => i32::from_be_bytes(b),
            Self::Little => i32::from_le_bytes(b),
        }
    }
}
