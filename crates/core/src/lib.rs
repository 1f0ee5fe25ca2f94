//! Core types, decoding, and persistence protocol for the waveform ingestion pipeline.

pub mod decode;
pub mod error;
pub mod packet;
pub mod record;
pub mod retention;
pub mod store;

pub use decode::{DecodedHeader, Decoder, MiniSeedDecoder};
pub use error::{DecodeError, Error, Result};
pub use packet::*;
pub use record::*;
pub use retention::*;
pub use store::*;
