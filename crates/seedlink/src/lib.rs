//! SeedLink packet source for the ingestion pipeline.
//!
//! Implements just enough of the SeedLink 3 client protocol to select
//! stations, request data, and frame the packet stream. Resumption from a
//! sequence number and keep-alives are left to the server defaults.

pub mod client;
pub mod config;
pub mod frame;

pub use client::*;
pub use config::*;
