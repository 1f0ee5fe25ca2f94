//! PostgreSQL backend for the ingestion pipeline.

pub mod backend;
pub mod client;
pub mod config;
pub mod health;
pub mod query;
pub mod schema;

pub use backend::*;
pub use client::*;
pub use config::*;
