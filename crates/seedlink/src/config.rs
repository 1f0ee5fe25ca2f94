//! SeedLink configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use ingest_core::{Error, Result};

/// SeedLink client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedLinkConfig {
    /// Server address (host:port)
    pub address: String,
    /// Stations to request, as `NET_STA` (e.g. `NZ_WEL`)
    #[serde(default = "default_streams")]
    pub streams: Vec<String>,
    /// Channel selectors applied to every station (e.g. `HH? 10EH?`)
    #[serde(default)]
    pub selectors: Option<String>,
    /// How long a collect waits for bytes before reporting idle
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Fixed delay between startup connection attempts
    #[serde(default = "default_handshake_retry_secs")]
    pub handshake_retry_secs: u64,
}

fn default_streams() -> Vec<String> {
    vec!["NZ_WEL".to_string()]
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_handshake_retry_secs() -> u64 {
    30
}

impl Default for SeedLinkConfig {
    fn default() -> Self {
        Self {
            address: "link.geonet.org.nz:18000".to_string(),
            streams: default_streams(),
            selectors: None,
            poll_interval_ms: default_poll_interval_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
            handshake_retry_secs: default_handshake_retry_secs(),
        }
    }
}

/// One `STATION` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationSelector {
    pub network: String,
    pub station: String,
}

impl SeedLinkConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn handshake_retry(&self) -> Duration {
        Duration::from_secs(self.handshake_retry_secs)
    }

    /// Parses `streams` into station selectors.
    pub fn stations(&self) -> Result<Vec<StationSelector>> {
        if self.streams.is_empty() {
            return Err(Error::config("seedlink.streams must name at least one NET_STA"));
        }

        self.streams
            .iter()
            .map(|s| {
                let (network, station) = s
                    .trim()
                    .split_once('_')
                    .filter(|(n, st)| !n.is_empty() && !st.is_empty())
                    .ok_or_else(|| {
                        Error::config(format!("stream {:?} is not of the form NET_STA", s))
                    })?;
                Ok(StationSelector {
                    network: network.to_string(),
                    station: station.to_string(),
                })
            })
            .collect()
    }
}
