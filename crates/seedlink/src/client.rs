//! SeedLink client implementing [`PacketSource`].

use async_trait::async_trait;
use bytes::BytesMut;
use ingest_core::{Error, MiniSeedDecoder, Packet, PacketSource, RawPacket, Result};
use std::time::Duration;
use telemetry::health;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SeedLinkConfig;
use crate::frame::{next_frame, Frame, PACKET_LEN};

/// Longest response line accepted during the handshake.
const MAX_LINE_LEN: usize = 256;

/// A connected SeedLink session streaming data packets.
pub struct SeedLinkSource<S = TcpStream> {
    io: S,
    buf: BytesMut,
    poll_interval: Duration,
    decoder: MiniSeedDecoder,
}

impl SeedLinkSource<TcpStream> {
    /// Connects to the configured server and negotiates the stream.
    pub async fn connect(config: &SeedLinkConfig) -> Result<Self> {
        let io = tokio::time::timeout(
            config.connect_timeout(),
            TcpStream::connect(&config.address),
        )
        .await
        .map_err(|_| Error::source(format!("connect to {} timed out", config.address)))?
        .map_err(|e| Error::source(format!("connect to {}: {}", config.address, e)))?;

        io.set_nodelay(true)
            .map_err(|e| Error::source(format!("set_nodelay: {}", e)))?;

        Self::negotiate(io, config).await
    }

    /// Connects, retrying with a fixed delay until it succeeds or `cancel` fires.
    pub async fn connect_with_retry(
        config: &SeedLinkConfig,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        // Bad selectors will not fix themselves.
        config.stations()?;

        let delay = config.handshake_retry();
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            match Self::connect(config).await {
                Ok(source) => {
                    health().seedlink.set_healthy();
                    return Ok(source);
                }
                Err(e) => {
                    health().seedlink.set_unhealthy(e.to_string());
                    warn!(
                        address = %config.address,
                        attempt = attempt,
                        retry_in_secs = delay.as_secs(),
                        error = %e,
                        "SeedLink connection failed, retrying"
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Error::source("cancelled while connecting to SeedLink"));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl<S> SeedLinkSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Runs the multi-station handshake over an established connection:
    /// `STATION`, optional `SELECT`, and `DATA` per station, then `END`.
    pub async fn negotiate(io: S, config: &SeedLinkConfig) -> Result<Self> {
        let stations = config.stations()?;
        let mut source = Self {
            io,
            buf: BytesMut::with_capacity(PACKET_LEN * 4),
            poll_interval: config.poll_interval(),
            decoder: MiniSeedDecoder::new(),
        };

        for station in &stations {
            source
                .command(&format!("STATION {} {}", station.station, station.network))
                .await?;
            if let Some(ref selectors) = config.selectors {
                source.command(&format!("SELECT {}", selectors)).await?;
            }
            source.command("DATA").await?;
        }

        source.send("END").await?;

        info!(
            stations = stations.len(),
            selectors = config.selectors.as_deref().unwrap_or("default"),
            "SeedLink stream negotiated"
        );

        Ok(source)
    }

    async fn send(&mut self, command: &str) -> Result<()> {
        debug!(command = command, "SeedLink command");
        self.io
            .write_all(format!("{}\r\n", command).as_bytes())
            .await
            .map_err(|e| Error::source(format!("send {}: {}", command, e)))?;
        self.io
            .flush()
            .await
            .map_err(|e| Error::source(format!("flush: {}", e)))
    }

    /// Sends a command and requires an `OK` response.
    async fn command(&mut self, command: &str) -> Result<()> {
        self.send(command).await?;
        let response = self.read_line().await?;
        if response != "OK" {
            return Err(Error::source(format!(
                "{} rejected: {}",
                command, response
            )));
        }
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String> {
        loop {
            if let Some(pos) = self.buf.windows(2).position(|w| w == b"\r\n") {
                let line = self.buf.split_to(pos + 2);
                return Ok(String::from_utf8_lossy(&line[..pos]).trim().to_string());
            }
            if self.buf.len() > MAX_LINE_LEN {
                return Err(Error::source("response line too long"));
            }

            let n = tokio::time::timeout(self.poll_interval * 20, self.io.read_buf(&mut self.buf))
                .await
                .map_err(|_| Error::source("timed out waiting for response"))?
                .map_err(|e| Error::source(format!("read: {}", e)))?;
            if n == 0 {
                return Err(Error::source("connection closed during handshake"));
            }
        }
    }

    fn packet_from(&self, frame: Frame) -> Packet {
        match frame {
            Frame::Record { sequence, record } => Packet::Data(RawPacket {
                sequence: Some(sequence),
                class: self.decoder.payload_class(&record),
                payload: record,
            }),
            Frame::Info { record } => Packet::Data(RawPacket {
                sequence: None,
                class: ingest_core::PayloadClass::Other,
                payload: record,
            }),
            Frame::ServerError => Packet::Invalid("server responded with ERROR".to_string()),
        }
    }
}

#[async_trait]
impl<S> PacketSource for SeedLinkSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn collect(&mut self) -> Packet {
        loop {
            match next_frame(&mut self.buf) {
                Ok(Some(frame)) => return self.packet_from(frame),
                Ok(None) => {}
                Err(e) => return Packet::Invalid(e.to_string()),
            }

            // read_buf is cancel safe, so a timeout never loses bytes.
            match tokio::time::timeout(self.poll_interval, self.io.read_buf(&mut self.buf)).await
            {
                Err(_) => return Packet::Idle,
                Ok(Ok(0)) => {
                    info!(buffered = self.buf.len(), "SeedLink connection closed");
                    return Packet::Terminated;
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    warn!(error = %e, "SeedLink read failed");
                    return Packet::Terminated;
                }
            }
        }
    }
}
