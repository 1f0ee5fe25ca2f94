//! End-to-end pipeline runs over in-memory and SeedLink-over-TCP sources.

use chrono::Duration as TimeDelta;
use ingest_core::{
    MiniSeedDecoder, Packet, RawPacket, RetentionPolicy, Store, StreamIdentity,
};
use integration_tests::fixtures::{epoch_2020, seedlink_packet, MiniSeedRecord};
use integration_tests::mocks::{MemoryBackend, ScriptedSource};
use seedlink::{SeedLinkConfig, SeedLinkSource};
use std::sync::Arc;
use std::time::Duration;
use telemetry::Metrics;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use worker::{FatalCondition, LoopExit, Pipeline, PipelineConfig, PipelineHandles};

/// Classifies like the SeedLink source does.
fn classified(raw: Vec<u8>) -> Packet {
    let class = MiniSeedDecoder::new().payload_class(&raw);
    Packet::Data(RawPacket {
        sequence: None,
        class,
        payload: raw.into(),
    })
}

fn start(
    source: impl ingest_core::PacketSource + 'static,
    backend: &MemoryBackend,
    metrics: &Arc<Metrics>,
    config: PipelineConfig,
    cancel: &CancellationToken,
) -> PipelineHandles {
    Pipeline::new(
        config,
        RetentionPolicy::default(),
        source,
        Arc::new(MiniSeedDecoder::new()),
        Arc::new(Store::new(backend.clone())),
        metrics.clone(),
    )
    .start(cancel)
}

/// Waits until the workers have handled `n` packets.
async fn wait_handled(metrics: &Metrics, n: u64) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while metrics.packets_processed.get() + metrics.packets_errored.get() < n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("workers did not drain the queue");
}

#[tokio::test]
async fn test_records_flow_to_store() {
    let backend = MemoryBackend::new();
    let metrics = Arc::new(Metrics::new());
    let cancel = CancellationToken::new();

    let mut packets = Vec::new();
    for station in ["WEL", "SNZO", "TUZ"] {
        for n in 0..5 {
            let start = epoch_2020() + TimeDelta::seconds(n);
            packets.push(classified(MiniSeedRecord::wel(start).station(station).build()));
        }
    }
    // redelivery of an already seen record
    packets.push(classified(MiniSeedRecord::wel(epoch_2020()).build()));
    // log record: skipped by the receive loop
    packets.push(classified(
        MiniSeedRecord::wel(epoch_2020()).without_samples().build(),
    ));
    // classified as data but undecodable
    packets.push(Packet::Data(RawPacket::data(vec![0u8; 16])));

    let source = ScriptedSource::new(packets, Packet::Terminated);
    let config = PipelineConfig {
        workers: 4,
        queue_capacity: 64,
        ..Default::default()
    };
    let handles = start(source, &backend, &metrics, config, &cancel);

    let exit = handles.receive.await.unwrap();
    assert_eq!(exit, LoopExit::Fatal(FatalCondition::SourceTerminated));

    wait_handled(&metrics, 17).await;
    cancel.cancel();
    for worker in handles.workers {
        worker.await.unwrap();
    }

    assert_eq!(backend.stream_count(), 3);
    assert_eq!(backend.record_count(), 15);
    assert_eq!(metrics.packets_received.get(), 17);
    assert_eq!(metrics.packets_skipped.get(), 1);
    assert_eq!(metrics.duplicates.get(), 1);
    assert_eq!(metrics.streams_created.get(), 3);
    assert_eq!(metrics.decode_errors.get(), 1);
}

#[tokio::test]
async fn test_store_outage_does_not_stop_pipeline() {
    let backend = MemoryBackend::new();
    backend.set_unavailable(true);
    let metrics = Arc::new(Metrics::new());
    let cancel = CancellationToken::new();

    let packets = (0..3).map(|n| {
        classified(MiniSeedRecord::wel(epoch_2020() + TimeDelta::seconds(n)).build())
    });
    let source = ScriptedSource::new(packets, Packet::Idle);
    let handles = start(source, &backend, &metrics, PipelineConfig::default(), &cancel);

    wait_handled(&metrics, 3).await;
    assert_eq!(metrics.store_errors.get(), 3);
    assert!(!handles.receive.is_finished());

    cancel.cancel();
    assert_eq!(handles.receive.await.unwrap(), LoopExit::Cancelled);
    assert_eq!(backend.record_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_silent_source_trips_watchdog() {
    let backend = MemoryBackend::new();
    let metrics = Arc::new(Metrics::new());
    let cancel = CancellationToken::new();

    let source = ScriptedSource::new([], Packet::Idle).after(
        Duration::from_secs(200),
        classified(MiniSeedRecord::wel(epoch_2020()).build()),
    );
    let started = tokio::time::Instant::now();
    let handles = start(source, &backend, &metrics, PipelineConfig::default(), &cancel);

    let exit = handles.receive.await.unwrap();
    cancel.cancel();

    assert!(matches!(
        exit,
        LoopExit::Fatal(FatalCondition::WatchdogExpired { .. })
    ));
    // one packet at 200s pushes the 300s deadline out to 500s
    assert!(started.elapsed() > Duration::from_secs(500));
    assert_eq!(metrics.packets_received.get(), 1);
}

/// A minimal SeedLink server: acknowledges the handshake, sends the given
/// packets, then closes.
async fn serve_seedlink(listener: TcpListener, packets: Vec<Vec<u8>>) -> Vec<String> {
    let (socket, _) = listener.accept().await.unwrap();
    let mut reader = BufReader::new(socket);
    let mut commands = Vec::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.unwrap() == 0 {
            return commands;
        }
        let line = line.trim().to_string();
        commands.push(line.clone());
        if line == "END" {
            break;
        }
        reader.get_mut().write_all(b"OK\r\n").await.unwrap();
    }
    for packet in packets {
        reader.get_mut().write_all(&packet).await.unwrap();
    }
    reader.get_mut().shutdown().await.unwrap();
    commands
}

#[tokio::test]
async fn test_seedlink_stream_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let packets = (0..4u32)
        .map(|n| {
            let start = epoch_2020() + TimeDelta::seconds(n as i64);
            seedlink_packet(n + 1, &MiniSeedRecord::wel(start).build())
        })
        .collect();
    let server = tokio::spawn(serve_seedlink(listener, packets));

    let config = SeedLinkConfig {
        address,
        streams: vec!["NZ_WEL".into(), "NZ_SNZO".into()],
        selectors: Some("HH?".into()),
        poll_interval_ms: 50,
        ..Default::default()
    };
    let cancel = CancellationToken::new();
    let source = SeedLinkSource::connect_with_retry(&config, &cancel)
        .await
        .expect("handshake failed");

    let backend = MemoryBackend::new();
    let metrics = Arc::new(Metrics::new());
    let handles = start(source, &backend, &metrics, PipelineConfig::default(), &cancel);

    let exit = handles.receive.await.unwrap();
    assert_eq!(exit, LoopExit::Fatal(FatalCondition::SourceTerminated));
    wait_handled(&metrics, 4).await;
    cancel.cancel();

    let commands = server.await.unwrap();
    assert_eq!(
        commands,
        vec![
            "STATION WEL NZ",
            "SELECT HH?",
            "DATA",
            "STATION SNZO NZ",
            "SELECT HH?",
            "DATA",
            "END"
        ]
    );

    let identity = StreamIdentity::new("NZ", "WEL", "HHZ", "10");
    let stored = backend.records_for(&identity);
    assert_eq!(stored.len(), 4);
    assert_eq!(stored[0].start_time, epoch_2020());
    assert!(stored.iter().all(|r| r.raw.len() == 512));
    assert_eq!(metrics.packets_processed.get(), 4);
}
