//! Transport Layer Tests
//!
//! Real loopback sockets standing in for controllers, no mocks.

use super::*;
use crate::TransportError;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use types::{TelemetryResponse, TELEMETRY_RESPONSE_SIZE};
use zerocopy::AsBytes;

const HOST: &str = "127.0.0.1";

async fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind((HOST, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn registry_for(port: u16) -> ConnectionRegistry {
    ConnectionRegistry::new(ConnectionConfig {
        port,
        connect_timeout: Duration::from_secs(2),
        send_timeout: Duration::from_secs(2),
        connect_cooldown: Duration::from_secs(1),
        throughput_window: Duration::from_secs(10),
    })
}

/// A port with nothing listening on it
async fn closed_port() -> u16 {
    let (listener, port) = listener().await;
    drop(listener);
    port
}

fn sample_telemetry() -> TelemetryResponse {
    TelemetryResponse {
        size: TELEMETRY_RESPONSE_SIZE as u32,
        flash_version: 7,
        current_clock: 1_700_000_000.0,
        oldest_packet: 1_700_000_000.5,
        newest_packet: 1_700_000_001.5,
        brightness: 255.0,
        wifi_signal: -55.0,
        buffer_size: 300,
        buffer_pos: 12,
        fps_drawing: 22,
        watts: 4,
    }
}

mod connection {
    use super::*;

    #[tokio::test]
    async fn test_connect_and_send_batch() {
        let (listener, port) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut received = vec![0u8; 1000];
            stream.read_exact(&mut received).await.unwrap();
            received
        });

        let registry = registry_for(port);
        let (connection, created) = registry.get_or_create(HOST);
        assert!(created);
        assert!(!connection.is_connected());

        connection.ensure_connected().await.unwrap();
        assert!(connection.is_connected());
        // Already connected: no new attempt, no cooldown error
        connection.ensure_connected().await.unwrap();

        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let report = connection.send(&payload).await.unwrap();
        assert_eq!(report.written, 1000);

        assert_eq!(server.await.unwrap(), payload);

        let stats = connection.stats();
        assert_eq!(stats.counters.batches_sent, 1);
        assert_eq!(stats.counters.bytes_sent, 1000);
        assert!(stats.connected);
        assert_eq!(stats.peer_addr.map(|a| a.port()), Some(port));
    }

    #[tokio::test]
    async fn test_partial_telemetry_is_buffered_across_sends() {
        let (listener, port) = listener().await;
        let record = sample_telemetry();
        let record_bytes = record.as_bytes().to_vec();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut batch = [0u8; 10];

            stream.read_exact(&mut batch).await.unwrap();
            stream.write_all(&record_bytes[..30]).await.unwrap();

            stream.read_exact(&mut batch).await.unwrap();
            stream.write_all(&record_bytes[30..]).await.unwrap();

            stream.read_exact(&mut batch).await.unwrap();
            stream
        });

        let registry = registry_for(port);
        let (connection, _) = registry.get_or_create(HOST);
        connection.ensure_connected().await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            let report = connection.send(&[1u8; 10]).await.unwrap();
            seen.push(report.telemetry);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let _stream = server.await.unwrap();
        assert_eq!(seen[0], None);
        assert!(seen.iter().any(|t| *t == Some(record)));
        assert_eq!(connection.last_telemetry(), Some(record));
        assert_eq!(connection.firmware_version().as_deref(), Some("v7"));
        assert_eq!(connection.metrics().telemetry_records, 1);
    }

    #[tokio::test]
    async fn test_undersized_telemetry_ignored() {
        let (listener, port) = listener().await;
        let bogus = TelemetryResponse {
            size: 8,
            ..sample_telemetry()
        };
        let bogus_bytes = bogus.as_bytes().to_vec();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut batch = [0u8; 4];
            stream.read_exact(&mut batch).await.unwrap();
            stream.write_all(&bogus_bytes).await.unwrap();
            stream.read_exact(&mut batch).await.unwrap();
            stream
        });

        let registry = registry_for(port);
        let (connection, _) = registry.get_or_create(HOST);
        connection.ensure_connected().await.unwrap();

        connection.send(&[0u8; 4]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let report = connection.send(&[0u8; 4]).await.unwrap();

        let _stream = server.await.unwrap();
        assert_eq!(report.telemetry, None);
        assert_eq!(connection.last_telemetry(), None);
    }

    #[tokio::test]
    async fn test_peer_disconnect_marks_dead() {
        let (listener, port) = listener().await;
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let registry = registry_for(port);
        let (connection, _) = registry.get_or_create(HOST);
        connection.ensure_connected().await.unwrap();
        server.await.unwrap();

        let mut failed = false;
        for _ in 0..50 {
            if connection.send(&[0xAB; 4096]).await.is_err() {
                failed = true;
                break;
            }
            if connection.is_dead() {
                failed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert!(failed, "writes to a closed peer never failed");
        assert!(connection.is_dead());
        assert!(!connection.is_connected());
        assert!(matches!(
            connection.ensure_connected().await,
            Err(TransportError::Dead { .. })
        ));
        assert!(matches!(
            connection.send(&[1]).await,
            Err(TransportError::Dead { .. })
        ));
    }

    #[tokio::test]
    async fn test_stalled_reader_times_out_and_marks_dead() {
        let (listener, port) = listener().await;
        let registry = ConnectionRegistry::new(ConnectionConfig {
            port,
            send_timeout: Duration::from_millis(200),
            ..ConnectionConfig::default()
        });
        let (connection, _) = registry.get_or_create(HOST);
        connection.ensure_connected().await.unwrap();
        // Accepted but never read from
        let (_held, _) = listener.accept().await.unwrap();

        let batch = vec![0x5Au8; 64 * 1024 * 1024];
        let err = tokio::time::timeout(Duration::from_secs(10), connection.send(&batch))
            .await
            .expect("send did not give up on a stalled device")
            .unwrap_err();

        assert!(matches!(err, TransportError::Transmission { .. }), "{err}");
        assert!(connection.is_dead());
        assert_eq!(connection.metrics().errors, 1);
    }

    #[tokio::test]
    async fn test_refused_connect_marks_dead() {
        let registry = registry_for(closed_port().await);
        let (connection, _) = registry.get_or_create(HOST);

        let err = connection.ensure_connected().await.unwrap_err();
        assert!(matches!(err, TransportError::Connection { .. }), "{err}");
        assert!(connection.is_dead());
        assert!(matches!(
            connection.ensure_connected().await,
            Err(TransportError::Dead { .. })
        ));
    }

    #[tokio::test]
    async fn test_send_without_connect_fails_without_killing() {
        let registry = registry_for(closed_port().await);
        let (connection, _) = registry.get_or_create(HOST);
        assert!(matches!(
            connection.send(&[1, 2, 3]).await,
            Err(TransportError::Transmission { .. })
        ));
        assert!(!connection.is_dead());
    }

    #[tokio::test]
    async fn test_close_disconnects() {
        let (listener, port) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await.unwrap();
            buf.len()
        });

        let registry = registry_for(port);
        let (connection, _) = registry.get_or_create(HOST);
        connection.ensure_connected().await.unwrap();
        connection.send(&[5u8; 64]).await.unwrap();
        connection.close().await;

        assert!(!connection.is_connected());
        assert!(!connection.is_dead());
        assert_eq!(server.await.unwrap(), 64);
    }
}

mod registry {
    use super::*;

    #[tokio::test]
    async fn test_cooldown_survives_recreation() {
        let registry = registry_for(closed_port().await);

        let (first, _) = registry.get_or_create(HOST);
        assert!(first.ensure_connected().await.is_err());
        assert!(registry.remove(HOST, &first));

        let (second, created) = registry.get_or_create(HOST);
        assert!(created);
        assert!(!Arc::ptr_eq(&first, &second));

        let err = second.ensure_connected().await.unwrap_err();
        assert!(matches!(err, TransportError::Cooldown { .. }), "{err}");
        assert!(err.keeps_connection());
        assert!(!second.is_dead());
    }

    #[tokio::test]
    async fn test_compare_and_remove() {
        let registry = registry_for(DEFAULT_DEVICE_PORT);
        let (stale, _) = registry.get_or_create("strip-a");
        assert!(registry.remove("strip-a", &stale));

        let (fresh, _) = registry.get_or_create("strip-a");
        // A worker holding the old instance must not evict the new one
        assert!(!registry.remove("strip-a", &stale));
        assert!(registry.contains("strip-a"));
        assert!(Arc::ptr_eq(&registry.get("strip-a").unwrap(), &fresh));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create_shares_one_connection() {
        let registry = Arc::new(registry_for(DEFAULT_DEVICE_PORT));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.get_or_create("shared-host") })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }

        assert_eq!(results.iter().filter(|(_, created)| *created).count(), 1);
        let first = &results[0].0;
        assert!(results.iter().all(|(conn, _)| Arc::ptr_eq(conn, first)));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_close_all_empties_registry() {
        let (listener, port) = listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await.unwrap();
        });

        let registry = registry_for(port);
        let (connection, _) = registry.get_or_create(HOST);
        connection.ensure_connected().await.unwrap();
        registry.get_or_create("never-connected");
        assert_eq!(registry.len(), 2);

        registry.close_all().await;
        assert!(registry.is_empty());
        assert!(!connection.is_connected());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_throughput_aggregates() {
        let registry = registry_for(DEFAULT_DEVICE_PORT);
        registry.get_or_create("a");
        registry.get_or_create("b");
        // Nothing connected, nothing sent
        assert_eq!(registry.total_bytes_per_second(), 0);
        assert_eq!(registry.min_bytes_per_second(), 0);
        assert_eq!(registry.bytes_per_second_for(["a", "a", "b", "missing"]), 0);
        assert_eq!(registry.hosts().len(), 2);
    }
}
