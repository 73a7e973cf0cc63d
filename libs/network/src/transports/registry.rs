//! Host Connection Registry
//!
//! Maps controller host names to their single shared [`DeviceConnection`].
//! Channel workers race on this map, so every mutation is either an atomic
//! get-or-create or a compare-and-remove: a worker can only remove the exact
//! connection instance it was using, never a fresh one another worker just
//! created for the same host.

use super::tcp::{ConnectAttempts, ConnectionConfig, ConnectionStats, DeviceConnection};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Registry of live device connections, keyed by host name
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    config: ConnectionConfig,
    connections: DashMap<String, Arc<DeviceConnection>>,
    /// Connect clocks outlive the connections they throttle
    attempts: DashMap<String, Arc<ConnectAttempts>>,
}

impl ConnectionRegistry {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            connections: DashMap::new(),
            attempts: DashMap::new(),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn get(&self, host: &str) -> Option<Arc<DeviceConnection>> {
        self.connections.get(host).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, host: &str) -> bool {
        self.connections.contains_key(host)
    }

    /// Return the connection for `host`, creating it if absent
    ///
    /// The flag is true when this call created the entry.
    pub fn get_or_create(&self, host: &str) -> (Arc<DeviceConnection>, bool) {
        if let Some(existing) = self.get(host) {
            return (existing, false);
        }

        let mut created = false;
        let connection = Arc::clone(
            self.connections
                .entry(host.to_string())
                .or_insert_with(|| {
                    created = true;
                    Arc::new(DeviceConnection::new(
                        host,
                        self.config.clone(),
                        self.attempts_for(host),
                    ))
                })
                .value(),
        );

        if created {
            debug!(host, "Registered new device connection");
        }
        (connection, created)
    }

    fn attempts_for(&self, host: &str) -> Arc<ConnectAttempts> {
        Arc::clone(
            self.attempts
                .entry(host.to_string())
                .or_insert_with(|| Arc::new(ConnectAttempts::new()))
                .value(),
        )
    }

    /// Remove `host` only if it still maps to `connection`
    pub fn remove(&self, host: &str, connection: &Arc<DeviceConnection>) -> bool {
        let removed = self
            .connections
            .remove_if(host, |_, current| Arc::ptr_eq(current, connection))
            .is_some();
        if removed {
            debug!(host, "Dropped device connection");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn hosts(&self) -> Vec<String> {
        self.connections.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Sum of bytes per second across every registered connection
    pub fn total_bytes_per_second(&self) -> u64 {
        self.connections
            .iter()
            .map(|entry| entry.value().bytes_per_second())
            .sum()
    }

    /// Sum of bytes per second across the distinct hosts given
    pub fn bytes_per_second_for<'a>(&self, hosts: impl IntoIterator<Item = &'a str>) -> u64 {
        let distinct: HashSet<&str> = hosts.into_iter().collect();
        distinct
            .into_iter()
            .filter_map(|host| self.get(host))
            .map(|connection| connection.bytes_per_second())
            .sum()
    }

    /// Slowest registered connection, or 0 when none are registered
    pub fn min_bytes_per_second(&self) -> u64 {
        self.connections
            .iter()
            .map(|entry| entry.value().bytes_per_second())
            .min()
            .unwrap_or(0)
    }

    pub fn stats(&self) -> Vec<ConnectionStats> {
        let mut stats: Vec<_> = self
            .connections
            .iter()
            .map(|entry| entry.value().stats())
            .collect();
        stats.sort_by(|a, b| a.host.cmp(&b.host));
        stats
    }

    /// Empty the registry and close every socket
    pub async fn close_all(&self) {
        let hosts = self.hosts();
        let mut drained = Vec::with_capacity(hosts.len());
        for host in hosts {
            if let Some((_, connection)) = self.connections.remove(&host) {
                drained.push(connection);
            }
        }
        for connection in drained {
            connection.close().await;
        }
    }
}
