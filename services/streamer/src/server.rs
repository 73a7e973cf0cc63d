//! Streamer Server
//!
//! Owns the connection registry, the sites, and every worker task. One
//! shutdown signal stops all of them. On stop, workers are joined, queued
//! packets are discarded and every socket is closed.

use network::{ConnectionConfig, ConnectionRegistry, ConnectionStats};
use serde::Serialize;
use settings::{NetworkSettings, Settings};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::scheduler::SiteScheduler;
use crate::site::{Site, SiteStatus};
use crate::worker::ChannelWorker;

/// Registry tuning from network settings
pub fn connection_config(network: &NetworkSettings) -> ConnectionConfig {
    ConnectionConfig {
        port: network.port,
        connect_timeout: network.connect_timeout(),
        send_timeout: network.send_timeout(),
        connect_cooldown: network.connect_cooldown(),
        throughput_window: network.telemetry_window(),
    }
}

/// Snapshot of everything the server runs
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub sites: Vec<SiteStatus>,
    pub connections: Vec<ConnectionStats>,
    pub total_bytes_per_second: u64,
    pub min_bytes_per_second: u64,
}

/// Running sites and channel workers
pub struct Server {
    registry: Arc<ConnectionRegistry>,
    sites: Vec<Arc<Site>>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Server {
    /// Build every site from settings and start its workers
    ///
    /// A site whose layout is invalid is logged and skipped; the others
    /// still start. Must be called from within a Tokio runtime.
    pub fn start(settings: &Settings) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(connection_config(&settings.network)));

        let mut schedulers = Vec::with_capacity(settings.sites.len());
        for site_settings in &settings.sites {
            let built = Site::from_settings(site_settings, &settings.network, Arc::clone(&registry))
                .and_then(|site| SiteScheduler::from_settings(Arc::new(site), &site_settings.effects));

            match built {
                Ok(scheduler) => schedulers.push(scheduler),
                Err(e) => error!(site = %site_settings.name, error = %e, "Site will not start"),
            }
        }

        Self::spawn(registry, schedulers, settings.network.worker_poll())
    }

    /// Start a scheduler per site and a worker per channel
    pub fn spawn(
        registry: Arc<ConnectionRegistry>,
        schedulers: Vec<SiteScheduler>,
        worker_poll: Duration,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut sites = Vec::with_capacity(schedulers.len());
        let mut tasks = Vec::new();

        for scheduler in schedulers {
            let site = Arc::clone(scheduler.site());

            for channel in site.channels() {
                let worker = ChannelWorker::new(Arc::clone(channel), site.fps_handle(), worker_poll);
                tasks.push(tokio::spawn(worker.run(shutdown_rx.clone())));
            }
            tasks.push(tokio::spawn(scheduler.run(shutdown_rx.clone())));

            info!(
                site = %site.name(),
                pixels = site.buffer().len(),
                channels = site.channels().len(),
                "Site started"
            );
            sites.push(site);
        }

        Self {
            registry,
            sites,
            shutdown,
            tasks,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn sites(&self) -> &[Arc<Site>] {
        &self.sites
    }

    pub fn site(&self, name: &str) -> Option<&Arc<Site>> {
        self.sites.iter().find(|site| site.name() == name)
    }

    pub fn status(&self) -> ServerStatus {
        ServerStatus {
            sites: self.sites.iter().map(|site| site.status()).collect(),
            connections: self.registry.stats(),
            total_bytes_per_second: self.registry.total_bytes_per_second(),
            min_bytes_per_second: self.registry.min_bytes_per_second(),
        }
    }

    /// Signal every worker, wait for them, then drop queues and sockets
    pub async fn stop(self) {
        info!("Stopping streamer");
        if self.shutdown.send(true).is_err() {
            warn!("All workers already exited");
        }

        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Worker task failed");
            }
        }

        let mut discarded = 0;
        for site in &self.sites {
            for channel in site.channels() {
                discarded += channel.stop();
            }
        }

        self.registry.close_all().await;
        info!(discarded, "Streamer stopped");
    }
}
