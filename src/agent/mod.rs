use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::export::health::HealthMetrics;
use crate::rotator::Rotator;
use crate::source::{LineReader, ReadSummary, StatsSubscriber, SubscriberChain};
use crate::stats::ErrorStats;

/// Agent orchestrates all components: stats store, rotator, log input, server.
pub struct Agent {
    cfg: Config,
    health: Arc<HealthMetrics>,
    stats: Arc<ErrorStats>,
    rotator: Option<Rotator>,
    reader: Option<JoinHandle<Result<ReadSummary>>>,
    local_addr: Option<SocketAddr>,
    cancel: CancellationToken,
}

impl Agent {
    /// Creates a new Agent, initializing health metrics.
    pub fn new(cfg: Config) -> Result<Self> {
        let health =
            Arc::new(HealthMetrics::new(&cfg.server.addr).context("creating health metrics")?);

        Ok(Self {
            cfg,
            health,
            stats: Arc::new(ErrorStats::new()),
            rotator: None,
            reader: None,
            local_addr: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Start all components, reading log lines from stdin if configured.
    pub async fn start(&mut self) -> Result<()> {
        self.start_components().await?;

        if self.cfg.source.stdin {
            self.spawn_reader(BufReader::new(tokio::io::stdin()));
            info!("reading log lines from stdin");
        }

        Ok(())
    }

    /// Start all components, reading log lines from `input`.
    pub async fn start_with_input<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        self.start_components().await?;
        self.spawn_reader(input);
        Ok(())
    }

    async fn start_components(&mut self) -> Result<()> {
        let started = Instant::now();

        // 0. Start the server first so health checks respond; queries report 503
        // until initialization completes.
        let addr = self
            .health
            .start(Arc::clone(&self.stats))
            .await
            .context("starting stats server")?;
        self.local_addr = Some(addr);

        // 1. Allocate the counter store. The server must not outlive a failed start.
        let stats_cfg = self.cfg.stats_config();
        if let Err(e) = self.stats.initialize(&stats_cfg) {
            self.health.stop().await?;
            self.local_addr = None;
            return Err(anyhow::Error::new(e).context("initializing error statistics"));
        }
        let categories = self.stats.category_count()?;
        self.health.categories.set(categories as f64);

        // 2. Drive bucket rotation.
        self.rotator = Some(Rotator::spawn(
            Arc::clone(&self.stats),
            stats_cfg.interval,
            self.cancel.child_token(),
            Some(Arc::clone(&self.health)),
        ));

        info!(
            addr = %addr,
            interval = ?stats_cfg.interval,
            intervals_count = stats_cfg.intervals_count,
            elapsed = ?started.elapsed(),
            "agent started",
        );

        Ok(())
    }

    fn spawn_reader<R>(&mut self, input: R)
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let mut chain = SubscriberChain::new();
        chain.push(Arc::new(StatsSubscriber::new(
            Arc::clone(&self.stats),
            self.cfg.source.slow_marker.clone(),
            Some(Arc::clone(&self.health)),
        )));

        let reader = LineReader::new(chain, Some(Arc::clone(&self.health)));
        let cancel = self.cancel.child_token();

        self.reader = Some(tokio::spawn(async move {
            let summary = reader.run(input, cancel).await?;
            info!(
                lines = summary.lines,
                events = summary.events,
                parse_errors = summary.parse_errors,
                "log input finished",
            );
            Ok(summary)
        }));
    }

    /// Shared statistics service.
    pub fn stats(&self) -> Arc<ErrorStats> {
        Arc::clone(&self.stats)
    }

    /// Address the server is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stop all components and wait for background tasks.
    pub async fn stop(&mut self) -> Result<Option<ReadSummary>> {
        // Signal all background tasks to stop.
        self.cancel.cancel();

        if let Some(rotator) = self.rotator.take() {
            rotator.join().await;
        }

        let mut summary = None;
        if let Some(reader) = self.reader.take() {
            match reader.await {
                Ok(Ok(s)) => summary = Some(s),
                Ok(Err(e)) => error!(error = %e, "log reader failed"),
                Err(e) => error!(error = %e, "log reader task panicked"),
            }
        }

        // Stop the server last so final scrapes succeed.
        self.health.stop().await?;

        Ok(summary)
    }
}
