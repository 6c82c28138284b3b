use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::parse::{parse_line, ParseError};
use super::SubscriberChain;
use crate::export::health::HealthMetrics;

/// Counters for one run of a [`LineReader`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadSummary {
    pub lines: u64,
    pub events: u64,
    pub parse_errors: u64,
}

/// Reads log lines from an async source and dispatches parsed events.
pub struct LineReader {
    chain: SubscriberChain,
    health: Option<Arc<HealthMetrics>>,
}

impl LineReader {
    pub fn new(chain: SubscriberChain, health: Option<Arc<HealthMetrics>>) -> Self {
        Self { chain, health }
    }

    /// Consume `input` until EOF or cancellation.
    ///
    /// Unparseable lines are counted and skipped; I/O errors end the run.
    pub async fn run<R>(&self, input: R, cancel: CancellationToken) -> Result<ReadSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut summary = ReadSummary::default();

        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => line.context("reading log line")?,
            };

            let Some(line) = line else {
                debug!("log input reached end of stream");
                break;
            };

            summary.lines += 1;

            match parse_line(&line) {
                Ok(event) => {
                    summary.events += 1;
                    self.chain.dispatch(&event);
                }
                Err(ParseError::Empty) => {}
                Err(e) => {
                    summary.parse_errors += 1;
                    debug!(error = %e, line = %line, "skipping log line");
                    if let Some(ref h) = self.health {
                        h.parse_errors.inc();
                    }
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::BufReader;

    use super::*;
    use crate::source::StatsSubscriber;
    use crate::stats::severity::MessageType;
    use crate::stats::{ErrorStats, StatsConfig};

    fn reader_with_stats() -> (LineReader, Arc<ErrorStats>) {
        let stats = Arc::new(ErrorStats::new());
        stats
            .initialize(&StatsConfig {
                interval: Duration::from_secs(1),
                intervals_count: 2,
            })
            .expect("init");

        let mut chain = SubscriberChain::new();
        chain.push(Arc::new(StatsSubscriber::new(stats.clone(), "duration:", None)));
        (LineReader::new(chain, None), stats)
    }

    #[tokio::test]
    async fn test_reads_until_eof() {
        let (reader, stats) = reader_with_stats();
        let input = b"ERROR:  23505: duplicate key\n\
            \n\
            DETAIL:  Key (id)=(1) already exists.\n\
            WARNING:  01000: careful\n" as &[u8];

        let summary = reader
            .run(BufReader::new(input), CancellationToken::new())
            .await
            .expect("run");

        assert_eq!(
            summary,
            ReadSummary {
                lines: 4,
                events: 2,
                parse_errors: 1,
            }
        );
        assert_eq!(stats.total(MessageType::Error), Ok(1));
        assert_eq!(stats.total(MessageType::Warning), Ok(1));
    }

    #[tokio::test]
    async fn test_stops_on_cancel() {
        let (reader, _stats) = reader_with_stats();
        // Duplex half that never yields data keeps the reader pending.
        let (_tx, rx) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = reader
            .run(BufReader::new(rx), cancel)
            .await
            .expect("run");
        assert_eq!(summary, ReadSummary::default());
    }

    #[tokio::test]
    async fn test_counts_parse_errors_in_health() {
        let health = Arc::new(HealthMetrics::new(":0").expect("metrics"));
        let reader = LineReader::new(SubscriberChain::new(), Some(health.clone()));

        reader
            .run(
                BufReader::new(b"no severity here\nHINT:  try again\n" as &[u8]),
                CancellationToken::new(),
            )
            .await
            .expect("run");

        assert_eq!(health.parse_errors.get(), 2.0);
    }
}
