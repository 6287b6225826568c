use async_trait::async_trait;
use interop_supervisor_metrics::MetricsReporter;
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::SupervisorActor;

/// Periodically asks every registered [`MetricsReporter`] to publish its gauges.
#[derive(Debug, derive_more::Constructor)]
pub struct MetricWorker<R> {
    interval: Duration,
    // list of reporters
    reporters: Vec<Arc<R>>,
    cancel_token: CancellationToken,
}

#[async_trait]
impl<R> SupervisorActor for MetricWorker<R>
where
    R: MetricsReporter + Send + Sync + 'static,
{
    type InboundEvent = ();
    type Error = Infallible;

    async fn start(mut self) -> Result<(), Self::Error> {
        info!(
            target: "supervisor::metric_worker",
            interval = ?self.interval,
            reporters = self.reporters.len(),
            "Starting metric worker"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!(target: "supervisor::metric_worker", "Metric worker stopping due to cancellation");
                    break;
                }
                _ = ticker.tick() => {
                    for reporter in &self.reporters {
                        reporter.report_metrics();
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    mock! (
        #[derive(Debug)]
        pub Reporter {}

        impl MetricsReporter for Reporter {
            fn report_metrics(&self);
        }
    );

    #[tokio::test(start_paused = true)]
    async fn test_reports_every_interval_until_cancelled() {
        let mut first = MockReporter::new();
        first.expect_report_metrics().times(3).return_const(());
        let mut second = MockReporter::new();
        second.expect_report_metrics().times(3).return_const(());

        let cancel_token = CancellationToken::new();
        let worker = MetricWorker::new(
            Duration::from_secs(30),
            vec![Arc::new(first), Arc::new(second)],
            cancel_token.clone(),
        );
        let handle = tokio::spawn(worker.start());

        // ticks at 0s, 30s and 60s
        tokio::time::sleep(Duration::from_secs(75)).await;
        cancel_token.cancel();

        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_stops_immediately_on_cancel() {
        let mut reporter = MockReporter::new();
        reporter.expect_report_metrics().times(0..=1).return_const(());

        let cancel_token = CancellationToken::new();
        cancel_token.cancel();

        let worker =
            MetricWorker::new(Duration::from_secs(30), vec![Arc::new(reporter)], cancel_token);
        assert!(worker.start().await.is_ok());
    }
}
