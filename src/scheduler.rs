/// Periodic report submission and status reporting
use std::sync::Arc;

use log::{debug, info, warn};
use time::OffsetDateTime;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::aggregator::{Aggregator, MissingFields};
use crate::config::StationConfig;
use crate::models::WeatherReport;
use crate::utils::{format_datetime, time_since};
use crate::windy::{SubmitError, Submitter};

/// Result of a single flush attempt
#[derive(Debug)]
pub enum FlushOutcome {
    /// Required fields were missing, nothing was sent
    Incomplete(MissingFields),
    /// Report accepted, its data has been consumed
    Submitted(WeatherReport),
    /// Report not accepted, its data is back in the buffer
    Failed(SubmitError),
}

/// Run one flush cycle: snapshot, submit, then commit or restore
pub async fn flush<S>(aggregator: &Aggregator, submitter: &S, config: &StationConfig) -> FlushOutcome
where
    S: Submitter + ?Sized,
{
    let snapshot = match aggregator.take_snapshot() {
        Ok(snapshot) => snapshot,
        Err(missing) => return FlushOutcome::Incomplete(missing),
    };

    let Some(report) = WeatherReport::from_snapshot(config, &snapshot) else {
        // take_snapshot only hands out complete buffers
        let missing = snapshot.missing_fields();
        aggregator.restore(snapshot);
        return FlushOutcome::Incomplete(missing);
    };

    debug!(
        "Submitting data: {}",
        serde_json::to_string(&report).unwrap_or_default()
    );

    match submitter.submit(&report).await {
        Ok(()) => {
            aggregator.record_success(OffsetDateTime::now_utc());
            FlushOutcome::Submitted(report)
        }
        Err(e) => {
            aggregator.restore(snapshot);
            FlushOutcome::Failed(e)
        }
    }
}

fn log_outcome(outcome: &FlushOutcome) {
    match outcome {
        FlushOutcome::Incomplete(missing) => {
            debug!("Not submitting report due to lack of {}", missing)
        }
        FlushOutcome::Submitted(report) => {
            let summary = report
                .observations
                .first()
                .map(|o| format!("wind {} m/s, {} °C", o.wind, o.temp))
                .unwrap_or_default();
            info!(
                "Weather report successfully submitted at {} ({})",
                format_datetime(&OffsetDateTime::now_utc()),
                summary
            );
        }
        FlushOutcome::Failed(e) => warn!("Error submitting to Windy.com API: {}", e),
    }
}

/// Flush every `submit_interval_minutes`, starting one period from now
///
/// Each tick runs in its own task so a slow submission never delays the
/// next attempt.
pub async fn run_flush_loop<S>(aggregator: Arc<Aggregator>, submitter: Arc<S>, config: Arc<StationConfig>)
where
    S: Submitter + ?Sized + 'static,
{
    let period = Duration::from_secs(config.submit_interval_minutes * 60);
    info!(
        "Starting submission process every {} minutes",
        config.submit_interval_minutes
    );

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let aggregator = Arc::clone(&aggregator);
        let submitter = Arc::clone(&submitter);
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            let outcome = flush(&aggregator, submitter.as_ref(), &config).await;
            log_outcome(&outcome);
        });
    }
}

/// Status line for the last successful submission, if there was one
pub fn status_message(aggregator: &Aggregator, now: OffsetDateTime) -> Option<String> {
    let last = aggregator.last_success()?;
    Some(format!(
        "Last successful submission was {} ago",
        time_since(now - last)
    ))
}

pub async fn run_status_loop(aggregator: Arc<Aggregator>, every: Duration) {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Some(message) = status_message(&aggregator, OffsetDateTime::now_utc()) {
            info!("{}", message);
        }
    }
}
