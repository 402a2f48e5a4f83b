/// Signal K TCP delta stream ingestion
use std::sync::Arc;

use log::{debug, error, info, trace, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{sleep, Duration};

use crate::aggregator::Aggregator;
use crate::signalk::{Delta, Subscription};

const POLL_INTERVAL_SECS: u64 = 1; // Requested delivery period per path
const WAIT_BETWEEN_RETRIES: u64 = 5;

/// Connect to the Signal K server and subscribe, retrying until it works
async fn connect_with_retry(addr: &str) -> TcpStream {
    let subscription = Subscription::for_measurements(POLL_INTERVAL_SECS * 1000);

    let mut attempt: u64 = 0;
    loop {
        attempt += 1;

        match TcpStream::connect(addr).await {
            Ok(mut stream) => match subscription.to_line() {
                Ok(line) => match stream.write_all(line.as_bytes()).await {
                    Ok(()) => {
                        info!("Subscribed to Signal K deltas at {}", addr);
                        return stream;
                    }
                    Err(e) => error!("Attempt {}: subscription error: {}", attempt, e),
                },
                Err(e) => error!("Attempt {}: could not encode subscription: {}", attempt, e),
            },
            Err(e) => error!("Attempt {}: connection error to {}: {}", attempt, addr, e),
        }

        sleep(Duration::from_secs(WAIT_BETWEEN_RETRIES)).await;
    }
}

/// Fold every delta line from `reader` into the aggregator until EOF
///
/// Returns the number of lines read.
pub async fn ingest_lines<R>(reader: R, aggregator: &Aggregator) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut count = 0;

    while let Some(line) = lines.next_line().await? {
        count += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let delta = match Delta::parse(line) {
            Ok(delta) => delta,
            Err(e) => {
                debug!("Skipping unparsable delta ({}): {}", e, line);
                continue;
            }
        };

        let context = delta.context.as_deref().unwrap_or("vessels.self");
        for update in &delta.updates {
            for value in &update.values {
                trace!(
                    "{} {} at {}: {}",
                    context,
                    value.path,
                    update.timestamp.as_deref().unwrap_or("unknown time"),
                    value.value
                );
                aggregator.ingest(&value.path, &value.value);
            }
        }
    }

    Ok(count)
}

/// Keep a Signal K subscription alive forever, reconnecting on loss
pub async fn run_ingest(addr: String, aggregator: Arc<Aggregator>) {
    loop {
        let stream = connect_with_retry(&addr).await;

        match ingest_lines(stream, &aggregator).await {
            Ok(lines) => warn!("Signal K stream closed after {} lines", lines),
            Err(e) => error!("Signal K stream error: {}", e),
        }

        sleep(Duration::from_secs(WAIT_BETWEEN_RETRIES)).await;
    }
}
