/// Submission of weather reports to the Windy.com station API
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

use crate::config::{StationConfig, StatusPolicy};
use crate::models::WeatherReport;

#[derive(Debug, Error)]
pub enum SubmitError {
    /// Request never produced a response (connect, TLS, I/O).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response arrived but was not accepted under the status policy.
    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Destination for finished weather reports
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, report: &WeatherReport) -> Result<(), SubmitError>;
}

/// Whether a response status counts as a successful submission
pub fn is_accepted(status: StatusCode, policy: StatusPolicy) -> bool {
    match policy {
        StatusPolicy::Strict => status.is_success(),
        StatusPolicy::Lenient => true,
    }
}

pub struct WindyClient {
    client: Client,
    endpoint: Url,
    policy: StatusPolicy,
}

impl WindyClient {
    pub fn new(config: &StationConfig) -> Result<Self, SubmitError> {
        let client = Client::builder().build()?;
        Ok(WindyClient {
            client,
            endpoint: config.endpoint.clone(),
            policy: config.status_policy,
        })
    }
}

#[async_trait]
impl Submitter for WindyClient {
    async fn submit(&self, report: &WeatherReport) -> Result<(), SubmitError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(report)
            .send()
            .await?;

        let status = response.status();
        if is_accepted(status, self.policy) {
            debug!("Windy.com answered {}", status);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SubmitError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AccumulationBuffer;
    use crate::config::tests::config_with;
    use crate::models::Position;
    use axum::extract::{Path, State};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    #[derive(Clone)]
    struct FakeWindy {
        status: u16,
        received: Arc<Mutex<Option<oneshot::Sender<(String, Value)>>>>,
    }

    async fn update_handler(
        State(state): State<FakeWindy>,
        Path(key): Path<String>,
        Json(body): Json<Value>,
    ) -> (axum::http::StatusCode, &'static str) {
        if let Some(tx) = state.received.lock().unwrap().take() {
            let _ = tx.send((key, body));
        }
        let status = axum::http::StatusCode::from_u16(state.status).unwrap();
        (status, "nope!")
    }

    /// Start a station endpoint answering every update with `status`.
    /// Returns the API base and the key and JSON body of the first update.
    async fn start_fake_windy(status: u16) -> (String, oneshot::Receiver<(String, Value)>) {
        let (tx, rx) = oneshot::channel();
        let state = FakeWindy {
            status,
            received: Arc::new(Mutex::new(Some(tx))),
        };
        let router = Router::new()
            .route("/pws/update/:key", post(update_handler))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let addr = listener.local_addr().expect("Failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        (format!("http://{}/pws/update/", addr), rx)
    }

    fn sample_report() -> WeatherReport {
        let snapshot = AccumulationBuffer {
            position: Some(Position {
                latitude: 60.0,
                longitude: 25.0,
            }),
            wind_speed: vec![3.0],
            wind_gust: Some(3.0),
            wind_direction: Some(270),
            air_temperature: Some(15.2),
            ..Default::default()
        };
        WeatherReport::from_snapshot(&config_with(&[]), &snapshot).unwrap()
    }

    #[test]
    fn status_classification() {
        assert!(is_accepted(StatusCode::OK, StatusPolicy::Strict));
        assert!(is_accepted(StatusCode::NO_CONTENT, StatusPolicy::Strict));
        assert!(!is_accepted(StatusCode::BAD_REQUEST, StatusPolicy::Strict));
        assert!(!is_accepted(StatusCode::INTERNAL_SERVER_ERROR, StatusPolicy::Strict));
        assert!(is_accepted(StatusCode::BAD_REQUEST, StatusPolicy::Lenient));
    }

    #[tokio::test]
    async fn posts_report_as_json_to_keyed_endpoint() {
        let (base, rx) = start_fake_windy(200).await;
        let config = config_with(&[("WINDY_API_BASE", base.as_str())]);
        let client = WindyClient::new(&config).unwrap();
        let report = sample_report();

        client.submit(&report).await.unwrap();

        let (key, sent) = rx.await.unwrap();
        assert_eq!(key, "test-key");
        assert_eq!(sent, serde_json::to_value(&report).unwrap());
    }

    #[tokio::test]
    async fn strict_policy_rejects_error_status() {
        let (base, _rx) = start_fake_windy(400).await;
        let config = config_with(&[("WINDY_API_BASE", base.as_str())]);
        let client = WindyClient::new(&config).unwrap();

        match client.submit(&sample_report()).await {
            Err(SubmitError::Rejected { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "nope!");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn lenient_policy_accepts_error_status() {
        let (base, _rx) = start_fake_windy(500).await;
        let config = config_with(&[
            ("WINDY_API_BASE", base.as_str()),
            ("WINDY_STATUS_POLICY", "lenient"),
        ]);
        let client = WindyClient::new(&config).unwrap();

        assert!(client.submit(&sample_report()).await.is_ok());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = format!("http://{}/pws/update/", addr);
        let config = config_with(&[
            ("WINDY_API_BASE", base.as_str()),
            ("WINDY_STATUS_POLICY", "lenient"),
        ]);
        let client = WindyClient::new(&config).unwrap();

        let result = client.submit(&sample_report()).await;
        assert!(matches!(result, Err(SubmitError::Transport(_))));
    }
}
