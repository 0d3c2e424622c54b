use serde::Serialize;
use std::time::Duration;

use crate::features::FeatureVector;

/// Finding forwarded to the downstream alert store. Field names are the wire
/// contract of its upsert operation; do not rename them.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub domain: Option<String>,
    pub message_id: String,
    pub client_id: Option<String>,
    pub features: FeatureVector,
    pub score: f64,
    pub reasons: Vec<String>,
    pub observed_at: String,
}

/// Posts alerts to the configured endpoint with bounded retries. Delivery
/// failures are logged and swallowed; the processing pipeline never sees an
/// error from here.
pub struct AlertDispatcher {
    client: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
    max_attempts: u32,
    backoff_unit: Duration,
}

impl AlertDispatcher {
    pub fn new(
        endpoint: Option<String>,
        api_key: Option<String>,
        timeout_seconds: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(concat!("tunnel-sentry/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        })
    }

    /// Shrink the backoff unit so retry tests do not sleep for real seconds.
    #[cfg(test)]
    pub fn with_backoff_unit(mut self, backoff_unit: Duration) -> Self {
        self.backoff_unit = backoff_unit;
        self
    }

    /// POST the alert as JSON. Returns whether a 2xx response was obtained
    /// within the attempt budget. No endpoint configured means skip.
    pub async fn dispatch(&self, alert: &Alert) -> bool {
        let endpoint = match &self.endpoint {
            Some(endpoint) => endpoint,
            None => {
                log::debug!(
                    "No alert endpoint configured, skipping dispatch for {}",
                    alert.message_id
                );
                return false;
            }
        };

        for attempt in 1..=self.max_attempts {
            let mut request = self.client.post(endpoint).json(alert);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    log::info!(
                        "Delivered alert for {} (score {:.3}) on attempt {attempt}",
                        alert.message_id,
                        alert.score
                    );
                    return true;
                }
                Ok(response) => {
                    log::warn!(
                        "Alert POST for {} returned {} (attempt {attempt}/{})",
                        alert.message_id,
                        response.status(),
                        self.max_attempts
                    );
                }
                Err(e) => {
                    log::warn!(
                        "Alert POST for {} failed: {e} (attempt {attempt}/{})",
                        alert.message_id,
                        self.max_attempts
                    );
                }
            }
            // Linear backoff: wait attempt * unit before the next try.
            if attempt < self.max_attempts {
                tokio::time::sleep(self.backoff_unit * attempt).await;
            }
        }

        log::error!(
            "Giving up on alert for {} after {} attempts",
            alert.message_id,
            self.max_attempts
        );
        false
    }
}
