//! HTTP clients for the ranking API and the zone directory

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use queueboard_domain::{QueueSource, SessionProvider};
use queueboard_types::{Plant, QueueError, Vehicle};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::debug;

/// Longest server error body echoed into an error message
const MAX_ERROR_BODY: usize = 200;

fn build_client(timeout: Duration) -> Result<Client, QueueError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| QueueError::Network(format!("Failed to build HTTP client: {}", e)))
}

fn map_request_error(err: reqwest::Error) -> QueueError {
    if err.is_timeout() {
        QueueError::Timeout
    } else {
        QueueError::Network(err.to_string())
    }
}

/// Pull a readable message out of an error response body
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error", "Message"] {
            if let Some(Value::String(msg)) = map.get(key) {
                return msg.clone();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_BODY).collect()
    }
}

async fn read_body(response: Response) -> Result<String, QueueError> {
    let status = response.status();
    let body = response.text().await.map_err(map_request_error)?;
    if !status.is_success() {
        return Err(QueueError::Http {
            status: status.as_u16(),
            message: error_message(status, &body),
        });
    }
    Ok(body)
}

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Ranked vehicle queue from `GET /vehicle/priority`
pub struct HttpQueueSource {
    client: Client,
    base_url: String,
    session: Arc<dyn SessionProvider>,
}

impl HttpQueueSource {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        session: Arc<dyn SessionProvider>,
    ) -> Result<Self, QueueError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
            session,
        })
    }

    /// Attach the per-session `Key` / `Instance` header pair
    fn authorize(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(auth) = self.session.auth_data() {
            if let Some(key) = auth.api_key.as_deref() {
                request = request.header("Key", key);
            }
            if let Some(instance) = auth.instance() {
                request = request.header("Instance", instance);
            }
        }
        request
    }
}

#[async_trait]
impl QueueSource for HttpQueueSource {
    async fn fetch_queue(&self, plant_id: &str) -> Result<Vec<Vehicle>, QueueError> {
        let url = join_url(&self.base_url, "vehicle/priority");
        debug!("GET {} origin_id={}", url, plant_id);

        let request = self
            .client
            .get(&url)
            .query(&[("origin_id", plant_id), ("permits", "false")]);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(map_request_error)?;

        let body = read_body(response).await?;
        serde_json::from_str(&body).map_err(|e| QueueError::Decode(e.to_string()))
    }
}

/// Batching plants the account can see, from `POST /Zone/origin`
pub struct HttpPlantDirectory {
    client: Client,
    base_url: String,
    session: Arc<dyn SessionProvider>,
}

impl HttpPlantDirectory {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        session: Arc<dyn SessionProvider>,
    ) -> Result<Self, QueueError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
            session,
        })
    }

    pub async fn list_plants(&self) -> Result<Vec<Plant>, QueueError> {
        let url = join_url(&self.base_url, "Zone/origin");
        let mut request = self.client.post(&url);
        if let Some(auth) = self.session.auth_data() {
            if let Some(jwt) = auth.jwt_token.as_deref() {
                request = request.bearer_auth(jwt);
            }
            if let Some(key) = auth.api_key.as_deref() {
                request = request.header("Token", key).header("ApiKey", key);
            }
            if let Some(instance) = auth.instance() {
                request = request.header("Instance", instance);
            }
        }

        let response = request.send().await.map_err(map_request_error)?;
        let body = read_body(response).await?;

        // Entries without any usable identifier are skipped, not fatal
        let entries: Vec<Value> =
            serde_json::from_str(&body).map_err(|e| QueueError::Decode(e.to_string()))?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://api.example.com/v1/", "/vehicle/priority"),
            "https://api.example.com/v1/vehicle/priority"
        );
        assert_eq!(
            join_url("https://api.example.com", "Zone/origin"),
            "https://api.example.com/Zone/origin"
        );
    }

    #[test]
    fn test_error_message_prefers_json_message() {
        let msg = error_message(
            StatusCode::UNAUTHORIZED,
            r#"{"message": "Invalid key", "code": 401}"#,
        );
        assert_eq!(msg, "Invalid key");
    }

    #[test]
    fn test_error_message_falls_back_to_body_or_reason() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "  "), "Bad Gateway");

        let long = "x".repeat(500);
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, &long).len(),
            MAX_ERROR_BODY
        );
    }
}
