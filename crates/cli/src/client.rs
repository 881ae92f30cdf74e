//! HTTP client for the prediction server

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;
use usage_lib::{HealthResponse, PredictionResponse, ReadinessResponse, StationFeatures};

/// Client for the usage-server API
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// GET that also decodes non-2xx bodies (health endpoints answer 503 with JSON)
    async fn get_with_status<T: DeserializeOwned>(&self, path: &str) -> Result<(StatusCode, T)> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response.json().await.context("Failed to parse response")?;
        Ok((status, body))
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            anyhow::bail!("API error ({}): {}", status, message);
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn predict(&self, features: &StationFeatures) -> Result<PredictionResponse> {
        self.post("predict", features).await
    }

    pub async fn readiness(&self) -> Result<(StatusCode, ReadinessResponse)> {
        self.get_with_status("readyz").await
    }

    pub async fn health(&self) -> Result<(StatusCode, HealthResponse)> {
        self.get_with_status("healthz").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use usage_lib::{ComponentStatus, UsageLabel};

    fn features() -> StationFeatures {
        StationFeatures {
            power_kw: 50.0,
            neighborhood: "Duomo".to_string(),
            avg_daily_sessions: 0.05,
            avg_duration_min: 30.0,
            avg_energy_kwh: 20.0,
        }
    }

    #[tokio::test]
    async fn test_predict_sends_feature_names() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "Potenza_kW": 50.0,
                "NIL": "Duomo"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"predicted_usage_level":"medio"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let response = client.predict(&features()).await.unwrap();

        assert_eq!(response.predicted_usage_level, UsageLabel::Medio);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_predict_surfaces_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/predict")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"Model not loaded: artifact not found at model.json"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.predict(&features()).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("500"));
        assert!(message.contains("Model not loaded"));
    }

    #[tokio::test]
    async fn test_readiness_decodes_503() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/readyz")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ready":false,"reason":"Model not loaded: artifact not found"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let (status, readiness) = client.readiness().await.unwrap();

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!readiness.ready);
    }

    #[tokio::test]
    async fn test_health_decodes_components() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"status":"healthy","components":{"model":{"status":"healthy","last_check_timestamp":1717243200}}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let (status, health) = client.health().await.unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.contains_key("model"));
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
