//! PMCR node client implementation.

use pmcr_core::{
    CycleAccepted, CycleEntry, CycleResult, Intent, PmcrError, Result, RunCycleRequest,
};
use pmcr_history::{CycleRecord, TrendReport};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::stage::HttpStageClient;

/// Client for interacting with a PMCR node.
#[derive(Debug, Clone)]
pub struct PmcrClient {
    /// Base URL of the node.
    base_url: String,

    /// HTTP client.
    http_client: reqwest::Client,
}

/// Response of the health endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub active_cycles: usize,
}

impl PmcrClient {
    /// Connect to a node, verifying it with a health check.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Self {
            base_url: url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        };
        client.health().await?;
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stage client for the stages hosted by the same node.
    pub fn stages(&self) -> HttpStageClient {
        HttpStageClient::with_client(&self.base_url, self.http_client.clone())
    }

    /// Query the node's health.
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(connection_error)?
            .error_for_status()
            .map_err(connection_error)?;

        response.json().await.map_err(serialization_error)
    }

    /// Run a cycle on the node and wait for its result.
    pub async fn run_cycle(&self, intent: &Intent) -> Result<CycleResult> {
        let url = format!("{}/api/v1/cycle", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(&RunCycleRequest::from(intent))
            .send()
            .await
            .map_err(connection_error)?;

        decode(response, "Cycle", &intent.id).await
    }

    /// Start a cycle in the background.
    pub async fn start_cycle(&self, intent: &Intent) -> Result<CycleAccepted> {
        let url = format!("{}/api/v1/cycles", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(&RunCycleRequest::from(intent))
            .send()
            .await
            .map_err(connection_error)?;

        decode(response, "Cycle", &intent.id).await
    }

    /// List the cycles known to the node.
    pub async fn list_cycles(&self) -> Result<Vec<CycleEntry>> {
        let url = format!("{}/api/v1/cycles", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(connection_error)?;

        decode(response, "Cycle", "*").await
    }

    /// Get a cycle by id.
    pub async fn get_cycle(&self, cycle_id: &str) -> Result<CycleEntry> {
        let url = format!("{}/api/v1/cycles/{}", self.base_url, cycle_id);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(connection_error)?;

        decode(response, "Cycle", cycle_id).await
    }

    /// Cancel a running cycle.
    pub async fn cancel_cycle(&self, cycle_id: &str) -> Result<CycleEntry> {
        let url = format!("{}/api/v1/cycles/{}", self.base_url, cycle_id);

        let response = self
            .http_client
            .delete(&url)
            .send()
            .await
            .map_err(connection_error)?;

        decode(response, "Cycle", cycle_id).await
    }

    /// Recorded cycles, oldest first.
    pub async fn history(&self) -> Result<Vec<CycleRecord>> {
        let url = format!("{}/api/v1/history", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(connection_error)?;

        decode(response, "History", "*").await
    }

    /// Trend report over the recorded cycles.
    pub async fn trend(&self) -> Result<TrendReport> {
        let url = format!("{}/api/v1/history/trend", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(connection_error)?;

        decode(response, "History", "trend").await
    }
}

fn connection_error(e: reqwest::Error) -> PmcrError {
    PmcrError::ConnectionError {
        message: e.to_string(),
    }
}

fn serialization_error(e: reqwest::Error) -> PmcrError {
    PmcrError::SerializationError {
        message: e.to_string(),
    }
}

async fn decode<T: DeserializeOwned>(response: Response, resource_type: &str, id: &str) -> Result<T> {
    match response.status() {
        status if status.is_success() => response.json().await.map_err(serialization_error),
        StatusCode::NOT_FOUND => Err(PmcrError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            let message = response.text().await.unwrap_or_default();
            Err(PmcrError::input(Some(id.to_string()), message))
        }
        status => {
            let error_text = response.text().await.unwrap_or_default();
            Err(PmcrError::Internal {
                message: format!("HTTP {}: {}", status.as_u16(), error_text),
            })
        }
    }
}
