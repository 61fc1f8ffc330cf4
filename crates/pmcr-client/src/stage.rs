//! HTTP stage clients.
//!
//! One client speaks all four stage contracts against a node's
//! `/api/v1/stages/{stage}` endpoints. `reqwest::Client` pools connections
//! internally, so a single client can be shared by every running cycle.

use async_trait::async_trait;
use pmcr_core::protocol::{
    CheckReply, CheckRequest, MakeReply, MakeRequest, PlanReply, PlanRequest, ReflectReply,
    ReflectRequest,
};
use pmcr_core::{StageError, StageKind};
use pmcr_stages::{CheckStage, MakeStage, PlanStage, ReflectStage};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Stage client backed by a remote node.
#[derive(Debug, Clone)]
pub struct HttpStageClient {
    /// Base URL of the node hosting the stage.
    base_url: String,

    /// HTTP client.
    http_client: reqwest::Client,
}

impl HttpStageClient {
    /// Create a client for the node at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a client sharing an existing `reqwest::Client`.
    pub fn with_client(base_url: &str, http_client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the endpoint serving `stage`.
    pub fn endpoint(&self, stage: StageKind) -> String {
        format!("{}/api/v1/stages/{}", self.base_url, stage.as_str())
    }

    async fn call<Req, Rep>(&self, stage: StageKind, request: &Req) -> Result<Rep, StageError>
    where
        Req: Serialize + Sync,
        Rep: DeserializeOwned,
    {
        let url = self.endpoint(stage);
        debug!(%stage, %url, "Calling remote stage");

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| StageError::transient(stage, format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| StageError::malformed(stage, e));
        }

        let body = response.text().await.unwrap_or_default();

        // Nodes report stage failures as a serialized StageError.
        if let Ok(remote) = serde_json::from_str::<StageError>(&body) {
            return Err(StageError { stage, ..remote });
        }

        let cause = format!("HTTP {}: {}", status.as_u16(), body.trim());
        if is_transient_status(status) {
            Err(StageError::transient(stage, cause))
        } else {
            Err(StageError::permanent(stage, cause))
        }
    }
}

/// Statuses worth retrying: request timeout, rate limiting and server errors.
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

#[async_trait]
impl PlanStage for HttpStageClient {
    async fn invoke(&self, request: PlanRequest) -> Result<PlanReply, StageError> {
        self.call(StageKind::Plan, &request).await
    }
}

#[async_trait]
impl MakeStage for HttpStageClient {
    async fn invoke(&self, request: MakeRequest) -> Result<MakeReply, StageError> {
        self.call(StageKind::Make, &request).await
    }
}

#[async_trait]
impl CheckStage for HttpStageClient {
    async fn invoke(&self, request: CheckRequest) -> Result<CheckReply, StageError> {
        self.call(StageKind::Check, &request).await
    }
}

#[async_trait]
impl ReflectStage for HttpStageClient {
    async fn invoke(&self, request: ReflectRequest) -> Result<ReflectReply, StageError> {
        self.call(StageKind::Reflect, &request).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use mockito::{Matcher, Server};

    use super::*;

    fn plan_request() -> PlanRequest {
        PlanRequest {
            id: "i-1".into(),
            content: "Create a Python function".into(),
            context: BTreeMap::from([("language".to_string(), "python".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_plan_round_trip() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/stages/plan")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "id": "i-1",
                "context": { "language": "python" }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "id": "p-1",
                    "original_intent_id": "i-1",
                    "steps": ["write it"],
                    "resources": { "task": "general" }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = HttpStageClient::new(&server.url());
        let reply = PlanStage::invoke(&client, plan_request()).await.unwrap();

        assert_eq!(reply.id, "p-1");
        assert_eq!(reply.original_intent_id, "i-1");
        assert_eq!(reply.steps, vec!["write it".to_string()]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/stages/check")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let client = HttpStageClient::new(&server.url());
        let err = CheckStage::invoke(
            &client,
            CheckRequest {
                artifact_id: "a-1".into(),
                content: "x".into(),
                artifact_type: "text".into(),
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.stage, StageKind::Check);
        assert!(err.transient);
        assert_eq!(err.cause, "HTTP 503: overloaded");
    }

    #[tokio::test]
    async fn test_remote_stage_error_is_preserved() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/stages/make")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::to_string(&StageError::permanent(StageKind::Plan, "no template"))
                    .unwrap(),
            )
            .create_async()
            .await;

        let client = HttpStageClient::new(&server.url());
        let err = MakeStage::invoke(
            &client,
            MakeRequest {
                plan_id: "p-1".into(),
                steps: vec!["x".into()],
                resources: BTreeMap::new(),
                artifact_type: "cobol".into(),
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err, StageError::permanent(StageKind::Make, "no template"));
    }

    #[tokio::test]
    async fn test_client_error_is_permanent() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/stages/reflect")
            .with_status(400)
            .with_body("bad request")
            .create_async()
            .await;

        let client = HttpStageClient::new(&server.url());
        let err = ReflectStage::invoke(
            &client,
            ReflectRequest {
                is_valid: true,
                issues: vec![],
                confidence_score: 90.0,
            },
        )
        .await
        .unwrap_err();

        assert!(!err.transient);
    }

    #[tokio::test]
    async fn test_undecodable_reply_is_malformed() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v1/stages/plan")
            .with_status(200)
            .with_body("{\"unexpected\": true}")
            .create_async()
            .await;

        let client = HttpStageClient::new(&server.url());
        let err = PlanStage::invoke(&client, plan_request()).await.unwrap_err();

        assert!(!err.transient);
        assert!(err.cause.starts_with("malformed reply"));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transient() {
        let client = HttpStageClient::new("http://127.0.0.1:1/");
        let err = PlanStage::invoke(&client, plan_request()).await.unwrap_err();
        assert!(err.transient);
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(StatusCode::REQUEST_TIMEOUT));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert_eq!(
            HttpStageClient::new("http://node:8080/").endpoint(StageKind::Reflect),
            "http://node:8080/api/v1/stages/reflect"
        );
    }
}
