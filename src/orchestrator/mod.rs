//! Execution network client
//!
//! The execution network (solver/relayer infrastructure) accepts an intent,
//! delivers its token requirements on the target chain (bridging from the
//! source chain where needed) and executes the call bundle atomically. This
//! module defines the trait seam the engine and tracker depend on, plus the
//! HTTP implementation against the orchestrator API.
//!
//! The client is safe for concurrent use; many in-flight intents share one
//! instance behind an `Arc`.

use crate::config::OrchestratorConfig;
use crate::error::{EngineError, EngineResult};
use crate::intent::{ExecutionHandle, Intent, SettlementStatus};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Seam between the engine and the execution network.
///
/// `submit` returns as soon as the network accepts the intent for
/// processing; it never waits for settlement. Callers must not assume the
/// calls have executed once a handle is returned.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionNetwork: Send + Sync {
    /// Submit an intent, returning its tracking handle.
    ///
    /// `SubmissionRejected` guarantees no handle was issued, so retrying a
    /// rejected submission cannot double-deliver token requirements.
    async fn submit(&self, intent: &Intent) -> EngineResult<ExecutionHandle>;

    /// Query the current settlement status of a submitted intent.
    ///
    /// Transport and decoding faults surface as the retryable
    /// `TrackingQuery` error, never as a fabricated status.
    async fn status(&self, handle: &ExecutionHandle) -> EngineResult<SettlementStatus>;
}

/// HTTP client for the orchestrator API
pub struct OrchestratorClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    #[serde(flatten)]
    intent: &'a Intent,
    /// Fresh per submission attempt; lets the network deduplicate retries
    idempotency_key: Uuid,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: String,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    pub fn new(config: &OrchestratorConfig) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| EngineError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    fn intents_url(&self) -> String {
        format!("{}/v1/intents", self.base_url)
    }

    fn status_url(&self, handle: &ExecutionHandle) -> String {
        format!("{}/v1/intents/{}", self.base_url, handle)
    }

    async fn rejection_detail(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ErrorResponse>().await {
            Ok(body) if !body.message.is_empty() => format!("{}: {}", status, body.message),
            _ => status.to_string(),
        }
    }
}

/// A terminal status must carry its detail: Filled without a receipt or
/// Failed without a reason is an incomplete server response, treated the
/// same as an undecodable body.
fn check_status_detail(
    handle: &ExecutionHandle,
    status: SettlementStatus,
) -> EngineResult<SettlementStatus> {
    let missing = match &status {
        SettlementStatus::Filled { receipt } if receipt.is_empty() => Some("filled without receipt"),
        SettlementStatus::Failed { reason } if reason.is_empty() => Some("failed without reason"),
        _ => None,
    };
    match missing {
        Some(detail) => Err(EngineError::TrackingQuery {
            handle: handle.to_string(),
            message: format!("undecodable status: {}", detail),
        }),
        None => Ok(status),
    }
}

#[async_trait]
impl ExecutionNetwork for OrchestratorClient {
    async fn submit(&self, intent: &Intent) -> EngineResult<ExecutionHandle> {
        let request = SubmitRequest {
            intent,
            idempotency_key: Uuid::new_v4(),
        };

        debug!(
            source_chain = intent.source_chain,
            target_chain = intent.target_chain,
            calls = intent.calls.len(),
            "Submitting intent to orchestrator"
        );

        let response = self
            .client
            .post(self.intents_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::SubmissionRejected(format!("network unreachable: {}", e)))?;

        if !response.status().is_success() {
            let detail = Self::rejection_detail(response).await;
            warn!("Orchestrator refused intent: {}", detail);
            return Err(EngineError::SubmissionRejected(detail));
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| EngineError::SubmissionRejected(format!("unreadable response: {}", e)))?;

        if body.id.is_empty() {
            return Err(EngineError::SubmissionRejected(
                "orchestrator returned an empty handle".to_string(),
            ));
        }

        info!(handle = %body.id, "Intent accepted by orchestrator");
        Ok(ExecutionHandle(body.id))
    }

    async fn status(&self, handle: &ExecutionHandle) -> EngineResult<SettlementStatus> {
        let response = self
            .client
            .get(self.status_url(handle))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| EngineError::TrackingQuery {
                handle: handle.to_string(),
                message: e.to_string(),
            })?;

        // An unknown handle is a client bug or an expired server record,
        // not a transient fault worth retrying.
        if response.status() == StatusCode::NOT_FOUND {
            return Err(EngineError::Internal(format!(
                "orchestrator does not know handle {}",
                handle
            )));
        }

        if !response.status().is_success() {
            return Err(EngineError::TrackingQuery {
                handle: handle.to_string(),
                message: response.status().to_string(),
            });
        }

        let status = response
            .json::<SettlementStatus>()
            .await
            .map_err(|e| EngineError::TrackingQuery {
                handle: handle.to_string(),
                message: format!("undecodable status: {}", e),
            })?;
        check_status_detail(handle, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{Call, TokenRequirement};
    use alloy_primitives::{address, U256};

    #[test]
    fn test_submit_request_wire_shape() {
        let intent = Intent {
            source_chain: 10,
            target_chain: 8453,
            account: address!("00000000000000000000000000000000000000aa"),
            calls: vec![Call::new(
                address!("0000000000000000000000000000000000000001"),
                0,
                vec![0x12, 0x34],
            )],
            token_requirements: vec![TokenRequirement {
                token: address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913"),
                amount: U256::from(1_000_000u64),
            }],
        };
        let request = SubmitRequest {
            intent: &intent,
            idempotency_key: Uuid::nil(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["source_chain"], 10);
        assert_eq!(json["target_chain"], 8453);
        assert_eq!(json["calls"][0]["data"], "0x1234");
        assert!(json["idempotency_key"].is_string());
    }

    #[test]
    fn test_status_responses_decode() {
        let pending: SettlementStatus =
            serde_json::from_str(r#"{"state":"pending"}"#).unwrap();
        assert_eq!(pending, SettlementStatus::Pending);

        let filled: SettlementStatus =
            serde_json::from_str(r#"{"state":"filled","receipt":"0xdeadbeef"}"#).unwrap();
        assert_eq!(
            filled,
            SettlementStatus::Filled { receipt: "0xdeadbeef".into() }
        );

        let failed: SettlementStatus =
            serde_json::from_str(r#"{"state":"failed","reason":"call reverted"}"#).unwrap();
        assert_eq!(
            failed,
            SettlementStatus::Failed { reason: "call reverted".into() }
        );
    }

    #[test]
    fn test_terminal_status_without_detail_rejected() {
        let handle = ExecutionHandle("h-1".into());

        let bare_fill: SettlementStatus =
            serde_json::from_str(r#"{"state":"filled","receipt":""}"#).unwrap();
        let err = check_status_detail(&handle, bare_fill).unwrap_err();
        assert!(matches!(err, EngineError::TrackingQuery { .. }));

        let bare_fail: SettlementStatus =
            serde_json::from_str(r#"{"state":"failed","reason":""}"#).unwrap();
        let err = check_status_detail(&handle, bare_fail).unwrap_err();
        assert!(matches!(err, EngineError::TrackingQuery { .. }));

        // Well-formed terminal statuses pass through unchanged.
        let filled = SettlementStatus::Filled { receipt: "0xdeadbeef".into() };
        assert_eq!(check_status_detail(&handle, filled.clone()).unwrap(), filled);
        assert_eq!(
            check_status_detail(&handle, SettlementStatus::Pending).unwrap(),
            SettlementStatus::Pending
        );
    }

    #[test]
    fn test_base_url_trailing_slash_normalized() {
        let config = OrchestratorConfig {
            base_url: "https://orchestrator.example.com/".into(),
            api_key: "k".into(),
            request_timeout_secs: 5,
        };
        let client = OrchestratorClient::new(&config).unwrap();
        assert_eq!(
            client.intents_url(),
            "https://orchestrator.example.com/v1/intents"
        );
        assert_eq!(
            client.status_url(&ExecutionHandle("h-1".into())),
            "https://orchestrator.example.com/v1/intents/h-1"
        );
    }
}
