//! HTTP JSON-RPC client for a remote aggregator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use otx_crypto::DataHash;
use otx_token::{Authenticator, InclusionProof, RequestId};

use crate::rpc::{
    GetInclusionProofParams, RpcError, RpcRequest, RpcResponse, SubmitCommitmentParams,
    SubmitCommitmentResult, METHOD_GET_INCLUSION_PROOF, METHOD_SUBMIT_COMMITMENT,
};
use crate::{AggregatorClient, AggregatorError, Result, SubmitCommitmentStatus};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Aggregator reached over HTTP(S) with JSON-RPC 2.0.
#[derive(Debug)]
pub struct JsonRpcAggregatorClient {
    url: String,
    api_key: Option<String>,
    client: Client,
    next_id: AtomicU64,
}

impl JsonRpcAggregatorClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_options(url, None, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Build a client with an optional bearer API key and a request timeout.
    pub fn with_options(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AggregatorError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            api_key,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<P: Serialize + Send + Sync, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> std::result::Result<R, CallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);
        debug!(method, id, url = %self.url, "aggregator call");

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        let parsed: RpcResponse<R> = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) if status == StatusCode::NOT_FOUND => {
                debug!(method, "aggregator answered HTTP 404");
                return Err(CallError::HttpNotFound);
            }
            Err(e) if !status.is_success() => {
                warn!(method, %status, "aggregator returned HTTP error");
                return Err(CallError::Aggregator(AggregatorError::Network(format!(
                    "HTTP {status}: {e}"
                ))));
            }
            Err(e) => {
                return Err(CallError::Aggregator(AggregatorError::InvalidResponse(
                    e.to_string(),
                )))
            }
        };
        match (parsed.result, parsed.error) {
            (_, Some(error)) => Err(CallError::Rpc(error)),
            (Some(result), None) => Ok(result),
            (None, None) => Err(CallError::Aggregator(AggregatorError::InvalidResponse(
                "response has neither result nor error".into(),
            ))),
        }
    }
}

enum CallError {
    Rpc(RpcError),
    /// Plain HTTP 404 without a JSON-RPC body.
    HttpNotFound,
    Aggregator(AggregatorError),
}

impl CallError {
    fn into_aggregator_error(self, request_id: &RequestId) -> AggregatorError {
        match self {
            CallError::HttpNotFound => AggregatorError::NotFound(*request_id),
            CallError::Rpc(e) if e.code == RpcError::NOT_FOUND => {
                AggregatorError::NotFound(*request_id)
            }
            CallError::Rpc(e) => AggregatorError::Rpc {
                code: e.code,
                message: e.message,
            },
            CallError::Aggregator(e) => e,
        }
    }
}

fn transport_error(e: reqwest::Error) -> CallError {
    if e.is_timeout() {
        CallError::Aggregator(AggregatorError::Timeout)
    } else {
        CallError::Aggregator(AggregatorError::Network(e.to_string()))
    }
}

#[async_trait]
impl AggregatorClient for JsonRpcAggregatorClient {
    async fn submit_commitment(
        &self,
        request_id: &RequestId,
        transaction_hash: &DataHash,
        authenticator: &Authenticator,
    ) -> Result<SubmitCommitmentStatus> {
        let params = SubmitCommitmentParams {
            request_id: *request_id,
            transaction_hash: *transaction_hash,
            authenticator: authenticator.clone(),
        };
        let result: SubmitCommitmentResult = self
            .call(METHOD_SUBMIT_COMMITMENT, params)
            .await
            .map_err(|e| match e {
                CallError::HttpNotFound => AggregatorError::InvalidResponse(format!(
                    "{} has no submission endpoint (HTTP 404)",
                    self.url
                )),
                e => e.into_aggregator_error(request_id),
            })?;
        debug!(request_id = %request_id, status = ?result.status, "commitment submitted");
        Ok(result.status)
    }

    async fn get_inclusion_proof(&self, request_id: &RequestId) -> Result<InclusionProof> {
        self.call(
            METHOD_GET_INCLUSION_PROOF,
            GetInclusionProofParams {
                request_id: *request_id,
            },
        )
        .await
        .map_err(|e| e.into_aggregator_error(request_id))
    }
}
