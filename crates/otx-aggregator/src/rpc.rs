//! JSON-RPC 2.0 envelope for the aggregator API.

use serde::{Deserialize, Serialize};

use otx_crypto::DataHash;
use otx_token::{Authenticator, RequestId};

use crate::SubmitCommitmentStatus;

/// Method registering a commitment.
pub const METHOD_SUBMIT_COMMITMENT: &str = "submit_commitment";
/// Method fetching an inclusion proof.
pub const METHOD_GET_INCLUSION_PROOF: &str = "get_inclusion_proof";

/// JSON-RPC request.
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcRequest<P> {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: P,
}

impl<P> RpcRequest<P> {
    pub fn new(id: u64, method: &str, params: P) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC response carrying either a result or an error.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "R: Serialize", deserialize = "R: Deserialize<'de>"))]
pub struct RpcResponse<R> {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<R>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    /// Unregistered or not yet certified request id.
    pub const NOT_FOUND: i32 = -32004;

    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "Parse error".to_string(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "Method not found".to_string(),
            data: Some(serde_json::json!({ "method": method })),
        }
    }

    pub fn invalid_params(detail: &str) -> Self {
        Self {
            code: -32602,
            message: "Invalid params".to_string(),
            data: Some(serde_json::json!({ "detail": detail })),
        }
    }

    pub fn not_found(request_id: &RequestId) -> Self {
        Self {
            code: Self::NOT_FOUND,
            message: "NOT_FOUND".to_string(),
            data: Some(serde_json::json!({ "requestId": request_id.to_hex() })),
        }
    }
}

/// Parameters of `submit_commitment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCommitmentParams {
    pub request_id: RequestId,
    pub transaction_hash: DataHash,
    pub authenticator: Authenticator,
}

/// Result of `submit_commitment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitCommitmentResult {
    pub status: SubmitCommitmentStatus,
}

/// Parameters of `get_inclusion_proof`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetInclusionProofParams {
    pub request_id: RequestId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use otx_crypto::HashAlgorithm;

    #[test]
    fn test_request_envelope() {
        let request_id =
            RequestId::create(&[1u8; 32], &DataHash::compute(HashAlgorithm::Sha256, b"s"));
        let req = RpcRequest::new(7, METHOD_GET_INCLUSION_PROOF, GetInclusionProofParams { request_id });
        let json = serde_json::to_value(&req).expect("json");
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["method"], "get_inclusion_proof");
        assert_eq!(json["params"]["requestId"], request_id.to_hex());
    }

    #[test]
    fn test_error_response_parses() {
        let text = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32004,"message":"NOT_FOUND"}}"#;
        let resp: RpcResponse<SubmitCommitmentResult> = serde_json::from_str(text).expect("parse");
        assert!(resp.result.is_none());
        assert_eq!(resp.error.expect("error").code, RpcError::NOT_FOUND);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(RpcError::parse_error().code, -32700);
        assert_eq!(RpcError::method_not_found("x").code, -32601);
        assert_eq!(RpcError::invalid_params("x").code, -32602);
    }
}
