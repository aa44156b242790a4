//! # JSON-RPC Envelope
//!
//! Wire types for talking to nodes over JSON-RPC 2.0. Method names are
//! prefixed with `meridian_` so a node can host them next to other services.
//!
//! ## Method Index
//!
//! | Method                        | Params                        | Result         |
//! |-------------------------------|-------------------------------|----------------|
//! | `meridian_submitTransaction`  | `SignedTransaction`           | `WireResponse` |
//! | `meridian_getReceipt`         | `{ "transaction_id": "..." }` | `WireResponse` |
//! | `meridian_getRecord`          | `{ "transaction_id": "..." }` | `WireResponse` |
//!
//! Precheck rejections are *results*, not RPC errors: a node that says
//! `BUSY` answers successfully with `{"precheck": 12}`. RPC errors are
//! reserved for malformed calls.

use serde::{Deserialize, Serialize};

use super::channel::WireRequest;

/// Supported JSON-RPC methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcMethod {
    #[serde(rename = "meridian_submitTransaction")]
    SubmitTransaction,
    #[serde(rename = "meridian_getReceipt")]
    GetReceipt,
    #[serde(rename = "meridian_getRecord")]
    GetRecord,
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Always "2.0".
    pub jsonrpc: String,
    /// Echoed back in the response.
    pub id: u64,
    pub method: RpcMethod,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: RpcMethod, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method,
            params,
        }
    }

    /// Wraps a wire request.
    pub fn from_wire(id: u64, request: &WireRequest) -> Result<Self, serde_json::Error> {
        let (method, params) = match request {
            WireRequest::SubmitTransaction(signed) => {
                (RpcMethod::SubmitTransaction, serde_json::to_value(signed)?)
            }
            WireRequest::GetReceipt { transaction_id } => (
                RpcMethod::GetReceipt,
                serde_json::json!({ "transaction_id": transaction_id }),
            ),
            WireRequest::GetRecord { transaction_id } => (
                RpcMethod::GetRecord,
                serde_json::json!({ "transaction_id": transaction_id }),
            ),
        };
        Ok(Self::new(id, method, params))
    }

    /// Unwraps back into a wire request. Used by node-side handlers and fakes.
    pub fn into_wire(self) -> Result<WireRequest, serde_json::Error> {
        #[derive(Deserialize)]
        struct ById {
            transaction_id: crate::identity::TransactionId,
        }

        Ok(match self.method {
            RpcMethod::SubmitTransaction => {
                WireRequest::SubmitTransaction(serde_json::from_value(self.params)?)
            }
            RpcMethod::GetReceipt => WireRequest::GetReceipt {
                transaction_id: serde_json::from_value::<ById>(self.params)?.transaction_id,
            },
            RpcMethod::GetRecord => WireRequest::GetRecord {
                transaction_id: serde_json::from_value::<ById>(self.params)?.transaction_id,
            },
        })
    }
}

/// A JSON-RPC 2.0 response. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: u64, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: u64, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC 2.0 error object.
///
/// Nodes may answer with any standard code; the two constructors below
/// cover what a node reports about a well-formed call:
///
/// - `-32602`: invalid params
/// - `-32603`: internal error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: msg.into(),
        }
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self {
            code: -32603,
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{EntityId, Timestamp, TransactionId};

    fn txid() -> TransactionId {
        TransactionId::with_valid_start(EntityId::from_num(1001), Timestamp::new(1_700_000_000, 5))
    }

    #[test]
    fn receipt_request_wire_format() {
        let req = RpcRequest::from_wire(7, &WireRequest::GetReceipt { transaction_id: txid() }).unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["method"], "meridian_getReceipt");
        assert_eq!(json["params"]["transaction_id"], "0.0.1001@1700000000.000000005");
        assert_eq!(json["id"], 7);
    }

    #[test]
    fn request_round_trips_through_wire() {
        let wire = WireRequest::GetRecord { transaction_id: txid() };
        let req = RpcRequest::from_wire(1, &wire).unwrap();
        let text = serde_json::to_string(&req).unwrap();
        let back: RpcRequest = serde_json::from_str(&text).unwrap();
        assert_eq!(back.into_wire().unwrap(), wire);
    }

    #[test]
    fn error_response_shape() {
        let resp = RpcResponse::error(1, RpcError::internal_error("ledger offline"));
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("result").is_none());
        assert_eq!(json["error"]["code"], -32603);
    }

    #[test]
    fn error_codes_are_correct() {
        assert_eq!(RpcError::invalid_params("").code, -32602);
        assert_eq!(RpcError::internal_error("").code, -32603);
    }

    #[test]
    fn unknown_method_fails_to_parse() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"method":"meridian_nope","params":{}}"#;
        assert!(serde_json::from_str::<RpcRequest>(raw).is_err());
    }
}
