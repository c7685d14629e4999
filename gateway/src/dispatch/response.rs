//! Response envelope and HTTP status mapping.

use std::str::FromStr;

use axum::http::{header, StatusCode as HttpStatus};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProxyError;
use crate::rpc::{RpcError, StatusCode};

/// Body used when the envelope itself cannot be serialized.
const FALLBACK_BODY: &[u8] = br#"{"error":{"code":13,"details":"Internal"}}"#;

/// JSON body of a proxy response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    Success { result: Value },
    Failure { error: RpcError },
}

/// How failures are mapped to HTTP status codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPolicy {
    /// Every failure is a 500
    #[default]
    Compat,
    /// Canonical gRPC codes map to their closest HTTP status
    Mapped,
}

impl StatusPolicy {
    pub fn status_for(self, code: i32) -> HttpStatus {
        if self == Self::Compat {
            return HttpStatus::INTERNAL_SERVER_ERROR;
        }
        match StatusCode::from_i32(code) {
            Some(
                StatusCode::InvalidArgument
                | StatusCode::FailedPrecondition
                | StatusCode::OutOfRange,
            ) => HttpStatus::BAD_REQUEST,
            Some(StatusCode::Unauthenticated) => HttpStatus::UNAUTHORIZED,
            Some(StatusCode::PermissionDenied) => HttpStatus::FORBIDDEN,
            Some(StatusCode::NotFound) => HttpStatus::NOT_FOUND,
            Some(StatusCode::AlreadyExists | StatusCode::Aborted) => HttpStatus::CONFLICT,
            Some(StatusCode::ResourceExhausted) => HttpStatus::TOO_MANY_REQUESTS,
            Some(StatusCode::Cancelled) => {
                HttpStatus::from_u16(499).unwrap_or(HttpStatus::INTERNAL_SERVER_ERROR)
            }
            Some(StatusCode::Unimplemented) => HttpStatus::NOT_IMPLEMENTED,
            Some(StatusCode::Unavailable) => HttpStatus::SERVICE_UNAVAILABLE,
            Some(StatusCode::DeadlineExceeded) => HttpStatus::GATEWAY_TIMEOUT,
            _ => HttpStatus::INTERNAL_SERVER_ERROR,
        }
    }
}

impl FromStr for StatusPolicy {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "compat" => Ok(Self::Compat),
            "mapped" => Ok(Self::Mapped),
            other => Err(ProxyError::Config(format!(
                "Unknown status policy {:?} (expected compat or mapped)",
                other
            ))),
        }
    }
}

/// Status code and body produced for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyResponse {
    pub status: HttpStatus,
    pub body: ResponseEnvelope,
}

impl ProxyResponse {
    pub fn success(result: Value) -> Self {
        Self {
            status: HttpStatus::OK,
            body: ResponseEnvelope::Success { result },
        }
    }

    pub fn failure(error: RpcError, policy: StatusPolicy) -> Self {
        Self {
            status: policy.status_for(error.code()),
            body: ResponseEnvelope::Failure { error },
        }
    }

    pub fn to_json_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&self.body).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize response: {}", e);
            FALLBACK_BODY.to_vec()
        })
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let body = self.to_json_bytes();
        (
            self.status,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}
