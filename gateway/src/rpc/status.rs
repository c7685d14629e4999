//! RPC status codes and the error value returned by a failed call.
//!
//! A failed call is reported to the HTTP caller as one flat JSON object:
//!
//! ```text
//! {"code": 12, "details": "Unimplemented", ...extra fields}
//! ```
//!
//! `code` is not restricted to the canonical gRPC range; services may raise
//! their own codes (e.g. `20000`) and those are passed through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tonic::metadata::KeyAndValueRef;

/// gRPC status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl StatusCode {
    /// Map a raw code back to a canonical status, if it is one.
    pub fn from_i32(code: i32) -> Option<Self> {
        let status = match code {
            0 => Self::Ok,
            1 => Self::Cancelled,
            2 => Self::Unknown,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound,
            6 => Self::AlreadyExists,
            7 => Self::PermissionDenied,
            8 => Self::ResourceExhausted,
            9 => Self::FailedPrecondition,
            10 => Self::Aborted,
            11 => Self::OutOfRange,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            15 => Self::DataLoss,
            16 => Self::Unauthenticated,
            _ => return None,
        };
        Some(status)
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<tonic::Code> for StatusCode {
    fn from(code: tonic::Code) -> Self {
        Self::from_i32(code as i32).unwrap_or(Self::Unknown)
    }
}

/// Error produced by a remote (or in-process) procedure call.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("rpc error {code}: {details}")]
pub struct RpcError {
    code: i32,
    details: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl RpcError {
    /// Create an error with a raw code.
    pub fn new(code: i32, details: impl Into<String>) -> Self {
        Self {
            code,
            details: details.into(),
            extra: Map::new(),
        }
    }

    /// Create an error with a canonical status code.
    pub fn status(status: StatusCode, details: impl Into<String>) -> Self {
        Self::new(status.as_i32(), details)
    }

    pub fn unimplemented() -> Self {
        Self::status(StatusCode::Unimplemented, "Unimplemented")
    }

    pub fn deadline_exceeded() -> Self {
        Self::status(StatusCode::DeadlineExceeded, "Deadline Exceeded")
    }

    pub fn invalid_argument(details: impl Into<String>) -> Self {
        Self::status(StatusCode::InvalidArgument, details)
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::status(StatusCode::Internal, details)
    }

    /// Attach an implementation-specific field.
    ///
    /// `code` and `details` are reserved and cannot be overwritten this way.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if key != "code" && key != "details" {
            self.extra.insert(key, value);
        }
        self
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    /// The canonical status for this error, `None` for custom codes.
    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_i32(self.code)
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// Response headers tonic reports as status metadata that belong to the transport.
const TRANSPORT_HEADERS: &[&str] = &["content-type", "content-length", "date", "te", "user-agent"];

impl From<tonic::Status> for RpcError {
    /// Convert an upstream status.
    ///
    /// The wire only carries canonical codes, so an upstream that needs a
    /// custom code sends a JSON object in the status details:
    /// `{"code": 20000, ...extra fields}`. Binary metadata is dropped.
    fn from(status: tonic::Status) -> Self {
        let mut error = Self::new(status.code() as i32, status.message());

        if let Ok(Value::Object(details)) = serde_json::from_slice::<Value>(status.details()) {
            for (key, value) in details {
                match (key.as_str(), value.as_i64()) {
                    ("code", Some(code)) => {
                        if let Ok(code) = i32::try_from(code) {
                            error.code = code;
                        }
                    }
                    _ => error = error.with_field(key, value),
                }
            }
        }

        let metadata: Map<String, Value> = status
            .metadata()
            .iter()
            .filter_map(|entry| match entry {
                KeyAndValueRef::Ascii(key, value) => {
                    let key = key.as_str();
                    if key.starts_with("grpc-") || TRANSPORT_HEADERS.contains(&key) {
                        return None;
                    }
                    value
                        .to_str()
                        .ok()
                        .map(|v| (key.to_string(), Value::String(v.to_string())))
                }
                KeyAndValueRef::Binary(_, _) => None,
            })
            .collect();

        if metadata.is_empty() {
            error
        } else {
            error.with_field("metadata", Value::Object(metadata))
        }
    }
}
