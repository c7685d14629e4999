//! Call descriptor handed to every RPC method.
//!
//! A call always has three slots: `args`, `metadata` and `call_opts`. How the
//! absent slots reach the wire is up to the binding; [`CallDescriptor::positional`]
//! gives the positional form expected by stub layers that are overloaded by arity.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::DateTime;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::status::RpcError;

/// Arguments of a single unary call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallDescriptor {
    pub args: Value,
    pub metadata: Option<Value>,
    pub call_opts: Option<Value>,
}

impl CallDescriptor {
    /// A call with arguments only.
    pub fn new(args: Value) -> Self {
        Self {
            args,
            metadata: None,
            call_opts: None,
        }
    }

    /// Build a call from the raw request slots.
    ///
    /// `null`, `false`, `0` and `""` count as absent. When call options are
    /// present the metadata slot is always filled, defaulting to `{}`; without
    /// call options the metadata slot is kept as given, so a present-but-empty
    /// `{}` is still passed along.
    pub fn from_request(
        args: Option<Value>,
        metadata: Option<Value>,
        call_opts: Option<Value>,
    ) -> Self {
        let call_opts = call_opts.filter(is_present);
        let metadata = metadata.filter(is_present);
        let metadata = match (&call_opts, metadata) {
            (Some(_), None) => Some(Value::Object(Map::new())),
            (_, metadata) => metadata,
        };

        Self {
            args: args.unwrap_or(Value::Null),
            metadata,
            call_opts,
        }
    }

    /// Positional arguments with trailing absent slots dropped.
    pub fn positional(&self) -> Vec<Value> {
        let mut slots = vec![self.args.clone()];
        match (&self.metadata, &self.call_opts) {
            (metadata, Some(call_opts)) => {
                slots.push(
                    metadata
                        .clone()
                        .unwrap_or_else(|| Value::Object(Map::new())),
                );
                slots.push(call_opts.clone());
            }
            (Some(metadata), None) => slots.push(metadata.clone()),
            (None, None) => {}
        }
        slots
    }

    /// Number of positional arguments the call is made with.
    pub fn arity(&self) -> usize {
        match (&self.metadata, &self.call_opts) {
            (_, Some(_)) => 3,
            (Some(_), None) => 2,
            (None, None) => 1,
        }
    }

    pub fn options(&self) -> Result<CallOptions, RpcError> {
        CallOptions::from_value(self.call_opts.as_ref())
    }
}

/// JSON truthiness as the HTTP clients of this proxy understand it.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Typed view of the `call_opts` slot.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CallOptions {
    #[serde(default)]
    pub deadline: Option<Deadline>,
}

/// Absolute call deadline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Deadline {
    /// Milliseconds since the Unix epoch.
    EpochMillis(f64),
    /// RFC 3339 timestamp.
    Timestamp(String),
}

impl CallOptions {
    pub fn from_value(value: Option<&Value>) -> Result<Self, RpcError> {
        match value {
            None => Ok(Self::default()),
            Some(value) => Self::deserialize(value)
                .map_err(|e| RpcError::invalid_argument(format!("Invalid callOpts: {}", e))),
        }
    }

    /// Time left before the deadline, measured from `now`.
    ///
    /// Returns `Ok(None)` when there is no deadline and `Duration::ZERO` once
    /// it has passed.
    pub fn remaining(&self, now: SystemTime) -> Result<Option<Duration>, RpcError> {
        let Some(deadline) = &self.deadline else {
            return Ok(None);
        };

        let deadline_ms = match deadline {
            Deadline::EpochMillis(ms) => *ms,
            Deadline::Timestamp(text) => DateTime::parse_from_rfc3339(text)
                .map_err(|e| {
                    RpcError::invalid_argument(format!("Invalid deadline {:?}: {}", text, e))
                })?
                .timestamp_millis() as f64,
        };
        let now_ms = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0);

        let left_ms = deadline_ms - now_ms;
        if !(left_ms > 0.0) {
            return Ok(Some(Duration::ZERO));
        }
        Ok(Duration::try_from_secs_f64(left_ms / 1000.0).ok())
    }
}
