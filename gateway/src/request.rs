//! HTTP request body parsing
//!
//! Accepts `application/json` and `application/x-www-form-urlencoded`
//! bodies of the shape `{args, metadata?, callOpts?, debug?}`. Other content
//! types are read as JSON. An empty body is treated as `{}`.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::dispatch::ProxyRequest;
use crate::rpc::call::is_present;
use crate::rpc::RpcError;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Parsed proxy request body
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProxyBody {
    #[serde(default)]
    pub args: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default, rename = "callOpts")]
    pub call_opts: Option<Value>,
    #[serde(default)]
    pub debug: Option<Value>,
}

impl ProxyBody {
    /// Parse a body according to its content type.
    pub fn parse(content_type: Option<&str>, bytes: &[u8]) -> Result<Self, RpcError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let value = if is_form(content_type) {
            parse_form(bytes)
        } else {
            serde_json::from_slice::<Value>(bytes)
                .map_err(|e| RpcError::invalid_argument(format!("Invalid JSON body: {}", e)))?
        };

        if !value.is_object() {
            return Err(RpcError::invalid_argument(
                "Request body must be a JSON object",
            ));
        }
        serde_json::from_value(value)
            .map_err(|e| RpcError::invalid_argument(format!("Invalid request body: {}", e)))
    }

    /// Per-request debug override, if the body carried one.
    pub fn debug_flag(&self) -> Option<bool> {
        self.debug.as_ref().map(is_present)
    }

    pub fn into_request(
        self,
        service_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> ProxyRequest {
        ProxyRequest {
            service_name: service_name.into(),
            method_name: method_name.into(),
            args: self.args,
            metadata: self.metadata,
            call_opts: self.call_opts,
        }
    }
}

fn is_form(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

/// Each field is read as JSON when it parses, otherwise kept as a string.
/// A repeated key keeps its last value.
fn parse_form(bytes: &[u8]) -> Value {
    let fields: Map<String, Value> = url::form_urlencoded::parse(bytes)
        .map(|(key, value)| {
            let parsed = serde_json::from_str(&value)
                .unwrap_or_else(|_| Value::String(value.clone().into_owned()));
            (key.into_owned(), parsed)
        })
        .collect();
    Value::Object(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json() {
        let body = ProxyBody::parse(
            Some("application/json"),
            br#"{"args":{"name":"Alice"},"metadata":{"x-id":"1"},"callOpts":{"deadline":0},"debug":true}"#,
        )
        .unwrap();
        assert_eq!(body.args, Some(json!({"name": "Alice"})));
        assert_eq!(body.metadata, Some(json!({"x-id": "1"})));
        assert_eq!(body.call_opts, Some(json!({"deadline": 0})));
        assert_eq!(body.debug_flag(), Some(true));
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(ProxyBody::parse(None, b"").unwrap(), ProxyBody::default());
        assert_eq!(
            ProxyBody::parse(Some("application/json"), b"  \n").unwrap(),
            ProxyBody::default()
        );
    }

    #[test]
    fn test_unknown_content_type_is_json() {
        let body = ProxyBody::parse(Some("text/plain"), br#"{"args":{"a":1}}"#).unwrap();
        assert_eq!(body.args, Some(json!({"a": 1})));
    }

    #[test]
    fn test_parse_form() {
        let body = ProxyBody::parse(
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            b"args=%7B%22name%22%3A%22Alice%22%7D&metadata=plain+text&debug=false",
        )
        .unwrap();
        assert_eq!(body.args, Some(json!({"name": "Alice"})));
        assert_eq!(body.metadata, Some(json!("plain text")));
        assert_eq!(body.debug_flag(), Some(false));
        assert_eq!(body.call_opts, None);
    }

    #[test]
    fn test_invalid_json() {
        let err = ProxyBody::parse(Some("application/json"), b"{ not json").unwrap_err();
        assert_eq!(err.code(), 3);

        let err = ProxyBody::parse(Some("application/json"), b"[1, 2]").unwrap_err();
        assert_eq!(err.code(), 3);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let body = ProxyBody::parse(None, br#"{"args":{},"extra":1}"#).unwrap();
        assert_eq!(body.args, Some(json!({})));
    }

    #[test]
    fn test_into_request() {
        let body = ProxyBody::parse(None, br#"{"args":{"name":"A"},"debug":1}"#).unwrap();
        assert_eq!(body.debug_flag(), Some(true));
        let request = body.into_request("helloworld.Greeter", "sayHello");
        assert_eq!(request.service_name, "helloworld.Greeter");
        assert_eq!(request.args, Some(json!({"name": "A"})));
        assert_eq!(request.metadata, None);
    }
}
