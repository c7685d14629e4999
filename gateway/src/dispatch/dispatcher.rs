//! Request dispatcher
//!
//! Turns one proxy request into exactly one [`ProxyResponse`]:
//! resolve the service, resolve the method (retrying once with the
//! lower-camel form of the name), build the call and await it.
//! Nothing raised inside a dispatch escapes; a panic in a method is reported
//! as an `INTERNAL` error.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use serde_json::Value;
use tracing::Instrument;

use super::context::RequestContext;
use super::naming::to_lower_camel;
use super::response::{ProxyResponse, StatusPolicy};
use crate::rpc::{CallDescriptor, RpcClient, RpcError, Service, UnaryMethod};

/// One proxied call, as received from the HTTP layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxyRequest {
    pub service_name: String,
    pub method_name: String,
    pub args: Option<Value>,
    pub metadata: Option<Value>,
    pub call_opts: Option<Value>,
}

impl ProxyRequest {
    pub fn new(service_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            method_name: method_name.into(),
            ..Default::default()
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = Some(args);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_call_opts(mut self, call_opts: Value) -> Self {
        self.call_opts = Some(call_opts);
        self
    }
}

/// Dispatches proxy requests to an [`RpcClient`].
#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<dyn RpcClient>,
    policy: StatusPolicy,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn RpcClient>) -> Self {
        Self {
            client,
            policy: StatusPolicy::default(),
        }
    }

    pub fn with_status_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn client(&self) -> &Arc<dyn RpcClient> {
        &self.client
    }

    pub fn status_policy(&self) -> StatusPolicy {
        self.policy
    }

    /// Dispatch a single request.
    pub async fn dispatch(&self, ctx: &RequestContext, request: ProxyRequest) -> ProxyResponse {
        let span = tracing::info_span!(
            "proxy",
            request_id = ctx.request_id,
            service = %request.service_name,
            method = %request.method_name,
        );

        let outcome = AssertUnwindSafe(self.dispatch_inner(ctx, request))
            .catch_unwind()
            .instrument(span.clone())
            .await;

        match outcome {
            Ok(response) => response,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                span.in_scope(|| tracing::error!("Dispatch panicked: {}", message));
                ProxyResponse::failure(RpcError::internal(message), self.policy)
            }
        }
    }

    async fn dispatch_inner(&self, ctx: &RequestContext, request: ProxyRequest) -> ProxyResponse {
        let Some(service) = self.client.get_service(&request.service_name) else {
            if ctx.debug {
                tracing::info!("Unknown service");
            }
            return ProxyResponse::failure(RpcError::unimplemented(), self.policy);
        };

        let Some((method_name, method)) = resolve_method(&service, &request.method_name) else {
            if ctx.debug {
                tracing::info!("Unknown method");
            }
            return ProxyResponse::failure(RpcError::unimplemented(), self.policy);
        };

        let call = CallDescriptor::from_request(request.args, request.metadata, request.call_opts);
        if ctx.debug {
            let positional = Value::Array(call.positional());
            tracing::info!(
                "Calling {}.{} with {} argument(s): {}",
                service.name(),
                method_name,
                call.arity(),
                positional
            );
        }

        let started = Instant::now();
        let outcome = method.call(call).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(result) => {
                if ctx.debug {
                    tracing::info!(elapsed_ms, "Result: {}", result);
                }
                ProxyResponse::success(result)
            }
            Err(error) => {
                tracing::error!(
                    elapsed_ms,
                    code = error.code(),
                    "Call failed: {}",
                    error.details()
                );
                ProxyResponse::failure(error, self.policy)
            }
        }
    }
}

/// Look up a method by its exact name, then once more by its lower-camel form.
///
/// Returns the name the method was found under.
pub fn resolve_method(service: &Service, name: &str) -> Option<(String, Arc<dyn UnaryMethod>)> {
    if let Some(method) = service.method(name) {
        return Some((name.to_string(), method));
    }
    let normalized = to_lower_camel(name);
    if normalized == name {
        return None;
    }
    service.method(&normalized).map(|method| (normalized, method))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Internal".to_string()
    }
}
