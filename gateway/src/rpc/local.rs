//! In-process RPC binding
//!
//! Services are plain async closures registered by name, so the proxy can
//! front Rust code living in the same process without any network hop.
//!
//! ```rust,ignore
//! use proxy_lib::rpc::local::LocalServiceBuilder;
//! use proxy_lib::rpc::ServiceRegistry;
//!
//! let greeter = LocalServiceBuilder::new("helloworld.Greeter")
//!     .method("sayHello", |call| async move {
//!         let name = call.args["name"].as_str().unwrap_or_default().to_string();
//!         Ok(serde_json::json!({ "message": format!("Hello {}", name) }))
//!     })
//!     .build();
//! let client = ServiceRegistry::new().with_service(greeter);
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{CallDescriptor, RpcError, Service, UnaryMethod};

/// Method backed by an async closure.
pub struct FnMethod<F> {
    handler: F,
}

#[async_trait]
impl<F, Fut> UnaryMethod for FnMethod<F>
where
    F: Fn(CallDescriptor) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
{
    async fn call(&self, call: CallDescriptor) -> Result<Value, RpcError> {
        (self.handler)(call).await
    }
}

/// Wrap an async closure as a method handle.
pub fn fn_method<F, Fut>(handler: F) -> Arc<dyn UnaryMethod>
where
    F: Fn(CallDescriptor) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
{
    Arc::new(FnMethod { handler })
}

/// Builder for an in-process service.
pub struct LocalServiceBuilder {
    service: Service,
}

impl LocalServiceBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            service: Service::new(name),
        }
    }

    /// Register a handler for a method name
    pub fn method<F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(CallDescriptor) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
    {
        self.service.insert(name, fn_method(handler));
        self
    }

    pub fn build(self) -> Service {
        self.service
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{RpcClient, ServiceRegistry};
    use serde_json::json;

    fn greeter() -> ServiceRegistry {
        let service = LocalServiceBuilder::new("helloworld.Greeter")
            .method("sayHello", |call| async move {
                let name = call.args["name"].as_str().unwrap_or_default().to_string();
                Ok(json!({ "message": format!("Hello {}", name) }))
            })
            .method("fail", |_call| async move {
                Err(RpcError::new(20000, "custom message"))
            })
            .build();
        ServiceRegistry::new().with_service(service)
    }

    #[tokio::test]
    async fn test_local_method_success() {
        let client = greeter();
        let service = client.get_service("helloworld.Greeter").unwrap();
        let result = service
            .method("sayHello")
            .unwrap()
            .call(CallDescriptor::new(json!({"name": "Alice"})))
            .await
            .unwrap();
        assert_eq!(result, json!({"message": "Hello Alice"}));
    }

    #[tokio::test]
    async fn test_local_method_error() {
        let client = greeter();
        let service = client.get_service("helloworld.Greeter").unwrap();
        let err = service
            .method("fail")
            .unwrap()
            .call(CallDescriptor::new(Value::Null))
            .await
            .unwrap_err();
        assert_eq!(err.code(), 20000);
        assert_eq!(err.details(), "custom message");
    }

    #[test]
    fn test_builder_replaces_duplicate_names() {
        let service = LocalServiceBuilder::new("svc")
            .method("a", |_call| async move { Ok(json!(1)) })
            .method("a", |_call| async move { Ok(json!(2)) })
            .build();
        assert_eq!(service.method_names(), vec!["a"]);
    }
}
