//! RPC client layer
//!
//! The dispatcher only needs one capability from an RPC client: given a
//! service name, hand back a table of invocable methods. [`RpcClient`] is that
//! seam. Two bindings ship with the crate:
//!
//! - [`local`]: services registered as in-process async closures
//! - [`grpc`]: dynamic gRPC calls over tonic, built from protobuf descriptors

pub mod call;
pub mod grpc;
pub mod local;
pub mod status;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use call::{CallDescriptor, CallOptions, Deadline};
pub use status::{RpcError, StatusCode};

/// A single invocable unary procedure.
#[async_trait]
pub trait UnaryMethod: Send + Sync {
    async fn call(&self, call: CallDescriptor) -> Result<Value, RpcError>;
}

/// Source of services, shared by every in-flight request.
pub trait RpcClient: Send + Sync {
    fn get_service(&self, name: &str) -> Option<Arc<Service>>;
}

/// A named group of methods.
pub struct Service {
    name: String,
    methods: HashMap<String, Arc<dyn UnaryMethod>>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a method, replacing any previous one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, method: Arc<dyn UnaryMethod>) {
        self.methods.insert(name.into(), method);
    }

    /// Exact lookup by method name.
    pub fn method(&self, name: &str) -> Option<Arc<dyn UnaryMethod>> {
        self.methods.get(name).cloned()
    }

    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("methods", &self.method_names())
            .finish()
    }
}

/// Immutable-after-startup table of services.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: Service) {
        self.services
            .insert(service.name().to_string(), Arc::new(service));
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.register(service);
        self
    }

    pub fn service_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl RpcClient for ServiceRegistry {
    fn get_service(&self, name: &str) -> Option<Arc<Service>> {
        self.services.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::local::fn_method;
    use serde_json::json;

    #[tokio::test]
    async fn test_registry_lookup() {
        let mut service = Service::new("pkg.Echo");
        service.insert("echo", fn_method(|call: CallDescriptor| async move { Ok(call.args) }));
        let registry = ServiceRegistry::new().with_service(service);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.service_names(), vec!["pkg.Echo"]);
        assert!(registry.get_service("pkg.Missing").is_none());

        let service = registry.get_service("pkg.Echo").unwrap();
        assert_eq!(service.method_names(), vec!["echo"]);
        assert!(service.method("Echo").is_none());

        let result = service
            .method("echo")
            .unwrap()
            .call(CallDescriptor::new(json!({"a": 1})))
            .await
            .unwrap();
        assert_eq!(result, json!({"a": 1}));
    }
}
