//! Dynamic gRPC binding
//!
//! Builds a [`ServiceRegistry`] from protobuf descriptors and invokes unary
//! methods over a shared tonic [`Channel`]. Requests and replies are converted
//! between JSON and protobuf at call time, so no generated code is needed.
//!
//! Methods are registered under the lower camel case form of their name
//! (`SayHello` becomes `sayHello`), which is the convention of generated
//! client stubs.

pub mod codec;
pub mod descriptors;
pub mod json;
pub mod metadata;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use http::uri::PathAndQuery;
use prost_reflect::{DescriptorPool, MethodDescriptor};
use serde_json::Value;
use tonic::transport::{Channel, Endpoint};

use crate::config::ClientConf;
use crate::dispatch::naming::to_lower_camel;
use crate::error::ProxyError;
use crate::rpc::{
    CallDescriptor, RpcClient, RpcError, Service, ServiceRegistry, StatusCode, UnaryMethod,
};

pub use codec::DynamicCodec;
pub use json::JsonOptions;

/// gRPC client exposing every unary method found in its descriptors.
#[derive(Debug)]
pub struct GrpcClient {
    target: String,
    registry: ServiceRegistry,
}

impl GrpcClient {
    /// Build a client from descriptor set files.
    ///
    /// The channel connects lazily, so this does not wait for the upstream.
    /// It must be called from within a tokio runtime.
    pub fn from_conf(conf: &ClientConf) -> Result<Self, ProxyError> {
        if conf.reflection {
            return Err(ProxyError::Config(
                "server reflection requires GrpcClient::connect".to_string(),
            ));
        }
        let pool = descriptors::load_descriptor_sets(&conf.descriptor_sets)?;
        let channel = open_channel(conf)?;
        Self::from_pool(channel, &pool, conf)
    }

    /// Build a client, fetching descriptors over server reflection when enabled.
    pub async fn connect(conf: &ClientConf) -> Result<Self, ProxyError> {
        let mut pool = descriptors::load_descriptor_sets(&conf.descriptor_sets)?;
        let channel = open_channel(conf)?;
        if conf.reflection {
            descriptors::fetch_with_reflection(channel.clone(), &mut pool).await?;
        }
        Self::from_pool(channel, &pool, conf)
    }

    /// Build a client from an already loaded descriptor pool.
    pub fn from_pool(
        channel: Channel,
        pool: &DescriptorPool,
        conf: &ClientConf,
    ) -> Result<Self, ProxyError> {
        let mut registry = ServiceRegistry::new();

        for service in pool.services() {
            let name = service.full_name();
            if !conf.services.is_empty() && !conf.services.iter().any(|s| s == name) {
                continue;
            }

            let mut entry = Service::new(name);
            for method in service.methods() {
                if method.is_client_streaming() || method.is_server_streaming() {
                    tracing::debug!("Skipping streaming method {}", method.full_name());
                    continue;
                }
                let handle =
                    DynamicMethod::new(channel.clone(), method.clone(), conf.json.clone())?;
                entry.insert(to_lower_camel(method.name()), Arc::new(handle));
            }
            tracing::debug!("Registered {:?}", entry);
            registry.register(entry);
        }

        for wanted in &conf.services {
            if registry.get_service(wanted).is_none() {
                tracing::warn!("Service {} not found in descriptors", wanted);
            }
        }
        if registry.is_empty() {
            tracing::warn!("No services available for {}", conf.target);
        }

        Ok(Self {
            target: conf.target.clone(),
            registry,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }
}

impl RpcClient for GrpcClient {
    fn get_service(&self, name: &str) -> Option<Arc<Service>> {
        self.registry.get_service(name)
    }
}

/// Open a lazily connected channel to the configured target.
///
/// Targets without a scheme (`localhost:50051`) are treated as plain HTTP/2.
pub fn open_channel(conf: &ClientConf) -> Result<Channel, ProxyError> {
    let uri = if conf.target.contains("://") {
        conf.target.clone()
    } else {
        format!("http://{}", conf.target)
    };

    let endpoint = Endpoint::from_shared(uri)
        .map_err(|e| ProxyError::InvalidTarget(format!("{}: {}", conf.target, e)))?
        .connect_timeout(Duration::from_secs(conf.connect_timeout_secs));
    Ok(endpoint.connect_lazy())
}

/// A unary method invoked through a dynamic codec.
pub struct DynamicMethod {
    channel: Channel,
    method: MethodDescriptor,
    path: PathAndQuery,
    json: JsonOptions,
}

impl DynamicMethod {
    pub fn new(
        channel: Channel,
        method: MethodDescriptor,
        json: JsonOptions,
    ) -> Result<Self, ProxyError> {
        let path = format!("/{}/{}", method.parent_service().full_name(), method.name())
            .parse::<PathAndQuery>()
            .map_err(|e| ProxyError::Descriptor(format!("{}: {}", method.full_name(), e)))?;
        Ok(Self {
            channel,
            method,
            path,
            json,
        })
    }

    pub fn path(&self) -> &str {
        self.path.as_str()
    }
}

#[async_trait]
impl UnaryMethod for DynamicMethod {
    async fn call(&self, call: CallDescriptor) -> Result<Value, RpcError> {
        let timeout = match call.options()?.remaining(SystemTime::now())? {
            Some(left) if left.is_zero() => return Err(RpcError::deadline_exceeded()),
            other => other,
        };

        let message = self.json.decode(self.method.input(), call.args)?;
        let mut request = tonic::Request::new(message);
        if let Some(entries) = call.metadata.as_ref() {
            metadata::apply(entries, request.metadata_mut())?;
        }
        if let Some(timeout) = timeout {
            request.set_timeout(timeout);
        }

        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        let codec = DynamicCodec::new(self.method.output());
        let path = self.path.clone();
        let invoke = async move {
            grpc.ready().await.map_err(|e| {
                RpcError::status(StatusCode::Unavailable, format!("Service was not ready: {}", e))
            })?;
            grpc.unary(request, path, codec).await.map_err(RpcError::from)
        };

        let response = match timeout {
            Some(timeout) => tokio::time::timeout(timeout, invoke)
                .await
                .map_err(|_| RpcError::deadline_exceeded())??,
            None => invoke.await?,
        };

        self.json.encode(response.get_ref())
    }
}
