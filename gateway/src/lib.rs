//! HTTP to gRPC proxy library
//!
//! Exposes unary RPC methods as `POST /proxy/:service/:method` JSON endpoints.
//! The request body carries `{args, metadata?, callOpts?, debug?}`; the reply
//! is `{result}` on success or `{error: {code, details, ...}}` on failure.

pub mod builder;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod request;
pub mod router;
pub mod rpc;

pub use builder::{Proxy, ProxyBuilder};
pub use config::{ClientConf, ProxyConfig};
pub use dispatch::{
    Dispatcher, ProxyRequest, ProxyResponse, RequestContext, RequestIds, ResponseEnvelope,
    StatusPolicy,
};
pub use error::ProxyError;
pub use request::ProxyBody;
pub use router::{mount, proxy_routes, ProxyState};
pub use rpc::grpc::{GrpcClient, JsonOptions};
pub use rpc::local::LocalServiceBuilder;
pub use rpc::{
    CallDescriptor, CallOptions, RpcClient, RpcError, Service, ServiceRegistry, StatusCode,
    UnaryMethod,
};
