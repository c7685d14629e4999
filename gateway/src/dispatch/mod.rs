//! Request dispatch
//!
//! Maps a `(service, method, args, metadata, callOpts)` request onto an
//! [`RpcClient`](crate::rpc::RpcClient) and produces the JSON response envelope.

pub mod context;
pub mod dispatcher;
pub mod naming;
pub mod response;

pub use context::{RequestContext, RequestIds};
pub use dispatcher::{resolve_method, Dispatcher, ProxyRequest};
pub use naming::to_lower_camel;
pub use response::{ProxyResponse, ResponseEnvelope, StatusPolicy};
