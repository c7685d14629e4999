//! Proxy assembly
//!
//! ```rust,ignore
//! let proxy = ProxyBuilder::new()
//!     .client_conf(ClientConf {
//!         descriptor_sets: vec!["helloworld.bin".into()],
//!         ..Default::default()
//!     })
//!     .debug(true)
//!     .build()
//!     .await?;
//! axum::serve(listener, proxy.into_router()).await?;
//! ```

use std::sync::Arc;

use axum::Router;

use crate::config::{ClientConf, ProxyConfig};
use crate::dispatch::{Dispatcher, StatusPolicy};
use crate::error::ProxyError;
use crate::router::{mount, proxy_routes, ProxyState};
use crate::rpc::grpc::GrpcClient;
use crate::rpc::RpcClient;

/// Builder for a [`Proxy`]
#[derive(Default)]
pub struct ProxyBuilder {
    router: Option<Router>,
    client: Option<Arc<dyn RpcClient>>,
    client_conf: Option<ClientConf>,
    mount_point: Option<String>,
    debug: bool,
    status_policy: StatusPolicy,
}

impl ProxyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preloaded from a [`ProxyConfig`].
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new()
            .client_conf(config.client.clone())
            .mount_point(config.mount_point.clone())
            .debug(config.debug)
            .status_policy(config.status_policy)
    }

    /// Mount the proxy routes into an existing router.
    pub fn http_router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Use an already constructed client. Takes precedence over `client_conf`.
    pub fn grpc_client(mut self, client: Arc<dyn RpcClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn client_conf(mut self, conf: ClientConf) -> Self {
        self.client_conf = Some(conf);
        self
    }

    /// Path prefix for the proxy routes, `/` by default.
    pub fn mount_point(mut self, mount_point: impl Into<String>) -> Self {
        self.mount_point = Some(mount_point.into());
        self
    }

    /// Debug default for requests that do not set `debug` themselves.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn status_policy(mut self, policy: StatusPolicy) -> Self {
        self.status_policy = policy;
        self
    }

    pub async fn build(self) -> Result<Proxy, ProxyError> {
        let client = match (self.client, self.client_conf) {
            (Some(client), _) => client,
            (None, Some(conf)) => connect(&conf).await?,
            (None, None) => {
                return Err(ProxyError::Config(
                    "either a client or a client configuration is required".to_string(),
                ))
            }
        };

        let dispatcher = Dispatcher::new(client.clone()).with_status_policy(self.status_policy);
        let state = Arc::new(ProxyState::new(dispatcher, self.debug));
        let router = mount(
            self.router.unwrap_or_default(),
            self.mount_point.as_deref().unwrap_or("/"),
            proxy_routes(state),
        );

        Ok(Proxy { router, client })
    }
}

async fn connect(conf: &ClientConf) -> Result<Arc<dyn RpcClient>, ProxyError> {
    let client = if conf.reflection {
        GrpcClient::connect(conf).await?
    } else {
        GrpcClient::from_conf(conf)?
    };
    tracing::info!(
        "gRPC client for {} with services: {}",
        client.target(),
        client.registry().service_names().join(", ")
    );
    Ok(Arc::new(client))
}

/// An assembled proxy: the HTTP router and the client it dispatches to.
pub struct Proxy {
    router: Router,
    client: Arc<dyn RpcClient>,
}

impl Proxy {
    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    pub fn client(&self) -> &Arc<dyn RpcClient> {
        &self.client
    }
}
