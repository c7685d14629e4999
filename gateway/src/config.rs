use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dispatch::StatusPolicy;
use crate::error::ProxyError;
use crate::rpc::grpc::JsonOptions;

/// Proxy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// HTTP listen address
    pub http_addr: String,

    /// Path prefix the proxy routes are mounted under
    pub mount_point: String,

    /// Log arguments, results and timings for every request
    pub debug: bool,

    /// How failures map to HTTP status codes
    pub status_policy: StatusPolicy,

    /// Upstream gRPC client settings
    pub client: ClientConf,

    /// Service version
    #[serde(skip)]
    pub version: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            mount_point: "/".to_string(),
            debug: false,
            status_policy: StatusPolicy::default(),
            client: ClientConf::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Upstream gRPC client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConf {
    /// Upstream address, e.g. `http://localhost:50051` or `localhost:50051`
    pub target: String,

    /// Compiled FileDescriptorSet files describing the upstream services
    pub descriptor_sets: Vec<PathBuf>,

    /// Fetch descriptors from the upstream's reflection service
    pub reflection: bool,

    /// Only expose these fully-qualified services (all when empty)
    pub services: Vec<String>,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// JSON rendering of results
    pub json: JsonOptions,
}

impl Default for ClientConf {
    fn default() -> Self {
        Self {
            target: "http://[::1]:50051".to_string(),
            descriptor_sets: Vec::new(),
            reflection: false,
            services: Vec::new(),
            connect_timeout_secs: 5,
            json: JsonOptions::default(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration: the JSON file named by `PROXY_CONFIG` if set,
    /// then environment overrides.
    pub fn load() -> Result<Self, ProxyError> {
        let mut config = match std::env::var("PROXY_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ProxyError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Read configuration from a JSON file. Missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProxyError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ProxyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ProxyError::Config(format!("{}: {}", path.display(), e)))
    }

    fn apply_env(&mut self) -> Result<(), ProxyError> {
        if let Ok(addr) = std::env::var("PROXY_HTTP_ADDR") {
            self.http_addr = addr;
        }

        if let Ok(mount) = std::env::var("PROXY_MOUNT_POINT") {
            self.mount_point = mount;
        }

        if let Ok(debug) = std::env::var("PROXY_DEBUG") {
            self.debug = parse_bool(&debug);
        }

        if let Ok(policy) = std::env::var("PROXY_STATUS_POLICY") {
            self.status_policy = policy.parse()?;
        }

        if let Ok(target) = std::env::var("PROXY_GRPC_TARGET") {
            self.client.target = target;
        }

        if let Ok(paths) = std::env::var("PROXY_DESCRIPTOR_SETS") {
            self.client.descriptor_sets = split_list(&paths).map(PathBuf::from).collect();
        }

        if let Ok(reflection) = std::env::var("PROXY_REFLECTION") {
            self.client.reflection = parse_bool(&reflection);
        }

        if let Ok(services) = std::env::var("PROXY_SERVICES") {
            self.client.services = split_list(&services).map(String::from).collect();
        }

        if let Ok(timeout) = std::env::var("PROXY_CONNECT_TIMEOUT_SECS") {
            if let Ok(n) = timeout.parse() {
                self.client.connect_timeout_secs = n;
            }
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> bool {
    value.to_lowercase() == "true" || value == "1"
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}
