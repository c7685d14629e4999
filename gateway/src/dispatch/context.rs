//! Per-request context.

use std::sync::atomic::{AtomicU64, Ordering};

/// Correlation id and effective debug flag for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: u64,
    pub debug: bool,
}

impl RequestContext {
    pub fn new(request_id: u64, debug: bool) -> Self {
        Self { request_id, debug }
    }
}

/// Monotonically increasing request ids, owned by the hosting server.
#[derive(Debug, Default)]
pub struct RequestIds {
    last: AtomicU64,
}

impl RequestIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id, starting at 1.
    pub fn next_id(&self) -> u64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Context for a new request.
    ///
    /// A per-request `debug` value overrides `default_debug`.
    pub fn context(&self, debug: Option<bool>, default_debug: bool) -> RequestContext {
        RequestContext::new(self.next_id(), debug.unwrap_or(default_debug))
    }
}
