// ABOUTME: Per-request serialization
// ABOUTME: One async mutex per request id so concurrent transitions cannot validate against a stale status

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

/// A map of request id to an async mutex. Transition evaluation-and-apply
/// holds the request's mutex from status read to status write.
///
/// Entries are created on demand and kept for the process lifetime; a request
/// id is a few dozen bytes and the set of requests is small.
#[derive(Default)]
pub struct RequestLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RequestLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_request(&self, request_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("Request lock map mutex poisoned, recovering");
            poisoned.into_inner()
        });
        map.entry(request_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_id_yields_same_lock() {
        let locks = RequestLocks::new();
        let a = locks.for_request("r1");
        let b = locks.for_request("r1");
        assert!(Arc::ptr_eq(&a, &b));

        let other = locks.for_request("r2");
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[tokio::test]
    async fn lock_serializes_holders() {
        let locks = RequestLocks::new();
        let lock = locks.for_request("r1");
        let guard = lock.lock().await;
        assert!(locks.for_request("r1").try_lock().is_err());
        drop(guard);
        assert!(locks.for_request("r1").try_lock().is_ok());
    }
}
