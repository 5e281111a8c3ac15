//! Shared response cache with single-flight semantics
//!
//! Each URL key is in one of three states: absent, in flight, or ready.
//! The first checker to ask for an absent key receives a [`Claim`] and
//! performs the request; concurrent askers receive a receiver they can
//! await instead of issuing a duplicate request. A claim dropped without
//! completing wakes its waiters with a failure and frees the key so a
//! later check can retry.

use crate::checker::http::HttpResult;
use crate::link::HttpFailure;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// A completed transaction result, shared between every link that hit the
/// same URL
pub type SharedResult = Arc<HttpResult>;

type Waiter = watch::Receiver<Option<SharedResult>>;

enum Slot {
    InFlight(Waiter),
    Ready {
        stored_at: Instant,
        value: SharedResult,
    },
}

struct CacheInner {
    slots: Mutex<HashMap<String, Slot>>,
    max_age: Duration,
}

impl CacheInner {
    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What a checker should do for a given URL
pub enum Lookup {
    /// A fresh result exists; use it
    Ready(SharedResult),
    /// Another checker is fetching this URL; await its result
    Join(Waiter),
    /// Nobody is fetching; the caller holds the claim and must fetch
    Miss(Claim),
}

/// URL-keyed cache of transaction results
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<CacheInner>,
}

impl ResponseCache {
    pub fn new(max_age: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                slots: Mutex::new(HashMap::new()),
                max_age,
            }),
        }
    }

    /// Looks up a key, claiming it when absent or expired
    pub fn begin(&self, key: &str) -> Lookup {
        let mut slots = self.inner.slots();
        match slots.get(key) {
            Some(Slot::Ready { stored_at, value })
                if stored_at.elapsed() <= self.inner.max_age =>
            {
                Lookup::Ready(value.clone())
            }
            Some(Slot::InFlight(waiter)) => Lookup::Join(waiter.clone()),
            _ => {
                let (tx, rx) = watch::channel(None);
                slots.insert(key.to_string(), Slot::InFlight(rx));
                Lookup::Miss(Claim {
                    inner: self.inner.clone(),
                    key: key.to_string(),
                    tx,
                    done: false,
                })
            }
        }
    }

    /// Stores a result directly, bypassing the claim protocol.
    ///
    /// Used for page fetches, whose responses can satisfy later link
    /// checks of the same URL.
    pub fn insert_ready(&self, key: &str, value: HttpResult) {
        self.inner.slots().insert(
            key.to_string(),
            Slot::Ready {
                stored_at: Instant::now(),
                value: Arc::new(value),
            },
        );
    }

    /// Drops every stored and in-flight entry
    pub fn clear(&self) {
        self.inner.slots().clear();
    }
}

/// Exclusive right to fetch one URL on behalf of all current waiters
pub struct Claim {
    inner: Arc<CacheInner>,
    key: String,
    tx: watch::Sender<Option<SharedResult>>,
    done: bool,
}

impl Claim {
    /// Publishes the result to the cache and to all waiters
    pub fn complete(mut self, value: HttpResult) -> SharedResult {
        let shared = Arc::new(value);
        self.done = true;
        self.inner.slots().insert(
            self.key.clone(),
            Slot::Ready {
                stored_at: Instant::now(),
                value: shared.clone(),
            },
        );
        let _ = self.tx.send(Some(shared.clone()));
        shared
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if !self.done {
            self.inner.slots().remove(&self.key);
            let _ = self.tx.send(Some(Arc::new(Err(HttpFailure::abandoned()))));
        }
    }
}

/// Awaits the result of another checker's in-flight request
pub async fn join(mut waiter: Waiter) -> SharedResult {
    loop {
        let current = waiter.borrow().clone();
        if let Some(value) = current {
            return value;
        }
        if waiter.changed().await.is_err() {
            return Arc::new(Err(HttpFailure::abandoned()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::SimpleResponse;
    use url::Url;

    fn ok_result(status: u16) -> HttpResult {
        Ok(SimpleResponse {
            status,
            status_text: None,
            headers: vec![],
            url: Url::parse("https://example.com/").unwrap(),
            redirects: vec![],
        })
    }

    #[test]
    fn test_miss_then_ready() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let claim = match cache.begin("k") {
            Lookup::Miss(claim) => claim,
            _ => panic!("expected miss"),
        };
        claim.complete(ok_result(200));

        match cache.begin("k") {
            Lookup::Ready(value) => assert_eq!(value.as_ref().as_ref().unwrap().status, 200),
            _ => panic!("expected ready"),
        }
    }

    #[test]
    fn test_concurrent_begin_joins() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let _claim = match cache.begin("k") {
            Lookup::Miss(claim) => claim,
            _ => panic!("expected miss"),
        };
        assert!(matches!(cache.begin("k"), Lookup::Join(_)));
    }

    #[tokio::test]
    async fn test_abandoned_claim_wakes_waiters_with_failure() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let claim = match cache.begin("k") {
            Lookup::Miss(claim) => claim,
            _ => panic!("expected miss"),
        };
        let waiter = match cache.begin("k") {
            Lookup::Join(waiter) => waiter,
            _ => panic!("expected join"),
        };

        drop(claim);
        let result = join(waiter).await;
        assert!(result.is_err());
        // the key is free again
        assert!(matches!(cache.begin("k"), Lookup::Miss(_)));
    }

    #[tokio::test]
    async fn test_join_sees_completed_value() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let claim = match cache.begin("k") {
            Lookup::Miss(claim) => claim,
            _ => panic!("expected miss"),
        };
        let waiter = match cache.begin("k") {
            Lookup::Join(waiter) => waiter,
            _ => panic!("expected join"),
        };
        claim.complete(ok_result(204));
        assert_eq!(join(waiter).await.as_ref().as_ref().unwrap().status, 204);
    }

    #[test]
    fn test_expired_entry_is_reclaimed() {
        let cache = ResponseCache::new(Duration::from_millis(0));
        match cache.begin("k") {
            Lookup::Miss(claim) => {
                claim.complete(ok_result(200));
            }
            _ => panic!("expected miss"),
        }
        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(cache.begin("k"), Lookup::Miss(_)));
    }

    #[test]
    fn test_clear() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        if let Lookup::Miss(claim) = cache.begin("k") {
            claim.complete(ok_result(200));
        }
        cache.clear();
        assert!(matches!(cache.begin("k"), Lookup::Miss(_)));
    }
}
