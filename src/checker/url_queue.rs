//! The URL queue
//!
//! [`UrlChecker`] is the bottom checker layer: a queue of individual links
//! drained by a pump task that enforces the global socket limit, the
//! per-host socket limit and the rate limit. Results leave through an
//! event sink so higher layers can interpose without inheritance.

use crate::checker::cache::ResponseCache;
use crate::checker::events::CustomData;
use crate::checker::http;
use crate::checker::link_check::check_link;
use crate::config::CheckOptions;
use crate::link::Link;
use crate::ScourError;
use reqwest::Client;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::trace;
use url::Url;

/// Identifies one queued item for dequeueing and membership tests
pub type QueueId = u64;

/// Event emitted by the URL queue
#[derive(Debug)]
pub enum LinkEvent {
    /// A link finished checking
    Checked { link: Box<Link>, custom: CustomData },
    /// The queue went empty with no checks in flight
    Drained,
}

/// Consumer of queue events
pub type LinkSink = Arc<dyn Fn(LinkEvent) + Send + Sync>;

struct QueueItem {
    id: QueueId,
    link: Link,
    custom: CustomData,
    host: Option<String>,
}

struct QueueState {
    queue: VecDeque<QueueItem>,
    active: HashSet<QueueId>,
    active_hosts: HashMap<String, usize>,
    last_start: Option<Instant>,
    next_id: QueueId,
    paused: bool,
}

struct Shared {
    client: Client,
    cache: Option<ResponseCache>,
    options: CheckOptions,
    state: Mutex<QueueState>,
    wake: Notify,
    idle: watch::Sender<bool>,
    sink: LinkSink,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

enum Next {
    Item(QueueItem, Duration),
    Wait,
}

/// Rate-limited, host-aware queue of link checks
pub struct UrlChecker {
    shared: Arc<Shared>,
    pump: JoinHandle<()>,
}

impl UrlChecker {
    /// Creates a checker with its own HTTP client and, when caching is
    /// enabled, its own response cache
    pub fn new(options: CheckOptions, sink: LinkSink) -> Result<Self, ScourError> {
        let client = http::build_client(&options)?;
        let cache = options
            .cache_responses
            .then(|| ResponseCache::new(Duration::from_millis(options.cache_max_age_ms)));
        Ok(Self::with_parts(options, client, cache, sink))
    }

    /// Creates a checker around an existing client and cache, for layering
    pub fn with_parts(
        options: CheckOptions,
        client: Client,
        cache: Option<ResponseCache>,
        sink: LinkSink,
    ) -> Self {
        let shared = Arc::new(Shared {
            client,
            cache,
            options,
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                active: HashSet::new(),
                active_hosts: HashMap::new(),
                last_start: None,
                next_id: 0,
                paused: false,
            }),
            wake: Notify::new(),
            idle: watch::Sender::new(true),
            sink,
        });
        let pump = tokio::spawn(pump(shared.clone()));
        Self { shared, pump }
    }

    /// Creates a checker whose events arrive on a channel
    pub fn with_channel(
        options: CheckOptions,
    ) -> Result<(Self, mpsc::UnboundedReceiver<LinkEvent>), ScourError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink: LinkSink = Arc::new(move |event| {
            let _ = tx.send(event);
        });
        Ok((Self::new(options, sink)?, rx))
    }

    /// Queues a prepared link
    pub fn enqueue_link(&self, link: Link, custom: CustomData) -> QueueId {
        let host = link
            .rebased_url
            .as_ref()
            .and_then(|url| url.host_str())
            .map(str::to_string);
        let id = {
            let mut state = self.shared.state();
            let id = state.next_id;
            state.next_id += 1;
            state.queue.push_back(QueueItem {
                id,
                link,
                custom,
                host,
            });
            // the idle flag must flip under the same lock that guards the
            // queue, otherwise a fast pump can drain and re-mark idle
            // between the push and the flip
            self.shared.idle.send_replace(false);
            id
        };
        self.shared.wake.notify_one();
        id
    }

    /// Queues a bare URL
    pub fn enqueue_url(&self, url: Url, custom: CustomData) -> QueueId {
        self.enqueue_link(Link::from_url(url), custom)
    }

    /// Removes a not-yet-started item; returns whether it was found
    pub fn dequeue(&self, id: QueueId) -> bool {
        let mut state = self.shared.state();
        let before = state.queue.len();
        state.queue.retain(|item| item.id != id);
        let removed = state.queue.len() < before;
        if removed && state.queue.is_empty() && state.active.is_empty() {
            self.shared.idle.send_replace(true);
        }
        removed
    }

    /// True while the item is queued or in flight
    pub fn has(&self, id: QueueId) -> bool {
        let state = self.shared.state();
        state.active.contains(&id) || state.queue.iter().any(|item| item.id == id)
    }

    /// Stops starting new checks; in-flight checks run to completion
    pub fn pause(&self) {
        self.shared.state().paused = true;
    }

    pub fn resume(&self) {
        self.shared.state().paused = false;
        self.shared.wake.notify_one();
    }

    pub fn num_active(&self) -> usize {
        self.shared.state().active.len()
    }

    pub fn num_queued(&self) -> usize {
        self.shared.state().queue.len()
    }

    /// Drops all cached responses
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.shared.cache {
            cache.clear();
        }
    }

    /// Resolves once the queue is empty with nothing in flight
    pub async fn idle(&self) {
        let mut rx = self.shared.idle.subscribe();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub(crate) fn client(&self) -> &Client {
        &self.shared.client
    }

    pub(crate) fn cache(&self) -> Option<&ResponseCache> {
        self.shared.cache.as_ref()
    }

    pub(crate) fn options(&self) -> &CheckOptions {
        &self.shared.options
    }
}

impl Drop for UrlChecker {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump(shared: Arc<Shared>) {
    loop {
        let notified = shared.wake.notified();
        match take_ready(&shared) {
            Next::Item(item, delay) => {
                let shared = shared.clone();
                tokio::spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    process(shared, item).await;
                });
            }
            Next::Wait => notified.await,
        }
    }
}

/// Picks the next startable item under the socket and rate limits.
///
/// The scan takes the first item whose host still has capacity, so one
/// saturated host never blocks checks against other hosts.
fn take_ready(shared: &Shared) -> Next {
    let mut state = shared.state();

    if state.paused || state.active.len() >= shared.options.max_sockets {
        return Next::Wait;
    }

    let position = state.queue.iter().position(|item| match &item.host {
        Some(host) => {
            state.active_hosts.get(host).copied().unwrap_or(0)
                < shared.options.max_sockets_per_host
        }
        None => true,
    });
    let position = match position {
        Some(position) => position,
        None => return Next::Wait,
    };

    let item = match state.queue.remove(position) {
        Some(item) => item,
        None => return Next::Wait,
    };

    let rate_limit = Duration::from_millis(shared.options.rate_limit_ms);
    let now = Instant::now();
    let start_at = match state.last_start {
        Some(last) if !rate_limit.is_zero() => {
            let earliest = last + rate_limit;
            if earliest > now {
                earliest
            } else {
                now
            }
        }
        _ => now,
    };
    state.last_start = Some(start_at);

    state.active.insert(item.id);
    if let Some(host) = &item.host {
        *state.active_hosts.entry(host.clone()).or_insert(0) += 1;
    }

    trace!(id = item.id, queued = state.queue.len(), "starting check");
    Next::Item(item, start_at.saturating_duration_since(now))
}

async fn process(shared: Arc<Shared>, mut item: QueueItem) {
    check_link(
        &mut item.link,
        &shared.client,
        shared.cache.as_ref(),
        &shared.options,
    )
    .await;

    (shared.sink)(LinkEvent::Checked {
        link: Box::new(item.link),
        custom: item.custom,
    });

    let drained = {
        let mut state = shared.state();
        state.active.remove(&item.id);
        if let Some(host) = &item.host {
            if let Some(count) = state.active_hosts.get_mut(host) {
                *count -= 1;
                if *count == 0 {
                    state.active_hosts.remove(host);
                }
            }
        }
        let drained = state.queue.is_empty() && state.active.is_empty();
        if drained {
            shared.idle.send_replace(true);
        }
        drained
    };

    if drained {
        (shared.sink)(LinkEvent::Drained);
    }
    shared.wake.notify_one();
}
