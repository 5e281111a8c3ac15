//! The page layer
//!
//! [`HtmlUrlChecker`] queues page URLs, fetches each as an HTML document
//! and scans it through an inner [`HtmlChecker`]. Pages are processed one
//! at a time; concurrency lives in the link queue underneath, so two
//! pages never interleave their link results.

use crate::checker::events::{CheckEvent, CustomData};
use crate::checker::html_check::{EventSink, HtmlChecker};
use crate::checker::http;
use crate::config::CheckOptions;
use crate::robots::RobotsDirectives;
use crate::{PageError, ScourError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

pub use crate::checker::url_queue::QueueId;

struct PageItem {
    id: QueueId,
    url: Url,
    custom: CustomData,
}

struct PageState {
    queue: VecDeque<PageItem>,
    active: Option<QueueId>,
    next_id: QueueId,
    paused: bool,
}

struct PageShared {
    html: HtmlChecker,
    sink: EventSink,
    state: Mutex<PageState>,
    wake: Notify,
    idle: watch::Sender<bool>,
}

impl PageShared {
    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serialized queue of pages to fetch, scan and check
pub struct HtmlUrlChecker {
    shared: Arc<PageShared>,
    pump: JoinHandle<()>,
}

impl HtmlUrlChecker {
    pub fn new(options: CheckOptions, sink: EventSink) -> Result<Self, ScourError> {
        let html = HtmlChecker::new(options, sink.clone())?;
        let shared = Arc::new(PageShared {
            html,
            sink,
            state: Mutex::new(PageState {
                queue: VecDeque::new(),
                active: None,
                next_id: 0,
                paused: false,
            }),
            wake: Notify::new(),
            idle: watch::Sender::new(true),
        });
        let pump = tokio::spawn(pump(shared.clone()));
        Ok(Self { shared, pump })
    }

    /// Creates a checker whose events arrive on a channel
    pub fn with_channel(
        options: CheckOptions,
    ) -> Result<(Self, mpsc::UnboundedReceiver<CheckEvent>), ScourError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink: EventSink = Arc::new(move |event| {
            let _ = tx.send(event);
        });
        Ok((Self::new(options, sink)?, rx))
    }

    /// Queues a page for fetching and scanning
    pub fn enqueue_page(&self, url: Url, custom: CustomData) -> QueueId {
        let id = {
            let mut state = self.shared.state();
            let id = state.next_id;
            state.next_id += 1;
            state.queue.push_back(PageItem { id, url, custom });
            // flipped under the queue lock, see the URL queue
            self.shared.idle.send_replace(false);
            id
        };
        self.shared.wake.notify_one();
        id
    }

    /// Removes a not-yet-started page; returns whether it was found
    pub fn dequeue(&self, id: QueueId) -> bool {
        let mut state = self.shared.state();
        let before = state.queue.len();
        state.queue.retain(|item| item.id != id);
        let removed = state.queue.len() < before;
        if removed && state.queue.is_empty() && state.active.is_none() {
            self.shared.idle.send_replace(true);
        }
        removed
    }

    /// True while the page is queued or being processed
    pub fn has(&self, id: QueueId) -> bool {
        let state = self.shared.state();
        state.active == Some(id) || state.queue.iter().any(|item| item.id == id)
    }

    /// Pauses both page processing and the link queue underneath
    pub fn pause(&self) {
        self.shared.state().paused = true;
        self.shared.html.links().pause();
    }

    pub fn resume(&self) {
        self.shared.state().paused = false;
        self.shared.html.links().resume();
        self.shared.wake.notify_one();
    }

    pub fn num_pages_queued(&self) -> usize {
        self.shared.state().queue.len()
    }

    pub fn num_pages_active(&self) -> usize {
        usize::from(self.shared.state().active.is_some())
    }

    /// The HTML layer, for custom filters
    pub fn html(&self) -> &HtmlChecker {
        &self.shared.html
    }

    /// The link queue, for counts and cache control
    pub fn links(&self) -> &crate::checker::url_queue::UrlChecker {
        self.shared.html.links()
    }

    pub fn clear_cache(&self) {
        self.links().clear_cache();
    }

    /// True when no page is queued or being processed
    pub fn is_idle(&self) -> bool {
        *self.shared.idle.borrow()
    }

    /// Resolves once every queued page has been fully processed
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
}

impl Drop for HtmlUrlChecker {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump(shared: Arc<PageShared>) {
    loop {
        let notified = shared.wake.notified();
        let item = {
            let mut state = shared.state();
            if state.paused || state.active.is_some() {
                None
            } else {
                let item = state.queue.pop_front();
                if let Some(item) = &item {
                    state.active = Some(item.id);
                }
                item
            }
        };

        match item {
            Some(item) => {
                let url = item.url.clone();
                let custom = item.custom.clone();
                let error = scan_page(&shared, item).await;
                if let Some(error) = &error {
                    warn!(url = %url, error = %error, "page failed");
                }
                (shared.sink)(CheckEvent::Page { url, error, custom });

                let drained = {
                    let mut state = shared.state();
                    state.active = None;
                    let drained = state.queue.is_empty();
                    if drained {
                        shared.idle.send_replace(true);
                    }
                    drained
                };
                if drained {
                    (shared.sink)(CheckEvent::End);
                }
                shared.wake.notify_one();
            }
            None => notified.await,
        }
    }
}

/// Fetches and scans one page, returning its error if any.
///
/// The page response is stored in the response cache under both the
/// requested and the final URL so link checks of the same page are free.
async fn scan_page(shared: &PageShared, item: PageItem) -> Option<PageError> {
    let links = shared.html.links();
    let options = links.options().clone();

    info!(url = %item.url, "fetching page");
    let (response, body) = match http::fetch_document(links.client(), &item.url, &options).await
    {
        Ok(fetched) => fetched,
        Err(error) => return Some(error),
    };

    if let Some(cache) = links.cache() {
        cache.insert_ready(item.url.as_str(), Ok(response.clone()));
        if response.url != item.url {
            cache.insert_ready(response.url.as_str(), Ok(response.clone()));
        }
    }

    let mut robots = RobotsDirectives::new(&options.bot_name);
    for (name, value) in &response.headers {
        if name.eq_ignore_ascii_case("x-robots-tag") {
            robots.header(value);
        }
    }

    let base = response.url.clone();
    match shared
        .html
        .scan(&body, Some(base), Some(robots), item.custom)
        .await
    {
        Ok(()) => None,
        Err(error) => Some(PageError::Scan(error.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_starts_idle() {
        let (checker, _rx) = HtmlUrlChecker::with_channel(CheckOptions::default()).unwrap();
        assert!(checker.is_idle());
        checker.idle().await;
    }

    #[tokio::test]
    async fn test_dequeue_while_paused() {
        let (checker, _rx) = HtmlUrlChecker::with_channel(CheckOptions::default()).unwrap();
        checker.pause();
        let id = checker.enqueue_page(Url::parse("https://example.com/").unwrap(), None);
        assert!(checker.has(id));
        assert!(!checker.is_idle());
        assert!(checker.dequeue(id));
        assert!(checker.is_idle());
    }
}
