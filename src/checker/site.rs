//! The site layer
//!
//! [`SiteChecker`] crawls whole sites: it fetches the site's robots.txt,
//! checks the root page, and follows internal links whose tag/attribute
//! combination leads to further HTML documents. Every visited page is
//! remembered per site so cycles terminate, and redirect chains record
//! all of their hops so a page is never crawled twice under different
//! names.

use crate::checker::events::{CheckEvent, CustomData};
use crate::checker::html_check::{EventSink, LinkFilter};
use crate::checker::page_queue::HtmlUrlChecker;
use crate::checker::url_queue::QueueId;
use crate::config::CheckOptions;
use crate::link::{ExcludedReason, Exclusion, HttpOutcome, Link};
use crate::robots::{fetch_robots_txt, RobotsTxt};
use crate::scrape::recursive;
use crate::url::strip_hash;
use crate::{PageError, ScourError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;

/// Caller-installed page gate: pages it rejects are checked as links but
/// never crawled into
pub type PageFilter = Arc<dyn Fn(&Url) -> bool + Send + Sync>;

struct SiteItem {
    id: QueueId,
    url: Url,
    custom: CustomData,
}

struct SiteState {
    queue: VecDeque<SiteItem>,
    active: Option<QueueId>,
    next_id: QueueId,
    paused: bool,
}

struct SiteShared {
    pages: HtmlUrlChecker,
    sink: EventSink,
    state: Mutex<SiteState>,
    /// robots.txt of the site currently being crawled
    robots: Arc<Mutex<Option<Arc<RobotsTxt>>>>,
    /// pages already crawled (or redirected through) this site, with the
    /// time they were recorded
    checked: Mutex<HashMap<String, Instant>>,
    page_filter: Option<PageFilter>,
    wake: Notify,
    idle: watch::Sender<bool>,
}

impl SiteShared {
    fn state(&self) -> MutexGuard<'_, SiteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn checked(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.checked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Recursive crawler over one site at a time
pub struct SiteChecker {
    shared: Arc<SiteShared>,
    pump: JoinHandle<()>,
}

impl SiteChecker {
    pub fn new(options: CheckOptions, sink: EventSink) -> Result<Self, ScourError> {
        Self::with_filters(options, sink, None, None)
    }

    /// Creates a checker with optional link and page gates.
    ///
    /// The link filter runs inside exclusion filtering, after this
    /// checker's own robots.txt rule; the page filter decides whether an
    /// otherwise crawlable page is entered.
    pub fn with_filters(
        options: CheckOptions,
        sink: EventSink,
        link_filter: Option<LinkFilter>,
        page_filter: Option<PageFilter>,
    ) -> Result<Self, ScourError> {
        let (inner_tx, inner_rx) = mpsc::unbounded_channel();
        let inner_sink: EventSink = Arc::new(move |event| {
            let _ = inner_tx.send(event);
        });

        let robots: Arc<Mutex<Option<Arc<RobotsTxt>>>> = Arc::new(Mutex::new(None));
        let pages = HtmlUrlChecker::new(options.clone(), inner_sink)?;
        pages
            .html()
            .set_custom_filter(robots_txt_filter(&options, robots.clone(), link_filter));

        let shared = Arc::new(SiteShared {
            pages,
            sink,
            state: Mutex::new(SiteState {
                queue: VecDeque::new(),
                active: None,
                next_id: 0,
                paused: false,
            }),
            robots,
            checked: Mutex::new(HashMap::new()),
            page_filter,
            wake: Notify::new(),
            idle: watch::Sender::new(true),
        });
        let pump = tokio::spawn(pump(shared.clone(), inner_rx));
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

    /// Queues a site crawl rooted at the given URL
    pub fn enqueue_site(&self, url: Url, custom: CustomData) -> QueueId {
        let id = {
            let mut state = self.shared.state();
            let id = state.next_id;
            state.next_id += 1;
            state.queue.push_back(SiteItem { id, url, custom });
            // flipped under the queue lock, see the URL queue
            self.shared.idle.send_replace(false);
            id
        };
        self.shared.wake.notify_one();
        id
    }

    /// Removes a not-yet-started site; returns whether it was found
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

    pub fn has(&self, id: QueueId) -> bool {
        let state = self.shared.state();
        state.active == Some(id) || state.queue.iter().any(|item| item.id == id)
    }

    pub fn pause(&self) {
        self.shared.state().paused = true;
        self.shared.pages.pause();
    }

    pub fn resume(&self) {
        self.shared.state().paused = false;
        self.shared.pages.resume();
        self.shared.wake.notify_one();
    }

    pub fn num_sites_queued(&self) -> usize {
        self.shared.state().queue.len()
    }

    /// The page layer underneath
    pub fn pages(&self) -> &HtmlUrlChecker {
        &self.shared.pages
    }

    pub fn clear_cache(&self) {
        self.shared.pages.clear_cache();
    }

    /// Resolves once every queued site has been fully crawled
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

impl Drop for SiteChecker {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Builds the exclusion rule that applies the crawled site's robots.txt
/// to internal links before consulting the caller's own filter
fn robots_txt_filter(
    options: &CheckOptions,
    robots: Arc<Mutex<Option<Arc<RobotsTxt>>>>,
    user_filter: Option<LinkFilter>,
) -> LinkFilter {
    let honor = options.honor_robot_exclusions;
    let bot_name = options.bot_name.clone();
    Arc::new(move |link: &Link| {
        if honor && link.is_internal == Some(true) {
            let current = robots
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let (Some(robots), Some(rebased)) = (current, &link.rebased_url) {
                if !robots.allows(&bot_name, rebased.as_str()) {
                    return Some(ExcludedReason::Robots);
                }
            }
        }
        user_filter.as_ref().and_then(|filter| filter(link))
    })
}

async fn pump(shared: Arc<SiteShared>, mut events: mpsc::UnboundedReceiver<CheckEvent>) {
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
                process_site(&shared, item, &mut events).await;

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

async fn process_site(
    shared: &SiteShared,
    site: SiteItem,
    events: &mut mpsc::UnboundedReceiver<CheckEvent>,
) {
    let options = shared.pages.links().options().clone();
    info!(url = %site.url, "crawling site");

    let robots = if options.honor_robot_exclusions {
        let fetched = fetch_robots_txt(shared.pages.links().client(), &site.url)
            .await
            .unwrap_or_else(RobotsTxt::allow_all);
        Some(Arc::new(fetched))
    } else {
        None
    };
    *shared
        .robots
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = robots;

    {
        let mut checked = shared.checked();
        checked.clear();
        checked.insert(strip_hash(&site.url).to_string(), Instant::now());
    }

    let mut root_error: Option<PageError> = None;
    let mut root_page_seen = false;
    shared.pages.enqueue_page(site.url.clone(), site.custom.clone());

    while let Some(event) = events.recv().await {
        match event {
            CheckEvent::Link { link, custom } => {
                consider_recursion(shared, &options, &link, &custom);
                (shared.sink)(CheckEvent::Link { link, custom });
            }
            CheckEvent::Junk { link, custom } => {
                if !recursion_barred(&link) {
                    consider_recursion(shared, &options, &link, &custom);
                }
                (shared.sink)(CheckEvent::Junk { link, custom });
            }
            CheckEvent::Page { url, error, custom } => {
                // pages are serial, so the first Page event is the root;
                // only its error marks the site incomplete
                if !root_page_seen {
                    root_page_seen = true;
                    root_error = error.clone();
                }
                (shared.sink)(CheckEvent::Page { url, error, custom });
            }
            CheckEvent::End => {
                // links processed before this End may have queued more
                // pages; only a truly idle page queue ends the site
                if shared.pages.is_idle() {
                    break;
                }
            }
            other => (shared.sink)(other),
        }
    }

    (shared.sink)(CheckEvent::Site {
        url: site.url,
        error: root_error,
        custom: site.custom,
    });
}

/// Exclusions that also bar crawling into the target page.
///
/// Other exclusions only suppress the link check itself; a link kept out
/// of the report by the filter level or a structural rule can still lead
/// to a page worth crawling.
fn recursion_barred(link: &Link) -> bool {
    matches!(
        link.exclusion,
        Exclusion::Excluded(
            ExcludedReason::Keyword | ExcludedReason::Robots | ExcludedReason::Scheme
        )
    )
}

/// Decides whether a link leads to a page worth crawling, and queues it
/// when it does.
///
/// Every hop of a redirect chain is recorded as checked, so a page
/// reachable under several redirecting names is crawled once.
fn consider_recursion(
    shared: &SiteShared,
    options: &CheckOptions,
    link: &Link,
    custom: &CustomData,
) {
    let html = match &link.html {
        Some(html) => html,
        None => return,
    };
    if !recursive(&html.tag_name, &html.attr_name) {
        return;
    }
    // excluded links arrive unchecked; only a known-broken link is out
    if link.is_broken() == Some(true) || link.is_internal != Some(true) {
        return;
    }

    let target = match link.redirected_url.as_ref().or(link.rebased_url.as_ref()) {
        Some(target) => strip_hash(target),
        None => return,
    };

    let max_age = Duration::from_millis(options.cache_max_age_ms);
    let mut checked = shared.checked();

    if let Some(HttpOutcome::Response(response)) = &link.response {
        for hop in &response.redirects {
            checked.insert(strip_hash(&hop.url).to_string(), Instant::now());
        }
    }

    let key = target.to_string();
    let already = checked
        .get(&key)
        .map(|at| at.elapsed() <= max_age)
        .unwrap_or(false);
    if already {
        return;
    }

    if let Some(filter) = &shared.page_filter {
        if !filter(&target) {
            debug!(url = %target, "page rejected by filter");
            return;
        }
    }

    checked.insert(key, Instant::now());
    drop(checked);
    debug!(url = %target, "queueing discovered page");
    shared.pages.enqueue_page(target, custom.clone());
}
