//! The HTML layer
//!
//! [`HtmlChecker`] scans one document at a time: it extracts candidate
//! links, runs exclusion filtering, and feeds the survivors to an inner
//! [`UrlChecker`]. Excluded links surface as `Junk` events with their
//! reason; everything else surfaces as `Link` events once checked.

use crate::checker::events::{CheckEvent, CustomData};
use crate::checker::url_queue::{LinkEvent, LinkSink, UrlChecker};
use crate::config::CheckOptions;
use crate::link::{BrokenReason, ExcludedReason, Link};
use crate::robots::RobotsDirectives;
use crate::scrape::{in_filter_level, is_image_combo, scrape_document};
use crate::url::matches_keyword;
use crate::ScourError;
use scraper::Html;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info};
use url::Url;

/// Consumer of checker events
pub type EventSink = Arc<dyn Fn(CheckEvent) + Send + Sync>;

/// Caller-installed exclusion rule, consulted after keyword and scheme
/// filters and before the built-in robots and level filters
pub type LinkFilter = Arc<dyn Fn(&Link) -> Option<ExcludedReason> + Send + Sync>;

/// Scans documents and checks the links they contain
pub struct HtmlChecker {
    url_checker: UrlChecker,
    sink: EventSink,
    custom_filter: Mutex<Option<LinkFilter>>,
    scanning: AtomicBool,
}

impl HtmlChecker {
    pub fn new(options: CheckOptions, sink: EventSink) -> Result<Self, ScourError> {
        let url_checker = UrlChecker::new(options, forward_links(sink.clone()))?;
        Ok(Self {
            url_checker,
            sink,
            custom_filter: Mutex::new(None),
            scanning: AtomicBool::new(false),
        })
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

    /// Installs a custom exclusion rule for subsequent scans
    pub fn set_custom_filter(&self, filter: LinkFilter) {
        *self
            .custom_filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(filter);
    }

    /// The underlying URL queue, for pausing, dequeueing and counts
    pub fn links(&self) -> &UrlChecker {
        &self.url_checker
    }

    /// Scans a document and resolves once every kept link is checked.
    ///
    /// Only one scan may run at a time; a second concurrent call fails
    /// with [`ScourError::AlreadyScanning`]. Directives seeded from
    /// response headers may be passed in; `<meta>` directives cascade on
    /// top of them.
    pub async fn scan(
        &self,
        html: &str,
        base_url: Option<Url>,
        robots: Option<RobotsDirectives>,
        custom: CustomData,
    ) -> Result<(), ScourError> {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ScourError::AlreadyScanning);
        }
        let _guard = ScanGuard(&self.scanning);

        let options = self.url_checker.options().clone();
        let mut robots =
            robots.unwrap_or_else(|| RobotsDirectives::new(&options.bot_name));
        let links = parse_and_scrape(html, base_url.as_ref(), &mut robots);

        info!(
            links = links.len(),
            base = base_url.as_ref().map(Url::as_str).unwrap_or("(none)"),
            "scanned document"
        );
        (self.sink)(CheckEvent::Document {
            base_url: base_url.clone(),
            robots: robots.active(),
        });

        let custom_filter = self
            .custom_filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut excluded_count = 0;
        let mut included_count = 0;

        for mut link in links {
            if link.rebased_url.is_none() {
                // unresolvable links are reported directly, the queue
                // only carries checkable work
                link.include(included_count);
                included_count += 1;
                link.break_with(BrokenReason::Invalid);
                (self.sink)(CheckEvent::Link {
                    link: Box::new(link),
                    custom: custom.clone(),
                });
                continue;
            }

            match exclusion_reason(&link, &options, &robots, custom_filter.as_ref()) {
                Some(reason) => {
                    debug!(
                        url = link.rebased_url.as_ref().map(Url::as_str).unwrap_or(""),
                        reason = reason.code(),
                        "link excluded"
                    );
                    link.exclude(excluded_count, reason);
                    excluded_count += 1;
                    (self.sink)(CheckEvent::Junk {
                        link: Box::new(link),
                        custom: custom.clone(),
                    });
                }
                None => {
                    link.include(included_count);
                    included_count += 1;
                    self.url_checker.enqueue_link(link, custom.clone());
                }
            }
        }

        self.url_checker.idle().await;
        Ok(())
    }
}

struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Converts queue events into checker events
fn forward_links(sink: EventSink) -> LinkSink {
    Arc::new(move |event| {
        if let LinkEvent::Checked { link, custom } = event {
            sink(CheckEvent::Link { link, custom });
        }
    })
}

/// Parsing and scraping stay synchronous; the parsed tree is not `Send`
/// and must not cross an await point
fn parse_and_scrape(
    html: &str,
    base_url: Option<&Url>,
    robots: &mut RobotsDirectives,
) -> Vec<Link> {
    let doc = Html::parse_document(html);
    scrape_document(&doc, base_url, Some(robots))
}

/// Applies the exclusion filters in order of precedence.
///
/// Keywords and schemes are cheap textual checks and run first, the
/// custom rule next, then robots directives, then the structural filters.
fn exclusion_reason(
    link: &Link,
    options: &CheckOptions,
    robots: &RobotsDirectives,
    custom_filter: Option<&LinkFilter>,
) -> Option<ExcludedReason> {
    let rebased = link.rebased_url.as_ref()?;

    let keyword_hit = options.excluded_keywords.iter().any(|pattern| {
        matches_keyword(pattern, rebased.as_str())
            || link
                .original_url
                .as_deref()
                .is_some_and(|original| matches_keyword(pattern, original))
    });
    if keyword_hit {
        return Some(ExcludedReason::Keyword);
    }

    if options
        .excluded_schemes
        .iter()
        .any(|scheme| scheme == rebased.scheme())
    {
        return Some(ExcludedReason::Scheme);
    }

    if let Some(filter) = custom_filter {
        if let Some(reason) = filter(link) {
            return Some(reason);
        }
    }

    let html = link.html.as_ref();

    if options.honor_robot_exclusions {
        if robots.one_is(&["nofollow", "noindex"]) {
            return Some(ExcludedReason::Robots);
        }
        if let Some(html) = html {
            if robots.is("noimageindex") && is_image_combo(&html.tag_name, &html.attr_name) {
                return Some(ExcludedReason::Robots);
            }
            let rel_nofollow = html.attrs.get("rel").is_some_and(|rel| {
                rel.split_ascii_whitespace()
                    .any(|token| token.eq_ignore_ascii_case("nofollow"))
            });
            if rel_nofollow {
                return Some(ExcludedReason::Robots);
            }
        }
    }

    if let Some(html) = html {
        if !in_filter_level(options.filter_level, &html.tag_name, &html.attr_name) {
            return Some(ExcludedReason::Html);
        }
    }

    if options.exclude_external_links && link.is_internal == Some(false) {
        return Some(ExcludedReason::External);
    }
    if options.exclude_internal_links && link.is_internal == Some(true) {
        return Some(ExcludedReason::Internal);
    }
    if options.exclude_links_to_same_page && link.is_same_page == Some(true) {
        return Some(ExcludedReason::SamePage);
    }

    None
}
