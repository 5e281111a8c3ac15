//! The checking pipeline
//!
//! Four layers compose rather than inherit:
//!
//! - [`UrlChecker`] drains a queue of individual links under socket and
//!   rate limits
//! - [`HtmlChecker`] scans one document, filters its links and feeds the
//!   queue
//! - [`HtmlUrlChecker`] fetches pages by URL and scans them serially
//! - [`SiteChecker`] crawls whole sites, following internal links
//!
//! Each layer forwards the events of the layer beneath it through a sink,
//! so a consumer sees one ordered stream no matter which layer it drives.

mod cache;
mod events;
mod html_check;
mod http;
mod link_check;
mod page_queue;
mod site;
mod url_queue;

pub use cache::{Lookup, ResponseCache};
pub use events::{CheckEvent, CustomData};
pub use html_check::{EventSink, HtmlChecker, LinkFilter};
pub use http::{build_client, HttpResult};
pub use link_check::check_link;
pub use page_queue::HtmlUrlChecker;
pub use site::{PageFilter, SiteChecker};
pub use url_queue::{LinkEvent, LinkSink, QueueId, UrlChecker};
