//! Events emitted by the checking pipeline
//!
//! Results flow out of the checkers through channels rather than
//! callbacks. Each checker layer forwards the events of the layer beneath
//! it and adds its own completion markers.

use crate::link::Link;
use crate::PageError;
use url::Url;

/// Arbitrary caller data carried alongside a queued item and returned
/// with every event it produces
pub type CustomData = Option<serde_json::Value>;

/// One progress or result notification from a checker
#[derive(Debug, Clone)]
pub enum CheckEvent {
    /// A page's document was parsed; sent before any of its links
    Document {
        /// Base URL links on the page resolve against
        base_url: Option<Url>,
        /// Robots directives in effect for the page
        robots: Vec<String>,
    },

    /// A link was excluded by filtering and will not be checked
    Junk {
        link: Box<Link>,
        custom: CustomData,
    },

    /// A link finished checking
    Link {
        link: Box<Link>,
        custom: CustomData,
    },

    /// A page finished: all of its links were checked or excluded
    Page {
        url: Url,
        error: Option<PageError>,
        custom: CustomData,
    },

    /// A site crawl finished: every reachable page was processed
    Site {
        url: Url,
        /// Error from the site's root page, if any; later page failures
        /// are reported only on their own `Page` events
        error: Option<PageError>,
        custom: CustomData,
    },

    /// The queue drained completely
    End,
}
