//! The Link record
//!
//! A [`Link`] represents one hyperlink occurrence together with all of its
//! URL interpretations (original, resolved, rebased, redirected) and the
//! results of filtering and checking. It is created when a candidate URL is
//! discovered, populated by URL resolution, and terminally mutated by the
//! checking pipeline. Each Link is owned by exactly one queue entry; results
//! flow upward through events, never through shared mutation.

use std::collections::HashMap;
use std::fmt;
use url::Url;

/// Whether a link has been checked, and with what result.
///
/// The "not yet evaluated" state is a distinct case, not a null boolean.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CheckOutcome {
    #[default]
    NotChecked,
    Ok,
    Broken(BrokenReason),
}

/// Reason a checked link is considered broken
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokenReason {
    /// The URL could not be resolved or uses an unaccepted scheme
    Invalid,
    /// The failure could not be classified
    Unknown,
    /// OS-level network error, e.g. `ECONNREFUSED`, `ENOTFOUND`
    Errno(String),
    /// HTTP status outside the 200-299 range
    HttpStatus(u16),
}

impl BrokenReason {
    /// Stable reason code, e.g. `HTTP_404` or `ERRNO_ECONNREFUSED`
    pub fn code(&self) -> String {
        match self {
            BrokenReason::Invalid => "BLC_INVALID".to_string(),
            BrokenReason::Unknown => "BLC_UNKNOWN".to_string(),
            BrokenReason::Errno(code) => format!("ERRNO_{}", code),
            BrokenReason::HttpStatus(status) => format!("HTTP_{}", status),
        }
    }
}

impl fmt::Display for BrokenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Whether a link has been through exclusion filtering, and with what result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Exclusion {
    /// Filtering has not run yet
    #[default]
    NotFiltered,
    /// Filtering ran and kept the link
    Kept,
    /// Filtering excluded the link; excluded links are never checked
    Excluded(ExcludedReason),
}

/// Reason a link was excluded from checking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcludedReason {
    Custom,
    External,
    Html,
    Internal,
    Keyword,
    Robots,
    SamePage,
    Scheme,
}

impl ExcludedReason {
    /// Stable reason code, e.g. `BLC_ROBOTS`
    pub fn code(&self) -> &'static str {
        match self {
            ExcludedReason::Custom => "BLC_CUSTOM",
            ExcludedReason::External => "BLC_EXTERNAL",
            ExcludedReason::Html => "BLC_HTML",
            ExcludedReason::Internal => "BLC_INTERNAL",
            ExcludedReason::Keyword => "BLC_KEYWORD",
            ExcludedReason::Robots => "BLC_ROBOTS",
            ExcludedReason::SamePage => "BLC_SAMEPAGE",
            ExcludedReason::Scheme => "BLC_SCHEME",
        }
    }
}

impl fmt::Display for ExcludedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Source location of an attribute in the original markup.
///
/// Always `None` for elements synthesized by parser error recovery, and for
/// parsers that do not report spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: u64,
    pub column: u64,
}

/// Element metadata captured when a link is scraped from a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlMeta {
    /// Tag the URL was extracted from, e.g. `a`
    pub tag_name: String,

    /// Attribute the URL was extracted from, e.g. `href`
    pub attr_name: String,

    /// All attributes present on the element
    pub attrs: HashMap<String, String>,

    /// Raw `<base href>` text found in the document, if any
    pub base_href: Option<String>,

    /// 0-based discovery order among all candidate links on the page
    pub index: usize,

    /// 0-based order within the link's partition: excluded links count on
    /// one contiguous counter, kept links on another
    pub offset_index: Option<usize>,

    /// Attribute position in the source markup, when the parser reports it
    pub location: Option<Location>,

    /// CSS-like selector locating the element; `None` for the unique
    /// `<html>`/`<head>`/`<body>` elements
    pub selector: Option<String>,

    /// Concatenated descendant text with whitespace condensed; `None` when
    /// the element has no children at all
    pub text: Option<String>,

    /// Serialized reconstruction of the opening tag
    pub tag: String,
}

/// One hop of an HTTP redirect chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectHop {
    pub status: u16,
    pub url: Url,
}

/// Simplified HTTP response retained on a checked link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleResponse {
    pub status: u16,
    pub status_text: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Final URL after redirects
    pub url: Url,
    /// Intermediate redirect responses, oldest first
    pub redirects: Vec<RedirectHop>,
}

impl SimpleResponse {
    /// First header with the given name, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A connection-level failure, preserved on the link that hit it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpFailure {
    /// OS-level error code when one could be determined
    pub code: Option<String>,
    pub message: String,
}

impl HttpFailure {
    pub(crate) fn abandoned() -> Self {
        Self {
            code: None,
            message: "request abandoned before completion".to_string(),
        }
    }
}

/// What the HTTP collaborator produced for a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpOutcome {
    Response(SimpleResponse),
    Failed(HttpFailure),
}

/// One hyperlink occurrence with all of its URL interpretations and results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Link {
    /// Exact input as given to resolution
    pub original_url: Option<String>,

    /// `original_url` resolved against the resolved base
    pub resolved_url: Option<Url>,

    /// `original_url` resolved against the rebased base (post `<base>`)
    pub rebased_url: Option<Url>,

    /// Final URL after HTTP redirects; never unset once observed
    pub redirected_url: Option<Url>,

    /// The base URL as given by the caller/document, hash stripped
    pub resolved_base_url: Option<Url>,

    /// `resolved_base_url` combined with the document's `<base href>`
    pub rebased_base_url: Option<Url>,

    /// Element metadata when the link was scraped from HTML
    pub html: Option<HtmlMeta>,

    /// Simplified response or the connection error
    pub response: Option<HttpOutcome>,

    /// Whether `response` came from the response cache
    pub response_was_cached: Option<bool>,

    /// Check result
    pub outcome: CheckOutcome,

    /// Same scheme+host+port as the resolved base; `None` means unknown
    pub is_internal: Option<bool>,

    /// Same scheme+host+port+path as the base (query/hash ignored)
    pub is_same_page: Option<bool>,

    /// Exclusion-filter result
    pub exclusion: Exclusion,
}

impl Link {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a link for a directly enqueued (already absolute) URL
    pub fn from_url(url: Url) -> Self {
        Self {
            original_url: Some(url.to_string()),
            resolved_url: Some(url.clone()),
            rebased_url: Some(url),
            ..Self::default()
        }
    }

    /// Records a successful check
    pub fn mend(&mut self, response: SimpleResponse) {
        self.response = Some(HttpOutcome::Response(response));
        self.outcome = CheckOutcome::Ok;
    }

    /// Records a failed check
    pub fn break_with(&mut self, reason: BrokenReason) {
        self.outcome = CheckOutcome::Broken(reason);
    }

    /// Marks the link excluded with its position on the excluded counter
    pub fn exclude(&mut self, offset_index: usize, reason: ExcludedReason) {
        if let Some(html) = &mut self.html {
            html.offset_index = Some(offset_index);
        }
        self.exclusion = Exclusion::Excluded(reason);
    }

    /// Marks the link kept with its position on the kept counter
    pub fn include(&mut self, offset_index: usize) {
        if let Some(html) = &mut self.html {
            html.offset_index = Some(offset_index);
        }
        self.exclusion = Exclusion::Kept;
    }

    /// Tri-state broken flag: `None` until the link has been checked
    pub fn is_broken(&self) -> Option<bool> {
        match &self.outcome {
            CheckOutcome::NotChecked => None,
            CheckOutcome::Ok => Some(false),
            CheckOutcome::Broken(_) => Some(true),
        }
    }

    /// Reason code when broken, e.g. `HTTP_404`
    pub fn broken_reason(&self) -> Option<String> {
        match &self.outcome {
            CheckOutcome::Broken(reason) => Some(reason.code()),
            _ => None,
        }
    }

    /// Tri-state exclusion flag: `None` until filtering has run
    pub fn was_excluded(&self) -> Option<bool> {
        match &self.exclusion {
            Exclusion::NotFiltered => None,
            Exclusion::Kept => Some(false),
            Exclusion::Excluded(_) => Some(true),
        }
    }

    /// Reason code when excluded, e.g. `BLC_ROBOTS`
    pub fn excluded_reason(&self) -> Option<&'static str> {
        match &self.exclusion {
            Exclusion::Excluded(reason) => Some(reason.code()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_link_is_unchecked_and_unfiltered() {
        let link = Link::new();
        assert_eq!(link.is_broken(), None);
        assert_eq!(link.was_excluded(), None);
        assert_eq!(link.broken_reason(), None);
    }

    #[test]
    fn test_from_url_populates_all_interpretations() {
        let url = Url::parse("https://example.com/page").unwrap();
        let link = Link::from_url(url.clone());
        assert_eq!(link.original_url.as_deref(), Some("https://example.com/page"));
        assert_eq!(link.resolved_url, Some(url.clone()));
        assert_eq!(link.rebased_url, Some(url));
        assert_eq!(link.redirected_url, None);
    }

    #[test]
    fn test_mend_sets_ok() {
        let mut link = Link::from_url(Url::parse("https://example.com/").unwrap());
        link.mend(SimpleResponse {
            status: 200,
            status_text: Some("OK".into()),
            headers: vec![],
            url: Url::parse("https://example.com/").unwrap(),
            redirects: vec![],
        });
        assert_eq!(link.is_broken(), Some(false));
        assert_eq!(link.broken_reason(), None);
        assert!(link.response.is_some());
    }

    #[test]
    fn test_break_with_reason_codes() {
        let mut link = Link::new();
        link.break_with(BrokenReason::HttpStatus(404));
        assert_eq!(link.broken_reason().as_deref(), Some("HTTP_404"));

        link.break_with(BrokenReason::Errno("ECONNREFUSED".into()));
        assert_eq!(link.broken_reason().as_deref(), Some("ERRNO_ECONNREFUSED"));

        link.break_with(BrokenReason::Invalid);
        assert_eq!(link.broken_reason().as_deref(), Some("BLC_INVALID"));

        // unusual but numeric statuses keep the HTTP_ form
        link.break_with(BrokenReason::HttpStatus(999));
        assert_eq!(link.broken_reason().as_deref(), Some("HTTP_999"));
    }

    #[test]
    fn test_excluded_reason_codes() {
        let mut link = Link::new();
        link.exclude(0, ExcludedReason::Robots);
        assert_eq!(link.was_excluded(), Some(true));
        assert_eq!(link.excluded_reason(), Some("BLC_ROBOTS"));
        // excluded links stay unchecked
        assert_eq!(link.is_broken(), None);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = SimpleResponse {
            status: 200,
            status_text: None,
            headers: vec![("Content-Type".into(), "text/html".into())],
            url: Url::parse("https://example.com/").unwrap(),
            redirects: vec![],
        };
        assert_eq!(response.header("content-type"), Some("text/html"));
        assert_eq!(response.header("x-missing"), None);
    }
}
