use serde::Deserialize;

/// HTTP method used for individual link checks.
///
/// HEAD is cheaper but some servers reject it; see the 405 retry option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMethod {
    Head,
    Get,
}

impl RequestMethod {
    pub fn as_method(&self) -> reqwest::Method {
        match self {
            RequestMethod::Head => reqwest::Method::HEAD,
            RequestMethod::Get => reqwest::Method::GET,
        }
    }
}

/// Options controlling link checking and crawling behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CheckOptions {
    /// URL schemes that are checked over the network; anything else is
    /// marked broken with `BLC_INVALID` without any I/O
    pub accepted_schemes: Vec<String>,

    /// Share responses between checks of the same URL
    pub cache_responses: bool,

    /// Maximum age of a cached response (milliseconds); also bounds the
    /// per-site "already checked" page set
    pub cache_max_age_ms: u64,

    /// Exclude links that point off-site
    pub exclude_external_links: bool,

    /// Exclude links that stay on-site
    pub exclude_internal_links: bool,

    /// Exclude links that target the page they appear on
    pub exclude_links_to_same_page: bool,

    /// Keyword/glob patterns matched against each link's URL
    pub excluded_keywords: Vec<String>,

    /// Schemes excluded from checking entirely (`BLC_SCHEME`)
    pub excluded_schemes: Vec<String>,

    /// Which tag/attribute combinations count as links (0-3, cumulative)
    pub filter_level: u8,

    /// Honor robots.txt, meta robots and `rel="nofollow"` exclusions
    pub honor_robot_exclusions: bool,

    /// Maximum number of simultaneously in-flight link checks
    pub max_sockets: usize,

    /// Maximum number of simultaneous checks against one host
    pub max_sockets_per_host: usize,

    /// Minimum interval between request starts (milliseconds)
    pub rate_limit_ms: u64,

    /// Method used for link checks
    pub request_method: RequestMethod,

    /// Retry HEAD-rejecting servers (HTTP 405) with GET
    pub retry_405_head: bool,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Short product token used when evaluating robots directives
    pub bot_name: String,

    /// Skip TLS certificate verification
    pub accept_invalid_certs: bool,

    /// Maximum redirect hops followed per request
    pub max_redirects: usize,

    /// Request timeout in seconds (enforced by the HTTP client)
    pub timeout_secs: u64,

    /// Optional basic-auth username
    pub username: Option<String>,

    /// Optional basic-auth password
    pub password: Option<String>,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            accepted_schemes: vec!["http".into(), "https".into()],
            cache_responses: true,
            cache_max_age_ms: 3_600_000,
            exclude_external_links: false,
            exclude_internal_links: false,
            exclude_links_to_same_page: false,
            excluded_keywords: Vec::new(),
            excluded_schemes: vec![
                "data".into(),
                "geo".into(),
                "javascript".into(),
                "mailto".into(),
                "sms".into(),
                "tel".into(),
            ],
            filter_level: 1,
            honor_robot_exclusions: true,
            max_sockets: 16,
            max_sockets_per_host: 1,
            rate_limit_ms: 0,
            request_method: RequestMethod::Head,
            retry_405_head: false,
            user_agent: concat!("linkscour/", env!("CARGO_PKG_VERSION")).to_string(),
            bot_name: "linkscour".to_string(),
            accept_invalid_certs: false,
            max_redirects: 10,
            timeout_secs: 30,
            username: None,
            password: None,
        }
    }
}
