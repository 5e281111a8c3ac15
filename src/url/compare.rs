//! Origin and page equality between URLs

use url::Url;

/// True when both URLs share scheme, host and effective port.
///
/// Default ports count as equal to their explicit form, so
/// `https://example.com` and `https://example.com:443` share an origin.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

/// True when both URLs name the same page: same origin and same path.
///
/// Query and fragment are ignored, so `/page?x=1` and `/page#top` are the
/// same page while `/page/` and `/page` are not.
pub fn same_page(a: &Url, b: &Url) -> bool {
    same_origin(a, b) && a.path() == b.path()
}
