//! Robots exclusion handling
//!
//! Three mechanisms are honored when `honor-robot-exclusions` is on:
//! per-site `robots.txt` rules, per-page directives from `<meta>` elements
//! and `X-Robots-Tag` headers, and per-link `rel="nofollow"` tokens (the
//! last is handled during exclusion filtering).

mod directives;
mod txt;

pub use directives::RobotsDirectives;
pub use txt::RobotsTxt;

use tracing::debug;
use url::Url;

/// Redirect hops tolerated when locating a site's robots.txt
const MAX_ROBOTS_REDIRECTS: usize = 5;

/// Fetches and parses a site's robots.txt.
///
/// The shared client never follows redirects on its own, so a relocated
/// robots.txt is chased here. Any failure, from an unbuildable URL to a
/// non-2xx status, degrades to `None`; a missing robots.txt never blocks
/// a crawl.
pub async fn fetch_robots_txt(client: &reqwest::Client, base: &Url) -> Option<RobotsTxt> {
    let mut robots_url = base.join("/robots.txt").ok()?;
    debug!(url = %robots_url, "fetching robots.txt");

    let mut hops = 0;
    let response = loop {
        let response = match client.get(robots_url.clone()).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(url = %robots_url, error = %err, "robots.txt fetch failed");
                return None;
            }
        };

        if response.status().is_redirection() && hops < MAX_ROBOTS_REDIRECTS {
            let next = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| robots_url.join(value).ok());
            if let Some(next) = next {
                hops += 1;
                robots_url = next;
                continue;
            }
        }
        break response;
    };

    if !response.status().is_success() {
        debug!(url = %robots_url, status = %response.status(), "robots.txt unavailable");
        return None;
    }

    match response.text().await {
        Ok(body) => Some(RobotsTxt::new(body)),
        Err(err) => {
            debug!(url = %robots_url, error = %err, "robots.txt body unreadable");
            None
        }
    }
}
