//! Checking a single link
//!
//! A link check either terminates locally (excluded, unresolvable, or an
//! unaccepted scheme) or performs one HTTP transaction, deduplicated
//! through the response cache when one is configured.

use crate::checker::cache::{self, Lookup, ResponseCache, SharedResult};
use crate::checker::http::{self, HttpResult};
use crate::config::{CheckOptions, RequestMethod};
use crate::link::{BrokenReason, Exclusion, HttpOutcome, Link};
use crate::url::{redirect, strip_hash};
use reqwest::{Client, Method};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Checks one link in place.
///
/// Excluded links are left untouched. Links whose rebased URL is missing
/// or whose scheme is not accepted are marked `BLC_INVALID` without any
/// network traffic.
pub async fn check_link(
    link: &mut Link,
    client: &Client,
    cache: Option<&ResponseCache>,
    options: &CheckOptions,
) {
    if matches!(link.exclusion, Exclusion::Excluded(_)) {
        return;
    }

    let rebased = match &link.rebased_url {
        Some(rebased) => rebased.clone(),
        None => {
            link.break_with(BrokenReason::Invalid);
            return;
        }
    };

    if !options
        .accepted_schemes
        .iter()
        .any(|scheme| scheme == rebased.scheme())
    {
        link.break_with(BrokenReason::Invalid);
        return;
    }

    debug!(url = %rebased, "checking link");

    // keyed without the fragment so `page#a` and `page#b` share one entry
    let cache_key = strip_hash(&rebased);
    match cache {
        Some(cache) => match cache.begin(cache_key.as_str()) {
            Lookup::Ready(shared) => apply_result(link, &shared, true),
            Lookup::Join(waiter) => {
                let shared = cache::join(waiter).await;
                apply_result(link, &shared, true);
            }
            Lookup::Miss(claim) => {
                let result = perform_request(client, &rebased, options).await;
                let shared = claim.complete(result);
                apply_result(link, &shared, false);
            }
        },
        None => {
            let shared: SharedResult =
                Arc::new(perform_request(client, &rebased, options).await);
            apply_result(link, &shared, false);
        }
    }
}

/// One transaction with the configured method, retrying a rejected HEAD
/// with GET when `retry-405-head` is on
async fn perform_request(client: &Client, url: &Url, options: &CheckOptions) -> HttpResult {
    let method = options.request_method.as_method();
    let result = http::request(client, method, url, options).await;

    let head_rejected = options.retry_405_head
        && options.request_method == RequestMethod::Head
        && matches!(&result, Ok(response) if response.status == 405);
    if head_rejected {
        debug!(url = %url, "HEAD rejected with 405, retrying with GET");
        return http::request(client, Method::GET, url, options).await;
    }

    result
}

fn apply_result(link: &mut Link, result: &HttpResult, cached: bool) {
    link.response_was_cached = Some(cached);

    match result {
        Ok(response) => {
            let moved = link
                .rebased_url
                .as_ref()
                .map(|rebased| strip_hash(rebased) != response.url)
                .unwrap_or(false);
            if moved {
                redirect(link, response.url.as_str());
            }
            if (200..=299).contains(&response.status) {
                link.mend(response.clone());
            } else {
                link.response = Some(HttpOutcome::Response(response.clone()));
                link.break_with(BrokenReason::HttpStatus(response.status));
            }
        }
        Err(failure) => {
            link.response = Some(HttpOutcome::Failed(failure.clone()));
            let reason = match &failure.code {
                Some(code) => BrokenReason::Errno(code.clone()),
                None => BrokenReason::Unknown,
            };
            link.break_with(reason);
        }
    }
}
