//! Resolution of candidate URLs against document bases
//!
//! A link carries up to three interpretations of its URL:
//!
//! - `resolved_url`: the candidate against the caller-supplied base
//! - `rebased_url`: the candidate against the base after applying the
//!   document's `<base href>`
//! - `redirected_url`: the final URL the server redirected to
//!
//! Checking always uses the rebased interpretation (browsers honor `<base>`)
//! while internal/same-page classification compares against the caller's
//! base.

use crate::link::Link;
use crate::url::compare::{same_origin, same_page};
use url::Url;

/// Returns a copy of the URL with its fragment removed
pub fn strip_hash(url: &Url) -> Url {
    let mut stripped = url.clone();
    stripped.set_fragment(None);
    stripped
}

/// Populates a link's URL interpretations from a candidate and a base.
///
/// Unparseable inputs leave the corresponding field `None` rather than
/// failing; a link with no `rebased_url` is later marked `BLC_INVALID`.
///
/// # Arguments
///
/// * `link` - Link to populate; its `html.base_href` participates in rebasing
/// * `url` - Raw candidate exactly as it appeared
/// * `base` - URL of the document the candidate appeared on
pub fn resolve(link: &mut Link, url: Option<&str>, base: Option<&Url>) {
    let base_href = link.html.as_ref().and_then(|html| html.base_href.clone());

    link.original_url = url.map(str::to_string);

    let resolved_base = base.map(strip_hash);

    // <base href> is itself resolved against the document URL. A value that
    // does not parse is ignored, as browsers do.
    let rebased_base = match (&resolved_base, &base_href) {
        (Some(resolved), Some(href)) => Url::options()
            .base_url(Some(resolved))
            .parse(href)
            .ok()
            .map(|rebased| strip_hash(&rebased))
            .or_else(|| Some(resolved.clone())),
        (Some(resolved), None) => Some(resolved.clone()),
        (None, Some(href)) => Url::parse(href).ok().map(|rebased| strip_hash(&rebased)),
        (None, None) => None,
    };

    link.resolved_base_url = resolved_base.clone();
    link.rebased_base_url = rebased_base.clone();

    let candidate = match url {
        Some(candidate) => candidate,
        None => {
            relation(link);
            return;
        }
    };

    if let Ok(absolute) = Url::parse(candidate) {
        // an absolute candidate is immune to <base>
        link.resolved_url = Some(absolute.clone());
        link.rebased_url = Some(absolute);
    } else {
        link.resolved_url = resolved_base
            .as_ref()
            .and_then(|base| Url::options().base_url(Some(base)).parse(candidate).ok());
        link.rebased_url = match &rebased_base {
            Some(base) => Url::options().base_url(Some(base)).parse(candidate).ok(),
            None => link.resolved_url.clone(),
        };
    }

    relation(link);
}

/// Records the final URL of a redirect chain.
///
/// An unparseable redirect target leaves the previous value in place; a
/// redirect is never unset once observed.
pub fn redirect(link: &mut Link, url: &str) {
    if let Ok(target) = Url::parse(url) {
        link.redirected_url = Some(target);
        relation(link);
    }
}

/// Recomputes `is_internal` and `is_same_page`.
///
/// Classification compares the redirect target when one exists, otherwise
/// the rebased URL, against the caller's base. Both flags stay `None` when
/// either side is missing.
pub fn relation(link: &mut Link) {
    let target = link.redirected_url.as_ref().or(link.rebased_url.as_ref());
    match (target, link.resolved_base_url.as_ref()) {
        (Some(target), Some(base)) => {
            link.is_internal = Some(same_origin(target, base));
            link.is_same_page = Some(same_page(target, base));
        }
        _ => {
            link.is_internal = None;
            link.is_same_page = None;
        }
    }
}
