//! HTML link extraction
//!
//! Walks a parsed document and produces one [`Link`] per candidate URL
//! found in a recognized tag/attribute combination. Extraction always runs
//! at the widest filter level; combinations above the configured level are
//! dropped later during exclusion filtering so changing the level never
//! requires reparsing.
//!
//! Parsed documents are not `Send`, so parsing and scraping happen
//! synchronously on the calling task and only the resulting links travel
//! across await points.

mod element;
mod srcset;
mod tags;

pub use element::{condensed_text, css_selector, serialize_open_tag};
pub use srcset::{parse_meta_refresh, parse_srcset, trim_url_spaces};
pub use tags::{in_filter_level, is_image_combo, recursive, scrapable};

use crate::link::{HtmlMeta, Link};
use crate::robots::RobotsDirectives;
use crate::url::resolve;
use scraper::{ElementRef, Html};
use std::collections::HashMap;
use url::Url;

/// Extracts all candidate links from a parsed document.
///
/// The first `<base href>` anywhere in the document rebases every link,
/// matching browser behavior for malformed documents. When a directives
/// accumulator is given, every `<meta name=... content=...>` element is
/// cascaded into it before links are resolved.
///
/// # Arguments
///
/// * `doc` - Parsed document
/// * `page_url` - URL the document was fetched from, used as the base
/// * `robots` - Accumulator for `<meta name="robots">` style directives
pub fn scrape_document(
    doc: &Html,
    page_url: Option<&Url>,
    mut robots: Option<&mut RobotsDirectives>,
) -> Vec<Link> {
    let mut base_href: Option<String> = None;

    for node in doc.tree.root().descendants() {
        let element = match ElementRef::wrap(node) {
            Some(element) => element,
            None => continue,
        };
        match element.value().name() {
            "base" if base_href.is_none() => {
                if let Some(href) = element.value().attr("href") {
                    base_href = Some(trim_url_spaces(href).to_string());
                }
            }
            "meta" => {
                if let (Some(name), Some(content)) =
                    (element.value().attr("name"), element.value().attr("content"))
                {
                    if let Some(robots) = robots.as_deref_mut() {
                        robots.meta(name, content);
                    }
                }
            }
            _ => {}
        }
    }

    let mut links = Vec::new();

    for node in doc.tree.root().descendants() {
        let element = match ElementRef::wrap(node) {
            Some(element) => element,
            None => continue,
        };
        let tag_name = element.value().name();

        for (attr_name, value) in element.value().attrs() {
            if !scrapable(tag_name, attr_name) {
                continue;
            }

            let candidates = extract_candidates(&element, tag_name, attr_name, value);
            if candidates.is_empty() {
                continue;
            }

            let attrs: HashMap<String, String> = element
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            let selector = css_selector(&element);
            let text = condensed_text(&element);
            let tag = serialize_open_tag(&element);

            for candidate in candidates {
                let mut link = Link::new();
                link.html = Some(HtmlMeta {
                    tag_name: tag_name.to_string(),
                    attr_name: attr_name.to_string(),
                    attrs: attrs.clone(),
                    base_href: base_href.clone(),
                    index: links.len(),
                    offset_index: None,
                    location: None,
                    selector: selector.clone(),
                    text: text.clone(),
                    tag: tag.clone(),
                });
                resolve(&mut link, Some(&candidate), page_url);
                links.push(link);
            }
        }
    }

    links
}

/// Splits one attribute value into its candidate URLs.
///
/// Most attributes hold a single URL. `ping` holds a whitespace separated
/// list, `srcset`/`imagesrcset` use the image-candidate micro-syntax, and
/// `meta content` only counts when the element is an http-equiv refresh.
fn extract_candidates(
    element: &ElementRef,
    tag_name: &str,
    attr_name: &str,
    value: &str,
) -> Vec<String> {
    match (tag_name, attr_name) {
        ("meta", "content") => {
            let is_refresh = element
                .value()
                .attr("http-equiv")
                .is_some_and(|equiv| equiv.eq_ignore_ascii_case("refresh"));
            if is_refresh {
                parse_meta_refresh(value).into_iter().collect()
            } else {
                Vec::new()
            }
        }
        (_, "ping") => value
            .split_ascii_whitespace()
            .map(str::to_string)
            .collect(),
        (_, "srcset") | (_, "imagesrcset") => parse_srcset(value),
        // empty values stay; they resolve to the page itself
        _ => vec![trim_url_spaces(value).to_string()],
    }
}
