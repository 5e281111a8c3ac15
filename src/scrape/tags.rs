//! Tag and attribute tables driving link extraction
//!
//! Filter levels are cumulative: level 0 is anchors only, level 1 adds
//! media and metadata, level 2 adds pings and legacy embeds, level 3 adds
//! everything down to microdata. Scraping always collects at level 3 and
//! exclusion filtering later drops combinations above the configured level,
//! so a raised level never requires rescraping.

/// Clickable links
pub const LEVEL_0: &[(&str, &str)] = &[("a", "href"), ("area", "href")];

/// Media, iframes, meta refresh
pub const LEVEL_1_ADDITIONS: &[(&str, &str)] = &[
    ("audio", "src"),
    ("embed", "src"),
    ("iframe", "src"),
    ("img", "src"),
    ("img", "srcset"),
    ("input", "src"),
    ("menuitem", "icon"),
    ("meta", "content"),
    ("object", "data"),
    ("source", "src"),
    ("source", "srcset"),
    ("track", "src"),
    ("video", "poster"),
    ("video", "src"),
];

/// Stylesheets, scripts, forms, pings
pub const LEVEL_2_ADDITIONS: &[(&str, &str)] = &[
    ("a", "ping"),
    ("area", "ping"),
    ("body", "background"),
    ("frame", "src"),
];

/// Metadata, citations, microdata. The `*` tag matches any element.
pub const LEVEL_3_ADDITIONS: &[(&str, &str)] = &[
    ("blockquote", "cite"),
    ("button", "formaction"),
    ("del", "cite"),
    ("form", "action"),
    ("head", "profile"),
    ("html", "manifest"),
    ("input", "formaction"),
    ("ins", "cite"),
    ("link", "href"),
    ("link", "imagesrcset"),
    ("q", "cite"),
    ("script", "src"),
    ("*", "itemtype"),
];

/// Combinations whose targets are themselves crawlable HTML documents
pub const RECURSIVE: &[(&str, &str)] = &[
    ("a", "href"),
    ("area", "href"),
    ("blockquote", "cite"),
    ("del", "cite"),
    ("frame", "src"),
    ("iframe", "src"),
    ("ins", "cite"),
    ("meta", "content"),
    ("q", "cite"),
];

/// Combinations that reference images, for `noimageindex` handling
const IMAGE_COMBOS: &[(&str, &str)] = &[
    ("img", "src"),
    ("img", "srcset"),
    ("input", "src"),
    ("menuitem", "icon"),
    ("video", "poster"),
];

fn table_for(level: u8) -> &'static [&'static [(&'static str, &'static str)]] {
    match level {
        0 => &[LEVEL_0],
        1 => &[LEVEL_0, LEVEL_1_ADDITIONS],
        2 => &[LEVEL_0, LEVEL_1_ADDITIONS, LEVEL_2_ADDITIONS],
        _ => &[
            LEVEL_0,
            LEVEL_1_ADDITIONS,
            LEVEL_2_ADDITIONS,
            LEVEL_3_ADDITIONS,
        ],
    }
}

/// True when the tag/attribute combination is a link at the given level
pub fn in_filter_level(level: u8, tag: &str, attr: &str) -> bool {
    table_for(level)
        .iter()
        .flat_map(|table| table.iter())
        .any(|(t, a)| *a == attr && (*t == tag || *t == "*"))
}

/// True when the combination is scraped at all (i.e. a link at level 3)
pub fn scrapable(tag: &str, attr: &str) -> bool {
    in_filter_level(3, tag, attr)
}

/// True when the combination's target should be crawled as a page
pub fn recursive(tag: &str, attr: &str) -> bool {
    RECURSIVE.iter().any(|(t, a)| *t == tag && *a == attr)
}

/// True when the combination references an image resource
pub fn is_image_combo(tag: &str, attr: &str) -> bool {
    IMAGE_COMBOS.iter().any(|(t, a)| *t == tag && *a == attr)
}
