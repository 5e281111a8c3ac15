//! Micro-syntax parsers for attribute values that embed URLs

/// HTML whitespace, which is narrower than Unicode whitespace
const HTML_WHITESPACE: &[char] = &[' ', '\t', '\n', '\r', '\x0c'];

/// Trims leading and trailing HTML whitespace from an attribute value
pub fn trim_url_spaces(value: &str) -> &str {
    value.trim_matches(HTML_WHITESPACE)
}

/// Extracts the candidate URLs from a `srcset` attribute value.
///
/// Each image candidate is a URL optionally followed by a width or density
/// descriptor. Candidates are comma separated, but a URL may itself end in
/// a comma when it is directly followed by more non-whitespace, so the
/// split points are commas that sit at a candidate boundary.
pub fn parse_srcset(value: &str) -> Vec<String> {
    let mut urls = Vec::new();
    let mut rest = trim_url_spaces(value);

    while !rest.is_empty() {
        rest = rest.trim_start_matches(HTML_WHITESPACE).trim_start_matches(',');
        rest = rest.trim_start_matches(HTML_WHITESPACE);
        if rest.is_empty() {
            break;
        }

        // URL runs to the next whitespace; trailing commas belong to the
        // separator unless the URL is nothing but commas
        let url_end = rest
            .find(HTML_WHITESPACE)
            .unwrap_or(rest.len());
        let mut url = &rest[..url_end];
        rest = &rest[url_end..];

        let trimmed = url.trim_end_matches(',');
        if !trimmed.is_empty() {
            url = trimmed;
        }
        urls.push(url.to_string());

        // skip the descriptor up to the next comma
        if let Some(comma) = rest.find(',') {
            rest = &rest[comma + 1..];
        } else {
            break;
        }
    }

    urls
}

/// Extracts the URL from a `<meta http-equiv="refresh">` content value.
///
/// The value has the form `N; url=TARGET` with a case-insensitive `url`
/// key and optionally quoted target. Returns `None` when no URL part is
/// present (a pure-delay refresh).
pub fn parse_meta_refresh(content: &str) -> Option<String> {
    let (_, after) = content.split_once([';', ','])?;
    let after = trim_url_spaces(after);

    let rest = match after.get(..3) {
        Some(key) if key.eq_ignore_ascii_case("url") => {
            trim_url_spaces(&after[3..]).strip_prefix('=')?
        }
        _ => return None,
    };

    let mut url = trim_url_spaces(rest);
    if (url.starts_with('"') && url.ends_with('"') && url.len() >= 2)
        || (url.starts_with('\'') && url.ends_with('\'') && url.len() >= 2)
    {
        url = &url[1..url.len() - 1];
    }

    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}
