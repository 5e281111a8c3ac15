//! Keyword patterns for URL exclusion
//!
//! Patterns without a `*` match as plain substrings. Patterns with `*`
//! treat it as a wildcard spanning any run of characters, anchored at both
//! ends, so `https://ads.*` matches only URLs that start with
//! `https://ads.` while `*tracker*` matches anywhere.

/// Tests a candidate URL against one keyword pattern
///
/// # Arguments
///
/// * `pattern` - Keyword or glob pattern from the excluded-keywords option
/// * `candidate` - Full URL string to test
pub fn matches_keyword(pattern: &str, candidate: &str) -> bool {
    if !pattern.contains('*') {
        return candidate.contains(pattern);
    }

    let segments: Vec<&str> = pattern.split('*').collect();
    let mut position = 0;

    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }

        if i == 0 {
            // pattern does not start with '*', anchor at the beginning
            if !candidate.starts_with(segment) {
                return false;
            }
            position = segment.len();
        } else if i == segments.len() - 1 {
            // pattern does not end with '*', anchor at the end
            let remainder = &candidate[position..];
            if !remainder.ends_with(segment) || remainder.len() < segment.len() {
                return false;
            }
            position = candidate.len();
        } else {
            match candidate[position..].find(segment) {
                Some(found) => position = position + found + segment.len(),
                None => return false,
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_pattern_is_substring() {
        assert!(matches_keyword("ads", "https://example.com/ads/banner"));
        assert!(!matches_keyword("ads", "https://example.com/news"));
    }

    #[test]
    fn test_leading_anchor() {
        assert!(matches_keyword("https://ads.*", "https://ads.example.com/x"));
        assert!(!matches_keyword("https://ads.*", "https://example.com/https://ads."));
    }

    #[test]
    fn test_trailing_anchor() {
        assert!(matches_keyword("*.pdf", "https://example.com/doc.pdf"));
        assert!(!matches_keyword("*.pdf", "https://example.com/doc.pdf?x=1"));
    }

    #[test]
    fn test_middle_wildcard() {
        assert!(matches_keyword("https://*/private/*", "https://example.com/private/a"));
        assert!(!matches_keyword("https://*/private/*", "https://example.com/public/a"));
    }

    #[test]
    fn test_double_sided_wildcard() {
        assert!(matches_keyword("*tracker*", "https://x.com/tracker.js"));
    }

    #[test]
    fn test_ordered_segments() {
        assert!(matches_keyword("*a*b*", "xaxbx"));
        assert!(!matches_keyword("*a*b*", "xbxax"));
    }
}
