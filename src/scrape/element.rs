//! Element metadata helpers
//!
//! These reconstruct presentation details about the element a link was
//! found on: its opening tag, a selector locating it, and its text content.

use scraper::ElementRef;

/// Serializes a reconstruction of the element's opening tag.
///
/// Attributes keep their document order, values are requoted with double
/// quotes and inner double quotes become `&quot;`.
///
/// Document order requires scraper's `deterministic` feature; without it
/// `attrs()` iterates a plain HashMap.
pub fn serialize_open_tag(element: &ElementRef) -> String {
    let mut tag = String::from("<");
    tag.push_str(element.value().name());
    for (name, value) in element.value().attrs() {
        tag.push(' ');
        tag.push_str(name);
        tag.push_str("=\"");
        if value.contains('"') {
            tag.push_str(&value.replace('"', "&quot;"));
        } else {
            tag.push_str(value);
        }
        tag.push('"');
    }
    tag.push('>');
    tag
}

/// Builds a CSS-like selector locating the element.
///
/// Each ancestor contributes a `tag:nth-child(n)` segment, where n counts
/// element siblings only. The unique `html`/`head`/`body` elements appear
/// bare, and an element that is itself one of those yields `None`.
pub fn css_selector(element: &ElementRef) -> Option<String> {
    if is_singleton(element.value().name()) {
        return None;
    }

    let mut segments = Vec::new();
    let mut current = *element;
    loop {
        let name = current.value().name();
        if is_singleton(name) {
            segments.push(name.to_string());
        } else {
            let position = 1 + current
                .prev_siblings()
                .filter(|sibling| sibling.value().is_element())
                .count();
            segments.push(format!("{}:nth-child({})", name, position));
        }

        match current.parent().and_then(ElementRef::wrap) {
            Some(parent) => current = parent,
            None => break,
        }
    }

    segments.reverse();
    Some(segments.join(" > "))
}

fn is_singleton(name: &str) -> bool {
    matches!(name, "html" | "head" | "body")
}

/// Concatenated descendant text with runs of whitespace condensed.
///
/// Returns `None` when the element has no children at all, distinguishing
/// `<a href=x></a>` from `<a href=x> </a>`.
pub fn condensed_text(element: &ElementRef) -> Option<String> {
    if element.children().next().is_none() {
        return None;
    }

    let mut text = String::new();
    for chunk in element.text() {
        for word in chunk.split_whitespace() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(word);
        }
    }
    Some(text)
}
