//! Per-page robots directives
//!
//! Directives arrive from two places with equal weight: `<meta>` elements
//! in the document and `X-Robots-Tag` response headers. Values cascade in
//! the order they are seen, so a later `all` can undo an earlier
//! `nofollow`.

use std::collections::HashSet;

/// Accumulated robots directives for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotsDirectives {
    bot_name: String,
    directives: HashSet<String>,
}

impl RobotsDirectives {
    /// Creates an empty accumulator for the given bot name.
    ///
    /// Directives addressed to `robots` (everyone) or to this bot name are
    /// honored; directives addressed to other bots are ignored.
    pub fn new(bot_name: &str) -> Self {
        Self {
            bot_name: bot_name.to_ascii_lowercase(),
            directives: HashSet::new(),
        }
    }

    /// Applies a `<meta name=NAME content=VALUE>` element
    pub fn meta(&mut self, name: &str, content: &str) {
        let name = name.to_ascii_lowercase();
        if name == "robots" || name == self.bot_name {
            self.cascade(content);
        }
    }

    /// Applies an `X-Robots-Tag` header value.
    ///
    /// The value may carry an optional `botname:` prefix selecting the
    /// addressee; without one it applies to everyone.
    pub fn header(&mut self, value: &str) {
        if let Some((agent, rest)) = value.split_once(':') {
            let agent = agent.trim().to_ascii_lowercase();
            // a colon also appears inside directive arguments, e.g.
            // unavailable_after: 2026-01-01; a selector is a single token
            // that is not itself a directive name
            let selector = !agent.contains(',')
                && !agent.contains(' ')
                && !is_directive_name(&agent);
            if selector {
                if agent == "robots" || agent == self.bot_name {
                    self.cascade(rest);
                }
                return;
            }
        }
        self.cascade(value);
    }

    /// Cascades a comma separated directive list into the set.
    ///
    /// `all` clears everything accumulated so far and `none` expands to
    /// `noindex, nofollow`.
    pub fn cascade(&mut self, value: &str) {
        for directive in value.split(',') {
            let directive = directive.trim().to_ascii_lowercase();
            match directive.as_str() {
                "" => {}
                "all" => self.directives.clear(),
                "none" => {
                    self.directives.insert("noindex".to_string());
                    self.directives.insert("nofollow".to_string());
                }
                _ => {
                    self.directives.insert(directive);
                }
            }
        }
    }

    /// True when the named directive is in effect
    pub fn is(&self, directive: &str) -> bool {
        self.directives.contains(directive)
    }

    /// True when any of the named directives is in effect
    pub fn one_is(&self, directives: &[&str]) -> bool {
        directives.iter().any(|directive| self.is(directive))
    }

    /// Sorted list of directives in effect, for event reporting
    pub fn active(&self) -> Vec<String> {
        let mut active: Vec<String> = self.directives.iter().cloned().collect();
        active.sort();
        active
    }
}

fn is_directive_name(token: &str) -> bool {
    matches!(
        token,
        "all"
            | "none"
            | "noindex"
            | "nofollow"
            | "noarchive"
            | "nosnippet"
            | "noimageindex"
            | "notranslate"
            | "unavailable_after"
    )
}
