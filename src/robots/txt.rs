//! robots.txt evaluation

use robotstxt::DefaultMatcher;

/// A fetched robots.txt body, queried per URL.
///
/// The matcher itself is stateful, so a fresh one is built per query and
/// only the body text is retained.
#[derive(Debug, Clone)]
pub struct RobotsTxt {
    body: String,
}

impl RobotsTxt {
    pub fn new(body: String) -> Self {
        Self { body }
    }

    /// A permit-everything policy, used when no robots.txt could be fetched
    pub fn allow_all() -> Self {
        Self {
            body: String::new(),
        }
    }

    /// True when the agent may fetch the URL
    pub fn allows(&self, agent: &str, url: &str) -> bool {
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.body, agent, url)
    }
}
