//! User-Agent strings for fetch requests.
//!
//! Many publisher hosts answer 403 to anything that does not look like a
//! browser, so the browser string is the default. The tool string identifies
//! the crawler for operators who prefer to be transparent.

/// Browser User-Agent sent by default.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// User-Agent identifying this tool and its version.
#[must_use]
pub fn tool_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("harvester/{version} (bulk-document-fetcher)")
}

/// Maps a configured value to a header: `browser`, `tool`, or a literal string.
#[must_use]
pub fn resolve(value: &str) -> String {
    match value.trim() {
        "" | "browser" => BROWSER_USER_AGENT.to_string(),
        "tool" => tool_user_agent(),
        literal => literal.to_string(),
    }
}
