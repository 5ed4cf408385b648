//! Forbidden and rate-limited domain pattern lists.
//!
//! Patterns are plain substrings checked against the whole URL, not against a
//! parsed host. A bare `".jp"` entry therefore blocks every URL containing it,
//! and `"arxiv.org/abs"` blocks abstract pages while leaving PDFs reachable.
//! The curated lists rely on this behavior.

use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Paywalled publishers that ban crawling institutions when hit in bulk.
pub const DEFAULT_FORBIDDEN_PATTERNS: &[&str] = &[
    "acm.org",
    "ieee.org",
    "springer.com",
    "wiley.com",
    "sciencedirect.com",
    "elsevier.com",
    "scopus.com",
    "thomsonreuters.com",
    "nature.com",
    "sciencemag.org",
    "tandfonline.com",
    "researchgate.net",
    "arxiv.org/abs",
    "harvard.edu/abs",
];

/// Immutable, ordered list of URL substrings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Vec<String>")]
pub struct DomainPatterns {
    patterns: Vec<String>,
}

impl From<Vec<String>> for DomainPatterns {
    fn from(patterns: Vec<String>) -> Self {
        Self::new(patterns)
    }
}

impl DomainPatterns {
    /// Builds a list, dropping blank entries.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// The built-in forbidden list.
    #[must_use]
    pub fn default_forbidden() -> Self {
        Self::new(DEFAULT_FORBIDDEN_PATTERNS.iter().copied())
    }

    /// Parses one pattern per line. Blank lines and `#` comments are ignored.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(|line| line.split_once('#').map_or(line, |(before, _)| before)),
        )
    }

    /// Reads a pattern file.
    ///
    /// # Errors
    ///
    /// Returns the IO error if the file cannot be read.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        fs::read_to_string(path).map(|text| Self::parse(&text))
    }

    /// Returns the first pattern contained in `url`, if any.
    #[must_use]
    pub fn first_match(&self, url: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|pattern| url.contains(pattern.as_str()))
            .map(String::as_str)
    }

    /// Returns true if any pattern is contained in `url`.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.first_match(url).is_some()
    }

    /// Appends the patterns of `other`.
    pub fn extend(&mut self, other: Self) {
        self.patterns.extend(other.patterns);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Iterates over the patterns in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }
}
