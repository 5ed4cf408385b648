//! Input line parsing and URL normalization.
//!
//! Each line is `<identifier>\t<url>[\t...]`. Extra fields are ignored and
//! blank lines are skipped. The URL lists this tool is fed were scraped from
//! many sources, so a handful of recurring defects are repaired before
//! parsing (see [`normalize_url`]).

use url::Url;

use crate::fetch::FetchError;

/// Host prepended to PubMed Central links that arrive without one.
const PMC_HOST: &str = "https://www.ncbi.nlm.nih.gov";

/// One parsed input record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// 1-based line number in the input file.
    pub line: u64,
    /// Dedup key and artifact file stem.
    pub id: String,
    /// The URL as it appeared in the input.
    pub raw_url: String,
    /// The URL after [`normalize_url`].
    pub url: String,
}

impl WorkItem {
    /// Parses the normalized URL and extracts its host.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::MalformedInput`] for unparseable URLs, schemes
    /// other than http/https, and URLs without a host.
    pub fn target(&self) -> Result<(Url, String), FetchError> {
        let parsed = Url::parse(&self.url)
            .map_err(|e| FetchError::malformed(self.line, format!("invalid URL '{}': {e}", self.url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::malformed(
                self.line,
                format!("unsupported scheme '{}' in '{}'", parsed.scheme(), self.url),
            ));
        }
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .ok_or_else(|| FetchError::malformed(self.line, format!("no host in '{}'", self.url)))?;
        Ok((parsed, host))
    }
}

/// Parses one input line.
///
/// Returns `Ok(None)` for blank lines.
///
/// # Errors
///
/// Returns [`FetchError::MalformedInput`] when the line has no URL field or
/// the identifier cannot be used as a file stem.
pub fn parse_line(line_number: u64, line: &str) -> Result<Option<WorkItem>, FetchError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let mut fields = line.split('\t');
    let id = fields.next().unwrap_or_default().trim();
    let raw_url = fields
        .next()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| FetchError::malformed(line_number, "expected <identifier>\\t<url>"))?;

    validate_identifier(id).map_err(|reason| FetchError::malformed(line_number, reason))?;

    Ok(Some(WorkItem {
        line: line_number,
        id: id.to_string(),
        raw_url: raw_url.to_string(),
        url: normalize_url(raw_url),
    }))
}

/// Rejects identifiers that would not map to a single file in a flat directory.
///
/// # Errors
///
/// Returns a human-readable reason.
pub fn validate_identifier(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("empty identifier".to_string());
    }
    if id == "." || id == ".." {
        return Err(format!("identifier '{id}' is a relative path"));
    }
    if id.contains(['/', '\\', '\0']) {
        return Err(format!("identifier '{id}' contains a path separator"));
    }
    Ok(())
}

/// Repairs the malformed URL shapes seen in scraped link lists.
///
/// - `/pmc/articles/...` gets the PubMed Central host.
/// - `://host/...` and `//host/...` get an `http` scheme.
/// - A bare `host/path` gets `http://`.
///
/// Anything else is returned trimmed but unchanged.
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("/pmc/articles/") {
        return format!("{PMC_HOST}{raw}");
    }
    if let Some(rest) = raw.strip_prefix("://") {
        return format!("http://{rest}");
    }
    if raw.starts_with("//") {
        return format!("http:{raw}");
    }
    if !raw.starts_with('/') && !raw.contains("://") {
        return format!("http://{raw}");
    }
    raw.to_string()
}
