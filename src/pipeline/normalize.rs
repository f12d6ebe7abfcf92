//! URL normalisation: turn a user-typed string into a canonical absolute URL.
//!
//! Pure and synchronous — this is the cheapest gate in the pipeline and the
//! only one that can reject input without any I/O. People paste anything
//! into a URL field ("example.com", " https://foo.bar ", "shop.de/katalog"),
//! so a missing scheme is repaired with `https://` rather than rejected;
//! everything else that fails to parse into an http(s) URL with a hostname
//! is an [`AnalyzeError::InvalidUrl`].

use crate::error::AnalyzeError;
use url::Url;

/// A validated, canonical absolute URL.
///
/// Invariant: the scheme is `http` or `https` and the hostname is non-empty.
/// Derived once per request and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUrl {
    url: Url,
    hostname: String,
}

impl NormalizedUrl {
    /// The canonical absolute URL string.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Normalise a raw user-supplied string into a [`NormalizedUrl`].
///
/// Trims whitespace, prepends `https://` when no `scheme://` prefix is
/// present (exactly once — an already-normalised URL round-trips unchanged),
/// and validates scheme and hostname.
pub fn normalize(raw: &str) -> Result<NormalizedUrl, AnalyzeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AnalyzeError::InvalidUrl {
            input: raw.to_string(),
            reason: "empty input".to_string(),
        });
    }

    let candidate = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|e| AnalyzeError::InvalidUrl {
        input: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(AnalyzeError::InvalidUrl {
                input: raw.to_string(),
                reason: format!("unsupported scheme '{other}'"),
            })
        }
    }

    let hostname = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => {
            return Err(AnalyzeError::InvalidUrl {
                input: raw.to_string(),
                reason: "missing hostname".to_string(),
            })
        }
    };

    Ok(NormalizedUrl { url, hostname })
}

/// Whether the string already starts with a `scheme://` prefix.
///
/// A scheme per RFC 3986 is a letter followed by letters, digits, `+`, `-`,
/// or `.`. Anything else before `://` (spaces, a bare host with a path) is
/// not a scheme, and `https://` gets prepended.
fn has_scheme(s: &str) -> bool {
    match s.find("://") {
        Some(0) | None => false,
        Some(idx) => {
            let prefix = &s[..idx];
            prefix
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic())
                && prefix
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepends_https_exactly_once() {
        let first = normalize("example.com").unwrap();
        assert_eq!(first.as_str(), "https://example.com/");

        // Idempotent: normalising the normalised form yields the same string.
        let second = normalize(first.as_str()).unwrap();
        assert_eq!(second.as_str(), first.as_str());
        assert!(!second.as_str().contains("https://https://"));
    }

    #[test]
    fn keeps_existing_http_scheme() {
        let url = normalize("http://example.com/shop?id=1").unwrap();
        assert_eq!(url.as_str(), "http://example.com/shop?id=1");
        assert_eq!(url.hostname(), "example.com");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let url = normalize("  example.com/page  ").unwrap();
        assert_eq!(url.as_str(), "https://example.com/page");
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(
            normalize(""),
            Err(AnalyzeError::InvalidUrl { .. })
        ));
        assert!(matches!(
            normalize("   "),
            Err(AnalyzeError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn rejects_unparseable_input() {
        assert!(matches!(
            normalize("not a url at all"),
            Err(AnalyzeError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(matches!(
            normalize("ftp://example.com"),
            Err(AnalyzeError::InvalidUrl { .. })
        ));
        assert!(matches!(
            normalize("file:///etc/passwd"),
            Err(AnalyzeError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn keeps_ports_and_paths() {
        let url = normalize("shop.example:8080/katalog").unwrap();
        assert_eq!(url.as_str(), "https://shop.example:8080/katalog");
    }

    #[test]
    fn scheme_detection_ignores_later_separators() {
        // "://" appearing after non-scheme characters is not a scheme.
        let url = normalize("example.com/redirect?to=https://other.example").unwrap();
        assert!(url.as_str().starts_with("https://example.com/"));
    }
}
