use url::{ParseError, Url};

use crate::config::RedirectorRule;

/// Turn an href into an absolute URL.
///
/// Redirector links that carry their destination in a query parameter are
/// unwrapped to that destination. Relative links are resolved against
/// `base`. Returns `None` when the href cannot be parsed at all.
pub fn make_absolute_url(raw: &str, base: &Url, redirectors: &[RedirectorRule]) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(destination) = unwrap_redirector(raw, base, redirectors) {
        log::debug!("Extracted real URL from redirector: {}", destination);
        return Some(destination);
    }

    match Url::parse(raw) {
        Ok(url) => Some(url.to_string()),
        Err(ParseError::RelativeUrlWithoutBase) => match base.join(raw) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                log::debug!("Failed to make absolute URL from {}: {}", raw, e);
                None
            }
        },
        Err(e) => {
            log::debug!("Failed to parse URL {}: {}", raw, e);
            None
        }
    }
}

fn unwrap_redirector(raw: &str, base: &Url, redirectors: &[RedirectorRule]) -> Option<String> {
    let url = base.join(raw).ok()?;
    let path = url.path().to_lowercase();

    redirectors
        .iter()
        .filter(|rule| path.contains(&rule.path_marker.to_lowercase()))
        .find_map(|rule| {
            url.query_pairs()
                .find(|(key, _)| key == rule.param.as_str())
                .map(|(_, value)| value.into_owned())
                .filter(|destination| is_valid_url(destination))
        })
}

/// An absolute, complete http(s) URL.
///
/// Rejects empty strings, truncated display URLs containing `...`, and any
/// other scheme.
pub fn is_valid_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() || url.contains("...") {
        return false;
    }

    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// `make_absolute_url` followed by `is_valid_url`.
pub fn absolute_http_url(raw: &str, base: &Url, redirectors: &[RedirectorRule]) -> Option<String> {
    if raw.contains("...") {
        return None;
    }
    make_absolute_url(raw, base, redirectors).filter(|url| is_valid_url(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UrlConfig;

    fn base() -> Url {
        Url::parse("https://example.com/news/list.html").unwrap()
    }

    fn rules() -> Vec<RedirectorRule> {
        UrlConfig::default().redirectors
    }

    #[test]
    fn test_redirector_is_unwrapped() {
        let href = "https://x.com/redirect?url=https%3A%2F%2Freal.com%2Fa";
        assert_eq!(
            make_absolute_url(href, &base(), &rules()),
            Some("https://real.com/a".to_string())
        );

        let relative = "/visit/link.do?url=http%3A%2F%2Fgov.example.cn%2Fart%2F1.html";
        assert_eq!(
            make_absolute_url(relative, &base(), &rules()),
            Some("http://gov.example.cn/art/1.html".to_string())
        );
    }

    #[test]
    fn test_relative_and_absolute() {
        assert_eq!(
            make_absolute_url("detail/42.html", &base(), &rules()),
            Some("https://example.com/news/detail/42.html".to_string())
        );
        assert_eq!(
            make_absolute_url("https://x.com/n", &base(), &rules()),
            Some("https://x.com/n".to_string())
        );
        assert_eq!(make_absolute_url("   ", &base(), &rules()), None);
        assert_eq!(make_absolute_url("http://[::1", &base(), &rules()), None);
    }

    #[test]
    fn test_is_valid_url() {
        assert!(is_valid_url("https://example.com/a"));
        assert!(is_valid_url("http://example.com"));
        assert!(!is_valid_url(""));
        assert!(!is_valid_url("https://example.com/very/long..."));
        assert!(!is_valid_url("javascript:void(0)"));
        assert!(!is_valid_url("mailto:someone@example.com"));
        assert!(!is_valid_url("/relative/path"));
    }

    #[test]
    fn test_absolute_http_url_filters_schemes() {
        assert_eq!(absolute_http_url("mailto:a@b.c", &base(), &rules()), None);
        assert_eq!(absolute_http_url("javascript:void(0)", &base(), &rules()), None);
        assert_eq!(
            absolute_http_url("/a", &base(), &rules()),
            Some("https://example.com/a".to_string())
        );
    }
}
