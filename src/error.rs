/// Unified error type for list detection and scraping.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// No list container could be located on the page.
    #[error("Unable to find list on page{}", selector_suffix(.0))]
    NotFound(Option<String>),

    /// A container was found but segmenting it produced no usable items.
    #[error("No list items found in container {0}")]
    NoItemsFound(String),

    /// The selected container lives in a frame the page may not read.
    #[error("Cannot access iframe content at {src} (cross-origin restriction). Open {src} directly and run the scraper on that page.")]
    CrossOriginAccess { src: String },

    /// The selector-like descriptor could not be parsed.
    #[error("Invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// A scrape is already running on this engine.
    #[error("Scraping already in progress")]
    AlreadyRunning,
}

fn selector_suffix(selector: &Option<String>) -> String {
    match selector {
        Some(s) => format!(" (selector: {s})"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = ScrapeError::NotFound(None);
        assert_eq!(err.to_string(), "Unable to find list on page");

        let err = ScrapeError::NotFound(Some("#results".to_string()));
        assert!(err.to_string().contains("#results"));
    }

    #[test]
    fn test_cross_origin_mentions_remediation() {
        let err = ScrapeError::CrossOriginAccess {
            src: "https://other.example/list".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("cross-origin"));
        assert!(message.contains("Open https://other.example/list directly"));
    }
}
