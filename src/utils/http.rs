// src/utils/http.rs

//! HTTP client and HTML helpers.

use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::FetchConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &FetchConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .build()?;
    Ok(client)
}

/// Extract the page title.
///
/// Looks at the first `<head>` in document order and returns the text of the
/// first `<title>` below it that has any text. A page without one yields an
/// empty string. Bytes that are not UTF-8 are replaced before parsing.
pub fn extract_title(content: &[u8]) -> Result<String> {
    let text = String::from_utf8_lossy(content);
    let document = Html::parse_document(&text);

    let head_sel = parse_selector("head")?;
    let title_sel = parse_selector("title")?;

    let Some(head) = document.select(&head_sel).next() else {
        return Ok(String::new());
    };

    let title = head
        .select(&title_sel)
        .find_map(|title| title.text().next())
        .unwrap_or_default();
    Ok(title.to_string())
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::parse(format!("selector '{s}': {e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_title() {
        let html = b"<html><head><title>Hi</title></head><body>v1</body></html>";
        assert_eq!(extract_title(html).unwrap(), "Hi");
    }

    #[test]
    fn test_missing_title_is_empty() {
        assert_eq!(extract_title(b"<html><body>x</body></html>").unwrap(), "");
        assert_eq!(extract_title(b"").unwrap(), "");
        assert_eq!(extract_title(b"<title></title>").unwrap(), "");
    }

    #[test]
    fn test_title_outside_head_ignored() {
        let html = b"<html><head></head><body><svg><title>icon</title></svg></body></html>";
        assert_eq!(extract_title(html).unwrap(), "");
    }

    #[test]
    fn test_first_title_wins() {
        let html = b"<head><title>One</title><title>Two</title></head>";
        assert_eq!(extract_title(html).unwrap(), "One");
    }

    #[test]
    fn test_malformed_html_tolerated() {
        let html = b"<html><head><title>Broken</title><body><p>unclosed <div>";
        assert_eq!(extract_title(html).unwrap(), "Broken");
    }

    #[test]
    fn test_non_utf8_bytes_tolerated() {
        let mut html = b"<head><title>caf".to_vec();
        html.push(0xE9);
        html.extend_from_slice(b"</title></head>");
        assert_eq!(extract_title(&html).unwrap(), "caf\u{FFFD}");
    }

    #[test]
    fn test_create_client() {
        assert!(create_async_client(&FetchConfig::default()).is_ok());
    }
}
