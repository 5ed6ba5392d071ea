use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Matches a file extension at the end of a path segment.
static EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.([A-Za-z0-9]+)$").expect("valid extension regex"));

/// Extension of the last path segment of `url`, if it has one.
fn path_extension(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    EXTENSION
        .captures(segment)
        .map(|caps| caps[1].to_string())
}

/// Derive the full-resolution URL for a raw attachment URL.
///
/// `https://host/media/abc.jpg` becomes
/// `https://host/media/abc.jpg?format=jpg&name=orig`. URLs without a
/// recognisable extension (or that don't parse) are returned unchanged.
#[must_use]
pub fn canonical_media_url(raw: &str) -> String {
    let Ok(url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let Some(ext) = path_extension(&url) else {
        return raw.to_string();
    };

    // The raw text is kept byte for byte; the parsed form only finds the extension.
    let separator = if url.query().is_some() { '&' } else { '?' };
    format!("{raw}{separator}format={ext}&name=orig")
}

/// File extension recorded for a canonical media URL.
///
/// Taken from the path, ignoring the query string; `None` when the path has
/// no extension.
#[must_use]
pub fn media_extension(url: &str) -> Option<String> {
    Url::parse(url).ok().and_then(|u| path_extension(&u))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_media_url_with_extension() {
        assert_eq!(
            canonical_media_url("https://example.com/abc.jpg"),
            "https://example.com/abc.jpg?format=jpg&name=orig"
        );
        assert_eq!(
            canonical_media_url("https://pbs.twimg.com/media/FxYz123.png"),
            "https://pbs.twimg.com/media/FxYz123.png?format=png&name=orig"
        );
    }

    #[test]
    fn test_canonical_media_url_keeps_raw_text() {
        let raw = "https://EXAMPLE.com:443/Media%20Dir/abc.jpg";
        let canonical = canonical_media_url(raw);
        assert!(canonical.starts_with(raw));
        assert_eq!(canonical, format!("{raw}?format=jpg&name=orig"));
        assert_eq!(
            canonical_media_url("https://EXAMPLE.com/abc.jpg"),
            "https://EXAMPLE.com/abc.jpg?format=jpg&name=orig"
        );
    }

    #[test]
    fn test_canonical_media_url_existing_query() {
        assert_eq!(
            canonical_media_url("https://example.com/abc.png?v=2"),
            "https://example.com/abc.png?v=2&format=png&name=orig"
        );
    }

    #[test]
    fn test_canonical_media_url_without_extension() {
        assert_eq!(
            canonical_media_url("https://example.com/media/abc"),
            "https://example.com/media/abc"
        );
        // A dot in the host is not an extension
        assert_eq!(
            canonical_media_url("https://example.com/"),
            "https://example.com/"
        );
    }

    #[test]
    fn test_canonical_media_url_unparseable() {
        assert_eq!(canonical_media_url("not a url.jpg"), "not a url.jpg");
    }

    #[test]
    fn test_media_extension() {
        assert_eq!(
            media_extension("https://example.com/abc.jpg?format=jpg&name=orig"),
            Some("jpg".to_string())
        );
        assert_eq!(media_extension("https://example.com/abc.webp"), Some("webp".to_string()));
        assert_eq!(media_extension("https://example.com/abc"), None);
        assert_eq!(media_extension("garbage"), None);
    }
}
