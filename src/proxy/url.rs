//! Target URL reconstruction

use crate::{Error, Result};

/// Absolute target derived from an inbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Full absolute URL
    pub url: String,
    /// URL scheme (`http` or `https`)
    pub scheme: String,
    /// Authority (`host[:port]`) exactly as the client wrote it
    pub authority: String,
    /// Relative path plus query, the request target sent to the backend
    pub path: String,
}

/// Reconstruct the absolute target URL from the pieces of an inbound request.
///
/// `raw_path` is the request target before the query string. Clients speaking
/// proper proxy HTTP already send it in absolute form; origin-form targets
/// are completed with the connection's scheme and the host header. The `%3B`
/// fix-up restores legacy `;param=value` path parameters that some clients
/// percent-encode.
pub fn reconstruct(
    raw_path: &str,
    scheme: &str,
    host: &str,
    query: Option<&str>,
) -> Result<Target> {
    let mut url = if raw_path.starts_with("http://") || raw_path.starts_with("https://") {
        raw_path.to_string()
    } else {
        if host.is_empty() {
            return Err(Error::target("No host to complete a relative target"));
        }
        format!("{}://{}{}", scheme, host, raw_path)
    };

    if let Some(idx) = url.find("%3B") {
        let rest = url[idx + 3..].replace("%3D", "=");
        url.truncate(idx);
        url.push(';');
        url.push_str(&rest);
    }

    if let Some(query) = query {
        url.push('?');
        url.push_str(query);
    }

    split_absolute(url)
}

/// Split an absolute URL into scheme, authority and backend-relative path
fn split_absolute(url: String) -> Result<Target> {
    let scheme_end = url
        .find("://")
        .ok_or_else(|| Error::target(format!("Not an absolute URL: '{}'", url)))?;
    let scheme = url[..scheme_end].to_string();

    let rest = &url[scheme_end + 3..];
    let authority_end = rest.find(|c| c == '/' || c == '?').unwrap_or(rest.len());
    let authority = rest[..authority_end].to_string();
    if authority.is_empty() {
        return Err(Error::target(format!("No authority in '{}'", url)));
    }

    let remainder = &rest[authority_end..];
    let path = if remainder.is_empty() {
        "/".to_string()
    } else if remainder.starts_with('?') {
        format!("/{}", remainder)
    } else {
        remainder.to_string()
    };

    Ok(Target {
        url,
        scheme,
        authority,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_form_target() {
        let target = reconstruct("/a/b", "http", "example.com", None).unwrap();
        assert_eq!(target.url, "http://example.com/a/b");
        assert_eq!(target.scheme, "http");
        assert_eq!(target.authority, "example.com");
        assert_eq!(target.path, "/a/b");
    }

    #[test]
    fn test_absolute_form_target() {
        let target = reconstruct("http://example.com:8080/x", "http", "ignored", None).unwrap();
        assert_eq!(target.url, "http://example.com:8080/x");
        assert_eq!(target.authority, "example.com:8080");
        assert_eq!(target.path, "/x");
    }

    #[test]
    fn test_query_string_is_appended() {
        let target = reconstruct("/search", "http", "example.com", Some("q=1")).unwrap();
        assert_eq!(target.url, "http://example.com/search?q=1");
        assert_eq!(target.path, "/search?q=1");
    }

    #[test]
    fn test_encoded_path_parameters_are_restored() {
        let target = reconstruct("/item%3Bfoo%3Dbar", "http", "example.com", None).unwrap();
        assert_eq!(target.url, "http://example.com/item;foo=bar");
        assert_eq!(target.path, "/item;foo=bar");
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let target = reconstruct("http://example.com", "http", "", None).unwrap();
        assert_eq!(target.path, "/");

        let target = reconstruct("http://example.com", "http", "", Some("q=1")).unwrap();
        assert_eq!(target.path, "/?q=1");
    }

    #[test]
    fn test_relative_target_without_host_is_rejected() {
        assert!(reconstruct("/a", "http", "", None).is_err());
    }
}
