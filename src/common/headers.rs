//! Header classification and canonicalization
//!
//! Headers travel through the proxy as `Vec<(String, String)>` with names
//! lower-cased at parse time, so lookups are simple equality checks and the
//! order received is preserved.

/// Check if a header is hop-by-hop and must not cross the proxy
pub fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
            | "proxy-connection"
    )
}

/// Canonicalize a header name to conventional casing (`x-custom` -> `X-Custom`)
pub fn canonicalize(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Case-insensitive lookup in an ordered header list
pub fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_by_hop_set() {
        for name in [
            "connection",
            "keep-alive",
            "proxy-authenticate",
            "proxy-authorization",
            "te",
            "trailers",
            "transfer-encoding",
            "upgrade",
            "proxy-connection",
        ] {
            assert!(is_hop_by_hop(name), "{} should be hop-by-hop", name);
            assert!(is_hop_by_hop(&name.to_uppercase()));
        }

        assert!(!is_hop_by_hop("content-type"));
        assert!(!is_hop_by_hop("host"));
        assert!(!is_hop_by_hop("x-forwarded-for"));
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize("content-type"), "Content-Type");
        assert_eq!(canonicalize("x-forwarded-for"), "X-Forwarded-For");
        assert_eq!(canonicalize("host"), "Host");
    }

    #[test]
    fn test_header_value() {
        let headers = vec![
            ("host".to_string(), "example.com".to_string()),
            ("x-custom".to_string(), "v".to_string()),
        ];
        assert_eq!(header_value(&headers, "Host"), Some("example.com"));
        assert_eq!(header_value(&headers, "accept"), None);
    }
}
