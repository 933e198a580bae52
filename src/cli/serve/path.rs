//! Request URL helpers.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// Split a request target into its path and raw query (without the `?`).
pub fn split_query(url: &str) -> (&str, &str) {
    url.split_once('?').unwrap_or((url, ""))
}

/// Percent-decode `s`, keeping it unchanged when the result is not UTF-8.
pub fn decode(s: &str) -> Cow<'_, str> {
    percent_decode_str(s).decode_utf8().unwrap_or(Cow::Borrowed(s))
}

/// First value of `key` in a form-encoded query string.
pub fn query_param(query: &str, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Decoded repository-relative path below a route prefix such as `/repo/`.
pub fn rel_below<'a>(path: &'a str, prefix: &str) -> Cow<'a, str> {
    decode(path.strip_prefix(prefix).unwrap_or(path).trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_query() {
        assert_eq!(split_query("/api/search?q=x"), ("/api/search", "q=x"));
        assert_eq!(split_query("/file/a.md"), ("/file/a.md", ""));
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode("docs/a%20b.md"), "docs/a b.md");
        assert_eq!(decode("plain"), "plain");
        // Invalid UTF-8 is left as written
        assert_eq!(decode("%ff.md"), "%ff.md");
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param("path=docs%2Fa.md", "path").as_deref(), Some("docs/a.md"));
        assert_eq!(query_param("q=hello+world&x=1", "q").as_deref(), Some("hello world"));
        assert_eq!(query_param("x=1", "q"), None);
        assert_eq!(query_param("", "q"), None);
    }

    #[test]
    fn test_rel_below() {
        assert_eq!(rel_below("/repo/img/logo%20x.svg", "/repo/"), "img/logo x.svg");
        assert_eq!(rel_below("/img/a.png", "/"), "img/a.png");
        assert_eq!(rel_below("/", "/"), "");
    }
}
