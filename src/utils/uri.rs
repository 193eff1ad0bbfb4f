//! `personium-localunit:` scheme handling and URL comparison.
//!
//! Cells on the same deployment may be referenced either by their full
//! URL (`https://unit.example/cell1/`) or by the unit-relative alias
//! (`personium-localunit:/cell1/`). Every comparison in the broker goes
//! through the resolver so both spellings compare equal in both
//! directions.

use url::Url;

/// Scheme prefix for unit-relative cell references.
pub const LOCALUNIT_SCHEME: &str = "personium-localunit:";

/// Resolves localunit aliases against a deployment's unit root URL.
#[derive(Debug, Clone)]
pub struct UnitUrlResolver {
    /// Unit root URL with a trailing slash.
    unit_url: String,
}

impl UnitUrlResolver {
    pub fn new(unit_url: impl Into<String>) -> Self {
        let mut unit_url = unit_url.into();
        if !unit_url.ends_with('/') {
            unit_url.push('/');
        }
        Self { unit_url }
    }

    pub fn unit_url(&self) -> &str {
        &self.unit_url
    }

    /// Convert a localunit alias to its http(s) form. Handles both the
    /// double-colon form (`personium-localunit:cell1:/path`) and the
    /// single-colon form (`personium-localunit:/cell1/`). Other URLs
    /// pass through unchanged.
    pub fn to_http(&self, url: &str) -> String {
        let Some(rest) = url.strip_prefix(LOCALUNIT_SCHEME) else {
            return url.to_string();
        };
        if let Some((cell, path)) = rest.split_once(":/") {
            if !cell.is_empty() {
                return format!("{}{}/{}", self.unit_url, cell, path.trim_start_matches('/'));
            }
        }
        format!("{}{}", self.unit_url, rest.trim_start_matches('/'))
    }

    /// Convert a URL under this unit to its localunit alias. URLs
    /// outside the unit pass through unchanged.
    pub fn to_localunit(&self, url: &str) -> String {
        match url.strip_prefix(self.unit_url.as_str()) {
            Some(rest) => format!("{}/{}", LOCALUNIT_SCHEME, rest),
            None => url.to_string(),
        }
    }

    /// Canonical form used for comparisons: http(s) spelling with a
    /// trailing slash.
    pub fn normalize(&self, url: &str) -> String {
        let mut http = self.to_http(url);
        if !http.ends_with('/') {
            http.push('/');
        }
        http
    }

    /// The spellings a stored reference to `url` may use: http(s) form
    /// and, for same-unit cells, the localunit alias.
    pub fn variations(&self, url: &str) -> Vec<String> {
        let http = self.normalize(url);
        let localunit = self.to_localunit(&http);
        if localunit == http {
            vec![http]
        } else {
            vec![http, localunit]
        }
    }

    /// Equality after normalization, ignoring an explicit port.
    pub fn urls_equal(&self, a: &str, b: &str) -> bool {
        let a = self.normalize(a);
        let b = self.normalize(b);
        if a == b {
            return true;
        }
        match (Url::parse(&a), Url::parse(&b)) {
            (Ok(ua), Ok(ub)) => {
                ua.scheme() == ub.scheme()
                    && ua.host_str() == ub.host_str()
                    && ua.path() == ub.path()
            }
            _ => false,
        }
    }
}

/// Host component of an arbitrary URL.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

/// Reject URLs that are unparseable or carry line breaks (header
/// injection through p_target).
pub fn is_clean_url(url: &str) -> bool {
    if url.contains('\n') || url.contains('\r') {
        return false;
    }
    Url::parse(url).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> UnitUrlResolver {
        UnitUrlResolver::new("https://unit.example/")
    }

    #[test]
    fn localunit_single_colon_resolves_to_http() {
        let r = resolver();
        assert_eq!(
            r.to_http("personium-localunit:/cell1/"),
            "https://unit.example/cell1/"
        );
    }

    #[test]
    fn localunit_double_colon_resolves_to_http() {
        let r = resolver();
        assert_eq!(
            r.to_http("personium-localunit:cell1:/box/doc"),
            "https://unit.example/cell1/box/doc"
        );
    }

    #[test]
    fn http_converts_back_to_localunit() {
        let r = resolver();
        assert_eq!(
            r.to_localunit("https://unit.example/cell1/"),
            "personium-localunit:/cell1/"
        );
    }

    #[test]
    fn both_spellings_compare_equal_in_both_directions() {
        let r = resolver();
        assert!(r.urls_equal("personium-localunit:/cell1/", "https://unit.example/cell1/"));
        assert!(r.urls_equal("https://unit.example/cell1/", "personium-localunit:/cell1/"));
        assert!(!r.urls_equal("personium-localunit:/cell1/", "https://unit.example/cell2/"));
    }

    #[test]
    fn comparison_ignores_explicit_port() {
        let r = resolver();
        assert!(r.urls_equal(
            "https://unit.example:443/cell1/",
            "https://unit.example/cell1/"
        ));
    }

    #[test]
    fn foreign_urls_pass_through() {
        let r = resolver();
        assert_eq!(
            r.to_http("https://other.unit/cell9/"),
            "https://other.unit/cell9/"
        );
        assert_eq!(r.variations("https://other.unit/cell9/").len(), 1);
    }

    #[test]
    fn injection_urls_are_rejected() {
        assert!(!is_clean_url("https://evil.example/\r\nSet-Cookie: x"));
        assert!(!is_clean_url("not a url"));
        assert!(is_clean_url("https://unit.example/cell1/"));
    }
}
