//! Baseline security response headers.

use axum::Router;
use axum::http::{HeaderName, HeaderValue, header};
use tower_http::set_header::SetResponseHeaderLayer;

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";

/// Content security policy: everything restricted to `'self'` plus a small
/// allow-list for the styling CDN and the managed backend.
#[derive(Debug, Clone)]
pub struct ContentSecurityPolicy {
    directives: Vec<(&'static str, Vec<String>)>,
}

impl ContentSecurityPolicy {
    pub fn new(connect_src: &[String]) -> Self {
        let own = |extra: &[&str]| -> Vec<String> {
            std::iter::once("'self'")
                .chain(extra.iter().copied())
                .map(str::to_string)
                .collect()
        };

        let mut connect = own(&[]);
        connect.extend(connect_src.iter().filter(|s| is_source_token(s)).cloned());

        Self {
            directives: vec![
                ("default-src", own(&[])),
                ("base-uri", own(&[])),
                ("form-action", own(&[])),
                ("script-src", own(&["'unsafe-inline'", TAILWIND_CDN])),
                ("style-src", own(&["'unsafe-inline'", TAILWIND_CDN])),
                ("img-src", own(&["data:", "https:"])),
                ("connect-src", connect),
                ("font-src", own(&["https:", "data:"])),
                ("object-src", vec!["'none'".to_string()]),
                ("media-src", own(&[])),
                ("frame-src", vec!["'none'".to_string()]),
                ("frame-ancestors", vec!["'none'".to_string()]),
            ],
        }
    }

    pub fn sources(&self, directive: &str) -> Option<&[String]> {
        self.directives
            .iter()
            .find(|(name, _)| *name == directive)
            .map(|(_, sources)| sources.as_slice())
    }

    pub fn header_value(&self) -> String {
        self.directives
            .iter()
            .map(|(name, sources)| format!("{} {}", name, sources.join(" ")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A configured origin must be a single visible token with no directive
/// separator, or it could break out of `connect-src`.
fn is_source_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_graphic() && b != b';' && b != b',')
}

const STATIC_HEADERS: &[(&str, &str)] = &[
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "DENY"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Add the security headers to every response of `router` that does not
/// already set them.
pub fn apply<S>(router: Router<S>, csp: &ContentSecurityPolicy) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let policy = HeaderValue::from_str(&csp.header_value())
        .unwrap_or_else(|_| HeaderValue::from_static("default-src 'self'"));
    let mut router = router.layer(SetResponseHeaderLayer::if_not_present(
        header::CONTENT_SECURITY_POLICY,
        policy,
    ));
    for &(name, value) in STATIC_HEADERS {
        router = router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }
    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_expected_directives() {
        let csp = ContentSecurityPolicy::new(&[
            "https://*.supabase.co".to_string(),
            "wss://*.supabase.co".to_string(),
        ]);
        let value = csp.header_value();
        assert!(value.starts_with("default-src 'self'; "));
        assert!(value.contains(
            "script-src 'self' 'unsafe-inline' https://cdn.tailwindcss.com"
        ));
        assert!(value.contains("connect-src 'self' https://*.supabase.co wss://*.supabase.co"));
        assert!(value.contains("object-src 'none'"));
        assert!(value.contains("frame-src 'none'"));
        assert!(value.contains("img-src 'self' data: https:"));
    }

    #[test]
    fn test_unsafe_connect_sources_are_dropped() {
        let csp = ContentSecurityPolicy::new(&[
            "https://ok.example.com".to_string(),
            "https://x.example.com; script-src *".to_string(),
            "".to_string(),
        ]);
        assert_eq!(
            csp.sources("connect-src").unwrap(),
            &["'self'".to_string(), "https://ok.example.com".to_string()]
        );
    }

    #[test]
    fn test_header_value_is_valid_http_header() {
        let csp = ContentSecurityPolicy::new(&[]);
        assert!(HeaderValue::from_str(&csp.header_value()).is_ok());
    }
}
