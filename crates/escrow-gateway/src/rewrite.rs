//! Domain rewriting between the insecure and secure endpoint pair.
//!
//! Submission URLs are re-rendered against the secure endpoint so sensitive
//! POSTs land on the TLS host; redirect Location headers coming back out are
//! re-rendered against the insecure endpoint. When the two endpoints are
//! identical every rewrite is a byte-identity no-op.

use serde::Deserialize;

/// Marker attribute the templating layer attaches to escrow-bound forms.
pub const DATA_ESCROW: &str = "data-escrow";

/// One (protocol, host, port) triple.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Endpoint {
    pub protocol: String,
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
}

impl Endpoint {
    fn default_port(&self) -> u16 {
        if self.protocol == "https" {
            443
        } else {
            80
        }
    }

    fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.default_port())
    }

    /// Render an absolute URL for a path (with optional query attached).
    /// Default ports are elided.
    pub fn url_for(&self, path_and_query: &str) -> String {
        let port = self.effective_port();
        if port == self.default_port() {
            format!("{}://{}{}", self.protocol, self.host, path_and_query)
        } else {
            format!("{}://{}:{}{}", self.protocol, self.host, port, path_and_query)
        }
    }

    /// Does an absolute URL target this endpoint?
    fn matches(&self, url: &str) -> bool {
        match split_url(url) {
            Some((protocol, host, port, _)) => {
                protocol == self.protocol
                    && host == self.host
                    && port.unwrap_or_else(|| {
                        if protocol == "https" {
                            443
                        } else {
                            80
                        }
                    }) == self.effective_port()
            }
            None => false,
        }
    }
}

/// Split an absolute URL into (protocol, host, port, path_and_query).
/// Relative URLs and anything unparseable yield `None`.
fn split_url(url: &str) -> Option<(&str, &str, Option<u16>, &str)> {
    let (protocol, rest) = url.split_once("://")?;
    if protocol.is_empty() {
        return None;
    }
    let (authority, path_and_query) = match rest.find(['/', '?']) {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, ""),
    };
    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => (host, Some(port.parse().ok()?)),
        None => (authority, None),
    };
    if host.is_empty() {
        return None;
    }
    Some((protocol, host, port, path_and_query))
}

/// A submission URL plus the presentation hint for the templating layer.
/// Consumed by the view layer decorating escrow-bound forms, not by the
/// gateway's own request path.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub struct SubmissionRewrite {
    pub url: String,
    /// Attribute the form element should carry, e.g. `data-escrow="true"`.
    pub marker_attribute: (&'static str, &'static str),
}

/// Rewrites URLs between the insecure and secure endpoints.
#[derive(Debug, Clone)]
pub struct DomainRewriter {
    insecure: Endpoint,
    secure: Endpoint,
}

impl DomainRewriter {
    pub fn new(insecure: Endpoint, secure: Endpoint) -> Self {
        Self { insecure, secure }
    }

    /// True when the insecure and secure endpoints coincide. Tokens travel
    /// by cookie in this mode; otherwise by query parameter, since cookies
    /// set on one domain are not delivered back to the other.
    pub fn single_domain(&self) -> bool {
        self.insecure == self.secure
    }

    /// Rewrite a redirect Location from the secure endpoint back to the
    /// insecure one. Returns `None` (leave untouched) when the endpoints
    /// coincide, the URL is relative, or it is directed elsewhere.
    pub fn rewrite_location(&self, location: &str) -> Option<String> {
        if self.single_domain() || !self.secure.matches(location) {
            return None;
        }
        let (_, _, _, path_and_query) = split_url(location)?;
        let path_and_query = if path_and_query.is_empty() {
            "/"
        } else {
            path_and_query
        };
        Some(self.insecure.url_for(path_and_query))
    }

    /// Where the 303 after an escrow creation should point: the given path,
    /// re-rendered against the insecure endpoint when the domains differ.
    pub fn redirect_location(&self, path: &str) -> String {
        if self.single_domain() {
            path.to_string()
        } else {
            self.insecure.url_for(path)
        }
    }

    /// Rewrite a form submission URL to target the secure endpoint and
    /// attach the escrow marker hint. Identity on the URL when the
    /// endpoints coincide.
    #[allow(dead_code)]
    pub fn rewrite_submission(&self, path: &str) -> SubmissionRewrite {
        let url = if self.single_domain() {
            path.to_string()
        } else {
            self.secure.url_for(path)
        };
        SubmissionRewrite {
            url,
            marker_attribute: (DATA_ESCROW, "true"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insecure() -> Endpoint {
        Endpoint {
            protocol: "http".to_string(),
            host: "www.example.com".to_string(),
            port: None,
        }
    }

    fn secure() -> Endpoint {
        Endpoint {
            protocol: "https".to_string(),
            host: "ssl.example.com".to_string(),
            port: None,
        }
    }

    #[test]
    fn test_url_for_elides_default_port() {
        assert_eq!(secure().url_for("/a"), "https://ssl.example.com/a");
        let mut ep = secure();
        ep.port = Some(8443);
        assert_eq!(ep.url_for("/a"), "https://ssl.example.com:8443/a");
        ep.port = Some(443);
        assert_eq!(ep.url_for("/a"), "https://ssl.example.com/a");
    }

    #[test]
    fn test_split_url() {
        assert_eq!(
            split_url("https://h.example.com:8443/p?q=1"),
            Some(("https", "h.example.com", Some(8443), "/p?q=1"))
        );
        assert_eq!(
            split_url("http://h.example.com"),
            Some(("http", "h.example.com", None, ""))
        );
        assert_eq!(split_url("/relative/path"), None);
        assert_eq!(split_url("http://h.example.com:notaport/p"), None);
    }

    #[test]
    fn test_rewrite_location_secure_to_insecure() {
        let rewriter = DomainRewriter::new(insecure(), secure());
        assert_eq!(
            rewriter.rewrite_location("https://ssl.example.com/thanks?x=1"),
            Some("http://www.example.com/thanks?x=1".to_string())
        );
        // Bare authority still lands on the insecure root.
        assert_eq!(
            rewriter.rewrite_location("https://ssl.example.com"),
            Some("http://www.example.com/".to_string())
        );
    }

    #[test]
    fn test_rewrite_location_leaves_other_hosts_alone() {
        let rewriter = DomainRewriter::new(insecure(), secure());
        assert_eq!(rewriter.rewrite_location("https://elsewhere.com/x"), None);
        assert_eq!(rewriter.rewrite_location("/relative"), None);
        assert_eq!(
            rewriter.rewrite_location("http://ssl.example.com/x"),
            None,
            "protocol mismatch is not the secure endpoint"
        );
    }

    #[test]
    fn test_single_domain_is_identity() {
        let rewriter = DomainRewriter::new(insecure(), insecure());
        assert!(rewriter.single_domain());
        assert_eq!(rewriter.rewrite_location("http://www.example.com/x"), None);
        assert_eq!(rewriter.redirect_location("/thanks"), "/thanks");
        assert_eq!(rewriter.rewrite_submission("/pay").url, "/pay");
    }

    #[test]
    fn test_split_domains_rewrite_both_directions() {
        let rewriter = DomainRewriter::new(insecure(), secure());
        assert!(!rewriter.single_domain());
        assert_eq!(
            rewriter.redirect_location("/thanks"),
            "http://www.example.com/thanks"
        );
        let submission = rewriter.rewrite_submission("/pay");
        assert_eq!(submission.url, "https://ssl.example.com/pay");
        assert_eq!(submission.marker_attribute, (DATA_ESCROW, "true"));
    }
}
