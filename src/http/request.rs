//! Request identification and normalization.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) for tracing
//! - Reconstruct the client-facing origin from a fixed `ORIGIN` or from
//!   validated proxy headers
//! - Derive the client address, honouring `x-forwarded-for` depth
//!
//! # Design Decisions
//! - Proxy headers are trusted only after syntactic validation; anything
//!   else is silently ignored and the request's own values are kept
//! - The original header map is never mutated; the normalized request
//!   carries a modified clone

use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use axum::body::Body;
use axum::http::header::{HeaderMap, HeaderName, HeaderValue, HOST};
use axum::http::request::Parts;
use axum::http::{Method, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use url::Url;
use uuid::Uuid;

use crate::config::{AdapterConfig, ProxyHeaderConfig};

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Address used when neither a header nor the socket names the client.
pub const FALLBACK_CLIENT_ADDRESS: &str = "127.0.0.1";

/// Generates a fresh UUID v4 for every request lacking an `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestUuid;

impl MakeRequestId for RequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Read the request ID set by the request-id layer.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// A request as the framework renderer sees it.
#[derive(Debug)]
pub struct NormalizedRequest {
    pub method: Method,
    /// Absolute URL with the effective origin applied.
    pub url: Url,
    /// Cloned headers; `x-forwarded-for` holds the derived client address
    /// when an address header is configured.
    pub headers: HeaderMap,
    pub body: Body,
    pub client_address: String,
}

/// Rewrites origin and client address from configuration and proxy headers.
#[derive(Debug, Clone)]
pub struct RequestNormalizer {
    origin: Option<Url>,
    xff_depth: usize,
    headers: ProxyHeaderConfig,
}

impl RequestNormalizer {
    pub fn new(config: &AdapterConfig) -> Self {
        Self {
            origin: config.origin.clone(),
            xff_depth: config.xff_depth.max(1),
            headers: config.headers.clone(),
        }
    }

    /// Build the renderer-facing request from the raw request head and body.
    pub fn normalize(&self, parts: &Parts, body: Body, peer: Option<SocketAddr>) -> NormalizedRequest {
        let url = self.effective_url(parts);
        let mut headers = parts.headers.clone();

        let client_address = match self.forwarded_address(&parts.headers) {
            Some(address) => {
                if let Ok(value) = HeaderValue::from_str(&address) {
                    headers.insert(X_FORWARDED_FOR, value);
                }
                address
            }
            None => peer_address(peer),
        };

        NormalizedRequest {
            method: parts.method.clone(),
            url,
            headers,
            body,
            client_address,
        }
    }

    /// The absolute URL the client used, as far as it can be trusted.
    pub fn effective_url(&self, parts: &Parts) -> Url {
        let mut url = raw_url(parts);

        if let Some(origin) = &self.origin {
            let _ = url.set_scheme(origin.scheme());
            let _ = url.set_host(origin.host_str());
            let _ = url.set_port(origin.port());
            return url;
        }

        if let Some(protocol) = header_str(&parts.headers, &self.headers.protocol) {
            if protocol == "http" || protocol == "https" {
                let _ = url.set_scheme(protocol);
            }
        }

        if let Some(host) = header_str(&parts.headers, &self.headers.host) {
            if let Some((name, port)) = parse_host(host) {
                if url.set_host(Some(name)).is_ok() {
                    let _ = url.set_port(port);
                }
            }
        }

        if let Some(port) = header_str(&parts.headers, &self.headers.port) {
            if let Some(port) = parse_port(port) {
                let _ = url.set_port(Some(port));
            }
        }

        url
    }

    /// The client address the renderer should see.
    pub fn client_address(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        self.forwarded_address(headers)
            .unwrap_or_else(|| peer_address(peer))
    }

    fn forwarded_address(&self, headers: &HeaderMap) -> Option<String> {
        let name = self.headers.address.as_str();
        if name.is_empty() {
            return None;
        }

        // Proxies may append separate header lines instead of extending one.
        let value = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(",");
        if value.trim().is_empty() {
            return None;
        }

        if name == "x-forwarded-for" {
            select_forwarded_for(&value, self.xff_depth)
        } else {
            Some(value.trim().to_string())
        }
    }
}

/// Pick the `x-forwarded-for` entry `depth` hops from the right.
///
/// A depth beyond the entry count, or an empty selected entry, falls back
/// to the leftmost non-empty entry. `None` when every entry is empty.
pub fn select_forwarded_for(value: &str, depth: usize) -> Option<String> {
    let entries: Vec<&str> = value.split(',').map(str::trim).collect();
    let index = entries.len().saturating_sub(depth);
    entries
        .get(index)
        .filter(|entry| !entry.is_empty())
        .or_else(|| entries.iter().find(|entry| !entry.is_empty()))
        .map(|entry| entry.to_string())
}

/// Validate a `host[:port]` value and split it.
///
/// The host must be a DNS name: dot-separated labels of ASCII letters,
/// digits and hyphens, 1-63 characters each, not starting or ending with a
/// hyphen. The port, when present, must be in 1..=65535.
pub fn parse_host(value: &str) -> Option<(&str, Option<u16>)> {
    let (host, port) = match value.rsplit_once(':') {
        Some((host, port)) => (host, Some(parse_port(port)?)),
        None => (value, None),
    };
    if is_dns_name(host) {
        Some((host, port))
    } else {
        None
    }
}

/// Parse a decimal port in 1..=65535.
pub fn parse_port(value: &str) -> Option<u16> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse::<u16>().ok().filter(|port| *port >= 1)
}

fn is_dns_name(host: &str) -> bool {
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    if name.is_empty() {
        return None;
    }
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn peer_address(peer: Option<SocketAddr>) -> String {
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| FALLBACK_CLIENT_ADDRESS.to_string())
}

/// URL as received: `http`, the validated `Host` header (or URI authority),
/// then the path and query from the request target.
fn raw_url(parts: &Parts) -> Url {
    let mut url = Url::parse("http://localhost/").expect("static URL is valid");
    url.set_path(parts.uri.path());
    url.set_query(parts.uri.query());

    let authority = parts
        .headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.authority().map(|a| a.as_str()));
    if let Some(authority) = authority {
        set_authority(&mut url, authority);
    }
    url
}

/// Apply a `host[:port]` or `[v6][:port]` authority. Anything else leaves
/// the URL untouched.
fn set_authority(url: &mut Url, value: &str) {
    if let Some((host, port)) = parse_host(value) {
        if url.set_host(Some(host)).is_ok() {
            let _ = url.set_port(port);
        }
        return;
    }

    let Some((address, rest)) = value
        .strip_prefix('[')
        .and_then(|inner| inner.split_once(']'))
    else {
        return;
    };
    let Ok(ip) = address.parse::<Ipv6Addr>() else {
        return;
    };
    let port = match rest {
        "" => None,
        rest => match rest.strip_prefix(':').and_then(parse_port) {
            Some(port) => Some(port),
            None => return,
        },
    };
    if url.set_ip_host(IpAddr::V6(ip)).is_ok() {
        let _ = url.set_port(port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn normalizer(f: impl FnOnce(&mut AdapterConfig)) -> RequestNormalizer {
        let mut config = AdapterConfig::default();
        f(&mut config);
        RequestNormalizer::new(&config)
    }

    #[test]
    fn xff_depth_selection() {
        let value = "1.1.1.1, 2.2.2.2, 3.3.3.3";
        assert_eq!(select_forwarded_for(value, 1).as_deref(), Some("3.3.3.3"));
        assert_eq!(select_forwarded_for(value, 2).as_deref(), Some("2.2.2.2"));
        assert_eq!(select_forwarded_for(value, 3).as_deref(), Some("1.1.1.1"));
        assert_eq!(select_forwarded_for(value, 10).as_deref(), Some("1.1.1.1"));
        assert_eq!(select_forwarded_for("1.1.1.1, ", 1).as_deref(), Some("1.1.1.1"));
        assert_eq!(select_forwarded_for(" , ", 1), None);
        assert_eq!(select_forwarded_for("", 1), None);
    }

    #[test]
    fn empty_forwarded_entries_fall_back() {
        let n = normalizer(|c| c.headers.address = "x-forwarded-for".to_string());

        let p = parts("/", &[("x-forwarded-for", "1.1.1.1, ")]);
        let normalized = n.normalize(&p, Body::empty(), None);
        assert_eq!(normalized.client_address, "1.1.1.1");
        assert_eq!(normalized.headers.get("x-forwarded-for").unwrap(), "1.1.1.1");

        let p = parts("/", &[("x-forwarded-for", ",")]);
        let peer: SocketAddr = "10.1.2.3:5555".parse().unwrap();
        let normalized = n.normalize(&p, Body::empty(), Some(peer));
        assert_eq!(normalized.client_address, "10.1.2.3");
        assert_eq!(normalized.headers.get("x-forwarded-for").unwrap(), ",");
    }

    #[test]
    fn host_grammar() {
        assert_eq!(parse_host("example.com:8443"), Some(("example.com", Some(8443))));
        assert_eq!(parse_host("localhost"), Some(("localhost", None)));
        assert_eq!(parse_host("10.0.0.1:80"), Some(("10.0.0.1", Some(80))));
        assert_eq!(parse_host("evil.com; rm -rf"), None);
        assert_eq!(parse_host("example.com:0"), None);
        assert_eq!(parse_host("example.com:65536"), None);
        assert_eq!(parse_host("-bad.com"), None);
        assert_eq!(parse_host("a..b"), None);
        assert_eq!(parse_host(""), None);
    }

    #[test]
    fn raw_origin_from_host_header() {
        let n = normalizer(|_| {});
        let url = n.effective_url(&parts("/a?b=1", &[("host", "localhost:3000")]));
        assert_eq!(url.as_str(), "http://localhost:3000/a?b=1");
    }

    #[test]
    fn host_header_cannot_rewrite_path() {
        let n = normalizer(|_| {});
        for host in ["evil.com/admin#", "evil.com?x=1", "evil.com#frag", "user@evil.com"] {
            let p = parts("/public?page=2", &[("host", host)]);
            let url = n.normalize(&p, Body::empty(), None).url;
            assert_eq!(url.path(), "/public", "host {host:?}");
            assert_eq!(url.query(), Some("page=2"), "host {host:?}");
            assert_eq!(url.fragment(), None, "host {host:?}");
            assert_eq!(url.host_str(), Some("localhost"), "host {host:?}");
        }
    }

    #[test]
    fn ipv6_host_header() {
        let n = normalizer(|_| {});
        let url = n.effective_url(&parts("/", &[("host", "[::1]:3000")]));
        assert_eq!(url.as_str(), "http://[::1]:3000/");

        let url = n.effective_url(&parts("/", &[("host", "[::1]:nope")]));
        assert_eq!(url.as_str(), "http://localhost/");
    }

    #[test]
    fn fixed_origin_wins() {
        let n = normalizer(|c| {
            c.origin = Some(Url::parse("https://my.site").unwrap());
            c.headers.protocol = "x-forwarded-proto".to_string();
        });
        let url = n.effective_url(&parts(
            "/path",
            &[("host", "localhost:3000"), ("x-forwarded-proto", "http")],
        ));
        assert_eq!(url.as_str(), "https://my.site/path");
    }

    #[test]
    fn trusted_proxy_headers() {
        let n = normalizer(|c| {
            c.headers.protocol = "x-forwarded-proto".to_string();
            c.headers.host = "x-forwarded-host".to_string();
            c.headers.port = "x-forwarded-port".to_string();
        });
        let url = n.effective_url(&parts(
            "/",
            &[
                ("host", "localhost:3000"),
                ("x-forwarded-proto", "https"),
                ("x-forwarded-host", "example.com"),
                ("x-forwarded-port", "8443"),
            ],
        ));
        assert_eq!(url.as_str(), "https://example.com:8443/");
    }

    #[test]
    fn invalid_proxy_headers_are_ignored() {
        let n = normalizer(|c| {
            c.headers.protocol = "x-forwarded-proto".to_string();
            c.headers.host = "x-forwarded-host".to_string();
            c.headers.port = "x-forwarded-port".to_string();
        });
        let url = n.effective_url(&parts(
            "/",
            &[
                ("host", "localhost:3000"),
                ("x-forwarded-proto", "gopher"),
                ("x-forwarded-host", "evil.com; rm -rf"),
                ("x-forwarded-port", "99999"),
            ],
        ));
        assert_eq!(url.as_str(), "http://localhost:3000/");
    }

    #[test]
    fn host_header_with_port_is_accepted() {
        let n = normalizer(|c| c.headers.host = "x-forwarded-host".to_string());
        let url = n.effective_url(&parts(
            "/",
            &[("host", "localhost:3000"), ("x-forwarded-host", "example.com:8443")],
        ));
        assert_eq!(url.host_str(), Some("example.com"));
        assert_eq!(url.port(), Some(8443));
    }

    #[test]
    fn forwarded_for_rewrites_cloned_headers() {
        let n = normalizer(|c| {
            c.headers.address = "x-forwarded-for".to_string();
            c.xff_depth = 2;
        });
        let p = parts("/", &[("x-forwarded-for", "1.1.1.1, 2.2.2.2, 3.3.3.3")]);
        let normalized = n.normalize(&p, Body::empty(), None);

        assert_eq!(normalized.client_address, "2.2.2.2");
        assert_eq!(normalized.headers.get("x-forwarded-for").unwrap(), "2.2.2.2");
        assert_eq!(p.headers.get("x-forwarded-for").unwrap(), "1.1.1.1, 2.2.2.2, 3.3.3.3");
    }

    #[test]
    fn custom_address_header_passes_through() {
        let n = normalizer(|c| c.headers.address = "x-real-ip".to_string());
        let p = parts("/", &[("x-real-ip", "9.9.9.9")]);
        assert_eq!(n.client_address(&p.headers, None), "9.9.9.9");
    }

    #[test]
    fn falls_back_to_peer_address() {
        let n = normalizer(|c| c.headers.address = "x-forwarded-for".to_string());
        let p = parts("/", &[]);
        let peer: SocketAddr = "10.1.2.3:5555".parse().unwrap();
        assert_eq!(n.client_address(&p.headers, Some(peer)), "10.1.2.3");
        assert_eq!(n.client_address(&p.headers, None), FALLBACK_CLIENT_ADDRESS);
    }
}
