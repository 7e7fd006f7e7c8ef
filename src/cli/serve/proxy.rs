//! Reverse proxy for URLs no application serves.
//!
//! Bodies are streamed in both directions: the inbound request body is
//! handed to `ureq` as a reader, and the upstream response reader is
//! handed back to `tiny_http` without buffering.

use std::sync::LazyLock;

use anyhow::Result;
use tiny_http::{Header, Request, Response, StatusCode};

use crate::config::ProxyConfig;
use crate::{debug, log};

/// Connection-scoped headers that are not forwarded.
const HOP_BY_HOP: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

static AGENT: LazyLock<ureq::Agent> = LazyLock::new(|| ureq::AgentBuilder::new().redirects(0).build());

/// Upstream path for `url`: `prefix` is prepended unless `url` already
/// contains it, then `remove_prefix` is stripped from the front.
pub fn upstream_path(url: &str, proxy: &ProxyConfig) -> String {
    let mut path = url.to_string();
    if !proxy.prefix.is_empty() && !path.contains(&proxy.prefix) {
        path.insert_str(0, &proxy.prefix);
    }
    if let Some(remove) = proxy.remove_prefix.as_deref().filter(|r| !r.is_empty())
        && let Some(rest) = path.strip_prefix(remove)
    {
        path = rest.to_string();
    }
    path
}

/// `Host` header for the upstream: the port is omitted when it is 80.
pub fn host_header(proxy: &ProxyConfig) -> String {
    if proxy.port == 80 {
        proxy.host.clone()
    } else {
        format!("{}:{}", proxy.host, proxy.port)
    }
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

fn has_body(request: &Request) -> bool {
    request.body_length().is_some_and(|len| len > 0)
        || request
            .headers()
            .iter()
            .any(|h| h.field.equiv("Transfer-Encoding"))
}

/// Forward `request` upstream and relay the answer. Transport failures
/// answer 404 and are logged; upstream error statuses are relayed as is.
pub fn forward(mut request: Request, proxy: &ProxyConfig) -> Result<()> {
    let path = upstream_path(request.url(), proxy);
    let target = format!("http://{}:{}{}", proxy.host, proxy.port, path);
    debug!("proxy"; "{} {} -> {}", request.method(), request.url(), target);

    let mut upstream = AGENT.request(request.method().as_str(), &target);
    for header in request.headers() {
        let name = header.field.as_str().as_str();
        if is_hop_by_hop(name) || name.eq_ignore_ascii_case("host") {
            continue;
        }
        upstream = upstream.set(name, header.value.as_str());
    }
    upstream = upstream.set("Host", &host_header(proxy));

    let result = if has_body(&request) {
        upstream.send(request.as_reader())
    } else {
        upstream.call()
    };
    let reply = match result {
        Ok(reply) | Err(ureq::Error::Status(_, reply)) => reply,
        Err(err) => {
            log!(
                "proxy";
                "ERROR: \"{}\" for proxy request on {}:{}",
                err, proxy.host, proxy.port
            );
            request.respond(Response::empty(StatusCode(404)))?;
            return Ok(());
        }
    };

    let status = reply.status();
    let length = reply
        .header("Content-Length")
        .and_then(|len| len.trim().parse::<usize>().ok());
    let headers: Vec<Header> = reply
        .headers_names()
        .iter()
        .filter(|name| !is_hop_by_hop(name) && !name.eq_ignore_ascii_case("content-length"))
        .flat_map(|name| {
            reply
                .all(name)
                .into_iter()
                .filter_map(|value| Header::from_bytes(name.as_bytes(), value.as_bytes()).ok())
                .collect::<Vec<_>>()
        })
        .collect();

    let response = Response::new(StatusCode(status), headers, reply.into_reader(), length, None);
    request.respond(response)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy(prefix: &str, remove: Option<&str>, port: u16) -> ProxyConfig {
        ProxyConfig {
            host: "localhost".into(),
            port,
            prefix: prefix.into(),
            remove_prefix: remove.map(Into::into),
        }
    }

    #[test]
    fn test_upstream_path_prefix() {
        let config = proxy("/legacy", None, 80);
        assert_eq!(upstream_path("/users?id=1", &config), "/legacy/users?id=1");
        assert_eq!(upstream_path("/legacy/users", &config), "/legacy/users");
    }

    #[test]
    fn test_upstream_path_remove_prefix() {
        let config = proxy("", Some("/api"), 80);
        assert_eq!(upstream_path("/api/users", &config), "/users");
        assert_eq!(upstream_path("/static/api", &config), "/static/api");
    }

    #[test]
    fn test_prefix_applied_before_removal() {
        let config = proxy("/v2", Some("/v2/api"), 80);
        assert_eq!(upstream_path("/api/users", &config), "/users");
    }

    #[test]
    fn test_host_header() {
        assert_eq!(host_header(&proxy("", None, 80)), "localhost");
        assert_eq!(host_header(&proxy("", None, 8080)), "localhost:8080");
    }

    #[test]
    fn test_hop_by_hop() {
        assert!(is_hop_by_hop("Transfer-Encoding"));
        assert!(is_hop_by_hop("connection"));
        assert!(!is_hop_by_hop("Content-Type"));
    }
}
