//! HTTP response handlers.

use anyhow::Result;
use tiny_http::{Header, Request, Response, StatusCode};

use crate::asset::Asset;
use crate::debug;
use crate::handler::RequestContext;
use crate::utils::date::HttpDate;
use crate::utils::mime::types::PLAIN;

/// Run `asset` through its pipeline and send what it produced.
pub fn respond_asset(request: Request, asset: &Asset, allow_cross_site: bool) -> Result<()> {
    let ctx = RequestContext {
        if_modified_since: request_header(&request, "If-Modified-Since")
            .and_then(|value| HttpDate::parse(&value)),
    };
    let record = asset.handler.handle(asset, Some(&ctx));

    let mut headers = Vec::new();
    if allow_cross_site {
        headers.extend(cors_headers(&request));
    }

    if let Some(error) = &record.error {
        debug!("serve"; "{}", error);
        headers.extend(make_header("Content-Type", PLAIN));
        return send(request, record.status(), headers, b"404 Not Found".to_vec());
    }

    if let Some(content_type) = record.content_type {
        headers.extend(make_header("Content-Type", content_type));
    }
    if let Some(stamp) = record.last_modified {
        headers.extend(make_header("Last-Modified", &stamp.to_rfc2822()));
    }
    let status = record.status();
    send(request, status, headers, record.data.unwrap_or_default())
}

/// Respond with a plain 404.
pub fn respond_not_found(request: Request) -> Result<()> {
    let headers = make_header("Content-Type", PLAIN).into_iter().collect();
    send(request, 404, headers, b"404 Not Found".to_vec())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    let headers = make_header("Content-Type", PLAIN).into_iter().collect();
    send(request, 503, headers, b"503 Service Unavailable".to_vec())
}

/// `Access-Control-Allow-Origin: *`, plus the headers the client asked to
/// send.
fn cors_headers(request: &Request) -> Vec<Header> {
    let mut headers: Vec<Header> = make_header("Access-Control-Allow-Origin", "*")
        .into_iter()
        .collect();
    if let Some(requested) = request_header(request, "Access-Control-Request-Headers") {
        headers.extend(make_header("Access-Control-Allow-Headers", &requested));
    }
    headers
}

fn request_header(request: &Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.to_string())
}

fn send(request: Request, status: u16, headers: Vec<Header>, body: Vec<u8>) -> Result<()> {
    let mut response = Response::from_data(body).with_status_code(StatusCode(status));
    for header in headers {
        response.add_header(header);
    }
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &str, value: &str) -> Option<Header> {
    Header::from_bytes(key.as_bytes(), value.as_bytes()).ok()
}
