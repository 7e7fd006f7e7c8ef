//! Development server: registered assets first, then the proxy, then 404.

mod lifecycle;
mod proxy;
mod response;

use proxy::host_header;

use crate::config::{GarconConfig, ServerConfig};
use crate::core::register_server;
use crate::server::{Registry, Server};
use crate::{debug, log};
use anyhow::{Context, Result};
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use tiny_http::Request;

/// What a request handler needs, shared by the pool threads.
pub struct ServeState {
    pub registry: Arc<Registry>,
    pub config: ServerConfig,
}

impl ServeState {
    pub fn new(server: &Server) -> Self {
        Self {
            registry: Arc::clone(server.registry()),
            config: server.config.clone(),
        }
    }
}

/// Build every application, then serve until Ctrl+C.
pub fn serve(config: &GarconConfig) -> Result<()> {
    let server = Server::from_config(config)?;
    server.build_all()?;

    let (http, addr) = lifecycle::bind_with_retry(server.config.hostname, server.config.port)?;
    let http = Arc::new(http);
    register_server(Arc::clone(&http));

    for app in server.apps() {
        log!("serve"; "http://{}/{}", addr, app.name);
    }
    if let Some(proxy) = &server.config.proxy {
        log!("serve"; "proxying unmatched requests to {}", host_header(proxy));
    }

    debug!("serve"; "{} urls registered", server.registry().files().len());

    let state = Arc::new(ServeState::new(&server));
    run_request_loop(&http, &state)
}

fn run_request_loop(server: &tiny_http::Server, state: &Arc<ServeState>) -> Result<()> {
    // Proxied requests can block on the upstream; keep them off the
    // accept loop.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .context("failed to create request thread pool")?;

    for request in server.incoming_requests() {
        let state = Arc::clone(state);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &state) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

/// Handle a single HTTP request
pub fn handle_request(request: Request, state: &ServeState) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    let path = request_path(request.url());
    match state.registry.lookup(&path) {
        Some(asset) => {
            debug!("serve"; "{} {}", request.method(), request.url());
            response::respond_asset(request, &asset, state.config.allow_cross_site_requests)
        }
        None => match &state.config.proxy {
            Some(proxy) => proxy::forward(request, proxy),
            None => {
                debug!("serve"; "404 {}", request.url());
                response::respond_not_found(request)
            }
        },
    }
}

/// URL map key for a request target: no query, no leading slash,
/// percent-decoded.
fn request_path(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let path = path.strip_prefix('/').unwrap_or(path);
    percent_decode_str(path).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Application;
    use crate::config::ProxyConfig;
    use std::fs;
    use std::io::Read;
    use std::net::SocketAddr;
    use std::thread::{self, JoinHandle};
    use tempfile::TempDir;
    use tiny_http::{Header, Response, StatusCode};

    struct Running {
        addr: SocketAddr,
        http: Arc<tiny_http::Server>,
        thread: Option<JoinHandle<()>>,
    }

    impl Running {
        fn url(&self, path: &str) -> String {
            format!("http://{}{}", self.addr, path)
        }
    }

    impl Drop for Running {
        fn drop(&mut self) {
            self.http.unblock();
            if let Some(thread) = self.thread.take() {
                thread.join().unwrap();
            }
        }
    }

    fn spawn(handler: impl Fn(Request) + Send + 'static) -> Running {
        let http = Arc::new(tiny_http::Server::http("127.0.0.1:0").unwrap());
        let addr = http.server_addr().to_ip().unwrap();
        let accept = Arc::clone(&http);
        let thread = thread::spawn(move || {
            for request in accept.incoming_requests() {
                handler(request);
            }
        });
        Running {
            addr,
            http,
            thread: Some(thread),
        }
    }

    fn garcon(state: ServeState) -> Running {
        spawn(move |request| handle_request(request, &state).unwrap())
    }

    /// Echoes the upstream path and Host header back as the body.
    fn upstream() -> Running {
        spawn(|mut request| {
            let mut body = String::new();
            request.as_reader().read_to_string(&mut body).unwrap();
            let host = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("Host"))
                .map(|h| h.value.to_string())
                .unwrap_or_default();
            let reply = format!("{} {} host={} body={}", request.method(), request.url(), host, body);
            let status: u16 = if request.url().ends_with("/teapot") { 418 } else { 200 };
            let response = Response::from_string(reply)
                .with_status_code(StatusCode(status))
                .with_header(Header::from_bytes("X-Upstream", "yes").unwrap());
            request.respond(response).unwrap();
        })
    }

    fn built_state(dir: &TempDir, config: ServerConfig) -> ServeState {
        let app_dir = dir.path().join("apps/todos");
        fs::create_dir_all(&app_dir).unwrap();
        fs::write(app_dir.join("main.js"), "main();").unwrap();
        fs::write(app_dir.join("my file.css"), "a{}").unwrap();

        let mut server = Server::new(config, dir.path());
        let mut app = Application::new("todos", "7", Arc::clone(server.registry()));
        app.add_bundle(crate::bundle::Bundle::from_config(
            &crate::config::BundleConfig {
                path: "apps/todos".into(),
                ..Default::default()
            },
            dir.path(),
        ));
        server.add_app(app).unwrap();
        server.build_all().unwrap();
        ServeState::new(&server)
    }

    #[test]
    fn test_request_path() {
        assert_eq!(request_path("/7/todos/main.js?v=1"), "7/todos/main.js");
        assert_eq!(request_path("/7/todos/my%20file.css"), "7/todos/my file.css");
        assert_eq!(request_path("/todos#top"), "todos");
        assert_eq!(request_path("/"), "");
    }

    #[test]
    fn test_serves_registered_asset() {
        let dir = TempDir::new().unwrap();
        let running = garcon(built_state(&dir, ServerConfig::default()));

        let response = ureq::get(&running.url("/7/todos/main.js")).call().unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.header("Content-Type"), Some("text/javascript; charset=utf-8"));
        assert!(response.header("Last-Modified").is_some());
        assert!(response.header("Access-Control-Allow-Origin").is_none());
        assert_eq!(response.into_string().unwrap(), "main();");

        let page = ureq::get(&running.url("/todos")).call().unwrap();
        assert_eq!(page.header("Content-Type"), Some("text/html; charset=utf-8"));
        assert!(page.into_string().unwrap().contains("src=\"../7/todos/main.js\""));

        let spaced = ureq::get(&running.url("/7/todos/my%20file.css")).call().unwrap();
        assert_eq!(spaced.into_string().unwrap(), "a{}");
    }

    #[test]
    fn test_if_modified_since_yields_304() {
        let dir = TempDir::new().unwrap();
        let running = garcon(built_state(&dir, ServerConfig::default()));

        let first = ureq::get(&running.url("/7/todos/main.js")).call().unwrap();
        let stamp = first.header("Last-Modified").unwrap().to_string();

        let second = ureq::get(&running.url("/7/todos/main.js"))
            .set("If-Modified-Since", &stamp)
            .call()
            .unwrap();
        assert_eq!(second.status(), 304);
    }

    #[test]
    fn test_unregistered_url_is_404_without_proxy() {
        let dir = TempDir::new().unwrap();
        let running = garcon(built_state(&dir, ServerConfig::default()));

        match ureq::get(&running.url("/nope.js")).call() {
            Err(ureq::Error::Status(404, _)) => {}
            other => panic!("expected 404, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_source_is_404() {
        let dir = TempDir::new().unwrap();
        let running = garcon(built_state(&dir, ServerConfig::default()));
        fs::remove_file(dir.path().join("apps/todos/main.js")).unwrap();

        match ureq::get(&running.url("/7/todos/main.js")).call() {
            Err(ureq::Error::Status(404, _)) => {}
            other => panic!("expected 404, got {other:?}"),
        }
    }

    #[test]
    fn test_cors_headers() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            allow_cross_site_requests: true,
            ..ServerConfig::default()
        };
        let running = garcon(built_state(&dir, config));

        let response = ureq::get(&running.url("/7/todos/main.js"))
            .set("Access-Control-Request-Headers", "X-Custom")
            .call()
            .unwrap();
        assert_eq!(response.header("Access-Control-Allow-Origin"), Some("*"));
        assert_eq!(response.header("Access-Control-Allow-Headers"), Some("X-Custom"));
    }

    #[test]
    fn test_proxy_forwards_unmatched_requests() {
        let dir = TempDir::new().unwrap();
        let origin = upstream();
        let config = ServerConfig {
            proxy: Some(ProxyConfig {
                host: "127.0.0.1".into(),
                port: origin.addr.port(),
                prefix: String::new(),
                remove_prefix: Some("/api".into()),
            }),
            ..ServerConfig::default()
        };
        let running = garcon(built_state(&dir, config));

        let response = ureq::get(&running.url("/api/users?id=1")).call().unwrap();
        assert_eq!(response.header("X-Upstream"), Some("yes"));
        let expected_host = format!("host=127.0.0.1:{}", origin.addr.port());
        let body = response.into_string().unwrap();
        assert!(body.starts_with("GET /users?id=1 "), "{body}");
        assert!(body.contains(&expected_host), "{body}");

        let posted = ureq::post(&running.url("/api/items")).send_string("payload").unwrap();
        assert!(posted.into_string().unwrap().ends_with("body=payload"));

        // Upstream error statuses come back unchanged.
        match ureq::get(&running.url("/api/teapot")).call() {
            Err(ureq::Error::Status(418, reply)) => {
                assert_eq!(reply.header("X-Upstream"), Some("yes"));
            }
            other => panic!("expected 418, got {other:?}"),
        }

        // Registered URLs are never proxied.
        let local = ureq::get(&running.url("/7/todos/main.js")).call().unwrap();
        assert_eq!(local.into_string().unwrap(), "main();");
    }

    #[test]
    fn test_unreachable_upstream_is_404() {
        let dir = TempDir::new().unwrap();
        let closed = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = closed.server_addr().to_ip().unwrap().port();
        drop(closed);

        let config = ServerConfig {
            proxy: Some(ProxyConfig {
                host: "127.0.0.1".into(),
                port,
                prefix: String::new(),
                remove_prefix: None,
            }),
            ..ServerConfig::default()
        };
        let running = garcon(built_state(&dir, config));

        match ureq::get(&running.url("/elsewhere")).call() {
            Err(ureq::Error::Status(404, _)) => {}
            other => panic!("expected 404, got {other:?}"),
        }
    }
}
