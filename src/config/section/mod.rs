//! Configuration section definitions.
//!
//! | Module   | TOML Section                      | Purpose                    |
//! |----------|-----------------------------------|----------------------------|
//! | `server` | `[server]`, `[server.proxy]`      | Development server, proxy  |
//! | `app`    | `[[apps]]`, `[[apps.bundles]]`    | Applications and bundles   |

mod app;
mod server;

pub use app::{AppConfig, BundleConfig};
pub use server::{ProxyConfig, ServerConfig};
