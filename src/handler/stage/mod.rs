//! Built-in stages.

mod minify;
mod validate;

pub use minify::Minify;
pub use validate::Validate;

use std::fs;
use std::time::SystemTime;

use anyhow::{Context, anyhow};
use parking_lot::Mutex;

use super::{Next, RequestContext, Response, Stage};
use crate::asset::Asset;
use crate::utils::date::HttpDate;
use crate::utils::mime;

/// Stamps responses with a `Last-Modified` fixed at first use and answers
/// fresh conditional requests with 304.
#[derive(Default)]
pub struct Cache {
    stamp: Mutex<Stamp>,
}

#[derive(Default)]
struct Stamp {
    current: Option<HttpDate>,
    retired: Option<HttpDate>,
}

impl Cache {
    /// Start a new stamp on next use, strictly later than the current one.
    pub fn reset(&self) {
        let mut stamp = self.stamp.lock();
        if let Some(current) = stamp.current.take() {
            stamp.retired = Some(current);
        }
    }

    fn stamp(&self) -> HttpDate {
        let mut stamp = self.stamp.lock();
        let retired = stamp.retired;
        *stamp.current.get_or_insert_with(|| {
            let now = HttpDate::from_system_time(SystemTime::now());
            match retired {
                Some(old) if now <= old => old.next_second(),
                _ => now,
            }
        })
    }
}

impl Stage for Cache {
    fn handle(&self, asset: &Asset, ctx: Option<&RequestContext>, next: Next<'_>) -> Response {
        let stamp = self.stamp();

        if let Some(since) = ctx.and_then(|ctx| ctx.if_modified_since)
            && since >= stamp
        {
            return Response::not_modified(stamp);
        }

        let mut response = next.run(asset, ctx);
        if !response.is_error() {
            response.last_modified = Some(stamp);
        }
        response
    }
}

/// Attaches a MIME type derived from the asset path.
pub struct ContentType;

impl Stage for ContentType {
    fn handle(&self, asset: &Asset, ctx: Option<&RequestContext>, next: Next<'_>) -> Response {
        let mut response = next.run(asset, ctx);
        if !response.is_error() {
            response.content_type = Some(if asset.is_html {
                mime::types::HTML
            } else {
                mime::from_url(&asset.path)
            });
        }
        response
    }
}

/// Reads raw bytes from the asset's producer or its file on disk.
pub struct File;

impl Stage for File {
    fn handle(&self, asset: &Asset, _: Option<&RequestContext>, _: Next<'_>) -> Response {
        let data = match (&asset.content, &asset.source) {
            (Some(produce), _) => produce(),
            (None, Some(path)) => {
                fs::read(path).with_context(|| format!("failed to read {}", path.display()))
            }
            (None, None) => Err(anyhow!("no content source")),
        };

        match data {
            Ok(data) => Response::data(data),
            Err(e) => Response::not_found(format!("{}: {e:#}", asset.url)),
        }
    }
}

/// Hands the request to the target asset's own pipeline.
pub struct Symlink;

impl Stage for Symlink {
    fn handle(&self, asset: &Asset, ctx: Option<&RequestContext>, _: Next<'_>) -> Response {
        match &asset.symlink {
            Some(target) => target.handler.handle(target, ctx),
            None => Response::not_found(format!("{}: symlink has no target", asset.url)),
        }
    }
}

/// Concatenates the children's content, newline separated, in order.
pub struct Join;

impl Stage for Join {
    fn handle(&self, asset: &Asset, _: Option<&RequestContext>, _: Next<'_>) -> Response {
        let mut data = Vec::new();
        for (i, child) in asset.children.iter().enumerate() {
            let response = child.handler.handle(child, None);
            if response.is_error() {
                return response;
            }
            if i > 0 {
                data.push(b'\n');
            }
            data.extend_from_slice(response.data.as_deref().unwrap_or_default());
        }
        Response::data(data)
    }
}
