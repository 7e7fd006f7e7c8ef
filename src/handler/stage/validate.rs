//! Script validation stage.

use oxc::allocator::Allocator;
use oxc::parser::Parser;
use oxc::span::SourceType;

use crate::asset::{Asset, AssetKind};
use crate::handler::{Next, RequestContext, Response, Stage};
use crate::warn;

/// Reports syntax errors in scripts without changing the data.
pub struct Validate;

impl Stage for Validate {
    fn handle(&self, asset: &Asset, ctx: Option<&RequestContext>, next: Next<'_>) -> Response {
        let response = next.run(asset, ctx);
        if asset.kind() != AssetKind::Script {
            return response;
        }
        if let Some(source) = response.data.as_deref().and_then(|d| std::str::from_utf8(d).ok()) {
            for problem in check_script(source) {
                warn!("{}: {}", asset.url, problem);
            }
        }
        response
    }
}

/// Syntax problems found in a classic script.
pub fn check_script(source: &str) -> Vec<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs().with_script(true)).parse();
    ret.errors.iter().map(ToString::to_string).collect()
}
