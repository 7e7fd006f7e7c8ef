//! Minification stage: oxc for scripts, lightningcss for stylesheets.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use crate::asset::{Asset, AssetKind};
use crate::debug;
use crate::handler::{Next, RequestContext, Response, Stage};

/// Replaces script and stylesheet data with a minified rendition.
///
/// Input that fails to parse passes through untouched.
pub struct Minify;

impl Stage for Minify {
    fn handle(&self, asset: &Asset, ctx: Option<&RequestContext>, next: Next<'_>) -> Response {
        let mut response = next.run(asset, ctx);
        let Some(data) = response.data.as_mut() else {
            return response;
        };
        let Ok(source) = std::str::from_utf8(data) else {
            debug!("minify"; "{}: not utf-8, skipped", asset.url);
            return response;
        };

        let minified = match asset.kind() {
            AssetKind::Script => minify_js(source),
            AssetKind::Stylesheet => minify_css(source),
            AssetKind::Resource => return response,
        };

        match minified {
            Some(code) => *data = code.into_bytes(),
            None => debug!("minify"; "{}: parse failed, kept original", asset.url),
        }
        response
    }
}

/// Minify a classic (non-module) script. Top-level names stay global.
pub fn minify_js(source: &str) -> Option<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs().with_script(true)).parse();
    if !ret.errors.is_empty() {
        return None;
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Some(code)
}

pub fn minify_css(source: &str) -> Option<String> {
    let stylesheet = StyleSheet::parse(source, ParserOptions::default()).ok()?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .ok()?;
    Some(result.code)
}
