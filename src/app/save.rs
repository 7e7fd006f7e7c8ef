//! Production output of a built application.
//!
//! ```text
//! <save_path>/
//! ├── <app>.css            every stylesheet, traversal order, joined
//! ├── <app>.js             every script, traversal order, joined
//! ├── <app>/index          root document linking the two files above
//! └── <version>/<bundle>/  resources at their URL paths
//! ```

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result, anyhow, bail};
use rayon::prelude::*;

use super::{Application, PageLinks, render};
use crate::asset::{Asset, AssetKind, Owner, Producer};
use crate::handler::StageName;
use crate::log;
use crate::logger::ProgressLine;
use crate::utils::html::escape_attr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub written: usize,
    /// Assets that resolved to no content.
    pub skipped: usize,
}

impl Application {
    /// Write the last build to `save_path`. Any failed read or write
    /// aborts the save; files already written stay on disk.
    pub fn save(&self) -> Result<SaveReport> {
        let output = self
            .last_build()
            .ok_or_else(|| anyhow!("application `{}` has not been built", self.name))?;

        let mut stylesheets = Vec::new();
        let mut scripts = Vec::new();
        let mut resources = Vec::new();
        for bundle in &output.bundles {
            stylesheets.extend(bundle.stylesheets.iter().cloned());
            scripts.extend(bundle.scripts.iter().cloned());
            resources.extend(bundle.resources.iter().cloned());
        }

        let mut jobs: Vec<(&'static str, Arc<Asset>)> =
            resources.into_iter().map(|asset| ("resources", asset)).collect();
        jobs.push(("artifacts", self.combined(AssetKind::Stylesheet, stylesheets)));
        jobs.push(("artifacts", self.combined(AssetKind::Script, scripts)));
        jobs.push(("artifacts", self.production_page()));

        let resource_count = jobs.len() - 3;
        let progress = ProgressLine::new("save", &[("resources", resource_count), ("artifacts", 3)]);
        let written = AtomicUsize::new(0);
        let skipped = AtomicUsize::new(0);

        jobs.par_iter().try_for_each(|(group, asset)| -> Result<()> {
            if self.persist(asset)? {
                written.fetch_add(1, Ordering::Relaxed);
            } else {
                skipped.fetch_add(1, Ordering::Relaxed);
            }
            progress.inc(group);
            Ok(())
        })?;
        progress.finish();

        let report = SaveReport {
            written: written.into_inner(),
            skipped: skipped.into_inner(),
        };
        log!("save"; "{}: {} files written to {}", self.name, report.written, self.save_path.display());
        Ok(report)
    }

    /// `<app>.css` or `<app>.js` over `children`.
    fn combined(&self, kind: AssetKind, children: Vec<Arc<Asset>>) -> Arc<Asset> {
        let (extension, minify) = match kind {
            AssetKind::Stylesheet => ("css", self.flags.minify_stylesheets),
            _ => ("js", self.flags.minify_scripts),
        };
        let stages: &[StageName] = if minify {
            &[StageName::Minify, StageName::Join]
        } else {
            &[StageName::Join]
        };

        Arc::new(Asset::combined(
            Owner::app(self.name.as_str()),
            format!("{}.{extension}", self.name),
            self.registry.handlers.build(stages),
            children,
        ))
    }

    fn production_page(&self) -> Arc<Asset> {
        let settings = self.page_settings();
        let prefix = escape_attr(&self.url_prefix).into_owned();
        let name = escape_attr(&self.name).into_owned();
        let stylesheet = format!("<link href=\"{prefix}{name}.css\" rel=\"stylesheet\" type=\"text/css\">");
        let script = format!("<script type=\"text/javascript\" src=\"{prefix}{name}.js\"></script>");

        let producer: Producer = Arc::new(move || {
            Ok(render(&settings, &PageLinks::default(), Some(stylesheet.as_str()), Some(script.as_str())).into_bytes())
        });
        Arc::new(
            Asset::produced(
                Owner::app(self.name.as_str()),
                format!("{}/index", self.name),
                self.registry.handlers.build(&[StageName::File]),
                producer,
            )
            .html(),
        )
    }

    /// Write one asset at its URL path. Returns `false` when there was
    /// nothing to write.
    fn persist(&self, asset: &Asset) -> Result<bool> {
        let response = asset.handler.handle(asset, None);
        if let Some(error) = response.error {
            bail!("failed to save `{}`: {}", asset.url, error);
        }
        let Some(data) = response.data.filter(|data| !data.is_empty()) else {
            return Ok(false);
        };

        let path = self.save_path.join(&asset.url);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&path, data).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(true)
    }
}
