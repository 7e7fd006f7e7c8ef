//! Applications: a root document plus the bundles it loads.
//!
//! # Build
//!
//! ```text
//! build_with(on_complete)
//!   ├── stage root document + bare-name symlink
//!   ├── rayon::scope: assemble every bundle ─┐
//!   │                                        ├─ Latch(bundles.len())
//!   │   each bundle stages its URLs ─────────┘
//!   └── fan-in: set page links, publish staged URLs, on_complete(..)
//! ```
//!
//! Nothing is visible to the server until fan-in: requests see either the
//! previous build or the new one.

mod manifest;
mod root;
mod save;

pub use root::{HtmlInjections, PageLinks, PageSettings, RootPage, render};

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use crate::asset::{Asset, Owner, Producer};
use crate::bundle::{Assembled, BuildContext, BuildFlags, Bundle};
use crate::config::AppConfig;
use crate::core::Latch;
use crate::error::BuildError;
use crate::handler::StageName;
use crate::server::{FileMap, Registry};
use crate::{debug, log};

/// Result of the most recent successful build.
#[derive(Debug)]
pub struct BuildOutput {
    /// One entry per bundle, in declaration order.
    pub bundles: Vec<Assembled>,
    pub root: Arc<Asset>,
    pub page: Arc<RootPage>,
}

pub struct Application {
    pub name: String,
    pub build_version: String,
    pub build_language: String,
    pub theme: String,
    pub html: HtmlInjections,
    pub url_prefix: String,
    pub save_path: PathBuf,
    pub flags: BuildFlags,
    bundles: Vec<Bundle>,
    registry: Arc<Registry>,
    last_build: ArcSwapOption<BuildOutput>,
}

impl Application {
    pub fn new(name: impl Into<String>, build_version: impl Into<String>, registry: Arc<Registry>) -> Self {
        let defaults = AppConfig::default();
        Self {
            name: name.into(),
            build_version: build_version.into(),
            build_language: defaults.build_language,
            theme: defaults.theme,
            html: HtmlInjections::default(),
            url_prefix: defaults.url_prefix,
            save_path: defaults.save_path,
            flags: BuildFlags::default(),
            bundles: Vec::new(),
            registry,
            last_build: ArcSwapOption::empty(),
        }
    }

    /// `root` is the project directory bundle paths are relative to.
    pub fn from_config(config: &AppConfig, root: &Path, registry: Arc<Registry>) -> Self {
        let version = config.build_version.clone().unwrap_or_default();
        let mut app = Self::new(config.name.as_str(), version, registry);
        app.build_language = config.build_language.clone();
        app.theme = config.theme.clone();
        app.url_prefix = config.url_prefix.clone();
        app.save_path = config.save_path.clone();
        app.flags = config.flags();
        app.html = HtmlInjections {
            head: config.html_head.clone(),
            stylesheets: config.html_stylesheets.clone(),
            before_scripts: config.html_before_scripts.clone(),
            after_scripts: config.html_after_scripts.clone(),
        };
        for bundle in &config.bundles {
            app.add_bundle(Bundle::from_config(bundle, root));
        }
        app
    }

    /// Take ownership of `bundle`, snapshotting this application's flags
    /// and version into it.
    pub fn add_bundle(&mut self, mut bundle: Bundle) -> &Bundle {
        bundle.attach(self.flags, &self.build_version);
        self.bundles.push(bundle);
        &self.bundles[self.bundles.len() - 1]
    }

    pub fn last_build(&self) -> Option<Arc<BuildOutput>> {
        self.last_build.load_full()
    }

    /// URL of the root document.
    pub fn root_url(&self) -> String {
        format!("{}/{}.html", self.build_version, self.name)
    }

    pub fn page_settings(&self) -> PageSettings {
        PageSettings {
            language: self.build_language.clone(),
            theme: self.theme.clone(),
            url_prefix: self.url_prefix.clone(),
            html: self.html.clone(),
        }
    }

    /// Build and wait for completion.
    pub fn build(&self) -> Result<()> {
        let mut outcome = None;
        self.build_with(|result| outcome = Some(result));
        outcome.unwrap_or_else(|| Err(anyhow!("build of `{}` never completed", self.name)))
    }

    /// Assemble every bundle concurrently; `on_complete` runs exactly once
    /// after all of them finished, on the thread finishing last.
    pub fn build_with<F>(&self, on_complete: F)
    where
        F: FnOnce(Result<()>) + Send,
    {
        log!("build"; "building {} ({} bundles)", self.name, self.bundles.len());

        let staging = Mutex::new(FileMap::default());
        let page = Arc::new(RootPage::new(self.page_settings()));
        let root = match self.stage_root(&page, &mut staging.lock()) {
            Ok(root) => root,
            Err(err) => return on_complete(Err(err.into())),
        };

        let built: Mutex<Vec<Option<Assembled>>> =
            Mutex::new((0..self.bundles.len()).map(|_| None).collect());
        let failure: Mutex<Option<BuildError>> = Mutex::new(None);

        let latch = Latch::new(self.bundles.len(), || {
            let outcome = match failure.lock().take() {
                Some(err) => Err(anyhow::Error::new(err)
                    .context(format!("failed to build application `{}`", self.name))),
                None => {
                    let bundles = built.lock().drain(..).flatten().collect();
                    let staged = mem::take(&mut *staging.lock());
                    self.publish(BuildOutput { bundles, root, page }, staged);
                    Ok(())
                }
            };
            on_complete(outcome);
        });

        let ctx = BuildContext {
            app: &self.name,
            handlers: &self.registry.handlers,
        };
        rayon::scope(|s| {
            for (index, bundle) in self.bundles.iter().enumerate() {
                let (ctx, latch, built, failure, staging) = (&ctx, &latch, &built, &failure, &staging);
                s.spawn(move |_| {
                    let result = bundle
                        .assemble(ctx)
                        .and_then(|assembled| stage(&mut staging.lock(), &assembled).map(|()| assembled));
                    match result {
                        Ok(assembled) => {
                            debug!("build"; "bundle {} ready", bundle.name);
                            built.lock()[index] = Some(assembled);
                        }
                        Err(err) => {
                            failure.lock().get_or_insert(err);
                        }
                    }
                    latch.count_down();
                });
            }
        });
        latch.fire_if_idle();
    }

    /// Register the root document and its bare-name alias.
    fn stage_root(&self, page: &Arc<RootPage>, staging: &mut FileMap) -> Result<Arc<Asset>, BuildError> {
        let handlers = &self.registry.handlers;
        let producer: Producer = {
            let page = Arc::clone(page);
            Arc::new(move || Ok(page.render().into_bytes()))
        };
        let root = Arc::new(
            Asset::produced(
                Owner::app(self.name.as_str()),
                self.root_url(),
                handlers.build(&[StageName::Cache, StageName::ContentType, StageName::File]),
                producer,
            )
            .html(),
        );
        let alias = Asset::symlink(
            Owner::app(self.name.as_str()),
            self.name.as_str(),
            handlers.build(&[StageName::Symlink]),
            Arc::clone(&root),
        )?;

        insert(staging, Arc::clone(&root))?;
        insert(staging, Arc::new(alias))?;
        Ok(root)
    }

    fn publish(&self, output: BuildOutput, staged: FileMap) {
        output.page.set_links(PageLinks::collect(&output.bundles));
        let count = staged.len();
        self.registry.publish(&self.name, staged);
        self.last_build.store(Some(Arc::new(output)));
        log!("build"; "{} ready ({} urls)", self.name, count);
    }
}

/// Stage every asset of an assembled bundle.
fn stage(staging: &mut FileMap, assembled: &Assembled) -> Result<(), BuildError> {
    assembled
        .assets()
        .try_for_each(|asset| insert(staging, Arc::clone(asset)))
}

fn insert(staging: &mut FileMap, asset: Arc<Asset>) -> Result<(), BuildError> {
    if staging.contains_key(&asset.url) {
        return Err(BuildError::DuplicateUrl(asset.url.clone()));
    }
    staging.insert(asset.url.clone(), asset);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::RequestContext;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn bundle(dir: &Path, path: &str, files: &[(&str, &str)]) -> Bundle {
        for (name, content) in files {
            let file = dir.join(path).join(name);
            fs::create_dir_all(file.parent().unwrap()).unwrap();
            fs::write(file, content).unwrap();
        }
        Bundle::from_config(
            &crate::config::BundleConfig {
                path: path.into(),
                ..Default::default()
            },
            dir,
        )
    }

    fn body(registry: &Registry, url: &str) -> String {
        let asset = registry.lookup(url).unwrap();
        let response = asset.handler.handle(&asset, Some(&RequestContext::default()));
        String::from_utf8(response.data.unwrap()).unwrap()
    }

    #[test]
    fn test_build_publishes_root_alias_and_assets() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(Registry::new());
        let mut app = Application::new("todos", "1", Arc::clone(&registry));
        app.add_bundle(bundle(dir.path(), "frameworks/core", &[("core.js", "core();"), ("core.css", "a{}")]));
        app.add_bundle(bundle(dir.path(), "apps/todos", &[("main.js", "main();")]));

        app.build().unwrap();

        assert_eq!(body(&registry, "1/core/core.js"), "core();");
        assert_eq!(body(&registry, "1/todos/main.js"), "main();");

        let page = body(&registry, "todos");
        assert_eq!(page, body(&registry, "1/todos.html"));
        let core = page.find("src=\"../1/core/core.js\"").unwrap();
        let main = page.find("src=\"../1/todos/main.js\"").unwrap();
        assert!(core < main);
        assert!(page.contains("href=\"../1/core/core.css\""));

        let output = app.last_build().unwrap();
        assert_eq!(output.bundles.len(), 2);
        assert_eq!(output.root.url, "1/todos.html");
    }

    #[test]
    fn test_completion_fires_once_after_all_bundles() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(Registry::new());
        let mut app = Application::new("many", "1", Arc::clone(&registry));
        for i in 0..16 {
            let path = format!("frameworks/lib{i}");
            app.add_bundle(bundle(dir.path(), &path, &[("lib.js", "x")]));
        }

        let fired = AtomicUsize::new(0);
        app.build_with(|result| {
            assert!(result.is_ok());
            // Every bundle is visible by the time completion runs.
            assert_eq!(registry.files().len(), 16 + 2);
            fired.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_bundles_still_completes() {
        let registry = Arc::new(Registry::new());
        let app = Application::new("empty", "1", Arc::clone(&registry));

        let mut fired = 0;
        app.build_with(|result| {
            result.unwrap();
            fired += 1;
        });
        assert_eq!(fired, 1);
        assert!(registry.lookup("empty").is_some());
    }

    #[test]
    fn test_failed_bundle_publishes_nothing() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(Registry::new());
        let mut app = Application::new("broken", "1", Arc::clone(&registry));
        app.add_bundle(bundle(dir.path(), "frameworks/ok", &[("ok.js", "ok")]));
        app.add_bundle(Bundle::from_config(
            &crate::config::BundleConfig {
                path: "frameworks/missing".into(),
                ..Default::default()
            },
            dir.path(),
        ));

        let err = app.build().unwrap_err();
        assert!(format!("{err:#}").contains("missing"));
        assert!(registry.lookup("1/ok/ok.js").is_none());
        assert!(app.last_build().is_none());
    }

    #[test]
    fn test_duplicate_url_rejected() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(Registry::new());
        let mut app = Application::new("dup", "1", Arc::clone(&registry));
        app.add_bundle(bundle(dir.path(), "frameworks/core", &[("a.js", "a")]));
        app.add_bundle(bundle(dir.path(), "apps/core", &[("b.js", "b")]));
        app.add_bundle(bundle(dir.path(), "frameworks/core", &[]));

        let err = app.build().unwrap_err();
        assert!(err.chain().any(|e| e.to_string().contains("1/core/a.js")));
    }

    #[test]
    fn test_rebuild_replaces_previous_entries() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(Registry::new());
        let mut app = Application::new("todos", "1", Arc::clone(&registry));
        app.add_bundle(bundle(dir.path(), "apps/todos", &[("old.js", "old")]));
        app.build().unwrap();
        assert!(registry.lookup("1/todos/old.js").is_some());

        fs::remove_file(dir.path().join("apps/todos/old.js")).unwrap();
        fs::write(dir.path().join("apps/todos/new.js"), "new").unwrap();
        app.build().unwrap();

        assert!(registry.lookup("1/todos/old.js").is_none());
        assert_eq!(body(&registry, "1/todos/new.js"), "new");
    }

    #[test]
    fn test_add_bundle_snapshots_flags() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(Registry::new());
        let mut app = Application::new("todos", "9", registry);
        app.flags.minify_scripts = true;
        app.add_bundle(bundle(dir.path(), "frameworks/a", &[]));
        app.flags.minify_scripts = false;
        app.add_bundle(bundle(dir.path(), "frameworks/b", &[]));

        assert!(app.bundles[0].flags.minify_scripts);
        assert!(!app.bundles[1].flags.minify_scripts);
        assert_eq!(app.bundles[1].version(), "9");
    }
}
