//! Bundles: ordered, nestable collections of assets.
//!
//! A bundle is a source directory (or an explicit file list) plus nested
//! sub-bundles. Assembling one yields its scripts and stylesheets in
//! depth-first declaration order, which drives both tag emission in the
//! root document and concatenation order in combined artifacts:
//!
//! ```text
//! theme            own: theme.css
//! ├── base         own: base.css, reset.css
//! └── buttons      own: button.css
//!
//! ordered_stylesheets(theme) = theme.css, base.css, reset.css, button.css
//! ```

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use jwalk::{Parallelism, WalkDir};

use crate::asset::{Asset, AssetKind, Owner};
use crate::config::BundleConfig;
use crate::error::BuildError;
use crate::handler::{Handlers, StageName};

/// Directory names that organize a project but are not part of a
/// bundle's public name.
const ORGANIZING_DIRS: [&str; 4] = ["apps", "bundles", "frameworks", "themes"];

/// Per-bundle build switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildFlags {
    pub combine_scripts: bool,
    pub combine_stylesheets: bool,
    pub minify_scripts: bool,
    pub minify_stylesheets: bool,
    pub validate_scripts: bool,
}

impl BuildFlags {
    /// Switch on every flag that is on in `parent`. Flags are never
    /// switched off by inheritance.
    pub fn inherit(self, parent: Self) -> Self {
        Self {
            combine_scripts: self.combine_scripts || parent.combine_scripts,
            combine_stylesheets: self.combine_stylesheets || parent.combine_stylesheets,
            minify_scripts: self.minify_scripts || parent.minify_scripts,
            minify_stylesheets: self.minify_stylesheets || parent.minify_stylesheets,
            validate_scripts: self.validate_scripts || parent.validate_scripts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bundle {
    pub name: String,
    pub dir: PathBuf,
    pub flags: BuildFlags,
    /// Filled from the owning application on attach when unset.
    pub build_version: Option<String>,
    /// Explicit declaration order; discovered from `dir` when absent.
    pub files: Option<Vec<String>>,
    pub bundles: Vec<Bundle>,
}

/// Assets of one bundle subtree, in traversal order.
#[derive(Debug, Default)]
pub struct Assembled {
    pub scripts: Vec<Arc<Asset>>,
    pub stylesheets: Vec<Arc<Asset>>,
    pub resources: Vec<Arc<Asset>>,
}

impl Assembled {
    /// Every asset to register, scripts first.
    pub fn assets(&self) -> impl Iterator<Item = &Arc<Asset>> {
        self.scripts
            .iter()
            .chain(&self.stylesheets)
            .chain(&self.resources)
    }
}

/// What a bundle needs from its application while assembling.
pub struct BuildContext<'a> {
    pub app: &'a str,
    pub handlers: &'a Handlers,
}

impl Bundle {
    /// `root` is the project directory bundle paths are relative to.
    pub fn from_config(config: &BundleConfig, root: &Path) -> Self {
        Self {
            name: Self::name_for(&config.path),
            dir: root.join(&config.path),
            flags: config.flags(),
            build_version: config.build_version.clone(),
            files: config.files.clone(),
            bundles: config
                .bundles
                .iter()
                .map(|sub| Self::from_config(sub, root))
                .collect(),
        }
    }

    /// Public name of a bundle path: `frameworks/sproutcore/themes/ace`
    /// becomes `sproutcore/ace`.
    pub fn name_for(path: &Path) -> String {
        path.components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .filter(|part| !ORGANIZING_DIRS.contains(part))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Snapshot the owning application's settings into this subtree.
    ///
    /// Later changes to the application do not reach bundles already
    /// attached.
    pub fn attach(&mut self, flags: BuildFlags, version: &str) {
        self.flags = self.flags.inherit(flags);
        let version = self.build_version.get_or_insert_with(|| version.to_string()).clone();
        for sub in &mut self.bundles {
            sub.attach(self.flags, &version);
        }
    }

    pub fn version(&self) -> &str {
        self.build_version.as_deref().unwrap_or_default()
    }

    /// Create this subtree's assets.
    pub fn assemble(&self, ctx: &BuildContext<'_>) -> Result<Assembled, BuildError> {
        self.assemble_within(ctx, &mut Vec::new())
    }

    fn assemble_within<'b>(
        &'b self,
        ctx: &BuildContext<'_>,
        ancestors: &mut Vec<&'b Path>,
    ) -> Result<Assembled, BuildError> {
        if ancestors.contains(&self.dir.as_path()) {
            return Err(BuildError::Cycle(self.name.clone()));
        }

        let mut out = Assembled::default();
        let owner = Owner::bundle(ctx.app, self.name.as_str());
        for path in self.discover()? {
            let kind = AssetKind::from_path(&path);
            let handler = ctx.handlers.build(&self.stages_for(kind));
            let source = self.dir.join(&path);
            let asset = Arc::new(Asset::bundled(owner.clone(), self.version(), path, source, handler));
            match kind {
                AssetKind::Script => out.scripts.push(asset),
                AssetKind::Stylesheet => out.stylesheets.push(asset),
                AssetKind::Resource => out.resources.push(asset),
            }
        }

        ancestors.push(&self.dir);
        for sub in &self.bundles {
            let nested = sub.assemble_within(ctx, ancestors)?;
            out.scripts.extend(nested.scripts);
            out.stylesheets.extend(nested.stylesheets);
            out.resources.extend(nested.resources);
        }
        ancestors.pop();

        if self.flags.combine_scripts && !out.scripts.is_empty() {
            let scripts = std::mem::take(&mut out.scripts);
            out.scripts.push(self.combine(ctx, &owner, "javascript.js", scripts));
        }
        if self.flags.combine_stylesheets && !out.stylesheets.is_empty() {
            let stylesheets = std::mem::take(&mut out.stylesheets);
            out.stylesheets.push(self.combine(ctx, &owner, "stylesheet.css", stylesheets));
        }

        Ok(out)
    }

    /// A nested bundle that combined on its own contributes its children,
    /// so the outer combined asset always joins individual files.
    fn combine(
        &self,
        ctx: &BuildContext<'_>,
        owner: &Owner,
        file: &str,
        assets: Vec<Arc<Asset>>,
    ) -> Arc<Asset> {
        let mut children = Vec::with_capacity(assets.len());
        for asset in assets {
            if asset.is_combined() {
                children.extend(asset.children.iter().cloned());
            } else {
                children.push(asset);
            }
        }

        let mut stages = vec![StageName::Cache, StageName::ContentType];
        if self.minifies(AssetKind::from_path(file)) {
            stages.push(StageName::Minify);
        }
        stages.push(StageName::Join);

        let url = format!("{}/{}/{}", self.version(), self.name, file);
        let mut asset = Asset::combined(owner.clone(), url, ctx.handlers.build(&stages), children);
        asset.path = file.to_string();
        Arc::new(asset)
    }

    fn minifies(&self, kind: AssetKind) -> bool {
        match kind {
            AssetKind::Script => self.flags.minify_scripts,
            AssetKind::Stylesheet => self.flags.minify_stylesheets,
            AssetKind::Resource => false,
        }
    }

    fn stages_for(&self, kind: AssetKind) -> Vec<StageName> {
        let mut stages = vec![StageName::Cache, StageName::ContentType];
        if self.minifies(kind) {
            stages.push(StageName::Minify);
        }
        if kind == AssetKind::Script && self.flags.validate_scripts {
            stages.push(StageName::Validate);
        }
        stages.push(StageName::File);
        stages
    }

    /// Own files relative to `dir`, excluding hidden entries and the
    /// directories of nested bundles.
    fn discover(&self) -> Result<Vec<String>, BuildError> {
        if let Some(files) = &self.files {
            return Ok(files.clone());
        }

        fs::read_dir(&self.dir).map_err(|e| self.unreadable(e))?;

        // Bundles are assembled inside the build's rayon scope; a parallel
        // walk on the same pool would abort instead of waiting.
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir)
            .skip_hidden(true)
            .parallelism(Parallelism::Serial)
        {
            let entry = entry.map_err(|e| self.unreadable(io::Error::other(e.to_string())))?;
            let path = entry.path();
            if entry.file_type().is_file()
                && !self.bundles.iter().any(|sub| path.starts_with(&sub.dir))
            {
                files.push(path);
            }
        }
        files.sort();

        Ok(files
            .iter()
            .filter_map(|path| path.strip_prefix(&self.dir).ok())
            .map(to_url_path)
            .collect())
    }

    fn unreadable(&self, error: io::Error) -> BuildError {
        BuildError::BundleUnreadable(self.dir.clone(), error)
    }
}

fn to_url_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect::<Vec<_>>()
        .join("/")
}
