//! The server model: applications plus the flat URL map they publish to.
//!
//! The map is read by every request and replaced wholesale by builds:
//!
//! ```text
//! Application::build ─ staged FileMap ─▶ Registry::publish (rcu swap)
//!                                              │
//! request threads ◀── Registry::lookup ◀───────┘ (lock-free load)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;

use crate::app::Application;
use crate::asset::Asset;
use crate::config::{ConfigError, GarconConfig, ServerConfig};
use crate::handler::Handlers;
use crate::warn;

/// URL (no leading slash) to asset.
pub type FileMap = FxHashMap<String, Arc<Asset>>;

/// Stage registry and URL map shared by every application of a server.
pub struct Registry {
    pub handlers: Handlers,
    files: ArcSwap<FileMap>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            handlers: Handlers::new(),
            files: ArcSwap::from_pointee(FileMap::default()),
        }
    }

    pub fn lookup(&self, url: &str) -> Option<Arc<Asset>> {
        self.files.load().get(url).cloned()
    }

    /// Snapshot of the whole map.
    pub fn files(&self) -> Arc<FileMap> {
        self.files.load_full()
    }

    /// Replace every entry owned by `app` with `staged`, in one swap.
    pub fn publish(&self, app: &str, staged: FileMap) {
        self.files.rcu(|current| {
            let mut next: FileMap = current
                .iter()
                .filter(|(_, asset)| &*asset.owner.app != app)
                .map(|(url, asset)| (url.clone(), Arc::clone(asset)))
                .collect();
            next.extend(
                staged
                    .iter()
                    .map(|(url, asset)| (url.clone(), Arc::clone(asset))),
            );
            next
        });
        self.handlers.invalidate();
    }
}

pub struct Server {
    pub config: ServerConfig,
    /// Directory bundle paths are relative to.
    pub root: PathBuf,
    registry: Arc<Registry>,
    apps: Vec<Application>,
}

impl Server {
    pub fn new(config: ServerConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
            registry: Arc::new(Registry::new()),
            apps: Vec::new(),
        }
    }

    pub fn from_config(config: &GarconConfig) -> Result<Self> {
        let mut server = Self::new(config.server.clone(), &config.root);
        for app in &config.apps {
            let app = Application::from_config(app, &server.root, Arc::clone(&server.registry));
            server.add_app(app)?;
        }
        Ok(server)
    }

    /// Attach `app`. Names must be unique: each one is both a URL and a
    /// save file name.
    pub fn add_app(&mut self, app: Application) -> Result<&Application, ConfigError> {
        if app.name.is_empty() {
            warn!("an application without a name is served at the site root");
        }
        if self.app(&app.name).is_some() {
            return Err(ConfigError::DuplicateApp(app.name));
        }
        self.apps.push(app);
        Ok(&self.apps[self.apps.len() - 1])
    }

    pub fn app(&self, name: &str) -> Option<&Application> {
        self.apps.iter().find(|app| app.name == name)
    }

    pub fn apps(&self) -> &[Application] {
        &self.apps
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Build every application, stopping at the first failure.
    pub fn build_all(&self) -> Result<()> {
        if self.apps.is_empty() {
            bail!("nothing to build: no applications configured");
        }
        for app in &self.apps {
            app.build()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Owner;
    use crate::handler::StageName;

    fn asset(registry: &Registry, app: &str, url: &str) -> Arc<Asset> {
        let producer: crate::asset::Producer = Arc::new(|| Ok(Vec::new()));
        Arc::new(Asset::produced(
            Owner::app(app),
            url,
            registry.handlers.build(&[StageName::File]),
            producer,
        ))
    }

    fn staged(assets: &[Arc<Asset>]) -> FileMap {
        assets.iter().map(|a| (a.url.clone(), Arc::clone(a))).collect()
    }

    #[test]
    fn test_publish_replaces_only_owned_entries() {
        let registry = Registry::new();
        registry.publish("a", staged(&[asset(&registry, "a", "a"), asset(&registry, "a", "1/a/old.js")]));
        registry.publish("b", staged(&[asset(&registry, "b", "b")]));

        let before = registry.files();
        registry.publish("a", staged(&[asset(&registry, "a", "a"), asset(&registry, "a", "1/a/new.js")]));

        assert!(registry.lookup("1/a/old.js").is_none());
        assert!(registry.lookup("1/a/new.js").is_some());
        assert!(registry.lookup("b").is_some());
        // Readers holding the old snapshot keep a consistent view.
        assert!(before.contains_key("1/a/old.js"));
        assert!(!before.contains_key("1/a/new.js"));
    }

    #[test]
    fn test_publish_makes_previous_stamp_stale() {
        let registry = Registry::new();
        let producer: crate::asset::Producer = Arc::new(|| Ok(b"v1".to_vec()));
        let cached = Arc::new(Asset::produced(
            Owner::app("a"),
            "1/a/app.js",
            registry.handlers.build(&[StageName::Cache, StageName::File]),
            producer,
        ));
        registry.publish("a", staged(&[Arc::clone(&cached)]));
        let stamp = cached.handler.handle(&cached, None).last_modified.unwrap();

        registry.publish("a", staged(&[Arc::clone(&cached)]));

        let ctx = crate::handler::RequestContext {
            if_modified_since: Some(stamp),
        };
        assert_eq!(cached.handler.handle(&cached, Some(&ctx)).status(), 200);
    }

    #[test]
    fn test_duplicate_app_rejected() {
        let mut server = Server::new(ServerConfig::default(), "/site");
        let registry = Arc::clone(server.registry());
        server.add_app(Application::new("todos", "1", Arc::clone(&registry))).unwrap();

        let Err(err) = server.add_app(Application::new("todos", "2", registry)) else {
            panic!("duplicate application accepted");
        };
        assert!(matches!(err, ConfigError::DuplicateApp(name) if name == "todos"));
        assert_eq!(server.apps().len(), 1);
    }

    #[test]
    fn test_from_config_builds_apps() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("apps/todos")).unwrap();
        std::fs::write(dir.path().join("apps/todos/main.js"), "main();").unwrap();

        let mut config = crate::config::test_parse_config(
            "[[apps]]\nname = \"todos\"\nbuild_version = \"3\"\n[[apps.bundles]]\npath = \"apps/todos\"",
        );
        config.root = dir.path().to_path_buf();

        let server = Server::from_config(&config).unwrap();
        server.build_all().unwrap();

        let main = server.registry().lookup("3/todos/main.js").unwrap();
        let response = main.handler.handle(&main, None);
        assert_eq!(response.data.unwrap(), b"main();");
        assert!(server.registry().lookup("todos").is_some());
        assert!(server.app("todos").unwrap().last_build().is_some());
    }
}
