//! Production build.
//!
//! Per application, in declaration order:
//! - **Build** - assemble bundles and publish URLs
//! - **Save** - combined `<app>.css` / `<app>.js`, `<app>/index`, resources
//! - **Manifest** - `<version>/app.manifest` over the saved version tree

use crate::config::GarconConfig;
use crate::server::Server;
use crate::{debug, log};
use anyhow::{Context, Result};

/// Build, save and write the manifest of every configured application.
/// Returns the number of files written.
pub fn build_all(config: &GarconConfig) -> Result<usize> {
    let server = Server::from_config(config)?;
    server.build_all()?;

    let mut written = 0;
    for app in server.apps() {
        let report = app
            .save()
            .with_context(|| format!("failed to save application `{}`", app.name))?;
        let manifest = app.manifest()?;
        debug!("build"; "{}: {} empty assets skipped", app.name, report.skipped);
        debug!("build"; "manifest at {}", manifest.display());
        written += report.written + 1;
    }

    log!("build"; "done, {} files written", written);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_build_writes_artifacts_and_manifest() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("frameworks/core/images")).unwrap();
        fs::create_dir_all(root.join("apps/todos")).unwrap();
        fs::write(root.join("frameworks/core/core.js"), "var core = 1;").unwrap();
        fs::write(root.join("frameworks/core/images/bg.png"), "PNG").unwrap();
        fs::write(root.join("apps/todos/main.js"), "core;").unwrap();
        fs::write(root.join("apps/todos/main.css"), "body{}").unwrap();

        let mut config = test_parse_config(
            r#"
[[apps]]
name = "todos"
build_version = "42"
save_path = "out"

[[apps.bundles]]
path = "frameworks/core"

[[apps.bundles]]
path = "apps/todos"
"#,
        );
        config.root = root.to_path_buf();
        config.apps[0].save_path = root.join("out");

        let written = build_all(&config).unwrap();
        assert_eq!(written, 5);

        let out = root.join("out");
        assert_eq!(
            fs::read_to_string(out.join("todos.js")).unwrap(),
            "var core = 1;\ncore;"
        );
        assert_eq!(fs::read_to_string(out.join("todos.css")).unwrap(), "body{}");
        assert!(out.join("todos/index").is_file());

        let manifest = fs::read_to_string(out.join("42/app.manifest")).unwrap();
        assert!(manifest.starts_with("CACHE MANIFEST\n"));
        assert!(manifest.contains("\n/42/core/images/bg.png\n"));
        assert!(manifest.ends_with("NETWORK:\n*\n"));
    }

    #[test]
    fn test_build_without_apps_fails() {
        let config = test_parse_config("");
        assert!(build_all(&config).is_err());
    }
}
