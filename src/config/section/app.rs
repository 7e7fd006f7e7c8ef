//! `[[apps]]` and `[[apps.bundles]]` configuration.
//!
//! # Example
//!
//! ```toml
//! [[apps]]
//! name = "todos"
//! theme = "sc-theme"
//! build_language = "english"
//! combine_stylesheets = true
//! html_head = "<title>Todos</title>"
//!
//! [[apps.bundles]]
//! path = "frameworks/sproutcore"
//! files = ["core.js", "main.js"]
//!
//! [[apps.bundles.bundles]]
//! path = "frameworks/sproutcore/themes/ace"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::bundle::BuildFlags;

/// One application served and built by garcon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,

    /// Class put on `<body>` next to `focus`.
    pub theme: String,

    /// Human-readable language name, e.g. `"english"`.
    pub build_language: String,

    /// Version segment of every URL. Defaults to the load time in unix
    /// milliseconds.
    pub build_version: Option<String>,

    /// Prefix put in front of asset URLs in the root document.
    pub url_prefix: String,

    /// Output directory of `garcon build` (relative to project root).
    pub save_path: PathBuf,

    pub combine_scripts: bool,
    pub combine_stylesheets: bool,
    pub minify_scripts: bool,
    pub minify_stylesheets: bool,
    pub validate_scripts: bool,

    pub html_head: Option<String>,
    pub html_stylesheets: Option<String>,
    pub html_before_scripts: Option<String>,
    pub html_after_scripts: Option<String>,

    pub bundles: Vec<BundleConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            theme: "sc-theme".into(),
            build_language: "english".into(),
            build_version: None,
            url_prefix: "../".into(),
            save_path: "build".into(),
            combine_scripts: false,
            combine_stylesheets: false,
            minify_scripts: false,
            minify_stylesheets: false,
            validate_scripts: false,
            html_head: None,
            html_stylesheets: None,
            html_before_scripts: None,
            html_after_scripts: None,
            bundles: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn flags(&self) -> BuildFlags {
        BuildFlags {
            combine_scripts: self.combine_scripts,
            combine_stylesheets: self.combine_stylesheets,
            minify_scripts: self.minify_scripts,
            minify_stylesheets: self.minify_stylesheets,
            validate_scripts: self.validate_scripts,
        }
    }
}

/// A bundle directory, optionally with an explicit file order and nested
/// sub-bundles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Directory relative to the project root.
    pub path: PathBuf,

    /// Overrides the owning application's version.
    pub build_version: Option<String>,

    /// Files in declaration order, relative to `path`. When absent the
    /// directory is walked.
    pub files: Option<Vec<String>>,

    pub combine_scripts: bool,
    pub combine_stylesheets: bool,
    pub minify_scripts: bool,
    pub minify_stylesheets: bool,
    pub validate_scripts: bool,

    pub bundles: Vec<BundleConfig>,
}

impl BundleConfig {
    pub fn flags(&self) -> BuildFlags {
        BuildFlags {
            combine_scripts: self.combine_scripts,
            combine_stylesheets: self.combine_stylesheets,
            minify_scripts: self.minify_scripts,
            minify_stylesheets: self.minify_stylesheets,
            validate_scripts: self.validate_scripts,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::config::test_parse_config;

    #[test]
    fn test_app_defaults() {
        let config = test_parse_config("[[apps]]\nname = \"todos\"");
        let app = &config.apps[0];

        assert_eq!(app.name, "todos");
        assert_eq!(app.theme, "sc-theme");
        assert_eq!(app.build_language, "english");
        assert_eq!(app.url_prefix, "../");
        assert_eq!(app.save_path, PathBuf::from("build"));
        assert_eq!(app.flags(), Default::default());
        assert!(app.bundles.is_empty());
    }

    #[test]
    fn test_nested_bundles() {
        let config = test_parse_config(
            r#"
[[apps]]
name = "todos"
minify_scripts = true

[[apps.bundles]]
path = "frameworks/sproutcore"
combine_scripts = true
files = ["core.js", "main.js"]

[[apps.bundles.bundles]]
path = "frameworks/sproutcore/themes/ace"
build_version = "2"
"#,
        );
        let app = &config.apps[0];
        assert!(app.flags().minify_scripts);

        let framework = &app.bundles[0];
        assert!(framework.flags().combine_scripts);
        assert!(!framework.flags().minify_scripts);
        assert_eq!(
            framework.files.as_deref(),
            Some(&["core.js".to_string(), "main.js".to_string()][..])
        );

        let theme = &framework.bundles[0];
        assert_eq!(theme.path, PathBuf::from("frameworks/sproutcore/themes/ace"));
        assert_eq!(theme.build_version.as_deref(), Some("2"));
        assert!(theme.files.is_none());
    }
}
