//! The root document: the HTML page that loads an application.
//!
//! Its link and script tags follow bundle declaration order. Links are
//! only known once every bundle has been assembled, so a [`RootPage`] is
//! registered first and receives them when the build fans in.

use std::sync::OnceLock;

use rustc_hash::FxHashSet;

use crate::bundle::Assembled;
use crate::utils::html::{escape_attr, escape_js_string};
use crate::utils::locale::short_language;
use crate::warn;

/// Markup injected verbatim at fixed points of the page.
#[derive(Debug, Clone, Default)]
pub struct HtmlInjections {
    pub head: Option<String>,
    pub stylesheets: Option<String>,
    pub before_scripts: Option<String>,
    pub after_scripts: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PageSettings {
    pub language: String,
    pub theme: String,
    pub url_prefix: String,
    pub html: HtmlInjections,
}

/// Stylesheet and script URLs in emission order, each listed once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLinks {
    pub stylesheets: Vec<String>,
    pub scripts: Vec<String>,
}

impl PageLinks {
    pub fn collect<'a>(bundles: impl IntoIterator<Item = &'a Assembled>) -> Self {
        let mut links = Self::default();
        let mut seen = FxHashSet::default();

        for bundle in bundles {
            for asset in &bundle.stylesheets {
                if seen.insert(asset.url.as_str()) {
                    links.stylesheets.push(asset.url.clone());
                }
            }
            for asset in &bundle.scripts {
                if seen.insert(asset.url.as_str()) {
                    links.scripts.push(asset.url.clone());
                }
            }
        }
        links
    }
}

/// Render a root document.
///
/// `stylesheets` and `scripts` replace the generated tag lists when given;
/// the production page uses them to point at combined artifacts.
pub fn render(
    settings: &PageSettings,
    links: &PageLinks,
    stylesheets: Option<&str>,
    scripts: Option<&str>,
) -> String {
    let language = short_language(&settings.language);
    if language.is_none() {
        warn!("unknown build language `{}`", settings.language);
    }
    let prefix = escape_attr(&settings.url_prefix);
    let html = &settings.html;

    let mut lines: Vec<String> = vec!["<!DOCTYPE html>".into()];
    lines.push(match language {
        Some(code) => format!("<html lang=\"{code}\">"),
        None => "<html>".into(),
    });
    lines.push("<head>".into());
    lines.push("<meta charset=\"utf-8\">".into());
    lines.push("<meta http-equiv=\"X-UA-Compatible\" content=\"IE=edge,chrome=1\">".into());
    lines.extend(html.head.clone());
    lines.extend(html.stylesheets.clone());

    match stylesheets {
        Some(markup) => lines.push(markup.to_string()),
        None => lines.extend(links.stylesheets.iter().map(|url| {
            format!(
                "<link href=\"{prefix}{}\" rel=\"stylesheet\" type=\"text/css\">",
                escape_attr(url)
            )
        })),
    }

    lines.push("</head>".into());
    lines.push(format!(
        "<body class=\"{} focus\">",
        escape_attr(&settings.theme)
    ));
    lines.extend(html.before_scripts.clone());
    lines.push(format!(
        "<script type=\"text/javascript\">String.preferredLanguage = \"{}\";</script>",
        escape_js_string(&settings.language)
    ));

    match scripts {
        Some(markup) => lines.push(markup.to_string()),
        None => lines.extend(links.scripts.iter().map(|url| {
            format!(
                "<script type=\"text/javascript\" src=\"{prefix}{}\"></script>",
                escape_attr(url)
            )
        })),
    }

    lines.extend(html.after_scripts.clone());
    lines.push("</body>".into());
    lines.push("</html>".into());
    lines.join("\n")
}

/// A root document whose links are filled in once.
#[derive(Debug)]
pub struct RootPage {
    settings: PageSettings,
    links: OnceLock<PageLinks>,
}

impl RootPage {
    pub fn new(settings: PageSettings) -> Self {
        Self {
            settings,
            links: OnceLock::new(),
        }
    }

    pub fn settings(&self) -> &PageSettings {
        &self.settings
    }

    /// Later calls are ignored.
    pub fn set_links(&self, links: PageLinks) {
        let _ = self.links.set(links);
    }

    /// Development page: one tag per asset. Renders without tags until
    /// links are set.
    pub fn render(&self) -> String {
        match self.links.get() {
            Some(links) => render(&self.settings, links, None, None),
            None => render(&self.settings, &PageLinks::default(), None, None),
        }
    }
}
