//! Assets: servable units of content with a URL and a handler pipeline.
//!
//! An asset's bytes come from one of four places, tried by its pipeline:
//!
//! | source              | used by                                |
//! |---------------------|----------------------------------------|
//! | `content` producer  | root documents                         |
//! | `source` disk path  | files discovered in a bundle           |
//! | `children`          | combined artifacts (`join` stage)      |
//! | `symlink` target    | bare-name aliases (`symlink` stage)    |

mod kind;

pub use kind::AssetKind;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::BuildError;
use crate::handler::Pipeline;

/// Lazily produces an asset's content. Called on every request that
/// reaches the `file` stage.
pub type Producer = Arc<dyn Fn() -> anyhow::Result<Vec<u8>> + Send + Sync>;

/// Which application (and bundle, if any) registered an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub app: Arc<str>,
    /// `None` for root documents, symlinks and combined artifacts.
    pub bundle: Option<Arc<str>>,
}

impl Owner {
    pub fn app(app: impl Into<Arc<str>>) -> Self {
        Self {
            app: app.into(),
            bundle: None,
        }
    }

    pub fn bundle(app: impl Into<Arc<str>>, bundle: impl Into<Arc<str>>) -> Self {
        Self {
            app: app.into(),
            bundle: Some(bundle.into()),
        }
    }
}

pub struct Asset {
    /// Path relative to the owning bundle, or the URL itself for assets
    /// without a bundle.
    pub path: String,
    /// Key in the server's URL map (no leading slash).
    pub url: String,
    pub owner: Owner,
    pub handler: Arc<Pipeline>,
    pub source: Option<PathBuf>,
    pub content: Option<Producer>,
    pub is_html: bool,
    pub symlink: Option<Arc<Asset>>,
    pub children: Vec<Arc<Asset>>,
}

impl Asset {
    fn bare(owner: Owner, path: String, url: String, handler: Arc<Pipeline>) -> Self {
        Self {
            path,
            url,
            owner,
            handler,
            source: None,
            content: None,
            is_html: false,
            symlink: None,
            children: Vec::new(),
        }
    }

    /// A file inside a bundle, served from disk at
    /// `<version>/<bundle>/<path>`.
    pub fn bundled(
        owner: Owner,
        version: &str,
        path: String,
        source: PathBuf,
        handler: Arc<Pipeline>,
    ) -> Self {
        let bundle = owner.bundle.as_deref().unwrap_or_default();
        let url = format!("{version}/{bundle}/{path}");
        Self {
            source: Some(source),
            ..Self::bare(owner, path, url, handler)
        }
    }

    /// An asset whose content is computed on demand.
    pub fn produced(
        owner: Owner,
        url: impl Into<String>,
        handler: Arc<Pipeline>,
        content: Producer,
    ) -> Self {
        let url = url.into();
        Self {
            content: Some(content),
            ..Self::bare(owner, url.clone(), url, handler)
        }
    }

    /// A combined artifact concatenating `children` in order.
    pub fn combined(
        owner: Owner,
        url: impl Into<String>,
        handler: Arc<Pipeline>,
        children: Vec<Arc<Asset>>,
    ) -> Self {
        let url = url.into();
        Self {
            children,
            ..Self::bare(owner, url.clone(), url, handler)
        }
    }

    /// An alias that serves `target` under another URL.
    ///
    /// Rejects aliases whose target chain leads back to `url`.
    pub fn symlink(
        owner: Owner,
        url: impl Into<String>,
        handler: Arc<Pipeline>,
        target: Arc<Asset>,
    ) -> Result<Self, BuildError> {
        let url = url.into();

        let mut next = Some(&target);
        while let Some(asset) = next {
            if asset.url == url {
                return Err(BuildError::SelfSymlink(url));
            }
            next = asset.symlink.as_ref();
        }

        Ok(Self {
            symlink: Some(target),
            ..Self::bare(owner, url.clone(), url, handler)
        })
    }

    pub fn html(mut self) -> Self {
        self.is_html = true;
        self
    }

    pub fn kind(&self) -> AssetKind {
        AssetKind::from_path(&self.path)
    }

    /// Whether the content is joined from other assets.
    pub fn is_combined(&self) -> bool {
        !self.children.is_empty()
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asset")
            .field("url", &self.url)
            .field("owner", &self.owner)
            .field("handler", &self.handler.names())
            .field("source", &self.source)
            .field("is_html", &self.is_html)
            .field("symlink", &self.symlink.as_ref().map(|a| &a.url))
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}
