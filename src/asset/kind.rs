//! Asset classification.

/// What an asset contributes to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// `.js`: emitted as a `<script>` tag and concatenated into `<app>.js`.
    Script,
    /// `.css`: emitted as a `<link>` tag and concatenated into `<app>.css`.
    Stylesheet,
    /// Anything else: persisted to disk as-is on save.
    Resource,
}

impl AssetKind {
    pub fn from_path(path: &str) -> Self {
        if path.ends_with(".js") {
            Self::Script
        } else if path.ends_with(".css") {
            Self::Stylesheet
        } else {
            Self::Resource
        }
    }
}
