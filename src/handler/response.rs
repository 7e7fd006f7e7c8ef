//! Response records produced by handler pipelines.

use crate::utils::date::HttpDate;

/// What a pipeline hands back to the HTTP layer or the save step.
///
/// `data: None` and `data: Some(empty)` both mean "nothing to emit";
/// the save step skips such assets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub data: Option<Vec<u8>>,
    pub content_type: Option<&'static str>,
    pub last_modified: Option<HttpDate>,
    pub status: Option<u16>,
    /// Set when a stage could not produce content.
    pub error: Option<String>,
}

impl Response {
    pub fn data(data: Vec<u8>) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Error-shaped record for an unreadable source.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: Some(404),
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn not_modified(last_modified: HttpDate) -> Self {
        Self {
            status: Some(304),
            last_modified: Some(last_modified),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.data.as_ref().is_none_or(Vec::is_empty)
    }

    /// HTTP status, defaulting to 200.
    pub fn status(&self) -> u16 {
        self.status.unwrap_or(200)
    }
}

/// Per-request inputs visible to stages. Absent when saving.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub if_modified_since: Option<HttpDate>,
}
