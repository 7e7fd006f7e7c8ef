//! Shared helpers: HTTP dates, HTML escaping, MIME and language lookups.

pub mod date;
pub mod html;
pub mod locale;
pub mod mime;
