//! Core primitives shared by the build and serve paths.

mod latch;
mod state;

pub use latch::Latch;
pub use state::{is_shutdown, register_server, setup_shutdown_handler};
