//! Handler pipelines: ordered chains of stages turning an asset into a
//! [`Response`].
//!
//! A pipeline is built once from a list of stage names and shared by every
//! asset configured with the same list. Each stage receives the rest of the
//! chain as [`Next`] and either calls it or answers on its own:
//!
//! ```text
//! cache ─▶ contentType ─▶ minify ─▶ file
//!   ▲           │            │        │
//!   └── 304 ◀───┴─ mime ◀────┴─ min ◀─┴─ bytes
//! ```
//!
//! Outer stages decorate what inner stages return; `file`, `join` and
//! `symlink` end the chain.

mod response;
mod stage;

pub use response::{RequestContext, Response};

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::asset::Asset;

/// One step of a pipeline.
///
/// Stages hold no per-call state, so a single instance serves every
/// pipeline that names it.
pub trait Stage: Send + Sync {
    fn handle(&self, asset: &Asset, ctx: Option<&RequestContext>, next: Next<'_>) -> Response;
}

/// The remainder of a pipeline after the current stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
}

impl Next<'_> {
    /// Run the next stage. Past the end of the chain there is nothing to
    /// emit.
    pub fn run(self, asset: &Asset, ctx: Option<&RequestContext>) -> Response {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle(asset, ctx, Next { stages: rest }),
            None => Response::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageName {
    Cache,
    ContentType,
    File,
    Symlink,
    Join,
    Minify,
    Validate,
}

impl StageName {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::ContentType => "contentType",
            Self::File => "file",
            Self::Symlink => "symlink",
            Self::Join => "join",
            Self::Minify => "minify",
            Self::Validate => "validate",
        }
    }
}

/// An immutable, shareable chain of stages.
pub struct Pipeline {
    names: Vec<StageName>,
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn handle(&self, asset: &Asset, ctx: Option<&RequestContext>) -> Response {
        Next {
            stages: &self.stages,
        }
        .run(asset, ctx)
    }

    pub fn names(&self) -> &[StageName] {
        &self.names
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names.iter().map(|name| name.as_str()).collect();
        write!(f, "Pipeline[{}]", names.join(", "))
    }
}

/// Registry of stage instances and the pipelines built from them.
pub struct Handlers {
    cache: Arc<stage::Cache>,
    stages: FxHashMap<StageName, Arc<dyn Stage>>,
    pipelines: Mutex<FxHashMap<Vec<StageName>, Arc<Pipeline>>>,
}

impl Default for Handlers {
    fn default() -> Self {
        Self::new()
    }
}

impl Handlers {
    pub fn new() -> Self {
        let cache = Arc::new(stage::Cache::default());
        let mut stages: FxHashMap<StageName, Arc<dyn Stage>> = FxHashMap::default();
        stages.insert(StageName::Cache, Arc::clone(&cache) as Arc<dyn Stage>);
        stages.insert(StageName::ContentType, Arc::new(stage::ContentType));
        stages.insert(StageName::File, Arc::new(stage::File));
        stages.insert(StageName::Symlink, Arc::new(stage::Symlink));
        stages.insert(StageName::Join, Arc::new(stage::Join));
        stages.insert(StageName::Minify, Arc::new(stage::Minify));
        stages.insert(StageName::Validate, Arc::new(stage::Validate));

        Self {
            cache,
            stages,
            pipelines: Mutex::new(FxHashMap::default()),
        }
    }

    /// Give cached responses a new `Last-Modified`, so clients holding the
    /// previous one refetch.
    pub fn invalidate(&self) {
        self.cache.reset();
    }

    /// Pipeline running `names` in order. Identical lists share one
    /// pipeline.
    pub fn build(&self, names: &[StageName]) -> Arc<Pipeline> {
        let mut pipelines = self.pipelines.lock();
        if let Some(pipeline) = pipelines.get(names) {
            return Arc::clone(pipeline);
        }

        let pipeline = Arc::new(Pipeline {
            names: names.to_vec(),
            stages: names.iter().map(|name| Arc::clone(&self.stages[name])).collect(),
        });
        pipelines.insert(names.to_vec(), Arc::clone(&pipeline));
        pipeline
    }

}
