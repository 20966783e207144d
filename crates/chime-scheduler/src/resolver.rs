//! Callable resolution.
//!
//! Jobs reference the function they invoke by dotted path
//! (`"tasks.report.nightly"`). The resolver turns that path into an
//! invocable at creation time, so a bad reference fails the create call
//! instead of surfacing at fire time.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::SchedulerError;

/// Future returned by a job body.
pub type JobFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// An invocable job body: positional args plus keyword args.
pub type Callable = Arc<dyn Fn(Vec<Value>, Map<String, Value>) -> JobFuture + Send + Sync>;

/// Resolves dotted callable paths to invocables.
pub trait CallableResolver: Send + Sync {
    fn resolve(&self, path: &str) -> Result<Callable, SchedulerError>;
}

/// Map-backed resolver. The process registers its job functions under
/// their dotted paths at startup; lookup is exact-match.
#[derive(Default)]
pub struct CallableRegistry {
    callables: HashMap<String, Callable>,
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job function under a dotted path. Replaces any previous
    /// registration for the same path.
    pub fn register<F, Fut>(&mut self, path: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>, Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.callables
            .insert(path.into(), Arc::new(move |args, kwargs| Box::pin(f(args, kwargs))));
    }

    /// Registered paths, for diagnostics.
    pub fn paths(&self) -> Vec<&str> {
        self.callables.keys().map(String::as_str).collect()
    }
}

impl CallableResolver for CallableRegistry {
    fn resolve(&self, path: &str) -> Result<Callable, SchedulerError> {
        self.callables
            .get(path)
            .cloned()
            .ok_or_else(|| SchedulerError::CallableNotFound(path.to_string()))
    }
}
