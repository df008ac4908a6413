//! Plugin registry - named sink constructors resolved once at startup

use contracts::{HubError, TrafficSink};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;

use crate::sinks::{CountSink, TraceSink};

/// What a plugin constructor gets to work with
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// Plugin name as requested
    pub name: String,
    /// Configured log output path
    pub path: PathBuf,
}

/// Builds a sink for a plugin name
pub type PluginConstructor = fn(&PluginContext) -> Result<Box<dyn TrafficSink>, HubError>;

/// Explicit name -> constructor table.
///
/// Resolution happens once; the sink it returns is fixed for the hub's lifetime.
#[derive(Clone)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, PluginConstructor>,
}

impl PluginRegistry {
    /// Registry with no plugins at all
    pub fn empty() -> Self {
        Self {
            plugins: BTreeMap::new(),
        }
    }

    /// Registry with the built-in `trace` and `count` plugins
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("trace", trace_plugin);
        registry.register("count", count_plugin);
        registry
    }

    /// Register (or replace) a plugin
    pub fn register(&mut self, name: impl Into<String>, constructor: PluginConstructor) {
        self.plugins.insert(name.into(), constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Registered plugin names, sorted
    pub fn names(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }

    /// Look up `name` and build its sink
    ///
    /// # Errors
    /// `PluginNotFound` when no plugin of that name is registered, or whatever
    /// the constructor reports.
    pub fn resolve(&self, name: &str, path: PathBuf) -> Result<Box<dyn TrafficSink>, HubError> {
        let constructor = self
            .plugins
            .get(name)
            .ok_or_else(|| HubError::PluginNotFound {
                name: name.to_string(),
                available: self.names(),
            })?;

        let ctx = PluginContext {
            name: name.to_string(),
            path,
        };
        let sink = constructor(&ctx)?;
        info!(plugin = %name, sink = %sink.name(), "Log plugin resolved");
        Ok(sink)
    }
}

fn trace_plugin(ctx: &PluginContext) -> Result<Box<dyn TrafficSink>, HubError> {
    Ok(Box::new(TraceSink::new(&ctx.name)))
}

fn count_plugin(ctx: &PluginContext) -> Result<Box<dyn TrafficSink>, HubError> {
    Ok(Box::new(CountSink::new(&ctx.name, ctx.path.clone())))
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}
