//! Tool registry
//!
//! Holds the tools the Router may name and dispatches to them. Dispatch never
//! fails: unknown names and tool errors come back as a reported outcome.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::cache::ToolCache;
use super::clock::CurrentTimeTool;
use super::news::FplNewsTool;
use super::trait_def::Tool;

const NEWS_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of one dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutcome {
    pub tool: String,
    pub output: String,
    /// False for unknown tools and failed invocations
    pub ok: bool,
}

pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    cache: ToolCache,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            cache: ToolCache::default(),
        }
    }

    /// The built-in tools: `current_time` and `fpl_news`.
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(CurrentTimeTool));
        registry.register(Arc::new(FplNewsTool::new(NEWS_TIMEOUT)?));
        Ok(registry)
    }

    /// Adds a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// `name: description` lines for display
    pub fn describe(&self) -> Vec<String> {
        self.tools
            .iter()
            .map(|t| format!("{}: {}", t.name(), t.description()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn dispatch(&self, name: &str) -> ToolOutcome {
        let name = name.trim();

        let Some(tool) = self.get_tool(name) else {
            let available = if self.tools.is_empty() {
                "none".to_string()
            } else {
                self.tool_names().join(", ")
            };
            warn!(tool = name, "Unknown tool requested");
            return ToolOutcome {
                tool: name.to_string(),
                output: format!("Unknown tool '{}'. Available: {}", name, available),
                ok: false,
            };
        };

        let cacheable = tool.cacheable();
        let cached = if cacheable { self.cache.get(name) } else { None };
        if let Some(cached) = cached {
            debug!(tool = name, "Tool result found in cache");
            return ToolOutcome {
                tool: name.to_string(),
                output: cached,
                ok: true,
            };
        }

        info!(tool = name, "Invoking tool");
        match tool.invoke().await {
            Ok(output) => {
                debug!(tool = name, bytes = output.len(), "Tool invocation completed");
                if cacheable {
                    self.cache.insert(name, output.clone());
                }
                ToolOutcome {
                    tool: name.to_string(),
                    output,
                    ok: true,
                }
            }
            Err(e) => {
                warn!(tool = name, error = %e, "Tool invocation failed");
                ToolOutcome {
                    tool: name.to_string(),
                    output: format!("Tool '{}' failed: {:#}", name, e),
                    ok: false,
                }
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
