//! Tool registry for the tools the server can run.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::ToolError;
use crate::tools::tool::{Tool, ToolDefinition};

#[derive(Default)]
struct Entries {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Registration order, for stable listings.
    order: Vec<String>,
}

impl Entries {
    fn insert(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let id = tool.id().to_string();
        if self.tools.contains_key(&id) {
            return Err(ToolError::AlreadyRegistered { id });
        }
        self.order.push(id.clone());
        self.tools.insert(id, tool);
        Ok(())
    }

    fn ordered(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.order.iter().filter_map(|id| self.tools.get(id))
    }
}

/// Registry of available tools, keyed by tool id.
pub struct ToolRegistry {
    entries: RwLock<Entries>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Register a tool. A second tool with the same id is rejected.
    pub async fn register(&self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let id = tool.id().to_string();
        match self.entries.write().await.insert(tool) {
            Ok(()) => {
                tracing::debug!("Registered tool: {}", id);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(tool = %id, "Rejected tool registration: id already in use");
                Err(e)
            }
        }
    }

    /// Register a tool during startup, before the registry is shared.
    pub fn register_sync(&self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let id = tool.id().to_string();
        let mut entries = self
            .entries
            .try_write()
            .map_err(|_| ToolError::failed(format!("registry busy while registering {id}")))?;
        entries.insert(tool)?;
        tracing::debug!("Registered tool: {}", id);
        Ok(())
    }

    /// Get a tool by id.
    pub async fn get(&self, id: &str) -> Option<Arc<dyn Tool>> {
        self.entries.read().await.tools.get(id).cloned()
    }

    /// Check if a tool exists.
    pub async fn has(&self, id: &str) -> bool {
        self.entries.read().await.tools.contains_key(id)
    }

    /// Definition of one tool.
    pub async fn definition(&self, id: &str) -> Option<ToolDefinition> {
        self.get(id).await.map(|tool| tool.definition().clone())
    }

    /// All tool definitions, in registration order.
    pub async fn list_definitions(&self) -> Vec<ToolDefinition> {
        self.entries
            .read()
            .await
            .ordered()
            .map(|tool| tool.definition().clone())
            .collect()
    }

    /// Definitions in one category, in registration order.
    pub async fn by_category(&self, category: &str) -> Vec<ToolDefinition> {
        self.entries
            .read()
            .await
            .ordered()
            .filter(|tool| tool.definition().category == category)
            .map(|tool| tool.definition().clone())
            .collect()
    }

    /// Definitions grouped by category name.
    pub async fn categories(&self) -> BTreeMap<String, Vec<ToolDefinition>> {
        let mut grouped: BTreeMap<String, Vec<ToolDefinition>> = BTreeMap::new();
        for tool in self.entries.read().await.ordered() {
            let def = tool.definition();
            grouped.entry(def.category.clone()).or_default().push(def.clone());
        }
        grouped
    }

    /// Get the number of registered tools. Waits for any in-flight registration.
    pub async fn count(&self) -> usize {
        self.entries.read().await.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
