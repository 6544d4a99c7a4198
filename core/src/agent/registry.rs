use crate::error::ScoutError;
use crate::traits::{Tool, ToolQuery, ToolSpec};
use std::sync::Arc;
use tracing::{debug, warn};

/// What a dispatch produced for the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Output(String),
    /// The model named a tool that is not registered.
    UnknownTool(String),
}

impl Dispatch {
    pub fn into_text(self) -> String {
        match self {
            Self::Output(text) => text,
            Self::UnknownTool(name) => format!("Error: tool '{name}' is not available"),
        }
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(Arc::from(tool));
    }

    pub fn with_tools(tools: impl IntoIterator<Item = Box<dyn Tool>>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn get_specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    /// Validates `arguments` as a [`ToolQuery`] and runs the named tool.
    /// Invalid input and tool failures are errors; an unknown name is not.
    pub async fn execute(&self, name: &str, arguments: &str) -> anyhow::Result<Dispatch> {
        let Some(tool) = self.tools.iter().find(|t| t.name() == name).cloned() else {
            warn!("Model requested unknown tool '{}'", name);
            return Ok(Dispatch::UnknownTool(name.to_string()));
        };

        let query = parse_query(name, arguments)?;
        debug!(tool = name, query = %query.query, "dispatching tool");

        let output = tool.run(&query.query).await.map_err(|e| match e.downcast::<ScoutError>() {
            Ok(scout) => scout,
            Err(other) => ScoutError::tool(name, format!("{other:#}")),
        })?;

        Ok(Dispatch::Output(output))
    }
}

fn parse_query(tool: &str, arguments: &str) -> Result<ToolQuery, ScoutError> {
    let raw = if arguments.trim().is_empty() { "{}" } else { arguments };

    let query: ToolQuery =
        serde_json::from_str(raw).map_err(|e| ScoutError::invalid_input(tool, e.to_string()))?;

    if query.query.trim().is_empty() {
        return Err(ScoutError::invalid_input(tool, "query must not be empty"));
    }

    Ok(query)
}
