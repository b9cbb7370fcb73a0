//! Tool Registry & Validator (C6): holds system and per-agent tools under
//! case-insensitive names, and validates LLM-supplied arguments against a
//! tool's input schema before execution.

use crate::tools::Tool;
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;

/// Holds tools in two namespaces. System tools are registered once at
/// startup and are read-only afterward; agent tools are added per-Agent at
/// construction. A name registered as a system tool cannot be shadowed by
/// an agent tool with the same name (case-insensitively).
#[derive(Default)]
pub struct ToolRegistry {
    system: HashMap<String, Tool>,
    agent: HashMap<String, Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a system (built-in) tool.
    pub fn register_system(&mut self, tool: Tool) -> Result<()> {
        let key = tool.name().to_lowercase();
        if self.system.contains_key(&key) {
            return Err(Error::config(format!(
                "system tool '{}' already registered",
                tool.name()
            )));
        }
        self.system.insert(key, tool);
        Ok(())
    }

    /// Registers an agent (user-supplied) tool. Rejected if its name
    /// collides with a system tool, case-insensitively.
    pub fn register_agent(&mut self, tool: Tool) -> Result<()> {
        let key = tool.name().to_lowercase();
        if self.system.contains_key(&key) {
            return Err(Error::config(format!(
                "tool name '{}' conflicts with a system tool",
                tool.name()
            )));
        }
        self.agent.insert(key, tool);
        Ok(())
    }

    /// Looks up a tool by name, case-insensitively. System tools take
    /// precedence over agent tools of the same name.
    pub fn get(&self, name: &str) -> Option<&Tool> {
        let key = name.to_lowercase();
        self.system.get(&key).or_else(|| self.agent.get(&key))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All registered tool names, system first, in no particular order
    /// within each namespace.
    pub fn names(&self) -> Vec<String> {
        self.system
            .values()
            .chain(self.agent.values())
            .map(|t| t.name().to_string())
            .collect()
    }

    /// All registered tools, system first, in no particular order within
    /// each namespace. Used to build the tools list sent to the model.
    pub fn all(&self) -> Vec<&Tool> {
        self.system.values().chain(self.agent.values()).collect()
    }

    pub fn len(&self) -> usize {
        self.system.len() + self.agent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validates `arguments` against `name`'s input schema: every required
    /// property present, and every present property's JSON type matching
    /// the schema's declared type. Returns the tool alongside success.
    pub fn validate(&self, name: &str, arguments: &Value) -> Result<&Tool> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::tool(format!("unknown tool '{name}'")))?;

        let schema = tool.input_schema();
        let obj = arguments
            .as_object()
            .ok_or_else(|| Error::validation(format!("arguments for '{name}' must be an object")))?;

        if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
            for req in required {
                let key = req.as_str().unwrap_or_default();
                if !obj.contains_key(key) {
                    return Err(Error::validation(format!(
                        "missing required argument '{key}' for tool '{name}'"
                    )));
                }
            }
        }

        if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
            for (key, value) in obj {
                let Some(prop_schema) = properties.get(key) else {
                    continue;
                };
                let Some(expected_type) = prop_schema.get("type").and_then(|t| t.as_str()) else {
                    continue;
                };
                if !json_type_matches(value, expected_type) {
                    return Err(Error::validation(format!(
                        "argument '{key}' for tool '{name}' must be of type {expected_type}"
                    )));
                }
                if let Some(allowed) = prop_schema.get("enum").and_then(|e| e.as_array()) {
                    if !allowed.contains(value) {
                        return Err(Error::validation(format!(
                            "argument '{key}' for tool '{name}' is not one of the allowed values"
                        )));
                    }
                }
            }
        }

        Ok(tool)
    }
}

fn json_type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}
