//! Tool definitions: OpenAI-compatible function-calling metadata plus an
//! async handler, and the injected-argument markers tools can declare on
//! parameters the caller fills in rather than the model (§3, §4.6).

use crate::Result;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A tool handler: takes JSON arguments, returns a pinned, boxed future so
/// handlers of different concrete closure types can share one collection.
pub type ToolHandler =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync>;

/// Which ambient value a parameter receives instead of a model-supplied
/// argument (§3's tool-argument marker, §4.6's Argument Injector).
///
/// Declared at tool-registration time via [`Tool::with_injected`] since Rust
/// has no stable runtime reflection equivalent to the original
/// `Annotated[...]` type-hint inspection this is grounded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedMarker {
    /// The id of the tool-use request currently being executed.
    ToolCallId,
    /// A snapshot of the agent's conversation state at call time.
    State,
    /// A logger bound to the ambient trace context.
    Logger,
}

/// Tool definition: identity, JSON Schema for its parameters, the async
/// handler, and any parameters the Argument Injector should fill rather
/// than the model.
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    input_schema: Value,
    handler: ToolHandler,
    injected: Vec<(String, InjectedMarker)>,
}

impl Tool {
    /// Creates a tool. `input_schema` accepts simple type notation
    /// (`{"x": "number"}`), extended per-property schema (with `optional`/
    /// `required`/`default`), or a full JSON Schema object, all normalized
    /// by [`convert_schema_to_openai`].
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: convert_schema_to_openai(input_schema),
            handler: Arc::new(move |args| Box::pin(handler(args))),
            injected: Vec::new(),
        }
    }

    /// Marks `param_name` as injected: the Argument Injector supplies this
    /// value after validation, and it is never listed in the schema handed
    /// to the model.
    pub fn with_injected(mut self, param_name: impl Into<String>, marker: InjectedMarker) -> Self {
        let param_name = param_name.into();
        if let Some(obj) = self.input_schema.as_object_mut() {
            if let Some(props) = obj.get_mut("properties").and_then(|p| p.as_object_mut()) {
                props.remove(&param_name);
            }
            if let Some(req) = obj.get_mut("required").and_then(|r| r.as_array_mut()) {
                req.retain(|v| v.as_str() != Some(param_name.as_str()));
            }
        }
        self.injected.push((param_name, marker));
        self
    }

    /// Injected-parameter declarations for this tool, in registration order.
    pub fn injected_params(&self) -> &[(String, InjectedMarker)] {
        &self.injected
    }

    pub async fn execute(&self, arguments: Value) -> Result<Value> {
        (self.handler)(arguments).await
    }

    /// OpenAI function-calling format: `{"type": "function", "function": {...}}`.
    pub fn to_openai_format(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .field("injected", &self.injected)
            .finish()
    }
}

/// Normalizes a simple-notation, extended-property, or already-complete
/// schema into full JSON Schema. A property is required unless it sets
/// `optional: true`, `required: false`, or carries a `default`.
fn convert_schema_to_openai(schema: Value) -> Value {
    if schema.is_object() {
        let obj = schema.as_object().unwrap();
        if obj.contains_key("type") && obj.contains_key("properties") {
            return schema;
        }

        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for (param_name, param_type) in obj {
            if let Some(type_str) = param_type.as_str() {
                properties.insert(param_name.clone(), type_to_json_schema(type_str));
                required.push(param_name.clone());
            } else if param_type.is_object() {
                let mut prop = param_type.clone();
                let prop_obj = prop.as_object_mut().unwrap();

                let is_optional = prop_obj
                    .remove("optional")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let is_required = prop_obj.remove("required").and_then(|v| v.as_bool());
                let has_default = prop_obj.contains_key("default");

                properties.insert(param_name.clone(), prop);

                if let Some(true) = is_required {
                    required.push(param_name.clone());
                } else if is_optional || is_required == Some(false) {
                    // explicitly optional
                } else if !has_default {
                    required.push(param_name.clone());
                }
            }
        }

        return serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required
        });
    }

    serde_json::json!({"type": "object", "properties": {}, "required": []})
}

fn type_to_json_schema(type_str: &str) -> Value {
    let json_type = match type_str {
        "string" | "str" => "string",
        "integer" | "int" | "i32" | "i64" | "u32" | "u64" => "integer",
        "number" | "float" | "f32" | "f64" => "number",
        "boolean" | "bool" => "boolean",
        "array" | "list" | "vec" => "array",
        "object" | "dict" | "map" => "object",
        _ => "string",
    };
    serde_json::json!({ "type": json_type })
}

/// Fluent builder for [`Tool`]: `tool(name, desc).param(...).build(handler)`.
pub struct ToolBuilder {
    name: String,
    description: String,
    schema: Value,
    injected: Vec<(String, InjectedMarker)>,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: serde_json::json!({}),
            injected: Vec::new(),
        }
    }

    /// Replaces the whole schema; overrides any `.param()` calls so far.
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    /// Adds a required parameter with a simple type string.
    pub fn param(mut self, name: &str, type_str: &str) -> Self {
        if !self.schema.is_object() {
            self.schema = serde_json::json!({});
        }
        let obj = self.schema.as_object_mut().unwrap();
        obj.insert(name.to_string(), Value::String(type_str.to_string()));
        self
    }

    /// Declares `name` as an injected parameter filled by the Argument
    /// Injector rather than the model.
    pub fn injected(mut self, name: impl Into<String>, marker: InjectedMarker) -> Self {
        self.injected.push((name.into(), marker));
        self
    }

    pub fn build<F, Fut>(self, handler: F) -> Tool
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let mut built = Tool::new(self.name, self.description, self.schema, handler);
        for (name, marker) in self.injected {
            built = built.with_injected(name, marker);
        }
        built
    }
}

/// Convenience entry point for [`ToolBuilder`].
pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder::new(name, description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use serde_json::json;

    #[test]
    fn test_type_to_json_schema() {
        assert_eq!(type_to_json_schema("string"), json!({"type": "string"}));
        assert_eq!(type_to_json_schema("integer"), json!({"type": "integer"}));
        assert_eq!(type_to_json_schema("number"), json!({"type": "number"}));
        assert_eq!(type_to_json_schema("bool"), json!({"type": "boolean"}));
    }

    #[test]
    fn test_convert_simple_schema() {
        let schema = json!({"location": "string", "units": "string"});
        let result = convert_schema_to_openai(schema);
        assert_eq!(result["type"], "object");
        assert_eq!(result["properties"]["location"]["type"], "string");
        assert_eq!(result["required"], json!(["location", "units"]));
    }

    #[test]
    fn test_convert_full_schema_passthrough() {
        let schema = json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "required": ["name"]
        });
        assert_eq!(convert_schema_to_openai(schema.clone()), schema);
    }

    #[test]
    fn test_convert_schema_optional_and_default() {
        let schema = json!({
            "query": {"type": "string"},
            "limit": {"type": "integer", "optional": true},
            "page": {"type": "integer", "default": 1}
        });
        let result = convert_schema_to_openai(schema);
        let required = result["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "query"));
        assert!(!required.iter().any(|v| v == "limit"));
        assert!(!required.iter().any(|v| v == "page"));
    }

    #[tokio::test]
    async fn test_tool_creation_and_execute() {
        let add_tool = tool("add", "Add two numbers")
            .param("a", "number")
            .param("b", "number")
            .build(|args| async move {
                let a = args
                    .get("a")
                    .and_then(|v| v.as_f64())
                    .ok_or_else(|| Error::validation("a must be a number"))?;
                let b = args
                    .get("b")
                    .and_then(|v| v.as_f64())
                    .ok_or_else(|| Error::validation("b must be a number"))?;
                Ok(json!({"result": a + b}))
            });

        assert_eq!(add_tool.name(), "add");
        let result = add_tool.execute(json!({"a": 5.0, "b": 3.0})).await.unwrap();
        assert_eq!(result["result"], 8.0);
    }

    #[test]
    fn test_tool_to_openai_format() {
        let t = tool("test", "Test tool")
            .param("param1", "string")
            .build(|_| async { Ok(json!({})) });
        let format = t.to_openai_format();
        assert_eq!(format["type"], "function");
        assert_eq!(format["function"]["name"], "test");
        assert!(format["function"]["parameters"].is_object());
    }

    #[test]
    fn test_with_injected_removes_from_schema() {
        let t = tool("log_event", "Log an event")
            .param("message", "string")
            .injected("call_id", InjectedMarker::ToolCallId)
            .build(|_| async { Ok(json!({})) });

        let format = t.to_openai_format();
        let props = format["function"]["parameters"]["properties"]
            .as_object()
            .unwrap();
        assert!(!props.contains_key("call_id"));
        assert!(props.contains_key("message"));
        assert_eq!(t.injected_params(), &[("call_id".to_string(), InjectedMarker::ToolCallId)]);
    }

    #[test]
    fn test_param_after_non_object_schema_resets() {
        let t = tool("test", "Test tool")
            .schema(json!("not an object"))
            .param("key", "number")
            .build(|_| async { Ok(json!({})) });
        let format = t.to_openai_format();
        assert!(format["function"]["parameters"]["properties"]["key"].is_object());
    }
}
