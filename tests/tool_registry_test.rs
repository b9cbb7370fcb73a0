//! Black-box coverage of `ToolRegistry` through the public crate surface:
//! namespace precedence, collision rules, and argument validation.

use agent_runtime::{tool, Error, ToolRegistry};
use serde_json::json;

fn schema_tool() -> agent_runtime::Tool {
    tool("lookup", "looks something up")
        .param("query", "string")
        .build(|_| async { Ok(json!({})) })
}

#[test]
fn system_tool_wins_lookup_over_agent_tool_of_same_name() {
    let mut registry = ToolRegistry::new();
    registry.register_system(schema_tool()).unwrap();
    let err = registry.register_agent(schema_tool()).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(registry.len(), 1);
}

#[test]
fn lookup_is_case_insensitive() {
    let mut registry = ToolRegistry::new();
    registry.register_agent(schema_tool()).unwrap();
    assert!(registry.contains("LOOKUP"));
    assert!(registry.contains("Lookup"));
}

#[test]
fn all_lists_every_registered_tool() {
    let mut registry = ToolRegistry::new();
    registry.register_agent(schema_tool()).unwrap();
    registry
        .register_agent(tool("other", "does something else").build(|_| async { Ok(json!({})) }))
        .unwrap();
    let names: Vec<_> = registry.all().iter().map(|t| t.name().to_string()).collect();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"lookup".to_string()) || names.contains(&"other".to_string()));
}

#[test]
fn validate_rejects_non_object_arguments() {
    let mut registry = ToolRegistry::new();
    registry.register_agent(schema_tool()).unwrap();
    let err = registry.validate("lookup", &json!("not an object")).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn validate_accepts_well_typed_arguments() {
    let mut registry = ToolRegistry::new();
    registry.register_agent(schema_tool()).unwrap();
    let found = registry.validate("lookup", &json!({"query": "rust"})).unwrap();
    assert_eq!(found.name(), "lookup");
}

#[test]
fn empty_registry_reports_empty() {
    let registry = ToolRegistry::new();
    assert!(registry.is_empty());
    assert_eq!(registry.len(), 0);
}
