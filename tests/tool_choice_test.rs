//! `ToolChoice::from_value` parses the OpenAI-style `tool_choice` shapes
//! plus bare function-name strings, validating any named function against
//! the caller's known tool set.

use agent_runtime::{Error, ToolChoice};
use serde_json::json;

fn known() -> Vec<String> {
    vec!["add".to_string(), "search".to_string()]
}

#[test]
fn parses_auto_none_required() {
    assert!(matches!(
        ToolChoice::from_value(&json!("auto"), &known()).unwrap(),
        ToolChoice::Auto
    ));
    assert!(matches!(
        ToolChoice::from_value(&json!("none"), &known()).unwrap(),
        ToolChoice::None
    ));
    assert!(matches!(
        ToolChoice::from_value(&json!("required"), &known()).unwrap(),
        ToolChoice::Required
    ));
}

#[test]
fn bare_string_names_a_known_function() {
    let choice = ToolChoice::from_value(&json!("add"), &known()).unwrap();
    assert!(choice.is_specific_function());
}

#[test]
fn bare_string_rejects_unknown_function() {
    let err = ToolChoice::from_value(&json!("not_a_tool"), &known()).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn object_form_names_a_function() {
    let value = json!({"type": "function", "function": {"name": "search"}});
    let choice = ToolChoice::from_value(&value, &known()).unwrap();
    assert!(choice.is_specific_function());
}

#[test]
fn object_form_rejects_non_function_type() {
    let value = json!({"type": "bogus"});
    let err = ToolChoice::from_value(&value, &known()).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn object_form_requires_function_name() {
    let value = json!({"type": "function", "function": {}});
    let err = ToolChoice::from_value(&value, &known()).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
