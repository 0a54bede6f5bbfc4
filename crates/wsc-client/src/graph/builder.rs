//! Text builder for single-operation graph queries

use serde_json::{Map, Value};
use std::fmt;

/// Graph operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Query => write!(f, "query"),
            OperationKind::Mutation => write!(f, "mutation"),
        }
    }
}

/// A typed operation argument
#[derive(Debug, Clone, PartialEq)]
pub struct GraphParameter {
    pub name: String,
    /// Graph type, e.g. `String!` or `ListOptions`
    pub graph_type: String,
    pub value: Value,
}

impl GraphParameter {
    pub fn new(name: impl Into<String>, graph_type: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            graph_type: graph_type.into(),
            value,
        }
    }
}

/// Built query text plus its variables object
#[derive(Debug, Clone, PartialEq)]
pub struct GraphRequest {
    pub query: String,
    pub variables: Value,
}

/// Whether a return type is a scalar and so takes no field selection
pub fn is_scalar_type(type_name: &str) -> bool {
    matches!(
        type_name,
        "Int" | "Float" | "String" | "Boolean" | "ID" | "Data" | "Any" | "Void" | "DateTime"
    )
}

/// Render a field selection.
///
/// `fields` is either an array of field names or an object mapping each
/// field name to its sub-selection (`null` or empty for a leaf).
pub fn stringify_fields(fields: &Value) -> String {
    let selected: Vec<String> = match fields {
        Value::Object(map) => map
            .iter()
            .map(|(name, sub)| {
                if is_empty_selection(sub) {
                    name.clone()
                } else {
                    format!("{} {}", name, stringify_fields(sub))
                }
            })
            .collect(),
        Value::Array(names) => names
            .iter()
            .map(|name| match name {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(name) => vec![name.clone()],
        _ => Vec::new(),
    };
    format!("{{{}}}", selected.join(", "))
}

fn is_empty_selection(fields: &Value) -> bool {
    match fields {
        Value::Null => true,
        Value::Bool(selected) => !selected,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Number(_) => false,
    }
}

/// Build a query calling one operation with the given parameters.
///
/// Scalar return types get no selection; an empty selection asks for
/// `__typename` only.
pub fn build_simple_query(
    kind: OperationKind,
    operation_name: &str,
    parameters: &[GraphParameter],
    return_type: &str,
    fields: Option<&Value>,
) -> GraphRequest {
    let mut query_fields = if is_scalar_type(return_type) {
        String::new()
    } else {
        match fields {
            Some(fields) if !is_empty_selection(fields) => stringify_fields(fields),
            _ => "{ __typename }".to_string(),
        }
    };

    let declarations: Vec<String> = parameters
        .iter()
        .map(|p| format!("${}: {}", p.name, p.graph_type))
        .collect();
    let query_parameters = if declarations.is_empty() {
        String::new()
    } else {
        format!("({})", declarations.join(", "))
    };

    let arguments: Vec<String> = parameters
        .iter()
        .map(|p| format!("{}: ${}", p.name, p.name))
        .collect();
    let query_arguments = if arguments.is_empty() {
        String::new()
    } else {
        if !query_fields.is_empty() {
            query_fields = format!(" {}", query_fields);
        }
        format!("({})", arguments.join(", "))
    };

    let query = format!(
        "{kind} {operation_name}{query_parameters} {{\n    {operation_name}{query_arguments}{query_fields}\n}}"
    );

    let variables: Map<String, Value> = parameters
        .iter()
        .map(|p| (p.name.clone(), p.value.clone()))
        .collect();

    GraphRequest {
        query,
        variables: Value::Object(variables),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_return_has_no_selection() {
        let request = build_simple_query(
            OperationKind::Mutation,
            "DeleteEnvironment",
            &[GraphParameter::new("environmentId", "String!", json!("env1"))],
            "Void",
            Some(&json!({"id": null})),
        );
        assert_eq!(
            request.query,
            "mutation DeleteEnvironment($environmentId: String!) {\n    DeleteEnvironment(environmentId: $environmentId)\n}"
        );
        assert_eq!(request.variables, json!({"environmentId": "env1"}));
    }

    #[test]
    fn test_missing_fields_select_typename() {
        let request = build_simple_query(OperationKind::Query, "ListEnvironments", &[], "ListEnvironmentsReturnValue", None);
        assert_eq!(
            request.query,
            "query ListEnvironments {\n    ListEnvironments{ __typename }\n}"
        );
        assert_eq!(request.variables, json!({}));
    }

    #[test]
    fn test_nested_selection_with_arguments() {
        let request = build_simple_query(
            OperationKind::Query,
            "ListBodies",
            &[
                GraphParameter::new("environmentId", "String!", json!("test1")),
                GraphParameter::new("options", "ListOptions", json!({"first": 10})),
            ],
            "ListBodiesReturnValue",
            Some(&json!({"bodies": {"id": null, "name": null}, "meta": {"totalCount": null}})),
        );
        assert_eq!(
            request.query,
            "query ListBodies($environmentId: String!, $options: ListOptions) {\n    ListBodies(environmentId: $environmentId, options: $options) {bodies {id, name}, meta {totalCount}}\n}"
        );
    }

    #[test]
    fn test_field_list_selection() {
        assert_eq!(stringify_fields(&json!(["id", "name"])), "{id, name}");
    }
}
