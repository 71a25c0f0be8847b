//! Declarative parameter schemas for tools.
//!
//! A [`ToolParameters`] value serves three purposes: it renders into
//! the plain-text tool catalog shown to the model, it emits a JSON
//! schema for providers with native function calling, and it validates
//! incoming parameters before a tool runs.

use serde_json::{Map, Value};

/// Top-level parameter object of one tool.
#[derive(Debug, Clone, Default)]
pub struct ToolParameters {
    properties: Vec<ParamField>,
    additional_properties: bool,
}

/// One named parameter.
#[derive(Debug, Clone)]
pub struct ParamField {
    name: String,
    description: Option<String>,
    required: bool,
    kind: FieldKind,
}

/// The accepted shape of a parameter value.
#[derive(Debug, Clone)]
pub enum FieldKind {
    String {
        one_of: Option<Vec<String>>,
    },
    Integer {
        minimum: Option<i64>,
        maximum: Option<i64>,
    },
    Number {
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Boolean,
    Array {
        items: Box<FieldKind>,
    },
    Object {
        properties: Vec<ParamField>,
    },
}

/// Validation outcome for one parameter object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationFailure {
    pub missing: Vec<String>,
    pub field_errors: Vec<String>,
}

impl ValidationFailure {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.field_errors.is_empty()
    }
}

impl ParamField {
    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            description: None,
            required: true,
            kind,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String { one_of: None })
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Integer {
                minimum: None,
                maximum: None,
            },
        )
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Number {
                minimum: None,
                maximum: None,
            },
        )
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn array(name: impl Into<String>, items: FieldKind) -> Self {
        Self::new(
            name,
            FieldKind::Array {
                items: Box::new(items),
            },
        )
    }

    pub fn object(name: impl Into<String>, properties: Vec<ParamField>) -> Self {
        Self::new(name, FieldKind::Object { properties })
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn one_of(mut self, values: Vec<String>) -> Self {
        if let FieldKind::String { one_of } = &mut self.kind {
            *one_of = Some(values);
        }
        self
    }

    pub fn minimum(mut self, min: i64) -> Self {
        match &mut self.kind {
            FieldKind::Integer { minimum, .. } => *minimum = Some(min),
            FieldKind::Number { minimum, .. } => *minimum = Some(min as f64),
            _ => {}
        }
        self
    }

    pub fn maximum(mut self, max: i64) -> Self {
        match &mut self.kind {
            FieldKind::Integer { maximum, .. } => *maximum = Some(max),
            FieldKind::Number { maximum, .. } => *maximum = Some(max as f64),
            _ => {}
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> bool {
        self.required
    }

    fn type_name(&self) -> &'static str {
        match self.kind {
            FieldKind::String { .. } => "string",
            FieldKind::Integer { .. } => "integer",
            FieldKind::Number { .. } => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Array { .. } => "array",
            FieldKind::Object { .. } => "object",
        }
    }

    fn to_schema(&self) -> Value {
        let mut schema = kind_schema(&self.kind);
        if let (Value::Object(map), Some(description)) = (&mut schema, &self.description) {
            map.insert("description".into(), description.as_str().into());
        }
        schema
    }

    fn plain_description(&self) -> String {
        let mut type_info = self.type_name().to_string();
        if !self.required {
            type_info.push_str(", optional");
        }
        let detail = match &self.kind {
            FieldKind::String {
                one_of: Some(values),
            } => format!("one of [{}]", values.join(", ")),
            FieldKind::Integer { minimum, maximum } => range_note(
                minimum.map(|m| m.to_string()),
                maximum.map(|m| m.to_string()),
            ),
            FieldKind::Number { minimum, maximum } => range_note(
                minimum.map(|m| m.to_string()),
                maximum.map(|m| m.to_string()),
            ),
            FieldKind::Object { properties } => {
                let nested = properties
                    .iter()
                    .map(|p| p.plain_description())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{nested}}}")
            }
            _ => String::new(),
        };

        let description = match (&self.description, detail.is_empty()) {
            (Some(d), true) => d.clone(),
            (Some(d), false) => format!("{d}; {detail}"),
            (None, false) => detail,
            (None, true) => String::new(),
        };

        if description.is_empty() {
            format!("{} ({})", self.name, type_info)
        } else {
            format!("{} ({}): {}", self.name, type_info, description)
        }
    }

    fn validate(&self, value: &Value, path: &str, failure: &mut ValidationFailure) {
        validate_kind(&self.kind, value, path, failure);
    }
}

fn range_note(minimum: Option<String>, maximum: Option<String>) -> String {
    match (minimum, maximum) {
        (Some(min), Some(max)) => format!("between {min} and {max}"),
        (Some(min), None) => format!(">= {min}"),
        (None, Some(max)) => format!("<= {max}"),
        (None, None) => String::new(),
    }
}

fn kind_schema(kind: &FieldKind) -> Value {
    let mut map = Map::new();
    match kind {
        FieldKind::String { one_of } => {
            map.insert("type".into(), "string".into());
            if let Some(values) = one_of {
                map.insert("enum".into(), values.clone().into());
            }
        }
        FieldKind::Integer { minimum, maximum } => {
            map.insert("type".into(), "integer".into());
            if let Some(min) = minimum {
                map.insert("minimum".into(), (*min).into());
            }
            if let Some(max) = maximum {
                map.insert("maximum".into(), (*max).into());
            }
        }
        FieldKind::Number { minimum, maximum } => {
            map.insert("type".into(), "number".into());
            if let Some(min) = minimum {
                map.insert("minimum".into(), (*min).into());
            }
            if let Some(max) = maximum {
                map.insert("maximum".into(), (*max).into());
            }
        }
        FieldKind::Boolean => {
            map.insert("type".into(), "boolean".into());
        }
        FieldKind::Array { items } => {
            map.insert("type".into(), "array".into());
            map.insert("items".into(), kind_schema(items));
        }
        FieldKind::Object { properties } => {
            return object_schema(properties, false);
        }
    }
    Value::Object(map)
}

fn object_schema(properties: &[ParamField], additional: bool) -> Value {
    let mut map = Map::new();
    map.insert("type".into(), "object".into());
    map.insert(
        "properties".into(),
        Value::Object(Map::from_iter(
            properties.iter().map(|p| (p.name.clone(), p.to_schema())),
        )),
    );
    map.insert(
        "required".into(),
        properties
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .into(),
    );
    map.insert("additionalProperties".into(), additional.into());
    Value::Object(map)
}

fn validate_kind(kind: &FieldKind, value: &Value, path: &str, failure: &mut ValidationFailure) {
    match kind {
        FieldKind::String { one_of } => match value.as_str() {
            Some(s) => {
                if let Some(values) = one_of {
                    if !values.iter().any(|v| v == s) {
                        failure
                            .field_errors
                            .push(format!("{path} must be one of [{}]", values.join(", ")));
                    }
                }
            }
            None => failure.field_errors.push(format!("{path} must be a string")),
        },
        FieldKind::Integer { minimum, maximum } => match integer_value(value) {
            Some(n) => {
                if minimum.is_some_and(|min| n < min) {
                    failure
                        .field_errors
                        .push(format!("{path} must be >= {}", minimum.unwrap_or_default()));
                }
                if maximum.is_some_and(|max| n > max) {
                    failure
                        .field_errors
                        .push(format!("{path} must be <= {}", maximum.unwrap_or_default()));
                }
            }
            None => failure
                .field_errors
                .push(format!("{path} must be an integer")),
        },
        FieldKind::Number { minimum, maximum } => match value.as_f64() {
            Some(n) => {
                if minimum.is_some_and(|min| n < min) {
                    failure
                        .field_errors
                        .push(format!("{path} must be >= {}", minimum.unwrap_or_default()));
                }
                if maximum.is_some_and(|max| n > max) {
                    failure
                        .field_errors
                        .push(format!("{path} must be <= {}", maximum.unwrap_or_default()));
                }
            }
            None => failure.field_errors.push(format!("{path} must be a number")),
        },
        FieldKind::Boolean => {
            if !value.is_boolean() {
                failure
                    .field_errors
                    .push(format!("{path} must be a boolean"));
            }
        }
        FieldKind::Array { items } => match value.as_array() {
            Some(elements) => {
                for (i, element) in elements.iter().enumerate() {
                    validate_kind(items, element, &format!("{path}[{i}]"), failure);
                }
            }
            None => failure.field_errors.push(format!("{path} must be an array")),
        },
        FieldKind::Object { properties } => match value.as_object() {
            Some(map) => validate_object(properties, map, path, failure),
            None => failure
                .field_errors
                .push(format!("{path} must be an object")),
        },
    }
}

/// Accept integers however the model spelled them, including `2.0`.
fn integer_value(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64).then_some(f as i64)
}

fn validate_object(
    properties: &[ParamField],
    map: &Map<String, Value>,
    path: &str,
    failure: &mut ValidationFailure,
) {
    for property in properties {
        let child_path = if path.is_empty() {
            property.name.clone()
        } else {
            format!("{path}.{}", property.name)
        };
        match map.get(&property.name) {
            Some(value) => property.validate(value, &child_path, failure),
            None if property.required => failure.missing.push(child_path),
            None => {}
        }
    }
}

impl ToolParameters {
    pub fn new(properties: Vec<ParamField>) -> Self {
        Self {
            properties,
            additional_properties: false,
        }
    }

    pub fn additional_properties(mut self, allowed: bool) -> Self {
        self.additional_properties = allowed;
        self
    }

    pub fn required_fields(&self) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// JSON schema of the full parameter object.
    pub fn to_json_schema(&self) -> Value {
        object_schema(&self.properties, self.additional_properties)
    }

    /// Brace-wrapped catalog text, one property per line.
    pub fn plain_description(&self) -> String {
        if self.properties.is_empty() {
            return "{}".into();
        }
        let lines = self
            .properties
            .iter()
            .map(|p| format!("    {}", p.plain_description()))
            .collect::<Vec<_>>()
            .join(",\n");
        format!("{{\n{lines}\n}}")
    }

    /// Check a parameter object; `Err` carries every missing required
    /// field and every type/range mismatch found.
    pub fn validate(&self, params: &Value) -> Result<(), ValidationFailure> {
        let mut failure = ValidationFailure::default();
        match params.as_object() {
            Some(map) => validate_object(&self.properties, map, "", &mut failure),
            None => failure
                .field_errors
                .push("params must be a JSON object".into()),
        }
        if failure.is_empty() {
            Ok(())
        } else {
            Err(failure)
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use serde_json::json;

    use super::*;

    fn search_params() -> ToolParameters {
        ToolParameters::new(vec![
            ParamField::string("query").description("A query to search for"),
            ParamField::integer("limit")
                .description("Max number of results")
                .optional(),
        ])
    }

    #[test]
    fn plain_description_lists_fields() {
        assert_eq!(
            search_params().plain_description(),
            indoc! {"
                {
                    query (string): A query to search for,
                    limit (integer, optional): Max number of results
                }"}
        );
        assert_eq!(ToolParameters::default().plain_description(), "{}");
    }

    #[test]
    fn json_schema_shape() {
        assert_eq!(
            search_params().to_json_schema(),
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "A query to search for"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Max number of results"
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn missing_required_field_is_reported() {
        let err = search_params().validate(&json!({"limit": 3})).unwrap_err();
        assert_eq!(err.missing, vec!["query"]);
        assert!(err.field_errors.is_empty());
    }

    #[test]
    fn wrong_types_are_reported() {
        let err = search_params()
            .validate(&json!({"query": 1, "limit": "three"}))
            .unwrap_err();
        assert_eq!(
            err.field_errors,
            vec!["query must be a string", "limit must be an integer"]
        );
    }

    #[test]
    fn minimum_is_enforced() {
        let params = ToolParameters::new(vec![ParamField::integer("x").minimum(10)]);
        let err = params.validate(&json!({"x": 1})).unwrap_err();
        assert_eq!(err.field_errors, vec!["x must be >= 10"]);
        assert!(params.validate(&json!({"x": 10})).is_ok());
    }

    #[test]
    fn integral_floats_pass_integer_fields() {
        let params = ToolParameters::new(vec![ParamField::integer("x")]);
        let value: Value = serde_json::from_str(r#"{"x": 2.0}"#).unwrap();
        assert!(params.validate(&value).is_ok());
        let value: Value = serde_json::from_str(r#"{"x": 2.5}"#).unwrap();
        assert!(params.validate(&value).is_err());
    }

    #[test]
    fn enum_strings_are_enforced() {
        let params = ToolParameters::new(vec![
            ParamField::string("mode").one_of(vec!["fast".into(), "slow".into()])
        ]);
        assert!(params.validate(&json!({"mode": "fast"})).is_ok());
        let err = params.validate(&json!({"mode": "warp"})).unwrap_err();
        assert_eq!(err.field_errors, vec!["mode must be one of [fast, slow]"]);
    }

    #[test]
    fn nested_objects_and_arrays_validate_with_paths() {
        let params = ToolParameters::new(vec![ParamField::object(
            "filter",
            vec![
                ParamField::string("field"),
                ParamField::array("values", FieldKind::String { one_of: None }).optional(),
            ],
        )]);

        let err = params
            .validate(&json!({"filter": {"values": ["a", 1]}}))
            .unwrap_err();
        assert_eq!(err.missing, vec!["filter.field"]);
        assert_eq!(err.field_errors, vec!["filter.values[1] must be a string"]);
    }

    #[test]
    fn non_object_params_are_rejected() {
        let err = search_params().validate(&json!("nope")).unwrap_err();
        assert_eq!(err.field_errors, vec!["params must be a JSON object"]);
    }
}
