//! Schema validation helpers.
//!
//! This module validates a configuration `serde_json::Value` against a [`Schema`]
//! before any provider logic runs, producing one [`Diagnostic`] per problem.
//!
//! # Example
//!
//! ```
//! use n8ncloud_provider::schema::{Attribute, Schema};
//! use n8ncloud_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("email", Attribute::required_string())
//!     .with_attribute(
//!         "role",
//!         Attribute::required_string().with_one_of(["global:admin", "global:member"]),
//!     );
//!
//! let input = json!({"email": "a@x.com", "role": "global:member"});
//! assert!(validate(&schema, &input).is_empty());
//!
//! let input = json!({"email": "a@x.com", "role": "global:owner"});
//! let diagnostics = validate(&schema, &input);
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("role".to_string()));
//! ```

use crate::schema::{Attribute, AttributeType, Diagnostic, DiagnosticSeverity, Schema};
use crate::types::is_unknown;
use serde_json::Value;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed-only attributes must not be set in configuration
/// - Unknown values are accepted as-is; they are checked once they are known
/// - Attribute types must match the schema
/// - Strings restricted with [`Attribute::with_one_of`] must be one of the listed values
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return diagnostics,
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value))),
            );
            return diagnostics;
        },
    };

    for (name, attr) in &schema.block.attributes {
        validate_attribute(attr, obj.get(name), name, &mut diagnostics);
    }

    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
///
/// This is a convenience wrapper around [`validate`] that returns a Result.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

/// Diagnostic for a string outside its allowed set.
///
/// Detail reads `Attribute <path> value must be one of: ["a" "b"], got: "<value>"`.
pub fn one_of_error(path: &str, allowed: &[impl AsRef<str>], got: &str) -> Diagnostic {
    let allowed = allowed
        .iter()
        .map(|v| format!("{:?}", v.as_ref()))
        .collect::<Vec<_>>()
        .join(" ");
    Diagnostic::error("Invalid Attribute Value Match")
        .with_detail(format!(
            "Attribute {} value must be one of: [{}], got: {:?}",
            path, allowed, got
        ))
        .with_attribute(path)
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let value = match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
            return;
        },
        Some(v) => v,
    };

    if attr.flags.is_computed_only() {
        diagnostics.push(
            Diagnostic::error("Invalid Configuration for Read-Only Attribute")
                .with_detail(format!(
                    "Cannot set value for attribute '{}': the provider sets it. \
                     Remove the configuration line setting the value.",
                    path
                ))
                .with_attribute(path),
        );
        return;
    }

    if is_unknown(value) {
        return;
    }

    if !validate_attribute_type(attr.attr_type, value, path, diagnostics) {
        return;
    }

    if let Some(s) = value.as_str() {
        if !attr.one_of.is_empty() && !attr.one_of.iter().any(|allowed| allowed == s) {
            diagnostics.push(one_of_error(path, attr.one_of.as_slice(), s));
        }
    }
}

fn validate_attribute_type(
    attr_type: AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    let (ok, expected) = match attr_type {
        AttributeType::String => (value.is_string(), "string"),
        AttributeType::Int64 => (is_int64(value), "int64"),
        AttributeType::Bool => (value.is_boolean(), "bool"),
    };
    if !ok {
        diagnostics.push(type_error(path, expected, value));
    }
    ok
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            if n.as_i64().is_some() {
                true
            } else if let Some(f) = n.as_f64() {
                f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
            } else {
                false
            }
        },
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        )),
        attribute: Some(path.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::unknown;
    use serde_json::json;

    fn user_schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("email", Attribute::required_string())
            .with_attribute(
                "role",
                Attribute::required_string().with_one_of(["global:admin", "global:member"]),
            )
            .with_attribute("is_pending", Attribute::computed_bool())
    }

    #[test]
    fn test_validate_required_string() {
        let schema = user_schema();

        let diagnostics = validate(&schema, &json!({"role": "global:member"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Missing required attribute 'email'");
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("email"));

        let diagnostics = validate(&schema, &json!({"email": null, "role": "global:member"}));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_validate_optional_attribute() {
        let schema = Schema::v0().with_attribute("instance_url", Attribute::optional_string());
        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"instance_url": null})).is_empty());
        assert!(validate(&schema, &json!({"instance_url": "https://a.example"})).is_empty());
    }

    #[test]
    fn test_validate_one_of() {
        let schema = user_schema();
        let diagnostics = validate(&schema, &json!({"email": "a@x.com", "role": "global:owner"}));

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid Attribute Value Match");
        assert_eq!(
            diagnostics[0].detail.as_deref(),
            Some(
                "Attribute role value must be one of: [\"global:admin\" \"global:member\"], got: \"global:owner\""
            )
        );
    }

    #[test]
    fn test_validate_computed_only_set() {
        let schema = user_schema();
        let diagnostics = validate(
            &schema,
            &json!({"email": "a@x.com", "role": "global:admin", "is_pending": false}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].summary,
            "Invalid Configuration for Read-Only Attribute"
        );
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("is_pending"));

        // Null computed values are how the host sends "not configured".
        assert!(validate(
            &schema,
            &json!({"email": "a@x.com", "role": "global:admin", "id": null})
        )
        .is_empty());
    }

    #[test]
    fn test_validate_unknown_skipped() {
        let schema = user_schema();
        assert!(validate(&schema, &json!({"email": unknown(), "role": unknown()})).is_empty());
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::v0().with_attribute("timeout", Attribute::optional_int64());

        assert!(validate(&schema, &json!({"timeout": 30})).is_empty());
        assert!(validate(&schema, &json!({"timeout": 30.0})).is_empty());

        let diagnostics = validate(&schema, &json!({"timeout": 1.5}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].detail.as_deref(), Some("Expected int64, got number"));

        let diagnostics = validate(&schema, &json!({"timeout": "30"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].detail.as_deref(), Some("Expected int64, got string"));
    }

    #[test]
    fn test_validate_wrong_type_skips_one_of() {
        let schema = user_schema();
        let diagnostics = validate(&schema, &json!({"email": "a@x.com", "role": 7}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Invalid type for attribute 'role'");
    }

    #[test]
    fn test_validate_multiple_errors() {
        let schema = user_schema();
        let diagnostics = validate(&schema, &json!({"email": 1, "role": "root"}));
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_validate_root_not_object() {
        let schema = user_schema();
        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Expected object");
        assert!(validate(&schema, &Value::Null).is_empty());
    }

    #[test]
    fn test_helpers() {
        let schema = user_schema();
        let good = json!({"email": "a@x.com", "role": "global:member"});
        assert!(is_valid(&schema, &good));
        assert!(validate_result(&schema, &good).is_ok());
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 2);
    }
}
