//! Plan, import and metadata types shared by the provider and the gRPC adapter,
//! plus the unknown-value placeholder.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generated as pb;

/// The protocol version for the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// The handshake prefix printed by the provider binary.
pub const HANDSHAKE_PREFIX: &str = "N8NCLOUD_PROVIDER";

/// Placeholder for a value the host cannot know until apply.
pub const UNKNOWN_VALUE: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// The JSON representation of an unknown value.
pub fn unknown() -> Value {
    Value::String(UNKNOWN_VALUE.to_string())
}

/// Whether `value` is the unknown placeholder.
pub fn is_unknown(value: &Value) -> bool {
    value.as_str() == Some(UNKNOWN_VALUE)
}

/// One attribute that a plan adds, removes or modifies.
///
/// `before` is `None` when the attribute is being set for the first time and
/// `after` is `None` when it is being cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Attribute name.
    pub path: String,
    /// Prior value.
    pub before: Option<Value>,
    /// Planned value; may be the unknown placeholder.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// A change between two optional values.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// An attribute set on create.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// An attribute dropped on destroy.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// An attribute whose value changes.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

fn to_bytes(value: Option<Value>) -> Vec<u8> {
    value
        .and_then(|v| serde_json::to_vec(&v).ok())
        .unwrap_or_default()
}

impl From<AttributeChange> for pb::AttributeChange {
    fn from(change: AttributeChange) -> Self {
        Self {
            path: change.path,
            before: to_bytes(change.before),
            after: to_bytes(change.after),
        }
    }
}

/// Outcome of planning one resource instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// State the apply is expected to produce, `null` for a destroy.
    pub planned_state: Value,
    /// Configuration-driven changes, in attribute order.
    pub changes: Vec<AttributeChange>,
    /// Whether the change can only be applied by destroying and recreating.
    pub requires_replace: bool,
}

impl PlanResult {
    /// A plan that leaves `state` as it is.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// A plan with changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether applying the plan would do nothing.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Names of the changed attributes.
    pub fn changed_paths(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.path.as_str()).collect()
    }
}

/// A resource seeded by import; the next read fills in the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// Resource type name.
    pub resource_type: String,
    /// Seed state.
    pub state: Value,
}

impl ImportedResource {
    /// Create an imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Types served by the provider, as reported by GetMetadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names, sorted.
    pub resources: Vec<String>,
    /// Data source type names, sorted.
    pub data_sources: Vec<String>,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
}

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Whether destroy plans are computed by the provider.
    pub plan_destroy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_sentinel() {
        assert!(is_unknown(&unknown()));
        assert!(!is_unknown(&json!("global:admin")));
        assert!(!is_unknown(&Value::Null));
        assert!(!is_unknown(&json!(true)));
    }

    #[test]
    fn test_attribute_change_to_proto() {
        let proto: pb::AttributeChange =
            AttributeChange::modified("role", json!("global:member"), json!("global:admin")).into();
        assert_eq!(proto.path, "role");
        assert_eq!(proto.before, br#""global:member""#.to_vec());
        assert_eq!(proto.after, br#""global:admin""#.to_vec());

        let proto: pb::AttributeChange = AttributeChange::added("email", json!("a@x.com")).into();
        assert!(proto.before.is_empty());

        let proto: pb::AttributeChange = AttributeChange::removed("id", json!("u-1")).into();
        assert!(proto.after.is_empty());
    }

    #[test]
    fn test_plan_result_helpers() {
        let unchanged = PlanResult::no_change(json!({"id": "u-1"}));
        assert!(unchanged.is_empty());
        assert!(!unchanged.requires_replace);

        let replace = PlanResult::with_changes(
            json!({"id": unknown(), "email": "b@x.com"}),
            vec![AttributeChange::modified("email", json!("a@x.com"), json!("b@x.com"))],
            true,
        );
        assert!(!replace.is_empty());
        assert_eq!(replace.changed_paths(), vec!["email"]);
    }

    #[test]
    fn test_handshake_constants() {
        assert_eq!(
            format!("{}|{}|127.0.0.1:1234", HANDSHAKE_PREFIX, PROTOCOL_VERSION),
            "N8NCLOUD_PROVIDER|1|127.0.0.1:1234"
        );
    }
}
