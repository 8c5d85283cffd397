//! Schema-driven planning.
//!
//! [`plan`] turns prior state and configuration into a [`PlanResult`] using
//! only the flags and plan modifiers declared on the [`Schema`]:
//!
//! - configuration `null` plans a destroy
//! - no prior state plans a create; computed values are unknown
//! - a changed [`Attribute::requires_replace`] attribute plans a replacement
//! - otherwise the update is in place and [`Attribute::use_state_for_unknown`]
//!   attributes keep their prior value
//!
//! Computed values that drifted out of band never produce a change on their
//! own: only configurable attributes are compared.
//!
//! [`Attribute::requires_replace`]: crate::schema::Attribute::requires_replace
//! [`Attribute::use_state_for_unknown`]: crate::schema::Attribute::use_state_for_unknown

use serde_json::{Map, Value};

use crate::schema::{Attribute, Schema};
use crate::types::{unknown, AttributeChange, PlanResult};

/// Plan a resource change.
pub fn plan(schema: &Schema, prior_state: Option<&Value>, config: &Value) -> PlanResult {
    let prior = prior_state.filter(|v| !v.is_null());
    match (prior, config) {
        (Some(prior), Value::Null) => plan_destroy(schema, prior),
        (None, Value::Null) => PlanResult::no_change(Value::Null),
        (None, config) => plan_create(schema, config),
        (Some(prior), config) => plan_update(schema, prior, config),
    }
}

fn get<'a>(value: &'a Value, name: &str) -> &'a Value {
    value.get(name).unwrap_or(&Value::Null)
}

fn some(value: &Value) -> Option<Value> {
    (!value.is_null()).then(|| value.clone())
}

fn plan_destroy(schema: &Schema, prior: &Value) -> PlanResult {
    let changes = schema
        .block
        .attributes
        .keys()
        .filter_map(|name| {
            let before = get(prior, name);
            some(before).map(|before| AttributeChange::removed(name.clone(), before))
        })
        .collect();
    PlanResult::with_changes(Value::Null, changes, false)
}

/// Planned value of a configurable attribute. Optional+computed attributes
/// left unset fall back to `fallback`.
fn configured_value(attr: &Attribute, configured: &Value, fallback: Value) -> Value {
    if configured.is_null() && attr.flags.computed {
        fallback
    } else {
        configured.clone()
    }
}

fn plan_create(schema: &Schema, config: &Value) -> PlanResult {
    let mut planned = Map::new();
    let mut changes = Vec::new();

    for (name, attr) in &schema.block.attributes {
        let value = if attr.flags.is_configurable() {
            let configured = get(config, name);
            if let Some(after) = some(configured) {
                changes.push(AttributeChange::added(name.clone(), after));
            }
            configured_value(attr, configured, unknown())
        } else if attr.flags.computed {
            unknown()
        } else {
            Value::Null
        };
        planned.insert(name.clone(), value);
    }

    PlanResult::with_changes(Value::Object(planned), changes, false)
}

fn plan_update(schema: &Schema, prior: &Value, config: &Value) -> PlanResult {
    let mut changes = Vec::new();
    let mut requires_replace = false;

    for (name, attr) in &schema.block.attributes {
        if !attr.flags.is_configurable() {
            continue;
        }
        let before = get(prior, name);
        let after = configured_value(attr, get(config, name), before.clone());
        if &after != before {
            requires_replace |= attr.requires_replace;
            changes.push(AttributeChange::new(name.clone(), some(before), some(&after)));
        }
    }

    if changes.is_empty() {
        return PlanResult::no_change(prior.clone());
    }

    let mut planned = Map::new();
    for (name, attr) in &schema.block.attributes {
        let before = get(prior, name);
        let value = if attr.flags.is_configurable() {
            configured_value(attr, get(config, name), before.clone())
        } else if !attr.flags.computed {
            Value::Null
        } else if !requires_replace && attr.use_state_for_unknown && !before.is_null() {
            before.clone()
        } else {
            unknown()
        };
        planned.insert(name.clone(), value);
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::is_unknown;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string().with_use_state_for_unknown())
            .with_attribute("email", Attribute::required_string().with_requires_replace())
            .with_attribute("role", Attribute::required_string())
            .with_attribute(
                "is_pending",
                Attribute::computed_bool().with_use_state_for_unknown(),
            )
            .with_attribute(
                "updated_at",
                Attribute::computed_string().with_use_state_for_unknown(),
            )
            .with_attribute("first_name", Attribute::computed_string())
    }

    fn prior() -> Value {
        json!({
            "id": "u-1",
            "email": "a@x.com",
            "role": "global:member",
            "is_pending": true,
            "updated_at": "2024-03-01T10:00:00Z",
            "first_name": null
        })
    }

    #[test]
    fn test_plan_create() {
        let result = plan(
            &schema(),
            None,
            &json!({"email": "a@x.com", "role": "global:member"}),
        );

        assert!(!result.requires_replace);
        let paths: Vec<_> = result.changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["email", "role"]);
        assert!(result.changes.iter().all(|c| c.before.is_none()));

        let planned = &result.planned_state;
        assert_eq!(planned["email"], "a@x.com");
        assert!(is_unknown(&planned["id"]));
        assert!(is_unknown(&planned["is_pending"]));
        assert!(is_unknown(&planned["first_name"]));
    }

    #[test]
    fn test_plan_no_change_ignores_computed_drift() {
        let mut refreshed = prior();
        refreshed["is_pending"] = json!(false);
        refreshed["updated_at"] = json!("2024-04-01T08:00:00Z");
        refreshed["first_name"] = json!("Ada");

        let result = plan(
            &schema(),
            Some(&refreshed),
            &json!({"email": "a@x.com", "role": "global:member"}),
        );

        assert!(result.changes.is_empty());
        assert!(!result.requires_replace);
        assert_eq!(result.planned_state, refreshed);
    }

    #[test]
    fn test_plan_role_change_in_place() {
        let prior = prior();
        let result = plan(
            &schema(),
            Some(&prior),
            &json!({"email": "a@x.com", "role": "global:admin"}),
        );

        assert!(!result.requires_replace);
        assert_eq!(
            result.changes,
            vec![AttributeChange::modified(
                "role",
                json!("global:member"),
                json!("global:admin")
            )]
        );

        let planned = &result.planned_state;
        assert_eq!(planned["role"], "global:admin");
        assert_eq!(planned["id"], prior["id"]);
        assert_eq!(planned["is_pending"], prior["is_pending"]);
        assert_eq!(planned["updated_at"], prior["updated_at"]);
        assert!(is_unknown(&planned["first_name"]));
    }

    #[test]
    fn test_plan_email_change_replaces() {
        let result = plan(
            &schema(),
            Some(&prior()),
            &json!({"email": "b@x.com", "role": "global:member"}),
        );

        assert!(result.requires_replace);
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].path, "email");

        let planned = &result.planned_state;
        assert_eq!(planned["email"], "b@x.com");
        assert!(is_unknown(&planned["id"]));
        assert!(is_unknown(&planned["is_pending"]));
        assert!(is_unknown(&planned["updated_at"]));
    }

    #[test]
    fn test_plan_unknown_config_counts_as_change() {
        let result = plan(
            &schema(),
            Some(&prior()),
            &json!({"email": "a@x.com", "role": unknown()}),
        );
        assert_eq!(result.changes.len(), 1);
        assert!(is_unknown(&result.planned_state["role"]));
        assert!(!result.requires_replace);
    }

    #[test]
    fn test_plan_use_state_without_prior_value_is_unknown() {
        let mut prior = prior();
        prior["updated_at"] = Value::Null;
        let result = plan(
            &schema(),
            Some(&prior),
            &json!({"email": "a@x.com", "role": "global:admin"}),
        );
        assert!(is_unknown(&result.planned_state["updated_at"]));
    }

    #[test]
    fn test_plan_destroy() {
        let result = plan(&schema(), Some(&prior()), &Value::Null);

        assert_eq!(result.planned_state, Value::Null);
        let paths: Vec<_> = result.changes.iter().map(|c| c.path.as_str()).collect();
        // first_name is null in prior state, so it has no removal entry.
        assert_eq!(paths, vec!["email", "id", "is_pending", "role", "updated_at"]);
        assert!(result.changes.iter().all(|c| c.after.is_none()));
    }

    #[test]
    fn test_plan_optional_computed_keeps_prior_when_unset() {
        let schema = Schema::v0()
            .with_attribute("id", Attribute::optional_computed_string())
            .with_attribute("email", Attribute::optional_computed_string());

        let created = plan(&schema, None, &json!({"email": "a@x.com"}));
        assert!(is_unknown(&created.planned_state["id"]));
        assert_eq!(created.changes.len(), 1);

        let prior = json!({"id": "u-1", "email": "a@x.com"});
        let result = plan(&schema, Some(&prior), &json!({"email": "a@x.com"}));
        assert!(result.changes.is_empty());
    }

    #[test]
    fn test_plan_null_prior_is_create() {
        let result = plan(
            &schema(),
            Some(&Value::Null),
            &json!({"email": "a@x.com", "role": "global:member"}),
        );
        assert_eq!(result.changes.len(), 2);
        assert!(is_unknown(&result.planned_state["id"]));
    }
}
