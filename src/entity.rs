//! Traits implemented by resources and data sources, plus state helpers.

use async_trait::async_trait;
use serde_json::Value;

use crate::client::UsersApi;
use crate::error::ProviderError;
use crate::plan;
use crate::schema::{has_errors, Diagnostic, Schema};
use crate::types::{is_unknown, ImportedResource, PlanResult};
use crate::validation;

/// A managed resource type.
///
/// `validate` and `plan` default to the schema-driven implementations; the
/// remaining operations talk to the n8n API through the injected client.
#[async_trait]
pub trait ManagedEntity: Send + Sync {
    /// Resource type name, e.g. `n8ncloud_user`.
    fn type_name(&self) -> &'static str;

    /// Schema including plan-modifier policy.
    fn schema(&self) -> Schema;

    /// Validate a configuration.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validation::validate(&self.schema(), config)
    }

    /// Plan a change. Invalid configuration fails the plan.
    fn plan(&self, prior_state: Option<&Value>, config: &Value) -> Result<PlanResult, ProviderError> {
        if !config.is_null() {
            diagnostics_to_result(self.validate(config))?;
        }
        Ok(plan::plan(&self.schema(), prior_state, config))
    }

    /// Create the remote object from a planned state.
    async fn create(&self, api: &dyn UsersApi, planned_state: Value) -> Result<Value, ProviderError>;

    /// Refresh state from the remote object.
    async fn read(&self, api: &dyn UsersApi, current_state: Value) -> Result<Value, ProviderError>;

    /// Apply an in-place update.
    async fn update(
        &self,
        api: &dyn UsersApi,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object.
    async fn delete(&self, api: &dyn UsersApi, current_state: Value) -> Result<(), ProviderError>;

    /// Import an existing remote object by identifier.
    async fn import(
        &self,
        api: &dyn UsersApi,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError>;
}

/// A read-only data source type.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Data source type name.
    fn type_name(&self) -> &'static str;

    /// Schema of the data source.
    fn schema(&self) -> Schema;

    /// Validate a configuration.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validation::validate(&self.schema(), config)
    }

    /// Look up the remote object.
    async fn read(&self, api: &dyn UsersApi, config: Value) -> Result<Value, ProviderError>;
}

/// Collapse error diagnostics into a validation error.
pub fn diagnostics_to_result(diagnostics: Vec<Diagnostic>) -> Result<(), ProviderError> {
    if !has_errors(&diagnostics) {
        return Ok(());
    }
    let message = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| match &d.detail {
            Some(detail) => format!("{}: {}", d.summary, detail),
            None => d.summary.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ");
    Err(ProviderError::Validation(message))
}

/// A string attribute that may be null. Unknown values are treated as null.
pub fn optional_string(state: &Value, name: &str) -> Option<String> {
    state
        .get(name)
        .filter(|v| !is_unknown(v))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// A string attribute that must be set and known.
pub fn required_string(state: &Value, name: &str) -> Result<String, ProviderError> {
    match state.get(name) {
        Some(v) if is_unknown(v) => Err(ProviderError::Validation(format!(
            "attribute '{}' is not known yet",
            name
        ))),
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(ProviderError::Validation(format!(
            "attribute '{}' is required",
            name
        ))),
    }
}
