//! The `n8ncloud` provider: configuration, registry and dispatch.
//!
//! [`N8nCloudProvider`] implements [`ProviderService`]. `configure` builds a
//! single [`N8nClient`] that every resource and data source operation then
//! shares; `stop` cancels whatever requests that client has in flight.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::{N8nClient, UsersApi};
use crate::config::{client_error_diagnostic, ProviderConfig};
use crate::data_sources::{UserDataSource, USER_DATA_SOURCE_TYPE};
use crate::entity::{DataSource, ManagedEntity};
use crate::error::ProviderError;
use crate::resources::{UserResource, USER_RESOURCE_TYPE};
use crate::schema::{has_errors, Attribute, Diagnostic, ProviderSchema, Schema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities};
use crate::validation;

/// Provider type name.
pub const PROVIDER_TYPE_NAME: &str = "n8ncloud";

/// Default request timeout exported in the provider schema, in seconds.
pub const DEFAULT_TIMEOUT_SECS: i64 = 30;

fn resource(type_name: &str) -> Result<&'static dyn ManagedEntity, ProviderError> {
    match type_name {
        USER_RESOURCE_TYPE => Ok(&UserResource),
        other => Err(ProviderError::UnknownResource(other.to_string())),
    }
}

fn data_source(type_name: &str) -> Result<&'static dyn DataSource, ProviderError> {
    match type_name {
        USER_DATA_SOURCE_TYPE => Ok(&UserDataSource),
        other => Err(ProviderError::UnknownResource(format!(
            "Unknown data source type: {}",
            other
        ))),
    }
}

fn provider_config_schema() -> Schema {
    Schema::v0()
        .with_description("Interact with n8n Cloud.")
        .with_attribute(
            "api_key",
            Attribute::optional_string()
                .sensitive()
                .with_description(
                    "API key for n8n Cloud authentication. Can also be set with the \
                     N8N_API_KEY environment variable.",
                ),
        )
        .with_attribute(
            "instance_url",
            Attribute::optional_string().with_description(
                "n8n Cloud instance URL (e.g., https://yourinstance.app.n8n.cloud). Can \
                 also be set with the N8N_INSTANCE_URL environment variable.",
            ),
        )
        .with_attribute(
            "timeout",
            Attribute::optional_int64()
                .with_description("HTTP client timeout in seconds. Defaults to 30 seconds.")
                .with_default(Value::from(DEFAULT_TIMEOUT_SECS)),
        )
}

/// The n8n Cloud provider.
pub struct N8nCloudProvider {
    version: String,
    client: RwLock<Option<Arc<dyn UsersApi>>>,
    shutdown: CancellationToken,
}

impl N8nCloudProvider {
    /// Create an unconfigured provider.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            client: RwLock::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Create a provider that is already configured with `api`.
    ///
    /// A later `configure` replaces the client.
    pub fn with_client(version: impl Into<String>, api: Arc<dyn UsersApi>) -> Self {
        Self {
            version: version.into(),
            client: RwLock::new(Some(api)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Provider version reported in the user agent.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether `configure` has produced a client.
    pub async fn is_configured(&self) -> bool {
        self.client.read().await.is_some()
    }

    async fn api(&self) -> Result<Arc<dyn UsersApi>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::FailedPrecondition(
                "the n8n Cloud provider has not been configured".to_string(),
            )
        })
    }
}

#[async_trait::async_trait]
impl ProviderService for N8nCloudProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(provider_config_schema())
            .with_resource(USER_RESOURCE_TYPE, UserResource.schema())
            .with_data_source(USER_DATA_SOURCE_TYPE, UserDataSource.schema())
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: vec![USER_RESOURCE_TYPE.to_string()],
            data_sources: vec![USER_DATA_SOURCE_TYPE.to_string()],
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validation::validate(&provider_config_schema(), &config))
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = self.validate_provider_config(config.clone()).await?;
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let resolved = match ProviderConfig::from_value(&config)?.resolve_from_env() {
            Ok(resolved) => resolved,
            Err(errors) => {
                diagnostics.extend(errors);
                return Ok(diagnostics);
            },
        };

        debug!(config = %resolved, "Creating n8n Cloud API client");

        match N8nClient::with_cancellation(
            resolved.client_config(&self.version),
            self.shutdown.child_token(),
        ) {
            Ok(client) => {
                *self.client.write().await = Some(Arc::new(client));
                info!(
                    provider = PROVIDER_TYPE_NAME,
                    instance_url = %resolved.instance_url,
                    "Configured n8n Cloud provider"
                );
            },
            Err(err) => diagnostics.push(client_error_diagnostic(&err)),
        }
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        info!("Stopping n8n Cloud provider, cancelling in-flight requests");
        self.shutdown.cancel();
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(resource(resource_type)?.validate(&config))
    }

    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let current = resource(resource_type)?.schema().version;
        match u64::try_from(version) {
            Ok(v) if v == current => Ok(state),
            _ => Err(ProviderError::FailedPrecondition(format!(
                "cannot upgrade {} state from schema version {} to {}",
                resource_type, version, current
            ))),
        }
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        _proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        resource(resource_type)?.plan(prior_state.as_ref(), &config)
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let entity = resource(resource_type)?;
        let api = self.api().await?;
        entity.create(api.as_ref(), planned_state).await
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let entity = resource(resource_type)?;
        let api = self.api().await?;
        entity.read(api.as_ref(), current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let entity = resource(resource_type)?;
        let api = self.api().await?;
        entity.update(api.as_ref(), prior_state, planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let entity = resource(resource_type)?;
        let api = self.api().await?;
        entity.delete(api.as_ref(), current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let entity = resource(resource_type)?;
        let api = self.api().await?;
        entity.import(api.as_ref(), id).await
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(data_source(data_source_type)?.validate(&config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let source = data_source(data_source_type)?;
        let api = self.api().await?;
        source.read(api.as_ref(), config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        assert_error, assert_plan_creates, assert_plan_no_changes, assert_plan_replaces,
        assert_plan_updates_in_place, assert_states_match_except, assert_user_destroyed,
        InMemoryUsers, ProviderTester, TestError,
    };
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn tester() -> (Arc<InMemoryUsers>, ProviderTester<N8nCloudProvider>) {
        let users = Arc::new(InMemoryUsers::new());
        let provider = N8nCloudProvider::with_client("test", users.clone());
        (users, ProviderTester::new(provider))
    }

    fn user_config(email: &str, role: &str) -> Value {
        json!({"email": email, "role": role})
    }

    fn user_json(id: &str, email: &str, role: &str, pending: bool) -> Value {
        json!({
            "id": id,
            "email": email,
            "isPending": pending,
            "createdAt": "2024-03-01T10:00:00.000Z",
            "updatedAt": "2024-03-01T10:00:00.000Z",
            "role": role
        })
    }

    #[test]
    fn test_schema_and_metadata() {
        let (_, tester) = tester();
        assert_eq!(tester.resource_types(), vec!["n8ncloud_user"]);
        assert_eq!(tester.data_source_types(), vec!["n8ncloud_user"]);
        assert!(tester.provider().metadata().capabilities.plan_destroy);

        let full = tester.provider().schema();
        assert_eq!(full.resources.len(), 1);
        assert_eq!(full.data_sources.len(), 1);

        let schema = tester.schema();
        let api_key = schema.provider.attribute("api_key").unwrap();
        assert!(api_key.flags.sensitive);
        assert!(api_key.flags.optional);
        let timeout = schema.provider.attribute("timeout").unwrap();
        assert_eq!(timeout.default, Some(json!(30)));
    }

    #[tokio::test]
    async fn test_unknown_types() {
        let (_, tester) = tester();
        let err = tester
            .create("n8ncloud_workflow", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));

        let err = tester
            .read_data_source("n8ncloud_workflow", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_fails_precondition() {
        let tester = ProviderTester::new(N8nCloudProvider::new("test"));
        assert!(!tester.provider().is_configured().await);

        let err = tester
            .create("n8ncloud_user", user_config("a@x.com", "global:member"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));

        // Planning and validation need no client.
        let plan = tester
            .plan_create("n8ncloud_user", user_config("a@x.com", "global:member"))
            .await
            .unwrap();
        assert_plan_creates(&plan);
    }

    #[tokio::test]
    async fn test_configure_reports_diagnostics() {
        let tester = ProviderTester::new(N8nCloudProvider::new("test"));

        let err = tester
            .configure(json!({"api_key": "k", "instance_url": "not a url"}))
            .await
            .unwrap_err();
        assert_error(err.diagnostics(), "Invalid n8n Cloud Instance URL", None);

        let err = tester
            .configure(json!({"api_key": "k", "instance_url": "https://a.example", "timeout": "30"}))
            .await
            .unwrap_err();
        assert!(matches!(err, TestError::Diagnostics(_)));

        let err = tester
            .configure(json!({"api_key": crate::types::unknown(), "instance_url": "https://a.example"}))
            .await
            .unwrap_err();
        assert_error(err.diagnostics(), "Unknown n8n Cloud API Key", None);

        let err = tester
            .configure(json!({"api_key": "bad\nkey", "instance_url": "https://a.example"}))
            .await
            .unwrap_err();
        assert_error(err.diagnostics(), "Unable to create n8n Cloud API Client", None);

        assert!(!tester.provider().is_configured().await);
    }

    #[tokio::test]
    async fn test_configure_builds_client() {
        let tester = ProviderTester::new(N8nCloudProvider::new("test"));
        assert_ok!(
            tester
                .configure(json!({
                    "api_key": "k",
                    "instance_url": "https://acme.app.n8n.cloud/",
                    "timeout": 10
                }))
                .await
        );
        assert!(tester.provider().is_configured().await);
    }

    #[tokio::test]
    async fn test_validate_resource_config() {
        let (_, tester) = tester();
        tester
            .validate_resource_config("n8ncloud_user", user_config("a@x.com", "global:admin"))
            .await
            .unwrap();

        let err = tester
            .validate_resource_config("n8ncloud_user", user_config("a@x.com", "owner"))
            .await
            .unwrap_err();
        let diags = err.diagnostics();
        assert_error(
            diags,
            "Invalid Attribute Value Match",
            Some(r#"Attribute role value must be one of: ["global:admin" "global:member"], got: "owner""#),
        );
    }

    #[tokio::test]
    async fn test_upgrade_resource_state() {
        let (_, tester) = tester();
        let state = json!({"id": "u-1"});
        let upgraded = tester
            .provider()
            .upgrade_resource_state("n8ncloud_user", 0, state.clone())
            .await
            .unwrap();
        assert_eq!(upgraded, state);

        let err = tester
            .provider()
            .upgrade_resource_state("n8ncloud_user", 3, state)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_create_pending_member() {
        let (users, tester) = tester();
        let state = tester
            .lifecycle_create("n8ncloud_user", user_config("a@x.com", "global:member"))
            .await
            .unwrap();

        assert_eq!(state["is_pending"], true);
        assert!(!state["id"].as_str().unwrap().is_empty());

        // Still pending on the next refresh unless the invitee acts.
        let refreshed = tester.read("n8ncloud_user", state.clone()).await.unwrap();
        assert_eq!(refreshed["is_pending"], true);

        users
            .accept_invitation(state["id"].as_str().unwrap(), "Ada", "Lovelace")
            .unwrap();
        let refreshed = tester.read("n8ncloud_user", refreshed).await.unwrap();
        assert_eq!(refreshed["is_pending"], false);
    }

    #[tokio::test]
    async fn test_create_then_read_keeps_role() {
        for role in ["global:admin", "global:member"] {
            let (_, tester) = tester();
            let state = tester
                .lifecycle_create("n8ncloud_user", user_config("a@x.com", role))
                .await
                .unwrap();
            assert_eq!(state["role"], role);
        }
    }

    #[tokio::test]
    async fn test_email_change_replaces() {
        let (_, tester) = tester();
        let state = tester
            .lifecycle_create("n8ncloud_user", user_config("a@x.com", "global:member"))
            .await
            .unwrap();

        let plan = tester
            .plan_update("n8ncloud_user", state.clone(), user_config("b@x.com", "global:member"))
            .await
            .unwrap();
        assert_plan_replaces(&plan);

        let err = tester
            .lifecycle_update("n8ncloud_user", state, user_config("b@x.com", "global:admin"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_role_change_updates_in_place() {
        let (users, tester) = tester();
        let state = tester
            .lifecycle_create("n8ncloud_user", user_config("a@x.com", "global:member"))
            .await
            .unwrap();

        let plan = tester
            .plan_update("n8ncloud_user", state.clone(), user_config("a@x.com", "global:admin"))
            .await
            .unwrap();
        assert_plan_updates_in_place(&plan, &["role"]);
        for name in ["id", "is_pending", "created_at", "updated_at"] {
            assert_eq!(plan.planned_state[name], state[name], "{}", name);
        }

        let updated = tester
            .lifecycle_update("n8ncloud_user", state.clone(), user_config("a@x.com", "global:admin"))
            .await
            .unwrap();
        assert_eq!(updated["role"], "global:admin");
        assert_eq!(updated["id"], state["id"]);
        assert_eq!(users.calls().update_role, 1);
        assert_eq!(users.calls().create, 1);
    }

    #[tokio::test]
    async fn test_out_of_band_drift_plans_nothing() {
        let (users, tester) = tester();
        let state = tester
            .lifecycle_create("n8ncloud_user", user_config("a@x.com", "global:member"))
            .await
            .unwrap();
        let id = state["id"].as_str().unwrap().to_string();

        users.accept_invitation(&id, "Ada", "Lovelace").unwrap();
        users.touch(&id).unwrap();
        let refreshed = tester.read("n8ncloud_user", state.clone()).await.unwrap();
        assert_ne!(refreshed["updated_at"], state["updated_at"]);
        assert_ne!(refreshed["is_pending"], state["is_pending"]);

        let plan = tester
            .plan_update("n8ncloud_user", refreshed, user_config("a@x.com", "global:member"))
            .await
            .unwrap();
        assert_plan_no_changes(&plan);
    }

    #[tokio::test]
    async fn test_import_matches_create() {
        let (_, tester) = tester();
        let created = tester
            .lifecycle_create("n8ncloud_user", user_config("a@x.com", "global:member"))
            .await
            .unwrap();

        let imported = tester
            .lifecycle_import("n8ncloud_user", "a@x.com")
            .await
            .unwrap();
        assert_states_match_except(&imported, &created, &["invite_accept_url"]);
    }

    #[tokio::test]
    async fn test_delete_destroys_user() {
        let (users, tester) = tester();
        let state = tester
            .lifecycle_create("n8ncloud_user", user_config("a@x.com", "global:member"))
            .await
            .unwrap();

        tester
            .lifecycle_delete("n8ncloud_user", state.clone())
            .await
            .unwrap();
        assert_user_destroyed(users.as_ref(), &state).await;
    }

    #[tokio::test]
    async fn test_data_source_lookups() {
        let (users, tester) = tester();
        let seeded = users.seed("a@x.com", crate::client::Role::Admin);

        let by_email = tester
            .read_data_source("n8ncloud_user", json!({"email": "a@x.com"}))
            .await
            .unwrap();
        assert_eq!(by_email["id"], seeded.id.as_str());

        let by_id = tester
            .read_data_source("n8ncloud_user", json!({"id": "nope"}))
            .await
            .unwrap_err();
        assert_eq!(by_id.message(), "User with ID \"nope\" not found");

        let by_email = tester
            .read_data_source("n8ncloud_user", json!({"email": "nope@x.com"}))
            .await
            .unwrap_err();
        assert_eq!(by_email.message(), "User with email \"nope@x.com\" not found");
    }

    #[tokio::test]
    async fn test_data_source_without_identifier_fails_before_calling_api() {
        let (users, tester) = tester();

        let err = tester
            .validate_data_source_config("n8ncloud_user", json!({}))
            .await
            .unwrap_err();
        assert_error(err.diagnostics(), "Missing Attribute", None);

        assert_err!(tester.read_data_source("n8ncloud_user", json!({})).await);
        assert_eq!(users.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_over_http() {
        let server = MockServer::start_async().await;
        let create = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/users")
                    .header("x-n8n-api-key", "k")
                    .json_body(json!({"email": "a@x.com", "role": "global:member"}));
                then.status(201).json_body(json!({
                    "id": "u-1",
                    "email": "a@x.com",
                    "isPending": true,
                    "createdAt": "2024-03-01T10:00:00.000Z",
                    "updatedAt": "2024-03-01T10:00:00.000Z",
                    "role": "global:member",
                    "inviteAcceptUrl": "https://acme.app.n8n.cloud/signup?inviteeId=u-1"
                }));
            })
            .await;
        let get = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/users/u-1");
                then.status(200)
                    .json_body(user_json("u-1", "a@x.com", "global:member", true));
            })
            .await;

        let tester = ProviderTester::new(N8nCloudProvider::new("test"));
        tester
            .configure(json!({"api_key": "k", "instance_url": server.base_url()}))
            .await
            .unwrap();

        let state = tester
            .lifecycle_create("n8ncloud_user", user_config("a@x.com", "global:member"))
            .await
            .unwrap();

        create.assert_async().await;
        get.assert_async().await;
        assert_eq!(state["id"], "u-1");
        assert_eq!(state["is_pending"], true);
        assert_eq!(state["created_at"], "2024-03-01T10:00:00Z");
        assert_eq!(state["invite_accept_url"], Value::Null);
    }

    #[tokio::test]
    async fn test_stop_cancels_in_flight_requests() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/users/u-1");
                then.status(200)
                    .delay(Duration::from_secs(10))
                    .json_body(user_json("u-1", "a@x.com", "global:member", true));
            })
            .await;

        let provider = Arc::new(N8nCloudProvider::new("test"));
        let diags = provider
            .configure(json!({"api_key": "k", "instance_url": server.base_url()}))
            .await
            .unwrap();
        assert!(diags.is_empty());

        let reader = {
            let provider = provider.clone();
            tokio::spawn(async move {
                provider
                    .read("n8ncloud_user", json!({"id": "u-1"}))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        provider.stop().await.unwrap();

        let err = tokio::time::timeout(Duration::from_secs(5), reader)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled(_)));
        assert!(err.message().starts_with("Unable to read user"));
    }
}
