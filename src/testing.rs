//! Testing utilities for the provider.
//!
//! [`ProviderTester`] drives a [`ProviderService`] without a gRPC server and
//! [`InMemoryUsers`] stands in for the n8n API, so full plan/apply cycles run
//! in-process.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use n8ncloud_provider::provider::N8nCloudProvider;
//! use n8ncloud_provider::testing::{InMemoryUsers, ProviderTester};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let users = Arc::new(InMemoryUsers::new());
//! let tester = ProviderTester::new(N8nCloudProvider::with_client("test", users.clone()));
//!
//! let state = tester
//!     .lifecycle_create(
//!         "n8ncloud_user",
//!         json!({"email": "a@x.com", "role": "global:member"}),
//!     )
//!     .await
//!     .unwrap();
//!
//! assert_eq!(state["is_pending"], true);
//! assert_eq!(users.len(), 1);
//! # });
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset};
use serde_json::Value;

use crate::client::{ApiError, CreateUserRequest, Role, User, UsersApi};
use crate::error::ProviderError;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// A test harness for provider implementations.
///
/// Plans built by the helpers pass the proposed state as the configuration,
/// which is what the host does for resources without defaults.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Get the list of data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider. Error diagnostics become [`TestError::Diagnostics`].
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// Create a new resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read data from a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Plan, create, then read. Returns the state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self.plan_create(resource_type, config).await?;
        let created_state = self
            .create(resource_type, plan_result.planned_state)
            .await?;
        self.read(resource_type, created_state).await
    }

    /// Plan, update, then read. Returns the state after read.
    ///
    /// A plan that requires replacement is refused with
    /// [`ProviderError::FailedPrecondition`]: the host would never send it
    /// to `update`.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan_result = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?;
        if plan_result.requires_replace {
            return Err(ProviderError::FailedPrecondition(format!(
                "plan for {} requires replacement",
                resource_type
            )));
        }
        let updated_state = self
            .update(resource_type, prior_state, plan_result.planned_state)
            .await?;
        self.read(resource_type, updated_state).await
    }

    /// Plan a destroy, then delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let _ = self
            .plan_delete(resource_type, current_state.clone())
            .await?;
        self.delete(resource_type, current_state).await
    }

    /// Import by identifier and read the single imported resource back.
    pub async fn lifecycle_import(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Value, ProviderError> {
        let mut imported = self.import_resource(resource_type, id).await?;
        match imported.pop() {
            Some(resource) if imported.is_empty() => self.read(resource_type, resource.state).await,
            _ => Err(ProviderError::Sdk(format!(
                "expected exactly one imported {} for {}",
                resource_type, id
            ))),
        }
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl TestError {
    /// The error diagnostics, if the operation produced any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            TestError::Diagnostics(diags) => diags,
            TestError::Provider(_) => &[],
        }
    }
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics
        .into_iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// In-memory n8n API
// =========================================================================

/// Number of calls each [`UsersApi`] operation received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `list_users`
    pub list: usize,
    /// `get_user`
    pub get: usize,
    /// `create_user`
    pub create: usize,
    /// `update_user_role`
    pub update_role: usize,
    /// `delete_user`
    pub delete: usize,
}

impl CallCounts {
    /// Total number of API calls.
    pub fn total(&self) -> usize {
        self.list + self.get + self.create + self.update_role + self.delete
    }
}

#[derive(Debug)]
struct FakeState {
    users: Vec<User>,
    next_id: u64,
    clock: DateTime<FixedOffset>,
    calls: CallCounts,
}

impl FakeState {
    /// Advance the clock by a minute and return the new time.
    fn tick(&mut self) -> DateTime<FixedOffset> {
        self.clock += Duration::minutes(1);
        self.clock
    }

    fn find(&self, identifier: &str) -> Option<usize> {
        self.users
            .iter()
            .position(|u| u.id == identifier || u.email == identifier)
    }

    fn find_id(&self, id: &str) -> Result<usize, ApiError> {
        self.users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| api_error(404, "NOT_FOUND", format!("User {} not found", id)))
    }
}

fn api_error(status: u16, code: &str, message: String) -> ApiError {
    ApiError::Api {
        status,
        code: code.to_string(),
        message,
        hint: None,
    }
}

/// An in-memory [`UsersApi`] with the observable behaviour of an n8n
/// instance: invitations start pending, duplicate emails conflict and the
/// invitation link is only returned by create.
///
/// Every mutation moves an internal clock forward by one minute so
/// `updated_at` changes are observable. Out-of-band changes (a user
/// accepting an invitation, an admin editing a profile) are simulated with
/// [`accept_invitation`](Self::accept_invitation) and [`touch`](Self::touch).
#[derive(Debug)]
pub struct InMemoryUsers {
    state: Mutex<FakeState>,
}

impl Default for InMemoryUsers {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUsers {
    /// Base URL of the invitation links handed out by create.
    pub const INVITE_BASE: &'static str = "https://example.app.n8n.cloud/signup";

    /// Create an empty instance. The clock starts at 2024-03-01T10:00:00Z.
    pub fn new() -> Self {
        let start = DateTime::from_timestamp(1_709_287_200, 0)
            .unwrap_or_default()
            .fixed_offset();
        Self {
            state: Mutex::new(FakeState {
                users: Vec::new(),
                next_id: 1,
                clock: start,
                calls: CallCounts::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an existing, already accepted user without counting an API call.
    pub fn seed(&self, email: &str, role: Role) -> User {
        let mut state = self.lock();
        let now = state.tick();
        let user = User {
            id: format!("seed-{}", state.next_id),
            email: email.to_string(),
            first_name: None,
            last_name: None,
            is_pending: false,
            created_at: now,
            updated_at: now,
            role: Some(role),
            invite_accept_url: None,
        };
        state.next_id += 1;
        state.users.push(user.clone());
        user
    }

    /// Current server-side copy of a user, by id or email.
    pub fn user(&self, identifier: &str) -> Option<User> {
        let state = self.lock();
        state.find(identifier).map(|i| state.users[i].clone())
    }

    /// Number of users on the instance.
    pub fn len(&self) -> usize {
        self.lock().users.len()
    }

    /// Whether the instance has no users.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls received so far.
    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Simulate the invitee completing sign-up.
    pub fn accept_invitation(&self, id: &str, first_name: &str, last_name: &str) -> Option<User> {
        let mut state = self.lock();
        let index = state.find_id(id).ok()?;
        let now = state.tick();
        let user = &mut state.users[index];
        user.is_pending = false;
        user.first_name = Some(first_name.to_string());
        user.last_name = Some(last_name.to_string());
        user.updated_at = now;
        Some(user.clone())
    }

    /// Simulate an out-of-band edit that only bumps `updated_at`.
    pub fn touch(&self, id: &str) -> Option<User> {
        let mut state = self.lock();
        let index = state.find_id(id).ok()?;
        let now = state.tick();
        let user = &mut state.users[index];
        user.updated_at = now;
        Some(user.clone())
    }

    /// Simulate a user removed outside the provider.
    pub fn remove(&self, id: &str) -> Option<User> {
        let mut state = self.lock();
        let index = state.find_id(id).ok()?;
        Some(state.users.remove(index))
    }
}

#[async_trait]
impl UsersApi for InMemoryUsers {
    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        let mut state = self.lock();
        state.calls.list += 1;
        Ok(state.users.clone())
    }

    async fn get_user(&self, identifier: &str) -> Result<User, ApiError> {
        let mut state = self.lock();
        state.calls.get += 1;
        match state.find(identifier) {
            Some(index) => Ok(state.users[index].clone()),
            None => Err(ApiError::NotFound {
                identifier: identifier.to_string(),
            }),
        }
    }

    async fn create_user(&self, request: &CreateUserRequest) -> Result<User, ApiError> {
        let mut state = self.lock();
        state.calls.create += 1;
        if state.users.iter().any(|u| u.email == request.email) {
            return Err(api_error(
                409,
                "CONFLICT",
                format!("User with email {} already exists", request.email),
            ));
        }
        let role = request.role.clone().unwrap_or(Role::Member);
        if !role.is_assignable() {
            return Err(api_error(400, "BAD_REQUEST", format!("Invalid role {}", role)));
        }

        let now = state.tick();
        let id = format!("user-{}", state.next_id);
        state.next_id += 1;
        let user = User {
            id: id.clone(),
            email: request.email.clone(),
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            is_pending: true,
            created_at: now,
            updated_at: now,
            role: Some(role),
            invite_accept_url: None,
        };
        state.users.push(user.clone());

        Ok(User {
            invite_accept_url: Some(format!("{}?inviteeId={}", Self::INVITE_BASE, id)),
            ..user
        })
    }

    async fn update_user_role(&self, id: &str, role: &Role) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.calls.update_role += 1;
        if !role.is_assignable() {
            return Err(api_error(400, "BAD_REQUEST", format!("Invalid role {}", role)));
        }
        let index = state.find_id(id)?;
        let now = state.tick();
        let user = &mut state.users[index];
        user.role = Some(role.clone());
        user.updated_at = now;
        Ok(())
    }

    async fn delete_user(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.calls.delete += 1;
        let index = state.find_id(id)?;
        state.users.remove(index);
        Ok(())
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan creates a resource.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(!plan.requires_replace, "Expected plan to create, not replace");
}

/// Assert that a plan result indicates no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changed_paths()
    );
}

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan changes exactly `paths`, in place.
///
/// # Panics
///
/// Panics if the plan requires replacement or changes a different set of
/// attributes.
pub fn assert_plan_updates_in_place(plan: &PlanResult, paths: &[&str]) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
    let mut changed = plan.changed_paths();
    changed.sort_unstable();
    let mut expected = paths.to_vec();
    expected.sort_unstable();
    assert_eq!(changed, expected, "Unexpected set of changed attributes");
}

/// Assert that two states are equal apart from the `ignored` attributes.
///
/// # Panics
///
/// Panics on the first attribute that differs.
pub fn assert_states_match_except(left: &Value, right: &Value, ignored: &[&str]) {
    let keys = |v: &Value| -> Vec<String> {
        v.as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    };
    let mut names = keys(left);
    names.extend(keys(right));
    names.sort();
    names.dedup();

    for name in names.iter().filter(|n| !ignored.contains(&n.as_str())) {
        assert_eq!(
            left.get(name).unwrap_or(&Value::Null),
            right.get(name).unwrap_or(&Value::Null),
            "States differ at attribute '{}'",
            name
        );
    }
}

/// Assert that the user recorded in `state` no longer exists remotely.
///
/// # Panics
///
/// Panics if the state has no `id`, or the lookup succeeds or fails with
/// anything other than a not-found error.
pub async fn assert_user_destroyed(api: &dyn UsersApi, state: &Value) {
    let id = state
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_else(|| panic!("State has no 'id': {}", state));

    match api.get_user(id).await {
        Ok(user) => panic!("User {} still exists: {:?}", id, user),
        Err(ApiError::NotFound { .. }) => {},
        Err(err) if err.status() == Some(404) => {},
        Err(err) => panic!("Unable to verify user {} was destroyed: {}", id, err),
    }
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain an error with the given summary, and
/// optionally the given detail.
///
/// # Panics
///
/// Panics if no error diagnostic matches.
pub fn assert_error(diagnostics: &[Diagnostic], summary: &str, detail: Option<&str>) {
    let matched = diagnostics.iter().any(|d| {
        d.is_error() && d.summary == summary && detail.map_or(true, |x| d.detail.as_deref() == Some(x))
    });

    assert!(
        matched,
        "Expected an error '{}' ({:?}), but no matching error found. Errors: {:?}",
        summary,
        detail,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| (&d.summary, &d.detail))
            .collect::<Vec<_>>()
    );
}
