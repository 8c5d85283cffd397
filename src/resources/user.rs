//! The `n8ncloud_user` resource.
//!
//! Users are invited by email with a global role. Changing the email
//! replaces the user; changing the role is applied in place. Existing users
//! can be imported by email address:
//!
//! ```text
//! import n8ncloud_user.example user@example.com
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::client::{format_timestamp, CreateUserRequest, Role, User, UsersApi};
use crate::entity::{required_string, ManagedEntity};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::types::ImportedResource;

/// Type name of the user resource.
pub const USER_RESOURCE_TYPE: &str = "n8ncloud_user";

/// State of a managed user. Every attribute is nullable in state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserResourceModel {
    /// Server-assigned identifier.
    pub id: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Global role.
    pub role: Option<String>,
    /// First name, null until the invitation is accepted.
    pub first_name: Option<String>,
    /// Last name, null until the invitation is accepted.
    pub last_name: Option<String>,
    /// Whether the invitation is outstanding.
    pub is_pending: Option<bool>,
    /// Creation time, RFC 3339.
    pub created_at: Option<String>,
    /// Last modification time, RFC 3339.
    pub updated_at: Option<String>,
    /// Invitation link; only known right after create.
    pub invite_accept_url: Option<String>,
}

impl UserResourceModel {
    /// Decode a state document.
    pub fn from_state(state: &Value) -> Result<Self, ProviderError> {
        Ok(serde_json::from_value(state.clone())?)
    }

    /// Encode as a state document.
    pub fn into_state(self) -> Result<Value, ProviderError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Copy the server-owned attributes of `user`. The email is left alone
    /// and the role is only overwritten when the server reports one.
    fn refresh_from(&mut self, user: &User) {
        if let Some(role) = &user.role {
            self.role = Some(role.to_string());
        }
        self.first_name = user.first_name.clone();
        self.last_name = user.last_name.clone();
        self.is_pending = Some(user.is_pending);
        self.created_at = Some(format_timestamp(&user.created_at));
        self.updated_at = Some(format_timestamp(&user.updated_at));
        self.invite_accept_url = user.invite_accept_url.clone();
    }

    fn id(&self) -> Result<&str, ProviderError> {
        self.id
            .as_deref()
            .ok_or_else(|| ProviderError::Validation("attribute 'id' is required".to_string()))
    }
}

fn parse_role(value: &str) -> Result<Role, ProviderError> {
    value
        .parse()
        .map_err(|err: crate::client::InvalidRole| ProviderError::Validation(err.to_string()))
}

/// Manages a single n8n user.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserResource;

impl UserResource {
    /// Create the resource.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ManagedEntity for UserResource {
    fn type_name(&self) -> &'static str {
        USER_RESOURCE_TYPE
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(
                "User resource for managing n8n cloud users. Users can be imported using \
                 their email address.",
            )
            .with_attribute(
                "id",
                Attribute::computed_string()
                    .with_description("The unique identifier of the user")
                    .with_use_state_for_unknown(),
            )
            .with_attribute(
                "email",
                Attribute::required_string()
                    .with_description("The email address of the user")
                    .with_requires_replace(),
            )
            .with_attribute(
                "role",
                Attribute::required_string()
                    .with_description("The role of the user (global:admin or global:member)")
                    .with_one_of(Role::ASSIGNABLE),
            )
            .with_attribute(
                "first_name",
                Attribute::computed_string().with_description("The first name of the user"),
            )
            .with_attribute(
                "last_name",
                Attribute::computed_string().with_description("The last name of the user"),
            )
            .with_attribute(
                "is_pending",
                Attribute::computed_bool()
                    .with_description(
                        "Whether the user has not yet set up their account. This value is \
                         managed externally and will change when the user accepts their \
                         invitation.",
                    )
                    .with_use_state_for_unknown(),
            )
            .with_attribute(
                "created_at",
                Attribute::computed_string()
                    .with_description("The timestamp when the user was created")
                    .with_use_state_for_unknown(),
            )
            .with_attribute(
                "updated_at",
                Attribute::computed_string()
                    .with_description(
                        "The timestamp when the user was last updated. This value is updated \
                         externally when the user's information changes.",
                    )
                    .with_use_state_for_unknown(),
            )
            .with_attribute(
                "invite_accept_url",
                Attribute::computed_string()
                    .with_description("The URL for the user to accept their invitation"),
            )
    }

    async fn create(&self, api: &dyn UsersApi, planned_state: Value) -> Result<Value, ProviderError> {
        let email = required_string(&planned_state, "email")?;
        let role = parse_role(&required_string(&planned_state, "role")?)?;

        debug!(email = %email, role = %role, "Creating n8n cloud user");

        let user = api
            .create_user(&CreateUserRequest::new(email.clone(), role.clone()))
            .await
            .map_err(|e| ProviderError::from_api("Unable to create user", e))?;

        let mut model = UserResourceModel {
            id: Some(user.id.clone()),
            email: Some(email),
            role: Some(role.to_string()),
            ..Default::default()
        };
        model.refresh_from(&user);

        trace!(id = %user.id, "Created n8n cloud user resource");
        model.into_state()
    }

    async fn read(&self, api: &dyn UsersApi, current_state: Value) -> Result<Value, ProviderError> {
        let mut model = UserResourceModel::from_state(&current_state)?;
        let user = api
            .get_user(model.id()?)
            .await
            .map_err(|e| ProviderError::from_api("Unable to read user", e))?;

        model.email = Some(user.email.clone());
        model.refresh_from(&user);
        model.into_state()
    }

    async fn update(
        &self,
        api: &dyn UsersApi,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let mut model = UserResourceModel::from_state(&prior_state)?;
        let role = parse_role(&required_string(&planned_state, "role")?)?;
        let id = model.id()?.to_string();

        debug!(id = %id, role = %role, "Updating n8n cloud user role");

        api.update_user_role(&id, &role)
            .await
            .map_err(|e| ProviderError::from_api("Unable to update user role", e))?;

        let user = api
            .get_user(&id)
            .await
            .map_err(|e| ProviderError::from_api("Unable to read updated user", e))?;

        // Only the role and its modification time move; everything else is
        // left for the next refresh.
        model.role = Some(role.to_string());
        model.updated_at = Some(format_timestamp(&user.updated_at));
        model.into_state()
    }

    async fn delete(&self, api: &dyn UsersApi, current_state: Value) -> Result<(), ProviderError> {
        let model = UserResourceModel::from_state(&current_state)?;
        let id = model.id()?;

        debug!(id = %id, "Deleting n8n cloud user");

        api.delete_user(id)
            .await
            .map_err(|e| ProviderError::from_api("Unable to delete user", e))
    }

    async fn import(
        &self,
        api: &dyn UsersApi,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let user = api
            .get_user(id)
            .await
            .map_err(|e| ProviderError::from_api(&format!("Unable to get user by email {}", id), e))?;

        let model = UserResourceModel {
            id: Some(user.id),
            email: Some(user.email),
            ..Default::default()
        };
        Ok(vec![ImportedResource::new(USER_RESOURCE_TYPE, model.into_state()?)])
    }
}
