//! The `n8ncloud_user` data source: look up an existing user by id or email.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::client::{format_timestamp, ApiError, User, UsersApi};
use crate::entity::{diagnostics_to_result, optional_string, DataSource};
use crate::error::ProviderError;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation;

/// Type name of the user data source.
pub const USER_DATA_SOURCE_TYPE: &str = "n8ncloud_user";

/// Result of a user lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserDataSourceModel {
    /// User identifier.
    pub id: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Global role, null when the server omits it.
    pub role: Option<String>,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Whether the invitation is outstanding.
    pub is_pending: Option<bool>,
    /// Creation time, RFC 3339.
    pub created_at: Option<String>,
    /// Last modification time, RFC 3339.
    pub updated_at: Option<String>,
    /// Invitation link, if the server returned one.
    pub invite_accept_url: Option<String>,
}

impl From<User> for UserDataSourceModel {
    fn from(user: User) -> Self {
        Self {
            created_at: Some(format_timestamp(&user.created_at)),
            updated_at: Some(format_timestamp(&user.updated_at)),
            id: Some(user.id),
            email: Some(user.email),
            role: user.role.map(String::from),
            first_name: user.first_name,
            last_name: user.last_name,
            is_pending: Some(user.is_pending),
            invite_accept_url: user.invite_accept_url,
        }
    }
}

/// How the user is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Lookup {
    Id(String),
    Email(String),
}

impl Lookup {
    fn identifier(&self) -> &str {
        match self {
            Lookup::Id(id) => id,
            Lookup::Email(email) => email,
        }
    }

    fn not_found(&self) -> ProviderError {
        ProviderError::NotFound(match self {
            Lookup::Id(id) => format!("User with ID {:?} not found", id),
            Lookup::Email(email) => format!("User with email {:?} not found", email),
        })
    }
}

/// Exactly one of `id` and `email` must be set. Unknown values count as set.
fn lookup_diagnostics(config: &Value) -> Vec<Diagnostic> {
    let is_set = |name: &str| config.get(name).is_some_and(|v| !v.is_null());
    match (is_set("id"), is_set("email")) {
        (false, false) => vec![Diagnostic::error("Missing Attribute")
            .with_detail("Either 'id' or 'email' must be specified")],
        (true, true) => vec![Diagnostic::error("Invalid Attribute Combination")
            .with_detail("Only one of 'id' or 'email' may be specified")
            .with_attribute("email")],
        _ => vec![],
    }
}

/// Reads a single n8n user.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserDataSource;

impl UserDataSource {
    /// Create the data source.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DataSource for UserDataSource {
    fn type_name(&self) -> &'static str {
        USER_DATA_SOURCE_TYPE
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("User data source for querying existing n8n cloud users")
            .with_attribute(
                "id",
                Attribute::optional_computed_string().with_description(
                    "The unique identifier of the user. Either id or email must be specified.",
                ),
            )
            .with_attribute(
                "email",
                Attribute::optional_computed_string().with_description(
                    "The email address of the user. Either id or email must be specified.",
                ),
            )
            .with_attribute(
                "role",
                Attribute::computed_string().with_description("The role of the user"),
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
                    .with_description("Whether the user has not yet set up their account"),
            )
            .with_attribute(
                "created_at",
                Attribute::computed_string()
                    .with_description("The timestamp when the user was created"),
            )
            .with_attribute(
                "updated_at",
                Attribute::computed_string()
                    .with_description("The timestamp when the user was last updated"),
            )
            .with_attribute(
                "invite_accept_url",
                Attribute::computed_string()
                    .with_description("The URL for the user to accept their invitation"),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&self.schema(), config);
        diagnostics.extend(lookup_diagnostics(config));
        diagnostics
    }

    async fn read(&self, api: &dyn UsersApi, config: Value) -> Result<Value, ProviderError> {
        diagnostics_to_result(lookup_diagnostics(&config))?;

        let lookup = match (optional_string(&config, "id"), optional_string(&config, "email")) {
            (Some(id), _) => Lookup::Id(id),
            (None, Some(email)) => Lookup::Email(email),
            (None, None) => {
                return Err(ProviderError::Validation(
                    "attribute 'id' or 'email' is not known yet".to_string(),
                ))
            },
        };

        debug!(lookup = ?lookup, "Reading n8n cloud user");

        let user = match api.get_user(lookup.identifier()).await {
            Ok(user) => user,
            Err(ApiError::NotFound { .. }) => return Err(lookup.not_found()),
            Err(e) if e.status() == Some(404) => return Err(lookup.not_found()),
            Err(e) => return Err(ProviderError::from_api("Unable to read user", e)),
        };

        Ok(serde_json::to_value(UserDataSourceModel::from(user))?)
    }
}
