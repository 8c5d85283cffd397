//! Wire models for the n8n users API.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Deserializer, Serialize};

/// Role of a user on the instance.
///
/// Only [`Role::Admin`] and [`Role::Member`] may be assigned. Reads can
/// return other global roles (the instance owner, for example) which are
/// carried verbatim in [`Role::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// `global:admin`
    Admin,
    /// `global:member`
    Member,
    /// Any other role reported by the server.
    Other(String),
}

impl Role {
    /// Wire values of the roles that can be assigned through the API.
    pub const ASSIGNABLE: [&'static str; 2] = ["global:admin", "global:member"];

    /// Wire value of this role.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "global:admin",
            Self::Member => "global:member",
            Self::Other(value) => value,
        }
    }

    /// Whether this role can be assigned through the API.
    pub fn is_assignable(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "global:admin" => Self::Admin,
            "global:member" => Self::Member,
            _ => Self::Other(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a role that cannot be assigned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Attribute role value must be one of: [\"global:admin\" \"global:member\"], got: {0:?}")]
pub struct InvalidRole(pub String);

impl FromStr for Role {
    type Err = InvalidRole;

    /// Strict parse: only assignable roles are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Role::from(s.to_string()) {
            Role::Other(value) => Err(InvalidRole(value)),
            role => Ok(role),
        }
    }
}

/// A user account as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Server-assigned identifier.
    pub id: String,
    /// Email address.
    pub email: String,
    /// First name, absent until the invitation is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Last name, absent until the invitation is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Whether the invitation is still outstanding.
    #[serde(default)]
    pub is_pending: bool,
    /// Creation time.
    pub created_at: DateTime<FixedOffset>,
    /// Last modification time.
    pub updated_at: DateTime<FixedOffset>,
    /// Global role; some responses omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// One-time invitation link, only present in create responses.
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub invite_accept_url: Option<String>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()))
}

/// Format a timestamp for state: RFC 3339, second precision, `Z` for UTC.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Body of `POST /users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    /// Email address to invite.
    pub email: String,
    /// Role to assign.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Optional first name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Optional last name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl CreateUserRequest {
    /// Invite `email` with the given role.
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role: Some(role),
            first_name: None,
            last_name: None,
        }
    }
}

/// Body of `PATCH /users/{id}/role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRoleRequest {
    /// The role to switch to.
    pub new_role_name: Role,
}

/// Body of `GET /users`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersPage {
    /// Users on this page.
    #[serde(default)]
    pub data: Vec<User>,
    /// Cursor for the next page, if any.
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_wire_values() {
        assert_eq!(Role::from("global:admin".to_string()), Role::Admin);
        assert_eq!(Role::from("global:member".to_string()), Role::Member);
        assert_eq!(
            Role::from("global:owner".to_string()),
            Role::Other("global:owner".to_string())
        );
        assert_eq!(String::from(Role::Other("x".to_string())), "x");
        assert_eq!(Role::Admin.to_string(), "global:admin");
        assert!(Role::Member.is_assignable());
        assert!(!Role::Other("global:owner".to_string()).is_assignable());
    }

    #[test]
    fn test_role_strict_parse() {
        assert_eq!("global:member".parse::<Role>(), Ok(Role::Member));
        let err = "global:owner".parse::<Role>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Attribute role value must be one of: [\"global:admin\" \"global:member\"], got: \"global:owner\""
        );
    }

    #[test]
    fn test_user_deserialize_full() {
        let user: User = serde_json::from_value(json!({
            "id": "u-1",
            "email": "a@x.com",
            "firstName": "Ada",
            "lastName": "",
            "isPending": false,
            "createdAt": "2024-03-01T10:00:00.000Z",
            "updatedAt": "2024-03-02T11:30:15.123+02:00",
            "role": "global:owner",
            "inviteAcceptUrl": ""
        }))
        .unwrap();

        assert_eq!(user.first_name.as_deref(), Some("Ada"));
        assert_eq!(user.last_name.as_deref(), Some(""));
        assert_eq!(user.role, Some(Role::Other("global:owner".to_string())));
        assert_eq!(user.invite_accept_url, None);
        assert_eq!(format_timestamp(&user.created_at), "2024-03-01T10:00:00Z");
        assert_eq!(
            format_timestamp(&user.updated_at),
            "2024-03-02T11:30:15+02:00"
        );
    }

    #[test]
    fn test_user_deserialize_sparse() {
        let user: User = serde_json::from_value(json!({
            "id": "u-2",
            "email": "b@x.com",
            "isPending": true,
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-03-01T10:00:00Z",
            "inviteAcceptUrl": "https://acme.app.n8n.cloud/signup?inviterId=1"
        }))
        .unwrap();

        assert!(user.first_name.is_none());
        assert!(user.role.is_none());
        assert!(user.is_pending);
        assert!(user.invite_accept_url.is_some());
    }

    #[test]
    fn test_create_request_omits_absent_options() {
        let body = serde_json::to_value(CreateUserRequest::new("a@x.com", Role::Member)).unwrap();
        assert_eq!(body, json!({"email": "a@x.com", "role": "global:member"}));

        let body = serde_json::to_value(CreateUserRequest {
            email: "a@x.com".to_string(),
            role: None,
            first_name: Some("Ada".to_string()),
            last_name: None,
        })
        .unwrap();
        assert_eq!(body, json!({"email": "a@x.com", "firstName": "Ada"}));
    }

    #[test]
    fn test_update_role_body() {
        let body = serde_json::to_value(UpdateUserRoleRequest {
            new_role_name: Role::Admin,
        })
        .unwrap();
        assert_eq!(body, json!({"newRoleName": "global:admin"}));
    }

    #[test]
    fn test_users_page() {
        let page: UsersPage = serde_json::from_value(json!({
            "data": [],
            "nextCursor": null
        }))
        .unwrap();
        assert!(page.data.is_empty());
        assert!(page.next_cursor.is_none());
    }
}
