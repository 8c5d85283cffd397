//! User endpoints of the n8n API.

use async_trait::async_trait;
use reqwest::Method;

use super::models::{CreateUserRequest, Role, UpdateUserRoleRequest, User, UsersPage};
use super::{is_not_found, ApiError, N8nClient};

/// Operations on n8n user accounts.
///
/// The provider only talks to users through this trait so tests can swap
/// the HTTP client for an in-memory implementation.
#[async_trait]
pub trait UsersApi: Send + Sync {
    /// List users on the instance. Only the first page is returned.
    async fn list_users(&self) -> Result<Vec<User>, ApiError>;

    /// Fetch a single user by id or email address.
    ///
    /// Returns [`ApiError::NotFound`] carrying `identifier` on a 404.
    async fn get_user(&self, identifier: &str) -> Result<User, ApiError>;

    /// Invite a new user.
    async fn create_user(&self, request: &CreateUserRequest) -> Result<User, ApiError>;

    /// Change the global role of a user. The response body is ignored.
    async fn update_user_role(&self, id: &str, role: &Role) -> Result<(), ApiError>;

    /// Delete a user.
    async fn delete_user(&self, id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl UsersApi for N8nClient {
    async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        let page: UsersPage = self.request_page(&["users"]).await?;
        if let Some(cursor) = page.next_cursor.as_deref() {
            tracing::debug!(
                cursor,
                returned = page.data.len(),
                "More users available; only the first page is returned"
            );
        }
        Ok(page.data)
    }

    async fn get_user(&self, identifier: &str) -> Result<User, ApiError> {
        self.request::<User, ()>(Method::GET, &["users", identifier], None)
            .await
            .map_err(|err| {
                if is_not_found(&err) {
                    ApiError::NotFound {
                        identifier: identifier.to_string(),
                    }
                } else {
                    err
                }
            })
    }

    async fn create_user(&self, request: &CreateUserRequest) -> Result<User, ApiError> {
        self.request(Method::POST, &["users"], Some(request)).await
    }

    async fn update_user_role(&self, id: &str, role: &Role) -> Result<(), ApiError> {
        let body = UpdateUserRoleRequest {
            new_role_name: role.clone(),
        };
        self.execute(Method::PATCH, &["users", id, "role"], Some(&body))
            .await
    }

    async fn delete_user(&self, id: &str) -> Result<(), ApiError> {
        self.execute::<()>(Method::DELETE, &["users", id], None)
            .await
    }
}
