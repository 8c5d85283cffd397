//! Managed resource types.

pub mod user;

pub use user::{UserResource, UserResourceModel, USER_RESOURCE_TYPE};
