//! Read-only data source types.

pub mod user;

pub use user::{UserDataSource, UserDataSourceModel, USER_DATA_SOURCE_TYPE};
