//! Data Transfer Objects for REST request/response serialization.

pub mod backup_dto;
pub mod common_dto;

pub use backup_dto::*;
pub use common_dto::*;
