//! Service layer: domain operations over SQLite, disk-backed media storage,
//! link signing and identity-provider integration.

pub mod auth_service;
pub mod gallery_service;
pub mod media_service;
pub mod presign;
