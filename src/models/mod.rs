//! Core data models for the gallery service.
//!
//! These entities represent albums, the arts inside them, user profiles,
//! stored media and the deferred-removal feed. They map cleanly to database
//! tables via `sqlx::FromRow` and serialize as the API's camelCase JSON via
//! `serde`.

pub mod album;
pub mod art;
pub mod event;
pub mod media;
pub mod user;
