//! Backend for a web art gallery: albums and their arts with cursor-paged
//! listings, ownership-checked mutations, signed media links and deferred
//! cleanup of dependent records.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod services;
pub mod state;
