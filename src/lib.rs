// Library exports for Yatube
// The binary and the integration tests both build on these modules

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod media;
pub mod pagination;
pub mod posts;
pub mod routes;
pub mod state;
