// Library exports for linkfolio
// The binary and the integration tests both build on these modules.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod plans;
pub mod routes;
pub mod slug;
pub mod state;
pub mod storage;
pub mod user_agent;
pub mod validation;
