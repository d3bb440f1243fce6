//! HTTP API handlers for spm-portal

pub mod auth;
pub mod coordinator;
pub mod faculty;
pub mod health;
pub mod hod;
pub mod principal;
pub mod proposals;
pub mod reviews;
pub mod student;
pub mod teams;

pub use auth::session_middleware;
pub use health::health_routes;
