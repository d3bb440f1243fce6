//! # SPM Common Library
//!
//! Shared code for the student project management portal:
//! - Database schema and row models
//! - Review lifecycle rules (freeze state, edit window, mark versions)
//! - Team formation rules
//! - Password hashing and session tokens
//! - Configuration loading

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod review;
pub mod team;
pub mod time;

pub use error::{Error, Result};
