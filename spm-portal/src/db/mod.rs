//! Database access layer for the portal
//!
//! One module per aggregate. Functions take the pool and return
//! `spm_common::Result`; operations touching several rows run in a
//! transaction.

pub mod evaluations;
pub mod invitations;
pub mod org;
pub mod proposals;
pub mod reviews;
pub mod rubrics;
pub mod sessions;
pub mod teams;
pub mod users;

pub use spm_common::db::init_database;
