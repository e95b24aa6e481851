//! Bulk campaign send scheduler: plans a grouped-serial distribution of
//! (sender, recipient) sends across days, then runs it against a pluggable
//! [`core::SendBackend`] under a single scheduler lock.

pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod store;
