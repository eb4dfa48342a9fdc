//! Coursewright API Library Crate
//!
//! This library contains the web service around the course wizard: the
//! configuration, the application state, the REST handlers and routing.
//! The `api` binary is a thin wrapper around it.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
