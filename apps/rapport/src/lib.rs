//! # Rapport
//!
//! The application layer around `rapport-core`: configuration, the HTTP
//! API and the CLI. This is the only async component, and the only place
//! the wall clock is read.

pub mod api;
pub mod cli;
pub mod config;
