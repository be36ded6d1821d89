//! # Parley Directory API Server
//!
//! The REST surface of the Parley user directory: role-dispatched admin
//! endpoints shared by global and organization-scoped administrators.
//!
//! ## Modules
//!
//! - `app`: Application state, router builder, and the admin gate
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Audit recording and rate limiting
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
