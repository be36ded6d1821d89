/// Database models for the Parley directory
///
/// This module contains the database models and their CRUD operations.
///
/// # Models
///
/// - `user`: Chat accounts, roles, and the credential-stripped projection
/// - `organization`: Tenants; every user references at most one
/// - `session`: Login sessions (revocation only; issuing is out of scope)

pub mod organization;
pub mod session;
pub mod user;
