/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `users`: Scoped directory listing and the mutation command family
/// - `organization`: Organization membership endpoints

pub mod health;
pub mod organization;
pub mod users;
