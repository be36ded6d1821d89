/// Database utilities
///
/// - `pool`: connection pool creation and health checks
/// - `migrations`: embedded schema migrations

pub mod migrations;
pub mod pool;
