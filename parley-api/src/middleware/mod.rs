/// Middleware for the admin namespace
///
/// - `audit`: records every admin mutation through the `audit` tracing target
/// - `rate_limit`: per-operator in-process token bucket

pub mod audit;
pub mod rate_limit;
