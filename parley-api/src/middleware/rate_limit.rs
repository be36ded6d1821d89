/// Per-operator rate limiting for the admin namespace
///
/// Token bucket rate limiting with in-process state, keyed by operator ID.
/// The directory is a single-writer admin surface, so the budget lives in
/// a process-local map rather than an external store.
///
/// # Algorithm
///
/// - Tokens refill at a constant rate up to the bucket capacity
/// - Each request consumes 1 token
/// - A request with no token available is rejected with 429
///
/// # Headers
///
/// Successful responses carry:
/// - `X-RateLimit-Limit`: requests allowed per minute
/// - `X-RateLimit-Remaining`: tokens remaining
///
/// 429 responses additionally carry `Retry-After`.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Extension, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use parley_shared::auth::guards::AdminActor;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use uuid::Uuid;

/// Rate limit configuration
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    /// Maximum requests per minute
    pub requests_per_minute: u32,

    /// Token refill rate (tokens per second)
    pub refill_rate: f64,

    /// Maximum tokens in bucket (burst capacity)
    pub bucket_capacity: u32,
}

impl RateLimit {
    /// Builds a limit from a per-minute request budget
    pub fn per_minute(requests_per_minute: u32) -> Self {
        RateLimit {
            requests_per_minute,
            refill_rate: f64::from(requests_per_minute) / 60.0,
            bucket_capacity: requests_per_minute,
        }
    }
}

/// Token bucket state for one operator
#[derive(Debug, Clone)]
struct TokenBucket {
    /// Current number of tokens
    tokens: f64,

    /// Last refill instant
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a new full bucket
    fn new(capacity: u32) -> Self {
        TokenBucket {
            tokens: f64::from(capacity),
            last_refill: Instant::now(),
        }
    }

    /// Refills tokens based on elapsed time
    fn refill(&mut self, rate: f64, capacity: u32) {
        let now = Instant::now();
        let elapsed_secs = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed_secs * rate).min(f64::from(capacity));
        self.last_refill = now;
    }

    /// Attempts to consume N tokens
    fn try_consume(&mut self, count: f64) -> bool {
        if self.tokens >= count {
            self.tokens -= count;
            true
        } else {
            false
        }
    }

    /// Calculates seconds until N tokens are available
    fn seconds_until_available(&self, count: f64, rate: f64) -> u64 {
        let deficit = count - self.tokens;
        if deficit <= 0.0 {
            0
        } else {
            (deficit / rate).ceil() as u64
        }
    }
}

/// Result of a rate limit check
#[derive(Debug)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub ok: bool,

    /// Tokens remaining
    pub remaining: u32,

    /// Seconds until a token becomes available (429 responses only)
    pub reset_after: u64,
}

/// In-process token bucket registry keyed by operator ID
#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    buckets: Mutex<HashMap<Uuid, TokenBucket>>,
}

impl RateLimiter {
    /// Creates a limiter with a per-minute budget
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self {
            limit: RateLimit::per_minute(requests_per_minute),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// The configured limit
    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Checks and consumes one token for an operator
    pub fn check(&self, operator_id: Uuid) -> RateLimitResult {
        let mut buckets = self.buckets.lock().unwrap_or_else(|poisoned| {
            // A panic while holding the lock leaves the map usable.
            poisoned.into_inner()
        });

        let bucket = buckets
            .entry(operator_id)
            .or_insert_with(|| TokenBucket::new(self.limit.bucket_capacity));

        bucket.refill(self.limit.refill_rate, self.limit.bucket_capacity);

        if bucket.try_consume(1.0) {
            RateLimitResult {
                ok: true,
                remaining: bucket.tokens.floor().max(0.0) as u32,
                reset_after: 0,
            }
        } else {
            RateLimitResult {
                ok: false,
                remaining: 0,
                reset_after: bucket.seconds_until_available(1.0, self.limit.refill_rate),
            }
        }
    }
}

/// Rate limiting middleware layer
///
/// Runs after the admin gate, so the resolved actor identifies whose
/// budget the request consumes.
///
/// # Errors
///
/// Returns 429 Too Many Requests when the operator's budget is exhausted
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    Extension(actor): Extension<AdminActor>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let result = state.rate_limiter.check(actor.user_id());

    if !result.ok {
        return Err(ApiError::RateLimitExceeded {
            retry_after: result.reset_after,
            message: format!(
                "Rate limit exceeded. Try again in {} seconds",
                result.reset_after
            ),
        });
    }

    let limit = state.rate_limiter.limit();
    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&limit.requests_per_minute.to_string()) {
        headers.insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&result.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", value);
    }

    Ok(response)
}
