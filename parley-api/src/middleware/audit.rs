/// Audit recording for admin mutations
///
/// Every state-changing admin request is recorded through a dedicated
/// `audit` tracing target: operator, scope, method, path, and response
/// status. Read requests pass through untouched. Downstream collection of
/// the audit stream is an external concern; this layer only emits it.

use axum::{
    extract::{Extension, Request},
    http::Method,
    middleware::Next,
    response::Response,
};
use parley_shared::auth::guards::AdminActor;
use std::time::Instant;

/// Audit middleware layer
///
/// Runs inside the admin gate, so the resolved actor is always present.
pub async fn audit_layer(
    Extension(actor): Extension<AdminActor>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    if is_mutation(&method) {
        tracing::info!(
            target: "audit",
            operator_id = %actor.user_id(),
            organization_id = ?actor.organization_id(),
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "admin mutation"
        );
    }

    response
}

/// Whether a method changes state
fn is_mutation(method: &Method) -> bool {
    *method == Method::POST
        || *method == Method::PUT
        || *method == Method::DELETE
        || *method == Method::PATCH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutating_methods() {
        assert!(is_mutation(&Method::POST));
        assert!(is_mutation(&Method::PUT));
        assert!(is_mutation(&Method::DELETE));
        assert!(!is_mutation(&Method::GET));
        assert!(!is_mutation(&Method::HEAD));
    }
}
