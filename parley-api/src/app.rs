/// Application state and router builder
///
/// Defines the shared application state and builds the Axum router with
/// all routes and middleware. Every admin route sits behind `admin_gate`,
/// which authenticates the caller, re-reads the operator row, and resolves
/// the request's capability (global vs organization scope) exactly once;
/// handlers dispatch on the injected [`AdminActor`] and never re-inspect
/// the token.

use crate::{
    config::Config,
    error::ApiError,
    middleware::{audit, rate_limit::RateLimiter},
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post, put},
    Router,
};
use parley_shared::auth::guards::AdminActor;
use parley_shared::auth::jwt;
use parley_shared::models::user::{User, UserRole};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor. Uses Arc
/// internally for cheap cloning. Note there is no cached authorization
/// state here: handlers are stateless per request.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// In-process per-operator rate limiter
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, config: Config) -> Self {
        let rate_limiter = Arc::new(RateLimiter::per_minute(config.api.rate_limit_per_minute));
        Self {
            db,
            config: Arc::new(config),
            rate_limiter,
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                          # Liveness probe (public)
/// └── /api/admin/                      # Admin namespace (authenticated)
///     ├── GET    /users                # Scoped directory listing
///     ├── POST   /users                # Create user
///     ├── GET    /users/:id
///     ├── PUT    /users/:id            # Generic update
///     ├── DELETE /users/:id            # Delete + cascade
///     ├── PUT    /users/:id/password
///     ├── PUT    /users/:id/role
///     ├── PUT    /users/:id/status
///     ├── POST   /users/organization/add
///     └── POST   /users/organization/remove
/// ```
///
/// # Middleware Stack
///
/// Request order on admin routes: admin gate (authenticate + resolve
/// capability), audit recording, rate limiting, then the handler.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Admin routes (authenticated, capability-dispatched)
    let admin_routes = Router::new()
        .route(
            "/users",
            get(routes::users::list_users).post(routes::users::create_user),
        )
        .route(
            "/users/:id",
            get(routes::users::get_user)
                .put(routes::users::update_user)
                .delete(routes::users::delete_user),
        )
        .route("/users/:id/password", put(routes::users::reset_password))
        .route("/users/:id/role", put(routes::users::change_role))
        .route("/users/:id/status", put(routes::users::set_ban_status))
        .route(
            "/users/organization/add",
            post(routes::organization::add_member),
        )
        .route(
            "/users/organization/remove",
            post(routes::organization::remove_member),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::rate_limit::rate_limit_layer,
        ))
        .layer(axum::middleware::from_fn(audit::audit_layer))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            admin_gate,
        ));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.contains(&"*".to_string()) {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/api/admin", admin_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

/// Admin authentication and capability resolution middleware
///
/// Validates the bearer token, then re-reads the operator's row so every
/// request is guarded against current stored state — a stale token cannot
/// keep a capability the row no longer grants. On success an
/// [`AdminActor`] is injected into request extensions.
async fn admin_gate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::BadRequest("Expected Bearer token".to_string()))?;

    let claims = jwt::validate_token(token, state.jwt_secret())?;

    // No authorization decision is cached between requests.
    let operator = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown operator".to_string()))?;

    if operator.banned {
        return Err(ApiError::Forbidden("Account is banned".to_string()));
    }

    let actor = match operator.role {
        UserRole::Admin => AdminActor::Global {
            user_id: operator.id,
        },
        UserRole::OrgAdmin => {
            let organization_id = operator.organization_id.ok_or_else(|| {
                ApiError::Forbidden(
                    "Organization admin is not attached to an organization".to_string(),
                )
            })?;
            AdminActor::Organization {
                user_id: operator.id,
                organization_id,
            }
        }
        UserRole::User => {
            return Err(ApiError::Forbidden(
                "Administrator access required".to_string(),
            ))
        }
    };

    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}
