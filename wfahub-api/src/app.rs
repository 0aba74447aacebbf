/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use wfahub_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = wfahub_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{
        rate_limit::{auth_rate_limit_layer, RateLimit, RateLimiter},
        security::SecurityHeadersLayer,
    },
};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use wfahub_shared::auth::{
    authorization::require_admin,
    jwt,
    middleware::{extract_session_token, AuthContext, AuthError},
};
use wfahub_shared::models::user::User;
use wfahub_shared::pdf::PdfRenderer;

/// Largest request body accepted on campaign uploads (CSV text in JSON)
const CAMPAIGN_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// HTML to PDF renderer for campaign previews
    pub pdf: PdfRenderer,

    /// Per-client limiter for the public auth endpoints
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, config: Config) -> Self {
        let pdf = PdfRenderer::new(config.pdf.options());
        let rate_limiter =
            RateLimiter::new(RateLimit::per_minute(config.limits.auth_rate_limit_per_minute));

        Self {
            db,
            config: Arc::new(config),
            pdf,
            rate_limiter,
        }
    }

    /// Gets the key used to sign sessions and account-link tokens
    pub fn session_secret(&self) -> &str {
        &self.config.session.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                       # Health check (public)
/// └── /api/
///     ├── /auth/                    # Register, login, password flows (public, rate limited)
///     │   └── /me, /change-password # Session required
///     ├── /policies/:slug           # Public policy pages
///     ├── /templates, /executions, /credits, /preferences,
///     │   /customers, /smtp-configs, /campaigns, /analytics   # Session required
///     └── /admin/                   # Session + admin role
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. Security headers
/// 2. CORS (credentials allowed for the configured origins)
/// 3. Response compression
/// 4. Logging (tower-http TraceLayer)
/// 5. Session authentication / admin gate / rate limiting (per router)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Unauthenticated auth endpoints, throttled per client IP
    let public_auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/forgot-password", post(routes::auth::forgot_password))
        .route("/reset-password", post(routes::auth::reset_password))
        .route("/resend-verification", post(routes::auth::resend_verification))
        .layer(from_fn_with_state(state.clone(), auth_rate_limit_layer));

    let session_auth_routes = Router::new()
        .route("/me", get(routes::auth::me).put(routes::auth::update_me))
        .route("/change-password", post(routes::auth::change_password))
        .layer(from_fn_with_state(state.clone(), session_auth_layer));

    let auth_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/verify-email", post(routes::auth::verify_email))
        .merge(public_auth_routes)
        .merge(session_auth_routes);

    let campaign_routes = Router::new()
        .route(
            "/",
            get(routes::campaigns::list_campaigns).post(routes::campaigns::create_campaign),
        )
        .route("/preview", post(routes::campaigns::preview_campaign))
        .route("/preview/pdf", post(routes::campaigns::preview_campaign_pdf))
        .route(
            "/:id",
            get(routes::campaigns::get_campaign).delete(routes::campaigns::delete_campaign),
        )
        .route("/:id/schedule", post(routes::campaigns::schedule_campaign))
        .route("/:id/cancel", post(routes::campaigns::cancel_campaign))
        .route("/:id/recipients", get(routes::campaigns::list_recipients))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(CAMPAIGN_BODY_LIMIT));

    // Signed-in users
    let user_routes = Router::new()
        .route("/templates", get(routes::templates::list_templates))
        .route("/templates/:id", get(routes::templates::get_template))
        .route("/templates/:id/execute", post(routes::executions::execute_template))
        .route("/executions", get(routes::executions::list_executions))
        .route("/executions/:id", get(routes::executions::get_execution))
        .route("/credits/transactions", get(routes::credits::list_transactions))
        .route(
            "/preferences",
            get(routes::preferences::get_preferences).put(routes::preferences::update_preferences),
        )
        .route(
            "/customers",
            get(routes::customers::list_customers).post(routes::customers::create_customer),
        )
        .route(
            "/customers/:id",
            get(routes::customers::get_customer)
                .put(routes::customers::update_customer)
                .delete(routes::customers::delete_customer),
        )
        .route(
            "/smtp-configs",
            get(routes::smtp::list_smtp_configs).post(routes::smtp::create_smtp_config),
        )
        .route(
            "/smtp-configs/:id",
            put(routes::smtp::update_smtp_config).delete(routes::smtp::delete_smtp_config),
        )
        .nest("/campaigns", campaign_routes)
        .route("/analytics/summary", get(routes::analytics::user_summary))
        .layer(from_fn_with_state(state.clone(), session_auth_layer));

    // Admin console: session first, then the role check
    let admin_routes = Router::new()
        .route("/users", get(routes::admin::users::list_users))
        .route(
            "/users/:id",
            get(routes::admin::users::get_user).delete(routes::admin::users::delete_user),
        )
        .route("/users/:id/credits", put(routes::admin::users::adjust_credits))
        .route("/users/:id/role", put(routes::admin::users::change_role))
        .route(
            "/templates",
            get(routes::admin::templates::list_templates)
                .post(routes::admin::templates::create_template),
        )
        .route(
            "/templates/:id",
            put(routes::admin::templates::update_template)
                .delete(routes::admin::templates::delete_template),
        )
        .route(
            "/smtp-configs",
            get(routes::admin::smtp::list_system_configs)
                .post(routes::admin::smtp::create_system_config),
        )
        .route(
            "/smtp-configs/:id",
            put(routes::admin::smtp::update_system_config)
                .delete(routes::admin::smtp::delete_system_config),
        )
        .route("/smtp-configs/:id/default", post(routes::admin::smtp::set_default))
        .route(
            "/settings",
            get(routes::admin::settings::get_settings).put(routes::admin::settings::update_settings),
        )
        .route("/policies/:slug", put(routes::admin::settings::upsert_policy))
        .route("/executions", get(routes::admin::list_executions))
        .route("/analytics", get(routes::admin::analytics))
        .layer(from_fn(require_admin_layer))
        .layer(from_fn_with_state(state.clone(), session_auth_layer));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .route("/policies/:slug", get(routes::policies::get_policy))
        .nest("/admin", admin_routes)
        .merge(user_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS (cookies can't cross origins here)
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

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Session authentication middleware layer
///
/// Reads the session cookie (or bearer header), validates the token and
/// reloads the user, then injects [`AuthContext`] and the [`User`] row into
/// request extensions. Reloading makes role changes and account deletion
/// take effect on the next request.
pub async fn session_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(req.headers(), &state.config.session.cookie_name)
        .ok_or(AuthError::MissingCredentials)?;

    let claims = jwt::validate_session_token(&token, state.session_secret()).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        AuthError::InvalidToken("Session is invalid or has expired".to_string())
    })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AuthError::InvalidToken("Account no longer exists".to_string()))?;

    req.extensions_mut().insert(AuthContext::from_user(&user));
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Admin gate; must run inside [`session_auth_layer`]
pub async fn require_admin_layer(req: Request, next: Next) -> Result<Response, ApiError> {
    let auth = req
        .extensions()
        .get::<AuthContext>()
        .ok_or(AuthError::MissingCredentials)?;

    if let Err(e) = require_admin(auth) {
        tracing::warn!(user_id = %auth.user_id, path = %req.uri().path(), "Admin route refused");
        return Err(e.into());
    }

    Ok(next.run(req).await)
}
