use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::locks::RideLockRegistry;
use crate::middleware::{
    metrics_handler, metrics_middleware, rate_limit_middleware, require_user_auth,
    security_headers_middleware, trace_id, RateLimiterState,
};
use crate::routes::{health, payments, pools, profiles, rides};
use crate::services::email::EmailService;
use crate::services::payments::PaymentGateway;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub rate_limiter: Option<Arc<RateLimiterState>>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub email: EmailService,
    pub ride_locks: Arc<RideLockRegistry>,
    pub jwt_verifier: Arc<shared::jwt::JwtVerifier>,
}

pub fn create_app(config: Config, pool: PgPool, gateway: Arc<dyn PaymentGateway>) -> Router {
    let config = Arc::new(config);

    // Create rate limiter if rate limiting is enabled (rate_limit_per_minute > 0)
    let rate_limiter = if config.security.rate_limit_per_minute > 0 {
        Some(Arc::new(RateLimiterState::new(
            config.security.rate_limit_per_minute,
        )))
    } else {
        None
    };

    let jwt_verifier = Arc::new(shared::jwt::JwtVerifier::with_leeway(
        &config.jwt.secret,
        config.jwt.leeway_secs,
    ));
    let email = EmailService::new(config.email.clone());

    let state = AppState {
        pool,
        config: config.clone(),
        rate_limiter,
        gateway,
        email,
        ride_locks: Arc::new(RideLockRegistry::new()),
        jwt_verifier,
    };

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        // Production: only allow specified origins
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Protected routes (require a user JWT)
    // Middleware order: auth runs first, then rate limiting (which keys on the user)
    let protected_routes = Router::new()
        // Profile routes (v1)
        .route("/api/v1/me", get(profiles::get_me))
        .route("/api/v1/me", put(profiles::upsert_me))
        .route(
            "/api/v1/me/payout-account",
            put(profiles::set_payout_account),
        )
        // Ride routes (v1)
        .route("/api/v1/rides", post(rides::create_ride))
        .route("/api/v1/rides", get(rides::list_rides))
        .route("/api/v1/rides/:ride_id", get(rides::get_ride))
        .route("/api/v1/rides/:ride_id", patch(rides::update_ride))
        .route("/api/v1/rides/:ride_id", delete(rides::delete_ride))
        // Pool routes (v1)
        .route("/api/v1/rides/:ride_id/pool", post(pools::ensure_pool))
        .route(
            "/api/v1/rides/:ride_id/booking-status",
            get(pools::booking_status),
        )
        .route("/api/v1/rides/:ride_id/pool/seats", post(pools::lock_seat))
        .route(
            "/api/v1/rides/:ride_id/pool/checkout",
            post(pools::checkout_session),
        )
        .route("/api/v1/rides/:ride_id/pool/code", post(pools::issue_code))
        .route(
            "/api/v1/rides/:ride_id/pool/check-in",
            post(pools::check_in),
        )
        .route(
            "/api/v1/rides/:ride_id/pool/claim-booker",
            post(pools::claim_booker),
        )
        .route(
            "/api/v1/rides/:ride_id/pool/provider-link",
            get(pools::provider_link),
        )
        .route(
            "/api/v1/rides/:ride_id/pool/confirm-booked",
            post(pools::confirm_booked),
        )
        // Rate limiting runs after auth (needs the user ID from auth)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        // Auth runs first (outermost layer = runs first)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    // Webhook route: authenticated by its signature, not a user token
    let webhook_routes = Router::new().route("/api/v1/payments/webhook", post(payments::webhook));

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    // Merge all routes
    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(webhook_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(middleware::from_fn(security_headers_middleware)) // Security headers
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware)) // Prometheus metrics
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id)) // Request ID and logging
        .layer(cors)
        .with_state(state)
}
