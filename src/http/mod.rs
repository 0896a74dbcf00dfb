pub mod handlers;
pub mod middleware;
pub mod response;

use std::sync::Arc;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put};
use axum::Router;
use hourglass_rs::SafeTimeProvider;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::audit::AuditRecorder;
use crate::auth::{PasswordHasher, RoutePolicy, TokenService};
use crate::config::AppConfig;
use crate::errors::Result;
use crate::leave::LeaveEngine;
use crate::payroll::PayRunGenerator;
use crate::ratelimit::RateLimiter;
use crate::store::HrStore;

/// everything a request handler can reach
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn HrStore>,
    pub clock: Arc<SafeTimeProvider>,
    pub tokens: TokenService,
    pub passwords: PasswordHasher,
    pub audit: AuditRecorder,
    pub limiter: RateLimiter,
    pub policy: RoutePolicy,
    pub leaves: LeaveEngine,
    pub payruns: PayRunGenerator,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// wire the engines; must run inside the runtime (the audit worker
    /// spawns here)
    pub fn new(
        config: AppConfig,
        store: Arc<dyn HrStore>,
        clock: Arc<SafeTimeProvider>,
    ) -> Result<SharedState> {
        let tokens = TokenService::new(
            config.signing_key.clone(),
            config.access_ttl,
            config.refresh_ttl,
        )?;
        let passwords = PasswordHasher::new(config.password_hash_cost)?;
        let audit = AuditRecorder::spawn(store.clone(), config.audit_queue_capacity);
        let limiter = RateLimiter::new(config.rate_limits.clone());
        let leaves = LeaveEngine::new(store.clone(), clock.clone());
        let payruns =
            PayRunGenerator::new(store.clone(), config.statutory.clone(), clock.clone());

        Ok(Arc::new(AppState {
            config,
            store,
            clock,
            tokens,
            passwords,
            audit,
            limiter,
            policy: RoutePolicy::standard(),
            leaves,
            payruns,
        }))
    }
}

/// assemble the versioned API behind the request pipeline
///
/// request flow: cors/trace -> correlation -> rate limit -> deadline ->
/// authentication and authorization -> audit capture -> handler
pub fn build_router(state: SharedState) -> Router {
    use handlers::{
        advances, attendance, audit_logs, auth, designations, employees, health, leaves, loans,
        payruns,
    };

    let api = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route("/employees", get(employees::list).post(employees::create))
        .route(
            "/employees/:id",
            get(employees::get).put(employees::update).delete(employees::delete),
        )
        .route("/designations", get(designations::list).post(designations::create))
        .route(
            "/designations/:id",
            get(designations::get).put(designations::update).delete(designations::delete),
        )
        .route("/attendance", get(attendance::list).post(attendance::upsert))
        .route(
            "/attendance/:id",
            get(attendance::get).put(attendance::update).delete(attendance::delete),
        )
        .route("/advances", get(advances::list).post(advances::create))
        .route("/advances/:id", get(advances::get).put(advances::update).delete(advances::delete))
        .route("/loans", get(loans::list).post(loans::create))
        .route("/loans/:id", get(loans::get).put(loans::update).delete(loans::delete))
        .route("/loans/:id/cancel", put(loans::cancel))
        .route("/leaves", post(leaves::create))
        .route("/leaves/:id", get(leaves::get))
        .route("/leaves/employee/:eid", get(leaves::by_employee))
        .route("/leaves/:id/manager-approve", put(leaves::manager_approve))
        .route("/leaves/:id/admin-approve", put(leaves::admin_approve))
        .route("/leaves/:id/reject", put(leaves::reject))
        .route("/leaves/:id/cancel", put(leaves::cancel))
        .route("/payruns/generate", post(payruns::generate))
        .route("/payruns", get(payruns::list))
        .route("/payruns/:id", get(payruns::get))
        .route("/payruns/:id/export", get(payruns::export))
        .route("/admin/audit-logs", get(audit_logs::list));

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .layer(from_fn_with_state(state.clone(), middleware::audit_capture))
        .layer(from_fn_with_state(state.clone(), middleware::authorize))
        .layer(from_fn_with_state(state.clone(), middleware::deadline))
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit))
        .layer(from_fn(middleware::correlation))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
