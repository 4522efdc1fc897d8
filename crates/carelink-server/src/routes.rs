//! Router assembly.

use axum::{
    Json, Router,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/organizations",
            get(handlers::organizations::list).post(handlers::organizations::create),
        )
        .route(
            "/organizations/{id}",
            get(handlers::organizations::get_one)
                .patch(handlers::organizations::update)
                .delete(handlers::organizations::remove),
        )
        .route(
            "/clinics",
            get(handlers::clinics::list).post(handlers::clinics::create),
        )
        .route(
            "/clinics/{id}",
            get(handlers::clinics::get_one)
                .patch(handlers::clinics::update)
                .delete(handlers::clinics::remove),
        )
        .route(
            "/beneficiaries",
            get(handlers::beneficiaries::list).post(handlers::beneficiaries::create),
        )
        .route(
            "/beneficiaries/{id}",
            get(handlers::beneficiaries::get_one)
                .patch(handlers::beneficiaries::update)
                .delete(handlers::beneficiaries::remove),
        )
        .route(
            "/doctors",
            get(handlers::doctors::list).post(handlers::doctors::create),
        )
        .route(
            "/doctors/{id}",
            get(handlers::doctors::get_one)
                .patch(handlers::doctors::update)
                .delete(handlers::doctors::remove),
        )
        .route("/specialties", get(handlers::specialties::list))
        .route("/search", get(handlers::search::search))
        .route("/stats/admin-summary", get(handlers::stats::admin_summary))
        .route("/profile/me", get(handlers::profile::me))
        .route("/api/auth/sign-in", post(handlers::auth::sign_in))
        .route("/api/auth/sign-out", post(handlers::auth::sign_out))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
