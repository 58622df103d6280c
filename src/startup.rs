use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{handlers, middleware as mw, openapi::ApiDoc};

pub fn build_router(state: Arc<crate::AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    // Unauthenticated action-link surface: the token is the capability.
    let action_routes = Router::new().route(
        "/{token}",
        get(handlers::action_handler::describe_action)
            .post(handlers::action_handler::execute_action),
    );

    // Public self-service routes
    let public_api = Router::new()
        .route("/requests", post(handlers::requests_handler::submit_request))
        .route("/shifts/open", get(handlers::shifts_handler::get_open_shifts))
        .route(
            "/time-slots",
            get(handlers::references_handler::get_time_slots),
        );

    // Admin routes behind the shared-secret header
    let admin_api = Router::new()
        .route("/requests", get(handlers::requests_handler::get_requests))
        .route(
            "/requests/{id}/resolve",
            post(handlers::requests_handler::resolve_request),
        )
        .route("/shifts", get(handlers::shifts_handler::get_shifts_for_month))
        .route(
            "/shifts/{id}/assign",
            post(handlers::shifts_handler::assign_shift),
        )
        .route(
            "/shifts/{id}/release",
            post(handlers::shifts_handler::release_shift),
        )
        .route("/months/publish", post(handlers::shifts_handler::publish_month))
        .route("/audit", get(handlers::audit_handler::get_audit))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            mw::require_admin_key,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .nest("/action", action_routes)
        .nest("/api", public_api.merge(admin_api))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(middleware::from_fn(mw::metrics_middleware))
        .layer(middleware::from_fn(mw::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
