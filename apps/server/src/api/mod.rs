mod health;
mod optimization;

use std::{sync::Arc, time::Duration};

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    auth::{self, AuthStatusResponse, LoginRequest, LoginResponse},
    config::Config,
    main_lib::AppState,
    models::{Allocation, OptimizeRequest, OptimizeResponse, PortfolioRisk},
};

/// Headroom so the optimizer's own deadline answers before the HTTP layer.
const HTTP_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthz,
        health::readyz,
        auth::auth_status,
        auth::login,
        optimization::optimize_portfolio
    ),
    components(schemas(
        OptimizeRequest,
        OptimizeResponse,
        Allocation,
        PortfolioRisk,
        LoginRequest,
        LoginResponse,
        AuthStatusResponse
    )),
    modifiers(&BearerSecurity),
    tags((name = "quantfolio"))
)]
pub struct ApiDoc;

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any).allow_headers(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(origin) => Some(origin),
                Err(e) => {
                    tracing::warn!("Ignoring invalid CORS origin {}: {}", o, e);
                    None
                }
            })
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(origins).allow_headers(Any)
    };

    let openapi = ApiDoc::openapi();

    let protected = optimization::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::require_jwt,
    ));

    let api = Router::new()
        .merge(health::router())
        .route("/auth/status", get(auth::auth_status))
        .route("/auth/login", post(auth::login))
        .route("/openapi.json", get(move || async move { Json(openapi) }))
        .merge(protected);

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::new(config.request_timeout + HTTP_TIMEOUT_GRACE))
        .layer(TraceLayer::new_for_http())
}
