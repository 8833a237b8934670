use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};

use crate::{
    error::ApiResult,
    main_lib::AppState,
    models::{OptimizeRequest, OptimizeResponse},
};

#[utoipa::path(
    post,
    path = "/api/v1/portfolio/optimize",
    request_body = OptimizeRequest,
    responses(
        (status = 200, body = OptimizeResponse),
        (status = 400, description = "Invalid request values"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 422, description = "Malformed body or price history unavailable"),
        (status = 504, description = "Optimization deadline exceeded")
    ),
    security(("bearer" = []))
)]
pub async fn optimize_portfolio(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OptimizeRequest>, JsonRejection>,
) -> ApiResult<Json<OptimizeResponse>> {
    let Json(request) = payload?;
    tracing::info!(
        symbols = ?request.symbols,
        objective = ?request.objective,
        "Portfolio optimization requested"
    );
    let result = state
        .optimization_service
        .optimize(request.into())
        .await?;
    Ok(Json(OptimizeResponse::from(result)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/portfolio/optimize", post(optimize_portfolio))
}
