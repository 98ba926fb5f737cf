use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

use crate::{
    AppState,
    middleware::{log_errors, rate_limit},
};

pub mod analysis;
pub mod health;
pub mod user;

// 创建主路由
pub fn create_router(state: AppState) -> Router {
    // 分析接口调用 LLM，读取请求体之前先做入站限流
    let analysis_routes = Router::new()
        .route("/analyzePredictions", post(analysis::analyze_predictions))
        .route_layer(axum::middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit,
        ));

    let api_routes = Router::new()
        .route("/fetchUserData", get(user::fetch_user_data))
        .route("/ping", get(health::ping))
        .merge(analysis_routes);

    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        Router::new().merge(api_routes)
    } else {
        Router::new().nest(base, api_routes)
    };

    router
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(log_errors)))
        .with_state(state)
}
