// API 路由汇总入口。
pub mod convert;
pub mod errors;

use crate::core::state::AppState;
use axum::Router;
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(convert::router(&state))
        .fallback(convert::fallback_not_found)
        .with_state(state)
}
