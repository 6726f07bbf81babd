// 服务入口：加载配置、挂载转换路由与静态前端。
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{from_fn, Next};
use axum::response::Response;
use axum::Router;
use doc2md_server::config::{load_config, Config, CorsConfig};
use doc2md_server::shutdown::shutdown_signal;
use doc2md_server::state::AppState;
use doc2md_server::{build_router, error_response};
use futures::FutureExt;
use std::any::Any as StdAny;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const HOST_ENV: &str = "DOC2MD_HOST";
const PORT_ENV: &str = "DOC2MD_PORT";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config();
    init_tracing(&config);

    let cors = build_cors(&config.cors);
    let addr = bind_address(&config);
    let static_dir = config.static_dir.clone();
    let state = Arc::new(AppState::new(config));

    let app = build_router(state);
    let app = match static_dir.as_deref() {
        Some(dir) => mount_static(app, dir),
        None => app,
    };
    let app = app
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(panic_guard));

    let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
    info!("doc2md 服务已启动: http://{addr}");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(err) = server.await {
        warn!("服务退出异常: {err}");
    }
    Ok(())
}

fn init_tracing(config: &Config) {
    let default_level = config.observability.log_level.trim();
    let default_level = if default_level.is_empty() {
        "info".to_string()
    } else {
        default_level.to_lowercase()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn bind_address(config: &Config) -> String {
    // 环境变量优先，便于容器化部署。
    let host = std::env::var(HOST_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.server.host.clone());
    let port = std::env::var(PORT_ENV)
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
        .unwrap_or(config.server.port);
    format!("{host}:{port}")
}

fn mount_static(app: Router, dir: &str) -> Router {
    let path = PathBuf::from(dir.trim());
    if dir.trim().is_empty() || !path.is_dir() {
        return app;
    }
    info!("挂载静态目录: {}", path.display());
    app.fallback_service(ServeDir::new(path).append_index_html_on_directories(true))
}

/// 配置为空或包含 `*` 时放开全部。
fn wildcard_or_list<T: std::str::FromStr>(values: Option<&Vec<String>>) -> Option<Vec<T>> {
    let values = values?;
    if values.iter().any(|value| value.trim() == "*") {
        return None;
    }
    let parsed = values
        .iter()
        .filter_map(|value| value.trim().parse().ok())
        .collect::<Vec<T>>();
    if parsed.is_empty() {
        None
    } else {
        Some(parsed)
    }
}

fn build_cors(config: &CorsConfig) -> CorsLayer {
    // 携带凭证时不允许通配，改为回显请求值。
    let credentials = config.allow_credentials.unwrap_or(false);
    let mut cors = CorsLayer::new();
    cors = match wildcard_or_list::<HeaderValue>(config.allow_origins.as_ref()) {
        Some(origins) => cors.allow_origin(AllowOrigin::list(origins)),
        None if credentials => cors.allow_origin(AllowOrigin::mirror_request()),
        None => cors.allow_origin(Any),
    };
    cors = match wildcard_or_list::<Method>(config.allow_methods.as_ref()) {
        Some(methods) => cors.allow_methods(AllowMethods::list(methods)),
        None if credentials => cors.allow_methods(AllowMethods::mirror_request()),
        None => cors.allow_methods(Any),
    };
    cors = match wildcard_or_list::<HeaderName>(config.allow_headers.as_ref()) {
        Some(headers) => cors.allow_headers(AllowHeaders::list(headers)),
        None if credentials => cors.allow_headers(AllowHeaders::mirror_request()),
        None => cors.allow_headers(Any),
    };
    cors.allow_credentials(credentials)
}

async fn panic_guard(request: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let result = AssertUnwindSafe(next.run(request)).catch_unwind().await;
    match result {
        Ok(response) => Ok(response),
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            error!("panic while handling {method} {path}: {detail}");
            Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ))
        }
    }
}

fn panic_message(panic: &(dyn StdAny + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return message.to_string();
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}
