use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use request_gate::{
    AppState, build_router,
    config::{Config, LogFormat},
    middleware::spawn_sweeper,
};
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(format: &LogFormat) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() {
    // 加载配置；失败时用默认格式初始化日志再退出
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&LogFormat::Pretty);
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // 初始化日志
    init_tracing(&config.log_format);

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    // 设置应用状态
    let state = AppState::new(config);

    // 定期清理过期的限流记录
    let sweep_interval = state.config.rate_limit_sweep_interval();
    let sweepers = [
        spawn_sweeper(Arc::clone(&state.rate_limiter), sweep_interval, "general"),
        spawn_sweeper(
            Arc::clone(&state.log_ingest_limiter),
            sweep_interval,
            "log-ingest",
        ),
    ];

    let router = build_router(state.clone());

    // 根据编译模式决定是否添加CORS
    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Server listening on {}", addr);

    let served = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    for sweeper in sweepers {
        sweeper.abort();
    }

    if let Err(e) = served {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
