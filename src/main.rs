//! SwapDesk 主入口

use std::sync::Arc;

use anyhow::{Context, Result};
use swapdesk::{
    api,
    app_state::AppState,
    config::Config,
    infrastructure::{logging::init_logging, shutdown::ShutdownController},
    server,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载环境变量
    dotenvy::dotenv().ok();

    // 2. 加载配置（CONFIG_PATH 指定的 TOML 文件优先，缺省读取环境变量）
    let config_path = std::env::var("CONFIG_PATH").ok();
    let config = Config::from_env_and_file(config_path.as_deref())
        .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    // 3. 初始化日志
    init_logging(&config.logging)?;
    tracing::info!(config_path = ?config_path, "🚀 Starting SwapDesk");

    // 4. 关闭信号
    let (controller, shutdown) = ShutdownController::new();
    server::spawn_os_signal_handler(controller);

    // 5. 应用状态与路由
    let config = Arc::new(config);
    let state = Arc::new(AppState::from_config(config.clone(), shutdown.clone()).await?);
    let app = api::routes(state);

    // 6. 启动服务器
    let listener =
        server::bind_with_retry(&config.server.bind_addr, config.server.port_retry_attempts)
            .await?;
    tracing::info!("📖 OpenAPI: http://{}/openapi.json", listener.local_addr()?);

    server::serve(listener, app, shutdown).await
}
