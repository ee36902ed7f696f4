//! SQLx Postgres 连接池初始化与健康检查
//!
//! 只在配置了 `database.url` 时使用，交易记录默认保存在内存中

use std::time::Duration;

use crate::config::DatabaseConfig;

pub type PgPool = sqlx::Pool<sqlx::Postgres>;

/// 初始化连接池
///
/// 连接建立后立即做一次健康检查，启动阶段就暴露配置错误
pub async fn init_pool(database_url: &str, config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let pool_opts = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        // 确保连接在使用前是有效的，避免使用已断开的连接
        .test_before_acquire(true);

    let pool = pool_opts.connect(database_url).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to connect to Postgres");
        e
    })?;

    health_check(&pool).await?;

    Ok(pool)
}

/// 健康检查
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
}
