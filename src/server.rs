//! HTTP 服务启动：端口占用时顺延重试，收到关闭信号后优雅退出

use std::{io::ErrorKind, net::SocketAddr};

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;

use crate::infrastructure::shutdown::{wait_for_os_signal, ShutdownController, ShutdownSignal};

/// 绑定地址；端口被占用时依次尝试后续 `retry_attempts` 个端口
pub async fn bind_with_retry(bind_addr: &str, retry_attempts: u16) -> Result<TcpListener> {
    let addr: SocketAddr = bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address: {}", bind_addr))?;

    let mut candidate = addr;
    for attempt in 0..=retry_attempts {
        match TcpListener::bind(candidate).await {
            Ok(listener) => {
                if attempt > 0 {
                    tracing::warn!(requested = %addr, bound = %candidate, "Requested port busy, bound next free port");
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse && attempt < retry_attempts => {
                tracing::warn!(addr = %candidate, "Address in use, trying next port");
                let next_port = candidate
                    .port()
                    .checked_add(1)
                    .context("No higher port available")?;
                candidate.set_port(next_port);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to bind {}", candidate));
            }
        }
    }

    anyhow::bail!("Failed to bind {} after {} retries", addr, retry_attempts)
}

/// 运行服务直到 `shutdown` 触发
pub async fn serve(listener: TcpListener, app: Router, mut shutdown: ShutdownSignal) -> Result<()> {
    let local = listener.local_addr()?;
    tracing::info!("🎉 Server listening on http://{}", local);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
        .context("HTTP server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

/// 收到 Ctrl+C / SIGTERM 后触发关闭：取消进行中的模拟等待并停止接收新连接
pub fn spawn_os_signal_handler(controller: ShutdownController) {
    tokio::spawn(async move {
        wait_for_os_signal().await;
        controller.trigger();
    });
}
