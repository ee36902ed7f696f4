//! SwapDesk - 模拟加密货币兑换服务后端
//!
//! 钱包连接、报价、交易提交与状态轮询均为进程内模拟；配置 RPC 后兑换与转账走真实链

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod metrics;
pub mod repository;
pub mod server;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode};

pub mod prelude {
    pub use crate::{
        app_state::AppState,
        config::Config,
        domain::{Network, SwapQuote, TransactionStatus, WalletSession},
        error::{AppError, AppErrorCode},
    };
}
