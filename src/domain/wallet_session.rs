//! 钱包会话领域模型
//! 会话只由 ConnectionManager 创建和修改

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::errors::ValidationError;

/// 钱包类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    Hot,
    Cold,
}

impl WalletType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Cold => "cold",
        }
    }
}

impl FromStr for WalletType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hot" => Ok(Self::Hot),
            "cold" => Ok(Self::Cold),
            other => Err(ValidationError::new(format!(
                "Unsupported wallet type: {}",
                other
            ))),
        }
    }
}

/// 网络（主网 / 测试网）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::Mainnet, Network::Testnet];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        }
    }

    /// 模拟余额：测试网发放测试币，主网给一个小额余额
    pub fn mock_balance(&self) -> &'static str {
        match self {
            Self::Testnet => "1000.0",
            Self::Mainnet => "0.5",
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::Testnet
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Self::Mainnet),
            "testnet" | "test" => Ok(Self::Testnet),
            other => Err(ValidationError::new(format!("Unsupported network: {}", other))),
        }
    }
}

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    /// 连接状态机
    ///
    /// Disconnected → Connecting → Connected | Error，Error 可以重新发起连接
    pub fn can_transition_to(&self, target: &Self) -> bool {
        use ConnectionStatus::*;

        matches!(
            (self, target),
            (Disconnected, Connecting)
                | (Error, Connecting)
                | (Connecting, Connected)
                | (Connecting, Error)
                | (Connected, Disconnected)
                | (Error, Disconnected)
                | (Connecting, Disconnected)
        )
    }
}

/// 钱包会话
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletSession {
    pub session_id: String,
    pub wallet_type: WalletType,
    pub network: Network,
    pub provider: String,
    pub status: ConnectionStatus,
    /// 连接成功后才有地址，之后不可变
    pub address: Option<String>,
    pub balance: Option<String>,
    pub connected_at: Option<DateTime<Utc>>,
}

impl WalletSession {
    pub fn new(
        session_id: String,
        wallet_type: WalletType,
        network: Network,
        provider: String,
    ) -> Self {
        Self {
            session_id,
            wallet_type,
            network,
            provider,
            status: ConnectionStatus::Disconnected,
            address: None,
            balance: None,
            connected_at: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// 推进状态；非法转换直接忽略并返回 false
    pub fn transition(&mut self, target: ConnectionStatus) -> bool {
        if !self.status.can_transition_to(&target) {
            tracing::warn!(
                session_id = %self.session_id,
                from = ?self.status,
                to = ?target,
                "Rejected illegal wallet session transition"
            );
            return false;
        }
        self.status = target;
        true
    }

    /// 标记连接成功。已有地址时保持原地址不变
    pub fn mark_connected(&mut self, address: String, now: DateTime<Utc>) -> bool {
        if !self.transition(ConnectionStatus::Connected) {
            return false;
        }
        if self.address.is_none() {
            self.address = Some(address);
        }
        self.balance = Some(self.network.mock_balance().to_string());
        self.connected_at = Some(now);
        true
    }
}
