//! 钱包连接管理
//!
//! 按 sessionId 维护模拟钱包会话。同一会话的 connect / switch / disconnect
//! 通过 SessionLocks 串行执行；读取快照不需要加锁

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{
    config::SimulationConfig,
    domain::{
        errors::{ConnectionError, SigningError, ValidationError},
        wallet_session::{ConnectionStatus, Network, WalletSession, WalletType},
    },
    infrastructure::session_lock::SessionLocks,
    metrics,
    service::sim_runtime::Simulation,
};

/// 连接请求
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// 不传时生成新会话
    pub session_id: Option<String>,
    pub wallet_type: WalletType,
    pub network: Network,
    pub provider: String,
    /// 覆盖默认的模拟连接耗时
    pub timeout_ms: Option<u64>,
}

pub struct ConnectionManager {
    sim: Simulation,
    config: Arc<SimulationConfig>,
    sessions: RwLock<HashMap<String, WalletSession>>,
    locks: SessionLocks,
}

impl ConnectionManager {
    pub fn new(sim: Simulation, config: Arc<SimulationConfig>) -> Self {
        Self {
            sim,
            config,
            sessions: RwLock::new(HashMap::new()),
            locks: SessionLocks::new(),
        }
    }

    fn remove(&self, session_id: &str) -> Option<WalletSession> {
        self.sessions
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .remove(session_id)
    }

    fn store(&self, session: &WalletSession) {
        self.sessions
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(session.session_id.clone(), session.clone());
    }

    /// 会话快照
    pub fn get_session(&self, session_id: &str) -> Option<WalletSession> {
        self.sessions
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(session_id)
            .cloned()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// 模拟连接钱包
    ///
    /// 已连接的会话直接返回现有快照，地址保持不变
    pub async fn connect(&self, req: ConnectRequest) -> Result<WalletSession, ConnectionError> {
        let session_id = req
            .session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let _guard = self.locks.acquire(&session_id).await;

        let mut session = match self.get_session(&session_id) {
            Some(existing) if existing.is_connected() => {
                tracing::debug!(session_id = %session_id, "Wallet session already connected");
                return Ok(existing);
            }
            Some(mut existing) => {
                existing.wallet_type = req.wallet_type;
                existing.network = req.network;
                existing.provider = req.provider.clone();
                existing
            }
            None if self.session_count() >= self.config.max_sessions => {
                metrics::record_simulation("connect", "rejected");
                tracing::warn!(limit = self.config.max_sessions, "Wallet session limit reached");
                return Err(ConnectionError::TooManySessions(self.config.max_sessions));
            }
            None => WalletSession::new(
                session_id.clone(),
                req.wallet_type,
                req.network,
                req.provider.clone(),
            ),
        };

        session.transition(ConnectionStatus::Connecting);
        self.store(&session);

        tracing::info!(
            session_id = %session_id,
            wallet_type = session.wallet_type.as_str(),
            network = %session.network,
            provider = %session.provider,
            "Connecting wallet"
        );

        let wait_ms = req.timeout_ms.unwrap_or(self.config.connect_timeout_ms);
        // 失败的会话不保留，客户端可用同一 sessionId 重新连接
        if self.sim.delay(wait_ms).await.is_err() {
            self.remove(&session_id);
            metrics::record_simulation("connect", "cancelled");
            return Err(ConnectionError::Cancelled);
        }

        if self.sim.fails(self.config.connect_failure_rate) {
            session.transition(ConnectionStatus::Error);
            self.remove(&session_id);
            metrics::record_simulation("connect", "failed");
            tracing::warn!(session_id = %session_id, provider = %session.provider, "Wallet connection rejected");
            return Err(ConnectionError::rejected(format!(
                "Failed to connect to {} wallet",
                session.provider
            )));
        }

        let address = self.sim.random_hex(20);
        session.mark_connected(address, self.sim.now());
        self.store(&session);
        metrics::record_simulation("connect", "ok");

        tracing::info!(
            session_id = %session_id,
            address = ?session.address,
            "✅ Wallet connected"
        );
        Ok(session)
    }

    /// 断开连接，总是成功（未知会话同样视为成功）
    pub async fn disconnect(&self, session_id: &str) {
        let _guard = self.locks.acquire(session_id).await;

        // 关闭过程中同样直接移除会话
        let _ = self.sim.delay(self.config.disconnect_delay_ms).await;

        let removed = self.remove(session_id);
        metrics::record_simulation("disconnect", "ok");
        tracing::info!(
            session_id = %session_id,
            known = removed.is_some(),
            "Wallet disconnected"
        );
    }

    /// 切换网络；成功后更新网络和模拟余额，地址不变
    pub async fn switch_network(
        &self,
        session_id: &str,
        network: Network,
    ) -> Result<WalletSession, ConnectionError> {
        let _guard = self.locks.acquire(session_id).await;

        let mut session = self
            .get_session(session_id)
            .filter(|s| s.is_connected())
            .ok_or_else(|| ConnectionError::NotConnected(session_id.to_string()))?;

        if self
            .sim
            .delay(self.config.switch_network_delay_ms)
            .await
            .is_err()
        {
            metrics::record_simulation("switch_network", "cancelled");
            return Err(ConnectionError::Cancelled);
        }

        if self.sim.fails(self.config.switch_network_failure_rate) {
            metrics::record_simulation("switch_network", "failed");
            return Err(ConnectionError::rejected("Failed to switch network"));
        }

        let from = session.network;
        session.network = network;
        session.balance = Some(network.mock_balance().to_string());
        self.store(&session);
        metrics::record_simulation("switch_network", "ok");

        tracing::info!(session_id = %session_id, from = %from, to = %network, "Network switched");
        Ok(session)
    }

    /// 模拟消息签名，返回 65 字节签名（0x + 130 hex）
    pub async fn sign_message(&self, session_id: &str, message: &str) -> Result<String, SigningError> {
        if message.is_empty() {
            return Err(ValidationError::new("Message to sign must not be empty").into());
        }

        let connected = self
            .get_session(session_id)
            .map(|s| s.is_connected())
            .unwrap_or(false);
        if !connected {
            return Err(SigningError::NotConnected(session_id.to_string()));
        }

        if self.sim.delay(self.config.sign_delay_ms).await.is_err() {
            metrics::record_simulation("sign", "cancelled");
            return Err(SigningError::Cancelled);
        }

        if self.sim.fails(self.config.sign_failure_rate) {
            metrics::record_simulation("sign", "failed");
            tracing::info!(session_id = %session_id, "Signature request rejected");
            return Err(SigningError::UserRejected);
        }

        metrics::record_simulation("sign", "ok");
        Ok(self.sim.random_hex(65))
    }
}
