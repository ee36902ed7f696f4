//! 模拟交易生命周期
//!
//! submitted → pending → completed | failed。
//! 默认情况下首次观察到的终态被持久保存，之后的轮询直接返回该终态；
//! `simulation.resample_status = true` 时每次轮询重新抽样

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{
    config::SimulationConfig,
    domain::{
        errors::{StatusError, SubmissionError},
        transaction_status::{SimulatedTransaction, TransactionStatus, TxKind},
    },
    metrics,
    service::sim_runtime::Simulation,
    utils::{address_validator::AddressValidator, amount::parse_positive_amount},
};

/// 提交参数
#[derive(Debug, Clone, Default)]
pub struct SubmitParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub token: Option<String>,
    pub amount: String,
}

pub struct TransactionSimulator {
    sim: Simulation,
    config: Arc<SimulationConfig>,
    transactions: RwLock<HashMap<String, SimulatedTransaction>>,
}

impl TransactionSimulator {
    pub fn new(sim: Simulation, config: Arc<SimulationConfig>) -> Self {
        Self {
            sim,
            config,
            transactions: RwLock::new(HashMap::new()),
        }
    }

    fn profile(&self, kind: TxKind) -> (u64, f64) {
        match kind {
            TxKind::Swap => (self.config.swap_delay_ms, self.config.swap_failure_rate),
            TxKind::Transfer => (
                self.config.transfer_delay_ms,
                self.config.transfer_failure_rate,
            ),
        }
    }

    /// 提交模拟交易，成功返回 0x + 64 hex 哈希
    pub async fn submit(
        &self,
        kind: TxKind,
        params: &SubmitParams,
    ) -> Result<String, SubmissionError> {
        let amount = parse_positive_amount("amount", &params.amount)?;

        let (delay_ms, failure_rate) = self.profile(kind);
        if self.sim.delay(delay_ms).await.is_err() {
            metrics::record_simulation(kind.as_str(), "cancelled");
            return Err(SubmissionError::Cancelled);
        }

        if self.sim.fails(failure_rate) {
            metrics::record_simulation(kind.as_str(), "failed");
            tracing::warn!(kind = kind.as_str(), amount = %amount, "Simulated transaction rejected");
            return Err(SubmissionError::Rejected(match kind {
                TxKind::Swap => "Swap transaction failed".to_string(),
                TxKind::Transfer => "Transfer transaction failed".to_string(),
            }));
        }

        let hash = self.sim.random_hex(32);
        let tx = SimulatedTransaction::submitted(hash.clone(), Some(kind), self.sim.now());
        self.transactions
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .insert(hash.clone(), tx);
        metrics::record_simulation(kind.as_str(), "ok");

        tracing::info!(
            kind = kind.as_str(),
            tx_hash = %hash,
            amount = %amount,
            from = ?params.from,
            to = ?params.to,
            "✅ Simulated transaction submitted"
        );
        Ok(hash)
    }

    fn sample_status(&self) -> TransactionStatus {
        let roll = self.sim.roll();
        if roll < self.config.status_completed_threshold {
            TransactionStatus::Completed
        } else if roll < self.config.status_pending_threshold {
            TransactionStatus::Pending
        } else {
            TransactionStatus::Failed
        }
    }

    /// 查询交易状态
    ///
    /// 未知但格式正确的哈希从首次查询开始跟踪（kind 为空）
    pub async fn get_status(&self, tx_hash: &str) -> Result<SimulatedTransaction, StatusError> {
        AddressValidator::validate_tx_hash(tx_hash)?;
        let key = tx_hash.to_lowercase();

        if self.sim.delay(self.config.status_delay_ms).await.is_err() {
            return Err(StatusError::Cancelled);
        }
        metrics::inc_status_poll();

        let now = self.sim.now();
        let mut transactions = self.transactions.write().unwrap_or_else(|p| p.into_inner());
        if !transactions.contains_key(&key) {
            evict_oldest_unknown(&mut transactions, self.config.max_tracked_unknown);
        }
        let tx = transactions
            .entry(key.clone())
            .or_insert_with(|| SimulatedTransaction::submitted(key.clone(), None, now));

        // 回执已确定的终态在任何模式下都不再改变
        if tx.status.is_final() {
            return Ok(tx.clone());
        }

        if self.config.resample_status {
            // 兼容旧行为：每次轮询都是新的模拟结果，不写回
            let mut fresh = tx.clone();
            fresh.status = self.sample_status();
            fresh.updated_at = now;
            return Ok(fresh);
        }

        let sampled = self.sample_status();
        if tx.advance(sampled, now) && sampled.is_final() {
            tracing::info!(tx_hash = %key, status = %sampled, "Transaction resolved");
        }
        Ok(tx.clone())
    }

    /// 按回执结果直接落定终态，之后的轮询返回同一状态
    ///
    /// 已处于终态的交易保持不变，返回 false
    pub fn settle(&self, tx_hash: &str, status: TransactionStatus) -> bool {
        let now = self.sim.now();
        let mut transactions = self.transactions.write().unwrap_or_else(|p| p.into_inner());
        let Some(tx) = transactions.get_mut(&tx_hash.to_lowercase()) else {
            return false;
        };
        let settled = status.is_final() && tx.advance(status, now);
        if settled {
            tracing::debug!(tx_hash = %tx.hash, status = %status, "Transaction settled by receipt");
        }
        settled
    }

    /// 已记录的交易
    pub fn get(&self, tx_hash: &str) -> Option<SimulatedTransaction> {
        self.transactions
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&tx_hash.to_lowercase())
            .cloned()
    }
}

/// 为新的未知哈希腾出位置：未知哈希数达到上限时淘汰最早出现的
///
/// 通过 submit 产生的交易不受影响
fn evict_oldest_unknown(transactions: &mut HashMap<String, SimulatedTransaction>, limit: usize) {
    let unknown = transactions.values().filter(|tx| tx.kind.is_none()).count();
    if unknown < limit.max(1) {
        return;
    }
    let mut oldest: Vec<(chrono::DateTime<chrono::Utc>, String)> = transactions
        .values()
        .filter(|tx| tx.kind.is_none())
        .map(|tx| (tx.created_at, tx.hash.clone()))
        .collect();
    oldest.sort();
    for (_, hash) in oldest.into_iter().take(unknown + 1 - limit.max(1)) {
        transactions.remove(&hash);
    }
}
