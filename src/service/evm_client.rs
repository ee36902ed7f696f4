//! 链桥接客户端
//!
//! `EvmClient` 是 REST 层执行 swap / transfer 的唯一入口。
//! 默认实现 `SimulatedEvmClient` 委托给 TransactionSimulator；
//! 配置了 RPC 时使用 `EthersEvmClient` 走真实链

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    domain::{
        errors::EvmError,
        transaction_status::{TransactionStatus, TxKind},
    },
    service::{
        sim_runtime::Simulation,
        transaction_simulator::{SubmitParams, TransactionSimulator},
    },
    utils::{address_validator::AddressValidator, amount::parse_positive_amount},
};

/// 交易回执
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub hash: String,
    /// 1 成功，0 失败
    pub status: u64,
    pub gas_used: String,
    pub block_number: u64,
}

#[async_trait]
pub trait EvmClient: Send + Sync {
    /// `slippage_percent` 为可接受的最大滑点（百分比），用于计算最少到账数量
    async fn swap(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: &str,
        slippage_percent: f64,
    ) -> Result<Receipt, EvmError>;

    async fn transfer(&self, token: &str, to: &str, amount: &str) -> Result<Receipt, EvmError>;

    /// 用于日志和健康检查
    fn name(&self) -> &'static str;
}

/// 代币标识：合约地址或不超过 12 位的字母数字符号
pub(crate) fn validate_token(field: &str, token: &str) -> Result<(), EvmError> {
    let token = token.trim();
    if token.starts_with("0x") {
        return if AddressValidator::is_valid_evm_address(token) {
            Ok(())
        } else {
            Err(EvmError::InvalidAddress(format!("{}: {}", field, token)))
        };
    }
    if token.is_empty() || token.len() > 12 || !token.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(EvmError::InvalidAddress(format!("{}: {}", field, token)));
    }
    Ok(())
}

pub(crate) fn validate_amount(amount: &str) -> Result<(), EvmError> {
    parse_positive_amount("amount", amount)
        .map(|_| ())
        .map_err(|e| EvmError::InvalidAmount(e.message))
}

/// 模拟链客户端
pub struct SimulatedEvmClient {
    simulator: Arc<TransactionSimulator>,
    sim: Simulation,
}

impl SimulatedEvmClient {
    pub fn new(simulator: Arc<TransactionSimulator>, sim: Simulation) -> Self {
        Self { simulator, sim }
    }

    /// 成功回执对应的交易在模拟器中同步落定为 completed
    fn receipt(&self, hash: String) -> Receipt {
        self.simulator.settle(&hash, TransactionStatus::Completed);
        let gas_used = 21_000 + self.sim.uniform(180_000.0) as u64;
        let block_number = 18_000_000 + self.sim.uniform(1_000_000.0) as u64;
        Receipt {
            hash,
            status: 1,
            gas_used: gas_used.to_string(),
            block_number,
        }
    }
}

#[async_trait]
impl EvmClient for SimulatedEvmClient {
    async fn swap(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: &str,
        _slippage_percent: f64,
    ) -> Result<Receipt, EvmError> {
        validate_token("tokenIn", token_in)?;
        validate_token("tokenOut", token_out)?;
        validate_amount(amount_in)?;

        let params = SubmitParams {
            from: Some(token_in.to_string()),
            to: Some(token_out.to_string()),
            token: None,
            amount: amount_in.to_string(),
        };
        let hash = self.simulator.submit(TxKind::Swap, &params).await?;
        Ok(self.receipt(hash))
    }

    async fn transfer(&self, token: &str, to: &str, amount: &str) -> Result<Receipt, EvmError> {
        validate_token("tokenAddress", token)?;
        if !AddressValidator::is_valid_evm_address(to.trim()) {
            return Err(EvmError::InvalidAddress(format!("recipient: {}", to)));
        }
        validate_amount(amount)?;

        let params = SubmitParams {
            from: None,
            to: Some(to.to_string()),
            token: Some(token.to_string()),
            amount: amount.to_string(),
        };
        let hash = self.simulator.submit(TxKind::Transfer, &params).await?;
        Ok(self.receipt(hash))
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SimulationConfig,
        infrastructure::shutdown::ShutdownSignal,
        service::sim_runtime::DeterministicRuntime,
    };

    fn client(failure_rate: f64) -> SimulatedEvmClient {
        let sim = Simulation::new(
            Arc::new(DeterministicRuntime::new(21)),
            ShutdownSignal::never(),
        );
        let mut config = SimulationConfig::default();
        config.swap_failure_rate = failure_rate;
        config.transfer_failure_rate = failure_rate;
        let simulator = Arc::new(TransactionSimulator::new(sim.clone(), Arc::new(config)));
        SimulatedEvmClient::new(simulator, sim)
    }

    #[tokio::test]
    async fn test_simulated_swap_receipt() {
        let receipt = client(0.0).swap("ETH", "USDT", "1", 0.5).await.unwrap();
        assert_eq!(receipt.status, 1);
        assert_eq!(receipt.hash.len(), 66);
        assert!(receipt.block_number >= 18_000_000);
        let gas: u64 = receipt.gas_used.parse().unwrap();
        assert!((21_000..201_000).contains(&gas));
    }

    #[tokio::test]
    async fn test_successful_receipt_settles_simulator_status() {
        let runtime = Arc::new(DeterministicRuntime::new(22));
        let sim = Simulation::new(runtime.clone(), ShutdownSignal::never());
        let simulator = Arc::new(TransactionSimulator::new(
            sim.clone(),
            Arc::new(SimulationConfig::instant()),
        ));
        let client = SimulatedEvmClient::new(simulator.clone(), sim);

        let receipt = client.swap("ETH", "USDT", "1", 0.5).await.unwrap();
        assert_eq!(
            simulator.get(&receipt.hash).unwrap().status,
            TransactionStatus::Completed
        );

        runtime.push_rolls(&[0.99]);
        let polled = simulator.get_status(&receipt.hash).await.unwrap();
        assert_eq!(polled.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_simulated_transfer_validation() {
        let c = client(0.0);
        assert!(matches!(
            c.transfer("USDT", "0x1234", "1").await,
            Err(EvmError::InvalidAddress(_))
        ));
        assert!(matches!(
            c.transfer("USDT", "0x742d35cc6634c0532925a3b844bc9e7595f0beb6", "0")
                .await,
            Err(EvmError::InvalidAmount(_))
        ));
        assert!(matches!(
            c.swap("0xzz", "USDT", "1", 0.5).await,
            Err(EvmError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_simulated_failure_is_chain_error() {
        let err = client(1.0).swap("ETH", "USDT", "1", 0.5).await.unwrap_err();
        assert_eq!(err, EvmError::Chain("Swap transaction failed".into()));
    }
}
