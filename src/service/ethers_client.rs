//! 真实链客户端（ethers）
//!
//! 估算 gas 后加 20% 缓冲提交，等待 1 个确认；回执 status 为 0 视为失败。
//! gas 估算和提交都有独立超时，并按配置做指数退避重试。
//! 交易只签名一次，重试重发同一笔已签名交易（同一 nonce、同一哈希）

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::{
    contract::{abigen, ContractCall, ContractError},
    core::types::{
        transaction::eip2718::TypedTransaction, Address, BlockNumber, Bytes, TransactionReceipt,
        H256, U256,
    },
    middleware::SignerMiddleware,
    providers::{Http, Middleware, PendingTransaction, Provider},
    signers::{LocalWallet, Signer},
    utils::parse_units,
};

use crate::{
    config::BlockchainConfig,
    domain::errors::EvmError,
    service::{
        evm_client::{validate_amount, EvmClient, Receipt},
        transaction_retry::{RetryConfig, TransactionRetrier},
    },
};

abigen!(
    ISwapRouter,
    r#"[
        function swapExactTokensForTokens(uint amountIn, uint amountOutMin, address[] calldata path, address to, uint deadline) external returns (uint[] memory amounts)
        function getAmountsOut(uint amountIn, address[] calldata path) external view returns (uint[] memory amounts)
    ]"#,
);

abigen!(
    IERC20,
    r#"[
        function transfer(address to, uint256 amount) external returns (bool)
        function approve(address spender, uint256 amount) external returns (bool)
        function decimals() external view returns (uint8)
    ]"#,
);

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// 交易截止时间（秒）
const SWAP_DEADLINE_SECS: i64 = 20 * 60;

fn chain_err<M: Middleware>(e: ContractError<M>) -> EvmError {
    EvmError::Chain(e.to_string())
}

/// 重发已广播过的交易时节点返回的错误，说明首次发送已被接收
fn is_already_broadcast(message: &str) -> bool {
    let message = message.to_lowercase();
    ["already known", "known transaction", "already imported", "nonce too low"]
        .iter()
        .any(|m| message.contains(m))
}

/// 按滑点（百分比）计算最少到账数量，滑点精确到 0.01%
fn min_amount_out(expected: U256, slippage_percent: f64) -> U256 {
    let bps = if slippage_percent.is_finite() {
        (slippage_percent * 100.0).round().clamp(0.0, 10_000.0) as u64
    } else {
        0
    };
    expected * U256::from(10_000 - bps) / U256::from(10_000u64)
}

/// 签名并返回原始交易和哈希
async fn sign_raw(signer: &LocalWallet, tx: &TypedTransaction) -> Result<(Bytes, H256), EvmError> {
    let signature = signer
        .sign_transaction(tx)
        .await
        .map_err(|e| EvmError::Chain(e.to_string()))?;
    Ok((tx.rlp_signed(&signature), tx.hash(&signature)))
}

fn parse_address(field: &str, raw: &str) -> Result<Address, EvmError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|_| EvmError::InvalidAddress(format!("{}: {}", field, raw)))
}

pub struct EthersEvmClient {
    client: Arc<SignerClient>,
    router: Address,
    retrier: TransactionRetrier,
    gas_buffer_percent: u64,
    confirmation_timeout: Duration,
}

impl EthersEvmClient {
    pub async fn connect(config: &BlockchainConfig) -> Result<Self> {
        let rpc_url = config.rpc_url.as_deref().context("RPC_URL is not configured")?;
        let private_key = config
            .bridge_private_key
            .as_deref()
            .context("BRIDGE_PRIVATE_KEY is not configured")?;
        let router = config
            .router_address
            .as_deref()
            .context("SWAP_ROUTER_ADDRESS is not configured")?
            .parse::<Address>()
            .context("SWAP_ROUTER_ADDRESS is not a valid address")?;

        let provider = Provider::<Http>::try_from(rpc_url)
            .with_context(|| format!("Invalid RPC URL: {}", rpc_url))?;
        let wallet = private_key
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .context("Invalid BRIDGE_PRIVATE_KEY")?
            .with_chain_id(config.chain_id);

        tracing::info!(
            chain_id = config.chain_id,
            signer = ?wallet.address(),
            router = ?router,
            "✅ Ethers bridge client configured"
        );

        let retry_config = RetryConfig::from(config);
        Ok(Self {
            client: Arc::new(SignerMiddleware::new(provider, wallet)),
            router,
            confirmation_timeout: retry_config.attempt_timeout * 4,
            retrier: TransactionRetrier::new(retry_config),
            gas_buffer_percent: config.gas_buffer_percent,
        })
    }

    fn apply_gas_buffer(&self, gas: U256) -> U256 {
        gas * U256::from(100 + self.gas_buffer_percent) / U256::from(100)
    }

    async fn token_units(&self, token: Address, amount: &str) -> Result<U256, EvmError> {
        validate_amount(amount)?;
        let erc20 = IERC20::new(token, self.client.clone());
        let decimals = self
            .retrier
            .run("decimals", || {
                let call = erc20.decimals();
                async move { call.call().await.map_err(chain_err) }
            })
            .await?;

        parse_units(amount.trim(), decimals as u32)
            .map(U256::from)
            .map_err(|e| EvmError::InvalidAmount(e.to_string()))
    }

    /// 估算 gas（带缓冲）→ 提交 → 等待确认
    async fn send_buffered<D>(
        &self,
        operation: &str,
        call: ContractCall<SignerClient, D>,
    ) -> Result<Receipt, EvmError>
    where
        D: ethers::abi::Detokenize + Send + Sync,
    {
        let estimated = self
            .retrier
            .run("estimate_gas", || {
                let call = &call;
                async move { call.estimate_gas().await.map_err(chain_err) }
            })
            .await?;
        let gas = self.apply_gas_buffer(estimated);

        // nonce 和费用只填充一次，之后重试不会产生第二笔交易
        let mut tx = call.tx.clone();
        tx.set_gas(gas);
        let filled = self
            .retrier
            .run("fill_transaction", || {
                let mut tx = tx.clone();
                let client = self.client.clone();
                async move {
                    client
                        .fill_transaction(&mut tx, Some(BlockNumber::Pending.into()))
                        .await
                        .map_err(|e| EvmError::Chain(e.to_string()))?;
                    Ok(tx)
                }
            })
            .await?;
        let (raw, tx_hash) = sign_raw(self.client.signer(), &filled).await?;

        self.retrier
            .run(operation, || {
                let raw = raw.clone();
                let provider = self.client.provider();
                async move {
                    match provider.send_raw_transaction(raw).await {
                        Ok(pending) => Ok(*pending),
                        Err(e) if is_already_broadcast(&e.to_string()) => {
                            tracing::debug!(tx_hash = ?tx_hash, "Transaction already broadcast");
                            Ok(tx_hash)
                        }
                        Err(e) => Err(EvmError::Chain(e.to_string())),
                    }
                }
            })
            .await?;

        tracing::info!(operation = %operation, tx_hash = ?tx_hash, gas = %gas, "Transaction broadcast");

        let pending = PendingTransaction::new(tx_hash, self.client.provider()).confirmations(1);
        let receipt = tokio::time::timeout(self.confirmation_timeout, pending)
            .await
            .map_err(|_| EvmError::Timeout(self.confirmation_timeout.as_secs()))?
            .map_err(|e| EvmError::Chain(e.to_string()))?
            .ok_or_else(|| EvmError::Chain(format!("Transaction {:?} was dropped", tx_hash)))?;

        to_receipt(receipt)
    }
}

fn to_receipt(receipt: TransactionReceipt) -> Result<Receipt, EvmError> {
    let status = receipt.status.map(|s| s.as_u64()).unwrap_or(0);
    if status == 0 {
        return Err(EvmError::Chain(format!(
            "Transaction {:?} reverted",
            receipt.transaction_hash
        )));
    }
    Ok(Receipt {
        hash: format!("{:?}", receipt.transaction_hash),
        status,
        gas_used: receipt.gas_used.unwrap_or_default().to_string(),
        block_number: receipt.block_number.map(|b| b.as_u64()).unwrap_or_default(),
    })
}

#[async_trait]
impl EvmClient for EthersEvmClient {
    async fn swap(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: &str,
        slippage_percent: f64,
    ) -> Result<Receipt, EvmError> {
        let token_in = parse_address("tokenIn", token_in)?;
        let token_out = parse_address("tokenOut", token_out)?;
        let amount = self.token_units(token_in, amount_in).await?;

        // 先授权路由合约
        let erc20 = IERC20::new(token_in, self.client.clone());
        self.send_buffered("approve", erc20.approve(self.router, amount))
            .await?;

        let router = ISwapRouter::new(self.router, self.client.clone());
        let path = vec![token_in, token_out];
        let amounts = self
            .retrier
            .run("get_amounts_out", || {
                let call = router.get_amounts_out(amount, path.clone());
                async move { call.call().await.map_err(chain_err) }
            })
            .await?;
        let expected = amounts.last().copied().unwrap_or_default();
        let amount_out_min = min_amount_out(expected, slippage_percent);

        let deadline = U256::from((chrono::Utc::now().timestamp() + SWAP_DEADLINE_SECS) as u64);
        let call = router.swap_exact_tokens_for_tokens(
            amount,
            amount_out_min,
            path,
            self.client.address(),
            deadline,
        );
        self.send_buffered("swap", call).await
    }

    async fn transfer(&self, token: &str, to: &str, amount: &str) -> Result<Receipt, EvmError> {
        let token = parse_address("tokenAddress", token)?;
        let to = parse_address("recipient", to)?;
        let amount = self.token_units(token, amount).await?;

        let erc20 = IERC20::new(token, self.client.clone());
        self.send_buffered("transfer", erc20.transfer(to, amount))
            .await
    }

    fn name(&self) -> &'static str {
        "ethers"
    }
}

#[cfg(test)]
mod tests {
    use ethers::core::types::U64;

    use super::*;

    fn receipt(status: u64) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: H256::repeat_byte(0xab),
            status: Some(U64::from(status)),
            gas_used: Some(U256::from(52_000u64)),
            block_number: Some(U64::from(123u64)),
            ..Default::default()
        }
    }

    #[test]
    fn test_receipt_status_zero_is_failure() {
        assert!(matches!(to_receipt(receipt(0)), Err(EvmError::Chain(_))));

        let ok = to_receipt(receipt(1)).unwrap();
        assert_eq!(ok.status, 1);
        assert_eq!(ok.gas_used, "52000");
        assert_eq!(ok.block_number, 123);
        assert_eq!(ok.hash, format!("0x{}", "ab".repeat(32)));
    }

    #[test]
    fn test_parse_address() {
        assert!(parse_address("to", "0x742d35cc6634c0532925a3b844bc9e7595f0beb6").is_ok());
        assert!(matches!(
            parse_address("to", "not-an-address"),
            Err(EvmError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_min_amount_out_applies_slippage() {
        let expected = U256::from(1_000_000u64);
        assert_eq!(min_amount_out(expected, 0.5), U256::from(995_000u64));
        assert_eq!(min_amount_out(expected, 5.0), U256::from(950_000u64));
        assert_eq!(min_amount_out(expected, 0.0), expected);
        assert_eq!(min_amount_out(expected, 250.0), U256::zero());
        assert_eq!(min_amount_out(expected, f64::NAN), expected);
    }

    #[test]
    fn test_rebroadcast_errors_are_recognized() {
        assert!(is_already_broadcast("(code: -32000, message: already known, data: None)"));
        assert!(is_already_broadcast("nonce too low"));
        assert!(is_already_broadcast("Known transaction: 0xabc"));
        assert!(!is_already_broadcast("insufficient funds for gas * price + value"));
    }

    #[tokio::test]
    async fn test_signed_once_resends_identical_transaction() {
        let wallet = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
            .parse::<LocalWallet>()
            .unwrap()
            .with_chain_id(11155111u64);
        let mut tx: TypedTransaction = ethers::core::types::TransactionRequest::new()
            .to(Address::repeat_byte(0x11))
            .value(1u64)
            .into();
        tx.set_nonce(7u64)
            .set_gas(21_000u64)
            .set_gas_price(1_000_000_000u64)
            .set_chain_id(11155111u64);

        let (raw_a, hash_a) = sign_raw(&wallet, &tx).await.unwrap();
        let (raw_b, hash_b) = sign_raw(&wallet, &tx).await.unwrap();
        // 同一 nonce 的重发是同一笔交易
        assert_eq!(raw_a, raw_b);
        assert_eq!(hash_a, hash_b);
        assert_eq!(hash_a, H256::from(ethers::utils::keccak256(&raw_a)));
    }

    #[tokio::test]
    async fn test_connect_requires_configuration() {
        let config = BlockchainConfig {
            rpc_url: None,
            ..BlockchainConfig::default()
        };
        assert!(EthersEvmClient::connect(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_gas_buffer() {
        let config = BlockchainConfig {
            rpc_url: Some("http://127.0.0.1:8545".into()),
            bridge_private_key: Some(
                "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318".into(),
            ),
            router_address: Some("0x7a250d5630b4cf539739df2c5dacb4c659f2488d".into()),
            ..BlockchainConfig::default()
        };
        let client = EthersEvmClient::connect(&config).await.unwrap();
        assert_eq!(client.apply_gas_buffer(U256::from(100_000u64)), U256::from(120_000u64));
    }
}
