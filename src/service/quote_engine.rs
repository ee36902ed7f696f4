//! 兑换报价引擎
//!
//! 汇率来自静态汇率表，缺失的交易对回落为 [0, 100) 随机汇率。
//! 报价固定使用 0.5% 滑点，与执行阶段用户可选滑点相互独立

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use rust_decimal::Decimal;

use crate::{
    config::{SimulationConfig, MAX_QUOTE_TTL_SECS},
    domain::{
        errors::{QuoteError, ValidationError},
        rate_table,
        swap_quote::{estimated_gas, SwapQuote},
        wallet_session::Network,
    },
    metrics,
    service::sim_runtime::Simulation,
    utils::amount::{decimal_from_f64, format_amount, parse_positive_amount, round_amount},
};

/// 报价的确定性部分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteFigures {
    pub to_amount: Decimal,
    pub fee: Decimal,
    pub min_received: Decimal,
}

/// 计算 toAmount / fee / minReceived，均四舍五入到 6 位小数
///
/// minReceived 基于已舍入的 toAmount 计算。结果超出 Decimal 范围时返回校验错误
pub fn compute_figures(
    amount: Decimal,
    rate: Decimal,
    fee_rate: Decimal,
    slippage: Decimal,
) -> Result<QuoteFigures, ValidationError> {
    let too_large = || ValidationError::new("Invalid amount: amount too large");
    let to_amount = round_amount(amount.checked_mul(rate).ok_or_else(too_large)?);
    let fee = round_amount(amount.checked_mul(fee_rate).ok_or_else(too_large)?);
    let min_received = round_amount(
        to_amount
            .checked_mul(Decimal::ONE - slippage)
            .ok_or_else(too_large)?,
    );
    Ok(QuoteFigures {
        to_amount,
        fee,
        min_received,
    })
}

pub struct QuoteEngine {
    sim: Simulation,
    config: Arc<SimulationConfig>,
    fee_rate: Decimal,
    slippage: Decimal,
    issued: RwLock<HashMap<String, SwapQuote>>,
}

impl QuoteEngine {
    pub fn new(sim: Simulation, config: Arc<SimulationConfig>) -> Self {
        let fee_rate = decimal_from_f64(config.swap_fee_rate).unwrap_or_else(|| Decimal::new(3, 3));
        let slippage =
            decimal_from_f64(config.quote_slippage).unwrap_or_else(|| Decimal::new(5, 3));
        Self {
            sim,
            config,
            fee_rate,
            slippage,
            issued: RwLock::new(HashMap::new()),
        }
    }

    /// 计算兑换报价
    ///
    /// `from_token == to_token` 不在这里拦截，由调用方决定
    pub async fn get_quote(
        &self,
        from_token: &str,
        to_token: &str,
        amount: &str,
        network: Network,
    ) -> Result<SwapQuote, QuoteError> {
        if from_token.trim().is_empty() || to_token.trim().is_empty() {
            return Err(ValidationError::new("fromToken and toToken are required").into());
        }
        let amount = parse_positive_amount("amount", amount)?;

        if self.sim.delay(self.config.quote_delay_ms).await.is_err() {
            metrics::record_simulation("quote", "cancelled");
            return Err(QuoteError::Cancelled);
        }

        if self.sim.fails(self.config.quote_failure_rate) {
            metrics::record_simulation("quote", "failed");
            tracing::warn!(from = %from_token, to = %to_token, "Quote simulation failed");
            return Err(QuoteError::Unavailable);
        }

        let (rate, rate_is_fallback) = match rate_table::lookup(from_token, to_token, network) {
            Some(rate) => (rate, false),
            None => {
                let random = decimal_from_f64(self.sim.uniform(100.0)).unwrap_or(Decimal::ZERO);
                tracing::debug!(
                    from = %from_token,
                    to = %to_token,
                    network = %network,
                    "Pair missing from rate table, using random rate"
                );
                (round_amount(random), true)
            }
        };

        let figures = compute_figures(amount, rate, self.fee_rate, self.slippage)?;
        let price_impact = self.sim.uniform(0.5);

        let now = self.sim.now();
        let ttl_secs = self.config.quote_ttl_secs.min(MAX_QUOTE_TTL_SECS);
        let ttl = chrono::Duration::seconds(ttl_secs as i64);
        let quote = SwapQuote {
            quote_id: uuid::Uuid::new_v4().to_string(),
            from_token: from_token.to_string(),
            to_token: to_token.to_string(),
            from_amount: format_amount(amount),
            to_amount: format_amount(figures.to_amount),
            exchange_rate: rate.normalize().to_string(),
            fee: format_amount(figures.fee),
            estimated_gas: estimated_gas(network).to_string(),
            min_received: format_amount(figures.min_received),
            price_impact: format!("{:.2}%", price_impact),
            slippage: format!("{}%", (self.slippage * Decimal::ONE_HUNDRED).normalize()),
            network,
            rate_is_fallback,
            created_at: now,
            expires_at: now + ttl,
        };

        self.remember(&quote);
        metrics::record_simulation("quote", "ok");
        metrics::inc_quote_issued(rate_is_fallback);

        tracing::info!(
            quote_id = %quote.quote_id,
            from = %quote.from_token,
            to = %quote.to_token,
            amount = %quote.from_amount,
            to_amount = %quote.to_amount,
            "Quote issued"
        );
        Ok(quote)
    }

    fn remember(&self, quote: &SwapQuote) {
        let now = self.sim.now();
        let mut issued = self.issued.write().unwrap_or_else(|p| p.into_inner());
        // 顺带清理过期报价
        issued.retain(|_, q| !q.is_expired(now));
        issued.insert(quote.quote_id.clone(), quote.clone());
    }

    /// 返回未过期的报价
    pub fn ensure_fresh(&self, quote_id: &str) -> Result<SwapQuote, QuoteError> {
        let now = self.sim.now();
        let mut issued = self.issued.write().unwrap_or_else(|p| p.into_inner());
        match issued.get(quote_id) {
            None => Err(QuoteError::NotFound(quote_id.to_string())),
            Some(q) if q.is_expired(now) => {
                issued.remove(quote_id);
                Err(QuoteError::Expired(quote_id.to_string()))
            }
            Some(q) => Ok(q.clone()),
        }
    }

    pub fn issued_count(&self) -> usize {
        self.issued.read().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use std::{str::FromStr, time::Duration};

    use super::*;
    use crate::{
        infrastructure::shutdown::ShutdownSignal, service::sim_runtime::DeterministicRuntime,
    };

    fn engine(runtime: Arc<DeterministicRuntime>) -> QuoteEngine {
        let mut config = SimulationConfig::default();
        config.quote_failure_rate = 0.0;
        QuoteEngine::new(
            Simulation::new(runtime, ShutdownSignal::never()),
            Arc::new(config),
        )
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_compute_figures() {
        let f = compute_figures(dec("2"), dec("15.5"), dec("0.003"), dec("0.005")).unwrap();
        assert_eq!(format_amount(f.to_amount), "31.000000");
        assert_eq!(format_amount(f.fee), "0.006000");
        assert_eq!(format_amount(f.min_received), "30.845000");
    }

    #[tokio::test]
    async fn test_eth_usdt_quote() {
        let engine = engine(Arc::new(DeterministicRuntime::new(1)));
        let q = engine
            .get_quote("ETH", "USDT", "1", Network::Mainnet)
            .await
            .unwrap();
        assert_eq!(q.exchange_rate, "3950");
        assert_eq!(q.to_amount, "3950.000000");
        assert_eq!(q.fee, "0.003000");
        assert_eq!(q.min_received, "3930.250000");
        assert_eq!(q.estimated_gas, "0.0045 ETH");
        assert!(!q.rate_is_fallback);
    }

    #[tokio::test]
    async fn test_repeated_quotes_are_stable_and_impact_bounded() {
        let engine = engine(Arc::new(DeterministicRuntime::new(2)));
        let a = engine
            .get_quote("tBTC", "tETH", "2", Network::Testnet)
            .await
            .unwrap();
        let b = engine
            .get_quote("tBTC", "tETH", "2", Network::Testnet)
            .await
            .unwrap();
        assert_eq!(a.to_amount, b.to_amount);
        assert_eq!(a.fee, b.fee);
        assert_eq!(a.min_received, b.min_received);
        assert_eq!(a.to_amount, "31.000000");
        assert_eq!(a.estimated_gas, "0.0012 ETH");

        for q in [&a, &b] {
            let impact: f64 = q.price_impact.trim_end_matches('%').parse().unwrap();
            assert!((0.0..=0.5).contains(&impact));
        }
    }

    #[tokio::test]
    async fn test_missing_pair_uses_bounded_random_rate() {
        let runtime = Arc::new(DeterministicRuntime::new(3));
        // failure roll, rate roll, impact roll
        runtime.push_rolls(&[0.5, 0.25, 0.5]);
        let engine = engine(runtime);
        let q = engine
            .get_quote("ABC", "XYZ", "1", Network::Mainnet)
            .await
            .unwrap();
        assert!(q.rate_is_fallback);
        assert_eq!(q.exchange_rate, "25");
        assert_eq!(q.price_impact, "0.25%");
    }

    #[tokio::test]
    async fn test_invalid_amount_rejected() {
        let engine = engine(Arc::new(DeterministicRuntime::new(4)));
        for amount in ["0", "abc", "-1", ""] {
            let err = engine
                .get_quote("ETH", "USDT", amount, Network::Mainnet)
                .await
                .unwrap_err();
            assert!(matches!(err, QuoteError::Validation(_)), "amount {amount}");
        }
    }

    #[test]
    fn test_compute_figures_overflow_is_validation_error() {
        let err = compute_figures(dec("1e26"), dec("3950"), dec("0.003"), dec("0.005")).unwrap_err();
        assert!(err.message.contains("too large"));
    }

    #[tokio::test]
    async fn test_huge_amount_rejected_without_panic() {
        let engine = engine(Arc::new(DeterministicRuntime::new(4)));
        let err = engine
            .get_quote("ETH", "USDT", "1e26", Network::Mainnet)
            .await
            .unwrap_err();
        assert!(matches!(err, QuoteError::Validation(_)));
        assert_eq!(engine.issued_count(), 0);
    }

    #[tokio::test]
    async fn test_ttl_is_capped() {
        let runtime = Arc::new(DeterministicRuntime::new(6));
        let mut config = SimulationConfig::default();
        config.quote_failure_rate = 0.0;
        config.quote_ttl_secs = u64::MAX;
        let engine = QuoteEngine::new(
            Simulation::new(runtime, ShutdownSignal::never()),
            Arc::new(config),
        );
        let q = engine
            .get_quote("ETH", "USDT", "1", Network::Mainnet)
            .await
            .unwrap();
        assert_eq!(
            (q.expires_at - q.created_at).num_seconds(),
            MAX_QUOTE_TTL_SECS as i64
        );
    }

    #[tokio::test]
    async fn test_simulated_failure() {
        let runtime = Arc::new(DeterministicRuntime::new(5));
        runtime.push_rolls(&[0.01]);
        let engine = QuoteEngine::new(
            Simulation::new(runtime, ShutdownSignal::never()),
            Arc::new(SimulationConfig::default()),
        );
        let err = engine
            .get_quote("ETH", "USDT", "1", Network::Mainnet)
            .await
            .unwrap_err();
        assert_eq!(err, QuoteError::Unavailable);
        assert_eq!(err.to_string(), "Failed to get swap quote");
    }

    #[tokio::test]
    async fn test_quote_expiry() {
        let runtime = Arc::new(DeterministicRuntime::new(6));
        let engine = engine(runtime.clone());
        let q = engine
            .get_quote("ETH", "USDC", "1", Network::Mainnet)
            .await
            .unwrap();

        assert!(engine.ensure_fresh(&q.quote_id).is_ok());
        assert!(matches!(
            engine.ensure_fresh("missing"),
            Err(QuoteError::NotFound(_))
        ));

        runtime.advance(Duration::from_secs(31));
        assert!(matches!(
            engine.ensure_fresh(&q.quote_id),
            Err(QuoteError::Expired(_))
        ));
        assert_eq!(engine.issued_count(), 0);
    }
}
