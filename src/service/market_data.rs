//! 行情与余额展示数据
//!
//! 价格来自静态美元参考价，涨跌幅和成交量是模拟值。
//! 所有余额统一为 `{currency, amount, value_usd}`

use rust_decimal::Decimal;
use serde::Serialize;
use sha3::{Digest, Keccak256};
use utoipa::ToSchema;

use crate::{
    domain::{errors::ValidationError, rate_table},
    service::sim_runtime::Simulation,
    utils::{
        address_validator::AddressValidator,
        amount::{decimal_from_f64, format_amount, format_usd},
    },
};

/// 行情展示的交易对（均以 USDT 计价）
const MARKET_BASES: &[&str] = &["ETH", "BTC", "USDC", "DAI"];

/// 演示钱包持仓
const DEMO_HOLDINGS: &[(&str, &str)] = &[
    ("ETH", "1.5"),
    ("BTC", "0.05"),
    ("USDT", "2500"),
    ("USDC", "1000"),
];

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExchangeStats {
    pub volume: String,
    pub liquidity: String,
    pub pairs: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MarketTicker {
    pub symbol: String,
    pub price: String,
    /// 24h 涨跌幅，例如 "+1.25%"
    pub change: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MarketOverview {
    pub markets: Vec<MarketTicker>,
}

/// 统一余额记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TokenBalance {
    pub currency: String,
    pub amount: String,
    pub value_usd: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletOverview {
    pub balances: Vec<TokenBalance>,
    pub total_value_usd: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AddressBalances {
    pub address: String,
    pub balances: Vec<TokenBalance>,
}

pub struct MarketData {
    sim: Simulation,
}

impl MarketData {
    pub fn new(sim: Simulation) -> Self {
        Self { sim }
    }

    pub fn stats(&self) -> ExchangeStats {
        let volume = 1_000_000.0 + self.sim.uniform(4_000_000.0);
        let liquidity = 10_000_000.0 + self.sim.uniform(40_000_000.0);
        ExchangeStats {
            volume: usd_string(volume),
            liquidity: usd_string(liquidity),
            pairs: rate_table::pairs().count(),
        }
    }

    pub fn market(&self) -> MarketOverview {
        let markets = MARKET_BASES
            .iter()
            .filter_map(|base| {
                let price = rate_table::usd_price(base)?;
                let change = self.sim.uniform(10.0) - 5.0;
                Some(MarketTicker {
                    symbol: format!("{}/USDT", base),
                    price: format_usd(price),
                    change: format!("{:+.2}%", change),
                })
            })
            .collect();
        MarketOverview { markets }
    }

    /// 演示钱包
    pub fn wallet(&self) -> WalletOverview {
        let balances: Vec<TokenBalance> = DEMO_HOLDINGS
            .iter()
            .filter_map(|(currency, amount)| {
                let amount = amount.parse::<Decimal>().ok()?;
                Some(token_balance(currency, amount))
            })
            .collect();
        let total = balances
            .iter()
            .filter_map(|b| b.value_usd.parse::<Decimal>().ok())
            .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
            .unwrap_or_default();
        WalletOverview {
            balances,
            total_value_usd: format_usd(total),
        }
    }

    /// 按地址派生稳定的模拟余额：同一地址每次返回相同结果
    pub fn balances_for(&self, address: &str) -> Result<AddressBalances, ValidationError> {
        let address = address.trim();
        AddressValidator::validate_evm_address("wallet", address)?;
        let address = address.to_lowercase();

        let digest = Keccak256::digest(address.as_bytes());
        let word = |i: usize| u16::from_be_bytes([digest[i * 2], digest[i * 2 + 1]]) as i64;

        // (币种, 种子值, 小数位)
        let seeded = [
            ("ETH", word(0) % 5_000, 3u32),
            ("BTC", word(1) % 1_000, 4),
            ("USDT", word(2) % 10_000, 0),
            ("USDC", word(3) % 10_000, 1),
        ];
        let balances = seeded
            .iter()
            .map(|(currency, raw, scale)| token_balance(currency, Decimal::new(*raw, *scale)))
            .collect();

        Ok(AddressBalances { address, balances })
    }
}

fn usd_string(value: f64) -> String {
    decimal_from_f64(value)
        .map(format_usd)
        .unwrap_or_else(|| "0.00".to_string())
}

fn token_balance(currency: &str, amount: Decimal) -> TokenBalance {
    let value = rate_table::usd_price(currency)
        .and_then(|price| price.checked_mul(amount))
        .unwrap_or_default();
    TokenBalance {
        currency: currency.to_string(),
        amount: format_amount(amount),
        value_usd: format_usd(value),
    }
}
