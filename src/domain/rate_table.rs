//! 静态汇率表
//!
//! 主网使用标准符号，测试网使用 `t` 前缀符号（tETH、tUSDT ...）。
//! 表中不存在的交易对由报价引擎回落为随机汇率

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rust_decimal::Decimal;

use crate::{domain::wallet_session::Network, utils::amount::decimal_from_f64};

const MAINNET_RATES: &[(&str, &str, f64)] = &[
    ("ETH", "USDT", 3950.0),
    ("ETH", "USDC", 3950.0),
    ("ETH", "DAI", 3948.5),
    ("ETH", "BTC", 0.0645),
    ("BTC", "ETH", 15.5),
    ("BTC", "USDT", 61225.0),
    ("BTC", "USDC", 61225.0),
    ("USDT", "ETH", 0.000253),
    ("USDC", "ETH", 0.000253),
    ("USDT", "BTC", 0.0000163),
    ("USDT", "USDC", 1.0),
    ("USDC", "USDT", 1.0),
    ("DAI", "USDT", 0.9998),
    ("USDT", "DAI", 1.0002),
];

/// 美元参考价（行情与余额估值）
const USD_PRICES: &[(&str, f64)] = &[
    ("ETH", 3950.0),
    ("BTC", 61225.0),
    ("USDT", 1.0),
    ("USDC", 1.0),
    ("DAI", 1.0),
];

struct Tables {
    mainnet: HashMap<(String, String), Decimal>,
    testnet: HashMap<(String, String), Decimal>,
}

static TABLES: Lazy<Tables> = Lazy::new(|| {
    let mut mainnet = HashMap::new();
    let mut testnet = HashMap::new();
    for (from, to, rate) in MAINNET_RATES {
        let Some(rate) = decimal_from_f64(*rate) else {
            continue;
        };
        mainnet.insert((from.to_string(), to.to_string()), rate);
        testnet.insert((format!("t{}", from), format!("t{}", to)), rate);
    }
    Tables { mainnet, testnet }
});

static USD_PRICE_TABLE: Lazy<HashMap<&'static str, Decimal>> = Lazy::new(|| {
    USD_PRICES
        .iter()
        .filter_map(|(symbol, price)| decimal_from_f64(*price).map(|p| (*symbol, p)))
        .collect()
});

/// 规范化符号：主网大写；测试网统一为 `t` + 大写
pub fn normalize_symbol(symbol: &str, network: Network) -> String {
    let symbol = symbol.trim();
    match network {
        Network::Mainnet => symbol.to_uppercase(),
        Network::Testnet => {
            let base = symbol
                .strip_prefix('t')
                .or_else(|| symbol.strip_prefix('T'))
                .filter(|rest| USD_PRICE_TABLE.contains_key(rest.to_uppercase().as_str()))
                .unwrap_or(symbol);
            format!("t{}", base.to_uppercase())
        }
    }
}

/// 查询交易对汇率
pub fn lookup(from: &str, to: &str, network: Network) -> Option<Decimal> {
    let key = (normalize_symbol(from, network), normalize_symbol(to, network));
    let table = match network {
        Network::Mainnet => &TABLES.mainnet,
        Network::Testnet => &TABLES.testnet,
    };
    table.get(&key).copied()
}

/// 代币的美元参考价，测试网符号按对应主网符号估值
pub fn usd_price(symbol: &str) -> Option<Decimal> {
    let upper = symbol.trim().to_uppercase();
    USD_PRICE_TABLE
        .get(upper.as_str())
        .or_else(|| {
            upper
                .strip_prefix('T')
                .and_then(|base| USD_PRICE_TABLE.get(base))
        })
        .copied()
}

/// 表中所有交易对（主网符号）
pub fn pairs() -> impl Iterator<Item = (&'static str, &'static str, f64)> {
    MAINNET_RATES.iter().copied()
}
