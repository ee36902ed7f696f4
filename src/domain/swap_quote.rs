//! 兑换报价

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::wallet_session::Network;

/// 兑换报价（计算后不可变）
///
/// 所有金额字段都是 6 位小数字符串
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    pub quote_id: String,
    pub from_token: String,
    pub to_token: String,
    pub from_amount: String,
    pub to_amount: String,
    pub exchange_rate: String,
    pub fee: String,
    pub estimated_gas: String,
    pub min_received: String,
    /// 例如 "0.23%"
    pub price_impact: String,
    /// 报价固定滑点，例如 "0.5%"
    pub slippage: String,
    pub network: Network,
    /// 汇率表中没有该交易对时为 true
    pub rate_is_fallback: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SwapQuote {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// 按网络固定的 gas 估算
pub fn estimated_gas(network: Network) -> &'static str {
    match network {
        Network::Mainnet => "0.0045 ETH",
        Network::Testnet => "0.0012 ETH",
    }
}
