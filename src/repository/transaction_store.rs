//! 交易记录存储
//!
//! swap / transfer 成功后写入一条记录，供历史查询分页读取。
//! 默认内存实现；配置数据库后使用 Postgres

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tokio::sync::RwLock;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::infrastructure::db::PgPool;

/// 交易记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: Uuid,
    pub tx_hash: String,
    /// swap / transfer
    pub kind: String,
    /// 发起方地址（小写）
    pub wallet_address: String,
    pub from_token: Option<String>,
    pub to_token: Option<String>,
    pub recipient: Option<String>,
    pub amount: String,
    pub status: String,
    pub gas_used: Option<String>,
    pub block_number: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// 查询条件
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub wallet: Option<String>,
    pub kind: Option<String>,
}

impl TransactionFilter {
    fn normalized(&self) -> (Option<String>, Option<String>) {
        (
            self.wallet.as_deref().map(|w| w.trim().to_lowercase()),
            self.kind.as_deref().map(|k| k.trim().to_lowercase()),
        )
    }

    fn matches(&self, record: &TransactionRecord) -> bool {
        let (wallet, kind) = self.normalized();
        wallet.map_or(true, |w| record.wallet_address == w)
            && kind.map_or(true, |k| record.kind == k)
    }
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, record: TransactionRecord) -> Result<()>;

    /// 按创建时间倒序分页，返回 (当前页记录, 总数)；page 从 1 开始
    async fn query(
        &self,
        filter: &TransactionFilter,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<TransactionRecord>, u64)>;

    fn name(&self) -> &'static str;
}

fn offset(page: u32, limit: u32) -> usize {
    (page.max(1) as usize - 1) * limit as usize
}

#[derive(Default)]
pub struct InMemoryTransactionStore {
    records: RwLock<Vec<TransactionRecord>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, mut record: TransactionRecord) -> Result<()> {
        record.wallet_address = record.wallet_address.to_lowercase();
        self.records.write().await.push(record);
        Ok(())
    }

    async fn query(
        &self,
        filter: &TransactionFilter,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<TransactionRecord>, u64)> {
        let records = self.records.read().await;
        let mut matched: Vec<&TransactionRecord> =
            records.iter().filter(|r| filter.matches(r)).collect();
        // 同一时刻插入的记录保持后插入者在前
        matched.reverse();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len() as u64;
        let rows = matched
            .into_iter()
            .skip(offset(page, limit))
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((rows, total))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    /// 连接后确保表存在
    pub async fn new(pool: PgPool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS swapdesk_transactions (
                id UUID PRIMARY KEY,
                tx_hash TEXT NOT NULL,
                kind TEXT NOT NULL,
                wallet_address TEXT NOT NULL,
                from_token TEXT,
                to_token TEXT,
                recipient TEXT,
                amount TEXT NOT NULL,
                status TEXT NOT NULL,
                gas_used TEXT,
                block_number BIGINT,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("Failed to create swapdesk_transactions table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_swapdesk_tx_wallet ON swapdesk_transactions (wallet_address, created_at DESC)",
        )
        .execute(&pool)
        .await
        .context("Failed to create swapdesk_transactions index")?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn insert(&self, record: TransactionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO swapdesk_transactions (
                id, tx_hash, kind, wallet_address, from_token, to_token,
                recipient, amount, status, gas_used, block_number, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(record.id)
        .bind(&record.tx_hash)
        .bind(&record.kind)
        .bind(record.wallet_address.to_lowercase())
        .bind(&record.from_token)
        .bind(&record.to_token)
        .bind(&record.recipient)
        .bind(&record.amount)
        .bind(&record.status)
        .bind(&record.gas_used)
        .bind(record.block_number)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert transaction record")?;
        Ok(())
    }

    async fn query(
        &self,
        filter: &TransactionFilter,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<TransactionRecord>, u64)> {
        let (wallet, kind) = filter.normalized();

        let rows = sqlx::query_as::<_, TransactionRecord>(
            r#"
            SELECT id, tx_hash, kind, wallet_address, from_token, to_token,
                   recipient, amount, status, gas_used, block_number, created_at
            FROM swapdesk_transactions
            WHERE ($1::TEXT IS NULL OR wallet_address = $1)
              AND ($2::TEXT IS NULL OR kind = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&wallet)
        .bind(&kind)
        .bind(limit as i64)
        .bind(offset(page, limit) as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query transaction records")?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM swapdesk_transactions
            WHERE ($1::TEXT IS NULL OR wallet_address = $1)
              AND ($2::TEXT IS NULL OR kind = $2)
            "#,
        )
        .bind(&wallet)
        .bind(&kind)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count transaction records")?;

        Ok((rows, total.max(0) as u64))
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn record(wallet: &str, kind: &str, age_secs: i64) -> TransactionRecord {
        TransactionRecord {
            id: Uuid::new_v4(),
            tx_hash: format!("0x{}", "a".repeat(64)),
            kind: kind.into(),
            wallet_address: wallet.into(),
            from_token: Some("ETH".into()),
            to_token: Some("USDT".into()),
            recipient: None,
            amount: "1".into(),
            status: "completed".into(),
            gas_used: Some("21000".into()),
            block_number: Some(18_000_001),
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn test_query_filters_and_paginates() {
        let store = InMemoryTransactionStore::new();
        let wallet = "0xABCDEF0000000000000000000000000000000001";
        for age in 0..5 {
            store.insert(record(wallet, "swap", age)).await.unwrap();
        }
        store.insert(record(wallet, "transfer", 10)).await.unwrap();
        store
            .insert(record("0x0000000000000000000000000000000000000002", "swap", 0))
            .await
            .unwrap();

        let filter = TransactionFilter {
            wallet: Some(wallet.to_string()),
            kind: None,
        };
        let (rows, total) = store.query(&filter, 1, 4).await.unwrap();
        assert_eq!(total, 6);
        assert_eq!(rows.len(), 4);
        assert!(rows.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let (rows, _) = store.query(&filter, 2, 4).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].kind, "transfer");

        let swaps_only = TransactionFilter {
            wallet: None,
            kind: Some("SWAP".into()),
        };
        let (_, total) = store.query(&swaps_only, 1, 20).await.unwrap();
        assert_eq!(total, 6);

        let (rows, total) = store.query(&filter, 9, 4).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(total, 6);
    }
}
