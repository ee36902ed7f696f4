//! 模拟交易状态定义
//! 所有模拟交易使用统一的状态枚举

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 模拟交易状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// 交易已提交，尚未被观察到
    Submitted,

    /// 交易待确认
    Pending,

    /// 交易已完成
    Completed,

    /// 交易失败
    Failed,
}

impl TransactionStatus {
    /// 获取状态描述
    pub fn description(&self) -> &'static str {
        match self {
            Self::Submitted => "交易已提交",
            Self::Pending => "交易待确认",
            Self::Completed => "交易已完成",
            Self::Failed => "交易失败",
        }
    }

    /// 是否为最终状态（不可再转换）
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// 验证状态转换合法性
    pub fn can_transition_to(&self, target: &Self) -> bool {
        use TransactionStatus::*;

        match (self, target) {
            // Submitted → Pending | Completed | Failed
            (Submitted, Pending) | (Submitted, Completed) | (Submitted, Failed) => true,

            // Pending → Pending（再次轮询）| Completed | Failed
            (Pending, Pending) | (Pending, Completed) | (Pending, Failed) => true,

            // 最终状态不可转换
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    /// 兼容存储层的旧写法
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "submitted" | "created" => Ok(Self::Submitted),
            "pending" => Ok(Self::Pending),
            "completed" | "confirmed" | "success" => Ok(Self::Completed),
            "failed" | "error" => Ok(Self::Failed),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

/// 交易类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Swap,
    /// 转账（包括钱包 send）
    Transfer,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Swap => "swap",
            Self::Transfer => "transfer",
        }
    }
}

impl FromStr for TxKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "swap" => Ok(Self::Swap),
            "transfer" | "send" => Ok(Self::Transfer),
            other => Err(format!("unknown transaction kind: {}", other)),
        }
    }
}

/// 模拟交易
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedTransaction {
    pub hash: String,
    /// 通过状态轮询首次出现的哈希没有类型
    pub kind: Option<TxKind>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SimulatedTransaction {
    pub fn submitted(hash: String, kind: Option<TxKind>, now: DateTime<Utc>) -> Self {
        Self {
            hash,
            kind,
            status: TransactionStatus::Submitted,
            created_at: now,
            updated_at: now,
        }
    }

    /// 推进状态；终态之后的任何转换都会被拒绝
    pub fn advance(&mut self, target: TransactionStatus, now: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(&target) {
            return false;
        }
        self.status = target;
        self.updated_at = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use TransactionStatus::*;

        // 合法转换
        assert!(Submitted.can_transition_to(&Pending));
        assert!(Submitted.can_transition_to(&Completed));
        assert!(Pending.can_transition_to(&Failed));
        assert!(Pending.can_transition_to(&Pending));

        // 非法转换
        assert!(!Pending.can_transition_to(&Submitted));

        // 最终状态不可转换
        assert!(!Completed.can_transition_to(&Pending));
        assert!(!Failed.can_transition_to(&Completed));
        assert!(!Completed.can_transition_to(&Completed));
    }

    #[test]
    fn test_is_final() {
        use TransactionStatus::*;

        assert!(!Submitted.is_final());
        assert!(!Pending.is_final());
        assert!(Completed.is_final());
        assert!(Failed.is_final());
    }

    #[test]
    fn test_from_str() {
        assert_eq!(
            "confirmed".parse::<TransactionStatus>().unwrap(),
            TransactionStatus::Completed
        );
        assert_eq!(
            "pending".parse::<TransactionStatus>().unwrap(),
            TransactionStatus::Pending
        );
        assert!("replaced".parse::<TransactionStatus>().is_err());
        assert_eq!("send".parse::<TxKind>().unwrap(), TxKind::Transfer);
    }

    #[test]
    fn test_advance_is_monotonic() {
        let now = Utc::now();
        let mut tx = SimulatedTransaction::submitted("0x01".into(), Some(TxKind::Swap), now);
        assert!(tx.advance(TransactionStatus::Pending, now));
        assert!(tx.advance(TransactionStatus::Failed, now));
        assert!(!tx.advance(TransactionStatus::Completed, now));
        assert_eq!(tx.status, TransactionStatus::Failed);
    }
}
