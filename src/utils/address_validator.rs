//! 地址与哈希格式验证
//!
//! 只支持 EVM 格式：地址 `0x` + 40 hex（可带 EIP-55 校验），交易哈希 `0x` + 64 hex

use crate::domain::errors::ValidationError;

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 验证EVM地址（支持EIP-55 Checksum）
    pub fn is_valid_evm_address(address: &str) -> bool {
        // 1. 基本格式检查
        let Some(hex_part) = address.strip_prefix("0x") else {
            return false;
        };
        if hex_part.len() != 40 {
            return false;
        }

        // 2. 验证hex字符
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }

        // 3. 混合大小写时做 EIP-55 校验；全小写或全大写不带校验信息
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        if has_upper && has_lower {
            return Self::verify_eip55_checksum(hex_part);
        }

        true
    }

    /// 验证 EVM 地址，失败时返回 ValidationError
    pub fn validate_evm_address(field: &str, address: &str) -> Result<(), ValidationError> {
        if Self::is_valid_evm_address(address.trim()) {
            Ok(())
        } else {
            Err(ValidationError::new(format!(
                "Invalid {}: expected 0x-prefixed 40 hex characters",
                field
            )))
        }
    }

    /// 验证交易哈希（0x + 64 hex）
    pub fn validate_tx_hash(hash: &str) -> Result<(), ValidationError> {
        let valid = hash
            .strip_prefix("0x")
            .map(|h| h.len() == 64 && h.chars().all(|c| c.is_ascii_hexdigit()))
            .unwrap_or(false);
        if valid {
            Ok(())
        } else {
            Err(ValidationError::new(format!(
                "Invalid transaction hash: {}",
                hash
            )))
        }
    }

    /// 计算 EIP-55 checksum 形式的地址
    pub fn to_checksum_address(address: &str) -> Option<String> {
        use sha3::{Digest, Keccak256};

        let hex_part = address.strip_prefix("0x")?;
        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let lower = hex_part.to_lowercase();
        let hash = Keccak256::digest(lower.as_bytes());

        let checksummed: String = lower
            .chars()
            .enumerate()
            .map(|(i, ch)| {
                if ch.is_ascii_alphabetic() && Self::hash_nibble(&hash, i) >= 8 {
                    ch.to_ascii_uppercase()
                } else {
                    ch
                }
            })
            .collect();
        Some(format!("0x{}", checksummed))
    }

    fn hash_nibble(hash: &[u8], i: usize) -> u8 {
        let hash_byte = hash[i / 2];
        if i % 2 == 0 {
            hash_byte >> 4
        } else {
            hash_byte & 0x0f
        }
    }

    /// 验证EIP-55 Checksum
    /// https://eips.ethereum.org/EIPS/eip-55
    fn verify_eip55_checksum(hex_part: &str) -> bool {
        use sha3::{Digest, Keccak256};

        let hash = Keccak256::digest(hex_part.to_lowercase().as_bytes());

        hex_part.chars().enumerate().all(|(i, ch)| {
            if !ch.is_ascii_alphabetic() {
                return true;
            }
            let should_be_uppercase = Self::hash_nibble(&hash, i) >= 8;
            ch.is_ascii_uppercase() == should_be_uppercase
        })
    }
}
