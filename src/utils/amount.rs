//! 金额解析与格式化

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::errors::ValidationError;

/// 报价与交易金额统一保留 6 位小数
pub const AMOUNT_SCALE: u32 = 6;

/// 解析正的有限金额，支持普通小数和科学计数法
pub fn parse_positive_amount(field: &str, raw: &str) -> Result<Decimal, ValidationError> {
    let raw = raw.trim();
    let parsed = Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|_| ValidationError::new(format!("Invalid {}: {} is not a number", field, raw)))?;

    if parsed <= Decimal::ZERO {
        return Err(ValidationError::new(format!(
            "Invalid {}: must be greater than 0",
            field
        )));
    }
    Ok(parsed)
}

/// f64 转 Decimal，取 f64 最短十进制表示，避免二进制误差
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string()).ok()
}

/// 四舍五入到 6 位小数
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// 渲染为固定 6 位小数的字符串
pub fn format_amount(value: Decimal) -> String {
    format!("{:.6}", round_amount(value))
}

/// 渲染为两位小数的美元金额
pub fn format_usd(value: Decimal) -> String {
    format!(
        "{:.2}",
        value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positive_amount() {
        assert_eq!(
            parse_positive_amount("amount", "1.5").unwrap(),
            Decimal::from_str("1.5").unwrap()
        );
        assert_eq!(
            parse_positive_amount("amount", "1e2").unwrap(),
            Decimal::from(100)
        );
        assert!(parse_positive_amount("amount", "0").is_err());
        assert!(parse_positive_amount("amount", "-3").is_err());
        assert!(parse_positive_amount("amount", "abc").is_err());
        assert!(parse_positive_amount("amount", "NaN").is_err());
        assert!(parse_positive_amount("amount", "").is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::from(3950)), "3950.000000");
        assert_eq!(
            format_amount(Decimal::from_str("0.0000005").unwrap()),
            "0.000001"
        );
        assert_eq!(format_usd(Decimal::from_str("12.345").unwrap()), "12.35");
    }

    #[test]
    fn test_decimal_from_f64() {
        assert_eq!(decimal_from_f64(0.003).unwrap().to_string(), "0.003");
        assert_eq!(decimal_from_f64(15.5).unwrap().to_string(), "15.5");
        assert!(decimal_from_f64(f64::NAN).is_none());
    }
}
