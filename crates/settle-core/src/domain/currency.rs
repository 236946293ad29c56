//! 통화 변환.
//!
//! 해외 몰 정산 금액을 고정 환율로 기준 통화(CNY)로 환산합니다.
//! 환율은 설정에서 주입되며 실행 중에는 변하지 않습니다.

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::config::CurrencyConfig;

/// 고정 환율 통화 변환기.
#[derive(Debug, Clone)]
pub struct CurrencyConverter {
    /// 기준 통화 코드
    base: String,
    /// 외화 코드 → 기준 통화 환율
    rates: HashMap<String, Decimal>,
}

impl CurrencyConverter {
    /// 설정에서 변환기를 생성합니다.
    pub fn new(config: &CurrencyConfig) -> Self {
        Self {
            base: config.base.clone(),
            rates: config.rates.clone(),
        }
    }

    /// 기준 통화 코드를 반환합니다.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// 금액을 기준 통화로 환산합니다.
    ///
    /// 기준 통화이거나 환율 테이블에 없는 코드는 금액을 그대로 반환합니다.
    /// 미등록 코드의 통과 처리는 의도된 관대한 기본 동작입니다 (에러 아님).
    /// 반올림은 적용하지 않습니다. 단가 계산 단계에서 절사합니다.
    pub fn to_base(&self, amount: Decimal, currency: &str) -> Decimal {
        if currency == self.base {
            return amount;
        }

        match self.rates.get(currency) {
            Some(rate) => amount * rate,
            None => amount,
        }
    }
}

impl Default for CurrencyConverter {
    fn default() -> Self {
        Self::new(&CurrencyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_base_currency_passthrough() {
        let converter = CurrencyConverter::default();
        assert_eq!(converter.to_base(dec!(250), "CNY"), dec!(250));
    }

    #[test]
    fn test_foreign_currency_converted() {
        let converter = CurrencyConverter::default();
        // USD 100 × 7.10 = CNY 710
        assert_eq!(converter.to_base(dec!(100), "USD"), dec!(710.00));
    }

    #[test]
    fn test_unknown_currency_passthrough() {
        let converter = CurrencyConverter::default();
        assert_eq!(converter.to_base(dec!(99.9), "XYZ"), dec!(99.9));
    }

    #[test]
    fn test_no_rounding_applied() {
        let mut config = CurrencyConfig::default();
        config.rates.insert("JPY".to_string(), dec!(0.0512));
        let converter = CurrencyConverter::new(&config);

        // 환산 단계에서는 절사하지 않는다
        assert_eq!(converter.to_base(dec!(1234), "JPY"), dec!(63.1808));
    }

    #[test]
    fn test_zero_amount() {
        let converter = CurrencyConverter::default();
        assert_eq!(converter.to_base(Decimal::ZERO, "USD"), Decimal::ZERO);
    }
}
