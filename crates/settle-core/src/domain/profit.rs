//! 이익 계산.
//!
//! SKU 집계와 원가(수기 입력)로부터 평균 단가, 매출총이익, 이익률을
//! 계산합니다. 두 가지 수수료 모델을 사용합니다:
//!
//! - **대기 모델**: 아직 입금되지 않은 판매분. 플랫폼 수수료 공제를
//!   반영합니다 (건당 고정 수수료 0.1, 결제 수수료 단가의 2.5%,
//!   출고 수수료 (원가+0.1)의 1%).
//! - **입금 모델**: 이미 정산 완료된 매출. 추가 공제 없이
//!   (단가 − 원가) × 판매량.
//!
//! 수수료 상수는 플랫폼 계약 조건 그대로이며 근사하면 안 됩니다.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::aggregate::{SettlementMetrics, SettlementSource, SkuAggregate};
use super::currency::CurrencyConverter;

/// 건당 고정 수수료.
const FIXED_FEE: Decimal = dec!(0.1);
/// 결제 수수료율 (평균 단가 기준).
const PAYMENT_FEE_RATE: Decimal = dec!(0.025);
/// 출고 수수료율 (원가 + 고정 수수료 기준).
const FULFILLMENT_FEE_RATE: Decimal = dec!(0.01);

/// 평균 단가를 계산합니다.
///
/// 소수 둘째 자리에서 **절사**합니다 (반올림 아님). 12.346은 12.34가
/// 됩니다. 판매량이 0이면 0을 반환합니다 (나눗셈 에러 아님).
pub fn average_price(amount: Decimal, volume: i64) -> Decimal {
    if volume <= 0 {
        return Decimal::ZERO;
    }

    (amount / Decimal::from(volume)).trunc_with_scale(2)
}

/// 집계와 원가로부터 정산 지표를 계산합니다.
///
/// 판매금액은 먼저 기준 통화로 환산합니다. 원가가 `None`이거나
/// 판매량이 0이면 매출총이익과 이익률은 `None`으로 남습니다.
/// 이익률은 비율입니다 (0.15 = 15%). ×100과 "%" 표기는 표시 계층의
/// 책임입니다.
pub fn compute_metrics(
    aggregate: &SkuAggregate,
    cost_price: Option<Decimal>,
    source: SettlementSource,
    converter: &CurrencyConverter,
) -> SettlementMetrics {
    let currency = aggregate.currency.as_deref().unwrap_or(converter.base());
    let normalized = converter.to_base(aggregate.sales_amount, currency);
    let volume = aggregate.sales_volume;

    let avg = average_price(normalized, volume);

    let gross_profit = match cost_price {
        Some(cost) if volume > 0 => Some(gross_profit_for(avg, cost, volume, source)),
        _ => None,
    };

    let profit_rate = match (gross_profit, cost_price) {
        (Some(gross), Some(cost)) => {
            let denominator = cost * Decimal::from(volume);
            if denominator.is_zero() {
                None
            } else {
                Some(gross / denominator)
            }
        }
        _ => None,
    };

    SettlementMetrics {
        sales_volume: volume,
        sales_amount: normalized,
        average_price: avg,
        gross_profit,
        profit_rate,
    }
}

/// 소스별 수수료 모델로 매출총이익을 계산합니다.
fn gross_profit_for(
    average_price: Decimal,
    cost_price: Decimal,
    volume: i64,
    source: SettlementSource,
) -> Decimal {
    let volume = Decimal::from(volume);

    match source {
        SettlementSource::Pending => {
            let unit_margin = average_price - cost_price - FIXED_FEE;
            let payment_fee = average_price * PAYMENT_FEE_RATE;
            let fulfillment_fee = (cost_price + FIXED_FEE) * FULFILLMENT_FEE_RATE;

            (unit_margin - payment_fee - fulfillment_fee) * volume
        }
        SettlementSource::Arrival => (average_price - cost_price) * volume,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn aggregate(volume: i64, amount: Decimal, currency: &str) -> SkuAggregate {
        SkuAggregate {
            mall_id: 1,
            mall_name: Some("JP Mall".to_string()),
            sku_id: "SKU-A".to_string(),
            sku_code: None,
            sku_property: None,
            goods_name: None,
            currency: Some(currency.to_string()),
            sales_volume: volume,
            sales_amount: amount,
            source_updated_at: None,
        }
    }

    #[test]
    fn test_average_price_truncates_not_rounds() {
        // 12.346 → 12.34 (12.35가 아님)
        assert_eq!(average_price(dec!(12.346), 1), dec!(12.34));
        assert_eq!(average_price(dec!(12.999), 1), dec!(12.99));
        assert_eq!(average_price(dec!(250), 10), dec!(25.00));
    }

    #[test]
    fn test_average_price_zero_volume() {
        assert_eq!(average_price(dec!(100), 0), Decimal::ZERO);
        assert_eq!(average_price(dec!(100), -1), Decimal::ZERO);
    }

    #[test]
    fn test_pending_fee_model_exact() {
        // 원가 10, 단가 20, 판매량 5:
        // ((20 − 10 − 0.1) − 20×0.025 − 10.1×0.01) × 5
        // = (9.9 − 0.5 − 0.101) × 5 = 46.495
        let agg = aggregate(5, dec!(100), "CNY");
        let metrics = compute_metrics(
            &agg,
            Some(dec!(10)),
            SettlementSource::Pending,
            &CurrencyConverter::default(),
        );

        assert_eq!(metrics.average_price, dec!(20.00));
        assert_eq!(metrics.gross_profit, Some(dec!(46.495)));
        // 46.495 / (10 × 5) = 0.9299
        assert_eq!(metrics.profit_rate, Some(dec!(0.9299)));
    }

    #[test]
    fn test_arrival_model_no_fee_deduction() {
        // 같은 입력의 입금 모델: (20 − 10) × 5 = 50
        let agg = aggregate(5, dec!(100), "CNY");
        let metrics = compute_metrics(
            &agg,
            Some(dec!(10)),
            SettlementSource::Arrival,
            &CurrencyConverter::default(),
        );

        assert_eq!(metrics.gross_profit, Some(dec!(50)));
        assert_eq!(metrics.profit_rate, Some(dec!(1)));
    }

    #[test]
    fn test_unknown_cost_leaves_profit_unset() {
        let agg = aggregate(10, dec!(250), "CNY");
        let metrics = compute_metrics(
            &agg,
            None,
            SettlementSource::Pending,
            &CurrencyConverter::default(),
        );

        assert_eq!(metrics.average_price, dec!(25.00));
        assert_eq!(metrics.gross_profit, None);
        assert_eq!(metrics.profit_rate, None);
    }

    #[test]
    fn test_zero_volume_with_known_cost() {
        // 원가를 알아도 판매량이 0이면 이익 지표는 비워 둔다
        let agg = aggregate(0, dec!(0), "CNY");
        let metrics = compute_metrics(
            &agg,
            Some(dec!(10)),
            SettlementSource::Pending,
            &CurrencyConverter::default(),
        );

        assert_eq!(metrics.average_price, Decimal::ZERO);
        assert_eq!(metrics.gross_profit, None);
        assert_eq!(metrics.profit_rate, None);
    }

    #[test]
    fn test_zero_cost_price_has_profit_but_no_rate() {
        // 원가 0: 이익은 계산되지만 분모가 0이라 이익률은 None
        let agg = aggregate(5, dec!(100), "CNY");
        let metrics = compute_metrics(
            &agg,
            Some(Decimal::ZERO),
            SettlementSource::Arrival,
            &CurrencyConverter::default(),
        );

        assert_eq!(metrics.gross_profit, Some(dec!(100)));
        assert_eq!(metrics.profit_rate, None);
    }

    #[test]
    fn test_foreign_currency_normalized_before_average() {
        // USD 100 × 7.10 = 710, 판매량 4 → 평균 단가 177.50
        let agg = aggregate(4, dec!(100), "USD");
        let metrics = compute_metrics(
            &agg,
            None,
            SettlementSource::Arrival,
            &CurrencyConverter::default(),
        );

        assert_eq!(metrics.sales_amount, dec!(710.00));
        assert_eq!(metrics.average_price, dec!(177.50));
    }

    #[test]
    fn test_end_to_end_pending_scenario() {
        // 판매량 10, 판매금액 CNY 250, 원가 15:
        // 평균 단가 25.00
        // ((25 − 15 − 0.1) − 25×0.025 − 15.1×0.01) × 10
        // = (9.9 − 0.625 − 0.151) × 10 = 91.24
        let agg = aggregate(10, dec!(250), "CNY");
        let metrics = compute_metrics(
            &agg,
            Some(dec!(15)),
            SettlementSource::Pending,
            &CurrencyConverter::default(),
        );

        assert_eq!(metrics.average_price, dec!(25.00));
        assert_eq!(metrics.gross_profit, Some(dec!(91.240)));
        // 91.24 / (15 × 10) ≈ 0.6083
        let rate = metrics.profit_rate.unwrap();
        assert!((rate - dec!(0.6083)).abs() < dec!(0.0001));
    }

    proptest! {
        /// 평균 단가는 항상 소수 둘째 자리 이하이며, 절사이므로 정확한
        /// 나눗셈 값을 넘지 않고 차이는 0.01 미만이다.
        #[test]
        fn prop_average_price_truncates_to_two_places(
            cents in 0i64..10_000_000,
            volume in 1i64..1_000,
        ) {
            let amount = Decimal::new(cents, 2);
            let avg = average_price(amount, volume);
            let exact = amount / Decimal::from(volume);

            prop_assert!(avg.scale() <= 2);
            prop_assert!(avg <= exact);
            prop_assert!(exact - avg < dec!(0.01));
        }
    }
}
