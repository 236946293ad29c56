//! 정산 도메인 모델.
//!
//! - 통화 변환: 고정 환율 기반 기준 통화 환산
//! - 집계 타입: SKU 단위 판매 집계와 필드 그룹 단위 부분 갱신
//! - 이익 계산: 평균 단가, 매출총이익, 이익률

pub mod aggregate;
pub mod currency;
pub mod profit;

pub use aggregate::{
    SettlementMetrics, SettlementPatch, SettlementSource, SettlementUpdate, SharedFields,
    SkuAggregate,
};
pub use currency::CurrencyConverter;
pub use profit::{average_price, compute_metrics};
