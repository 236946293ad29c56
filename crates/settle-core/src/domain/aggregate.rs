//! SKU 단위 정산 집계 타입.
//!
//! 원시 정산 테이블(대기 정산, 30일 입금 정산)을 (mall_id, sku_id)로
//! 묶은 집계 결과와, 집계 테이블에 반영할 필드 그룹 단위 부분 갱신
//! 타입을 정의합니다.
//!
//! 대기 그룹과 입금 그룹의 컬럼은 서로 겹치지 않으며, 어떤 그룹을
//! 쓸지는 [`SettlementPatch`] variant로 타입 수준에서 고정됩니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 정산 소스.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementSource {
    /// 대기 정산 (아직 입금되지 않은 잔액, 윈도우 없음)
    Pending,
    /// 입금 정산 (최근 30일 입금 완료분)
    Arrival,
}

impl SettlementSource {
    /// 소스 식별 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Arrival => "arrival",
        }
    }
}

impl std::fmt::Display for SettlementSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SKU 단위 판매 집계.
///
/// 판매량/판매금액은 그룹 합계이고, 서술 필드(몰 이름, 상품명, 통화 등)는
/// 해당 SKU에서 가장 최근에 갱신된 한 행에서 가져옵니다. 합산 대상이
/// 아니기 때문입니다. 판매금액은 환산 전(원통화) 금액입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct SkuAggregate {
    /// 몰 ID
    pub mall_id: i64,
    /// 몰 이름
    pub mall_name: Option<String>,
    /// SKU ID
    pub sku_id: String,
    /// SKU 코드
    pub sku_code: Option<String>,
    /// SKU 속성 (색상/사이즈 등)
    pub sku_property: Option<String>,
    /// 상품명
    pub goods_name: Option<String>,
    /// 원통화 코드
    pub currency: Option<String>,
    /// 판매량 합계
    pub sales_volume: i64,
    /// 판매금액 합계 (원통화)
    pub sales_amount: Decimal,
    /// 소스 행의 최근 갱신 시각
    pub source_updated_at: Option<DateTime<Utc>>,
}

/// 계산된 정산 지표.
///
/// 판매금액은 기준 통화 환산 후 금액입니다. 원가를 모르면
/// `gross_profit`/`profit_rate`는 `None`으로 남습니다. 0이 아니라
/// "아직 계산 불가" 상태이며 표시 계층에서 구분해 렌더링합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementMetrics {
    /// 판매량 합계
    pub sales_volume: i64,
    /// 판매금액 합계 (기준 통화)
    pub sales_amount: Decimal,
    /// 평균 단가 (소수 둘째 자리 절사)
    pub average_price: Decimal,
    /// 매출총이익
    pub gross_profit: Option<Decimal>,
    /// 이익률 (비율, 0.15 = 15%)
    pub profit_rate: Option<Decimal>,
}

/// 공유 서술 필드.
///
/// 양쪽 소스가 모두 갱신할 수 있는 필드입니다. `None`인 필드는
/// 기존 행의 값을 보존합니다. `cost_price`는 수기 관리 컬럼이므로
/// 여기에 포함되지 않으며 파이프라인이 절대 건드리지 않습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SharedFields {
    /// 몰 ID
    pub mall_id: i64,
    /// 몰 이름
    pub mall_name: Option<String>,
    /// SKU 코드
    pub sku_code: Option<String>,
    /// SKU 속성
    pub sku_property: Option<String>,
    /// 상품명
    pub goods_name: Option<String>,
}

/// 필드 그룹 단위 부분 갱신.
///
/// variant가 곧 쓰기 대상 컬럼 그룹입니다. 런타임에 "어떤 필드가
/// 들어왔는지" 검사하는 대신 타입으로 그룹 격리를 강제합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SettlementPatch {
    /// 대기 그룹 컬럼만 갱신
    Pending {
        metrics: SettlementMetrics,
        source_updated_at: Option<DateTime<Utc>>,
    },
    /// 입금(30일) 그룹 컬럼만 갱신
    Arrival {
        metrics: SettlementMetrics,
        source_updated_at: Option<DateTime<Utc>>,
    },
}

impl SettlementPatch {
    /// 이 patch가 속한 소스.
    pub fn source(&self) -> SettlementSource {
        match self {
            Self::Pending { .. } => SettlementSource::Pending,
            Self::Arrival { .. } => SettlementSource::Arrival,
        }
    }

    /// 내부 지표 참조.
    pub fn metrics(&self) -> &SettlementMetrics {
        match self {
            Self::Pending { metrics, .. } | Self::Arrival { metrics, .. } => metrics,
        }
    }
}

/// SKU 하나에 대한 업서트 입력.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementUpdate {
    /// SKU ID (집계 테이블의 유일 키)
    pub sku_id: String,
    /// 공유 서술 필드
    pub shared: SharedFields,
    /// 필드 그룹 갱신 내용
    pub patch: SettlementPatch,
}

impl SettlementUpdate {
    /// 집계 결과와 계산된 지표에서 업서트 입력을 만듭니다.
    pub fn from_aggregate(
        aggregate: &SkuAggregate,
        metrics: SettlementMetrics,
        source: SettlementSource,
    ) -> Self {
        let shared = SharedFields {
            mall_id: aggregate.mall_id,
            mall_name: aggregate.mall_name.clone(),
            sku_code: aggregate.sku_code.clone(),
            sku_property: aggregate.sku_property.clone(),
            goods_name: aggregate.goods_name.clone(),
        };

        let patch = match source {
            SettlementSource::Pending => SettlementPatch::Pending {
                metrics,
                source_updated_at: aggregate.source_updated_at,
            },
            SettlementSource::Arrival => SettlementPatch::Arrival {
                metrics,
                source_updated_at: aggregate.source_updated_at,
            },
        };

        Self {
            sku_id: aggregate.sku_id.clone(),
            shared,
            patch,
        }
    }
}
