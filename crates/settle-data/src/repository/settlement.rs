//! 원가 정산 집계 테이블 저장소.
//!
//! cost_settlements는 UI가 읽는 유일한 집계 테이블이며 sku_id로
//! 유일합니다. 컬럼은 세 묶음으로 나뉩니다:
//!
//! - 대기 그룹 (`pending_*`): 대기 정산 파이프라인만 기록
//! - 입금 그룹 (`d30_*`, `arrival_updated_at`): 입금 정산 파이프라인만 기록
//! - 공유 서술 필드와 `cost_price`: 원가는 수기 입력 전용이며
//!   파이프라인은 절대 기록하지 않음
//!
//! 업서트는 그룹별 고정 SQL 한 문장(`INSERT .. ON CONFLICT (sku_id)
//! DO UPDATE`)으로 수행되어 SKU 단위로 원자적입니다. 같은 실행끼리의
//! 직렬화는 파이프라인의 소스별 실행 잠금이 담당합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DataError, Result};
use settle_core::domain::{SettlementPatch, SettlementUpdate};

/// 원가 정산 집계 레코드.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CostSettlementRecord {
    pub id: Uuid,
    pub mall_id: i64,
    pub mall_name: Option<String>,
    pub sku_id: String,
    pub sku_code: Option<String>,
    pub sku_property: Option<String>,
    pub goods_name: Option<String>,
    pub product_name: Option<String>,
    /// 수기 입력 원가. 파이프라인이 절대 덮어쓰지 않는다.
    pub cost_price: Option<Decimal>,

    // 대기 그룹
    pub pending_average_price: Option<Decimal>,
    pub pending_sales_volume: Option<i64>,
    pub pending_sales_amount: Option<Decimal>,
    pub pending_gross_profit: Option<Decimal>,
    pub pending_profit_rate: Option<Decimal>,
    pub pending_updated_at: Option<DateTime<Utc>>,

    // 입금 그룹 (최근 30일)
    pub d30_average_price: Option<Decimal>,
    pub d30_sales_volume: Option<i64>,
    pub d30_sales_amount: Option<Decimal>,
    pub d30_gross_profit: Option<Decimal>,
    pub d30_profit_rate: Option<Decimal>,
    pub arrival_updated_at: Option<DateTime<Utc>>,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// 대기 그룹 업서트 SQL.
///
/// 입금 그룹 컬럼과 cost_price는 어디에도 등장하지 않는다.
const UPSERT_PENDING_SQL: &str = r#"
INSERT INTO cost_settlements (
    sku_id, mall_id, mall_name, sku_code, sku_property, goods_name,
    pending_average_price, pending_sales_volume, pending_sales_amount,
    pending_gross_profit, pending_profit_rate, pending_updated_at,
    updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
ON CONFLICT (sku_id)
DO UPDATE SET
    mall_id = EXCLUDED.mall_id,
    mall_name = COALESCE(EXCLUDED.mall_name, cost_settlements.mall_name),
    sku_code = COALESCE(EXCLUDED.sku_code, cost_settlements.sku_code),
    sku_property = COALESCE(EXCLUDED.sku_property, cost_settlements.sku_property),
    goods_name = COALESCE(EXCLUDED.goods_name, cost_settlements.goods_name),
    pending_average_price = EXCLUDED.pending_average_price,
    pending_sales_volume = EXCLUDED.pending_sales_volume,
    pending_sales_amount = EXCLUDED.pending_sales_amount,
    pending_gross_profit = EXCLUDED.pending_gross_profit,
    pending_profit_rate = EXCLUDED.pending_profit_rate,
    pending_updated_at = EXCLUDED.pending_updated_at,
    updated_at = NOW()
"#;

/// 입금 그룹 업서트 SQL.
///
/// 대기 그룹 컬럼과 cost_price는 어디에도 등장하지 않는다.
const UPSERT_ARRIVAL_SQL: &str = r#"
INSERT INTO cost_settlements (
    sku_id, mall_id, mall_name, sku_code, sku_property, goods_name,
    d30_average_price, d30_sales_volume, d30_sales_amount,
    d30_gross_profit, d30_profit_rate, arrival_updated_at,
    updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
ON CONFLICT (sku_id)
DO UPDATE SET
    mall_id = EXCLUDED.mall_id,
    mall_name = COALESCE(EXCLUDED.mall_name, cost_settlements.mall_name),
    sku_code = COALESCE(EXCLUDED.sku_code, cost_settlements.sku_code),
    sku_property = COALESCE(EXCLUDED.sku_property, cost_settlements.sku_property),
    goods_name = COALESCE(EXCLUDED.goods_name, cost_settlements.goods_name),
    d30_average_price = EXCLUDED.d30_average_price,
    d30_sales_volume = EXCLUDED.d30_sales_volume,
    d30_sales_amount = EXCLUDED.d30_sales_amount,
    d30_gross_profit = EXCLUDED.d30_gross_profit,
    d30_profit_rate = EXCLUDED.d30_profit_rate,
    arrival_updated_at = EXCLUDED.arrival_updated_at,
    updated_at = NOW()
"#;

/// 원가 정산 저장소.
pub struct CostSettlementRepository;

impl CostSettlementRepository {
    /// SKU로 집계 행을 조회합니다.
    pub async fn get_by_sku(pool: &PgPool, sku_id: &str) -> Result<Option<CostSettlementRecord>> {
        sqlx::query_as::<_, CostSettlementRecord>(
            "SELECT * FROM cost_settlements WHERE sku_id = $1",
        )
        .bind(sku_id)
        .fetch_optional(pool)
        .await
        .map_err(DataError::from_sqlx)
    }

    /// 원가가 입력된 SKU의 원가 맵을 조회합니다.
    ///
    /// 파이프라인이 실행 시작 시 한 번 로드해서 SKU별 이익 계산에
    /// 사용합니다. 원가 미입력 SKU는 맵에 없습니다.
    pub async fn cost_prices(pool: &PgPool) -> Result<HashMap<String, Decimal>> {
        let rows: Vec<(String, Decimal)> = sqlx::query_as(
            "SELECT sku_id, cost_price FROM cost_settlements WHERE cost_price IS NOT NULL",
        )
        .fetch_all(pool)
        .await
        .map_err(DataError::from_sqlx)?;

        Ok(rows.into_iter().collect())
    }

    /// 필드 그룹 단위 업서트.
    ///
    /// 행이 있으면 해당 그룹 컬럼과 공유 서술 필드만 갱신하고(서술
    /// 필드는 `COALESCE`로 기존 값 보존), 없으면 새 행을 만듭니다.
    /// 반대쪽 그룹과 `cost_price`는 어느 경로로도 변경되지 않습니다.
    /// 유일 제약 위반은 [`DataError::Duplicate`]로 반환되어 호출자가
    /// 한 번 재시도할 수 있습니다.
    pub async fn upsert(pool: &PgPool, update: &SettlementUpdate) -> Result<()> {
        let (sql, metrics, source_updated_at) = match &update.patch {
            SettlementPatch::Pending {
                metrics,
                source_updated_at,
            } => (UPSERT_PENDING_SQL, metrics, source_updated_at),
            SettlementPatch::Arrival {
                metrics,
                source_updated_at,
            } => (UPSERT_ARRIVAL_SQL, metrics, source_updated_at),
        };

        // 소스 행에 갱신 시각이 없으면 실행 시각으로 스탬프
        let group_updated_at = source_updated_at.unwrap_or_else(Utc::now);

        sqlx::query(sql)
            .bind(&update.sku_id)
            .bind(update.shared.mall_id)
            .bind(&update.shared.mall_name)
            .bind(&update.shared.sku_code)
            .bind(&update.shared.sku_property)
            .bind(&update.shared.goods_name)
            .bind(metrics.average_price)
            .bind(metrics.sales_volume)
            .bind(metrics.sales_amount)
            .bind(metrics.gross_profit)
            .bind(metrics.profit_rate)
            .bind(group_updated_at)
            .execute(pool)
            .await
            .map_err(DataError::from_sqlx)?;

        debug!(
            sku_id = %update.sku_id,
            source = %update.patch.source(),
            "Cost settlement upserted"
        );
        Ok(())
    }

    /// 원가를 수기 입력합니다 (관리 화면의 쓰기 경로).
    ///
    /// 집계 행이 아직 없는 SKU는 `None`을 반환합니다. 원가가 먼저
    /// 파이프라인에 의해 행이 만들어진 뒤에만 편집할 수 있습니다.
    ///
    /// 호출자는 저장 후 반드시 `cost_settlements`에 대한 조회 캐시를
    /// 비워야 합니다 (`QueryOptimizer::clear_cache`). 그러지 않으면
    /// 이전 원가로 계산된 이익이 TTL까지 계속 서빙됩니다.
    pub async fn set_cost_price(
        pool: &PgPool,
        sku_id: &str,
        cost_price: Decimal,
        product_name: Option<&str>,
    ) -> Result<Option<CostSettlementRecord>> {
        sqlx::query_as::<_, CostSettlementRecord>(
            r#"
            UPDATE cost_settlements
            SET cost_price = $2,
                product_name = COALESCE($3, product_name),
                updated_at = NOW()
            WHERE sku_id = $1
            RETURNING *
            "#,
        )
        .bind(sku_id)
        .bind(cost_price)
        .bind(product_name)
        .fetch_optional(pool)
        .await
        .map_err(DataError::from_sqlx)
    }
}
