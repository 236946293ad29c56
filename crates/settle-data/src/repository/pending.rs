//! 대기 정산 원시 테이블 저장소.
//!
//! 대기 정산(pending_settlement_details)은 몰 단위 수집 주기마다
//! 전체가 교체되는 "현재 잔액" 테이블입니다. SKU당 여러 행이 있을 수
//! 있으며, 집계 시 시간 윈도우를 적용하지 않고 전체를 합산합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DataError, Result};
use settle_core::domain::SkuAggregate;

/// 대기 정산 원시 레코드.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PendingSettlementRecord {
    pub id: Uuid,
    pub mall_id: i64,
    pub mall_name: Option<String>,
    pub sku_id: String,
    pub sku_code: Option<String>,
    pub sku_property: Option<String>,
    pub goods_name: Option<String>,
    pub sales_volume: i64,
    pub sales_amount: Decimal,
    pub currency: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// 대기 정산 수집 입력.
#[derive(Debug, Clone)]
pub struct PendingSettlementInput {
    pub mall_id: i64,
    pub mall_name: Option<String>,
    pub sku_id: String,
    pub sku_code: Option<String>,
    pub sku_property: Option<String>,
    pub goods_name: Option<String>,
    pub sales_volume: i64,
    pub sales_amount: Decimal,
    pub currency: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// 대기 정산 저장소.
pub struct PendingSettlementRepository;

impl PendingSettlementRepository {
    /// 몰 단위로 대기 정산 행을 교체합니다.
    ///
    /// 대기 정산은 과거 이력이 아니라 현재 잔액이므로 수집 주기마다
    /// 기존 행을 지우고 새 스냅샷을 넣습니다. 삭제와 삽입은 한
    /// 트랜잭션으로 묶습니다.
    pub async fn replace_for_mall(
        pool: &PgPool,
        mall_id: i64,
        rows: Vec<PendingSettlementInput>,
    ) -> Result<usize> {
        let mut tx = pool.begin().await.map_err(DataError::from_sqlx)?;

        sqlx::query("DELETE FROM pending_settlement_details WHERE mall_id = $1")
            .bind(mall_id)
            .execute(&mut *tx)
            .await
            .map_err(DataError::from_sqlx)?;

        let mut inserted = 0;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO pending_settlement_details (
                    mall_id, mall_name, sku_id, sku_code, sku_property,
                    goods_name, sales_volume, sales_amount, currency, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(row.mall_id)
            .bind(&row.mall_name)
            .bind(&row.sku_id)
            .bind(&row.sku_code)
            .bind(&row.sku_property)
            .bind(&row.goods_name)
            .bind(row.sales_volume)
            .bind(row.sales_amount)
            .bind(&row.currency)
            .bind(row.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(DataError::from_sqlx)?;

            inserted += 1;
        }

        tx.commit().await.map_err(DataError::from_sqlx)?;

        debug!(mall_id, inserted, "Pending settlement rows replaced");
        Ok(inserted)
    }

    /// SKU 단위 대기 정산 집계.
    ///
    /// (mall_id, sku_id)로 묶어 판매량/판매금액을 합산하고, 서술
    /// 필드는 SKU별 최근 갱신 행에서 가져옵니다. 행이 없는 SKU는
    /// 결과에 나타나지 않습니다.
    pub async fn aggregate_by_sku(pool: &PgPool) -> Result<Vec<SkuAggregate>> {
        let aggregates = sqlx::query_as::<_, SkuAggregate>(
            r#"
            SELECT
                g.mall_id,
                l.mall_name,
                g.sku_id,
                l.sku_code,
                l.sku_property,
                l.goods_name,
                l.currency,
                g.sales_volume,
                g.sales_amount,
                l.updated_at AS source_updated_at
            FROM (
                SELECT
                    mall_id,
                    sku_id,
                    COALESCE(SUM(sales_volume), 0)::BIGINT AS sales_volume,
                    COALESCE(SUM(sales_amount), 0) AS sales_amount
                FROM pending_settlement_details
                GROUP BY mall_id, sku_id
            ) g
            JOIN (
                SELECT DISTINCT ON (sku_id)
                    sku_id, mall_name, sku_code, sku_property,
                    goods_name, currency, updated_at
                FROM pending_settlement_details
                ORDER BY sku_id, updated_at DESC
            ) l ON l.sku_id = g.sku_id
            ORDER BY g.mall_id, g.sku_id
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(DataError::from_sqlx)?;

        debug!(count = aggregates.len(), "Pending aggregates loaded");
        Ok(aggregates)
    }
}
