//! 입금 정산 원시 테이블 저장소.
//!
//! 입금 정산(arrival_data_details)은 정산일(accounting_date) 단위로
//! 쌓이는 append-only 시계열입니다. 집계는 항상 "오늘 − 30일 ~
//! 어제"의 후행 윈도우로 수행하며, 윈도우 계산 자체는 호출자
//! (파이프라인)의 책임입니다.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DataError, Result};
use settle_core::domain::SkuAggregate;

/// 입금 정산 원시 레코드.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ArrivalDataRecord {
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
    /// 정산일 (입금이 귀속되는 날짜)
    pub accounting_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

/// 입금 정산 수집 입력.
#[derive(Debug, Clone)]
pub struct ArrivalDataInput {
    pub mall_id: i64,
    pub mall_name: Option<String>,
    pub sku_id: String,
    pub sku_code: Option<String>,
    pub sku_property: Option<String>,
    pub goods_name: Option<String>,
    pub sales_volume: i64,
    pub sales_amount: Decimal,
    pub currency: Option<String>,
    pub accounting_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

/// 입금 정산 저장소.
pub struct ArrivalDataRepository;

impl ArrivalDataRepository {
    /// 입금 정산 행을 추가합니다 (append-only).
    pub async fn insert_batch(pool: &PgPool, rows: Vec<ArrivalDataInput>) -> Result<usize> {
        let mut tx = pool.begin().await.map_err(DataError::from_sqlx)?;

        let mut inserted = 0;
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO arrival_data_details (
                    mall_id, mall_name, sku_id, sku_code, sku_property,
                    goods_name, sales_volume, sales_amount, currency,
                    accounting_date, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
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
            .bind(row.accounting_date)
            .bind(row.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(DataError::from_sqlx)?;

            inserted += 1;
        }

        tx.commit().await.map_err(DataError::from_sqlx)?;

        debug!(inserted, "Arrival data rows inserted");
        Ok(inserted)
    }

    /// 정산일 윈도우 내 SKU 단위 집계.
    ///
    /// 경계는 양끝 포함(`BETWEEN`)이며 일 단위입니다. 서술 필드는
    /// 윈도우 안에서 가장 최근에 갱신된 행에서 가져옵니다.
    pub async fn aggregate_window(
        pool: &PgPool,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SkuAggregate>> {
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
                FROM arrival_data_details
                WHERE accounting_date BETWEEN $1 AND $2
                GROUP BY mall_id, sku_id
            ) g
            JOIN (
                SELECT DISTINCT ON (sku_id)
                    sku_id, mall_name, sku_code, sku_property,
                    goods_name, currency, updated_at
                FROM arrival_data_details
                WHERE accounting_date BETWEEN $1 AND $2
                ORDER BY sku_id, updated_at DESC
            ) l ON l.sku_id = g.sku_id
            ORDER BY g.mall_id, g.sku_id
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
        .map_err(DataError::from_sqlx)?;

        debug!(
            count = aggregates.len(),
            %start,
            %end,
            "Arrival aggregates loaded"
        );
        Ok(aggregates)
    }
}
