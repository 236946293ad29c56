//! 정산 재계산 파이프라인.
//!
//! 소스별(대기/입금) 원시 테이블을 SKU 단위로 집계하고, 원가 맵과
//! 결합해 이익 지표를 계산한 뒤, 집계 테이블에 필드 그룹 단위로
//! 업서트합니다. 실행 단위는 소스 전체이며, SKU 하나의 실패가 실행을
//! 중단시키지 않습니다 (부분 실패 보고).
//!
//! 동일 소스 실행은 Redis `SET NX EX` 잠금으로 직렬화합니다. 서로
//! 다른 소스는 겹치는 컬럼이 없으므로 동시에 실행해도 됩니다.
//!
//! 실행이 집계 테이블에 행을 하나라도 썼다면, 마지막에 해당 테이블의
//! 조회 캐시(`query:cost_settlements:*`)를 비웁니다. 이 시스템에서
//! 파이프라인 쓰기가 캐시에 반영되는 유일한 경로입니다.

use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use settle_core::config::PipelineConfig;
use settle_core::domain::{compute_metrics, CurrencyConverter, SettlementSource, SettlementUpdate};
use settle_data::error::DataError;
use settle_data::query::table_pattern;
use settle_data::repository::{
    ArrivalDataRepository, CostSettlementRepository, PendingSettlementRepository,
};
use settle_data::storage::RedisCache;

use crate::window::trailing_window;

/// 집계 테이블 이름 (조회 캐시 네임스페이스).
const SETTLEMENT_TABLE: &str = "cost_settlements";

/// 파이프라인 에러.
#[derive(Debug, Error)]
pub enum ReconError {
    #[error("데이터 레이어 에러: {0}")]
    Data(#[from] DataError),

    #[error("동일 소스 정산이 이미 실행 중입니다: {0}")]
    AlreadyRunning(SettlementSource),
}

pub type Result<T> = std::result::Result<T, ReconError>;

/// SKU 단위 실패 기록.
#[derive(Debug, Clone, Serialize)]
pub struct SkuFailure {
    pub sku_id: String,
    pub error: String,
}

/// 실행 결과 보고서.
#[derive(Debug, Clone, Serialize)]
pub struct ReconReport {
    /// 실행한 소스
    pub source: SettlementSource,
    /// 집계된 SKU 수
    pub processed: usize,
    /// 업서트 성공 수
    pub upserted: usize,
    /// SKU 단위 실패 목록
    pub failed: Vec<SkuFailure>,
}

/// 정산 재계산 파이프라인.
pub struct ReconPipeline {
    pool: PgPool,
    cache: Option<RedisCache>,
    converter: CurrencyConverter,
    config: PipelineConfig,
}

impl ReconPipeline {
    /// 새 파이프라인을 생성합니다.
    ///
    /// `cache`가 `None`이면 실행 잠금과 캐시 무효화 없이 동작합니다
    /// (단일 인스턴스 배포나 테스트 환경).
    pub fn new(
        pool: PgPool,
        cache: Option<RedisCache>,
        converter: CurrencyConverter,
        config: PipelineConfig,
    ) -> Self {
        Self {
            pool,
            cache,
            converter,
            config,
        }
    }

    /// 현재 날짜 기준으로 실행합니다.
    pub async fn run(&self, source: SettlementSource) -> Result<ReconReport> {
        self.run_for_date(source, Utc::now().date_naive()).await
    }

    /// 기준일을 지정해 실행합니다.
    ///
    /// 입금 소스의 30일 윈도우가 이 날짜를 기준으로 계산되므로,
    /// 테스트와 재처리(backfill)에서는 이 진입점을 씁니다.
    #[instrument(skip(self), fields(source = %source, %today))]
    pub async fn run_for_date(
        &self,
        source: SettlementSource,
        today: NaiveDate,
    ) -> Result<ReconReport> {
        let lock_name = Self::lock_name(source);
        let mut lock_held = false;

        if let Some(cache) = &self.cache {
            match cache
                .acquire_lock(&lock_name, self.config.lock_ttl_secs)
                .await
            {
                Ok(true) => lock_held = true,
                Ok(false) => return Err(ReconError::AlreadyRunning(source)),
                Err(e) => {
                    // 잠금 저장소 장애로 실행을 막지는 않는다.
                    // 업서트 자체가 문장 단위로 원자적이므로 최악의 경우
                    // 마지막 실행의 값으로 수렴한다.
                    warn!(error = %e, "Run lock unavailable, proceeding without it");
                }
            }
        }

        let result = self.execute(source, today).await;

        if lock_held {
            if let Some(cache) = &self.cache {
                if let Err(e) = cache.release_lock(&lock_name).await {
                    warn!(error = %e, "Run lock release failed, expires by TTL");
                }
            }
        }

        result
    }

    async fn execute(&self, source: SettlementSource, today: NaiveDate) -> Result<ReconReport> {
        let aggregates = match source {
            SettlementSource::Pending => {
                PendingSettlementRepository::aggregate_by_sku(&self.pool).await?
            }
            SettlementSource::Arrival => {
                let window = trailing_window(today, self.config.arrival_window_days);
                info!(%window, "Aggregating arrival window");
                ArrivalDataRepository::aggregate_window(&self.pool, window.start, window.end)
                    .await?
            }
        };

        if aggregates.is_empty() {
            info!(%source, "No settlement rows to reconcile");
            return Ok(ReconReport {
                source,
                processed: 0,
                upserted: 0,
                failed: Vec::new(),
            });
        }

        // 원가 맵은 실행 시작 시 한 번만 로드한다. 실행 중의 수기
        // 원가 변경은 다음 실행에 반영된다.
        let cost_prices = CostSettlementRepository::cost_prices(&self.pool).await?;
        let processed = aggregates.len();

        let results: Vec<(String, settle_data::error::Result<()>)> = stream::iter(aggregates)
            .map(|aggregate| {
                let cost = cost_prices.get(&aggregate.sku_id).copied();
                async move {
                    let metrics = compute_metrics(&aggregate, cost, source, &self.converter);
                    let update = SettlementUpdate::from_aggregate(&aggregate, metrics, source);
                    let result = Self::upsert_with_retry(&self.pool, &update).await;
                    (update.sku_id, result)
                }
            })
            .buffer_unordered(self.config.worker_count)
            .collect()
            .await;

        let report = Self::collect_report(source, processed, results);

        if report.upserted > 0 {
            self.invalidate_query_cache().await;
        }

        info!(
            %source,
            processed = report.processed,
            upserted = report.upserted,
            failed = report.failed.len(),
            "Reconciliation run finished"
        );
        Ok(report)
    }

    /// 업서트 1회 재시도.
    ///
    /// 문장 단위 `ON CONFLICT` 업서트에서도 드물게 유일 제약 위반이
    /// 보고될 수 있습니다 (다른 실행과의 삽입 경합). 한 번 재시도하면
    /// 그때는 행이 존재하므로 UPDATE 경로로 성공합니다.
    async fn upsert_with_retry(
        pool: &PgPool,
        update: &SettlementUpdate,
    ) -> settle_data::error::Result<()> {
        match CostSettlementRepository::upsert(pool, update).await {
            Err(e) if e.is_duplicate() => {
                warn!(sku_id = %update.sku_id, "Upsert hit a unique violation, retrying once");
                CostSettlementRepository::upsert(pool, update).await
            }
            other => other,
        }
    }

    fn collect_report(
        source: SettlementSource,
        processed: usize,
        results: Vec<(String, settle_data::error::Result<()>)>,
    ) -> ReconReport {
        let mut upserted = 0;
        let mut failed = Vec::new();

        for (sku_id, result) in results {
            match result {
                Ok(()) => upserted += 1,
                Err(e) => {
                    error!(%sku_id, error = %e, "SKU upsert failed");
                    failed.push(SkuFailure {
                        sku_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        ReconReport {
            source,
            processed,
            upserted,
            failed,
        }
    }

    /// 집계 테이블의 조회 캐시를 비웁니다 (best-effort).
    async fn invalidate_query_cache(&self) {
        let Some(cache) = &self.cache else {
            return;
        };

        match cache.delete_pattern(&table_pattern(SETTLEMENT_TABLE)).await {
            Ok(deleted) => info!(deleted, "Settlement query cache invalidated"),
            Err(e) => warn!(error = %e, "Settlement query cache invalidation failed"),
        }
    }

    fn lock_name(source: SettlementSource) -> String {
        format!("recon:{}", source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_name_per_source() {
        // 소스별로 잠금이 달라야 대기/입금이 동시에 실행될 수 있다
        assert_eq!(
            ReconPipeline::lock_name(SettlementSource::Pending),
            "recon:pending"
        );
        assert_eq!(
            ReconPipeline::lock_name(SettlementSource::Arrival),
            "recon:arrival"
        );
    }

    #[test]
    fn test_collect_report_partial_failure() {
        let results = vec![
            ("SKU-A".to_string(), Ok(())),
            (
                "SKU-B".to_string(),
                Err(DataError::QueryError("connection reset".to_string())),
            ),
            ("SKU-C".to_string(), Ok(())),
        ];

        let report = ReconPipeline::collect_report(SettlementSource::Pending, 3, results);
        assert_eq!(report.processed, 3);
        assert_eq!(report.upserted, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].sku_id, "SKU-B");
    }

    #[test]
    fn test_collect_report_all_ok() {
        let results = vec![("SKU-A".to_string(), Ok(())), ("SKU-B".to_string(), Ok(()))];

        let report = ReconPipeline::collect_report(SettlementSource::Arrival, 2, results);
        assert_eq!(report.upserted, 2);
        assert!(report.failed.is_empty());
    }
}
