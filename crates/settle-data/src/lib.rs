//! 정산 데이터 레이어.
//!
//! PostgreSQL 저장소(원시 정산 테이블, 원가 정산 집계 테이블)와
//! Redis 캐시, 그리고 UI 읽기 경로가 쓰는 캐시 인지 조회 엔진을
//! 제공합니다.

pub mod error;
pub mod query;
pub mod repository;
pub mod storage;

pub use error::{DataError, Result};
pub use query::{PageParams, QueryOptimizer, QueryRequest, QueryResult};
pub use repository::{
    ArrivalDataRepository, CostSettlementRecord, CostSettlementRepository,
    PendingSettlementRepository,
};
pub use storage::{Database, RedisCache};
