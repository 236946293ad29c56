//! 스토리지 레이어.
//!
//! - PostgreSQL: 원시 정산 테이블과 집계 테이블
//! - Redis: 조회 결과 캐시, 파이프라인 실행 잠금

pub mod postgres;
pub mod redis;

pub use postgres::{Database, DatabaseConfig};
pub use redis::{RedisCache, RedisConfig};
