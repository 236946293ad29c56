//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 데이터베이스 설정
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Redis 설정
    #[serde(default)]
    pub redis: RedisConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 통화 변환 설정
    #[serde(default)]
    pub currency: CurrencyConfig,
    /// 조회 엔진 설정
    #[serde(default)]
    pub query: QuerySettings,
    /// 정산 파이프라인 설정
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connection_timeout_secs: u64,
    /// 유휴 타임아웃 (초)
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connection_timeout_secs: 30,
            idle_timeout_secs: 300,
        }
    }
}

/// Redis 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    /// cache 항목의 기본 TTL (초)
    #[serde(default = "default_redis_ttl")]
    pub default_ttl_secs: u64,
}

fn default_redis_ttl() -> u64 {
    300 // 5 minutes
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_redis_ttl(),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 통화 변환 설정.
///
/// 해외 몰에서 수집된 정산 금액을 기준 통화로 환산하기 위한
/// 고정 환율 테이블입니다.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CurrencyConfig {
    /// 기준 통화 코드
    pub base: String,
    /// 외화 코드 → 기준 통화 환율
    pub rates: HashMap<String, Decimal>,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        let mut rates = HashMap::new();
        // USD → CNY 고정 환율
        rates.insert("USD".to_string(), Decimal::new(710, 2));

        Self {
            base: "CNY".to_string(),
            rates,
        }
    }
}

/// 조회 엔진 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuerySettings {
    /// 기본 페이지 크기
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    /// 최대 페이지 크기 (초과 요청은 이 값으로 잘림)
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    /// 조회 결과 캐시 TTL (초)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_page_size() -> u32 {
    20
}
fn default_max_page_size() -> u32 {
    100
}
fn default_cache_ttl() -> u64 {
    300 // 5 minutes
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

/// 정산 파이프라인 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// 입금 정산 집계 윈도우 (일)
    #[serde(default = "default_window_days")]
    pub arrival_window_days: i64,
    /// SKU 업서트 동시 워커 수
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// 소스별 실행 잠금 TTL (초)
    #[serde(default = "default_lock_ttl")]
    pub lock_ttl_secs: u64,
}

fn default_window_days() -> i64 {
    30
}
fn default_worker_count() -> usize {
    8
}
fn default_lock_ttl() -> u64 {
    600
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            arrival_window_days: default_window_days(),
            worker_count: default_worker_count(),
            lock_ttl_secs: default_lock_ttl(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let builder = config::Config::builder()
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("SETTLE")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self> {
        Self::load("config/default.toml")
    }
}
