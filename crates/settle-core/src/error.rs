//! 정산 시스템의 에러 타입.
//!
//! 이 크레이트는 순수 도메인 계산이라 실패 경로가 거의 없습니다.
//! 스토리지/파이프라인 에러는 각 크레이트의 에러 타입이 맡습니다.

use thiserror::Error;

/// 핵심 정산 에러.
#[derive(Debug, Error)]
pub enum SettleError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// 정산 작업을 위한 Result 타입.
pub type Result<T> = std::result::Result<T, SettleError>;

impl From<serde_json::Error> for SettleError {
    fn from(err: serde_json::Error) -> Self {
        SettleError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for SettleError {
    fn from(err: config::ConfigError) -> Self {
        SettleError::Config(err.to_string())
    }
}
