//! # Settle Core
//!
//! 정산 플랫폼의 핵심 도메인 모델과 계산 규칙을 제공합니다.
//!
//! 이 크레이트는 정산 시스템 전반에서 사용되는 기본 타입을 제공합니다:
//! - SKU 단위 정산 집계 타입과 필드 그룹 단위 부분 갱신
//! - 고정 환율 통화 변환
//! - 이익 계산 (대기/입금 수수료 모델)
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
