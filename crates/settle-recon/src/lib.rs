//! # Settle Recon
//!
//! 정산 재계산 파이프라인.
//!
//! 원시 정산 테이블(대기/입금)을 집계해 이익 지표를 계산하고, 원가
//! 정산 집계 테이블에 반영합니다. 소스별 실행 잠금, SKU 단위 부분
//! 실패 보고, 실행 후 조회 캐시 무효화를 포함합니다.

pub mod pipeline;
pub mod window;

pub use pipeline::{ReconError, ReconPipeline, ReconReport, Result, SkuFailure};
pub use window::{trailing_window, TimeWindow};
