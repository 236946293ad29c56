//! 듀얼 모드 페이지네이션 조회 엔진.
//!
//! - `params`: 구조 기반 모드 선택과 페이지 크기 보정
//! - `cache_key`: 정규화 해시 기반 캐시 키
//! - `optimizer`: 캐시 인지 실행기 (커서/오프셋 + 프로젝션)

pub mod cache_key;
pub mod optimizer;
pub mod params;

pub use cache_key::{cache_key, table_pattern};
pub use optimizer::{CacheStats, QueryOptimizer, QueryRequest};
pub use params::{PageParams, PaginationMode, QueryResult, SortOrder};
