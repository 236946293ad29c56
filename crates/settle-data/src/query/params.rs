//! 페이지네이션 파라미터와 조회 결과 타입.
//!
//! 모드 선택은 호출자가 선언하는 것이 아니라 파라미터의 구조로
//! 결정됩니다: `cursor`가 있거나 `page_index`/`page_size`가 둘 다
//! 없으면 커서 모드, 그 외에는 오프셋 모드입니다. 애매하게 넘긴
//! 호출자는 커서 모드를 받습니다.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use settle_core::config::QuerySettings;

/// 정렬 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// SQL 키워드.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// 커서 비교 연산자. 내림차순이면 `<`, 오름차순이면 `>`.
    pub fn cursor_operator(&self) -> &'static str {
        match self {
            Self::Asc => ">",
            Self::Desc => "<",
        }
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::Desc
    }
}

/// 페이지네이션 모드.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationMode {
    /// 정렬 필드에 대한 엄격한 부등호 커서
    Cursor,
    /// page_index/page_size 오프셋 + 전체 건수
    Offset,
}

/// 페이지네이션 파라미터.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageParams {
    /// 1부터 시작하는 페이지 번호 (오프셋 모드)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_index: Option<u32>,
    /// 페이지 크기 (오프셋 모드)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    /// 커서 값: 직전 페이지 마지막 행의 정렬 필드 값 (커서 모드)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Value>,
    /// 페이지 크기 (커서 모드)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// 정렬 필드 (기본값은 모드별로 다름)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_field: Option<String>,
    /// 정렬 방향 (기본 내림차순)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

impl PageParams {
    /// 파라미터 구조로 페이지네이션 모드를 결정합니다.
    pub fn mode(&self) -> PaginationMode {
        if self.cursor.is_some() || (self.page_index.is_none() && self.page_size.is_none()) {
            PaginationMode::Cursor
        } else {
            PaginationMode::Offset
        }
    }

    /// 유효 페이지 크기.
    ///
    /// 최대치를 넘는 요청은 거부하지 않고 조용히 최대치로 잘립니다.
    pub fn effective_page_size(&self, settings: &QuerySettings) -> u32 {
        let requested = match self.mode() {
            PaginationMode::Cursor => self.limit.or(self.page_size),
            PaginationMode::Offset => self.page_size,
        };

        requested
            .unwrap_or(settings.default_page_size)
            .max(1)
            .min(settings.max_page_size)
    }

    /// 1 이상으로 보정된 페이지 번호.
    pub fn effective_page_index(&self) -> u32 {
        self.page_index.unwrap_or(1).max(1)
    }

    /// 정렬 방향 (기본 내림차순).
    pub fn effective_sort_order(&self) -> SortOrder {
        self.sort_order.unwrap_or_default()
    }
}

/// 오프셋 모드의 행 오프셋.
pub fn offset_for(page_index: u32, page_size: u32) -> i64 {
    (i64::from(page_index) - 1) * i64::from(page_size)
}

/// 전체 페이지 수 (올림 나눗셈).
pub fn total_pages(total: i64, page_size: u32) -> i64 {
    if total <= 0 {
        return 0;
    }
    (total + i64::from(page_size) - 1) / i64::from(page_size)
}

/// 조회 결과.
///
/// 오프셋 모드는 `total`/`page_index`/`page_size`/`total_pages`를,
/// 커서 모드는 `has_more`/`next_cursor`를 채웁니다. 캐시에 그대로
/// 직렬화되어 저장됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult<T> {
    pub data: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cursor_mode_when_cursor_present() {
        let params = PageParams {
            cursor: Some(json!(42)),
            page_index: Some(2),
            page_size: Some(20),
            ..Default::default()
        };
        // 커서가 있으면 오프셋 필드가 있어도 커서 모드
        assert_eq!(params.mode(), PaginationMode::Cursor);
    }

    #[test]
    fn test_cursor_mode_when_both_page_fields_absent() {
        let params = PageParams::default();
        assert_eq!(params.mode(), PaginationMode::Cursor);
    }

    #[test]
    fn test_offset_mode_when_any_page_field_present() {
        let params = PageParams {
            page_index: Some(1),
            ..Default::default()
        };
        assert_eq!(params.mode(), PaginationMode::Offset);

        let params = PageParams {
            page_size: Some(50),
            ..Default::default()
        };
        assert_eq!(params.mode(), PaginationMode::Offset);
    }

    #[test]
    fn test_page_size_clamped_not_rejected() {
        let settings = QuerySettings::default();

        let params = PageParams {
            page_index: Some(1),
            page_size: Some(250),
            ..Default::default()
        };
        assert_eq!(params.effective_page_size(&settings), 100);

        let params = PageParams::default();
        assert_eq!(params.effective_page_size(&settings), 20);

        let params = PageParams {
            limit: Some(0),
            cursor: Some(serde_json::json!(1)),
            ..Default::default()
        };
        assert_eq!(params.effective_page_size(&settings), 1);
    }

    #[test]
    fn test_offset_for() {
        assert_eq!(offset_for(1, 20), 0);
        assert_eq!(offset_for(3, 20), 40);
    }

    #[test]
    fn test_total_pages_ceiling() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(100, 20), 5);
    }

    #[test]
    fn test_cursor_operator_by_order() {
        assert_eq!(SortOrder::Desc.cursor_operator(), "<");
        assert_eq!(SortOrder::Asc.cursor_operator(), ">");
    }
}
