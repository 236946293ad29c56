//! 집계 시간 윈도우 계산.
//!
//! 입금 정산 집계는 "오늘 − N일 ~ 어제"의 후행 윈도우를 씁니다.
//! 오늘은 제외합니다. 아직 하루가 끝나지 않은 날의 부분 집계가
//! 섞이면 재실행할 때마다 값이 달라지기 때문입니다.

use chrono::{Duration, NaiveDate};

/// 양끝 포함 날짜 윈도우.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeWindow {
    /// 윈도우 길이 (일).
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// 기준일로부터 후행 윈도우를 계산합니다: `[today − days, today − 1]`.
pub fn trailing_window(today: NaiveDate, days: i64) -> TimeWindow {
    TimeWindow {
        start: today - Duration::days(days),
        end: today - Duration::days(1),
    }
}
