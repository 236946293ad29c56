//! 정산 테이블 저장소.
//!
//! - 대기 정산: 몰 단위 교체 + 전체 합산 집계
//! - 입금 정산: append-only + 정산일 윈도우 집계
//! - 원가 정산: 필드 그룹 단위 업서트 (sku_id 유일)

pub mod arrival;
pub mod pending;
pub mod settlement;

pub use arrival::{ArrivalDataInput, ArrivalDataRecord, ArrivalDataRepository};
pub use pending::{PendingSettlementInput, PendingSettlementRecord, PendingSettlementRepository};
pub use settlement::{CostSettlementRecord, CostSettlementRepository};
