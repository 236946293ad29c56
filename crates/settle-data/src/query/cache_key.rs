//! 조회 캐시 키 생성.
//!
//! (테이블, 필터, 페이지네이션, 프로젝션)을 정규화된 JSON으로 펼쳐
//! SHA-256으로 해시합니다. 정규화는 객체 키를 재귀적으로 정렬하는
//! 것을 뜻하며, 의미가 같은 필터는 생성 순서와 무관하게 항상 같은
//! 키로 떨어집니다.
//!
//! 형식: `query:{table}:{hash}`. 테이블 단위 일괄 무효화는
//! `query:{table}:*` 패턴 삭제로 수행합니다.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::params::PageParams;

/// 객체 키를 재귀적으로 정렬한 정규 JSON 문자열.
fn canonicalize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            let inner: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{}:{}", k, canonicalize(v)))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", inner.join(","))
        }
        other => other.to_string(),
    }
}

/// 조회 캐시 키를 만듭니다.
pub fn cache_key(
    table: &str,
    filter: &Map<String, Value>,
    params: &PageParams,
    fields: Option<&[String]>,
) -> String {
    let params_value = serde_json::to_value(params).unwrap_or(Value::Null);

    let mut payload = String::new();
    payload.push_str(table);
    payload.push('|');
    payload.push_str(&canonicalize(&Value::Object(filter.clone())));
    payload.push('|');
    payload.push_str(&canonicalize(&params_value));
    payload.push('|');
    if let Some(fields) = fields {
        payload.push_str(&fields.join(","));
    }

    let digest = Sha256::digest(payload.as_bytes());
    format!("query:{}:{}", table, hex::encode(&digest[..16]))
}

/// 테이블 단위 무효화 패턴.
pub fn table_pattern(table: &str) -> String {
    format!("query:{}:*", table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map_from(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_key_independent_of_insertion_order() {
        let a = map_from(&[("mall_id", json!(1)), ("sku_code", json!("A-001"))]);
        let b = map_from(&[("sku_code", json!("A-001")), ("mall_id", json!(1))]);

        let params = PageParams::default();
        assert_eq!(
            cache_key("cost_settlements", &a, &params, None),
            cache_key("cost_settlements", &b, &params, None)
        );
    }

    #[test]
    fn test_nested_objects_sorted() {
        let a = map_from(&[("range", json!({"min": 1, "max": 9}))]);
        let b = map_from(&[("range", json!({"max": 9, "min": 1}))]);

        let params = PageParams::default();
        assert_eq!(
            cache_key("cost_settlements", &a, &params, None),
            cache_key("cost_settlements", &b, &params, None)
        );
    }

    #[test]
    fn test_different_filters_different_keys() {
        let a = map_from(&[("mall_id", json!(1))]);
        let b = map_from(&[("mall_id", json!(2))]);

        let params = PageParams::default();
        assert_ne!(
            cache_key("cost_settlements", &a, &params, None),
            cache_key("cost_settlements", &b, &params, None)
        );
    }

    #[test]
    fn test_pagination_part_of_key() {
        let filter = map_from(&[("mall_id", json!(1))]);
        let first = PageParams {
            page_index: Some(1),
            page_size: Some(20),
            ..Default::default()
        };
        let second = PageParams {
            page_index: Some(2),
            page_size: Some(20),
            ..Default::default()
        };

        assert_ne!(
            cache_key("cost_settlements", &filter, &first, None),
            cache_key("cost_settlements", &filter, &second, None)
        );
    }

    #[test]
    fn test_key_prefix_matches_table_pattern() {
        let filter = Map::new();
        let key = cache_key("cost_settlements", &filter, &PageParams::default(), None);
        assert!(key.starts_with("query:cost_settlements:"));
        assert_eq!(table_pattern("cost_settlements"), "query:cost_settlements:*");
    }
}
