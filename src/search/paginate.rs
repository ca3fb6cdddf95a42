//! Position/limit validation and slicing.

use serde_json::Value;

use crate::error::{QueryError, Result};

/// Largest integer a JSON client can represent exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Validate `position`. Absent means 0.
pub fn validate_position(value: Option<&Value>) -> Result<u64> {
    bounded("position", value).map(|p| p.unwrap_or(0))
}

/// Validate `limit`. Absent means `default_limit`; 0 is allowed.
pub fn validate_limit(value: Option<&Value>, default_limit: u64) -> Result<u64> {
    bounded("limit", value).map(|l| l.unwrap_or(default_limit))
}

fn bounded(name: &str, value: Option<&Value>) -> Result<Option<u64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .filter(|n| *n <= MAX_SAFE_INTEGER)
            .map(Some)
            .ok_or_else(|| {
                QueryError::invalid(format!(
                    "{name}: value should be positive and less than 2^53"
                ))
            }),
    }
}

/// `items[position .. min(position + limit, len)]`, clipped to the available length.
pub fn paginate<T>(items: &[T], position: u64, limit: u64) -> &[T] {
    let len = items.len();
    let start = usize::try_from(position).unwrap_or(usize::MAX).min(len);
    let end = start.saturating_add(usize::try_from(limit).unwrap_or(usize::MAX)).min(len);
    &items[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_position_bounds() {
        assert_eq!(validate_position(None).unwrap(), 0);
        assert_eq!(validate_position(Some(&json!(null))).unwrap(), 0);
        assert_eq!(
            validate_position(Some(&json!(MAX_SAFE_INTEGER))).unwrap(),
            MAX_SAFE_INTEGER
        );

        let err = validate_position(Some(&json!(1u64 << 53))).unwrap_err();
        assert_eq!(err.kind(), "invalidArguments");
        assert!(err.to_string().contains("less than 2^53"));

        assert!(validate_position(Some(&json!(-1))).is_err());
        assert!(validate_position(Some(&json!(1.5))).is_err());
        assert!(validate_position(Some(&json!("3"))).is_err());
    }

    #[test]
    fn test_limit_defaults_and_zero() {
        assert_eq!(validate_limit(None, 256).unwrap(), 256);
        assert_eq!(validate_limit(None, 7).unwrap(), 7);
        assert_eq!(validate_limit(Some(&json!(0)), 256).unwrap(), 0);
        assert!(validate_limit(Some(&json!(-5)), 256).is_err());
    }

    #[test]
    fn test_paginate_law() {
        let items: Vec<u32> = (0..10).collect();
        for p in 0..12u64 {
            for l in 0..12u64 {
                let start = (p as usize).min(items.len());
                let end = (p as usize + l as usize).min(items.len());
                assert_eq!(paginate(&items, p, l), &items[start..end]);
            }
        }
    }

    #[test]
    fn test_paginate_huge_values() {
        let items = [1, 2, 3];
        assert!(paginate(&items, MAX_SAFE_INTEGER, 5).is_empty());
        assert_eq!(paginate(&items, 1, MAX_SAFE_INTEGER), &[2, 3]);
    }
}
