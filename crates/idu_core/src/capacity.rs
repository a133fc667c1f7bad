use crate::{IduError, IduResult};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResolvedCapacity {
    pub capacity: Option<i32>,
    pub is_capacity_real: bool,
}

/// Fills a missing capacity from the service type's modeled value.
///
/// An explicit capacity counts as real unless `is_capacity_real` says
/// otherwise; a filled-in one never does.
pub fn resolve_capacity(
    capacity: Option<i32>,
    is_capacity_real: Option<bool>,
    capacity_modeled: Option<i32>,
) -> IduResult<ResolvedCapacity> {
    match capacity {
        Some(value) if value < 0 => Err(IduError::validation(format!(
            "capacity must not be negative, got {value}"
        ))),
        Some(value) => Ok(ResolvedCapacity {
            capacity: Some(value),
            is_capacity_real: is_capacity_real.unwrap_or(true),
        }),
        None => Ok(ResolvedCapacity {
            capacity: capacity_modeled,
            is_capacity_real: false,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::resolve_capacity;

    #[test]
    fn missing_capacity_takes_modeled_value() {
        let resolved = resolve_capacity(None, None, Some(500)).expect("resolve");
        assert_eq!(resolved.capacity, Some(500));
        assert!(!resolved.is_capacity_real);
        let resolved = resolve_capacity(None, Some(true), Some(500)).expect("resolve");
        assert!(!resolved.is_capacity_real);
    }

    #[test]
    fn explicit_capacity_is_real_unless_flagged() {
        let resolved = resolve_capacity(Some(120), None, Some(500)).expect("resolve");
        assert_eq!(resolved.capacity, Some(120));
        assert!(resolved.is_capacity_real);
        let resolved = resolve_capacity(Some(120), Some(false), None).expect("resolve");
        assert!(!resolved.is_capacity_real);
        assert!(resolve_capacity(Some(-1), None, None).is_err());
    }
}
