//! Input validation utilities.
//!
//! Identifiers are checked before any remote or local call is made, so a malformed request never
//! reaches a peer.

use crate::error::{VisitError, VisitResult};
use crate::models::AvailabilityWindow;
use caremanager_types::RecordId;

/// Validates that `value` is a positive identifier and returns it.
///
/// # Errors
///
/// Returns `VisitError::InvalidArgument` naming `field` when `value` is zero or negative.
pub fn require_positive(field: &'static str, value: i64) -> VisitResult<i64> {
    Ok(RecordId::new(field, value)?.get())
}

/// Validates an optional identifier, treating zero or negative values as absent.
///
/// Pushed events use `0` for "no reference", so lineage ids are filtered rather than rejected.
pub fn positive_or_none(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v > 0)
}

/// Validates a window given in unix seconds.
pub fn require_window(start_sec: i64, end_sec: i64) -> VisitResult<AvailabilityWindow> {
    if start_sec <= 0 || end_sec <= 0 {
        return Err(VisitError::InvalidArgument(format!(
            "invalid availability window {start_sec}..{end_sec}"
        )));
    }
    AvailabilityWindow::from_unix_seconds(start_sec, end_sec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_positive() {
        assert_eq!(require_positive("visit_id", 4).unwrap(), 4);
        let err = require_positive("visit_id", 0).unwrap_err();
        assert_eq!(err.to_string(), "invalid argument: invalid visit_id 0");
        assert!(require_positive("episode_id", -3).is_err());
    }

    #[test]
    fn test_positive_or_none() {
        assert_eq!(positive_or_none(Some(3)), Some(3));
        assert_eq!(positive_or_none(Some(0)), None);
        assert_eq!(positive_or_none(Some(-1)), None);
        assert_eq!(positive_or_none(None), None);
    }

    #[test]
    fn test_require_window() {
        assert!(require_window(1_700_000_000, 1_700_003_600).is_ok());
        assert!(require_window(0, 1_700_003_600).is_err());
        assert!(require_window(1_700_003_600, 1_700_000_000).is_err());
    }
}
