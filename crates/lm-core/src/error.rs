use thiserror::Error;
use uuid::Uuid;

/// Rejection of a single evidence update. The targeted node is left exactly
/// as it was before the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvidenceError {
    #[error("invariant violation: {field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("invariant violation: {field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("invariant violation: evidence at {ts} precedes latest evidence at {latest}")]
    TimestampRegression { ts: f64, latest: f64 },

    #[error("invariant violation: {0}")]
    Broken(String),

    #[error("unknown node {0}")]
    UnknownNode(Uuid),

    #[error("node {0} is archived and frozen")]
    Archived(Uuid),
}

pub type Result<T> = std::result::Result<T, EvidenceError>;

pub(crate) fn ensure_finite(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EvidenceError::NonFinite { field, value })
    }
}

pub(crate) fn ensure_non_negative(field: &'static str, value: f64) -> Result<()> {
    ensure_finite(field, value)?;
    if value < 0.0 {
        return Err(EvidenceError::Negative { field, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_rejected() {
        let err = ensure_finite("price", f64::NAN).unwrap_err();
        assert!(matches!(err, EvidenceError::NonFinite { field: "price", .. }));
    }

    #[test]
    fn test_negative_rejected() {
        let err = ensure_non_negative("volume_usd", -1.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invariant violation: volume_usd must be non-negative, got -1"
        );
    }

    #[test]
    fn test_zero_accepted() {
        assert!(ensure_non_negative("volume_usd", 0.0).is_ok());
    }
}
