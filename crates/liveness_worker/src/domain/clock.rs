use chrono::{DateTime, TimeDelta, Utc};
use common::domain::{DomainError, DomainResult};

/// Convert a device-reported epoch timestamp in milliseconds
pub fn timestamp_from_millis(millis: i64) -> DomainResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        DomainError::MalformedEvent(format!("timestamp {} ms is out of range", millis))
    })
}

/// A committed status is stale once strictly more than `threshold` old
pub fn is_stale(status_updated: DateTime<Utc>, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
    now - status_updated > threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_timestamp_keeps_millisecond_precision() {
        let ts = timestamp_from_millis(1_700_000_000_123).unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_millis(), 123);
    }

    #[test]
    fn test_timestamp_out_of_range() {
        let result = timestamp_from_millis(i64::MAX);
        assert!(matches!(result, Err(DomainError::MalformedEvent(_))));
    }

    #[test]
    fn test_is_stale_is_strict() {
        let threshold = TimeDelta::seconds(86_400);
        assert!(!is_stale(at(0), at(86_400), threshold));
        assert!(is_stale(at(0), at(86_401), threshold));
        assert!(is_stale(at(0), at(100_000), threshold));
        assert!(!is_stale(at(50_000), at(100_000), threshold));
    }
}
