//! Lease record - one slot of the pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of slots in the pool. Valid worker ids are `1..WORKER_ID_END`; id 0 is reserved.
pub const WORKER_ID_END: usize = 1024;

/// A leased worker id.
///
/// This is also the wire representation used by the HTTP transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub id: u16,
    /// Time of the most recent grant.
    pub released_at: DateTime<Utc>,
    pub expire_at: DateTime<Utc>,
}

impl LeaseRecord {
    pub(crate) fn unused(id: u16) -> Self {
        Self {
            id,
            released_at: DateTime::<Utc>::MIN_UTC,
            expire_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    pub(crate) fn reserved(id: u16) -> Self {
        Self {
            id,
            released_at: DateTime::<Utc>::MIN_UTC,
            expire_at: DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Whether the lease is still held at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expire_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> LeaseRecord {
        LeaseRecord {
            id: 7,
            released_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            expire_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn serializes_wire_format() {
        insta::assert_json_snapshot!(sample(), @r#"
        {
          "id": 7,
          "released_at": "2024-01-01T00:00:00Z",
          "expire_at": "2024-01-02T00:00:00Z"
        }
        "#);
    }

    #[test]
    fn deserializes_offset_timestamps() {
        let json = r#"{"id":7,"released_at":"2024-01-01T09:00:00+09:00","expire_at":"2024-01-02T09:00:00.5+09:00"}"#;
        let record: LeaseRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.released_at, sample().released_at);
        assert_eq!(
            record.expire_at,
            sample().expire_at + chrono::TimeDelta::milliseconds(500)
        );
    }

    #[test]
    fn validity_is_strict() {
        let record = sample();
        assert!(record.is_valid_at(record.expire_at - chrono::TimeDelta::nanoseconds(1)));
        assert!(!record.is_valid_at(record.expire_at));
    }

    #[test]
    fn unused_and_reserved_bounds() {
        let now = Utc::now();
        assert!(!LeaseRecord::unused(3).is_valid_at(now));
        assert!(LeaseRecord::reserved(0).is_valid_at(now));
    }
}
