use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RepoError;

/// A UTC instant, convertible to the native `TIMESTAMPTZ` representation
/// used by the Postgres backend or the epoch-millisecond integer used by
/// the SQLite backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wrap an existing `DateTime<Utc>`.
    #[must_use]
    pub const fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Borrow the underlying `chrono` value.
    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Convert to epoch milliseconds for the text/integer backend.
    #[must_use]
    pub fn to_epoch_millis(self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Parse epoch milliseconds back into a `Timestamp`. A value outside
    /// the range `chrono` can represent is a fatal corruption, not a
    /// silently-clamped timestamp.
    pub fn from_epoch_millis(millis: i64) -> Result<Self, RepoError> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .map(Self)
            .ok_or_else(|| RepoError::Corruption(format!("invalid epoch-ms timestamp: {millis}")))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_millis_round_trips() {
        let ts = Timestamp::now();
        let millis = ts.to_epoch_millis();
        let restored = Timestamp::from_epoch_millis(millis).unwrap();
        assert_eq!(ts.to_epoch_millis(), restored.to_epoch_millis());
    }
}
