use chrono::{DateTime, SecondsFormat, Utc};

/// Creation instant of a record, kept in both representations a record needs:
/// the millisecond clock for its id and the ISO string for `createdAt`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Stamp {
    pub at: DateTime<Utc>,
}

impl Stamp {
    pub fn now() -> Self {
        Stamp { at: Utc::now() }
    }

    pub fn millis(&self) -> i64 {
        self.at.timestamp_millis()
    }

    /// `2024-05-01T19:00:00.000Z`
    pub fn iso(&self) -> String {
        self.at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl From<DateTime<Utc>> for Stamp {
    fn from(at: DateTime<Utc>) -> Self {
        Stamp { at }
    }
}
