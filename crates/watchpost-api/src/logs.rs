//! Streaming log line messages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds/nanos timestamp, protobuf `Timestamp` layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampWire {
    pub seconds: i64,
    pub nanos: i32,
}

impl From<DateTime<Utc>> for TimestampWire {
    fn from(ts: DateTime<Utc>) -> Self {
        #[allow(clippy::cast_possible_wrap)]
        let nanos = ts.timestamp_subsec_nanos() as i32;
        Self {
            seconds: ts.timestamp(),
            nanos,
        }
    }
}

/// One log line on the `RecordLogs` stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLineWire {
    pub reporter: String,
    pub timestamp: TimestampWire,
    pub line: String,
    pub host: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_timestamp_splits_seconds_and_nanos() {
        let ts = Utc.timestamp_opt(1_700_000_000, 250_000_000).unwrap();
        let wire = TimestampWire::from(ts);

        assert_eq!(wire.seconds, 1_700_000_000);
        assert_eq!(wire.nanos, 250_000_000);
    }
}
