/// Jobs are keyed by an opaque string id (UUID v4 for jobs created here).
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Integer code used for enum values on the wire.
pub type WireCode = i16;
