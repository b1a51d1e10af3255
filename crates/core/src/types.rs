/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Layer id → pen number, as resolved by the caller before job creation.
pub type PenMapping = std::collections::BTreeMap<u32, u32>;
