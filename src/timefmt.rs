//! Timestamp helpers.
//!
//! Ledger entries and audit records carry RFC 3339 timestamps pinned to
//! UTC+9, matching the timezone the downstream tooling expects. The offset
//! is fixed, not a tz-database lookup.

use chrono::{DateTime, FixedOffset, Offset, Utc};

const JST_OFFSET_SECONDS: i32 = 9 * 3600;

/// Current time in the fixed UTC+9 offset.
#[must_use]
pub fn jst_now() -> DateTime<FixedOffset> {
    // east_opt only fails for out-of-range offsets; 9h is always valid,
    // but the lint gate forbids unwrap so fall back to UTC.
    let offset = FixedOffset::east_opt(JST_OFFSET_SECONDS).unwrap_or_else(|| Utc.fix());
    Utc::now().with_timezone(&offset)
}

/// Current time as an RFC 3339 string, e.g. `2026-08-27T21:04:05.123+09:00`.
#[must_use]
pub fn jst_timestamp() -> String {
    jst_now().to_rfc3339()
}
