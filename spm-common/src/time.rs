//! Timestamp utilities

use chrono::{DateTime, Local, NaiveDate, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Get today's date on the server's local calendar
///
/// Review schedules are entered as local wall-clock times, so edit windows
/// are compared against the local date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
