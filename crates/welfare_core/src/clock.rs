//! Injectable wall clock.
//!
//! All audit timestamps and undo deadlines are Unix epoch milliseconds taken
//! from a [`Clock`], so tests can move time explicitly instead of sleeping.

use chrono::{DateTime, Local, NaiveDate, SecondsFormat, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Clock backed by the operating system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

/// Manually driven clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance_ms(secs.saturating_mul(1000));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Renders epoch milliseconds as an RFC 3339 UTC string with millisecond
/// precision, e.g. `2024-03-01T08:30:00.000Z`.
pub fn to_iso8601(epoch_ms: i64) -> String {
    utc_datetime(epoch_ms).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Returns the `YYYY-MM-DD` UTC date used in export file names.
pub fn date_stamp(epoch_ms: i64) -> String {
    utc_datetime(epoch_ms).format("%Y-%m-%d").to_string()
}

/// Returns the calendar day of `epoch_ms` in the local time zone.
pub fn local_day(epoch_ms: i64) -> Option<NaiveDate> {
    Local
        .timestamp_millis_opt(epoch_ms)
        .single()
        .map(|datetime| datetime.date_naive())
}

fn utc_datetime(epoch_ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(epoch_ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
