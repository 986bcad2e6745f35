//! Injectable clock for reproducible ISO-8601 timestamps.
//!
//! Per the "deterministic clock" design note: date strings written into
//! tracked-change (`w:date`) and comment (`w:date`) attributes must come
//! from an injected clock rather than a bare `chrono::Utc::now()` call, so
//! that tests produce stable output. The teacher has no equivalent (it never
//! writes timestamps of its own), so this is grounded on the
//! `RevisionSettings` pattern in the `redline-rs` port, which also threads a
//! `date_time: String` through revision-creation calls rather than calling
//! the system clock inline.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_iso8601(&self) -> String {
        self.now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

/// Reads the real wall clock. The default for production use.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns a fixed instant. Used in tests and anywhere reproducible
/// output is required (e.g. snapshot comparisons of generated markup).
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_formats_iso8601() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        assert_eq!(clock.now_iso8601(), "2024-01-02T03:04:05Z");
    }
}
