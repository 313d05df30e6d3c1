//! Wall-clock access for timestamps and filenames.
//!
//! The renderer never calls `Local::now()` directly; it asks an injected
//! [`Clock`] so tests can pin the status-bar time, the bubble timestamp and the
//! generated filename.

use chrono::{DateTime, FixedOffset, Local};

pub trait Clock: Send + Sync {
    /// Current local time, with the offset it was observed in.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Reads the system clock in the local timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl FixedClock {
    /// Parse an RFC 3339 timestamp such as `2024-05-01T14:05:09+02:00`.
    pub fn parse(rfc3339: &str) -> crate::Result<Self> {
        DateTime::parse_from_rfc3339(rfc3339)
            .map(FixedClock)
            .map_err(|e| crate::Error::ConfigError(format!("invalid timestamp {rfc3339}: {e}")))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// `h:mm AM` as shown in the status bar
pub fn status_bar_time(t: &DateTime<FixedOffset>) -> String {
    t.format("%-I:%M %p").to_string()
}

/// `HH:MM:SS` as shown under a message
pub fn message_time(t: &DateTime<FixedOffset>) -> String {
    t.format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_twelve_hour_clock() {
        let c = FixedClock::parse("2024-05-01T00:07:09+00:00").unwrap();
        assert_eq!(status_bar_time(&c.now()), "12:07 AM");
        let c = FixedClock::parse("2024-05-01T14:05:09+00:00").unwrap();
        assert_eq!(status_bar_time(&c.now()), "2:05 PM");
        assert_eq!(message_time(&c.now()), "14:05:09");
    }

    #[test]
    fn rejects_garbage() {
        assert!(FixedClock::parse("yesterday").is_err());
    }
}
