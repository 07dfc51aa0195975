// Time and identity source
// Supplies zone-aware timestamps and short random tokens for filenames

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Default length of tokens appended to log filenames
pub const SHORT_ID_LEN: usize = 8;

/// Source of "now" and of opaque identifiers.
///
/// Injected everywhere a timestamp or token is needed so tests can pin both.
pub trait Clock: Send + Sync {
    /// Current time in the configured zone
    fn now(&self) -> DateTime<FixedOffset>;

    /// Random lowercase alphanumeric token of `length` characters
    fn short_id(&self, length: usize) -> String;
}

/// Wall clock bound to an IANA timezone
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        SystemClock { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.tz).fixed_offset()
    }

    fn short_id(&self, length: usize) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(length)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect()
    }
}

/// Clock frozen at one instant with a fixed token, for tests and replays
#[derive(Debug, Clone)]
pub struct FixedClock {
    pub now: DateTime<FixedOffset>,
    pub id: String,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>, id: impl Into<String>) -> Self {
        FixedClock { now, id: id.into() }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }

    fn short_id(&self, length: usize) -> String {
        self.id.chars().take(length).collect()
    }
}
