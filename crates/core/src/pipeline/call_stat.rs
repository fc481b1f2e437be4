use std::collections::HashMap;
use std::time::Duration;

/// Weight of the newest sample in the smoothed duration.
const SMOOTHING_ALPHA: f64 = 0.1;

/// Running duration statistics for one labeled phase, in milliseconds.
#[derive(Clone, Debug, PartialEq)]
pub struct CallStat {
    last_ms: f64,
    total_ms: f64,
    /// Exponentially smoothed duration; negative until the first sample.
    smoothed_ms: f64,
    calls: u64,
}

impl Default for CallStat {
    fn default() -> Self {
        Self {
            last_ms: 0.0,
            total_ms: 0.0,
            smoothed_ms: -1.0,
            calls: 0,
        }
    }
}

impl CallStat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.last_ms = ms;
        self.total_ms += ms;
        self.smoothed_ms = if self.smoothed_ms < 0.0 {
            ms
        } else {
            (1.0 - SMOOTHING_ALPHA) * self.smoothed_ms + SMOOTHING_ALPHA * ms
        };
        self.calls += 1;
    }

    pub fn last_ms(&self) -> f64 {
        self.last_ms
    }

    pub fn total_ms(&self) -> f64 {
        self.total_ms
    }

    pub fn smoothed_ms(&self) -> f64 {
        self.smoothed_ms
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn average_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_ms / self.calls as f64
        }
    }
}

/// Named collection of [`CallStat`]s, created on first use.
#[derive(Clone, Debug, Default)]
pub struct Timer {
    stats: HashMap<String, CallStat>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &str, elapsed: Duration) {
        self.entry(name).record(elapsed);
    }

    pub fn get(&self, name: &str) -> Option<&CallStat> {
        self.stats.get(name)
    }

    /// Phase names in alphabetical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stats.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    fn entry(&mut self, name: &str) -> &mut CallStat {
        self.stats.entry(name.to_string()).or_default()
    }
}
