//! Server Statistics
//!
//! A process-wide registry of counters shared by every connection and
//! reported by the `stats` command.
//!
//! Counters are plain `AtomicU64`s updated with `Ordering::Relaxed`: no
//! counter depends on another, so a `stats` reply is a best-effort snapshot
//! that may be slightly out of step with concurrent updates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const NUM_COUNTERS: usize = 7;

/// Well-known counters kept by the connection handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Connections accepted since start
    TotalConnections,
    /// Connections currently open
    CurrConnections,
    /// Retrieval commands
    CmdGet,
    /// Storage commands with a well-formed data block
    CmdSet,
    /// Delete commands
    CmdDelete,
    /// Lookups that found an item
    GetHits,
    /// Lookups that found nothing
    GetMisses,
}

impl Counter {
    /// Every counter, in registry order.
    pub const ALL: [Counter; NUM_COUNTERS] = [
        Counter::TotalConnections,
        Counter::CurrConnections,
        Counter::CmdGet,
        Counter::CmdSet,
        Counter::CmdDelete,
        Counter::GetHits,
        Counter::GetMisses,
    ];

    /// Name reported on the `STAT` line.
    pub fn name(self) -> &'static str {
        match self {
            Counter::TotalConnections => "total_connections",
            Counter::CurrConnections => "curr_connections",
            Counter::CmdGet => "cmd_get",
            Counter::CmdSet => "cmd_set",
            Counter::CmdDelete => "cmd_delete",
            Counter::GetHits => "get_hits",
            Counter::GetMisses => "get_misses",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// The statistics registry.
///
/// Wrap it in an `Arc` and hand the same instance to every connection.
#[derive(Debug)]
pub struct Stats {
    started: Instant,
    counters: [AtomicU64; NUM_COUNTERS],
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            counters: Default::default(),
        }
    }

    pub fn increment(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, n: u64) {
        self.counters[counter.index()].fetch_add(n, Ordering::Relaxed);
    }

    pub fn decrement(&self, counter: Counter) {
        self.counters[counter.index()].fetch_sub(1, Ordering::Relaxed);
    }

    /// Current value of `counter`.
    pub fn get(&self, counter: Counter) -> u64 {
        self.counters[counter.index()].load(Ordering::Relaxed)
    }

    pub fn connection_opened(&self) {
        self.increment(Counter::TotalConnections);
        self.increment(Counter::CurrConnections);
    }

    pub fn connection_closed(&self) {
        self.decrement(Counter::CurrConnections);
    }

    /// Seconds since the registry was created.
    pub fn uptime(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Takes a snapshot of every statistic as `(name, value)` pairs, sorted
    /// by name.
    ///
    /// Besides the counters this includes `pid`, `uptime`, `time` (Unix
    /// seconds) and `version`, computed at call time.
    pub fn snapshot(&self) -> Vec<(&'static str, String)> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut stats: Vec<(&'static str, String)> = vec![
            ("pid", std::process::id().to_string()),
            ("uptime", self.uptime().to_string()),
            ("time", now.to_string()),
            ("version", crate::VERSION.to_string()),
        ];
        stats.extend(
            Counter::ALL
                .iter()
                .map(|&c| (c.name(), self.get(c).to_string())),
        );
        stats.sort_unstable_by_key(|(name, _)| *name);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn lookup<'a>(snapshot: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        snapshot
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_counters_start_at_zero() {
        let stats = Stats::new();
        for counter in Counter::ALL {
            assert_eq!(stats.get(counter), 0);
        }
    }

    #[test]
    fn test_increment_and_decrement() {
        let stats = Stats::new();
        stats.increment(Counter::CmdGet);
        stats.add(Counter::CmdGet, 2);
        assert_eq!(stats.get(Counter::CmdGet), 3);

        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();
        assert_eq!(stats.get(Counter::TotalConnections), 2);
        assert_eq!(stats.get(Counter::CurrConnections), 1);
    }

    #[test]
    fn test_snapshot_contents() {
        let stats = Stats::new();
        stats.increment(Counter::GetHits);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.len(), NUM_COUNTERS + 4);
        assert_eq!(lookup(&snapshot, "get_hits"), Some("1"));
        assert_eq!(lookup(&snapshot, "get_misses"), Some("0"));
        assert_eq!(lookup(&snapshot, "version"), Some(crate::VERSION));
        assert_eq!(
            lookup(&snapshot, "pid"),
            Some(std::process::id().to_string().as_str())
        );

        let names: Vec<&str> = snapshot.iter().map(|(n, _)| *n).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_concurrent_increments() {
        let stats = Arc::new(Stats::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.increment(Counter::CmdSet);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.get(Counter::CmdSet), 8000);
    }
}
