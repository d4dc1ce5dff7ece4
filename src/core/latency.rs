// Latency tracking
// Named start/stop timers with bounded sample histories and summary
// statistics, exportable as CSV for offline analysis

use std::collections::HashMap;
use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

/// Summary statistics over the retained window of one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub count: usize,
    pub min: Duration,
    pub max: Duration,
    pub mean: Duration,
    pub median: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

/// Records elapsed time for named operations.
///
/// Each metric keeps a bounded history; the oldest sample is discarded once
/// the configured capacity is exceeded. Starting the same name twice before
/// stopping overwrites the earlier start (last start wins) — a documented
/// simplification, not a stack.
#[derive(Debug)]
pub struct LatencyTracker {
    capacity: usize,
    pending: HashMap<String, Instant>,
    samples: HashMap<String, VecDeque<Duration>>,
}

impl LatencyTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            pending: HashMap::new(),
            samples: HashMap::new(),
        }
    }

    /// Begin timing `name`.
    pub fn start(&mut self, name: &str) {
        self.pending.insert(name.to_string(), Instant::now());
    }

    /// Finish timing `name`, recording and returning the elapsed duration.
    /// A stop without a matching start is a no-op returning `None`.
    pub fn stop(&mut self, name: &str) -> Option<Duration> {
        let started = self.pending.remove(name)?;
        let elapsed = started.elapsed();
        self.record(name, elapsed);
        Some(elapsed)
    }

    /// Append an externally measured sample.
    pub fn record(&mut self, name: &str, duration: Duration) {
        let history = self
            .samples
            .entry(name.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        history.push_back(duration);
        while history.len() > self.capacity {
            history.pop_front();
        }
    }

    pub fn metric_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.samples.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn sample_count(&self, name: &str) -> usize {
        self.samples.get(name).map_or(0, VecDeque::len)
    }

    /// Summary statistics for `name` over the retained window.
    pub fn statistics(&self, name: &str) -> Option<LatencyStats> {
        let history = self.samples.get(name)?;
        if history.is_empty() {
            return None;
        }

        let mut sorted: Vec<Duration> = history.iter().copied().collect();
        sorted.sort_unstable();

        let count = sorted.len();
        let total: Duration = sorted.iter().sum();

        Some(LatencyStats {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean: total / count as u32,
            median: median(&sorted),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        })
    }

    /// Write one CSV row per metric: name, count, mean, min, max, p50, p95,
    /// p99 (durations in microseconds).
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        writeln!(file, "metric,count,mean_us,min_us,max_us,p50_us,p95_us,p99_us")?;
        for name in self.metric_names() {
            if let Some(stats) = self.statistics(name) {
                writeln!(
                    file,
                    "{},{},{},{},{},{},{},{}",
                    name,
                    stats.count,
                    stats.mean.as_micros(),
                    stats.min.as_micros(),
                    stats.max.as_micros(),
                    stats.median.as_micros(),
                    stats.p95.as_micros(),
                    stats.p99.as_micros(),
                )?;
            }
        }
        Ok(())
    }
}

fn median(sorted: &[Duration]) -> Duration {
    let count = sorted.len();
    if count % 2 == 1 {
        sorted[count / 2]
    } else {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2
    }
}

/// Nearest-rank percentile over an already-sorted sample set.
fn percentile(sorted: &[Duration], pct: f64) -> Duration {
    let count = sorted.len();
    let rank = ((pct / 100.0) * count as f64).ceil() as usize;
    sorted[rank.clamp(1, count) - 1]
}
