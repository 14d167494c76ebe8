//! Tick timing statistics
//!
//! Collects how long each render tick took and how often ticks happen.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Tick timing statistics
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    /// Average tick time in milliseconds
    pub avg_ms: f64,
    /// Minimum tick time in milliseconds
    pub min_ms: f64,
    /// Maximum tick time in milliseconds
    pub max_ms: f64,
    /// 50th percentile (median) tick time
    pub p50_ms: f64,
    /// 95th percentile tick time
    pub p95_ms: f64,
    /// 99th percentile tick time
    pub p99_ms: f64,
    /// Number of samples in the statistics
    pub sample_count: usize,
}

impl std::fmt::Display for FrameStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "avg {:.2} ms, min {:.2}, max {:.2}, p95 {:.2} ({} samples)",
            self.avg_ms, self.min_ms, self.max_ms, self.p95_ms, self.sample_count
        )
    }
}

/// Tick profiler
///
/// `begin_frame` / `end_frame` bracket the work of one tick; the gaps between
/// `begin_frame` calls give the tick rate.
pub struct FrameProfiler {
    /// Work durations
    frame_times: VecDeque<Duration>,
    /// Maximum samples to keep (10 seconds at 30fps)
    max_samples: usize,
    /// Start of the tick in progress
    current_start: Option<Instant>,
    /// Tick start times for FPS calculation
    frame_starts: VecDeque<Instant>,
}

impl Default for FrameProfiler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameProfiler {
    pub fn new() -> Self {
        Self::with_capacity(300)
    }

    pub fn with_capacity(max_samples: usize) -> Self {
        let max_samples = max_samples.max(2);
        Self {
            frame_times: VecDeque::with_capacity(max_samples),
            max_samples,
            current_start: None,
            frame_starts: VecDeque::with_capacity(max_samples),
        }
    }

    /// Mark the start of a tick
    pub fn begin_frame(&mut self) {
        self.begin_frame_at(Instant::now());
    }

    pub fn begin_frame_at(&mut self, now: Instant) {
        self.current_start = Some(now);
        self.frame_starts.push_back(now);
        if self.frame_starts.len() > self.max_samples {
            self.frame_starts.pop_front();
        }
    }

    /// Mark the end of the tick started by the last `begin_frame`
    pub fn end_frame(&mut self) {
        self.end_frame_at(Instant::now());
    }

    pub fn end_frame_at(&mut self, now: Instant) {
        if let Some(start) = self.current_start.take() {
            self.record(now.saturating_duration_since(start));
        }
    }

    /// Record a tick duration directly
    pub fn record(&mut self, duration: Duration) {
        self.frame_times.push_back(duration);
        if self.frame_times.len() > self.max_samples {
            self.frame_times.pop_front();
        }
    }

    /// Get tick timing statistics
    pub fn stats(&self) -> FrameStats {
        if self.frame_times.is_empty() {
            return FrameStats::default();
        }

        let mut times: Vec<f64> = self
            .frame_times
            .iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .collect();
        times.sort_by(|a, b| a.total_cmp(b));

        let sum: f64 = times.iter().sum();
        let count = times.len() as f64;

        FrameStats {
            avg_ms: sum / count,
            min_ms: times.first().copied().unwrap_or(0.0),
            max_ms: times.last().copied().unwrap_or(0.0),
            p50_ms: percentile(&times, 0.50),
            p95_ms: percentile(&times, 0.95),
            p99_ms: percentile(&times, 0.99),
            sample_count: times.len(),
        }
    }

    /// Tick rate over the sample window
    pub fn fps(&self) -> f64 {
        let (Some(first), Some(last)) = (self.frame_starts.front(), self.frame_starts.back()) else {
            return 0.0;
        };
        let duration = last.saturating_duration_since(*first).as_secs_f64();
        if duration > 0.0 {
            (self.frame_starts.len() - 1) as f64 / duration
        } else {
            0.0
        }
    }

    /// Drop all samples
    pub fn reset(&mut self) {
        self.frame_times.clear();
        self.frame_starts.clear();
        self.current_start = None;
    }
}

/// Calculate percentile from sorted array
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p) as usize;
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_profiler() {
        let mut profiler = FrameProfiler::new();
        let start = Instant::now();

        for i in 0..10u64 {
            let t = start + Duration::from_millis(i * 33);
            profiler.begin_frame_at(t);
            profiler.end_frame_at(t + Duration::from_millis(5 + i));
        }

        let stats = profiler.stats();
        assert_eq!(stats.sample_count, 10);
        assert!((stats.min_ms - 5.0).abs() < 1e-9);
        assert!((stats.max_ms - 14.0).abs() < 1e-9);
        assert!((stats.avg_ms - 9.5).abs() < 1e-9);
        assert!((profiler.fps() - 1000.0 / 33.0).abs() < 0.01);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut profiler = FrameProfiler::with_capacity(4);
        for ms in 1..=10 {
            profiler.record(Duration::from_millis(ms));
        }
        let stats = profiler.stats();
        assert_eq!(stats.sample_count, 4);
        assert!((stats.min_ms - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_profiler() {
        let mut profiler = FrameProfiler::new();
        profiler.end_frame();
        assert_eq!(profiler.stats().sample_count, 0);
        assert_eq!(profiler.fps(), 0.0);
    }

    #[test]
    fn test_percentile() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(percentile(&values, 0.5), 5.0);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 1.0), 10.0);
    }
}
