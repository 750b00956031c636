//! Rolling frame-time and input-latency monitor.
//!
//! Fed with frame timestamps and pointer-to-paint latencies; reports
//! averages over fixed windows and compares against a captured baseline.

use std::collections::VecDeque;
use std::time::Duration;

/// Frames kept for the frame-time average.
pub const FRAME_WINDOW: usize = 60;
/// Latency samples kept for the latency average.
pub const LATENCY_WINDOW: usize = 30;
/// A frame longer than this counts as dropped.
pub const DROPPED_FRAME_THRESHOLD: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerformanceReport {
    pub fps: f64,
    pub avg_frame_time: Duration,
    pub avg_input_latency: Duration,
    pub max_input_latency: Duration,
    pub dropped_frames: u64,
}

/// Difference between the current report and the baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceDelta {
    /// Positive when faster than the baseline.
    pub fps: f64,
    /// Positive when latency grew, in milliseconds.
    pub input_latency_ms: f64,
    pub dropped_frames: i64,
}

#[derive(Debug, Clone, Default)]
pub struct PerformanceMonitor {
    frame_times: VecDeque<Duration>,
    latencies: VecDeque<Duration>,
    last_frame: Option<Duration>,
    dropped_frames: u64,
    baseline: Option<PerformanceReport>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            frame_times: VecDeque::with_capacity(FRAME_WINDOW),
            latencies: VecDeque::with_capacity(LATENCY_WINDOW),
            ..Self::default()
        }
    }

    /// Record a frame presented at `now` (scheduler time).
    pub fn record_frame(&mut self, now: Duration) {
        if let Some(last) = self.last_frame.replace(now) {
            let frame = now.saturating_sub(last);
            if frame > DROPPED_FRAME_THRESHOLD {
                self.dropped_frames += 1;
            }
            push_bounded(&mut self.frame_times, frame, FRAME_WINDOW);
        }
    }

    pub fn record_input_latency(&mut self, latency: Duration) {
        push_bounded(&mut self.latencies, latency, LATENCY_WINDOW);
    }

    pub fn report(&self) -> PerformanceReport {
        let avg_frame_time = average(&self.frame_times);
        let fps = if avg_frame_time.is_zero() {
            0.0
        } else {
            1.0 / avg_frame_time.as_secs_f64()
        };
        PerformanceReport {
            fps,
            avg_frame_time,
            avg_input_latency: average(&self.latencies),
            max_input_latency: self.latencies.iter().max().copied().unwrap_or_default(),
            dropped_frames: self.dropped_frames,
        }
    }

    /// Remember the current report for later comparison.
    pub fn capture_baseline(&mut self) -> PerformanceReport {
        let report = self.report();
        self.baseline = Some(report);
        report
    }

    pub fn baseline(&self) -> Option<PerformanceReport> {
        self.baseline
    }

    pub fn compare_to_baseline(&self) -> Option<PerformanceDelta> {
        let base = self.baseline?;
        let now = self.report();
        Some(PerformanceDelta {
            fps: now.fps - base.fps,
            input_latency_ms: (now.avg_input_latency.as_secs_f64()
                - base.avg_input_latency.as_secs_f64())
                * 1000.0,
            dropped_frames: now.dropped_frames as i64 - base.dropped_frames as i64,
        })
    }

    /// Clear the windows and counters; the baseline survives.
    pub fn reset(&mut self) {
        self.frame_times.clear();
        self.latencies.clear();
        self.last_frame = None;
        self.dropped_frames = 0;
    }
}

fn push_bounded(window: &mut VecDeque<Duration>, value: Duration, cap: usize) {
    if window.len() == cap {
        window.pop_front();
    }
    window.push_back(value);
}

fn average(window: &VecDeque<Duration>) -> Duration {
    if window.is_empty() {
        return Duration::ZERO;
    }
    window.iter().sum::<Duration>() / window.len() as u32
}
