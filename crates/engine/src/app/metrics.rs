use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Frame loop throughput over one reporting interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    /// Frames in the interval that hit the tick cap and dropped backlog.
    pub backlog_frames: u32,
    pub dropped_backlog_ms: f32,
    pub entity_count: usize,
}

impl LoopMetricsSnapshot {
    pub fn with_entity_count(mut self, entity_count: usize) -> Self {
        self.entity_count = entity_count;
        self
    }
}

/// Latest published snapshot, shared with whoever drives or observes the loop.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Rc<Cell<LoopMetricsSnapshot>>,
    published: Rc<Cell<u64>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        self.latest.get()
    }

    /// Number of snapshots published so far.
    pub fn published_count(&self) -> u64 {
        self.published.get()
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        self.latest.set(snapshot);
        self.published.set(self.published.get().saturating_add(1));
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    frames: u32,
    ticks: u32,
    frame_time_sum: Duration,
    backlog_frames: u32,
    dropped_backlog: Duration,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    fn starting_at(interval_start: Instant, interval: Duration) -> Self {
        Self {
            interval_start,
            interval,
            frames: 0,
            ticks: 0,
            frame_time_sum: Duration::ZERO,
            backlog_frames: 0,
            dropped_backlog: Duration::ZERO,
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration, ticks_run: u32, dropped_backlog: Duration) {
        self.frames = self.frames.saturating_add(1);
        self.ticks = self.ticks.saturating_add(ticks_run);
        self.frame_time_sum = self.frame_time_sum.saturating_add(frame_dt);
        if !dropped_backlog.is_zero() {
            self.backlog_frames = self.backlog_frames.saturating_add(1);
            self.dropped_backlog = self.dropped_backlog.saturating_add(dropped_backlog);
        }
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = match self.frames {
            0 => 0.0,
            frames => self.frame_time_sum.as_secs_f32() * 1000.0 / frames as f32,
        };
        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / elapsed_seconds,
            tps: self.ticks as f32 / elapsed_seconds,
            frame_time_ms,
            backlog_frames: self.backlog_frames,
            dropped_backlog_ms: self.dropped_backlog.as_secs_f32() * 1000.0,
            entity_count: 0,
        };

        *self = Self::starting_at(now, self.interval);
        Some(snapshot)
    }
}
