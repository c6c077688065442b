use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::input::InputSource;
use super::metrics::MetricsAccumulator;
use super::scene::SceneRuntime;
use super::{MetricsHandle, Scene, SceneCommand, SceneWorld};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Sleep between frames so simulated time tracks wall-clock time.
    RealTime,
    /// Feed exactly one fixed tick of time per frame without sleeping.
    Unthrottled,
}

impl Pacing {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "realtime" | "real_time" => Some(Self::RealTime),
            "fast" | "unthrottled" => Some(Self::Unthrottled),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::RealTime => "realtime",
            Self::Unthrottled => "fast",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub pacing: Pacing,
    /// Simulated time after which `run_app` stops on its own.
    pub max_run_duration: Option<Duration>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            pacing: Pacing::RealTime,
            max_run_duration: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    QuitRequested,
    DurationElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutcome {
    pub ticks_run: u32,
    pub quit_requested: bool,
    pub dropped_backlog: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames: u64,
    pub ticks: u64,
    pub simulated: Duration,
    pub final_entity_count: usize,
    pub reason: ShutdownReason,
}

/// Fixed-step driver for a single scene.
///
/// Each call to [`FrameLoop::advance_frame`] adds the clamped frame delta to
/// an accumulator and runs as many fixed ticks as fit, up to
/// `max_ticks_per_frame`. Backlog beyond the cap is dropped. After every tick
/// the scene world's pending commands are drained.
pub struct FrameLoop {
    runtime: SceneRuntime,
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    accumulator: Duration,
    total_ticks: u64,
}

impl FrameLoop {
    pub fn new(config: &LoopConfig, scene: Box<dyn Scene>) -> Self {
        let target_tps = config.target_tps.max(1);
        Self {
            runtime: SceneRuntime::new(scene),
            fixed_dt: Duration::from_secs_f64(1.0 / target_tps as f64),
            max_frame_delta: normalize_non_zero_duration(
                config.max_frame_delta,
                Duration::from_millis(250),
            ),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            accumulator: Duration::ZERO,
            total_ticks: 0,
        }
    }

    pub fn load(&mut self) {
        self.runtime.load();
        info!(
            entity_count = self.runtime.world().entity_count(),
            "scene_loaded"
        );
    }

    pub fn advance_frame(&mut self, raw_dt: Duration, input: &mut dyn InputSource) -> FrameOutcome {
        let clamped = clamp_frame_delta(raw_dt, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped);

        let plan = plan_sim_steps(self.accumulator, self.fixed_dt, self.max_ticks_per_frame);
        let fixed_dt_seconds = self.fixed_dt.as_secs_f32();
        let mut outcome = FrameOutcome {
            ticks_run: 0,
            quit_requested: false,
            dropped_backlog: plan.dropped_backlog,
        };

        for _ in 0..plan.ticks_to_run {
            let snapshot = input.poll(self.runtime.world());
            let command = self.runtime.update(fixed_dt_seconds, &snapshot);
            self.total_ticks = self.total_ticks.saturating_add(1);
            outcome.ticks_run += 1;
            if command == SceneCommand::Quit || snapshot.quit_requested() {
                outcome.quit_requested = true;
                break;
            }
        }
        self.accumulator = plan.remaining_accumulator;

        if plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }
        outcome
    }

    pub fn shutdown(&mut self) {
        self.runtime.shutdown();
    }

    pub fn world(&self) -> &SceneWorld {
        self.runtime.world()
    }

    pub fn debug_title(&self) -> Option<String> {
        self.runtime.debug_title()
    }

    pub fn fixed_dt(&self) -> Duration {
        self.fixed_dt
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn simulated_time(&self) -> Duration {
        self.fixed_dt
            .saturating_mul(u32::try_from(self.total_ticks).unwrap_or(u32::MAX))
    }
}

pub fn run_app(config: LoopConfig, scene: Box<dyn Scene>, input: &mut dyn InputSource) -> LoopSummary {
    run_app_with_metrics(config, scene, input, MetricsHandle::default())
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    scene: Box<dyn Scene>,
    input: &mut dyn InputSource,
    metrics_handle: MetricsHandle,
) -> LoopSummary {
    let mut frame_loop = FrameLoop::new(&config, scene);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    info!(
        target_tps = config.target_tps.max(1),
        max_frame_delta_ms = frame_loop.max_frame_delta.as_millis() as u64,
        max_ticks_per_frame = frame_loop.max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        pacing = config.pacing.label(),
        max_run_ms = config.max_run_duration.map(|limit| limit.as_millis() as u64),
        "loop_config"
    );
    frame_loop.load();

    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut last_frame_instant = Instant::now();
    let mut last_title: Option<String> = None;
    let mut frames = 0u64;

    let reason = loop {
        let raw_frame_dt = match config.pacing {
            Pacing::RealTime => {
                let elapsed = Instant::now().saturating_duration_since(last_frame_instant);
                let sleep = compute_pacing_sleep(elapsed, frame_loop.fixed_dt());
                if sleep > Duration::ZERO {
                    thread::sleep(sleep);
                }
                let now = Instant::now();
                let raw = now.saturating_duration_since(last_frame_instant);
                last_frame_instant = now;
                raw
            }
            Pacing::Unthrottled => frame_loop.fixed_dt(),
        };

        let outcome = frame_loop.advance_frame(raw_frame_dt, input);
        frames = frames.saturating_add(1);
        metrics_accumulator.record_frame(raw_frame_dt, outcome.ticks_run, outcome.dropped_backlog);

        let next_title = frame_loop.debug_title();
        if next_title != last_title {
            if let Some(title) = &next_title {
                debug!(title = title.as_str(), "hud_changed");
            }
            last_title = next_title;
        }

        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now()) {
            let snapshot = snapshot.with_entity_count(frame_loop.world().entity_count());
            metrics_handle.publish(snapshot);
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                backlog_frames = snapshot.backlog_frames,
                dropped_backlog_ms = snapshot.dropped_backlog_ms,
                entity_count = snapshot.entity_count,
                "loop_metrics"
            );
        }

        if outcome.quit_requested {
            info!(reason = "quit", "shutdown_requested");
            break ShutdownReason::QuitRequested;
        }
        if let Some(limit) = config.max_run_duration {
            if frame_loop.simulated_time() >= limit {
                info!(reason = "duration_elapsed", "shutdown_requested");
                break ShutdownReason::DurationElapsed;
            }
        }
    };

    let summary = LoopSummary {
        frames,
        ticks: frame_loop.total_ticks(),
        simulated: frame_loop.simulated_time(),
        final_entity_count: frame_loop.world().entity_count(),
        reason,
    };
    frame_loop.shutdown();
    info!(
        frames = summary.frames,
        ticks = summary.ticks,
        simulated_ms = summary.simulated.as_millis() as u64,
        "shutdown"
    );
    summary
}

struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn compute_pacing_sleep(elapsed: Duration, frame_target: Duration) -> Duration {
    frame_target.saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::app::{InputAction, InputSnapshot, SpawnRequest, Transform, Vec2};

    struct CountingScene {
        ticks: Rc<Cell<u32>>,
        quit_after: Option<u32>,
    }

    impl Scene for CountingScene {
        fn load(&mut self, world: &mut SceneWorld) {
            world.spawn(SpawnRequest {
                prototype: "counter".to_string(),
                transform: Transform::at(Vec2::ZERO),
                half_extents: Vec2::new(0.5, 0.5),
            });
        }

        fn update(
            &mut self,
            _fixed_dt_seconds: f32,
            _input: &InputSnapshot,
            _world: &mut SceneWorld,
        ) -> SceneCommand {
            self.ticks.set(self.ticks.get() + 1);
            match self.quit_after {
                Some(limit) if self.ticks.get() >= limit => SceneCommand::Quit,
                _ => SceneCommand::None,
            }
        }

        fn unload(&mut self, _world: &mut SceneWorld) {}
    }

    struct ScriptedInput {
        quit_on_poll: u32,
        polls: u32,
    }

    impl InputSource for ScriptedInput {
        fn poll(&mut self, _world: &SceneWorld) -> InputSnapshot {
            self.polls += 1;
            InputSnapshot::empty().with_action_pressed(InputAction::Quit, self.polls == self.quit_on_poll)
        }
    }

    fn counting_loop(quit_after: Option<u32>) -> (FrameLoop, Rc<Cell<u32>>) {
        let ticks = Rc::new(Cell::new(0));
        let scene = CountingScene {
            ticks: Rc::clone(&ticks),
            quit_after,
        };
        let config = LoopConfig {
            target_tps: 50,
            ..LoopConfig::default()
        };
        (FrameLoop::new(&config, Box::new(scene)), ticks)
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        let raw_frame_dt = Duration::from_millis(600);

        assert_eq!(
            clamp_frame_delta(raw_frame_dt, max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(48), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn normalize_zero_duration_uses_fallback() {
        assert_eq!(
            normalize_non_zero_duration(Duration::ZERO, Duration::from_secs(1)),
            Duration::from_secs(1)
        );
        assert_eq!(
            normalize_non_zero_duration(Duration::from_millis(5), Duration::from_secs(1)),
            Duration::from_millis(5)
        );
    }

    #[test]
    fn pacing_sleep_is_zero_when_over_budget() {
        let target = Duration::from_millis(20);
        assert_eq!(
            compute_pacing_sleep(Duration::from_millis(25), target),
            Duration::ZERO
        );
        assert_eq!(
            compute_pacing_sleep(Duration::from_millis(5), target),
            Duration::from_millis(15)
        );
    }

    #[test]
    fn pacing_labels_parse() {
        assert_eq!(Pacing::from_label("fast"), Some(Pacing::Unthrottled));
        assert_eq!(Pacing::from_label(" RealTime "), Some(Pacing::RealTime));
        assert_eq!(Pacing::from_label("warp"), None);
    }

    #[test]
    fn advance_frame_carries_remainder_between_frames() {
        let (mut frame_loop, ticks) = counting_loop(None);
        frame_loop.load();
        let mut input = crate::app::IdleInput;

        let first = frame_loop.advance_frame(Duration::from_millis(30), &mut input);
        let second = frame_loop.advance_frame(Duration::from_millis(10), &mut input);

        assert_eq!(first.ticks_run, 1);
        assert_eq!(second.ticks_run, 1);
        assert_eq!(ticks.get(), 2);
        assert_eq!(frame_loop.total_ticks(), 2);
        assert_eq!(frame_loop.world().entity_count(), 1);
    }

    #[test]
    fn scene_quit_stops_remaining_ticks_in_frame() {
        let (mut frame_loop, ticks) = counting_loop(Some(2));
        frame_loop.load();
        let mut input = crate::app::IdleInput;

        let outcome = frame_loop.advance_frame(Duration::from_millis(100), &mut input);

        assert!(outcome.quit_requested);
        assert_eq!(outcome.ticks_run, 2);
        assert_eq!(ticks.get(), 2);
    }

    #[test]
    fn quit_input_stops_frame() {
        let (mut frame_loop, _ticks) = counting_loop(None);
        frame_loop.load();
        let mut input = ScriptedInput {
            quit_on_poll: 1,
            polls: 0,
        };

        let outcome = frame_loop.advance_frame(Duration::from_millis(60), &mut input);

        assert!(outcome.quit_requested);
        assert_eq!(outcome.ticks_run, 1);
    }

    #[test]
    fn unthrottled_run_stops_after_simulated_duration() {
        let ticks = Rc::new(Cell::new(0));
        let scene = CountingScene {
            ticks: Rc::clone(&ticks),
            quit_after: None,
        };
        let config = LoopConfig {
            target_tps: 50,
            pacing: Pacing::Unthrottled,
            max_run_duration: Some(Duration::from_secs(2)),
            ..LoopConfig::default()
        };
        let mut input = crate::app::IdleInput;

        let summary = run_app(config, Box::new(scene), &mut input);

        assert_eq!(summary.reason, ShutdownReason::DurationElapsed);
        assert_eq!(summary.ticks, 100);
        assert_eq!(ticks.get(), 100);
        assert_eq!(summary.final_entity_count, 1);
    }

    #[test]
    fn metrics_handle_receives_snapshots_during_run() {
        let scene = CountingScene {
            ticks: Rc::new(Cell::new(0)),
            quit_after: Some(50),
        };
        let config = LoopConfig {
            target_tps: 50,
            pacing: Pacing::Unthrottled,
            metrics_log_interval: Duration::from_nanos(1),
            ..LoopConfig::default()
        };
        let handle = MetricsHandle::default();
        let mut input = crate::app::IdleInput;

        let summary = run_app_with_metrics(config, Box::new(scene), &mut input, handle.clone());

        assert_eq!(summary.reason, ShutdownReason::QuitRequested);
        assert!(handle.published_count() > 0);
        assert_eq!(handle.snapshot().entity_count, 1);
        assert_eq!(handle.snapshot().backlog_frames, 0);
    }
}
