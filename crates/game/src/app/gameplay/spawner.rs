use std::cell::Cell;
use std::rc::Rc;

use runner_engine::{HandlerError, Subscription, Transform};
use tracing::{debug, warn};

use super::events::{EntityHandle, GameEvent, Topic};
use super::lifecycle::{EntityLifecycleTracker, SharedFactory};
use super::state::{ConfigKey, StateStore};

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnSettings {
    pub prototype: String,
    pub transform: Transform,
    pub initial_interval: f32,
    pub min_interval: f32,
    pub max_interval: f32,
    pub time_discount: f32,
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            prototype: "runner.enemy".to_string(),
            transform: Transform::default(),
            initial_interval: 3.0,
            min_interval: 1.0,
            max_interval: 100.0,
            time_discount: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct IntervalRule {
    initial: f32,
    min: f32,
    max: f32,
    discount: f32,
}

impl IntervalRule {
    fn from_settings(settings: &SpawnSettings) -> Self {
        Self {
            initial: settings.initial_interval,
            min: settings.min_interval,
            max: settings.max_interval,
            discount: settings.time_discount,
        }
    }

    // max/min rather than clamp: misordered bounds must not panic.
    fn shrink(self, interval: f32) -> f32 {
        (interval - self.discount).max(self.min).min(self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SpawnTiming {
    timer: f32,
    spawn_interval: f32,
}

/// Timer-driven spawner for one spawn point.
///
/// Reacts to `VelocityScale` changes by shrinking its interval and to `Start`
/// changes by clearing its tracker (false) or restoring its initial interval
/// (true).
pub struct SpawnScheduler {
    label: String,
    settings: SpawnSettings,
    store: Rc<StateStore>,
    factory: SharedFactory,
    tracker: Rc<EntityLifecycleTracker>,
    timing: Rc<Cell<SpawnTiming>>,
    _config_subscription: Subscription<GameEvent>,
}

impl SpawnScheduler {
    pub fn new(
        label: impl Into<String>,
        settings: SpawnSettings,
        store: Rc<StateStore>,
        factory: SharedFactory,
    ) -> Self {
        let label = label.into();
        let rule = IntervalRule::from_settings(&settings);
        let tracker =
            EntityLifecycleTracker::new(label.clone(), Rc::clone(store.bus()), Rc::clone(&factory));
        let timing = Rc::new(Cell::new(SpawnTiming {
            timer: 0.0,
            spawn_interval: rule.initial,
        }));

        let handler_timing = Rc::clone(&timing);
        let handler_tracker = Rc::clone(&tracker);
        let handler_label = label.clone();
        let config_subscription =
            store
                .bus()
                .subscribe_scoped(Topic::ConfigurationChanged, move |event| {
                    let GameEvent::ConfigurationChanged { key, value } = event else {
                        return Ok(());
                    };
                    match key {
                        ConfigKey::VelocityScale => {
                            let mut timing = handler_timing.get();
                            timing.spawn_interval = rule.shrink(timing.spawn_interval);
                            handler_timing.set(timing);
                            debug!(
                                spawner = handler_label.as_str(),
                                spawn_interval = timing.spawn_interval,
                                "spawn_interval_shrunk"
                            );
                        }
                        ConfigKey::Start => match value.as_bool() {
                            Some(false) => {
                                handler_tracker.clear_all();
                            }
                            Some(true) => {
                                handler_timing.set(SpawnTiming {
                                    timer: 0.0,
                                    spawn_interval: rule.initial,
                                });
                            }
                            None => {
                                return Err(HandlerError::new(format!(
                                    "spawner {handler_label} got non-bool Start value {value}"
                                )))
                            }
                        },
                        _ => {}
                    }
                    Ok(())
                });

        Self {
            label,
            settings,
            store,
            factory,
            tracker,
            timing,
            _config_subscription: config_subscription,
        }
    }

    /// Advances the spawn timer. Returns the handle of an entity spawned on
    /// this tick, if any. A factory failure keeps the timer so the next tick
    /// retries.
    pub fn tick(&self, delta_seconds: f32) -> Option<EntityHandle> {
        if !self.store.is_running() {
            return None;
        }

        let mut timing = self.timing.get();
        timing.timer += delta_seconds.max(0.0);
        if timing.timer < timing.spawn_interval {
            self.timing.set(timing);
            return None;
        }

        let result = self
            .factory
            .borrow_mut()
            .instantiate(&self.settings.prototype, self.settings.transform);
        match result {
            Ok(handle) => {
                timing.timer = 0.0;
                self.timing.set(timing);
                self.tracker.add(handle);
                Some(handle)
            }
            Err(err) => {
                self.timing.set(timing);
                warn!(
                    spawner = self.label.as_str(),
                    prototype = self.settings.prototype.as_str(),
                    error = %err,
                    "spawn_failed"
                );
                None
            }
        }
    }

    pub fn spawn_interval(&self) -> f32 {
        self.timing.get().spawn_interval
    }

    pub fn timer(&self) -> f32 {
        self.timing.get().timer
    }

    pub fn live_count(&self) -> usize {
        self.tracker.live_count()
    }

    pub fn tracker(&self) -> &Rc<EntityLifecycleTracker> {
        &self.tracker
    }

    pub fn settings(&self) -> &SpawnSettings {
        &self.settings
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}
