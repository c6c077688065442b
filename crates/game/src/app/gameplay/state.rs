use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::events::{publish_logged, GameBus, GameEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigKey {
    Score,
    VelocityScale,
    MaxVelocityScale,
    VelocityAmount,
    VelocityChangeTime,
    CurrentTime,
    Paused,
    Start,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 8] = [
        ConfigKey::Score,
        ConfigKey::VelocityScale,
        ConfigKey::MaxVelocityScale,
        ConfigKey::VelocityAmount,
        ConfigKey::VelocityChangeTime,
        ConfigKey::CurrentTime,
        ConfigKey::Paused,
        ConfigKey::Start,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::Score => "Score",
            ConfigKey::VelocityScale => "VelocityScale",
            ConfigKey::MaxVelocityScale => "MaxVelocityScale",
            ConfigKey::VelocityAmount => "VelocityAmount",
            ConfigKey::VelocityChangeTime => "VelocityChangeTime",
            ConfigKey::CurrentTime => "CurrentTime",
            ConfigKey::Paused => "Paused",
            ConfigKey::Start => "Start",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Float,
    Bool,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigValue {
    Int(i64),
    Float(f32),
    Bool(bool),
}

impl ConfigValue {
    pub fn kind(self) -> ValueKind {
        match self {
            ConfigValue::Int(_) => ValueKind::Int,
            ConfigValue::Float(_) => ValueKind::Float,
            ConfigValue::Bool(_) => ValueKind::Bool,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        bool::from_value(self)
    }

    pub fn as_f32(self) -> Option<f32> {
        f32::from_value(self)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Int(value) => write!(f, "{value}"),
            ConfigValue::Float(value) => write!(f, "{value}"),
            ConfigValue::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<f32> for ConfigValue {
    fn from(value: f32) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

/// Types a stored [`ConfigValue`] can be read as. An `Int` may be read as a
/// float; there are no other coercions.
pub trait ConfigRead: Sized {
    const KIND: ValueKind;

    fn from_value(value: ConfigValue) -> Option<Self>;

    /// Value handed out by [`StateStore::get`] when a read fails.
    fn fallback() -> Self;
}

impl ConfigRead for i64 {
    const KIND: ValueKind = ValueKind::Int;

    fn from_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Int(value) => Some(value),
            _ => None,
        }
    }

    fn fallback() -> Self {
        0
    }
}

impl ConfigRead for f32 {
    const KIND: ValueKind = ValueKind::Float;

    fn from_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Float(value) => Some(value),
            ConfigValue::Int(value) => Some(value as f32),
            ConfigValue::Bool(_) => None,
        }
    }

    fn fallback() -> Self {
        0.0
    }
}

impl ConfigRead for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn from_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Bool(value) => Some(value),
            _ => None,
        }
    }

    fn fallback() -> Self {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("configuration key {0} has not been written")]
    KeyAbsent(ConfigKey),
    #[error("configuration key {key} holds a {found} value, expected {expected}")]
    TypeMismatch {
        key: ConfigKey,
        expected: ValueKind,
        found: ValueKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("re-entrant write to {key} while its own change is being published")]
    ReentrantWrite { key: ConfigKey },
    #[error("{key} only accepts numeric values, got {found}")]
    NonNumeric { key: ConfigKey, found: ValueKind },
}

/// Tuning values restored by every reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSettings {
    pub velocity_amount: f32,
    pub velocity_change_time: i64,
    pub max_velocity_scale: f32,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            velocity_amount: 0.2,
            velocity_change_time: 10,
            max_velocity_scale: 3.0,
        }
    }
}

impl StateSettings {
    fn baseline(&self) -> [(ConfigKey, ConfigValue); 8] {
        [
            (ConfigKey::Score, ConfigValue::Int(0)),
            (ConfigKey::VelocityScale, ConfigValue::Float(1.0)),
            (
                ConfigKey::MaxVelocityScale,
                ConfigValue::Float(self.max_velocity_scale),
            ),
            (
                ConfigKey::VelocityAmount,
                ConfigValue::Float(self.velocity_amount),
            ),
            (
                ConfigKey::VelocityChangeTime,
                ConfigValue::Int(self.velocity_change_time),
            ),
            (ConfigKey::CurrentTime, ConfigValue::Float(0.0)),
            (ConfigKey::Paused, ConfigValue::Bool(false)),
            (ConfigKey::Start, ConfigValue::Bool(false)),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    NotStarted,
    Running,
    Paused,
}

/// Observable key/value store that drives a round.
///
/// Every successful [`StateStore::set`] publishes
/// `GameEvent::ConfigurationChanged` carrying the stored value. Handlers run
/// with no borrow held, so they may read the store and write other keys.
/// Writing a key from inside that same key's notification is rejected.
///
/// Setting `Start` from false to true after a round has already run restores
/// every other key to its baseline before `Start` itself is published.
pub struct StateStore {
    bus: Rc<GameBus>,
    settings: StateSettings,
    values: RefCell<BTreeMap<ConfigKey, ConfigValue>>,
    publishing: RefCell<Vec<ConfigKey>>,
    round_started_once: Cell<bool>,
}

impl StateStore {
    /// Creates an empty store. Call [`StateStore::reset_all`] to write the baseline.
    pub fn new(bus: Rc<GameBus>, settings: StateSettings) -> Self {
        Self {
            bus,
            settings,
            values: RefCell::new(BTreeMap::new()),
            publishing: RefCell::new(Vec::new()),
            round_started_once: Cell::new(false),
        }
    }

    pub fn bus(&self) -> &Rc<GameBus> {
        &self.bus
    }

    pub fn settings(&self) -> StateSettings {
        self.settings
    }

    pub fn try_get<T: ConfigRead>(&self, key: ConfigKey) -> Result<T, ConfigError> {
        let stored = self
            .raw(key)
            .ok_or(ConfigError::KeyAbsent(key))?;
        T::from_value(stored).ok_or(ConfigError::TypeMismatch {
            key,
            expected: T::KIND,
            found: stored.kind(),
        })
    }

    /// Read with a logged fallback; never fails.
    pub fn get<T: ConfigRead>(&self, key: ConfigKey) -> T {
        match self.try_get(key) {
            Ok(value) => value,
            Err(err @ ConfigError::KeyAbsent(_)) => {
                debug!(key = %key, error = %err, "config_read_default");
                T::fallback()
            }
            Err(err @ ConfigError::TypeMismatch { .. }) => {
                warn!(key = %key, error = %err, "config_type_mismatch");
                T::fallback()
            }
        }
    }

    pub fn raw(&self, key: ConfigKey) -> Option<ConfigValue> {
        self.values.borrow().get(&key).copied()
    }

    pub fn set(&self, key: ConfigKey, value: impl Into<ConfigValue>) -> Result<(), StateError> {
        if self.publishing.borrow().contains(&key) {
            error!(key = %key, "reentrant_config_write");
            return Err(StateError::ReentrantWrite { key });
        }

        let value = self.normalize(key, value.into())?;
        if key == ConfigKey::Start && value == ConfigValue::Bool(true) && !self.is_started() {
            if self.round_started_once.get() {
                // A restart writes every baseline key, so it must fail before the first one.
                if let Some(busy) = self.publishing_baseline_key() {
                    error!(key = %busy, "reentrant_round_restart");
                    return Err(StateError::ReentrantWrite { key: busy });
                }
                debug!("round_restart_restoring_baseline");
                self.restore_baseline(|baseline_key| baseline_key != ConfigKey::Start)?;
            }
            self.round_started_once.set(true);
        }

        self.values.borrow_mut().insert(key, value);
        self.publishing.borrow_mut().push(key);
        publish_logged(&self.bus, GameEvent::ConfigurationChanged { key, value });
        let mut publishing = self.publishing.borrow_mut();
        if let Some(index) = publishing.iter().rposition(|entry| *entry == key) {
            publishing.remove(index);
        }
        Ok(())
    }

    /// Writes every baseline value, each publishing its own change.
    pub fn reset_all(&self) -> Result<(), StateError> {
        self.round_started_once.set(false);
        self.restore_baseline(|_| true)?;
        info!(
            velocity_amount = self.settings.velocity_amount,
            velocity_change_time = self.settings.velocity_change_time,
            max_velocity_scale = self.settings.max_velocity_scale,
            "state_reset"
        );
        Ok(())
    }

    /// Returns `false` when a round is already running.
    pub fn start_round(&self) -> Result<bool, StateError> {
        if self.is_started() {
            return Ok(false);
        }
        self.set(ConfigKey::Start, true)?;
        info!("round_started");
        Ok(true)
    }

    pub fn end_round(&self) -> Result<(), StateError> {
        if !self.is_started() {
            return Ok(());
        }
        self.set(ConfigKey::Start, false)?;
        info!(score = self.score(), "round_over");
        Ok(())
    }

    /// Flips `Paused` while a round is started; ignored otherwise.
    pub fn toggle_pause(&self) -> Result<bool, StateError> {
        if !self.is_started() {
            return Ok(false);
        }
        let paused = !self.is_paused();
        self.set(ConfigKey::Paused, paused)?;
        info!(paused, "pause_toggled");
        Ok(true)
    }

    /// Advances the round clock. Whole seconds become score; every
    /// `VelocityChangeTime` points the velocity scale steps up.
    pub fn tick(&self, delta_seconds: f32) -> Result<(), StateError> {
        if !self.is_running() {
            return Ok(());
        }

        let current_time = self.get::<f32>(ConfigKey::CurrentTime) + delta_seconds.max(0.0);
        if current_time < 1.0 {
            return self.set(ConfigKey::CurrentTime, current_time);
        }

        let score = self.score().saturating_add(current_time.round() as i64);
        self.set(ConfigKey::Score, score)?;

        let change_time = self.get::<i64>(ConfigKey::VelocityChangeTime);
        if score > 0 && change_time > 0 && score % change_time == 0 {
            self.step_velocity_scale()?;
        }
        self.set(ConfigKey::CurrentTime, 0.0_f32)
    }

    pub fn phase(&self) -> RoundPhase {
        RoundPhase::from_flags(self.is_started(), self.is_paused())
    }

    pub fn is_started(&self) -> bool {
        self.get(ConfigKey::Start)
    }

    pub fn is_paused(&self) -> bool {
        self.get(ConfigKey::Paused)
    }

    pub fn is_running(&self) -> bool {
        self.phase() == RoundPhase::Running
    }

    pub fn score(&self) -> i64 {
        self.get(ConfigKey::Score)
    }

    pub fn velocity_scale(&self) -> f32 {
        self.get(ConfigKey::VelocityScale)
    }

    fn step_velocity_scale(&self) -> Result<(), StateError> {
        let current = self.velocity_scale();
        let stepped = self.clamp_velocity_scale(current + self.get::<f32>(ConfigKey::VelocityAmount));
        if stepped == current {
            debug!(velocity_scale = current, "velocity_scale_capped");
            return Ok(());
        }
        debug!(from = current, to = stepped, "velocity_scale_stepped");
        self.set(ConfigKey::VelocityScale, stepped)
    }

    fn restore_baseline(&self, include: impl Fn(ConfigKey) -> bool) -> Result<(), StateError> {
        for (key, value) in self.settings.baseline() {
            if include(key) {
                self.set(key, value)?;
            }
        }
        Ok(())
    }

    fn normalize(&self, key: ConfigKey, value: ConfigValue) -> Result<ConfigValue, StateError> {
        if key != ConfigKey::VelocityScale {
            return Ok(value);
        }
        match value.as_f32() {
            Some(scale) => Ok(ConfigValue::Float(self.clamp_velocity_scale(scale))),
            None => {
                warn!(key = %key, found = %value.kind(), "non_numeric_velocity_scale");
                Err(StateError::NonNumeric {
                    key,
                    found: value.kind(),
                })
            }
        }
    }

    fn publishing_baseline_key(&self) -> Option<ConfigKey> {
        self.publishing
            .borrow()
            .iter()
            .copied()
            .find(|key| *key != ConfigKey::Start)
    }

    fn clamp_velocity_scale(&self, scale: f32) -> f32 {
        let max = self
            .try_get::<f32>(ConfigKey::MaxVelocityScale)
            .unwrap_or(self.settings.max_velocity_scale)
            .max(1.0);
        if scale.is_nan() {
            return 1.0;
        }
        scale.clamp(1.0, max)
    }
}

impl RoundPhase {
    pub fn from_flags(started: bool, paused: bool) -> Self {
        match (started, paused) {
            (false, _) => RoundPhase::NotStarted,
            (true, false) => RoundPhase::Running,
            (true, true) => RoundPhase::Paused,
        }
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("values", &self.values.borrow())
            .field("round_started_once", &self.round_started_once.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use runner_engine::HandlerError;

    use super::super::events::Topic;
    use super::*;

    fn store_with(settings: StateSettings) -> Rc<StateStore> {
        let store = Rc::new(StateStore::new(Rc::new(GameBus::new()), settings));
        store.reset_all().expect("reset");
        store
    }

    fn store() -> Rc<StateStore> {
        store_with(StateSettings::default())
    }

    fn run_seconds(store: &StateStore, seconds: u32) {
        for _ in 0..seconds {
            for _ in 0..4 {
                store.tick(0.25).expect("tick");
            }
        }
    }

    fn recorded_changes(store: &StateStore) -> Rc<RefCell<Vec<(ConfigKey, ConfigValue)>>> {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&changes);
        store.bus().subscribe(Topic::ConfigurationChanged, move |event| {
            if let GameEvent::ConfigurationChanged { key, value } = event {
                sink.borrow_mut().push((*key, *value));
            }
            Ok(())
        });
        changes
    }

    #[test]
    fn absent_and_mismatched_reads_are_distinct_errors() {
        let store = StateStore::new(Rc::new(GameBus::new()), StateSettings::default());

        assert_eq!(
            store.try_get::<i64>(ConfigKey::Score),
            Err(ConfigError::KeyAbsent(ConfigKey::Score))
        );
        assert_eq!(store.get::<i64>(ConfigKey::Score), 0);

        store.set(ConfigKey::Score, true).expect("set");
        assert_eq!(
            store.try_get::<i64>(ConfigKey::Score),
            Err(ConfigError::TypeMismatch {
                key: ConfigKey::Score,
                expected: ValueKind::Int,
                found: ValueKind::Bool,
            })
        );
        assert_eq!(store.get::<i64>(ConfigKey::Score), 0);
        assert!(!store.get::<bool>(ConfigKey::Paused));
    }

    #[test]
    fn int_values_read_as_float() {
        let store = store();
        assert_eq!(store.try_get::<f32>(ConfigKey::VelocityChangeTime), Ok(10.0));
        assert!(store.try_get::<i64>(ConfigKey::VelocityScale).is_err());
    }

    #[test]
    fn reset_all_publishes_every_key() {
        let store = Rc::new(StateStore::new(Rc::new(GameBus::new()), StateSettings::default()));
        let changes = recorded_changes(&store);

        store.reset_all().expect("reset");

        let keys = changes.borrow().iter().map(|(key, _)| *key).collect::<Vec<_>>();
        assert_eq!(keys.len(), ConfigKey::ALL.len());
        for key in ConfigKey::ALL {
            assert!(keys.contains(&key), "missing {key}");
        }
        assert_eq!(store.phase(), RoundPhase::NotStarted);
    }

    #[test]
    fn set_publishes_stored_value_after_storing() {
        let store = store();
        let observed = Rc::new(Cell::new(None));
        let sink = Rc::clone(&observed);
        let reader = Rc::downgrade(&store);
        store.bus().subscribe(Topic::ConfigurationChanged, move |event| {
            if let (GameEvent::ConfigurationChanged { key: ConfigKey::Score, .. }, Some(store)) =
                (event, reader.upgrade())
            {
                sink.set(Some(store.score()));
            }
            Ok(())
        });

        store.set(ConfigKey::Score, 42_i64).expect("set");

        assert_eq!(observed.get(), Some(42));
    }

    #[test]
    fn handlers_may_write_other_keys() {
        let store = store();
        let writer = Rc::downgrade(&store);
        store.bus().subscribe(Topic::ConfigurationChanged, move |event| {
            if let (GameEvent::ConfigurationChanged { key: ConfigKey::Score, .. }, Some(store)) =
                (event, writer.upgrade())
            {
                store
                    .set(ConfigKey::CurrentTime, 0.5_f32)
                    .map_err(|err| HandlerError::new(err.to_string()))?;
            }
            Ok(())
        });

        store.set(ConfigKey::Score, 3_i64).expect("set");

        assert_eq!(store.get::<f32>(ConfigKey::CurrentTime), 0.5);
    }

    #[test]
    fn same_key_write_from_own_handler_is_rejected() {
        let store = store();
        let writer = Rc::downgrade(&store);
        let outcome = Rc::new(Cell::new(None));
        let sink = Rc::clone(&outcome);
        store.bus().subscribe(Topic::ConfigurationChanged, move |event| {
            if let (GameEvent::ConfigurationChanged { key: ConfigKey::Score, .. }, Some(store)) =
                (event, writer.upgrade())
            {
                sink.set(Some(store.set(ConfigKey::Score, 99_i64)));
            }
            Ok(())
        });

        store.set(ConfigKey::Score, 1_i64).expect("outer set");

        assert_eq!(
            outcome.get(),
            Some(Err(StateError::ReentrantWrite {
                key: ConfigKey::Score
            }))
        );
        assert_eq!(store.score(), 1);
        store.set(ConfigKey::Score, 2_i64).expect("later set is allowed");
    }

    #[test]
    fn velocity_scale_writes_are_clamped() {
        let store = store();
        store.set(ConfigKey::VelocityScale, 9.0_f32).expect("set");
        assert_eq!(store.velocity_scale(), 3.0);
        store.set(ConfigKey::VelocityScale, 0.1_f32).expect("set");
        assert_eq!(store.velocity_scale(), 1.0);
    }

    #[test]
    fn non_numeric_velocity_scale_is_rejected() {
        let store = store();
        store.set(ConfigKey::VelocityScale, 2.0_f32).expect("set");

        assert_eq!(
            store.set(ConfigKey::VelocityScale, true),
            Err(StateError::NonNumeric {
                key: ConfigKey::VelocityScale,
                found: ValueKind::Bool,
            })
        );
        assert_eq!(store.velocity_scale(), 2.0);

        store.set(ConfigKey::VelocityScale, 2_i64).expect("int is numeric");
        assert_eq!(store.raw(ConfigKey::VelocityScale), Some(ConfigValue::Float(2.0)));
    }

    #[test]
    fn huge_tick_saturates_score() {
        let store = store();
        store.start_round().expect("start");

        store.tick(1.0e30).expect("first tick");
        store.tick(1.0e30).expect("second tick");

        assert_eq!(store.score(), i64::MAX);
        let scale = store.velocity_scale();
        assert!((1.0..=3.0).contains(&scale));
    }

    #[test]
    fn restart_from_baseline_key_handler_is_refused_before_any_write() {
        let store = store();
        store.start_round().expect("start");
        run_seconds(&store, 3);
        store.end_round().expect("end");
        store.set(ConfigKey::VelocityScale, 2.0_f32).expect("set");

        let outcome = Rc::new(Cell::new(None));
        let sink = Rc::clone(&outcome);
        let starter = Rc::downgrade(&store);
        store.bus().subscribe(Topic::ConfigurationChanged, move |event| {
            if let (GameEvent::ConfigurationChanged { key: ConfigKey::Paused, .. }, Some(store)) =
                (event, starter.upgrade())
            {
                sink.set(Some(store.start_round()));
            }
            Ok(())
        });

        store.set(ConfigKey::Paused, false).expect("outer set");

        assert_eq!(
            outcome.get(),
            Some(Err(StateError::ReentrantWrite {
                key: ConfigKey::Paused
            }))
        );
        assert_eq!(store.score(), 3);
        assert_eq!(store.velocity_scale(), 2.0);
        assert!(!store.is_started());
    }

    #[test]
    fn phase_follows_flags() {
        assert_eq!(RoundPhase::from_flags(false, true), RoundPhase::NotStarted);
        assert_eq!(RoundPhase::from_flags(true, false), RoundPhase::Running);
        assert_eq!(RoundPhase::from_flags(true, true), RoundPhase::Paused);
    }

    #[test]
    fn tick_is_ignored_unless_running() {
        let store = store();
        store.tick(5.0).expect("tick");
        assert_eq!(store.score(), 0);

        store.start_round().expect("start");
        store.toggle_pause().expect("pause");
        store.tick(5.0).expect("tick");
        assert_eq!(store.score(), 0);
        assert_eq!(store.phase(), RoundPhase::Paused);
    }

    #[test]
    fn score_grows_in_whole_seconds_only() {
        let store = store();
        store.start_round().expect("start");
        let mut last = 0;
        for _ in 0..200 {
            store.tick(0.1).expect("tick");
            let score = store.score();
            assert!(score >= last);
            assert!(score - last <= 1);
            last = score;
        }
        assert!(store.score() >= 18);
    }

    #[test]
    fn velocity_steps_at_score_milestones_and_caps() {
        let store = store_with(StateSettings {
            velocity_amount: 1.0,
            velocity_change_time: 10,
            max_velocity_scale: 3.0,
        });
        store.start_round().expect("start");

        run_seconds(&store, 9);
        assert_eq!(store.velocity_scale(), 1.0);
        run_seconds(&store, 1);
        assert_eq!(store.score(), 10);
        assert_eq!(store.velocity_scale(), 2.0);
        run_seconds(&store, 10);
        assert_eq!(store.score(), 20);
        assert_eq!(store.velocity_scale(), 3.0);
        run_seconds(&store, 10);
        assert_eq!(store.score(), 30);
        assert_eq!(store.velocity_scale(), 3.0);
    }

    #[test]
    fn capped_velocity_step_does_not_publish() {
        let store = store_with(StateSettings {
            velocity_amount: 1.0,
            velocity_change_time: 1,
            max_velocity_scale: 2.0,
        });
        store.start_round().expect("start");
        run_seconds(&store, 1);
        assert_eq!(store.velocity_scale(), 2.0);

        let changes = recorded_changes(&store);
        run_seconds(&store, 3);

        assert!(!changes
            .borrow()
            .iter()
            .any(|(key, _)| *key == ConfigKey::VelocityScale));
    }

    #[test]
    fn restart_restores_baseline_before_start_is_published() {
        let store = store();
        store.start_round().expect("start");
        store.set(ConfigKey::VelocityScale, 2.5_f32).expect("set");
        run_seconds(&store, 4);
        store.end_round().expect("end");
        assert_eq!(store.score(), 4);

        let score_when_started = Rc::new(Cell::new(None));
        let sink = Rc::clone(&score_when_started);
        let reader = Rc::downgrade(&store);
        store.bus().subscribe(Topic::ConfigurationChanged, move |event| {
            if let (
                GameEvent::ConfigurationChanged {
                    key: ConfigKey::Start,
                    value: ConfigValue::Bool(true),
                },
                Some(store),
            ) = (event, reader.upgrade())
            {
                sink.set(Some((store.score(), store.velocity_scale())));
            }
            Ok(())
        });

        assert!(store.start_round().expect("restart"));

        assert_eq!(score_when_started.get(), Some((0, 1.0)));
        assert_eq!(store.phase(), RoundPhase::Running);
    }

    #[test]
    fn first_start_keeps_existing_values() {
        let store = store();
        store.set(ConfigKey::Score, 5_i64).expect("set");
        store.start_round().expect("start");
        assert_eq!(store.score(), 5);
    }

    #[test]
    fn toggle_pause_only_while_started() {
        let store = store();
        assert!(!store.toggle_pause().expect("toggle"));
        assert!(!store.is_paused());

        store.start_round().expect("start");
        assert!(store.toggle_pause().expect("toggle"));
        assert_eq!(store.phase(), RoundPhase::Paused);
        assert!(store.toggle_pause().expect("toggle"));
        assert_eq!(store.phase(), RoundPhase::Running);
    }

    #[test]
    fn start_round_twice_is_a_no_op() {
        let store = store();
        assert!(store.start_round().expect("start"));
        assert!(!store.start_round().expect("start again"));
    }
}
