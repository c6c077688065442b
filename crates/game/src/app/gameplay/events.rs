use std::fmt;

use runner_engine::{EntityId, Event, EventBus, PublishReport};
use tracing::warn;

use super::state::{ConfigKey, ConfigValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityCategory {
    Player,
    Enemy,
}

impl EntityCategory {
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Player" => Some(Self::Player),
            "Enemy" => Some(Self::Enemy),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Player => "Player",
            Self::Enemy => "Enemy",
        }
    }
}

/// Non-owning reference to a spawned actor. The host scene owns the entity
/// itself; gameplay code only keeps handles for bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle {
    pub id: EntityId,
    pub category: EntityCategory,
}

impl EntityHandle {
    pub fn new(id: EntityId, category: EntityCategory) -> Self {
        Self { id, category }
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.category.label(), self.id.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    ConfigurationChanged,
    Lifecycle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Spawned(EntityHandle),
    ExitedPlayArea(EntityHandle),
    PlayerDestroyed(EntityHandle),
}

impl LifecycleEvent {
    pub fn handle(self) -> EntityHandle {
        match self {
            Self::Spawned(handle) | Self::ExitedPlayArea(handle) | Self::PlayerDestroyed(handle) => {
                handle
            }
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Spawned(_) => "spawned",
            Self::ExitedPlayArea(_) => "exited_play_area",
            Self::PlayerDestroyed(_) => "player_destroyed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameEvent {
    ConfigurationChanged { key: ConfigKey, value: ConfigValue },
    Lifecycle(LifecycleEvent),
}

impl GameEvent {
    pub fn describe(&self) -> String {
        match self {
            Self::ConfigurationChanged { key, value } => format!("config {key}={value}"),
            Self::Lifecycle(event) => format!("{} {}", event.name(), event.handle()),
        }
    }
}

impl Event for GameEvent {
    type Topic = Topic;

    fn topic(&self) -> Topic {
        match self {
            Self::ConfigurationChanged { .. } => Topic::ConfigurationChanged,
            Self::Lifecycle(_) => Topic::Lifecycle,
        }
    }
}

pub type GameBus = EventBus<GameEvent>;

/// Publishes and logs every handler failure. Failures never stop delivery.
pub fn publish_logged(bus: &GameBus, event: GameEvent) -> PublishReport {
    let report = bus.publish(&event);
    for failure in &report.failures {
        warn!(
            subscription = ?failure.subscription,
            event = %event.describe(),
            error = %failure.error,
            "event_handler_failed"
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use runner_engine::HandlerError;

    use super::*;

    #[test]
    fn topics_follow_event_variant() {
        let handle = EntityHandle::new(EntityId(3), EntityCategory::Enemy);
        assert_eq!(
            GameEvent::Lifecycle(LifecycleEvent::Spawned(handle)).topic(),
            Topic::Lifecycle
        );
        assert_eq!(
            GameEvent::ConfigurationChanged {
                key: ConfigKey::Score,
                value: ConfigValue::Int(1),
            }
            .topic(),
            Topic::ConfigurationChanged
        );
    }

    #[test]
    fn category_labels_round_trip() {
        assert_eq!(EntityCategory::from_label("Enemy"), Some(EntityCategory::Enemy));
        assert_eq!(EntityCategory::from_label("Player"), Some(EntityCategory::Player));
        assert_eq!(EntityCategory::from_label("Coin"), None);
    }

    #[test]
    fn publish_logged_keeps_delivering_after_failure() {
        let bus = GameBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        bus.subscribe(Topic::Lifecycle, |_| Err(HandlerError::new("broken listener")));
        let sink = Rc::clone(&seen);
        bus.subscribe(Topic::Lifecycle, move |event| {
            sink.borrow_mut().push(*event);
            Ok(())
        });
        let handle = EntityHandle::new(EntityId(1), EntityCategory::Player);

        let report = publish_logged(
            &bus,
            GameEvent::Lifecycle(LifecycleEvent::PlayerDestroyed(handle)),
        );

        assert_eq!(report.failures.len(), 1);
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn handle_display_names_category_and_id() {
        let handle = EntityHandle::new(EntityId(12), EntityCategory::Enemy);
        assert_eq!(handle.to_string(), "Enemy#12");
    }
}
