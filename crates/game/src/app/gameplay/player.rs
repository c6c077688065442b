use std::cell::{Cell, RefCell};
use std::rc::Rc;

use runner_engine::{Subscription, Transform, Vec2};
use tracing::{debug, info, warn};

use super::actor::{ActorBody, ActorState, CollisionKind};
use super::events::{publish_logged, EntityHandle, GameEvent, LifecycleEvent, Topic};
use super::lifecycle::{FactoryError, SharedFactory};
use super::state::{ConfigKey, StateStore};

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSettings {
    pub prototype: String,
    pub spawn: Transform,
    pub jump_impulse: Vec2,
    pub gravity: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            prototype: "runner.player".to_string(),
            spawn: Transform::at(Vec2::new(160.0, 420.0)),
            jump_impulse: Vec2::new(0.0, -380.0),
            gravity: 980.0,
        }
    }
}

struct PlayerCore {
    handle: EntityHandle,
    state: ActorState,
    can_jump: bool,
    jump_impulse: Vec2,
    body: Rc<dyn ActorBody>,
}

impl PlayerCore {
    fn transition(&mut self, next: ActorState) {
        if self.state == next {
            return;
        }
        debug!(entity = %self.handle, from = %self.state, to = %next, "actor_state_changed");
        self.state = next;
        if let Some(label) = next.animation_label() {
            self.body.set_animation_state(label);
        }
    }

    fn try_jump(&mut self, started: bool, paused: bool) -> bool {
        if !started || paused || !self.can_jump || !self.state.is_alive() {
            return false;
        }
        self.can_jump = false;
        self.transition(ActorState::Jumping);
        self.body.apply_impulse(self.jump_impulse);
        true
    }
}

/// Player state machine.
///
/// `Idle -> Walking` on the first floor contact of a round, `Walking ->
/// Jumping` on a permitted jump, back to `Walking` on landing, `-> Dying` on
/// hitting an obstacle and `-> Removed` once off the play area.
pub struct PlayerController {
    handle: EntityHandle,
    core: Rc<RefCell<PlayerCore>>,
    store: Rc<StateStore>,
    _config_subscription: Subscription<GameEvent>,
}

impl PlayerController {
    pub fn new(
        handle: EntityHandle,
        body: Rc<dyn ActorBody>,
        jump_impulse: Vec2,
        store: Rc<StateStore>,
    ) -> Self {
        if let Some(label) = ActorState::Idle.animation_label() {
            body.set_animation_state(label);
        }
        let core = Rc::new(RefCell::new(PlayerCore {
            handle,
            state: ActorState::Idle,
            can_jump: true,
            jump_impulse,
            body,
        }));

        let handler_core = Rc::clone(&core);
        let handler_store = Rc::downgrade(&store);
        let config_subscription =
            store
                .bus()
                .subscribe_scoped(Topic::ConfigurationChanged, move |event| {
                    let GameEvent::ConfigurationChanged { key, value } = event else {
                        return Ok(());
                    };
                    match (key, value.as_bool()) {
                        (ConfigKey::Start, Some(true)) => {
                            let paused = handler_store
                                .upgrade()
                                .map(|store| store.is_paused())
                                .unwrap_or(false);
                            match handler_core.try_borrow_mut() {
                                Ok(mut core) => {
                                    core.try_jump(true, paused);
                                }
                                Err(_) => debug!(entity = %handle, "start_jump_skipped"),
                            }
                        }
                        (ConfigKey::Paused, Some(paused)) => {
                            if let Ok(core) = handler_core.try_borrow() {
                                if core.state != ActorState::Removed {
                                    core.body.set_simulation_enabled(!paused);
                                    core.body.set_animation_active(!paused);
                                }
                            }
                        }
                        _ => {}
                    }
                    Ok(())
                });

        Self {
            handle,
            core,
            store,
            _config_subscription: config_subscription,
        }
    }

    /// Jump command. Silently refused while airborne, dying, not started or paused.
    pub fn jump(&self) -> bool {
        let started = self.store.is_started();
        let paused = self.store.is_paused();
        self.core.borrow_mut().try_jump(started, paused)
    }

    /// Returns `true` when the contact changed the player's state.
    pub fn on_collision(&self, kind: CollisionKind) -> bool {
        match kind {
            CollisionKind::Floor => {
                if !self.store.is_started() {
                    return false;
                }
                let mut core = self.core.borrow_mut();
                if !core.state.is_alive() {
                    return false;
                }
                core.can_jump = true;
                core.transition(ActorState::Walking);
                true
            }
            CollisionKind::Obstacle => {
                if !self.store.is_running() {
                    return false;
                }
                {
                    let mut core = self.core.borrow_mut();
                    if !core.state.is_alive() {
                        return false;
                    }
                    core.can_jump = false;
                    core.transition(ActorState::Dying);
                    core.body.apply_impulse(core.jump_impulse);
                }
                info!(entity = %self.handle, score = self.store.score(), "player_destroyed");
                if let Err(err) = self.store.end_round() {
                    warn!(entity = %self.handle, error = %err, "round_end_failed");
                }
                publish_logged(
                    self.store.bus(),
                    GameEvent::Lifecycle(LifecycleEvent::PlayerDestroyed(self.handle)),
                );
                true
            }
        }
    }

    /// Returns `false` when the player was already removed.
    pub fn on_exited_play_area(&self) -> bool {
        {
            let mut core = self.core.borrow_mut();
            if core.state == ActorState::Removed {
                return false;
            }
            core.transition(ActorState::Removed);
        }
        publish_logged(
            self.store.bus(),
            GameEvent::Lifecycle(LifecycleEvent::ExitedPlayArea(self.handle)),
        );
        true
    }

    pub fn handle(&self) -> EntityHandle {
        self.handle
    }

    pub fn state(&self) -> ActorState {
        self.core.borrow().state
    }

    pub fn can_jump(&self) -> bool {
        self.core.borrow().can_jump
    }
}

/// Keeps at most one current player alive. The current player is forgotten
/// as soon as it is destroyed, so the next round start spawns a fresh one.
pub struct PlayerSpawner {
    settings: PlayerSettings,
    factory: SharedFactory,
    current: Rc<Cell<Option<EntityHandle>>>,
    _lifecycle_subscription: Subscription<GameEvent>,
}

impl PlayerSpawner {
    pub fn new(settings: PlayerSettings, store: &StateStore, factory: SharedFactory) -> Self {
        let current = Rc::new(Cell::new(None));
        let handler_current = Rc::clone(&current);
        let lifecycle_subscription = store.bus().subscribe_scoped(Topic::Lifecycle, move |event| {
            if let GameEvent::Lifecycle(
                LifecycleEvent::PlayerDestroyed(handle) | LifecycleEvent::ExitedPlayArea(handle),
            ) = event
            {
                if handler_current.get() == Some(*handle) {
                    handler_current.set(None);
                    debug!(entity = %handle, "current_player_released");
                }
            }
            Ok(())
        });
        Self {
            settings,
            factory,
            current,
            _lifecycle_subscription: lifecycle_subscription,
        }
    }

    /// Spawns a player unless one is already current. Returns the new handle.
    pub fn ensure_player(&self) -> Result<Option<EntityHandle>, FactoryError> {
        if self.current.get().is_some() {
            return Ok(None);
        }
        let handle = self
            .factory
            .borrow_mut()
            .instantiate(&self.settings.prototype, self.settings.spawn)?;
        self.current.set(Some(handle));
        info!(entity = %handle, "player_spawned");
        Ok(Some(handle))
    }

    pub fn current(&self) -> Option<EntityHandle> {
        self.current.get()
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use runner_engine::EntityId;

    use super::super::actor::test_support::{BodyCall, RecordingBody};
    use super::super::events::{EntityCategory, GameBus};
    use super::super::lifecycle::test_support::recording_factory;
    use super::super::state::StateSettings;
    use super::*;

    struct Fixture {
        store: Rc<StateStore>,
        body: Rc<RecordingBody>,
        player: PlayerController,
    }

    fn fixture() -> Fixture {
        let store = Rc::new(StateStore::new(
            Rc::new(GameBus::new()),
            StateSettings::default(),
        ));
        store.reset_all().expect("reset");
        let body = Rc::new(RecordingBody::default());
        let player = PlayerController::new(
            EntityHandle::new(EntityId(7), EntityCategory::Player),
            body.clone(),
            Vec2::new(0.0, -380.0),
            Rc::clone(&store),
        );
        Fixture {
            store,
            body,
            player,
        }
    }

    #[test]
    fn round_start_triggers_jump() {
        let fx = fixture();
        assert_eq!(fx.player.state(), ActorState::Idle);

        fx.store.start_round().expect("start");

        assert_eq!(fx.player.state(), ActorState::Jumping);
        assert_eq!(fx.body.impulses(), 1);
        assert_eq!(fx.body.last_animation(), Some("jump"));
    }

    #[test]
    fn floor_contact_before_start_is_ignored() {
        let fx = fixture();
        assert!(!fx.player.on_collision(CollisionKind::Floor));
        assert_eq!(fx.player.state(), ActorState::Idle);
    }

    #[test]
    fn jump_requires_ground_and_unpaused_round() {
        let fx = fixture();
        assert!(!fx.player.jump());

        fx.store.start_round().expect("start");
        assert!(!fx.player.jump(), "airborne after start jump");

        assert!(fx.player.on_collision(CollisionKind::Floor));
        assert_eq!(fx.player.state(), ActorState::Walking);

        fx.store.toggle_pause().expect("pause");
        assert!(!fx.player.jump());
        fx.store.toggle_pause().expect("resume");

        assert!(fx.player.jump());
        assert_eq!(fx.player.state(), ActorState::Jumping);
        assert!(!fx.player.can_jump());
    }

    #[test]
    fn obstacle_hit_ends_round_and_announces_death() {
        let fx = fixture();
        let destroyed = Rc::new(Cell::new(None));
        let sink = Rc::clone(&destroyed);
        fx.store.bus().subscribe(Topic::Lifecycle, move |event| {
            if let GameEvent::Lifecycle(LifecycleEvent::PlayerDestroyed(handle)) = event {
                sink.set(Some(*handle));
            }
            Ok(())
        });
        fx.store.start_round().expect("start");
        fx.player.on_collision(CollisionKind::Floor);

        assert!(fx.player.on_collision(CollisionKind::Obstacle));

        assert_eq!(fx.player.state(), ActorState::Dying);
        assert!(!fx.store.is_started());
        assert_eq!(destroyed.get(), Some(fx.player.handle()));
        assert_eq!(fx.body.last_animation(), Some("die"));
        assert!(!fx.player.on_collision(CollisionKind::Obstacle));
        assert!(!fx.player.on_collision(CollisionKind::Floor));
    }

    #[test]
    fn pause_toggles_body_simulation() {
        let fx = fixture();
        fx.store.start_round().expect("start");
        fx.body.calls.borrow_mut().clear();

        fx.store.toggle_pause().expect("pause");

        let calls = fx.body.calls.borrow().clone();
        assert!(calls.contains(&BodyCall::Simulation(false)));
        assert!(calls.contains(&BodyCall::AnimationActive(false)));
    }

    #[test]
    fn leaving_play_area_removes_once() {
        let fx = fixture();
        assert!(fx.player.on_exited_play_area());
        assert!(!fx.player.on_exited_play_area());
        assert_eq!(fx.player.state(), ActorState::Removed);
    }

    #[test]
    fn spawner_forgets_destroyed_player() {
        let store = Rc::new(StateStore::new(
            Rc::new(GameBus::new()),
            StateSettings::default(),
        ));
        store.reset_all().expect("reset");
        let (factory, shared) = recording_factory();
        let spawner = PlayerSpawner::new(PlayerSettings::default(), &store, shared);

        let first = spawner.ensure_player().expect("spawn").expect("new player");
        assert_eq!(spawner.ensure_player().expect("spawn"), None);
        assert_eq!(factory.borrow().instantiated.len(), 1);

        publish_logged(
            store.bus(),
            GameEvent::Lifecycle(LifecycleEvent::PlayerDestroyed(first)),
        );

        assert_eq!(spawner.current(), None);
        let second = spawner.ensure_player().expect("spawn").expect("respawn");
        assert_ne!(first, second);
        assert_eq!(factory.borrow().instantiated[1].0, "runner.player");
    }
}
