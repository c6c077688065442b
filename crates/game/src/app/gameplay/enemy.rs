use std::cell::Cell;
use std::rc::Rc;

use runner_engine::{Subscription, Vec2};
use tracing::debug;

use super::actor::{ActorBody, ActorState};
use super::events::{publish_logged, EntityHandle, GameEvent, LifecycleEvent, Topic};
use super::state::{ConfigKey, StateStore};

/// Obstacle drifting left at `base_speed * VelocityScale` while the round runs.
pub struct EnemyController {
    handle: EntityHandle,
    base_speed: f32,
    state: Cell<ActorState>,
    velocity_scale: Rc<Cell<f32>>,
    store: Rc<StateStore>,
    _config_subscription: Subscription<GameEvent>,
}

impl EnemyController {
    pub fn new(
        handle: EntityHandle,
        body: Rc<dyn ActorBody>,
        base_speed: f32,
        store: Rc<StateStore>,
    ) -> Self {
        if let Some(label) = ActorState::Walking.animation_label() {
            body.set_animation_state(label);
        }
        body.set_animation_active(!store.is_paused());
        let velocity_scale = Rc::new(Cell::new(store.velocity_scale()));

        let handler_scale = Rc::clone(&velocity_scale);
        let config_subscription =
            store
                .bus()
                .subscribe_scoped(Topic::ConfigurationChanged, move |event| {
                    let GameEvent::ConfigurationChanged { key, value } = event else {
                        return Ok(());
                    };
                    match key {
                        ConfigKey::VelocityScale => {
                            if let Some(scale) = value.as_f32() {
                                handler_scale.set(scale);
                            }
                        }
                        ConfigKey::Paused => {
                            if let Some(paused) = value.as_bool() {
                                body.set_animation_active(!paused);
                            }
                        }
                        _ => {}
                    }
                    Ok(())
                });

        Self {
            handle,
            base_speed,
            state: Cell::new(ActorState::Walking),
            velocity_scale,
            store,
            _config_subscription: config_subscription,
        }
    }

    /// Displacement for this tick, or `None` when the enemy must not move.
    pub fn step(&self, delta_seconds: f32) -> Option<Vec2> {
        if self.state.get() != ActorState::Walking || !self.store.is_running() {
            return None;
        }
        Some(Vec2::new(
            -self.base_speed * self.velocity_scale.get() * delta_seconds,
            0.0,
        ))
    }

    /// Marks the enemy removed and tells its tracker. Returns `false` on repeats.
    pub fn on_exited_play_area(&self) -> bool {
        if self.state.get() == ActorState::Removed {
            return false;
        }
        self.state.set(ActorState::Removed);
        debug!(entity = %self.handle, "enemy_left_play_area");
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
        self.state.get()
    }

    pub fn velocity_scale(&self) -> f32 {
        self.velocity_scale.get()
    }
}
