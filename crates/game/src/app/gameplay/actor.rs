use std::fmt;

use runner_engine::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    Idle,
    Walking,
    Jumping,
    Dying,
    Removed,
}

impl ActorState {
    pub fn animation_label(self) -> Option<&'static str> {
        match self {
            ActorState::Idle => Some("idle"),
            ActorState::Walking => Some("walk"),
            ActorState::Jumping => Some("jump"),
            ActorState::Dying => Some("die"),
            ActorState::Removed => None,
        }
    }

    pub fn is_alive(self) -> bool {
        !matches!(self, ActorState::Dying | ActorState::Removed)
    }
}

impl fmt::Display for ActorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionKind {
    Floor,
    Obstacle,
}

/// Physics and animation capability of a spawned actor.
pub trait ActorBody {
    fn apply_impulse(&self, impulse: Vec2);
    fn set_animation_state(&self, label: &'static str);
    fn set_animation_active(&self, active: bool);
    fn set_simulation_enabled(&self, enabled: bool);
}
