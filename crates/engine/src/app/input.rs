use super::scene::{InputSnapshot, SceneWorld};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    Jump,
    Pause,
    Quit,
}

const ACTION_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    pressed: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_pressed: bool) {
        self.pressed[action.index()] = is_pressed;
    }

    pub(crate) fn is_pressed(&self, action: InputAction) -> bool {
        self.pressed[action.index()]
    }
}

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::Jump => 0,
            InputAction::Pause => 1,
            InputAction::Quit => 2,
        }
    }
}

/// Produces one input snapshot per simulation tick.
///
/// Sources see the world as it stood after the previous tick, which is
/// enough for scripted or automated drivers to react to obstacles.
pub trait InputSource {
    fn poll(&mut self, world: &SceneWorld) -> InputSnapshot;
}

/// Source that never presses anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleInput;

impl InputSource for IdleInput {
    fn poll(&mut self, _world: &SceneWorld) -> InputSnapshot {
        InputSnapshot::empty()
    }
}
