use std::rc::Rc;

use runner_engine::{InputAction, InputSnapshot, InputSource, SceneWorld};
use tracing::info;

use super::state::StateStore;

/// Tuning for the scripted player used by the headless binary.
#[derive(Debug, Clone, PartialEq)]
pub struct AutopilotSettings {
    pub player_prototype: String,
    /// Ticks to wait on the ready screen before pressing jump.
    pub restart_delay_ticks: u32,
    /// Quit after this many finished rounds.
    pub max_rounds: Option<u32>,
    /// Gap kept between the player and an obstacle before jumping, in units.
    pub reach_margin: f32,
    /// Seconds of obstacle travel added to the reach.
    pub reach_lead_seconds: f32,
    /// Obstacle speed at `VelocityScale == 1`.
    pub base_obstacle_speed: f32,
}

impl Default for AutopilotSettings {
    fn default() -> Self {
        Self {
            player_prototype: "runner.player".to_string(),
            restart_delay_ticks: 120,
            max_rounds: None,
            reach_margin: 26.0,
            reach_lead_seconds: 0.2,
            base_obstacle_speed: 120.0,
        }
    }
}

/// Input source that plays the runner on its own: starts rounds, jumps over
/// obstacles and restarts after a game over.
pub struct Autopilot {
    settings: AutopilotSettings,
    store: Rc<StateStore>,
    idle_ticks: u32,
    was_started: bool,
    rounds_finished: u32,
}

impl Autopilot {
    pub fn new(settings: AutopilotSettings, store: Rc<StateStore>) -> Self {
        Self {
            settings,
            store,
            idle_ticks: 0,
            was_started: false,
            rounds_finished: 0,
        }
    }

    pub fn rounds_finished(&self) -> u32 {
        self.rounds_finished
    }

    fn reach(&self) -> f32 {
        let speed = self.settings.base_obstacle_speed * self.store.velocity_scale();
        self.settings.reach_margin + speed * self.settings.reach_lead_seconds
    }

    fn obstacle_within_reach(&self, world: &SceneWorld) -> bool {
        let Some(player) = world
            .entities()
            .iter()
            .find(|entity| entity.prototype == self.settings.player_prototype)
        else {
            return false;
        };
        let reach = self.reach();
        let player_x = player.transform.position.x;
        world
            .entities()
            .iter()
            .filter(|entity| entity.id != player.id)
            .map(|entity| entity.transform.position.x - player_x)
            .any(|gap| gap > 0.0 && gap <= reach)
    }
}

impl InputSource for Autopilot {
    fn poll(&mut self, world: &SceneWorld) -> InputSnapshot {
        let started = self.store.is_started();
        if self.was_started && !started {
            self.rounds_finished += 1;
            info!(
                rounds_finished = self.rounds_finished,
                score = self.store.score(),
                "autopilot_round_finished"
            );
        }
        self.was_started = started;

        if !started {
            if self
                .settings
                .max_rounds
                .is_some_and(|max| self.rounds_finished >= max)
            {
                return InputSnapshot::empty().with_quit_requested(true);
            }
            self.idle_ticks += 1;
            if self.idle_ticks < self.settings.restart_delay_ticks {
                return InputSnapshot::empty();
            }
            return InputSnapshot::empty().with_action_pressed(InputAction::Jump, true);
        }

        self.idle_ticks = 0;
        let jump = !self.store.is_paused() && self.obstacle_within_reach(world);
        InputSnapshot::empty().with_action_pressed(InputAction::Jump, jump)
    }
}
