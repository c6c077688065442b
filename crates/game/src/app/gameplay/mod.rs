pub mod actor;
pub mod autopilot;
pub mod enemy;
pub mod events;
pub mod host;
pub mod hud;
pub mod lifecycle;
pub mod player;
pub mod scene_impl;
pub mod spawner;
pub mod state;


use runner_engine::{Bounds, Transform, Vec2};

pub use actor::{ActorBody, ActorState, CollisionKind};
pub use autopilot::{Autopilot, AutopilotSettings};
pub use enemy::EnemyController;
pub use events::{
    publish_logged, EntityCategory, EntityHandle, GameBus, GameEvent, LifecycleEvent, Topic,
};
pub use host::{WorldBody, WorldFactory};
pub use hud::Hud;
pub use lifecycle::{EntityFactory, EntityLifecycleTracker, FactoryError, SharedFactory};
pub use player::{PlayerController, PlayerSettings, PlayerSpawner};
pub use scene_impl::RunnerScene;
pub use spawner::{SpawnScheduler, SpawnSettings};
pub use state::{
    ConfigError, ConfigKey, ConfigRead, ConfigValue, RoundPhase, StateError, StateSettings,
    StateStore, ValueKind,
};

/// Region an entity must stay inside, plus the floor the player runs on.
/// Coordinates are y-down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayArea {
    pub bounds: Bounds,
    pub floor_y: f32,
}

impl Default for PlayArea {
    fn default() -> Self {
        Self {
            bounds: Bounds {
                min: Vec2::new(-80.0, -600.0),
                max: Vec2::new(1040.0, 640.0),
            },
            floor_y: 460.0,
        }
    }
}

/// Everything a [`RunnerScene`] needs besides the prototype database.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    pub state: StateSettings,
    pub spawn_points: Vec<SpawnSettings>,
    pub player: PlayerSettings,
    pub play_area: PlayArea,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            state: StateSettings::default(),
            spawn_points: vec![SpawnSettings {
                transform: Transform::at(Vec2::new(1000.0, 444.0)),
                ..SpawnSettings::default()
            }],
            player: PlayerSettings::default(),
            play_area: PlayArea::default(),
        }
    }
}
