mod input;
mod loop_runner;
mod metrics;
mod scene;

pub use input::{IdleInput, InputAction, InputSource};
pub use loop_runner::{
    run_app, run_app_with_metrics, FrameLoop, FrameOutcome, LoopConfig, LoopSummary, Pacing,
    ShutdownReason,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scene::{
    Bounds, Entity, EntityId, EntityIdAllocator, InputSnapshot, Scene, SceneCommand, SceneWorld,
    SpawnRequest, Transform, Vec2, WorldCommands,
};
