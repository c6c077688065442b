use std::cell::RefCell;
use std::ops::{Add, AddAssign, Mul};
use std::rc::Rc;

use super::input::{ActionStates, InputAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    actions: ActionStates,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested || self.actions.is_pressed(InputAction::Quit)
    }

    /// Edge-triggered: true only for the tick the action was pressed on.
    pub fn is_pressed(&self, action: InputAction) -> bool {
        self.actions.is_pressed(action)
    }

    pub fn with_action_pressed(mut self, action: InputAction, pressed: bool) -> Self {
        self.actions.set(action, pressed);
        self
    }

    pub fn with_quit_requested(mut self, quit_requested: bool) -> Self {
        self.quit_requested = quit_requested;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };
    pub const ONE: Vec2 = Vec2 { x: 1.0, y: 1.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub rotation_degrees: f32,
    pub scale: Vec2,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation_degrees: 0.0,
            scale: Vec2::ONE,
        }
    }
}

impl Transform {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// Axis-aligned rectangle in world units, `min` inclusive, `max` inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }
}

#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub prototype: String,
    pub transform: Transform,
    pub half_extents: Vec2,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub prototype: String,
    pub transform: Transform,
    pub velocity: Vec2,
    pub half_extents: Vec2,
    pub simulated: bool,
    pub animation: Option<&'static str>,
    pub animation_active: bool,
    applied_spawn_order: u64,
}

impl Entity {
    /// Scaled AABB overlap test centred on each entity's position.
    pub fn overlaps(&self, other: &Entity) -> bool {
        let a = self.scaled_half_extents();
        let b = other.scaled_half_extents();
        let dx = (self.transform.position.x - other.transform.position.x).abs();
        let dy = (self.transform.position.y - other.transform.position.y).abs();
        dx < a.x + b.x && dy < a.y + b.y
    }

    pub fn scaled_half_extents(&self) -> Vec2 {
        Vec2::new(
            self.half_extents.x * self.transform.scale.x.abs(),
            self.half_extents.y * self.transform.scale.y.abs(),
        )
    }

    pub fn applied_spawn_order(&self) -> u64 {
        self.applied_spawn_order
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BodyCommand {
    Impulse { id: EntityId, impulse: Vec2 },
    Animation { id: EntityId, label: &'static str },
    AnimationActive { id: EntityId, active: bool },
    Simulated { id: EntityId, enabled: bool },
}

#[derive(Debug, Default)]
struct PendingCommands {
    allocator: EntityIdAllocator,
    spawns: Vec<Entity>,
    despawns: Vec<EntityId>,
    body: Vec<BodyCommand>,
}

/// Cloneable handle onto a world's pending-command queue.
///
/// Everything queued here takes effect when the owning [`SceneWorld`] runs
/// `apply_pending`, which the frame loop does once at the end of every tick.
/// Spawned ids are allocated immediately so callers can hold a handle to an
/// entity that is not in the world yet.
#[derive(Debug, Clone, Default)]
pub struct WorldCommands {
    pending: Rc<RefCell<PendingCommands>>,
}

impl WorldCommands {
    pub fn spawn(&self, request: SpawnRequest) -> EntityId {
        let mut pending = self.pending.borrow_mut();
        let id = pending.allocator.allocate();
        pending.spawns.push(Entity {
            id,
            prototype: request.prototype,
            transform: request.transform,
            velocity: Vec2::ZERO,
            half_extents: request.half_extents,
            simulated: true,
            animation: None,
            animation_active: true,
            applied_spawn_order: 0,
        });
        id
    }

    pub fn despawn(&self, id: EntityId) {
        self.pending.borrow_mut().despawns.push(id);
    }

    pub fn apply_impulse(&self, id: EntityId, impulse: Vec2) {
        self.push_body(BodyCommand::Impulse { id, impulse });
    }

    pub fn set_animation(&self, id: EntityId, label: &'static str) {
        self.push_body(BodyCommand::Animation { id, label });
    }

    pub fn set_animation_active(&self, id: EntityId, active: bool) {
        self.push_body(BodyCommand::AnimationActive { id, active });
    }

    pub fn set_simulated(&self, id: EntityId, enabled: bool) {
        self.push_body(BodyCommand::Simulated { id, enabled });
    }

    pub fn is_pending_spawn(&self, id: EntityId) -> bool {
        self.pending
            .borrow()
            .spawns
            .iter()
            .any(|entity| entity.id == id)
    }

    fn push_body(&self, command: BodyCommand) {
        self.pending.borrow_mut().body.push(command);
    }

    fn take(&self) -> (Vec<Entity>, Vec<EntityId>, Vec<BodyCommand>) {
        let mut pending = self.pending.borrow_mut();
        (
            std::mem::take(&mut pending.spawns),
            std::mem::take(&mut pending.despawns),
            std::mem::take(&mut pending.body),
        )
    }

    fn discard(&self) {
        let mut pending = self.pending.borrow_mut();
        pending.spawns.clear();
        pending.despawns.clear();
        pending.body.clear();
    }
}

#[derive(Debug, Default)]
pub struct SceneWorld {
    commands: WorldCommands,
    entities: Vec<Entity>,
    next_applied_spawn_order: u64,
}

impl SceneWorld {
    pub fn commands(&self) -> WorldCommands {
        self.commands.clone()
    }

    pub fn spawn(&mut self, request: SpawnRequest) -> EntityId {
        self.commands.spawn(request)
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let exists_now = self.entities.iter().any(|entity| entity.id == id);
        if !exists_now && !self.commands.is_pending_spawn(id) {
            return false;
        }
        self.commands.despawn(id);
        true
    }

    /// Drains the command queue: despawns first (cancelling same-tick
    /// spawns), then insertions in request order, then body commands.
    pub fn apply_pending(&mut self) {
        let (spawns, mut despawns, body) = self.commands.take();

        if !despawns.is_empty() {
            despawns.sort_unstable();
            despawns.dedup();
            self.entities
                .retain(|entity| despawns.binary_search(&entity.id).is_err());
        }

        for mut entity in spawns {
            if despawns.binary_search(&entity.id).is_ok() {
                continue;
            }
            entity.applied_spawn_order = self.next_applied_spawn_order;
            self.next_applied_spawn_order = self.next_applied_spawn_order.saturating_add(1);
            self.entities.push(entity);
        }

        for command in body {
            self.apply_body_command(command);
        }
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.commands.discard();
        self.next_applied_spawn_order = 0;
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.find_entity(id).is_some()
    }

    fn apply_body_command(&mut self, command: BodyCommand) {
        match command {
            BodyCommand::Impulse { id, impulse } => {
                if let Some(entity) = self.find_entity_mut(id) {
                    entity.velocity += impulse;
                }
            }
            BodyCommand::Animation { id, label } => {
                if let Some(entity) = self.find_entity_mut(id) {
                    entity.animation = Some(label);
                }
            }
            BodyCommand::AnimationActive { id, active } => {
                if let Some(entity) = self.find_entity_mut(id) {
                    entity.animation_active = active;
                }
            }
            BodyCommand::Simulated { id, enabled } => {
                if let Some(entity) = self.find_entity_mut(id) {
                    entity.simulated = enabled;
                }
            }
        }
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
}

/// One scene plus the world it owns.
pub(crate) struct SceneRuntime {
    scene: Box<dyn Scene>,
    world: SceneWorld,
    is_loaded: bool,
}

impl SceneRuntime {
    pub(crate) fn new(scene: Box<dyn Scene>) -> Self {
        Self {
            scene,
            world: SceneWorld::default(),
            is_loaded: false,
        }
    }

    pub(crate) fn load(&mut self) {
        if self.is_loaded {
            return;
        }
        self.scene.load(&mut self.world);
        self.world.apply_pending();
        self.is_loaded = true;
    }

    pub(crate) fn update(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> SceneCommand {
        let command = self.scene.update(fixed_dt_seconds, input, &mut self.world);
        self.world.apply_pending();
        command
    }

    pub(crate) fn shutdown(&mut self) {
        if !self.is_loaded {
            return;
        }
        self.scene.unload(&mut self.world);
        self.world.clear();
        self.is_loaded = false;
    }

    pub(crate) fn world(&self) -> &SceneWorld {
        &self.world
    }

    pub(crate) fn debug_title(&self) -> Option<String> {
        self.scene.debug_title(&self.world)
    }
}
