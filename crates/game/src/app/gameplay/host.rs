use std::collections::HashMap;
use std::rc::Rc;

use runner_engine::{
    EntityId, Prototype, PrototypeDatabase, PrototypeId, SpawnRequest, Transform, Vec2,
    WorldCommands,
};
use tracing::debug;

use super::actor::ActorBody;
use super::events::{EntityCategory, EntityHandle};
use super::lifecycle::{EntityFactory, FactoryError};

/// Factory backed by the scene world's command queue. Entities it creates
/// appear in the world after the next `apply_pending`.
pub struct WorldFactory {
    commands: WorldCommands,
    prototypes: Rc<PrototypeDatabase>,
    max_live: Option<usize>,
    live: HashMap<EntityHandle, PrototypeId>,
    fresh: Vec<EntityHandle>,
}

impl WorldFactory {
    pub fn new(
        commands: WorldCommands,
        prototypes: Rc<PrototypeDatabase>,
        max_live: Option<usize>,
    ) -> Self {
        Self {
            commands,
            prototypes,
            max_live,
            live: HashMap::new(),
            fresh: Vec::new(),
        }
    }

    /// Entities created since the last call, in creation order.
    pub fn take_fresh(&mut self) -> Vec<EntityHandle> {
        std::mem::take(&mut self.fresh)
    }

    pub fn is_live(&self, handle: EntityHandle) -> bool {
        self.live.contains_key(&handle)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn prototype_of(&self, handle: EntityHandle) -> Option<&Prototype> {
        self.live
            .get(&handle)
            .and_then(|id| self.prototypes.get(*id))
    }

    pub fn body(&self, id: EntityId) -> Rc<dyn ActorBody> {
        Rc::new(WorldBody {
            commands: self.commands.clone(),
            id,
        })
    }

    pub fn forget_all(&mut self) {
        for (handle, _) in self.live.drain() {
            self.commands.despawn(handle.id);
        }
        self.fresh.clear();
    }
}

impl EntityFactory for WorldFactory {
    fn instantiate(
        &mut self,
        prototype: &str,
        transform: Transform,
    ) -> Result<EntityHandle, FactoryError> {
        let definition = self
            .prototypes
            .by_name(prototype)
            .ok_or_else(|| FactoryError::UnknownPrototype(prototype.to_string()))?;
        let category = EntityCategory::from_label(&definition.category).ok_or_else(|| {
            FactoryError::UnsupportedCategory {
                prototype: prototype.to_string(),
                category: definition.category.clone(),
            }
        })?;
        if let Some(max) = self.max_live {
            if self.live.len() >= max {
                return Err(FactoryError::CapacityReached { max });
            }
        }

        let id = self.commands.spawn(SpawnRequest {
            prototype: definition.name.clone(),
            transform,
            half_extents: definition.half_extents,
        });
        let handle = EntityHandle::new(id, category);
        self.live.insert(handle, definition.id);
        self.fresh.push(handle);
        debug!(entity = %handle, prototype, "entity_instantiated");
        Ok(handle)
    }

    fn destroy(&mut self, handle: EntityHandle) {
        if self.live.remove(&handle).is_none() {
            return;
        }
        self.fresh.retain(|entry| *entry != handle);
        self.commands.despawn(handle.id);
        debug!(entity = %handle, "entity_destroyed");
    }
}

/// [`ActorBody`] that queues its requests on the world command queue.
pub struct WorldBody {
    commands: WorldCommands,
    id: EntityId,
}

impl ActorBody for WorldBody {
    fn apply_impulse(&self, impulse: Vec2) {
        self.commands.apply_impulse(self.id, impulse);
    }

    fn set_animation_state(&self, label: &'static str) {
        self.commands.set_animation(self.id, label);
    }

    fn set_animation_active(&self, active: bool) {
        self.commands.set_animation_active(self.id, active);
    }

    fn set_simulation_enabled(&self, enabled: bool) {
        self.commands.set_simulated(self.id, enabled);
    }
}
