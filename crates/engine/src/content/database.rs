use std::collections::HashMap;

use crate::app::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrototypeId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub id: PrototypeId,
    pub name: String,
    /// Free-form category label; the game maps it onto its own entity kinds.
    pub category: String,
    pub speed: f32,
    pub half_extents: Vec2,
}

#[derive(Debug, Default, Clone)]
pub struct PrototypeDatabase {
    prototypes: Vec<Prototype>,
    ids_by_name: HashMap<String, PrototypeId>,
}

impl PrototypeDatabase {
    pub(crate) fn from_prototypes(mut prototypes: Vec<Prototype>) -> Self {
        let mut ids_by_name = HashMap::with_capacity(prototypes.len());
        for (idx, prototype) in prototypes.iter_mut().enumerate() {
            let id = PrototypeId(idx as u32);
            prototype.id = id;
            ids_by_name.insert(prototype.name.clone(), id);
        }
        Self {
            prototypes,
            ids_by_name,
        }
    }

    pub fn id_by_name(&self, name: &str) -> Option<PrototypeId> {
        self.ids_by_name.get(name).copied()
    }

    pub fn get(&self, id: PrototypeId) -> Option<&Prototype> {
        self.prototypes.get(id.0 as usize)
    }

    pub fn by_name(&self, name: &str) -> Option<&Prototype> {
        self.id_by_name(name).and_then(|id| self.get(id))
    }

    pub fn prototypes(&self) -> &[Prototype] {
        &self.prototypes
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}
