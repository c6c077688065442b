use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use runner_engine::{Subscription, Transform};
use thiserror::Error;
use tracing::{debug, warn};

use super::events::{publish_logged, EntityHandle, GameBus, GameEvent, LifecycleEvent, Topic};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    #[error("unknown prototype '{0}'")]
    UnknownPrototype(String),
    #[error("prototype '{prototype}' has unsupported category '{category}'")]
    UnsupportedCategory { prototype: String, category: String },
    #[error("live entity capacity of {max} reached")]
    CapacityReached { max: usize },
}

/// Host capability that turns prototypes into live entities.
///
/// A failed `instantiate` only affects that attempt. `destroy` must tolerate
/// handles that were already destroyed.
pub trait EntityFactory {
    fn instantiate(
        &mut self,
        prototype: &str,
        transform: Transform,
    ) -> Result<EntityHandle, FactoryError>;

    fn destroy(&mut self, handle: EntityHandle);
}

pub type SharedFactory = Rc<RefCell<dyn EntityFactory>>;

/// Live-entity bookkeeping for one spawn point.
///
/// Handles leave the set either through their own
/// `LifecycleEvent::ExitedPlayArea` or through [`EntityLifecycleTracker::clear_all`].
pub struct EntityLifecycleTracker {
    label: String,
    bus: Rc<GameBus>,
    factory: SharedFactory,
    live: RefCell<Vec<EntityHandle>>,
    _exit_subscription: Subscription<GameEvent>,
}

impl EntityLifecycleTracker {
    pub fn new(label: impl Into<String>, bus: Rc<GameBus>, factory: SharedFactory) -> Rc<Self> {
        let label = label.into();
        Rc::new_cyclic(|weak: &Weak<Self>| {
            let tracker = weak.clone();
            let exit_subscription = bus.subscribe_scoped(Topic::Lifecycle, move |event| {
                if let (
                    GameEvent::Lifecycle(LifecycleEvent::ExitedPlayArea(handle)),
                    Some(tracker),
                ) = (event, tracker.upgrade())
                {
                    tracker.remove(*handle);
                }
                Ok(())
            });
            Self {
                label,
                bus,
                factory,
                live: RefCell::new(Vec::new()),
                _exit_subscription: exit_subscription,
            }
        })
    }

    /// Starts tracking `handle` and announces it with `LifecycleEvent::Spawned`.
    pub fn add(&self, handle: EntityHandle) {
        {
            let mut live = self.live.borrow_mut();
            if live.contains(&handle) {
                return;
            }
            live.push(handle);
        }
        debug!(
            tracker = self.label.as_str(),
            entity = %handle,
            live_count = self.live_count(),
            "entity_tracked"
        );
        publish_logged(&self.bus, GameEvent::Lifecycle(LifecycleEvent::Spawned(handle)));
    }

    /// Returns `false` when the handle was not tracked.
    pub fn remove(&self, handle: EntityHandle) -> bool {
        let removed = {
            let mut live = self.live.borrow_mut();
            match live.iter().position(|entry| *entry == handle) {
                Some(index) => {
                    live.remove(index);
                    true
                }
                None => false,
            }
        };
        if removed {
            debug!(
                tracker = self.label.as_str(),
                entity = %handle,
                live_count = self.live_count(),
                "entity_untracked"
            );
        }
        removed
    }

    /// Destroys every tracked entity and empties the set. The set is detached
    /// first, so re-entrant calls observe an empty tracker.
    pub fn clear_all(&self) -> usize {
        let detached = std::mem::take(&mut *self.live.borrow_mut());
        if detached.is_empty() {
            return 0;
        }
        match self.factory.try_borrow_mut() {
            Ok(mut factory) => {
                for handle in &detached {
                    factory.destroy(*handle);
                }
            }
            Err(_) => {
                warn!(
                    tracker = self.label.as_str(),
                    count = detached.len(),
                    "factory_busy_during_clear"
                );
            }
        }
        debug!(
            tracker = self.label.as_str(),
            cleared = detached.len(),
            "tracker_cleared"
        );
        detached.len()
    }

    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.live.borrow().contains(&handle)
    }

    pub fn live_count(&self) -> usize {
        self.live.borrow().len()
    }

    pub fn live_handles(&self) -> Vec<EntityHandle> {
        self.live.borrow().clone()
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for EntityLifecycleTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityLifecycleTracker")
            .field("label", &self.label)
            .field("live", &self.live.borrow())
            .finish()
    }
}
