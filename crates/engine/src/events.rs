use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use thiserror::Error;

/// An event routed by topic. Handlers subscribe to a topic and receive every
/// event whose `topic()` matches it.
pub trait Event {
    type Topic: Copy + Eq + fmt::Debug;

    fn topic(&self) -> Self::Topic;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type HandlerResult = Result<(), HandlerError>;

type Handler<E> = Rc<dyn Fn(&E) -> HandlerResult>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub subscription: SubscriptionId,
    pub error: HandlerError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failures: Vec<HandlerFailure>,
}

impl PublishReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Registration<E: Event> {
    id: SubscriptionId,
    topic: E::Topic,
    handler: Handler<E>,
}

/// Synchronous, single-threaded publish/subscribe channel.
///
/// `publish` runs every handler registered for the event's topic, in
/// registration order, on the caller's stack. No borrow is held while a
/// handler runs, so handlers may publish, subscribe or unsubscribe
/// re-entrantly. A handler removed mid-publish is skipped for the rest of
/// that publish.
pub struct EventBus<E: Event> {
    registrations: RefCell<Vec<Registration<E>>>,
    next_id: Cell<u64>,
}

impl<E: Event> EventBus<E> {
    pub fn new() -> Self {
        Self {
            registrations: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    pub fn subscribe<F>(&self, topic: E::Topic, handler: F) -> SubscriptionId
    where
        F: Fn(&E) -> HandlerResult + 'static,
    {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(self.next_id.get().saturating_add(1));
        self.registrations.borrow_mut().push(Registration {
            id,
            topic,
            handler: Rc::new(handler),
        });
        id
    }

    /// Like [`EventBus::subscribe`], but the returned guard unsubscribes when dropped.
    pub fn subscribe_scoped<F>(self: &Rc<Self>, topic: E::Topic, handler: F) -> Subscription<E>
    where
        F: Fn(&E) -> HandlerResult + 'static,
    {
        let id = self.subscribe(topic, handler);
        Subscription {
            bus: Rc::downgrade(self),
            id,
        }
    }

    /// Returns `false` when the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        // The handler may own the last guard of another subscription, so it
        // is dropped only after the borrow ends.
        let removed = {
            let mut registrations = self.registrations.borrow_mut();
            registrations
                .iter()
                .position(|entry| entry.id == id)
                .map(|index| registrations.remove(index))
        };
        removed.is_some()
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.registrations.borrow().iter().any(|entry| entry.id == id)
    }

    pub fn subscriber_count(&self, topic: E::Topic) -> usize {
        self.registrations
            .borrow()
            .iter()
            .filter(|entry| entry.topic == topic)
            .count()
    }

    pub fn publish(&self, event: &E) -> PublishReport {
        let topic = event.topic();
        let targets = self
            .registrations
            .borrow()
            .iter()
            .filter(|entry| entry.topic == topic)
            .map(|entry| (entry.id, Rc::clone(&entry.handler)))
            .collect::<Vec<_>>();

        let mut report = PublishReport::default();
        for (id, handler) in targets {
            if !self.is_subscribed(id) {
                continue;
            }
            report.delivered += 1;
            if let Err(error) = handler(event) {
                report.failures.push(HandlerFailure {
                    subscription: id,
                    error,
                });
            }
        }
        report
    }
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.registrations.borrow().len())
            .finish()
    }
}

/// Subscription guard; unsubscribes on drop. Holds the bus weakly so a guard
/// never keeps a bus alive.
pub struct Subscription<E: Event> {
    bus: Weak<EventBus<E>>,
    id: SubscriptionId,
}

impl<E: Event> Subscription<E> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl<E: Event> Drop for Subscription<E> {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

impl<E: Event> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
