//! Named events over UI entities and the per-context listener set

use crate::object_model::ElementId;
use crate::value::HostValue;

/// Entity an event is fired on or a listener is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    /// Game-level sentinel used by `game:onnotify` and host events
    Game,
    Element(ElementId),
    /// Menus are keyed by name, a replaced menu keeps its listeners
    Menu(String),
}

/// A named event with its arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub entity: EntityRef,
    pub name: String,
    pub arguments: Vec<HostValue>,
}

impl Event {
    pub fn new(entity: EntityRef, name: impl Into<String>) -> Self {
        Self {
            entity,
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    /// Game-level event
    pub fn game(name: impl Into<String>) -> Self {
        Self::new(EntityRef::Game, name)
    }

    pub fn with_arguments(mut self, arguments: Vec<HostValue>) -> Self {
        self.arguments = arguments;
        self
    }
}

/// Raw input forwarded by the host
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    KeyDown { key: i32 },
    KeyUp { key: i32 },
    Char { text: String },
    MouseMove { x: i32, y: i32 },
    MouseDown { button: i32 },
    MouseUp { button: i32 },
}

/// Identifier of a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone)]
struct Listener<C> {
    id: ListenerId,
    entity: EntityRef,
    event: String,
    callback: C,
    once: bool,
}

/// Listener registrations of one context, kept in registration order
///
/// Dispatch is split in two steps so callbacks can run without holding a
/// borrow on the handler: [`EventHandler::matching`] snapshots the listeners
/// an event reaches, then [`EventHandler::begin`] hands out each callback
/// right before it is invoked, dropping one-shot listeners as it does.
#[derive(Debug)]
pub struct EventHandler<C> {
    listeners: Vec<Listener<C>>,
    next_id: u64,
}

impl<C: Clone> EventHandler<C> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    /// Append a listener and return its handle
    pub fn add_event_listener(
        &mut self,
        entity: EntityRef,
        event: impl Into<String>,
        callback: C,
        once: bool,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;

        self.listeners.push(Listener {
            id,
            entity,
            event: event.into(),
            callback,
            once,
        });
        id
    }

    /// Listeners reached by `event`, in registration order
    pub fn matching(&self, event: &Event) -> Vec<ListenerId> {
        self.listeners
            .iter()
            .filter(|l| l.event == event.name && l.entity == event.entity)
            .map(|l| l.id)
            .collect()
    }

    /// Take the callback of a listener about to run
    ///
    /// Returns `None` if the listener was cleared since [`Self::matching`].
    /// One-shot listeners are removed here, so they can never fire twice,
    /// even if the callback fails or re-enters dispatch.
    pub fn begin(&mut self, id: ListenerId) -> Option<C> {
        let pos = self.listeners.iter().position(|l| l.id == id)?;
        if self.listeners[pos].once {
            Some(self.listeners.remove(pos).callback)
        } else {
            Some(self.listeners[pos].callback.clone())
        }
    }

    /// Remove a listener, returns whether it was registered
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<C: Clone> Default for EventHandler<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fire(handler: &mut EventHandler<&'static str>, event: &Event) -> Vec<&'static str> {
        handler
            .matching(event)
            .into_iter()
            .filter_map(|id| handler.begin(id))
            .collect()
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let mut handler = EventHandler::new();
        handler.add_event_listener(EntityRef::Game, "open", "first", false);
        handler.add_event_listener(EntityRef::Game, "open", "second", false);
        handler.add_event_listener(EntityRef::Game, "close", "other", false);

        let fired = fire(&mut handler, &Event::game("open"));
        assert_eq!(fired, vec!["first", "second"]);
    }

    #[test]
    fn test_one_shot_listener_fires_once() {
        let mut handler = EventHandler::new();
        handler.add_event_listener(EntityRef::Game, "open", "once", true);
        handler.add_event_listener(EntityRef::Game, "open", "always", false);

        assert_eq!(fire(&mut handler, &Event::game("open")), vec!["once", "always"]);
        assert_eq!(fire(&mut handler, &Event::game("open")), vec!["always"]);
        assert_eq!(handler.len(), 1);
    }

    #[test]
    fn test_entity_must_match() {
        let mut handler = EventHandler::new();
        let menu = EntityRef::Menu("main".to_string());
        handler.add_event_listener(menu.clone(), "close", "menu", false);
        handler.add_event_listener(EntityRef::Element(ElementId(0)), "close", "element", false);

        let fired = fire(&mut handler, &Event::new(menu, "close"));
        assert_eq!(fired, vec!["menu"]);

        assert!(fire(&mut handler, &Event::game("close")).is_empty());
    }

    #[test]
    fn test_cleared_listener_is_skipped() {
        let mut handler = EventHandler::new();
        let a = handler.add_event_listener(EntityRef::Game, "tick", "a", false);
        handler.add_event_listener(EntityRef::Game, "tick", "b", false);

        let ids = handler.matching(&Event::game("tick"));
        assert!(handler.remove(a));
        let fired: Vec<_> = ids.into_iter().filter_map(|id| handler.begin(id)).collect();
        assert_eq!(fired, vec!["b"]);
        assert!(!handler.remove(a));
    }
}
