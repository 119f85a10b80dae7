//! Handles returned by listener and timer registrations

use mlua::{AnyUserData, UserData, UserDataMethods, Value};

use crate::api::element::ElementHandle;
use crate::api::game::Game;
use crate::api::menu::MenuHandle;
use crate::context::locals_of;
use crate::events::{EntityRef, ListenerId};
use crate::scheduler::TaskId;

/// Entity a script value stands for, if it is one
pub(crate) fn entity_of(value: &Value) -> Option<EntityRef> {
    let Value::UserData(ud) = value else {
        return None;
    };
    entity_of_userdata(ud)
}

fn entity_of_userdata(ud: &AnyUserData) -> Option<EntityRef> {
    if let Ok(element) = ud.borrow::<ElementHandle>() {
        Some(EntityRef::Element(element.0))
    } else if let Ok(menu) = ud.borrow::<MenuHandle>() {
        Some(EntityRef::Menu(menu.0.clone()))
    } else if ud.is::<Game>() {
        Some(EntityRef::Game)
    } else {
        None
    }
}

/// Result of `onnotify` / `onnotifyonce`
#[derive(Debug, Clone, Copy)]
pub struct ListenerHandle(pub ListenerId);

impl UserData for ListenerHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("clear", |lua, this, ()| {
            let locals = locals_of(lua)?;
            let removed = locals.events.borrow_mut().remove(this.0);
            Ok(removed)
        });
    }
}

/// Result of `onframe` / `ontimeout` / `oninterval`
#[derive(Debug, Clone, Copy)]
pub struct TaskHandle(pub TaskId);

impl UserData for TaskHandle {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("clear", |lua, this, ()| {
            let locals = locals_of(lua)?;
            let removed = locals.scheduler.borrow_mut().cancel(this.0);
            Ok(removed)
        });

        methods.add_method("endon", |lua, this, (entity, event): (Value, String)| {
            let entity = entity_of(&entity).ok_or_else(|| {
                mlua::Error::RuntimeError(
                    "endon expects an element, a menu or game".to_string(),
                )
            })?;
            let locals = locals_of(lua)?;
            locals.scheduler.borrow_mut().add_endon(this.0, entity, event);
            Ok(())
        });
    }
}
