use mlua::{Lua, MetaMethod, Table, UserData, UserDataFields, UserDataMethods, Value, Variadic};

use crate::api::element::ElementHandle;
use crate::api::{notify_entity, on_notify};
use crate::bridge::{to_host, to_script};
use crate::context::runtime_of;
use crate::events::{EntityRef, Event};
use crate::object_model::{ElementId, Menu};

/// Script handle onto a menu, by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuHandle(pub String);

fn with_menu<R>(lua: &Lua, name: &str, f: impl FnOnce(&mut Menu) -> R) -> mlua::Result<R> {
    let runtime = runtime_of(lua)?;
    let mut objects = runtime.objects.borrow_mut();
    let menu = objects
        .menu_mut(name)
        .ok_or_else(|| mlua::Error::RuntimeError(format!("menu '{name}' no longer exists")))?;
    Ok(f(menu))
}

pub(crate) fn element_list(lua: &Lua, ids: Vec<ElementId>) -> mlua::Result<Table> {
    lua.create_sequence_from(ids.into_iter().map(ElementHandle))
}

/// Fire `name` on a menu, then open or close it; unknown menus are ignored
pub(crate) fn toggle_menu(lua: &Lua, name: &str, open: bool, notify_first: bool) -> mlua::Result<()> {
    let runtime = runtime_of(lua)?;
    if !runtime.objects.borrow().has_menu(name) {
        return Ok(());
    }

    if notify_first {
        let event = if open { "open" } else { "close" };
        runtime.notify_all(&Event::new(EntityRef::Menu(name.to_string()), event));
    }

    if let Some(menu) = runtime.objects.borrow_mut().menu_mut(name) {
        if open {
            menu.open();
        } else {
            menu.close();
        }
    }
    Ok(())
}

impl UserData for MenuHandle {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("cursor", |lua, this| with_menu(lua, &this.0, |m| m.cursor));
        fields.add_field_method_set("cursor", |lua, this, cursor: bool| {
            with_menu(lua, &this.0, |m| m.cursor = cursor)
        });
        fields.add_field_method_get("hidden", |lua, this| with_menu(lua, &this.0, |m| m.hidden));
        fields.add_field_method_set("hidden", |lua, this, hidden: bool| {
            with_menu(lua, &this.0, |m| m.hidden = hidden)
        });
        fields.add_field_method_get("ignoreevents", |lua, this| {
            with_menu(lua, &this.0, |m| m.ignoreevents)
        });
        fields.add_field_method_set("ignoreevents", |lua, this, ignore: bool| {
            with_menu(lua, &this.0, |m| m.ignoreevents = ignore)
        });
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("addchild", |lua, this, element: mlua::AnyUserData| {
            let child = element.borrow::<ElementHandle>()?.0;
            with_menu(lua, &this.0, |m| m.add_child(child))
        });

        methods.add_method("isopen", |lua, this, ()| {
            let runtime = runtime_of(lua)?;
            let objects = runtime.objects.borrow();
            Ok(objects
                .menu(&this.0)
                .is_some_and(|m| m.is_open(runtime.host.as_ref())))
        });

        methods.add_method("open", |lua, this, ()| toggle_menu(lua, &this.0, true, false));
        methods.add_method("close", |lua, this, ()| toggle_menu(lua, &this.0, false, true));

        methods.add_method("getelement", |lua, this, (value, attribute): (Value, String)| {
            let value = to_host(lua, &value)?;
            let runtime = runtime_of(lua)?;
            let found = runtime.objects.borrow().find_child(&this.0, &value, &attribute);
            Ok(found.map(ElementHandle))
        });

        methods.add_method(
            "getelements",
            |lua, this, (value, attribute): (Value, Option<String>)| {
                let runtime = runtime_of(lua)?;
                let ids = match attribute {
                    Some(attribute) => {
                        let value = to_host(lua, &value)?;
                        runtime.objects.borrow().find_children(&this.0, &value, &attribute)
                    }
                    None => runtime
                        .objects
                        .borrow()
                        .menu(&this.0)
                        .map(|m| m.children.clone())
                        .unwrap_or_default(),
                };
                element_list(lua, ids)
            },
        );

        methods.add_method("onnotify", |lua, this, (event, callback): (String, mlua::Function)| {
            on_notify(lua, EntityRef::Menu(this.0.clone()), event, callback, false)
        });
        methods.add_method(
            "onnotifyonce",
            |lua, this, (event, callback): (String, mlua::Function)| {
                on_notify(lua, EntityRef::Menu(this.0.clone()), event, callback, true)
            },
        );
        methods.add_method("notify", |lua, this, (event, args): (String, Variadic<Value>)| {
            notify_entity(lua, EntityRef::Menu(this.0.clone()), event, &args)
        });

        methods.add_meta_method(MetaMethod::Index, |lua, this, key: String| {
            let value = with_menu(lua, &this.0, |m| m.attributes.get(&key).cloned())?;
            match value {
                Some(value) => to_script(lua, &value),
                None => Ok(Value::Nil),
            }
        });
        methods.add_meta_method(MetaMethod::NewIndex, |lua, this, (key, value): (String, Value)| {
            let value = to_host(lua, &value)?;
            with_menu(lua, &this.0, |m| {
                m.attributes.insert(key, value);
            })
        });
        methods.add_meta_method(MetaMethod::Eq, |_, this, other: Value| {
            Ok(match other {
                Value::UserData(ud) => ud.borrow::<MenuHandle>().is_ok_and(|o| *this == *o),
                _ => false,
            })
        });
    }
}
