//! Script-facing API installed into every context

pub mod element;
pub mod game;
pub mod handles;
pub mod io;
pub mod json;
pub mod menu;

use mlua::{Function, Lua, Value};

use crate::bridge::{self, to_host, to_script};
use crate::context::{locals_of, runtime_of};
use crate::events::{EntityRef, Event};
use crate::value::HostValue;

use self::handles::ListenerHandle;

/// Register a listener for `event` on `entity` in the calling context
pub(crate) fn on_notify(
    lua: &Lua,
    entity: EntityRef,
    event: String,
    callback: Function,
    once: bool,
) -> mlua::Result<ListenerHandle> {
    let locals = locals_of(lua)?;
    let id = locals
        .events
        .borrow_mut()
        .add_event_listener(entity, event, callback, once);
    Ok(ListenerHandle(id))
}

/// Broadcast `event` on `entity` to every live context
pub(crate) fn notify_entity(
    lua: &Lua,
    entity: EntityRef,
    event: String,
    args: &[Value],
) -> mlua::Result<()> {
    let arguments = host_values(lua, args)?;
    let runtime = runtime_of(lua)?;
    runtime.notify_all(&Event::new(entity, event).with_arguments(arguments));
    Ok(())
}

pub(crate) fn host_values(lua: &Lua, args: &[Value]) -> mlua::Result<Vec<HostValue>> {
    args.iter()
        .map(|arg| to_host(lua, arg).map_err(mlua::Error::from))
        .collect()
}

/// Host globals under the names LUI code expects
fn install_lui_globals(lua: &Lua) -> mlua::Result<()> {
    let runtime = runtime_of(lua)?;
    let Some(globals) = runtime.host.globals() else {
        return Ok(());
    };

    let table = HostValue::Table(globals);
    lua.globals().set("luiglobals", to_script(lua, &table)?)?;

    for name in ["CoD", "LUI", "Engine", "Game"] {
        let value = runtime.host.get_field(globals, name)?;
        lua.globals().set(name, to_script(lua, &value)?)?;
    }
    Ok(())
}

/// Install the whole API into a fresh script heap
pub(crate) fn install(lua: &Lua) -> mlua::Result<()> {
    bridge::vector::install(lua)?;
    element::install(lua)?;
    game::install(lua)?;
    io::install(lua)?;
    json::install(lua)?;
    install_lui_globals(lua)
}
