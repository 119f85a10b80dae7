//! The `game` and `player` globals

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use mlua::{Function, Lua, MetaMethod, UserData, UserDataMethods, Value, Variadic};
use tracing::debug;

use crate::api::element::ElementHandle;
use crate::api::handles::TaskHandle;
use crate::api::menu::{element_list, toggle_menu, MenuHandle};
use crate::api::{host_values, notify_entity, on_notify};
use crate::bridge::proxy::script_returns;
use crate::bridge::to_host;
use crate::context::{locals_of, runtime_of};
use crate::error::HostError;
use crate::events::{EntityRef, Event};
use crate::object_model::Menu;
use crate::value::{HostValue, Vector};

/// The `game` global
#[derive(Debug, Clone, Copy)]
pub struct Game;

/// The `player` global
#[derive(Debug, Clone, Copy)]
pub struct Player;

const HTTP_REQUEST_DONE: &str = "http_request_done";

fn valid_dvar_name(name: &str) -> bool {
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Render a script value the way the console would type it
fn dvar_string(value: &Value) -> mlua::Result<String> {
    Ok(match value {
        Value::Boolean(b) => u8::from(*b).to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => format!("{n:.6}"),
        Value::String(s) => s.to_str()?.to_string(),
        Value::UserData(ud) => match ud.borrow::<Vector>() {
            Ok(v) => format!("{:.6} {:.6} {:.6}", v.x, v.y, v.z),
            Err(_) => String::new(),
        },
        _ => String::new(),
    })
}

/// Leading integer of a dvar string, `atoi` style
fn leading_int(text: &str) -> i64 {
    let text = text.trim_start();
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text[..end].parse().unwrap_or(0)
}

/// Leading float of a dvar string, `atof` style
fn leading_float(text: &str) -> f64 {
    let text = text.trim_start();
    (1..=text.len())
        .rev()
        .filter(|&end| text.is_char_boundary(end))
        .find_map(|end| text[..end].parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn add_task(lua: &Lua, callback: Function, delay_ms: i64, one_shot: bool) -> mlua::Result<TaskHandle> {
    let runtime = runtime_of(lua)?;
    let locals = locals_of(lua)?;
    let delay = Duration::from_millis(delay_ms.max(0) as u64);
    let id = locals
        .scheduler
        .borrow_mut()
        .add(callback, delay, one_shot, runtime.clock.now());
    Ok(TaskHandle(id))
}

/// Call a named host function with script arguments
fn call_host(lua: &Lua, name: &str, args: &[Value]) -> mlua::Result<mlua::MultiValue> {
    let runtime = runtime_of(lua)?;
    let args = host_values(lua, args)?;
    let values = runtime.host.call(name, &args)?;
    script_returns(lua, &values)
}

/// Queue an HTTP GET, its result arrives as `http_request_done`
fn http_get(lua: &Lua, url: String, dest: Option<String>) -> mlua::Result<u64> {
    let runtime = runtime_of(lua)?;
    let id = runtime.next_request_id();
    let client = runtime.tasks.http_client();

    debug!(target: "scripting", "HTTP request {} for {}", id, url);

    runtime.tasks.run_async(move || {
        let mut arguments = vec![HostValue::from(id)];
        match client.get(&url) {
            Ok(body) => {
                arguments.push(HostValue::Bool(true));
                match dest {
                    Some(dest) => arguments.push(HostValue::Bool(write_file(&dest, &body))),
                    None => arguments.push(HostValue::String(body)),
                }
            }
            Err(err) => {
                debug!(target: "scripting", "HTTP request {} failed: {}", id, err);
                arguments.push(HostValue::Bool(false));
            }
        }
        Event::game(HTTP_REQUEST_DONE).with_arguments(arguments)
    });

    Ok(id)
}

fn write_file(dest: &str, body: &str) -> bool {
    let path = std::path::Path::new(dest);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if std::fs::create_dir_all(parent).is_err() {
            return false;
        }
    }
    std::fs::write(path, body).is_ok()
}

fn xy_table(lua: &Lua, x: impl mlua::IntoLua, y: impl mlua::IntoLua) -> mlua::Result<mlua::Table> {
    let table = lua.create_table()?;
    table.set("x", x)?;
    table.set("y", y)?;
    Ok(table)
}

impl UserData for Game {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        // ===== Menus and elements =====

        methods.add_method("getmenu", |lua, _, name: String| {
            let runtime = runtime_of(lua)?;
            let exists = runtime.objects.borrow().has_menu(&name);
            Ok(exists.then_some(MenuHandle(name)))
        });
        methods.add_method("newmenu", |lua, _, name: String| {
            let runtime = runtime_of(lua)?;
            runtime.objects.borrow_mut().insert_menu(name.clone(), Menu::default());
            Ok(MenuHandle(name))
        });
        methods.add_method("newmenuoverlay", |lua, _, (name, bound): (String, String)| {
            let runtime = runtime_of(lua)?;
            runtime
                .objects
                .borrow_mut()
                .insert_menu(name.clone(), Menu::overlay(bound));
            Ok(MenuHandle(name))
        });
        methods.add_method("openmenu", |lua, _, name: String| toggle_menu(lua, &name, true, true));
        methods.add_method("closemenu", |lua, _, name: String| {
            toggle_menu(lua, &name, false, true)
        });
        methods.add_method("getelement", |lua, _, (value, attribute): (Value, String)| {
            let value = to_host(lua, &value)?;
            let runtime = runtime_of(lua)?;
            let found = runtime.objects.borrow().find_element(&value, &attribute);
            Ok(found.map(ElementHandle))
        });
        methods.add_method(
            "getelements",
            |lua, _, (value, attribute): (Value, Option<String>)| {
                let runtime = runtime_of(lua)?;
                let ids = match attribute {
                    Some(attribute) => {
                        let value = to_host(lua, &value)?;
                        runtime.objects.borrow().find_elements(&value, &attribute)
                    }
                    None => runtime.objects.borrow().element_ids(),
                };
                element_list(lua, ids)
            },
        );
        methods.add_method("getmouseposition", |lua, _, ()| {
            let runtime = runtime_of(lua)?;
            let (x, y) = runtime.mouse.get();
            xy_table(lua, x, y)
        });
        methods.add_method("getwindowsize", |lua, _, ()| {
            let runtime = runtime_of(lua)?;
            let (w, h) = runtime.host.window_size();
            xy_table(lua, w, h)
        });

        // ===== Timers and events =====

        methods.add_method("onframe", |lua, _, callback: Function| {
            add_task(lua, callback, 0, false)
        });
        methods.add_method("ontimeout", |lua, _, (callback, ms): (Function, i64)| {
            add_task(lua, callback, ms, true)
        });
        methods.add_method("oninterval", |lua, _, (callback, ms): (Function, i64)| {
            add_task(lua, callback, ms, false)
        });
        methods.add_method("onnotify", |lua, _, (event, callback): (String, Function)| {
            on_notify(lua, EntityRef::Game, event, callback, false)
        });
        methods.add_method("onnotifyonce", |lua, _, (event, callback): (String, Function)| {
            on_notify(lua, EntityRef::Game, event, callback, true)
        });
        methods.add_method("notify", |lua, _, (event, args): (String, Variadic<Value>)| {
            notify_entity(lua, EntityRef::Game, event, &args)
        });

        // ===== Host services =====

        methods.add_method("time", |_, _, ()| {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            Ok(now.as_millis() as i64)
        });
        methods.add_method("executecommand", |lua, _, command: String| {
            runtime_of(lua)?.host.execute_command(&command);
            Ok(())
        });
        methods.add_method("luiopen", |lua, _, menu: String| {
            runtime_of(lua)?.host.open_lui_menu(&menu);
            Ok(())
        });
        methods.add_method("isingame", |lua, _, ()| Ok(runtime_of(lua)?.host.is_in_game()));
        methods.add_method("getloadedmod", |lua, _, ()| Ok(runtime_of(lua)?.host.loaded_mod()));
        methods.add_method("environment", |_, _, ()| Ok(env!("GIT_BRANCH")));
        methods.add_method("version", |_, _, ()| Ok(env!("VERSION_STRING")));
        methods.add_method("isdebugbuild", |_, _, ()| Ok(cfg!(debug_assertions)));

        methods.add_method("getdvar", |lua, _, name: String| {
            Ok(runtime_of(lua)?.host.find_dvar(&name))
        });
        methods.add_method("getdvarint", |lua, _, name: String| {
            Ok(runtime_of(lua)?.host.find_dvar(&name).map(|v| leading_int(&v)))
        });
        methods.add_method("getdvarfloat", |lua, _, name: String| {
            Ok(runtime_of(lua)?.host.find_dvar(&name).map(|v| leading_float(&v)))
        });
        methods.add_method("setdvar", |lua, _, (name, value): (String, Value)| {
            if !valid_dvar_name(&name) {
                return Err(HostError::InvalidDvarName(name).into());
            }
            let value = dvar_string(&value)?;
            runtime_of(lua)?.host.set_dvar(&name, &value)?;
            Ok(())
        });

        methods.add_method("call", |lua, _, (name, args): (String, Variadic<Value>)| {
            call_host(lua, &name, &args)
        });

        methods.add_method("sharedset", |lua, _, (key, value): (String, String)| {
            let runtime = runtime_of(lua)?;
            let mut shared = runtime
                .shared
                .lock()
                .map_err(|_| mlua::Error::RuntimeError("shared table is poisoned".to_string()))?;
            shared.insert(key, value);
            Ok(())
        });
        methods.add_method("sharedget", |lua, _, key: String| {
            let runtime = runtime_of(lua)?;
            let shared = runtime
                .shared
                .lock()
                .map_err(|_| mlua::Error::RuntimeError("shared table is poisoned".to_string()))?;
            Ok(shared.get(&key).cloned().unwrap_or_default())
        });
        methods.add_method("sharedclear", |lua, _, ()| {
            let runtime = runtime_of(lua)?;
            let mut shared = runtime
                .shared
                .lock()
                .map_err(|_| mlua::Error::RuntimeError("shared table is poisoned".to_string()))?;
            shared.clear();
            Ok(())
        });

        methods.add_method(
            "assetlist",
            |lua, _, (asset_type, include_referenced): (String, Option<bool>)| {
                let runtime = runtime_of(lua)?;
                let names = runtime
                    .host
                    .asset_names(&asset_type, include_referenced.unwrap_or(true))?;
                lua.create_sequence_from(names)
            },
        );

        methods.add_method("httpget", |lua, _, url: String| http_get(lua, url, None));
        methods.add_method("httpgettofile", |lua, _, (url, dest): (String, String)| {
            http_get(lua, url, Some(dest))
        });

        // `game:anything(...)` calls the host function of that name
        methods.add_meta_method(MetaMethod::Index, |lua, _, name: String| {
            let function = lua.create_function(move |lua, args: Variadic<Value>| {
                let args = args.get(1..).unwrap_or_default();
                call_host(lua, &name, args)
            })?;
            Ok(function)
        });
    }
}

impl UserData for Player {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("notify", |lua, _, (event, args): (String, Variadic<Value>)| {
            let runtime = runtime_of(lua)?;
            if !runtime.host.is_in_game() {
                return Err(HostError::NotInGame.into());
            }
            let args = host_values(lua, &args)?;
            runtime.host.notify_player(&event, &args)?;
            Ok(())
        });
    }
}

/// Install the `game` and `player` globals
pub fn install(lua: &Lua) -> mlua::Result<()> {
    lua.globals().set("game", Game)?;
    lua.globals().set("player", Player)
}
