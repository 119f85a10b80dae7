//! Conversion between host values and script values

pub mod converted;
pub mod proxy;
pub mod vector;

use mlua::{Lua, Value};

use crate::context::{current_context, runtime_of};
use crate::error::BridgeError;
use crate::value::{HostValue, Vector};

use self::proxy::{HostFunction, HostTable, HostUserdata};

/// Convert a host value into a value of the script heap owned by `lua`
pub fn to_script(lua: &Lua, value: &HostValue) -> mlua::Result<Value> {
    Ok(match value {
        HostValue::Nil => Value::Nil,
        HostValue::Bool(b) => Value::Boolean(*b),
        HostValue::Integer(i) => Value::Integer(*i),
        HostValue::Float(f) => Value::Number(*f),
        HostValue::String(s) => Value::String(lua.create_string(s)?),
        HostValue::Vector(v) => Value::UserData(lua.create_userdata(*v)?),
        HostValue::Table(r) => Value::UserData(lua.create_userdata(HostTable(*r))?),
        HostValue::Userdata(r) => Value::UserData(lua.create_userdata(HostUserdata(*r))?),
        HostValue::Function(r) => {
            // A closure created for one of our own functions unwraps to it
            let own = current_context(lua).and_then(|id| {
                let runtime = runtime_of(lua).ok()?;
                let entry = runtime.converted.borrow().get(*r)?;
                (entry.context == id).then_some(entry.function)
            });
            match own {
                Some(function) => Value::Function(function),
                None => Value::UserData(lua.create_userdata(HostFunction(*r))?),
            }
        }
    })
}

/// Convert a script value into a host value
///
/// Script functions become host closures registered in the converted
/// function table. Values with no host counterpart become nil.
pub fn to_host(lua: &Lua, value: &Value) -> Result<HostValue, BridgeError> {
    Ok(match value {
        Value::Nil => HostValue::Nil,
        Value::Boolean(b) => HostValue::Bool(*b),
        Value::Integer(i) => HostValue::Integer(*i),
        Value::Number(n) => HostValue::Float(*n),
        Value::String(s) => HostValue::String(s.to_string_lossy().into()),
        Value::UserData(ud) => {
            if let Ok(v) = ud.borrow::<Vector>() {
                HostValue::Vector(*v)
            } else if let Ok(t) = ud.borrow::<HostTable>() {
                HostValue::Table(t.0)
            } else if let Ok(u) = ud.borrow::<HostUserdata>() {
                HostValue::Userdata(u.0)
            } else if let Ok(f) = ud.borrow::<HostFunction>() {
                HostValue::Function(f.0)
            } else {
                HostValue::Nil
            }
        }
        Value::Function(function) => {
            let (Some(context), Ok(runtime)) = (current_context(lua), runtime_of(lua)) else {
                return Ok(HostValue::Nil);
            };

            let existing = runtime.converted.borrow().key_of(context, function);
            let key = match existing {
                Some(key) => key,
                None => {
                    let key = runtime.host.create_closure()?;
                    runtime
                        .converted
                        .borrow_mut()
                        .insert(key, context, function.clone());
                    key
                }
            };
            HostValue::Function(key)
        }
        _ => HostValue::Nil,
    })
}
