//! Script-side handles onto host heap entries
//!
//! None of these own the entry they point at. Every access goes back to the
//! host by name, so a proxy outliving its entry surfaces as a host error.

use mlua::{Lua, MetaMethod, MultiValue, UserData, UserDataMethods, Value, Variadic};

use crate::bridge::{to_host, to_script};
use crate::context::runtime_of;
use crate::value::{HostRef, HostValue};

/// Host table
///
/// `t.get` and `t.set` resolve to the accessor methods, so a host field named
/// `get` or `set` is only reachable through `t:get("get")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostTable(pub HostRef);

/// Host userdata, exposes fields and native methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostUserdata(pub HostRef);

/// Host function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostFunction(pub HostRef);

fn get_field(lua: &Lua, target: HostRef, key: &str) -> mlua::Result<Value> {
    let runtime = runtime_of(lua)?;
    let value = runtime.host.get_field(target, key)?;
    to_script(lua, &value)
}

fn set_field(lua: &Lua, target: HostRef, key: &str, value: &Value) -> mlua::Result<()> {
    let runtime = runtime_of(lua)?;
    let value = to_host(lua, value)?;
    runtime.host.set_field(target, key, value)?;
    Ok(())
}

fn host_args<'a>(lua: &Lua, args: impl Iterator<Item = &'a Value>) -> mlua::Result<Vec<HostValue>> {
    args.map(|arg| to_host(lua, arg).map_err(mlua::Error::from))
        .collect()
}

/// Convert host results, keeping their count
pub(crate) fn script_returns(lua: &Lua, values: &[HostValue]) -> mlua::Result<MultiValue> {
    values.iter().map(|v| to_script(lua, v)).collect()
}

fn same_ref<T: UserData + PartialEq + 'static>(this: &T, other: &Value) -> bool {
    match other {
        Value::UserData(ud) => ud.borrow::<T>().is_ok_and(|o| *this == *o),
        _ => false,
    }
}

impl UserData for HostTable {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("get", |lua, this, key: String| get_field(lua, this.0, &key));
        methods.add_method("set", |lua, this, (key, value): (String, Value)| {
            set_field(lua, this.0, &key, &value)
        });

        methods.add_meta_method(MetaMethod::Index, |lua, this, key: String| {
            get_field(lua, this.0, &key)
        });
        methods.add_meta_method(MetaMethod::NewIndex, |lua, this, (key, value): (String, Value)| {
            set_field(lua, this.0, &key, &value)
        });
        methods.add_meta_method(MetaMethod::Eq, |_, this, other: Value| Ok(same_ref(this, &other)));
    }
}

impl UserData for HostUserdata {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: String| {
            let runtime = runtime_of(lua)?;
            if !runtime.host.has_method(this.0, &key) {
                return get_field(lua, this.0, &key);
            }

            // Called as `ud:method(...)`, the receiver arrives first
            let target = this.0;
            let method = lua.create_function(move |lua, args: Variadic<Value>| {
                let runtime = runtime_of(lua)?;
                let args = host_args(lua, args.iter().skip(1))?;
                let values = runtime.host.call_method(target, &key, &args)?;
                script_returns(lua, &values)
            })?;
            Ok(Value::Function(method))
        });
        methods.add_meta_method(MetaMethod::NewIndex, |lua, this, (key, value): (String, Value)| {
            set_field(lua, this.0, &key, &value)
        });
        methods.add_meta_method(MetaMethod::Eq, |_, this, other: Value| Ok(same_ref(this, &other)));
    }
}

impl UserData for HostFunction {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Call, |lua, this, args: Variadic<Value>| {
            let runtime = runtime_of(lua)?;
            let args = host_args(lua, args.iter())?;
            let values = runtime.host.call_function(this.0, &args)?;
            script_returns(lua, &values)
        });
        methods.add_meta_method(MetaMethod::Eq, |_, this, other: Value| Ok(same_ref(this, &other)));
    }
}
