//! `json.encode` / `json.decode`

use mlua::{Lua, LuaSerdeExt, SerializeOptions, Value};

pub fn install(lua: &Lua) -> mlua::Result<()> {
    let json = lua.create_table()?;

    json.set(
        "encode",
        lua.create_function(|_, value: Value| {
            serde_json::to_string(&value)
                .map_err(|err| mlua::Error::RuntimeError(format!("json.encode: {err}")))
        })?,
    )?;

    json.set(
        "decode",
        lua.create_function(|lua, text: String| {
            let value: serde_json::Value = serde_json::from_str(&text)
                .map_err(|err| mlua::Error::RuntimeError(format!("json.decode: {err}")))?;
            // null becomes nil rather than a sentinel
            let options = SerializeOptions::new()
                .serialize_none_to_null(false)
                .serialize_unit_to_null(false);
            lua.to_value_with(&value, options)
        })?,
    )?;

    lua.globals().set("json", json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_then_encode() {
        let lua = Lua::new();
        install(&lua).unwrap();

        let (name, count, missing): (String, i64, bool) = lua
            .load(
                r#"
                local data = json.decode('{"name": "hud", "count": 3, "gone": null}')
                return data.name, data.count, data.gone == nil
                "#,
            )
            .eval()
            .unwrap();
        assert_eq!(name, "hud");
        assert_eq!(count, 3);
        assert!(missing);

        let encoded: String = lua
            .load(r#"return json.encode({ items = json.decode("[1, 2, 3]") })"#)
            .eval()
            .unwrap();
        assert_eq!(encoded, r#"{"items":[1,2,3]}"#);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let lua = Lua::new();
        install(&lua).unwrap();
        assert!(lua.load("json.decode('{not json')").exec().is_err());
    }
}
