use mlua::{Lua, MetaMethod, Table, UserData, UserDataFields, UserDataMethods, Value, Variadic};

use crate::api::{notify_entity, on_notify};
use crate::bridge::{to_host, to_script};
use crate::context::runtime_of;
use crate::events::EntityRef;
use crate::object_model::{Color, Element, ElementId, HorzAlign, VertAlign};

/// Script handle onto an element of the object model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHandle(pub ElementId);

fn with_element<R>(lua: &Lua, id: ElementId, f: impl FnOnce(&mut Element) -> R) -> mlua::Result<R> {
    let runtime = runtime_of(lua)?;
    let mut objects = runtime.objects.borrow_mut();
    let element = objects
        .element_mut(id)
        .ok_or_else(|| mlua::Error::RuntimeError(format!("element {} no longer exists", id.0)))?;
    Ok(f(element))
}

fn color_table(lua: &Lua, color: Color) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("r", color[0])?;
    table.set("g", color[1])?;
    table.set("b", color[2])?;
    table.set("a", color[3])?;
    Ok(table)
}

fn channel(table: &Table, key: &str) -> mlua::Result<Option<f32>> {
    Ok(match table.get::<Value>(key)? {
        Value::Integer(i) => Some(i as f32),
        Value::Number(n) => Some(n as f32),
        _ => None,
    })
}

/// Missing channels read as zero
fn color_from(table: &Table) -> mlua::Result<Color> {
    Ok([
        channel(table, "r")?.unwrap_or(0.0),
        channel(table, "g")?.unwrap_or(0.0),
        channel(table, "b")?.unwrap_or(0.0),
        channel(table, "a")?.unwrap_or(0.0),
    ])
}

macro_rules! number_field {
    ($fields:ident, $name:literal, $field:ident) => {
        $fields.add_field_method_get($name, |lua, this| with_element(lua, this.0, |e| e.$field));
        $fields.add_field_method_set($name, |lua, this, value: f32| {
            with_element(lua, this.0, |e| e.$field = value)
        });
    };
}

macro_rules! color_field {
    ($fields:ident, $name:literal, $field:ident) => {
        $fields.add_field_method_get($name, |lua, this| {
            let color = with_element(lua, this.0, |e| e.$field)?;
            color_table(lua, color)
        });
        $fields.add_field_method_set($name, |lua, this, table: Table| {
            let color = color_from(&table)?;
            with_element(lua, this.0, |e| e.$field = color)
        });
    };
}

macro_rules! color_setter {
    ($methods:ident, $name:literal, $field:ident) => {
        $methods.add_method($name, |lua, this, (r, g, b, a): (f32, f32, f32, f32)| {
            with_element(lua, this.0, |e| e.$field = [r, g, b, a])
        });
    };
}

impl UserData for ElementHandle {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        number_field!(fields, "x", x);
        number_field!(fields, "y", y);
        number_field!(fields, "w", w);
        number_field!(fields, "h", h);
        number_field!(fields, "scalex", x_scale);
        number_field!(fields, "scaley", y_scale);
        number_field!(fields, "rotation", rotation);

        fields.add_field_method_get("style", |lua, this| with_element(lua, this.0, |e| e.style));
        fields.add_field_method_set("style", |lua, this, style: i32| {
            with_element(lua, this.0, |e| e.style = style)
        });
        fields.add_field_method_get("hidden", |lua, this| with_element(lua, this.0, |e| e.hidden));
        fields.add_field_method_set("hidden", |lua, this, hidden: bool| {
            with_element(lua, this.0, |e| e.hidden = hidden)
        });
        fields.add_field_method_get("usegradient", |lua, this| {
            with_element(lua, this.0, |e| e.use_gradient)
        });
        fields.add_field_method_set("usegradient", |lua, this, value: bool| {
            with_element(lua, this.0, |e| e.use_gradient = value)
        });
        fields.add_field_method_get("font", |lua, this| {
            with_element(lua, this.0, |e| e.font.clone())
        });
        fields.add_field_method_set("font", |lua, this, font: String| {
            with_element(lua, this.0, |e| e.font = font)
        });
        fields.add_field_method_get("fontsize", |lua, this| {
            with_element(lua, this.0, |e| e.fontsize)
        });
        fields.add_field_method_set("fontsize", |lua, this, size: f32| {
            with_element(lua, this.0, |e| e.fontsize = size as i32)
        });
        fields.add_field_method_get("text", |lua, this| {
            with_element(lua, this.0, |e| e.text.clone())
        });
        fields.add_field_method_set("text", |lua, this, text: String| {
            with_element(lua, this.0, |e| e.text = text)
        });
        fields.add_field_method_get("material", |lua, this| {
            with_element(lua, this.0, |e| e.material.clone())
        });
        fields.add_field_method_set("material", |lua, this, material: String| {
            with_element(lua, this.0, |e| e.material = material)
        });

        color_field!(fields, "color", color);
        color_field!(fields, "glowcolor", glow_color);
        color_field!(fields, "backcolor", background_color);
        color_field!(fields, "bordercolor", border_color);

        // Setting the second color turns the gradient on
        fields.add_field_method_get("secondcolor", |lua, this| {
            let color = with_element(lua, this.0, |e| e.second_color)?;
            color_table(lua, color)
        });
        fields.add_field_method_set("secondcolor", |lua, this, table: Table| {
            let color = color_from(&table)?;
            with_element(lua, this.0, |e| e.set_second_color(color))
        });

        fields.add_field_method_get("borderwidth", |lua, this| {
            let [top, right, bottom, left] = with_element(lua, this.0, |e| e.border_width)?;
            let table = lua.create_table()?;
            table.set("top", top)?;
            table.set("right", right)?;
            table.set("bottom", bottom)?;
            table.set("left", left)?;
            Ok(table)
        });
        fields.add_field_method_set("borderwidth", |lua, this, table: Table| {
            let top = channel(&table, "top")?;
            let right = channel(&table, "right")?;
            let bottom = channel(&table, "bottom")?;
            let left = channel(&table, "left")?;
            with_element(lua, this.0, |e| {
                let [_, r, b, l] = e.border_width;
                e.border_width = [
                    top.unwrap_or(0.0),
                    right.unwrap_or(r),
                    bottom.unwrap_or(b),
                    left.unwrap_or(l),
                ];
            })
        });
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("setrect", |lua, this, (x, y, w, h): (f32, f32, f32, f32)| {
            with_element(lua, this.0, |e| e.set_rect(x, y, w, h))
        });
        methods.add_method("getrect", |lua, this, ()| {
            let (x, y, w, h) = with_element(lua, this.0, |e| e.outer_rect())?;
            let rect = lua.create_table()?;
            rect.set("x", x)?;
            rect.set("y", y)?;
            rect.set("w", w)?;
            rect.set("h", h)?;
            Ok(rect)
        });
        methods.add_method("setfont", |lua, this, (font, size): (String, Option<i32>)| {
            with_element(lua, this.0, |e| {
                e.font = font;
                if let Some(size) = size {
                    e.fontsize = size;
                }
            })
        });
        methods.add_method("settext", |lua, this, text: String| {
            with_element(lua, this.0, |e| e.text = text)
        });
        methods.add_method("setmaterial", |lua, this, material: String| {
            with_element(lua, this.0, |e| e.material = material)
        });

        color_setter!(methods, "setcolor", color);
        color_setter!(methods, "setglowcolor", glow_color);
        color_setter!(methods, "setbackcolor", background_color);
        color_setter!(methods, "setbordercolor", border_color);
        methods.add_method(
            "setsecondcolor",
            |lua, this, (r, g, b, a): (f32, f32, f32, f32)| {
                with_element(lua, this.0, |e| e.set_second_color([r, g, b, a]))
            },
        );

        methods.add_method("setborderwidth", |lua, this, widths: Variadic<f32>| {
            if widths.is_empty() || widths.len() > 4 {
                return Err(mlua::Error::RuntimeError(
                    "setborderwidth expects between 1 and 4 values".to_string(),
                ));
            }
            with_element(lua, this.0, |e| e.set_border_width(&widths))
        });
        methods.add_method("settextoffset", |lua, this, (x, y): (f32, f32)| {
            with_element(lua, this.0, |e| e.text_offset = (x, y))
        });
        methods.add_method("setscale", |lua, this, (x, y): (f32, f32)| {
            with_element(lua, this.0, |e| {
                e.x_scale = x;
                e.y_scale = y;
            })
        });
        methods.add_method("setrotation", |lua, this, rotation: f32| {
            with_element(lua, this.0, |e| e.rotation = rotation)
        });
        methods.add_method("setstyle", |lua, this, style: i32| {
            with_element(lua, this.0, |e| e.style = style)
        });
        methods.add_method(
            "setslice",
            |lua, this, (left, top, right, bottom): (f32, f32, f32, f32)| {
                with_element(lua, this.0, |e| {
                    e.slice.left = left;
                    e.slice.top = top;
                    e.slice.right = right;
                    e.slice.bottom = bottom;
                })
            },
        );
        methods.add_method("sethorzalign", |lua, this, align: String| {
            let align = HorzAlign::parse(&align).ok_or_else(|| {
                mlua::Error::RuntimeError(format!("unknown horizontal alignment '{align}'"))
            })?;
            with_element(lua, this.0, |e| e.horzalign = align)
        });
        methods.add_method("setvertalign", |lua, this, align: String| {
            let align = VertAlign::parse(&align).ok_or_else(|| {
                mlua::Error::RuntimeError(format!("unknown vertical alignment '{align}'"))
            })?;
            with_element(lua, this.0, |e| e.vertalign = align)
        });

        methods.add_method("onnotify", |lua, this, (event, callback): (String, mlua::Function)| {
            on_notify(lua, EntityRef::Element(this.0), event, callback, false)
        });
        methods.add_method(
            "onnotifyonce",
            |lua, this, (event, callback): (String, mlua::Function)| {
                on_notify(lua, EntityRef::Element(this.0), event, callback, true)
            },
        );
        methods.add_method("notify", |lua, this, (event, args): (String, Variadic<Value>)| {
            notify_entity(lua, EntityRef::Element(this.0), event, &args)
        });

        // Anything else is a script-defined attribute
        methods.add_meta_method(MetaMethod::Index, |lua, this, key: String| {
            let value = with_element(lua, this.0, |e| e.attributes.get(&key).cloned())?;
            match value {
                Some(value) => to_script(lua, &value),
                None => Ok(Value::Nil),
            }
        });
        methods.add_meta_method(MetaMethod::NewIndex, |lua, this, (key, value): (String, Value)| {
            let value = to_host(lua, &value)?;
            with_element(lua, this.0, |e| {
                e.attributes.insert(key, value);
            })
        });
        methods.add_meta_method(MetaMethod::Eq, |_, this, other: Value| {
            Ok(match other {
                Value::UserData(ud) => ud.borrow::<ElementHandle>().is_ok_and(|o| *this == *o),
                _ => false,
            })
        });
    }
}

/// Install the global `element` table
pub fn install(lua: &Lua) -> mlua::Result<()> {
    let element = lua.create_table()?;
    element.set(
        "new",
        lua.create_function(|lua, ()| {
            let runtime = runtime_of(lua)?;
            let id = runtime.objects.borrow_mut().create_element();
            Ok(ElementHandle(id))
        })?,
    )?;
    lua.globals().set("element", element)
}
