//! `vector` userdata

use mlua::{FromLua, Lua, MetaMethod, UserData, UserDataFields, UserDataMethods, Value};

use crate::value::Vector;

enum Operand {
    Vector(Vector),
    Scalar(f32),
}

fn operand(value: &Value) -> mlua::Result<Operand> {
    match value {
        Value::Integer(i) => Ok(Operand::Scalar(*i as f32)),
        Value::Number(n) => Ok(Operand::Scalar(*n as f32)),
        Value::UserData(ud) => Ok(Operand::Vector(*ud.borrow::<Vector>()?)),
        other => Err(mlua::Error::RuntimeError(format!(
            "attempt to perform arithmetic on a vector and a {} value",
            other.type_name()
        ))),
    }
}

fn arith(lhs: &Value, rhs: &Value, op: fn(f32, f32) -> f32) -> mlua::Result<Vector> {
    let apply = |a: Vector, b: Vector| Vector::new(op(a.x, b.x), op(a.y, b.y), op(a.z, b.z));
    let splat = |k: f32| Vector::new(k, k, k);

    match (operand(lhs)?, operand(rhs)?) {
        (Operand::Vector(a), Operand::Vector(b)) => Ok(apply(a, b)),
        (Operand::Vector(a), Operand::Scalar(k)) => Ok(apply(a, splat(k))),
        (Operand::Scalar(k), Operand::Vector(b)) => Ok(apply(splat(k), b)),
        (Operand::Scalar(_), Operand::Scalar(_)) => Err(mlua::Error::RuntimeError(
            "vector arithmetic needs at least one vector operand".to_string(),
        )),
    }
}

impl FromLua for Vector {
    fn from_lua(value: Value, _lua: &Lua) -> mlua::Result<Self> {
        match value {
            Value::UserData(ud) => Ok(*ud.borrow::<Vector>()?),
            other => Err(mlua::Error::RuntimeError(format!(
                "expected vector, got {}",
                other.type_name()
            ))),
        }
    }
}

impl UserData for Vector {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("x", |_, this| Ok(this.x));
        fields.add_field_method_get("y", |_, this| Ok(this.y));
        fields.add_field_method_get("z", |_, this| Ok(this.z));
        fields.add_field_method_get("r", |_, this| Ok(this.x));
        fields.add_field_method_get("g", |_, this| Ok(this.y));
        fields.add_field_method_get("b", |_, this| Ok(this.z));

        fields.add_field_method_set("x", |_, this, v: f32| {
            this.x = v;
            Ok(())
        });
        fields.add_field_method_set("y", |_, this, v: f32| {
            this.y = v;
            Ok(())
        });
        fields.add_field_method_set("z", |_, this, v: f32| {
            this.z = v;
            Ok(())
        });
        fields.add_field_method_set("r", |_, this, v: f32| {
            this.x = v;
            Ok(())
        });
        fields.add_field_method_set("g", |_, this, v: f32| {
            this.y = v;
            Ok(())
        });
        fields.add_field_method_set("b", |_, this, v: f32| {
            this.z = v;
            Ok(())
        });
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_function(MetaMethod::Add, |_, (a, b): (Value, Value)| {
            arith(&a, &b, |x, y| x + y)
        });
        methods.add_meta_function(MetaMethod::Sub, |_, (a, b): (Value, Value)| {
            arith(&a, &b, |x, y| x - y)
        });
        methods.add_meta_function(MetaMethod::Mul, |_, (a, b): (Value, Value)| {
            arith(&a, &b, |x, y| x * y)
        });
        methods.add_meta_function(MetaMethod::Div, |_, (a, b): (Value, Value)| {
            arith(&a, &b, |x, y| x / y)
        });

        methods.add_meta_method(MetaMethod::Eq, |_, this, other: Value| {
            Ok(match other {
                Value::UserData(ud) => ud.borrow::<Vector>().is_ok_and(|v| *this == *v),
                _ => false,
            })
        });
        methods.add_meta_method(MetaMethod::Len, |_, this, ()| Ok(this.length()));
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.to_string()));
    }
}

/// Install the global `vector` table
pub fn install(lua: &Lua) -> mlua::Result<()> {
    let vector = lua.create_table()?;
    vector.set(
        "new",
        lua.create_function(|_, (x, y, z): (Option<f32>, Option<f32>, Option<f32>)| {
            Ok(Vector::new(
                x.unwrap_or_default(),
                y.unwrap_or_default(),
                z.unwrap_or_default(),
            ))
        })?,
    )?;
    lua.globals().set("vector", vector)
}
