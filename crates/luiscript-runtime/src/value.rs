use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// Opaque reference into the host heap (table, function or userdata)
///
/// The runtime never owns what a `HostRef` points at. It is only valid while
/// the host keeps the underlying entry alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostRef(pub u64);

/// Three component vector shared by the host and scripts
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self::new(f(self.x), f(self.y), f(self.z))
    }

    fn zip(self, other: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        Self::new(f(self.x, other.x), f(self.y, other.y), f(self.z, other.z))
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{x: {:.6}, y: {:.6}, z: {:.6}}}", self.x, self.y, self.z)
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, rhs: Vector) -> Vector {
        self.zip(rhs, |a, b| a + b)
    }
}

impl Sub for Vector {
    type Output = Vector;

    fn sub(self, rhs: Vector) -> Vector {
        self.zip(rhs, |a, b| a - b)
    }
}

impl Mul for Vector {
    type Output = Vector;

    fn mul(self, rhs: Vector) -> Vector {
        self.zip(rhs, |a, b| a * b)
    }
}

impl Div for Vector {
    type Output = Vector;

    fn div(self, rhs: Vector) -> Vector {
        self.zip(rhs, |a, b| a / b)
    }
}

impl Add<f32> for Vector {
    type Output = Vector;

    fn add(self, rhs: f32) -> Vector {
        self.map(|a| a + rhs)
    }
}

impl Sub<f32> for Vector {
    type Output = Vector;

    fn sub(self, rhs: f32) -> Vector {
        self.map(|a| a - rhs)
    }
}

impl Mul<f32> for Vector {
    type Output = Vector;

    fn mul(self, rhs: f32) -> Vector {
        self.map(|a| a * rhs)
    }
}

impl Div<f32> for Vector {
    type Output = Vector;

    fn div(self, rhs: f32) -> Vector {
        self.map(|a| a / rhs)
    }
}

/// A value native to the embedding application
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HostValue {
    #[default]
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Vector(Vector),
    Table(HostRef),
    Function(HostRef),
    Userdata(HostRef),
}

impl HostValue {
    pub fn is_nil(&self) -> bool {
        matches!(self, HostValue::Nil)
    }

    /// Equality as scripts see it, integers and floats compare by number
    pub fn script_eq(&self, other: &HostValue) -> bool {
        match (self, other) {
            (HostValue::Integer(a), HostValue::Float(b))
            | (HostValue::Float(b), HostValue::Integer(a)) => *a as f64 == *b,
            _ => self == other,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Integer(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        HostValue::Integer(i64::from(value))
    }
}

impl From<u64> for HostValue {
    fn from(value: u64) -> Self {
        HostValue::Integer(value as i64)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Float(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(value)
    }
}

impl From<Vector> for HostValue {
    fn from(value: Vector) -> Self {
        HostValue::Vector(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_component_ops() {
        let a = Vector::new(1.0, 2.0, 3.0);
        let b = Vector::new(4.0, 5.0, 6.0);

        assert_eq!(a + b, Vector::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vector::new(3.0, 3.0, 3.0));
        assert_eq!(a * b, Vector::new(4.0, 10.0, 18.0));
        assert_eq!(b / a, Vector::new(4.0, 2.5, 2.0));
    }

    #[test]
    fn test_vector_scalar_ops() {
        let a = Vector::new(1.0, -2.0, 4.0);

        assert_eq!(a * 2.0, Vector::new(2.0, -4.0, 8.0));
        assert_eq!(a + 1.0, Vector::new(2.0, -1.0, 5.0));
        assert_eq!(a / 2.0, Vector::new(0.5, -1.0, 2.0));
    }

    #[test]
    fn test_vector_equality_is_exact() {
        let a = Vector::new(1.0, 2.0, 3.0);
        assert_eq!(a, Vector::new(1.0, 2.0, 3.0));
        assert_ne!(a, Vector::new(1.0, 2.0, 3.0001));
    }

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(HostValue::Integer(1).script_eq(&HostValue::Float(1.0)));
        assert!(HostValue::Float(2.0).script_eq(&HostValue::Integer(2)));
        assert!(!HostValue::Integer(1).script_eq(&HostValue::Float(1.5)));
        assert!(!HostValue::Integer(1).script_eq(&HostValue::from("1")));
        assert!(HostValue::from("id").script_eq(&HostValue::from("id")));
    }

    #[test]
    fn test_vector_display_and_length() {
        let v = Vector::new(3.0, 4.0, 0.0);
        assert_eq!(v.length(), 5.0);
        assert_eq!(v.to_string(), "{x: 3.000000, y: 4.000000, z: 0.000000}");
    }
}
