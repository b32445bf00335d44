//! Values exchanged between parameter clients and the parameter server.
use crate::FlockDistributedError;
use anyhow::Result;
use flock_core::Tensor;
use std::{any::Any, collections::BTreeMap, fmt, sync::Arc};

/// Named parameter values.
pub type Parameters = BTreeMap<String, ParamValue>;

/// A parameter value.
///
/// Leaves are numeric arrays such as counters or weights. Groups collect named
/// members, typically the variables of a network. Values of any other type can be
/// stored and fetched as opaque objects, but they are never merged or accumulated.
#[derive(Clone)]
pub enum ParamValue {
    /// A numeric array.
    Leaf(Tensor),

    /// Named members.
    Group(BTreeMap<String, ParamValue>),

    /// A value the library does not know how to combine.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl ParamValue {
    /// Creates a group from `(name, value)` pairs.
    pub fn group<I, K, V>(members: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ParamValue>,
    {
        ParamValue::Group(
            members
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Wraps an arbitrary value.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        ParamValue::Opaque(Arc::new(value))
    }

    /// Name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Leaf(_) => "leaf",
            ParamValue::Group(_) => "group",
            ParamValue::Opaque(_) => "opaque",
        }
    }

    /// Returns the array of a leaf.
    pub fn as_leaf(&self) -> Option<&Tensor> {
        match self {
            ParamValue::Leaf(t) => Some(t),
            _ => None,
        }
    }

    /// Returns the members of a group.
    pub fn as_group(&self) -> Option<&BTreeMap<String, ParamValue>> {
        match self {
            ParamValue::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Returns the element of a leaf holding exactly one element.
    pub fn item(&self) -> Option<f64> {
        self.as_leaf().and_then(|t| t.item())
    }

    /// Adds `delta` to `self` in place.
    ///
    /// Leaves add numerically, broadcasting `delta` into the shape of `self`. Groups add
    /// member by member and every member of `delta` must exist in `self`. `name` is the
    /// name of `self` and is reported in errors.
    pub fn add_assign(&mut self, name: &str, delta: &ParamValue) -> Result<()> {
        match (self, delta) {
            (ParamValue::Leaf(a), ParamValue::Leaf(b)) => a.add_assign(b),
            (ParamValue::Group(a), ParamValue::Group(b)) => {
                for (k, v) in b.iter() {
                    let member = format!("{}.{}", name, k);
                    match a.get_mut(k) {
                        Some(x) => x.add_assign(&member, v)?,
                        None => return Err(FlockDistributedError::UnknownParameter(member).into()),
                    }
                }
                Ok(())
            }
            (ParamValue::Opaque(_), _) | (_, ParamValue::Opaque(_)) => {
                Err(FlockDistributedError::UnsupportedParameterType {
                    name: name.to_string(),
                    kind: "opaque",
                }
                .into())
            }
            (lhs, rhs) => Err(FlockDistributedError::UnsupportedParameterType {
                name: name.to_string(),
                kind: if lhs.kind() == "leaf" { rhs.kind() } else { lhs.kind() },
            }
            .into()),
        }
    }
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Leaf(t) => f.debug_tuple("Leaf").field(t).finish(),
            ParamValue::Group(g) => f.debug_tuple("Group").field(g).finish(),
            ParamValue::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Leaf(a), ParamValue::Leaf(b)) => a == b,
            (ParamValue::Group(a), ParamValue::Group(b)) => a == b,
            (ParamValue::Opaque(a), ParamValue::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Tensor> for ParamValue {
    fn from(t: Tensor) -> Self {
        ParamValue::Leaf(t)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Leaf(v.into())
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Leaf(v.into())
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Leaf(v.into())
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Leaf(v.into())
    }
}
