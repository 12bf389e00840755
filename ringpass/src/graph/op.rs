use indexmap::IndexMap;

use crate::types::{OpRole, OpType};

/// Attribute key holding the role bitmask.
pub const OP_ROLE_KEY: &str = "op_role";

/// Attribute key holding alternating `(param, grad)` variable names.
pub const OP_ROLE_VAR_KEY: &str = "op_role_var";

/// Typed attribute value attached to an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f32),
    Bool(bool),
    Str(String),
    Strs(Vec<String>),
    Ints(Vec<i64>),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_strs(&self) -> Option<&[String]> {
        match self {
            AttrValue::Strs(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        AttrValue::Int(i64::from(v))
    }
}

impl From<usize> for AttrValue {
    fn from(v: usize) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<f32> for AttrValue {
    fn from(v: f32) -> Self {
        AttrValue::Float(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(v: Vec<String>) -> Self {
        AttrValue::Strs(v)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> Self {
        AttrValue::Ints(v)
    }
}

impl From<OpRole> for AttrValue {
    fn from(role: OpRole) -> Self {
        AttrValue::Int(i64::from(role.bits()))
    }
}

impl std::fmt::Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrValue::Int(v) => write!(f, "{v}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::Bool(v) => write!(f, "{v}"),
            AttrValue::Str(v) => write!(f, "{v:?}"),
            AttrValue::Strs(v) => write!(f, "{v:?}"),
            AttrValue::Ints(v) => write!(f, "{v:?}"),
        }
    }
}

/// One operation in a block: a type tag plus named argument slots and
/// attributes, all kept in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    op_type: String,
    inputs: IndexMap<String, Vec<String>>,
    outputs: IndexMap<String, Vec<String>>,
    attrs: IndexMap<String, AttrValue>,
}

impl Operation {
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            attrs: IndexMap::new(),
        }
    }

    /// Start building one of the operations the rewrite emits.
    pub fn emitted(op_type: OpType) -> Self {
        Self::new(op_type.name())
    }

    pub fn with_input<I, S>(mut self, slot: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs
            .insert(slot.to_string(), args.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_output<I, S>(mut self, slot: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs
            .insert(slot.to_string(), args.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn with_role(self, role: OpRole) -> Self {
        self.with_attr(OP_ROLE_KEY, role)
    }

    /// Attach `(param, grad)` pairs under `op_role_var`.
    pub fn with_role_vars<'a>(self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let flat: Vec<String> = pairs
            .into_iter()
            .flat_map(|(p, g)| [p.to_string(), g.to_string()])
            .collect();
        self.with_attr(OP_ROLE_VAR_KEY, flat)
    }

    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    pub fn is(&self, op_type: OpType) -> bool {
        self.op_type == op_type.name()
    }

    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.keys().map(String::as_str)
    }

    pub fn has_input(&self, slot: &str) -> bool {
        self.inputs.contains_key(slot)
    }

    /// Arguments bound to an input slot, empty if the slot is absent.
    pub fn input(&self, slot: &str) -> &[String] {
        self.inputs.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn output(&self, slot: &str) -> &[String] {
        self.outputs.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All output argument names, slot by slot in declaration order.
    pub fn output_arg_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.values().flatten().map(String::as_str)
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.attrs.insert(name.to_string(), value.into());
    }

    /// The role bitmask, or `None` when the operation carries no role.
    pub fn role(&self) -> Option<OpRole> {
        let bits = self.attr(OP_ROLE_KEY)?.as_int()?;
        u32::try_from(bits).ok().map(OpRole::from_bits)
    }

    /// Raw `op_role_var` list, or `None` if the attribute is absent.
    pub fn role_vars(&self) -> Option<&[String]> {
        self.attr(OP_ROLE_VAR_KEY)?.as_strs()
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn slots(
            f: &mut std::fmt::Formatter<'_>,
            map: &IndexMap<String, Vec<String>>,
        ) -> std::fmt::Result {
            f.write_str("{")?;
            for (i, (slot, args)) in map.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{slot}={}", args.join(","))?;
            }
            f.write_str("}")
        }

        slots(f, &self.outputs)?;
        write!(f, " = {}", self.op_type)?;
        slots(f, &self.inputs)?;
        for (name, value) in &self.attrs {
            if name == OP_ROLE_KEY
                && let Some(role) = self.role()
            {
                write!(f, " {name}={role}")?;
                continue;
            }
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}
