use indexmap::IndexMap;

use crate::error::{Result, TranspileError};

use super::op::Operation;
use super::var::Variable;

/// An ordered sequence of operations plus the variables they reference.
///
/// Variables keep their declaration order, which is the order
/// [`iter_parameters`](Self::iter_parameters) walks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    ops: Vec<Operation>,
    vars: IndexMap<String, Variable>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable, or return the existing one if the name is taken.
    pub fn create_var(&mut self, var: Variable) -> &Variable {
        self.vars.entry(var.name.clone()).or_insert(var)
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn var(&self, name: &str) -> Result<&Variable> {
        self.vars
            .get(name)
            .ok_or_else(|| TranspileError::UnknownVariable {
                name: name.to_string(),
            })
    }

    pub fn vars(&self) -> impl Iterator<Item = &Variable> {
        self.vars.values()
    }

    /// Trainable parameters in declaration order.
    pub fn iter_parameters(&self) -> impl Iterator<Item = &Variable> {
        self.vars.values().filter(|v| v.is_parameter)
    }

    pub fn append_op(&mut self, op: Operation) {
        self.ops.push(op);
    }

    /// Insert `op` at `index`, shifting later operations back by one.
    pub fn insert_op(&mut self, index: usize, op: Operation) -> Result<()> {
        if index > self.ops.len() {
            return Err(TranspileError::InsertOutOfBounds {
                index,
                len: self.ops.len(),
            });
        }
        self.ops.insert(index, op);
        Ok(())
    }

    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    /// Mutable access for in-place attribute edits.
    pub fn op_mut(&mut self, index: usize) -> Option<&mut Operation> {
        self.ops.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (idx, op) in self.ops.iter().enumerate() {
            writeln!(f, "{idx:>4}: {op}")?;
        }
        Ok(())
    }
}
