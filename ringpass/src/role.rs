//! Predicates that locate rewrite targets by operation role.
//!
//! An operation without an `op_role` attribute matches none of the
//! role-based predicates.

use crate::error::{Result, TranspileError};
use crate::graph::Operation;
use crate::types::OpRole;

/// Produces the gradient of the loss: role has both `BACKWARD` and `LOSS`.
pub fn is_loss_grad_op(op: &Operation) -> bool {
    op.role()
        .is_some_and(|r| r.contains(OpRole::BACKWARD | OpRole::LOSS))
}

pub fn is_backward_op(op: &Operation) -> bool {
    op.role().is_some_and(|r| r.contains(OpRole::BACKWARD))
}

/// Applies a gradient to a parameter: declares `Param`, `Grad` and
/// `LearningRate` inputs. Does not look at the role.
pub fn is_update_op(op: &Operation) -> bool {
    op.has_input("Param") && op.has_input("Grad") && op.has_input("LearningRate")
}

pub fn is_optimizer_op(op: &Operation) -> bool {
    op.role().is_some_and(|r| r.contains(OpRole::OPTIMIZE))
}

/// Split an operation's `op_role_var` into `(param, grad)` pairs.
///
/// Absent or empty lists yield no pairs; an odd-length list is an error.
pub fn role_var_pairs(op: &Operation) -> Result<Vec<(&str, &str)>> {
    let Some(vars) = op.role_vars() else {
        return Ok(Vec::new());
    };
    if vars.len() % 2 != 0 {
        return Err(TranspileError::MalformedRoleVar {
            op_type: op.op_type().to_string(),
            len: vars.len(),
        });
    }
    Ok(vars
        .chunks_exact(2)
        .map(|pair| (pair[0].as_str(), pair[1].as_str()))
        .collect())
}
