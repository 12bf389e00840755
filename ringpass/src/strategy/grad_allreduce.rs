use crate::error::{Result, TranspileError};
use crate::graph::{Block, Operation};
use crate::role::{is_backward_op, is_loss_grad_op, is_optimizer_op, role_var_pairs};
use crate::types::{OpRole, OpType};

use super::{RewriteContext, Strategy};

/// Sum every gradient across ranks as soon as it is produced.
///
/// The loss gradient is pre-scaled by `1/nranks`, so the summed gradients
/// equal the mean gradient and the learning rate keeps its meaning for any
/// number of workers.
#[derive(Debug, Default, Clone, Copy)]
pub struct GradAllReduce;

impl Strategy for GradAllReduce {
    fn name(&self) -> &'static str {
        "grad_allreduce"
    }

    fn rewrite_main(&self, main: &mut Block, ctx: &RewriteContext) -> Result<()> {
        let scaled = insert_scale_loss_grad_ops(main, ctx)?;
        let reduced = insert_allreduce_ops(main, ctx)?;
        tracing::info!(scaled, reduced, nrings = ctx.nrings, "gradient allreduce inserted");
        Ok(())
    }
}

/// Insert `scale(1/nranks)` right after every loss-gradient operation,
/// in place on its first output. Returns the number of scales inserted.
pub fn insert_scale_loss_grad_ops(block: &mut Block, ctx: &RewriteContext) -> Result<usize> {
    let mut targets = Vec::new();
    for (idx, op) in block.ops().iter().enumerate() {
        if !is_loss_grad_op(op) {
            continue;
        }
        let loss_grad = op
            .output_arg_names()
            .next()
            .ok_or_else(|| TranspileError::MissingSlot {
                op_type: op.op_type().to_string(),
                slot: "Out",
            })?;
        block.var(loss_grad)?;
        targets.push((idx, loss_grad.to_string()));
    }

    for (idx, loss_grad) in targets.iter().rev() {
        block.insert_op(
            idx + 1,
            Operation::emitted(OpType::Scale)
                .with_input("X", [loss_grad.as_str()])
                .with_output("Out", [loss_grad.as_str()])
                .with_attr("scale", ctx.mean_scale())
                .with_role(OpRole::BACKWARD),
        )?;
    }

    Ok(targets.len())
}

/// A backward operation and the gradients it produces that need reducing.
struct ReduceSite {
    idx: usize,
    grads: Vec<String>,
}

/// Insert a compute-stream sync and one `c_allreduce_sum` per gradient after
/// each backward operation that declares `(param, grad)` role vars, then a
/// comm-stream barrier per ring before the first optimizer operation.
///
/// Gradients of distributed parameters are left alone, but still count as
/// seen: the barrier is emitted once any `(param, grad)` pair exists and is
/// anchored on the last gradient visited, which is the last pair of the
/// earliest backward operation declaring one. Sites are processed last
/// to first so earlier indices stay valid; within one site every reduction is
/// inserted at the same offset. Returns the number of reductions inserted.
pub fn insert_allreduce_ops(block: &mut Block, ctx: &RewriteContext) -> Result<usize> {
    let mut sites = Vec::new();
    let mut last_seen: Option<String> = None;
    for (idx, op) in block.ops().iter().enumerate() {
        if !is_backward_op(op) {
            continue;
        }
        let pairs = role_var_pairs(op)?;
        let mut grads = Vec::new();
        for &(param, grad) in &pairs {
            let param = block.var(param)?;
            block.var(grad)?;
            if !param.is_distributed {
                grads.push(grad.to_string());
            }
        }
        if last_seen.is_none()
            && let Some(&(_, grad)) = pairs.last()
        {
            last_seen = Some(grad.to_string());
        }
        if !grads.is_empty() {
            sites.push(ReduceSite { idx, grads });
        }
    }

    let mut rings = ctx.rings();
    let mut reduced = 0;
    for site in sites.iter().rev() {
        let offset = site.idx + 2;
        block.insert_op(
            site.idx + 1,
            Operation::emitted(OpType::SyncCalcStream)
                .with_input("X", [site.grads[0].as_str()])
                .with_output("Out", [site.grads[0].as_str()])
                .with_role(OpRole::BACKWARD),
        )?;
        for grad in &site.grads {
            let ring_id = rings.next();
            block.insert_op(
                offset,
                Operation::emitted(OpType::AllReduceSum)
                    .with_input("X", [grad.as_str()])
                    .with_output("Out", [grad.as_str()])
                    .with_attr("ring_id", ring_id)
                    .with_role(OpRole::BACKWARD),
            )?;
            tracing::debug!(ring_id, grad = %grad, "allreduce inserted");
            reduced += 1;
        }
    }

    let Some(anchor) = last_seen else {
        return Ok(0);
    };

    if let Some(idx) = block.ops().iter().position(is_optimizer_op) {
        for ring_id in rings.all() {
            block.insert_op(
                idx + ring_id as usize,
                Operation::emitted(OpType::SyncCommStream)
                    .with_input("X", [anchor.as_str()])
                    .with_output("Out", [anchor.as_str()])
                    .with_attr("ring_id", ring_id)
                    .with_role(OpRole::BACKWARD),
            )?;
        }
    }

    Ok(reduced)
}
