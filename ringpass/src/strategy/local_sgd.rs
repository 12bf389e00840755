use crate::error::{Result, TranspileError};
use crate::graph::{Block, Operation, Variable};
use crate::role::is_update_op;
use crate::types::{OpRole, OpType};

use super::{RewriteContext, Strategy};

/// Suffix appended to a parameter name to form its snapshot variable.
pub const SNAPSHOT_SUFFIX: &str = "@SNAPSHOT";

pub fn snapshot_name(param: &str) -> String {
    format!("{param}{SNAPSHOT_SUFFIX}")
}

fn snapshot_var(param: &Variable) -> Variable {
    Variable::tensor(snapshot_name(&param.name), &param.shape)
        .persistable(true)
        .stop_gradient(true)
}

/// Local updates with periodic drift averaging.
///
/// Every non-distributed parameter keeps a persistent snapshot of its value at
/// the last synchronization. After each local update the drift
/// `snapshot - param` is summed across ranks; the post pass turns the sum
/// into the mean drift, subtracts it from the snapshot and refreshes the
/// snapshot, leaving every rank on the same averaged parameter.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalSgd;

impl Strategy for LocalSgd {
    fn name(&self) -> &'static str {
        "local_sgd"
    }

    fn extend_startup(&self, startup: &mut Block, _ctx: &RewriteContext) -> Result<()> {
        let params: Vec<Variable> = startup
            .iter_parameters()
            .filter(|p| !p.is_distributed)
            .cloned()
            .collect();

        for param in &params {
            let snapshot = startup.create_var(snapshot_var(param)).name.clone();
            startup.append_op(
                Operation::emitted(OpType::Assign)
                    .with_input("X", [param.name.as_str()])
                    .with_output("Out", [snapshot.as_str()])
                    .with_role(OpRole::FORWARD),
            );
        }

        tracing::debug!(snapshots = params.len(), "parameter snapshots initialized");
        Ok(())
    }

    fn rewrite_main(&self, main: &mut Block, ctx: &RewriteContext) -> Result<()> {
        let mut updates = Vec::new();
        for (idx, op) in main.ops().iter().enumerate() {
            if !is_update_op(op) {
                continue;
            }
            let param = op
                .input("Param")
                .first()
                .ok_or_else(|| TranspileError::MissingSlot {
                    op_type: op.op_type().to_string(),
                    slot: "Param",
                })?;
            let param = main.var(param)?;
            if !param.is_distributed {
                updates.push((idx, param.clone()));
            }
        }

        let mut rings = ctx.rings();
        let mut synced: Vec<(String, String)> = Vec::with_capacity(updates.len());
        for (idx, param) in updates.iter().rev() {
            let snapshot = main.create_var(snapshot_var(param)).name.clone();
            let p = param.name.as_str();

            main.insert_op(
                idx + 1,
                Operation::emitted(OpType::ElementwiseSub)
                    .with_input("X", [snapshot.as_str()])
                    .with_input("Y", [p])
                    .with_output("Out", [p])
                    .with_role(OpRole::OPTIMIZE),
            )?;
            main.insert_op(
                idx + 2,
                Operation::emitted(OpType::SyncCalcStream)
                    .with_input("X", [p])
                    .with_output("Out", [p])
                    .with_role(OpRole::OPTIMIZE),
            )?;
            let ring_id = rings.next();
            main.insert_op(
                idx + 3,
                Operation::emitted(OpType::AllReduceSum)
                    .with_input("X", [p])
                    .with_output("Out", [p])
                    .with_attr("ring_id", ring_id)
                    .with_role(OpRole::OPTIMIZE),
            )?;
            tracing::debug!(ring_id, param = %p, "drift allreduce inserted");

            synced.push((param.name.clone(), snapshot));
        }

        let Some((anchor, _)) = synced.last() else {
            tracing::info!("no local updates to synchronize");
            return Ok(());
        };

        for ring_id in rings.all() {
            main.append_op(
                Operation::emitted(OpType::SyncCommStream)
                    .with_input("X", [anchor.as_str()])
                    .with_output("Out", [anchor.as_str()])
                    .with_attr("ring_id", ring_id)
                    .with_role(OpRole::OPTIMIZE),
            );
        }

        for (param, snapshot) in synced.iter().rev() {
            main.append_op(
                Operation::emitted(OpType::Scale)
                    .with_input("X", [param.as_str()])
                    .with_output("Out", [param.as_str()])
                    .with_attr("scale", ctx.mean_scale())
                    .with_role(OpRole::OPTIMIZE),
            );
            main.append_op(
                Operation::emitted(OpType::ElementwiseSub)
                    .with_input("X", [snapshot.as_str()])
                    .with_input("Y", [param.as_str()])
                    .with_output("Out", [param.as_str()])
                    .with_role(OpRole::OPTIMIZE),
            );
            main.append_op(
                Operation::emitted(OpType::Assign)
                    .with_input("X", [param.as_str()])
                    .with_output("Out", [snapshot.as_str()])
                    .with_role(OpRole::OPTIMIZE),
            );
        }

        tracing::info!(
            params = synced.len(),
            nrings = ctx.nrings,
            "local sgd synchronization inserted"
        );
        Ok(())
    }
}
