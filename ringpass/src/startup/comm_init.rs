use crate::config::TranspileConfig;
use crate::error::Result;
use crate::graph::{Block, NameGenerator, Operation, Variable};
use crate::readiness::PeerReadiness;
use crate::types::{OpRole, OpType};

/// Prefix for communicator id variables.
pub const NCCL_ID_PREFIX: &str = "nccl_id";

/// Emit communicator setup for every ring.
///
/// Per ring this declares one persistent raw id variable and appends a
/// `c_gen_nccl_id` / `c_comm_init` pair. With `wait_for_peers` set, rank 0
/// first blocks until every other endpoint is reachable.
///
/// The configuration is validated before anything is appended.
pub fn init_communicators(
    block: &mut Block,
    names: &mut dyn NameGenerator,
    readiness: &dyn PeerReadiness,
    cfg: &TranspileConfig,
) -> Result<()> {
    cfg.validate()?;

    let nranks = cfg.nranks();
    let other_endpoints = cfg.other_endpoints();

    if cfg.rank == 0 && cfg.wait_for_peers {
        tracing::info!(peers = other_endpoints.len(), "waiting for peer endpoints");
        readiness.wait_until_reachable(&other_endpoints)?;
    }

    for ring_id in 0..cfg.nrings {
        let id_name = loop {
            let candidate = names.generate(NCCL_ID_PREFIX);
            if !block.has_var(&candidate) {
                break candidate;
            }
        };
        block.create_var(Variable::raw(id_name.clone()));

        block.append_op(
            Operation::emitted(OpType::GenNcclId)
                .with_output("Out", [id_name.as_str()])
                .with_attr("rank", cfg.rank)
                .with_attr("endpoint", cfg.current_endpoint.as_str())
                .with_attr("other_endpoints", other_endpoints.clone())
                .with_role(OpRole::FORWARD),
        );
        block.append_op(
            Operation::emitted(OpType::CommInit)
                .with_input("X", [id_name.as_str()])
                .with_attr("nranks", nranks)
                .with_attr("rank", cfg.rank)
                .with_attr("ring_id", ring_id)
                .with_role(OpRole::FORWARD),
        );
        tracing::debug!(ring_id, id = %id_name, "communicator init emitted");
    }

    Ok(())
}
