use crate::graph::{Block, Operation};
use crate::types::{OpRole, OpType, RingCursor};

/// Broadcast every non-distributed parameter from rank 0.
///
/// Parameters are visited in declaration order and assigned rings round-robin
/// starting at 0. After the broadcasts, one `c_sync_comm_stream` per ring is
/// appended, anchored on the last broadcast parameter. With nothing to
/// broadcast the barrier is skipped: no ring has outstanding work.
///
/// Returns the number of broadcasts emitted.
pub fn broadcast_parameters(block: &mut Block, nrings: u32) -> usize {
    let mut rings = RingCursor::new(nrings);
    let eligible: Vec<String> = block
        .iter_parameters()
        .filter(|p| !p.is_distributed)
        .map(|p| p.name.clone())
        .collect();

    for param in &eligible {
        let ring_id = rings.next();
        block.append_op(
            Operation::emitted(OpType::Broadcast)
                .with_input("X", [param.as_str()])
                .with_output("Out", [param.as_str()])
                .with_attr("ring_id", ring_id)
                .with_attr("root", 0u32)
                .with_role(OpRole::FORWARD),
        );
        tracing::debug!(ring_id, param = %param, "broadcast emitted");
    }

    let Some(anchor) = eligible.last() else {
        tracing::debug!("no parameters to broadcast, skipping comm stream barrier");
        return 0;
    };

    for ring_id in rings.all() {
        block.append_op(
            Operation::emitted(OpType::SyncCommStream)
                .with_input("X", [anchor.as_str()])
                .with_output("Out", [anchor.as_str()])
                .with_attr("ring_id", ring_id)
                .with_role(OpRole::FORWARD),
        );
    }

    eligible.len()
}
