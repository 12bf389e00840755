//! Startup-program rewriting shared by every strategy.

mod broadcast;
mod comm_init;

pub use broadcast::broadcast_parameters;
pub use comm_init::{NCCL_ID_PREFIX, init_communicators};

use crate::config::TranspileConfig;
use crate::error::Result;
use crate::graph::{Block, NameGenerator};
use crate::readiness::PeerReadiness;

/// Communicator setup for every ring, then the rank-0 parameter broadcast.
pub fn transpile_startup(
    block: &mut Block,
    names: &mut dyn NameGenerator,
    readiness: &dyn PeerReadiness,
    cfg: &TranspileConfig,
) -> Result<()> {
    init_communicators(block, names, readiness, cfg)?;
    let broadcasts = broadcast_parameters(block, cfg.nrings);
    tracing::debug!(broadcasts, nrings = cfg.nrings, "startup collectives emitted");
    Ok(())
}
