//! Main-program rewriting policies.

mod grad_allreduce;
mod local_sgd;

pub use grad_allreduce::{GradAllReduce, insert_allreduce_ops, insert_scale_loss_grad_ops};
pub use local_sgd::{LocalSgd, SNAPSHOT_SUFFIX, snapshot_name};

use crate::config::TranspileConfig;
use crate::error::{Result, TranspileError};
use crate::graph::Block;
use crate::types::{Rank, RingCursor};

/// Cluster facts a strategy needs while rewriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteContext {
    pub nranks: usize,
    pub rank: Rank,
    pub nrings: u32,
}

impl RewriteContext {
    pub fn from_config(cfg: &TranspileConfig) -> Self {
        Self {
            nranks: cfg.nranks(),
            rank: cfg.rank,
            nrings: cfg.nrings,
        }
    }

    /// Factor turning a cross-rank sum into a mean.
    pub fn mean_scale(&self) -> f32 {
        1.0 / self.nranks as f32
    }

    /// A fresh round-robin cursor for one rewrite pass.
    pub fn rings(&self) -> RingCursor {
        RingCursor::new(self.nrings)
    }
}

/// A policy for inserting collectives into the main program.
///
/// Communicator setup and the parameter broadcast are shared by every
/// strategy and run before [`extend_startup`](Self::extend_startup).
/// Each block must be rewritten exactly once: running a strategy again on
/// its own output duplicates every collective.
pub trait Strategy {
    fn name(&self) -> &'static str;

    /// Append strategy-specific startup operations.
    fn extend_startup(&self, _startup: &mut Block, _ctx: &RewriteContext) -> Result<()> {
        Ok(())
    }

    fn rewrite_main(&self, _main: &mut Block, _ctx: &RewriteContext) -> Result<()> {
        Err(TranspileError::UnimplementedStrategy {
            strategy: self.name(),
        })
    }
}

/// Built-in strategies, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StrategyKind {
    /// Reduce every gradient right after it is produced, every step.
    #[default]
    GradAllReduce,
    /// Update locally, then average parameter drift across ranks.
    LocalSgd,
}

impl StrategyKind {
    pub const fn name(self) -> &'static str {
        match self {
            StrategyKind::GradAllReduce => "grad_allreduce",
            StrategyKind::LocalSgd => "local_sgd",
        }
    }

    pub fn build(self) -> Box<dyn Strategy> {
        match self {
            StrategyKind::GradAllReduce => Box::new(GradAllReduce),
            StrategyKind::LocalSgd => Box::new(LocalSgd),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = TranspileError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "grad_allreduce" => Ok(StrategyKind::GradAllReduce),
            "local_sgd" => Ok(StrategyKind::LocalSgd),
            other => Err(TranspileError::UnknownStrategy(other.to_string())),
        }
    }
}
