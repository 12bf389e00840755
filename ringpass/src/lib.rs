pub mod config;
pub mod error;
pub mod graph;
pub mod readiness;
pub mod role;
pub mod startup;
pub mod strategy;
mod transpiler;
pub mod types;

pub use config::{ReadinessConfig, TranspileConfig};
pub use error::{Result, TranspileError};
pub use graph::{AttrValue, Block, NameGenerator, Operation, Program, UniqueNames, Variable};
pub use readiness::{NoWait, PeerReadiness, TcpReadiness};
pub use strategy::{GradAllReduce, LocalSgd, RewriteContext, Strategy, StrategyKind};
pub use transpiler::Transpiler;
pub use types::{OpRole, OpType, Rank, RingCursor, RingId};
