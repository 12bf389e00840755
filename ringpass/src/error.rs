use crate::types::Rank;

pub type Result<T> = std::result::Result<T, TranspileError>;

#[derive(Debug, thiserror::Error)]
pub enum TranspileError {
    #[error("the number of endpoints must be > 1, got {nranks}")]
    TooFewEndpoints { nranks: usize },

    #[error("rank must be >= 0, got {rank}")]
    NegativeRank { rank: i64 },

    #[error("invalid rank {rank}: world size is {nranks}")]
    RankOutOfRange { rank: Rank, nranks: usize },

    #[error("current endpoint {endpoint} is not in {endpoints:?}")]
    UnknownEndpoint {
        endpoint: String,
        endpoints: Vec<String>,
    },

    #[error("at least one communication ring is required")]
    ZeroRings,

    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("environment variable {var} has invalid value {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("unknown collective strategy {0:?}")]
    UnknownStrategy(String),

    #[error("strategy {strategy} does not rewrite the main program")]
    UnimplementedStrategy { strategy: &'static str },

    #[error("variable {name} is not declared in the block")]
    UnknownVariable { name: String },

    #[error("operation {op_type} has no argument in slot {slot}")]
    MissingSlot { op_type: String, slot: &'static str },

    #[error("operation {op_type} carries an odd op_role_var list of length {len}")]
    MalformedRoleVar { op_type: String, len: usize },

    #[error("cannot insert at index {index} into a block of {len} operations")]
    InsertOutOfBounds { index: usize, len: usize },

    #[error("peers still unreachable after deadline: {endpoints:?}")]
    PeersUnreachable { endpoints: Vec<String> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranspileError {
    /// True for errors caused by an invalid cluster or strategy configuration.
    ///
    /// These are raised before any program is mutated; retrying without fixing
    /// the configuration yields the same error.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::TooFewEndpoints { .. }
                | Self::NegativeRank { .. }
                | Self::RankOutOfRange { .. }
                | Self::UnknownEndpoint { .. }
                | Self::ZeroRings
                | Self::MissingEnv(_)
                | Self::InvalidEnv { .. }
                | Self::UnknownStrategy(_)
        )
    }
}
