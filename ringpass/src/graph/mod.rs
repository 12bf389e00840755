//! In-memory program representation the rewrite operates on.
//!
//! A [`Program`] owns one global [`Block`]; a block owns its ordered
//! [`Operation`]s and the [`Variable`]s they name.

mod block;
mod names;
mod op;
mod program;
mod var;

pub use block::Block;
pub use names::{NameGenerator, UniqueNames};
pub use op::{AttrValue, OP_ROLE_KEY, OP_ROLE_VAR_KEY, Operation};
pub use program::Program;
pub use var::{VarType, Variable};
