use super::block::Block;

/// A program: one global block plus, once rewritten, a snapshot of itself as
/// it was before rewriting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    block: Block,
    origin: Option<Box<Program>>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_block(block: Block) -> Self {
        Self {
            block,
            origin: None,
        }
    }

    pub fn global_block(&self) -> &Block {
        &self.block
    }

    pub fn global_block_mut(&mut self) -> &mut Block {
        &mut self.block
    }

    /// The program as it was before the last rewrite, if any.
    pub fn origin(&self) -> Option<&Program> {
        self.origin.as_deref()
    }

    /// Record the current state as the pre-rewrite snapshot.
    ///
    /// Any earlier snapshot is dropped, so snapshots never nest.
    pub(crate) fn snapshot_origin(&mut self) {
        let mut snapshot = self.clone();
        snapshot.origin = None;
        self.origin = Some(Box::new(snapshot));
    }
}
