use std::ops::{BitOr, BitOrAssign};

/// Rank of a participant in the training cluster (0-indexed).
pub type Rank = u32;

/// Index of a communication ring, always in `[0, nrings)`.
pub type RingId = u32;

/// Role bitmask attached to every operation under the `op_role` attribute.
///
/// The numeric values are shared with the executor and must not change.
/// `FORWARD` is the empty mask: an operation with no other role bit set is a
/// forward operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpRole(u32);

impl OpRole {
    pub const FORWARD: Self = Self(0x0000);
    pub const BACKWARD: Self = Self(0x0001);
    pub const OPTIMIZE: Self = Self(0x0002);
    pub const RPC: Self = Self(0x0004);
    pub const DIST: Self = Self(0x0008);
    pub const LR_SCHED: Self = Self(0x0010);
    pub const LOSS: Self = Self(0x0100);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if `self` and `other` share at least one bit.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for OpRole {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for OpRole {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Display for OpRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMED: [(OpRole, &str); 6] = [
            (OpRole::BACKWARD, "backward"),
            (OpRole::OPTIMIZE, "optimize"),
            (OpRole::RPC, "rpc"),
            (OpRole::DIST, "dist"),
            (OpRole::LR_SCHED, "lr_sched"),
            (OpRole::LOSS, "loss"),
        ];
        if self.0 == 0 {
            return f.write_str("forward");
        }
        let mut first = true;
        for (role, name) in NAMED {
            if self.intersects(role) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        let unknown = self.0 & !NAMED.iter().fold(0, |acc, (r, _)| acc | r.0);
        if unknown != 0 {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{unknown:#x}")?;
        }
        Ok(())
    }
}

/// Operation types emitted by the rewrite.
///
/// The names are the contract with the executor and are reproduced verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpType {
    GenNcclId,
    CommInit,
    Broadcast,
    SyncCommStream,
    SyncCalcStream,
    AllReduceSum,
    Scale,
    ElementwiseSub,
    Assign,
}

impl OpType {
    pub const fn name(self) -> &'static str {
        match self {
            OpType::GenNcclId => "c_gen_nccl_id",
            OpType::CommInit => "c_comm_init",
            OpType::Broadcast => "c_broadcast",
            OpType::SyncCommStream => "c_sync_comm_stream",
            OpType::SyncCalcStream => "c_sync_calc_stream",
            OpType::AllReduceSum => "c_allreduce_sum",
            OpType::Scale => "scale",
            OpType::ElementwiseSub => "elementwise_sub",
            OpType::Assign => "assign",
        }
    }
}

impl std::fmt::Display for OpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Round-robin ring assignment shared across one rewrite pass.
///
/// The first call to [`next`](Self::next) yields ring 0.
#[derive(Debug, Clone)]
pub struct RingCursor {
    nrings: u32,
    last: Option<RingId>,
}

impl RingCursor {
    /// `nrings` must be non-zero; configuration validation guarantees it.
    pub fn new(nrings: u32) -> Self {
        debug_assert!(nrings > 0, "ring cursor needs at least one ring");
        Self { nrings, last: None }
    }

    pub fn next(&mut self) -> RingId {
        let ring = match self.last {
            Some(prev) => (prev + 1) % self.nrings,
            None => 0,
        };
        self.last = Some(ring);
        ring
    }

    pub fn nrings(&self) -> u32 {
        self.nrings
    }

    /// Iterate every ring id once, in order.
    pub fn all(&self) -> std::ops::Range<RingId> {
        0..self.nrings
    }
}
