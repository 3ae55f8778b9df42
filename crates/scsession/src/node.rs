//! Typed wire-protocol identifiers.
//!
//! Directly grounded on the teacher's `vibelang-core/src/scsynth.rs`
//! (`NodeId`, `BufNum`, `Target`, `AddAction`): same newtype-over-`i32`
//! shape and the same `auto()`/`root()` conventions scsynth itself
//! defines, renumbered where spec.md's allocator defaults differ from
//! the teacher's (node ids start at `1000` here, not `2000`/`1000`
//! split by synth/group; buffer ids start at `0`, not `100`).

use rosc::OscType;

/// A node id, as scsynth assigns or a client requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub i32);

impl NodeId {
    /// Ask scsynth to pick the next id itself.
    pub fn auto() -> NodeId {
        NodeId(-1)
    }

    /// The always-present root group.
    pub fn root() -> NodeId {
        NodeId(0)
    }

    pub fn as_i32(self) -> i32 {
        self.0
    }
}

impl From<i32> for NodeId {
    fn from(v: i32) -> Self {
        NodeId(v)
    }
}

impl From<NodeId> for OscType {
    fn from(id: NodeId) -> Self {
        OscType::Int(id.0)
    }
}

/// A buffer id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufNum(pub i32);

impl BufNum {
    pub fn as_i32(self) -> i32 {
        self.0
    }
}

impl From<i32> for BufNum {
    fn from(v: i32) -> Self {
        BufNum(v)
    }
}

impl From<BufNum> for OscType {
    fn from(b: BufNum) -> Self {
        OscType::Int(b.0)
    }
}

/// Target node id for an add-action (the group or node a new node is
/// inserted relative to).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Target(pub i32);

impl Target {
    pub fn as_i32(self) -> i32 {
        self.0
    }
}

impl From<i32> for Target {
    fn from(v: i32) -> Self {
        Target(v)
    }
}

impl From<NodeId> for Target {
    fn from(id: NodeId) -> Self {
        Target(id.0)
    }
}

impl From<Target> for OscType {
    fn from(t: Target) -> Self {
        OscType::Int(t.0)
    }
}

/// Where a new node is inserted relative to its `Target`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddAction {
    AddToHead = 0,
    AddToTail = 1,
    AddBefore = 2,
    AddAfter = 3,
    AddReplace = 4,
}

impl From<AddAction> for i32 {
    fn from(a: AddAction) -> Self {
        a as i32
    }
}

impl From<AddAction> for OscType {
    fn from(a: AddAction) -> Self {
        OscType::Int(a as i32)
    }
}
