//! Node layouts and per-node type tables.
//!
//! Both discretizations share one ordering: node `0` is the hub, then
//! `per_blade` nodes for each blade in turn (root to tip), then the
//! tower nodes (base to top). The node type of every index is computed
//! once when the layout is built, so per-node queries are a table lookup.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Which structure a node sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// The single hub node.
    Hub,
    /// A node on one of the blades.
    Blade,
    /// A node on the tower.
    Tower,
}

/// A contiguous run of nodes sharing one arc-length parameterization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Span {
    /// The hub: a zero-length span with exactly one node.
    Hub,
    /// Blade `b`.
    Blade(u32),
    /// The tower.
    Tower,
}

/// Node counts of one discretization plus the precomputed type table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeLayout {
    n_blades: u32,
    per_blade: u32,
    tower: u32,
    types: Vec<NodeType>,
}

impl NodeLayout {
    /// Index of the hub node.
    pub const HUB: usize = 0;

    /// Build a layout and its node type table.
    pub fn new(n_blades: u32, per_blade: u32, tower: u32) -> Self {
        let blade_nodes = n_blades as usize * per_blade as usize;
        let mut types = Vec::with_capacity(1 + blade_nodes + tower as usize);
        types.push(NodeType::Hub);
        types.extend(std::iter::repeat_n(NodeType::Blade, blade_nodes));
        types.extend(std::iter::repeat_n(NodeType::Tower, tower as usize));
        Self {
            n_blades,
            per_blade,
            tower,
            types,
        }
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Always false: every layout has a hub node.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Number of blades.
    pub fn n_blades(&self) -> u32 {
        self.n_blades
    }

    /// Nodes per blade.
    pub fn per_blade(&self) -> u32 {
        self.per_blade
    }

    /// Nodes on the tower.
    pub fn tower(&self) -> u32 {
        self.tower
    }

    /// Type of node `i`, or `None` past the end.
    pub fn node_type(&self, i: usize) -> Option<NodeType> {
        self.types.get(i).copied()
    }

    /// Node indices of blade `b`.
    ///
    /// # Panics
    ///
    /// Panics if `b >= n_blades`.
    pub fn blade_range(&self, b: u32) -> Range<usize> {
        assert!(b < self.n_blades, "blade {b} out of range ({} blades)", self.n_blades);
        let start = 1 + b as usize * self.per_blade as usize;
        start..start + self.per_blade as usize
    }

    /// Node indices of the tower.
    pub fn tower_range(&self) -> Range<usize> {
        let start = 1 + self.n_blades as usize * self.per_blade as usize;
        start..start + self.tower as usize
    }

    /// The span node `i` belongs to, or `None` past the end.
    pub fn span_of(&self, i: usize) -> Option<Span> {
        match self.node_type(i)? {
            NodeType::Hub => Some(Span::Hub),
            NodeType::Blade => Some(Span::Blade(((i - 1) / self.per_blade as usize) as u32)),
            NodeType::Tower => Some(Span::Tower),
        }
    }
}
