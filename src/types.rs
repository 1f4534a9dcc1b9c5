//! Type-safe wrappers for symbols, blocks and program points.
//!
//! This module provides newtype wrappers that enforce compile-time distinction
//! between the different integer identifiers flowing through the engine,
//! preventing common mistakes such as using a block index as an operation id.
use std::fmt;

/// A source symbol (local variable, parameter, field) as seen by the front-end.
///
/// Symbols are opaque to the engine: it only binds them to symbolic values
/// and asks the [semantic model][crate::model::SemanticModel] about their types.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SymbolId(u32);

impl SymbolId {
    /// Creates a new symbol with the given ID.
    pub const fn new(id: u32) -> Self {
        SymbolId(id)
    }

    /// Returns the raw symbol ID as a `u32`.
    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl From<u32> for SymbolId {
    fn from(id: u32) -> Self {
        SymbolId(id)
    }
}

/// Index of a basic block in a [`ControlFlowGraph`][crate::cfg::ControlFlowGraph].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BlockId(usize);

impl BlockId {
    pub const fn new(index: usize) -> Self {
        BlockId(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

impl From<usize> for BlockId {
    fn from(index: usize) -> Self {
        BlockId(index)
    }
}

/// Identifier of an operation, stable across the whole graph.
///
/// Rule checks key their diagnostics by this id; mapping it back to a source
/// location is the front-end's business.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct OperationId(u32);

impl OperationId {
    pub const fn new(id: u32) -> Self {
        OperationId(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op{}", self.0)
    }
}

/// A control point: a position inside a basic block.
///
/// Offsets `0..len` address the operations of the block, offset `len`
/// addresses its terminator.
///
/// # Invariants
///
/// - Points are ordered by block first, then by offset
/// - The entry point of a block has offset 0
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ProgramPoint {
    block: BlockId,
    offset: usize,
}

impl ProgramPoint {
    pub const fn new(block: BlockId, offset: usize) -> Self {
        ProgramPoint { block, offset }
    }

    /// The entry point of the given block.
    pub const fn entry(block: BlockId) -> Self {
        ProgramPoint { block, offset: 0 }
    }

    pub const fn block(self) -> BlockId {
        self.block
    }

    pub const fn offset(self) -> usize {
        self.offset
    }

    /// Returns the next point in the same block.
    pub const fn next(self) -> Self {
        ProgramPoint {
            block: self.block,
            offset: self.offset + 1,
        }
    }
}

impl fmt::Display for ProgramPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.offset)
    }
}
