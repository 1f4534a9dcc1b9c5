//! Control-flow graph consumed by the explorer.
//!
//! A graph is a list of basic blocks. Each block is a straight-line sequence
//! of [operations](OperationKind) over an implicit expression stack, ended by
//! a [`Terminator`]. A branch terminator pops its condition from the stack.
//!
//! Graphs are produced by the front-end and are read-only to the engine.
//! [`CfgBuilder`] assembles them by hand:
//!
//! ```
//! use symex_rs::cfg::{BinaryOp, CfgBuilder, Literal, OperationKind, Terminator};
//! use symex_rs::types::SymbolId;
//!
//! let x = SymbolId::new(1);
//! let mut builder = CfgBuilder::new();
//! let entry = builder.entry();
//! let then_block = builder.new_block();
//! let exit = builder.new_block();
//!
//! builder.push(entry, OperationKind::Load(x));
//! builder.push(entry, OperationKind::Literal(Literal::Null));
//! builder.push(entry, OperationKind::Binary(BinaryOp::Equal));
//! builder.terminate(entry, Terminator::branch(then_block, exit));
//! builder.terminate(then_block, Terminator::Jump(exit));
//!
//! let cfg = builder.build();
//! assert_eq!(cfg.len(), 3);
//! assert_eq!(cfg.successors(entry), vec![then_block, exit]);
//! ```

use std::fmt;

use crate::types::{BlockId, OperationId, ProgramPoint, SymbolId};

/// Constant pushed by [`OperationKind::Literal`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Literal {
    True,
    False,
    Null,
    /// Any other constant: a fresh value nothing is known about.
    Unknown,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    ReferenceEqual,
    ReferenceNotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
    Xor,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::ReferenceEqual => "===",
            BinaryOp::ReferenceNotEqual => "!==",
            BinaryOp::Less => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Xor => "^",
        };
        write!(f, "{}", s)
    }
}

/// Abstract operation over the expression stack.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum OperationKind {
    /// Push a constant.
    Literal(Literal),
    /// Bind the symbol to a fresh value of its declared type.
    Declare(SymbolId),
    /// Push the value bound to the symbol.
    Load(SymbolId),
    /// Pop a value and bind it to the symbol.
    Store(SymbolId),
    This,
    Base,
    /// Pop the right then the left operand, push the combined value.
    Binary(BinaryOp),
    /// Pop a boolean, push its negation.
    Not,
    /// Pop the arguments, push the result if the callee returns one.
    Invoke { arguments: usize, returns: bool },
    /// Pop the constructor arguments, push the new (non-null) object.
    New { arguments: usize },
    /// Member access on the value on top of the stack, which stays there.
    Dereference,
    /// Pop a value and release it.
    Dispose,
    /// Pop and forget a value.
    Discard,
    /// The symbols go out of scope.
    EndScope(Vec<SymbolId>),
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Literal(Literal::True) => write!(f, "push true"),
            OperationKind::Literal(Literal::False) => write!(f, "push false"),
            OperationKind::Literal(Literal::Null) => write!(f, "push null"),
            OperationKind::Literal(Literal::Unknown) => write!(f, "push ?"),
            OperationKind::Declare(s) => write!(f, "declare {}", s),
            OperationKind::Load(s) => write!(f, "load {}", s),
            OperationKind::Store(s) => write!(f, "store {}", s),
            OperationKind::This => write!(f, "this"),
            OperationKind::Base => write!(f, "base"),
            OperationKind::Binary(op) => write!(f, "binary {}", op),
            OperationKind::Not => write!(f, "not"),
            OperationKind::Invoke { arguments, returns } => {
                write!(f, "invoke/{}", arguments)?;
                if *returns {
                    write!(f, " -> value")?;
                }
                Ok(())
            }
            OperationKind::New { arguments } => write!(f, "new/{}", arguments),
            OperationKind::Dereference => write!(f, "deref"),
            OperationKind::Dispose => write!(f, "dispose"),
            OperationKind::Discard => write!(f, "discard"),
            OperationKind::EndScope(symbols) => {
                write!(f, "end scope")?;
                for s in symbols {
                    write!(f, " {}", s)?;
                }
                Ok(())
            }
        }
    }
}

/// An operation together with its identity in the front-end.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Operation {
    pub id: OperationId,
    pub kind: OperationKind,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.kind)
    }
}

/// How a basic block ends.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Terminator {
    Jump(BlockId),
    /// Pop a boolean condition and go to `true_target` or `false_target`.
    Branch { true_target: BlockId, false_target: BlockId },
    Exit,
}

impl Terminator {
    pub fn branch(true_target: BlockId, false_target: BlockId) -> Self {
        Terminator::Branch {
            true_target,
            false_target,
        }
    }

    pub fn successors(&self) -> Vec<BlockId> {
        match *self {
            Terminator::Jump(target) => vec![target],
            Terminator::Branch {
                true_target,
                false_target,
            } => vec![true_target, false_target],
            Terminator::Exit => vec![],
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Jump(target) => write!(f, "goto {}", target),
            Terminator::Branch {
                true_target,
                false_target,
            } => write!(f, "if pop then {} else {}", true_target, false_target),
            Terminator::Exit => write!(f, "exit"),
        }
    }
}

/// A basic block: straight-line operations and a terminator.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BasicBlock {
    pub id: BlockId,
    pub operations: Vec<Operation>,
    pub terminator: Terminator,
}

impl BasicBlock {
    /// Number of program points in the block: one per operation, plus the terminator.
    pub fn points(&self) -> usize {
        self.operations.len() + 1
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ControlFlowGraph {
    /// All basic blocks, indexed by [`BlockId`].
    blocks: Vec<BasicBlock>,
    entry: BlockId,
}

impl ControlFlowGraph {
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index())
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.iter()
    }

    /// The operation at `point`, or `None` at the terminator (or outside the graph).
    pub fn operation(&self, point: ProgramPoint) -> Option<&Operation> {
        self.block(point.block())?.operations.get(point.offset())
    }

    pub fn successors(&self, id: BlockId) -> Vec<BlockId> {
        self.block(id).map(|block| block.terminator.successors()).unwrap_or_default()
    }

    /// Total number of operations in the graph.
    pub fn num_operations(&self) -> usize {
        self.blocks.iter().map(|b| b.operations.len()).sum()
    }
}

impl fmt::Display for ControlFlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CFG (entry: {}):", self.entry)?;
        for block in &self.blocks {
            writeln!(f, "\n{}:", block.id)?;
            for op in &block.operations {
                writeln!(f, "  {}", op)?;
            }
            writeln!(f, "  {}", block.terminator)?;
        }
        Ok(())
    }
}

/// Builder for a [`ControlFlowGraph`].
///
/// Block `bb0` exists from the start and is the entry. Operation ids are
/// assigned in push order. Blocks left without a terminator end with
/// [`Terminator::Exit`].
#[derive(Debug)]
pub struct CfgBuilder {
    blocks: Vec<(Vec<Operation>, Option<Terminator>)>,
    next_operation: u32,
}

impl CfgBuilder {
    pub fn new() -> Self {
        CfgBuilder {
            blocks: vec![(Vec::new(), None)],
            next_operation: 0,
        }
    }

    pub fn entry(&self) -> BlockId {
        BlockId::new(0)
    }

    /// Allocate a fresh empty block.
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push((Vec::new(), None));
        id
    }

    /// Append an operation to the block.
    ///
    /// # Panics
    ///
    /// Panics if the block was not allocated by this builder.
    pub fn push(&mut self, block: BlockId, kind: OperationKind) -> OperationId {
        assert!(block.index() < self.blocks.len(), "Unknown block {}", block);
        let id = OperationId::new(self.next_operation);
        self.next_operation += 1;
        self.blocks[block.index()].0.push(Operation { id, kind });
        id
    }

    /// Append several operations to the block.
    pub fn push_all(&mut self, block: BlockId, kinds: impl IntoIterator<Item = OperationKind>) {
        for kind in kinds {
            self.push(block, kind);
        }
    }

    /// Set the terminator of the block, replacing any previous one.
    pub fn terminate(&mut self, block: BlockId, terminator: Terminator) {
        assert!(block.index() < self.blocks.len(), "Unknown block {}", block);
        self.blocks[block.index()].1 = Some(terminator);
    }

    pub fn build(self) -> ControlFlowGraph {
        let blocks = self
            .blocks
            .into_iter()
            .enumerate()
            .map(|(i, (operations, terminator))| BasicBlock {
                id: BlockId::new(i),
                operations,
                terminator: terminator.unwrap_or(Terminator::Exit),
            })
            .collect();
        ControlFlowGraph {
            blocks,
            entry: BlockId::new(0),
        }
    }
}

impl Default for CfgBuilder {
    fn default() -> Self {
        Self::new()
    }
}
