//! Semantic oracle consumed by the engine.
//!
//! The front-end owns symbol and type information. The engine only needs to
//! know what kind of value a symbol holds, which decides the shape of the
//! symbolic value created for it and the constraints it may carry.

use crate::types::{OperationId, SymbolId};

/// What the engine needs to know about a declared type.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum TypeHint {
    /// A reference type: may be null.
    #[default]
    Reference,
    /// A non-nullable value type: never null.
    Value,
    /// An optional wrapper around a value type.
    Nullable,
    Boolean,
}

impl TypeHint {
    /// Whether values of this type can hold `null`.
    pub fn is_nullable(self) -> bool {
        matches!(self, TypeHint::Reference | TypeHint::Nullable)
    }
}

/// Queries answered by the front-end's semantic model.
pub trait SemanticModel {
    /// Declared type of a symbol.
    fn declared_type(&self, symbol: SymbolId) -> TypeHint;

    /// Whether the operation mentions the symbol.
    fn references_symbol(&self, operation: OperationId, symbol: SymbolId) -> bool;
}

/// A model that knows nothing: every symbol is a reference, no operation
/// references anything.
#[derive(Debug, Copy, Clone, Default)]
pub struct UnknownModel;

impl SemanticModel for UnknownModel {
    fn declared_type(&self, _symbol: SymbolId) -> TypeHint {
        TypeHint::Reference
    }

    fn references_symbol(&self, _operation: OperationId, _symbol: SymbolId) -> bool {
        false
    }
}

/// A model backed by explicit tables, handy for hosts with precomputed facts.
#[derive(Debug, Clone, Default)]
pub struct TableModel {
    types: std::collections::HashMap<SymbolId, TypeHint>,
    references: std::collections::HashSet<(OperationId, SymbolId)>,
}

impl TableModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, symbol: SymbolId, hint: TypeHint) -> Self {
        self.types.insert(symbol, hint);
        self
    }

    pub fn with_reference(mut self, operation: OperationId, symbol: SymbolId) -> Self {
        self.references.insert((operation, symbol));
        self
    }
}

impl SemanticModel for TableModel {
    fn declared_type(&self, symbol: SymbolId) -> TypeHint {
        self.types.get(&symbol).copied().unwrap_or_default()
    }

    fn references_symbol(&self, operation: OperationId, symbol: SymbolId) -> bool {
        self.references.contains(&(operation, symbol))
    }
}
