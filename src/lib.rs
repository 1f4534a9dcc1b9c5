//! # symex-rs: a symbolic execution core for static analysis
//!
//! **`symex-rs`** explores a control-flow graph path by path while tracking what is known about every
//! value: whether it can be null, whether it was disposed, how it compares to other values.
//! Rule checks (null dereference, double dispose, redundant conditions, ...) observe the exploration
//! and decide what to report. The crate contains the engine only; parsing, rules and reporting live elsewhere.
//!
//! ## Key Features
//!
//! - **Arena of symbolic values**: values are immutable and identity-based, addressed by lightweight
//!   [`ValueRef`][crate::reference::ValueRef] handles into a [`ValueArena`][crate::value::ValueArena].
//! - **Constraint lattice**: closed families of mutually exclusive [constraints][crate::constraint]
//!   (`True`/`False`, `Null`/`NotNull`, `Disposed`/`NotDisposed`, ...), at most one per family per value.
//! - **Relationships**: equality and ordering facts between values, kept closed under
//!   transitive inference with contradiction detection ([`relationship`]).
//! - **Persistent program states**: [`ProgramState`][crate::state::ProgramState] forks cheaply
//!   (structural sharing via `im`) and compares structurally for deduplication.
//! - **Bounded exploration**: per-point visit caps and a global state cap, reported as an incomplete
//!   result, never as a silently complete one ([`explorer`]).
//!
//! ## Basic Usage
//!
//! ```rust
//! use symex_rs::constraint::Constraint;
//! use symex_rs::reference::ValueRef;
//! use symex_rs::state::ProgramState;
//! use symex_rs::types::SymbolId;
//! use symex_rs::value::ValueArena;
//!
//! // 1. Initialize the arena
//! let values = ValueArena::new();
//!
//! // 2. Bind a symbol to a fresh value
//! let x = values.mk_plain();
//! let state = ProgramState::new().store_symbol_value(SymbolId::new(1), x);
//!
//! // 3. Build the condition `x == null` and assume it is false
//! let is_null = values.mk_equals(x, ValueRef::NULL);
//! let states = values.try_set_constraint(&state, is_null, Constraint::FALSE);
//!
//! // 4. Exactly one feasible state, where x is known not to be null
//! assert_eq!(states.len(), 1);
//! assert!(states[0].has_constraint(x, Constraint::NOT_NULL));
//!
//! // 5. Assuming x is null on top of that is infeasible
//! assert!(values.try_set_constraint(&states[0], x, Constraint::NULL).is_empty());
//! ```
//!
//! ## Core Components
//!
//! - **[`value`]** and **[`propagate`]**: the value arena and constraint propagation.
//! - **[`constraint`]**, **[`relationship`]**: the facts attached to values.
//! - **[`state`]**: immutable program states.
//! - **[`explorer`]**: the exploration engine, configured by [`config`] and observed through [`check`].
//! - **[`cfg`]**, **[`model`]**: what the front-end provides.
//! - **[`dot`]**, **[`debug`]**: visualization and inspection.

pub mod cfg;
pub mod check;
pub mod config;
pub mod constraint;
pub mod debug;
pub mod dot;
pub mod error;
pub mod explorer;
pub mod model;
pub mod propagate;
pub mod reference;
pub mod relationship;
pub mod state;
pub mod types;
pub mod value;
