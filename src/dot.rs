//! Graphviz (DOT) rendering of symbolic values and control-flow graphs.
//!
//! # Value graphs
//!
//! [`ValueArena::to_dot`] renders the DAG of values reachable from some roots:
//! - **Singletons** (`true`, `false`, `null`, `this`, `base`) are boxes at the bottom (sink rank)
//! - **Other values** are ellipses labeled with their operator
//! - **Edges** go from a composite value to its operands:
//!   solid to the left operand, dashed to the right one, dotted to the payload
//!   of a nullable wrapper
//! - **Root values** hang from rectangles at the top (source rank)
//!
//! [`ValueArena::state_to_dot`] renders the values of a program state instead,
//! with their constraints in the labels and the relationships of the state as
//! red edges.
//!
//! # Control-flow graphs
//!
//! [`ControlFlowGraph::to_dot`] renders one record per basic block, listing
//! its operations, with `T`/`F` labels on branch edges.
//!
//! ```
//! use symex_rs::value::ValueArena;
//! use symex_rs::reference::ValueRef;
//!
//! let values = ValueArena::new();
//! let x = values.mk_plain();
//! let f = values.mk_not(values.mk_equals(x, ValueRef::NULL));
//!
//! let dot = values.to_dot(&[f]).unwrap();
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! assert!(dot.starts_with("digraph {"));
//! ```

use std::fmt::Write as _;

use crate::cfg::{ControlFlowGraph, Terminator};
use crate::reference::ValueRef;
use crate::relationship::{EqualityKind, Relationship};
use crate::state::ProgramState;
use crate::value::{BinaryBoolOp, ComparisonKind, ValueArena, ValueKind};

/// Configuration options for DOT output generation.
///
/// ```
/// use symex_rs::dot::DotConfig;
/// use symex_rs::value::ValueArena;
///
/// let values = ValueArena::new();
/// let x = values.mk_plain();
/// let config = DotConfig {
///     value_shape: "circle",
///     ..DotConfig::default()
/// };
/// let dot = values.to_dot_with_config(&[x], &config).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for values (default: "ellipse")
    pub value_shape: &'static str,
    /// Shape for singletons (default: "box")
    pub singleton_shape: &'static str,
    /// Shape for root markers (default: "rect")
    pub root_shape: &'static str,
    /// Style for edges to the left (or only) operand (default: "solid")
    pub left_edge_style: &'static str,
    /// Style for edges to the right operand (default: "dashed")
    pub right_edge_style: &'static str,
    /// Style for edges to the payload of a nullable wrapper (default: "dotted")
    pub wrapped_edge_style: &'static str,
    /// Color for relationship edges (default: "red")
    pub relationship_color: &'static str,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            value_shape: "ellipse",
            singleton_shape: "box",
            root_shape: "rect",
            left_edge_style: "solid",
            right_edge_style: "dashed",
            wrapped_edge_style: "dotted",
            relationship_color: "red",
        }
    }
}

fn operator(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::BoolLiteral(_) | ValueKind::Null | ValueKind::This | ValueKind::Base | ValueKind::Plain => "",
        ValueKind::Nullable(_) => "?",
        ValueKind::Not(_) => "!",
        ValueKind::Binary(BinaryBoolOp::And, ..) => "&&",
        ValueKind::Binary(BinaryBoolOp::Or, ..) => "||",
        ValueKind::Binary(BinaryBoolOp::Xor, ..) => "^",
        ValueKind::Equals(EqualityKind::Value, ..) => "==",
        ValueKind::Equals(EqualityKind::Reference, ..) => "===",
        ValueKind::NotEquals(EqualityKind::Value, ..) => "!=",
        ValueKind::NotEquals(EqualityKind::Reference, ..) => "!==",
        ValueKind::Comparison(ComparisonKind::Less, ..) => "<",
        ValueKind::Comparison(ComparisonKind::LessOrEqual, ..) => "<=",
    }
}

fn node_label(value: ValueRef, kind: ValueKind) -> String {
    match operator(kind) {
        "" => value.to_string(),
        op => format!("{}: {}", value, op),
    }
}

fn relationship_label(r: &Relationship) -> &'static str {
    match r {
        Relationship::Equals(EqualityKind::Value, ..) => "==",
        Relationship::Equals(EqualityKind::Reference, ..) => "===",
        Relationship::NotEquals(EqualityKind::Value, ..) => "!=",
        Relationship::NotEquals(EqualityKind::Reference, ..) => "!==",
        Relationship::Less(..) => "<",
        Relationship::LessOrEqual(..) => "<=",
    }
}

impl ValueArena {
    /// Renders the values reachable from `roots` as a DOT digraph.
    pub fn to_dot(&self, roots: &[ValueRef]) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(roots, &DotConfig::default())
    }

    /// Renders the values reachable from `roots` with a custom configuration.
    pub fn to_dot_with_config(&self, roots: &[ValueRef], config: &DotConfig) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph {{")?;
        self.write_values(&mut dot, roots.iter().copied(), None, config)?;

        writeln!(dot, "{{ rank=source")?;
        for (i, root) in roots.iter().enumerate() {
            writeln!(dot, "r{} [shape={}, label=\"{}\"];", i, config.root_shape, root)?;
        }
        writeln!(dot, "}}")?;
        for (i, root) in roots.iter().enumerate() {
            writeln!(dot, "r{} -> {};", i, root.index())?;
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }

    /// Renders the values of a program state: the symbols and stack entries
    /// as roots, constraints in the labels and relationships as extra edges.
    pub fn state_to_dot(&self, state: &ProgramState, config: &DotConfig) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph {{")?;

        let roots: Vec<ValueRef> = state.symbols().map(|(_, v)| v).chain(state.stack()).collect();
        self.write_values(&mut dot, roots.iter().copied(), Some(state), config)?;

        writeln!(dot, "{{ rank=source")?;
        for (symbol, _) in state.symbols() {
            writeln!(dot, "{} [shape={}, label=\"{}\"];", symbol, config.root_shape, symbol)?;
        }
        for (depth, _) in state.stack().enumerate() {
            writeln!(dot, "stack{} [shape={}, label=\"stack[{}]\"];", depth, config.root_shape, depth)?;
        }
        writeln!(dot, "}}")?;
        for (symbol, value) in state.symbols() {
            writeln!(dot, "{} -> {};", symbol, value.index())?;
        }
        for (depth, value) in state.stack().enumerate() {
            writeln!(dot, "stack{} -> {};", depth, value.index())?;
        }

        for r in state.relationships() {
            let (a, b) = r.operands();
            writeln!(
                dot,
                "{} -> {} [color={}, fontcolor={}, constraint=false, label=\"{}\"];",
                a.index(),
                b.index(),
                config.relationship_color,
                config.relationship_color,
                relationship_label(r)
            )?;
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }

    fn write_values(
        &self,
        dot: &mut String,
        roots: impl IntoIterator<Item = ValueRef>,
        state: Option<&ProgramState>,
        config: &DotConfig,
    ) -> std::fmt::Result {
        let all_values = self.descendants(roots);

        let label = |value: ValueRef| {
            let mut label = node_label(value, self.kind(value));
            if let Some(state) = state {
                let constraints = state.constraints(value);
                if !constraints.is_empty() {
                    label = format!("{}\\n{}", label, constraints);
                }
            }
            label
        };

        writeln!(dot, "{{ rank=sink")?;
        for &value in all_values.iter().filter(|v| v.is_singleton()) {
            writeln!(dot, "{} [shape={}, label=\"{}\"];", value.index(), config.singleton_shape, label(value))?;
        }
        writeln!(dot, "}}")?;

        for &value in all_values.iter().filter(|v| !v.is_singleton()) {
            writeln!(dot, "{} [shape={}, label=\"{}\"];", value.index(), config.value_shape, label(value))?;
        }

        for &value in all_values.iter() {
            match self.kind(value) {
                ValueKind::Nullable(inner) => {
                    writeln!(dot, "{} -> {} [style={}];", value.index(), inner.index(), config.wrapped_edge_style)?;
                }
                ValueKind::Not(a) => {
                    writeln!(dot, "{} -> {} [style={}];", value.index(), a.index(), config.left_edge_style)?;
                }
                ValueKind::Binary(_, a, b)
                | ValueKind::Equals(_, a, b)
                | ValueKind::NotEquals(_, a, b)
                | ValueKind::Comparison(_, a, b) => {
                    writeln!(dot, "{} -> {} [style={}];", value.index(), a.index(), config.left_edge_style)?;
                    writeln!(dot, "{} -> {} [style={}];", value.index(), b.index(), config.right_edge_style)?;
                }
                ValueKind::BoolLiteral(_) | ValueKind::Null | ValueKind::This | ValueKind::Base | ValueKind::Plain => {}
            }
        }
        Ok(())
    }
}

impl ControlFlowGraph {
    /// Renders the graph as a DOT digraph, one record per basic block.
    pub fn to_dot(&self) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph {{")?;
        writeln!(dot, "node [shape=box, fontname=monospace];")?;

        for block in self.blocks() {
            let mut label = format!("{}:\\l", block.id);
            for op in &block.operations {
                write!(label, "{}\\l", op)?;
            }
            write!(label, "{}\\l", block.terminator)?;
            let peripheries = if block.id == self.entry() { 2 } else { 1 };
            writeln!(dot, "{} [label=\"{}\", peripheries={}];", block.id, label, peripheries)?;
        }

        for block in self.blocks() {
            match block.terminator {
                Terminator::Jump(target) => writeln!(dot, "{} -> {};", block.id, target)?,
                Terminator::Branch {
                    true_target,
                    false_target,
                } => {
                    writeln!(dot, "{} -> {} [label=\"T\"];", block.id, true_target)?;
                    writeln!(dot, "{} -> {} [label=\"F\", style=dashed];", block.id, false_target)?;
                }
                Terminator::Exit => {}
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}
