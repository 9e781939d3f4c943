//! Core definitions for the weft graph representation.
//!
//! A weft graph is a set of *units* (node instances, possibly wrapping
//! nested graphs) whose pins are wired through *merges* (n-ary hyperedges)
//! and exposed at the graph boundary through *plugs*. Pins are typed with a
//! textual expression language covering literals, structural types,
//! generics, unions/intersections and tagged class types.
//!
//! This crate contains:
//!
//! - [`spec`]: the addressable graph specification model;
//! - [`tree`]: the expression parser, tree and structural edit operations;
//! - [`types`]: the type matcher and generics engine;
//! - [`value`]: the literal value evaluator and bundle handling;
//! - [`graph`]: the mutation contract ([`graph::GraphMut`]), the reference
//!   store and the subgraph mover.

pub mod graph;
pub mod spec;
pub mod tree;
pub mod types;
pub mod value;

pub use crate::graph::{Graph, GraphMut, GraphView};
pub use crate::spec::{Dict, GraphSpec, IO, IoOf, MergeSpec, PlugSpec, SELF, UnitSpec};
pub use crate::tree::{TreeNode, TreeNodeKind};
pub use crate::types::{SpecRegistry, is_type_match};
pub use crate::value::{EvalError, Value, evaluate};
