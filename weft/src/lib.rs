//! Runtime core for a node-based visual programming environment.
//!
//! A weft program is a graph of *units* (nodes, possibly nested subgraphs)
//! wired through typed pins and n-ary *merges*. This crate re-exports the
//! core definitions from [`weft_core`]:
//!
//! - the graph specification model and its mutation traits;
//! - the textual type/value expression language (parser, type matcher,
//!   generics engine, value evaluator);
//! - the subgraph mover, which relocates a planned selection of units,
//!   merges, links and plugs between two graphs in either direction.

pub use weft_core::graph::{self, Graph, GraphMut, GraphView};
pub use weft_core::spec::{self, GraphSpec, IO, MergeSpec, PlugSpec, SELF, UnitSpec};
pub use weft_core::tree::{self, TreeNode, TreeNodeKind};
pub use weft_core::types::{self, SpecRegistry, is_type_match};
pub use weft_core::value::{self, Value, evaluate};

pub use weft_core::graph::move_subgraph::{MoveDirection, MovePlan, move_subgraph};
