//! The spec expression language: parser, tree and structural edits.
//!
//! Type and value expressions (`{a:number}`, `` `U`&`G` ``, `string[]`,
//! `${…}` bundles, …) parse into a [`TreeNode`] tree. Parsing is total:
//! malformed input classifies as [`TreeNodeKind::Invalid`] instead of
//! failing, so editors can probe partial input while the user types.
//!
//! Edit operations address nodes by a path of child indices and operate on
//! the tree itself; [`TreeNode::serialize`] renders any (possibly edited)
//! tree back to source text.

mod edit;
mod parse;

use itertools::Itertools;

pub use edit::{
    filter_empty_nodes, insert_node_at, last_leaf_path, next_leaf_path, next_node_path,
    node_at_path, parent_node, remove_node_at, update_node_at,
};
pub use parse::{is_valid_obj_key, is_valid_type, is_valid_value, parse_tree, tree_node_kind};

pub(crate) use parse::class_tag_name;

/// Classification of a parsed expression node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, derive_more::Display)]
#[non_exhaustive]
pub enum TreeNodeKind {
    /// Unparseable or empty fragment.
    Invalid,
    /// The `any` type.
    Any,
    /// A generic placeholder, `<T>`.
    Generic,
    /// A base type keyword: `string`, `number`, `boolean`, `object`,
    /// `regex`, `class`.
    Identifier,
    /// An object entry, `key:value`.
    KeyValue,
    /// `{…}`.
    ObjectLiteral,
    /// `[…]`.
    ArrayLiteral,
    /// Array-of-type suffix, `T[]`.
    ArrayExpression,
    /// Dictionary-of-type suffix, `T{}`.
    ObjectExpression,
    /// Property access, `T[k]` / `T["a","b"]`.
    PropExpression,
    /// Parenthesized grouping, `(T)`.
    Expression,
    /// Union, `A|B`.
    Or,
    /// Intersection, `A&B`.
    And,
    /// A quoted string, either quote style.
    StringLiteral,
    /// A numeric literal, including exponent and signed-infinity forms.
    NumberLiteral,
    /// `true` / `false`.
    BooleanLiteral,
    /// `/…/`.
    RegexLiteral,
    /// `null`.
    Null,
    /// A numeric expression, `1 + 2 * 3`.
    ArithmeticExpression,
    /// A backtick class tag, `` `U` `` / `` `A<T>` ``.
    Class,
    /// A function-type literal, `(a:T)=>(b:T)`.
    ClassLiteral,
    /// A `${…}` embedded unit bundle.
    Unit,
    /// An unquoted URL, `unit://…`.
    Url,
}

/// A node of a parsed expression tree.
///
/// `value` holds the exact source slice the node was parsed from (container
/// punctuation included); `children` hold the parsed sub-expressions in
/// source order. An empty child (e.g. behind a trailing comma) has an empty
/// `value` and kind [`TreeNodeKind::Invalid`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    /// Node classification.
    pub kind: TreeNodeKind,
    /// Source slice.
    pub value: String,
    /// Parsed sub-expressions, in source order.
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub(crate) fn new(kind: TreeNodeKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            children: Vec::new(),
        }
    }

    pub(crate) fn with_children(
        kind: TreeNodeKind,
        value: impl Into<String>,
        children: Vec<TreeNode>,
    ) -> Self {
        Self {
            kind,
            value: value.into(),
            children,
        }
    }

    pub(crate) fn invalid(value: impl Into<String>) -> Self {
        Self::new(TreeNodeKind::Invalid, value)
    }

    pub(crate) fn empty() -> Self {
        Self::invalid("")
    }

    /// Whether the node is an empty placeholder (e.g. a trailing comma
    /// slot).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.children.is_empty()
    }

    /// Whether the node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Renders the tree back to source text.
    ///
    /// Untouched nodes render as their original source slice; container
    /// nodes re-assemble from their (possibly edited) children with the
    /// grammar's punctuation.
    #[must_use]
    pub fn serialize(&self) -> String {
        use TreeNodeKind::*;
        match self.kind {
            ObjectLiteral => format!("{{{}}}", self.join_children(",")),
            ArrayLiteral => format!("[{}]", self.join_children(",")),
            KeyValue => {
                let key = self.children.first().map(TreeNode::serialize);
                let value = self.children.get(1).map(TreeNode::serialize);
                format!(
                    "{}:{}",
                    key.unwrap_or_default(),
                    value.unwrap_or_default()
                )
            }
            Or => self.join_children("|"),
            And => self.join_children("&"),
            Expression => format!("({})", self.join_children("")),
            ArrayExpression => match self.children.first() {
                Some(elem) if matches!(elem.kind, Or | And) => {
                    format!("({})[]", elem.serialize())
                }
                Some(elem) => format!("{}[]", elem.serialize()),
                None => self.value.clone(),
            },
            ObjectExpression => match self.children.first() {
                Some(elem) => format!("{}{{}}", elem.serialize()),
                None => self.value.clone(),
            },
            PropExpression => {
                let base = self.children.first().map(TreeNode::serialize);
                let keys = self.children[1..].iter().map(TreeNode::serialize).join(",");
                format!("{}[{}]", base.unwrap_or_default(), keys)
            }
            Class => {
                if self.children.is_empty() {
                    self.value.clone()
                } else {
                    let params = self
                        .children
                        .iter()
                        .map(|param| match param.kind {
                            // Bare generic parameters print without angle
                            // brackets inside the tag.
                            Generic => param
                                .value
                                .trim_start_matches('<')
                                .trim_end_matches('>')
                                .to_owned(),
                            _ => param.serialize(),
                        })
                        .join(",");
                    format!("`{}<{}>`", parse::class_tag_name(&self.value), params)
                }
            }
            _ => self.value.clone(),
        }
    }

    fn join_children(&self, sep: &str) -> String {
        self.children.iter().map(TreeNode::serialize).join(sep)
    }

    /// Visits the node and all descendants, pre-order.
    pub fn walk(&self, f: &mut impl FnMut(&TreeNode)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }
}

impl std::fmt::Display for TreeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.serialize())
    }
}
