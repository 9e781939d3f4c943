//! Path-addressed structural edits over parsed expression trees.
//!
//! A path is the sequence of child indices from the root. Edit operations
//! parse the source text, mutate the tree, and serialize it back; they
//! return `None` when the path does not resolve.

use super::{TreeNode, parse::parse_tree};

/// Resolves `path` against `root`.
#[must_use]
pub fn node_at_path<'a>(root: &'a TreeNode, path: &[usize]) -> Option<&'a TreeNode> {
    let mut node = root;
    for &i in path {
        node = node.children.get(i)?;
    }
    Some(node)
}

fn node_at_path_mut<'a>(root: &'a mut TreeNode, path: &[usize]) -> Option<&'a mut TreeNode> {
    let mut node = root;
    for &i in path {
        node = node.children.get_mut(i)?;
    }
    Some(node)
}

/// The parent of the node at `path`, or `None` at the root.
#[must_use]
pub fn parent_node<'a>(root: &'a TreeNode, path: &[usize]) -> Option<&'a TreeNode> {
    let (_, parent_path) = path.split_last()?;
    node_at_path(root, parent_path)
}

/// The pre-order neighbor of the node at `path`: the next node for
/// `direction > 0`, the previous one otherwise.
#[must_use]
pub fn next_node_path(root: &TreeNode, path: &[usize], direction: i32) -> Option<Vec<usize>> {
    let node = node_at_path(root, path)?;
    if direction > 0 {
        if !node.children.is_empty() {
            let mut next = path.to_vec();
            next.push(0);
            return Some(next);
        }
        let mut prefix = path.to_vec();
        loop {
            let last = prefix.pop()?;
            let parent = node_at_path(root, &prefix)?;
            if last + 1 < parent.children.len() {
                prefix.push(last + 1);
                return Some(prefix);
            }
        }
    } else {
        let (&last, parent_path) = path.split_last()?;
        if last == 0 {
            return Some(parent_path.to_vec());
        }
        let mut prev = parent_path.to_vec();
        prev.push(last - 1);
        // Previous in pre-order is the deepest last descendant of the
        // previous sibling.
        let mut node = node_at_path(root, &prev)?;
        while let Some(child) = node.children.last() {
            prev.push(node.children.len() - 1);
            node = child;
        }
        Some(prev)
    }
}

/// Steps [`next_node_path`] until a leaf is reached.
#[must_use]
pub fn next_leaf_path(root: &TreeNode, path: &[usize], direction: i32) -> Option<Vec<usize>> {
    let mut current = next_node_path(root, path, direction)?;
    loop {
        let node = node_at_path(root, &current)?;
        if node.is_leaf() {
            return Some(current);
        }
        current = next_node_path(root, &current, direction)?;
    }
}

/// The path of the last leaf in pre-order.
#[must_use]
pub fn last_leaf_path(root: &TreeNode) -> Vec<usize> {
    let mut path = Vec::new();
    let mut node = root;
    while let Some(child) = node.children.last() {
        path.push(node.children.len() - 1);
        node = child;
    }
    path
}

/// Inserts `node_src` as a child at `path` (the final path segment is the
/// insertion index, clamped to the sibling count).
#[must_use]
pub fn insert_node_at(src: &str, path: &[usize], node_src: &str) -> Option<String> {
    let mut root = parse_tree(src);
    let (&index, parent_path) = path.split_last()?;
    let parent = node_at_path_mut(&mut root, parent_path)?;
    let index = index.min(parent.children.len());
    parent.children.insert(index, parse_tree(node_src));
    Some(root.serialize())
}

/// Replaces the node at `path` with `node_src`.
#[must_use]
pub fn update_node_at(src: &str, path: &[usize], node_src: &str) -> Option<String> {
    let mut root = parse_tree(src);
    let node = node_at_path_mut(&mut root, path)?;
    *node = parse_tree(node_src);
    Some(root.serialize())
}

/// Removes the node at `path`.
#[must_use]
pub fn remove_node_at(src: &str, path: &[usize]) -> Option<String> {
    let mut root = parse_tree(src);
    let (&index, parent_path) = path.split_last()?;
    let parent = node_at_path_mut(&mut root, parent_path)?;
    if index >= parent.children.len() {
        return None;
    }
    parent.children.remove(index);
    Some(root.serialize())
}

/// Drops every empty child slot (trailing commas and the like) and
/// re-serializes.
#[must_use]
pub fn filter_empty_nodes(src: &str) -> String {
    let mut root = parse_tree(src);
    prune(&mut root);
    root.serialize()
}

fn prune(node: &mut TreeNode) {
    for child in &mut node.children {
        prune(child);
    }
    node.children.retain(|c| !c.is_empty());
}
