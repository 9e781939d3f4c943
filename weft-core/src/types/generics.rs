//! Generic placeholder discovery, binding and substitution.

use indexmap::{IndexMap, IndexSet};

use super::registry::SpecRegistry;
use crate::tree::{TreeNode, TreeNodeKind, parse_tree};
use crate::value::value_type_of;

/// Collects every generic placeholder in `text`, normalized to `<T>` form,
/// in first-appearance order.
#[must_use]
pub fn find_generics(text: &str) -> IndexSet<String> {
    let tree = parse_tree(text);
    let mut generics = IndexSet::new();
    tree.walk(&mut |node| {
        if node.kind == TreeNodeKind::Generic {
            generics.insert(node.value.clone());
        }
    });
    generics
}

/// Whether `text` contains any generic placeholder.
#[must_use]
pub fn has_generic(text: &str) -> bool {
    !find_generics(text).is_empty()
}

/// Binds the generics of `pattern` against the inferred type of the value
/// expression `value`. The first occurrence of a placeholder wins; later
/// occurrences never rebind it.
#[must_use]
pub fn extract_generics(
    registry: &SpecRegistry,
    value: &str,
    pattern: &str,
) -> IndexMap<String, String> {
    let value_type = value_type_of(registry, value);
    let a = parse_tree(&value_type);
    let b = parse_tree(pattern);
    let mut bindings = IndexMap::new();
    bind(&a, &b, &mut bindings);
    bindings
}

fn unwrap_expression(node: &TreeNode) -> &TreeNode {
    match (node.kind, node.children.first()) {
        (TreeNodeKind::Expression, Some(child)) => unwrap_expression(child),
        _ => node,
    }
}

fn bind(a: &TreeNode, b: &TreeNode, out: &mut IndexMap<String, String>) {
    use TreeNodeKind::*;
    let a = unwrap_expression(a);
    let b = unwrap_expression(b);
    match b.kind {
        Generic => {
            if !out.contains_key(&b.value) && !a.is_empty() {
                out.insert(b.value.clone(), a.serialize());
            }
        }
        ArrayExpression | ObjectExpression => {
            let Some(b_elem) = b.children.first() else {
                return;
            };
            match a.kind {
                ArrayExpression | ObjectExpression => {
                    if let Some(a_elem) = a.children.first() {
                        bind(a_elem, b_elem, out);
                    }
                }
                ArrayLiteral => {
                    if let Some(a_elem) = a.children.iter().find(|c| !c.is_empty()) {
                        bind(a_elem, b_elem, out);
                    }
                }
                _ => {}
            }
        }
        ObjectLiteral if a.kind == ObjectLiteral => {
            for entry in &b.children {
                if entry.kind != KeyValue {
                    continue;
                }
                let Some(key) = entry.children.first() else {
                    continue;
                };
                let Some(b_value) = entry.children.get(1) else {
                    continue;
                };
                let a_value = a.children.iter().find_map(|a_entry| {
                    (a_entry.kind == KeyValue
                        && a_entry.children.first().map(|k| &k.value) == Some(&key.value))
                    .then(|| a_entry.children.get(1))
                    .flatten()
                });
                if let Some(a_value) = a_value {
                    bind(a_value, b_value, out);
                }
            }
        }
        ArrayLiteral | Or | And | Class if a.kind == b.kind => {
            for (a_child, b_child) in a.children.iter().zip(&b.children) {
                bind(a_child, b_child, out);
            }
        }
        _ => {}
    }
}

/// Substitutes bound generics in `text` and re-serializes.
#[must_use]
pub fn apply_generics(text: &str, bindings: &IndexMap<String, String>) -> String {
    let mut tree = parse_tree(text);
    substitute(&mut tree, bindings);
    tree.serialize()
}

fn substitute(node: &mut TreeNode, bindings: &IndexMap<String, String>) {
    if node.kind == TreeNodeKind::Generic {
        if let Some(bound) = bindings.get(&node.value) {
            *node = parse_tree(bound);
            return;
        }
    }
    for child in &mut node.children {
        substitute(child, bindings);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("<T>", &["<T>"])]
    #[case("<T>[]", &["<T>"])]
    #[case("{a:<A>,b:<B>[]}", &["<A>", "<B>"])]
    #[case("<A>|<B>|<A>", &["<A>", "<B>"])]
    #[case("`V<T>`", &["<T>"])]
    #[case("`V<`J`>`", &[])]
    #[case("string", &[])]
    fn finds_generics(#[case] text: &str, #[case] expected: &[&str]) {
        let found: Vec<_> = find_generics(text).into_iter().collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn generic_detection() {
        assert!(has_generic("<T>[]"));
        assert!(!has_generic("number[]"));
    }

    #[rstest]
    #[case("[1,2]", "<T>[]", &[("<T>", "number")])]
    #[case("\"foo\"", "<T>", &[("<T>", "string")])]
    #[case("{a:1,b:\"x\"}", "{a:<A>,b:<B>}", &[("<A>", "number"), ("<B>", "string")])]
    #[case("1", "number", &[])]
    fn extracts(#[case] value: &str, #[case] pattern: &str, #[case] expected: &[(&str, &str)]) {
        let registry = SpecRegistry::new();
        let bindings = extract_generics(&registry, value, pattern);
        let got: Vec<_> = bindings
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn first_occurrence_wins() {
        let registry = SpecRegistry::new();
        let bindings = extract_generics(&registry, "{a:1,b:\"x\"}", "{a:<T>,b:<T>}");
        assert_eq!(bindings.get("<T>").map(String::as_str), Some("number"));
    }

    #[test]
    fn applies_bindings() {
        let mut bindings = IndexMap::new();
        bindings.insert("<T>".to_owned(), "number".to_owned());
        assert_eq!(apply_generics("<T>[]", &bindings), "number[]");
        assert_eq!(apply_generics("`V<T>`", &bindings), "`V<number>`");
        assert_eq!(apply_generics("<K>", &bindings), "<K>");
    }

    #[test]
    fn union_binding_parenthesizes_array_element() {
        let mut bindings = IndexMap::new();
        bindings.insert("<T>".to_owned(), "string|number".to_owned());
        assert_eq!(apply_generics("<T>[]", &bindings), "(string|number)[]");
    }
}
