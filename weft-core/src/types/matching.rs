//! Structural type matching.
//!
//! `is_type_match(registry, candidate, pattern)` asks whether a value or
//! unit of type `candidate` can connect where `pattern` is expected. The
//! relation is directional: literals match their base type keyword, object
//! shapes may carry extra keys, class tags match supertags through the
//! registry's [hierarchy](super::registry::ClassHierarchy).

use smol_str::SmolStr;

use super::registry::SpecRegistry;
use crate::tree::{TreeNode, TreeNodeKind, parse_tree};
use crate::value::unit_bundle_type;

/// Whether type expression `candidate` is acceptable where `pattern` is
/// expected.
#[must_use]
pub fn is_type_match(registry: &SpecRegistry, candidate: &str, pattern: &str) -> bool {
    let a = parse_tree(candidate);
    let b = parse_tree(pattern);
    node_match(registry, &a, &b)
}

fn unwrap_expression(node: &TreeNode) -> &TreeNode {
    let mut node = node;
    while node.kind == TreeNodeKind::Expression {
        match node.children.first() {
            Some(child) => node = child,
            None => break,
        }
    }
    node
}

/// An unparseable leaf whose text names a registered spec resolves to that
/// spec's declared type.
fn resolve_spec_id(registry: &SpecRegistry, node: &TreeNode) -> Option<TreeNode> {
    if node.kind != TreeNodeKind::Invalid || node.value.is_empty() {
        return None;
    }
    let decl = registry.get(&node.value)?;
    Some(parse_tree(&decl.ty))
}

fn node_match(registry: &SpecRegistry, a: &TreeNode, b: &TreeNode) -> bool {
    use TreeNodeKind::*;

    let a = unwrap_expression(a);
    let b = unwrap_expression(b);

    if let Some(resolved) = resolve_spec_id(registry, a) {
        return node_match(registry, &resolved, b);
    }
    if let Some(resolved) = resolve_spec_id(registry, b) {
        return node_match(registry, a, &resolved);
    }

    if b.is_empty() {
        return a.is_empty();
    }
    if a.is_empty() {
        return b.kind == Any;
    }
    if a.kind == Invalid || b.kind == Invalid {
        return false;
    }
    if a.kind == Any || b.kind == Any {
        return true;
    }
    if a.kind == Generic || b.kind == Generic {
        return true;
    }

    // A bundle is matched through the type of the unit it carries.
    if a.kind == Unit {
        let ty = unit_bundle_type(registry, a);
        return node_match(registry, &parse_tree(&ty), b);
    }

    if a.kind == Or {
        return a.children.iter().all(|branch| node_match(registry, branch, b));
    }
    if b.kind == Or {
        return b.children.iter().any(|branch| node_match(registry, a, branch));
    }

    if let (Some(a_tags), Some(b_tags)) = (class_tags(a), class_tags(b)) {
        return class_set_match(registry, &a_tags, &b_tags);
    }

    if a.kind == And {
        return a.children.iter().any(|part| node_match(registry, part, b));
    }
    if b.kind == And {
        return b.children.iter().all(|part| node_match(registry, a, part));
    }

    match b.kind {
        Identifier => keyword_match(a, &b.value),
        Null => a.kind == Null,
        StringLiteral => a.kind == StringLiteral && unquote(&a.value) == unquote(&b.value),
        NumberLiteral => a.kind == NumberLiteral && number_eq(&a.value, &b.value),
        BooleanLiteral => a.kind == BooleanLiteral && a.value == b.value,
        RegexLiteral => a.kind == RegexLiteral && a.value == b.value,
        ArrayExpression => array_expression_match(registry, a, b),
        ObjectExpression => object_expression_match(registry, a, b),
        ArrayLiteral => tuple_match(registry, a, b),
        ObjectLiteral => object_shape_match(registry, a, b),
        ClassLiteral => matches!(a.kind, ClassLiteral),
        Class => false,
        Url => a.kind == Url && a.value == b.value,
        _ => a.kind == b.kind && a.value == b.value,
    }
}

fn unquote(text: &str) -> &str {
    let text = text.strip_prefix(['"', '\'']).unwrap_or(text);
    text.strip_suffix(['"', '\'']).unwrap_or(text)
}

fn number_eq(a: &str, b: &str) -> bool {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}

fn keyword_match(a: &TreeNode, keyword: &str) -> bool {
    use TreeNodeKind::*;
    match keyword {
        "string" => matches!(a.kind, StringLiteral | Url) || a.value == "string",
        "number" => matches!(a.kind, NumberLiteral | ArithmeticExpression) || a.value == "number",
        "boolean" => a.kind == BooleanLiteral || a.value == "boolean",
        "regex" => a.kind == RegexLiteral || a.value == "regex",
        "object" => {
            matches!(a.kind, ObjectLiteral | ObjectExpression) || a.value == "object"
        }
        "class" => matches!(a.kind, Class | ClassLiteral | And) || a.value == "class",
        _ => a.kind == Identifier && a.value == keyword,
    }
}

/// A class tag set: a single tag or an intersection of tags.
fn class_tags(node: &TreeNode) -> Option<Vec<&TreeNode>> {
    use TreeNodeKind::*;
    match node.kind {
        Class => Some(vec![node]),
        And if node.children.iter().all(|c| c.kind == Class) => {
            Some(node.children.iter().collect())
        }
        _ => None,
    }
}

fn class_tag_name(node: &TreeNode) -> &str {
    crate::tree::class_tag_name(&node.value)
}

/// Every pattern tag must be implied by some candidate tag; generic
/// parameters are compared pairwise where both sides carry them.
fn class_set_match(registry: &SpecRegistry, a_tags: &[&TreeNode], b_tags: &[&TreeNode]) -> bool {
    let mut implied: Vec<SmolStr> = Vec::new();
    for tag in a_tags {
        implied.extend(registry.classes.implied(class_tag_name(tag)));
    }
    b_tags.iter().all(|b_tag| {
        let name = class_tag_name(b_tag);
        if !implied.iter().any(|t| t == name) {
            return false;
        }
        let Some(a_tag) = a_tags.iter().find(|t| class_tag_name(t) == name) else {
            // Implied through the hierarchy; parameters cannot be checked.
            return b_tag
                .children
                .iter()
                .all(|p| p.kind == TreeNodeKind::Generic);
        };
        b_tag.children.iter().enumerate().all(|(i, b_param)| {
            match a_tag.children.get(i) {
                Some(a_param) => node_match(registry, a_param, b_param),
                None => b_param.kind == TreeNodeKind::Generic,
            }
        })
    })
}

fn array_expression_match(registry: &SpecRegistry, a: &TreeNode, b: &TreeNode) -> bool {
    use TreeNodeKind::*;
    let Some(elem) = b.children.first() else {
        return false;
    };
    match a.kind {
        ArrayLiteral => a
            .children
            .iter()
            .filter(|c| !c.is_empty())
            .all(|c| node_match(registry, c, elem)),
        ArrayExpression => a
            .children
            .first()
            .is_some_and(|c| node_match(registry, c, elem)),
        _ => false,
    }
}

fn tuple_match(registry: &SpecRegistry, a: &TreeNode, b: &TreeNode) -> bool {
    if a.kind != TreeNodeKind::ArrayLiteral {
        return false;
    }
    a.children.len() == b.children.len()
        && a.children
            .iter()
            .zip(&b.children)
            .all(|(x, y)| node_match(registry, x, y))
}

/// Normalized object key: quotes stripped, optionality split off.
fn obj_key(node: &TreeNode) -> (&str, bool) {
    let raw = unquote(&node.value);
    match raw.strip_suffix('?') {
        Some(key) => (key, true),
        None => (raw, false),
    }
}

fn obj_entry<'a>(node: &'a TreeNode, key: &str) -> Option<&'a TreeNode> {
    node.children.iter().find_map(|entry| {
        if entry.kind != TreeNodeKind::KeyValue {
            return None;
        }
        let entry_key = entry.children.first()?;
        (obj_key(entry_key).0 == key).then(|| entry.children.get(1))?
    })
}

fn object_shape_match(registry: &SpecRegistry, a: &TreeNode, b: &TreeNode) -> bool {
    use TreeNodeKind::*;
    match a.kind {
        // The bare keyword is the shapeless object.
        Identifier if a.value == "object" => true,
        ObjectLiteral => b
            .children
            .iter()
            .filter(|entry| entry.kind == KeyValue)
            .all(|entry| {
                let Some(key_node) = entry.children.first() else {
                    return false;
                };
                let (key, optional) = obj_key(key_node);
                match obj_entry(a, key) {
                    Some(value) => match entry.children.get(1) {
                        Some(pattern_value) => node_match(registry, value, pattern_value),
                        None => true,
                    },
                    None => optional,
                }
            }),
        _ => false,
    }
}

fn object_expression_match(registry: &SpecRegistry, a: &TreeNode, b: &TreeNode) -> bool {
    use TreeNodeKind::*;
    let Some(elem) = b.children.first() else {
        return false;
    };
    match a.kind {
        Identifier if a.value == "object" => true,
        ObjectLiteral => a
            .children
            .iter()
            .filter(|c| !c.is_empty())
            .all(|entry| match entry.kind {
                KeyValue => entry
                    .children
                    .get(1)
                    .is_some_and(|v| node_match(registry, v, elem)),
                _ => node_match(registry, entry, elem),
            }),
        ObjectExpression => a
            .children
            .first()
            .is_some_and(|c| node_match(registry, c, elem)),
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    use crate::types::registry::SpecDecl;

    fn registry() -> SpecRegistry {
        let mut registry = SpecRegistry::new();
        registry.insert(
            "identity",
            SpecDecl {
                name: "identity".into(),
                ty: "`U`".into(),
                ..Default::default()
            },
        );
        registry
    }

    #[rstest]
    // Reflexive and `any`.
    #[case("any", "any", true)]
    #[case("number", "any", true)]
    #[case("any", "number", true)]
    #[case("number", "number", true)]
    #[case("number", "string", false)]
    #[case("abc", "any", false)]
    // Literals against keywords.
    #[case("\"foo\"", "string", true)]
    #[case("'foo'", "\"foo\"", true)]
    #[case("\"foo\"", "\"bar\"", false)]
    #[case("string", "\"foo\"", false)]
    #[case("42", "number", true)]
    #[case("1 + 2", "number", true)]
    #[case("42", "43", false)]
    #[case("true", "boolean", true)]
    #[case("/a+/", "regex", true)]
    #[case("regex", "/a+/", false)]
    #[case("null", "null", true)]
    #[case("null", "number", false)]
    // Generics are wildcards on both sides.
    #[case("<T>", "<K>[]", true)]
    #[case("string", "<T>", true)]
    #[case("<T>", "string", true)]
    // Unions.
    #[case("string", "string|number", true)]
    #[case("string|number", "string|number|null", true)]
    #[case("string|number", "string", false)]
    // Arrays and tuples.
    #[case("[]", "number[]", true)]
    #[case("[1,2]", "number[]", true)]
    #[case("[1,\"a\"]", "number[]", false)]
    #[case("string[]", "string[]", true)]
    #[case("string[]", "(string|number)[]", true)]
    #[case("[1,\"a\"]", "[number,string]", true)]
    #[case("[1]", "[number,string]", false)]
    // Object shapes.
    #[case("{a:1}", "{a:number}", true)]
    #[case("{a:1,b:2}", "{a:number}", true)]
    #[case("{a:1}", "{a:number,b:number}", false)]
    #[case("{a:1}", "{a:number,b?:number}", true)]
    #[case("{a:}", "{a:any}", true)]
    #[case("{a:1}", "object", true)]
    #[case("string{}", "object", true)]
    #[case("object", "{a:number}", true)]
    #[case("{a:\"x\",b:\"y\"}", "string{}", true)]
    #[case("{a:\"x\",b:1}", "string{}", false)]
    // Classes through the hierarchy.
    #[case("`G`", "`U`", true)]
    #[case("`U`", "`G`", false)]
    #[case("`U`", "`EE`", true)]
    #[case("`U`&`G`", "`G`", true)]
    #[case("`A<T>`", "`A`", true)]
    #[case("`A`", "`A<T>`", true)]
    #[case("`V<number>`", "`V<string>`", false)]
    #[case("`A<>`", "`A`", false)]
    #[case("`U`", "class", true)]
    #[case("()=>()", "class", true)]
    // Spec ids resolve through the registry.
    #[case("identity", "`U`", true)]
    #[case("identity", "`G`", false)]
    // Bundles resolve to the type of the unit they carry.
    #[case("${identity}", "`U`", true)]
    #[case("${identity}", "any", true)]
    fn matches(#[case] candidate: &str, #[case] pattern: &str, #[case] expected: bool) {
        assert_eq!(
            is_type_match(&registry(), candidate, pattern),
            expected,
            "{candidate} vs {pattern}"
        );
    }

    #[test]
    fn parenthesized_sides_unwrap() {
        let registry = registry();
        assert!(is_type_match(&registry, "(string)", "string"));
        assert!(is_type_match(&registry, "string", "((string))"));
    }
}
