//! Value expression evaluation and value type inference.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::tree::{
    TreeNode, TreeNodeKind, node_at_path, parse_tree, update_node_at,
};
use crate::types::registry::SpecRegistry;

lazy_static! {
    static ref NUMBER_PREFIX_RE: Regex =
        Regex::new(r"^-?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?|^-?Infinity").unwrap();
}

/// An evaluated value expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// `null`.
    Null,
    /// `true` / `false`.
    Bool(bool),
    /// Any numeric literal or arithmetic result.
    Number(f64),
    /// An unescaped string.
    String(String),
    /// A regex literal's source, delimiters stripped.
    Regex(String),
    /// `[…]`.
    Array(Vec<Value>),
    /// `{…}`.
    Object(IndexMap<String, Value>),
    /// `${…}`: a unit reference with optional embedded specs and memory.
    Bundle(Box<BundleValue>),
}

impl Value {
    /// Converts to a [`serde_json::Value`]; regexes become their source
    /// strings.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{Map, json};
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => json!(b),
            Value::Number(n) => json!(n),
            Value::String(s) | Value::Regex(s) => json!(s),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            Value::Bundle(bundle) => {
                let mut map = Map::new();
                map.insert("unit".to_owned(), bundle.unit.to_json());
                if let Some(specs) = &bundle.specs {
                    map.insert("specs".to_owned(), specs.to_json());
                }
                if let Some(memory) = &bundle.memory {
                    map.insert("memory".to_owned(), memory.to_json());
                }
                serde_json::Value::Object(map)
            }
        }
    }
}

/// The payload of a `${…}` bundle: the unit it instantiates, plus optional
/// embedded spec declarations and captured memory.
#[derive(Clone, Debug, PartialEq)]
pub struct BundleValue {
    /// The unit object; `${id}` shorthand yields `{id}`.
    pub unit: Value,
    /// Embedded spec declarations, keyed by spec id.
    pub specs: Option<Value>,
    /// Captured unit memory.
    pub memory: Option<Value>,
}

impl BundleValue {
    /// The id of the unit the bundle instantiates.
    #[must_use]
    pub fn unit_id(&self) -> Option<&str> {
        match &self.unit {
            Value::Object(obj) => match obj.get("id") {
                Some(Value::String(id)) => Some(id),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Evaluation failure.
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum EvalError {
    /// The expression is not a value.
    #[error("invalid value expression `{0}`")]
    InvalidValue(String),
    /// A numeric literal failed to parse.
    #[error("invalid number literal `{0}`")]
    InvalidNumber(String),
}

/// Evaluates a value expression.
///
/// Bundles stay symbolic: `${…}` evaluates to [`Value::Bundle`] without
/// consulting any registry, so evaluation needs no context.
pub fn evaluate(text: &str) -> Result<Value, EvalError> {
    eval_node(&parse_tree(text))
}

fn eval_node(node: &TreeNode) -> Result<Value, EvalError> {
    use TreeNodeKind::*;
    match node.kind {
        Null => Ok(Value::Null),
        BooleanLiteral => Ok(Value::Bool(node.value == "true")),
        NumberLiteral => parse_number(&node.value),
        StringLiteral => Ok(Value::String(unescape(&node.value))),
        RegexLiteral => Ok(Value::Regex(
            node.value[1..node.value.len() - 1].to_owned(),
        )),
        ArithmeticExpression => eval_arithmetic(&node.value)
            .map(Value::Number)
            .ok_or_else(|| EvalError::InvalidNumber(node.value.clone())),
        Url => Ok(Value::String(node.value.clone())),
        ArrayLiteral => node
            .children
            .iter()
            .filter(|c| !c.is_empty())
            .map(eval_node)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ObjectLiteral => eval_object(node).map(Value::Object),
        Unit => eval_bundle(node).map(|b| Value::Bundle(Box::new(b))),
        _ => Err(EvalError::InvalidValue(node.value.clone())),
    }
}

fn eval_object(node: &TreeNode) -> Result<IndexMap<String, Value>, EvalError> {
    let mut object = IndexMap::new();
    for entry in node.children.iter().filter(|c| !c.is_empty()) {
        match entry.kind {
            TreeNodeKind::KeyValue => {
                let key = entry
                    .children
                    .first()
                    .map(|k| unquote(&k.value).to_owned())
                    .unwrap_or_default();
                let value = match entry.children.get(1) {
                    Some(v) if !v.is_empty() => eval_node(v)?,
                    _ => Value::Null,
                };
                object.insert(key, value);
            }
            // Shorthand: the key doubles as its own string value.
            _ => {
                let key = unquote(&entry.value).to_owned();
                object.insert(key.clone(), Value::String(key));
            }
        }
    }
    Ok(object)
}

fn eval_bundle(node: &TreeNode) -> Result<BundleValue, EvalError> {
    let Some(payload) = node.children.first() else {
        return Err(EvalError::InvalidValue(node.value.clone()));
    };
    match payload.kind {
        TreeNodeKind::ObjectLiteral => {
            let mut object = eval_object(payload)?;
            if object.contains_key("unit") {
                let unit = object
                    .shift_remove("unit")
                    .unwrap_or(Value::Null);
                Ok(BundleValue {
                    unit,
                    specs: object.shift_remove("specs"),
                    memory: object.shift_remove("memory"),
                })
            } else {
                Ok(BundleValue {
                    unit: Value::Object(object),
                    specs: None,
                    memory: None,
                })
            }
        }
        _ => {
            let mut unit = IndexMap::new();
            unit.insert("id".to_owned(), Value::String(payload.value.clone()));
            Ok(BundleValue {
                unit: Value::Object(unit),
                specs: None,
                memory: None,
            })
        }
    }
}

/// Evaluates a `${…}` expression to its bundle payload.
pub fn evaluate_bundle_str(text: &str) -> Result<BundleValue, EvalError> {
    let tree = parse_tree(text);
    if tree.kind != TreeNodeKind::Unit {
        return Err(EvalError::InvalidValue(text.to_owned()));
    }
    eval_bundle(&tree)
}

fn parse_number(text: &str) -> Result<Value, EvalError> {
    text.parse::<f64>()
        .map(Value::Number)
        .map_err(|_| EvalError::InvalidNumber(text.to_owned()))
}

fn unquote(text: &str) -> &str {
    let stripped = text.strip_prefix(['"', '\'']).unwrap_or(text);
    stripped.strip_suffix(['"', '\'']).unwrap_or(stripped)
}

fn unescape(text: &str) -> String {
    let inner = unquote(text);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn take_number(text: &str) -> Option<(f64, &str)> {
    let found = NUMBER_PREFIX_RE.find(text)?;
    let value = found.as_str().parse::<f64>().ok()?;
    Some((value, &text[found.end()..]))
}

/// Evaluates `a op b op c …` with `*` and `/` binding tighter than `+`
/// and `-`.
fn eval_arithmetic(text: &str) -> Option<f64> {
    let mut operands = Vec::new();
    let mut operators: Vec<char> = Vec::new();
    let mut rest = text.trim();
    loop {
        let (value, tail) = take_number(rest)?;
        operands.push(value);
        rest = tail.trim_start();
        if rest.is_empty() {
            break;
        }
        let op = rest.chars().next()?;
        if !matches!(op, '+' | '-' | '*' | '/') {
            return None;
        }
        operators.push(op);
        rest = rest[op.len_utf8()..].trim_start();
    }
    let mut terms = vec![operands[0]];
    let mut term_ops: Vec<char> = Vec::new();
    for (op, value) in operators.iter().zip(operands.iter().skip(1)) {
        match op {
            '*' => {
                let last = terms.last_mut()?;
                *last *= value;
            }
            '/' => {
                let last = terms.last_mut()?;
                *last /= value;
            }
            _ => {
                term_ops.push(*op);
                terms.push(*value);
            }
        }
    }
    let mut total = terms[0];
    for (op, term) in term_ops.iter().zip(terms.iter().skip(1)) {
        match op {
            '+' => total += term,
            _ => total -= term,
        }
    }
    Some(total)
}

/// Infers the type expression of a value expression.
///
/// Mixed arrays widen to a parenthesized union of their element types in
/// first-appearance order; an empty array stays generic.
#[must_use]
pub fn value_type_of(registry: &SpecRegistry, text: &str) -> String {
    type_of_node(registry, &parse_tree(text))
}

fn type_of_node(registry: &SpecRegistry, node: &TreeNode) -> String {
    use TreeNodeKind::*;
    match node.kind {
        StringLiteral | Url => "string".to_owned(),
        NumberLiteral | ArithmeticExpression => "number".to_owned(),
        BooleanLiteral => "boolean".to_owned(),
        RegexLiteral => "regex".to_owned(),
        Null => "null".to_owned(),
        ArrayLiteral => {
            let mut types: Vec<String> = Vec::new();
            for child in node.children.iter().filter(|c| !c.is_empty()) {
                let ty = type_of_node(registry, child);
                if !types.contains(&ty) {
                    types.push(ty);
                }
            }
            if types.is_empty() {
                return "<T>[]".to_owned();
            }
            let element = types.join("|");
            if types.len() > 1 {
                format!("({element})[]")
            } else {
                format!("{element}[]")
            }
        }
        ObjectLiteral => {
            let entries: Vec<String> = node
                .children
                .iter()
                .filter(|c| !c.is_empty())
                .map(|entry| match entry.kind {
                    KeyValue => {
                        let key = entry
                            .children
                            .first()
                            .map(|k| k.value.as_str())
                            .unwrap_or_default();
                        let ty = entry
                            .children
                            .get(1)
                            .filter(|v| !v.is_empty())
                            .map(|v| type_of_node(registry, v))
                            .unwrap_or_else(|| "any".to_owned());
                        format!("{key}:{ty}")
                    }
                    _ => format!("{}:string", entry.value),
                })
                .collect();
            format!("{{{}}}", entries.join(","))
        }
        Unit => unit_bundle_type(registry, node),
        _ => "any".to_owned(),
    }
}

fn tree_obj_entry<'a>(obj: &'a TreeNode, key: &str) -> Option<&'a TreeNode> {
    obj.children.iter().find_map(|entry| {
        if entry.kind != TreeNodeKind::KeyValue {
            return None;
        }
        let entry_key = entry.children.first()?;
        (unquote(&entry_key.value) == key)
            .then(|| entry.children.get(1))
            .flatten()
    })
}

/// The type of the unit a `${…}` bundle carries: an embedded spec's `type`
/// wins, then the registry's declaration, then the plain unit tag.
#[must_use]
pub(crate) fn unit_bundle_type(registry: &SpecRegistry, node: &TreeNode) -> String {
    let fallback = || "`U`".to_owned();
    let Some(payload) = node.children.first() else {
        return fallback();
    };
    let id = match payload.kind {
        TreeNodeKind::ObjectLiteral => tree_obj_entry(payload, "unit")
            .and_then(|unit| tree_obj_entry(unit, "id"))
            .map(|id| unquote(&id.value).to_owned()),
        _ => Some(payload.value.clone()),
    };
    let Some(id) = id else {
        return fallback();
    };
    let embedded = tree_obj_entry(payload, "specs")
        .and_then(|specs| tree_obj_entry(specs, &id))
        .and_then(|spec| tree_obj_entry(spec, "type"))
        .map(|ty| unquote(&ty.value).to_owned());
    embedded
        .or_else(|| registry.get(&id).map(|decl| decl.ty.clone()))
        .unwrap_or_else(fallback)
}

/// Paths of every `${…}` node in `text`, pre-order.
#[must_use]
pub fn find_unit_nodes(text: &str) -> Vec<Vec<usize>> {
    let tree = parse_tree(text);
    let mut paths = Vec::new();
    collect_unit_paths(&tree, &mut Vec::new(), &mut paths);
    paths
}

fn collect_unit_paths(node: &TreeNode, path: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    if node.kind == TreeNodeKind::Unit {
        out.push(path.clone());
        return;
    }
    for (i, child) in node.children.iter().enumerate() {
        path.push(i);
        collect_unit_paths(child, path, out);
        path.pop();
    }
}

/// Replaces the `${…}` node at `path` with `bundle_src` and re-serializes.
/// `None` when the path does not resolve to a bundle node.
#[must_use]
pub fn replace_unit_node(text: &str, path: &[usize], bundle_src: &str) -> Option<String> {
    let tree = parse_tree(text);
    let node = node_at_path(&tree, path)?;
    if node.kind != TreeNodeKind::Unit {
        return None;
    }
    update_node_at(text, path, bundle_src)
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    fn eval(text: &str) -> Value {
        evaluate(text).unwrap()
    }

    #[rstest]
    #[case("null", Value::Null)]
    #[case("true", Value::Bool(true))]
    #[case("false", Value::Bool(false))]
    #[case("42", Value::Number(42.0))]
    #[case("-2e-23", Value::Number(-2e-23))]
    #[case("1.", Value::Number(1.0))]
    #[case("Infinity", Value::Number(f64::INFINITY))]
    #[case("'foo'", Value::String("foo".to_owned()))]
    #[case("\"a\\\"b\"", Value::String("a\"b".to_owned()))]
    #[case("'a\\nb'", Value::String("a\nb".to_owned()))]
    #[case("/a+/", Value::Regex("a+".to_owned()))]
    #[case("1 + 2", Value::Number(3.0))]
    #[case("1 + 2 * 3", Value::Number(7.0))]
    #[case("6 / 2 - 1", Value::Number(2.0))]
    fn scalars(#[case] text: &str, #[case] expected: Value) {
        assert_eq!(eval(text), expected);
    }

    #[test]
    fn arrays() {
        assert_eq!(eval("[]"), Value::Array(vec![]));
        assert_eq!(
            eval("[1,[2,3]]"),
            Value::Array(vec![
                Value::Number(1.0),
                Value::Array(vec![Value::Number(2.0), Value::Number(3.0)]),
            ])
        );
        // A trailing comma slot evaluates to nothing.
        assert_eq!(eval("[true,]"), Value::Array(vec![Value::Bool(true)]));
    }

    #[test]
    fn objects() {
        assert_eq!(
            eval("{a:1,\"b\":'x'}").to_json(),
            serde_json::json!({"a": 1.0, "b": "x"})
        );
        // Shorthand entries stand for themselves.
        assert_eq!(eval("{a}").to_json(), serde_json::json!({"a": "a"}));
        assert_eq!(
            eval("{1,2}").to_json(),
            serde_json::json!({"1": "1", "2": "2"})
        );
        // An empty entry value is null.
        assert_eq!(eval("{a:}").to_json(), serde_json::json!({"a": null}));
    }

    #[rstest]
    #[case("foo")]
    #[case("")]
    #[case("string")]
    #[case("+123456")]
    #[case("[1[]")]
    fn rejects_non_values(#[case] text: &str) {
        assert!(evaluate(text).is_err(), "{text}");
    }

    #[test]
    fn bundles() {
        let Value::Bundle(bundle) = eval("${identity}") else {
            panic!("expected bundle");
        };
        assert_eq!(bundle.unit_id(), Some("identity"));
        assert!(bundle.specs.is_none());

        let bundle = evaluate_bundle_str("${unit:{id:'fixed'},specs:{fixed:{type:'`U`'}}}")
            .unwrap();
        assert_eq!(bundle.unit_id(), Some("fixed"));
        assert!(bundle.specs.is_some());
    }

    #[rstest]
    #[case("\"foo\"", "string")]
    #[case("42", "number")]
    #[case("1 + 2", "number")]
    #[case("true", "boolean")]
    #[case("null", "null")]
    #[case("/a+/", "regex")]
    #[case("[]", "<T>[]")]
    #[case("[1,2]", "number[]")]
    #[case("[1,\"a\"]", "(number|string)[]")]
    #[case("{a:1,b:2}", "{a:number,b:number}")]
    #[case("{a:}", "{a:any}")]
    #[case(
        "[[\"beginPath\"],[\"arc\",1,2,3,4,false],[\"stroke\"]]",
        "(string[]|(string|number|boolean)[])[]"
    )]
    fn value_types(#[case] text: &str, #[case] expected: &str) {
        let registry = SpecRegistry::new();
        assert_eq!(value_type_of(&registry, text), expected, "{text}");
    }

    #[test]
    fn bundle_types_resolve_embedded_then_registry() {
        let mut registry = SpecRegistry::new();
        registry.insert(
            "identity",
            crate::types::registry::SpecDecl {
                ty: "`U`".into(),
                ..Default::default()
            },
        );
        assert_eq!(value_type_of(&registry, "${identity}"), "`U`");
        assert_eq!(value_type_of(&registry, "${unknown}"), "`U`");
        assert_eq!(
            value_type_of(
                &registry,
                "${unit:{id:'g'},specs:{g:{type:'`U`&`G`'}}}"
            ),
            "`U`&`G`"
        );
    }

    #[test]
    fn unit_node_discovery_and_replacement() {
        assert_eq!(find_unit_nodes("[${a},{u:${b}}]"), vec![vec![0], vec![1, 0, 1]]);
        assert_eq!(
            replace_unit_node("[${a},1]", &[0], "${b}").as_deref(),
            Some("[${b},1]")
        );
        assert!(replace_unit_node("[1]", &[0], "${b}").is_none());
    }
}
