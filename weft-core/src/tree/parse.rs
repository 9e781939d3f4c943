//! Tolerant recursive-descent parser for the expression language.
//!
//! The splitter is quote-, backtick- and bracket-depth-aware, so commas
//! and operators inside string literals, class tags or nested containers
//! never split an outer expression.

use lazy_static::lazy_static;
use regex::Regex;

use super::{TreeNode, TreeNodeKind};

const NUMBER_PATTERN: &str = r"-?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?|-?Infinity";

lazy_static! {
    static ref NUMBER_RE: Regex = Regex::new(&format!("^(?:{NUMBER_PATTERN})$")).unwrap();
    static ref ARITHMETIC_RE: Regex = Regex::new(&format!(
        r"^(?:{NUMBER_PATTERN})(?:\s*[+\-*/]\s*(?:{NUMBER_PATTERN}))+$"
    ))
    .unwrap();
    static ref GENERIC_RE: Regex = Regex::new(r"^<[A-Z][A-Za-z0-9]*>$").unwrap();
    static ref CLASS_NAME_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    static ref BARE_GENERIC_RE: Regex = Regex::new(r"^[A-Z][A-Za-z0-9]*$").unwrap();
    static ref OBJ_KEY_RE: Regex = Regex::new(r"^[\p{L}\p{N}_$]+\??$").unwrap();
    static ref URL_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://\S+$").unwrap();
}

const TYPE_KEYWORDS: &[&str] = &["string", "number", "boolean", "object", "regex", "class"];

/// Tracks string and backtick state while scanning; structure characters
/// only count when the scanner reports the character as outside both.
#[derive(Default)]
struct Quotes {
    in_str: Option<char>,
    escaped: bool,
    in_tick: bool,
}

impl Quotes {
    /// Consumes one character. Returns `true` when the character belongs to
    /// a quoted region (delimiters included).
    fn consume(&mut self, c: char) -> bool {
        if let Some(quote) = self.in_str {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == quote {
                self.in_str = None;
            }
            true
        } else if self.in_tick {
            if c == '`' {
                self.in_tick = false;
            }
            true
        } else {
            match c {
                '"' | '\'' => {
                    self.in_str = Some(c);
                    true
                }
                '`' => {
                    self.in_tick = true;
                    true
                }
                _ => false,
            }
        }
    }

    fn open(&self) -> bool {
        self.in_str.is_some() || self.in_tick
    }
}

fn delta(c: char) -> i32 {
    match c {
        '{' | '[' | '(' => 1,
        '}' | ']' | ')' => -1,
        _ => 0,
    }
}

/// Byte positions of top-level occurrences of `sep`.
fn top_level_positions(text: &str, sep: char) -> Vec<usize> {
    let mut quotes = Quotes::default();
    let mut depth = 0i32;
    let mut positions = Vec::new();
    for (i, c) in text.char_indices() {
        if quotes.consume(c) {
            continue;
        }
        let d = delta(c);
        if d < 0 {
            depth += d;
        }
        if depth == 0 && c == sep {
            positions.push(i);
        }
        if d > 0 {
            depth += d;
        }
    }
    positions
}

fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for pos in top_level_positions(text, sep) {
        parts.push(&text[start..pos]);
        start = pos + sep.len_utf8();
    }
    parts.push(&text[start..]);
    parts
}

/// Byte position of the top-level `=>`, if any.
fn top_level_arrow(text: &str) -> Option<usize> {
    top_level_positions(text, '=')
        .into_iter()
        .find(|&p| text[p + 1..].starts_with('>'))
}

/// Byte position of the bracket matching the opener at `open_idx`, scanning
/// quote state from the start of `text`.
fn find_matching(text: &str, open_idx: usize) -> Option<usize> {
    let open = text[open_idx..].chars().next()?;
    let close = match open {
        '{' => '}',
        '[' => ']',
        '(' => ')',
        _ => return None,
    };
    let mut quotes = Quotes::default();
    let mut depth = 0i32;
    for (i, c) in text.char_indices() {
        if quotes.consume(c) {
            continue;
        }
        if i < open_idx {
            continue;
        }
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Whether every bracket in `text` closes and every quote terminates.
fn is_balanced(text: &str) -> bool {
    let mut quotes = Quotes::default();
    let mut depth = 0i32;
    for c in text.chars() {
        if quotes.consume(c) {
            continue;
        }
        depth += delta(c);
        if depth < 0 {
            return false;
        }
    }
    depth == 0 && !quotes.open()
}

/// Parses `text` into an expression tree. Total: malformed input yields
/// [`TreeNodeKind::Invalid`] nodes rather than an error.
#[must_use]
pub fn parse_tree(text: &str) -> TreeNode {
    parse_node(text)
}

/// Classification shorthand for the root of [`parse_tree`].
#[must_use]
pub fn tree_node_kind(text: &str) -> TreeNodeKind {
    parse_node(text).kind
}

fn parse_node(text: &str) -> TreeNode {
    if text.is_empty() {
        return TreeNode::empty();
    }
    if let Some(node) = parse_leaf(text) {
        return node;
    }
    parse_structural(text)
}

fn parse_leaf(text: &str) -> Option<TreeNode> {
    let first = text.chars().next()?;

    if first == '"' || first == '\'' {
        return Some(parse_string(text, first));
    }
    if let Some(payload) = text.strip_prefix("${").and_then(|p| {
        (find_matching(text, 1) == Some(text.len() - 1)).then(|| &p[..p.len() - 1])
    }) {
        // A bare payload is a spec id shorthand; a keyed payload is an
        // object body without its braces.
        let child = if payload.starts_with('{') || top_level_positions(payload, ':').is_empty()
        {
            parse_node(payload)
        } else {
            parse_node(&format!("{{{payload}}}"))
        };
        return Some(TreeNode::with_children(TreeNodeKind::Unit, text, vec![child]));
    }
    if first == '`' && text.ends_with('`') && text.len() >= 3 {
        if let Some(node) = parse_class_tag(text) {
            return Some(node);
        }
    }
    if first == '/' && text.len() >= 2 && text.ends_with('/') {
        let inner = &text[1..text.len() - 1];
        if !inner.is_empty() && !inner.contains('/') {
            return Some(TreeNode::new(TreeNodeKind::RegexLiteral, text));
        }
    }
    if GENERIC_RE.is_match(text) {
        return Some(TreeNode::new(TreeNodeKind::Generic, text));
    }
    match text {
        "null" => return Some(TreeNode::new(TreeNodeKind::Null, text)),
        "true" | "false" => return Some(TreeNode::new(TreeNodeKind::BooleanLiteral, text)),
        "any" => return Some(TreeNode::new(TreeNodeKind::Any, text)),
        _ if TYPE_KEYWORDS.contains(&text) => {
            return Some(TreeNode::new(TreeNodeKind::Identifier, text));
        }
        _ => {}
    }
    if NUMBER_RE.is_match(text) {
        return Some(TreeNode::new(TreeNodeKind::NumberLiteral, text));
    }
    if URL_RE.is_match(text) {
        return Some(TreeNode::new(TreeNodeKind::Url, text));
    }
    None
}

fn parse_string(text: &str, quote: char) -> TreeNode {
    let mut escaped = false;
    for (i, c) in text.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            // Terminated; anything after the closing quote is garbage.
            if i == text.len() - quote.len_utf8() {
                return TreeNode::new(TreeNodeKind::StringLiteral, text);
            }
            return TreeNode::invalid(text);
        }
    }
    TreeNode::invalid(text)
}

pub(crate) fn class_tag_name(tag: &str) -> &str {
    let inner = tag.trim_start_matches('`').trim_end_matches('`');
    inner.split('<').next().unwrap_or(inner)
}

/// Parses a single backtick class tag, `` `Name` `` or `` `Name<params>` ``.
///
/// Returns `None` when the text merely starts and ends with a backtick
/// without being one tag (e.g. `` `U`&`G` ``), so structural parsing can
/// take over.
fn parse_class_tag(text: &str) -> Option<TreeNode> {
    let inner = &text[1..text.len() - 1];
    // Inner backticks mean this is not a single tag unless they wrap
    // generic parameters, e.g. `V<`J`>`.
    if inner.contains('`') && !inner.contains('<') {
        return None;
    }
    match inner.split_once('<') {
        None => {
            if CLASS_NAME_RE.is_match(inner) {
                Some(TreeNode::new(TreeNodeKind::Class, text))
            } else {
                None
            }
        }
        Some((name, rest)) => {
            if !CLASS_NAME_RE.is_match(name) || !rest.ends_with('>') {
                return Some(TreeNode::invalid(text));
            }
            let params_src = &rest[..rest.len() - 1];
            if params_src.is_empty() {
                return Some(TreeNode::invalid(text));
            }
            let params = split_top_level(params_src, ',')
                .into_iter()
                .map(|param| {
                    let param = param.trim();
                    if BARE_GENERIC_RE.is_match(param) {
                        TreeNode::new(TreeNodeKind::Generic, format!("<{param}>"))
                    } else {
                        parse_node(param)
                    }
                })
                .collect();
            Some(TreeNode::with_children(TreeNodeKind::Class, text, params))
        }
    }
}

fn parse_structural(text: &str) -> TreeNode {
    if !top_level_positions(text, '|').is_empty() {
        let children = split_top_level(text, '|')
            .into_iter()
            .map(|part| parse_node(part.trim()))
            .collect();
        return TreeNode::with_children(TreeNodeKind::Or, text, children);
    }
    if !top_level_positions(text, '&').is_empty() {
        let children = split_top_level(text, '&')
            .into_iter()
            .map(|part| parse_node(part.trim()))
            .collect();
        return TreeNode::with_children(TreeNodeKind::And, text, children);
    }
    if let Some(arrow) = top_level_arrow(text) {
        return parse_class_literal(text, arrow);
    }
    if text.starts_with('(') && find_matching(text, 0) == Some(text.len() - 1) {
        let child = parse_node(&text[1..text.len() - 1]);
        return TreeNode::with_children(TreeNodeKind::Expression, text, vec![child]);
    }
    if let Some(base) = text.strip_suffix("[]") {
        if !base.is_empty() && is_balanced(base) {
            let child = parse_node(base);
            return TreeNode::with_children(TreeNodeKind::ArrayExpression, text, vec![child]);
        }
    }
    if let Some(base) = text.strip_suffix("{}") {
        if !base.is_empty() && is_balanced(base) {
            let child = parse_node(base);
            return TreeNode::with_children(TreeNodeKind::ObjectExpression, text, vec![child]);
        }
    }
    if text.ends_with(']') && !text.starts_with('[') {
        if let Some(node) = parse_prop_expression(text) {
            return node;
        }
    }
    if text.starts_with('{') {
        return parse_container(text, TreeNodeKind::ObjectLiteral, '}');
    }
    if text.starts_with('[') {
        if let Some(node) = text
            .ends_with(']')
            .then(|| parse_prop_suffix_of_array(text))
            .flatten()
        {
            return node;
        }
        return parse_container(text, TreeNodeKind::ArrayLiteral, ']');
    }
    if ARITHMETIC_RE.is_match(text) {
        return TreeNode::new(TreeNodeKind::ArithmeticExpression, text);
    }
    TreeNode::invalid(text)
}

/// `base[keys]` where `base` is itself an array literal, e.g. `[1,2][0]`.
fn parse_prop_suffix_of_array(text: &str) -> Option<TreeNode> {
    let open = top_level_positions(text, '[');
    let &last = open.last()?;
    if last == 0 {
        return None;
    }
    parse_prop_expression(text)
}

fn parse_prop_expression(text: &str) -> Option<TreeNode> {
    let open = top_level_positions(text, '[');
    let &last = open.iter().rev().find(|&&p| {
        p > 0 && find_matching(text, p) == Some(text.len() - 1)
    })?;
    let base = &text[..last];
    if !is_balanced(base) {
        return None;
    }
    let keys_src = &text[last + 1..text.len() - 1];
    let mut children = vec![parse_node(base)];
    children.extend(
        split_top_level(keys_src, ',')
            .into_iter()
            .map(|key| parse_node(key.trim())),
    );
    Some(TreeNode::with_children(
        TreeNodeKind::PropExpression,
        text,
        children,
    ))
}

fn parse_class_literal(text: &str, arrow: usize) -> TreeNode {
    let lhs = &text[..arrow];
    let rhs = &text[arrow + 2..];
    let well_formed = |side: &str| {
        side.starts_with('(') && find_matching(side, 0) == Some(side.len() - 1)
    };
    if well_formed(lhs.trim()) && well_formed(rhs.trim()) {
        TreeNode::new(TreeNodeKind::ClassLiteral, text)
    } else {
        TreeNode::invalid(text)
    }
}

/// Parses `{…}` / `[…]` bodies. An unterminated container still classifies
/// (its validity check fails later); a close bracket in mid-text makes the
/// whole node invalid.
fn parse_container(text: &str, kind: TreeNodeKind, close: char) -> TreeNode {
    let inner = match find_matching(text, 0) {
        Some(end) if end == text.len() - close.len_utf8() => &text[1..end],
        Some(_) => return TreeNode::invalid(text),
        None => &text[1..],
    };
    if inner.trim().is_empty() && !inner.contains(',') {
        return TreeNode::with_children(kind, text, Vec::new());
    }
    let children = split_top_level(inner, ',')
        .into_iter()
        .map(|entry| {
            let entry = entry.trim();
            if kind == TreeNodeKind::ObjectLiteral {
                parse_obj_entry(entry)
            } else {
                parse_node(entry)
            }
        })
        .collect();
    TreeNode::with_children(kind, text, children)
}

fn parse_obj_entry(entry: &str) -> TreeNode {
    match top_level_positions(entry, ':').first() {
        Some(&colon) => {
            let key = parse_node(entry[..colon].trim());
            let value = parse_node(entry[colon + 1..].trim());
            TreeNode::with_children(TreeNodeKind::KeyValue, entry, vec![key, value])
        }
        None => parse_node(entry),
    }
}

/// Whether `text` names a legal object key: a quoted string, or a run of
/// letters, digits, `_` or `$` with an optional trailing `?`.
#[must_use]
pub fn is_valid_obj_key(text: &str) -> bool {
    if text.starts_with('"') || text.starts_with('\'') {
        return matches!(parse_node(text).kind, TreeNodeKind::StringLiteral);
    }
    OBJ_KEY_RE.is_match(text)
}

fn container_closed(node: &TreeNode, close: char) -> bool {
    node.value.ends_with(close) && find_matching(&node.value, 0) == Some(node.value.len() - 1)
}

/// Whether a container child slot may legally be empty: only the last one
/// (a trailing comma).
fn children_valid(node: &TreeNode, valid: &impl Fn(&TreeNode) -> bool) -> bool {
    let last = node.children.len().saturating_sub(1);
    node.children.iter().enumerate().all(|(i, child)| {
        if child.is_empty() {
            i == last && node.children.len() > 1
        } else {
            valid(child)
        }
    })
}

fn obj_entry_valid(child: &TreeNode, value_valid: &impl Fn(&TreeNode) -> bool) -> bool {
    match child.kind {
        TreeNodeKind::KeyValue => {
            let Some(key) = child.children.first() else {
                return false;
            };
            let Some(value) = child.children.get(1) else {
                return false;
            };
            is_valid_obj_key(&key.value) && (value.is_empty() || value_valid(value))
        }
        _ => is_valid_obj_key(&child.value),
    }
}

/// Whether `text` is a well-formed type expression.
#[must_use]
pub fn is_valid_type(text: &str) -> bool {
    let tree = parse_node(text);
    !tree.is_empty() && valid_type(&tree)
}

fn valid_type(node: &TreeNode) -> bool {
    use TreeNodeKind::*;
    match node.kind {
        Invalid => false,
        Any | Generic | Identifier | StringLiteral | NumberLiteral | BooleanLiteral
        | RegexLiteral | Null | ArithmeticExpression | Url | Unit => true,
        Or | And => {
            !node.children.is_empty()
                && node.children.iter().all(|c| !c.is_empty() && valid_type(c))
        }
        Expression => node
            .children
            .first()
            .is_some_and(|c| !c.is_empty() && valid_type(c)),
        ArrayExpression | ObjectExpression => {
            node.children.first().is_some_and(valid_type)
        }
        PropExpression => {
            let Some(base) = node.children.first() else {
                return false;
            };
            let keys = &node.children[1..];
            valid_type(base)
                && !keys.is_empty()
                && keys
                    .iter()
                    .all(|k| matches!(k.kind, StringLiteral | NumberLiteral))
        }
        ObjectLiteral => {
            container_closed(node, '}')
                && children_valid(node, &|c| obj_entry_valid(c, &valid_type))
        }
        ArrayLiteral => container_closed(node, ']') && children_valid(node, &valid_type),
        Class => node.children.iter().all(valid_type),
        ClassLiteral => class_literal_params_valid(&node.value),
        KeyValue => false,
    }
}

fn class_literal_params_valid(text: &str) -> bool {
    let Some(arrow) = top_level_arrow(text) else {
        return false;
    };
    let side_valid = |side: &str| {
        let side = side.trim();
        let inner = &side[1..side.len() - 1];
        if inner.trim().is_empty() {
            return true;
        }
        split_top_level(inner, ',').into_iter().all(|param| {
            let param = param.trim();
            if param.is_empty() {
                return false;
            }
            match top_level_positions(param, ':').first() {
                Some(&colon) => is_valid_type(param[colon + 1..].trim()),
                None => false,
            }
        })
    };
    side_valid(&text[..arrow]) && side_valid(&text[arrow + 2..])
}

/// Whether `text` is a well-formed value expression (a literal, not a
/// type: bare identifiers and type keywords do not qualify).
#[must_use]
pub fn is_valid_value(text: &str) -> bool {
    let tree = parse_node(text);
    !tree.is_empty() && valid_value(&tree)
}

fn valid_value(node: &TreeNode) -> bool {
    use TreeNodeKind::*;
    match node.kind {
        Null | BooleanLiteral | NumberLiteral | StringLiteral | RegexLiteral | Unit
        | ArithmeticExpression | Url => true,
        ObjectLiteral => {
            container_closed(node, '}')
                && children_valid(node, &|c| obj_entry_valid(c, &valid_value))
        }
        ArrayLiteral => container_closed(node, ']') && children_valid(node, &valid_value),
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    use TreeNodeKind::*;

    fn tree(text: &str) -> TreeNode {
        parse_tree(text)
    }

    #[rstest]
    #[case("\"foo\"", StringLiteral)]
    #[case("'foo'", StringLiteral)]
    #[case("'&*::&lt||()><'", StringLiteral)]
    #[case("2", NumberLiteral)]
    #[case("3.14", NumberLiteral)]
    #[case("1.", NumberLiteral)]
    #[case("1e23", NumberLiteral)]
    #[case("-2e-23", NumberLiteral)]
    #[case("Infinity", NumberLiteral)]
    #[case("-Infinity", NumberLiteral)]
    #[case("true", BooleanLiteral)]
    #[case("null", Null)]
    #[case("/abc/", RegexLiteral)]
    #[case("any", Any)]
    #[case("string", Identifier)]
    #[case("regex", Identifier)]
    #[case("<T>", Generic)]
    #[case("`U`", Class)]
    #[case("`A<T>`", Class)]
    #[case("1 + 2", ArithmeticExpression)]
    #[case("1 + 2 * 3", ArithmeticExpression)]
    #[case("unit://123", Url)]
    #[case("{}", ObjectLiteral)]
    #[case("{a:1}", ObjectLiteral)]
    #[case("{{}", ObjectLiteral)]
    #[case("[]", ArrayLiteral)]
    #[case("[1,2,3]", ArrayLiteral)]
    #[case("[1[]", ArrayLiteral)]
    #[case("string[]", ArrayExpression)]
    #[case("string{}", ObjectExpression)]
    #[case("1[2]", PropExpression)]
    #[case("<T>[\"S\"]", PropExpression)]
    #[case("(string)", Expression)]
    #[case("string|number", Or)]
    #[case("(string)[]|(<T>[])", Or)]
    #[case("`U`&`G`", And)]
    #[case("()=>()", ClassLiteral)]
    #[case("(a:number,b:number)=>(a+b:number)", ClassLiteral)]
    #[case("${id}", Unit)]
    #[case("foo", Invalid)]
    #[case(":", Invalid)]
    #[case("", Invalid)]
    #[case("'\\'", Invalid)]
    #[case("'a'b", Invalid)]
    #[case("<a>", Invalid)]
    #[case("<*>", Invalid)]
    #[case("<T >", Invalid)]
    #[case("+123456", Invalid)]
    #[case("a + 1", Invalid)]
    #[case("`A<>`", Invalid)]
    fn node_kind(#[case] text: &str, #[case] kind: TreeNodeKind) {
        assert_eq!(tree_node_kind(text), kind, "{text}");
    }

    #[rstest]
    #[case("string|number|{}", 3)]
    #[case("{a:1,b:2}", 2)]
    #[case("{a:1,,b:2}", 3)]
    #[case("{,}", 2)]
    #[case("{a:1,\"b,\"c\":2}", 2)]
    #[case("[true,true,]", 3)]
    fn child_count(#[case] text: &str, #[case] n: usize) {
        assert_eq!(tree(text).children.len(), n, "{text}");
    }

    #[test]
    fn trailing_comma_child_is_empty() {
        let t = tree("[true,true,]");
        assert_eq!(t.children[2].value, "");
        let t = tree("{a:[true,true,]}");
        assert_eq!(t.children[0].children[1].children[2].value, "");
    }

    #[test]
    fn empty_key_value_entry() {
        let t = tree("{:}");
        assert_eq!(t.children[0].kind, KeyValue);
    }

    #[test]
    fn key_value_splits_on_first_top_level_colon() {
        let t = tree("{'{':1}");
        assert_eq!(t.children[0].kind, KeyValue);
        assert_eq!(t.children[0].children[0].value, "'{'");
        assert_eq!(t.children[0].children[1].value, "1");
    }

    #[test]
    fn class_tag_params() {
        let t = tree("`V<T>`");
        assert_eq!(t.children.len(), 1);
        assert_eq!(t.children[0].kind, Generic);
        assert_eq!(t.children[0].value, "<T>");

        let t = tree("`V<`J`>`");
        assert_eq!(t.children.len(), 1);
        assert_eq!(t.children[0].kind, Class);
        assert_eq!(t.children[0].value, "`J`");
    }

    #[test]
    fn unit_payload_is_parsed() {
        let t = tree("${unit:{id:'x'}}");
        assert_eq!(t.kind, Unit);
        assert_eq!(t.children[0].kind, ObjectLiteral);
    }

    #[rstest]
    #[case("string")]
    #[case("number")]
    #[case("any")]
    #[case("regex")]
    #[case("<T>")]
    #[case("string[]")]
    #[case("string|number")]
    #[case("string[]|object[]")]
    #[case("(string|number)[]")]
    #[case("{a:number,b:string}")]
    #[case("{a:number,}")]
    #[case("{}")]
    #[case("{a:{b:{}}}")]
    #[case("string{}")]
    #[case("<T>[\"S\"]")]
    #[case("`U`")]
    #[case("`U`&`G`")]
    #[case("`V<T>`")]
    #[case("()=>()")]
    #[case("(a:number,b:number)=>(a+b:number)")]
    #[case("1+2")]
    #[case("\"foo\"")]
    #[case("123")]
    #[case("true")]
    #[case("null")]
    fn valid_types(#[case] text: &str) {
        assert!(is_valid_type(text), "{text}");
    }

    #[rstest]
    #[case("")]
    #[case("foo")]
    #[case("|")]
    #[case("string|")]
    #[case("()")]
    #[case("{,}")]
    #[case("{{}")]
    #[case("<T>[\"S\",K]")]
    #[case("`A<>`")]
    #[case("{♥:number}")]
    #[case("{*:number}")]
    fn invalid_types(#[case] text: &str) {
        assert!(!is_valid_type(text), "{text}");
    }

    #[rstest]
    #[case("1")]
    #[case("-2e-23")]
    #[case("Infinity")]
    #[case("\"foo\"")]
    #[case("'foo'")]
    #[case("true")]
    #[case("null")]
    #[case("/abc/")]
    #[case("[]")]
    #[case("[1,2,3]")]
    #[case("[1,2,[3,4],5]")]
    #[case("[true,true,]")]
    #[case("{}")]
    #[case("{a:1}")]
    #[case("{a:}")]
    #[case("{a}")]
    #[case("{1,2}")]
    #[case("{a:1,b:{c:[2,3]}}")]
    #[case("{foo:\"\\\"bar}\"}")]
    #[case("{Ç:1}")]
    #[case("{foo?:1}")]
    #[case("1 + 2")]
    #[case("${id}")]
    fn valid_values(#[case] text: &str) {
        assert!(is_valid_value(text), "{text}");
    }

    #[rstest]
    #[case("")]
    #[case("foo")]
    #[case("string")]
    #[case("[string]")]
    #[case("+123456")]
    #[case("a + 1")]
    #[case("[\"\\\"]")]
    #[case("{,}")]
    #[case("{a:1,,b:2}")]
    #[case("{::1}")]
    #[case("{''':1}")]
    #[case("{{':1}")]
    #[case("[1[]")]
    fn invalid_values(#[case] text: &str) {
        assert!(!is_valid_value(text), "{text}");
    }

    #[rstest]
    #[case("{a:1,b:2}")]
    #[case("[1,2,3]")]
    #[case("{a:[true,false],b:{c:'x'}}")]
    #[case("string|number")]
    #[case("(string|number)[]")]
    #[case("`V<T>`")]
    #[case("<T>[\"S\"]")]
    #[case("${id}")]
    fn serialize_round_trips(#[case] text: &str) {
        assert_eq!(tree(text).serialize(), text);
    }
}
