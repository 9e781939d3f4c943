//! Spec declarations and the class tag hierarchy.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::spec::{Dict, IO};

/// Declared shape of a unit pin.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PinDecl {
    /// Declared pin type expression.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub ty: Option<String>,
    /// Whether the pin carries a reference rather than data.
    #[serde(default, skip_serializing_if = "crate::spec::is_false", rename = "ref")]
    pub r#ref: bool,
}

/// Declared interface of a unit spec: its type expression and pins.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecDecl {
    /// Human-readable name.
    #[serde(default)]
    pub name: SmolStr,
    /// The spec's type expression, e.g. `` `U` `` or `` `U`&`G` ``.
    #[serde(default, rename = "type")]
    pub ty: String,
    /// Input pin declarations.
    #[serde(default)]
    pub inputs: Dict<PinDecl>,
    /// Output pin declarations.
    #[serde(default)]
    pub outputs: Dict<PinDecl>,
}

impl SpecDecl {
    /// Pin declarations on the given side.
    #[must_use]
    pub fn pins(&self, io: IO) -> &Dict<PinDecl> {
        match io {
            IO::Input => &self.inputs,
            IO::Output => &self.outputs,
        }
    }
}

/// Subclass relation over class tags. Maps a tag to the tags it implies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassHierarchy(pub Dict<Vec<SmolStr>>);

impl Default for ClassHierarchy {
    fn default() -> Self {
        let mut map = Dict::default();
        map.insert("G".into(), vec!["U".into(), "C".into(), "EE".into()]);
        map.insert("U".into(), vec!["EE".into()]);
        map.insert("C".into(), vec!["EE".into()]);
        Self(map)
    }
}

impl ClassHierarchy {
    /// The transitive closure of tags implied by `tag`, `tag` included.
    #[must_use]
    pub fn implied(&self, tag: &str) -> IndexSet<SmolStr> {
        let mut closure = IndexSet::new();
        let mut stack = vec![SmolStr::new(tag)];
        while let Some(current) = stack.pop() {
            if !closure.insert(current.clone()) {
                continue;
            }
            if let Some(supers) = self.0.get(&current) {
                stack.extend(supers.iter().cloned());
            }
        }
        closure
    }
}

/// Registry of known spec declarations plus the class tag hierarchy.
///
/// Matching and evaluation take the registry explicitly; there is no
/// process-global spec table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecRegistry {
    /// Spec declarations by id.
    #[serde(default)]
    pub specs: Dict<SpecDecl>,
    /// Class tag hierarchy.
    #[serde(default)]
    pub classes: ClassHierarchy,
}

impl SpecRegistry {
    /// An empty registry with the default class hierarchy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a spec declaration.
    pub fn insert(&mut self, id: impl Into<SmolStr>, decl: SpecDecl) {
        self.specs.insert(id.into(), decl);
    }

    /// Looks up a spec declaration.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&SpecDecl> {
        self.specs.get(id)
    }

    /// Declared pin names of a spec, on one side.
    #[must_use]
    pub fn pin_names(&self, id: &str, io: IO) -> Vec<SmolStr> {
        self.get(id)
            .map(|decl| decl.pins(io).keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_hierarchy_closure() {
        let classes = ClassHierarchy::default();
        let implied = classes.implied("G");
        assert!(implied.contains("G"));
        assert!(implied.contains("U"));
        assert!(implied.contains("C"));
        assert!(implied.contains("EE"));
        assert_eq!(classes.implied("EE").len(), 1);
    }

    #[test]
    fn closure_tolerates_cycles() {
        let mut classes = ClassHierarchy::default();
        classes.0.insert("A".into(), vec!["B".into()]);
        classes.0.insert("B".into(), vec!["A".into()]);
        assert_eq!(classes.implied("A").len(), 2);
    }

    #[test]
    fn spec_decl_serde_field_names() {
        let decl: SpecDecl = serde_json::from_value(serde_json::json!({
            "name": "identity",
            "type": "`U`",
            "inputs": { "a": { "type": "any" } },
            "outputs": { "a": { "type": "any", "ref": true } },
        }))
        .unwrap();
        assert_eq!(decl.ty, "`U`");
        assert!(decl.outputs["a"].r#ref);
    }
}
