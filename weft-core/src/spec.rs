//! The addressable graph specification model.
//!
//! A [`GraphSpec`] aggregates unit instances, merges (n-ary hyperedges over
//! pins), exposed boundary pins with their plug bindings, and a visual
//! sub-component containment tree. All entities are addressed by string
//! ids; insertion order is preserved and observable (plug slot numbering,
//! sub-component child order).

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// An ordered map keyed by entity id.
pub type Dict<T> = IndexMap<SmolStr, T>;

/// Pin id of the synthetic self output, standing for "this unit's own
/// value" in reference wiring.
pub const SELF: &str = "_self";

/// Returns whether `(io, pin_id)` addresses the synthetic self output.
#[must_use]
pub fn is_self_pin(io: IO, pin_id: &str) -> bool {
    io == IO::Output && pin_id == SELF
}

/// The two sides of a pin: graph/unit inputs and outputs.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Debug,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum IO {
    /// An input pin.
    #[display("input")]
    Input,
    /// An output pin.
    #[display("output")]
    Output,
}

impl IO {
    /// Both sides, in input-first order.
    pub const BOTH: [IO; 2] = [IO::Input, IO::Output];

    /// The opposite side.
    #[must_use]
    pub fn opposite(self) -> IO {
        match self {
            IO::Input => IO::Output,
            IO::Output => IO::Input,
        }
    }
}

/// A pair of values, one per pin side.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IoOf<T> {
    /// The input-side value.
    #[serde(default)]
    pub input: T,
    /// The output-side value.
    #[serde(default)]
    pub output: T,
}

impl<T> IoOf<T> {
    /// Borrows the value for `io`.
    pub fn get(&self, io: IO) -> &T {
        match io {
            IO::Input => &self.input,
            IO::Output => &self.output,
        }
    }

    /// Mutably borrows the value for `io`.
    pub fn get_mut(&mut self, io: IO) -> &mut T {
        match io {
            IO::Input => &mut self.input,
            IO::Output => &mut self.output,
        }
    }

    /// Iterates both sides, input first.
    pub fn iter(&self) -> impl Iterator<Item = (IO, &T)> {
        [(IO::Input, &self.input), (IO::Output, &self.output)].into_iter()
    }
}

impl<T> std::ops::Index<IO> for IoOf<T> {
    type Output = T;

    fn index(&self, io: IO) -> &T {
        self.get(io)
    }
}

impl<T> std::ops::IndexMut<IO> for IoOf<T> {
    fn index_mut(&mut self, io: IO) -> &mut T {
        self.get_mut(io)
    }
}

/// An n-ary hyperedge equating pins across units (and possibly the
/// enclosing graph's own boundary pins, keyed by the graph's id).
///
/// Member pins are recorded as `unit id -> side -> pin ids`. A merge with no
/// member is meaningless and is deleted by the owning graph.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MergeSpec(pub Dict<IoOf<IndexSet<SmolStr>>>);

impl MergeSpec {
    /// An empty merge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A merge with a single member pin.
    #[must_use]
    pub fn single(unit_id: impl Into<SmolStr>, io: IO, pin_id: impl Into<SmolStr>) -> Self {
        let mut merge = Self::new();
        merge.add(unit_id, io, pin_id);
        merge
    }

    /// Adds a member pin.
    pub fn add(&mut self, unit_id: impl Into<SmolStr>, io: IO, pin_id: impl Into<SmolStr>) {
        self.0.entry(unit_id.into()).or_default()[io].insert(pin_id.into());
    }

    /// Removes a member pin, dropping the unit entry if it becomes empty.
    pub fn remove(&mut self, unit_id: &str, io: IO, pin_id: &str) {
        if let Some(pins) = self.0.get_mut(unit_id) {
            pins[io].shift_remove(pin_id);
            if pins.input.is_empty() && pins.output.is_empty() {
                self.0.shift_remove(unit_id);
            }
        }
    }

    /// Removes every pin of `unit_id` from the merge.
    pub fn remove_unit(&mut self, unit_id: &str) {
        self.0.shift_remove(unit_id);
    }

    /// Returns whether the member pin is present.
    #[must_use]
    pub fn has(&self, unit_id: &str, io: IO, pin_id: &str) -> bool {
        self.0
            .get(unit_id)
            .is_some_and(|pins| pins[io].contains(pin_id))
    }

    /// Returns whether the merge has no member pin.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pin_count() == 0
    }

    /// Total member pin count.
    #[must_use]
    pub fn pin_count(&self) -> usize {
        self.0
            .values()
            .map(|pins| pins.input.len() + pins.output.len())
            .sum()
    }

    /// Member pin count on one side.
    #[must_use]
    pub fn io_pin_count(&self, io: IO) -> usize {
        self.0.values().map(|pins| pins[io].len()).sum()
    }

    /// Member pin count contributed by one unit.
    #[must_use]
    pub fn unit_pin_count(&self, unit_id: &str) -> usize {
        self.0
            .get(unit_id)
            .map_or(0, |pins| pins.input.len() + pins.output.len())
    }

    /// The sole member unit id, if the merge spans exactly one unit.
    #[must_use]
    pub fn single_unit(&self) -> Option<&SmolStr> {
        (self.0.len() == 1).then(|| self.0.keys().next()).flatten()
    }

    /// Iterates every member pin as `(unit id, side, pin id)`.
    pub fn pins(&self) -> impl Iterator<Item = (&SmolStr, IO, &SmolStr)> {
        self.0.iter().flat_map(|(unit_id, pins)| {
            pins.input
                .iter()
                .map(move |pin_id| (unit_id, IO::Input, pin_id))
                .chain(
                    pins.output
                        .iter()
                        .map(move |pin_id| (unit_id, IO::Output, pin_id)),
                )
        })
    }
}

/// Per-pin metadata of a unit instance.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UnitPinSpec {
    /// The pin holds a constant literal instead of a wire value.
    #[serde(default, skip_serializing_if = "is_false")]
    pub constant: bool,
    /// The pin is disconnected and takes no part in dataflow.
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignored: bool,
    /// The pin carries a reference rather than a value.
    #[serde(default, rename = "ref", skip_serializing_if = "is_false")]
    pub r#ref: bool,
    /// Literal pin data, as a spec-language expression string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Position of a unit on the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

/// Explicit size of a visual sub-component.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ComponentSize {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

/// Visual metadata of a unit instance.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UnitMetadata {
    /// Canvas position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Explicit size, when the unit is a visual sub-component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentSize>,
}

/// A unit (node) instance inside a graph.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UnitSpec {
    /// Id of the class or nested graph spec this unit instantiates.
    pub id: SmolStr,
    /// Input pin metadata, keyed by pin id.
    #[serde(default, skip_serializing_if = "Dict::is_empty")]
    pub input: Dict<UnitPinSpec>,
    /// Output pin metadata, keyed by pin id.
    #[serde(default, skip_serializing_if = "Dict::is_empty")]
    pub output: Dict<UnitPinSpec>,
    /// Visual metadata.
    #[serde(default, skip_serializing_if = "UnitMetadata::is_default")]
    pub metadata: UnitMetadata,
}

impl UnitMetadata {
    fn is_default(&self) -> bool {
        self.position.is_none() && self.component.is_none()
    }
}

impl UnitSpec {
    /// A unit instantiating the spec `id`.
    #[must_use]
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Borrows the metadata of a pin, if any was recorded.
    #[must_use]
    pub fn pin(&self, io: IO, pin_id: &str) -> Option<&UnitPinSpec> {
        match io {
            IO::Input => self.input.get(pin_id),
            IO::Output => self.output.get(pin_id),
        }
    }

    /// Mutably borrows the metadata of a pin, creating it when absent.
    pub fn pin_mut(&mut self, io: IO, pin_id: impl Into<SmolStr>) -> &mut UnitPinSpec {
        let pins = match io {
            IO::Input => &mut self.input,
            IO::Output => &mut self.output,
        };
        pins.entry(pin_id.into()).or_default()
    }

    /// Whether the pin is flagged constant.
    #[must_use]
    pub fn is_pin_constant(&self, io: IO, pin_id: &str) -> bool {
        self.pin(io, pin_id).is_some_and(|pin| pin.constant)
    }

    /// Whether the pin is flagged ignored.
    #[must_use]
    pub fn is_pin_ignored(&self, io: IO, pin_id: &str) -> bool {
        self.pin(io, pin_id).is_some_and(|pin| pin.ignored)
    }

    /// Whether the pin carries a reference.
    #[must_use]
    pub fn is_pin_ref(&self, io: IO, pin_id: &str) -> bool {
        self.pin(io, pin_id).is_some_and(|pin| pin.r#ref)
    }

    /// The pin's literal data, if any.
    #[must_use]
    pub fn pin_data(&self, io: IO, pin_id: &str) -> Option<&str> {
        self.pin(io, pin_id).and_then(|pin| pin.data.as_deref())
    }
}

/// A plug: one sub-slot binding of a boundary-exposed pin.
///
/// Binds to a specific unit pin (`unit_id` + `pin_id`), to a merge
/// (`merge_id`), or to nothing (exposed but unbound). The mover branches on
/// field presence, so this keeps the optional-fields shape rather than an
/// enum.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PlugSpec {
    /// Target unit id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<SmolStr>,
    /// Target pin id on the unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_id: Option<SmolStr>,
    /// Side of the target pin, when it differs from the exposed side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<IO>,
    /// Target merge id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_id: Option<SmolStr>,
}

impl PlugSpec {
    /// An unbound plug slot.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A plug bound to a unit pin.
    #[must_use]
    pub fn unit(unit_id: impl Into<SmolStr>, pin_id: impl Into<SmolStr>) -> Self {
        Self {
            unit_id: Some(unit_id.into()),
            pin_id: Some(pin_id.into()),
            ..Self::default()
        }
    }

    /// A plug bound to a unit pin on an explicit side.
    #[must_use]
    pub fn unit_kind(
        unit_id: impl Into<SmolStr>,
        pin_id: impl Into<SmolStr>,
        kind: Option<IO>,
    ) -> Self {
        Self {
            unit_id: Some(unit_id.into()),
            pin_id: Some(pin_id.into()),
            kind,
            ..Self::default()
        }
    }

    /// A plug bound to a merge.
    #[must_use]
    pub fn merge(merge_id: impl Into<SmolStr>) -> Self {
        Self {
            merge_id: Some(merge_id.into()),
            ..Self::default()
        }
    }

    /// Whether the slot is unbound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unit_id.is_none() && self.pin_id.is_none() && self.merge_id.is_none()
    }

    /// Whether the slot binds the given unit pin.
    #[must_use]
    pub fn binds_unit_pin(&self, unit_id: &str, pin_id: &str) -> bool {
        self.unit_id.as_deref() == Some(unit_id) && self.pin_id.as_deref() == Some(pin_id)
    }

    /// The bound side, defaulting to the exposed side `io`.
    #[must_use]
    pub fn kind_or(&self, io: IO) -> IO {
        self.kind.unwrap_or(io)
    }
}

/// A graph-boundary exposed pin, with its plug sub-slots.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GraphPinSpec {
    /// Sub-slot bindings, keyed by sub-pin id (conventionally ordinal).
    #[serde(default, skip_serializing_if = "Dict::is_empty")]
    pub plug: Dict<PlugSpec>,
    /// The boundary pin carries a reference rather than a value.
    #[serde(default, rename = "ref", skip_serializing_if = "is_false")]
    pub r#ref: bool,
    /// The boundary pin holds a constant literal.
    #[serde(default, skip_serializing_if = "is_false")]
    pub constant: bool,
    /// The pin starts out ignored when the graph is instantiated.
    #[serde(default, skip_serializing_if = "is_false")]
    pub default_ignored: bool,
    /// Declared type expression, if any.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    /// Literal pin data, as a spec-language expression string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl GraphPinSpec {
    /// A pin spec with a single plug slot `"0"`.
    #[must_use]
    pub fn with_plug(sub_pin_id: impl Into<SmolStr>, plug: PlugSpec) -> Self {
        let mut pin = Self::default();
        pin.plug.insert(sub_pin_id.into(), plug);
        pin
    }
}

/// A node of the visual containment tree.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SubComponentSpec {
    /// Child unit ids, in render order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SmolStr>,
    /// Parent slot this sub-component renders into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<SmolStr>,
    /// Explicit width, if sized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Explicit height, if sized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

/// The visual containment tree of a graph.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ComponentSpec {
    /// Containment nodes, keyed by unit id.
    #[serde(default, skip_serializing_if = "Dict::is_empty")]
    pub sub_components: Dict<SubComponentSpec>,
    /// Root-level children, in render order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SmolStr>,
}

/// A complete graph specification.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GraphSpec {
    /// The graph's own id; may appear as a pin owner inside merges.
    #[serde(default, skip_serializing_if = "SmolStr::is_empty")]
    pub id: SmolStr,
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Unit instances, keyed by unit id.
    #[serde(default, skip_serializing_if = "Dict::is_empty")]
    pub units: Dict<UnitSpec>,
    /// Merges, keyed by merge id.
    #[serde(default, skip_serializing_if = "Dict::is_empty")]
    pub merges: Dict<MergeSpec>,
    /// Exposed input pins.
    #[serde(default, skip_serializing_if = "Dict::is_empty")]
    pub inputs: Dict<GraphPinSpec>,
    /// Exposed output pins.
    #[serde(default, skip_serializing_if = "Dict::is_empty")]
    pub outputs: Dict<GraphPinSpec>,
    /// Visual containment tree.
    #[serde(default, skip_serializing_if = "ComponentSpec::is_empty")]
    pub component: ComponentSpec,
}

impl ComponentSpec {
    fn is_empty(&self) -> bool {
        self.sub_components.is_empty() && self.children.is_empty()
    }
}

impl GraphSpec {
    /// An empty graph with the given id.
    #[must_use]
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Borrows the exposed pins of one side.
    #[must_use]
    pub fn pins(&self, io: IO) -> &Dict<GraphPinSpec> {
        match io {
            IO::Input => &self.inputs,
            IO::Output => &self.outputs,
        }
    }

    /// Mutably borrows the exposed pins of one side.
    pub fn pins_mut(&mut self, io: IO) -> &mut Dict<GraphPinSpec> {
        match io {
            IO::Input => &mut self.inputs,
            IO::Output => &mut self.outputs,
        }
    }
}

pub(crate) fn is_false(value: &bool) -> bool {
    !value
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn merge_pin_accounting() {
        let mut merge = MergeSpec::new();
        merge.add("a", IO::Output, "out");
        merge.add("b", IO::Input, "x");
        merge.add("b", IO::Input, "y");

        assert_eq!(merge.pin_count(), 3);
        assert_eq!(merge.io_pin_count(IO::Input), 2);
        assert_eq!(merge.io_pin_count(IO::Output), 1);
        assert_eq!(merge.unit_pin_count("b"), 2);
        assert!(merge.has("a", IO::Output, "out"));
        assert!(!merge.has("a", IO::Input, "out"));
        assert_eq!(merge.single_unit(), None);

        merge.remove("b", IO::Input, "x");
        merge.remove("b", IO::Input, "y");
        assert_eq!(merge.single_unit().map(SmolStr::as_str), Some("a"));

        merge.remove("a", IO::Output, "out");
        assert!(merge.is_empty());
    }

    #[test]
    fn merge_pin_iteration_order() {
        let mut merge = MergeSpec::new();
        merge.add("u", IO::Input, "a");
        merge.add("u", IO::Output, "b");
        merge.add("v", IO::Input, "c");

        let pins: Vec<_> = merge
            .pins()
            .map(|(unit, io, pin)| (unit.as_str(), io, pin.as_str()))
            .collect();
        assert_eq!(
            pins,
            vec![
                ("u", IO::Input, "a"),
                ("u", IO::Output, "b"),
                ("v", IO::Input, "c"),
            ]
        );
    }

    #[test]
    fn graph_spec_serde_round_trip() {
        let mut spec = GraphSpec::new("g");
        let mut unit = UnitSpec::new("spec-id");
        unit.pin_mut(IO::Input, "a").constant = true;
        unit.pin_mut(IO::Input, "a").data = Some("42".to_owned());
        spec.units.insert("u".into(), unit);
        spec.merges
            .insert("m".into(), MergeSpec::single("u", IO::Input, "a"));
        spec.inputs.insert(
            "a".into(),
            GraphPinSpec::with_plug("0", PlugSpec::unit("u", "a")),
        );

        let json = serde_json::to_string(&spec).unwrap();
        let back: GraphSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }

    #[test]
    fn plug_spec_shapes() {
        assert!(PlugSpec::empty().is_empty());
        assert!(!PlugSpec::merge("m").is_empty());
        let plug = PlugSpec::unit("u", "p");
        assert!(plug.binds_unit_pin("u", "p"));
        assert_eq!(plug.kind_or(IO::Output), IO::Output);
        let plug = PlugSpec::unit_kind("u", "p", Some(IO::Input));
        assert_eq!(plug.kind_or(IO::Output), IO::Input);
    }
}
