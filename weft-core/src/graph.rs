//! Graph spec container and its read/write views.
//!
//! [`GraphView`] and [`GraphMut`] expose the graph operations over any
//! [`GraphSpec`] holder; [`Graph`] is the standard holder, pairing a spec
//! with its [`SpecRegistry`]. Mutators are guard-first: re-applying an
//! operation that already holds is a no-op, which is what makes subgraph
//! moves replayable.

pub mod move_subgraph;

use std::sync::Arc;

use smol_str::SmolStr;

use crate::spec::{
    Dict, GraphPinSpec, GraphSpec, IO, MergeSpec, PlugSpec, UnitSpec,
};
use crate::types::registry::SpecRegistry;

/// Read access to a graph spec.
pub trait GraphView {
    /// The underlying spec.
    fn spec(&self) -> &GraphSpec;

    /// The spec registry the graph resolves unit declarations against.
    fn registry(&self) -> &SpecRegistry;

    /// Whether a unit with this id exists.
    fn has_unit(&self, unit_id: &str) -> bool {
        self.spec().units.contains_key(unit_id)
    }

    /// Borrows a unit instance.
    fn unit(&self, unit_id: &str) -> Option<&UnitSpec> {
        self.spec().units.get(unit_id)
    }

    /// Pin names of a unit on one side: the registry declaration's pins
    /// followed by any pins the instance records beyond them.
    fn unit_pin_names(&self, unit_id: &str, io: IO) -> Vec<SmolStr> {
        let mut names: Vec<SmolStr> = self
            .unit(unit_id)
            .map(|unit| self.registry().pin_names(&unit.id, io))
            .unwrap_or_default();
        if let Some(unit) = self.unit(unit_id) {
            let own = match io {
                IO::Input => &unit.input,
                IO::Output => &unit.output,
            };
            for pin_id in own.keys() {
                if !names.contains(pin_id) {
                    names.push(pin_id.clone());
                }
            }
        }
        names
    }

    /// Whether the unit has a pin with this name on this side.
    fn has_unit_pin_named(&self, unit_id: &str, io: IO, pin_id: &str) -> bool {
        self.unit_pin_names(unit_id, io).iter().any(|p| p == pin_id)
    }

    /// Whether a merge with this id exists.
    fn has_merge(&self, merge_id: &str) -> bool {
        self.spec().merges.contains_key(merge_id)
    }

    /// Borrows a merge.
    fn merge_spec(&self, merge_id: &str) -> Option<&MergeSpec> {
        self.spec().merges.get(merge_id)
    }

    /// All merges.
    fn merges(&self) -> &Dict<MergeSpec> {
        &self.spec().merges
    }

    /// Whether the merge contains this member pin.
    fn has_merge_pin(&self, merge_id: &str, unit_id: &str, io: IO, pin_id: &str) -> bool {
        self.merge_spec(merge_id)
            .is_some_and(|merge| merge.has(unit_id, io, pin_id))
    }

    /// The literal carried into the merge by its first constant member
    /// pin, if any.
    fn merge_data(&self, merge_id: &str) -> Option<String> {
        let merge = self.merge_spec(merge_id)?;
        merge.pins().find_map(|(unit_id, io, pin_id)| {
            let unit = self.unit(unit_id)?;
            (unit.is_pin_constant(io, pin_id))
                .then(|| unit.pin_data(io, pin_id).map(str::to_owned))
                .flatten()
        })
    }

    /// Whether any member pin of the merge carries a reference.
    fn is_ref_merge(&self, merge_id: &str) -> bool {
        self.merge_spec(merge_id).is_some_and(|merge| {
            merge.pins().any(|(unit_id, io, pin_id)| {
                self.unit(unit_id).is_some_and(|unit| {
                    unit.is_pin_ref(io, pin_id)
                        || self
                            .registry()
                            .get(&unit.id)
                            .and_then(|decl| decl.pins(io).get(pin_id))
                            .is_some_and(|pin| pin.r#ref)
                })
            })
        })
    }

    /// Whether a boundary pin with this name is exposed on this side.
    fn has_pin_named(&self, io: IO, pin_id: &str) -> bool {
        self.spec().pins(io).contains_key(pin_id)
    }

    /// Borrows an exposed boundary pin.
    fn exposed_pin_spec(&self, io: IO, pin_id: &str) -> Option<&GraphPinSpec> {
        self.spec().pins(io).get(pin_id)
    }

    /// All exposed boundary pins of one side.
    fn pin_specs(&self, io: IO) -> &Dict<GraphPinSpec> {
        self.spec().pins(io)
    }

    /// Borrows one plug slot of a boundary pin.
    fn sub_pin_spec(&self, io: IO, pin_id: &str, sub_pin_id: &str) -> Option<&PlugSpec> {
        self.exposed_pin_spec(io, pin_id)
            .and_then(|pin| pin.plug.get(sub_pin_id))
    }

    /// Whether the boundary pin has this plug slot.
    fn has_plug(&self, io: IO, pin_id: &str, sub_pin_id: &str) -> bool {
        self.sub_pin_spec(io, pin_id, sub_pin_id).is_some()
    }

    /// Number of plug slots on a boundary pin.
    fn pin_plug_count(&self, io: IO, pin_id: &str) -> usize {
        self.exposed_pin_spec(io, pin_id)
            .map_or(0, |pin| pin.plug.len())
    }

    /// A boundary pin's literal data, if any.
    fn pin_data(&self, io: IO, pin_id: &str) -> Option<String> {
        self.exposed_pin_spec(io, pin_id)
            .and_then(|pin| pin.data.clone())
    }

    /// Whether the boundary pin holds a constant.
    fn is_pin_constant(&self, io: IO, pin_id: &str) -> bool {
        self.exposed_pin_spec(io, pin_id)
            .is_some_and(|pin| pin.constant)
    }

    /// Whether the boundary pin carries a reference.
    fn is_pin_ref(&self, io: IO, pin_id: &str) -> bool {
        self.exposed_pin_spec(io, pin_id).is_some_and(|pin| pin.r#ref)
    }

    /// A unit pin's literal data, if any.
    fn unit_pin_data(&self, unit_id: &str, io: IO, pin_id: &str) -> Option<String> {
        self.unit(unit_id)
            .and_then(|unit| unit.pin_data(io, pin_id).map(str::to_owned))
    }

    /// Whether the unit pin holds a constant.
    fn is_unit_pin_constant(&self, unit_id: &str, io: IO, pin_id: &str) -> bool {
        self.unit(unit_id)
            .is_some_and(|unit| unit.is_pin_constant(io, pin_id))
    }

    /// Whether the unit pin carries a reference.
    fn is_unit_pin_ref(&self, unit_id: &str, io: IO, pin_id: &str) -> bool {
        self.unit(unit_id)
            .is_some_and(|unit| unit.is_pin_ref(io, pin_id))
    }

    /// Whether the unit pin is ignored.
    fn is_unit_pin_ignored(&self, unit_id: &str, io: IO, pin_id: &str) -> bool {
        self.unit(unit_id)
            .is_some_and(|unit| unit.is_pin_ignored(io, pin_id))
    }
}

/// Write access to a graph spec.
pub trait GraphMut: GraphView {
    /// The underlying spec, mutably.
    fn spec_mut(&mut self) -> &mut GraphSpec;

    /// Adds a unit. No-op when the id is taken.
    fn add_unit(&mut self, unit_id: impl Into<SmolStr>, unit: UnitSpec) {
        let unit_id = unit_id.into();
        if self.has_unit(&unit_id) {
            return;
        }
        self.spec_mut().units.insert(unit_id, unit);
    }

    /// Removes a unit, scrubbing it from merges and the component tree.
    /// Merges left without members are dropped.
    fn remove_unit(&mut self, unit_id: &str) -> Option<UnitSpec> {
        let unit = self.spec_mut().units.shift_remove(unit_id)?;
        let spec = self.spec_mut();
        for merge in spec.merges.values_mut() {
            merge.remove_unit(unit_id);
        }
        spec.merges.retain(|_, merge| !merge.is_empty());
        spec.component.sub_components.shift_remove(unit_id);
        for sub in spec.component.sub_components.values_mut() {
            sub.children.retain(|child| child != unit_id);
        }
        spec.component.children.retain(|child| child != unit_id);
        Some(unit)
    }

    /// Adds a merge under the given id. No-op when the id is taken.
    fn add_merge(&mut self, merge: MergeSpec, merge_id: impl Into<SmolStr>) {
        let merge_id = merge_id.into();
        if self.has_merge(&merge_id) {
            return;
        }
        self.spec_mut().merges.insert(merge_id, merge);
    }

    /// Removes a merge.
    fn remove_merge(&mut self, merge_id: &str) -> Option<MergeSpec> {
        self.spec_mut().merges.shift_remove(merge_id)
    }

    /// Adds a member pin to a merge, creating the merge when absent.
    fn add_pin_to_merge(
        &mut self,
        merge_id: impl Into<SmolStr>,
        unit_id: impl Into<SmolStr>,
        io: IO,
        pin_id: impl Into<SmolStr>,
    ) {
        self.spec_mut()
            .merges
            .entry(merge_id.into())
            .or_default()
            .add(unit_id, io, pin_id);
    }

    /// Removes a member pin from a merge, keeping the merge alive.
    fn remove_pin_from_merge(&mut self, merge_id: &str, unit_id: &str, io: IO, pin_id: &str) {
        if let Some(merge) = self.spec_mut().merges.get_mut(merge_id) {
            merge.remove(unit_id, io, pin_id);
        }
    }

    /// Removes a member pin; a merge left without members is dropped.
    fn remove_pin_or_merge(&mut self, merge_id: &str, unit_id: &str, io: IO, pin_id: &str) {
        self.remove_pin_from_merge(merge_id, unit_id, io, pin_id);
        if self.merge_spec(merge_id).is_some_and(MergeSpec::is_empty) {
            self.remove_merge(merge_id);
        }
    }

    /// Exposes a boundary pin wholesale. With `propagate`, literal data is
    /// forwarded to plugged unit pins.
    fn expose_pin_set(
        &mut self,
        io: IO,
        pin_id: impl Into<SmolStr>,
        mut pin: GraphPinSpec,
        data: Option<String>,
        propagate: bool,
    ) {
        let pin_id = pin_id.into();
        if self.has_pin_named(io, &pin_id) {
            return;
        }
        pin.data = data.clone();
        if propagate {
            if let Some(data) = data {
                let targets: Vec<(SmolStr, IO, SmolStr)> = pin
                    .plug
                    .values()
                    .filter_map(|plug| {
                        Some((
                            plug.unit_id.clone()?,
                            plug.kind_or(io),
                            plug.pin_id.clone()?,
                        ))
                    })
                    .collect();
                for (unit_id, kind, unit_pin_id) in targets {
                    self.set_unit_pin_data(&unit_id, kind, &unit_pin_id, data.clone());
                }
            }
        }
        self.spec_mut().pins_mut(io).insert(pin_id, pin);
    }

    /// Removes a boundary pin wholesale.
    fn cover_pin_set(&mut self, io: IO, pin_id: &str) -> Option<GraphPinSpec> {
        self.spec_mut().pins_mut(io).shift_remove(pin_id)
    }

    /// Adds one plug slot to a boundary pin, exposing the pin first when
    /// absent.
    fn expose_pin(
        &mut self,
        io: IO,
        pin_id: impl Into<SmolStr>,
        sub_pin_id: impl Into<SmolStr>,
        plug: PlugSpec,
    ) {
        let pin_id = pin_id.into();
        self.spec_mut()
            .pins_mut(io)
            .entry(pin_id)
            .or_default()
            .plug
            .insert(sub_pin_id.into(), plug);
    }

    /// Removes one plug slot from a boundary pin.
    fn cover_pin(&mut self, io: IO, pin_id: &str, sub_pin_id: &str) {
        if let Some(pin) = self.spec_mut().pins_mut(io).get_mut(pin_id) {
            pin.plug.shift_remove(sub_pin_id);
        }
    }

    /// Binds a plug slot. With `propagate`, forwarded data lands on the
    /// bound unit pin as well.
    fn plug_pin(
        &mut self,
        io: IO,
        pin_id: &str,
        sub_pin_id: impl Into<SmolStr>,
        plug: PlugSpec,
        data: Option<String>,
        propagate: bool,
    ) {
        let target = plug
            .unit_id
            .clone()
            .zip(plug.pin_id.clone())
            .map(|(unit_id, unit_pin_id)| (unit_id, plug.kind_or(io), unit_pin_id));
        {
            let spec = self.spec_mut();
            let pin = spec.pins_mut(io).entry(pin_id.into()).or_default();
            pin.plug.insert(sub_pin_id.into(), plug);
            if let Some(data) = &data {
                pin.data = Some(data.clone());
            }
        }
        if propagate {
            if let (Some(data), Some((unit_id, kind, unit_pin_id))) = (data, target) {
                self.set_unit_pin_data(&unit_id, kind, &unit_pin_id, data);
            }
        }
    }

    /// Empties a plug slot, keeping the slot itself.
    fn unplug_pin(&mut self, io: IO, pin_id: &str, sub_pin_id: &str) {
        if let Some(pin) = self.spec_mut().pins_mut(io).get_mut(pin_id) {
            if let Some(plug) = pin.plug.get_mut(sub_pin_id) {
                *plug = PlugSpec::empty();
            }
        }
    }

    /// Flags a boundary pin constant.
    fn set_pin_constant(&mut self, io: IO, pin_id: &str, constant: bool) {
        if let Some(pin) = self.spec_mut().pins_mut(io).get_mut(pin_id) {
            pin.constant = constant;
        }
    }

    /// Sets a boundary pin's literal data.
    fn set_pin_data(&mut self, io: IO, pin_id: &str, data: String) {
        if let Some(pin) = self.spec_mut().pins_mut(io).get_mut(pin_id) {
            pin.data = Some(data);
        }
    }

    /// Flags a unit pin constant.
    fn set_unit_pin_constant(&mut self, unit_id: &str, io: IO, pin_id: &str, constant: bool) {
        if let Some(unit) = self.spec_mut().units.get_mut(unit_id) {
            unit.pin_mut(io, pin_id).constant = constant;
        }
    }

    /// Flags a unit pin ignored.
    fn set_unit_pin_ignored(&mut self, unit_id: &str, io: IO, pin_id: &str, ignored: bool) {
        if let Some(unit) = self.spec_mut().units.get_mut(unit_id) {
            unit.pin_mut(io, pin_id).ignored = ignored;
        }
    }

    /// Sets a unit pin's literal data.
    fn set_unit_pin_data(&mut self, unit_id: &str, io: IO, pin_id: &str, data: String) {
        if let Some(unit) = self.spec_mut().units.get_mut(unit_id) {
            unit.pin_mut(io, pin_id).data = Some(data);
        }
    }

    /// Clears a unit pin's literal data.
    fn remove_unit_pin_data(&mut self, unit_id: &str, io: IO, pin_id: &str) {
        if let Some(unit) = self.spec_mut().units.get_mut(unit_id) {
            unit.pin_mut(io, pin_id).data = None;
        }
    }

    /// Re-parents `child` in the component tree: under `parent` at `index`,
    /// or at the root when `parent` is `None`.
    fn move_root(&mut self, parent: Option<&str>, child: &str, index: usize) {
        let child: SmolStr = child.into();
        let spec = self.spec_mut();
        for sub in spec.component.sub_components.values_mut() {
            sub.children.retain(|c| c != &child);
        }
        spec.component.children.retain(|c| c != &child);
        match parent {
            Some(parent) => {
                let sub = spec
                    .component
                    .sub_components
                    .entry(parent.into())
                    .or_default();
                let index = index.min(sub.children.len());
                sub.children.insert(index, child.clone());
                spec.component.sub_components.entry(child).or_default();
            }
            None => {
                let index = index.min(spec.component.children.len());
                spec.component.children.insert(index, child.clone());
                spec.component.sub_components.entry(child).or_default();
            }
        }
    }

    /// Records the parent slot a sub-component renders into.
    fn set_slot(&mut self, unit_id: &str, slot: impl Into<SmolStr>) {
        self.spec_mut()
            .component
            .sub_components
            .entry(unit_id.into())
            .or_default()
            .slot = Some(slot.into());
    }

    /// Records the explicit size of a sub-component.
    fn set_unit_size(&mut self, unit_id: &str, width: f64, height: f64) {
        let sub = self
            .spec_mut()
            .component
            .sub_components
            .entry(unit_id.into())
            .or_default();
        sub.width = Some(width);
        sub.height = Some(height);
    }
}

/// A graph spec paired with the registry it resolves against.
#[derive(Clone, Debug)]
pub struct Graph {
    spec: GraphSpec,
    registry: Arc<SpecRegistry>,
}

impl Graph {
    /// Wraps an existing spec.
    #[must_use]
    pub fn new(spec: GraphSpec, registry: Arc<SpecRegistry>) -> Self {
        Self { spec, registry }
    }

    /// An empty graph with the given id.
    #[must_use]
    pub fn empty(id: impl Into<SmolStr>, registry: Arc<SpecRegistry>) -> Self {
        Self::new(GraphSpec::new(id), registry)
    }

    /// Consumes the graph, returning its spec.
    #[must_use]
    pub fn into_spec(self) -> GraphSpec {
        self.spec
    }
}

impl GraphView for Graph {
    fn spec(&self) -> &GraphSpec {
        &self.spec
    }

    fn registry(&self) -> &SpecRegistry {
        &self.registry
    }
}

impl GraphMut for Graph {
    fn spec_mut(&mut self) -> &mut GraphSpec {
        &mut self.spec
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::registry::{PinDecl, SpecDecl};

    fn registry() -> Arc<SpecRegistry> {
        let mut registry = SpecRegistry::new();
        registry.insert(
            "add",
            SpecDecl {
                name: "add".into(),
                ty: "`U`".into(),
                inputs: [
                    ("a".into(), PinDecl::default()),
                    ("b".into(), PinDecl::default()),
                ]
                .into_iter()
                .collect(),
                outputs: [("a + b".into(), PinDecl::default())].into_iter().collect(),
            },
        );
        Arc::new(registry)
    }

    #[test]
    fn unit_pin_names_union_declaration_and_instance() {
        let mut graph = Graph::empty("g", registry());
        let mut unit = UnitSpec::new("add");
        unit.pin_mut(IO::Input, "extra").constant = true;
        graph.add_unit("u", unit);

        let names: Vec<_> = graph
            .unit_pin_names("u", IO::Input)
            .iter()
            .map(SmolStr::to_string)
            .collect();
        assert_eq!(names, vec!["a", "b", "extra"]);
        assert!(graph.has_unit_pin_named("u", IO::Output, "a + b"));
    }

    #[test]
    fn remove_unit_scrubs_merges_and_component_tree() {
        let mut graph = Graph::empty("g", registry());
        graph.add_unit("u", UnitSpec::new("add"));
        graph.add_unit("v", UnitSpec::new("add"));
        let mut merge = MergeSpec::new();
        merge.add("u", IO::Output, "a + b");
        merge.add("v", IO::Input, "a");
        graph.add_merge(merge, "m");
        graph.move_root(None, "u", 0);

        let removed = graph.remove_unit("u");
        assert!(removed.is_some());
        assert!(graph.has_merge("m"));
        assert!(!graph.merge_spec("m").unwrap().has("u", IO::Output, "a + b"));
        assert!(graph.spec().component.children.is_empty());

        graph.remove_unit("v");
        assert!(!graph.has_merge("m"));
    }

    #[test]
    fn merge_data_comes_from_first_constant_member() {
        let mut graph = Graph::empty("g", registry());
        let mut unit = UnitSpec::new("add");
        unit.pin_mut(IO::Input, "a").constant = true;
        unit.pin_mut(IO::Input, "a").data = Some("42".to_owned());
        graph.add_unit("u", unit);
        graph.add_merge(MergeSpec::single("u", IO::Input, "a"), "m");

        assert_eq!(graph.merge_data("m").as_deref(), Some("42"));
        assert_eq!(graph.merge_data("missing"), None);
    }

    #[test]
    fn expose_plug_cover_round_trip() {
        let mut graph = Graph::empty("g", registry());
        graph.add_unit("u", UnitSpec::new("add"));
        graph.expose_pin_set(
            IO::Input,
            "a",
            GraphPinSpec::with_plug("0", PlugSpec::unit("u", "a")),
            Some("1".to_owned()),
            true,
        );

        assert!(graph.has_pin_named(IO::Input, "a"));
        assert!(graph.has_plug(IO::Input, "a", "0"));
        assert_eq!(graph.pin_data(IO::Input, "a").as_deref(), Some("1"));
        // Propagation forwarded the data onto the plugged unit pin.
        assert_eq!(graph.unit_pin_data("u", IO::Input, "a").as_deref(), Some("1"));

        // Exposing again under the same name is a no-op.
        graph.expose_pin_set(IO::Input, "a", GraphPinSpec::default(), None, false);
        assert_eq!(graph.pin_plug_count(IO::Input, "a"), 1);

        graph.unplug_pin(IO::Input, "a", "0");
        assert!(graph.sub_pin_spec(IO::Input, "a", "0").is_some_and(PlugSpec::is_empty));

        let covered = graph.cover_pin_set(IO::Input, "a");
        assert!(covered.is_some());
        assert!(!graph.has_pin_named(IO::Input, "a"));
    }

    #[test]
    fn merge_membership_mutation() {
        let mut graph = Graph::empty("g", registry());
        graph.add_pin_to_merge("m", "u", IO::Input, "a");
        graph.add_pin_to_merge("m", "v", IO::Output, "a + b");
        assert!(graph.has_merge_pin("m", "u", IO::Input, "a"));

        graph.remove_pin_or_merge("m", "u", IO::Input, "a");
        assert!(graph.has_merge("m"));
        graph.remove_pin_or_merge("m", "v", IO::Output, "a + b");
        assert!(!graph.has_merge("m"));
    }

    #[test]
    fn move_root_reparents_once() {
        let mut graph = Graph::empty("g", registry());
        graph.add_unit("parent", UnitSpec::new("add"));
        graph.add_unit("child", UnitSpec::new("add"));
        graph.move_root(None, "parent", 0);
        graph.move_root(Some("parent"), "child", 0);
        graph.move_root(Some("parent"), "child", 5);

        let sub = &graph.spec().component.sub_components["parent"];
        assert_eq!(sub.children.len(), 1);
        assert!(!graph.spec().component.children.contains(&"child".into()));

        graph.set_slot("child", "body");
        graph.set_unit_size("child", 120.0, 90.0);
        let sub = &graph.spec().component.sub_components["child"];
        assert_eq!(sub.slot.as_deref(), Some("body"));
        assert_eq!(sub.width, Some(120.0));
    }

    #[test]
    fn unit_pin_flag_queries() {
        let mut graph = Graph::empty("g", registry());
        let mut unit = UnitSpec::new("add");
        unit.pin_mut(IO::Input, "b").r#ref = true;
        graph.add_unit("u", unit);

        graph.set_unit_pin_ignored("u", IO::Input, "a", true);
        assert!(graph.is_unit_pin_ignored("u", IO::Input, "a"));
        graph.set_unit_pin_ignored("u", IO::Input, "a", false);
        assert!(!graph.is_unit_pin_ignored("u", IO::Input, "a"));
        assert!(!graph.is_unit_pin_ignored("missing", IO::Input, "a"));

        // A merge is a ref merge as soon as one member pin carries a ref.
        graph.add_pin_to_merge("m", "u", IO::Input, "b");
        assert!(graph.is_ref_merge("m"));
        assert!(!graph.is_ref_merge("missing"));
    }
}
