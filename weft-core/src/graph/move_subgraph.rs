//! Relocation of a subgraph selection between two graphs.
//!
//! [`move_subgraph`] moves a selection of units, merges, link pins and
//! boundary plugs from a source graph into a target graph, rewiring both
//! boundaries so dataflow is preserved. The same plan drives both
//! directions: [`MoveDirection::Collapse`] moves the selection down into a
//! nested graph, [`MoveDirection::Expand`] moves it back up into the
//! enclosing one.
//!
//! The plan is precomputed by the caller and treated as ground truth; the
//! mover never invents ids. Every mutation is guarded, so replaying a move
//! that already happened leaves both graphs untouched.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{GraphMut, GraphView};
use crate::spec::{
    Dict, GraphPinSpec, IO, IoOf, MergeSpec, PlugSpec, SELF, UnitSpec, is_self_pin,
};

/// Which way the selection travels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    /// Down into the nested graph.
    Collapse,
    /// Up into the enclosing graph.
    Expand,
}

impl MoveDirection {
    /// Whether this is the upward direction.
    #[must_use]
    pub fn is_expand(self) -> bool {
        matches!(self, MoveDirection::Expand)
    }
}

/// A unit pin inside the selection whose merge stays behind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkPin {
    /// Owning unit.
    pub unit_id: SmolStr,
    /// Pin side.
    pub io: IO,
    /// Pin id.
    pub pin_id: SmolStr,
}

/// Address of one boundary plug slot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlugRef {
    /// Exposed side.
    pub io: IO,
    /// Exposed pin id.
    pub pin_id: SmolStr,
    /// Plug slot id.
    pub sub_pin_id: SmolStr,
}

/// The selection to move.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveNodeIds {
    /// Units to move.
    #[serde(default)]
    pub unit: Vec<SmolStr>,
    /// Merges to move.
    #[serde(default)]
    pub merge: Vec<SmolStr>,
    /// Link pins crossing the selection boundary.
    #[serde(default)]
    pub link: Vec<LinkPin>,
    /// Boundary plugs to move.
    #[serde(default)]
    pub plug: Vec<PlugRef>,
}

/// Rewiring decision for one link pin: the merge that bridges the cut and
/// the boundary pin exposed opposite it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NextLink {
    /// Bridging merge id on the source side.
    #[serde(default)]
    pub merge_id: Option<SmolStr>,
    /// Boundary pin exposed on the opposite side of the cut.
    #[serde(default)]
    pub opposite_pin_id: Option<SmolStr>,
}

/// Rewiring decision for one moved boundary plug.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NextPlug {
    /// Side the plug lands on, when it changes.
    #[serde(default)]
    pub io: Option<IO>,
    /// Slot id the plug lands in, when it changes.
    #[serde(default)]
    pub sub_pin_id: Option<SmolStr>,
    /// Merge to re-join on the source side.
    #[serde(default)]
    pub merge_id: Option<SmolStr>,
    /// The source keeps a template plug pointing at the moved graph.
    #[serde(default)]
    pub template: bool,
}

/// Id translation tables for every moved entity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NextIdMap {
    /// Unit renames.
    #[serde(default)]
    pub unit: Dict<SmolStr>,
    /// Merge renames.
    #[serde(default)]
    pub merge: Dict<SmolStr>,
    /// Link pin decisions, by unit id then pin.
    #[serde(default)]
    pub link: Dict<IoOf<Dict<NextLink>>>,
    /// Plug decisions, by side, pin, then slot.
    #[serde(default)]
    pub plug: IoOf<Dict<Dict<NextPlug>>>,
}

/// A plug that should follow a moved unit pin onto the target boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NextPinPlug {
    /// Exposed side on the target.
    pub io: IO,
    /// Exposed pin id on the target.
    pub pin_id: SmolStr,
    /// Plug slot id.
    pub sub_pin_id: SmolStr,
    /// Side of the unit pin the plug binds, when it differs.
    #[serde(default)]
    pub kind: Option<IO>,
}

/// Rewiring decision for one moved unit pin.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NextUnitPin {
    /// Boundary pin the unit pin gets exposed as on the target.
    #[serde(default)]
    pub pin_id: Option<SmolStr>,
    /// Slot id of that exposure.
    #[serde(default)]
    pub sub_pin_id: Option<SmolStr>,
    /// Merge the pin belonged to.
    #[serde(default)]
    pub merge_id: Option<SmolStr>,
    /// Snapshot of that merge.
    #[serde(default)]
    pub merge: Option<MergeSpec>,
    /// Plug that should follow the pin.
    #[serde(default)]
    pub plug: Option<NextPinPlug>,
}

/// Rewiring decision for one side of a moved merge.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NextMergePin {
    /// Bridging merge id on the source side.
    #[serde(default)]
    pub merge_id: Option<SmolStr>,
    /// Boundary pin the merge gets exposed as on the target.
    #[serde(default)]
    pub pin_id: Option<SmolStr>,
    /// Plug binding for that exposure.
    #[serde(default)]
    pub sub_pin_spec: Option<PlugSpec>,
    /// Snapshot of the merge left on the opposite side of the cut.
    #[serde(default)]
    pub opposite_merge: Option<MergeSpec>,
}

/// A boundary pin of the moved graph a unit pin should connect to.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectPlug {
    /// Exposed pin id.
    pub pin_id: SmolStr,
    /// Plug slot id.
    pub sub_pin_id: SmolStr,
}

/// How the moved graph's node connects inside the enclosing graph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitConnect {
    /// Merges the moved graph's own pins participate in.
    #[serde(default)]
    pub merges: Dict<MergeSpec>,
    /// Boundary plugs of the moved graph, by the unit pin they carry.
    #[serde(default)]
    pub plugs: IoOf<Dict<ConnectPlug>>,
}

/// The full precomputed move plan.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MovePlan {
    /// The selection.
    #[serde(default)]
    pub node_ids: MoveNodeIds,
    /// Id translations.
    #[serde(default)]
    pub next_id_map: NextIdMap,
    /// Unit pin decisions, by unit id.
    #[serde(default)]
    pub next_pin_id_map: Dict<IoOf<Dict<NextUnitPin>>>,
    /// Merge decisions, by merge id, one per side.
    #[serde(default)]
    pub next_merge_pin_id: Dict<IoOf<Option<NextMergePin>>>,
    /// Replacement plug bindings, by side, pin, then slot.
    #[serde(default)]
    pub next_plug_spec: IoOf<Dict<Dict<PlugSpec>>>,
    /// New sub-component parent per moved unit.
    #[serde(default)]
    pub next_sub_component_parent: Dict<SmolStr>,
    /// New sub-component children per moved unit.
    #[serde(default)]
    pub next_sub_component_children: Dict<Vec<SmolStr>>,
    /// Restored slot per moved unit.
    #[serde(default)]
    pub next_sub_component_slot: Dict<SmolStr>,
}

/// Moves the planned selection from `source` into `target`.
///
/// `graph_id` is the id under which the moved graph appears as a unit
/// inside the enclosing graph; boundary merges reference it as a pin
/// owner. Order of phases is fixed: link pins, units, merges, plugs.
pub fn move_subgraph<S, T>(
    source: &mut S,
    target: &mut T,
    graph_id: &str,
    plan: &MovePlan,
    connect: &UnitConnect,
    direction: MoveDirection,
) where
    S: GraphMut + ?Sized,
    T: GraphMut + ?Sized,
{
    let pin_specs = IoOf {
        input: source.pin_specs(IO::Input).clone(),
        output: source.pin_specs(IO::Output).clone(),
    };
    let merge_specs = source.merges().clone();
    let merge_data: Dict<Option<String>> = plan
        .node_ids
        .merge
        .iter()
        .map(|merge_id| (merge_id.clone(), source.merge_data(merge_id)))
        .collect();

    let ignored_unit: IndexSet<SmolStr> = plan.node_ids.unit.iter().cloned().collect();
    let ignored_merge: IndexSet<SmolStr> = plan.node_ids.merge.iter().cloned().collect();

    // Pins handled by the merge phase or by a moved plug are ignored by
    // the unit phase.
    let mut ignored_unit_pin: Dict<IoOf<IndexSet<SmolStr>>> = Dict::default();
    for link in &plan.node_ids.link {
        if let Some(plug_ref) =
            find_unit_pin_plug(&pin_specs, &link.unit_id, link.io, &link.pin_id)
        {
            if !plan.node_ids.plug.contains(&plug_ref) {
                continue;
            }
        }
        ignored_unit_pin
            .entry(link.unit_id.clone())
            .or_default()[link.io]
            .insert(link.pin_id.clone());
    }
    for merge_id in &plan.node_ids.merge {
        let Some(merge) = merge_specs.get(merge_id) else {
            continue;
        };
        for (unit_id, io, pin_id) in merge.pins() {
            ignored_unit_pin
                .entry(unit_id.clone())
                .or_default()[io]
                .insert(pin_id.clone());
        }
    }

    for link in &plan.node_ids.link {
        let next = plan
            .next_id_map
            .link
            .get(&link.unit_id)
            .and_then(|pins| pins[link.io].get(&link.pin_id));
        let merge_ref = next
            .and_then(|n| n.merge_id.as_deref())
            .is_some_and(|merge_id| source.is_ref_merge(merge_id));
        move_link_pin_into(
            source,
            target,
            graph_id,
            &link.unit_id,
            link.io,
            &link.pin_id,
            None,
            merge_ref,
            plan,
            next.and_then(|n| n.merge_id.as_deref()),
            next.and_then(|n| n.opposite_pin_id.as_deref()),
            None,
            &ignored_unit,
            direction,
        );
    }

    for unit_id in &plan.node_ids.unit {
        let ignored_pins = ignored_unit_pin.get(unit_id).cloned().unwrap_or_default();
        move_unit(
            source,
            target,
            graph_id,
            unit_id,
            plan,
            connect,
            &ignored_pins,
            &ignored_merge,
            &pin_specs,
            direction,
        );
    }

    for merge_id in &plan.node_ids.merge {
        let merge_spec = merge_specs.get(merge_id).cloned().unwrap_or_default();
        let data = merge_data.get(merge_id).cloned().flatten();
        move_merge(
            source,
            target,
            graph_id,
            merge_id,
            &merge_spec,
            data,
            plan,
            connect,
            &ignored_unit,
            &pin_specs,
            direction,
        );
    }

    for plug_ref in &plan.node_ids.plug {
        let pin_spec = pin_specs[plug_ref.io].get(&plug_ref.pin_id).cloned();
        let sub_pin_spec = pin_spec
            .as_ref()
            .and_then(|pin| pin.plug.get(&plug_ref.sub_pin_id))
            .cloned();
        move_plug(
            source,
            target,
            graph_id,
            plug_ref.io,
            &plug_ref.pin_id,
            pin_spec.as_ref(),
            &plug_ref.sub_pin_id,
            sub_pin_spec.as_ref(),
            plan,
        );
    }
}

/// The boundary plug (if any) bound to the given unit pin.
fn find_unit_pin_plug(
    pin_specs: &IoOf<Dict<GraphPinSpec>>,
    unit_id: &str,
    io: IO,
    pin_id: &str,
) -> Option<PlugRef> {
    for side in IO::BOTH {
        for (exposed_id, pin_spec) in &pin_specs[side] {
            for (sub_pin_id, plug) in &pin_spec.plug {
                if plug.binds_unit_pin(unit_id, pin_id) && plug.kind_or(side) == io {
                    return Some(PlugRef {
                        io: side,
                        pin_id: exposed_id.clone(),
                        sub_pin_id: sub_pin_id.clone(),
                    });
                }
            }
        }
    }
    None
}

struct UnitMove<'a> {
    graph_id: &'a str,
    unit_id: &'a str,
    next_unit_id: &'a SmolStr,
    unit: &'a UnitSpec,
    pin_map: &'a IoOf<Dict<NextUnitPin>>,
    ignored_pins: &'a IoOf<IndexSet<SmolStr>>,
    ignored_merge: &'a IndexSet<SmolStr>,
    pin_specs: &'a IoOf<Dict<GraphPinSpec>>,
    connect: &'a UnitConnect,
    direction: MoveDirection,
}

/// Moves one unit from `source` into `target`, re-exposing or re-merging
/// each of its pins per the plan.
pub fn move_unit<S, T>(
    source: &mut S,
    target: &mut T,
    graph_id: &str,
    unit_id: &str,
    plan: &MovePlan,
    connect: &UnitConnect,
    ignored_pins: &IoOf<IndexSet<SmolStr>>,
    ignored_merge: &IndexSet<SmolStr>,
    pin_specs: &IoOf<Dict<GraphPinSpec>>,
    direction: MoveDirection,
) where
    S: GraphMut + ?Sized,
    T: GraphMut + ?Sized,
{
    let next_unit_id: SmolStr = plan
        .next_id_map
        .unit
        .get(unit_id)
        .cloned()
        .unwrap_or_else(|| unit_id.into());
    let empty_pin_map = IoOf::default();
    let pin_map = plan.next_pin_id_map.get(unit_id).unwrap_or(&empty_pin_map);

    let Some(unit) = source.unit(unit_id).cloned() else {
        return;
    };
    let input_names = source.unit_pin_names(unit_id, IO::Input);
    let output_names = source.unit_pin_names(unit_id, IO::Output);
    let was_sub_component = source
        .spec()
        .component
        .sub_components
        .contains_key(unit_id);

    source.remove_unit(unit_id);
    if !target.has_unit(&next_unit_id) {
        target.add_unit(next_unit_id.clone(), unit.clone());
    }

    if let Some(parent_id) = plan.next_sub_component_parent.get(unit_id) {
        if target.has_unit(parent_id) {
            let to = plan
                .next_sub_component_children
                .get(parent_id)
                .and_then(|children| children.iter().position(|c| c == &next_unit_id))
                .unwrap_or_else(|| {
                    target
                        .spec()
                        .component
                        .sub_components
                        .get(parent_id)
                        .map_or(0, |sub| sub.children.len())
                });
            target.move_root(Some(parent_id.as_str()), &next_unit_id, to);
        }
    }
    if let Some(children) = plan.next_sub_component_children.get(unit_id) {
        for (i, child) in children.iter().enumerate() {
            if target.has_unit(child) {
                target.move_root(Some(next_unit_id.as_str()), child, i);
            }
        }
    }
    if let Some(slot) = plan.next_sub_component_slot.get(unit_id) {
        target.set_slot(&next_unit_id, slot.clone());
    }
    if was_sub_component {
        if let Some(size) = unit.metadata.component {
            target.set_unit_size(&next_unit_id, size.width, size.height);
        }
    }

    let ctx = UnitMove {
        graph_id,
        unit_id,
        next_unit_id: &next_unit_id,
        unit: &unit,
        pin_map,
        ignored_pins,
        ignored_merge,
        pin_specs,
        connect,
        direction,
    };
    for pin_id in &input_names {
        move_unit_pin(source, target, &ctx, IO::Input, pin_id);
    }
    for pin_id in &output_names {
        move_unit_pin(source, target, &ctx, IO::Output, pin_id);
    }
    move_unit_pin(source, target, &ctx, IO::Output, SELF);
}

fn move_unit_pin<S, T>(source: &mut S, target: &mut T, ctx: &UnitMove<'_>, io: IO, pin_id: &str)
where
    S: GraphMut + ?Sized,
    T: GraphMut + ?Sized,
{
    let expand = ctx.direction.is_expand();
    let next = ctx.pin_map[io].get(pin_id);
    let next_pin_id = next.and_then(|n| n.pin_id.as_ref());
    let next_sub_pin_id = next.and_then(|n| n.sub_pin_id.as_ref());
    let merge_id = next.and_then(|n| n.merge_id.as_ref());
    let merge = next.and_then(|n| n.merge.as_ref());
    let next_plug = next.and_then(|n| n.plug.as_ref());

    if !ctx.ignored_pins[io].contains(pin_id) && !ctx.unit.is_pin_ignored(io, pin_id) {
        let should_swap =
            merge_id.is_some_and(|mid| !ctx.ignored_merge.contains(mid.as_str()) || expand);

        if !expand {
            let stays_named = next_pin_id.is_some_and(|p| target.has_pin_named(io, p));
            if !stays_named {
                // The pin leaves without a boundary exposure; detach any
                // source plug still referencing it.
                for side in IO::BOTH {
                    for (exposed_id, pin_spec) in &ctx.pin_specs[side] {
                        for (sub_pin_id, plug) in &pin_spec.plug {
                            if plug.binds_unit_pin(ctx.unit_id, pin_id)
                                && plug.kind_or(side) == io
                            {
                                source.unplug_pin(side, exposed_id, sub_pin_id);
                                break;
                            }
                        }
                    }
                }
            }
        }

        if let (Some(next_pin_id), Some(next_sub_pin_id)) = (next_pin_id, next_sub_pin_id) {
            if expand {
                if let Some(mid) = merge_id {
                    if target.has_merge_pin(mid, ctx.graph_id, io, next_pin_id) {
                        target.remove_pin_or_merge(mid, ctx.graph_id, io, next_pin_id);
                    }
                }
                if let Some(cp) = ctx.connect.plugs[io].get(pin_id) {
                    if &cp.pin_id == next_pin_id {
                        let propagate = is_self_pin(io, pin_id);
                        let plug = PlugSpec::unit(ctx.next_unit_id.clone(), pin_id);
                        if target.has_pin_named(io, &cp.pin_id) {
                            if target.has_plug(io, &cp.pin_id, &cp.sub_pin_id) {
                                target.unplug_pin(io, &cp.pin_id, &cp.sub_pin_id);
                            }
                            target.plug_pin(
                                io,
                                &cp.pin_id,
                                cp.sub_pin_id.clone(),
                                plug,
                                None,
                                propagate,
                            );
                        } else {
                            target.expose_pin_set(
                                io,
                                cp.pin_id.clone(),
                                GraphPinSpec::with_plug(cp.sub_pin_id.clone(), plug),
                                None,
                                propagate,
                            );
                        }
                    }
                }
                // A constant that climbed onto the boundary exposure goes
                // back down onto the unit pin.
                if let Some(pin_spec) = ctx.pin_specs[io].get(next_pin_id.as_str()) {
                    if pin_spec.constant {
                        target.set_unit_pin_constant(ctx.next_unit_id, io, pin_id, true);
                        if let Some(data) = pin_spec.data.clone() {
                            target.set_unit_pin_data(ctx.next_unit_id, io, pin_id, data);
                        }
                        if source.has_pin_named(io, next_pin_id) {
                            source.set_pin_constant(io, next_pin_id, false);
                        }
                    }
                }
            } else {
                let propagate = is_self_pin(io, pin_id);
                if target.has_pin_named(io, next_pin_id) {
                    target.expose_pin(
                        io,
                        next_pin_id.clone(),
                        next_sub_pin_id.clone(),
                        PlugSpec::unit(ctx.next_unit_id.clone(), pin_id),
                    );
                } else {
                    let mut pin_spec = GraphPinSpec::with_plug(
                        next_sub_pin_id.clone(),
                        PlugSpec::unit(ctx.next_unit_id.clone(), pin_id),
                    );
                    pin_spec.r#ref = ctx.unit.is_pin_ref(io, pin_id);
                    let data = ctx.unit.pin_data(io, pin_id).map(str::to_owned);
                    target.expose_pin_set(io, next_pin_id.clone(), pin_spec, data, false);
                    // Re-aim source plugs that referenced the moved pin at
                    // the new boundary exposure.
                    for (exposed_id, pin_spec) in &ctx.pin_specs[io] {
                        for (sub_pin_id, plug) in &pin_spec.plug {
                            if plug.binds_unit_pin(ctx.unit_id, pin_id) {
                                source.plug_pin(
                                    io,
                                    exposed_id,
                                    sub_pin_id.clone(),
                                    PlugSpec::unit(ctx.graph_id, next_pin_id.clone()),
                                    None,
                                    propagate,
                                );
                                break;
                            }
                        }
                    }
                }
                // A constant on the moved pin becomes a constant on the
                // boundary exposure.
                if ctx.unit.is_pin_constant(io, pin_id) {
                    let data = ctx.unit.pin_data(io, pin_id).map(str::to_owned);
                    target.set_unit_pin_constant(ctx.next_unit_id, io, pin_id, false);
                    target.set_pin_constant(io, next_pin_id, true);
                    if let Some(data) = data {
                        target.remove_unit_pin_data(ctx.next_unit_id, io, pin_id);
                        target.set_pin_data(io, next_pin_id, data);
                    }
                }
            }

            if should_swap {
                if let Some(mid) = merge_id {
                    if expand {
                        if target.has_merge_pin(mid, ctx.graph_id, io, pin_id) {
                            target.remove_pin_or_merge(mid, ctx.graph_id, io, pin_id);
                        }
                        if !target.has_merge(mid) {
                            target.add_merge(merge.cloned().unwrap_or_default(), mid.clone());
                        }
                        if !target.has_merge_pin(mid, ctx.next_unit_id, io, pin_id) {
                            target.add_pin_to_merge(
                                mid.clone(),
                                ctx.next_unit_id.clone(),
                                io,
                                pin_id,
                            );
                        }
                    } else {
                        if !source.has_merge(mid) {
                            source.add_merge(MergeSpec::new(), mid.clone());
                        }
                        if let Some(merge) = merge {
                            for (u, t, p) in merge.pins() {
                                if source.has_unit(u) && !source.has_merge_pin(mid, u, t, p) {
                                    source.add_pin_to_merge(mid.clone(), u.clone(), t, p.clone());
                                }
                            }
                        }
                        if !source.has_merge_pin(mid, ctx.graph_id, io, next_pin_id) {
                            source.add_pin_to_merge(
                                mid.clone(),
                                ctx.graph_id,
                                io,
                                next_pin_id.clone(),
                            );
                        }
                    }
                }
            }
        }
    }

    // A moved plug follows the pin even when the pin itself is ignored.
    if let Some(plug) = next_plug {
        let kind = plug.kind.unwrap_or(io);
        let bound = PlugSpec::unit_kind(ctx.next_unit_id.clone(), pin_id, Some(kind));
        if expand {
            if target.has_plug(plug.io, &plug.pin_id, &plug.sub_pin_id) {
                let propagate = is_self_pin(kind, pin_id);
                let pin_spec = target
                    .exposed_pin_spec(plug.io, &plug.pin_id)
                    .cloned()
                    .unwrap_or_default();
                let slot = pin_spec
                    .plug
                    .get(&plug.sub_pin_id)
                    .cloned()
                    .unwrap_or_default();
                let already_own = slot.unit_id.as_deref() == Some(ctx.graph_id)
                    && slot.pin_id.as_ref() == Some(&plug.pin_id)
                    && slot.kind_or(plug.io) == plug.io;
                if already_own {
                    target.plug_pin(
                        plug.io,
                        &plug.pin_id,
                        plug.sub_pin_id.clone(),
                        bound,
                        None,
                        propagate,
                    );
                } else if slot.unit_id.is_some() || slot.merge_id.is_some() {
                    // The slot is taken by a foreign binding; open a fresh
                    // ordinal slot instead.
                    let mut i = 0usize;
                    let fresh = loop {
                        let candidate = SmolStr::new(i.to_string());
                        if !pin_spec.plug.contains_key(&candidate) {
                            break candidate;
                        }
                        i += 1;
                    };
                    target.expose_pin(plug.io, plug.pin_id.clone(), fresh, bound);
                } else {
                    target.plug_pin(
                        plug.io,
                        &plug.pin_id,
                        plug.sub_pin_id.clone(),
                        bound,
                        None,
                        propagate,
                    );
                }
            }
        } else if target.has_plug(plug.io, &plug.pin_id, &plug.sub_pin_id) {
            target.plug_pin(
                plug.io,
                &plug.pin_id,
                plug.sub_pin_id.clone(),
                bound,
                None,
                false,
            );
        }
    }
}

/// Moves one selection-boundary link pin: bridges the cut with a merge on
/// the source side and a boundary exposure on the target side.
#[allow(clippy::too_many_arguments)]
pub fn move_link_pin_into<S, T>(
    source: &mut S,
    target: &mut T,
    graph_id: &str,
    unit_id: &str,
    io: IO,
    pin_id: &str,
    data: Option<String>,
    merge_ref: bool,
    plan: &MovePlan,
    opposite_merge_id: Option<&str>,
    opposite_pin_id: Option<&str>,
    plug_pin_spec: Option<&ConnectPlug>,
    ignored_unit: &IndexSet<SmolStr>,
    direction: MoveDirection,
) where
    S: GraphMut + ?Sized,
    T: GraphMut + ?Sized,
{
    let expand = direction.is_expand();
    if ignored_unit.contains(unit_id) && graph_id != unit_id {
        return;
    }
    let next = plan
        .next_pin_id_map
        .get(unit_id)
        .and_then(|pins| pins[io].get(pin_id));
    let merge_id = next.and_then(|n| n.merge_id.as_ref());
    let merge = next.and_then(|n| n.merge.as_ref());

    if graph_id == unit_id {
        // The pin is the moved graph's own boundary pin.
        if !expand {
            let constant = target.is_pin_constant(io, pin_id);
            let pin_spec = target
                .exposed_pin_spec(io, pin_id)
                .cloned()
                .unwrap_or_default();
            let keeps_external_members = merge_id.is_some()
                && merge.is_some_and(|m| m.pin_count() > m.unit_pin_count(unit_id));
            if !keeps_external_members {
                target.cover_pin_set(io, pin_id);
            }
            if constant {
                // Constants fan out onto every pin the exposure fed.
                for plug in pin_spec.plug.values() {
                    if let (Some(u), Some(p)) = (&plug.unit_id, &plug.pin_id) {
                        target.set_unit_pin_constant(u, plug.kind_or(io), p, true);
                    } else if let Some(mid) = &plug.merge_id {
                        if let Some(members) = target.merge_spec(mid).cloned() {
                            for (u, t, p) in members.pins() {
                                target.set_unit_pin_constant(u, t, p, true);
                            }
                        }
                    }
                }
            }
        }
        return;
    }

    if let (Some(opposite_merge_id), Some(opposite_pin_id)) = (opposite_merge_id, opposite_pin_id)
    {
        let opposite_io = io.opposite();
        if expand {
            if source.has_pin_named(opposite_io, opposite_pin_id) {
                source.cover_pin_set(opposite_io, opposite_pin_id);
            }
        } else {
            if !target.has_pin_named(opposite_io, opposite_pin_id) {
                let data = data.or_else(|| source.unit_pin_data(unit_id, io, pin_id));
                let mut pin = GraphPinSpec::with_plug("0", PlugSpec::empty());
                // A merge that carries a reference re-exposes as a ref pin.
                pin.r#ref = merge_ref || source.is_unit_pin_ref(unit_id, io, pin_id);
                target.expose_pin_set(opposite_io, opposite_pin_id, pin, data, false);
            }
            if source.has_merge(opposite_merge_id) {
                if !source.has_merge_pin(opposite_merge_id, graph_id, opposite_io, opposite_pin_id)
                {
                    source.add_pin_to_merge(
                        opposite_merge_id,
                        graph_id,
                        opposite_io,
                        opposite_pin_id,
                    );
                }
                if !source.has_merge_pin(opposite_merge_id, unit_id, io, pin_id) {
                    source.add_pin_to_merge(opposite_merge_id, unit_id, io, pin_id);
                }
            } else {
                let mut bridge = MergeSpec::new();
                bridge.add(unit_id, io, pin_id);
                bridge.add(graph_id, opposite_io, opposite_pin_id);
                source.add_merge(bridge, opposite_merge_id);
            }
        }
    }

    if let Some(cp) = plug_pin_spec {
        let plug = if graph_id == unit_id {
            PlugSpec::empty()
        } else {
            PlugSpec::unit(unit_id, pin_id)
        };
        target.expose_pin_set(
            io,
            cp.pin_id.clone(),
            GraphPinSpec::with_plug("0", plug),
            None,
            false,
        );
        source.plug_pin(
            io,
            &cp.pin_id,
            cp.sub_pin_id.clone(),
            PlugSpec::unit(graph_id, cp.pin_id.clone()),
            None,
            false,
        );
    }
}

/// Moves one merge: relocates its internal members, bridges external ones,
/// and reconciles boundary plugs that referenced it.
#[allow(clippy::too_many_arguments)]
pub fn move_merge<S, T>(
    source: &mut S,
    target: &mut T,
    graph_id: &str,
    merge_id: &str,
    merge_spec: &MergeSpec,
    data: Option<String>,
    plan: &MovePlan,
    connect: &UnitConnect,
    ignored_unit: &IndexSet<SmolStr>,
    pin_specs: &IoOf<Dict<GraphPinSpec>>,
    direction: MoveDirection,
) where
    S: GraphMut + ?Sized,
    T: GraphMut + ?Sized,
{
    let expand = direction.is_expand();
    let next_merge_id: SmolStr = plan
        .next_id_map
        .merge
        .get(merge_id)
        .cloned()
        .unwrap_or_else(|| merge_id.into());
    let sides = plan.next_merge_pin_id.get(merge_id);
    let next_input = sides.and_then(|s| s.input.as_ref());
    let next_output = sides.and_then(|s| s.output.as_ref());

    let source_merge = source.merge_spec(merge_id).cloned();
    let merge_ref = source.is_ref_merge(merge_id);
    let merge_pin_count = merge_spec.pin_count();
    let merge_input_count = merge_spec.io_pin_count(IO::Input);
    let merge_output_count = merge_spec.io_pin_count(IO::Output);
    let mut next_merge = MergeSpec::new();
    let mut pin_into_count = 0usize;

    source.remove_merge(merge_id);

    for (unit_id, io, pin_id) in merge_spec.pins() {
        let next_unit_id: SmolStr = plan
            .next_id_map
            .unit
            .get(unit_id)
            .cloned()
            .unwrap_or_else(|| unit_id.clone());
        if unit_id.as_str() == graph_id && !ignored_unit.contains(unit_id.as_str()) {
            // The moved graph's own boundary pin folds into the merge as
            // whatever it was plugged to.
            if let Some(pin_spec) = target.exposed_pin_spec(io, pin_id).cloned() {
                for plug in pin_spec.plug.values() {
                    if let (Some(u), Some(p)) = (&plug.unit_id, &plug.pin_id) {
                        next_merge.add(u.clone(), plug.kind_or(io), p.clone());
                    } else if let Some(mid) = &plug.merge_id {
                        if let Some(inner) = target.merge_spec(mid).cloned() {
                            for (u, t, p) in inner.pins() {
                                next_merge.add(u.clone(), t, p.clone());
                            }
                        }
                    }
                }
            }
            pin_into_count += 1;
        } else if ignored_unit.contains(unit_id.as_str()) {
            if target.has_unit(&next_unit_id) {
                next_merge.add(next_unit_id.clone(), io, pin_id.clone());
            }
            pin_into_count += 1;
        }
        let pick_input = io == IO::Output && !ignored_unit.contains(unit_id.as_str());
        let next_pin = if pick_input { next_input } else { next_output };
        move_link_pin_into(
            source,
            target,
            graph_id,
            unit_id,
            io,
            pin_id,
            data.clone(),
            merge_ref,
            plan,
            next_pin.and_then(|n| n.merge_id.as_deref()),
            next_pin.and_then(|n| n.pin_id.as_deref()),
            None,
            ignored_unit,
            direction,
        );
    }

    if expand {
        if merge_pin_count == 0 || pin_into_count > 1 {
            target.add_merge(next_merge, next_merge_id.clone());
        }
    } else if (pin_into_count == 0
        && (merge_pin_count == 0 || (merge_input_count > 0 && merge_output_count > 0)))
        || pin_into_count > 1
    {
        target.add_merge(next_merge, next_merge_id.clone());
        // A merge that only joined the graph's own boundary pins leaves
        // those exposures behind.
        if merge_spec.single_unit().map(SmolStr::as_str) == Some(graph_id) {
            for (_, io, pin_id) in merge_spec.pins() {
                if target.has_pin_named(io, pin_id) {
                    target.cover_pin_set(io, pin_id);
                }
            }
        }
    }

    if let Some(next_pin) = next_input {
        process_merge_pin(
            source,
            target,
            graph_id,
            merge_id,
            IO::Input,
            next_pin,
            data.as_deref(),
            merge_ref,
            plan,
            connect,
            ignored_unit,
            pin_specs,
            direction,
        );
    }
    if let Some(next_pin) = next_output {
        process_merge_pin(
            source,
            target,
            graph_id,
            merge_id,
            IO::Output,
            next_pin,
            data.as_deref(),
            merge_ref,
            plan,
            connect,
            ignored_unit,
            pin_specs,
            direction,
        );
    }

    // Boundary plugs that referenced the moved merge re-bind to whatever
    // replaced it (unless a moved plug already covers them).
    for io in IO::BOTH {
        for (pin_id, pin_spec) in &pin_specs[io] {
            if plan.next_plug_spec[io].contains_key(pin_id) {
                continue;
            }
            for (sub_pin_id, plug) in &pin_spec.plug {
                if plug.merge_id.as_deref() != Some(merge_id) {
                    continue;
                }
                let side = match io {
                    IO::Input => next_input,
                    IO::Output => next_output,
                };
                let opposite_merge_id = side.and_then(|s| s.merge_id.as_ref());
                let opposite_merge = side.and_then(|s| s.opposite_merge.as_ref());
                if expand {
                    if source_merge.as_ref().is_none_or(MergeSpec::is_empty) {
                        let exposed = target.pin_specs(io).clone();
                        for (t_pin, t_spec) in &exposed {
                            for (t_sub, t_plug) in &t_spec.plug {
                                if t_plug.unit_id.as_deref() == Some(graph_id)
                                    && t_plug.pin_id.as_ref() == Some(t_pin)
                                {
                                    target.unplug_pin(io, t_pin, t_sub);
                                    target.plug_pin(
                                        io,
                                        t_pin,
                                        t_sub.clone(),
                                        PlugSpec::merge(
                                            opposite_merge_id
                                                .cloned()
                                                .unwrap_or_else(|| SmolStr::new("0")),
                                        ),
                                        data.clone(),
                                        false,
                                    );
                                }
                            }
                        }
                    }
                    if let (Some(_), Some(opposite)) = (opposite_merge_id, opposite_merge) {
                        if target.has_merge(&next_merge_id) {
                            for (u, t, p) in opposite.pins() {
                                if u.as_str() != graph_id
                                    && !target.has_merge_pin(&next_merge_id, u, t, p)
                                {
                                    target.add_pin_to_merge(
                                        next_merge_id.clone(),
                                        u.clone(),
                                        t,
                                        p.clone(),
                                    );
                                }
                            }
                        } else {
                            target.add_merge(opposite.clone(), next_merge_id.clone());
                        }
                    }
                } else if source.has_plug(io, pin_id, sub_pin_id) {
                    let next_sub_spec = match opposite_merge_id {
                        Some(omid) => PlugSpec::merge(omid.clone()),
                        None => PlugSpec::unit(graph_id, pin_id.clone()),
                    };
                    let has_next_merge = target.has_merge(&next_merge_id);
                    let pin_data = source.pin_data(io, pin_id);
                    let target_plug = if has_next_merge {
                        PlugSpec::merge(next_merge_id.clone())
                    } else {
                        PlugSpec::empty()
                    };
                    if target.has_pin_named(io, pin_id) {
                        target.plug_pin(io, pin_id, sub_pin_id.clone(), target_plug, None, false);
                    } else {
                        target.expose_pin_set(
                            io,
                            pin_id.clone(),
                            GraphPinSpec::with_plug(sub_pin_id.clone(), target_plug),
                            pin_data,
                            false,
                        );
                    }
                    if source.has_pin_named(io, pin_id) {
                        source.unplug_pin(io, pin_id, sub_pin_id);
                        source.plug_pin(io, pin_id, sub_pin_id.clone(), next_sub_spec, None, false);
                    } else {
                        source.expose_pin_set(
                            io,
                            pin_id.clone(),
                            GraphPinSpec::with_plug(sub_pin_id.clone(), next_sub_spec),
                            None,
                            false,
                        );
                    }
                }
            }
        }
    }
}

fn first_pin(merge: &MergeSpec) -> Option<(SmolStr, IO, SmolStr)> {
    merge.pins().next().map(|(u, t, p)| (u.clone(), t, p.clone()))
}

#[allow(clippy::too_many_arguments)]
fn process_merge_pin<S, T>(
    source: &mut S,
    target: &mut T,
    graph_id: &str,
    merge_id: &str,
    io: IO,
    next_pin: &NextMergePin,
    data: Option<&str>,
    merge_ref: bool,
    plan: &MovePlan,
    connect: &UnitConnect,
    ignored_unit: &IndexSet<SmolStr>,
    pin_specs: &IoOf<Dict<GraphPinSpec>>,
    direction: MoveDirection,
) where
    S: GraphMut + ?Sized,
    T: GraphMut + ?Sized,
{
    let (Some(pin_id), Some(sub_pin_spec)) =
        (next_pin.pin_id.as_ref(), next_pin.sub_pin_spec.as_ref())
    else {
        return;
    };

    if direction.is_expand() {
        if let Some(mid) = next_pin.merge_id.as_ref() {
            // The bridging merge dissolves back into the original one.
            if target.has_merge_pin(mid, graph_id, io, pin_id) {
                target.remove_merge(mid);
            }
        }
        for (graph_merge_id, graph_merge) in &connect.merges {
            let Some(own) = graph_merge.0.get(graph_id) else {
                continue;
            };
            // A connect merge on the graph's self output carries the unit
            // reference, not a pin value; skip it and keep folding the rest.
            if own.output.contains(SELF) {
                continue;
            }
            for (own_io, own_pins) in own.iter() {
                for own_pin in own_pins {
                    if own_pin != pin_id {
                        continue;
                    }
                    let Some(pin_spec) = pin_specs[own_io].get(own_pin) else {
                        continue;
                    };
                    for plug in pin_spec.plug.values() {
                        if let Some(plug_merge_id) = &plug.merge_id {
                            let new_merge_id: SmolStr = plan
                                .next_id_map
                                .merge
                                .get(plug_merge_id)
                                .cloned()
                                .unwrap_or_else(|| plug_merge_id.clone());
                            let mut rest = graph_merge.clone();
                            rest.remove_unit(graph_id);
                            let Some((other_unit, other_io, other_pin)) = first_pin(&rest)
                            else {
                                continue;
                            };
                            if target.has_merge(&new_merge_id) {
                                for (u, t, p) in rest.pins() {
                                    if t != io
                                        && !target.has_merge_pin(&new_merge_id, u, t, p)
                                    {
                                        target.add_pin_to_merge(
                                            new_merge_id.clone(),
                                            u.clone(),
                                            t,
                                            p.clone(),
                                        );
                                    }
                                }
                            } else {
                                target.add_merge(
                                    MergeSpec::single(other_unit, other_io, other_pin),
                                    new_merge_id,
                                );
                            }
                        } else if let (Some(plug_unit), Some(plug_pin)) =
                            (&plug.unit_id, &plug.pin_id)
                        {
                            let new_unit_id: SmolStr = plan
                                .next_id_map
                                .unit
                                .get(plug_unit)
                                .cloned()
                                .unwrap_or_else(|| plug_unit.clone());
                            if target.has_merge(graph_merge_id) {
                                target.add_pin_to_merge(
                                    graph_merge_id.clone(),
                                    new_unit_id,
                                    own_io,
                                    plug_pin.clone(),
                                );
                            } else if let Some(opposite) = next_pin.opposite_merge.as_ref() {
                                let mut rest = opposite.clone();
                                rest.remove_unit(plug_unit);
                                if let Some((other_unit, other_io, other_pin)) = first_pin(&rest)
                                {
                                    let mut restored = MergeSpec::new();
                                    restored.add(new_unit_id, own_io, plug_pin.clone());
                                    restored.add(other_unit, other_io, other_pin);
                                    target.add_merge(restored, merge_id);
                                }
                            }
                        }
                    }
                }
            }
        }
    } else {
        if target.has_pin_named(io, pin_id) {
            if target.has_plug(io, pin_id, "0") {
                if !sub_pin_spec.is_empty() {
                    target.plug_pin(
                        io,
                        pin_id,
                        "0",
                        sub_pin_spec.clone(),
                        data.map(str::to_owned),
                        false,
                    );
                }
            } else {
                target.expose_pin(io, pin_id.clone(), "0", sub_pin_spec.clone());
            }
        } else {
            let mut pin = GraphPinSpec::with_plug("0", sub_pin_spec.clone());
            pin.r#ref = merge_ref;
            target.expose_pin_set(io, pin_id.clone(), pin, data.map(str::to_owned), false);
        }
        if let Some(mid) = next_pin.merge_id.as_ref() {
            if !source.has_merge(mid) {
                if let Some(opposite) = next_pin.opposite_merge.as_ref() {
                    let mut rest = opposite.clone();
                    if let Some(u) = sub_pin_spec.unit_id.as_ref() {
                        rest.remove_unit(u);
                    }
                    for unit_id in ignored_unit {
                        rest.remove_unit(unit_id);
                    }
                    if let Some((other_unit, other_io, other_pin)) = first_pin(&rest) {
                        let mut bridge = MergeSpec::new();
                        bridge.add(graph_id, io, pin_id.clone());
                        bridge.add(other_unit, other_io, other_pin);
                        source.add_merge(bridge, mid.clone());
                    }
                }
            }
        }
    }
}

/// Moves one boundary plug slot between the two graphs.
#[allow(clippy::too_many_arguments)]
pub fn move_plug<S, T>(
    source: &mut S,
    target: &mut T,
    graph_id: &str,
    io: IO,
    pin_id: &SmolStr,
    pin_spec: Option<&GraphPinSpec>,
    sub_pin_id: &SmolStr,
    sub_pin_spec: Option<&PlugSpec>,
    plan: &MovePlan,
) where
    S: GraphMut + ?Sized,
    T: GraphMut + ?Sized,
{
    let next_plug = plan.next_id_map.plug[io]
        .get(pin_id)
        .and_then(|slots| slots.get(sub_pin_id));
    let template = next_plug.is_some_and(|n| n.template);
    let next_io = next_plug.and_then(|n| n.io).unwrap_or(io);
    let next_sub_pin_id = next_plug
        .and_then(|n| n.sub_pin_id.clone())
        .unwrap_or_else(|| sub_pin_id.clone());

    let current = source.exposed_pin_spec(io, pin_id).cloned();
    let data = source.pin_data(io, pin_id);

    let Some(sub_spec) = sub_pin_spec else {
        // The slot never existed; leave an empty exposure behind.
        source.expose_pin_set(
            io,
            pin_id.clone(),
            GraphPinSpec::with_plug(sub_pin_id.clone(), PlugSpec::empty()),
            None,
            false,
        );
        return;
    };
    let Some(next_sub_spec) = plan.next_plug_spec[io]
        .get(pin_id)
        .and_then(|slots| slots.get(sub_pin_id))
    else {
        return;
    };
    let next_pin_id: SmolStr = next_sub_spec.pin_id.clone().unwrap_or_else(|| pin_id.clone());

    // A binding whose counterpart did not make it across degrades to an
    // empty slot.
    let mut resolved = next_sub_spec.clone();
    let unit_present = resolved
        .unit_id
        .as_ref()
        .is_some_and(|u| resolved.pin_id.is_some() && target.has_unit(u));
    let merge_present = resolved
        .merge_id
        .as_ref()
        .is_some_and(|m| target.has_merge(m));
    if !unit_present && !merge_present {
        resolved = PlugSpec::empty();
    }

    if target.has_pin_named(next_io, pin_id) {
        if target.has_plug(next_io, pin_id, &next_sub_pin_id) {
            target.plug_pin(next_io, pin_id, next_sub_pin_id.clone(), resolved, None, false);
        } else {
            target.expose_pin(next_io, pin_id.clone(), next_sub_pin_id.clone(), resolved);
        }
    } else {
        let mut pin = GraphPinSpec::with_plug(next_sub_pin_id.clone(), resolved);
        if let Some(old) = pin_spec {
            pin.r#ref = old.r#ref;
            pin.default_ignored = old.default_ignored;
        }
        target.expose_pin_set(next_io, pin_id.clone(), pin, data, false);
    }

    if let (Some(plug_unit), Some(plug_pin)) = (&sub_spec.unit_id, &sub_spec.pin_id) {
        let bridged = plan
            .next_id_map
            .link
            .get(plug_unit)
            .and_then(|pins| pins[sub_spec.kind_or(io)].get(pin_id.as_str()))
            .and_then(|n| n.merge_id.clone());
        match bridged {
            Some(bridge_id) => {
                source.add_pin_to_merge(bridge_id, graph_id, next_io, next_pin_id.clone());
            }
            None => {
                if let Some(bridge_id) = next_plug.and_then(|n| n.merge_id.clone()) {
                    if source.has_merge(&bridge_id) {
                        source.add_pin_to_merge(
                            bridge_id,
                            graph_id,
                            next_io,
                            next_pin_id.clone(),
                        );
                    } else {
                        let plug_io = sub_spec.kind_or(io);
                        if source.has_unit_pin_named(plug_unit, plug_io, plug_pin) {
                            let mut bridge = MergeSpec::new();
                            bridge.add(graph_id, next_io, next_pin_id.clone());
                            bridge.add(plug_unit.clone(), plug_io, plug_pin.clone());
                            source.add_merge(bridge, bridge_id);
                        }
                    }
                }
            }
        }
    } else if let Some(plug_merge) = &sub_spec.merge_id {
        let bridge_id = plan
            .next_merge_pin_id
            .get(plug_merge)
            .and_then(|sides| sides[io].as_ref())
            .and_then(|n| n.merge_id.clone())
            .or_else(|| next_plug.and_then(|n| n.merge_id.clone()));
        if let Some(bridge_id) = bridge_id {
            source.add_pin_to_merge(bridge_id, graph_id, next_io, next_pin_id.clone());
        }
    }

    if template {
        source.plug_pin(
            io,
            pin_id,
            sub_pin_id.clone(),
            PlugSpec::unit(graph_id, next_pin_id),
            None,
            false,
        );
    } else if let Some(current) = current {
        if current.plug.len() == 1 {
            source.cover_pin_set(io, pin_id);
        } else {
            source.cover_pin(io, pin_id, sub_pin_id);
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::graph::Graph;
    use crate::types::registry::{PinDecl, SpecDecl, SpecRegistry};

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

    fn exposed_as(pin_id: &str) -> NextUnitPin {
        NextUnitPin {
            pin_id: Some(pin_id.into()),
            sub_pin_id: Some("0".into()),
            ..NextUnitPin::default()
        }
    }

    #[test]
    fn collapse_moves_unit_and_promotes_constant() {
        let mut outer = Graph::empty("outer", registry());
        let mut unit = UnitSpec::new("add");
        unit.pin_mut(IO::Input, "a").constant = true;
        unit.pin_mut(IO::Input, "a").data = Some("1".to_owned());
        outer.add_unit("u1", unit);
        let mut sub = Graph::empty("sub", registry());

        let mut plan = MovePlan::default();
        plan.node_ids.unit.push("u1".into());
        let mut pins = IoOf::<Dict<NextUnitPin>>::default();
        pins.input.insert("a".into(), exposed_as("a"));
        pins.input.insert("b".into(), exposed_as("b"));
        pins.output.insert("a + b".into(), exposed_as("sum"));
        plan.next_pin_id_map.insert("u1".into(), pins);

        move_subgraph(
            &mut outer,
            &mut sub,
            "g0",
            &plan,
            &UnitConnect::default(),
            MoveDirection::Collapse,
        );

        assert!(!outer.has_unit("u1"));
        assert!(sub.has_unit("u1"));
        assert!(sub.has_pin_named(IO::Input, "a"));
        assert!(sub.has_pin_named(IO::Input, "b"));
        assert!(sub.has_pin_named(IO::Output, "sum"));
        assert!(
            sub.sub_pin_spec(IO::Input, "a", "0")
                .is_some_and(|plug| plug.binds_unit_pin("u1", "a"))
        );
        assert!(
            sub.sub_pin_spec(IO::Output, "sum", "0")
                .is_some_and(|plug| plug.binds_unit_pin("u1", "a + b"))
        );
        // The constant climbed from the unit pin onto the boundary pin.
        assert!(sub.is_pin_constant(IO::Input, "a"));
        assert_eq!(sub.pin_data(IO::Input, "a").as_deref(), Some("1"));
        assert!(!sub.is_unit_pin_constant("u1", IO::Input, "a"));
        assert_eq!(sub.unit_pin_data("u1", IO::Input, "a"), None);
    }

    #[test]
    fn collapse_carries_internal_merge_and_replays_as_noop() {
        let mut outer = Graph::empty("outer", registry());
        outer.add_unit("u1", UnitSpec::new("add"));
        outer.add_unit("u2", UnitSpec::new("add"));
        let mut merge = MergeSpec::new();
        merge.add("u1", IO::Output, "a + b");
        merge.add("u2", IO::Input, "a");
        outer.add_merge(merge, "m1");
        let mut sub = Graph::empty("sub", registry());

        let mut plan = MovePlan::default();
        plan.node_ids.unit = vec!["u1".into(), "u2".into()];
        plan.node_ids.merge = vec!["m1".into()];
        let mut u1_pins = IoOf::<Dict<NextUnitPin>>::default();
        u1_pins.input.insert("a".into(), exposed_as("a0"));
        u1_pins.input.insert("b".into(), exposed_as("b0"));
        plan.next_pin_id_map.insert("u1".into(), u1_pins);
        let mut u2_pins = IoOf::<Dict<NextUnitPin>>::default();
        u2_pins.input.insert("b".into(), exposed_as("b1"));
        u2_pins.output.insert("a + b".into(), exposed_as("sum"));
        plan.next_pin_id_map.insert("u2".into(), u2_pins);

        move_subgraph(
            &mut outer,
            &mut sub,
            "g0",
            &plan,
            &UnitConnect::default(),
            MoveDirection::Collapse,
        );

        assert!(!outer.has_unit("u1"));
        assert!(!outer.has_merge("m1"));
        assert!(sub.has_unit("u1"));
        assert!(sub.has_unit("u2"));
        assert!(sub.has_merge_pin("m1", "u1", IO::Output, "a + b"));
        assert!(sub.has_merge_pin("m1", "u2", IO::Input, "a"));
        assert!(sub.has_pin_named(IO::Input, "a0"));
        assert!(sub.has_pin_named(IO::Output, "sum"));

        // Replaying the same move leaves both graphs untouched.
        let outer_before = outer.spec().clone();
        let sub_before = sub.spec().clone();
        move_subgraph(
            &mut outer,
            &mut sub,
            "g0",
            &plan,
            &UnitConnect::default(),
            MoveDirection::Collapse,
        );
        assert_eq!(outer.spec(), &outer_before);
        assert_eq!(sub.spec(), &sub_before);
    }

    #[test]
    fn expand_restores_units_and_merge() {
        let mut sub = Graph::empty("sub", registry());
        sub.add_unit("u1", UnitSpec::new("add"));
        sub.add_unit("u2", UnitSpec::new("add"));
        let mut merge = MergeSpec::new();
        merge.add("u1", IO::Output, "a + b");
        merge.add("u2", IO::Input, "a");
        sub.add_merge(merge, "m1");
        let mut outer = Graph::empty("outer", registry());

        let mut plan = MovePlan::default();
        plan.node_ids.unit = vec!["u1".into(), "u2".into()];
        plan.node_ids.merge = vec!["m1".into()];

        move_subgraph(
            &mut sub,
            &mut outer,
            "g0",
            &plan,
            &UnitConnect::default(),
            MoveDirection::Expand,
        );

        assert!(!sub.has_unit("u1"));
        assert!(!sub.has_unit("u2"));
        assert!(!sub.has_merge("m1"));
        assert!(outer.has_merge_pin("m1", "u1", IO::Output, "a + b"));
        assert!(outer.has_merge_pin("m1", "u2", IO::Input, "a"));
    }

    #[test]
    fn collapse_bridges_boundary_merge_through_link_pin() {
        let mut outer = Graph::empty("outer", registry());
        outer.add_unit("u1", UnitSpec::new("add"));
        outer.add_unit("u2", UnitSpec::new("add"));
        let mut merge = MergeSpec::new();
        merge.add("u1", IO::Output, "a + b");
        merge.add("u2", IO::Input, "a");
        outer.add_merge(merge.clone(), "m1");
        let mut sub = Graph::empty("sub", registry());

        // u2 moves, u1 stays; m1 survives in the outer graph and gains the
        // moved graph's boundary pin.
        let mut plan = MovePlan::default();
        plan.node_ids.unit = vec!["u2".into()];
        plan.node_ids.link = vec![LinkPin {
            unit_id: "u1".into(),
            io: IO::Output,
            pin_id: "a + b".into(),
        }];
        let mut u1_links = IoOf::<Dict<NextLink>>::default();
        u1_links.output.insert(
            "a + b".into(),
            NextLink {
                merge_id: Some("m1".into()),
                opposite_pin_id: Some("in0".into()),
            },
        );
        plan.next_id_map.link.insert("u1".into(), u1_links);
        let mut u2_pins = IoOf::<Dict<NextUnitPin>>::default();
        u2_pins.input.insert(
            "a".into(),
            NextUnitPin {
                pin_id: Some("in0".into()),
                sub_pin_id: Some("0".into()),
                merge_id: Some("m1".into()),
                merge: Some(merge),
                ..NextUnitPin::default()
            },
        );
        u2_pins.input.insert("b".into(), exposed_as("b0"));
        u2_pins.output.insert("a + b".into(), exposed_as("sum"));
        plan.next_pin_id_map.insert("u2".into(), u2_pins);

        move_subgraph(
            &mut outer,
            &mut sub,
            "g0",
            &plan,
            &UnitConnect::default(),
            MoveDirection::Collapse,
        );

        assert!(outer.has_unit("u1"));
        assert!(!outer.has_unit("u2"));
        assert!(outer.has_merge_pin("m1", "u1", IO::Output, "a + b"));
        assert!(outer.has_merge_pin("m1", "g0", IO::Input, "in0"));
        assert!(!outer.has_merge_pin("m1", "u2", IO::Input, "a"));
        assert!(sub.has_unit("u2"));
        assert!(
            sub.sub_pin_spec(IO::Input, "in0", "0")
                .is_some_and(|plug| plug.binds_unit_pin("u2", "a"))
        );
    }

    #[test]
    fn collapse_moves_boundary_plug_with_its_unit() {
        let mut outer = Graph::empty("outer", registry());
        outer.add_unit("u2", UnitSpec::new("add"));
        outer.expose_pin_set(
            IO::Input,
            "x",
            GraphPinSpec::with_plug("0", PlugSpec::unit("u2", "b")),
            None,
            false,
        );
        let mut sub = Graph::empty("sub", registry());

        let mut plan = MovePlan::default();
        plan.node_ids.unit = vec!["u2".into()];
        plan.node_ids.link = vec![LinkPin {
            unit_id: "u2".into(),
            io: IO::Input,
            pin_id: "b".into(),
        }];
        plan.node_ids.plug = vec![PlugRef {
            io: IO::Input,
            pin_id: "x".into(),
            sub_pin_id: "0".into(),
        }];
        plan.next_plug_spec.input.insert(
            "x".into(),
            [("0".into(), PlugSpec::unit("u2", "b"))].into_iter().collect(),
        );
        let mut u2_pins = IoOf::<Dict<NextUnitPin>>::default();
        u2_pins.input.insert("a".into(), exposed_as("a0"));
        u2_pins.output.insert("a + b".into(), exposed_as("sum"));
        plan.next_pin_id_map.insert("u2".into(), u2_pins);

        move_subgraph(
            &mut outer,
            &mut sub,
            "g0",
            &plan,
            &UnitConnect::default(),
            MoveDirection::Collapse,
        );

        assert!(!outer.has_unit("u2"));
        assert!(!outer.has_pin_named(IO::Input, "x"));
        assert!(sub.has_unit("u2"));
        assert!(
            sub.sub_pin_spec(IO::Input, "x", "0")
                .is_some_and(|plug| plug.binds_unit_pin("u2", "b"))
        );
        // The moved plug's pin was not separately exposed.
        assert!(!sub.has_pin_named(IO::Input, "b"));
    }

    #[test]
    fn expand_returns_promoted_constant_to_unit_pin() {
        let mut outer = Graph::empty("outer", registry());
        let mut unit = UnitSpec::new("add");
        unit.pin_mut(IO::Input, "a").constant = true;
        unit.pin_mut(IO::Input, "a").data = Some("1".to_owned());
        outer.add_unit("u1", unit);
        let mut sub = Graph::empty("sub", registry());

        let mut plan = MovePlan::default();
        plan.node_ids.unit.push("u1".into());
        let mut pins = IoOf::<Dict<NextUnitPin>>::default();
        pins.input.insert("a".into(), exposed_as("a"));
        pins.input.insert("b".into(), exposed_as("b"));
        pins.output.insert("a + b".into(), exposed_as("sum"));
        plan.next_pin_id_map.insert("u1".into(), pins);

        move_subgraph(
            &mut outer,
            &mut sub,
            "g0",
            &plan,
            &UnitConnect::default(),
            MoveDirection::Collapse,
        );
        assert!(sub.is_pin_constant(IO::Input, "a"));

        // The inverse move with the same plan brings the constant home.
        move_subgraph(
            &mut sub,
            &mut outer,
            "g0",
            &plan,
            &UnitConnect::default(),
            MoveDirection::Expand,
        );

        assert!(!sub.has_unit("u1"));
        assert!(outer.has_unit("u1"));
        assert!(outer.is_unit_pin_constant("u1", IO::Input, "a"));
        assert_eq!(outer.unit_pin_data("u1", IO::Input, "a").as_deref(), Some("1"));
        assert!(!sub.is_pin_constant(IO::Input, "a"));
    }

    #[test]
    fn collapse_exposes_ref_merge_as_ref_pin() {
        let mut outer = Graph::empty("outer", registry());
        outer.add_unit("u1", UnitSpec::new("add"));
        let mut carrier = UnitSpec::new("add");
        carrier.pin_mut(IO::Input, "a").r#ref = true;
        outer.add_unit("u2", carrier);
        let mut merge = MergeSpec::new();
        merge.add("u1", IO::Output, "a + b");
        merge.add("u2", IO::Input, "a");
        outer.add_merge(merge.clone(), "m1");
        let mut sub = Graph::empty("sub", registry());

        let mut plan = MovePlan::default();
        plan.node_ids.unit = vec!["u2".into()];
        plan.node_ids.link = vec![LinkPin {
            unit_id: "u1".into(),
            io: IO::Output,
            pin_id: "a + b".into(),
        }];
        let mut u1_links = IoOf::<Dict<NextLink>>::default();
        u1_links.output.insert(
            "a + b".into(),
            NextLink {
                merge_id: Some("m1".into()),
                opposite_pin_id: Some("in0".into()),
            },
        );
        plan.next_id_map.link.insert("u1".into(), u1_links);
        let mut u2_pins = IoOf::<Dict<NextUnitPin>>::default();
        u2_pins.input.insert(
            "a".into(),
            NextUnitPin {
                pin_id: Some("in0".into()),
                sub_pin_id: Some("0".into()),
                merge_id: Some("m1".into()),
                merge: Some(merge),
                ..NextUnitPin::default()
            },
        );
        plan.next_pin_id_map.insert("u2".into(), u2_pins);

        move_subgraph(
            &mut outer,
            &mut sub,
            "g0",
            &plan,
            &UnitConnect::default(),
            MoveDirection::Collapse,
        );

        // The merge carried a reference through u2's pin, so the boundary
        // pin bridging it is a ref pin.
        assert!(sub.has_pin_named(IO::Input, "in0"));
        assert!(sub.is_pin_ref(IO::Input, "in0"));
    }

    #[test]
    fn expand_folds_connect_merges_past_self_feed() {
        let mut sub = Graph::empty("sub", registry());
        sub.add_unit("u1", UnitSpec::new("add"));
        let mut merge = MergeSpec::new();
        merge.add("u1", IO::Output, "a + b");
        sub.add_merge(merge, "m1");
        sub.expose_pin_set(
            IO::Output,
            "sum",
            GraphPinSpec::with_plug("0", PlugSpec::unit("u1", "a + b")),
            None,
            false,
        );
        let mut outer = Graph::empty("outer", registry());
        outer.add_unit("u9", UnitSpec::new("add"));
        let mut boundary = MergeSpec::new();
        boundary.add("g0", IO::Output, "sum");
        boundary.add("u9", IO::Input, "a");
        outer.add_merge(boundary.clone(), "cm");

        let mut plan = MovePlan::default();
        plan.node_ids.unit = vec!["u1".into()];
        plan.node_ids.merge = vec!["m1".into()];
        let mut sides = IoOf::<Option<NextMergePin>>::default();
        sides.output = Some(NextMergePin {
            pin_id: Some("sum".into()),
            sub_pin_spec: Some(PlugSpec::unit("u1", "a + b")),
            ..NextMergePin::default()
        });
        plan.next_merge_pin_id.insert("m1".into(), sides);

        // The first connect merge feeds the graph's self output; the one
        // after it must still fold into the boundary merge.
        let mut connect = UnitConnect::default();
        let mut self_merge = MergeSpec::new();
        self_merge.add("g0", IO::Output, SELF);
        self_merge.add("u9", IO::Input, "b");
        connect.merges.insert("cm0".into(), self_merge);
        connect.merges.insert("cm".into(), boundary);

        move_subgraph(
            &mut sub,
            &mut outer,
            "g0",
            &plan,
            &connect,
            MoveDirection::Expand,
        );

        assert!(outer.has_unit("u1"));
        assert!(outer.has_merge_pin("cm", "u1", IO::Output, "a + b"));
        assert!(outer.has_merge_pin("cm", "u9", IO::Input, "a"));
        assert!(!outer.has_merge("cm0"));
    }
}
