//! Graph canonicalization.
//!
//! Runs once, after the last sample or schema has been consumed, and leaves
//! the graph in the form the naming and rendering layers consume:
//!
//! 1. map demotion (classes that look like homogeneous string-keyed maps),
//! 2. regather class names from the property slots that reference them,
//! 3. regather union and enum names the same way,
//! 4. collapse redirect chains so every `Class` ref points at a live entry,
//! 5. erase `NoInformation` placeholders.
//!
//! Every pass is idempotent, so canonicalizing twice is the same as
//! canonicalizing once.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::Error;
use crate::graph::{ClassData, ClassId, Entry, IrGraph, IrType};
use crate::inference::strip_null;
use crate::naming::singular;

/// Minimum property count before a class is considered as a map.
pub const MAP_THRESHOLD: usize = 2;

pub fn canonicalize(graph: &mut IrGraph, infer_maps: bool) {
    if infer_maps {
        demote_maps(graph);
    }
    regather_class_names(graph);
    regather_union_names(graph);
    collapse_redirects(graph);
    erase_no_information(graph);
}

// ---------------------------- Map demotion ---------------------------- //

/// A class demotes to `Map(T)` when it has no user-given name, at least
/// [`MAP_THRESHOLD`] properties, and all its property types (null-stripped)
/// share a common non-`Any` type.
fn demote_maps(graph: &mut IrGraph) {
    let table = follow_table(graph);

    let mut candidates: BTreeMap<ClassId, IrType> = BTreeMap::new();
    for id in graph.live_classes() {
        let data = graph.class_data(id);
        if data.names.is_given() || data.properties.len() < MAP_THRESHOLD {
            continue;
        }
        if let Some(elem) = common_property_type(data, &table) {
            candidates.insert(id, elem);
        }
    }

    // A candidate referenced from a union whose map slot is already taken
    // stays a class; demoting it would collide with the existing map arm.
    let mut pinned: Vec<ClassId> = Vec::new();
    for id in graph.live_classes() {
        for t in graph.class_data(id).properties.values() {
            collect_pinned(t, &table, &mut pinned);
        }
    }
    for t in graph.toplevels.values() {
        collect_pinned(t, &table, &mut pinned);
    }
    for id in pinned {
        candidates.remove(&id);
    }

    // A candidate whose element type refers back into the candidate set
    // (itself included) stays a class; substitution must not chase cycles.
    loop {
        let ids: BTreeSet<ClassId> = candidates.keys().copied().collect();
        let dropped: Vec<ClassId> = candidates
            .iter()
            .filter(|(_, elem)| references_any(elem, &ids, &table))
            .map(|(id, _)| *id)
            .collect();
        if dropped.is_empty() {
            break;
        }
        for id in dropped {
            candidates.remove(&id);
        }
    }
    if candidates.is_empty() {
        return;
    }
    debug!(count = candidates.len(), "demoting classes to maps");

    for entry in graph.classes.iter_mut() {
        if let Entry::Live(data) = entry {
            for (_, t) in data.properties.iter_mut() {
                substitute_maps(t, &candidates, &table);
            }
        }
    }
    for (_, t) in graph.toplevels.iter_mut() {
        substitute_maps(t, &candidates, &table);
    }
    for id in candidates.keys() {
        graph.classes[id.0] = Entry::Empty;
    }
}

fn common_property_type(data: &ClassData, table: &[ClassId]) -> Option<IrType> {
    let mut acc: Option<IrType> = None;
    for t in data.properties.values() {
        let t = strip_null(t.clone());
        if matches!(t, IrType::NoInformation) {
            continue;
        }
        acc = Some(match acc {
            None => t,
            Some(prev) => merge_for_map(prev, t, table)?,
        });
    }
    match acc {
        Some(IrType::Any) | None => None,
        some => some,
    }
}

/// A read-only join used only to test demotability: it must never mutate
/// the arena, so anything that would require a class merge bails out.
fn merge_for_map(a: IrType, b: IrType, table: &[ClassId]) -> Option<IrType> {
    if a == b {
        return Some(a);
    }
    use IrType::*;
    match (a, b) {
        (Class(i), Class(j)) if table[i.0] == table[j.0] => Some(Class(table[i.0])),
        (Integer, Double) | (Double, Integer) => Some(Double),
        (Array(x), Array(y)) => merge_for_map(*x, *y, table).map(|e| Array(Box::new(e))),
        (Map(x), Map(y)) => merge_for_map(*x, *y, table).map(|e| Map(Box::new(e))),
        (Union(x), Union(y)) if x.members() == y.members() => Some(Union(x)),
        _ => None,
    }
}

fn collect_pinned(t: &IrType, table: &[ClassId], out: &mut Vec<ClassId>) {
    match t {
        IrType::Array(e) | IrType::Map(e) => collect_pinned(e, table, out),
        IrType::Union(u) => {
            if let (Some(i), Some(_)) = (u.class_ref, &u.map_type) {
                out.push(table[i.0]);
            }
            if let Some(e) = &u.array_type {
                collect_pinned(e, table, out);
            }
            if let Some(e) = &u.map_type {
                collect_pinned(e, table, out);
            }
        }
        _ => {}
    }
}

fn references_any(t: &IrType, ids: &BTreeSet<ClassId>, table: &[ClassId]) -> bool {
    match t {
        IrType::Class(i) => ids.contains(&table[i.0]),
        IrType::Array(e) | IrType::Map(e) => references_any(e, ids, table),
        IrType::Union(u) => {
            u.class_ref.map(|i| ids.contains(&table[i.0])).unwrap_or(false)
                || u.array_type.as_deref().map(|e| references_any(e, ids, table)).unwrap_or(false)
                || u.map_type.as_deref().map(|e| references_any(e, ids, table)).unwrap_or(false)
        }
        _ => false,
    }
}

fn substitute_maps(t: &mut IrType, demoted: &BTreeMap<ClassId, IrType>, table: &[ClassId]) {
    match t {
        IrType::Class(i) => {
            if let Some(elem) = demoted.get(&table[i.0]) {
                *t = IrType::Map(Box::new(elem.clone()));
            }
        }
        IrType::Array(e) | IrType::Map(e) => substitute_maps(e, demoted, table),
        IrType::Union(u) => {
            if let Some(i) = u.class_ref {
                if let Some(elem) = demoted.get(&table[i.0]) {
                    // Unions with an occupied map slot were pinned out of
                    // the candidate set, so the slot is free here.
                    u.class_ref = None;
                    u.map_type = Some(Box::new(elem.clone()));
                }
            }
            if let Some(e) = &mut u.array_type {
                substitute_maps(e, demoted, table);
            }
            if let Some(e) = &mut u.map_type {
                substitute_maps(e, demoted, table);
            }
        }
        _ => {}
    }
}

// --------------------------- Name regathering -------------------------- //

/// Every `Class(i)` reached through a property named `p` picks up `p` as an
/// inferred name; array and map element positions use `singular(p)`.
fn regather_class_names(graph: &mut IrGraph) {
    let mut additions: Vec<(ClassId, String)> = Vec::new();
    for id in graph.live_classes() {
        for (prop, t) in &graph.class_data(id).properties {
            collect_class_names(graph, t, prop, &mut additions);
        }
    }
    for (name, t) in &graph.toplevels {
        collect_class_names(graph, t, name, &mut additions);
    }
    for (id, name) in additions {
        graph.class_data_mut(id).names.add_inferred(&name);
    }
}

fn collect_class_names(
    graph: &IrGraph,
    t: &IrType,
    name: &str,
    out: &mut Vec<(ClassId, String)>,
) {
    match t {
        IrType::Class(i) => out.push((graph.follow(*i), name.to_string())),
        IrType::Array(e) | IrType::Map(e) => {
            collect_class_names(graph, e, &singular(name), out)
        }
        IrType::Union(u) => {
            if let Some(i) = u.class_ref {
                out.push((graph.follow(i), name.to_string()));
            }
            if let Some(e) = &u.array_type {
                collect_class_names(graph, e, &singular(name), out);
            }
            if let Some(e) = &u.map_type {
                collect_class_names(graph, e, &singular(name), out);
            }
        }
        _ => {}
    }
}

/// Unions and enums carry their names by value, so this pass rewrites the
/// type trees in place.
fn regather_union_names(graph: &mut IrGraph) {
    for entry in graph.classes.iter_mut() {
        if let Entry::Live(data) = entry {
            for (key, t) in data.properties.iter_mut() {
                name_embedded(t, key);
            }
        }
    }
    for (name, t) in graph.toplevels.iter_mut() {
        name_embedded(t, name);
    }
}

fn name_embedded(t: &mut IrType, name: &str) {
    match t {
        IrType::Union(u) => {
            u.names.add_inferred(name);
            if let Some(e) = &mut u.array_type {
                name_embedded(e, &singular(name));
            }
            if let Some(e) = &mut u.map_type {
                name_embedded(e, &singular(name));
            }
            if let Some(en) = &mut u.enum_data {
                en.names.add_inferred(name);
            }
        }
        IrType::Array(e) | IrType::Map(e) => name_embedded(e, &singular(name)),
        IrType::Enum(en) => en.names.add_inferred(name),
        _ => {}
    }
}

// ----------------------- Redirects and placeholders -------------------- //

fn follow_table(graph: &IrGraph) -> Vec<ClassId> {
    (0..graph.classes.len()).map(|i| graph.follow(ClassId(i))).collect()
}

/// Rewrites every class reference to point directly at its live entry.
/// Redirect slots themselves stay in the arena so held ids remain valid.
fn collapse_redirects(graph: &mut IrGraph) {
    let table = follow_table(graph);
    for entry in graph.classes.iter_mut() {
        if let Entry::Live(data) = entry {
            for (_, t) in data.properties.iter_mut() {
                rewrite_refs(t, &table);
            }
        }
    }
    for (_, t) in graph.toplevels.iter_mut() {
        rewrite_refs(t, &table);
    }
}

fn rewrite_refs(t: &mut IrType, table: &[ClassId]) {
    match t {
        IrType::Class(i) => *i = table[i.0],
        IrType::Array(e) | IrType::Map(e) => rewrite_refs(e, table),
        IrType::Union(u) => {
            if let Some(i) = &mut u.class_ref {
                *i = table[i.0];
            }
            if let Some(e) = &mut u.array_type {
                rewrite_refs(e, table);
            }
            if let Some(e) = &mut u.map_type {
                rewrite_refs(e, table);
            }
        }
        _ => {}
    }
}

/// An information-free slot that survived unification (an empty array with
/// no sibling evidence) widens to `Any`.
fn erase_no_information(graph: &mut IrGraph) {
    for entry in graph.classes.iter_mut() {
        if let Entry::Live(data) = entry {
            for (_, t) in data.properties.iter_mut() {
                erase_in(t);
            }
        }
    }
    for (_, t) in graph.toplevels.iter_mut() {
        erase_in(t);
    }
}

fn erase_in(t: &mut IrType) {
    match t {
        IrType::NoInformation => *t = IrType::Any,
        IrType::Array(e) | IrType::Map(e) => erase_in(e),
        IrType::Union(u) => {
            if let Some(e) = &mut u.array_type {
                erase_in(e);
            }
            if let Some(e) = &mut u.map_type {
                erase_in(e);
            }
        }
        _ => {}
    }
}

// ----------------------------- Integrity ------------------------------ //

/// Validates the §-level graph invariants: every reachable class reference
/// resolves to a live entry, and no reachable type still carries
/// `NoInformation`. Used by tests and debug assertions.
pub fn check_integrity(graph: &IrGraph) -> Result<(), Error> {
    let mut visited: BTreeSet<ClassId> = BTreeSet::new();
    for t in graph.toplevels.values() {
        check_type(graph, t, &mut visited)?;
    }
    Ok(())
}

fn check_type(
    graph: &IrGraph,
    t: &IrType,
    visited: &mut BTreeSet<ClassId>,
) -> Result<(), Error> {
    match t {
        IrType::NoInformation => Err(Error::UnerasedPlaceholder),
        IrType::Class(i) => check_class(graph, *i, visited),
        IrType::Array(e) | IrType::Map(e) => check_type(graph, e, visited),
        IrType::Union(u) => {
            if let Some(i) = u.class_ref {
                check_class(graph, i, visited)?;
            }
            if let Some(e) = &u.array_type {
                check_type(graph, e, visited)?;
            }
            if let Some(e) = &u.map_type {
                check_type(graph, e, visited)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn check_class(
    graph: &IrGraph,
    id: ClassId,
    visited: &mut BTreeSet<ClassId>,
) -> Result<(), Error> {
    let live = graph.try_follow(id)?;
    if !visited.insert(live) {
        return Ok(());
    }
    for t in graph.class_data(live).properties.values() {
        check_type(graph, t, visited)?;
    }
    Ok(())
}
