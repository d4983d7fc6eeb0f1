//! Sample inference and type unification.
//!
//! One [`Inference`] session owns the class arena. Samples stream in
//! through [`Inference::infer_toplevel`]; the schema translators drive the
//! same session so that every input dialect lands in one graph with one
//! unification discipline.
//!
//! Unification is associative and commutative up to redirects: merging the
//! same evidence in any order yields graphs that are equivalent once
//! redirect chains are collapsed.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::{debug, trace};

use crate::graph::{ClassData, ClassId, EnumData, IrGraph, IrType, NameSet, Named};
use crate::naming::singular;
use crate::union::UnionRep;

pub struct Inference {
    graph: IrGraph,
    /// Sorted property-name set of each representative class. New classes
    /// with a shape already in the arena unify into the existing entry.
    shapes: BTreeMap<Vec<String>, ClassId>,
    /// Unordered pairs currently being merged. Mutually recursive classes
    /// re-enter `unify_classes` through their own property types; on
    /// re-entry the already-chosen target id is returned as-is.
    unifying: BTreeSet<(ClassId, ClassId)>,
}

impl Inference {
    pub fn new() -> Self {
        Inference {
            graph: IrGraph::new(),
            shapes: BTreeMap::new(),
            unifying: BTreeSet::new(),
        }
    }

    pub fn graph(&self) -> &IrGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut IrGraph {
        &mut self.graph
    }

    pub fn into_graph(self) -> IrGraph {
        self.graph
    }

    /// Consumes one sample for the named top level. Repeated calls with the
    /// same name unify each sample into the accumulated type.
    pub fn infer_toplevel(&mut self, name: &str, sample: &Value) {
        trace!(toplevel = name, "consuming sample");
        let inferred = self.infer(sample, name);
        let merged = match self.graph.toplevels.get(name).cloned() {
            Some(previous) => self.unify(previous, inferred),
            None => inferred,
        };
        self.graph.add_toplevel(name, merged);
    }

    // ------------------------------ Observe ------------------------------ //

    fn infer(&mut self, v: &Value, name: &str) -> IrType {
        match v {
            Value::Null => IrType::null_union(),
            Value::Bool(_) => IrType::Bool,
            // A numeric literal with no fractional or exponent part parses
            // as i64/u64; everything else is a double.
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    IrType::Integer
                } else {
                    IrType::Double
                }
            }
            Value::String(_) => IrType::String,
            Value::Array(xs) => {
                let elem_name = singular(name);
                let mut elem = IrType::NoInformation;
                for x in xs {
                    let t = self.infer(x, &elem_name);
                    elem = self.unify(elem, t);
                }
                IrType::Array(Box::new(elem))
            }
            Value::Object(map) => {
                let mut data = ClassData::new(NameSet::single_inferred(name));
                for (k, x) in map {
                    let t = self.infer(x, k);
                    data.properties.insert(k.clone(), t);
                }
                self.intern_class(data)
            }
        }
    }

    /// Allocates a class, unifying it into an existing entry when one with
    /// the same property-name set is already live.
    pub fn intern_class(&mut self, data: ClassData) -> IrType {
        let key = data.shape_key();
        let id = self.graph.alloc(data);
        match self.shapes.get(&key).copied() {
            Some(existing) => {
                let target = self.unify_classes(existing, id);
                IrType::Class(target)
            }
            None => {
                self.shapes.insert(key, id);
                IrType::Class(id)
            }
        }
    }

    // ------------------------------- Unify ------------------------------- //

    pub fn unify(&mut self, a: IrType, b: IrType) -> IrType {
        if a == b {
            return a;
        }
        use IrType::*;
        match (a, b) {
            (NoInformation, t) | (t, NoInformation) => t,
            (Any, _) | (_, Any) => Any,
            (Array(x), Array(y)) => Array(Box::new(self.unify(*x, *y))),
            (Class(i), Class(j)) => Class(self.unify_classes(i, j)),
            (Class(i), Map(t)) | (Map(t), Class(i)) => self.unify_class_with_map(i, *t),
            (Map(x), Map(y)) => Map(Box::new(self.unify(*x, *y))),
            (Enum(x), Enum(y)) => Enum(EnumData::merge(x, y)),
            // A string observation subsumes a closed value set.
            (Enum(_), String) | (String, Enum(_)) => String,
            (Union(u), t) | (t, Union(u)) => {
                let other = self.to_union_rep(t);
                self.unify_unions(u, other).into_type()
            }
            (a, b) => {
                let ua = self.to_union_rep(a);
                let ub = self.to_union_rep(b);
                self.unify_unions(ua, ub).into_type()
            }
        }
    }

    fn to_union_rep(&mut self, t: IrType) -> UnionRep {
        let mut u = UnionRep::empty();
        match t {
            IrType::Union(rep) => return rep,
            IrType::NoInformation => {}
            p @ (IrType::Null
            | IrType::Integer
            | IrType::Double
            | IrType::Bool
            | IrType::String) => u.insert_primitive(p),
            IrType::Array(elem) => u.array_type = Some(elem),
            IrType::Class(id) => u.class_ref = Some(self.graph.follow(id)),
            IrType::Map(elem) => u.map_type = Some(elem),
            IrType::Enum(data) => u.enum_data = Some(data),
            IrType::Any => unreachable!("Any is absorbed before union wrapping"),
        }
        u
    }

    /// Pointwise union of two unions: primitive bits OR'd, each compound
    /// slot merged by the rules for its kind.
    fn unify_unions(&mut self, mut a: UnionRep, b: UnionRep) -> UnionRep {
        a.or_primitives(&b);
        a.names = Named::merge(a.names, b.names);

        a.array_type = match (a.array_type.take(), b.array_type) {
            (Some(x), Some(y)) => Some(Box::new(self.unify(*x, *y))),
            (x, y) => x.or(y),
        };
        a.class_ref = match (a.class_ref, b.class_ref) {
            (Some(i), Some(j)) => Some(self.unify_classes(i, j)),
            (x, y) => x.or(y),
        };
        a.map_type = match (a.map_type.take(), b.map_type) {
            (Some(x), Some(y)) => Some(Box::new(self.unify(*x, *y))),
            (x, y) => x.or(y),
        };
        a.enum_data = match (a.enum_data.take(), b.enum_data) {
            (Some(x), Some(y)) => Some(EnumData::merge(x, y)),
            (x, y) => x.or(y),
        };

        // An open string kind subsumes any closed value set in the same
        // union.
        if a.is_member(&IrType::String) {
            a.enum_data = None;
        }
        a
    }

    /// Merges class `j` into class `i` and redirects `j`. Returns the
    /// representative id.
    pub fn unify_classes(&mut self, i: ClassId, j: ClassId) -> ClassId {
        let i = self.graph.follow(i);
        let j = self.graph.follow(j);
        if i == j {
            return i;
        }
        let pair = (i.min(j), i.max(j));
        if !self.unifying.insert(pair) {
            return i;
        }
        debug!(into = %i, from = %j, "unifying classes");

        // The redirect goes in before any recursive unification so that
        // self-references through `j` already resolve to `i`.
        let evicted = self.graph.redirect(j, i);

        let names = std::mem::replace(&mut self.graph.class_data_mut(i).names, NameSet::none());
        self.graph.class_data_mut(i).names = Named::merge(names, evicted.names);

        // A property present on one side only becomes optional.
        let own_keys: Vec<String> =
            self.graph.class_data(i).properties.keys().cloned().collect();
        for key in &own_keys {
            if !evicted.properties.contains_key(key) {
                let t = self.graph.class_data(i).properties[key].clone();
                let t = self.unify(t, IrType::null_union());
                self.graph.class_data_mut(i).properties.insert(key.clone(), t);
            }
        }
        for (key, theirs) in evicted.properties {
            let merged = match self.graph.class_data(i).properties.get(&key).cloned() {
                Some(ours) => self.unify(ours, theirs),
                None => self.unify(theirs, IrType::null_union()),
            };
            self.graph.class_data_mut(i).properties.insert(key, merged);
        }

        self.unifying.remove(&pair);
        // Recursion through the property types may have merged `i` itself
        // into yet another class.
        self.graph.follow(i)
    }

    /// `Class ⊔ Map`: an unnamed class joins the map by contributing its
    /// property types to the element type; a user-named class never demotes
    /// and the two kinds coexist in a union instead.
    fn unify_class_with_map(&mut self, i: ClassId, elem: IrType) -> IrType {
        let i = self.graph.follow(i);
        if self.graph.class_data(i).names.is_given() {
            let mut u = UnionRep::empty();
            u.class_ref = Some(i);
            let mut other = UnionRep::empty();
            other.map_type = Some(Box::new(elem));
            return self.unify_unions(u, other).into_type();
        }
        let property_types: Vec<IrType> =
            self.graph.class_data(i).properties.values().cloned().collect();
        let mut acc = elem;
        for t in property_types {
            let t = strip_null(t);
            acc = self.unify(acc, t);
        }
        IrType::Map(Box::new(acc))
    }
}

impl Default for Inference {
    fn default() -> Self {
        Self::new()
    }
}

/// Drops the null member from a union, collapsing a then-singleton union to
/// its sole member. Optional properties contribute their value type this
/// way when a class is considered as a map.
pub(crate) fn strip_null(t: IrType) -> IrType {
    match t {
        IrType::Union(u) => {
            let (_, rest) = u.remove_null();
            let mut members = rest.members();
            if members.len() == 1 {
                members.pop().expect("len checked")
            } else {
                rest.into_type()
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn toplevel<'g>(inf: &'g Inference, name: &str) -> &'g IrType {
        inf.graph().toplevels.get(name).expect("top level exists")
    }

    fn class_of<'g>(inf: &'g Inference, t: &IrType) -> &'g ClassData {
        match t {
            IrType::Class(id) => inf.graph().class_data(*id),
            other => panic!("expected a class, got {other:?}"),
        }
    }

    #[test]
    fn flat_object_keeps_property_order() {
        let mut inf = Inference::new();
        inf.infer_toplevel("Root", &json!({ "a": 1, "b": "x" }));

        let data = class_of(&inf, toplevel(&inf, "Root"));
        let props: Vec<(&String, &IrType)> = data.properties.iter().collect();
        assert_eq!(props.len(), 2);
        assert_eq!(props[0], (&"a".to_string(), &IrType::Integer));
        assert_eq!(props[1], (&"b".to_string(), &IrType::String));
    }

    #[test]
    fn empty_array_evidence_is_superseded() {
        let mut inf = Inference::new();
        inf.infer_toplevel("Root", &json!({ "xs": [] }));
        inf.infer_toplevel("Root", &json!({ "xs": [1] }));

        let data = class_of(&inf, toplevel(&inf, "Root"));
        assert_eq!(
            data.properties["xs"],
            IrType::Array(Box::new(IrType::Integer))
        );
    }

    #[test]
    fn alternating_nulls_make_both_properties_nullable() {
        let mut inf = Inference::new();
        inf.infer_toplevel("Root", &json!({ "x": 1, "y": null }));
        inf.infer_toplevel("Root", &json!({ "x": null, "y": 2 }));

        let data = class_of(&inf, toplevel(&inf, "Root"));
        for key in ["x", "y"] {
            match &data.properties[key] {
                IrType::Union(u) => {
                    assert_eq!(u.nullable_from_union(), Some(IrType::Integer), "{key}")
                }
                other => panic!("expected nullable integer for {key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn matching_shapes_collapse_into_one_class() {
        let mut inf = Inference::new();
        inf.infer_toplevel("Root", &json!({ "p": { "a": 1 }, "q": { "a": 2 } }));

        let root = class_of(&inf, toplevel(&inf, "Root")).clone();
        let (p, q) = match (&root.properties["p"], &root.properties["q"]) {
            (IrType::Class(p), IrType::Class(q)) => (*p, *q),
            other => panic!("expected class-typed properties, got {other:?}"),
        };
        let g = inf.graph();
        assert_eq!(g.follow(p), g.follow(q));

        let shared = g.class_data(p);
        assert_eq!(shared.properties["a"], IrType::Integer);
        let names: Vec<&str> = shared.names.inner().iter().map(String::as_str).collect();
        assert_eq!(names, vec!["p", "q"]);
        // Exactly one live class besides the root.
        assert_eq!(g.live_classes().len(), 2);
    }

    #[test]
    fn mixed_numbers_flag_as_double() {
        let mut inf = Inference::new();
        let t = {
            let a = inf.infer(&json!(1), "n");
            let b = inf.infer(&json!(1.5), "n");
            inf.unify(a, b)
        };
        match t {
            IrType::Union(u) => {
                assert!(u.is_mixed_numeric());
                assert_eq!(u.members(), vec![IrType::Double]);
            }
            other => panic!("expected a union, got {other:?}"),
        }
    }

    #[test]
    fn unify_is_commutative_up_to_redirects() {
        let left = json!({ "v": { "a": 1, "b": null } });
        let right = json!({ "v": { "a": "s", "b": true } });

        let run = |first: &Value, second: &Value| {
            let mut inf = Inference::new();
            inf.infer_toplevel("Root", first);
            inf.infer_toplevel("Root", second);
            let data = class_of(&inf, toplevel(&inf, "Root")).clone();
            let inner = class_of(&inf, &data.properties["v"]).clone();
            inner
                .properties
                .iter()
                .map(|(k, t)| {
                    let members = match t {
                        IrType::Union(u) => u.members(),
                        other => vec![other.clone()],
                    };
                    (k.clone(), members)
                })
                .collect::<Vec<_>>()
        };

        assert_eq!(run(&left, &right), run(&right, &left));
    }

    #[test]
    fn nested_optional_objects_terminate() {
        // Self-similar nesting exercises the redirect-before-merge ordering
        // and the re-entry guard.
        let mut inf = Inference::new();
        inf.infer_toplevel("Root", &json!({ "next": { "next": null, "v": 1 }, "v": 2 }));
        inf.infer_toplevel("Root", &json!({ "next": null, "v": 3 }));

        let data = class_of(&inf, toplevel(&inf, "Root"));
        assert!(data.properties.contains_key("next"));
        assert!(data.properties.contains_key("v"));
    }
}
