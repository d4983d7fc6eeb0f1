//! The intermediate type graph.
//!
//! An [`IrGraph`] is a contiguous arena of class entries plus an ordered map
//! of named top-level entry points. Classes are the only cycle carrier:
//! every other [`IrType`] is a plain value, and recursion always goes
//! through a [`ClassId`] index into the arena.
//!
//! Entries are never deleted. When two classes unify, the loser becomes a
//! [`Entry::Redirect`] so that ids held by callers stay valid.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::error::Error;
use crate::union::UnionRep;

/// Index of a class in the graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(pub usize);

impl std::fmt::Display for ClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Name origin marker. A `Given` name came from the user, a JSON Schema
/// `title`, or a GraphQL type name; an `Inferred` name was derived from the
/// property path under which the type was first seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Named<T> {
    Given(T),
    Inferred(T),
}

impl<T> Named<T> {
    pub fn is_given(&self) -> bool {
        matches!(self, Named::Given(_))
    }

    pub fn inner(&self) -> &T {
        match self {
            Named::Given(x) | Named::Inferred(x) => x,
        }
    }
}

/// Alias for the name sets carried by classes, enums, and unions.
pub type NameSet = Named<BTreeSet<String>>;

impl Named<BTreeSet<String>> {
    pub fn none() -> Self {
        Named::Inferred(BTreeSet::new())
    }

    pub fn single_given(name: impl Into<String>) -> Self {
        Named::Given(BTreeSet::from([name.into()]))
    }

    pub fn single_inferred(name: impl Into<String>) -> Self {
        Named::Inferred(BTreeSet::from([name.into()]))
    }

    /// `Given` dominates `Inferred`; same-origin merges union the sets.
    pub fn merge(a: Self, b: Self) -> Self {
        match (a, b) {
            (Named::Given(mut x), Named::Given(y)) => {
                x.extend(y);
                Named::Given(x)
            }
            (Named::Given(x), Named::Inferred(_)) | (Named::Inferred(_), Named::Given(x)) => {
                Named::Given(x)
            }
            (Named::Inferred(mut x), Named::Inferred(y)) => {
                x.extend(y);
                Named::Inferred(x)
            }
        }
    }

    /// Adds an inferred name. A no-op on `Given` name sets.
    pub fn add_inferred(&mut self, name: &str) {
        if let Named::Inferred(set) = self {
            set.insert(name.to_string());
        }
    }

    /// A representative spelling for naming: the alphabetically first entry.
    pub fn preferred(&self) -> Option<&str> {
        self.inner().iter().next().map(String::as_str)
    }
}

/// The properties and accumulated names of one class.
///
/// Property iteration order is the insertion order from the first sample
/// that contributed each property; unification appends new properties at
/// the end and never reorders existing ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassData {
    pub names: NameSet,
    pub properties: IndexMap<String, IrType>,
}

impl ClassData {
    pub fn new(names: NameSet) -> Self {
        Self { names, properties: IndexMap::new() }
    }

    /// Sorted property names, used as the structural key for class
    /// de-duplication.
    pub fn shape_key(&self) -> Vec<String> {
        let mut key: Vec<String> = self.properties.keys().cloned().collect();
        key.sort();
        key
    }
}

/// A closed set of string values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumData {
    pub names: NameSet,
    pub values: BTreeSet<String>,
}

impl EnumData {
    pub fn merge(a: Self, b: Self) -> Self {
        EnumData {
            names: Named::merge(a.names, b.names),
            values: &a.values | &b.values,
        }
    }
}

/// One slot of the class arena.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    /// Reserved or retired slot; nothing may reference it.
    Empty,
    Live(ClassData),
    /// Forwards to the class this one was unified into.
    Redirect(ClassId),
}

/// The closed family of graph types.
#[derive(Debug, Clone, PartialEq)]
pub enum IrType {
    /// Placeholder for a slot nothing has been observed in (e.g. the element
    /// type of an empty array). Erased during canonicalization.
    NoInformation,
    /// Top type; the conservative degradation for inputs the graph cannot
    /// describe more precisely.
    Any,
    Null,
    Integer,
    Double,
    Bool,
    String,
    Array(Box<IrType>),
    Class(ClassId),
    /// String-keyed homogeneous map, produced by demoting a class.
    Map(Box<IrType>),
    Enum(EnumData),
    Union(UnionRep),
}

impl IrType {
    /// A union holding exactly `Null`; how inference records an observed
    /// `null` value.
    pub fn null_union() -> IrType {
        let mut u = UnionRep::empty();
        u.insert_primitive(IrType::Null);
        IrType::Union(u)
    }
}

/// Arena of class entries plus the named entry points of the graph.
#[derive(Debug, Clone, Default)]
pub struct IrGraph {
    pub classes: Vec<Entry>,
    pub toplevels: IndexMap<String, IrType>,
}

impl IrGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a slot whose data will be supplied later. Translators use
    /// this to hand out a `ClassId` before recursing into the class body, so
    /// self-references resolve.
    pub fn reserve(&mut self) -> ClassId {
        let id = ClassId(self.classes.len());
        self.classes.push(Entry::Empty);
        id
    }

    pub fn alloc(&mut self, data: ClassData) -> ClassId {
        let id = ClassId(self.classes.len());
        self.classes.push(Entry::Live(data));
        id
    }

    /// Fills a reserved slot.
    pub fn fill(&mut self, id: ClassId, data: ClassData) {
        debug_assert!(matches!(self.classes[id.0], Entry::Empty));
        self.classes[id.0] = Entry::Live(data);
    }

    /// Walks redirects to the representative id. Chains are acyclic by
    /// construction: a redirect is only ever installed from a live entry to
    /// the live representative it was merged into.
    pub fn follow(&self, mut id: ClassId) -> ClassId {
        loop {
            match &self.classes[id.0] {
                Entry::Redirect(next) => id = *next,
                _ => return id,
            }
        }
    }

    /// Checked variant of [`IrGraph::follow`] used by integrity checks:
    /// bounds the walk by the arena length and requires a live terminus.
    pub fn try_follow(&self, mut id: ClassId) -> Result<ClassId, Error> {
        let origin = id;
        for _ in 0..=self.classes.len() {
            match self.classes.get(id.0) {
                Some(Entry::Redirect(next)) => id = *next,
                Some(Entry::Live(_)) => return Ok(id),
                Some(Entry::Empty) | None => return Err(Error::EmptyClassEntry(origin.0)),
            }
        }
        Err(Error::BrokenRedirect(origin.0))
    }

    pub fn class_data(&self, id: ClassId) -> &ClassData {
        let id = self.follow(id);
        match &self.classes[id.0] {
            Entry::Live(data) => data,
            _ => unreachable!("follow() terminates at a live entry"),
        }
    }

    pub fn class_data_mut(&mut self, id: ClassId) -> &mut ClassData {
        let id = self.follow(id);
        match &mut self.classes[id.0] {
            Entry::Live(data) => data,
            _ => unreachable!("follow() terminates at a live entry"),
        }
    }

    /// Redirects `from` to `to`, returning the evicted data. `from` must be
    /// live and distinct from `to`.
    pub fn redirect(&mut self, from: ClassId, to: ClassId) -> ClassData {
        debug_assert_ne!(from, to);
        match std::mem::replace(&mut self.classes[from.0], Entry::Redirect(to)) {
            Entry::Live(data) => data,
            other => {
                self.classes[from.0] = other;
                unreachable!("only live entries are redirected")
            }
        }
    }

    /// Ids of all live entries, in arena order.
    pub fn live_classes(&self) -> Vec<ClassId> {
        self.classes
            .iter()
            .enumerate()
            .filter_map(|(i, e)| matches!(e, Entry::Live(_)).then_some(ClassId(i)))
            .collect()
    }

    pub fn add_toplevel(&mut self, name: &str, ty: IrType) {
        self.toplevels.insert(name.to_string(), ty);
    }
}
