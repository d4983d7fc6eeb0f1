//! Renderer-independent emission scaffolding.
//!
//! The scaffolding walks the canonical graph in a deterministic order,
//! assigns collision-free names through the naming framework, and exposes
//! iteration primitives to the per-language renderers. A renderer is a
//! plugin over the capability set: keyword list, namers, and
//! `emit_source_structure`.

pub mod golang;
pub mod json_schema;
pub mod typescript;

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Error;
use crate::graph::{ClassId, EnumData, IrGraph, IrType};
use crate::naming::{Name, NameId, Namer, Namespaces};
use crate::union::UnionRep;

/// Blank-line discipline between emitted items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlankPolicy {
    None,
    /// Blank line before every item, the first included.
    BetweenAll,
    /// Blank line only between items, not around them.
    Interposing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Annotation {
    /// User-visible problem in the generated artifact.
    Issue(String),
    /// Advisory note.
    Hover(String),
}

/// Line range an annotation is attached to (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedRenderResult {
    pub lines: Vec<String>,
    pub annotations: Vec<(Span, Annotation)>,
}

/// A type the renderer must materialize as a distinct named entity.
/// Anything else is rendered inline; that a "named type" is always one of
/// these three is enforced here, not by runtime checks at use sites.
#[derive(Debug, Clone)]
pub enum NamedType {
    Class(ClassId),
    Enum(EnumData),
    Union(UnionRep),
}

/// The per-language capability set. The scaffolding is parameterized over
/// this trait; it never inspects language syntax itself.
pub trait TargetLanguage: Sync {
    fn name(&self) -> &'static str;
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }
    fn keywords(&self) -> &'static [&'static str];
    fn top_level_namer(&self) -> Namer;
    fn named_type_namer(&self) -> Namer;
    fn property_namer(&self) -> Namer;

    /// Which named type, if any, should adopt a top level's name outright.
    fn named_type_for_top_level(&self, graph: &IrGraph, t: &IrType) -> Option<NamedType> {
        match t {
            IrType::Class(id) => Some(NamedType::Class(graph.follow(*id))),
            IrType::Enum(e) => Some(NamedType::Enum(e.clone())),
            IrType::Union(u) if is_named_union(u) => Some(NamedType::Union(u.clone())),
            _ => None,
        }
    }

    fn emit_source_structure(&self, ctx: &mut RenderContext) -> Result<(), Error>;
}

static LANGUAGES: [&dyn TargetLanguage; 3] =
    [&typescript::TypeScript, &golang::Golang, &json_schema::JsonSchemaLang];

pub fn lookup_language(name: &str) -> Result<&'static dyn TargetLanguage, Error> {
    let wanted = name.to_ascii_lowercase();
    for lang in LANGUAGES {
        if lang.name() == wanted || lang.aliases().contains(&wanted.as_str()) {
            return Ok(lang);
        }
    }
    Err(Error::UnknownLanguage(name.to_string()))
}

/// Renders a canonical graph with the given language plugin.
pub fn render(
    graph: &IrGraph,
    lang: &dyn TargetLanguage,
    options: &BTreeMap<String, String>,
) -> Result<SerializedRenderResult, Error> {
    let mut ctx = RenderContext::build(graph, lang, options)?;
    lang.emit_source_structure(&mut ctx)?;
    Ok(ctx.into_result())
}

/// A union is worth a name of its own once it has at least two non-null
/// inhabitants; a bare nullable wrapper is rendered inline.
pub fn is_named_union(u: &UnionRep) -> bool {
    u.members().iter().filter(|m| !matches!(m, IrType::Null)).count() >= 2
}

/// Stable structural key used to de-duplicate value-carried named types.
fn type_key(graph: &IrGraph, t: &IrType) -> String {
    match t {
        IrType::NoInformation => "none".to_string(),
        IrType::Any => "any".to_string(),
        IrType::Null => "null".to_string(),
        IrType::Integer => "integer".to_string(),
        IrType::Double => "double".to_string(),
        IrType::Bool => "bool".to_string(),
        IrType::String => "string".to_string(),
        IrType::Array(e) => format!("array({})", type_key(graph, e)),
        IrType::Class(i) => format!("class({})", graph.follow(*i).0),
        IrType::Map(e) => format!("map({})", type_key(graph, e)),
        IrType::Enum(e) => {
            let values: Vec<&str> = e.values.iter().map(String::as_str).collect();
            format!("enum({})", values.join(","))
        }
        IrType::Union(u) => {
            let keys: Vec<String> =
                u.members().iter().map(|m| type_key(graph, m)).collect();
            format!("union({})", keys.join("|"))
        }
    }
}

// ------------------------- Named-type collection ------------------------- //

#[derive(Default)]
struct NamedTypes {
    classes: Vec<ClassId>,
    enums: Vec<(String, EnumData)>,
    unions: Vec<(String, UnionRep)>,
}

fn collect_named(graph: &IrGraph) -> NamedTypes {
    let mut out = NamedTypes::default();
    let mut seen_classes: BTreeSet<ClassId> = BTreeSet::new();
    let mut seen_keys: BTreeSet<String> = BTreeSet::new();
    for t in graph.toplevels.values() {
        visit(graph, t, &mut out, &mut seen_classes, &mut seen_keys);
    }
    out
}

fn visit(
    graph: &IrGraph,
    t: &IrType,
    out: &mut NamedTypes,
    seen_classes: &mut BTreeSet<ClassId>,
    seen_keys: &mut BTreeSet<String>,
) {
    match t {
        IrType::Class(id) => {
            let id = graph.follow(*id);
            if seen_classes.insert(id) {
                out.classes.push(id);
                let props: Vec<IrType> =
                    graph.class_data(id).properties.values().cloned().collect();
                for p in &props {
                    visit(graph, p, out, seen_classes, seen_keys);
                }
            }
        }
        IrType::Array(e) | IrType::Map(e) => visit(graph, e, out, seen_classes, seen_keys),
        IrType::Enum(e) => {
            let key = type_key(graph, t);
            if seen_keys.insert(key.clone()) {
                out.enums.push((key, e.clone()));
            }
        }
        IrType::Union(u) => {
            if is_named_union(u) {
                let key = type_key(graph, t);
                if seen_keys.insert(key.clone()) {
                    out.unions.push((key, u.clone()));
                }
            }
            for member in u.members() {
                if !matches!(member, IrType::Union(_)) {
                    visit(graph, &member, out, seen_classes, seen_keys);
                }
            }
        }
        _ => {}
    }
}

// ----------------------------- Render context ---------------------------- //

pub struct RenderContext<'g> {
    pub graph: &'g IrGraph,
    pub options: &'g BTreeMap<String, String>,

    toplevel_names: Vec<(String, String)>,
    classes: Vec<ClassId>,
    class_names: BTreeMap<ClassId, String>,
    enums: Vec<(String, EnumData)>,
    enum_names: BTreeMap<String, String>,
    unions: Vec<(String, UnionRep)>,
    union_names: BTreeMap<String, String>,
    property_names: BTreeMap<(ClassId, String), String>,

    lines: Vec<String>,
    annotations: Vec<(Span, Annotation)>,
    indent: usize,
}

impl<'g> RenderContext<'g> {
    fn build(
        graph: &'g IrGraph,
        lang: &dyn TargetLanguage,
        options: &'g BTreeMap<String, String>,
    ) -> Result<Self, Error> {
        let named = collect_named(graph);

        let mut names = Namespaces::new();
        let global = names.add_namespace(None, lang.keywords());

        // Top levels claim their names first; a named type that *is* a top
        // level shares the top level's name id instead of competing for the
        // spelling.
        let mut toplevel_ids: Vec<(String, NameId)> = Vec::new();
        let mut adopted_classes: BTreeMap<ClassId, NameId> = BTreeMap::new();
        let mut adopted_keys: BTreeMap<String, NameId> = BTreeMap::new();
        for (orig, t) in &graph.toplevels {
            let id = names.add_name(
                global,
                Name::Simple { raw: orig.clone(), namer: lang.top_level_namer() },
            );
            toplevel_ids.push((orig.clone(), id));
            match lang.named_type_for_top_level(graph, t) {
                Some(NamedType::Class(c)) => {
                    adopted_classes.entry(c).or_insert(id);
                }
                Some(NamedType::Enum(_)) | Some(NamedType::Union(_)) => {
                    adopted_keys.entry(type_key(graph, t)).or_insert(id);
                }
                None => {}
            }
        }

        let type_namer = lang.named_type_namer();
        let mut class_ids: BTreeMap<ClassId, NameId> = BTreeMap::new();
        for id in &named.classes {
            let name_id = match adopted_classes.get(id) {
                Some(shared) => *shared,
                None => {
                    let raw = graph
                        .class_data(*id)
                        .names
                        .preferred()
                        .unwrap_or("anything")
                        .to_string();
                    names.add_name(global, Name::Simple { raw, namer: type_namer })
                }
            };
            class_ids.insert(*id, name_id);
        }

        let mut enum_ids: BTreeMap<String, NameId> = BTreeMap::new();
        for (key, e) in &named.enums {
            let name_id = match adopted_keys.get(key) {
                Some(shared) => *shared,
                None => {
                    let raw = e.names.preferred().unwrap_or("value").to_string();
                    names.add_name(global, Name::Simple { raw, namer: type_namer })
                }
            };
            enum_ids.insert(key.clone(), name_id);
        }

        let mut union_ids: BTreeMap<String, NameId> = BTreeMap::new();
        for (key, u) in &named.unions {
            let name_id = match adopted_keys.get(key) {
                Some(shared) => *shared,
                None => {
                    let raw = u.names.preferred().unwrap_or("one_of").to_string();
                    names.add_name(global, Name::Simple { raw, namer: type_namer })
                }
            };
            union_ids.insert(key.clone(), name_id);
        }

        // Properties live in one namespace per class, under the global one
        // so language keywords stay forbidden.
        let property_namer = lang.property_namer();
        let mut property_ids: BTreeMap<(ClassId, String), NameId> = BTreeMap::new();
        for id in &named.classes {
            let ns = names.add_namespace(Some(global), &[]);
            let json_names: Vec<String> =
                graph.class_data(*id).properties.keys().cloned().collect();
            for json in json_names {
                let name_id = names.add_name(
                    ns,
                    Name::Simple { raw: json.clone(), namer: property_namer },
                );
                property_ids.insert((*id, json), name_id);
            }
        }

        names.resolve()?;

        let spelling = |id: NameId| -> Result<String, Error> {
            names.spelling(id).map(str::to_string)
        };

        let mut ctx = RenderContext {
            graph,
            options,
            toplevel_names: Vec::new(),
            classes: named.classes,
            class_names: BTreeMap::new(),
            enums: named.enums,
            enum_names: BTreeMap::new(),
            unions: named.unions,
            union_names: BTreeMap::new(),
            property_names: BTreeMap::new(),
            lines: Vec::new(),
            annotations: Vec::new(),
            indent: 0,
        };
        for (orig, id) in toplevel_ids {
            let resolved = spelling(id)?;
            ctx.toplevel_names.push((orig, resolved));
        }
        for (class, id) in class_ids {
            ctx.class_names.insert(class, spelling(id)?);
        }
        for (key, id) in enum_ids {
            ctx.enum_names.insert(key, spelling(id)?);
        }
        for (key, id) in union_ids {
            ctx.union_names.insert(key, spelling(id)?);
        }
        for ((class, json), id) in property_ids {
            ctx.property_names.insert((class, json), spelling(id)?);
        }
        Ok(ctx)
    }

    // ----------------------------- Iteration ----------------------------- //

    pub fn for_each_top_level(
        &mut self,
        blank: BlankPolicy,
        mut f: impl FnMut(&mut Self, &IrType, &str) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let items: Vec<(IrType, String)> = self
            .toplevel_names
            .iter()
            .map(|(orig, resolved)| (self.graph.toplevels[orig].clone(), resolved.clone()))
            .collect();
        for (idx, (t, name)) in items.iter().enumerate() {
            self.apply_blank(blank, idx);
            f(self, t, name)?;
        }
        Ok(())
    }

    pub fn for_each_class(
        &mut self,
        blank: BlankPolicy,
        mut f: impl FnMut(&mut Self, ClassId, &str) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let items: Vec<(ClassId, String)> = self
            .classes
            .iter()
            .map(|id| (*id, self.class_names[id].clone()))
            .collect();
        for (idx, (id, name)) in items.iter().enumerate() {
            self.apply_blank(blank, idx);
            f(self, *id, name)?;
        }
        Ok(())
    }

    pub fn for_each_enum(
        &mut self,
        blank: BlankPolicy,
        mut f: impl FnMut(&mut Self, &EnumData, &str) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let items: Vec<(EnumData, String)> = self
            .enums
            .iter()
            .map(|(key, e)| (e.clone(), self.enum_names[key].clone()))
            .collect();
        for (idx, (e, name)) in items.iter().enumerate() {
            self.apply_blank(blank, idx);
            f(self, e, name)?;
        }
        Ok(())
    }

    pub fn for_each_union(
        &mut self,
        blank: BlankPolicy,
        mut f: impl FnMut(&mut Self, &UnionRep, &str) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let items: Vec<(UnionRep, String)> = self
            .unions
            .iter()
            .map(|(key, u)| (u.clone(), self.union_names[key].clone()))
            .collect();
        for (idx, (u, name)) in items.iter().enumerate() {
            self.apply_blank(blank, idx);
            f(self, u, name)?;
        }
        Ok(())
    }

    pub fn for_each_named_type(
        &mut self,
        blank: BlankPolicy,
        mut f: impl FnMut(&mut Self, &NamedType, &str) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let mut items: Vec<(NamedType, String)> = Vec::new();
        for id in &self.classes {
            items.push((NamedType::Class(*id), self.class_names[id].clone()));
        }
        for (key, e) in &self.enums {
            items.push((NamedType::Enum(e.clone()), self.enum_names[key].clone()));
        }
        for (key, u) in &self.unions {
            items.push((NamedType::Union(u.clone()), self.union_names[key].clone()));
        }
        for (idx, (t, name)) in items.iter().enumerate() {
            self.apply_blank(blank, idx);
            f(self, t, name)?;
        }
        Ok(())
    }

    /// Iterates a class's properties in a stable order, sorted by the final
    /// resolved property name.
    pub fn for_each_property(
        &mut self,
        class: ClassId,
        blank: BlankPolicy,
        mut f: impl FnMut(&mut Self, &str, &str, &IrType) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let class = self.graph.follow(class);
        let mut items: Vec<(String, String, IrType)> = self
            .graph
            .class_data(class)
            .properties
            .iter()
            .map(|(json, t)| {
                (self.property_names[&(class, json.clone())].clone(), json.clone(), t.clone())
            })
            .collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        for (idx, (name, json, t)) in items.iter().enumerate() {
            self.apply_blank(blank, idx);
            f(self, name, json, t)?;
        }
        Ok(())
    }

    /// Looks up the resolved name of a named type; never creates one.
    pub fn name_for_named_type(&self, t: &NamedType) -> Result<&str, Error> {
        match t {
            NamedType::Class(id) => {
                let id = self.graph.follow(*id);
                self.class_names
                    .get(&id)
                    .map(String::as_str)
                    .ok_or_else(|| Error::UnresolvedName(format!("class {id}")))
            }
            NamedType::Enum(e) => {
                let key = type_key(self.graph, &IrType::Enum(e.clone()));
                self.enum_names
                    .get(&key)
                    .map(String::as_str)
                    .ok_or_else(|| Error::UnresolvedName(key))
            }
            NamedType::Union(u) => {
                let key = type_key(self.graph, &IrType::Union(u.clone()));
                self.union_names
                    .get(&key)
                    .map(String::as_str)
                    .ok_or_else(|| Error::UnresolvedName(key))
            }
        }
    }

    // ------------------------------ Emission ------------------------------ //

    pub fn emit_line(&mut self, line: impl AsRef<str>) {
        let line = line.as_ref();
        if line.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{line}", "    ".repeat(self.indent)));
        }
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn unindent(&mut self) {
        debug_assert!(self.indent > 0);
        self.indent = self.indent.saturating_sub(1);
    }

    /// Emits a blank line unless the previous line is already blank.
    pub fn ensure_blank(&mut self) {
        if self.lines.last().map(|l| !l.is_empty()).unwrap_or(false) {
            self.lines.push(String::new());
        }
    }

    fn apply_blank(&mut self, blank: BlankPolicy, index: usize) {
        match blank {
            BlankPolicy::None => {}
            BlankPolicy::BetweenAll => self.ensure_blank(),
            BlankPolicy::Interposing => {
                if index > 0 {
                    self.ensure_blank();
                }
            }
        }
    }

    /// Attaches an annotation to the most recently emitted line.
    pub fn annotate(&mut self, annotation: Annotation) {
        let line = self.lines.len().saturating_sub(1);
        self.annotations.push((Span { start_line: line, end_line: line }, annotation));
    }

    pub fn into_result(self) -> SerializedRenderResult {
        SerializedRenderResult { lines: self.lines, annotations: self.annotations }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::canonical::canonicalize;
    use crate::inference::Inference;

    fn canonical_graph(sample: serde_json::Value) -> IrGraph {
        let mut inf = Inference::new();
        inf.infer_toplevel("Root", &sample);
        let mut graph = inf.into_graph();
        canonicalize(&mut graph, true);
        graph
    }

    #[test]
    fn unknown_language_is_fatal() {
        assert!(matches!(lookup_language("cobol"), Err(Error::UnknownLanguage(_))));
    }

    #[test]
    fn language_aliases_resolve() {
        assert_eq!(lookup_language("ts").unwrap().name(), "typescript");
        assert_eq!(lookup_language("Go").unwrap().name(), "golang");
    }

    #[test]
    fn toplevel_class_adopts_the_toplevel_name() {
        let graph = canonical_graph(json!({ "a": 1 }));
        let lang = lookup_language("typescript").unwrap();
        let options = BTreeMap::new();
        let ctx = RenderContext::build(&graph, lang, &options).unwrap();
        let class = ctx.classes[0];
        assert_eq!(ctx.class_names[&class], "Root");
    }

    #[test]
    fn rendering_twice_is_byte_identical() {
        let graph = canonical_graph(json!({
            "name": "x",
            "points": [{ "x": 1, "y": 2 }, { "x": 3, "y": 4 }],
            "flag": true
        }));
        let lang = lookup_language("typescript").unwrap();
        let first = render(&graph, lang, &BTreeMap::new()).unwrap();
        let second = render(&graph, lang, &BTreeMap::new()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn properties_iterate_sorted_by_resolved_name() {
        let graph = canonical_graph(json!({ "zeta": 1, "alpha": 2, "Mid": 3 }));
        let lang = lookup_language("typescript").unwrap();
        let options = BTreeMap::new();
        let mut ctx = RenderContext::build(&graph, lang, &options).unwrap();
        let class = ctx.classes[0];
        let mut seen = Vec::new();
        ctx.for_each_property(class, BlankPolicy::None, |_, name, _, _| {
            seen.push(name.to_string());
            Ok(())
        })
        .unwrap();
        let mut sorted = seen.clone();
        sorted.sort();
        assert_eq!(seen, sorted);
    }

    #[test]
    fn blank_policies_differ_around_edges() {
        let graph = canonical_graph(json!({ "a": 1 }));
        let lang = lookup_language("typescript").unwrap();
        let options = BTreeMap::new();

        let mut ctx = RenderContext::build(&graph, lang, &options).unwrap();
        ctx.emit_line("head");
        ctx.for_each_top_level(BlankPolicy::Interposing, |ctx, _, name| {
            ctx.emit_line(name);
            Ok(())
        })
        .unwrap();
        assert_eq!(ctx.lines, vec!["head", "Root"]);

        let mut ctx = RenderContext::build(&graph, lang, &options).unwrap();
        ctx.emit_line("head");
        ctx.for_each_top_level(BlankPolicy::BetweenAll, |ctx, _, name| {
            ctx.emit_line(name);
            Ok(())
        })
        .unwrap();
        assert_eq!(ctx.lines, vec!["head", "", "Root"]);
    }
}
