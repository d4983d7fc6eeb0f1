//! Collision-free identifier assignment.
//!
//! Names live in a forest of namespaces. Each namespace is seeded with the
//! target language's reserved words and inherits the forbidden spellings of
//! its ancestors; sibling namespaces (e.g. the properties of two different
//! classes) do not constrain each other.
//!
//! Resolution is a single fixed-point pass: any name whose dependencies are
//! resolved gets its final spelling, until nothing is left. Failure to
//! converge means a cyclic `Dependent` chain, which is a bug in the caller,
//! not in the input data.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::Error;

// ------------------------------ Word forms ------------------------------ //

/// Conservative ASCII depluralizer for array/map element names:
/// `entries` -> `entry`, `boxes` -> `box`, `tags` -> `tag`. Anything
/// non-ASCII or non-plural-looking passes through unchanged.
pub fn singular(name: &str) -> String {
    if !name.is_ascii() {
        return name.to_string();
    }
    if let Some(stem) = name.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{stem}y");
        }
    }
    if let Some(stem) = name.strip_suffix("es") {
        if stem.ends_with('s')
            || stem.ends_with('x')
            || stem.ends_with('z')
            || stem.ends_with("ch")
            || stem.ends_with("sh")
        {
            return stem.to_string();
        }
    }
    if name.len() > 1 && name.ends_with('s') && !name.ends_with("ss") {
        return name[..name.len() - 1].to_string();
    }
    name.to_string()
}

fn split_words(s: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in s.chars() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    if words.is_empty() {
        words.push("empty".to_string());
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
    }
}

pub fn pascal_case(s: &str) -> String {
    let out: String = split_words(s).iter().map(|w| capitalize(w)).collect();
    guard_leading_digit(out, "The")
}

pub fn camel_case(s: &str) -> String {
    let words = split_words(s);
    let mut out = words[0].to_ascii_lowercase();
    for w in &words[1..] {
        out.push_str(&capitalize(w));
    }
    guard_leading_digit(out, "the")
}

pub fn snake_case(s: &str) -> String {
    let out = split_words(s)
        .iter()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_");
    guard_leading_digit(out, "_")
}

fn guard_leading_digit(s: String, pad: &str) -> String {
    match s.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("{pad}{s}"),
        _ => s,
    }
}

// -------------------------------- Namers -------------------------------- //

/// A styling rule plus the escape hatches used when the styled spelling is
/// taken: each prefix is tried in order, then a numeric suffix from 2 up.
#[derive(Debug, Clone, Copy)]
pub struct Namer {
    pub style: fn(&str) -> String,
    pub prefixes: &'static [&'static str],
}

impl Namer {
    pub fn new(style: fn(&str) -> String) -> Self {
        Namer { style, prefixes: &[] }
    }

    pub fn with_prefixes(style: fn(&str) -> String, prefixes: &'static [&'static str]) -> Self {
        Namer { style, prefixes }
    }

    pub fn assign(&self, raw: &str, forbidden: &BTreeSet<String>) -> String {
        let base = (self.style)(raw);
        if !forbidden.contains(&base) {
            return base;
        }
        for prefix in self.prefixes {
            let candidate = (self.style)(&format!("{prefix} {raw}"));
            if !forbidden.contains(&candidate) {
                return candidate;
            }
        }
        suffixed(&base, forbidden)
    }
}

fn suffixed(base: &str, forbidden: &BTreeSet<String>) -> String {
    for n in 2usize.. {
        let candidate = format!("{base}{n}");
        if !forbidden.contains(&candidate) {
            return candidate;
        }
    }
    unreachable!("forbidden set is finite")
}

// --------------------------- Names and namespaces ------------------------ //

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NameId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceId(pub usize);

pub enum Name {
    /// A literal final spelling; never restyled or uniqued.
    Fixed(String),
    /// A raw name to be styled by `namer`, avoiding collisions.
    Simple { raw: String, namer: Namer },
    /// Assembled from other resolved names; uniqued with a numeric suffix
    /// if the assembled spelling is taken.
    Dependent {
        parts: Vec<NameId>,
        assemble: fn(&[String]) -> String,
    },
}

struct NamespaceNode {
    parent: Option<NamespaceId>,
    keywords: BTreeSet<String>,
    members: Vec<NameId>,
}

#[derive(Default)]
pub struct Namespaces {
    nodes: Vec<NamespaceNode>,
    names: Vec<(NamespaceId, Name)>,
    assigned: Vec<Option<String>>,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_namespace(
        &mut self,
        parent: Option<NamespaceId>,
        keywords: &[&str],
    ) -> NamespaceId {
        let id = NamespaceId(self.nodes.len());
        self.nodes.push(NamespaceNode {
            parent,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            members: Vec::new(),
        });
        id
    }

    pub fn add_name(&mut self, ns: NamespaceId, name: Name) -> NameId {
        let id = NameId(self.names.len());
        self.names.push((ns, name));
        self.assigned.push(None);
        self.nodes[ns.0].members.push(id);
        id
    }

    /// Forbidden spellings for a namespace: its own and all ancestors'
    /// keywords, plus every spelling already assigned in that chain.
    fn forbidden_for(&self, ns: NamespaceId) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut cursor = Some(ns);
        while let Some(node_id) = cursor {
            let node = &self.nodes[node_id.0];
            out.extend(node.keywords.iter().cloned());
            for member in &node.members {
                if let Some(spelling) = &self.assigned[member.0] {
                    out.insert(spelling.clone());
                }
            }
            cursor = node.parent;
        }
        out
    }

    /// Assigns a final spelling to every name, in id order within each
    /// pass, until a fixed point.
    pub fn resolve(&mut self) -> Result<(), Error> {
        loop {
            let mut progressed = false;
            let mut remaining = 0usize;
            for id in 0..self.names.len() {
                if self.assigned[id].is_some() {
                    continue;
                }
                let ns = self.names[id].0;
                let spelling = match &self.names[id].1 {
                    Name::Fixed(s) => Some(s.clone()),
                    Name::Simple { raw, namer } => {
                        Some(namer.assign(raw, &self.forbidden_for(ns)))
                    }
                    Name::Dependent { parts, assemble } => {
                        if parts.iter().all(|p| self.assigned[p.0].is_some()) {
                            let resolved: Vec<String> = parts
                                .iter()
                                .map(|p| self.assigned[p.0].clone().expect("checked above"))
                                .collect();
                            let base = assemble(&resolved);
                            let forbidden = self.forbidden_for(ns);
                            Some(if forbidden.contains(&base) {
                                suffixed(&base, &forbidden)
                            } else {
                                base
                            })
                        } else {
                            None
                        }
                    }
                };
                match spelling {
                    Some(s) => {
                        self.assigned[id] = Some(s);
                        progressed = true;
                    }
                    None => remaining += 1,
                }
            }
            if remaining == 0 {
                debug!(names = self.names.len(), "name resolution converged");
                return Ok(());
            }
            if !progressed {
                return Err(Error::NameResolutionCycle(remaining));
            }
        }
    }

    pub fn spelling(&self, id: NameId) -> Result<&str, Error> {
        self.assigned[id.0]
            .as_deref()
            .ok_or_else(|| Error::UnresolvedName(format!("name {}", id.0)))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn singular_forms() {
        assert_eq!(singular("entries"), "entry");
        assert_eq!(singular("boxes"), "box");
        assert_eq!(singular("churches"), "church");
        assert_eq!(singular("tags"), "tag");
        assert_eq!(singular("address"), "address");
        assert_eq!(singular("s"), "s");
        assert_eq!(singular("données"), "données");
    }

    #[test]
    fn styles_split_on_case_and_separators() {
        assert_eq!(pascal_case("widget_settings"), "WidgetSettings");
        assert_eq!(pascal_case("fooBar"), "FooBar");
        assert_eq!(camel_case("Foo-bar baz"), "fooBarBaz");
        assert_eq!(snake_case("FooBar"), "foo_bar");
        assert_eq!(pascal_case("3d model"), "The3dModel");
        assert_eq!(pascal_case("--"), "Empty");
    }

    #[test]
    fn collisions_get_numeric_suffixes() {
        let mut names = Namespaces::new();
        let ns = names.add_namespace(None, &[]);
        let namer = Namer::new(pascal_case);
        let a = names.add_name(ns, Name::Simple { raw: "thing".into(), namer });
        let b = names.add_name(ns, Name::Simple { raw: "Thing".into(), namer });
        names.resolve().unwrap();
        assert_eq!(names.spelling(a).unwrap(), "Thing");
        assert_eq!(names.spelling(b).unwrap(), "Thing2");
    }

    #[test]
    fn prefixes_are_tried_before_suffixes() {
        let mut names = Namespaces::new();
        let ns = names.add_namespace(None, &["Type"]);
        let namer = Namer::with_prefixes(pascal_case, &["the"]);
        let id = names.add_name(ns, Name::Simple { raw: "type".into(), namer });
        names.resolve().unwrap();
        assert_eq!(names.spelling(id).unwrap(), "TheType");
    }

    #[test]
    fn keywords_are_inherited_from_ancestors() {
        let mut names = Namespaces::new();
        let root = names.add_namespace(None, &["class"]);
        let child = names.add_namespace(Some(root), &[]);
        let namer = Namer::new(snake_case);
        let id = names.add_name(child, Name::Simple { raw: "Class".into(), namer });
        names.resolve().unwrap();
        assert_eq!(names.spelling(id).unwrap(), "class2");
    }

    #[test]
    fn siblings_do_not_collide() {
        let mut names = Namespaces::new();
        let root = names.add_namespace(None, &[]);
        let left = names.add_namespace(Some(root), &[]);
        let right = names.add_namespace(Some(root), &[]);
        let namer = Namer::new(camel_case);
        let a = names.add_name(left, Name::Simple { raw: "value".into(), namer });
        let b = names.add_name(right, Name::Simple { raw: "value".into(), namer });
        names.resolve().unwrap();
        assert_eq!(names.spelling(a).unwrap(), "value");
        assert_eq!(names.spelling(b).unwrap(), "value");
    }

    #[test]
    fn dependent_names_wait_for_their_parts() {
        let mut names = Namespaces::new();
        let ns = names.add_namespace(None, &[]);
        let base = names.add_name(
            ns,
            Name::Simple { raw: "person".into(), namer: Namer::new(pascal_case) },
        );
        let derived = names.add_name(
            ns,
            Name::Dependent { parts: vec![base], assemble: |xs| format!("{}Element", xs[0]) },
        );
        names.resolve().unwrap();
        assert_eq!(names.spelling(derived).unwrap(), "PersonElement");
    }

    #[test]
    fn unresolvable_dependencies_are_fatal() {
        let mut names = Namespaces::new();
        let ns = names.add_namespace(None, &[]);
        // A Dependent part that is never added can never resolve; model the
        // cycle with a self-referential id.
        let id = names.add_name(
            ns,
            Name::Dependent { parts: vec![NameId(0)], assemble: |xs| xs[0].clone() },
        );
        assert_eq!(id, NameId(0));
        assert!(matches!(names.resolve(), Err(Error::NameResolutionCycle(1))));
    }
}
