//! JSON Schema (draft-6 subset) to graph translation.
//!
//! The translator drives the same [`Inference`] session as the sample
//! inferencer, so schema-derived types unify with sample-derived ones and
//! land in one arena. Unsupported constructs never abort: they degrade to
//! the least-specific compatible type and leave a [`Diagnostic`] behind.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Diagnostic, Error};
use crate::graph::{ClassData, EnumData, IrType, NameSet};
use crate::inference::Inference;
use crate::naming::singular;
use crate::path_de;

/// The schema keywords this generator models. Unknown keys are ignored;
/// a few recognized-but-unsupported ones are kept so they can be reported.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SchemaDoc {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub ty: Option<TypeField>,
    pub properties: Option<IndexMap<String, SchemaDoc>>,
    pub required: Option<Vec<String>>,
    pub items: Option<ItemsField>,
    #[serde(rename = "enum")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(rename = "additionalProperties")]
    pub additional_properties: Option<Value>,
    #[serde(rename = "oneOf")]
    pub one_of: Option<Vec<SchemaDoc>>,
    #[serde(rename = "anyOf")]
    pub any_of: Option<Vec<SchemaDoc>>,
    #[serde(rename = "allOf")]
    pub all_of: Option<Vec<SchemaDoc>>,
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
    pub definitions: Option<BTreeMap<String, SchemaDoc>>,
    #[serde(rename = "$defs")]
    pub defs: Option<BTreeMap<String, SchemaDoc>>,

    // Recognized so their presence can be diagnosed.
    pub pattern: Option<String>,
    pub minimum: Option<Value>,
    pub maximum: Option<Value>,
    #[serde(rename = "patternProperties")]
    pub pattern_properties: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TypeField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ItemsField {
    One(Box<SchemaDoc>),
    Many(Vec<SchemaDoc>),
}

/// Translates a parsed JSON Schema document into a top level of the graph.
pub fn translate_schema(
    inf: &mut Inference,
    toplevel: &str,
    document: &Value,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), Error> {
    let doc: SchemaDoc = path_de::from_value_with_path(document.clone())
        .map_err(|message| Error::MalformedInput { kind: "JSON Schema", message })?;
    let t = {
        let mut translator =
            Translator { inf: &mut *inf, root: &doc, resolved: BTreeMap::new(), diagnostics };
        translator.translate(&doc, toplevel, "#")
    };
    inf.graph_mut().add_toplevel(toplevel, t);
    Ok(())
}

struct Translator<'a> {
    inf: &'a mut Inference,
    root: &'a SchemaDoc,
    /// `$ref` path -> translated type. Entries are inserted before the
    /// target body is translated so reference cycles terminate.
    resolved: BTreeMap<String, IrType>,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl Translator<'_> {
    fn translate(&mut self, doc: &SchemaDoc, name: &str, at: &str) -> IrType {
        if let Some(path) = &doc.reference {
            return self.resolve_ref(path, at);
        }
        if let Some(values) = &doc.enum_values {
            return self.translate_enum(doc, values, name, at);
        }
        if let Some(arms) = &doc.all_of {
            self.report(at, format!("allOf with {} schemas is not supported", arms.len()));
            return IrType::Any;
        }
        if let Some(arms) = doc.one_of.as_ref().or(doc.any_of.as_ref()) {
            let mut acc = IrType::NoInformation;
            for (idx, arm) in arms.iter().enumerate() {
                let t = self.translate(arm, name, &format!("{at}/oneOf/{idx}"));
                acc = self.inf.unify(acc, t);
            }
            return acc;
        }

        match &doc.ty {
            Some(TypeField::One(kind)) => self.translate_typed(doc, kind, name, at),
            Some(TypeField::Many(kinds)) => {
                let mut acc = IrType::NoInformation;
                for kind in kinds {
                    let t = self.translate_typed(doc, kind, name, at);
                    acc = self.inf.unify(acc, t);
                }
                acc
            }
            None => {
                if doc.properties.is_some() || doc.additional_properties.is_some() {
                    self.translate_object(doc, name, at)
                } else if doc.items.is_some() {
                    self.translate_array(doc, name, at)
                } else {
                    IrType::Any
                }
            }
        }
    }

    fn translate_typed(&mut self, doc: &SchemaDoc, kind: &str, name: &str, at: &str) -> IrType {
        match kind {
            "string" => {
                if doc.pattern.is_some() {
                    self.report(at, "pattern constraints are not supported; using a plain string");
                }
                IrType::String
            }
            "integer" | "number" => {
                if doc.minimum.is_some() || doc.maximum.is_some() {
                    self.report(at, "numeric range constraints are not supported");
                }
                if kind == "integer" {
                    IrType::Integer
                } else {
                    IrType::Double
                }
            }
            "boolean" => IrType::Bool,
            "null" => IrType::null_union(),
            "array" => self.translate_array(doc, name, at),
            "object" => self.translate_object(doc, name, at),
            other => {
                self.report(at, format!("unknown type keyword `{other}`"));
                IrType::Any
            }
        }
    }

    fn translate_array(&mut self, doc: &SchemaDoc, name: &str, at: &str) -> IrType {
        let elem_name = singular(name);
        let elem = match &doc.items {
            None => IrType::NoInformation,
            Some(ItemsField::One(items)) => {
                self.translate(items, &elem_name, &format!("{at}/items"))
            }
            Some(ItemsField::Many(items)) => {
                self.report(at, "positional item schemas are merged into one element type");
                let mut acc = IrType::NoInformation;
                for (idx, item) in items.iter().enumerate() {
                    let t = self.translate(item, &elem_name, &format!("{at}/items/{idx}"));
                    acc = self.inf.unify(acc, t);
                }
                acc
            }
        };
        IrType::Array(Box::new(elem))
    }

    fn translate_object(&mut self, doc: &SchemaDoc, name: &str, at: &str) -> IrType {
        if doc.pattern_properties.is_some() {
            self.report(at, "patternProperties are ignored");
        }
        let has_named = doc.properties.as_ref().map(|p| !p.is_empty()).unwrap_or(false);

        // `additionalProperties` with no named properties is a map.
        if !has_named {
            if let Some(additional) = &doc.additional_properties {
                match additional {
                    Value::Bool(false) => {}
                    Value::Bool(true) => return IrType::Map(Box::new(IrType::Any)),
                    Value::Object(_) => {
                        let sub: SchemaDoc = match path_de::from_value_with_path(additional.clone())
                        {
                            Ok(sub) => sub,
                            Err(message) => {
                                self.report(at, format!("bad additionalProperties schema: {message}"));
                                return IrType::Map(Box::new(IrType::Any));
                            }
                        };
                        let elem = self.translate(
                            &sub,
                            &singular(name),
                            &format!("{at}/additionalProperties"),
                        );
                        return IrType::Map(Box::new(elem));
                    }
                    other => {
                        self.report(at, format!("unexpected additionalProperties value {other}"));
                    }
                }
            }
        } else if matches!(doc.additional_properties, Some(Value::Object(_))) {
            self.report(at, "additionalProperties alongside named properties is ignored");
        }

        let data = self.class_data_of(doc, name, at);
        self.inf.intern_class(data)
    }

    /// Builds the class body for an object schema. An absent or incomplete
    /// `required` list makes the missing properties nullable.
    fn class_data_of(&mut self, doc: &SchemaDoc, name: &str, at: &str) -> ClassData {
        let names = match &doc.title {
            Some(title) if !title.trim().is_empty() => NameSet::single_given(title.trim()),
            _ => NameSet::single_inferred(name),
        };
        let required: Vec<&str> = doc
            .required
            .as_ref()
            .map(|r| r.iter().map(String::as_str).collect())
            .unwrap_or_default();

        let mut data = ClassData::new(names);
        if let Some(props) = &doc.properties {
            for (key, sub) in props {
                let mut t = self.translate(sub, key, &format!("{at}/properties/{key}"));
                if !required.contains(&key.as_str()) {
                    t = self.inf.unify(t, IrType::null_union());
                }
                data.properties.insert(key.clone(), t);
            }
        }
        data
    }

    fn translate_enum(
        &mut self,
        doc: &SchemaDoc,
        values: &[Value],
        name: &str,
        at: &str,
    ) -> IrType {
        let mut strings = std::collections::BTreeSet::new();
        for v in values {
            match v {
                Value::String(s) => {
                    strings.insert(s.clone());
                }
                other => {
                    self.report(at, format!("non-string enum value {other} is not supported"));
                    return IrType::Any;
                }
            }
        }
        let names = match &doc.title {
            Some(title) if !title.trim().is_empty() => NameSet::single_given(title.trim()),
            _ => NameSet::single_inferred(name),
        };
        IrType::Enum(EnumData { names, values: strings })
    }

    /// Resolves a local `$ref`. Object targets reserve their arena slot
    /// before the body is translated so that cyclic schemas come out as
    /// cyclic class references.
    fn resolve_ref(&mut self, path: &str, at: &str) -> IrType {
        if let Some(t) = self.resolved.get(path) {
            return t.clone();
        }
        let (segment, target) = match lookup_ref(self.root, path) {
            Some(found) => found,
            None => {
                self.report(at, format!("cannot resolve $ref `{path}`"));
                return IrType::Any;
            }
        };
        if is_object_schema(target) {
            let id = self.inf.graph_mut().reserve();
            self.resolved.insert(path.to_string(), IrType::Class(id));
            let data = self.class_data_of(target, &segment, path);
            self.inf.graph_mut().fill(id, data);
            IrType::Class(id)
        } else {
            // Provisional entry so a cycle through a non-object construct
            // terminates instead of recursing forever.
            self.resolved.insert(path.to_string(), IrType::Any);
            let t = self.translate(target, &segment, path);
            self.resolved.insert(path.to_string(), t.clone());
            t
        }
    }

    fn report(&mut self, at: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(at, message));
    }
}

fn is_object_schema(doc: &SchemaDoc) -> bool {
    matches!(&doc.ty, Some(TypeField::One(k)) if k == "object") || doc.properties.is_some()
}

/// Supports the two local spellings, `#/definitions/X` and `#/$defs/X`.
fn lookup_ref<'a>(root: &'a SchemaDoc, path: &str) -> Option<(String, &'a SchemaDoc)> {
    let rest = path.strip_prefix("#/")?;
    let (bucket, key) = rest.split_once('/')?;
    let map = match bucket {
        "definitions" => root.definitions.as_ref()?,
        "$defs" => root.defs.as_ref()?,
        _ => return None,
    };
    map.get(key).map(|doc| (key.to_string(), doc))
}
