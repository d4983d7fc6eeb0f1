//! GraphQL introspection (`__schema` result) to graph translation.
//!
//! Object and interface types become classes, enums become closed string
//! sets, and a GraphQL union's possible types all land in the single class
//! slot of a union — which unifies them into one class, per the graph's
//! "at most one of each kind" rule. Fields are nullable unless wrapped in
//! `NON_NULL`.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Diagnostic, Error};
use crate::graph::{ClassData, EnumData, IrType, NameSet};
use crate::inference::Inference;
use crate::path_de;

#[derive(Debug, Deserialize)]
struct IntrospectionDoc {
    #[serde(default)]
    data: Option<DataHolder>,
    #[serde(default, rename = "__schema")]
    schema: Option<SchemaBody>,
}

#[derive(Debug, Deserialize)]
struct DataHolder {
    #[serde(rename = "__schema")]
    schema: SchemaBody,
}

#[derive(Debug, Deserialize)]
struct SchemaBody {
    #[serde(default, rename = "queryType")]
    query_type: Option<RootTypeRef>,
    types: Vec<FullType>,
}

#[derive(Debug, Deserialize)]
struct RootTypeRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FullType {
    kind: String,
    name: Option<String>,
    #[serde(default)]
    fields: Option<Vec<FieldDef>>,
    #[serde(default, rename = "enumValues")]
    enum_values: Option<Vec<EnumValue>>,
    #[serde(default, rename = "possibleTypes")]
    possible_types: Option<Vec<TypeRef>>,
}

#[derive(Debug, Deserialize)]
struct FieldDef {
    name: String,
    #[serde(rename = "type")]
    ty: TypeRef,
}

#[derive(Debug, Deserialize)]
struct EnumValue {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TypeRef {
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "ofType")]
    of_type: Option<Box<TypeRef>>,
}

/// Translates an introspection result, with or without the usual
/// `{"data": ...}` response wrapper, into a top level rooted at the
/// schema's query type.
pub fn translate_graphql(
    inf: &mut Inference,
    toplevel: &str,
    document: &Value,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), Error> {
    let doc: IntrospectionDoc = path_de::from_value_with_path(document.clone())
        .map_err(|message| Error::MalformedInput { kind: "GraphQL introspection", message })?;
    let body = match (doc.data, doc.schema) {
        (Some(holder), _) => holder.schema,
        (None, Some(schema)) => schema,
        (None, None) => {
            return Err(Error::MalformedInput {
                kind: "GraphQL introspection",
                message: "no __schema object found".to_string(),
            })
        }
    };

    let types: BTreeMap<&str, &FullType> = body
        .types
        .iter()
        .filter_map(|t| t.name.as_deref().map(|n| (n, t)))
        .collect();

    let entry = match &body.query_type {
        Some(root) => root.name.clone(),
        None => {
            diagnostics.push(Diagnostic::new(
                "__schema",
                "no queryType; using the first object type",
            ));
            match body.types.iter().find(|t| t.kind == "OBJECT" && t.name.is_some()) {
                Some(t) => t.name.clone().unwrap_or_default(),
                None => {
                    return Err(Error::MalformedInput {
                        kind: "GraphQL introspection",
                        message: "schema declares no object types".to_string(),
                    })
                }
            }
        }
    };

    let t = {
        let mut translator =
            Translator { inf: &mut *inf, types, named: BTreeMap::new(), diagnostics };
        translator.named_type(&entry)
    };
    inf.graph_mut().add_toplevel(toplevel, t);
    Ok(())
}

struct Translator<'a> {
    inf: &'a mut Inference,
    types: BTreeMap<&'a str, &'a FullType>,
    /// Type name -> translated type; class ids are cached before their
    /// fields are translated so recursive schemas terminate.
    named: BTreeMap<String, IrType>,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl Translator<'_> {
    fn named_type(&mut self, name: &str) -> IrType {
        if let Some(t) = self.named.get(name) {
            return t.clone();
        }
        let Some(full) = self.types.get(name).copied() else {
            self.report(name, "type is referenced but not declared");
            return IrType::Any;
        };
        match full.kind.as_str() {
            "OBJECT" | "INTERFACE" => self.object_type(name, full),
            "ENUM" => {
                let t = self.enum_type(name, full);
                self.named.insert(name.to_string(), t.clone());
                t
            }
            "UNION" => {
                // Provisional entry in case a possible type cycles back.
                self.named.insert(name.to_string(), IrType::Any);
                let t = self.union_type(name, full);
                self.named.insert(name.to_string(), t.clone());
                t
            }
            "SCALAR" => {
                let t = self.scalar_type(name);
                self.named.insert(name.to_string(), t.clone());
                t
            }
            other => {
                self.report(name, format!("unsupported type kind `{other}`"));
                self.named.insert(name.to_string(), IrType::Any);
                IrType::Any
            }
        }
    }

    fn object_type(&mut self, name: &str, full: &FullType) -> IrType {
        let id = self.inf.graph_mut().reserve();
        self.named.insert(name.to_string(), IrType::Class(id));

        let mut data = ClassData::new(NameSet::single_given(name));
        if let Some(fields) = &full.fields {
            for field in fields {
                let (t, non_null) = self.type_ref(&field.ty, &field.name);
                let t = if non_null { t } else { self.nullable(t) };
                data.properties.insert(field.name.clone(), t);
            }
        } else {
            self.report(name, "object type declares no fields");
        }
        self.inf.graph_mut().fill(id, data);
        IrType::Class(id)
    }

    fn enum_type(&mut self, name: &str, full: &FullType) -> IrType {
        let values = full
            .enum_values
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|v| v.name.clone())
            .collect();
        IrType::Enum(EnumData { names: NameSet::single_given(name), values })
    }

    /// Every possible type goes through the unifier, so the result is one
    /// class carrying the union of all member shapes.
    fn union_type(&mut self, name: &str, full: &FullType) -> IrType {
        let members = full.possible_types.as_deref().unwrap_or_default();
        if members.is_empty() {
            self.report(name, "union declares no possible types");
            return IrType::Any;
        }
        let mut acc = IrType::NoInformation;
        for member in members {
            let (t, _) = self.type_ref(member, name);
            acc = self.inf.unify(acc, t);
        }
        acc
    }

    fn scalar_type(&mut self, name: &str) -> IrType {
        match name {
            "Int" => IrType::Integer,
            "Float" => IrType::Double,
            "String" | "ID" => IrType::String,
            "Boolean" => IrType::Bool,
            custom => {
                self.report(custom, "custom scalar has no portable representation");
                IrType::Any
            }
        }
    }

    /// Unwraps `NON_NULL` and `LIST` wrappers down to the named type.
    /// Returns the translated type and whether it was non-null wrapped.
    fn type_ref(&mut self, r: &TypeRef, context: &str) -> (IrType, bool) {
        match r.kind.as_str() {
            "NON_NULL" => match &r.of_type {
                Some(inner) => {
                    let (t, _) = self.type_ref(inner, context);
                    (t, true)
                }
                None => {
                    self.report(context, "NON_NULL wrapper without ofType");
                    (IrType::Any, true)
                }
            },
            "LIST" => match &r.of_type {
                Some(inner) => {
                    let (t, non_null) = self.type_ref(inner, context);
                    let elem = if non_null { t } else { self.nullable(t) };
                    (IrType::Array(Box::new(elem)), false)
                }
                None => {
                    self.report(context, "LIST wrapper without ofType");
                    (IrType::Array(Box::new(IrType::Any)), false)
                }
            },
            _ => match &r.name {
                Some(name) => {
                    let name = name.clone();
                    (self.named_type(&name), false)
                }
                None => {
                    self.report(context, "type reference without a name");
                    (IrType::Any, false)
                }
            },
        }
    }

    fn nullable(&mut self, t: IrType) -> IrType {
        self.inf.unify(t, IrType::null_union())
    }

    fn report(&mut self, at: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(at, message));
    }
}
