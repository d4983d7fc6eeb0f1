//! JSON Schema renderer: re-emits the graph as a draft-6 document with one
//! definition per named type and `$ref`s everywhere else, so recursive
//! graphs serialize without unrolling.

use serde_json::{json, Map, Value};

use crate::error::Error;
use crate::graph::IrType;
use crate::naming::{pascal_case, Namer};
use crate::render::{
    is_named_union, BlankPolicy, NamedType, RenderContext, TargetLanguage,
};

pub struct JsonSchemaLang;

impl TargetLanguage for JsonSchemaLang {
    fn name(&self) -> &'static str {
        "schema"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["json-schema", "jsonschema"]
    }

    fn keywords(&self) -> &'static [&'static str] {
        &[]
    }

    fn top_level_namer(&self) -> Namer {
        Namer::new(pascal_case)
    }

    fn named_type_namer(&self) -> Namer {
        Namer::new(pascal_case)
    }

    fn property_namer(&self) -> Namer {
        Namer::new(pascal_case)
    }

    fn emit_source_structure(&self, ctx: &mut RenderContext) -> Result<(), Error> {
        let mut definitions = Map::new();
        ctx.for_each_class(BlankPolicy::None, |ctx, class, name| {
            let mut properties = Map::new();
            let mut required: Vec<Value> = Vec::new();
            let data = ctx.graph.class_data(class);
            for (json_name, t) in data.properties.clone() {
                properties.insert(json_name.clone(), schema_for(ctx, &t)?);
                let nullable =
                    matches!(&t, IrType::Union(u) if u.has_null());
                if !nullable {
                    required.push(Value::String(json_name));
                }
            }
            let mut def = Map::new();
            def.insert("type".to_string(), Value::String("object".to_string()));
            def.insert("additionalProperties".to_string(), Value::Bool(false));
            def.insert("properties".to_string(), Value::Object(properties));
            if !required.is_empty() {
                def.insert("required".to_string(), Value::Array(required));
            }
            def.insert("title".to_string(), Value::String(name.to_string()));
            definitions.insert(name.to_string(), Value::Object(def));
            Ok(())
        })?;
        ctx.for_each_enum(BlankPolicy::None, |_ctx, e, name| {
            let values: Vec<Value> =
                e.values.iter().map(|v| Value::String(v.clone())).collect();
            definitions.insert(
                name.to_string(),
                json!({ "type": "string", "enum": values, "title": name }),
            );
            Ok(())
        })?;
        ctx.for_each_union(BlankPolicy::None, |ctx, u, name| {
            let mut arms = Vec::new();
            for member in u.members() {
                arms.push(schema_for(ctx, &member)?);
            }
            definitions.insert(name.to_string(), json!({ "oneOf": arms, "title": name }));
            Ok(())
        })?;

        let mut toplevel_refs = Map::new();
        ctx.for_each_top_level(BlankPolicy::None, |ctx, t, name| {
            toplevel_refs.insert(name.to_string(), schema_for(ctx, t)?);
            Ok(())
        })?;

        let mut doc = Map::new();
        doc.insert(
            "$schema".to_string(),
            Value::String("http://json-schema.org/draft-06/schema#".to_string()),
        );
        // A single top level becomes the document root; multiple ones hang
        // off a oneOf so each stays addressable.
        if toplevel_refs.len() == 1 {
            let (_, only) = toplevel_refs.into_iter().next().expect("len checked");
            if let Value::Object(fields) = only {
                doc.extend(fields);
            }
        } else {
            let arms: Vec<Value> = toplevel_refs.into_iter().map(|(_, v)| v).collect();
            doc.insert("oneOf".to_string(), Value::Array(arms));
        }
        doc.insert("definitions".to_string(), Value::Object(definitions));

        let pretty = serde_json::to_string_pretty(&Value::Object(doc))
            .expect("a JSON value serializes");
        for line in pretty.lines() {
            ctx.emit_line(line);
        }
        Ok(())
    }
}

fn schema_for(ctx: &RenderContext, t: &IrType) -> Result<Value, Error> {
    Ok(match t {
        IrType::NoInformation | IrType::Any => json!({}),
        IrType::Null => json!({ "type": "null" }),
        IrType::Integer => json!({ "type": "integer" }),
        IrType::Double => json!({ "type": "number" }),
        IrType::Bool => json!({ "type": "boolean" }),
        IrType::String => json!({ "type": "string" }),
        IrType::Array(e) => json!({ "type": "array", "items": schema_for(ctx, e)? }),
        IrType::Class(id) => {
            let name = ctx.name_for_named_type(&NamedType::Class(*id))?;
            json!({ "$ref": format!("#/definitions/{name}") })
        }
        IrType::Map(e) => json!({
            "type": "object",
            "additionalProperties": schema_for(ctx, e)?
        }),
        IrType::Enum(e) => {
            let name = ctx.name_for_named_type(&NamedType::Enum(e.clone()))?;
            json!({ "$ref": format!("#/definitions/{name}") })
        }
        IrType::Union(u) => {
            if let Some(inner) = u.nullable_from_union() {
                json!({ "oneOf": [schema_for(ctx, &inner)?, { "type": "null" }] })
            } else if is_named_union(u) {
                let name = ctx.name_for_named_type(&NamedType::Union(u.clone()))?;
                json!({ "$ref": format!("#/definitions/{name}") })
            } else {
                let mut arms = Vec::new();
                for member in u.members() {
                    arms.push(schema_for(ctx, &member)?);
                }
                json!({ "oneOf": arms })
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    use super::*;
    use crate::canonical::canonicalize;
    use crate::inference::Inference;
    use crate::render::render;

    fn rendered_value(samples: &[serde_json::Value]) -> Value {
        let mut inf = Inference::new();
        for s in samples {
            inf.infer_toplevel("Root", s);
        }
        let mut graph = inf.into_graph();
        canonicalize(&mut graph, true);
        let out = render(&graph, &JsonSchemaLang, &BTreeMap::new()).unwrap();
        serde_json::from_str(&out.lines.join("\n")).expect("emitted schema parses")
    }

    #[test]
    fn root_class_becomes_the_document_root_ref() {
        let doc = rendered_value(&[json!({ "a": 1, "b": "x" })]);
        assert_eq!(doc["$ref"], json!("#/definitions/Root"));
        let root = &doc["definitions"]["Root"];
        assert_eq!(root["properties"]["a"], json!({ "type": "integer" }));
        assert_eq!(root["properties"]["b"], json!({ "type": "string" }));
        assert_eq!(root["required"], json!(["a", "b"]));
    }

    #[test]
    fn nullable_properties_leave_required() {
        let doc = rendered_value(&[json!({ "a": 1 }), json!({ "a": null })]);
        let root = &doc["definitions"]["Root"];
        assert!(root.get("required").is_none());
        assert_eq!(
            root["properties"]["a"],
            json!({ "oneOf": [{ "type": "integer" }, { "type": "null" }] })
        );
    }

    #[test]
    fn emitted_schema_retranslates_to_the_same_shapes() {
        let doc = rendered_value(&[json!({
            "name": "n",
            "tags": ["a"],
            "inner": { "x": 1.5 }
        })]);

        let mut inf = Inference::new();
        let mut diagnostics = Vec::new();
        crate::schema::translate_schema(&mut inf, "Root", &doc, &mut diagnostics).unwrap();
        assert_eq!(diagnostics, vec![]);
        let mut graph = inf.into_graph();
        canonicalize(&mut graph, true);

        let root = match &graph.toplevels["Root"] {
            IrType::Class(id) => graph.class_data(*id),
            other => panic!("expected a class, got {other:?}"),
        };
        assert_eq!(root.properties["name"], IrType::String);
        assert_eq!(root.properties["tags"], IrType::Array(Box::new(IrType::String)));
        assert!(matches!(root.properties["inner"], IrType::Class(_)));
    }
}
