//! TypeScript renderer: interfaces and type aliases.
//!
//! Enums are not supported here: the declaration degrades to a `string`
//! alias and an issue annotation is recorded, so the output stays valid
//! TypeScript while the limitation is visible to the caller.

use crate::error::Error;
use crate::graph::IrType;
use crate::naming::{camel_case, pascal_case, Namer};
use crate::render::{
    is_named_union, Annotation, BlankPolicy, NamedType, RenderContext, TargetLanguage,
};

pub struct TypeScript;

const KEYWORDS: &[&str] = &[
    "any", "boolean", "break", "case", "catch", "class", "const", "continue", "debugger",
    "declare", "default", "delete", "do", "else", "enum", "export", "extends", "false",
    "finally", "for", "function", "if", "implements", "import", "in", "instanceof",
    "interface", "let", "new", "null", "number", "package", "private", "protected",
    "public", "return", "static", "string", "super", "switch", "this", "throw", "true",
    "try", "type", "typeof", "undefined", "var", "void", "while", "with", "yield",
];

impl TargetLanguage for TypeScript {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["ts"]
    }

    fn keywords(&self) -> &'static [&'static str] {
        KEYWORDS
    }

    fn top_level_namer(&self) -> Namer {
        Namer::new(pascal_case)
    }

    fn named_type_namer(&self) -> Namer {
        Namer::new(pascal_case)
    }

    fn property_namer(&self) -> Namer {
        Namer::new(camel_case)
    }

    fn emit_source_structure(&self, ctx: &mut RenderContext) -> Result<(), Error> {
        ctx.emit_line("// Auto-generated type definitions");
        ctx.emit_line("// DO NOT EDIT MANUALLY");

        ctx.for_each_top_level(BlankPolicy::BetweenAll, |ctx, t, name| {
            // A top level that is itself a named type is declared below;
            // only emit an alias when another top level claimed the name.
            if let Some(adopted) = TypeScript.named_type_for_top_level(ctx.graph, t) {
                let type_name = ctx.name_for_named_type(&adopted)?.to_string();
                if type_name != name {
                    ctx.emit_line(format!("export type {name} = {type_name};"));
                }
                return Ok(());
            }
            let ty = type_for(ctx, t)?;
            ctx.emit_line(format!("export type {name} = {ty};"));
            Ok(())
        })?;

        ctx.for_each_class(BlankPolicy::BetweenAll, |ctx, class, name| {
            ctx.emit_line(format!("export interface {name} {{"));
            ctx.indent();
            ctx.for_each_property(class, BlankPolicy::None, |ctx, _prop, json, t| {
                let ty = type_for(ctx, t)?;
                ctx.emit_line(format!("{}: {ty};", property_key(json)));
                Ok(())
            })?;
            ctx.unindent();
            ctx.emit_line("}");
            Ok(())
        })?;

        ctx.for_each_union(BlankPolicy::BetweenAll, |ctx, u, name| {
            let mut parts = Vec::new();
            let mut had_null = false;
            for member in u.members() {
                if matches!(member, IrType::Null) {
                    had_null = true;
                    continue;
                }
                parts.push(type_for(ctx, &member)?);
            }
            if had_null {
                parts.push("null".to_string());
            }
            ctx.emit_line(format!("export type {name} = {};", parts.join(" | ")));
            Ok(())
        })?;

        ctx.for_each_enum(BlankPolicy::BetweenAll, |ctx, e, name| {
            ctx.emit_line(format!("export type {name} = string;"));
            let values: Vec<&str> = e.values.iter().map(String::as_str).collect();
            ctx.annotate(Annotation::Issue(format!(
                "enums are not supported; `{name}` accepts any string instead of [{}]",
                values.join(", ")
            )));
            Ok(())
        })?;

        Ok(())
    }
}

fn type_for(ctx: &RenderContext, t: &IrType) -> Result<String, Error> {
    Ok(match t {
        IrType::NoInformation | IrType::Any => "any".to_string(),
        IrType::Null => "null".to_string(),
        IrType::Integer | IrType::Double => "number".to_string(),
        IrType::Bool => "boolean".to_string(),
        IrType::String => "string".to_string(),
        IrType::Array(e) => {
            let inner = type_for(ctx, e)?;
            if inner.contains(' ') {
                format!("Array<{inner}>")
            } else {
                format!("{inner}[]")
            }
        }
        IrType::Class(id) => ctx.name_for_named_type(&NamedType::Class(*id))?.to_string(),
        IrType::Map(e) => format!("{{ [key: string]: {} }}", type_for(ctx, e)?),
        IrType::Enum(e) => ctx.name_for_named_type(&NamedType::Enum(e.clone()))?.to_string(),
        IrType::Union(u) => {
            if let Some(inner) = u.nullable_from_union() {
                format!("{} | null", type_for(ctx, &inner)?)
            } else if is_named_union(u) {
                ctx.name_for_named_type(&NamedType::Union(u.clone()))?.to_string()
            } else {
                let mut parts = Vec::new();
                for member in u.members() {
                    parts.push(type_for(ctx, &member)?);
                }
                parts.join(" | ")
            }
        }
    })
}

/// JSON keys that are clean identifiers appear bare; anything else is
/// quoted so round-tripping keeps the original spelling.
fn property_key(json: &str) -> String {
    let clean = !json.is_empty()
        && json.chars().next().map(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
            == Some(true)
        && json.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if clean {
        json.to_string()
    } else {
        serde_json::to_string(json).unwrap_or_else(|_| format!("\"{json}\""))
    }
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

    fn rendered(sample: serde_json::Value) -> crate::render::SerializedRenderResult {
        let mut inf = Inference::new();
        inf.infer_toplevel("Root", &sample);
        let mut graph = inf.into_graph();
        canonicalize(&mut graph, true);
        render(&graph, &TypeScript, &BTreeMap::new()).unwrap()
    }

    #[test]
    fn simple_object_renders_one_interface() {
        let out = rendered(json!({ "a": 1, "b": "x" }));
        let text = out.lines.join("\n");
        assert!(text.contains("export interface Root {"));
        assert!(text.contains("a: number;"));
        assert!(text.contains("b: string;"));
        assert_eq!(out.annotations, vec![]);
    }

    #[test]
    fn nullable_properties_render_with_null() {
        let mut inf = Inference::new();
        inf.infer_toplevel("Root", &json!({ "x": 1 }));
        inf.infer_toplevel("Root", &json!({ "x": null }));
        let mut graph = inf.into_graph();
        canonicalize(&mut graph, true);
        let out = render(&graph, &TypeScript, &BTreeMap::new()).unwrap();
        assert!(out.lines.iter().any(|l| l.contains("x: number | null;")));
    }

    #[test]
    fn awkward_keys_are_quoted() {
        let out = rendered(json!({ "foo-bar": 1, "ok": 2 }));
        let text = out.lines.join("\n");
        assert!(text.contains("\"foo-bar\": number;"));
        assert!(text.contains("ok: number;"));
    }

    #[test]
    fn enums_degrade_to_string_with_an_issue() {
        let mut inf = Inference::new();
        let mut diagnostics = Vec::new();
        crate::schema::translate_schema(
            &mut inf,
            "Color",
            &json!({ "enum": ["red", "green"] }),
            &mut diagnostics,
        )
        .unwrap();
        let mut graph = inf.into_graph();
        canonicalize(&mut graph, true);
        let out = render(&graph, &TypeScript, &BTreeMap::new()).unwrap();

        assert!(out.lines.iter().any(|l| l.contains("export type Color = string;")));
        assert_eq!(out.annotations.len(), 1);
        match &out.annotations[0].1 {
            Annotation::Issue(msg) => assert!(msg.contains("enums are not supported")),
            other => panic!("expected an issue, got {other:?}"),
        }
    }

    #[test]
    fn maps_render_as_index_signatures() {
        let out = rendered(json!({
            "translations": { "en": "one", "fr": "un", "de": "eins" }
        }));
        let text = out.lines.join("\n");
        assert!(text.contains("translations: { [key: string]: string };"));
    }
}
