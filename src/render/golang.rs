//! Go renderer: structs with JSON tags, string-typed enums with value
//! constants. Nullable types become pointers; unions without a single
//! non-null member degrade to `interface{}` with an issue annotation.

use std::collections::BTreeMap;

use crate::error::Error;
use crate::graph::IrType;
use crate::naming::{pascal_case, Namer};
use crate::render::{
    is_named_union, Annotation, BlankPolicy, NamedType, RenderContext, TargetLanguage,
};

pub struct Golang;

const KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else",
    "fallthrough", "for", "func", "go", "goto", "if", "import", "interface", "map",
    "package", "range", "return", "select", "struct", "switch", "type", "var",
    // Predeclared identifiers that would shadow confusingly.
    "bool", "byte", "error", "float64", "int", "int64", "nil", "rune", "string", "true",
    "false",
];

impl TargetLanguage for Golang {
    fn name(&self) -> &'static str {
        "golang"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn keywords(&self) -> &'static [&'static str] {
        KEYWORDS
    }

    fn top_level_namer(&self) -> Namer {
        Namer::with_prefixes(pascal_case, &["the"])
    }

    fn named_type_namer(&self) -> Namer {
        Namer::with_prefixes(pascal_case, &["the"])
    }

    fn property_namer(&self) -> Namer {
        Namer::with_prefixes(pascal_case, &["the"])
    }

    fn emit_source_structure(&self, ctx: &mut RenderContext) -> Result<(), Error> {
        let package = ctx
            .options
            .get("package")
            .cloned()
            .unwrap_or_else(|| "main".to_string());
        ctx.emit_line("// Code generated from data samples. DO NOT EDIT.");
        ctx.emit_line("");
        ctx.emit_line(format!("package {package}"));

        ctx.for_each_top_level(BlankPolicy::BetweenAll, |ctx, t, name| {
            if let Some(adopted) = Golang.named_type_for_top_level(ctx.graph, t) {
                let type_name = ctx.name_for_named_type(&adopted)?.to_string();
                if type_name != name {
                    ctx.emit_line(format!("type {name} = {type_name}"));
                }
                return Ok(());
            }
            let ty = type_for(ctx, t)?;
            ctx.emit_line(format!("type {name} = {ty}"));
            Ok(())
        })?;

        ctx.for_each_class(BlankPolicy::BetweenAll, |ctx, class, name| {
            ctx.emit_line(format!("type {name} struct {{"));
            ctx.indent();
            ctx.for_each_property(class, BlankPolicy::None, |ctx, prop, json, t| {
                let ty = type_for(ctx, t)?;
                let tag = if is_nullable(t) {
                    format!("`json:\"{json},omitempty\"`")
                } else {
                    format!("`json:\"{json}\"`")
                };
                ctx.emit_line(format!("{prop} {ty} {tag}"));
                Ok(())
            })?;
            ctx.unindent();
            ctx.emit_line("}");
            Ok(())
        })?;

        ctx.for_each_enum(BlankPolicy::BetweenAll, |ctx, e, name| {
            ctx.emit_line(format!("type {name} string"));
            ctx.ensure_blank();
            ctx.emit_line("const (");
            ctx.indent();
            for (variant, value) in enum_variants(name, &e.values) {
                ctx.emit_line(format!("{variant} {name} = \"{value}\""));
            }
            ctx.unindent();
            ctx.emit_line(")");
            Ok(())
        })?;

        ctx.for_each_union(BlankPolicy::BetweenAll, |ctx, _u, name| {
            ctx.emit_line(format!("type {name} = interface{{}}"));
            ctx.annotate(Annotation::Issue(format!(
                "`{name}` is a union of multiple kinds; custom unmarshaling is required \
                 to keep it typed"
            )));
            Ok(())
        })?;

        Ok(())
    }
}

fn is_nullable(t: &IrType) -> bool {
    matches!(t, IrType::Union(u) if u.nullable_from_union().is_some())
}

fn type_for(ctx: &RenderContext, t: &IrType) -> Result<String, Error> {
    Ok(match t {
        IrType::NoInformation | IrType::Any | IrType::Null => "interface{}".to_string(),
        IrType::Integer => "int64".to_string(),
        IrType::Double => "float64".to_string(),
        IrType::Bool => "bool".to_string(),
        IrType::String => "string".to_string(),
        IrType::Array(e) => format!("[]{}", type_for(ctx, e)?),
        IrType::Class(id) => ctx.name_for_named_type(&NamedType::Class(*id))?.to_string(),
        IrType::Map(e) => format!("map[string]{}", type_for(ctx, e)?),
        IrType::Enum(e) => ctx.name_for_named_type(&NamedType::Enum(e.clone()))?.to_string(),
        IrType::Union(u) => match u.nullable_from_union() {
            Some(inner) => {
                let inner_ty = type_for(ctx, &inner)?;
                // Slices, maps, and interface{} are already nilable.
                if inner_ty.starts_with("[]")
                    || inner_ty.starts_with("map[")
                    || inner_ty == "interface{}"
                {
                    inner_ty
                } else {
                    format!("*{inner_ty}")
                }
            }
            None if is_named_union(u) => {
                ctx.name_for_named_type(&NamedType::Union(u.clone()))?.to_string()
            }
            None => "interface{}".to_string(),
        },
    })
}

/// Variant constants for a string enum, prefixed with the enum name so the
/// package-level constant namespace stays collision-free; duplicate styled
/// spellings get an index suffix.
fn enum_variants(enum_name: &str, values: &std::collections::BTreeSet<String>) -> Vec<(String, String)> {
    let styled: Vec<String> =
        values.iter().map(|v| format!("{enum_name}{}", pascal_case(v))).collect();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for s in &styled {
        *counts.entry(s.as_str()).or_insert(0) += 1;
    }
    let mut used: BTreeMap<String, usize> = BTreeMap::new();
    values
        .iter()
        .zip(styled.iter())
        .map(|(value, base)| {
            let name = if counts[base.as_str()] > 1 {
                let n = used.entry(base.clone()).or_insert(0);
                *n += 1;
                format!("{base}{n}")
            } else {
                base.clone()
            };
            (name, value.clone())
        })
        .collect()
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

    fn rendered(samples: &[serde_json::Value]) -> crate::render::SerializedRenderResult {
        let mut inf = Inference::new();
        for s in samples {
            inf.infer_toplevel("Root", s);
        }
        let mut graph = inf.into_graph();
        canonicalize(&mut graph, true);
        render(&graph, &Golang, &BTreeMap::new()).unwrap()
    }

    #[test]
    fn structs_carry_json_tags() {
        let out = rendered(&[json!({ "user_name": "a", "age": 3 })]);
        let text = out.lines.join("\n");
        assert!(text.contains("package main"));
        assert!(text.contains("type Root struct {"));
        assert!(text.contains("UserName string `json:\"user_name\"`"));
        assert!(text.contains("Age int64 `json:\"age\"`"));
    }

    #[test]
    fn nullable_scalars_become_pointers() {
        let out = rendered(&[json!({ "age": 3 }), json!({ "age": null })]);
        let text = out.lines.join("\n");
        assert!(text.contains("Age *int64 `json:\"age,omitempty\"`"));
    }

    #[test]
    fn package_option_is_honored() {
        let mut inf = Inference::new();
        inf.infer_toplevel("Root", &json!({ "a": 1 }));
        let mut graph = inf.into_graph();
        canonicalize(&mut graph, true);
        let mut options = BTreeMap::new();
        options.insert("package".to_string(), "models".to_string());
        let out = render(&graph, &Golang, &options).unwrap();
        assert!(out.lines.iter().any(|l| l == "package models"));
    }

    #[test]
    fn enums_render_value_constants() {
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
        let out = render(&graph, &Golang, &BTreeMap::new()).unwrap();
        let text = out.lines.join("\n");
        assert!(text.contains("type Color string"));
        assert!(text.contains("ColorRed Color = \"red\""));
        assert!(text.contains("ColorGreen Color = \"green\""));
    }

    #[test]
    fn mixed_unions_degrade_to_interface_with_issue() {
        let out = rendered(&[json!({ "v": 1 }), json!({ "v": "s" })]);
        let text = out.lines.join("\n");
        assert!(text.contains("= interface{}"));
        assert_eq!(out.annotations.len(), 1);
    }

    #[test]
    fn keyword_json_keys_style_cleanly() {
        let out = rendered(&[json!({ "type": "x" })]);
        let text = out.lines.join("\n");
        assert!(text.contains("Type string `json:\"type\"`"));
    }
}
