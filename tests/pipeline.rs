//! End-to-end pipeline tests over the public API: samples or schemas in,
//! rendered source out.

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use typegraph::{run, Config, Error, SourceKind, TopLevelSource};

fn sample_config(lang: &str, name: &str, samples: Vec<Value>) -> Config {
    Config {
        target_language: lang.to_string(),
        top_levels: vec![TopLevelSource {
            name: name.to_string(),
            source: SourceKind::Samples(samples),
        }],
        infer_maps: true,
        renderer_options: BTreeMap::new(),
    }
}

#[test]
fn flat_object_to_typescript() {
    let output = run(&sample_config(
        "typescript",
        "Root",
        vec![json!({ "a": 1, "b": "x" })],
    ))
    .unwrap();
    let text = output.result.lines.join("\n");
    assert!(text.contains("export interface Root {"));
    // Properties in stable sorted order.
    let a_line = output.result.lines.iter().position(|l| l.contains("a: number;"));
    let b_line = output.result.lines.iter().position(|l| l.contains("b: string;"));
    assert!(a_line.unwrap() < b_line.unwrap());
    assert_eq!(output.diagnostics, vec![]);
}

#[test]
fn empty_array_erased_by_sibling_samples() {
    let output = run(&sample_config(
        "typescript",
        "Root",
        vec![json!({ "xs": [] }), json!({ "xs": [1] })],
    ))
    .unwrap();
    assert!(output.result.lines.iter().any(|l| l.contains("xs: number[];")));
}

#[test]
fn alternating_nulls_to_nullable_integers() {
    let output = run(&sample_config(
        "typescript",
        "Root",
        vec![json!({ "x": 1, "y": null }), json!({ "x": null, "y": 2 })],
    ))
    .unwrap();
    let text = output.result.lines.join("\n");
    assert!(text.contains("x: number | null;"));
    assert!(text.contains("y: number | null;"));
}

#[test]
fn identical_shapes_share_one_interface() {
    let output = run(&sample_config(
        "typescript",
        "Root",
        vec![json!({ "p": { "a": 1 }, "q": { "a": 2 } })],
    ))
    .unwrap();
    let interfaces = output
        .result
        .lines
        .iter()
        .filter(|l| l.starts_with("export interface"))
        .count();
    // Root plus exactly one shared class for p/q.
    assert_eq!(interfaces, 2);
}

#[test]
fn schema_with_empty_required_makes_nullables() {
    let config = Config {
        target_language: "typescript".to_string(),
        top_levels: vec![TopLevelSource {
            name: "Root".to_string(),
            source: SourceKind::Schema(json!({
                "type": "object",
                "properties": { "n": { "type": "integer" } },
                "required": []
            })),
        }],
        infer_maps: true,
        renderer_options: BTreeMap::new(),
    };
    let output = run(&config).unwrap();
    assert!(output.result.lines.iter().any(|l| l.contains("n: number | null;")));
}

#[test]
fn language_maps_demote_when_enabled() {
    let samples = vec![json!([{ "en": "one" }, { "fr": "un" }, { "de": "eins" }])];

    let with_maps = run(&sample_config("typescript", "Root", samples.clone())).unwrap();
    let text = with_maps.result.lines.join("\n");
    assert!(text.contains("export type Root = Array<{ [key: string]: string }>;"));

    let mut config = sample_config("typescript", "Root", samples);
    config.infer_maps = false;
    let without = run(&config).unwrap();
    let text = without.result.lines.join("\n");
    assert!(text.contains("en: string | null;"));
    assert!(text.contains("fr: string | null;"));
    assert!(text.contains("de: string | null;"));
}

#[test]
fn go_rendering_round_trips_the_same_graph() {
    let config = sample_config(
        "go",
        "Invoice",
        vec![json!({
            "id": "inv-1",
            "total": 12.5,
            "lines": [{ "sku": "a", "qty": 2 }]
        })],
    );
    let output = run(&config).unwrap();
    let text = output.result.lines.join("\n");
    assert!(text.contains("type Invoice struct {"));
    assert!(text.contains("type Line struct {"));
    assert!(text.contains("Lines []Line `json:\"lines\"`"));
    assert!(text.contains("Qty int64 `json:\"qty\"`"));
}

#[test]
fn emitted_json_schema_parses_and_references_definitions() {
    let output = run(&sample_config(
        "schema",
        "Root",
        vec![json!({ "who": { "name": "x" }, "n": 2 })],
    ))
    .unwrap();
    let doc: Value = serde_json::from_str(&output.result.lines.join("\n")).unwrap();
    assert_eq!(doc["$ref"], json!("#/definitions/Root"));
    assert_eq!(
        doc["definitions"]["Root"]["properties"]["who"],
        json!({ "$ref": "#/definitions/Who" })
    );
}

#[test]
fn graphql_introspection_renders_typed_interfaces() {
    let introspection = json!({
        "__schema": {
            "queryType": { "name": "Query" },
            "types": [
                {
                    "kind": "OBJECT",
                    "name": "Query",
                    "fields": [
                        {
                            "name": "title",
                            "type": { "kind": "NON_NULL", "ofType": { "kind": "SCALAR", "name": "String" } }
                        },
                        { "name": "count", "type": { "kind": "SCALAR", "name": "Int" } }
                    ]
                }
            ]
        }
    });
    let config = Config {
        target_language: "typescript".to_string(),
        top_levels: vec![TopLevelSource {
            name: "Api".to_string(),
            source: SourceKind::Graphql(introspection),
        }],
        infer_maps: true,
        renderer_options: BTreeMap::new(),
    };
    let output = run(&config).unwrap();
    let text = output.result.lines.join("\n");
    // The user-chosen top-level name wins over the schema's own type name.
    assert!(text.contains("export interface Api {"));
    assert!(text.contains("title: string;"));
    assert!(text.contains("count: number | null;"));
}

#[test]
fn multiple_top_levels_get_distinct_names() {
    let config = Config {
        target_language: "typescript".to_string(),
        top_levels: vec![
            TopLevelSource {
                name: "foo-bar".to_string(),
                source: SourceKind::Samples(vec![json!({ "a": 1 })]),
            },
            TopLevelSource {
                name: "FooBar".to_string(),
                source: SourceKind::Samples(vec![json!({ "a": "s" })]),
            },
        ],
        infer_maps: true,
        renderer_options: BTreeMap::new(),
    };
    let output = run(&config).unwrap();
    let text = output.result.lines.join("\n");
    // Same property-name shape unifies into one class; the second top
    // level becomes an alias of the first's interface.
    assert!(text.contains("export interface FooBar {"));
    assert!(text.contains("export type FooBar2 = FooBar;"));
}

#[test]
fn rendering_is_deterministic_across_runs() {
    let make = || {
        sample_config(
            "golang",
            "Root",
            vec![json!({
                "alpha": [1, 2],
                "beta": { "deep": { "deeper": true } },
                "gamma": null,
                "delta": "x"
            })],
        )
    };
    let first = run(&make()).unwrap();
    let second = run(&make()).unwrap();
    assert_eq!(first.result, second.result);
}

#[test]
fn unknown_language_fails_fast() {
    let err = run(&sample_config("cobol", "Root", vec![json!(1)])).unwrap_err();
    assert!(matches!(err, Error::UnknownLanguage(_)));
}

#[test]
fn schema_diagnostics_surface_through_run() {
    let config = Config {
        target_language: "typescript".to_string(),
        top_levels: vec![TopLevelSource {
            name: "Root".to_string(),
            source: SourceKind::Schema(json!({
                "type": "object",
                "properties": {
                    "code": { "type": "string", "pattern": "^[A-Z]+$" }
                },
                "required": ["code"]
            })),
        }],
        infer_maps: true,
        renderer_options: BTreeMap::new(),
    };
    let output = run(&config).unwrap();
    assert_eq!(output.diagnostics.len(), 1);
    assert!(output.diagnostics[0].message.contains("pattern"));
    // The degraded property still renders.
    assert!(output.result.lines.iter().any(|l| l.contains("code: string;")));
}
