//! Infer canonical type graphs from JSON samples, JSON Schema documents, or
//! GraphQL introspection results, and render statically-typed models.
//!
//! The pipeline is strictly phased: build the arena (inference or schema
//! translation), canonicalize the graph, resolve names, render. Each phase
//! treats the previous phase's output as immutable, and everything runs on
//! the calling thread.
//!
//! ```
//! use serde_json::json;
//! use typegraph::{run, Config, SourceKind, TopLevelSource};
//!
//! let config = Config {
//!     target_language: "typescript".to_string(),
//!     top_levels: vec![TopLevelSource {
//!         name: "Person".to_string(),
//!         source: SourceKind::Samples(vec![json!({ "name": "Ada", "age": 36 })]),
//!     }],
//!     infer_maps: true,
//!     renderer_options: Default::default(),
//! };
//! let output = run(&config).unwrap();
//! assert!(output.result.lines.iter().any(|l| l.contains("interface Person")));
//! ```

pub mod canonical;
pub mod cli;
pub mod error;
pub mod graph;
pub mod graphql;
pub mod inference;
pub mod jq_exec;
pub mod naming;
pub mod path_de;
pub mod render;
pub mod schema;
pub mod union;

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

pub use error::{Diagnostic, Error};
pub use render::SerializedRenderResult;

/// One named entry point and the input that describes it.
pub struct TopLevelSource {
    pub name: String,
    pub source: SourceKind,
}

pub enum SourceKind {
    /// JSON instance documents; all samples unify into one type.
    Samples(Vec<Value>),
    /// A JSON Schema document.
    Schema(Value),
    /// A GraphQL introspection (`__schema`) result.
    Graphql(Value),
}

pub struct Config {
    pub target_language: String,
    pub top_levels: Vec<TopLevelSource>,
    pub infer_maps: bool,
    pub renderer_options: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct RunOutput {
    pub result: SerializedRenderResult,
    /// Pre-emission diagnostics from the schema translators.
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs the full pipeline for one configuration.
pub fn run(config: &Config) -> Result<RunOutput, Error> {
    let lang = render::lookup_language(&config.target_language)?;

    let mut inf = inference::Inference::new();
    let mut diagnostics = Vec::new();
    for top in &config.top_levels {
        match &top.source {
            SourceKind::Samples(samples) => {
                for sample in samples {
                    inf.infer_toplevel(&top.name, sample);
                }
            }
            SourceKind::Schema(doc) => {
                schema::translate_schema(&mut inf, &top.name, doc, &mut diagnostics)?;
            }
            SourceKind::Graphql(doc) => {
                graphql::translate_graphql(&mut inf, &top.name, doc, &mut diagnostics)?;
            }
        }
    }

    let mut graph = inf.into_graph();
    canonical::canonicalize(&mut graph, config.infer_maps);
    debug_assert!(canonical::check_integrity(&graph).is_ok());
    debug!(
        classes = graph.classes.len(),
        toplevels = graph.toplevels.len(),
        "graph canonicalized"
    );

    let result = render::render(&graph, lang, &config.renderer_options)?;
    Ok(RunOutput { result, diagnostics })
}
