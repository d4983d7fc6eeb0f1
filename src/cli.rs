//! Command line front-end: resolve inputs, infer, render.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, ValueEnum};
use rayon::prelude::*;
use serde_json::Value;

use crate::{Config, SourceKind, TopLevelSource};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Infer typed models from JSON samples, a JSON Schema, or a GraphQL
/// introspection result.
#[derive(Parser, Debug)]
#[command(name = "typegraph")]
pub struct CommandLineInterface {
    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    output: OutputArgs,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug, Clone)]
struct InputArgs {
    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// Input dialect
    #[arg(long, value_enum, default_value_t = InputKind::Json)]
    from: InputKind,

    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items)
    #[arg(long)]
    json_pointer: Option<String>,

    /// jq filter applied to each document before inference
    #[arg(long)]
    jq_expr: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    /// JSON instance documents (samples)
    Json,
    /// JSON Schema documents
    Schema,
    /// GraphQL introspection results
    Graphql,
}

#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// target language (typescript, golang, schema)
    #[arg(long, default_value = "typescript")]
    lang: String,

    /// top-level type name
    #[arg(long, default_value = "TopLevel")]
    top_level: String,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// renderer option as key=value (repeatable)
    #[arg(long = "renderer-option", value_parser = parse_key_val)]
    renderer_options: Vec<(String, String)>,

    /// disable demoting homogeneous classes to maps
    #[arg(long, default_value_t = false)]
    no_maps: bool,
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Debugging: print CLI invocation settings and then terminate
    #[arg(long)]
    no_op: bool,

    /// Debugging: track elapsed time and then print to stderr
    #[arg(long)]
    track_time: bool,

    /// enable debug logging on stderr
    #[arg(long, short)]
    verbose: bool,
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{s}`"))
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        if self.common.verbose {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "typegraph=debug".into()),
                )
                .with_writer(std::io::stderr)
                .init();
        }
        let start = std::time::Instant::now();

        let source_paths = resolve_file_path_patterns(&self.input.input)?;

        // - DEBUG PATH -
        if self.common.no_op {
            eprintln!("{self:#?}");
            eprintln!("RESOLVED SOURCES:");
            for source in &source_paths {
                eprintln!("\t- {}", source.to_string_lossy());
            }
            return Ok(());
        }

        // - READ AND PARSE (parallel per file; inference itself is serial) -
        let parsed: Vec<(PathBuf, Vec<Value>)> = source_paths
            .par_iter()
            .map(|path| {
                let docs = self.read_documents(path)?;
                Ok((path.clone(), docs))
            })
            .collect::<Result<_>>()?;

        // - BUILD CONFIG -
        let top_levels = self.assemble_top_levels(parsed)?;
        let config = Config {
            target_language: self.output.lang.clone(),
            top_levels,
            infer_maps: !self.output.no_maps,
            renderer_options: self
                .output
                .renderer_options
                .iter()
                .cloned()
                .collect::<BTreeMap<_, _>>(),
        };

        // - INFER AND RENDER -
        let output = crate::run(&config)?;
        for diagnostic in &output.diagnostics {
            eprintln!("issue: {diagnostic}");
        }
        for (span, annotation) in &output.result.annotations {
            match annotation {
                crate::render::Annotation::Issue(msg) => {
                    eprintln!("issue (line {}): {msg}", span.start_line + 1)
                }
                crate::render::Annotation::Hover(msg) => {
                    eprintln!("note (line {}): {msg}", span.start_line + 1)
                }
            }
        }

        let mut text = output.result.lines.join("\n");
        text.push('\n');
        match self.output.out.as_ref() {
            Some(out) => {
                if let Some(parent) = out.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.to_string_lossy()))?;
                }
                std::fs::write(out, &text)
                    .with_context(|| format!("writing {}", out.to_string_lossy()))?;
            }
            None => print!("{text}"),
        }

        if self.common.track_time {
            eprintln!("finished in {}", format_duration(start.elapsed()));
        }
        Ok(())
    }

    /// Reads one file into raw JSON documents, honoring `--ndjson`.
    fn read_documents(&self, path: &Path) -> Result<Vec<Value>> {
        let path_str = path.to_string_lossy().to_string();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read source file {path_str}"))?;
        if self.input.ndjson {
            let mut docs = Vec::new();
            for (i, line) in source.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let v: Value = serde_json::from_str(line)
                    .with_context(|| format!("NDJSON parse error {path_str}:{}", i + 1))?;
                docs.push(v);
            }
            Ok(docs)
        } else {
            let v: Value = serde_json::from_str(&source)
                .with_context(|| format!("failed to parse JSON source file {path_str}"))?;
            Ok(vec![v])
        }
    }

    /// Applies jq and JSON-pointer pre-processing, then groups documents
    /// into top levels: samples all merge into one, while each schema or
    /// introspection document becomes its own entry point.
    fn assemble_top_levels(&self, parsed: Vec<(PathBuf, Vec<Value>)>) -> Result<Vec<TopLevelSource>> {
        let mut per_file: Vec<(PathBuf, Vec<Value>)> = Vec::new();
        for (path, docs) in parsed {
            let mut expanded = Vec::new();
            for doc in docs {
                expanded.extend(self.preprocess(&path, doc)?);
            }
            per_file.push((path, expanded));
        }

        match self.input.from {
            InputKind::Json => {
                let samples: Vec<Value> =
                    per_file.into_iter().flat_map(|(_, docs)| docs).collect();
                Ok(vec![TopLevelSource {
                    name: self.output.top_level.clone(),
                    source: SourceKind::Samples(samples),
                }])
            }
            InputKind::Schema | InputKind::Graphql => {
                let single_file = per_file.len() == 1;
                let mut out = Vec::new();
                for (path, docs) in per_file {
                    let single_doc = docs.len() == 1;
                    for (idx, doc) in docs.into_iter().enumerate() {
                        let mut name = if single_file {
                            self.output.top_level.clone()
                        } else {
                            toplevel_name_from_path(&path)
                        };
                        if !single_doc {
                            name = format!("{name}{}", idx + 1);
                        }
                        let source = match self.input.from {
                            InputKind::Schema => SourceKind::Schema(doc),
                            _ => SourceKind::Graphql(doc),
                        };
                        out.push(TopLevelSource { name, source });
                    }
                }
                if out.is_empty() {
                    bail!("no documents found in the given inputs");
                }
                Ok(out)
            }
        }
    }

    /// jq first, then pointer selection. A pointer that lands on an array
    /// expands into one sample per element.
    fn preprocess(&self, path: &Path, doc: Value) -> Result<Vec<Value>> {
        let path_str = path.to_string_lossy();
        let filtered: Vec<Value> = match self.input.jq_expr.as_ref() {
            None => vec![doc],
            Some(expr) => crate::jq_exec::run_filter(expr, &doc)
                .with_context(|| format!("jq failed on {path_str}"))?,
        };
        let mut out = Vec::new();
        for v in filtered {
            match self.input.json_pointer.as_ref() {
                None => out.push(v),
                Some(ptr) => match v.pointer(ptr) {
                    None => {
                        // zero samples at this file for this node
                    }
                    Some(Value::Array(xs)) => out.extend(xs.iter().cloned()),
                    Some(other) => out.push(other.clone()),
                },
            }
        }
        Ok(out)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn toplevel_name_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "TopLevel".to_string())
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Explicit glob that matched nothing is surfaced, not skipped.
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }
    Ok(out)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{}.{:03}s", secs, d.subsec_millis())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn key_val_parsing() {
        assert_eq!(
            parse_key_val("package=models").unwrap(),
            ("package".to_string(), "models".to_string())
        );
        assert!(parse_key_val("package").is_err());
    }

    #[test]
    fn toplevel_names_come_from_file_stems() {
        assert_eq!(toplevel_name_from_path(Path::new("data/person.schema.json")), "person.schema");
        assert_eq!(toplevel_name_from_path(Path::new("user.json")), "user");
    }

    #[test]
    fn literal_paths_pass_through_unresolved() {
        let paths = resolve_file_path_patterns(["a.json", "b.json"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
    }
}
