//! jq pre-processing via jaq.
//!
//! `--jq-expr` filters run over each input document before inference, so
//! callers can slice samples out of response envelopes without a separate
//! tool pass.

use anyhow::{anyhow, Context, Result};
use jaq_core::{compile::Undefined, load, Compiler, Ctx, RcIter};
use jaq_json::Val;
use serde_json::Value;

/// Runs a jq filter over one document, returning every produced value.
pub fn run_filter(filter_src: &str, input: &Value) -> Result<Vec<Value>> {
    let loader = load::Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = load::Arena::default();
    let program = load::File { code: filter_src, path: () };

    let modules = loader.load(&arena, program).map_err(format_parse_errors)?;

    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(format_undefined_errors)?;

    let inputs = RcIter::new(core::iter::empty());
    let mut iter = filter.run((Ctx::new([], &inputs), Val::from(input.clone())));

    let mut out = Vec::new();
    while let Some(item) = iter.next() {
        let val = item.map_err(|e| anyhow!("jq evaluation failed: {e:?}"))?;
        // Val renders as JSON text; round through serde_json to hand the
        // caller a plain Value.
        let text = format!("{val}");
        let parsed: Value = serde_json::from_str(&text)
            .with_context(|| format!("jq filter produced non-JSON output: {text}"))?;
        out.push(parsed);
    }
    Ok(out)
}

fn format_parse_errors(errs: Vec<(load::File<&str, ()>, load::Error<&str>)>) -> anyhow::Error {
    let rendered: Vec<String> = errs
        .iter()
        .map(|(file, err)| format!("parse error: {err:?} in `{}`", file.code))
        .collect();
    anyhow!(rendered.join("\n"))
}

fn format_undefined_errors(
    errs: Vec<(load::File<&str, ()>, Vec<(&str, Undefined)>)>,
) -> anyhow::Error {
    let mut rendered = Vec::new();
    for (file, list) in errs {
        for (name, undef) in list {
            rendered.push(format!("undefined `{name}`: {undef:?} in `{}`", file.code));
        }
    }
    anyhow!(rendered.join("\n"))
}
