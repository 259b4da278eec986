//! jq filter execution.

use jaq_interpret::{Ctx, FilterT, ParseCtx, RcIter, Val};
use serde_json::Value;

use super::error::{QueryError, QueryResult};

/// Runs a jq filter over parsed JSON documents.
pub trait QueryEngine: Send + Sync {
    /// Run `filter` and render the results as pretty-printed JSON.
    ///
    /// A single document is the filter's input. Several documents are
    /// exposed through `input`/`inputs` with `null` as the input.
    fn execute(&self, filter: &str, documents: Vec<Value>) -> QueryResult<String>;
}

/// [`QueryEngine`] backed by the jaq interpreter with its standard library.
#[derive(Debug, Default, Clone, Copy)]
pub struct JaqEngine;

impl JaqEngine {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, filter: &str, input: Value, rest: Vec<Value>) -> QueryResult<Vec<Value>> {
        let mut defs = ParseCtx::new(Vec::new());
        defs.insert_natives(jaq_core::core());
        defs.insert_defs(jaq_std::std());

        let (main, errs) = jaq_parse::parse(filter, jaq_parse::main());
        if let Some(err) = errs.first() {
            return Err(QueryError::Parse(err.to_string()));
        }
        let main = main.ok_or_else(|| QueryError::Parse(filter.to_string()))?;

        let compiled = defs.compile(main);
        if !defs.errs.is_empty() {
            return Err(QueryError::Compile(format!(
                "{} undefined or invalid reference(s) in {filter:?}",
                defs.errs.len()
            )));
        }

        let inputs = RcIter::new(rest.into_iter().map(|doc| Ok::<Val, String>(Val::from(doc))));

        let mut results = Vec::new();
        for output in compiled.run((Ctx::new([], &inputs), Val::from(input))) {
            let value = output.map_err(|e| QueryError::Runtime(e.to_string()))?;
            results.push(Value::from(value));
        }
        Ok(results)
    }
}

impl QueryEngine for JaqEngine {
    fn execute(&self, filter: &str, mut documents: Vec<Value>) -> QueryResult<String> {
        let results = if documents.len() == 1 {
            let input = documents.remove(0);
            self.run(filter, input, Vec::new())?
        } else {
            self.run(filter, Value::Null, documents)?
        };

        render(results)
    }
}

/// One result prints as itself, none as `null`, several as an array.
fn render(mut results: Vec<Value>) -> QueryResult<String> {
    let rendered = match results.len() {
        0 => "null".to_string(),
        1 => serde_json::to_string_pretty(&results.remove(0))?,
        _ => serde_json::to_string_pretty(&results)?,
    };
    Ok(rendered)
}
