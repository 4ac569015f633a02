//! Runtime for Conker, a small concurrent language in which tasks talk to
//! each other exclusively over unbuffered synchronous channels.
//!
//! [`run_code`] is the whole pipeline: tokenize, parse, then hand the task
//! definitions to a [`runtime::Runtime`], which schedules every task
//! instance and returns each one's outcome.

use std::{fmt, io::Write};

use crate::{node::ItemKind, parser::Parser, runtime::Runtime, tokenizer::Tokenizer};

pub mod channel;
pub mod error;
pub mod interpreter;
pub mod node;
pub mod parser;
pub mod runtime;
pub mod tokenizer;
pub mod value;

pub use crate::{error::RuntimeError, runtime::TaskResults, value::Value};

/// The source text couldn't be turned into a program.
#[derive(Debug)]
pub enum SourceError {
    Tokenize(Vec<tokenizer::TokenizerError>),
    Parse(Vec<parser::ParserError>),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (stage, messages): (&str, Vec<&str>) = match self {
            SourceError::Tokenize(errors) => {
                ("tokenize", errors.iter().map(|e| e.message()).collect())
            }
            SourceError::Parse(errors) => ("parse", errors.iter().map(|e| e.message()).collect()),
        };
        write!(f, "{stage} error: {}", messages.join("; "))
    }
}

impl std::error::Error for SourceError {}

/// Parse source text into task definitions.
pub fn parse_program(input: &str) -> Result<Vec<node::Item>, SourceError> {
    let input_chars: Vec<_> = input.chars().collect();
    let mut tokenizer = Tokenizer::new(&input_chars);
    tokenizer.tokenize();

    if !tokenizer.errors.is_empty() {
        return Err(SourceError::Tokenize(tokenizer.errors));
    }

    let mut parser = Parser::new(&tokenizer.tokens);
    parser.parse_top_level();

    if !parser.errors.is_empty() {
        return Err(SourceError::Parse(parser.errors));
    }

    Ok(parser.items)
}

/// Run a program with `$out` wired to stdout.
pub fn run_code(input: &str) -> Result<TaskResults, SourceError> {
    run_with_runtime(input, Runtime::new())
}

/// Run a program with `$out` wired to the given sink.
pub fn run_code_with_output(
    input: &str,
    output: Box<dyn Write + Send>,
) -> Result<TaskResults, SourceError> {
    run_with_runtime(input, Runtime::with_output(output))
}

fn run_with_runtime(input: &str, mut runtime: Runtime) -> Result<TaskResults, SourceError> {
    for item in parse_program(input)? {
        match item.kind {
            ItemKind::TaskDefinition {
                name,
                instances,
                body,
            } => runtime.add_task(&name, body, instances),
        }
    }

    runtime.start();
    Ok(runtime.join())
}

/// The process exit code a set of task outcomes deserves: zero unless some
/// task ended with a real error (`exit` is a normal ending).
pub fn exit_code(results: &TaskResults) -> i32 {
    let failed = results
        .values()
        .any(|result| matches!(result, Err(e) if !e.is_exit()));
    if failed {
        1
    } else {
        0
    }
}

/// The diagnostic worth reporting for a run, if any: deadlock wins (it is
/// program-wide), otherwise the first failing task in name order.
pub fn failure_diagnostic(results: &TaskResults) -> Option<String> {
    let mut failures: Vec<(&String, &RuntimeError)> = results
        .iter()
        .filter_map(|(name, result)| match result {
            Err(e) if !e.is_exit() => Some((name, e)),
            _ => None,
        })
        .collect();

    if failures.iter().any(|(_, e)| **e == RuntimeError::Deadlock) {
        return Some(RuntimeError::Deadlock.to_string());
    }

    failures.sort_by_key(|&(name, _)| name);
    failures
        .first()
        .map(|(name, e)| format!("task {name}: {e}"))
}
