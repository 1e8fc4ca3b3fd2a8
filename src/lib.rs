// vlbasic language interpreter library
//
// A small dynamic scripting language: a tokenizer, a recursive-descent
// parser and a tree-walking interpreter with closures, modules and
// diagnostics that point at the offending source.

pub mod ast;
pub mod builtins;
pub mod config;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod modules;
pub mod parser;
pub mod repl;
pub mod runner;
pub mod value;

pub use ast::Node;
pub use config::Config;
pub use environment::{Context, Environment};
pub use error::{ErrorKind, Fault, Span, VlbError};
pub use evaluator::Interpreter;
pub use lexer::{tokenize, Token, TokenType};
pub use parser::parse;
pub use value::Value;

pub use repl::start as start_repl;
pub use runner::run;

/// Runs `source` with the default configuration and returns one value per
/// top-level statement.
pub fn run_source(filename: &str, source: &str) -> Result<Vec<Value>, VlbError> {
    Interpreter::new(Config::default()).run_source(filename, source)
}
