use crate::config::Config;
use crate::evaluator::Interpreter;
use crate::lexer;
use crate::parser;
use log::debug;
use std::path::Path;
use std::time::Instant;

/// How much of the pipeline to dump to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugLevel {
    #[default]
    Off,
    /// Stage names only.
    Stages,
    /// Stage names plus tokens, AST and results.
    All,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config: Config,
    pub debug: DebugLevel,
    pub time: bool,
}

/// Runs a script file through all three stages, reporting the first fault.
/// Returns whether the script completed.
pub fn run(source: &str, filename: &Path, options: &RunOptions) -> bool {
    let started = Instant::now();
    let name = filename.display().to_string();
    let succeeded = run_stages(source, &name, filename, options);

    if options.time {
        eprintln!("Finished in {:.3}s", started.elapsed().as_secs_f64());
    }
    succeeded
}

fn run_stages(source: &str, name: &str, path: &Path, options: &RunOptions) -> bool {
    stage(options, "tokenize");
    let tokens = match lexer::tokenize(name, source) {
        Ok(tokens) => tokens,
        Err(error) => {
            error.report();
            return false;
        }
    };
    if options.debug == DebugLevel::All {
        for token in &tokens {
            eprintln!("  {:?} {:?}", token.token_type, token.lexeme);
        }
    }

    stage(options, "parse");
    let statements = match parser::parse(name, tokens) {
        Ok(statements) => statements,
        Err(error) => {
            error.report();
            return false;
        }
    };
    if options.debug == DebugLevel::All {
        for statement in &statements {
            eprintln!("  {:#?}", statement);
        }
    }

    stage(options, "interpret");
    let mut interpreter = Interpreter::new(options.config.clone());
    match interpreter.run_script(path, &statements) {
        Ok(values) => {
            debug!("{} produced {} values", name, values.len());
            if options.debug == DebugLevel::All {
                for value in &values {
                    eprintln!("  {}", value.repr());
                }
            }
            true
        }
        Err(error) => {
            error.report();
            false
        }
    }
}

fn stage(options: &RunOptions, name: &str) {
    if options.debug != DebugLevel::Off {
        eprintln!("[{}]", name);
    }
}
