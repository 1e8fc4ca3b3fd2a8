use crate::config::Config;
use crate::environment::Context;
use crate::evaluator::Interpreter;
use crate::lexer;
use crate::parser;
use std::io::{self, Write};
use std::rc::Rc;

const STDIN: &str = "<stdin>";

/// Interactive shell. Declarations persist between lines.
pub fn start(config: Config) {
    println!("vlbasic {}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl+D to quit");
    println!();

    let mut interpreter = Interpreter::new(config);
    let ctx = match interpreter.new_context(STDIN) {
        Ok(ctx) => ctx,
        Err(error) => {
            error.report();
            return;
        }
    };

    loop {
        print!("vlb > ");
        if let Err(error) = io::stdout().flush() {
            eprintln!("Error writing prompt: {}", error);
            break;
        }

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => {
                println!();
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    println!("Goodbye!");
                    break;
                }

                for echoed in run_line(line, &mut interpreter, &ctx) {
                    println!("{}", echoed);
                }
            }
            Err(error) => {
                eprintln!("Error reading input: {}", error);
                break;
            }
        }
    }
}

/// Runs one line in `ctx` and returns the text of every non-Null result.
/// Faults are reported and yield nothing.
pub fn run_line(source: &str, interpreter: &mut Interpreter, ctx: &Rc<Context>) -> Vec<String> {
    let result = lexer::tokenize(STDIN, source)
        .and_then(|tokens| parser::parse(STDIN, tokens))
        .and_then(|statements| interpreter.interpret(&statements, ctx));

    match result {
        Ok(values) => values
            .iter()
            .filter(|value| !value.is_null())
            .map(|value| value.repr())
            .collect(),
        Err(error) => {
            error.report();
            Vec::new()
        }
    }
}
