use crate::builtins::{integral, sqrt, write_output, Output};
use crate::config::Config;
use crate::environment::Context;
use crate::error::{ErrorKind, Fault};
use crate::value::{Arity, BuiltInFunction, Dictionary, NativeFn, Number, Value};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A value exposed by a native module before conversion to a runtime value.
#[derive(Clone)]
pub enum NativeValue {
    Number(Number),
    Text(String),
    Boolean(bool),
    Null,
    List(Vec<NativeValue>),
    Map(Vec<(NativeValue, NativeValue)>),
    Function(Rc<NativeFn>),
}

/// One row of a native module's `variables` table.
#[derive(Clone)]
pub struct NativeVariable {
    pub value: NativeValue,
    pub constant: bool,
    /// Accepted argument counts when `value` is a function; any count when
    /// absent.
    pub parameters: Option<Arity>,
}

impl NativeVariable {
    pub fn constant(value: NativeValue) -> Self {
        Self {
            value,
            constant: true,
            parameters: None,
        }
    }

    pub fn function(
        parameters: Arity,
        func: impl Fn(&[Value]) -> Result<Value, Fault> + 'static,
    ) -> Self {
        Self::function_with_context(parameters, move |args, _| func(args))
    }

    /// A function that also receives the context of each call.
    pub fn function_with_context(
        parameters: Arity,
        func: impl Fn(&[Value], &Context) -> Result<Value, Fault> + 'static,
    ) -> Self {
        Self {
            value: NativeValue::Function(Rc::new(func)),
            constant: true,
            parameters: Some(parameters),
        }
    }
}

/// A module implemented in Rust rather than in a `.vlb` file.
pub struct NativeModule {
    pub name: String,
    pub variables: Vec<(String, NativeVariable)>,
}

impl NativeModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
        }
    }

    pub fn with(mut self, name: &str, variable: NativeVariable) -> Self {
        self.variables.push((name.to_string(), variable));
        self
    }

    /// Converts the `variables` table into `(name, value, is_constant)`
    /// triples.
    pub fn exports(&self) -> Result<Vec<(String, Value, bool)>, Fault> {
        self.variables
            .iter()
            .map(|(name, variable)| {
                let value = convert(name, &variable.value, variable.parameters, true)?;
                Ok((name.clone(), value, variable.constant))
            })
            .collect()
    }
}

fn convert(
    name: &str,
    value: &NativeValue,
    parameters: Option<Arity>,
    top_level: bool,
) -> Result<Value, Fault> {
    Ok(match value {
        NativeValue::Number(n) => Value::Number(*n),
        NativeValue::Text(s) => Value::String(s.clone()),
        NativeValue::Boolean(b) => Value::Boolean(*b),
        NativeValue::Null => Value::Null,
        NativeValue::List(items) => Value::list(
            items
                .iter()
                .map(|item| convert(name, item, None, false))
                .collect::<Result<_, _>>()?,
        ),
        NativeValue::Map(entries) => {
            let mut dictionary = Dictionary::new();
            for (key, value) in entries {
                dictionary.insert(
                    convert(name, key, None, false)?,
                    convert(name, value, None, false)?,
                );
            }
            Value::dictionary(dictionary)
        }
        NativeValue::Function(func) => {
            if !top_level {
                return Err(Fault::new(
                    ErrorKind::ValueError,
                    format!(
                        "Native module variable '{}' nests a function inside a list or map",
                        name
                    ),
                ));
            }
            let func = Rc::clone(func);
            Value::builtin(BuiltInFunction::with_context(name, parameters, move |args, ctx| {
                (*func)(args, ctx)
            }))
        }
    })
}

/// Native modules available to `IMPORT`, by name.
#[derive(Default)]
pub struct NativeRegistry {
    modules: HashMap<String, Rc<NativeModule>>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the `math` and `terminal` modules.
    pub fn with_defaults(output: &Output) -> Self {
        let mut registry = Self::new();
        registry.register(math_module());
        registry.register(terminal_module(output));
        registry
    }

    pub fn register(&mut self, module: NativeModule) {
        self.modules.insert(module.name.clone(), Rc::new(module));
    }

    pub fn get(&self, name: &str) -> Option<Rc<NativeModule>> {
        self.modules.get(name).cloned()
    }
}

/// Where an import name was found.
pub enum ModuleSource {
    File(PathBuf),
    Native(Rc<NativeModule>),
}

/// Probes, in order: `<script dir>/modules`, `<root>/modules`, the script
/// directory, the root directory, then the native registry.
pub fn resolve(
    config: &Config,
    natives: &NativeRegistry,
    script_dir: Option<&Path>,
    name: &str,
) -> Option<ModuleSource> {
    let file_name = format!("{}.{}", name, config.extension);
    let root = config.root_dir.as_path();

    let mut candidates = Vec::with_capacity(4);
    if let Some(dir) = script_dir {
        candidates.push(dir.join(&config.modules_dir).join(&file_name));
    }
    candidates.push(root.join(&config.modules_dir).join(&file_name));
    if let Some(dir) = script_dir {
        candidates.push(dir.join(&file_name));
    }
    candidates.push(root.join(&file_name));

    for candidate in candidates {
        log::debug!("module '{}': probing {}", name, candidate.display());
        if candidate.is_file() {
            return Some(ModuleSource::File(candidate));
        }
    }

    natives.get(name).map(ModuleSource::Native)
}

/// The binding name used when an import has no alias.
pub fn default_alias(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

fn numbers(function: &str, args: &[Value]) -> Result<Vec<Number>, Fault> {
    args.iter()
        .map(|arg| match arg {
            Value::Number(n) => Ok(*n),
            other => Err(Fault::value_error("Number", other.type_name())
                .with_help(format!("{} only accepts numbers", function))),
        })
        .collect()
}

fn math_module() -> NativeModule {
    NativeModule::new("math")
        .with(
            "PI",
            NativeVariable::constant(NativeValue::Number(Number::Float(std::f64::consts::PI))),
        )
        .with(
            "E",
            NativeVariable::constant(NativeValue::Number(Number::Float(std::f64::consts::E))),
        )
        .with(
            "TAU",
            NativeVariable::constant(NativeValue::Number(Number::Float(std::f64::consts::TAU))),
        )
        .with(
            "sqrt",
            NativeVariable::function(Arity::exact(1), |args| {
                let n = numbers("sqrt", args)?[0];
                sqrt(n).map(Value::Number)
            }),
        )
        .with(
            "abs",
            NativeVariable::function(Arity::exact(1), |args| {
                let n = numbers("abs", args)?[0];
                Ok(Value::Number(match n {
                    Number::Int(i) => i
                        .checked_abs()
                        .map(Number::Int)
                        .unwrap_or(Number::Float((i as f64).abs())),
                    Number::Float(f) => Number::Float(f.abs()),
                }))
            }),
        )
        .with(
            "floor",
            NativeVariable::function(Arity::exact(1), |args| {
                let n = numbers("floor", args)?[0];
                Ok(Value::Number(integral(n.as_f64().floor())))
            }),
        )
        .with(
            "ceil",
            NativeVariable::function(Arity::exact(1), |args| {
                let n = numbers("ceil", args)?[0];
                Ok(Value::Number(integral(n.as_f64().ceil())))
            }),
        )
        .with(
            "round",
            NativeVariable::function(Arity::exact(1), |args| {
                let n = numbers("round", args)?[0];
                Ok(Value::Number(integral(n.as_f64().round())))
            }),
        )
        .with(
            "min",
            NativeVariable::function(Arity::range(1, usize::MAX), |args| {
                let values = numbers("min", args)?;
                let smallest = values
                    .into_iter()
                    .reduce(|a, b| if b < a { b } else { a })
                    .unwrap_or(Number::Int(0));
                Ok(Value::Number(smallest))
            }),
        )
        .with(
            "max",
            NativeVariable::function(Arity::range(1, usize::MAX), |args| {
                let values = numbers("max", args)?;
                let largest = values
                    .into_iter()
                    .reduce(|a, b| if b > a { b } else { a })
                    .unwrap_or(Number::Int(0));
                Ok(Value::Number(largest))
            }),
        )
}

fn joined(args: &[Value]) -> String {
    args.iter()
        .map(|arg| arg.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn terminal_module(output: &Output) -> NativeModule {
    let print_out = Rc::clone(output);
    let line_out = Rc::clone(output);
    let prompt_out = Rc::clone(output);
    let clear_out = Rc::clone(output);

    NativeModule::new("terminal")
        .with(
            "print",
            NativeVariable::function(Arity::range(1, usize::MAX), move |args| {
                write_output(&print_out, &joined(args), false)?;
                Ok(Value::Null)
            }),
        )
        .with(
            "printLine",
            NativeVariable::function(Arity::range(1, usize::MAX), move |args| {
                write_output(&line_out, &joined(args), true)?;
                Ok(Value::Null)
            }),
        )
        .with(
            "input",
            NativeVariable::function(Arity::range(0, 1), move |args| {
                if let Some(prompt) = args.first() {
                    write_output(&prompt_out, &prompt.to_string(), false)?;
                }
                let mut line = String::new();
                std::io::stdin()
                    .lock()
                    .read_line(&mut line)
                    .map_err(|e| {
                        Fault::new(ErrorKind::ValueError, format!("Failed to read input: {}", e))
                    })?;
                let trimmed = line.trim_end_matches(['\n', '\r']).len();
                line.truncate(trimmed);
                Ok(Value::String(line))
            }),
        )
        .with(
            "clear",
            NativeVariable::function(Arity::exact(0), move |_| {
                write_output(&clear_out, "\x1b[2J\x1b[1;1H", false)?;
                Ok(Value::Null)
            }),
        )
}
