use crate::environment::EnvRef;
use crate::error::{ErrorKind, Fault};
use crate::value::{Arity, BuiltInFunction, Number, Value};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Where `print` and friends write to. Shared so tests can capture output.
pub type Output = Rc<RefCell<dyn Write>>;

pub fn stdout() -> Output {
    Rc::new(RefCell::new(std::io::stdout()))
}

pub(crate) fn write_output(output: &Output, text: &str, newline: bool) -> Result<(), Fault> {
    let mut out = output.borrow_mut();
    let result = if newline {
        writeln!(out, "{}", text)
    } else {
        write!(out, "{}", text).and_then(|_| out.flush())
    };
    result.map_err(|e| Fault::new(ErrorKind::ValueError, format!("Failed to write output: {}", e)))
}

/// Declares the built-in constants and functions in a root environment.
pub fn install(env: &EnvRef, output: &Output) -> Result<(), Fault> {
    let mut env = env.borrow_mut();

    for (name, value) in [
        ("TRUE", Value::Boolean(true)),
        ("FALSE", Value::Boolean(false)),
        ("NULL", Value::Null),
        ("true", Value::Boolean(true)),
        ("false", Value::Boolean(false)),
        ("null", Value::Null),
    ] {
        env.declare_builtin(name, value)?;
    }

    let out = Rc::clone(output);
    env.declare_builtin(
        "print",
        Value::builtin(BuiltInFunction::new("print", None, move |args| {
            let text = args
                .iter()
                .map(|arg| arg.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            write_output(&out, &text, true)?;
            Ok(Value::Null)
        })),
    )?;

    env.declare_builtin(
        "string",
        Value::builtin(BuiltInFunction::new("string", Some(Arity::exact(1)), |args| {
            Ok(Value::String(args[0].to_string()))
        })),
    )?;

    env.declare_builtin(
        "number",
        Value::builtin(BuiltInFunction::new("number", Some(Arity::exact(1)), |args| {
            args[0].to_number().map(Value::Number)
        })),
    )?;

    env.declare_builtin(
        "len",
        Value::builtin(BuiltInFunction::new("len", Some(Arity::exact(1)), |args| {
            match args[0].length() {
                Some(n) => Ok(Value::int(n as i64)),
                None => Err(Fault::value_error(
                    "String, List or Dictionary",
                    args[0].type_name(),
                )),
            }
        })),
    )?;

    env.declare_builtin(
        "type",
        Value::builtin(BuiltInFunction::new("type", Some(Arity::exact(1)), |args| {
            Ok(Value::string(args[0].type_name()))
        })),
    )?;

    Ok(())
}

/// Resolves `receiver.name`. Methods come back as built-ins bound to the
/// receiver.
pub fn attribute(receiver: &Value, name: &str) -> Result<Value, Fault> {
    let found = match receiver {
        Value::Number(n) => number_attribute(*n, name),
        Value::String(_) | Value::List(_) => sequence_attribute(receiver, name),
        Value::Dictionary(_) => dictionary_attribute(receiver, name),
        Value::Module(module) => module.get(name).cloned(),
        _ => None,
    };

    found.ok_or_else(|| {
        Fault::unsupported(format!(
            "A value of type {} has no attribute '{}'",
            receiver.type_name(),
            name
        ))
    })
}

fn method(
    name: &str,
    arity: usize,
    func: impl Fn(&[Value]) -> Result<Value, Fault> + 'static,
) -> Option<Value> {
    Some(Value::builtin(BuiltInFunction::new(
        name,
        Some(Arity::exact(arity)),
        func,
    )))
}

fn number_attribute(n: Number, name: &str) -> Option<Value> {
    match name {
        "half" => method(name, 0, move |_| n.div(Number::Int(2)).map(Value::Number)),
        "double" => method(name, 0, move |_| Ok(Value::Number(n.mul(Number::Int(2))))),
        "floor" => method(name, 0, move |_| Ok(Value::Number(integral(n.as_f64().floor())))),
        "ceil" => method(name, 0, move |_| Ok(Value::Number(integral(n.as_f64().ceil())))),
        "sqrt" => method(name, 0, move |_| sqrt(n).map(Value::Number)),
        _ => None,
    }
}

pub(crate) fn integral(f: f64) -> Number {
    if f.is_finite() && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Number::Int(f as i64)
    } else {
        Number::Float(f)
    }
}

pub(crate) fn sqrt(n: Number) -> Result<Number, Fault> {
    let f = n.as_f64();
    if f < 0.0 {
        return Err(Fault::new(
            ErrorKind::ValueError,
            format!("Cannot take the square root of negative number {}", n),
        ));
    }
    Ok(Number::Float(f.sqrt()))
}

fn sequence_attribute(receiver: &Value, name: &str) -> Option<Value> {
    let this = receiver.clone();
    match name {
        "get" => method(name, 1, move |args| this.get_item(&args[0])),
        "getFromLast" => method(name, 1, move |args| {
            let length = this.length().unwrap_or(0) as i64;
            let offset = index_argument(&args[0])?;
            match (length - 1).checked_sub(offset) {
                Some(position) if position >= 0 => this.get_item(&Value::int(position)),
                _ => Err(Fault::new(
                    ErrorKind::IndexOutOfRange,
                    format!(
                        "Offset {} from the end is out of range for length {}",
                        offset, length
                    ),
                )),
            }
        }),
        "length" => method(name, 0, move |_| {
            Ok(Value::int(this.length().unwrap_or(0) as i64))
        }),
        "append" => match receiver {
            Value::List(items) => {
                let items = Rc::clone(items);
                method(name, 1, move |args| {
                    items.borrow_mut().push(args[0].clone());
                    Ok(Value::Null)
                })
            }
            _ => None,
        },
        "pop" => match receiver {
            Value::List(items) => {
                let items = Rc::clone(items);
                method(name, 0, move |_| {
                    items.borrow_mut().pop().ok_or_else(|| {
                        Fault::new(ErrorKind::IndexOutOfRange, "Cannot pop from an empty list")
                    })
                })
            }
            _ => None,
        },
        _ => None,
    }
}

fn index_argument(value: &Value) -> Result<i64, Fault> {
    match value {
        Value::Number(n) => n
            .as_index()
            .ok_or_else(|| Fault::value_error("whole Number", "fractional Number")),
        other => Err(Fault::value_error("Number", other.type_name())),
    }
}

fn dictionary_attribute(receiver: &Value, name: &str) -> Option<Value> {
    let entries = match receiver {
        Value::Dictionary(entries) => Rc::clone(entries),
        _ => return None,
    };
    match name {
        "keys" => method(name, 0, move |_| Ok(Value::list(entries.borrow().keys()))),
        "values" => method(name, 0, move |_| Ok(Value::list(entries.borrow().values()))),
        "length" => method(name, 0, move |_| Ok(Value::int(entries.borrow().len() as i64))),
        _ => None,
    }
}
