use crate::ast::{BinaryOperator, Node};
use crate::environment::{Context, EnvRef};
use crate::error::{ErrorKind, Fault};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A vlbasic number. Integer arithmetic stays integral until it overflows,
/// at which point it falls back to floating point.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(n) => n,
        }
    }

    pub fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }

    fn combine(
        self,
        other: Number,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Number {
        if let (Number::Int(a), Number::Int(b)) = (self, other) {
            if let Some(n) = int_op(a, b) {
                return Number::Int(n);
            }
        }
        Number::Float(float_op(self.as_f64(), other.as_f64()))
    }

    pub fn add(self, other: Number) -> Number {
        self.combine(other, i64::checked_add, |a, b| a + b)
    }

    pub fn sub(self, other: Number) -> Number {
        self.combine(other, i64::checked_sub, |a, b| a - b)
    }

    pub fn mul(self, other: Number) -> Number {
        self.combine(other, i64::checked_mul, |a, b| a * b)
    }

    /// Division always produces a float.
    pub fn div(self, other: Number) -> Result<Number, Fault> {
        if other.is_zero() {
            return Err(division_by_zero());
        }
        Ok(Number::Float(self.as_f64() / other.as_f64()))
    }

    /// Floored modulo: the result takes the sign of the divisor.
    pub fn rem(self, other: Number) -> Result<Number, Fault> {
        if other.is_zero() {
            return Err(division_by_zero());
        }
        Ok(self.combine(
            other,
            |a, b| {
                let r = a.checked_rem(b)?;
                if r != 0 && (r < 0) != (b < 0) {
                    r.checked_add(b)
                } else {
                    Some(r)
                }
            },
            |a, b| a - b * (a / b).floor(),
        ))
    }

    pub fn pow(self, other: Number) -> Result<Number, Fault> {
        if let (Number::Int(base), Number::Int(exp)) = (self, other) {
            if let Ok(exp) = u32::try_from(exp) {
                if let Some(n) = base.checked_pow(exp) {
                    return Ok(Number::Int(n));
                }
            }
        }

        let result = self.as_f64().powf(other.as_f64());
        if result.is_nan() {
            return Err(Fault::new(
                ErrorKind::ValueError,
                format!("{} ^ {} is not a real number", self, other),
            ));
        }
        if result.is_infinite() && self.is_zero() {
            return Err(division_by_zero());
        }
        Ok(Number::Float(result))
    }

    pub fn neg(self) -> Number {
        match self {
            Number::Int(n) => n
                .checked_neg()
                .map(Number::Int)
                .unwrap_or(Number::Float(-(n as f64))),
            Number::Float(n) => Number::Float(-n),
        }
    }

    /// The integral value, if this number has no fractional part.
    pub fn as_index(self) -> Option<i64> {
        match self {
            Number::Int(n) => Some(n),
            Number::Float(_) => None,
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Number) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Number) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.partial_cmp(b),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{}", n),
            Number::Float(n) => {
                // Always show at least one decimal place for floats
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
        }
    }
}

fn division_by_zero() -> Fault {
    Fault::new(ErrorKind::DivisionByZero, "Unable to divide by zero")
}

/// Signature shared by every native callback. The context is the frame of
/// the call itself: its display name is `name()`, its environment is the
/// caller's scope and its parent is the caller's context.
pub type NativeFn = dyn Fn(&[Value], &Context) -> Result<Value, Fault>;

/// Accepted argument counts for a native function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: usize,
}

impl Arity {
    pub fn exact(n: usize) -> Self {
        Self { min: n, max: n }
    }

    pub fn range(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn check(&self, function: &str, got: usize) -> Result<(), Fault> {
        if got >= self.min && got <= self.max {
            return Ok(());
        }
        let expected = if self.min == self.max {
            self.min.to_string()
        } else if self.max == usize::MAX {
            format!("at least {}", self.min)
        } else {
            format!("{} to {}", self.min, self.max)
        };
        Err(Fault::argument_count(function, &expected, got))
    }
}

/// A host-provided function. When `arity` is set the interpreter checks the
/// argument count before calling; otherwise the callback validates its own
/// arguments.
pub struct BuiltInFunction {
    pub name: String,
    pub arity: Option<Arity>,
    pub func: Box<NativeFn>,
}

impl BuiltInFunction {
    pub fn new(
        name: impl Into<String>,
        arity: Option<Arity>,
        func: impl Fn(&[Value]) -> Result<Value, Fault> + 'static,
    ) -> Self {
        Self::with_context(name, arity, move |args, _| func(args))
    }

    /// A built-in that also reads the context it is called from.
    pub fn with_context(
        name: impl Into<String>,
        arity: Option<Arity>,
        func: impl Fn(&[Value], &Context) -> Result<Value, Fault> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            func: Box::new(func),
        }
    }

    pub fn call(&self, args: &[Value], ctx: &Context) -> Result<Value, Fault> {
        if let Some(arity) = &self.arity {
            arity.check(&self.name, args.len())?;
        }
        (self.func)(args, ctx)
    }
}

/// A user-defined function together with the environment it was defined in.
pub struct Function {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Rc<Vec<Node>>,
    pub closure: EnvRef,
}

impl Function {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

/// The exported bindings of an imported module, in declaration order.
pub struct Module {
    pub name: String,
    pub exports: Vec<(String, Value)>,
}

impl Module {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.exports
            .iter()
            .find(|(export, _)| export == name)
            .map(|(_, value)| value)
    }
}

/// Insertion-ordered mapping keyed by value equality.
#[derive(Clone, Default)]
pub struct Dictionary {
    entries: Vec<(Value, Value)>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.equals(key))
            .map(|(_, v)| v)
    }

    /// Index of the entry whose key equals `key`.
    pub fn position(&self, key: &Value) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.equals(key))
    }

    /// Replaces the value of an equal key in place, or appends a new entry.
    pub fn insert(&mut self, key: Value, value: Value) {
        let position = self.position(&key);
        self.store(position, key, value);
    }

    /// Writes to the entry at `position`, or appends when there is none.
    fn store(&mut self, position: Option<usize>, key: Value, value: Value) {
        match position.and_then(|p| self.entries.get_mut(p)) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }
}

impl FromIterator<(Value, Value)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        let mut dictionary = Dictionary::new();
        for (key, value) in iter {
            dictionary.insert(key, value);
        }
        dictionary
    }
}

/// A runtime value. Lists and dictionaries are shared handles: copies of a
/// `Value` alias the same container.
#[derive(Clone)]
pub enum Value {
    Number(Number),
    String(String),
    Boolean(bool),
    Null,
    List(Rc<RefCell<Vec<Value>>>),
    Dictionary(Rc<RefCell<Dictionary>>),
    Function(Rc<Function>),
    BuiltIn(Rc<BuiltInFunction>),
    Module(Rc<Module>),
}

impl Value {
    pub fn int(n: i64) -> Value {
        Value::Number(Number::Int(n))
    }

    pub fn float(n: f64) -> Value {
        Value::Number(Number::Float(n))
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dictionary(dictionary: Dictionary) -> Value {
        Value::Dictionary(Rc::new(RefCell::new(dictionary)))
    }

    pub fn builtin(builtin: BuiltInFunction) -> Value {
        Value::BuiltIn(Rc::new(builtin))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Boolean(_) => "Boolean",
            Value::Null => "Null",
            Value::List(_) => "List",
            Value::Dictionary(_) => "Dictionary",
            Value::Function(_) => "Function",
            Value::BuiltIn(_) => "BuiltInFunction",
            Value::Module(_) => "Module",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used for arithmetic; booleans count as 0 and 1.
    fn numeric(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Boolean(b) => Some(Number::Int(*b as i64)),
            _ => None,
        }
    }

    pub fn to_boolean(&self) -> Result<bool, Fault> {
        match self {
            Value::Number(n) => Ok(!n.is_zero()),
            Value::String(s) => Ok(!s.is_empty()),
            Value::Boolean(b) => Ok(*b),
            Value::Null => Ok(false),
            Value::List(items) => Ok(!items.borrow().is_empty()),
            Value::Dictionary(entries) => Ok(!entries.borrow().is_empty()),
            _ => Err(Fault::unsupported(format!(
                "A value of type {} has no truth value",
                self.type_name()
            ))),
        }
    }

    pub fn to_number(&self) -> Result<Number, Fault> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Boolean(b) => Ok(Number::Int(*b as i64)),
            Value::String(s) => parse_number(s).ok_or_else(|| {
                Fault::new(
                    ErrorKind::InvalidConversion,
                    format!("Unable to convert the string '{}' to a number", s),
                )
            }),
            _ => Err(Fault::new(
                ErrorKind::InvalidConversion,
                format!("Unable to convert a value of type {} to a number", self.type_name()),
            )),
        }
    }

    /// Number of characters, items or entries, for sized values.
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::List(items) => Some(items.borrow().len()),
            Value::Dictionary(entries) => Some(entries.borrow().len()),
            _ => None,
        }
    }

    pub fn binary_op(&self, operator: BinaryOperator, other: &Value) -> Result<Value, Fault> {
        match operator {
            BinaryOperator::Add => self.add(other),
            BinaryOperator::Subtract => self.arithmetic(operator, other, |a, b| Ok(a.sub(b))),
            BinaryOperator::Multiply => self.multiply(other),
            BinaryOperator::Divide => self.arithmetic(operator, other, Number::div),
            BinaryOperator::Power => self.arithmetic(operator, other, Number::pow),
            BinaryOperator::Modulo => self.arithmetic(operator, other, Number::rem),
            BinaryOperator::Equal => Ok(Value::Boolean(self.equals(other))),
            BinaryOperator::NotEqual => Ok(Value::Boolean(!self.equals(other))),
            BinaryOperator::Greater
            | BinaryOperator::Less
            | BinaryOperator::GreaterEqual
            | BinaryOperator::LessEqual => self.compare(operator, other).map(Value::Boolean),
        }
    }

    fn unsupported(&self, operator: BinaryOperator, other: &Value) -> Fault {
        Fault::unsupported(format!(
            "Operator '{}' is not supported between {} and {}",
            operator,
            self.type_name(),
            other.type_name()
        ))
    }

    fn arithmetic(
        &self,
        operator: BinaryOperator,
        other: &Value,
        op: fn(Number, Number) -> Result<Number, Fault>,
    ) -> Result<Value, Fault> {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => op(a, b).map(Value::Number),
            _ => Err(self.unsupported(operator, other)),
        }
    }

    fn add(&self, other: &Value) -> Result<Value, Fault> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Ok(Value::list(items))
            }
            _ => self.arithmetic(BinaryOperator::Add, other, |a, b| Ok(a.add(b))),
        }
    }

    fn multiply(&self, other: &Value) -> Result<Value, Fault> {
        match (self, other) {
            (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
                match n.as_index() {
                    Some(count) => repeat(s, count),
                    None => Err(Fault::unsupported(format!(
                        "A string can only be repeated a whole number of times, not {}",
                        n
                    ))),
                }
            }
            _ => self.arithmetic(BinaryOperator::Multiply, other, |a, b| Ok(a.mul(b))),
        }
    }

    /// Value equality. Mismatched kinds are unequal, except that a boolean
    /// compares to a number as 0 or 1.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Number(n), Value::Boolean(b)) | (Value::Boolean(b), Value::Number(n)) => {
                *n == Number::Int(*b as i64)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Dictionary(a), Value::Dictionary(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, value)| b.get(key).is_some_and(|other| value.equals(other)))
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::BuiltIn(a), Value::BuiltIn(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn compare(&self, operator: BinaryOperator, other: &Value) -> Result<bool, Fault> {
        let (a, b) = match (self, other) {
            (Value::Number(a), Value::Number(b)) => (*a, *b),
            _ => return Err(self.unsupported(operator, other)),
        };
        Ok(match operator {
            BinaryOperator::Greater => a > b,
            BinaryOperator::Less => a < b,
            BinaryOperator::GreaterEqual => a >= b,
            _ => a <= b,
        })
    }

    pub fn negate(&self) -> Result<Value, Fault> {
        match self.numeric() {
            Some(n) => Ok(Value::Number(n.neg())),
            None => Err(Fault::unsupported(format!(
                "Unary '-' is not supported for {}",
                self.type_name()
            ))),
        }
    }

    pub fn plus(&self) -> Result<Value, Fault> {
        match self.numeric() {
            Some(n) => Ok(Value::Number(n)),
            None => Err(Fault::unsupported(format!(
                "Unary '+' is not supported for {}",
                self.type_name()
            ))),
        }
    }

    pub fn not(&self) -> Result<Value, Fault> {
        self.to_boolean().map(|b| Value::Boolean(!b))
    }

    pub fn get_item(&self, index: &Value) -> Result<Value, Fault> {
        match self {
            Value::String(s) => {
                let length = s.chars().count();
                let position = checked_index(index, length, "String")?;
                let c = s.chars().nth(position).unwrap_or_default();
                Ok(Value::String(c.to_string()))
            }
            Value::List(items) => {
                let items = items.borrow();
                let position = checked_index(index, items.len(), "List")?;
                Ok(items[position].clone())
            }
            Value::Dictionary(entries) => entries.borrow().get(index).cloned().ok_or_else(|| {
                Fault::new(ErrorKind::InvalidKey, format!("Invalid key {}", index.repr()))
            }),
            _ => Err(Fault::unsupported(format!(
                "A value of type {} cannot be indexed",
                self.type_name()
            ))),
        }
    }

    pub fn set_item(&self, index: &Value, value: Value) -> Result<(), Fault> {
        match self {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                let position = checked_index(index, items.len(), "List")?;
                items[position] = value;
                Ok(())
            }
            Value::Dictionary(entries) => {
                // The key may be this dictionary, so compare before borrowing mutably
                let position = entries.borrow().position(index);
                entries.borrow_mut().store(position, index.clone(), value);
                Ok(())
            }
            Value::String(_) => Err(Fault::unsupported(
                "Strings are immutable; characters cannot be assigned",
            )),
            _ => Err(Fault::unsupported(format!(
                "A value of type {} does not support item assignment",
                self.type_name()
            ))),
        }
    }

    /// Text form used inside containers: strings are quoted.
    pub fn repr(&self) -> String {
        match self {
            Value::String(s) => format!("'{}'", s),
            other => other.to_string(),
        }
    }
}

/// Longest string, in bytes, that repetition may build.
pub const MAX_REPEAT_BYTES: usize = 1 << 28;

fn repeat(s: &str, count: i64) -> Result<Value, Fault> {
    let count = usize::try_from(count.max(0)).unwrap_or(usize::MAX);
    match s.len().checked_mul(count) {
        Some(bytes) if bytes <= MAX_REPEAT_BYTES => Ok(Value::String(s.repeat(count))),
        _ => Err(Fault::new(
            ErrorKind::ValueError,
            format!(
                "Repeating a string of length {} {} times exceeds the limit of {} bytes",
                s.chars().count(),
                count,
                MAX_REPEAT_BYTES
            ),
        )),
    }
}

fn checked_index(index: &Value, length: usize, kind: &str) -> Result<usize, Fault> {
    let position = match index {
        Value::Number(n) => n.as_index(),
        _ => None,
    };
    let position = match position {
        Some(p) => p,
        None => {
            return Err(Fault::new(
                ErrorKind::ValueError,
                format!(
                    "{} indices must be integers, not {}",
                    kind,
                    index.type_name()
                ),
            ))
        }
    };
    if position < 0 || position as usize >= length {
        return Err(Fault::new(
            ErrorKind::IndexOutOfRange,
            format!(
                "{} index {} is out of range for length {}",
                kind, position, length
            ),
        ));
    }
    Ok(position as usize)
}

/// Digits with at most one '.', which may not lead.
fn parse_number(text: &str) -> Option<Number> {
    if text.is_empty() {
        return None;
    }
    let mut dots = 0;
    for (i, c) in text.chars().enumerate() {
        if c.is_ascii_digit() {
            continue;
        }
        if c == '.' && i > 0 && dots == 0 {
            dots += 1;
            continue;
        }
        return None;
    }

    if dots == 0 {
        match text.parse::<i64>() {
            Ok(n) => Some(Number::Int(n)),
            Err(_) => text.parse::<f64>().ok().map(Number::Float),
        }
    } else {
        let padded = if text.ends_with('.') {
            format!("{}0", text)
        } else {
            text.to_string()
        };
        padded.parse::<f64>().ok().map(Number::Float)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Null => write!(f, "NULL"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Dictionary(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Function(function) => write!(f, "{}()", function.display_name()),
            Value::BuiltIn(builtin) => write!(f, "{}()", builtin.name),
            Value::Module(module) => write!(f, "<module {}>", module.name),
        }
    }
}

// Functions hold their closure environment, which may in turn hold the
// function, so Debug never descends into it.
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({})", n),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Boolean(b) => write!(f, "Boolean({})", b),
            Value::Null => write!(f, "Null"),
            Value::List(items) => f.debug_tuple("List").field(&*items.borrow()).finish(),
            Value::Dictionary(entries) => {
                let entries = entries.borrow();
                f.debug_map()
                    .entries(entries.iter().map(|(k, v)| (k, v)))
                    .finish()
            }
            Value::Function(function) => write!(f, "Function({})", function.display_name()),
            Value::BuiltIn(builtin) => write!(f, "BuiltIn({})", builtin.name),
            Value::Module(module) => write!(f, "Module({})", module.name),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.equals(other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Value {
        Value::float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::String(s)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Value {
        Value::Number(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(left: Value, operator: BinaryOperator, right: Value) -> Result<Value, Fault> {
        left.binary_op(operator, &right)
    }

    #[test]
    fn test_integer_arithmetic_stays_integral() {
        assert_eq!(
            op(Value::int(7), BinaryOperator::Add, Value::int(5)).unwrap(),
            Value::int(12)
        );
        let product = op(Value::int(6), BinaryOperator::Multiply, Value::int(7)).unwrap();
        assert!(matches!(product, Value::Number(Number::Int(42))));
    }

    #[test]
    fn test_overflow_falls_back_to_float() {
        let sum = op(Value::int(i64::MAX), BinaryOperator::Add, Value::int(1)).unwrap();
        assert!(matches!(sum, Value::Number(Number::Float(_))));
    }

    #[test]
    fn test_division_yields_float() {
        let quotient = op(Value::int(6), BinaryOperator::Divide, Value::int(3)).unwrap();
        assert!(matches!(quotient, Value::Number(Number::Float(f)) if f == 2.0));
        assert_eq!(quotient.to_string(), "2.0");
    }

    #[test]
    fn test_division_by_zero_faults() {
        for divisor in [Value::int(0), Value::float(0.0), Value::Boolean(false)] {
            let fault = op(Value::int(1), BinaryOperator::Divide, divisor).unwrap_err();
            assert_eq!(fault.kind, ErrorKind::DivisionByZero);
        }
        let fault = op(Value::int(1), BinaryOperator::Modulo, Value::int(0)).unwrap_err();
        assert_eq!(fault.kind, ErrorKind::DivisionByZero);
    }

    #[test]
    fn test_modulo_follows_divisor_sign() {
        assert_eq!(
            op(Value::int(-7), BinaryOperator::Modulo, Value::int(3)).unwrap(),
            Value::int(2)
        );
        assert_eq!(
            op(Value::int(7), BinaryOperator::Modulo, Value::int(-3)).unwrap(),
            Value::int(-2)
        );
    }

    #[test]
    fn test_power() {
        assert_eq!(
            op(Value::int(2), BinaryOperator::Power, Value::int(10)).unwrap(),
            Value::int(1024)
        );
        assert_eq!(
            op(Value::int(2), BinaryOperator::Power, Value::int(-1)).unwrap(),
            Value::float(0.5)
        );
    }

    #[test]
    fn test_boolean_coerces_in_arithmetic() {
        assert_eq!(
            op(Value::Boolean(true), BinaryOperator::Add, Value::int(1)).unwrap(),
            Value::int(2)
        );
        assert_eq!(
            op(Value::int(5), BinaryOperator::Subtract, Value::Boolean(true)).unwrap(),
            Value::int(4)
        );
    }

    #[test]
    fn test_string_repetition() {
        assert_eq!(
            op(Value::string("ab"), BinaryOperator::Multiply, Value::int(3)).unwrap(),
            Value::string("ababab")
        );
        assert_eq!(
            op(Value::int(2), BinaryOperator::Multiply, Value::string("xy")).unwrap(),
            Value::string("xyxy")
        );
        assert_eq!(
            op(Value::string("ab"), BinaryOperator::Multiply, Value::int(-1)).unwrap(),
            Value::string("")
        );
    }

    #[test]
    fn test_concatenation_requires_same_kind() {
        assert_eq!(
            op(Value::string("a"), BinaryOperator::Add, Value::string("b")).unwrap(),
            Value::string("ab")
        );
        let fault = op(Value::string("a"), BinaryOperator::Add, Value::int(1)).unwrap_err();
        assert_eq!(fault.kind, ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn test_equality_semantics() {
        assert!(Value::int(1).equals(&Value::Boolean(true)));
        assert!(Value::int(0).equals(&Value::Boolean(false)));
        assert!(Value::Boolean(true).equals(&Value::int(1)));
        assert!(!Value::int(0).equals(&Value::Null));
        assert!(!Value::string("").equals(&Value::Boolean(false)));
        assert!(Value::int(2).equals(&Value::float(2.0)));
    }

    #[test]
    fn test_dictionary_equality_ignores_order() {
        let a: Dictionary = vec![
            (Value::string("x"), Value::int(1)),
            (Value::string("y"), Value::int(2)),
        ]
        .into_iter()
        .collect();
        let b: Dictionary = vec![
            (Value::string("y"), Value::int(2)),
            (Value::string("x"), Value::int(1)),
        ]
        .into_iter()
        .collect();
        assert!(Value::dictionary(a).equals(&Value::dictionary(b)));
    }

    #[test]
    fn test_ordering_only_between_numbers() {
        assert_eq!(
            op(Value::int(2), BinaryOperator::Greater, Value::float(1.5)).unwrap(),
            Value::Boolean(true)
        );
        let fault = op(Value::string("a"), BinaryOperator::Less, Value::string("b")).unwrap_err();
        assert_eq!(fault.kind, ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::int(0).to_boolean().unwrap());
        assert!(Value::float(0.1).to_boolean().unwrap());
        assert!(!Value::string("").to_boolean().unwrap());
        assert!(!Value::list(vec![]).to_boolean().unwrap());
        assert!(!Value::Null.to_boolean().unwrap());
        assert!(Value::list(vec![Value::Null]).to_boolean().unwrap());
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Value::string("42").to_number().unwrap(), Number::Int(42));
        assert_eq!(Value::string("4.5").to_number().unwrap(), Number::Float(4.5));
        for bad in ["", ".5", "1.2.3", "12a", "-3"] {
            let fault = Value::string(bad).to_number().unwrap_err();
            assert_eq!(fault.kind, ErrorKind::InvalidConversion, "input {:?}", bad);
        }
    }

    #[test]
    fn test_display() {
        let list = Value::list(vec![Value::int(1), Value::float(2.0), Value::string("a")]);
        assert_eq!(list.to_string(), "[1, 2.0, a]");
        let dict = Value::dictionary(
            vec![(Value::string("k"), Value::Boolean(true))]
                .into_iter()
                .collect(),
        );
        assert_eq!(dict.to_string(), "{k: TRUE}");
        assert_eq!(Value::Null.to_string(), "NULL");
    }

    #[test]
    fn test_indexing() {
        let list = Value::list(vec![Value::int(1), Value::int(2), Value::int(3)]);
        assert_eq!(list.get_item(&Value::int(1)).unwrap(), Value::int(2));
        let fault = list.get_item(&Value::int(5)).unwrap_err();
        assert_eq!(fault.kind, ErrorKind::IndexOutOfRange);
        let fault = list.get_item(&Value::int(-1)).unwrap_err();
        assert_eq!(fault.kind, ErrorKind::IndexOutOfRange);

        assert_eq!(
            Value::string("abc").get_item(&Value::int(2)).unwrap(),
            Value::string("c")
        );
        let fault = Value::string("abc")
            .set_item(&Value::int(0), Value::string("x"))
            .unwrap_err();
        assert_eq!(fault.kind, ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn test_dictionary_upsert_and_missing_key() {
        let dict = Value::dictionary(Dictionary::new());
        dict.set_item(&Value::int(1), Value::string("one")).unwrap();
        dict.set_item(&Value::Boolean(true), Value::string("uno")).unwrap();
        assert_eq!(dict.length(), Some(1));
        assert_eq!(dict.get_item(&Value::int(1)).unwrap(), Value::string("uno"));

        let fault = dict.get_item(&Value::int(2)).unwrap_err();
        assert_eq!(fault.kind, ErrorKind::InvalidKey);
    }

    #[test]
    fn test_lists_are_shared_handles() {
        let list = Value::list(vec![Value::int(1)]);
        let alias = list.clone();
        alias.set_item(&Value::int(0), Value::int(9)).unwrap();
        assert_eq!(list.get_item(&Value::int(0)).unwrap(), Value::int(9));
    }

    #[test]
    fn test_dictionary_can_be_its_own_key() {
        let dict = Value::dictionary(Dictionary::new());
        dict.set_item(&Value::dictionary(Dictionary::new()), Value::int(1))
            .unwrap();
        dict.set_item(&dict, Value::int(2)).unwrap();
        assert_eq!(dict.length(), Some(2));
        assert_eq!(dict.get_item(&dict).unwrap(), Value::int(2));

        dict.set_item(&dict, Value::int(3)).unwrap();
        assert_eq!(dict.length(), Some(2));
        assert_eq!(dict.get_item(&dict).unwrap(), Value::int(3));
    }

    #[test]
    fn test_string_repetition_is_bounded() {
        assert_eq!(
            op(Value::string("ab"), BinaryOperator::Multiply, Value::int(3)).unwrap(),
            Value::string("ababab")
        );
        assert_eq!(
            op(Value::int(-2), BinaryOperator::Multiply, Value::string("ab")).unwrap(),
            Value::string("")
        );

        let fault = op(Value::string("ab"), BinaryOperator::Multiply, Value::int(i64::MAX))
            .unwrap_err();
        assert_eq!(fault.kind, ErrorKind::ValueError);
        let fault = op(
            Value::string("x"),
            BinaryOperator::Multiply,
            Value::int(MAX_REPEAT_BYTES as i64 + 1),
        )
        .unwrap_err();
        assert_eq!(fault.kind, ErrorKind::ValueError);
    }
}
