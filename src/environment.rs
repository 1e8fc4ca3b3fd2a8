use crate::error::{ErrorKind, Fault};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub type EnvRef = Rc<RefCell<Environment>>;

/// A named slot in an environment.
#[derive(Debug, Clone)]
pub struct Variable {
    pub value: Value,
    pub is_constant: bool,
    /// Slots installed by the host rather than declared by a script. They
    /// are never exported from a module.
    pub is_builtin: bool,
}

/// One table in the scope chain. Lookups and assignments walk parent-ward;
/// declarations always land in this table.
#[derive(Debug, Default)]
pub struct Environment {
    variables: HashMap<String, Variable>,
    order: Vec<String>,
    parent: Option<EnvRef>,
}

impl Environment {
    pub fn new() -> EnvRef {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn with_parent(parent: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Self {
            parent: Some(Rc::clone(parent)),
            ..Self::default()
        }))
    }

    pub fn parent(&self) -> Option<EnvRef> {
        self.parent.clone()
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn declare(&mut self, name: &str, value: Value, is_constant: bool) -> Result<(), Fault> {
        self.insert(name, value, is_constant, false)
    }

    pub fn declare_builtin(&mut self, name: &str, value: Value) -> Result<(), Fault> {
        self.insert(name, value, true, true)
    }

    fn insert(
        &mut self,
        name: &str,
        value: Value,
        is_constant: bool,
        is_builtin: bool,
    ) -> Result<(), Fault> {
        if self.variables.contains_key(name) {
            return Err(Fault::new(
                ErrorKind::DuplicateDeclaration,
                format!("Variable '{}' is already declared in this scope", name),
            )
            .with_help(format!("Use '{} = ...' to change its value", name)));
        }

        self.order.push(name.to_string());
        self.variables.insert(
            name.to_string(),
            Variable {
                value,
                is_constant,
                is_builtin,
            },
        );
        Ok(())
    }

    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), Fault> {
        if let Some(variable) = self.variables.get_mut(name) {
            if variable.is_constant {
                return Err(Fault::new(
                    ErrorKind::ConstantAssignment,
                    format!("Cannot assign to constant '{}'", name),
                ));
            }
            variable.value = value;
            return Ok(());
        }

        match Self::resolve(self.parent.as_ref(), name) {
            Some(owner) => owner.borrow_mut().assign(name, value),
            None => Err(undefined(name)),
        }
    }

    pub fn lookup(&self, name: &str) -> Result<Value, Fault> {
        if let Some(variable) = self.variables.get(name) {
            return Ok(variable.value.clone());
        }

        match Self::resolve(self.parent.as_ref(), name) {
            Some(owner) => owner.borrow().lookup(name),
            None => Err(undefined(name)),
        }
    }

    /// The environment in the chain starting at `start` that owns `name`.
    pub fn resolve(start: Option<&EnvRef>, name: &str) -> Option<EnvRef> {
        let mut current = start.cloned();
        while let Some(env) = current {
            if env.borrow().contains_local(name) {
                return Some(env);
            }
            current = env.borrow().parent();
        }
        None
    }

    /// Script-declared bindings in declaration order, skipping built-ins.
    pub fn exports(&self) -> Vec<(String, Variable)> {
        self.order
            .iter()
            .filter_map(|name| {
                let variable = self.variables.get(name)?;
                (!variable.is_builtin).then(|| (name.clone(), variable.clone()))
            })
            .collect()
    }
}

fn undefined(name: &str) -> Fault {
    Fault::new(
        ErrorKind::UndefinedVariable,
        format!("Variable '{}' is not defined", name),
    )
    .with_help(format!("Declare it first with 'LET {} = ...'", name))
}

/// A named frame used for stack traces. Function calls and imports push a
/// new context whose parent is the caller's.
#[derive(Debug)]
pub struct Context {
    pub display_name: String,
    pub parent: Option<Rc<Context>>,
    pub env: EnvRef,
}

impl Context {
    pub fn root(display_name: impl Into<String>, env: EnvRef) -> Rc<Context> {
        Rc::new(Self {
            display_name: display_name.into(),
            parent: None,
            env,
        })
    }

    pub fn child(
        parent: &Rc<Context>,
        display_name: impl Into<String>,
        env: EnvRef,
    ) -> Rc<Context> {
        Rc::new(Self {
            display_name: display_name.into(),
            parent: Some(Rc::clone(parent)),
            env,
        })
    }

    /// Display names from this context outward.
    pub fn stack_trace(&self) -> Vec<String> {
        let mut names = vec![self.display_name.clone()];
        let mut current = self.parent.clone();
        while let Some(ctx) = current {
            names.push(ctx.display_name.clone());
            current = ctx.parent.clone();
        }
        names
    }
}
