use crate::ast::{BinaryOperator, ImportAlias, Node, UnaryOperator};
use crate::builtins::{self, Output};
use crate::config::Config;
use crate::environment::{Context, EnvRef, Environment};
use crate::error::{ErrorKind, Fault, Span, VlbError};
use crate::lexer;
use crate::modules::{self, ModuleSource, NativeRegistry};
use crate::parser;
use crate::value::{Dictionary, Function, Module, Number, Value};
use log::{debug, trace};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Anything that stops a statement list early. Only `Error` may escape
/// `interpret`; the others are caught by the enclosing call or loop.
enum Interrupt {
    Error(Box<VlbError>),
    Return(Value),
    Break(Span),
    Continue(Span),
}

impl From<VlbError> for Interrupt {
    fn from(error: VlbError) -> Self {
        Interrupt::Error(Box::new(error))
    }
}

type Eval = Result<Value, Interrupt>;

/// Where a node is being evaluated.
#[derive(Clone)]
struct Frame {
    ctx: Rc<Context>,
    env: EnvRef,
    in_function: bool,
    in_loop: bool,
}

impl Frame {
    fn root(ctx: &Rc<Context>) -> Self {
        Self {
            ctx: Rc::clone(ctx),
            env: Rc::clone(&ctx.env),
            in_function: false,
            in_loop: false,
        }
    }

    /// A frame for one loop iteration, with its own scope.
    fn iteration(&self) -> Self {
        Self {
            ctx: Rc::clone(&self.ctx),
            env: Environment::with_parent(&self.env),
            in_function: self.in_function,
            in_loop: true,
        }
    }
}

/// A vlbasic session: the configuration, the native modules, the output
/// sink and the stack of files currently being executed.
pub struct Interpreter {
    config: Config,
    natives: NativeRegistry,
    output: Output,
    import_stack: Vec<PathBuf>,
    call_depth: usize,
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        Self::with_output(config, builtins::stdout())
    }

    pub fn with_output(config: Config, output: Output) -> Self {
        let natives = NativeRegistry::with_defaults(&output);
        Self {
            config,
            natives,
            output,
            import_stack: Vec::new(),
            call_depth: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn natives_mut(&mut self) -> &mut NativeRegistry {
        &mut self.natives
    }

    /// A root context whose environment holds the built-ins.
    pub fn new_context(&self, display_name: &str) -> Result<Rc<Context>, VlbError> {
        let env = Environment::new();
        builtins::install(&env, &self.output)
            .map_err(|fault| VlbError::from_fault(fault, Span::synthetic("<builtins>")))?;
        Ok(Context::root(display_name, env))
    }

    /// Evaluates each top-level statement in `ctx`, returning one value per
    /// statement. The first fault aborts the run.
    pub fn interpret(&mut self, statements: &[Node], ctx: &Rc<Context>) -> Result<Vec<Value>, VlbError> {
        let frame = Frame::root(ctx);
        self.run_statements(statements, &frame)
    }

    /// Tokenizes, parses and runs `source` in a fresh context.
    pub fn run_source(&mut self, filename: &str, source: &str) -> Result<Vec<Value>, VlbError> {
        let tokens = lexer::tokenize(filename, source)?;
        let statements = parser::parse(filename, tokens)?;
        let ctx = self.new_context(filename)?;
        self.interpret(&statements, &ctx)
    }

    /// Runs the parsed contents of the file at `path` in a fresh context.
    /// Imports resolve relative to `path`, and a module importing `path`
    /// back is reported as circular.
    pub fn run_script(&mut self, path: &Path, statements: &[Node]) -> Result<Vec<Value>, VlbError> {
        let ctx = self.new_context(&path.display().to_string())?;
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.import_stack.push(canonical);
        let result = self.interpret(statements, &ctx);
        self.import_stack.pop();
        result
    }

    fn run_statements(&mut self, statements: &[Node], frame: &Frame) -> Result<Vec<Value>, VlbError> {
        let mut values = Vec::with_capacity(statements.len());
        for statement in statements {
            match self.evaluate(statement, frame) {
                Ok(value) => values.push(value),
                Err(interrupt) => return Err(self.escaped(interrupt, frame)),
            }
        }
        Ok(values)
    }

    /// Converts an interrupt that reached the top of a statement list into
    /// a fault.
    fn escaped(&self, interrupt: Interrupt, frame: &Frame) -> VlbError {
        match interrupt {
            Interrupt::Error(error) => *error,
            Interrupt::Return(_) => VlbError::runtime_error(
                ErrorKind::ReturnOutsideFunction,
                Span::synthetic("<return>"),
                "Returning values can only be done inside of functions".to_string(),
            )
            .with_trace(frame.ctx.stack_trace()),
            Interrupt::Break(span) => VlbError::runtime_error(
                ErrorKind::BreakOutsideLoop,
                span,
                "Break can only be done inside of loops".to_string(),
            )
            .with_trace(frame.ctx.stack_trace()),
            Interrupt::Continue(span) => VlbError::runtime_error(
                ErrorKind::ContinueOutsideLoop,
                span,
                "Continue can only be done inside of loops".to_string(),
            )
            .with_trace(frame.ctx.stack_trace()),
        }
    }

    fn fault(&self, frame: &Frame, fault: Fault, span: &Span) -> Interrupt {
        VlbError::from_fault(fault, span.clone())
            .with_trace(frame.ctx.stack_trace())
            .into()
    }

    fn block(&mut self, body: &[Node], frame: &Frame) -> Eval {
        let mut last = Value::Null;
        for node in body {
            last = self.evaluate(node, frame)?;
        }
        Ok(last)
    }

    /// Dispatches on the node kind. Each arm lives in its own method so a
    /// level of script recursion costs only small host frames.
    fn evaluate(&mut self, node: &Node, frame: &Frame) -> Eval {
        match node {
            Node::NumberLiteral { value, .. } => Ok(Value::Number(*value)),
            Node::StringLiteral { value, .. } => Ok(Value::String(value.clone())),
            Node::BinaryOp {
                left,
                operator,
                right,
                span,
            } => self.binary(left, *operator, right, span, frame),
            Node::UnaryOp {
                operator,
                operand,
                span,
            } => self.unary(*operator, operand, span, frame),
            Node::VariableAccess { name, span } => self.access(name, span, frame),
            Node::VariableDeclare {
                name,
                is_constant,
                value,
                span,
            } => self.declare(name, *is_constant, value, span, frame),
            Node::VariableAssign {
                name,
                compound,
                value,
                span,
            } => self.assign(name, *compound, value, span, frame),
            Node::List { items, .. } => self.list(items, frame),
            Node::Dictionary { entries, .. } => self.dictionary(entries, frame),
            Node::GetIndex { base, index, span } => self.get_index(base, index, span, frame),
            Node::SetIndex {
                base,
                index,
                value,
                span,
            } => self.set_index(base, index, value, span, frame),
            Node::GetAttribute { base, name, span } => self.get_attribute(base, name, span, frame),
            Node::FunctionDefine {
                name,
                params,
                body,
                span,
            } => self.define_function(name.as_deref(), params, body, span, frame),
            Node::FunctionCall { callee, args, span } => self.call_node(callee, args, span, frame),
            Node::If {
                branches,
                else_body,
                ..
            } => self.if_chain(branches, else_body.as_deref(), frame),
            Node::While {
                condition, body, ..
            } => self.while_loop(condition, body, frame),
            Node::For {
                item_name,
                item_span,
                iterable,
                body,
                ..
            } => self.for_loop(item_name, item_span, iterable, body, frame),
            Node::Return { value, span } => self.return_value(value.as_deref(), span, frame),
            Node::Break { span } => self.loop_jump(ErrorKind::BreakOutsideLoop, span, frame),
            Node::Continue { span } => self.loop_jump(ErrorKind::ContinueOutsideLoop, span, frame),
            Node::Import {
                module,
                alias,
                span,
            } => self.import(module, alias.as_ref(), span, frame),
            Node::Range {
                start,
                end,
                step,
                span,
            } => self.range(start, end, step, span, frame),
        }
    }

    #[inline(never)]
    fn binary(
        &mut self,
        left: &Node,
        operator: BinaryOperator,
        right: &Node,
        span: &Span,
        frame: &Frame,
    ) -> Eval {
        let left = self.evaluate(left, frame)?;
        let right = self.evaluate(right, frame)?;
        left.binary_op(operator, &right)
            .map_err(|fault| self.fault(frame, fault, span))
    }

    #[inline(never)]
    fn unary(&mut self, operator: UnaryOperator, operand: &Node, span: &Span, frame: &Frame) -> Eval {
        let operand = self.evaluate(operand, frame)?;
        let result = match operator {
            UnaryOperator::Plus => operand.plus(),
            UnaryOperator::Negate => operand.negate(),
            UnaryOperator::Not => operand.not(),
        };
        result.map_err(|fault| self.fault(frame, fault, span))
    }

    #[inline(never)]
    fn access(&self, name: &str, span: &Span, frame: &Frame) -> Eval {
        let found = frame.env.borrow().lookup(name);
        found.map_err(|fault| self.fault(frame, fault, span))
    }

    #[inline(never)]
    fn declare(
        &mut self,
        name: &str,
        is_constant: bool,
        value: &Node,
        span: &Span,
        frame: &Frame,
    ) -> Eval {
        let value = self.evaluate(value, frame)?;
        let declared = frame
            .env
            .borrow_mut()
            .declare(name, value.clone(), is_constant);
        declared.map_err(|fault| self.fault(frame, fault, span))?;
        Ok(value)
    }

    #[inline(never)]
    fn assign(
        &mut self,
        name: &str,
        compound: Option<BinaryOperator>,
        value: &Node,
        span: &Span,
        frame: &Frame,
    ) -> Eval {
        let mut value = self.evaluate(value, frame)?;
        if let Some(operator) = compound {
            let current = frame.env.borrow().lookup(name);
            let current = current.map_err(|fault| self.fault(frame, fault, span))?;
            value = current
                .binary_op(operator, &value)
                .map_err(|fault| self.fault(frame, fault, span))?;
        }
        let assigned = frame.env.borrow_mut().assign(name, value.clone());
        assigned.map_err(|fault| self.fault(frame, fault, span))?;
        Ok(value)
    }

    #[inline(never)]
    fn list(&mut self, items: &[Node], frame: &Frame) -> Eval {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            values.push(self.evaluate(item, frame)?);
        }
        Ok(Value::list(values))
    }

    #[inline(never)]
    fn dictionary(&mut self, entries: &[(Node, Node)], frame: &Frame) -> Eval {
        let mut dictionary = Dictionary::new();
        for (key, value) in entries {
            let key = self.evaluate(key, frame)?;
            let value = self.evaluate(value, frame)?;
            dictionary.insert(key, value);
        }
        Ok(Value::dictionary(dictionary))
    }

    #[inline(never)]
    fn get_index(&mut self, base: &Node, index: &Node, span: &Span, frame: &Frame) -> Eval {
        let base = self.evaluate(base, frame)?;
        let index = self.evaluate(index, frame)?;
        base.get_item(&index)
            .map_err(|fault| self.fault(frame, fault, span))
    }

    #[inline(never)]
    fn set_index(
        &mut self,
        base: &Node,
        index: &Node,
        value: &Node,
        span: &Span,
        frame: &Frame,
    ) -> Eval {
        let base = self.evaluate(base, frame)?;
        let index = self.evaluate(index, frame)?;
        let value = self.evaluate(value, frame)?;
        base.set_item(&index, value.clone())
            .map_err(|fault| self.fault(frame, fault, span))?;
        Ok(value)
    }

    #[inline(never)]
    fn get_attribute(&mut self, base: &Node, name: &str, span: &Span, frame: &Frame) -> Eval {
        let base = self.evaluate(base, frame)?;
        builtins::attribute(&base, name).map_err(|fault| self.fault(frame, fault, span))
    }

    #[inline(never)]
    fn define_function(
        &mut self,
        name: Option<&str>,
        params: &[String],
        body: &Rc<Vec<Node>>,
        span: &Span,
        frame: &Frame,
    ) -> Eval {
        let function = Value::Function(Rc::new(Function {
            name: name.map(str::to_string),
            params: params.to_vec(),
            body: Rc::clone(body),
            closure: Rc::clone(&frame.env),
        }));
        match name {
            Some(name) => {
                let declared = frame.env.borrow_mut().declare(name, function, true);
                declared.map_err(|fault| self.fault(frame, fault, span))?;
                Ok(Value::Null)
            }
            None => Ok(function),
        }
    }

    #[inline(never)]
    fn call_node(&mut self, callee: &Node, args: &[Node], span: &Span, frame: &Frame) -> Eval {
        let callee = self.evaluate(callee, frame)?;
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.evaluate(arg, frame)?);
        }
        self.call(callee, values, span, frame)
    }

    #[inline(never)]
    fn if_chain(
        &mut self,
        branches: &[(Node, Vec<Node>)],
        else_body: Option<&[Node]>,
        frame: &Frame,
    ) -> Eval {
        for (condition, body) in branches {
            if self.condition(condition, frame)? {
                self.block(body, frame)?;
                return Ok(Value::Null);
            }
        }
        if let Some(body) = else_body {
            self.block(body, frame)?;
        }
        Ok(Value::Null)
    }

    #[inline(never)]
    fn while_loop(&mut self, condition: &Node, body: &[Node], frame: &Frame) -> Eval {
        while self.condition(condition, frame)? {
            match self.block(body, &frame.iteration()) {
                Ok(_) | Err(Interrupt::Continue(_)) => {}
                Err(Interrupt::Break(_)) => break,
                Err(other) => return Err(other),
            }
        }
        Ok(Value::Null)
    }

    #[inline(never)]
    fn for_loop(
        &mut self,
        item_name: &str,
        item_span: &Span,
        iterable: &Node,
        body: &[Node],
        frame: &Frame,
    ) -> Eval {
        let items = match self.evaluate(iterable, frame)? {
            Value::List(items) => items,
            _ => {
                let fault = Fault::new(
                    ErrorKind::InvalidIterator,
                    "Iterator inside of for loops can only be of type list",
                );
                return Err(self.fault(frame, fault, iterable.span()));
            }
        };

        let bound = if frame.env.borrow().contains_local(item_name) {
            frame.env.borrow_mut().assign(item_name, Value::Null)
        } else {
            frame.env.borrow_mut().declare(item_name, Value::Null, false)
        };
        bound.map_err(|fault| self.fault(frame, fault, item_span))?;

        let mut index = 0;
        loop {
            let item = match items.borrow().get(index) {
                Some(item) => item.clone(),
                None => break,
            };
            index += 1;

            let assigned = frame.env.borrow_mut().assign(item_name, item);
            assigned.map_err(|fault| self.fault(frame, fault, item_span))?;

            match self.block(body, &frame.iteration()) {
                Ok(_) | Err(Interrupt::Continue(_)) => {}
                Err(Interrupt::Break(_)) => break,
                Err(other) => return Err(other),
            }
        }
        Ok(Value::Null)
    }

    #[inline(never)]
    fn return_value(&mut self, value: Option<&Node>, span: &Span, frame: &Frame) -> Eval {
        if !frame.in_function {
            let fault = Fault::new(
                ErrorKind::ReturnOutsideFunction,
                "Returning values can only be done inside of functions",
            );
            return Err(self.fault(frame, fault, span));
        }
        let value = match value {
            Some(value) => self.evaluate(value, frame)?,
            None => Value::Null,
        };
        Err(Interrupt::Return(value))
    }

    /// `BREAK` or `CONTINUE`, named by the kind raised outside a loop.
    #[inline(never)]
    fn loop_jump(&self, misplaced: ErrorKind, span: &Span, frame: &Frame) -> Eval {
        if !frame.in_loop {
            let word = match misplaced {
                ErrorKind::BreakOutsideLoop => "Break",
                _ => "Continue",
            };
            let fault = Fault::new(
                misplaced,
                format!("{} can only be done inside of loops", word),
            );
            return Err(self.fault(frame, fault, span));
        }
        match misplaced {
            ErrorKind::BreakOutsideLoop => Err(Interrupt::Break(span.clone())),
            _ => Err(Interrupt::Continue(span.clone())),
        }
    }

    #[inline(never)]
    fn range(&mut self, start: &Node, end: &Node, step: &Node, span: &Span, frame: &Frame) -> Eval {
        let start = self.range_bound(start, frame)?;
        let end = self.range_bound(end, frame)?;
        let step = self.range_bound(step, frame)?;
        if step == 0 {
            let fault = Fault::new(ErrorKind::ValueError, "Range step cannot be zero");
            return Err(self.fault(frame, fault, span));
        }

        let mut items = Vec::new();
        let mut current = start;
        while (step > 0 && current < end) || (step < 0 && current > end) {
            items.push(Value::int(current));
            current = match current.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(Value::list(items))
    }

    fn condition(&mut self, condition: &Node, frame: &Frame) -> Result<bool, Interrupt> {
        let value = self.evaluate(condition, frame)?;
        value
            .to_boolean()
            .map_err(|fault| self.fault(frame, fault, condition.span()))
    }

    fn range_bound(&mut self, node: &Node, frame: &Frame) -> Result<i64, Interrupt> {
        match self.evaluate(node, frame)? {
            Value::Number(Number::Int(n)) => Ok(n),
            other => {
                let got = match other {
                    Value::Number(_) => "fractional Number",
                    _ => other.type_name(),
                };
                let fault = Fault::value_error("whole Number", got);
                Err(self.fault(frame, fault, node.span()))
            }
        }
    }

    fn call(&mut self, callee: Value, args: Vec<Value>, span: &Span, frame: &Frame) -> Eval {
        match callee {
            Value::Function(function) => self.call_function(&function, args, span, frame),
            Value::BuiltIn(builtin) => {
                trace!("calling built-in {}", builtin.name);
                let ctx = Context::child(
                    &frame.ctx,
                    format!("{}()", builtin.name),
                    Rc::clone(&frame.env),
                );
                builtin.call(&args, &ctx).map_err(|fault| {
                    Interrupt::from(
                        VlbError::from_fault(fault, span.clone()).with_trace(ctx.stack_trace()),
                    )
                })
            }
            other => {
                let fault = Fault::unsupported(format!(
                    "A value of type {} cannot be called",
                    other.type_name()
                ));
                Err(self.fault(frame, fault, span))
            }
        }
    }

    fn call_function(
        &mut self,
        function: &Rc<Function>,
        args: Vec<Value>,
        span: &Span,
        frame: &Frame,
    ) -> Eval {
        let name = function.display_name();
        if args.len() != function.params.len() {
            let fault =
                Fault::argument_count(name, &function.params.len().to_string(), args.len());
            return Err(self.fault(frame, fault, span));
        }
        if self.call_depth >= self.config.max_call_depth {
            let fault = Fault::new(
                ErrorKind::RecursionLimit,
                format!(
                    "Maximum call depth of {} exceeded when calling function {}",
                    self.config.max_call_depth, name
                ),
            );
            return Err(self.fault(frame, fault, span));
        }

        let env = Environment::with_parent(&function.closure);
        for (param, arg) in function.params.iter().zip(args) {
            let declared = env.borrow_mut().declare(param, arg, false);
            declared.map_err(|fault| self.fault(frame, fault, span))?;
        }

        let call_frame = Frame {
            ctx: Context::child(&frame.ctx, format!("{}()", name), Rc::clone(&env)),
            env,
            in_function: true,
            in_loop: false,
        };

        trace!("calling {}() at depth {}", name, self.call_depth + 1);
        self.call_depth += 1;
        let result = self.block(&function.body, &call_frame);
        self.call_depth -= 1;

        match result {
            Ok(_) => Ok(Value::Null),
            Err(Interrupt::Return(value)) => Ok(value),
            Err(other) => Err(other),
        }
    }

    fn import(
        &mut self,
        module: &Node,
        alias: Option<&ImportAlias>,
        span: &Span,
        frame: &Frame,
    ) -> Eval {
        let name = match self.evaluate(module, frame)? {
            Value::String(name) => name,
            other => {
                let fault = Fault::value_error("String", other.type_name());
                return Err(self.fault(frame, fault, module.span()));
            }
        };

        let script_dir = self
            .import_stack
            .last()
            .and_then(|path| path.parent())
            .map(Path::to_path_buf);
        let source = modules::resolve(&self.config, &self.natives, script_dir.as_deref(), &name);

        let exports = match source {
            Some(ModuleSource::File(path)) => self.load_file_module(&name, &path, span, frame)?,
            Some(ModuleSource::Native(native)) => {
                debug!("importing native module '{}'", name);
                native
                    .exports()
                    .map_err(|fault| self.fault(frame, fault, span))?
            }
            None => {
                let fault = Fault::new(
                    ErrorKind::ModuleNotFound,
                    format!("Module '{}' was not found", name),
                )
                .with_help(format!(
                    "Looked for '{}.{}' in the script directory, the root directory and their '{}' subdirectories",
                    name, self.config.extension, self.config.modules_dir
                ));
                return Err(self.fault(frame, fault, module.span()));
            }
        };

        match alias {
            Some(ImportAlias::Wildcard) => {
                for (export, value, is_constant) in exports {
                    let declared = frame.env.borrow_mut().declare(&export, value, is_constant);
                    declared.map_err(|fault| self.fault(frame, fault, span))?;
                }
            }
            Some(ImportAlias::Name(binding)) => self.bind_module(binding, &name, exports, span, frame)?,
            None => {
                let binding = modules::default_alias(&name).to_string();
                self.bind_module(&binding, &name, exports, span, frame)?
            }
        }
        Ok(Value::Null)
    }

    fn bind_module(
        &self,
        binding: &str,
        name: &str,
        exports: Vec<(String, Value, bool)>,
        span: &Span,
        frame: &Frame,
    ) -> Result<(), Interrupt> {
        let module = Value::Module(Rc::new(Module {
            name: name.to_string(),
            exports: exports
                .into_iter()
                .map(|(export, value, _)| (export, value))
                .collect(),
        }));
        let declared = frame.env.borrow_mut().declare(binding, module, true);
        declared.map_err(|fault| self.fault(frame, fault, span))
    }

    fn load_file_module(
        &mut self,
        name: &str,
        path: &Path,
        span: &Span,
        frame: &Frame,
    ) -> Result<Vec<(String, Value, bool)>, Interrupt> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if self.import_stack.contains(&canonical) {
            let importer = self
                .import_stack
                .last()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| span.file.name.clone());
            let fault = Fault::new(
                ErrorKind::CircularImport,
                format!(
                    "Circular import occurred while trying to import file {}, from file {}",
                    canonical.display(),
                    importer
                ),
            );
            return Err(self.fault(frame, fault, span));
        }

        let source = std::fs::read_to_string(path).map_err(|e| {
            let fault = Fault::new(
                ErrorKind::ModuleNotFound,
                format!("Unable to read module '{}' at {}: {}", name, path.display(), e),
            );
            self.fault(frame, fault, span)
        })?;

        debug!("importing module '{}' from {}", name, path.display());
        let note = format!("while importing module '{}'", name);
        let filename = path.display().to_string();
        let tokens = lexer::tokenize(&filename, &source).map_err(|e| e.with_note(note.clone()))?;
        let statements = parser::parse(&filename, tokens).map_err(|e| e.with_note(note.clone()))?;

        let env = Environment::new();
        builtins::install(&env, &self.output).map_err(|fault| self.fault(frame, fault, span))?;
        let module_frame = Frame {
            ctx: Context::child(&frame.ctx, format!("<module {}>", name), Rc::clone(&env)),
            env: Rc::clone(&env),
            in_function: false,
            in_loop: false,
        };

        self.import_stack.push(canonical);
        let result = self.run_statements(&statements, &module_frame);
        self.import_stack.pop();
        result.map_err(|e| e.with_note(note))?;

        let exports = env
            .borrow()
            .exports()
            .into_iter()
            .map(|(export, variable)| (export, variable.value, variable.is_constant))
            .collect();
        Ok(exports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn run(source: &str) -> Result<Vec<Value>, VlbError> {
        Interpreter::new(Config::default()).run_source("<test>", source)
    }

    fn last(source: &str) -> Value {
        run(source).unwrap().pop().unwrap()
    }

    fn kind(source: &str) -> ErrorKind {
        run(source).unwrap_err().kind
    }

    #[test]
    fn test_one_value_per_statement() {
        let values = run("LET x = 10\nx * 3").unwrap();
        assert_eq!(values, vec![Value::int(10), Value::int(30)]);
    }

    #[test]
    fn test_precedence() {
        assert_eq!(last("(1 + 1) * 2"), Value::int(4));
        assert_eq!(last("1 + 1 * 2"), Value::int(3));
        assert_eq!(last("2 ^ 3 * 2"), Value::int(16));
    }

    #[test]
    fn test_functions_and_closures() {
        assert_eq!(last("FUNCTION add(a, b)\nRETURN a + b\nEND\nadd(2, 3)"), Value::int(5));
        let source = "LET base = 10\nFUNCTION shift(n)\nRETURN n + base\nEND\nbase = 20\nshift(1)";
        assert_eq!(last(source), Value::int(21));
        assert_eq!(last("LET f = FUNCTION(x)\nRETURN x * 2\nEND\nf(4)"), Value::int(8));
    }

    #[test]
    fn test_missing_return_yields_null() {
        assert_eq!(last("FUNCTION f()\nLET a = 1\nEND\nf()"), Value::Null);
    }

    #[test]
    fn test_named_function_is_constant() {
        assert_eq!(kind("FUNCTION f()\nEND\nf = 1"), ErrorKind::ConstantAssignment);
    }

    #[test]
    fn test_arity_mismatch() {
        assert_eq!(
            kind("FUNCTION f(a)\nRETURN a\nEND\nf(1, 2)"),
            ErrorKind::ArgumentCountMismatch
        );
    }

    #[test]
    fn test_loop_scopes_are_fresh_per_iteration() {
        let source = "LET i = 0\nWHILE i < 3 THEN\nLET step = 1\ni += step\nEND\ni";
        assert_eq!(last(source), Value::int(3));
    }

    #[test]
    fn test_break_and_continue() {
        let source = "LET n = 0\nLET i = 0\nWHILE TRUE THEN\ni += 1\nIF i == 5 THEN\nBREAK\nEND\nIF i % 2 == 0 THEN\nCONTINUE\nEND\nn += 1\nEND\nn";
        assert_eq!(last(source), Value::int(2));
    }

    #[test]
    fn test_for_over_range() {
        let source = "LET total = 0\nFOR x IN [0 -> 5] THEN\ntotal += x\nEND\ntotal";
        assert_eq!(last(source), Value::int(10));
        assert_eq!(last("FOR x IN [1, 2] THEN\nEND\nx"), Value::int(2));
        assert_eq!(kind("FOR x IN 5 THEN\nEND"), ErrorKind::InvalidIterator);
    }

    #[test]
    fn test_ranges() {
        assert_eq!(last("[5 -> 0 -> -2]").to_string(), "[5, 3, 1]");
        assert_eq!(kind("[0 -> 3 -> 0]"), ErrorKind::ValueError);
        assert_eq!(kind("[0 -> 1.5]"), ErrorKind::ValueError);
    }

    #[test]
    fn test_misplaced_control_flow() {
        assert_eq!(kind("RETURN 1"), ErrorKind::ReturnOutsideFunction);
        assert_eq!(kind("BREAK"), ErrorKind::BreakOutsideLoop);
        assert_eq!(kind("CONTINUE"), ErrorKind::ContinueOutsideLoop);
        let source = "WHILE TRUE THEN\nFUNCTION f()\nBREAK\nEND\nf()\nEND";
        assert_eq!(kind(source), ErrorKind::BreakOutsideLoop);
    }

    #[test]
    fn test_runtime_trace_names_calls() {
        let error = run("FUNCTION inner()\nRETURN 1 / 0\nEND\nFUNCTION outer()\nRETURN inner()\nEND\nouter()")
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::DivisionByZero);
        assert_eq!(error.trace, vec!["inner()", "outer()", "<test>"]);
    }

    #[test]
    fn test_recursion_limit() {
        let mut interpreter = Interpreter::new(Config::default().max_call_depth(20));
        let error = interpreter
            .run_source("<test>", "FUNCTION f(n)\nRETURN f(n + 1)\nEND\nf(0)")
            .unwrap_err();
        assert_eq!(error.kind, ErrorKind::RecursionLimit);
    }

    #[test]
    fn test_context_persists_between_runs() {
        let mut interpreter = Interpreter::new(Config::default());
        let ctx = interpreter.new_context("<stdin>").unwrap();
        let first = parser::parse("<stdin>", lexer::tokenize("<stdin>", "LET x = 2").unwrap()).unwrap();
        let second = parser::parse("<stdin>", lexer::tokenize("<stdin>", "x * 21").unwrap()).unwrap();
        interpreter.interpret(&first, &ctx).unwrap();
        assert_eq!(interpreter.interpret(&second, &ctx).unwrap(), vec![Value::int(42)]);
    }

    #[test]
    fn test_print_goes_to_output() {
        let buffer: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
        let mut interpreter = Interpreter::with_output(Config::default(), buffer.clone());
        interpreter
            .run_source("<test>", "print('a', 1)\nprint([1, 'b'])")
            .unwrap();
        assert_eq!(String::from_utf8(buffer.borrow().clone()).unwrap(), "a, 1\n[1, b]\n");
    }

    #[test]
    fn test_native_import() {
        assert_eq!(last("IMPORT 'math'\nmath.floor(2.7)"), Value::int(2));
        assert_eq!(last("IMPORT 'math' AS m\nm.max(1, 9, 3)"), Value::int(9));
        assert_eq!(last("IMPORT 'math' AS *\nabs(-3)"), Value::int(3));
        assert_eq!(kind("IMPORT 'math'\nmath = 1"), ErrorKind::ConstantAssignment);
        assert_eq!(kind("IMPORT 'no_such_module_here'"), ErrorKind::ModuleNotFound);
        assert_eq!(kind("IMPORT 5"), ErrorKind::ValueError);
    }
}
