use crate::error::Span;
use crate::value::Number;
use std::fmt;
use std::rc::Rc;

/// A parsed vlbasic node. Statements and expressions share one type: every
/// statement may appear where an expression is expected and yields a value.
#[derive(Debug, Clone)]
pub enum Node {
    NumberLiteral {
        value: Number,
        span: Span,
    },
    StringLiteral {
        value: String,
        span: Span,
    },
    BinaryOp {
        left: Box<Node>,
        operator: BinaryOperator,
        right: Box<Node>,
        span: Span,
    },
    UnaryOp {
        operator: UnaryOperator,
        operand: Box<Node>,
        span: Span,
    },
    VariableAccess {
        name: String,
        span: Span,
    },
    VariableDeclare {
        name: String,
        is_constant: bool,
        value: Box<Node>,
        span: Span,
    },
    /// `name = value`, or `name += value` when `compound` is set.
    VariableAssign {
        name: String,
        compound: Option<BinaryOperator>,
        value: Box<Node>,
        span: Span,
    },
    List {
        items: Vec<Node>,
        span: Span,
    },
    Dictionary {
        entries: Vec<(Node, Node)>,
        span: Span,
    },
    GetIndex {
        base: Box<Node>,
        index: Box<Node>,
        span: Span,
    },
    SetIndex {
        base: Box<Node>,
        index: Box<Node>,
        value: Box<Node>,
        span: Span,
    },
    GetAttribute {
        base: Box<Node>,
        name: String,
        span: Span,
    },
    FunctionDefine {
        name: Option<String>,
        params: Vec<String>,
        body: Rc<Vec<Node>>,
        span: Span,
    },
    FunctionCall {
        callee: Box<Node>,
        args: Vec<Node>,
        span: Span,
    },
    If {
        branches: Vec<(Node, Vec<Node>)>,
        else_body: Option<Vec<Node>>,
        span: Span,
    },
    While {
        condition: Box<Node>,
        body: Vec<Node>,
        span: Span,
    },
    For {
        item_name: String,
        item_span: Span,
        iterable: Box<Node>,
        body: Vec<Node>,
        span: Span,
    },
    Return {
        value: Option<Box<Node>>,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    Import {
        module: Box<Node>,
        alias: Option<ImportAlias>,
        span: Span,
    },
    /// `[start -> end]` or `[start -> end -> step]`.
    Range {
        start: Box<Node>,
        end: Box<Node>,
        step: Box<Node>,
        span: Span,
    },
}

impl Node {
    pub fn span(&self) -> &Span {
        match self {
            Node::NumberLiteral { span, .. } => span,
            Node::StringLiteral { span, .. } => span,
            Node::BinaryOp { span, .. } => span,
            Node::UnaryOp { span, .. } => span,
            Node::VariableAccess { span, .. } => span,
            Node::VariableDeclare { span, .. } => span,
            Node::VariableAssign { span, .. } => span,
            Node::List { span, .. } => span,
            Node::Dictionary { span, .. } => span,
            Node::GetIndex { span, .. } => span,
            Node::SetIndex { span, .. } => span,
            Node::GetAttribute { span, .. } => span,
            Node::FunctionDefine { span, .. } => span,
            Node::FunctionCall { span, .. } => span,
            Node::If { span, .. } => span,
            Node::While { span, .. } => span,
            Node::For { span, .. } => span,
            Node::Return { span, .. } => span,
            Node::Break { span } => span,
            Node::Continue { span } => span,
            Node::Import { span, .. } => span,
            Node::Range { span, .. } => span,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ImportAlias {
    /// `IMPORT 'x' AS *` merges the exports into the importing scope.
    Wildcard,
    Name(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Modulo,
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Greater => ">",
            BinaryOperator::Less => "<",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::LessEqual => "<=",
        };
        write!(f, "{}", symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Negate,
    Not,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnaryOperator::Plus => write!(f, "+"),
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::Not => write!(f, "NOT"),
        }
    }
}
