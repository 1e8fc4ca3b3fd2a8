use ariadne::{Color, Fmt, Label, Report, ReportKind, Source};
use std::fmt;
use std::rc::Rc;

/// A source text together with the name it was loaded under.
#[derive(Debug, PartialEq)]
pub struct SourceFile {
    pub name: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            text: text.into(),
        })
    }

    /// Returns the 1-based `line` of the text, without its newline.
    pub fn line(&self, line: usize) -> &str {
        self.text
            .split('\n')
            .nth(line.saturating_sub(1))
            .unwrap_or("")
    }
}

/// A point in a source file. `index` counts characters, `line` is 1-based and
/// `column` is 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub index: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(index: usize, line: usize, column: usize) -> Self {
        Self {
            index,
            line,
            column,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Span {
    pub file: Rc<SourceFile>,
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(file: Rc<SourceFile>, start: Position, end: Position) -> Self {
        Self { file, start, end }
    }

    /// A zero-width span at `pos`.
    pub fn single(file: Rc<SourceFile>, pos: Position) -> Self {
        Self {
            file,
            start: pos,
            end: pos,
        }
    }

    /// Span for values and nodes that have no location in any source text.
    pub fn synthetic(name: &str) -> Self {
        let pos = Position::new(0, 1, 0);
        Self::single(SourceFile::new(name, ""), pos)
    }

    /// Span covering `self` up to the end of `other`.
    pub fn to(&self, other: &Span) -> Span {
        Span {
            file: Rc::clone(&self.file),
            start: self.start,
            end: other.end,
        }
    }
}

/// The pipeline stage a fault belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lex,
    Parse,
    Runtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    // Tokenizer
    IllegalCharacter,
    UnterminatedString,
    InvalidEscape,
    InvalidNumber,

    // Parser
    InvalidSyntax,

    // Evaluation
    DuplicateDeclaration,
    ConstantAssignment,
    UndefinedVariable,
    DivisionByZero,
    InvalidConversion,
    IndexOutOfRange,
    InvalidKey,
    ArgumentCountMismatch,
    InvalidIterator,
    ReturnOutsideFunction,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    CircularImport,
    ModuleNotFound,
    UnsupportedOperation,
    ValueError,
    RecursionLimit,
}

impl ErrorKind {
    pub fn phase(self) -> Phase {
        match self {
            ErrorKind::IllegalCharacter
            | ErrorKind::UnterminatedString
            | ErrorKind::InvalidEscape
            | ErrorKind::InvalidNumber => Phase::Lex,
            ErrorKind::InvalidSyntax => Phase::Parse,
            _ => Phase::Runtime,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A runtime fault that has not been attributed to a source location yet.
///
/// Value operations, environments and native functions produce these; the
/// evaluator turns them into a [`VlbError`] at the node being evaluated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: ErrorKind,
    pub message: String,
    pub help: Option<String>,
}

impl Fault {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedOperation, message)
    }

    pub fn value_error(expected: &str, got: &str) -> Self {
        Self::new(
            ErrorKind::ValueError,
            format!("Expected value of type {}, not {}", expected, got),
        )
    }

    pub fn argument_count(function: &str, expected: &str, got: usize) -> Self {
        Self::new(
            ErrorKind::ArgumentCountMismatch,
            format!(
                "Expected {} argument{}, but got {} argument{} when calling function {}",
                expected,
                if expected == "1" { "" } else { "s" },
                got,
                if got == 1 { "" } else { "s" },
                function
            ),
        )
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct VlbError {
    pub kind: ErrorKind,
    pub span: Span,
    pub message: String,
    pub help: Option<String>,
    /// Display names of the active contexts, innermost first.
    pub trace: Vec<String>,
    /// Extra lines such as the chain of imports the fault surfaced through.
    pub notes: Vec<String>,
}

impl VlbError {
    pub fn new(kind: ErrorKind, span: Span, message: String) -> Self {
        Self {
            kind,
            span,
            message,
            help: None,
            trace: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn new_with_help(kind: ErrorKind, span: Span, message: String, help: String) -> Self {
        Self {
            help: Some(help),
            ..Self::new(kind, span, message)
        }
    }

    pub fn lex_error(kind: ErrorKind, span: Span, message: String) -> Self {
        Self::new(kind, span, message)
    }

    pub fn syntax_error(span: Span, message: String) -> Self {
        Self::new(ErrorKind::InvalidSyntax, span, message)
    }

    pub fn syntax_error_with_help(span: Span, message: String, help: String) -> Self {
        Self::new_with_help(ErrorKind::InvalidSyntax, span, message, help)
    }

    pub fn runtime_error(kind: ErrorKind, span: Span, message: String) -> Self {
        Self::new(kind, span, message)
    }

    pub fn from_fault(fault: Fault, span: Span) -> Self {
        Self {
            help: fault.help,
            ..Self::new(fault.kind, span, fault.message)
        }
    }

    pub fn with_trace(mut self, trace: Vec<String>) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn phase(&self) -> Phase {
        self.kind.phase()
    }

    /// Plain-text rendering: call stack, offending line with a caret
    /// underline, the fault itself and its location.
    pub fn render(&self) -> String {
        let mut out = String::new();

        if self.trace.len() > 1 {
            out.push_str("Stack:\n");
            for frame in self.trace.iter().rev() {
                out.push_str("  ");
                out.push_str(frame);
                out.push('\n');
            }
            out.push('\n');
        }

        let start = self.span.start;
        let end = self.span.end;
        let code = self.span.file.line(start.line);
        let width = if end.line == start.line {
            end.column.saturating_sub(start.column).max(1)
        } else {
            code.chars().count().saturating_sub(start.column).max(1)
        };
        out.push_str(code);
        out.push('\n');
        out.push_str(&" ".repeat(start.column));
        out.push_str(&"^".repeat(width));
        out.push('\n');

        for note in &self.notes {
            out.push_str(note);
            out.push('\n');
        }

        out.push_str(&format!("{}: {}\n", self.kind, self.message));
        if let Some(help) = &self.help {
            out.push_str(&format!("help: {}\n", help));
        }
        out.push_str(&format!(
            "\nfile: {}, ln: {}, col: {}",
            self.span.file.name, start.line, start.column
        ));
        out
    }

    pub fn report(&self) {
        let filename = self.span.file.name.as_str();
        let source = self.span.file.text.as_str();

        let color = match self.phase() {
            Phase::Lex => Color::Red,
            Phase::Parse => Color::Yellow,
            Phase::Runtime => Color::Magenta,
        };

        let phase_str = match self.phase() {
            Phase::Lex => "Lexical Error",
            Phase::Parse => "Syntax Error",
            Phase::Runtime => "Runtime Error",
        };

        let start = self.span.start.index;
        let end = self.span.end.index.max(start + 1);

        let mut report_builder = Report::build(ReportKind::Error, filename, start)
            .with_message(format!(
                "{} ({}): {}",
                phase_str.fg(color),
                self.kind,
                self.message
            ))
            .with_label(
                Label::new((filename, start..end))
                    .with_message(&self.message)
                    .with_color(color),
            );

        if let Some(ref help_text) = self.help {
            report_builder =
                report_builder.with_note(format!("{}: {}", "help".fg(Color::Cyan), help_text));
        }

        if self.trace.len() > 1 {
            report_builder = report_builder.with_note(format!(
                "{}: {}",
                "stack".fg(Color::Cyan),
                self.trace.join(" <- ")
            ));
        }

        for note in &self.notes {
            report_builder = report_builder.with_note(note);
        }

        if let Err(err) = report_builder
            .finish()
            .eprint((filename, Source::from(source)))
        {
            eprintln!("{}", self.render());
            log::warn!("failed to print diagnostic: {}", err);
        }
    }
}
