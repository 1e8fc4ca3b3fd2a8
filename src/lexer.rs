use crate::error::{ErrorKind, Position, SourceFile, Span, VlbError};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Let,
    Const,
    If,
    Then,
    ElseIf,
    Else,
    End,
    While,
    For,
    In,
    Function,
    Return,
    Break,
    Continue,
    Import,
    As,
    Not,
}

impl Keyword {
    const ALL: [Keyword; 17] = [
        Keyword::Let,
        Keyword::Const,
        Keyword::If,
        Keyword::Then,
        Keyword::ElseIf,
        Keyword::Else,
        Keyword::End,
        Keyword::While,
        Keyword::For,
        Keyword::In,
        Keyword::Function,
        Keyword::Return,
        Keyword::Break,
        Keyword::Continue,
        Keyword::Import,
        Keyword::As,
        Keyword::Not,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Let => "LET",
            Keyword::Const => "CONST",
            Keyword::If => "IF",
            Keyword::Then => "THEN",
            Keyword::ElseIf => "ELSEIF",
            Keyword::Else => "ELSE",
            Keyword::End => "END",
            Keyword::While => "WHILE",
            Keyword::For => "FOR",
            Keyword::In => "IN",
            Keyword::Function => "FUNCTION",
            Keyword::Return => "RETURN",
            Keyword::Break => "BREAK",
            Keyword::Continue => "CONTINUE",
            Keyword::Import => "IMPORT",
            Keyword::As => "AS",
            Keyword::Not => "NOT",
        }
    }

    /// Exact, case-sensitive match against the keyword set.
    pub fn lookup(text: &str) -> Option<Keyword> {
        Self::ALL.iter().copied().find(|k| k.as_str() == text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    // Separators
    Newline,
    Eof,

    // Words
    Keyword(Keyword),
    Identifier,

    // Literals
    Integer,
    Float,
    String,

    // Arithmetic and assignment
    Plus,
    PlusEqual,
    Minus,
    MinusEqual,
    Arrow,
    Star,
    StarEqual,
    Slash,
    SlashEqual,
    Caret,
    Percent,
    Equal,

    // Comparison
    EqualEqual,
    BangEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Colon,
}

/// The decoded value of a literal token.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Float(n) => write!(f, "{}", n),
            Literal::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub literal: Option<Literal>,
    pub span: Span,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: String, literal: Option<Literal>, span: Span) -> Self {
        Self {
            token_type,
            lexeme,
            literal,
            span,
        }
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.token_type == TokenType::Keyword(keyword)
    }

    /// Short description used in "Expected X, got Y" messages.
    pub fn describe(&self) -> String {
        match self.token_type {
            TokenType::Newline => "newline".to_string(),
            TokenType::Eof => "end of file".to_string(),
            TokenType::Keyword(k) => format!("keyword '{}'", k.as_str()),
            TokenType::Identifier => format!("identifier '{}'", self.lexeme),
            TokenType::Integer | TokenType::Float => format!("number '{}'", self.lexeme),
            TokenType::String => "string".to_string(),
            _ => format!("'{}'", self.lexeme),
        }
    }
}

/// Scans vlbasic source text into tokens.
///
/// Tabs are expanded to four spaces before scanning so that columns in
/// diagnostics line up with what the user sees.
pub struct Lexer {
    file: Rc<SourceFile>,
    chars: Vec<char>,
    tokens: Vec<Token>,
    start: Position,
    current: Position,
}

impl Lexer {
    pub fn new(filename: &str, source: &str) -> Self {
        let text = source.replace('\t', "    ");
        let chars = text.chars().collect();
        let origin = Position::new(0, 1, 0);
        Self {
            file: SourceFile::new(filename, text),
            chars,
            tokens: Vec::new(),
            start: origin,
            current: origin,
        }
    }

    pub fn file(&self) -> Rc<SourceFile> {
        Rc::clone(&self.file)
    }

    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, VlbError> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()?;
        }

        self.tokens.push(Token::new(
            TokenType::Eof,
            String::new(),
            None,
            Span::single(self.file(), self.current),
        ));

        Ok(std::mem::take(&mut self.tokens))
    }

    fn is_at_end(&self) -> bool {
        self.current.index >= self.chars.len()
    }

    fn scan_token(&mut self) -> Result<(), VlbError> {
        let c = self.advance();

        match c {
            '\n' | ';' => self.add_token(TokenType::Newline),
            '#' => {
                while self.peek() != '\n' && !self.is_at_end() {
                    self.advance();
                }
            }
            ' ' | '\r' => {}
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '[' => self.add_token(TokenType::LeftBracket),
            ']' => self.add_token(TokenType::RightBracket),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            ':' => self.add_token(TokenType::Colon),
            '^' => self.add_token(TokenType::Caret),
            '%' => self.add_token(TokenType::Percent),
            '+' => {
                let token_type = if self.match_char('=') {
                    TokenType::PlusEqual
                } else {
                    TokenType::Plus
                };
                self.add_token(token_type);
            }
            '-' => {
                let token_type = if self.match_char('=') {
                    TokenType::MinusEqual
                } else if self.match_char('>') {
                    TokenType::Arrow
                } else {
                    TokenType::Minus
                };
                self.add_token(token_type);
            }
            '*' => {
                let token_type = if self.match_char('=') {
                    TokenType::StarEqual
                } else {
                    TokenType::Star
                };
                self.add_token(token_type);
            }
            '/' => {
                let token_type = if self.match_char('=') {
                    TokenType::SlashEqual
                } else {
                    TokenType::Slash
                };
                self.add_token(token_type);
            }
            '=' => {
                let token_type = if self.match_char('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.add_token(token_type);
            }
            '!' => {
                if self.match_char('=') {
                    self.add_token(TokenType::BangEqual);
                } else {
                    return Err(VlbError::new_with_help(
                        ErrorKind::IllegalCharacter,
                        self.current_span(),
                        "Unexpected character: '!'".to_string(),
                        "Use 'NOT' for negation; '!' is only valid as part of '!='".to_string(),
                    ));
                }
            }
            '>' => {
                let token_type = if self.match_char('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.add_token(token_type);
            }
            '<' => {
                let token_type = if self.match_char('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.add_token(token_type);
            }
            '\'' | '"' => self.string(c)?,
            c if c.is_ascii_digit() => self.number()?,
            c if c.is_ascii_alphabetic() => self.identifier(),
            _ => {
                return Err(VlbError::lex_error(
                    ErrorKind::IllegalCharacter,
                    self.current_span(),
                    format!("Unexpected character: '{}'", c),
                ));
            }
        }

        Ok(())
    }

    fn advance(&mut self) -> char {
        let c = match self.chars.get(self.current.index) {
            Some(&c) => c,
            None => return '\0',
        };
        self.current.index += 1;
        if c == '\n' {
            self.current.line += 1;
            self.current.column = 0;
        } else {
            self.current.column += 1;
        }
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            false
        } else {
            self.advance();
            true
        }
    }

    fn peek(&self) -> char {
        self.chars.get(self.current.index).copied().unwrap_or('\0')
    }

    fn current_span(&self) -> Span {
        Span::new(self.file(), self.start, self.current)
    }

    fn lexeme(&self) -> String {
        self.chars[self.start.index..self.current.index].iter().collect()
    }

    fn string(&mut self, quote: char) -> Result<(), VlbError> {
        let mut text = String::new();

        while self.peek() != quote && self.peek() != '\n' && !self.is_at_end() {
            let c = self.advance();
            if c != '\\' {
                text.push(c);
                continue;
            }

            let escape_start = Position::new(
                self.current.index - 1,
                self.current.line,
                self.current.column - 1,
            );
            let escaped = match self.advance() {
                '\\' => '\\',
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                'b' => '\u{8}',
                e if e == quote => quote,
                e => {
                    let shown = if e == '\0' || e == '\n' {
                        "end of line".to_string()
                    } else {
                        format!("'{}'", e)
                    };
                    return Err(VlbError::new_with_help(
                        ErrorKind::InvalidEscape,
                        Span::new(self.file(), escape_start, self.current),
                        format!("Invalid escape character {}", shown),
                        format!(
                            "Valid escapes are \\\\, \\n, \\r, \\t, \\b and \\{}",
                            quote
                        ),
                    ));
                }
            };
            text.push(escaped);
        }

        if self.peek() != quote {
            return Err(VlbError::new_with_help(
                ErrorKind::UnterminatedString,
                self.current_span(),
                "Unterminated string".to_string(),
                format!("Close the string with {} before the end of the line", quote),
            ));
        }

        // closing quote
        self.advance();

        self.add_literal_token(TokenType::String, Literal::Text(text));
        Ok(())
    }

    fn number(&mut self) -> Result<(), VlbError> {
        let mut seen_dot = false;

        loop {
            let c = self.peek();
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !seen_dot {
                // A dot not followed by a digit belongs to an attribute access.
                let next = self.chars.get(self.current.index + 1).copied();
                if !next.is_some_and(|n| n.is_ascii_digit()) {
                    break;
                }
                seen_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        let text = self.lexeme();
        if seen_dot {
            match text.parse::<f64>() {
                Ok(n) => self.add_literal_token(TokenType::Float, Literal::Float(n)),
                Err(_) => {
                    return Err(VlbError::lex_error(
                        ErrorKind::InvalidNumber,
                        self.current_span(),
                        format!("Invalid float: {}", text),
                    ))
                }
            }
        } else {
            match text.parse::<i64>() {
                Ok(n) => self.add_literal_token(TokenType::Integer, Literal::Integer(n)),
                Err(_) => {
                    return Err(VlbError::new_with_help(
                        ErrorKind::InvalidNumber,
                        self.current_span(),
                        format!("Invalid integer: {}", text),
                        "Integer literals must fit in a signed 64-bit value".to_string(),
                    ))
                }
            }
        }

        Ok(())
    }

    fn identifier(&mut self) {
        while self.peek().is_ascii_alphabetic() || self.peek() == '_' {
            self.advance();
        }

        let token_type = match Keyword::lookup(&self.lexeme()) {
            Some(keyword) => TokenType::Keyword(keyword),
            None => TokenType::Identifier,
        };

        self.add_token(token_type);
    }

    fn add_token(&mut self, token_type: TokenType) {
        let token = Token::new(token_type, self.lexeme(), None, self.current_span());
        self.tokens.push(token);
    }

    fn add_literal_token(&mut self, token_type: TokenType, literal: Literal) {
        let token = Token::new(token_type, self.lexeme(), Some(literal), self.current_span());
        self.tokens.push(token);
    }
}

/// Tokenizes `source`, returning the token stream terminated by an EOF token.
pub fn tokenize(filename: &str, source: &str) -> Result<Vec<Token>, VlbError> {
    let tokens = Lexer::new(filename, source).scan_tokens()?;
    log::debug!("{}: scanned {} tokens", filename, tokens.len());
    Ok(tokens)
}
