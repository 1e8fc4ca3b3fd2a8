use crate::ast::{BinaryOperator, ImportAlias, Node, UnaryOperator};
use crate::error::{Span, VlbError};
use crate::lexer::{Keyword, Literal, Token, TokenType};
use crate::value::Number;
use std::rc::Rc;

/// Recursive-descent parser over a token stream produced by the lexer.
///
/// Precedence, lowest to highest: additive, comparison (with prefix `NOT`),
/// multiplicative, power, unary, postfix, atom.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    /// A stream that does not end in EOF gets one after its last token.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|token| &token.token_type) != Some(&TokenType::Eof) {
            let span = match tokens.last() {
                Some(last) => Span::single(Rc::clone(&last.span.file), last.span.end),
                None => Span::synthetic("<empty>"),
            };
            tokens.push(Token::new(TokenType::Eof, String::new(), None, span));
        }
        Self { tokens, current: 0 }
    }

    pub fn parse(&mut self) -> Result<Vec<Node>, VlbError> {
        let mut statements = Vec::new();

        loop {
            self.skip_newlines();
            if self.is_at_end() {
                break;
            }
            statements.push(self.statement_line()?);
        }

        Ok(statements)
    }

    /// A statement followed by its terminator. The newline is consumed;
    /// block keywords and EOF are left for the enclosing rule.
    fn statement_line(&mut self) -> Result<Node, VlbError> {
        let statement = self.statement()?;

        if self.match_types(&[TokenType::Newline]) || self.at_block_end() || self.is_at_end() {
            return Ok(statement);
        }

        Err(VlbError::syntax_error_with_help(
            self.error_span(),
            format!("Expected newline or ';', got {}", self.peek().describe()),
            "Separate statements with a newline or ';'".to_string(),
        ))
    }

    fn statement(&mut self) -> Result<Node, VlbError> {
        if self.check_keyword(Keyword::Let) || self.check_keyword(Keyword::Const) {
            return self.declaration();
        }

        if self.check(&TokenType::Identifier) && self.assignment_follows() {
            return self.assignment();
        }

        if self.match_keyword(Keyword::Return) {
            let keyword_span = self.previous().span.clone();
            if self.check(&TokenType::Newline) || self.at_block_end() || self.is_at_end() {
                return Ok(Node::Return {
                    value: None,
                    span: keyword_span,
                });
            }
            let value = self.expression()?;
            let span = keyword_span.to(value.span());
            return Ok(Node::Return {
                value: Some(Box::new(value)),
                span,
            });
        }

        if self.match_keyword(Keyword::Break) {
            return Ok(Node::Break {
                span: self.previous().span.clone(),
            });
        }

        if self.match_keyword(Keyword::Continue) {
            return Ok(Node::Continue {
                span: self.previous().span.clone(),
            });
        }

        if self.match_keyword(Keyword::Import) {
            return self.import();
        }

        self.expression()
    }

    fn declaration(&mut self) -> Result<Node, VlbError> {
        let keyword = self.advance().clone();
        let is_constant = keyword.is_keyword(Keyword::Const);

        let name = self
            .consume(
                TokenType::Identifier,
                &format!("identifier after '{}'", keyword.lexeme),
            )?
            .lexeme
            .clone();

        self.consume_with_help(
            TokenType::Equal,
            "'=' after variable name",
            format!("Variables are declared as: {} {} = value", keyword.lexeme, name),
        )?;

        let value = self.expression()?;
        let span = keyword.span.to(value.span());

        Ok(Node::VariableDeclare {
            name,
            is_constant,
            value: Box::new(value),
            span,
        })
    }

    fn assignment_follows(&self) -> bool {
        matches!(
            self.peek_next().map(|t| t.token_type),
            Some(
                TokenType::Equal
                    | TokenType::PlusEqual
                    | TokenType::MinusEqual
                    | TokenType::StarEqual
                    | TokenType::SlashEqual
            )
        )
    }

    fn assignment(&mut self) -> Result<Node, VlbError> {
        let name_token = self.advance().clone();
        let operator_token = self.advance().clone();

        let compound = match operator_token.token_type {
            TokenType::PlusEqual => Some(BinaryOperator::Add),
            TokenType::MinusEqual => Some(BinaryOperator::Subtract),
            TokenType::StarEqual => Some(BinaryOperator::Multiply),
            TokenType::SlashEqual => Some(BinaryOperator::Divide),
            _ => None,
        };

        let value = self.operand(&operator_token, Self::expression)?;
        let span = name_token.span.to(value.span());

        Ok(Node::VariableAssign {
            name: name_token.lexeme,
            compound,
            value: Box::new(value),
            span,
        })
    }

    fn import(&mut self) -> Result<Node, VlbError> {
        let start = self.previous().span.clone();
        let module = self.expression()?;
        let mut span = start.to(module.span());

        let alias = if self.match_keyword(Keyword::As) {
            let alias = if self.match_types(&[TokenType::Star]) {
                ImportAlias::Wildcard
            } else {
                let name = self.consume_with_help(
                    TokenType::Identifier,
                    "identifier or '*' after 'AS'",
                    "Use 'AS name' to bind a module value or 'AS *' to import every export"
                        .to_string(),
                )?;
                ImportAlias::Name(name.lexeme.clone())
            };
            span = start.to(&self.previous().span);
            Some(alias)
        } else {
            None
        };

        Ok(Node::Import {
            module: Box::new(module),
            alias,
            span,
        })
    }

    fn expression(&mut self) -> Result<Node, VlbError> {
        self.additive()
    }

    fn additive(&mut self) -> Result<Node, VlbError> {
        let mut node = self.comparison()?;

        while self.match_types(&[TokenType::Plus, TokenType::Minus]) {
            let operator_token = self.previous().clone();
            let operator = match operator_token.token_type {
                TokenType::Plus => BinaryOperator::Add,
                _ => BinaryOperator::Subtract,
            };
            let right = self.operand(&operator_token, Self::comparison)?;
            node = Self::binary(node, operator, right);
        }

        Ok(node)
    }

    fn comparison(&mut self) -> Result<Node, VlbError> {
        if self.match_keyword(Keyword::Not) {
            let keyword = self.previous().clone();
            let operand = self.operand(&keyword, Self::comparison)?;
            let span = keyword.span.to(operand.span());
            return Ok(Node::UnaryOp {
                operator: UnaryOperator::Not,
                operand: Box::new(operand),
                span,
            });
        }

        let mut node = self.multiplicative()?;

        while self.match_types(&[
            TokenType::EqualEqual,
            TokenType::BangEqual,
            TokenType::Greater,
            TokenType::Less,
            TokenType::GreaterEqual,
            TokenType::LessEqual,
        ]) {
            let operator_token = self.previous().clone();
            let operator = match operator_token.token_type {
                TokenType::EqualEqual => BinaryOperator::Equal,
                TokenType::BangEqual => BinaryOperator::NotEqual,
                TokenType::Greater => BinaryOperator::Greater,
                TokenType::Less => BinaryOperator::Less,
                TokenType::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => BinaryOperator::LessEqual,
            };
            let right = self.operand(&operator_token, Self::multiplicative)?;
            node = Self::binary(node, operator, right);
        }

        Ok(node)
    }

    fn multiplicative(&mut self) -> Result<Node, VlbError> {
        let mut node = self.power()?;

        while self.match_types(&[TokenType::Star, TokenType::Slash, TokenType::Percent]) {
            let operator_token = self.previous().clone();
            let operator = match operator_token.token_type {
                TokenType::Star => BinaryOperator::Multiply,
                TokenType::Slash => BinaryOperator::Divide,
                _ => BinaryOperator::Modulo,
            };
            let right = self.operand(&operator_token, Self::power)?;
            node = Self::binary(node, operator, right);
        }

        Ok(node)
    }

    fn power(&mut self) -> Result<Node, VlbError> {
        let mut node = self.unary()?;

        while self.match_types(&[TokenType::Caret]) {
            let operator_token = self.previous().clone();
            let right = self.operand(&operator_token, Self::unary)?;
            node = Self::binary(node, BinaryOperator::Power, right);
        }

        Ok(node)
    }

    fn unary(&mut self) -> Result<Node, VlbError> {
        if self.match_types(&[TokenType::Plus, TokenType::Minus]) {
            let operator_token = self.previous().clone();
            let operator = match operator_token.token_type {
                TokenType::Plus => UnaryOperator::Plus,
                _ => UnaryOperator::Negate,
            };
            let operand = self.operand(&operator_token, Self::unary)?;
            let span = operator_token.span.to(operand.span());
            return Ok(Node::UnaryOp {
                operator,
                operand: Box::new(operand),
                span,
            });
        }

        self.postfix()
    }

    fn postfix(&mut self) -> Result<Node, VlbError> {
        let mut node = self.atom()?;

        loop {
            if self.match_types(&[TokenType::LeftParen]) {
                node = self.finish_call(node)?;
            } else if self.match_types(&[TokenType::LeftBracket]) {
                if self.check(&TokenType::RightBracket) {
                    return Err(VlbError::syntax_error(
                        self.error_span(),
                        "Expected index expression, got ']'".to_string(),
                    ));
                }
                let index = self.expression()?;
                let close = self.consume(TokenType::RightBracket, "']' after index")?;
                let span = node.span().to(&close.span);

                // `base[index] = value` ends the chain.
                if self.match_types(&[TokenType::Equal]) {
                    let equals = self.previous().clone();
                    let value = self.operand(&equals, Self::expression)?;
                    let span = node.span().to(value.span());
                    return Ok(Node::SetIndex {
                        base: Box::new(node),
                        index: Box::new(index),
                        value: Box::new(value),
                        span,
                    });
                }

                node = Node::GetIndex {
                    base: Box::new(node),
                    index: Box::new(index),
                    span,
                };
            } else if self.match_types(&[TokenType::Dot]) {
                let name = self.consume(TokenType::Identifier, "attribute name after '.'")?;
                let name_span = name.span.clone();
                let name = name.lexeme.clone();
                let span = node.span().to(&name_span);
                node = Node::GetAttribute {
                    base: Box::new(node),
                    name,
                    span,
                };
            } else {
                break;
            }
        }

        Ok(node)
    }

    fn finish_call(&mut self, callee: Node) -> Result<Node, VlbError> {
        let mut args = Vec::new();

        self.skip_newlines();
        if !self.check(&TokenType::RightParen) {
            loop {
                args.push(self.expression()?);
                self.skip_newlines();
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
                self.skip_newlines();
            }
        }

        let close = self.consume_with_help(
            TokenType::RightParen,
            "',' or ')' in argument list",
            "Function arguments are separated by commas: f(a, b)".to_string(),
        )?;
        let span = callee.span().to(&close.span);

        Ok(Node::FunctionCall {
            callee: Box::new(callee),
            args,
            span,
        })
    }

    fn atom(&mut self) -> Result<Node, VlbError> {
        let token = self.peek().clone();

        match token.token_type {
            TokenType::Integer | TokenType::Float => {
                self.advance();
                let value = match token.literal {
                    Some(Literal::Integer(n)) => Number::Int(n),
                    Some(Literal::Float(n)) => Number::Float(n),
                    _ => {
                        return Err(VlbError::syntax_error(
                            token.span,
                            format!("Invalid number literal '{}'", token.lexeme),
                        ))
                    }
                };
                Ok(Node::NumberLiteral {
                    value,
                    span: token.span,
                })
            }
            TokenType::String => {
                self.advance();
                let value = match token.literal {
                    Some(Literal::Text(text)) => text,
                    _ => String::new(),
                };
                Ok(Node::StringLiteral {
                    value,
                    span: token.span,
                })
            }
            TokenType::Identifier => {
                self.advance();
                Ok(Node::VariableAccess {
                    name: token.lexeme,
                    span: token.span,
                })
            }
            TokenType::LeftParen => {
                self.advance();
                self.skip_newlines();
                let inner = self.expression()?;
                self.skip_newlines();
                self.consume_with_help(
                    TokenType::RightParen,
                    "')' after expression",
                    "Every '(' needs a matching ')'".to_string(),
                )?;
                Ok(inner)
            }
            TokenType::LeftBracket => {
                self.advance();
                self.list_literal(token.span)
            }
            TokenType::LeftBrace => {
                self.advance();
                self.dict_literal(token.span)
            }
            TokenType::Keyword(Keyword::If) => {
                self.advance();
                self.if_expression(token.span)
            }
            TokenType::Keyword(Keyword::While) => {
                self.advance();
                self.while_expression(token.span)
            }
            TokenType::Keyword(Keyword::For) => {
                self.advance();
                self.for_expression(token.span)
            }
            TokenType::Keyword(Keyword::Function) => {
                self.advance();
                self.function_definition(token.span)
            }
            _ => Err(VlbError::syntax_error(
                self.error_span(),
                format!("Expected expression, got {}", token.describe()),
            )),
        }
    }

    fn list_literal(&mut self, open: Span) -> Result<Node, VlbError> {
        let mut items = Vec::new();

        self.skip_newlines();
        if self.match_types(&[TokenType::RightBracket]) {
            return Ok(Node::List {
                items,
                span: open.to(&self.previous().span),
            });
        }

        let first = self.expression()?;
        self.skip_newlines();

        if self.match_types(&[TokenType::Arrow]) {
            return self.range(open, first);
        }

        items.push(first);
        while self.match_types(&[TokenType::Comma]) {
            self.skip_newlines();
            items.push(self.expression()?);
            self.skip_newlines();
        }

        let close = self.consume(TokenType::RightBracket, "',' or ']' in list")?;
        Ok(Node::List {
            items,
            span: open.to(&close.span),
        })
    }

    fn range(&mut self, open: Span, start: Node) -> Result<Node, VlbError> {
        let end = self.expression()?;
        self.skip_newlines();

        let step = if self.match_types(&[TokenType::Arrow]) {
            let step = self.expression()?;
            self.skip_newlines();
            step
        } else {
            Node::NumberLiteral {
                value: Number::Int(1),
                span: Span::single(Rc::clone(&end.span().file), end.span().end),
            }
        };

        let close = self.consume_with_help(
            TokenType::RightBracket,
            "']' after range",
            "Ranges are written as [start -> end] or [start -> end -> step]".to_string(),
        )?;

        Ok(Node::Range {
            start: Box::new(start),
            end: Box::new(end),
            step: Box::new(step),
            span: open.to(&close.span),
        })
    }

    fn dict_literal(&mut self, open: Span) -> Result<Node, VlbError> {
        let mut entries = Vec::new();

        self.skip_newlines();
        if !self.check(&TokenType::RightBrace) {
            loop {
                let key = self.expression()?;
                self.consume_with_help(
                    TokenType::Colon,
                    "':' after dictionary key",
                    "Dictionary entries are written as key: value".to_string(),
                )?;
                self.skip_newlines();
                let value = self.expression()?;
                entries.push((key, value));

                self.skip_newlines();
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
                self.skip_newlines();
            }
        }

        let close = self.consume(TokenType::RightBrace, "',' or '}' in dictionary")?;
        Ok(Node::Dictionary {
            entries,
            span: open.to(&close.span),
        })
    }

    fn if_expression(&mut self, start: Span) -> Result<Node, VlbError> {
        let mut branches = Vec::new();

        let condition = self.expression()?;
        self.consume_keyword(Keyword::Then, "after IF condition")?;
        let body = self.block(&[Keyword::End, Keyword::Else, Keyword::ElseIf], "IF")?;
        branches.push((condition, body));

        while self.match_keyword(Keyword::ElseIf) {
            let condition = self.expression()?;
            self.consume_keyword(Keyword::Then, "after ELSEIF condition")?;
            let body = self.block(&[Keyword::End, Keyword::Else, Keyword::ElseIf], "ELSEIF")?;
            branches.push((condition, body));
        }

        let else_body = if self.match_keyword(Keyword::Else) {
            Some(self.block(&[Keyword::End], "ELSE")?)
        } else {
            None
        };

        let end = self.consume_keyword(Keyword::End, "to close IF")?;
        Ok(Node::If {
            branches,
            else_body,
            span: start.to(&end.span),
        })
    }

    fn while_expression(&mut self, start: Span) -> Result<Node, VlbError> {
        let condition = self.expression()?;
        self.consume_keyword(Keyword::Then, "after WHILE condition")?;
        let body = self.block(&[Keyword::End], "WHILE")?;
        let end = self.consume_keyword(Keyword::End, "to close WHILE")?;

        Ok(Node::While {
            condition: Box::new(condition),
            body,
            span: start.to(&end.span),
        })
    }

    fn for_expression(&mut self, start: Span) -> Result<Node, VlbError> {
        let item = self
            .consume(TokenType::Identifier, "loop variable after 'FOR'")?
            .clone();
        self.consume_keyword(Keyword::In, "after loop variable")?;
        let iterable = self.expression()?;
        self.consume_keyword(Keyword::Then, "after FOR iterable")?;
        let body = self.block(&[Keyword::End], "FOR")?;
        let end = self.consume_keyword(Keyword::End, "to close FOR")?;

        Ok(Node::For {
            item_name: item.lexeme,
            item_span: item.span,
            iterable: Box::new(iterable),
            body,
            span: start.to(&end.span),
        })
    }

    fn function_definition(&mut self, start: Span) -> Result<Node, VlbError> {
        let name = if self.match_types(&[TokenType::Identifier]) {
            Some(self.previous().lexeme.clone())
        } else {
            None
        };

        self.consume_with_help(
            TokenType::LeftParen,
            "'(' after FUNCTION",
            "Functions are defined as: FUNCTION name(a, b) ... END".to_string(),
        )?;

        let mut params: Vec<String> = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                let param = self.consume(TokenType::Identifier, "parameter name")?.clone();
                if params.contains(&param.lexeme) {
                    return Err(VlbError::syntax_error(
                        param.span,
                        format!("Duplicate parameter '{}'", param.lexeme),
                    ));
                }
                params.push(param.lexeme);
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "',' or ')' in parameter list")?;

        let body = self.block(&[Keyword::End], "FUNCTION")?;
        let end = self.consume_keyword(Keyword::End, "to close FUNCTION")?;

        Ok(Node::FunctionDefine {
            name,
            params,
            body: Rc::new(body),
            span: start.to(&end.span),
        })
    }

    /// Parses statements until one of `terminators` is the current token.
    /// The terminator itself is not consumed.
    fn block(&mut self, terminators: &[Keyword], opener: &str) -> Result<Vec<Node>, VlbError> {
        let mut body = Vec::new();

        loop {
            self.skip_newlines();
            if terminators.iter().any(|k| self.check_keyword(*k)) {
                return Ok(body);
            }
            if self.is_at_end() {
                let expected = terminators
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(VlbError::syntax_error_with_help(
                    self.error_span(),
                    format!("Expected keyword {}, got end of file", expected),
                    format!("The {} block is never closed", opener),
                ));
            }
            body.push(self.statement_line()?);
        }
    }

    /// Remaps a failure to parse the right-hand side of `operator` into a
    /// message that names the operator, when nothing was consumed.
    fn operand(
        &mut self,
        operator: &Token,
        parse: fn(&mut Self) -> Result<Node, VlbError>,
    ) -> Result<Node, VlbError> {
        let before = self.current;
        parse(self).map_err(|err| {
            if self.current == before {
                VlbError::syntax_error(
                    err.span,
                    format!(
                        "Expected expression after '{}', got {}",
                        operator.lexeme,
                        self.peek().describe()
                    ),
                )
            } else {
                err
            }
        })
    }

    fn binary(left: Node, operator: BinaryOperator, right: Node) -> Node {
        let span = left.span().to(right.span());
        Node::BinaryOp {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            span,
        }
    }

    fn skip_newlines(&mut self) {
        while self.match_types(&[TokenType::Newline]) {}
    }

    fn at_block_end(&self) -> bool {
        self.check_keyword(Keyword::End)
            || self.check_keyword(Keyword::Else)
            || self.check_keyword(Keyword::ElseIf)
    }

    fn match_types(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn match_keyword(&mut self, keyword: Keyword) -> bool {
        self.match_types(&[TokenType::Keyword(keyword)])
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            *token_type == TokenType::Eof
        } else {
            self.peek().token_type == *token_type
        }
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.check(&TokenType::Keyword(keyword))
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.current.min(last)]
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.current + 1)
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    /// Span to blame for an unexpected token. At EOF this points just past
    /// the last real token rather than at the end of the file.
    fn error_span(&self) -> Span {
        if self.is_at_end() && self.current > 0 {
            let last = &self.tokens[self.current - 1].span;
            Span::single(Rc::clone(&last.file), last.end)
        } else {
            self.peek().span.clone()
        }
    }

    fn consume(&mut self, token_type: TokenType, expected: &str) -> Result<&Token, VlbError> {
        if self.check(&token_type) {
            Ok(self.advance())
        } else {
            Err(VlbError::syntax_error(
                self.error_span(),
                format!("Expected {}, got {}", expected, self.peek().describe()),
            ))
        }
    }

    fn consume_with_help(
        &mut self,
        token_type: TokenType,
        expected: &str,
        help: String,
    ) -> Result<&Token, VlbError> {
        if self.check(&token_type) {
            Ok(self.advance())
        } else {
            Err(VlbError::syntax_error_with_help(
                self.error_span(),
                format!("Expected {}, got {}", expected, self.peek().describe()),
                help,
            ))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword, context: &str) -> Result<Token, VlbError> {
        if self.check_keyword(keyword) {
            Ok(self.advance().clone())
        } else {
            Err(VlbError::syntax_error(
                self.error_span(),
                format!(
                    "Expected keyword {} {}, got {}",
                    keyword.as_str(),
                    context,
                    self.peek().describe()
                ),
            ))
        }
    }
}

/// Parses a token stream into its top-level statements.
pub fn parse(filename: &str, tokens: Vec<Token>) -> Result<Vec<Node>, VlbError> {
    let statements = Parser::new(tokens).parse()?;
    log::debug!("{}: parsed {} statements", filename, statements.len());
    Ok(statements)
}
