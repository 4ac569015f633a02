/*
Syntax example:

    task A
        123 -> B
        456 -> B

    task B
        val1 <- ?x
        val2 <- x
        val1 + val2 -> $out
*/

use crate::{
    node::{BinaryOperator, ChannelSpec, Item, ItemKind, Node, NodeKind},
    tokenizer::{Token, TokenKind},
};

pub struct Parser<'t> {
    tokens: &'t [Token],
    index: usize,

    pub items: Vec<Item>,
    pub errors: Vec<ParserError>,
}

#[derive(Debug, Clone)]
pub struct ParserError {
    message: String,
}

impl ParserError {
    fn new(s: impl Into<String>) -> Self {
        Self { message: s.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            index: 0,
            items: vec![],
            errors: vec![],
        }
    }

    pub fn parse_top_level(&mut self) {
        loop {
            match self.this().kind {
                TokenKind::KwTask => {
                    if self.parse_task().is_none() {
                        self.recover_to_next_task();
                    }
                }
                TokenKind::NewLine => self.advance(),
                TokenKind::EndOfFile => break,
                _ => {
                    self.push_unexpected_error();
                    self.recover_to_next_task();
                }
            }
        }
    }

    /// Skip ahead to the next task definition, so one malformed item
    /// doesn't swallow the rest of the file.
    fn recover_to_next_task(&mut self) {
        while !matches!(
            self.this().kind,
            TokenKind::KwTask | TokenKind::EndOfFile
        ) {
            self.advance();
        }
    }

    fn parse_task(&mut self) -> Option<()> {
        // Skip keyword
        self.expect(TokenKind::KwTask)?;

        // Get name
        let TokenKind::Identifier(name) = &self.this().kind else {
            self.push_unexpected_error();
            return None;
        };
        let name = name.to_string();
        self.advance();

        // Optional multiplicity: `task Name[n]`
        let mut instances = None;
        if self.this().kind == TokenKind::LeftBracket {
            self.advance();
            let TokenKind::IntegerLiteral(count) = self.this().kind else {
                self.push_unexpected_error();
                return None;
            };
            self.advance();
            self.expect(TokenKind::RightBracket)?;

            if count < 1 {
                self.errors.push(ParserError::new(format!(
                    "task `{name}` must have at least one instance"
                )));
                return None;
            }
            instances = Some(count as usize);
        }

        // Expect newline, then indentation
        self.expect(TokenKind::NewLine)?;
        self.expect(TokenKind::Indent)?;

        // Parse body
        let body = self.parse_body();

        self.items.push(Item::new(ItemKind::TaskDefinition {
            name,
            instances,
            body,
        }));
        Some(())
    }

    fn parse_body(&mut self) -> Node {
        // Build up a body until we hit a dedent
        // (If there is nested indentation, that should be handled by the child parser)
        let mut body_nodes = vec![];
        loop {
            match self.this().kind {
                TokenKind::Dedent => {
                    self.advance();
                    break;
                }
                TokenKind::EndOfFile => break,
                _ => {
                    if let Some(node) = self.parse_statement() {
                        body_nodes.push(node);
                    }
                }
            }
        }

        Node::new(NodeKind::Body(body_nodes))
    }

    fn parse_statement(&mut self) -> Option<Node> {
        let stmt = match self.this().kind {
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwWhile => self.parse_while(),
            TokenKind::KwLoop => self.parse_loop(),
            TokenKind::KwExit => {
                self.advance();
                Some(Node::new(NodeKind::Exit))
            }
            _ => self.parse_simple_statement(),
        };

        while self.this().kind == TokenKind::NewLine {
            self.advance();
        }

        stmt
    }

    fn parse_if(&mut self) -> Option<Node> {
        self.expect(TokenKind::KwIf)?;

        let condition = self.parse_expression()?;

        self.expect(TokenKind::NewLine)?;
        self.expect(TokenKind::Indent)?;
        let body = self.parse_body();

        // An `else` on the line after the body belongs to this `if`
        let mut if_false = None;
        if self.this().kind == TokenKind::KwElse {
            self.advance();
            self.expect(TokenKind::NewLine)?;
            self.expect(TokenKind::Indent)?;
            if_false = Some(Box::new(self.parse_body()));
        }

        Some(Node::new(NodeKind::If {
            condition: Box::new(condition),
            if_true: Box::new(body),
            if_false,
        }))
    }

    fn parse_while(&mut self) -> Option<Node> {
        self.expect(TokenKind::KwWhile)?;

        let condition = self.parse_expression()?;

        self.expect(TokenKind::NewLine)?;
        self.expect(TokenKind::Indent)?;
        let body = self.parse_body();

        Some(Node::new(NodeKind::While {
            condition: Box::new(condition),
            body: Box::new(body),
        }))
    }

    fn parse_loop(&mut self) -> Option<Node> {
        self.expect(TokenKind::KwLoop)?;

        self.expect(TokenKind::NewLine)?;
        self.expect(TokenKind::Indent)?;
        let body = self.parse_body();

        Some(Node::new(NodeKind::Loop {
            body: Box::new(body),
        }))
    }

    /// Assignments, sends, receives, and bare expressions all start with an
    /// expression, so parse one and let the next token decide.
    fn parse_simple_statement(&mut self) -> Option<Node> {
        let left = self.parse_expression()?;

        match self.this().kind {
            TokenKind::SendArrow => {
                self.advance();
                let channel = self.parse_expression()?;

                Some(Node::new(NodeKind::Send {
                    value: Box::new(left),
                    channel: Box::new(channel),
                }))
            }

            TokenKind::ReceiveArrow => {
                self.advance();

                let target = match self.receive_target(&left) {
                    Ok(target) => target,
                    Err(e) => {
                        self.errors.push(e);
                        return None;
                    }
                };

                let channel = if self.this().kind == TokenKind::QuestionMark {
                    self.advance();
                    let TokenKind::Identifier(bind_name) = &self.this().kind else {
                        self.push_unexpected_error();
                        return None;
                    };
                    let bind_name = bind_name.to_string();
                    self.advance();
                    ChannelSpec::Binding(bind_name)
                } else {
                    ChannelSpec::Explicit(Box::new(self.parse_expression()?))
                };

                Some(Node::new(NodeKind::Receive { target, channel }))
            }

            TokenKind::Assign => {
                self.advance();
                let NodeKind::Identifier(target) = &left.kind else {
                    self.errors
                        .push(ParserError::new("assignment target must be a name"));
                    return None;
                };
                let target = target.to_string();
                let value = self.parse_expression()?;

                Some(Node::new(NodeKind::Assign {
                    target,
                    value: Box::new(value),
                }))
            }

            _ => Some(left),
        }
    }

    fn receive_target(&self, left: &Node) -> Result<Option<String>, ParserError> {
        match &left.kind {
            NodeKind::Identifier(name) if name == "_" => Ok(None),
            NodeKind::Identifier(name) => Ok(Some(name.to_string())),
            _ => Err(ParserError::new("receive target must be a name or `_`")),
        }
    }

    // Precedence, loosest first: comparisons, additive, multiplicative.
    // Each level is left-associative.

    fn parse_expression(&mut self) -> Option<Node> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Option<Node> {
        let mut left = self.parse_add_sub()?;

        loop {
            let op = match self.this().kind {
                TokenKind::Equals => BinaryOperator::Equals,
                TokenKind::NotEquals => BinaryOperator::NotEquals,
                TokenKind::LessThan => BinaryOperator::LessThan,
                TokenKind::GreaterThan => BinaryOperator::GreaterThan,
                TokenKind::LessEqual => BinaryOperator::LessEqual,
                TokenKind::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };
            self.advance();

            left = Node::new(NodeKind::BinaryOperation {
                left: Box::new(left),
                op,
                right: Box::new(self.parse_add_sub()?),
            });
        }

        Some(left)
    }

    fn parse_add_sub(&mut self) -> Option<Node> {
        let mut left = self.parse_mul_div()?;

        loop {
            let op = match self.this().kind {
                TokenKind::Add => BinaryOperator::Add,
                TokenKind::Subtract => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();

            left = Node::new(NodeKind::BinaryOperation {
                left: Box::new(left),
                op,
                right: Box::new(self.parse_mul_div()?),
            });
        }

        Some(left)
    }

    fn parse_mul_div(&mut self) -> Option<Node> {
        let mut left = self.parse_postfix()?;

        loop {
            let op = match self.this().kind {
                TokenKind::Multiply => BinaryOperator::Multiply,
                TokenKind::Divide => BinaryOperator::Divide,
                _ => break,
            };
            self.advance();

            left = Node::new(NodeKind::BinaryOperation {
                left: Box::new(left),
                op,
                right: Box::new(self.parse_postfix()?),
            });
        }

        Some(left)
    }

    /// A primary expression followed by any number of `[index]` suffixes,
    /// which select an instance out of a multi-task.
    fn parse_postfix(&mut self) -> Option<Node> {
        let mut value = self.parse_parens()?;

        while self.this().kind == TokenKind::LeftBracket {
            self.advance();
            let index = self.parse_expression()?;
            self.expect(TokenKind::RightBracket)?;

            value = Node::new(NodeKind::Index {
                value: Box::new(value),
                index: Box::new(index),
            });
        }

        Some(value)
    }

    fn parse_parens(&mut self) -> Option<Node> {
        if self.this().kind == TokenKind::LeftParen {
            self.advance();
            let result = self.parse_expression()?;
            self.expect(TokenKind::RightParen)?;

            Some(result)
        } else {
            self.parse_atom()
        }
    }

    fn parse_atom(&mut self) -> Option<Node> {
        match &self.this().kind {
            TokenKind::Identifier(id) => {
                let node = Node::new(NodeKind::Identifier(id.clone()));
                self.advance();
                Some(node)
            }

            TokenKind::IntegerLiteral(int) => {
                let node = Node::new(NodeKind::IntegerLiteral(*int));
                self.advance();
                Some(node)
            }
            TokenKind::KwTrue => {
                self.advance();
                Some(Node::new(NodeKind::BooleanLiteral(true)))
            }
            TokenKind::KwFalse => {
                self.advance();
                Some(Node::new(NodeKind::BooleanLiteral(false)))
            }
            TokenKind::KwNull => {
                self.advance();
                Some(Node::new(NodeKind::NullLiteral))
            }

            // Unary minus: `-x` is sugar for `0 - x`
            TokenKind::Subtract => {
                self.advance();
                let operand = self.parse_parens()?;
                Some(Node::new(NodeKind::BinaryOperation {
                    left: Box::new(Node::new(NodeKind::IntegerLiteral(0))),
                    op: BinaryOperator::Subtract,
                    right: Box::new(operand),
                }))
            }

            _ => {
                self.push_unexpected_error();
                self.advance();
                None
            }
        }
    }

    fn is_at_end(&self) -> bool {
        self.index >= self.tokens.len()
    }

    fn advance(&mut self) {
        self.index += 1;
    }

    fn this(&self) -> &Token {
        if self.is_at_end() {
            // The token stream always ends with EndOfFile
            self.tokens.last().unwrap()
        } else {
            &self.tokens[self.index]
        }
    }

    /// Consume the expected token, or record an error and step past the
    /// offending one so callers always make progress.
    #[must_use]
    fn expect(&mut self, kind: TokenKind) -> Option<()> {
        if self.this().kind != kind {
            self.push_unexpected_error();
            self.advance();
            return None;
        };
        self.advance();

        Some(())
    }

    fn push_unexpected_error(&mut self) {
        let token = self.this();
        self.errors
            .push(ParserError::new(format!("unexpected token {token:?}")));
    }
}
