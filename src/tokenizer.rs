pub struct Tokenizer<'s> {
    input: &'s [char],
    index: usize,

    indent_level: usize,
    indent_size: usize,
    indent_format: IndentFormat,

    pub tokens: Vec<Token>,
    pub errors: Vec<TokenizerError>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum IndentFormat {
    Spaces,
    Tabs,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
}

impl Token {
    pub fn new(kind: TokenKind) -> Self {
        Self { kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    IntegerLiteral(i64),
    Identifier(String),

    SendArrow,
    ReceiveArrow,
    QuestionMark,

    Add,
    Subtract,
    Multiply,
    Divide,
    Assign,
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,

    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,

    KwTask,
    KwIf,
    KwElse,
    KwWhile,
    KwLoop,
    KwExit,
    KwTrue,
    KwFalse,
    KwNull,

    Indent,
    Dedent,
    NewLine,

    EndOfFile,
}

#[derive(Debug, Clone)]
pub struct TokenizerError {
    message: String,
}

impl TokenizerError {
    fn new(s: impl Into<String>) -> Self {
        Self { message: s.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl<'s> Tokenizer<'s> {
    pub fn new(input: &'s [char]) -> Self {
        Self {
            input,
            index: 0,

            indent_level: 0,
            indent_size: 0,
            indent_format: IndentFormat::Spaces,

            tokens: vec![],
            errors: vec![],
        }
    }

    pub fn tokenize(&mut self) {
        while !self.is_at_end() {
            if let Some(id) = self.try_get_identifier() {
                if let Some(kw) = Self::try_convert_to_keyword(&id) {
                    self.tokens.push(Token::new(kw))
                } else {
                    self.tokens.push(Token::new(TokenKind::Identifier(id)))
                }
            } else if self.this() == '\n' {
                self.tokens.push(Token::new(TokenKind::NewLine));
                self.advance();
                self.handle_line_start();
            } else if self.this().is_ascii_digit() {
                let mut buffer = vec![self.this()];
                self.advance();

                while self.this().is_ascii_digit() {
                    buffer.push(self.this());
                    self.advance();
                }

                let buffer_str: String = buffer.iter().collect();
                match buffer_str.parse::<i64>() {
                    Ok(int) => self.tokens.push(Token::new(TokenKind::IntegerLiteral(int))),
                    Err(_) => self
                        .errors
                        .push(TokenizerError::new(format!("integer literal `{buffer_str}` is out of range"))),
                }
            } else if let Some(kind) = self.try_get_symbol() {
                self.tokens.push(Token::new(kind));
            } else if self.this().is_whitespace() {
                self.advance(); // Skip whitespace
            } else {
                self.errors
                    .push(TokenizerError::new(format!("unexpected character `{}`", self.this())));
                self.advance();
            }
        }

        // Close any blocks left open by a missing trailing newline
        if self.indent_level > 0 {
            self.tokens.push(Token::new(TokenKind::NewLine));
            for _ in 0..self.indent_level {
                self.tokens.push(Token::new(TokenKind::Dedent));
            }
        }

        self.tokens.push(Token::new(TokenKind::EndOfFile))
    }

    /// Two-character operators are matched before their one-character
    /// prefixes, so `<-`, `->`, `<=`, `>=`, `==` and `!=` win over `<`, `-`,
    /// `>` and `=`.
    fn try_get_symbol(&mut self) -> Option<TokenKind> {
        let kind = match (self.this(), self.next()) {
            ('<', '-') => {
                self.advance();
                TokenKind::ReceiveArrow
            }
            ('-', '>') => {
                self.advance();
                TokenKind::SendArrow
            }
            ('<', '=') => {
                self.advance();
                TokenKind::LessEqual
            }
            ('>', '=') => {
                self.advance();
                TokenKind::GreaterEqual
            }
            ('=', '=') => {
                self.advance();
                TokenKind::Equals
            }
            ('!', '=') => {
                self.advance();
                TokenKind::NotEquals
            }

            ('<', _) => TokenKind::LessThan,
            ('>', _) => TokenKind::GreaterThan,
            ('=', _) => TokenKind::Assign,
            ('+', _) => TokenKind::Add,
            ('-', _) => TokenKind::Subtract,
            ('*', _) => TokenKind::Multiply,
            ('/', _) => TokenKind::Divide,
            ('?', _) => TokenKind::QuestionMark,
            ('(', _) => TokenKind::LeftParen,
            (')', _) => TokenKind::RightParen,
            ('[', _) => TokenKind::LeftBracket,
            (']', _) => TokenKind::RightBracket,

            _ => return None,
        };
        self.advance();
        Some(kind)
    }

    /// Called just after a newline has been consumed. Measures the new
    /// line's indentation and emits `Indent`/`Dedent` tokens for the
    /// transition. Blank lines are skipped without touching the level.
    fn handle_line_start(&mut self) {
        if self.line_is_blank() {
            // Discard the whitespace; the next '\n' restarts this logic
            while self.this() != '\n' && !self.is_at_end() {
                self.advance();
            }
            return;
        }

        match self.consume_all_indentation() {
            Ok(new_indent_level) => {
                // One deeper: open a block
                if new_indent_level == self.indent_level + 1 {
                    self.tokens.push(Token::new(TokenKind::Indent));
                }
                // Shallower by any amount: close that many blocks
                else if new_indent_level < self.indent_level {
                    let number_of_dedents = self.indent_level - new_indent_level;
                    for _ in 0..number_of_dedents {
                        self.tokens.push(Token::new(TokenKind::Dedent));
                    }
                }
                // Same level: nothing to do
                else if new_indent_level == self.indent_level {
                    // Nothing!
                }
                // Anything else isn't something we expect!
                else {
                    self.errors
                        .push(TokenizerError::new("indentation increased too much"))
                }

                self.indent_level = new_indent_level;
            }
            Err(e) => self.errors.push(e),
        };
    }

    fn line_is_blank(&self) -> bool {
        let mut i = self.index;
        while i < self.input.len() {
            match self.input[i] {
                ' ' | '\t' => i += 1,
                '\n' => return true,
                _ => return false,
            }
        }
        true
    }

    fn this(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.input[self.index]
        }
    }

    fn next(&self) -> char {
        if self.index + 1 >= self.input.len() {
            '\0'
        } else {
            self.input[self.index + 1]
        }
    }

    fn is_at_end(&self) -> bool {
        self.index >= self.input.len()
    }

    fn advance(&mut self) {
        self.index += 1;
    }

    fn try_get_identifier(&mut self) -> Option<String> {
        if self.this().is_alphabetic() || self.this() == '_' || self.this() == '$' {
            // Looks like an identifier! Let's go...
            let mut buffer = vec![self.this()];
            self.advance();

            while self.this().is_alphanumeric() || self.this() == '_' {
                buffer.push(self.this());
                self.advance();
            }

            Some(buffer.iter().collect())
        } else {
            None
        }
    }

    fn try_convert_to_keyword(s: &str) -> Option<TokenKind> {
        match s {
            "task" => Some(TokenKind::KwTask),
            "if" => Some(TokenKind::KwIf),
            "else" => Some(TokenKind::KwElse),
            "while" => Some(TokenKind::KwWhile),
            "loop" => Some(TokenKind::KwLoop),
            "exit" => Some(TokenKind::KwExit),
            "true" => Some(TokenKind::KwTrue),
            "false" => Some(TokenKind::KwFalse),
            "null" => Some(TokenKind::KwNull),
            _ => None,
        }
    }

    fn consume_all_indentation(&mut self) -> Result<usize, TokenizerError> {
        // Try consuming a single indentation character first, to get the baseline format
        let Some(given_format) = self.consume_one_indentation() else {
            // There's no indentation - return nothing
            return Ok(0)
        };

        // Have we already decided on an expected indent format?
        let mut set_indent_size = false;
        if self.indent_size > 0 {
            // Yes - check this matches the expected format
            if self.indent_format != given_format {
                return Err(TokenizerError::new("indentation format mismatch"));
            }
        } else {
            // No - we've got one now!
            self.indent_format = given_format;
            set_indent_size = true;
        }

        // Remember, we already consumed a character to check there was any indentation at all
        let mut current_indent_size = 1;
        loop {
            let this_indent = self.consume_one_indentation();

            // Check if the indentation is over
            let Some(this_indent) = this_indent else {
                if set_indent_size {
                    self.indent_size = current_indent_size;
                }

                // Convert "size" (number of chars) into "level" (number of full indents)
                if current_indent_size % self.indent_size != 0 {
                    return Err(TokenizerError::new("incomplete indentation"));
                }
                return Ok(current_indent_size / self.indent_size);
            };

            if this_indent != self.indent_format {
                return Err(TokenizerError::new("indentation mismatch"));
            }

            current_indent_size += 1;
        }
    }

    fn consume_one_indentation(&mut self) -> Option<IndentFormat> {
        match self.this() {
            '\t' => {
                self.advance();
                Some(IndentFormat::Tabs)
            }
            ' ' => {
                self.advance();
                Some(IndentFormat::Spaces)
            }
            _ => None,
        }
    }
}
