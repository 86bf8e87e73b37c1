//! Tokenizer with indentation tracking.
//!
//! Produces `Newline`, `Indent` and `Dedent` tokens the way an
//! indentation-sensitive language needs them. Newlines inside brackets are
//! ignored, and the indentation of the first logical line becomes the base
//! level so editor-indented snippets still parse.

use super::error::{ScriptError, ScriptResult};

#[derive(Clone, Debug, PartialEq)]
pub enum Tok {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
    pub column: usize,
}

const OPERATORS: &[&str] = &[
    "//=", "**=", "**", "//", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "%=", "+", "-",
    "*", "/", "%", "<", ">", "=", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";",
];

pub fn tokenize(source: &str) -> ScriptResult<Vec<Token>> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
        depth: 0,
        indents: vec![0],
        tokens: Vec::new(),
        at_line_start: true,
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    depth: usize,
    indents: Vec<usize>,
    tokens: Vec<Token>,
    at_line_start: bool,
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn push(&mut self, tok: Tok, line: usize, column: usize) {
        self.tokens.push(Token { tok, line, column });
    }

    fn error(&self, message: impl std::fmt::Display) -> ScriptError {
        ScriptError::syntax(message, self.line, self.column)
    }

    fn run(&mut self) -> ScriptResult<()> {
        while self.peek().is_some() {
            if self.at_line_start && self.depth == 0 {
                self.indentation()?;
                continue;
            }
            let (line, column) = (self.line, self.column);
            let Some(c) = self.peek() else { break };
            match c {
                '\n' => {
                    self.advance();
                    if self.depth == 0 {
                        self.newline(line, column);
                        self.at_line_start = true;
                    }
                }
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '#' => self.skip_comment(),
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.advance();
                    self.advance();
                }
                '0'..='9' => self.number()?,
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => self.number()?,
                '\'' | '"' => self.string()?,
                c if c.is_alphabetic() || c == '_' => self.name(),
                _ => self.operator()?,
            }
        }

        let (line, column) = (self.line, self.column);
        self.newline(line, column);
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent, line, column);
        }
        self.push(Tok::Eof, line, column);
        Ok(())
    }

    fn newline(&mut self, line: usize, column: usize) {
        let needed = self
            .tokens
            .last()
            .is_some_and(|t| !matches!(t.tok, Tok::Newline | Tok::Indent | Tok::Dedent));
        if needed {
            self.push(Tok::Newline, line, column);
        }
    }

    fn skip_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.advance();
        }
    }

    fn indentation(&mut self) -> ScriptResult<()> {
        let mut width = 0;
        while let Some(c) = self.peek() {
            match c {
                ' ' => width += 1,
                '\t' => width += 4,
                '\r' => {}
                _ => break,
            }
            self.advance();
        }

        match self.peek() {
            None => return Ok(()),
            Some('\n') => {
                self.advance();
                return Ok(());
            }
            Some('#') => {
                self.skip_comment();
                return Ok(());
            }
            Some(_) => {}
        }
        self.at_line_start = false;

        if self.tokens.is_empty() {
            self.indents[0] = width;
            return Ok(());
        }

        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(Tok::Indent, self.line, 1);
        } else {
            while width < self.indents.last().copied().unwrap_or(0) {
                self.indents.pop();
                self.push(Tok::Dedent, self.line, 1);
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        Ok(())
    }

    fn number(&mut self) -> ScriptResult<()> {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        let mut is_float = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    text.push(c);
                }
            } else if c == '.' && !is_float {
                is_float = true;
                text.push(c);
            } else if (c == 'e' || c == 'E')
                && self
                    .peek_at(1)
                    .is_some_and(|d| d.is_ascii_digit() || d == '-' || d == '+')
            {
                is_float = true;
                text.push(c);
                self.advance();
                if let Some(sign) = self.peek().filter(|s| *s == '-' || *s == '+') {
                    text.push(sign);
                    self.advance();
                }
                continue;
            } else {
                break;
            }
            self.advance();
        }

        let tok = if is_float {
            Tok::Float(
                text.parse()
                    .map_err(|_| ScriptError::syntax("invalid decimal literal", line, column))?,
            )
        } else {
            Tok::Int(text.parse().map_err(|_| ScriptError::overflow())?)
        };
        self.push(tok, line, column);
        Ok(())
    }

    fn string(&mut self) -> ScriptResult<()> {
        let (line, column) = (self.line, self.column);
        let Some(quote) = self.advance() else {
            return Ok(());
        };
        let mut text = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => {
                    return Err(ScriptError::syntax(
                        "unterminated string literal",
                        line,
                        column,
                    ))
                }
                Some(c) if c == quote => break,
                Some('\\') => {
                    let escaped = self.advance().ok_or_else(|| {
                        ScriptError::syntax("unterminated string literal", line, column)
                    })?;
                    match escaped {
                        'n' => text.push('\n'),
                        't' => text.push('\t'),
                        'r' => text.push('\r'),
                        '0' => text.push('\0'),
                        '\n' => {}
                        other @ ('\\' | '\'' | '"') => text.push(other),
                        other => {
                            text.push('\\');
                            text.push(other);
                        }
                    }
                }
                Some(c) => text.push(c),
            }
        }
        self.push(Tok::Str(text), line, column);
        Ok(())
    }

    fn name(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while let Some(c) = self.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
            text.push(c);
            self.advance();
        }
        self.push(Tok::Name(text), line, column);
    }

    fn operator(&mut self) -> ScriptResult<()> {
        let (line, column) = (self.line, self.column);
        let rest: String = self.chars[self.pos..].iter().take(3).collect();
        let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(*op)) else {
            let c = self.peek().unwrap_or(' ');
            return Err(self.error(format!("invalid character '{c}'")));
        };
        for _ in 0..op.chars().count() {
            self.advance();
        }
        let op: &'static str = op;
        match op {
            "(" | "[" | "{" => self.depth += 1,
            ")" | "]" | "}" => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
        self.push(Tok::Op(op), line, column);
        Ok(())
    }
}
