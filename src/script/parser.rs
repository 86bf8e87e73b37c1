//! Recursive-descent parser for the scripting subset.

use super::ast::{BinOp, CmpOp, Expr, Literal, Program, Stmt, UnaryOp};
use super::error::{ScriptError, ScriptResult};
use super::lexer::{tokenize, Tok, Token};

/// Keywords that belong to the full language but not to this subset.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "def", "class", "lambda", "return", "del", "global", "nonlocal", "try", "except", "finally",
    "with", "raise", "yield", "assert", "async", "await",
];

/// Deepest nesting of brackets, operators and blocks a script may use.
pub const MAX_NESTING: usize = 100;

const RESERVED: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "elif", "else", "for", "while", "break", "continue",
    "pass", "import", "from", "as", "True", "False", "None",
];

/// Parse a script into a [`Program`]. Blank scripts parse to an empty program.
///
/// # Example
///
/// ```rust
/// use bsm_engine::script::parse;
///
/// let program = parse("x = 1; y = x * 2").unwrap();
/// assert_eq!(program.body.len(), 2);
/// assert!(parse("x = (1").is_err());
/// ```
pub fn parse(source: &str) -> ScriptResult<Program> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let mut body = Vec::new();
    while !parser.check(&Tok::Eof) {
        parser.statement(&mut body)?;
    }
    Ok(Program { body })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn current(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn check(&self, tok: &Tok) -> bool {
        &self.current().tok == tok
    }

    fn check_op(&self, op: &str) -> bool {
        matches!(self.current().tok, Tok::Op(o) if o == op)
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        matches!(&self.current().tok, Tok::Name(n) if n == keyword)
    }

    fn bump(&mut self) -> Tok {
        let tok = self.current().tok.clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.check_op(op) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl std::fmt::Display) -> ScriptError {
        let token = self.current();
        ScriptError::syntax(message, token.line, token.column)
    }

    fn unexpected(&self) -> ScriptError {
        let found = match &self.current().tok {
            Tok::Name(n) => format!("'{n}'"),
            Tok::Int(i) => format!("'{i}'"),
            Tok::Float(x) => format!("'{x}'"),
            Tok::Str(_) => "string literal".to_string(),
            Tok::Op(op) => format!("'{op}'"),
            Tok::Newline => "end of line".to_string(),
            Tok::Indent => "unexpected indent".to_string(),
            Tok::Dedent => "unindent".to_string(),
            Tok::Eof => "end of script".to_string(),
        };
        self.error(format!("invalid syntax near {found}"))
    }

    /// One level deeper into the tree. Callers restore `depth` on success.
    fn descend(&mut self) -> ScriptResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("too many nested parentheses"));
        }
        Ok(())
    }

    fn expect_op(&mut self, op: &str) -> ScriptResult<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{op}'")))
        }
    }

    fn identifier(&mut self) -> ScriptResult<String> {
        match &self.current().tok {
            Tok::Name(n) if !RESERVED.contains(&n.as_str()) => {
                let name = n.clone();
                self.bump();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn dotted_name(&mut self) -> ScriptResult<String> {
        let mut name = self.identifier()?;
        while self.eat_op(".") {
            name.push('.');
            name.push_str(&self.identifier()?);
        }
        Ok(name)
    }

    // --- statements ---

    fn statement(&mut self, out: &mut Vec<Stmt>) -> ScriptResult<()> {
        if self.check_keyword("if") {
            self.bump();
            out.push(self.if_statement()?);
        } else if self.eat_keyword("while") {
            let test = self.expression()?;
            let body = self.block()?;
            out.push(Stmt::While { test, body });
        } else if self.eat_keyword("for") {
            let var = self.identifier()?;
            if !self.eat_keyword("in") {
                return Err(self.error("expected 'in'"));
            }
            let iter = self.expression()?;
            let body = self.block()?;
            out.push(Stmt::For { var, iter, body });
        } else {
            self.simple_statements(out)?;
        }
        Ok(())
    }

    fn if_statement(&mut self) -> ScriptResult<Stmt> {
        let mut branches = vec![(self.expression()?, self.block()?)];
        let mut orelse = Vec::new();
        loop {
            if self.eat_keyword("elif") {
                branches.push((self.expression()?, self.block()?));
            } else if self.eat_keyword("else") {
                orelse = self.block()?;
                break;
            } else {
                break;
            }
        }
        Ok(Stmt::If { branches, orelse })
    }

    /// `':' simple_statements` or `':' NEWLINE INDENT statement+ DEDENT`
    fn block(&mut self) -> ScriptResult<Vec<Stmt>> {
        self.expect_op(":")?;
        self.descend()?;
        let mut body = Vec::new();
        if self.check(&Tok::Newline) {
            self.bump();
            if !self.check(&Tok::Indent) {
                return Err(self.error("expected an indented block"));
            }
            self.bump();
            while !self.check(&Tok::Dedent) && !self.check(&Tok::Eof) {
                self.statement(&mut body)?;
            }
            self.bump();
        } else {
            self.simple_statements(&mut body)?;
        }
        self.depth -= 1;
        Ok(body)
    }

    fn simple_statements(&mut self, out: &mut Vec<Stmt>) -> ScriptResult<()> {
        loop {
            out.push(self.small_statement()?);
            if !self.eat_op(";") {
                break;
            }
            if self.check(&Tok::Newline) || self.check(&Tok::Eof) {
                break;
            }
        }
        match self.current().tok {
            Tok::Newline => {
                self.bump();
                Ok(())
            }
            Tok::Eof | Tok::Dedent => Ok(()),
            _ => Err(self.unexpected()),
        }
    }

    fn small_statement(&mut self) -> ScriptResult<Stmt> {
        if let Tok::Name(word) = &self.current().tok {
            if UNSUPPORTED_KEYWORDS.contains(&word.as_str()) {
                return Err(self.error(format!("'{word}' is not supported in FSM scripts")));
            }
        }
        if self.eat_keyword("pass") {
            return Ok(Stmt::Pass);
        }
        if self.eat_keyword("break") {
            return Ok(Stmt::Break);
        }
        if self.eat_keyword("continue") {
            return Ok(Stmt::Continue);
        }
        if self.eat_keyword("import") {
            let mut modules = vec![self.import_target()?];
            while self.eat_op(",") {
                modules.push(self.import_target()?);
            }
            return Ok(Stmt::Import { modules });
        }
        if self.eat_keyword("from") {
            let module = self.dotted_name()?;
            if !self.eat_keyword("import") {
                return Err(self.error("expected 'import'"));
            }
            let mut names = Vec::new();
            if self.eat_op("*") {
                names.push("*".to_string());
            } else {
                names.push(self.import_target()?);
                while self.eat_op(",") {
                    names.push(self.import_target()?);
                }
            }
            return Ok(Stmt::ImportFrom { module, names });
        }

        let expr = self.expression()?;
        if self.eat_op("=") {
            Self::check_target(&expr).map_err(|m| self.error(m))?;
            let value = self.expression()?;
            return Ok(Stmt::Assign {
                target: expr,
                value,
            });
        }
        if let Some(op) = self.augmented_op() {
            Self::check_target(&expr).map_err(|m| self.error(m))?;
            let value = self.expression()?;
            return Ok(Stmt::AugAssign {
                target: expr,
                op,
                value,
            });
        }
        Ok(Stmt::Expr(expr))
    }

    fn import_target(&mut self) -> ScriptResult<String> {
        let name = self.dotted_name()?;
        if self.eat_keyword("as") {
            self.identifier()?;
        }
        Ok(name)
    }

    fn augmented_op(&mut self) -> Option<BinOp> {
        let op = match self.current().tok {
            Tok::Op("+=") => BinOp::Add,
            Tok::Op("-=") => BinOp::Sub,
            Tok::Op("*=") => BinOp::Mul,
            Tok::Op("/=") => BinOp::Div,
            Tok::Op("//=") => BinOp::FloorDiv,
            Tok::Op("%=") => BinOp::Mod,
            Tok::Op("**=") => BinOp::Pow,
            _ => return None,
        };
        self.bump();
        Some(op)
    }

    fn check_target(expr: &Expr) -> Result<(), &'static str> {
        match expr {
            Expr::Name(_) | Expr::Attribute { .. } | Expr::Index { .. } => Ok(()),
            _ => Err("cannot assign to expression"),
        }
    }

    // --- expressions ---

    fn expression(&mut self) -> ScriptResult<Expr> {
        self.descend()?;
        let expr = self.conditional()?;
        self.depth -= 1;
        Ok(expr)
    }

    fn conditional(&mut self) -> ScriptResult<Expr> {
        let then = self.or_test()?;
        if self.eat_keyword("if") {
            let test = self.or_test()?;
            if !self.eat_keyword("else") {
                return Err(self.error("expected 'else' in conditional expression"));
            }
            let orelse = self.expression()?;
            return Ok(Expr::IfElse {
                test: Box::new(test),
                then: Box::new(then),
                orelse: Box::new(orelse),
            });
        }
        Ok(then)
    }

    fn or_test(&mut self) -> ScriptResult<Expr> {
        let base = self.depth;
        let mut left = self.and_test()?;
        while self.eat_keyword("or") {
            self.descend()?;
            let right = self.and_test()?;
            left = Expr::Logical {
                and: false,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = base;
        Ok(left)
    }

    fn and_test(&mut self) -> ScriptResult<Expr> {
        let base = self.depth;
        let mut left = self.not_test()?;
        while self.eat_keyword("and") {
            self.descend()?;
            let right = self.not_test()?;
            left = Expr::Logical {
                and: true,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = base;
        Ok(left)
    }

    fn not_test(&mut self) -> ScriptResult<Expr> {
        if self.eat_keyword("not") {
            self.descend()?;
            let operand = self.not_test()?;
            self.depth -= 1;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ScriptResult<Expr> {
        let left = self.arith()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op() {
            rest.push((op, self.arith()?));
        }
        if rest.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                rest,
            })
        }
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let tok = self.current().tok.clone();
        let op = match &tok {
            Tok::Op("==") => CmpOp::Eq,
            Tok::Op("!=") => CmpOp::NotEq,
            Tok::Op("<") => CmpOp::Lt,
            Tok::Op("<=") => CmpOp::LtE,
            Tok::Op(">") => CmpOp::Gt,
            Tok::Op(">=") => CmpOp::GtE,
            Tok::Name(n) if n == "in" => CmpOp::In,
            Tok::Name(n) if n == "is" => {
                self.bump();
                return Some(if self.eat_keyword("not") {
                    CmpOp::IsNot
                } else {
                    CmpOp::Is
                });
            }
            Tok::Name(n) if n == "not" => {
                let next_is_in = matches!(
                    self.tokens.get(self.pos + 1).map(|t| &t.tok),
                    Some(Tok::Name(m)) if m == "in"
                );
                if !next_is_in {
                    return None;
                }
                self.bump();
                CmpOp::NotIn
            }
            _ => return None,
        };
        self.bump();
        Some(op)
    }

    fn arith(&mut self) -> ScriptResult<Expr> {
        let base = self.depth;
        let mut left = self.term()?;
        loop {
            let op = if self.eat_op("+") {
                BinOp::Add
            } else if self.eat_op("-") {
                BinOp::Sub
            } else {
                break;
            };
            self.descend()?;
            let right = self.term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = base;
        Ok(left)
    }

    fn term(&mut self) -> ScriptResult<Expr> {
        let base = self.depth;
        let mut left = self.factor()?;
        loop {
            let op = if self.eat_op("*") {
                BinOp::Mul
            } else if self.eat_op("/") {
                BinOp::Div
            } else if self.eat_op("//") {
                BinOp::FloorDiv
            } else if self.eat_op("%") {
                BinOp::Mod
            } else {
                break;
            };
            self.descend()?;
            let right = self.factor()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = base;
        Ok(left)
    }

    fn factor(&mut self) -> ScriptResult<Expr> {
        let op = if self.eat_op("-") {
            UnaryOp::Neg
        } else if self.eat_op("+") {
            UnaryOp::Pos
        } else {
            return self.power();
        };
        self.descend()?;
        let operand = self.factor()?;
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn power(&mut self) -> ScriptResult<Expr> {
        let base = self.postfix()?;
        if self.eat_op("**") {
            self.descend()?;
            let exponent = self.factor()?;
            self.depth -= 1;
            return Ok(Expr::Binary {
                op: BinOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn postfix(&mut self) -> ScriptResult<Expr> {
        let base = self.depth;
        let mut expr = self.atom()?;
        loop {
            if matches!(self.current().tok, Tok::Op("(" | "[" | ".")) {
                self.descend()?;
            }
            if self.eat_op("(") {
                let args = self.sequence(")")?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                };
            } else if self.eat_op("[") {
                let index = self.expression()?;
                self.expect_op("]")?;
                expr = Expr::Index {
                    value: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat_op(".") {
                let attr = match self.bump() {
                    Tok::Name(n) => n,
                    _ => return Err(self.error("expected attribute name after '.'")),
                };
                expr = Expr::Attribute {
                    value: Box::new(expr),
                    attr,
                };
            } else {
                self.depth = base;
                return Ok(expr);
            }
        }
    }

    /// Comma-separated expressions up to `close`, trailing comma allowed.
    fn sequence(&mut self, close: &str) -> ScriptResult<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.eat_op(close) {
            items.push(self.expression()?);
            if !self.eat_op(",") {
                self.expect_op(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn atom(&mut self) -> ScriptResult<Expr> {
        let tok = self.current().tok.clone();
        let expr = match tok {
            Tok::Int(i) => Expr::Literal(Literal::Int(i)),
            Tok::Float(x) => Expr::Literal(Literal::Float(x)),
            Tok::Str(s) => {
                self.bump();
                let mut text = s;
                while let Tok::Str(next) = &self.current().tok {
                    text.push_str(next);
                    self.bump();
                }
                return Ok(Expr::Literal(Literal::Str(text)));
            }
            Tok::Name(n) => match n.as_str() {
                "True" => Expr::Literal(Literal::Bool(true)),
                "False" => Expr::Literal(Literal::Bool(false)),
                "None" => Expr::Literal(Literal::None),
                word if RESERVED.contains(&word) || UNSUPPORTED_KEYWORDS.contains(&word) => {
                    return Err(self.unexpected())
                }
                _ => Expr::Name(n),
            },
            Tok::Op("(") => {
                self.bump();
                if self.eat_op(")") {
                    return Ok(Expr::List(Vec::new()));
                }
                let inner = self.expression()?;
                if self.eat_op(",") {
                    // Tuple displays evaluate to lists.
                    let mut items = vec![inner];
                    items.extend(self.sequence(")")?);
                    return Ok(Expr::List(items));
                }
                self.expect_op(")")?;
                return Ok(inner);
            }
            Tok::Op("[") => {
                self.bump();
                return Ok(Expr::List(self.sequence("]")?));
            }
            Tok::Op("{") => {
                self.bump();
                return self.dict();
            }
            _ => return Err(self.unexpected()),
        };
        self.bump();
        Ok(expr)
    }

    fn dict(&mut self) -> ScriptResult<Expr> {
        let mut pairs = Vec::new();
        while !self.eat_op("}") {
            let key = self.expression()?;
            self.expect_op(":")?;
            let value = self.expression()?;
            pairs.push((key, value));
            if !self.eat_op(",") {
                self.expect_op("}")?;
                break;
            }
        }
        Ok(Expr::Dict(pairs))
    }
}
