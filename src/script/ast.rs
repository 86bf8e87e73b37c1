//! Syntax tree for the embedded scripting subset.

/// A parsed script: a sequence of statements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    pub body: Vec<Stmt>,
}

impl Program {
    /// The single expression of a condition script, if that is all it is.
    pub fn as_expression(&self) -> Option<&Expr> {
        match self.body.as_slice() {
            [Stmt::Expr(expr)] => Some(expr),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Assign {
        target: Expr,
        value: Expr,
    },
    AugAssign {
        target: Expr,
        op: BinOp,
        value: Expr,
    },
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
    },
    For {
        var: String,
        iter: Expr,
        body: Vec<Stmt>,
    },
    /// `import a, b`
    Import {
        modules: Vec<String>,
    },
    /// `from a import b, c`
    ImportFrom {
        module: String,
        names: Vec<String>,
    },
    Pass,
    Break,
    Continue,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Name(String),
    List(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Short-circuit `and` / `or`
    Logical {
        and: bool,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Chained comparison: `a < b <= c`
    Compare {
        left: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
    },
    IfElse {
        test: Box<Expr>,
        then: Box<Expr>,
        orelse: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Index {
        value: Box<Expr>,
        index: Box<Expr>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

/// Read-only traversal over a [`Program`].
///
/// Implementors override the hooks they care about; the `walk_*` functions
/// descend into children so a hook can call them to keep visiting.
pub trait Visitor {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

pub fn walk_program<V: Visitor + ?Sized>(visitor: &mut V, program: &Program) {
    for stmt in &program.body {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Stmt) {
    match stmt {
        Stmt::Expr(expr) => visitor.visit_expr(expr),
        Stmt::Assign { target, value } | Stmt::AugAssign { target, value, .. } => {
            visitor.visit_expr(target);
            visitor.visit_expr(value);
        }
        Stmt::If { branches, orelse } => {
            for (test, body) in branches {
                visitor.visit_expr(test);
                body.iter().for_each(|s| visitor.visit_stmt(s));
            }
            orelse.iter().for_each(|s| visitor.visit_stmt(s));
        }
        Stmt::While { test, body } => {
            visitor.visit_expr(test);
            body.iter().for_each(|s| visitor.visit_stmt(s));
        }
        Stmt::For { iter, body, .. } => {
            visitor.visit_expr(iter);
            body.iter().for_each(|s| visitor.visit_stmt(s));
        }
        Stmt::Import { .. }
        | Stmt::ImportFrom { .. }
        | Stmt::Pass
        | Stmt::Break
        | Stmt::Continue => {}
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expr) {
    match expr {
        Expr::Literal(_) | Expr::Name(_) => {}
        Expr::List(items) => items.iter().for_each(|e| visitor.visit_expr(e)),
        Expr::Dict(pairs) => {
            for (k, v) in pairs {
                visitor.visit_expr(k);
                visitor.visit_expr(v);
            }
        }
        Expr::Unary { operand, .. } => visitor.visit_expr(operand),
        Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        Expr::Compare { left, rest } => {
            visitor.visit_expr(left);
            rest.iter().for_each(|(_, e)| visitor.visit_expr(e));
        }
        Expr::IfElse { test, then, orelse } => {
            visitor.visit_expr(test);
            visitor.visit_expr(then);
            visitor.visit_expr(orelse);
        }
        Expr::Call { func, args } => {
            visitor.visit_expr(func);
            args.iter().for_each(|a| visitor.visit_expr(a));
        }
        Expr::Attribute { value, .. } => visitor.visit_expr(value),
        Expr::Index { value, index } => {
            visitor.visit_expr(value);
            visitor.visit_expr(index);
        }
    }
}
