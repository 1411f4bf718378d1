//! Syntax tree for the script dialect
//!
//! Everything is immutable once parsed and built from `Arc` and `Box`, so a
//! parsed function can be shared between threads and rendered concurrently.

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeclKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    String(Arc<str>),
    Bool(bool),
    Null,
    This,
    Ident(Arc<str>),
    Array(Vec<Expr>),
    Object(Vec<(Arc<str>, Expr)>),
    Function(Arc<FunctionExpr>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    /// `++` and `--`
    Update {
        increment: bool,
        prefix: bool,
        target: Box<Expr>,
    },
    /// A left-associative run such as `a + b - c`, applied in order to `lhs`
    Binary {
        lhs: Box<Expr>,
        rest: Vec<(BinaryOp, Expr)>,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `op` is set for compound assignment such as `+=`
    Assign {
        op: Option<BinaryOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: Arc<str>,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub(crate) fn is_assignable(&self) -> bool {
        matches!(self, Expr::Ident(_) | Expr::Member { optional: false, .. } | Expr::Index { optional: false, .. })
    }

    /// Short description used in error messages, such as `user.name`
    pub(crate) fn describe(&self) -> String {
        match self {
            Expr::Ident(name) => name.to_string(),
            Expr::This => "this".to_string(),
            Expr::Member { object, property, .. } => format!("{}.{property}", object.describe()),
            Expr::Index { object, .. } => format!("{}[...]", object.describe()),
            Expr::Call { callee, .. } => format!("{}(...)", callee.describe()),
            _ => "expression".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    Declare {
        kind: DeclKind,
        decls: Vec<(Arc<str>, Option<Expr>)>,
    },
    /// A function declaration, bound when its block is entered
    Function(Arc<FunctionExpr>),
    Expr(Expr),
    If {
        test: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    ForOf {
        kind: Option<DeclKind>,
        name: Arc<str>,
        iterable: Expr,
        body: Box<Stmt>,
    },
    ForIn {
        kind: Option<DeclKind>,
        name: Arc<str>,
        object: Expr,
        body: Box<Stmt>,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
    },
    Block(Vec<Stmt>),
    With {
        object: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Throw(Expr),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FunctionExpr {
    pub name: Option<Arc<str>>,
    pub params: Vec<Arc<str>>,
    pub body: Vec<Stmt>,
    /// Names declared with `var` anywhere in the body, outside nested functions
    pub vars: Vec<Arc<str>>,
    /// Arrow functions take `this` and `arguments` from where they are defined
    pub arrow: bool,
}
