// program ::= stmt*
// stmt ::= exit '(' expr ')' ';'
//        | let ID '=' expr ';'
//        | ID '=' expr ';'
//        | scope
//        | if '(' expr ')' scope (elif '(' expr ')' scope)* [else scope]
// scope ::= '{' stmt* '}'
// expr ::= expr '+' expr
//        | expr '-' expr
//        | expr '*' expr
//        | expr '/' expr
//        | '(' expr ')'
//        | ID
//        | integer

// Precedence
//
// * /
// + -

use crate::{token::Span, util::intern::Symbol};

#[derive(Debug, PartialEq, Default)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum StmtKind {
    Exit(Expr),
    Let {
        name: Ident,
        initializer: Expr,
    },
    Assign {
        target: Ident,
        value: Expr,
    },
    Scope(Scope),
    If {
        /// Non empty list of conditional arms. The first one is the `if` arm,
        /// the remaining ones are the `elif` arms, in source order.
        branches: Vec<Branch>,
        else_arm: Option<Scope>,
    },
}

#[derive(Debug, PartialEq)]
pub struct Scope {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub struct Branch {
    pub predicate: Expr,
    pub body: Scope,
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Paren(Box<Expr>),
    Id(Ident),
    Int(i64),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOperator {
    /// Binding precedence; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Add | BinaryOperator::Sub => 0,
            BinaryOperator::Mul | BinaryOperator::Div => 1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub name: Symbol,
    pub span: Span,
}

impl From<Ident> for Symbol {
    fn from(value: Ident) -> Self {
        value.name
    }
}

impl From<&Ident> for Symbol {
    fn from(value: &Ident) -> Self {
        value.name
    }
}
