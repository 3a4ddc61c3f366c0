// program    ::= block '.'
// block      ::= ['const' ID '=' NUMBER (',' ID '=' NUMBER)* ';']
//                ['var' ID (',' ID)* ';']
//                ('procedure' ID ';' block ';')*
//                stmt
// stmt       ::= ID ':=' expr
//              | 'call' ID
//              | '?' ID
//              | '!' expr
//              | 'begin' stmt (';' stmt)* 'end'
//              | 'if' condition 'then' stmt
//              | 'while' condition 'do' stmt
// condition  ::= 'odd' expr
//              | expr ('=' | '#' | '<' | '<=' | '>' | '>=') expr
// expr       ::= ['+' | '-'] term (('+' | '-') term)*
// term       ::= factor (('*' | '/') factor)*
// factor     ::= ID | NUMBER | '(' expr ')'

use crate::{token::Span, util::intern::Interned};

#[derive(Debug, PartialEq)]
pub struct Program {
    pub block: Block,
}

/// The unit of scoping. A block always has a body statement.
#[derive(Debug, PartialEq)]
pub struct Block {
    /// Empty if the block has no `const` section.
    pub consts: Vec<ConstDecl>,
    /// Empty if the block has no `var` section.
    pub vars: Vec<Ident>,
    pub procedures: Vec<Procedure>,
    pub body: Stmt,
}

#[derive(Debug, PartialEq)]
pub struct ConstDecl {
    pub name: Ident,
    pub value: i32,
}

/// Procedures take no parameters and return nothing.
#[derive(Debug, PartialEq)]
pub struct Procedure {
    pub name: Ident,
    pub body: Block,
}

#[derive(Debug, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum StmtKind {
    Assign {
        target: Ident,
        value: Expr,
    },
    Call(Ident),
    Input(Ident),
    Print(Expr),
    /// Non empty list of statements.
    Begin(Vec<Stmt>),
    If {
        condition: Expr,
        body: Box<Stmt>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Odd(Box<Expr>),
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOperator,
        expr: Box<Expr>,
    },
    Id(Ident),
    Int(i32),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Minus,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub name: Interned<str>,
    pub span: Span,
}

impl From<Ident> for Interned<str> {
    fn from(value: Ident) -> Self {
        value.name
    }
}

impl From<&Ident> for Interned<str> {
    fn from(value: &Ident) -> Self {
        value.name
    }
}
