//! The abstract syntax tree.

use crate::common::{Id, NodeId, Span};
use crate::front::types::Type;

#[derive(Debug)]
pub struct CompUnit {
    pub items: Vec<Item>,
}

#[derive(Debug)]
pub enum Item {
    VarDecl(VarDecl),
    FuncDef(FuncDef),
}

#[derive(Debug)]
pub struct VarDecl {
    pub id: NodeId,
    pub is_const: bool,
    pub ty: Type,
    pub name: Id,
    pub dims: Vec<Expr>,
    pub init: Option<Init>,
    pub span: Span,
}

#[derive(Debug)]
pub enum Init {
    Expr(Expr),
    List(Vec<Init>),
}

#[derive(Debug)]
pub struct FuncDef {
    pub ret: Type,
    pub name: Id,
    pub params: Vec<Param>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug)]
pub struct Param {
    pub id: NodeId,
    pub ty: Type,
    pub name: Id,
    /// First dimension `None` marks a decayed pointer parameter (`int a[]`);
    /// later dimensions must be sized.
    pub array_dims: Vec<Option<Expr>>,
    pub span: Span,
}

#[derive(Debug)]
pub struct Block(pub Vec<Stmt>);

#[derive(Debug)]
pub enum Stmt {
    Block(Block),
    Expr(Option<Expr>),
    VarDecl(VarDecl),
    Assign(Expr, Expr),
    If {
        cond: Expr,
        then: Box<Stmt>,
        els: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Break(Span),
    Continue(Span),
    Return(Option<Expr>, Span),
}

#[derive(Debug)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug)]
pub enum ExprKind {
    ConstInt(i32),
    Ident(Id),
    Unary {
        op: UnaryOp,
        rhs: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        name: Id,
        args: Vec<Expr>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Plus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl BinaryOp {
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le | BinaryOp::Eq | BinaryOp::Ne
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}
