//! The Eeyore data model: a three-address IR with explicit labels and
//! `goto`s. Field names on statement variants are load-bearing — the
//! generator, rearranger, jump cleaner, CFG builder, and printer all pattern
//! match on them directly.

use derive_more::Display;

use crate::common::Id;

/// An Eeyore operand. Equality and hashing ignore `OrigVar`'s `size` — it is
/// informational only, carried so the generator and allocator don't need a
/// side lookup to learn a variable's byte size.
#[derive(Clone, Copy, Debug)]
pub enum Operand {
    Imm(i32),
    OrigVar { id: u32, size: i32 },
    TempVar { id: u32 },
    Param { id: u32 },
}

impl Operand {
    pub fn is_imm(&self) -> bool {
        matches!(self, Operand::Imm(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Operand::OrigVar { size, .. } if *size > crate::common::WORD_SIZE)
    }
}

impl PartialEq for Operand {
    fn eq(&self, other: &Self) -> bool {
        use Operand::*;
        match (self, other) {
            (Imm(a), Imm(b)) => a == b,
            (OrigVar { id: a, .. }, OrigVar { id: b, .. }) => a == b,
            (TempVar { id: a }, TempVar { id: b }) => a == b,
            (Param { id: a }, Param { id: b }) => a == b,
            _ => false,
        }
    }
}
impl Eq for Operand {}

impl std::hash::Hash for Operand {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Operand::Imm(v) => {
                0u8.hash(state);
                v.hash(state);
            }
            Operand::OrigVar { id, .. } => {
                1u8.hash(state);
                id.hash(state);
            }
            Operand::TempVar { id } => {
                2u8.hash(state);
                id.hash(state);
            }
            Operand::Param { id } => {
                3u8.hash(state);
                id.hash(state);
            }
        }
    }
}

impl PartialOrd for Operand {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Operand {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        fn rank(o: &Operand) -> (u8, i64) {
            match o {
                Operand::Imm(v) => (0, *v as i64),
                Operand::OrigVar { id, .. } => (1, *id as i64),
                Operand::TempVar { id } => (2, *id as i64),
                Operand::Param { id } => (3, *id as i64),
            }
        }
        rank(self).cmp(&rank(other))
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Imm(v) => write!(f, "{v}"),
            Operand::OrigVar { id, .. } => write!(f, "T{id}"),
            Operand::TempVar { id } => write!(f, "t{id}"),
            Operand::Param { id } => write!(f, "p{id}"),
        }
    }
}

/// Relational operators usable in `CondGoto`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum RelOp {
    #[display("==")]
    Eq,
    #[display("!=")]
    Ne,
    #[display("<")]
    Lt,
    #[display(">")]
    Gt,
    #[display("<=")]
    Le,
    #[display(">=")]
    Ge,
}

impl RelOp {
    pub fn negate(self) -> RelOp {
        match self {
            RelOp::Eq => RelOp::Ne,
            RelOp::Ne => RelOp::Eq,
            RelOp::Lt => RelOp::Ge,
            RelOp::Gt => RelOp::Le,
            RelOp::Le => RelOp::Gt,
            RelOp::Ge => RelOp::Lt,
        }
    }

    pub fn from_ast(op: crate::front::ast::BinaryOp) -> Option<RelOp> {
        use crate::front::ast::BinaryOp as B;
        Some(match op {
            B::Eq => RelOp::Eq,
            B::Ne => RelOp::Ne,
            B::Lt => RelOp::Lt,
            B::Gt => RelOp::Gt,
            B::Le => RelOp::Le,
            B::Ge => RelOp::Ge,
            _ => return None,
        })
    }
}

/// Binary operators usable in a `BinaryOp` statement: arithmetic plus
/// relational (relational ones produce a 0/1 int, distinct from `CondGoto`
/// which jumps on them directly).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum BinOp {
    #[display("+")]
    Add,
    #[display("-")]
    Sub,
    #[display("*")]
    Mul,
    #[display("/")]
    Div,
    #[display("%")]
    Mod,
    #[display("==")]
    Eq,
    #[display("!=")]
    Ne,
    #[display("<")]
    Lt,
    #[display(">")]
    Gt,
    #[display("<=")]
    Le,
    #[display(">=")]
    Ge,
}

impl BinOp {
    pub fn from_ast(op: crate::front::ast::BinaryOp) -> BinOp {
        use crate::front::ast::BinaryOp as B;
        match op {
            B::Add => BinOp::Add,
            B::Sub => BinOp::Sub,
            B::Mul => BinOp::Mul,
            B::Div => BinOp::Div,
            B::Mod => BinOp::Mod,
            B::Eq => BinOp::Eq,
            B::Ne => BinOp::Ne,
            B::Lt => BinOp::Lt,
            B::Gt => BinOp::Gt,
            B::Le => BinOp::Le,
            B::Ge => BinOp::Ge,
            B::And | B::Or => unreachable!("short-circuit ops never become a BinaryOp statement"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum UnOp {
    #[display("-")]
    Neg,
    #[display("!")]
    Not,
}

/// A single Eeyore statement.
#[derive(Clone, Debug)]
pub enum Stmt {
    Decl { var: Operand },
    FuncDef { name: Id, arg_cnt: u32 },
    EndFuncDef { name: Id },
    Param { value: Operand },
    FuncCall { name: Id, receiver: Option<Operand> },
    Ret { value: Option<Operand> },
    Goto { label: u32 },
    CondGoto { op: RelOp, lhs: Operand, rhs: Operand, label: u32 },
    UnaryOp { dst: Operand, op: UnOp, src: Operand },
    BinaryOp { dst: Operand, op: BinOp, lhs: Operand, rhs: Operand },
    Move { dst: Operand, src: Operand },
    ReadArr { dst: Operand, arr: Operand, idx: Operand },
    WriteArr { arr: Operand, idx: Operand, src: Operand },
    Label { id: u32 },
}

impl Stmt {
    /// Variables used (read) by this statement, constants filtered out.
    /// `FuncCall`'s globals-clobbering effect is handled by the dataflow
    /// pass directly, not exposed here.
    pub fn used(&self) -> Vec<Operand> {
        let mut out = vec![];
        let mut push = |o: Operand| {
            if !o.is_imm() {
                out.push(o);
            }
        };
        match self {
            Stmt::Param { value } => push(*value),
            Stmt::Ret { value: Some(v) } => push(*v),
            Stmt::CondGoto { lhs, rhs, .. } => {
                push(*lhs);
                push(*rhs);
            }
            Stmt::UnaryOp { src, .. } => push(*src),
            Stmt::BinaryOp { lhs, rhs, .. } => {
                push(*lhs);
                push(*rhs);
            }
            Stmt::Move { src, .. } => push(*src),
            Stmt::ReadArr { arr, idx, .. } => {
                push(*arr);
                push(*idx);
            }
            Stmt::WriteArr { arr, idx, src } => {
                push(*arr);
                push(*idx);
                push(*src);
            }
            _ => {}
        }
        out
    }

    /// Variables defined (written) by this statement. `WriteArr` writes
    /// through `arr`, a pointer/base value, but does not redefine it — the
    /// array operand is a use, handled above, not a def.
    pub fn defined(&self) -> Vec<Operand> {
        match self {
            Stmt::Decl { var } => vec![*var],
            Stmt::FuncCall {
                receiver: Some(r), ..
            } => vec![*r],
            Stmt::UnaryOp { dst, .. } => vec![*dst],
            Stmt::BinaryOp { dst, .. } => vec![*dst],
            Stmt::Move { dst, .. } => vec![*dst],
            Stmt::ReadArr { dst, .. } => vec![*dst],
            _ => vec![],
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Stmt::FuncCall { .. })
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, Stmt::Goto { .. } | Stmt::CondGoto { .. } | Stmt::Ret { .. })
    }
}

pub type Code = Vec<Stmt>;
