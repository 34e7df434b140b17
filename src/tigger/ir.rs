//! The Tigger data model: a register-machine IR. Every Eeyore operand has
//! been resolved to a register, a stack slot, or a global-variable address
//! by the time a statement reaches this stage.

use crate::common::Id;
use crate::eeyore::ir::{BinOp, RelOp, UnOp};

pub const CALLEE_SAVED_CNT: u32 = 12;
pub const CALLER_SAVED_CNT: u32 = 7;
pub const ARG_REG_CNT: u32 = 8;

/// A Tigger register. Each kind has its own small id space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Reg {
    Zero,
    CalleeSaved(u32),
    CallerSaved(u32),
    Arg(u32),
}

impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reg::Zero => write!(f, "x0"),
            Reg::CalleeSaved(id) => write!(f, "s{id}"),
            Reg::CallerSaved(id) => write!(f, "t{id}"),
            Reg::Arg(id) => write!(f, "a{id}"),
        }
    }
}

/// A register or an immediate, used where Tigger allows either (`opr2` of a
/// binary op, `Move.src`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegOrNum {
    Num(i32),
    Reg(Reg),
}

impl std::fmt::Display for RegOrNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegOrNum::Num(n) => write!(f, "{n}"),
            RegOrNum::Reg(r) => write!(f, "{r}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalVar(pub u32);

impl std::fmt::Display for GlobalVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlobalVarOrNum {
    Num(i32),
    Global(GlobalVar),
}

impl std::fmt::Display for GlobalVarOrNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlobalVarOrNum::Num(n) => write!(f, "{n}"),
            GlobalVarOrNum::Global(g) => write!(f, "{g}"),
        }
    }
}

/// A register-machine statement.
#[derive(Clone, Debug)]
pub enum Stmt {
    GlobalVarDecl { var: GlobalVar, initial: i32 },
    GlobalArrDecl { var: GlobalVar, bytes: i32 },
    FuncHeader { name: Id, arg_cnt: u32, stack_size: i32 },
    FuncEnd { name: Id },
    UnaryOp { dst: Reg, op: UnOp, src: Reg },
    BinaryOp { dst: Reg, op: BinOp, lhs: Reg, rhs: RegOrNum },
    Move { dst: Reg, src: RegOrNum },
    ReadArr { dst: Reg, arr: Reg, idx: i32 },
    WriteArr { arr: Reg, idx: i32, src: Reg },
    CondGoto { op: RelOp, lhs: Reg, rhs: Reg, label: u32 },
    Goto { label: u32 },
    Label { id: u32 },
    FuncCall { name: Id },
    Return,
    /// `slot` is a word-index into the current function's spill area.
    Store { slot: i32, src: Reg },
    Load { dst: Reg, src: GlobalVarOrNum },
    LoadAddr { dst: Reg, src: GlobalVarOrNum },
}

pub type Code = Vec<Stmt>;
