//! Builds a control-flow graph over a finished Eeyore statement list.
//!
//! Block 0 holds the leading global `Decl`s and has no successors. Every
//! other block begins at a `Label` or `FuncDef` and ends after a
//! terminating `Goto`/`CondGoto`/`Ret` (the latter absorbing a trailing
//! `EndFuncDef`), or just before the next `Label`.

use crate::common::Map;
use crate::eeyore::ir::{Code, Operand, Stmt};
use crate::util::Bitmap;

#[derive(Clone, Debug)]
pub struct BasicBlock {
    pub id: usize,
    pub begin_stmt_id: usize,
    /// Exclusive.
    pub end_stmt_id: usize,
    pub live_gen: Bitmap,
    pub live_kill: Bitmap,
    pub live_in: Bitmap,
    pub live_out: Bitmap,
}

impl BasicBlock {
    pub fn back_stmt_id(&self) -> usize {
        self.end_stmt_id - 1
    }

    pub fn stmts<'a>(&self, code: &'a Code) -> &'a [Stmt] {
        &code[self.begin_stmt_id..self.end_stmt_id]
    }
}

pub struct Cfg {
    pub blocks: Vec<BasicBlock>,
    pub successors: Vec<Vec<usize>>,
    pub func_starts: Vec<usize>,
    pub global_vars: Vec<Operand>,
    pub defined_vars: Vec<Operand>,
    pub defined_var_idx: Map<Operand, usize>,
}

impl Cfg {
    pub fn is_global(&self, op: Operand) -> bool {
        self.global_vars.contains(&op)
    }
}

pub fn build(code: &Code, defined_vars: Vec<Operand>) -> Cfg {
    let defined_var_idx: Map<Operand, usize> =
        defined_vars.iter().enumerate().map(|(i, &o)| (o, i)).collect();

    let mut blocks: Vec<BasicBlock> = vec![];
    let mut label_to_block: Map<u32, usize> = Map::new();
    let mut func_starts = vec![];
    let mut global_vars = vec![];

    let mut pos = 0usize;
    let mut next_id = 0usize;

    // Block 0: leading global decls.
    let global_begin = pos;
    while let Some(Stmt::Decl { var }) = code.get(pos) {
        global_vars.push(*var);
        pos += 1;
    }
    blocks.push(new_block(next_id, global_begin, pos, defined_vars.len()));
    next_id += 1;

    while pos < code.len() {
        let begin = pos;
        let id = next_id;
        next_id += 1;

        if let Stmt::Label { id: label_id } = &code[pos] {
            label_to_block.insert(*label_id, id);
            pos += 1;
        } else if matches!(code[pos], Stmt::FuncDef { .. }) {
            func_starts.push(id);
        }

        while pos < code.len() {
            match &code[pos] {
                Stmt::Label { .. } => break,
                Stmt::Goto { .. } | Stmt::CondGoto { .. } => {
                    pos += 1;
                    break;
                }
                Stmt::Ret { .. } => {
                    pos += 1;
                    if matches!(code.get(pos), Some(Stmt::EndFuncDef { .. })) {
                        pos += 1;
                    }
                    break;
                }
                _ => pos += 1,
            }
        }

        blocks.push(new_block(id, begin, pos, defined_vars.len()));
    }

    let mut successors = vec![vec![]; blocks.len()];
    for block in blocks.iter().skip(1) {
        let last = &code[block.back_stmt_id()];
        match last {
            Stmt::Goto { label } => {
                successors[block.id].push(label_to_block[label]);
            }
            Stmt::CondGoto { label, .. } => {
                let when_true = label_to_block[label];
                let when_false = block.id + 1;
                successors[block.id].push(when_true);
                if when_true != when_false {
                    successors[block.id].push(when_false);
                }
            }
            Stmt::EndFuncDef { .. } | Stmt::Ret { .. } => {}
            _ => {
                if block.id + 1 < blocks.len() {
                    successors[block.id].push(block.id + 1);
                }
            }
        }
    }

    Cfg {
        blocks,
        successors,
        func_starts,
        global_vars,
        defined_vars,
        defined_var_idx,
    }
}

fn new_block(id: usize, begin: usize, end: usize, var_cnt: usize) -> BasicBlock {
    BasicBlock {
        id,
        begin_stmt_id: begin,
        end_stmt_id: end,
        live_gen: Bitmap::new(var_cnt),
        live_kill: Bitmap::new(var_cnt),
        live_in: Bitmap::new(var_cnt),
        live_out: Bitmap::new(var_cnt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::intern;
    use crate::eeyore::ir::RelOp;

    fn t(id: u32) -> Operand {
        Operand::TempVar { id }
    }

    #[test]
    fn splits_on_label_and_terminator() {
        let main = intern("f_main");
        let code = vec![
            Stmt::FuncDef { name: main, arg_cnt: 0 },
            Stmt::Move { dst: t(0), src: Operand::Imm(1) },
            Stmt::CondGoto {
                op: RelOp::Eq,
                lhs: t(0),
                rhs: Operand::Imm(1),
                label: 0,
            },
            Stmt::Ret { value: Some(Operand::Imm(0)) },
            Stmt::Label { id: 0 },
            Stmt::Ret { value: Some(Operand::Imm(1)) },
            Stmt::EndFuncDef { name: main },
        ];
        let cfg = build(&code, vec![t(0)]);
        // block 0 = globals (empty), block 1 = FuncDef..CondGoto,
        // block 2 = Ret, block 3 = Label..EndFuncDef
        assert_eq!(cfg.blocks.len(), 4);
        assert_eq!(cfg.func_starts, vec![1]);
        assert!(cfg.successors[1].contains(&3));
        assert!(cfg.successors[1].contains(&2));
        assert!(cfg.successors[2].is_empty());
    }
}
