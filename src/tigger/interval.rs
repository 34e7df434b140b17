//! Builds per-function live intervals from the CFG's live-out sets, by
//! scanning blocks backward within each function and statements backward
//! within each block.

use crate::common::Set;
use crate::eeyore::ir::{Code, Operand, Stmt};
use crate::tigger::ir::Reg;

use super::cfg::Cfg;

#[derive(Clone, Debug)]
pub struct LiveInterval {
    pub opr: Operand,
    pub begin: i64,
    pub back: i64,
    pub cross_func_call: bool,
    pub pre_assigned_reg: Option<Reg>,
    pub reg: Option<Reg>,
    pub stack_loc: Option<i32>,
}

impl LiveInterval {
    fn empty(opr: Operand) -> Self {
        LiveInterval {
            opr,
            begin: -1,
            back: -1,
            cross_func_call: false,
            pre_assigned_reg: None,
            reg: None,
            stack_loc: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.begin == -1
    }

    fn add_range(&mut self, begin: i64, end: i64) {
        if self.is_empty() {
            self.begin = begin;
            self.back = end;
        } else {
            self.begin = self.begin.min(begin);
            self.back = self.back.max(end);
        }
    }

    fn set_begin(&mut self, begin: i64) {
        if !self.is_empty() {
            if begin > self.back {
                self.begin = -1;
                self.back = -1;
            } else {
                self.begin = begin;
            }
        }
    }
}

/// One function's intervals, sorted ascending by `begin`.
pub struct FuncIntervals {
    pub func_start_block: usize,
    pub intervals: Vec<LiveInterval>,
}

pub fn build(cfg: &Cfg, code: &Code) -> Vec<FuncIntervals> {
    let mut result = vec![];

    for (fi, &start_block) in cfg.func_starts.iter().enumerate() {
        let end_block = cfg
            .func_starts
            .get(fi + 1)
            .copied()
            .unwrap_or(cfg.blocks.len());

        let mut intervals: Vec<LiveInterval> = cfg
            .defined_vars
            .iter()
            .map(|&o| LiveInterval::empty(o))
            .collect();
        let mut call_ids: Set<i64> = Set::new();

        for block_id in (start_block..end_block).rev() {
            let block = &cfg.blocks[block_id];
            for idx in block.live_out.iter_set() {
                intervals[idx].add_range(block.begin_stmt_id as i64, block.back_stmt_id() as i64);
            }

            for (offset, stmt) in block.stmts(code).iter().enumerate().rev() {
                let stmt_id = (block.begin_stmt_id + offset) as i64;

                if let Stmt::FuncCall { .. } = stmt {
                    call_ids.insert(stmt_id);
                    for g in &cfg.global_vars {
                        if let Some(&idx) = cfg.defined_var_idx.get(g) {
                            intervals[idx].set_begin(stmt_id);
                        }
                    }
                    continue;
                }

                for def in stmt.defined() {
                    if let Some(&idx) = cfg.defined_var_idx.get(&def) {
                        intervals[idx].set_begin(stmt_id);
                    }
                }
                for used in stmt.used() {
                    if let Some(&idx) = cfg.defined_var_idx.get(&used) {
                        intervals[idx].add_range(block.begin_stmt_id as i64, stmt_id);
                    }
                }
            }
        }

        for interval in intervals.iter_mut() {
            if interval.is_empty() {
                continue;
            }
            interval.cross_func_call = call_ids
                .iter()
                .any(|&c| c >= interval.begin && c <= interval.back);
        }

        let mut live: Vec<LiveInterval> = intervals.into_iter().filter(|i| !i.is_empty()).collect();
        live.sort_by_key(|i| i.begin);

        result.push(FuncIntervals {
            func_start_block: start_block,
            intervals: live,
        });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::intern;
    use crate::eeyore::ir::RelOp;
    use crate::tigger::cfg;

    fn t(id: u32) -> Operand {
        Operand::TempVar { id }
    }

    #[test]
    fn call_crossing_interval_is_flagged() {
        let main = intern("f_main");
        let code = vec![
            Stmt::FuncDef { name: main, arg_cnt: 0 },
            Stmt::Move { dst: t(0), src: Operand::Imm(1) },
            Stmt::Param { value: t(0) },
            Stmt::FuncCall { name: intern("f_putint"), receiver: None },
            Stmt::Ret { value: Some(t(0)) },
            Stmt::EndFuncDef { name: main },
        ];
        let mut g = cfg::build(&code, vec![t(0)]);
        super::super::liveness::compute(&mut g, &code);
        let funcs = build(&g, &code);
        let iv = &funcs[0].intervals[0];
        assert!(iv.cross_func_call);
    }

    #[test]
    fn non_crossing_interval_short() {
        let main = intern("f_main");
        let code = vec![
            Stmt::FuncDef { name: main, arg_cnt: 0 },
            Stmt::Move { dst: t(0), src: Operand::Imm(1) },
            Stmt::CondGoto {
                op: RelOp::Eq,
                lhs: t(0),
                rhs: Operand::Imm(0),
                label: 0,
            },
            Stmt::Ret { value: Some(Operand::Imm(0)) },
            Stmt::Label { id: 0 },
            Stmt::Ret { value: Some(Operand::Imm(1)) },
            Stmt::EndFuncDef { name: main },
        ];
        let mut g = cfg::build(&code, vec![t(0)]);
        super::super::liveness::compute(&mut g, &code);
        let funcs = build(&g, &code);
        let iv = &funcs[0].intervals[0];
        assert!(!iv.cross_func_call);
    }
}
