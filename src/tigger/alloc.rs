//! Linear-scan register allocation, driven by a single forward pass over
//! the Eeyore statement list synchronized to the current statement id.

use std::collections::VecDeque;

use log::{debug, trace};

use crate::common::{Set, WORD_SIZE};
use crate::eeyore::ir::{Operand, Stmt};
use crate::error::{internal_error, Result};

use super::interval::{FuncIntervals, LiveInterval};
use super::ir::{Reg, RegOrNum};

#[derive(Clone, Copy, Debug)]
pub struct AllocationChange {
    pub from: Reg,
    pub to: RegOrNum,
}

/// The registers handed to the allocator, identified by explicit id lists
/// rather than a bare count — the Tigger emitter reserves some caller-saved
/// ids for its own scratch pool before the rest reach here.
struct RegisterPool {
    callee_ids: Vec<u32>,
    caller_ids: Vec<u32>,
    free_callee: VecDeque<u32>,
    free_caller: VecDeque<u32>,
    max_callee_use: u32,
    max_caller_use: u32,
}

impl RegisterPool {
    fn new(callee_ids: Vec<u32>, caller_ids: Vec<u32>) -> Self {
        let mut pool = RegisterPool {
            callee_ids,
            caller_ids,
            free_callee: VecDeque::new(),
            free_caller: VecDeque::new(),
            max_callee_use: 0,
            max_caller_use: 0,
        };
        pool.reset();
        pool
    }

    fn reset(&mut self) {
        self.free_callee = self.callee_ids.iter().copied().collect();
        self.free_caller = self.caller_ids.iter().copied().collect();
        self.max_callee_use = 0;
        self.max_caller_use = 0;
    }

    fn callee_empty(&self) -> bool {
        self.free_callee.is_empty()
    }

    fn caller_empty(&self) -> bool {
        self.free_caller.is_empty()
    }

    fn get_callee(&mut self) -> Result<Reg> {
        let Some(id) = self.free_callee.pop_front() else {
            internal_error!("requested a callee-saved register from an empty pool");
        };
        let used = (self.callee_ids.len() - self.free_callee.len()) as u32;
        self.max_callee_use = self.max_callee_use.max(used);
        Ok(Reg::CalleeSaved(id))
    }

    fn get_caller(&mut self) -> Result<Reg> {
        let Some(id) = self.free_caller.pop_front() else {
            internal_error!("requested a caller-saved register from an empty pool");
        };
        let used = (self.caller_ids.len() - self.free_caller.len()) as u32;
        self.max_caller_use = self.max_caller_use.max(used);
        Ok(Reg::CallerSaved(id))
    }

    fn return_reg(&mut self, reg: Reg) -> Result<()> {
        match reg {
            Reg::CalleeSaved(id) => {
                let pos = self.free_callee.partition_point(|&x| x < id);
                self.free_callee.insert(pos, id);
            }
            Reg::CallerSaved(id) => {
                let pos = self.free_caller.partition_point(|&x| x < id);
                self.free_caller.insert(pos, id);
            }
            other => internal_error!("returned a non-allocatable register {other} to the pool"),
        }
        Ok(())
    }
}

struct StackManager {
    size: i32,
}

impl StackManager {
    fn new() -> Self {
        StackManager { size: 0 }
    }

    fn reset(&mut self) {
        self.size = 0;
    }

    fn allocate(&mut self, words: i32) -> i32 {
        let pos = self.size;
        self.size += words;
        pos
    }
}

pub struct RegAllocator {
    funcs: Vec<FuncIntervals>,
    global_vars: Set<Operand>,
    regs: RegisterPool,
    stack: StackManager,
    cur_func: usize,
    next_interval: usize,
    active: Vec<usize>,
}

impl RegAllocator {
    pub fn new(
        funcs: Vec<FuncIntervals>,
        global_vars: Set<Operand>,
        callee_ids: Vec<u32>,
        caller_ids: Vec<u32>,
    ) -> Self {
        RegAllocator {
            funcs,
            global_vars,
            regs: RegisterPool::new(callee_ids, caller_ids),
            stack: StackManager::new(),
            cur_func: 0,
            next_interval: 0,
            active: vec![],
        }
    }

    pub fn callee_saved_reg(&self, idx: u32) -> Reg {
        Reg::CalleeSaved(idx)
    }

    pub fn callee_saved_use_cnt(&self) -> u32 {
        self.regs.max_callee_use
    }

    pub fn func_stack_size(&self) -> i32 {
        self.regs.max_callee_use as i32 + self.stack.size
    }

    fn cur_intervals(&self) -> &[LiveInterval] {
        &self.funcs[self.cur_func].intervals
    }

    fn cur_intervals_mut(&mut self) -> &mut [LiveInterval] {
        &mut self.funcs[self.cur_func].intervals
    }

    fn is_global(&self, opr: Operand) -> bool {
        self.global_vars.contains(&opr)
    }

    pub fn reg_of(&self, opr: Operand) -> Option<Reg> {
        self.cur_intervals()
            .iter()
            .find(|i| i.opr == opr)
            .and_then(|i| i.reg.or(i.pre_assigned_reg))
    }

    pub fn stack_pos_of(&self, opr: Operand) -> Option<i32> {
        self.cur_intervals().iter().find(|i| i.opr == opr).and_then(|i| i.stack_loc)
    }

    pub fn actual_pos_of(&self, opr: Operand) -> Option<RegOrNum> {
        for &idx in &self.active {
            let interval = &self.cur_intervals()[idx];
            if interval.opr == opr {
                return interval.reg.map(RegOrNum::Reg);
            }
        }
        if let Some(reg @ Reg::Arg(_)) = self.reg_of(opr) {
            return Some(RegOrNum::Reg(reg));
        }
        self.stack_pos_of(opr).map(RegOrNum::Num)
    }

    fn expire_old(&mut self, stmt_id: i64) -> Result<()> {
        while let Some(&first) = self.active.first() {
            let back = self.cur_intervals()[first].back;
            if back >= stmt_id {
                break;
            }
            let reg = self.cur_intervals()[first].reg;
            if let Some(r) = reg {
                self.regs.return_reg(r)?;
            }
            self.active.remove(0);
        }
        Ok(())
    }

    fn add_to_active(&mut self, interv_id: usize) {
        let back = self.cur_intervals()[interv_id].back;
        let pos = self
            .active
            .partition_point(|&id| self.cur_intervals()[id].back < back);
        self.active.insert(pos, interv_id);
    }

    fn spill_at(&mut self, interv_id: usize, changes: &mut Vec<AllocationChange>) -> Result<()> {
        let Some(&active_last) = self.active.last() else {
            internal_error!("spill requested with no active interval to evict");
        };
        let candidate_back = self.cur_intervals()[interv_id].back;
        let active_back = self.cur_intervals()[active_last].back;

        if candidate_back <= active_back {
            let Some(spill_reg) = self.cur_intervals()[active_last].reg else {
                internal_error!("active interval has no assigned register to spill");
            };
            let slot = self.stack.allocate(1);
            self.cur_intervals_mut()[active_last].reg = None;
            self.cur_intervals_mut()[active_last].stack_loc = Some(slot);
            self.cur_intervals_mut()[interv_id].reg = Some(spill_reg);
            debug!(
                "spill: evicting interval {active_last} (back={active_back}) to stack slot {slot}, \
                 handing {spill_reg} to interval {interv_id} (back={candidate_back})"
            );

            if let Some(pre) = self.cur_intervals()[interv_id].pre_assigned_reg {
                changes.push(AllocationChange { from: pre, to: RegOrNum::Reg(spill_reg) });
            }
            changes.push(AllocationChange { from: spill_reg, to: RegOrNum::Num(slot) });

            self.active.pop();
            self.add_to_active(interv_id);
        } else {
            let slot = self.stack.allocate(1);
            self.cur_intervals_mut()[interv_id].stack_loc = Some(slot);
            debug!(
                "spill: interval {interv_id} (back={candidate_back}) spilled directly to stack slot {slot}"
            );
            if let Some(pre) = self.cur_intervals()[interv_id].pre_assigned_reg {
                changes.push(AllocationChange { from: pre, to: RegOrNum::Num(slot) });
            }
        }
        Ok(())
    }

    pub fn allocate_for(&mut self, stmt: &Stmt, stmt_id: i64) -> Result<Vec<AllocationChange>> {
        let mut changes = vec![];
        self.expire_old(stmt_id)?;

        if matches!(stmt, Stmt::FuncDef { .. }) {
            self.active.clear();
            self.regs.reset();
            self.stack.reset();
            self.next_interval = 0;
        }

        if let Stmt::EndFuncDef { .. } = stmt {
            self.cur_func += 1;
            self.next_interval = 0;
            return Ok(changes);
        }

        // Parameter intervals begin at the function's own `FuncDef`
        // statement id, so they are assigned a home in this same call,
        // right after the reset above — not on the following statement.
        while self.next_interval < self.cur_intervals().len()
            && self.cur_intervals()[self.next_interval].begin <= stmt_id
        {
            let i = self.next_interval;
            self.next_interval += 1;

            if let Operand::Param { id } = self.cur_intervals()[i].opr {
                self.cur_intervals_mut()[i].pre_assigned_reg = Some(Reg::Arg(id));
                if !self.cur_intervals()[i].cross_func_call {
                    continue;
                }
            }

            if self.is_global(self.cur_intervals()[i].opr) {
                continue;
            }

            if let Operand::OrigVar { size, .. } = self.cur_intervals()[i].opr {
                if size > WORD_SIZE {
                    let slot = self.stack.allocate(size / WORD_SIZE);
                    self.cur_intervals_mut()[i].stack_loc = Some(slot);
                    continue;
                }
            }

            let crosses_call = self.cur_intervals()[i].cross_func_call;
            trace!("allocating interval {i} (opr={:?}, crosses_call={crosses_call})", self.cur_intervals()[i].opr);
            let got_reg = if crosses_call {
                if !self.regs.callee_empty() {
                    Some(self.regs.get_callee()?)
                } else {
                    None
                }
            } else if !self.regs.caller_empty() {
                Some(self.regs.get_caller()?)
            } else if !self.regs.callee_empty() {
                debug!("interval {i} crosses no call but caller-saved pool is exhausted, falling back to callee-saved");
                Some(self.regs.get_callee()?)
            } else {
                None
            };

            match got_reg {
                Some(reg) => {
                    self.cur_intervals_mut()[i].reg = Some(reg);
                    self.add_to_active(i);
                    if let Some(pre) = self.cur_intervals()[i].pre_assigned_reg {
                        changes.push(AllocationChange { from: pre, to: RegOrNum::Reg(reg) });
                    }
                }
                None => self.spill_at(i, &mut changes)?,
            }
        }

        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::intern;
    use crate::eeyore::ir::BinOp;
    use crate::eeyore::ir::Code;
    use crate::tigger::{cfg, interval, liveness};

    fn t(id: u32) -> Operand {
        Operand::TempVar { id }
    }

    fn build_alloc(code: &Code, defined: Vec<Operand>, callee: Vec<u32>, caller: Vec<u32>) -> RegAllocator {
        let mut g = cfg::build(code, defined);
        liveness::compute(&mut g, code);
        let funcs = interval::build(&g, code);
        let global_vars: Set<Operand> = g.global_vars.iter().copied().collect();
        RegAllocator::new(funcs, global_vars, callee, caller)
    }

    #[test]
    fn call_crossing_interval_is_assigned_a_callee_saved_register() {
        let main = intern("f_main");
        let putint = intern("f_putint");
        let code = vec![
            Stmt::FuncDef { name: main, arg_cnt: 0 },
            Stmt::Move { dst: t(0), src: Operand::Imm(1) },
            Stmt::Param { value: t(0) },
            Stmt::FuncCall { name: putint, receiver: None },
            Stmt::Ret { value: Some(t(0)) },
            Stmt::EndFuncDef { name: main },
        ];
        let mut alloc = build_alloc(&code, vec![t(0)], vec![0, 1], vec![3, 4]);
        for (id, stmt) in code.iter().enumerate() {
            alloc.allocate_for(stmt, id as i64).unwrap();
        }
        let iv = alloc.funcs[0].intervals.iter().find(|iv| iv.opr == t(0)).unwrap();
        assert!(iv.cross_func_call);
        assert!(matches!(iv.reg, Some(Reg::CalleeSaved(_))), "{iv:?}");
    }

    #[test]
    fn spill_with_one_callee_saved_register_spills_exactly_one_crossing_interval() {
        let main = intern("f_main");
        let putint = intern("f_putint");
        let code = vec![
            Stmt::FuncDef { name: main, arg_cnt: 0 },
            Stmt::Move { dst: t(0), src: Operand::Imm(1) },
            Stmt::Move { dst: t(1), src: Operand::Imm(2) },
            Stmt::Param { value: t(0) },
            Stmt::FuncCall { name: putint, receiver: None },
            Stmt::Param { value: t(1) },
            Stmt::FuncCall { name: putint, receiver: None },
            Stmt::BinaryOp { dst: t(2), op: BinOp::Add, lhs: t(0), rhs: t(1) },
            Stmt::Ret { value: Some(t(2)) },
            Stmt::EndFuncDef { name: main },
        ];
        // Only one callee-saved register, and both t0/t1 cross a call and
        // overlap -- exactly one of them must spill to the stack.
        let mut alloc = build_alloc(&code, vec![t(0), t(1), t(2)], vec![0], vec![3, 4]);
        for (id, stmt) in code.iter().enumerate() {
            alloc.allocate_for(stmt, id as i64).unwrap();
        }
        let iv0 = alloc.funcs[0].intervals.iter().find(|iv| iv.opr == t(0)).unwrap().clone();
        let iv1 = alloc.funcs[0].intervals.iter().find(|iv| iv.opr == t(1)).unwrap().clone();
        assert!(iv0.cross_func_call && iv1.cross_func_call);

        let spilled = [&iv0, &iv1].iter().filter(|iv| iv.stack_loc.is_some()).count();
        assert_eq!(spilled, 1, "{iv0:?} {iv1:?}");
        let in_reg = [&iv0, &iv1].iter().filter(|iv| iv.reg.is_some()).count();
        assert_eq!(in_reg, 1, "{iv0:?} {iv1:?}");
    }
}
