//! Iterative backward dataflow for per-block live-in/live-out sets.

use crate::common::Set;
use crate::eeyore::ir::{Code, Stmt};

use super::cfg::Cfg;

pub fn compute(cfg: &mut Cfg, code: &Code) {
    compute_gen_kill(cfg, code);

    loop {
        let mut changed = false;
        for i in (0..cfg.blocks.len()).rev() {
            let succs = cfg.successors[i].clone();
            let mut out = cfg.blocks[i].live_out.clone();
            for &s in &succs {
                if out.union_with(&cfg.blocks[s].live_in) {
                    changed = true;
                }
            }
            cfg.blocks[i].live_out = out;

            let mut new_in = cfg.blocks[i].live_out.difference(&cfg.blocks[i].live_kill);
            new_in.union_with(&cfg.blocks[i].live_gen);
            if new_in != cfg.blocks[i].live_in {
                changed = true;
                cfg.blocks[i].live_in = new_in;
            }
        }
        if !changed {
            break;
        }
    }
}

fn compute_gen_kill(cfg: &mut Cfg, code: &Code) {
    // Globals, as a set, for the FuncCall-clobbers-every-global rule.
    let globals: Set<_> = cfg.global_vars.iter().copied().collect();

    for block in cfg.blocks.iter_mut().skip(1) {
        for stmt in block.stmts(code) {
            if let Stmt::FuncCall { .. } = stmt {
                for g in &globals {
                    if let Some(&idx) = cfg.defined_var_idx.get(g) {
                        block.live_kill.set(idx);
                    }
                }
                continue;
            }
            for used in stmt.used() {
                if let Some(&idx) = cfg.defined_var_idx.get(&used) {
                    if !block.live_kill.get(idx) {
                        block.live_gen.set(idx);
                    }
                }
            }
            for def in stmt.defined() {
                if let Some(&idx) = cfg.defined_var_idx.get(&def) {
                    block.live_kill.set(idx);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::cfg;
    use super::*;
    use crate::common::intern;
    use crate::eeyore::ir::Operand;

    fn t(id: u32) -> Operand {
        Operand::TempVar { id }
    }

    #[test]
    fn value_defined_before_use_is_not_live_in() {
        let main = intern("f_main");
        let code = vec![
            Stmt::FuncDef { name: main, arg_cnt: 0 },
            Stmt::Move { dst: t(0), src: Operand::Imm(1) },
            Stmt::Ret { value: Some(t(0)) },
            Stmt::EndFuncDef { name: main },
        ];
        let mut g = cfg::build(&code, vec![t(0)]);
        compute(&mut g, &code);
        assert!(!g.blocks[1].live_in.get(0));
    }

    #[test]
    fn call_kills_globals() {
        let main = intern("f_main");
        let g0 = Operand::OrigVar { id: 0, size: 4 };
        let code = vec![
            Stmt::Decl { var: g0 },
            Stmt::FuncDef { name: main, arg_cnt: 0 },
            Stmt::FuncCall { name: intern("f_foo"), receiver: None },
            Stmt::Ret { value: Some(g0) },
            Stmt::EndFuncDef { name: main },
        ];
        let mut cg = cfg::build(&code, vec![g0]);
        compute(&mut cg, &code);
        assert!(cg.blocks[1].live_kill.get(0));
    }
}
