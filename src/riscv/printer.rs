//! Renders a finished Tigger program as RISC-V 32-bit assembly text.
//!
//! Tigger registers already carry their RISC-V ABI names (`s0`, `t3`, `a0`,
//! ...), so no separate instruction IR is built here: each Tigger statement
//! is printed directly, the way the register-machine program it already is.

use std::fmt::Write;

use crate::common::Id;
use crate::eeyore::ir::{BinOp, RelOp, UnOp};

use crate::tigger::ir::{Code, GlobalVarOrNum, Reg, RegOrNum, Stmt};

/// `t0`, reserved by the Tigger emitter for exactly this purpose.
const SCRATCH: Reg = Reg::CallerSaved(0);

fn is_12bit(x: i32) -> bool {
    (-2048..2048).contains(&x)
}

fn is_10bit(x: i32) -> bool {
    (-512..512).contains(&x)
}

/// Eeyore mangles function names with an `f_` prefix to keep them out of the
/// source language's namespace; the assembly label doesn't need it back.
fn func_label(name: Id) -> String {
    name.strip_prefix("f_").unwrap_or(&name).to_string()
}

pub fn print(code: &Code) -> String {
    let mut printer = Printer { stack_size: 0, out: String::new() };
    for stmt in code {
        printer.print_stmt(stmt);
    }
    printer.out
}

struct Printer {
    /// Byte size of the current function's frame, 16-byte aligned.
    stack_size: i32,
    out: String,
}

impl Printer {
    fn print_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::GlobalVarDecl { var, initial } => {
                writeln!(self.out, "  .global {var}").unwrap();
                writeln!(self.out, "  .section .sdata").unwrap();
                writeln!(self.out, "  .align 2").unwrap();
                writeln!(self.out, "  .type {var}, @object").unwrap();
                writeln!(self.out, "  .size {var}, 4").unwrap();
                writeln!(self.out, "{var}:").unwrap();
                writeln!(self.out, "  .word {initial}").unwrap();
            }
            Stmt::GlobalArrDecl { var, bytes } => {
                writeln!(self.out, "  .comm {var}, {bytes}, 4").unwrap();
            }
            Stmt::FuncHeader { name, stack_size, .. } => {
                let label = func_label(*name);
                let frame = (stack_size / 4 + 1) * 16;
                self.stack_size = frame;
                writeln!(self.out, "  .text").unwrap();
                writeln!(self.out, "  .align 2").unwrap();
                writeln!(self.out, "  .global {label}").unwrap();
                writeln!(self.out, "  .type {label}, @function").unwrap();
                writeln!(self.out, "{label}:").unwrap();
                if is_12bit(frame) {
                    writeln!(self.out, "  addi sp, sp, -{frame}").unwrap();
                    writeln!(self.out, "  sw ra, {}(sp)", frame - 4).unwrap();
                } else {
                    writeln!(self.out, "  sw ra, -4(sp)").unwrap();
                    writeln!(self.out, "  li {SCRATCH}, {frame}").unwrap();
                    writeln!(self.out, "  sub sp, sp, {SCRATCH}").unwrap();
                }
            }
            Stmt::FuncEnd { name } => {
                let label = func_label(*name);
                writeln!(self.out, "  .size   {label}, .-{label}").unwrap();
                writeln!(self.out).unwrap();
            }
            Stmt::UnaryOp { dst, op, src } => match op {
                UnOp::Neg => writeln!(self.out, "  neg {dst}, {src}").unwrap(),
                UnOp::Not => writeln!(self.out, "  seqz {dst}, {src}").unwrap(),
            },
            Stmt::BinaryOp { dst, op, lhs, rhs } => self.print_binary(*dst, *op, *lhs, *rhs),
            Stmt::Move { dst, src } => match src {
                RegOrNum::Reg(r) => writeln!(self.out, "  mv {dst}, {r}").unwrap(),
                RegOrNum::Num(0) => writeln!(self.out, "  mv {dst}, x0").unwrap(),
                RegOrNum::Num(n) => writeln!(self.out, "  li {dst}, {n}").unwrap(),
            },
            Stmt::ReadArr { dst, arr, idx } => {
                if is_12bit(*idx) {
                    writeln!(self.out, "  lw {dst}, {idx}({arr})").unwrap();
                } else {
                    writeln!(self.out, "  li {SCRATCH}, {idx}").unwrap();
                    writeln!(self.out, "  add {SCRATCH}, {SCRATCH}, {arr}").unwrap();
                    writeln!(self.out, "  lw {dst}, 0({SCRATCH})").unwrap();
                }
            }
            Stmt::WriteArr { arr, idx, src } => {
                if is_12bit(*idx) {
                    writeln!(self.out, "  sw {src}, {idx}({arr})").unwrap();
                } else {
                    writeln!(self.out, "  li {SCRATCH}, {idx}").unwrap();
                    writeln!(self.out, "  add {SCRATCH}, {SCRATCH}, {arr}").unwrap();
                    writeln!(self.out, "  sw {src}, 0({SCRATCH})").unwrap();
                }
            }
            Stmt::CondGoto { op, lhs, rhs, label } => {
                let mnemonic = match op {
                    RelOp::Lt => "blt",
                    RelOp::Gt => "bgt",
                    RelOp::Le => "ble",
                    RelOp::Ge => "bge",
                    RelOp::Ne => "bne",
                    RelOp::Eq => "beq",
                };
                writeln!(self.out, "  {mnemonic} {lhs}, {rhs}, .{label}").unwrap();
            }
            Stmt::Goto { label } => writeln!(self.out, "  j .{label}").unwrap(),
            Stmt::Label { id } => writeln!(self.out, ".{id}:").unwrap(),
            Stmt::FuncCall { name } => {
                writeln!(self.out, "  call {}", func_label(*name)).unwrap();
            }
            Stmt::Return => {
                if is_12bit(self.stack_size) {
                    writeln!(self.out, "  lw ra, {}(sp)", self.stack_size - 4).unwrap();
                    writeln!(self.out, "  addi sp, sp, {}", self.stack_size).unwrap();
                } else {
                    writeln!(self.out, "  li {SCRATCH}, {}", self.stack_size).unwrap();
                    writeln!(self.out, "  add sp, sp, {SCRATCH}").unwrap();
                    writeln!(self.out, "  lw ra, -4(sp)").unwrap();
                }
                writeln!(self.out, "  ret").unwrap();
            }
            Stmt::Store { slot, src } => {
                if is_10bit(*slot) {
                    writeln!(self.out, "  sw {src}, {}(sp)", slot * 4).unwrap();
                } else {
                    writeln!(self.out, "  li {SCRATCH}, {}", slot * 4).unwrap();
                    writeln!(self.out, "  add {SCRATCH}, {SCRATCH}, sp").unwrap();
                    writeln!(self.out, "  sw {src}, 0({SCRATCH})").unwrap();
                }
            }
            Stmt::Load { dst, src } => match src {
                GlobalVarOrNum::Num(slot) => {
                    if is_10bit(*slot) {
                        writeln!(self.out, "  lw {dst}, {}(sp)", slot * 4).unwrap();
                    } else {
                        writeln!(self.out, "  li {SCRATCH}, {}", slot * 4).unwrap();
                        writeln!(self.out, "  add {SCRATCH}, {SCRATCH}, sp").unwrap();
                        writeln!(self.out, "  lw {dst}, 0({SCRATCH})").unwrap();
                    }
                }
                GlobalVarOrNum::Global(var) => {
                    writeln!(self.out, "  lui {dst}, %hi({var})").unwrap();
                    writeln!(self.out, "  lw {dst}, %lo({var})({dst})").unwrap();
                }
            },
            Stmt::LoadAddr { dst, src } => match src {
                GlobalVarOrNum::Num(offset) => {
                    if is_10bit(*offset) {
                        writeln!(self.out, "  addi {dst}, sp, {}", offset * 4).unwrap();
                    } else {
                        writeln!(self.out, "  li {dst}, {}", offset * 4).unwrap();
                        writeln!(self.out, "  add {dst}, {dst}, sp").unwrap();
                    }
                }
                GlobalVarOrNum::Global(var) => {
                    writeln!(self.out, "  la {dst}, {var}").unwrap();
                }
            },
        }
    }

    fn print_binary(&mut self, dst: Reg, op: BinOp, lhs: Reg, rhs: RegOrNum) {
        match op {
            BinOp::Add => self.gen_imm_binary(dst, "add", lhs, rhs),
            // Sub folds a negated immediate into addi instead of a dedicated subi.
            BinOp::Sub => match rhs {
                RegOrNum::Num(n) => {
                    let neg = -n;
                    if is_12bit(neg) {
                        writeln!(self.out, "  addi {dst}, {lhs}, {neg}").unwrap();
                    } else {
                        writeln!(self.out, "  li {SCRATCH}, {neg}").unwrap();
                        writeln!(self.out, "  addi {dst}, {lhs}, {SCRATCH}").unwrap();
                    }
                }
                RegOrNum::Reg(r) => writeln!(self.out, "  sub {dst}, {lhs}, {r}").unwrap(),
            },
            BinOp::Mul => self.gen_always_load_binary(dst, "mul", lhs, rhs),
            BinOp::Div => self.gen_always_load_binary(dst, "div", lhs, rhs),
            BinOp::Mod => self.gen_always_load_binary(dst, "rem", lhs, rhs),
            BinOp::Gt => self.gen_always_load_binary(dst, "sgt", lhs, rhs),
            BinOp::Lt => self.gen_imm_binary(dst, "slt", lhs, rhs),
            BinOp::Ge => {
                self.gen_imm_binary(dst, "slt", lhs, rhs);
                writeln!(self.out, "  seqz {dst}, {dst}").unwrap();
            }
            BinOp::Le => {
                self.gen_always_load_binary(dst, "sgt", lhs, rhs);
                writeln!(self.out, "  seqz {dst}, {dst}").unwrap();
            }
            BinOp::Eq => {
                self.gen_imm_binary(dst, "xor", lhs, rhs);
                writeln!(self.out, "  seqz {dst}, {dst}").unwrap();
            }
            BinOp::Ne => {
                self.gen_imm_binary(dst, "xor", lhs, rhs);
                writeln!(self.out, "  snez {dst}, {dst}").unwrap();
            }
        }
    }

    /// `op reg, reg, reg` or `opi reg, reg, imm` when the RHS is a
    /// 12-bit-representable immediate RISC-V has an I-form for.
    fn gen_imm_binary(&mut self, dst: Reg, op_name: &str, lhs: Reg, rhs: RegOrNum) {
        match rhs {
            RegOrNum::Num(n) if is_12bit(n) => {
                writeln!(self.out, "  {op_name}i {dst}, {lhs}, {n}").unwrap();
            }
            RegOrNum::Num(n) => {
                writeln!(self.out, "  li {SCRATCH}, {n}").unwrap();
                writeln!(self.out, "  {op_name} {dst}, {lhs}, {SCRATCH}").unwrap();
            }
            RegOrNum::Reg(r) => writeln!(self.out, "  {op_name} {dst}, {lhs}, {r}").unwrap(),
        }
    }

    /// Ops with no I-form at all: an immediate RHS is always loaded to the
    /// scratch register first, except zero which is just `x0`.
    fn gen_always_load_binary(&mut self, dst: Reg, op_name: &str, lhs: Reg, rhs: RegOrNum) {
        match rhs {
            RegOrNum::Num(0) => writeln!(self.out, "  {op_name} {dst}, {lhs}, x0").unwrap(),
            RegOrNum::Num(n) => {
                writeln!(self.out, "  li {SCRATCH}, {n}").unwrap();
                writeln!(self.out, "  {op_name} {dst}, {lhs}, {SCRATCH}").unwrap();
            }
            RegOrNum::Reg(r) => writeln!(self.out, "  {op_name} {dst}, {lhs}, {r}").unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::intern;
    use crate::tigger::ir::GlobalVar;

    #[test]
    fn global_var_decl_emits_sdata_block() {
        let code = vec![Stmt::GlobalVarDecl { var: GlobalVar(0), initial: 7 }];
        let text = print(&code);
        assert!(text.contains(".section .sdata"));
        assert!(text.contains("v0:"));
        assert!(text.contains(".word 7"));
    }

    #[test]
    fn global_arr_decl_emits_comm() {
        let code = vec![Stmt::GlobalArrDecl { var: GlobalVar(1), bytes: 40 }];
        assert_eq!(print(&code), "  .comm v1, 40, 4\n");
    }

    #[test]
    fn func_header_strips_prefix_and_aligns_frame() {
        let code = vec![Stmt::FuncHeader { name: intern("f_main"), arg_cnt: 0, stack_size: 1 }];
        let text = print(&code);
        assert!(text.contains("main:"));
        assert!(!text.contains("f_main"));
        assert!(text.contains("addi sp, sp, -16"));
        assert!(text.contains("sw ra, 12(sp)"));
    }

    #[test]
    fn func_header_falls_back_to_scratch_when_frame_out_of_12bit_range() {
        let code = vec![Stmt::FuncHeader { name: intern("f_big"), arg_cnt: 0, stack_size: 4096 }];
        let text = print(&code);
        assert!(text.contains("sw ra, -4(sp)"));
        assert!(text.contains("li t0,"));
        assert!(text.contains("sub sp, sp, t0"));
    }

    #[test]
    fn binary_add_uses_addi_for_small_immediate() {
        let code = vec![Stmt::BinaryOp {
            dst: Reg::CallerSaved(1),
            op: BinOp::Add,
            lhs: Reg::CallerSaved(1),
            rhs: RegOrNum::Num(5),
        }];
        assert_eq!(print(&code), "  addi t1, t1, 5\n");
    }

    #[test]
    fn binary_mul_always_loads_nonzero_immediate_to_scratch() {
        let code = vec![Stmt::BinaryOp {
            dst: Reg::CallerSaved(1),
            op: BinOp::Mul,
            lhs: Reg::CallerSaved(1),
            rhs: RegOrNum::Num(3),
        }];
        assert_eq!(print(&code), "  li t0, 3\n  mul t1, t1, t0\n");
    }

    #[test]
    fn binary_le_is_sgt_then_seqz() {
        let code = vec![Stmt::BinaryOp {
            dst: Reg::CallerSaved(1),
            op: BinOp::Le,
            lhs: Reg::CallerSaved(1),
            rhs: RegOrNum::Reg(Reg::CallerSaved(2)),
        }];
        assert_eq!(print(&code), "  sgt t1, t1, t2\n  seqz t1, t1\n");
    }

    #[test]
    fn store_and_load_scale_slot_by_word_size() {
        let code = vec![
            Stmt::Store { slot: 2, src: Reg::CalleeSaved(0) },
            Stmt::Load { dst: Reg::CallerSaved(1), src: GlobalVarOrNum::Num(2) },
        ];
        assert_eq!(print(&code), "  sw s0, 8(sp)\n  lw t1, 8(sp)\n");
    }

    #[test]
    fn load_global_uses_hi_lo_pair() {
        let code = vec![Stmt::Load { dst: Reg::CallerSaved(1), src: GlobalVarOrNum::Global(GlobalVar(3)) }];
        assert_eq!(print(&code), "  lui t1, %hi(v3)\n  lw t1, %lo(v3)(t1)\n");
    }

    #[test]
    fn return_restores_ra_and_sp_in_range() {
        let code = vec![
            Stmt::FuncHeader { name: intern("f_f"), arg_cnt: 0, stack_size: 0 },
            Stmt::Return,
        ];
        let text = print(&code);
        assert!(text.contains("lw ra, 12(sp)"));
        assert!(text.contains("addi sp, sp, 16"));
        assert!(text.contains("ret"));
    }

    #[test]
    fn cond_goto_maps_relop_to_branch_mnemonic() {
        let code = vec![Stmt::CondGoto {
            op: RelOp::Ge,
            lhs: Reg::CallerSaved(1),
            rhs: Reg::CallerSaved(2),
            label: 3,
        }];
        assert_eq!(print(&code), "  bge t1, t2, .3\n");
    }
}
