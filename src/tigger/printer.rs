//! Renders a finished Tigger program as text, one statement per line.

use std::fmt::Write;

use super::ir::{Code, Stmt};

pub fn print(code: &Code) -> String {
    let mut out = String::new();
    for stmt in code {
        print_stmt(&mut out, stmt);
    }
    out
}

fn print_stmt(out: &mut String, stmt: &Stmt) {
    match stmt {
        Stmt::GlobalVarDecl { var, initial } => writeln!(out, "{var} = {initial}").unwrap(),
        Stmt::GlobalArrDecl { var, bytes } => writeln!(out, "{var} = malloc {bytes}").unwrap(),
        Stmt::FuncHeader { name, arg_cnt, stack_size } => {
            writeln!(out, "{name} [{arg_cnt}] [{stack_size}]").unwrap()
        }
        Stmt::FuncEnd { name } => writeln!(out, "end {name}").unwrap(),
        Stmt::UnaryOp { dst, op, src } => writeln!(out, "  {dst} = {op}{src}").unwrap(),
        Stmt::BinaryOp { dst, op, lhs, rhs } => writeln!(out, "  {dst} = {lhs} {op} {rhs}").unwrap(),
        Stmt::Move { dst, src } => writeln!(out, "  {dst} = {src}").unwrap(),
        Stmt::ReadArr { dst, arr, idx } => writeln!(out, "  {dst} = {arr}[{idx}]").unwrap(),
        Stmt::WriteArr { arr, idx, src } => writeln!(out, "  {arr}[{idx}] = {src}").unwrap(),
        Stmt::CondGoto { op, lhs, rhs, label } => {
            writeln!(out, "  if {lhs} {op} {rhs} goto l{label}").unwrap()
        }
        Stmt::Goto { label } => writeln!(out, "  goto l{label}").unwrap(),
        Stmt::Label { id } => writeln!(out, "l{id}:").unwrap(),
        Stmt::FuncCall { name } => writeln!(out, "  call {name}").unwrap(),
        Stmt::Return => writeln!(out, "  return").unwrap(),
        Stmt::Store { slot, src } => writeln!(out, "  store {src} {slot}").unwrap(),
        Stmt::Load { dst, src } => writeln!(out, "  load {src} {dst}").unwrap(),
        Stmt::LoadAddr { dst, src } => writeln!(out, "  loadaddr {src} {dst}").unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::intern;
    use crate::eeyore::ir::RelOp;
    use super::super::ir::{GlobalVar, GlobalVarOrNum, Reg, RegOrNum};

    #[test]
    fn renders_global_decl_and_func_header() {
        let code = vec![
            Stmt::GlobalVarDecl { var: GlobalVar(0), initial: 0 },
            Stmt::FuncHeader { name: intern("f_main"), arg_cnt: 0, stack_size: 4 },
        ];
        assert_eq!(print(&code), "v0 = 0\nf_main [0] [4]\n");
    }

    #[test]
    fn renders_global_arr_decl() {
        let code = vec![Stmt::GlobalArrDecl { var: GlobalVar(1), bytes: 40 }];
        assert_eq!(print(&code), "v1 = malloc 40\n");
    }

    #[test]
    fn renders_indented_body_statements() {
        let code = vec![
            Stmt::Move { dst: Reg::CalleeSaved(0), src: RegOrNum::Num(5) },
            Stmt::Store { slot: 4, src: Reg::CalleeSaved(0) },
            Stmt::Load { dst: Reg::CallerSaved(3), src: GlobalVarOrNum::Num(4) },
        ];
        assert_eq!(print(&code), "  s0 = 5\n  store s0 4\n  load 4 t3\n");
    }

    #[test]
    fn renders_cond_goto_and_label() {
        let code = vec![
            Stmt::CondGoto { op: RelOp::Lt, lhs: Reg::CallerSaved(3), rhs: Reg::CallerSaved(4), label: 2 },
            Stmt::Label { id: 2 },
        ];
        assert_eq!(print(&code), "  if t3 < t4 goto l2\nl2:\n");
    }
}
