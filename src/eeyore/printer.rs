//! Renders a finished Eeyore program as text, one statement per line.

use std::fmt::Write;

use super::ir::{Code, Operand, Stmt};

pub fn print(code: &Code) -> String {
    let mut out = String::new();
    for stmt in code {
        print_stmt(&mut out, stmt);
    }
    out
}

fn print_stmt(out: &mut String, stmt: &Stmt) {
    match stmt {
        Stmt::Decl { var } => {
            if let Operand::OrigVar { size, .. } = var {
                if *size > crate::common::WORD_SIZE {
                    writeln!(out, "var {size} {var}").unwrap();
                    return;
                }
            }
            writeln!(out, "var {var}").unwrap();
        }
        Stmt::FuncDef { name, arg_cnt } => writeln!(out, "{name} [{arg_cnt}]").unwrap(),
        Stmt::EndFuncDef { name } => writeln!(out, "end {name}").unwrap(),
        Stmt::Param { value } => writeln!(out, "param {value}").unwrap(),
        Stmt::FuncCall { name, receiver } => match receiver {
            Some(r) => writeln!(out, "{r} = call {name}").unwrap(),
            None => writeln!(out, "call {name}").unwrap(),
        },
        Stmt::Ret { value } => match value {
            Some(v) => writeln!(out, "return {v}").unwrap(),
            None => writeln!(out, "return").unwrap(),
        },
        Stmt::Goto { label } => writeln!(out, "goto l{label}").unwrap(),
        Stmt::CondGoto { op, lhs, rhs, label } => {
            writeln!(out, "if {lhs} {op} {rhs} goto l{label}").unwrap()
        }
        Stmt::UnaryOp { dst, op, src } => writeln!(out, "{dst} = {op}{src}").unwrap(),
        Stmt::BinaryOp { dst, op, lhs, rhs } => writeln!(out, "{dst} = {lhs} {op} {rhs}").unwrap(),
        Stmt::Move { dst, src } => writeln!(out, "{dst} = {src}").unwrap(),
        Stmt::ReadArr { dst, arr, idx } => writeln!(out, "{dst} = {arr}[{idx}]").unwrap(),
        Stmt::WriteArr { arr, idx, src } => writeln!(out, "{arr}[{idx}] = {src}").unwrap(),
        Stmt::Label { id } => writeln!(out, "l{id}:").unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::intern;

    #[test]
    fn renders_decl_and_move() {
        let code = vec![
            Stmt::Decl { var: Operand::OrigVar { id: 0, size: 4 } },
            Stmt::Move { dst: Operand::OrigVar { id: 0, size: 4 }, src: Operand::Imm(5) },
        ];
        let text = print(&code);
        assert_eq!(text, "var T0\nT0 = 5\n");
    }

    #[test]
    fn renders_func_call_with_receiver() {
        let code = vec![Stmt::FuncCall {
            name: intern("f_getint"),
            receiver: Some(Operand::TempVar { id: 0 }),
        }];
        assert_eq!(print(&code), "t0 = call f_getint\n");
    }

    #[test]
    fn renders_array_decl_with_size() {
        let code = vec![Stmt::Decl { var: Operand::OrigVar { id: 1, size: 16 } }];
        assert_eq!(print(&code), "var 16 T1\n");
    }

    #[test]
    fn renders_label_and_cond_goto() {
        let code = vec![
            Stmt::CondGoto {
                op: super::super::ir::RelOp::Lt,
                lhs: Operand::TempVar { id: 0 },
                rhs: Operand::Imm(3),
                label: 1,
            },
            Stmt::Label { id: 1 },
        ];
        assert_eq!(print(&code), "if t0 < 3 goto l1\nl1:\n");
    }
}
