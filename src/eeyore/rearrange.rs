//! Hoists every local `Decl` to the top of its enclosing function, hoists
//! every global `Decl` to file start, and moves every global non-`Decl`
//! statement into `f_main` immediately after its declarations.

use crate::common::intern;
use crate::error::{internal_error, Result};

use super::ir::{Code, Stmt};

pub fn rearrange(code: Code) -> Result<Code> {
    let mut out: Code = vec![];
    // Position (in `out`) just after the current function's already-hoisted
    // decls; reset whenever we see a new `FuncDef` or leave one.
    let mut func_begin: Option<usize> = None;
    let mut global_def_end: usize = 0;
    let mut global_assignments: Code = vec![];

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Kind {
        FuncDef,
        EndFuncDef,
        Decl,
        Other,
    }

    for stmt in code {
        let kind = match &stmt {
            Stmt::FuncDef { .. } => Kind::FuncDef,
            Stmt::EndFuncDef { .. } => Kind::EndFuncDef,
            Stmt::Decl { .. } => Kind::Decl,
            _ => Kind::Other,
        };
        match (kind, func_begin) {
            (Kind::FuncDef, _) => {
                out.push(stmt);
                func_begin = Some(out.len());
            }
            (Kind::EndFuncDef, _) => {
                out.push(stmt);
                func_begin = None;
            }
            (Kind::Decl, Some(pos)) => {
                out.insert(pos, stmt);
                func_begin = Some(pos + 1);
            }
            (Kind::Decl, None) => {
                out.insert(global_def_end, stmt);
                global_def_end += 1;
            }
            (Kind::Other, None) => {
                global_assignments.push(stmt);
            }
            (Kind::Other, Some(_)) => {
                out.push(stmt);
            }
        }
    }

    if global_assignments.is_empty() {
        return Ok(out);
    }

    let main_name = intern("f_main");
    let Some(main_pos) = out.iter().position(|s| matches!(s, Stmt::FuncDef { name, .. } if *name == main_name)) else {
        internal_error!("program has no f_main to host hoisted global initializers");
    };

    let mut insert_at = main_pos + 1;
    while matches!(out.get(insert_at), Some(Stmt::Decl { .. })) {
        insert_at += 1;
    }

    let tail = out.split_off(insert_at);
    out.extend(global_assignments);
    out.extend(tail);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eeyore::ir::Operand;

    fn var(id: u32) -> Operand {
        Operand::OrigVar { id, size: 4 }
    }

    #[test]
    fn hoists_local_decls_before_statements() {
        let main = intern("f_main");
        let t = var(0);
        let code = vec![
            Stmt::FuncDef { name: main, arg_cnt: 0 },
            Stmt::Move { dst: t, src: Operand::Imm(1) },
            Stmt::Decl { var: t },
            Stmt::Ret { value: Some(Operand::Imm(0)) },
            Stmt::EndFuncDef { name: main },
        ];
        let out = rearrange(code).unwrap();
        let decl_pos = out.iter().position(|s| matches!(s, Stmt::Decl { .. })).unwrap();
        let move_pos = out.iter().position(|s| matches!(s, Stmt::Move { .. })).unwrap();
        assert!(decl_pos < move_pos);
    }

    #[test]
    fn moves_global_assignment_into_main() {
        let g = var(0);
        let main = intern("f_main");
        let code = vec![
            Stmt::Decl { var: g },
            Stmt::Move { dst: g, src: Operand::Imm(5) },
            Stmt::FuncDef { name: main, arg_cnt: 0 },
            Stmt::Ret { value: Some(Operand::Imm(0)) },
            Stmt::EndFuncDef { name: main },
        ];
        let out = rearrange(code).unwrap();
        let main_pos = out.iter().position(|s| matches!(s, Stmt::FuncDef { .. })).unwrap();
        let move_pos = out.iter().position(|s| matches!(s, Stmt::Move { .. })).unwrap();
        assert!(move_pos > main_pos);
    }
}
