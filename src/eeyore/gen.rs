//! AST → Eeyore: a single-pass, mode-carrying tree walk.
//!
//! The walker visits each node under a small per-node mode carried in
//! mutable state (`write_target`/`array_offset` for the write-mode direct
//! assignment optimization, `true_label`/`false_label` for condition mode,
//! and an index accumulator stack for nested array access) — see module
//! docs in the crate root for the full contract.

use crate::common::{intern, Id, WORD_SIZE};
use crate::error::{internal_error, CompileError, Result};
use crate::front::ast::Stmt as AstStmt;
use crate::front::ast::*;
use crate::front::sema::Checked;
use crate::front::types::Type;

use super::ir::Stmt;
use super::ir::*;
use super::symtab::{EeyoreEntry, EeyoreSymbolTable};

pub fn generate(cu: &CompUnit, checked: &Checked) -> Result<Code> {
    let mut g = Generator::new(checked);
    g.populate_builtins();
    for item in &cu.items {
        if let Item::FuncDef(f) = item {
            g.funcs.insert(
                f.name,
                Type::func(f.ret.clone(), f.params.iter().map(|p| p.ty.clone()).collect()),
            );
        }
    }
    for item in &cu.items {
        g.gen_item(item)?;
    }
    Ok(g.code)
}

struct Generator<'a> {
    code: Code,
    symtab: EeyoreSymbolTable,
    /// Function signatures (builtins plus every user `FuncDef`), keyed by
    /// the *unmangled* source name. Kept separate from `symtab`, which binds
    /// only variables/parameters to their Eeyore operand.
    funcs: crate::common::Map<Id, Type>,
    checked: &'a Checked,

    next_temp: u32,
    next_label: u32,
    next_origvar: u32,

    write_target: Option<Operand>,
    array_offset: Option<Operand>,
    true_label: Option<u32>,
    false_label: Option<u32>,
    index_accum: Vec<Operand>,

    break_stack: Vec<u32>,
    continue_stack: Vec<u32>,

    cur_func_ret: Type,
    cur_func_name: Id,
}

impl<'a> Generator<'a> {
    fn new(checked: &'a Checked) -> Self {
        Generator {
            code: vec![],
            symtab: EeyoreSymbolTable::new(),
            funcs: crate::common::Map::new(),
            checked,
            next_temp: 0,
            next_label: 0,
            next_origvar: 0,
            write_target: None,
            array_offset: None,
            true_label: None,
            false_label: None,
            index_accum: vec![],
            break_stack: vec![],
            continue_stack: vec![],
            cur_func_ret: Type::Void,
            cur_func_name: intern(""),
        }
    }

    fn populate_builtins(&mut self) {
        let defs: &[(&str, Type)] = &[
            ("getint", Type::func(Type::Int, vec![])),
            ("getch", Type::func(Type::Int, vec![])),
            (
                "getarray",
                Type::func(Type::Int, vec![Type::array(Type::Int, None)]),
            ),
            ("putint", Type::func(Type::Void, vec![Type::Int])),
            ("putch", Type::func(Type::Void, vec![Type::Int])),
            (
                "putarray",
                Type::func(Type::Void, vec![Type::Int, Type::array(Type::Int, None)]),
            ),
            ("_sysy_starttime", Type::func(Type::Void, vec![Type::Int])),
            ("_sysy_stoptime", Type::func(Type::Void, vec![Type::Int])),
        ];
        for (name, ty) in defs {
            self.funcs.insert(intern(name), ty.clone());
        }
    }

    fn fresh_temp(&mut self) -> Operand {
        let id = self.next_temp;
        self.next_temp += 1;
        Operand::TempVar { id }
    }

    fn fresh_label(&mut self) -> u32 {
        let id = self.next_label;
        self.next_label += 1;
        id
    }

    fn fresh_origvar(&mut self, size: i32) -> Operand {
        let id = self.next_origvar;
        self.next_origvar += 1;
        Operand::OrigVar { id, size }
    }

    fn emit(&mut self, stmt: Stmt) {
        self.code.push(stmt);
    }

    fn emit_binop(&mut self, op: BinOp, lhs: Operand, rhs: Operand) -> Operand {
        let dst = self.fresh_temp();
        self.emit(Stmt::BinaryOp { dst, op, lhs, rhs });
        dst
    }

    fn emit_unop(&mut self, op: UnOp, src: Operand) -> Operand {
        let dst = self.fresh_temp();
        self.emit(Stmt::UnaryOp { dst, op, src });
        dst
    }

    // ---- top level ----

    fn gen_item(&mut self, item: &Item) -> Result<()> {
        match item {
            Item::VarDecl(v) => self.gen_var_decl(v),
            Item::FuncDef(f) => self.gen_func_def(f),
        }
    }

    fn gen_func_def(&mut self, f: &FuncDef) -> Result<()> {
        let name = intern(&format!("f_{}", f.name));
        self.emit(Stmt::FuncDef {
            name,
            arg_cnt: f.params.len() as u32,
        });
        self.symtab.push();
        self.cur_func_ret = f.ret.clone();
        self.cur_func_name = name;

        for (i, p) in f.params.iter().enumerate() {
            let ty = self
                .checked
                .decl_ty
                .get(&p.id)
                .cloned()
                .unwrap_or_else(|| p.ty.clone());
            self.symtab.insert(
                p.name,
                EeyoreEntry {
                    ty,
                    operand: Operand::Param { id: i as u32 },
                },
            );
        }

        for stmt in &f.body.0 {
            self.gen_stmt(stmt)?;
        }

        let needs_implicit_ret = !matches!(self.code.last(), Some(Stmt::Ret { .. }));
        if needs_implicit_ret {
            let value = match f.ret {
                Type::Void => None,
                _ => Some(Operand::Imm(0)),
            };
            self.emit(Stmt::Ret { value });
        }
        self.emit(Stmt::EndFuncDef { name });
        self.symtab.pop();
        Ok(())
    }

    fn gen_block(&mut self, b: &Block) -> Result<()> {
        self.symtab.push();
        for stmt in &b.0 {
            self.gen_stmt(stmt)?;
        }
        self.symtab.pop();
        Ok(())
    }

    fn gen_var_decl(&mut self, v: &VarDecl) -> Result<()> {
        let ty = self
            .checked
            .decl_ty
            .get(&v.id)
            .cloned()
            .unwrap_or_else(|| v.ty.clone());
        let size = ty.byte_size().unwrap_or(WORD_SIZE);
        let var = self.fresh_origvar(size);
        self.emit(Stmt::Decl { var });
        self.symtab.insert(
            v.name,
            EeyoreEntry {
                ty: ty.clone(),
                operand: var,
            },
        );
        if let Some(init) = &v.init {
            self.gen_init(init, var, 0, &ty)?;
        }
        Ok(())
    }

    /// Lower a (possibly nested) brace initializer for `var` at byte
    /// `base_offset`, advancing by each element's size as children are
    /// visited — scalars assign directly, array children recurse with
    /// `array_offset` advanced by the current element size.
    fn gen_init(&mut self, init: &Init, var: Operand, base_offset: i32, ty: &Type) -> Result<()> {
        match (init, ty) {
            (Init::Expr(e), _) => {
                if var.is_array() {
                    self.write_target = Some(var);
                    self.array_offset = Some(Operand::Imm(base_offset));
                    self.gen_expr(e, false)?;
                    self.write_target = None;
                    self.array_offset = None;
                } else {
                    self.write_target = Some(var);
                    self.array_offset = None;
                    self.gen_expr(e, false)?;
                    self.write_target = None;
                }
                Ok(())
            }
            (Init::List(items), Type::Array { elem, .. }) => {
                let elem_size = elem.byte_size().unwrap_or(WORD_SIZE);
                let mut offset = base_offset;
                for item in items {
                    self.gen_init(item, var, offset, elem)?;
                    offset += elem_size;
                }
                Ok(())
            }
            (Init::List(_), _) => internal_error!("brace initializer against a scalar type"),
        }
    }

    fn gen_stmt(&mut self, s: &AstStmt) -> Result<()> {
        match s {
            AstStmt::Block(b) => self.gen_block(b),
            AstStmt::Expr(e) => {
                if let Some(e) = e {
                    self.gen_expr(e, false)?;
                }
                Ok(())
            }
            AstStmt::VarDecl(v) => self.gen_var_decl(v),
            AstStmt::Assign(lhs, rhs) => {
                self.gen_expr(lhs, true)?;
                self.gen_expr(rhs, false)?;
                self.write_target = None;
                self.array_offset = None;
                Ok(())
            }
            AstStmt::If { cond, then, els } => self.gen_if(cond, then, els.as_deref()),
            AstStmt::While { cond, body } => self.gen_while(cond, body),
            AstStmt::Break(_) => {
                let label = *self
                    .break_stack
                    .last()
                    .ok_or_else(|| CompileError::Internal {
                        file: file!(),
                        line: line!(),
                        msg: "break outside loop reached the generator".into(),
                    })?;
                self.emit(Stmt::Goto { label });
                Ok(())
            }
            AstStmt::Continue(_) => {
                let label = *self
                    .continue_stack
                    .last()
                    .ok_or_else(|| CompileError::Internal {
                        file: file!(),
                        line: line!(),
                        msg: "continue outside loop reached the generator".into(),
                    })?;
                self.emit(Stmt::Goto { label });
                Ok(())
            }
            AstStmt::Return(value, _) => {
                let value = match value {
                    Some(e) => self.gen_expr(e, false)?,
                    None => None,
                };
                self.emit(Stmt::Ret { value });
                Ok(())
            }
        }
    }

    fn gen_if(&mut self, cond: &Expr, then: &AstStmt, els: Option<&AstStmt>) -> Result<()> {
        let ltrue = self.fresh_label();
        let lfalse = self.fresh_label();
        self.true_label = Some(ltrue);
        self.false_label = Some(lfalse);
        let value = self.gen_expr(cond, false)?;
        self.true_label = None;
        self.false_label = None;
        if let Some(v) = value {
            self.emit(Stmt::CondGoto {
                op: RelOp::Eq,
                lhs: v,
                rhs: Operand::Imm(0),
                label: lfalse,
            });
        }
        self.emit(Stmt::Label { id: ltrue });
        self.gen_stmt(then)?;
        match els {
            None => self.emit(Stmt::Label { id: lfalse }),
            Some(els) => {
                let lend = self.fresh_label();
                self.emit(Stmt::Goto { label: lend });
                self.emit(Stmt::Label { id: lfalse });
                self.gen_stmt(els)?;
                self.emit(Stmt::Label { id: lend });
            }
        }
        Ok(())
    }

    fn gen_while(&mut self, cond: &Expr, body: &AstStmt) -> Result<()> {
        let lbegin = self.fresh_label();
        let ltrue = self.fresh_label();
        let lfalse = self.fresh_label();
        self.emit(Stmt::Label { id: lbegin });

        self.continue_stack.push(lbegin);
        self.break_stack.push(lfalse);

        self.true_label = Some(ltrue);
        self.false_label = Some(lfalse);
        let value = self.gen_expr(cond, false)?;
        self.true_label = None;
        self.false_label = None;
        if let Some(v) = value {
            self.emit(Stmt::CondGoto {
                op: RelOp::Eq,
                lhs: v,
                rhs: Operand::Imm(0),
                label: lfalse,
            });
        }
        self.emit(Stmt::Label { id: ltrue });
        self.gen_stmt(body)?;
        self.emit(Stmt::Goto { label: lbegin });
        self.emit(Stmt::Label { id: lfalse });

        self.continue_stack.pop();
        self.break_stack.pop();
        Ok(())
    }

    // ---- expressions ----

    /// Visit `e`. In lval mode, sets `write_target`/`array_offset` instead
    /// of producing a value and always returns `None`. In rval mode, returns
    /// `Some(operand)` unless the node was consumed entirely by write mode
    /// (direct assignment into `write_target`).
    fn gen_expr(&mut self, e: &Expr, lval: bool) -> Result<Option<Operand>> {
        match &e.kind {
            ExprKind::ConstInt(v) => {
                if lval {
                    internal_error!("constant used as an lvalue");
                }
                self.write_or_return(Operand::Imm(*v))
            }
            ExprKind::Ident(name) => self.gen_ident(*name, lval),
            ExprKind::Unary { op, rhs } => self.gen_unary(*op, rhs, lval),
            ExprKind::Binary { op, lhs, rhs } => self.gen_binary(*op, lhs, rhs, lval, e),
            ExprKind::Index { base, index } => self.gen_index(base, index, lval),
            ExprKind::Call { name, args } => {
                if lval {
                    internal_error!("call result used as an lvalue");
                }
                self.gen_call(*name, args)
            }
        }
    }

    fn gen_ident(&mut self, name: Id, lval: bool) -> Result<Option<Operand>> {
        let entry = self
            .symtab
            .get(&name)
            .ok_or_else(|| CompileError::Internal {
                file: file!(),
                line: line!(),
                msg: format!("undefined identifier `{name}` reached the generator"),
            })?
            .clone();

        if self.index_accum.is_empty() {
            if lval {
                self.write_target = Some(entry.operand);
                self.array_offset = None;
                return Ok(None);
            }
            return self.write_or_return(entry.operand);
        }

        // Pending indices: fold them into a byte offset against `entry.ty`.
        let accum = std::mem::take(&mut self.index_accum);
        let (offset, result_ty) = self.fold_index_offset(&entry.ty, &accum);
        let basic = !result_ty.is_array();

        if basic {
            if lval {
                self.write_target = Some(entry.operand);
                self.array_offset = Some(offset);
                return Ok(None);
            }
            match (self.write_target, self.array_offset) {
                (Some(wt), None) => {
                    self.emit(Stmt::ReadArr {
                        dst: wt,
                        arr: entry.operand,
                        idx: offset,
                    });
                    Ok(None)
                }
                (Some(wt), Some(wo)) => {
                    let t = self.fresh_temp();
                    self.emit(Stmt::ReadArr {
                        dst: t,
                        arr: entry.operand,
                        idx: offset,
                    });
                    self.emit(Stmt::WriteArr {
                        arr: wt,
                        idx: wo,
                        src: t,
                    });
                    Ok(None)
                }
                (None, _) => {
                    let t = self.fresh_temp();
                    self.emit(Stmt::ReadArr {
                        dst: t,
                        arr: entry.operand,
                        idx: offset,
                    });
                    Ok(Some(t))
                }
            }
        } else {
            // Pointer result: the value is the array's base plus the offset.
            let sum = self.emit_binop(BinOp::Add, entry.operand, offset);
            if lval {
                internal_error!("array-valued expression used as an lvalue");
            }
            self.write_or_return(sum)
        }
    }

    /// Fold a list of pending index operands (innermost pushed first, i.e.
    /// syntactically-last index first) into a single byte-offset operand,
    /// plus the type of the value the full index chain resolves to.
    fn fold_index_offset(&mut self, base_ty: &Type, accum: &[Operand]) -> (Operand, Type) {
        let mut cur_type = base_ty.clone();
        let mut pairs = vec![];
        for idx in accum.iter().rev() {
            let elem_ty = cur_type
                .elem_type()
                .cloned()
                .unwrap_or(Type::Int);
            let size = elem_ty
                .byte_size()
                .or_else(|| elem_ty.index_elem_size())
                .unwrap_or(WORD_SIZE);
            pairs.push((*idx, size));
            cur_type = elem_ty;
        }

        let mut const_sum: i64 = 0;
        let mut offset_op: Option<Operand> = None;
        for (idx, size) in pairs {
            match idx {
                Operand::Imm(v) => const_sum += v as i64 * size as i64,
                _ => {
                    let scaled = self.emit_binop(BinOp::Mul, idx, Operand::Imm(size));
                    offset_op = Some(match offset_op {
                        None => scaled,
                        Some(prev) => self.emit_binop(BinOp::Add, prev, scaled),
                    });
                }
            }
        }
        let offset = match offset_op {
            None => Operand::Imm(const_sum as i32),
            Some(op) if const_sum != 0 => self.emit_binop(BinOp::Add, op, Operand::Imm(const_sum as i32)),
            Some(op) => op,
        };
        (offset, cur_type)
    }

    fn gen_index(&mut self, base: &Expr, index: &Expr, lval: bool) -> Result<Option<Operand>> {
        let saved_accum = std::mem::take(&mut self.index_accum);
        let saved_wt = self.write_target.take();
        let saved_ao = self.array_offset.take();
        let idx_val = self.gen_expr(index, false)?.ok_or_else(|| CompileError::Internal {
            file: file!(),
            line: line!(),
            msg: "array index expression produced no value".into(),
        })?;
        self.write_target = saved_wt;
        self.array_offset = saved_ao;
        self.index_accum = saved_accum;
        self.index_accum.push(idx_val);
        self.gen_expr(base, lval)
    }

    fn gen_unary(&mut self, op: UnaryOp, rhs: &Expr, lval: bool) -> Result<Option<Operand>> {
        if lval {
            internal_error!("unary expression used as an lvalue");
        }
        if op == UnaryOp::Plus {
            // Identity; evaluate as a plain value in whatever mode is active.
            return self.gen_expr(rhs, false);
        }
        let saved_wt = self.write_target.take();
        let saved_ao = self.array_offset.take();
        let v = self
            .gen_expr(rhs, false)?
            .ok_or_else(|| CompileError::Internal {
                file: file!(),
                line: line!(),
                msg: "unary operand produced no value".into(),
            })?;
        self.write_target = saved_wt;
        self.array_offset = saved_ao;

        let eeyore_op = match op {
            UnaryOp::Neg => UnOp::Neg,
            UnaryOp::Not => UnOp::Not,
            UnaryOp::Plus => unreachable!(),
        };
        match (self.write_target, self.array_offset) {
            (Some(wt), None) => {
                self.emit(Stmt::UnaryOp {
                    dst: wt,
                    op: eeyore_op,
                    src: v,
                });
                Ok(None)
            }
            (Some(wt), Some(wo)) => {
                let t = self.fresh_temp();
                self.emit(Stmt::UnaryOp {
                    dst: t,
                    op: eeyore_op,
                    src: v,
                });
                self.emit(Stmt::WriteArr {
                    arr: wt,
                    idx: wo,
                    src: t,
                });
                Ok(None)
            }
            (None, _) => Ok(Some(self.emit_unop(eeyore_op, v))),
        }
    }

    fn gen_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        lval: bool,
        _e: &Expr,
    ) -> Result<Option<Operand>> {
        if lval {
            internal_error!("binary expression used as an lvalue");
        }
        if op.is_logical() {
            return self.gen_logical(op, lhs, rhs);
        }

        let saved_wt = self.write_target.take();
        let saved_ao = self.array_offset.take();
        let lv = self
            .gen_expr(lhs, false)?
            .ok_or_else(|| CompileError::Internal {
                file: file!(),
                line: line!(),
                msg: "binary lhs produced no value".into(),
            })?;
        let rv = self
            .gen_expr(rhs, false)?
            .ok_or_else(|| CompileError::Internal {
                file: file!(),
                line: line!(),
                msg: "binary rhs produced no value".into(),
            })?;
        self.write_target = saved_wt;
        self.array_offset = saved_ao;

        let eeyore_op = BinOp::from_ast(op);
        match (self.write_target, self.array_offset) {
            (Some(wt), None) => {
                self.emit(Stmt::BinaryOp {
                    dst: wt,
                    op: eeyore_op,
                    lhs: lv,
                    rhs: rv,
                });
                Ok(None)
            }
            (Some(wt), Some(wo)) => {
                let t = self.fresh_temp();
                self.emit(Stmt::BinaryOp {
                    dst: t,
                    op: eeyore_op,
                    lhs: lv,
                    rhs: rv,
                });
                self.emit(Stmt::WriteArr {
                    arr: wt,
                    idx: wo,
                    src: t,
                });
                Ok(None)
            }
            (None, _) => Ok(Some(self.emit_binop(eeyore_op, lv, rv))),
        }
    }

    /// Short-circuit lowering for `&&`/`||`. If we're already in condition
    /// mode (`true_label`/`false_label` set by an enclosing `if`/`while`),
    /// jump directly and return `None`. Otherwise synthesize fresh labels,
    /// lower as a jump, then materialize a 0/1 value at a join point.
    fn gen_logical(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Option<Operand>> {
        if let (Some(tl), Some(fl)) = (self.true_label, self.false_label) {
            self.gen_short_circuit(op, lhs, rhs, tl, fl)?;
            return Ok(None);
        }

        let ltrue = self.fresh_label();
        let lfalse = self.fresh_label();
        let lend = self.fresh_label();
        let saved_wt = self.write_target.take();
        let saved_ao = self.array_offset.take();

        self.true_label = Some(ltrue);
        self.false_label = Some(lfalse);
        self.gen_short_circuit(op, lhs, rhs, ltrue, lfalse)?;
        self.true_label = None;
        self.false_label = None;

        let result = self.fresh_temp();
        self.emit(Stmt::Label { id: ltrue });
        self.emit(Stmt::Move {
            dst: result,
            src: Operand::Imm(1),
        });
        self.emit(Stmt::Goto { label: lend });
        self.emit(Stmt::Label { id: lfalse });
        self.emit(Stmt::Move {
            dst: result,
            src: Operand::Imm(0),
        });
        self.emit(Stmt::Label { id: lend });

        self.write_target = saved_wt;
        self.array_offset = saved_ao;
        self.write_or_return(result)
    }

    fn gen_short_circuit(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        true_label: u32,
        false_label: u32,
    ) -> Result<()> {
        match op {
            BinaryOp::And => {
                let first_true = self.fresh_label();
                self.true_label = Some(first_true);
                self.false_label = Some(false_label);
                let lv = self.gen_cond_operand(lhs)?;
                if let Some(v) = lv {
                    self.emit(Stmt::CondGoto {
                        op: RelOp::Eq,
                        lhs: v,
                        rhs: Operand::Imm(0),
                        label: false_label,
                    });
                }
                self.emit(Stmt::Label { id: first_true });
                self.true_label = Some(true_label);
                self.false_label = Some(false_label);
                let rv = self.gen_cond_operand(rhs)?;
                if let Some(v) = rv {
                    self.emit(Stmt::CondGoto {
                        op: RelOp::Eq,
                        lhs: v,
                        rhs: Operand::Imm(0),
                        label: false_label,
                    });
                }
                self.emit(Stmt::Goto { label: true_label });
                Ok(())
            }
            BinaryOp::Or => {
                let first_false = self.fresh_label();
                self.true_label = Some(true_label);
                self.false_label = Some(first_false);
                let lv = self.gen_cond_operand(lhs)?;
                if let Some(v) = lv {
                    self.emit(Stmt::CondGoto {
                        op: RelOp::Ne,
                        lhs: v,
                        rhs: Operand::Imm(0),
                        label: true_label,
                    });
                }
                self.emit(Stmt::Label { id: first_false });
                self.true_label = Some(true_label);
                self.false_label = Some(false_label);
                let rv = self.gen_cond_operand(rhs)?;
                if let Some(v) = rv {
                    self.emit(Stmt::CondGoto {
                        op: RelOp::Ne,
                        lhs: v,
                        rhs: Operand::Imm(0),
                        label: true_label,
                    });
                }
                self.emit(Stmt::Goto { label: false_label });
                Ok(())
            }
            _ => internal_error!("gen_short_circuit called on a non-logical operator"),
        }
    }

    /// Evaluate a sub-condition of `&&`/`||` for its value (not its jump):
    /// used because each side may itself be a value-producing expression
    /// (e.g. a bare relational or identifier), only nested `&&`/`||` jump
    /// directly via the already-installed true/false labels.
    fn gen_cond_operand(&mut self, e: &Expr) -> Result<Option<Operand>> {
        self.gen_expr(e, false)
    }

    fn gen_call(&mut self, name: Id, args: &[Expr]) -> Result<Option<Operand>> {
        let mangled = intern(&format!("f_{name}"));
        let ret_is_void = match self.funcs.get(&name) {
            Some(Type::Func { ret, .. }) => matches!(**ret, Type::Void),
            _ => internal_error!("call to unknown function `{name}` reached the generator"),
        };

        let saved_wt = self.write_target.take();
        let saved_ao = self.array_offset.take();
        let mut arg_vals = vec![];
        for a in args {
            let v = self.gen_expr(a, false)?.ok_or_else(|| CompileError::Internal {
                file: file!(),
                line: line!(),
                msg: "call argument produced no value".into(),
            })?;
            arg_vals.push(v);
        }
        self.write_target = saved_wt;
        self.array_offset = saved_ao;

        for v in arg_vals {
            self.emit(Stmt::Param { value: v });
        }

        if ret_is_void {
            if self.write_target.is_some() {
                internal_error!("void call used in write mode");
            }
            self.emit(Stmt::FuncCall {
                name: mangled,
                receiver: None,
            });
            return Ok(None);
        }

        match (self.write_target, self.array_offset) {
            (Some(wt), None) => {
                self.emit(Stmt::FuncCall {
                    name: mangled,
                    receiver: Some(wt),
                });
                Ok(None)
            }
            (Some(wt), Some(wo)) => {
                let t = self.fresh_temp();
                self.emit(Stmt::FuncCall {
                    name: mangled,
                    receiver: Some(t),
                });
                self.emit(Stmt::WriteArr {
                    arr: wt,
                    idx: wo,
                    src: t,
                });
                Ok(None)
            }
            (None, _) => {
                let t = self.fresh_temp();
                self.emit(Stmt::FuncCall {
                    name: mangled,
                    receiver: Some(t),
                });
                Ok(Some(t))
            }
        }
    }

    /// Common tail for leaf rval expressions: either write `v` into the
    /// pending write target (direct or array-indexed), or return it.
    fn write_or_return(&mut self, v: Operand) -> Result<Option<Operand>> {
        match (self.write_target, self.array_offset) {
            (Some(wt), None) => {
                self.emit(Stmt::Move { dst: wt, src: v });
                Ok(None)
            }
            (Some(wt), Some(wo)) => {
                self.emit(Stmt::WriteArr {
                    arr: wt,
                    idx: wo,
                    src: v,
                });
                Ok(None)
            }
            (None, _) => Ok(Some(v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::{check, parse};

    fn generate_src(src: &str) -> Code {
        let cu = parse(src).unwrap();
        let checked = check(&cu).unwrap();
        generate(&cu, &checked).unwrap()
    }

    #[test]
    fn implicit_return_appends_synthetic_zero() {
        let code = generate_src("int main() { int x = 1; }");
        match code.last() {
            Some(Stmt::EndFuncDef { .. }) => {}
            other => panic!("expected EndFuncDef as last statement, got {other:?}"),
        }
        let ret_pos = code.len() - 2;
        match &code[ret_pos] {
            Stmt::Ret { value: Some(Operand::Imm(0)) } => {}
            other => panic!("expected synthetic `return 0`, got {other:?}"),
        }
        assert!(
            matches!(code[0], Stmt::Decl { .. }),
            "expected a Decl for x, got {:?}",
            code[0]
        );
        assert!(code.iter().any(|s| matches!(
            s,
            Stmt::Move { src: Operand::Imm(1), .. }
        )));
    }

    #[test]
    fn short_circuit_and_desugars_to_cond_gotos() {
        let code = generate_src("int a; int b; int main() { if (a && b) return 1; return 0; }");

        // No BinaryOp with a logical operator ever reaches the Eeyore
        // statement list -- `&&` must lower entirely to jumps.
        assert!(code.iter().all(|s| !matches!(s, Stmt::BinaryOp { .. })));

        // The condition must short-circuit through two CondGotos (one per
        // operand) before falling through to `return 1`, with a `Goto` over
        // the false path in between.
        let cond_gotos = code
            .iter()
            .filter(|s| matches!(s, Stmt::CondGoto { op: RelOp::Eq, rhs: Operand::Imm(0), .. }))
            .count();
        assert_eq!(cond_gotos, 2, "expected one CondGoto per operand, got {code:?}");

        let goto_before_first_return = code.iter().any(|s| matches!(s, Stmt::Goto { .. }));
        assert!(goto_before_first_return, "expected a goto joining the true path: {code:?}");

        let rets: Vec<_> = code
            .iter()
            .filter_map(|s| match s {
                Stmt::Ret { value: Some(Operand::Imm(v)) } => Some(*v),
                _ => None,
            })
            .collect();
        assert_eq!(rets, vec![1, 0]);
    }

    #[test]
    fn nested_array_index_reads_through_inner_access() {
        let code = generate_src(
            "int a[4]; int b[4]; int main() { return a[b[0]]; }",
        );

        // Two Decls, one per array.
        let decl_count = code.iter().filter(|s| matches!(s, Stmt::Decl { .. })).count();
        assert_eq!(decl_count, 2);

        // b[0] must be read before a's offset is scaled and read.
        let read_pos = code.iter().position(|s| matches!(s, Stmt::ReadArr { .. }));
        assert!(read_pos.is_some(), "expected a ReadArr for b[0]: {code:?}");

        let second_read = code
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Stmt::ReadArr { .. }))
            .nth(1);
        assert!(second_read.is_some(), "expected a second ReadArr for a[...]: {code:?}");
    }

    #[test]
    fn identifier_index_read_does_not_leak_write_mode() {
        // Regression test: `x = a[i]` with a non-constant, bare-identifier
        // index used to crash because `gen_index` evaluated `i` while the
        // outer assignment's write_target was still live.
        let code = generate_src("int a[4]; int main() { int i; int x; x = a[i]; return x; }");
        assert!(code.iter().any(|s| matches!(s, Stmt::ReadArr { .. })));
    }
}
