//! The semantic checker: scope/type validation, constant folding of array
//! dimensions and `const` initializers, and decoration of every [`Expr`]
//! node with its resolved [`Type`] for the generator to consume.

use crate::common::{Id, Map, NodeId, Span};
use crate::error::{CompileError, Result};
use crate::util::ChainedMap;

use super::ast::*;
use super::types::Type;

/// A frontend-phase symbol table entry: the declared type, and — for
/// `const` bindings — the folded value used to evaluate later constant
/// expressions (array dimensions, other `const` initializers).
#[derive(Clone, Debug)]
pub struct FrontendEntry {
    pub ty: Type,
    pub const_val: Option<i32>,
}

/// Output of a successful check: every expression decorated with its type,
/// and every declaration (variable or parameter) decorated with its fully
/// resolved type (including folded array dimensions), keyed by the
/// declaration's [`NodeId`] so the generator never has to re-fold a
/// constant-expression dimension.
pub struct Checked {
    pub expr_ty: Map<NodeId, Type>,
    pub decl_ty: Map<NodeId, Type>,
}

pub fn check(cu: &CompUnit) -> Result<Checked> {
    let mut c = Checker {
        scopes: ChainedMap::new(),
        loop_depth: 0,
        cur_ret: Type::Void,
        expr_ty: Map::new(),
        decl_ty: Map::new(),
    };
    c.populate_builtins();
    for item in &cu.items {
        c.check_item(item)?;
    }
    if c.scopes.get(&crate::common::intern("main")).is_none() {
        return Err(CompileError::semantic(
            Span::default(),
            "program has no `main` function",
        ));
    }
    Ok(Checked {
        expr_ty: c.expr_ty,
        decl_ty: c.decl_ty,
    })
}

struct Checker {
    scopes: ChainedMap<Id, FrontendEntry>,
    loop_depth: u32,
    cur_ret: Type,
    expr_ty: Map<NodeId, Type>,
    decl_ty: Map<NodeId, Type>,
}

impl Checker {
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
                Type::func(
                    Type::Void,
                    vec![Type::Int, Type::array(Type::Int, None)],
                ),
            ),
            (
                "_sysy_starttime",
                Type::func(Type::Void, vec![Type::Int]),
            ),
            ("_sysy_stoptime", Type::func(Type::Void, vec![Type::Int])),
        ];
        for (name, ty) in defs {
            self.scopes.insert(
                crate::common::intern(name),
                FrontendEntry {
                    ty: ty.clone(),
                    const_val: None,
                },
            );
        }
    }

    fn check_item(&mut self, item: &Item) -> Result<()> {
        match item {
            Item::VarDecl(v) => self.check_var_decl(v),
            Item::FuncDef(f) => self.check_func_def(f),
        }
    }

    fn resolve_array_type(&mut self, base: Type, dims: &[Expr]) -> Result<Type> {
        let mut ty = base;
        for dim in dims.iter().rev() {
            let n = self.eval_const(dim)?;
            if n < 0 {
                return Err(CompileError::semantic(
                    dim.span,
                    "array dimension must be non-negative",
                ));
            }
            ty = Type::array(ty, Some(n as usize));
        }
        Ok(ty)
    }

    fn check_var_decl(&mut self, v: &VarDecl) -> Result<()> {
        if self.scopes.defined_in_innermost(&v.name) {
            return Err(CompileError::semantic(
                v.span,
                format!("redefinition of `{}`", v.name),
            ));
        }
        let ty = self.resolve_array_type(v.ty.clone(), &v.dims)?;
        let mut const_val = None;
        if let Some(init) = &v.init {
            self.check_init(init, &ty)?;
            if v.is_const {
                if let Init::Expr(e) = init {
                    const_val = Some(self.eval_const(e)?);
                } else {
                    // Array consts are folded element-wise by the generator;
                    // no single scalar value applies here.
                }
            }
        } else if v.is_const {
            return Err(CompileError::semantic(
                v.span,
                "const declaration requires an initializer",
            ));
        }
        self.decl_ty.insert(v.id, ty.clone());
        self.scopes
            .insert(v.name, FrontendEntry { ty, const_val });
        Ok(())
    }

    fn check_init(&mut self, init: &Init, ty: &Type) -> Result<()> {
        match (init, ty) {
            (Init::Expr(e), _) => {
                let t = self.check_expr(e)?;
                if t.is_array() {
                    return Err(CompileError::semantic(
                        e.span,
                        "cannot initialize a scalar from an array",
                    ));
                }
                Ok(())
            }
            (Init::List(items), Type::Array { elem, .. }) => {
                for item in items {
                    self.check_init(item, elem)?;
                }
                Ok(())
            }
            (Init::List(_), _) => Err(CompileError::semantic(
                Span::default(),
                "brace initializer used for a scalar",
            )),
        }
    }

    fn check_func_def(&mut self, f: &FuncDef) -> Result<()> {
        if self.scopes.defined_in_innermost(&f.name) {
            return Err(CompileError::semantic(
                f.span,
                format!("redefinition of `{}`", f.name),
            ));
        }
        let param_tys: Result<Vec<Type>> = f
            .params
            .iter()
            .map(|p| self.resolve_param_type(p))
            .collect();
        let param_tys = param_tys?;
        self.scopes.insert(
            f.name,
            FrontendEntry {
                ty: Type::func(f.ret.clone(), param_tys.clone()),
                const_val: None,
            },
        );

        self.scopes.push();
        for (p, ty) in f.params.iter().zip(param_tys) {
            self.scopes.insert(
                p.name,
                FrontendEntry {
                    ty,
                    const_val: None,
                },
            );
        }
        let saved_ret = std::mem::replace(&mut self.cur_ret, f.ret.clone());
        for stmt in &f.body.0 {
            self.check_stmt(stmt)?;
        }
        self.cur_ret = saved_ret;
        self.scopes.pop();
        Ok(())
    }

    fn resolve_param_type(&mut self, p: &Param) -> Result<Type> {
        if p.array_dims.is_empty() {
            self.decl_ty.insert(p.id, p.ty.clone());
            return Ok(p.ty.clone());
        }
        let mut ty = p.ty.clone();
        for dim in p.array_dims.iter().skip(1).rev() {
            let dim = dim
                .as_ref()
                .ok_or_else(|| CompileError::semantic(p.span, "only the first array dimension of a parameter may be unsized"))?;
            let n = self.eval_const(dim)?;
            ty = Type::array(ty, Some(n as usize));
        }
        // First dimension decays to an unsized pointer.
        ty = Type::array(ty, None);
        self.decl_ty.insert(p.id, ty.clone());
        Ok(ty)
    }

    fn check_stmt(&mut self, s: &Stmt) -> Result<()> {
        match s {
            Stmt::Block(b) => {
                self.scopes.push();
                for st in &b.0 {
                    self.check_stmt(st)?;
                }
                self.scopes.pop();
                Ok(())
            }
            Stmt::Expr(e) => {
                if let Some(e) = e {
                    self.check_expr(e)?;
                }
                Ok(())
            }
            Stmt::VarDecl(v) => self.check_var_decl(v),
            Stmt::Assign(lhs, rhs) => {
                self.check_lvalue(lhs)?;
                let rt = self.check_expr(rhs)?;
                if matches!(rt, Type::Void) {
                    return Err(CompileError::semantic(
                        rhs.span,
                        "cannot use a void expression as a value",
                    ));
                }
                Ok(())
            }
            Stmt::If { cond, then, els } => {
                self.check_expr(cond)?;
                self.check_stmt(then)?;
                if let Some(els) = els {
                    self.check_stmt(els)?;
                }
                Ok(())
            }
            Stmt::While { cond, body } => {
                self.check_expr(cond)?;
                self.loop_depth += 1;
                self.check_stmt(body)?;
                self.loop_depth -= 1;
                Ok(())
            }
            Stmt::Break(span) => {
                if self.loop_depth == 0 {
                    return Err(CompileError::semantic(*span, "`break` outside a loop"));
                }
                Ok(())
            }
            Stmt::Continue(span) => {
                if self.loop_depth == 0 {
                    return Err(CompileError::semantic(*span, "`continue` outside a loop"));
                }
                Ok(())
            }
            Stmt::Return(value, span) => {
                match (value, &self.cur_ret) {
                    (None, _) => {}
                    (Some(e), Type::Void) => {
                        return Err(CompileError::semantic(
                            e.span,
                            "returning a value from a void function",
                        ))
                    }
                    (Some(e), _) => {
                        let t = self.check_expr(e)?;
                        if t.is_array() {
                            return Err(CompileError::semantic(
                                e.span,
                                "cannot return an array",
                            ));
                        }
                    }
                }
                let _ = span;
                Ok(())
            }
        }
    }

    fn check_lvalue(&mut self, e: &Expr) -> Result<Type> {
        let ty = self.check_expr(e)?;
        match &e.kind {
            ExprKind::Ident(_) | ExprKind::Index { .. } => {
                if ty.is_array() {
                    return Err(CompileError::semantic(
                        e.span,
                        "cannot assign to an entire array",
                    ));
                }
                Ok(ty)
            }
            _ => Err(CompileError::semantic(e.span, "invalid assignment target")),
        }
    }

    fn check_expr(&mut self, e: &Expr) -> Result<Type> {
        let ty = self.check_expr_inner(e)?;
        self.expr_ty.insert(e.id, ty.clone());
        Ok(ty)
    }

    fn check_expr_inner(&mut self, e: &Expr) -> Result<Type> {
        match &e.kind {
            ExprKind::ConstInt(_) => Ok(Type::Int),
            ExprKind::Ident(name) => {
                let entry = self
                    .scopes
                    .get(name)
                    .ok_or_else(|| CompileError::semantic(e.span, format!("undefined identifier `{name}`")))?;
                if matches!(entry.ty, Type::Func { .. }) {
                    return Err(CompileError::semantic(
                        e.span,
                        format!("`{name}` is a function, not a value"),
                    ));
                }
                Ok(entry.ty.clone())
            }
            ExprKind::Unary { op: _, rhs } => {
                let t = self.check_expr(rhs)?;
                if t.is_array() {
                    return Err(CompileError::semantic(e.span, "unary operator on an array"));
                }
                Ok(Type::Int)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lt = self.check_expr(lhs)?;
                let rt = self.check_expr(rhs)?;
                let _ = op;
                if lt.is_array() || rt.is_array() {
                    return Err(CompileError::semantic(
                        e.span,
                        "binary operator on an array value",
                    ));
                }
                Ok(Type::Int)
            }
            ExprKind::Index { base, index } => {
                let bt = self.check_expr(base)?;
                let it = self.check_expr(index)?;
                if it.is_array() {
                    return Err(CompileError::semantic(index.span, "array index must be an int"));
                }
                match &bt {
                    Type::Array { elem, .. } => Ok((**elem).clone()),
                    _ => Err(CompileError::semantic(base.span, "indexing a non-array value")),
                }
            }
            ExprKind::Call { name, args } => {
                let entry = self
                    .scopes
                    .get(name)
                    .ok_or_else(|| CompileError::semantic(e.span, format!("call to undefined function `{name}`")))?
                    .clone();
                let Type::Func { ret, params } = &entry.ty else {
                    return Err(CompileError::semantic(e.span, format!("`{name}` is not a function")));
                };
                if params.len() != args.len() {
                    return Err(CompileError::semantic(
                        e.span,
                        format!(
                            "`{name}` expects {} argument(s), got {}",
                            params.len(),
                            args.len()
                        ),
                    ));
                }
                for a in args {
                    self.check_expr(a)?;
                }
                Ok((**ret).clone())
            }
        }
    }

    /// Evaluate a constant-expression dimension/initializer, failing with a
    /// semantic error if it is not actually constant.
    fn eval_const(&mut self, e: &Expr) -> Result<i32> {
        match &e.kind {
            ExprKind::ConstInt(v) => Ok(*v),
            ExprKind::Ident(name) => {
                let entry = self
                    .scopes
                    .get(name)
                    .ok_or_else(|| CompileError::semantic(e.span, format!("undefined identifier `{name}`")))?;
                entry.const_val.ok_or_else(|| {
                    CompileError::semantic(e.span, format!("`{name}` is not a constant expression"))
                })
            }
            ExprKind::Unary { op, rhs } => {
                let v = self.eval_const(rhs)?;
                Ok(match op {
                    UnaryOp::Neg => -v,
                    UnaryOp::Not => (v == 0) as i32,
                    UnaryOp::Plus => v,
                })
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.eval_const(lhs)?;
                let r = self.eval_const(rhs)?;
                Ok(match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l.checked_div(r).ok_or_else(|| {
                        CompileError::semantic(e.span, "division by zero in constant expression")
                    })?,
                    BinaryOp::Mod => l.checked_rem(r).ok_or_else(|| {
                        CompileError::semantic(e.span, "modulo by zero in constant expression")
                    })?,
                    BinaryOp::And => ((l != 0) && (r != 0)) as i32,
                    BinaryOp::Or => ((l != 0) || (r != 0)) as i32,
                    BinaryOp::Gt => (l > r) as i32,
                    BinaryOp::Lt => (l < r) as i32,
                    BinaryOp::Ge => (l >= r) as i32,
                    BinaryOp::Le => (l <= r) as i32,
                    BinaryOp::Eq => (l == r) as i32,
                    BinaryOp::Ne => (l != r) as i32,
                })
            }
            _ => Err(CompileError::semantic(
                e.span,
                "not a constant expression",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::parse::parse;

    #[test]
    fn rejects_undefined_identifier() {
        let cu = parse("int main() { return x; }").unwrap();
        assert!(check(&cu).is_err());
    }

    #[test]
    fn rejects_break_outside_loop() {
        let cu = parse("int main() { break; }").unwrap();
        assert!(check(&cu).is_err());
    }

    #[test]
    fn rejects_arity_mismatch() {
        let cu = parse("int main() { putint(1, 2); return 0; }").unwrap();
        assert!(check(&cu).is_err());
    }

    #[test]
    fn rejects_nonconstant_dimension() {
        let cu = parse("int main() { int n; int a[n]; return 0; }").unwrap();
        assert!(check(&cu).is_err());
    }

    #[test]
    fn accepts_well_formed_program() {
        let cu = parse(
            "const int N = 4; int a[N]; int main() { int i; i = 0; while (i < N) { a[i] = i; i = i + 1; } return a[0]; }",
        )
        .unwrap();
        assert!(check(&cu).is_ok());
    }
}
