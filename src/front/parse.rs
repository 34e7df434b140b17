//! The parser — recursive descent, precedence climbing for expressions.

use std::fmt::Debug;

use derive_more::derive::Display;

use crate::common::{intern, NodeId, Span};

use super::ast::*;
use super::lex::*;
use super::types::Type;

#[derive(Display)]
#[display("Parse error: {} at {}", self.msg, self.span)]
pub struct ParseError {
    pub span: Span,
    pub msg: String,
}

impl Debug for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl std::error::Error for ParseError {}

pub fn parse(input: &str) -> Result<CompUnit, ParseError> {
    let mut toks = vec![];
    let mut lex = Lexer::new(input);
    loop {
        match lex.next() {
            Ok(Some(t)) => toks.push(t),
            Ok(None) => break,
            Err(e) => {
                return Err(ParseError {
                    span: e.span,
                    msg: format!("{e}"),
                })
            }
        }
    }
    let mut parser = Parser {
        toks,
        pos: 0,
        next_node_id: 0,
    };
    parser.comp_unit()
}

struct Parser<'src> {
    toks: Vec<Token<'src>>,
    pos: usize,
    next_node_id: NodeId,
}

impl<'src> Parser<'src> {
    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    fn peek(&self) -> Option<&Token<'src>> {
        self.toks.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn span(&self) -> Span {
        self.peek()
            .map(|t| t.span)
            .unwrap_or(self.toks.last().map(|t| t.span).unwrap_or_default())
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        ParseError {
            span: self.span(),
            msg: msg.into(),
        }
    }

    fn bump(&mut self) -> Token<'src> {
        let t = self.toks[self.pos].clone();
        self.pos += 1;
        t
    }

    fn eat(&mut self, kind: TokenKind) -> Result<Token<'src>, ParseError> {
        if self.peek_kind() == Some(kind) {
            Ok(self.bump())
        } else {
            Err(self.err(format!(
                "expected {kind}, found {}",
                self.peek()
                    .map(|t| t.kind.to_string())
                    .unwrap_or_else(|| "end of input".into())
            )))
        }
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn eat_if(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    // ---- top level ----

    fn comp_unit(&mut self) -> Result<CompUnit, ParseError> {
        let mut items = vec![];
        while self.peek().is_some() {
            items.push(self.item()?);
        }
        Ok(CompUnit { items })
    }

    fn base_type(&mut self) -> Result<Type, ParseError> {
        if self.eat_if(TokenKind::KwInt) {
            Ok(Type::Int)
        } else if self.eat_if(TokenKind::KwVoid) {
            Ok(Type::Void)
        } else {
            Err(self.err("expected a type"))
        }
    }

    fn item(&mut self) -> Result<Item, ParseError> {
        let span = self.span();
        let is_const = self.eat_if(TokenKind::KwConst);
        let ty = self.base_type()?;
        let name_tok = self.eat(TokenKind::Id)?;
        let name = intern(name_tok.text);

        if self.at(TokenKind::LParen) {
            if is_const {
                return Err(self.err("function definitions cannot be const"));
            }
            return Ok(Item::FuncDef(self.func_def_rest(ty, name, span)?));
        }

        let decl = self.var_decl_rest(is_const, ty, name, span)?;
        Ok(Item::VarDecl(decl))
    }

    fn var_decl_rest(
        &mut self,
        is_const: bool,
        ty: Type,
        name: crate::common::Id,
        span: Span,
    ) -> Result<VarDecl, ParseError> {
        let mut dims = vec![];
        while self.eat_if(TokenKind::LBracket) {
            dims.push(self.expr()?);
            self.eat(TokenKind::RBracket)?;
        }
        let init = if self.eat_if(TokenKind::Assign) {
            Some(self.initializer()?)
        } else {
            None
        };
        self.eat(TokenKind::Semi)?;
        let id = self.fresh_id();
        Ok(VarDecl {
            id,
            is_const,
            ty,
            name,
            dims,
            init,
            span,
        })
    }

    fn initializer(&mut self) -> Result<Init, ParseError> {
        if self.eat_if(TokenKind::LBrace) {
            let mut items = vec![];
            if !self.at(TokenKind::RBrace) {
                items.push(self.initializer()?);
                while self.eat_if(TokenKind::Comma) {
                    items.push(self.initializer()?);
                }
            }
            self.eat(TokenKind::RBrace)?;
            Ok(Init::List(items))
        } else {
            Ok(Init::Expr(self.expr()?))
        }
    }

    fn func_def_rest(
        &mut self,
        ret: Type,
        name: crate::common::Id,
        span: Span,
    ) -> Result<FuncDef, ParseError> {
        self.eat(TokenKind::LParen)?;
        let mut params = vec![];
        if !self.at(TokenKind::RParen) {
            params.push(self.param()?);
            while self.eat_if(TokenKind::Comma) {
                params.push(self.param()?);
            }
        }
        self.eat(TokenKind::RParen)?;
        let body = self.block()?;
        Ok(FuncDef {
            ret,
            name,
            params,
            body,
            span,
        })
    }

    fn param(&mut self) -> Result<Param, ParseError> {
        let span = self.span();
        let ty = self.base_type()?;
        let name_tok = self.eat(TokenKind::Id)?;
        let name = intern(name_tok.text);
        let mut array_dims = vec![];
        if self.eat_if(TokenKind::LBracket) {
            self.eat(TokenKind::RBracket)?;
            array_dims.push(None);
            while self.eat_if(TokenKind::LBracket) {
                array_dims.push(Some(self.expr()?));
                self.eat(TokenKind::RBracket)?;
            }
        }
        let id = self.fresh_id();
        Ok(Param {
            id,
            ty,
            name,
            array_dims,
            span,
        })
    }

    // ---- statements ----

    fn block(&mut self) -> Result<Block, ParseError> {
        self.eat(TokenKind::LBrace)?;
        let mut stmts = vec![];
        while !self.at(TokenKind::RBrace) {
            stmts.push(self.stmt()?);
        }
        self.eat(TokenKind::RBrace)?;
        Ok(Block(stmts))
    }

    fn stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::LBrace) => Ok(Stmt::Block(self.block()?)),
            Some(TokenKind::KwIf) => self.if_stmt(),
            Some(TokenKind::KwWhile) => self.while_stmt(),
            Some(TokenKind::KwBreak) => {
                let span = self.bump().span;
                self.eat(TokenKind::Semi)?;
                Ok(Stmt::Break(span))
            }
            Some(TokenKind::KwContinue) => {
                let span = self.bump().span;
                self.eat(TokenKind::Semi)?;
                Ok(Stmt::Continue(span))
            }
            Some(TokenKind::KwReturn) => {
                let span = self.bump().span;
                let value = if self.at(TokenKind::Semi) {
                    None
                } else {
                    Some(self.expr()?)
                };
                self.eat(TokenKind::Semi)?;
                Ok(Stmt::Return(value, span))
            }
            Some(TokenKind::KwInt) | Some(TokenKind::KwVoid) | Some(TokenKind::KwConst) => {
                let span = self.span();
                let is_const = self.eat_if(TokenKind::KwConst);
                let ty = self.base_type()?;
                let name_tok = self.eat(TokenKind::Id)?;
                let name = intern(name_tok.text);
                Ok(Stmt::VarDecl(self.var_decl_rest(is_const, ty, name, span)?))
            }
            Some(TokenKind::Semi) => {
                self.bump();
                Ok(Stmt::Expr(None))
            }
            _ => self.simple_or_assign_stmt(),
        }
    }

    fn simple_or_assign_stmt(&mut self) -> Result<Stmt, ParseError> {
        let e = self.expr()?;
        if self.eat_if(TokenKind::Assign) {
            let rhs = self.expr()?;
            self.eat(TokenKind::Semi)?;
            Ok(Stmt::Assign(e, rhs))
        } else {
            self.eat(TokenKind::Semi)?;
            Ok(Stmt::Expr(Some(e)))
        }
    }

    fn if_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.bump();
        self.eat(TokenKind::LParen)?;
        let cond = self.expr()?;
        self.eat(TokenKind::RParen)?;
        let then = Box::new(self.stmt()?);
        let els = if self.eat_if(TokenKind::KwElse) {
            Some(Box::new(self.stmt()?))
        } else {
            None
        };
        Ok(Stmt::If { cond, then, els })
    }

    fn while_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.bump();
        self.eat(TokenKind::LParen)?;
        let cond = self.expr()?;
        self.eat(TokenKind::RParen)?;
        let body = Box::new(self.stmt()?);
        Ok(Stmt::While { cond, body })
    }

    // ---- expressions: || < && < eq < rel < add < mul < unary < postfix < primary ----

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and_expr()?;
        while self.at(TokenKind::OrOr) {
            let span = self.bump().span;
            let rhs = self.and_expr()?;
            lhs = self.mk_binary(BinaryOp::Or, lhs, rhs, span);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.eq_expr()?;
        while self.at(TokenKind::AndAnd) {
            let span = self.bump().span;
            let rhs = self.eq_expr()?;
            lhs = self.mk_binary(BinaryOp::And, lhs, rhs, span);
        }
        Ok(lhs)
    }

    fn eq_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.rel_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Eq) => BinaryOp::Eq,
                Some(TokenKind::Ne) => BinaryOp::Ne,
                _ => break,
            };
            let span = self.bump().span;
            let rhs = self.rel_expr()?;
            lhs = self.mk_binary(op, lhs, rhs, span);
        }
        Ok(lhs)
    }

    fn rel_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.add_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Lt) => BinaryOp::Lt,
                Some(TokenKind::Gt) => BinaryOp::Gt,
                Some(TokenKind::Le) => BinaryOp::Le,
                Some(TokenKind::Ge) => BinaryOp::Ge,
                _ => break,
            };
            let span = self.bump().span;
            let rhs = self.add_expr()?;
            lhs = self.mk_binary(op, lhs, rhs, span);
        }
        Ok(lhs)
    }

    fn add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            let span = self.bump().span;
            let rhs = self.mul_expr()?;
            lhs = self.mk_binary(op, lhs, rhs, span);
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::Percent) => BinaryOp::Mod,
                _ => break,
            };
            let span = self.bump().span;
            let rhs = self.unary_expr()?;
            lhs = self.mk_binary(op, lhs, rhs, span);
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Minus) => Some(UnaryOp::Neg),
            Some(TokenKind::Not) => Some(UnaryOp::Not),
            Some(TokenKind::Plus) => Some(UnaryOp::Plus),
            _ => None,
        };
        if let Some(op) = op {
            let span = self.bump().span;
            let rhs = self.unary_expr()?;
            let id = self.fresh_id();
            return Ok(Expr {
                id,
                kind: ExprKind::Unary {
                    op,
                    rhs: Box::new(rhs),
                },
                span,
            });
        }
        self.postfix_expr()
    }

    fn postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let mut e = self.primary_expr()?;
        loop {
            if self.at(TokenKind::LBracket) {
                let span = self.bump().span;
                let index = self.expr()?;
                self.eat(TokenKind::RBracket)?;
                let id = self.fresh_id();
                e = Expr {
                    id,
                    kind: ExprKind::Index {
                        base: Box::new(e),
                        index: Box::new(index),
                    },
                    span,
                };
            } else {
                break;
            }
        }
        Ok(e)
    }

    fn primary_expr(&mut self) -> Result<Expr, ParseError> {
        let span = self.span();
        match self.peek_kind() {
            Some(TokenKind::LParen) => {
                self.bump();
                let e = self.expr()?;
                self.eat(TokenKind::RParen)?;
                Ok(e)
            }
            Some(TokenKind::IntLit) => {
                let tok = self.bump();
                let v = parse_int_literal(tok.text);
                let id = self.fresh_id();
                Ok(Expr {
                    id,
                    kind: ExprKind::ConstInt(v),
                    span,
                })
            }
            Some(TokenKind::Id) => {
                let tok = self.bump();
                let name = intern(tok.text);
                if self.eat_if(TokenKind::LParen) {
                    let mut args = vec![];
                    if !self.at(TokenKind::RParen) {
                        args.push(self.expr()?);
                        while self.eat_if(TokenKind::Comma) {
                            args.push(self.expr()?);
                        }
                    }
                    self.eat(TokenKind::RParen)?;
                    let id = self.fresh_id();
                    Ok(Expr {
                        id,
                        kind: ExprKind::Call { name, args },
                        span,
                    })
                } else {
                    let id = self.fresh_id();
                    Ok(Expr {
                        id,
                        kind: ExprKind::Ident(name),
                        span,
                    })
                }
            }
            _ => Err(self.err("expected an expression")),
        }
    }

    fn mk_binary(&mut self, op: BinaryOp, lhs: Expr, rhs: Expr, span: Span) -> Expr {
        let id = self.fresh_id();
        Expr {
            id,
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_main() {
        let cu = parse("int main() { int x = 1; }").unwrap();
        assert_eq!(cu.items.len(), 1);
        match &cu.items[0] {
            Item::FuncDef(f) => assert_eq!(f.name.to_string(), "main"),
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn parses_array_decl_and_index() {
        let cu = parse("int main() { int a[4]; return a[0]; }").unwrap();
        let Item::FuncDef(f) = &cu.items[0] else {
            panic!()
        };
        assert_eq!(f.body.0.len(), 2);
    }

    #[test]
    fn parses_short_circuit_condition() {
        let cu = parse("int main() { if (a && b) return 1; return 0; }").unwrap();
        let Item::FuncDef(f) = &cu.items[0] else {
            panic!()
        };
        match &f.body.0[0] {
            Stmt::If { cond, .. } => match &cond.kind {
                ExprKind::Binary { op, .. } => assert_eq!(*op, BinaryOp::And),
                _ => panic!("expected binary"),
            },
            _ => panic!("expected if"),
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("int main( {").is_err());
    }
}
