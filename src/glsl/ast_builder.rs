// Construction helpers for tests.

use super::ast::*;
use crate::utils::info::Info;
use crate::utils::name::Name;

pub fn id(x: &str) -> Name {
    Name::new(x.to_string())
}

pub fn scalar(dt: DataType) -> Type {
    Type::Data(dt)
}

pub fn var(v: &str, ty: Type) -> Expr {
    Expr::Var {id: id(v), ty, i: Info::default()}
}

pub fn float(text: &str) -> Expr {
    Expr::FloatLit {
        text: text.to_string(),
        ty: scalar(DataType::Float),
        i: Info::default(),
    }
}

pub fn int(text: &str) -> Expr {
    Expr::IntLit {
        text: text.to_string(),
        ty: scalar(DataType::Int),
        i: Info::default(),
    }
}

pub fn binop(lhs: Expr, op: BinOp, rhs: Expr) -> Expr {
    let ty = lhs.get_type().clone();
    Expr::BinOp {
        lhs: Box::new(lhs), op, rhs: Box::new(rhs), ty, i: Info::default()
    }
}

pub fn assign(lhs: Expr, rhs: Expr) -> Expr {
    let ty = lhs.get_type().clone();
    Expr::Assign {
        lhs: Box::new(lhs),
        op: AssignOp::Set,
        rhs: Box::new(rhs),
        ty,
        i: Info::default(),
    }
}

pub fn call(name: &str, args: Vec<Expr>, ty: Type) -> Expr {
    Expr::Call {id: id(name), args, ty, i: Info::default()}
}

pub fn expr_stmt(e: Expr) -> Stmt {
    Stmt::Expr {e, i: Info::default()}
}

pub fn decl(ty: Type, name: &str, init: Expr) -> Stmt {
    Stmt::Decl {
        is_const: false,
        ty,
        id: id(name),
        init: Some(init),
        i: Info::default(),
    }
}

pub fn fun(ret: Type, name: &str, params: Vec<Param>, body: Vec<Stmt>) -> Top {
    Top::FunDef {ret, id: id(name), params, body, i: Info::default()}
}

pub fn program(tops: Vec<Top>) -> Program {
    Program {
        version: 330,
        extensions: vec![],
        layout_decls: vec![],
        helpers: vec![],
        tops,
        layouts: StageLayouts::default(),
        header: "vertex shader".to_string(),
        line_markers: false,
    }
}
