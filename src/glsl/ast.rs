use crate::utils::info::*;
use crate::utils::name::Name;
use crate::utils::smap::*;

pub use crate::hlsl::ast::{BufferType, InterpModifier};
pub use crate::utils::ast::{AssignOp, BinOp, ExprType, PostUnOp, UnOp};
pub use crate::utils::data_type::DataType;

// The target-language AST. It is deliberately smaller than the source AST: semantics, registers,
// attributes and texture-object methods have all been lowered by the converter, so only plain
// GLSL constructs remain.

#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Void,
    Data(DataType),
    Sampler {kind: BufferType, base: DataType, shadow: bool},
    Image {kind: BufferType, base: DataType},
    Struct {id: Name},
    Array {elem: Box<Type>, dims: Vec<i64>},
}

impl Type {
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Type::Data(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn is_vector(&self) -> bool {
        self.data_type().map(|t| t.is_vector()).unwrap_or(false)
    }
}

#[derive(Clone, Debug)]
pub enum Expr {
    Var {id: Name, ty: Type, i: Info},
    IntLit {text: String, ty: Type, i: Info},
    FloatLit {text: String, ty: Type, i: Info},
    BoolLit {v: bool, ty: Type, i: Info},
    UnOp {op: UnOp, arg: Box<Expr>, ty: Type, i: Info},
    PostUnOp {op: PostUnOp, arg: Box<Expr>, ty: Type, i: Info},
    BinOp {lhs: Box<Expr>, op: BinOp, rhs: Box<Expr>, ty: Type, i: Info},
    Assign {lhs: Box<Expr>, op: AssignOp, rhs: Box<Expr>, ty: Type, i: Info},
    Ternary {cond: Box<Expr>, thn: Box<Expr>, els: Box<Expr>, ty: Type, i: Info},
    Call {id: Name, args: Vec<Expr>, ty: Type, i: Info},
    Ctor {to: Type, args: Vec<Expr>, ty: Type, i: Info},
    Member {target: Box<Expr>, member: String, ty: Type, i: Info},
    Index {target: Box<Expr>, idx: Box<Expr>, ty: Type, i: Info},
    Sequence {exprs: Vec<Expr>, ty: Type, i: Info},

    // Grouping kept from lowering steps that must parenthesize regardless of precedence, such as
    // the operator form of mul().
    Paren {e: Box<Expr>, ty: Type, i: Info},
}

impl ExprType<Type> for Expr {
    fn get_type<'a>(&'a self) -> &'a Type {
        match self {
            Expr::Var {ty, ..} => ty,
            Expr::IntLit {ty, ..} => ty,
            Expr::FloatLit {ty, ..} => ty,
            Expr::BoolLit {ty, ..} => ty,
            Expr::UnOp {ty, ..} => ty,
            Expr::PostUnOp {ty, ..} => ty,
            Expr::BinOp {ty, ..} => ty,
            Expr::Assign {ty, ..} => ty,
            Expr::Ternary {ty, ..} => ty,
            Expr::Call {ty, ..} => ty,
            Expr::Ctor {ty, ..} => ty,
            Expr::Member {ty, ..} => ty,
            Expr::Index {ty, ..} => ty,
            Expr::Sequence {ty, ..} => ty,
            Expr::Paren {ty, ..} => ty,
        }
    }

    fn is_leaf_node(&self) -> bool {
        match self {
            Expr::Var {..} | Expr::IntLit {..} | Expr::FloatLit {..} |
            Expr::BoolLit {..} | Expr::Call {..} | Expr::Ctor {..} |
            Expr::Member {..} | Expr::Index {..} | Expr::Paren {..} => true,
            _ => false,
        }
    }
}

impl InfoNode for Expr {
    fn get_info(&self) -> Info {
        match self {
            Expr::Var {i, ..} => i.clone(),
            Expr::IntLit {i, ..} => i.clone(),
            Expr::FloatLit {i, ..} => i.clone(),
            Expr::BoolLit {i, ..} => i.clone(),
            Expr::UnOp {i, ..} => i.clone(),
            Expr::PostUnOp {i, ..} => i.clone(),
            Expr::BinOp {i, ..} => i.clone(),
            Expr::Assign {i, ..} => i.clone(),
            Expr::Ternary {i, ..} => i.clone(),
            Expr::Call {i, ..} => i.clone(),
            Expr::Ctor {i, ..} => i.clone(),
            Expr::Member {i, ..} => i.clone(),
            Expr::Index {i, ..} => i.clone(),
            Expr::Sequence {i, ..} => i.clone(),
            Expr::Paren {i, ..} => i.clone(),
        }
    }
}

impl SFold<Expr> for Expr {
    fn sfold_result<A, E>(
        &self,
        acc: Result<A, E>,
        f: impl Fn(A, &Expr) -> Result<A, E>
    ) -> Result<A, E> {
        match self {
            Expr::UnOp {arg, ..} => f(acc?, arg),
            Expr::PostUnOp {arg, ..} => f(acc?, arg),
            Expr::BinOp {lhs, rhs, ..} => f(f(acc?, lhs)?, rhs),
            Expr::Assign {lhs, rhs, ..} => f(f(acc?, lhs)?, rhs),
            Expr::Ternary {cond, thn, els, ..} => f(f(f(acc?, cond)?, thn)?, els),
            Expr::Call {args, ..} => args.sfold_result(acc, &f),
            Expr::Ctor {args, ..} => args.sfold_result(acc, &f),
            Expr::Member {target, ..} => f(acc?, target),
            Expr::Index {target, idx, ..} => f(f(acc?, target)?, idx),
            Expr::Sequence {exprs, ..} => exprs.sfold_result(acc, &f),
            Expr::Paren {e, ..} => f(acc?, e),
            Expr::Var {..} | Expr::IntLit {..} | Expr::FloatLit {..} |
            Expr::BoolLit {..} => acc,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Decl {is_const: bool, ty: Type, id: Name, init: Option<Expr>, i: Info},
    Expr {e: Expr, i: Info},
    Block {body: Vec<Stmt>, i: Info},
    If {cond: Expr, thn: Vec<Stmt>, els: Vec<Stmt>, i: Info},
    While {cond: Expr, body: Vec<Stmt>, i: Info},
    DoWhile {body: Vec<Stmt>, cond: Expr, i: Info},
    For {
        init: Vec<Stmt>, cond: Option<Expr>, incr: Option<Expr>,
        body: Vec<Stmt>, i: Info
    },
    Switch {cond: Expr, cases: Vec<SwitchCase>, i: Info},
    Return {value: Option<Expr>, i: Info},
    Break {i: Info},
    Continue {i: Info},
    Discard {i: Info},
}

#[derive(Clone, Debug)]
pub struct SwitchCase {
    pub value: Option<Expr>,
    pub body: Vec<Stmt>,
    pub i: Info,
}

impl InfoNode for Stmt {
    fn get_info(&self) -> Info {
        match self {
            Stmt::Decl {i, ..} => i.clone(),
            Stmt::Expr {i, ..} => i.clone(),
            Stmt::Block {i, ..} => i.clone(),
            Stmt::If {i, ..} => i.clone(),
            Stmt::While {i, ..} => i.clone(),
            Stmt::DoWhile {i, ..} => i.clone(),
            Stmt::For {i, ..} => i.clone(),
            Stmt::Switch {i, ..} => i.clone(),
            Stmt::Return {i, ..} => i.clone(),
            Stmt::Break {i} => i.clone(),
            Stmt::Continue {i} => i.clone(),
            Stmt::Discard {i} => i.clone(),
        }
    }
}

impl SFold<Expr> for Stmt {
    fn sfold_result<A, E>(
        &self,
        acc: Result<A, E>,
        f: impl Fn(A, &Expr) -> Result<A, E>
    ) -> Result<A, E> {
        match self {
            Stmt::Decl {init: Some(e), ..} => f(acc?, e),
            Stmt::Decl {init: None, ..} => acc,
            Stmt::Expr {e, ..} => f(acc?, e),
            Stmt::Block {..} => acc,
            Stmt::If {cond, ..} => f(acc?, cond),
            Stmt::While {cond, ..} => f(acc?, cond),
            Stmt::DoWhile {cond, ..} => f(acc?, cond),
            Stmt::For {cond, incr, ..} => {
                let acc = match cond {
                    Some(e) => f(acc?, e),
                    None => acc,
                };
                match incr {
                    Some(e) => f(acc?, e),
                    None => acc,
                }
            },
            Stmt::Switch {cond, ..} => f(acc?, cond),
            Stmt::Return {value: Some(e), ..} => f(acc?, e),
            Stmt::Return {value: None, ..} | Stmt::Break {..} |
            Stmt::Continue {..} | Stmt::Discard {..} => acc,
        }
    }
}

impl SFold<Stmt> for Stmt {
    fn sfold_result<A, E>(
        &self,
        acc: Result<A, E>,
        f: impl Fn(A, &Stmt) -> Result<A, E>
    ) -> Result<A, E> {
        match self {
            Stmt::Block {body, ..} => body.sfold_result(acc, &f),
            Stmt::If {thn, els, ..} => els.sfold_result(thn.sfold_result(acc, &f), &f),
            Stmt::While {body, ..} => body.sfold_result(acc, &f),
            Stmt::DoWhile {body, ..} => body.sfold_result(acc, &f),
            Stmt::For {init, body, ..} =>
                body.sfold_result(init.sfold_result(acc, &f), &f),
            Stmt::Switch {cases, ..} => {
                cases.iter().fold(acc, |acc, c| c.body.sfold_result(acc, &f))
            },
            _ => acc,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamQual {
    In, Out, InOut,
}

#[derive(Clone, Debug)]
pub struct Param {
    pub qual: ParamQual,
    pub ty: Type,
    pub id: Name,
    pub i: Info,
}

#[derive(Clone, Debug)]
pub struct Field {
    pub ty: Type,
    pub id: Name,
    pub i: Info,
}

// Stage-specific layout declarations, printed as "layout(...) in;" / "layout(...) out;" lines in
// the program header.
#[derive(Clone, Debug, PartialEq)]
pub enum LayoutDecl {
    LocalSize {x: i64, y: i64, z: i64},
    EarlyFragmentTests,
    TessControlOut {vertices: i64},
    TessEvaluationIn {domain: String, partitioning: String, topology: String},
    GeometryIn {primitive: String},
    GeometryOut {topology: String, max_vertices: i64},
}

// Helper functions synthesized once per program when the matching source intrinsic is used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Helper {
    Clip,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockDir {
    In, Out,
}

#[derive(Clone, Debug)]
pub enum Top {
    UniformBlock {
        binding: Option<usize>,
        id: Name,
        fields: Vec<Field>,
        i: Info,
    },
    StorageBlock {
        binding: Option<usize>,
        readonly: bool,
        id: Name,
        elem_ty: Type,
        field_id: Name,
        i: Info,
    },
    UniformSampler {binding: Option<usize>, ty: Type, id: Name, i: Info},
    UniformImage {binding: Option<usize>, ty: Type, id: Name, i: Info},
    UniformVar {ty: Type, id: Name, i: Info},
    GlobalIn {
        location: Option<usize>,
        interp: Vec<InterpModifier>,
        ty: Type,
        id: Name,
        i: Info,
    },
    GlobalOut {location: Option<usize>, ty: Type, id: Name, i: Info},
    InterfaceBlock {
        dir: BlockDir,
        name: Name,
        alias: Name,
        fields: Vec<Field>,
        i: Info,
    },
    StructDef {id: Name, fields: Vec<Field>, i: Info},
    GlobalVar {is_const: bool, ty: Type, id: Name, init: Option<Expr>, i: Info},
    FunDef {ret: Type, id: Name, params: Vec<Param>, body: Vec<Stmt>, i: Info},
}

impl InfoNode for Top {
    fn get_info(&self) -> Info {
        match self {
            Top::UniformBlock {i, ..} => i.clone(),
            Top::StorageBlock {i, ..} => i.clone(),
            Top::UniformSampler {i, ..} => i.clone(),
            Top::UniformImage {i, ..} => i.clone(),
            Top::UniformVar {i, ..} => i.clone(),
            Top::GlobalIn {i, ..} => i.clone(),
            Top::GlobalOut {i, ..} => i.clone(),
            Top::InterfaceBlock {i, ..} => i.clone(),
            Top::StructDef {i, ..} => i.clone(),
            Top::GlobalVar {i, ..} => i.clone(),
            Top::FunDef {i, ..} => i.clone(),
        }
    }
}

// Layout metadata gathered from entry-point attributes, one optional record per stage kind.
#[derive(Clone, Debug, Default)]
pub struct StageLayouts {
    pub tess_control: Option<TessControlLayout>,
    pub tess_evaluation: Option<TessEvaluationLayout>,
    pub geometry: Option<GeometryLayout>,
    pub fragment: Option<FragmentLayout>,
    pub compute: Option<ComputeLayout>,
}

#[derive(Clone, Debug)]
pub struct TessControlLayout {
    pub output_control_points: i64,
    pub patch_constant_fn: Option<String>,
    pub max_tess_factor: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct TessEvaluationLayout {
    pub domain: String,
    pub partitioning: String,
    pub output_topology: String,
}

#[derive(Clone, Debug)]
pub struct GeometryLayout {
    pub max_vertex_count: i64,
}

#[derive(Clone, Debug)]
pub struct FragmentLayout {
    pub early_depth_stencil: bool,
}

#[derive(Clone, Debug)]
pub struct ComputeLayout {
    pub local_size: (i64, i64, i64),
}

#[derive(Clone, Debug)]
pub struct Program {
    pub version: u32,
    pub extensions: Vec<String>,
    pub layout_decls: Vec<LayoutDecl>,
    pub helpers: Vec<Helper>,
    pub tops: Vec<Top>,
    pub layouts: StageLayouts,

    // Presentation settings threaded from the compile options.
    pub header: String,
    pub line_markers: bool,
}
