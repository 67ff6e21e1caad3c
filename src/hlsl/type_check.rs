use super::ast::*;
use crate::scx_name_error;
use crate::scx_type_error;
use crate::utils::data_type as dt;
use crate::utils::data_type::DataType;
use crate::utils::err::*;
use crate::utils::info::{Info, InfoNode};
use crate::utils::name::Name;
use crate::utils::smap::*;

use std::collections::BTreeMap;

// Bottom-up type derivation. Every expression leaves this pass with a concrete type; calls to
// overloaded functions are resolved to the symbol of the best-matching candidate, texture-object
// method calls are replaced by intrinsic nodes with the receiver as first argument, and constant
// array dimensions are evaluated.
pub fn type_check(ast: Ast) -> CompileResult<Ast> {
    let env = collect_env(&ast)?;
    ast.smap_result(|t| type_check_top(&env, t))
}

#[derive(Clone, Debug)]
pub struct StructInfo {
    pub base: Option<Name>,
    pub fields: Vec<(String, Type)>,
}

#[derive(Clone, Debug)]
pub struct FunSig {
    pub id: Name,
    pub params: Vec<(Type, bool)>,
    pub ret: Type,
}

#[derive(Clone, Debug)]
struct TcEnv {
    vars: BTreeMap<Name, Type>,
    consts: BTreeMap<Name, i64>,
    structs: BTreeMap<Name, StructInfo>,
    funs: BTreeMap<String, Vec<FunSig>>,
    ret_ty: Type,
}

impl Default for TcEnv {
    fn default() -> TcEnv {
        TcEnv {
            vars: BTreeMap::new(),
            consts: BTreeMap::new(),
            structs: BTreeMap::new(),
            funs: BTreeMap::new(),
            ret_ty: Type::Void,
        }
    }
}

fn collect_env(ast: &Ast) -> CompileResult<TcEnv> {
    let mut env = TcEnv::default();
    for t in ast {
        match t {
            Top::StructDef {id, base, fields, ..} => {
                let fields = fields.iter()
                    .map(|f| (f.id.clone(), field_type(f)))
                    .collect();
                env.structs.insert(id.clone(), StructInfo {base: base.clone(), fields});
            },
            Top::FunDef {ret, id, params, ..} => {
                let sig = FunSig {
                    id: id.clone(),
                    params: params.iter()
                        .map(|p| (p.spec.ty.clone(), p.default.is_some()))
                        .collect(),
                    ret: ret.ty.clone(),
                };
                let overloads = env.funs.entry(id.get_str().clone()).or_default();
                // Forward declaration and definition share a symbol; keep one entry.
                if !overloads.iter().any(|s| s.id == sig.id) {
                    overloads.push(sig);
                }
            },
            Top::ConstantBuffer {fields, ..} => {
                for f in fields {
                    env.vars.insert(f.id.clone(), f.ty.clone());
                }
            },
            Top::BufferDecl {kind, elem, id, ..} => {
                let ty = Type::Buffer {kind: *kind, elem: Box::new(elem.clone())};
                env.vars.insert(id.clone(), ty);
            },
            Top::SamplerDecl {kind, id, ..} => {
                env.vars.insert(id.clone(), Type::Sampler {kind: *kind});
            },
            Top::GlobalVar {spec, vars, ..} => {
                for v in vars {
                    env.vars.insert(v.id.clone(), spec.ty.clone());
                    if spec.is_const() {
                        if let Some(Expr::IntLit {v: value, ..}) = &v.init {
                            env.consts.insert(v.id.clone(), *value);
                        }
                    }
                }
            },
            Top::AliasDef {..} => (),
        }
    }
    Ok(env)
}

fn field_type(f: &StructField) -> Type {
    if f.dims.is_empty() {
        f.ty.clone()
    } else {
        // Field dimensions must be literal constants; non-literal dimensions surface as a type
        // error when the field is used.
        let dims = f.dims.iter()
            .map(|d| match d {
                Expr::IntLit {v, ..} => *v,
                _ => -1,
            })
            .collect();
        Type::Array {elem: Box::new(f.ty.clone()), dims}
    }
}

fn lookup_field(env: &TcEnv, struct_id: &Name, member: &str, i: &Info) -> CompileResult<Type> {
    let mut cur = Some(struct_id.clone());
    while let Some(id) = cur {
        let info = match env.structs.get(&id) {
            Some(info) => info,
            None => {
                return scx_name_error!(i, "Unknown struct type {id}");
            },
        };
        if let Some((_, ty)) = info.fields.iter().find(|(f, _)| f == member) {
            return Ok(ty.clone());
        }
        cur = info.base.clone();
    }
    scx_name_error!(i, "Struct {struct_id} has no member named '{member}'")
}

const RANK: [DataType; 6] = [
    DataType::Bool, DataType::Int, DataType::UInt,
    DataType::Half, DataType::Float, DataType::Double,
];

fn rank(base: DataType) -> usize {
    RANK.iter().position(|b| *b == base).unwrap_or(0)
}

// The least upper bound of two shapes in the data-type grid: the larger base type in promotion
// order, with scalars broadcasting to the other operand's shape.
fn lub_data_type(l: DataType, r: DataType, i: &Info) -> CompileResult<DataType> {
    let base = RANK[rank(l.base()).max(rank(r.base()))];
    let (ldim, rdim) = (l.matrix_dim(), r.matrix_dim());
    let shape = if ldim == rdim {
        ldim
    } else if l.is_scalar() {
        rdim
    } else if r.is_scalar() {
        ldim
    } else {
        return scx_type_error!(i, "Mismatched operand shapes {l} and {r}");
    };
    match dt::matrix_data_type(base, shape.0, shape.1) {
        Some(t) => Ok(t),
        None => scx_type_error!(i, "No common type for {l} and {r}"),
    }
}

fn expect_data_type(e: &Expr) -> CompileResult<DataType> {
    match e.get_type() {
        Type::Data(t) => Ok(*t),
        ty => {
            let i = e.get_info();
            scx_type_error!(i, "Expected a numeric value, found type {ty}")
        },
    }
}

// Per-argument implicit conversion cost for overload resolution. Exact matches are free,
// conversions within the integral or real families cost less than crossing families, and scalar
// broadcast sits in between.
fn conversion_cost(from: &Type, to: &Type) -> Option<u32> {
    if from == to {
        return Some(0);
    }
    match (from, to) {
        (Type::Data(f), Type::Data(t)) => {
            let same_family = (f.is_integral() && t.is_integral())
                || (f.is_real() && t.is_real() && rank(t.base()) >= rank(f.base()));
            if f.matrix_dim() == t.matrix_dim() {
                if same_family { Some(1) } else { Some(3) }
            } else if f.is_scalar() {
                if same_family || f.base() == t.base() { Some(2) } else { Some(3) }
            } else {
                None
            }
        },
        _ => None,
    }
}

fn resolve_overload<'a>(
    env: &'a TcEnv,
    id: &Name,
    args: &[Expr],
    i: &Info
) -> CompileResult<&'a FunSig> {
    let overloads = match env.funs.get(id.get_str()) {
        Some(o) => o,
        None => {
            return scx_name_error!(i, "Call to undeclared function '{id}'");
        },
    };
    let mut best: Option<(u32, &FunSig)> = None;
    let mut ambiguous = false;
    for sig in overloads {
        if args.len() > sig.params.len() {
            continue;
        }
        if sig.params[args.len()..].iter().any(|(_, has_default)| !has_default) {
            continue;
        }
        let cost = args.iter()
            .zip(sig.params.iter())
            .try_fold(0u32, |acc, (a, (pty, _))| {
                conversion_cost(a.get_type(), pty).map(|c| acc + c)
            });
        if let Some(cost) = cost {
            match best {
                Some((c, _)) if cost > c => (),
                Some((c, _)) if cost == c => ambiguous = true,
                _ => {
                    best = Some((cost, sig));
                    ambiguous = false;
                },
            }
        }
    }
    match best {
        Some((_, sig)) if !ambiguous => Ok(sig),
        Some(_) => scx_type_error!(i, "Ambiguous call to overloaded function '{id}'"),
        None => {
            scx_type_error!(i, "No overload of '{id}' matches the argument types")
        },
    }
}

fn coerce(e: Expr, expected: &Type) -> CompileResult<Expr> {
    if e.get_type() == expected {
        return Ok(e);
    }
    let i = e.get_info();
    match (e.get_type(), expected) {
        (Type::Data(_), Type::Data(_)) if conversion_cost(e.get_type(), expected).is_some() => {
            Ok(Expr::Cast {
                to: expected.clone(),
                arg: Box::new(e),
                ty: expected.clone(),
                i: i.clone(),
            })
        },
        (Type::Unknown, _) => Ok(e.with_type(expected.clone())),
        (actual, _) => {
            scx_type_error!(i, "Cannot convert value of type {actual} to {expected}")
        },
    }
}

fn eval_const_int(env: &TcEnv, e: &Expr) -> Option<i64> {
    match e {
        Expr::IntLit {v, ..} => Some(*v),
        Expr::Var {id, ..} => env.consts.get(id).copied(),
        Expr::UnOp {op: UnOp::Neg, arg, ..} => Some(-eval_const_int(env, arg)?),
        Expr::BinOp {lhs, op, rhs, ..} => {
            let l = eval_const_int(env, lhs)?;
            let r = eval_const_int(env, rhs)?;
            match op {
                BinOp::Add => Some(l + r),
                BinOp::Sub => Some(l - r),
                BinOp::Mul => Some(l * r),
                BinOp::Div if r != 0 => Some(l / r),
                BinOp::Rem if r != 0 => Some(l % r),
                BinOp::Shl => Some(l << r),
                BinOp::Shr => Some(l >> r),
                _ => None,
            }
        },
        _ => None,
    }
}

// Evaluates declarator array dimensions. A zero dimension is the parser's marker for a dynamic
// size, which stays zero; anything else must be a positive compile-time integer.
fn eval_dims(env: &TcEnv, dims: &[Expr]) -> CompileResult<Vec<i64>> {
    dims.iter()
        .map(|d| {
            let i = d.get_info();
            match eval_const_int(env, d) {
                Some(v) if v >= 0 => Ok(v),
                Some(v) => scx_type_error!(i, "Array dimension must be positive, found {v}"),
                None => {
                    scx_type_error!(i, "Array dimension is not a compile-time constant")
                },
            }
        })
        .collect()
}

fn declared_type(env: &TcEnv, base: &Type, dims: &[Expr]) -> CompileResult<Type> {
    if dims.is_empty() {
        Ok(base.clone())
    } else {
        let dims = eval_dims(env, dims)?;
        Ok(Type::Array {elem: Box::new(base.clone()), dims})
    }
}

// Replaces evaluated dimension expressions with their literal values, so later passes read the
// sizes directly off the declarator.
fn fold_dims(env: &TcEnv, dims: Vec<Expr>) -> CompileResult<Vec<Expr>> {
    let values = eval_dims(env, &dims)?;
    Ok(dims.into_iter()
        .zip(values)
        .map(|(d, v)| {
            let i = d.get_info();
            Expr::IntLit {
                text: v.to_string(), v, ty: Type::Data(DataType::Int), i
            }
        })
        .collect())
}

fn literal_type(text: &str, int: bool) -> DataType {
    match text.as_bytes().last() {
        Some(b'u') | Some(b'U') => DataType::UInt,
        Some(b'f') | Some(b'F') if !int => DataType::Float,
        Some(b'h') | Some(b'H') if !int => DataType::Half,
        _ if int => DataType::Int,
        _ => DataType::Double,
    }
}

fn type_check_unop(op: UnOp, arg: &Expr, i: &Info) -> CompileResult<Type> {
    let at = expect_data_type(arg)?;
    match op {
        UnOp::LogicalNot if at.is_boolean() => Ok(Type::Data(at)),
        UnOp::LogicalNot => {
            scx_type_error!(i, "Logical negation requires a boolean operand, found {at}")
        },
        UnOp::BitNot if at.is_integral() => Ok(Type::Data(at)),
        UnOp::BitNot => {
            scx_type_error!(i, "Bitwise negation requires an integral operand, found {at}")
        },
        UnOp::Neg | UnOp::Plus if !at.is_boolean() => Ok(Type::Data(at)),
        UnOp::Neg | UnOp::Plus => {
            scx_type_error!(i, "Arithmetic negation requires a numeric operand")
        },
    }
}

fn type_check_binop(
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    i: &Info
) -> CompileResult<Type> {
    let lt = expect_data_type(lhs)?;
    let rt = expect_data_type(rhs)?;
    if op.is_logical() {
        if lt.is_boolean() && rt.is_boolean() {
            return Ok(Type::Data(lub_data_type(lt, rt, i)?));
        }
        return scx_type_error!(i, "Logical operator requires boolean operands");
    }
    if op.is_bitwise() {
        if lt.is_integral() && rt.is_integral() {
            return Ok(Type::Data(lub_data_type(lt, rt, i)?));
        }
        return scx_type_error!(i, "Bitwise operator requires integral operands");
    }
    let unified = lub_data_type(lt, rt, i)?;
    if op.is_comparison() {
        let (r, c) = unified.matrix_dim();
        match dt::matrix_data_type(DataType::Bool, r, c) {
            Some(t) => Ok(Type::Data(t)),
            None => scx_type_error!(i, "Cannot compare operands of type {unified}"),
        }
    } else {
        if unified.is_boolean() {
            return scx_type_error!(i, "Arithmetic on boolean operands");
        }
        Ok(Type::Data(unified))
    }
}

fn is_lvalue(e: &Expr) -> bool {
    match e {
        Expr::Var {..} | Expr::Member {..} | Expr::Index {..} => true,
        _ => false,
    }
}

fn texture_coord_dim(kind: BufferType) -> usize {
    match kind {
        BufferType::Texture1D | BufferType::RWTexture1D => 1,
        BufferType::Texture1DArray | BufferType::RWTexture1DArray |
        BufferType::Texture2D | BufferType::RWTexture2D |
        BufferType::Texture2DMS => 2,
        BufferType::Texture2DArray | BufferType::RWTexture2DArray |
        BufferType::Texture2DMSArray | BufferType::Texture3D |
        BufferType::RWTexture3D | BufferType::TextureCube => 3,
        BufferType::TextureCubeArray => 4,
        _ => 0,
    }
}

// Texel-offset vector dimension per texture kind; array layers and the cube face vector take no
// offset component, and cube textures take no offset at all.
fn texture_offset_dim(kind: BufferType) -> usize {
    match kind {
        BufferType::Buffer | BufferType::Texture1D | BufferType::RWTexture1D |
        BufferType::Texture1DArray | BufferType::RWTexture1DArray => 1,
        BufferType::Texture2D | BufferType::RWTexture2D |
        BufferType::Texture2DArray | BufferType::RWTexture2DArray |
        BufferType::Texture2DMS | BufferType::Texture2DMSArray => 2,
        BufferType::Texture3D | BufferType::RWTexture3D => 3,
        _ => 0,
    }
}

fn check_texture_method(
    func: Intrinsic,
    args: &[Expr],
    i: &Info
) -> CompileResult<Type> {
    let (kind, elem) = match args.first().map(|a| a.get_type()) {
        Some(Type::Buffer {kind, elem}) if kind.is_texture() => (*kind, (**elem).clone()),
        Some(ty) => {
            return scx_type_error!(i, "Texture method called on non-texture type {ty}");
        },
        None => {
            return scx_type_error!(i, "Texture method requires a receiver");
        },
    };
    let coord_dim = texture_coord_dim(kind);
    let nargs = args.len() - 1;
    let expect_args = |lo: usize, hi: usize| -> CompileResult<()> {
        if nargs < lo || nargs > hi {
            scx_type_error!(i, "Wrong number of arguments for {func}, found {nargs}")
        } else {
            Ok(())
        }
    };
    let check_sampler = |idx: usize| -> CompileResult<()> {
        match args[idx].get_type() {
            Type::Sampler {..} => Ok(()),
            ty => scx_type_error!(
                i, "{func} expects a sampler as first argument, found {ty}"
            ),
        }
    };
    let check_coords = |idx: usize| -> CompileResult<()> {
        match args[idx].get_type() {
            Type::Data(t) if t.is_real() && t.vector_dim() == coord_dim => Ok(()),
            ty => scx_type_error!(
                i, "{func} expects {coord_dim}-component coordinates, found {ty}"
            ),
        }
    };
    let check_real_scalar = |idx: usize| -> CompileResult<()> {
        match args[idx].get_type() {
            Type::Data(t) if t.is_real() && t.is_scalar() => Ok(()),
            ty => scx_type_error!(
                i, "{func} expects a scalar value here, found {ty}"
            ),
        }
    };
    let check_offset = |idx: usize| -> CompileResult<()> {
        let dim = texture_offset_dim(kind);
        if dim == 0 {
            return scx_type_error!(i, "{kind} does not take a texel offset");
        }
        match args[idx].get_type() {
            Type::Data(t) if t.is_integral() && t.vector_dim() == dim => Ok(()),
            ty => scx_type_error!(
                i, "{func} expects a {dim}-component integer offset, found {ty}"
            ),
        }
    };
    match func {
        Intrinsic::TexSample => {
            expect_args(2, 3)?;
            check_sampler(1)?;
            check_coords(2)?;
            if nargs == 3 {
                check_offset(3)?;
            }
            Ok(elem)
        },
        Intrinsic::TexSampleBias | Intrinsic::TexSampleLevel => {
            expect_args(3, 4)?;
            check_sampler(1)?;
            check_coords(2)?;
            check_real_scalar(3)?;
            if nargs == 4 {
                check_offset(4)?;
            }
            Ok(elem)
        },
        Intrinsic::TexSampleGrad => {
            expect_args(4, 5)?;
            check_sampler(1)?;
            check_coords(2)?;
            if nargs == 5 {
                check_offset(5)?;
            }
            Ok(elem)
        },
        Intrinsic::TexSampleCmp => {
            expect_args(3, 3)?;
            match args[1].get_type() {
                Type::Sampler {kind: SamplerType::SamplerComparisonState} => (),
                ty => {
                    return scx_type_error!(
                        i, "{func} expects a comparison sampler, found {ty}"
                    );
                },
            }
            check_coords(2)?;
            check_real_scalar(3)?;
            Ok(Type::Data(DataType::Float))
        },
        Intrinsic::TexLoad => {
            expect_args(1, 2)?;
            match args[1].get_type() {
                Type::Data(t) if t.is_integral() => (),
                ty => {
                    return scx_type_error!(
                        i, "{func} expects integer texel coordinates, found {ty}"
                    );
                },
            }
            if nargs == 2 {
                check_offset(2)?;
            }
            Ok(elem)
        },
        Intrinsic::TexGetDimensions => {
            if args.len() < 2 {
                return scx_type_error!(i, "{func} expects output arguments");
            }
            for a in &args[1..] {
                if !is_lvalue(a) {
                    let ai = a.get_info();
                    return scx_type_error!(
                        ai, "{func} output arguments must be assignable"
                    );
                }
            }
            Ok(Type::Void)
        },
        _ => scx_type_error!(i, "Unknown texture method"),
    }
}

fn check_intrinsic(
    func: Intrinsic,
    args: &[Expr],
    i: &Info
) -> CompileResult<Type> {
    use Intrinsic::*;
    if func.is_texture_method() {
        return check_texture_method(func, args, i);
    }
    let nargs = args.len();
    let expect_args = |lo: usize, hi: usize| -> CompileResult<()> {
        if nargs < lo || nargs > hi {
            scx_type_error!(i, "Wrong number of arguments for intrinsic '{func}'")
        } else {
            Ok(())
        }
    };
    let data = |e: &Expr| expect_data_type(e);
    match func {
        // Component-wise functions over real operands.
        Acos | Asin | Atan | Ceil | Cos | Cosh | Ddx | Ddy | Degrees | Exp | Exp2 |
        Floor | Frac | Log | Log2 | Normalize | Radians | Round | Rsqrt | Saturate |
        Sin | Sinh | Sqrt | Tan | Tanh | Trunc => {
            expect_args(1, 1)?;
            let t = data(&args[0])?;
            if t.is_real() {
                Ok(Type::Data(t))
            } else {
                scx_type_error!(i, "Intrinsic '{func}' requires a real operand, found {t}")
            }
        },
        Abs => {
            expect_args(1, 1)?;
            let t = data(&args[0])?;
            if t.is_boolean() {
                scx_type_error!(i, "Intrinsic 'abs' requires a numeric operand")
            } else {
                Ok(Type::Data(t))
            }
        },
        Sign => {
            expect_args(1, 1)?;
            let t = data(&args[0])?;
            let (r, c) = t.matrix_dim();
            match dt::matrix_data_type(DataType::Int, r, c) {
                Some(t) => Ok(Type::Data(t)),
                None => scx_type_error!(i, "Invalid operand for 'sign'"),
            }
        },
        IsInf | IsNan => {
            expect_args(1, 1)?;
            let t = data(&args[0])?;
            let (r, c) = t.matrix_dim();
            match dt::matrix_data_type(DataType::Bool, r, c) {
                Some(t) => Ok(Type::Data(t)),
                None => scx_type_error!(i, "Invalid operand for '{func}'"),
            }
        },
        All | Any => {
            expect_args(1, 1)?;
            data(&args[0])?;
            Ok(Type::Data(DataType::Bool))
        },
        Length => {
            expect_args(1, 1)?;
            let t = data(&args[0])?;
            Ok(Type::Data(t.base()))
        },
        Determinant => {
            expect_args(1, 1)?;
            let t = data(&args[0])?;
            let (r, c) = t.matrix_dim();
            if t.is_matrix() && r == c {
                Ok(Type::Data(t.base()))
            } else {
                scx_type_error!(i, "'determinant' requires a square matrix, found {t}")
            }
        },
        Transpose => {
            expect_args(1, 1)?;
            let t = data(&args[0])?;
            let (r, c) = t.matrix_dim();
            match dt::matrix_data_type(t.base(), c, r) {
                Some(res) if t.is_matrix() => Ok(Type::Data(res)),
                _ => scx_type_error!(i, "'transpose' requires a matrix, found {t}"),
            }
        },
        Rcp => {
            expect_args(1, 1)?;
            let t = data(&args[0])?;
            if t.is_real() {
                Ok(Type::Data(t))
            } else {
                scx_type_error!(i, "'rcp' requires a real operand, found {t}")
            }
        },
        Clip => {
            expect_args(1, 1)?;
            let t = data(&args[0])?;
            if t.is_real() && (t.is_scalar() || t.is_vector()) {
                Ok(Type::Void)
            } else {
                scx_type_error!(i, "'clip' requires a scalar or vector real operand")
            }
        },
        Atan2 | Distance | Fmod | Pow | Reflect | Step => {
            expect_args(2, 2)?;
            let l = data(&args[0])?;
            let r = data(&args[1])?;
            let t = lub_data_type(l, r, i)?;
            match func {
                Distance => Ok(Type::Data(t.base())),
                _ => Ok(Type::Data(t)),
            }
        },
        Dot => {
            expect_args(2, 2)?;
            let l = data(&args[0])?;
            let r = data(&args[1])?;
            let t = lub_data_type(l, r, i)?;
            if t.is_vector() || t.is_scalar() {
                Ok(Type::Data(t.base()))
            } else {
                scx_type_error!(i, "'dot' requires vector operands")
            }
        },
        Cross => {
            expect_args(2, 2)?;
            let l = data(&args[0])?;
            let r = data(&args[1])?;
            let t = lub_data_type(l, r, i)?;
            if t.vector_dim() == 3 {
                Ok(Type::Data(t))
            } else {
                scx_type_error!(i, "'cross' requires three-component vectors")
            }
        },
        Max | Min => {
            expect_args(2, 2)?;
            let l = data(&args[0])?;
            let r = data(&args[1])?;
            Ok(Type::Data(lub_data_type(l, r, i)?))
        },
        Mul => {
            expect_args(2, 2)?;
            let l = data(&args[0])?;
            let r = data(&args[1])?;
            type_check_mul(l, r, i)
        },
        Clamp | Lerp | SmoothStep => {
            expect_args(3, 3)?;
            let a = data(&args[0])?;
            let b = data(&args[1])?;
            let c = data(&args[2])?;
            let t = lub_data_type(lub_data_type(a, b, i)?, c, i)?;
            Ok(Type::Data(t))
        },
        Refract => {
            expect_args(3, 3)?;
            let a = data(&args[0])?;
            let b = data(&args[1])?;
            data(&args[2])?;
            Ok(Type::Data(lub_data_type(a, b, i)?))
        },
        GroupMemoryBarrierWithGroupSync => {
            expect_args(0, 0)?;
            Ok(Type::Void)
        },
        InterlockedAdd | InterlockedAnd | InterlockedOr | InterlockedXor |
        InterlockedMin | InterlockedMax | InterlockedExchange => {
            expect_args(2, 3)?;
            check_interlocked_dest(&args[0])?;
            Ok(Type::Void)
        },
        InterlockedCompareExchange => {
            expect_args(4, 4)?;
            check_interlocked_dest(&args[0])?;
            Ok(Type::Void)
        },
        InterlockedCompareStore => {
            expect_args(3, 3)?;
            check_interlocked_dest(&args[0])?;
            Ok(Type::Void)
        },
        _ => scx_type_error!(i, "Unsupported intrinsic '{func}'"),
    }
}

fn check_interlocked_dest(dest: &Expr) -> CompileResult<()> {
    let i = dest.get_info();
    if !is_lvalue(dest) {
        return scx_type_error!(i, "Interlocked destination must be assignable");
    }
    match dest.get_type() {
        Type::Data(t) if t.is_integral() && t.is_scalar() => Ok(()),
        ty => {
            scx_type_error!(i, "Interlocked destination must be a scalar integer, found {ty}")
        },
    }
}

// mul() follows the linear-algebra shapes: matrix*vector, vector*matrix, matrix*matrix, plus the
// degenerate scalar and component-wise vector forms.
fn type_check_mul(l: DataType, r: DataType, i: &Info) -> CompileResult<Type> {
    let base = RANK[rank(l.base()).max(rank(r.base()))];
    let res = if l.is_scalar() {
        dt::matrix_data_type(base, r.matrix_dim().0, r.matrix_dim().1)
    } else if r.is_scalar() {
        dt::matrix_data_type(base, l.matrix_dim().0, l.matrix_dim().1)
    } else if l.is_matrix() && r.is_vector() {
        let (rows, cols) = l.matrix_dim();
        if cols == r.vector_dim() {
            dt::vector_data_type(base, rows)
        } else {
            None
        }
    } else if l.is_vector() && r.is_matrix() {
        let (rows, cols) = r.matrix_dim();
        if rows == l.vector_dim() {
            dt::vector_data_type(base, cols)
        } else {
            None
        }
    } else if l.is_matrix() && r.is_matrix() {
        let (lr, lc) = l.matrix_dim();
        let (rr, rc) = r.matrix_dim();
        if lc == rr {
            dt::matrix_data_type(base, lr, rc)
        } else {
            None
        }
    } else if l.is_vector() && r.is_vector() && l.vector_dim() == r.vector_dim() {
        dt::vector_data_type(base, l.vector_dim())
    } else {
        None
    };
    match res {
        Some(t) => Ok(Type::Data(t)),
        None => scx_type_error!(i, "Invalid operand shapes {l} and {r} for 'mul'"),
    }
}

fn type_check_index(target: &Expr, idx: &Expr, i: &Info) -> CompileResult<Type> {
    match idx.get_type() {
        Type::Data(t) if t.is_integral() => (),
        ty => {
            let ii = idx.get_info();
            return scx_type_error!(ii, "Array index must be integral, found {ty}");
        },
    }
    if let Expr::IntLit {v, ..} = idx {
        if *v < 0 {
            let ii = idx.get_info();
            return scx_type_error!(ii, "Array index must not be negative");
        }
    }
    match target.get_type() {
        Type::Array {elem, dims} => {
            if dims.len() == 1 {
                Ok((**elem).clone())
            } else {
                Ok(Type::Array {
                    elem: elem.clone(),
                    dims: dims[1..].to_vec(),
                })
            }
        },
        Type::Data(t) if t.is_vector() => Ok(Type::Data(t.base())),
        Type::Data(t) if t.is_matrix() => {
            let (_, cols) = t.matrix_dim();
            match dt::vector_data_type(t.base(), cols) {
                Some(row) => Ok(Type::Data(row)),
                None => scx_type_error!(i, "Invalid matrix row access"),
            }
        },
        Type::Buffer {kind, elem} if kind.is_storage() || kind.is_rw_texture() => {
            Ok((**elem).clone())
        },
        ty => scx_type_error!(i, "Type {ty} cannot be indexed"),
    }
}

fn ctor_component_count(t: DataType) -> usize {
    let (r, c) = t.matrix_dim();
    r * c
}

pub fn type_check_expr(env: &TcEnv, e: Expr) -> CompileResult<Expr> {
    match e {
        Expr::Var {id, i, ..} => {
            match env.vars.get(&id) {
                Some(ty) => Ok(Expr::Var {id, ty: ty.clone(), i}),
                None => scx_name_error!(i, "Unknown variable {id}"),
            }
        },
        Expr::IntLit {text, v, i, ..} => {
            let ty = Type::Data(literal_type(&text, true));
            Ok(Expr::IntLit {text, v, ty, i})
        },
        Expr::FloatLit {text, i, ..} => {
            let ty = Type::Data(literal_type(&text, false));
            Ok(Expr::FloatLit {text, ty, i})
        },
        Expr::BoolLit {v, i, ..} => {
            Ok(Expr::BoolLit {v, ty: Type::Data(DataType::Bool), i})
        },
        Expr::StringLit {v, i, ..} => {
            Ok(Expr::StringLit {v, ty: Type::Data(DataType::String), i})
        },
        Expr::UnOp {op, arg, i, ..} => {
            let arg = Box::new(type_check_expr(env, *arg)?);
            let ty = type_check_unop(op, &arg, &i)?;
            Ok(Expr::UnOp {op, arg, ty, i})
        },
        Expr::PostUnOp {op, arg, i, ..} => {
            let arg = Box::new(type_check_expr(env, *arg)?);
            let t = expect_data_type(&arg)?;
            if t.is_boolean() || !is_lvalue(&arg) {
                return scx_type_error!(i, "Invalid operand for '{op}'");
            }
            Ok(Expr::PostUnOp {op, arg, ty: Type::Data(t), i})
        },
        Expr::BinOp {lhs, op, rhs, i, ..} => {
            let lhs = Box::new(type_check_expr(env, *lhs)?);
            let rhs = Box::new(type_check_expr(env, *rhs)?);
            let ty = type_check_binop(op, &lhs, &rhs, &i)?;
            Ok(Expr::BinOp {lhs, op, rhs, ty, i})
        },
        Expr::Assign {lhs, op, rhs, i, ..} => {
            let lhs = Box::new(type_check_expr(env, *lhs)?);
            if !is_lvalue(&lhs) {
                return scx_type_error!(i, "Left side of assignment is not assignable");
            }
            let rhs = type_check_expr(env, *rhs)?;
            if let Some(bin) = op.bin_op() {
                type_check_binop(bin, &lhs, &rhs, &i)?;
            }
            let ty = lhs.get_type().clone();
            let rhs = Box::new(coerce(rhs, &ty)?);
            Ok(Expr::Assign {lhs, op, rhs, ty, i})
        },
        Expr::Ternary {cond, thn, els, i, ..} => {
            let cond = Box::new(type_check_expr(env, *cond)?);
            match cond.get_type() {
                Type::Data(t) if t.is_boolean() && t.is_scalar() => (),
                ty => {
                    return scx_type_error!(
                        i, "Condition must be a scalar boolean, found {ty}"
                    );
                },
            }
            let thn = type_check_expr(env, *thn)?;
            let els = type_check_expr(env, *els)?;
            let lt = expect_data_type(&thn)?;
            let rt = expect_data_type(&els)?;
            let ty = Type::Data(lub_data_type(lt, rt, &i)?);
            let thn = Box::new(coerce(thn, &ty)?);
            let els = Box::new(coerce(els, &ty)?);
            Ok(Expr::Ternary {cond, thn, els, ty, i})
        },
        Expr::Member {target, member, i, ..} => {
            let target = Box::new(type_check_expr(env, *target)?);
            let ty = match target.get_type() {
                Type::Struct {id} => lookup_field(env, id, &member, &i)?,
                Type::Data(t) => Type::Data(dt::subscript_data_type(*t, &member, &i)?),
                ty => {
                    return scx_type_error!(i, "Type {ty} has no member '{member}'");
                },
            };
            Ok(Expr::Member {target, member, ty, i})
        },
        Expr::Index {target, idx, i, ..} => {
            let target = Box::new(type_check_expr(env, *target)?);
            let idx = Box::new(type_check_expr(env, *idx)?);
            let ty = type_check_index(&target, &idx, &i)?;
            Ok(Expr::Index {target, idx, ty, i})
        },
        Expr::Cast {to, arg, i, ..} => {
            let arg = Box::new(type_check_expr(env, *arg)?);
            match (&to, arg.get_type()) {
                (Type::Data(_), Type::Data(_)) => (),
                (to, from) => {
                    return scx_type_error!(i, "Cannot cast from {from} to {to}");
                },
            }
            Ok(Expr::Cast {to: to.clone(), arg, ty: to, i})
        },
        Expr::Ctor {dt: target_dt, args, i, ..} => {
            let args = args.smap_result(|a| type_check_expr(env, a))?;
            let mut components = 0usize;
            for a in &args {
                components += ctor_component_count(expect_data_type(a)?);
            }
            let want = ctor_component_count(target_dt);
            let splat = args.len() == 1 && components == 1;
            if components != want && !splat {
                return scx_type_error!(
                    i,
                    "Constructor {target_dt} expects {want} components, found {components}"
                );
            }
            Ok(Expr::Ctor {dt: target_dt, args, ty: Type::Data(target_dt), i})
        },
        Expr::Call {target: Some(recv), id, args, i, ..} => {
            let recv = type_check_expr(env, *recv)?;
            let func = match TEXTURE_METHODS.get(id.get_str().as_str()) {
                Some(f) => *f,
                None => {
                    return scx_type_error!(
                        i, "Unknown method '{id}' on value of type {0}", recv.get_type()
                    );
                },
            };
            let mut all_args = vec![recv];
            for a in args {
                all_args.push(type_check_expr(env, a)?);
            }
            let ty = check_intrinsic(func, &all_args, &i)?;
            Ok(Expr::Intrinsic {func, args: all_args, ty, i})
        },
        Expr::Call {target: None, id, args, i, ..} => {
            let args = args.smap_result(|a| type_check_expr(env, a))?;
            if let Some(func) = INTRINSICS.get(id.get_str().as_str()) {
                let ty = check_intrinsic(*func, &args, &i)?;
                return Ok(Expr::Intrinsic {func: *func, args, ty, i});
            }
            let sig = resolve_overload(env, &id, &args, &i)?;
            let resolved = sig.id.clone();
            let ret = sig.ret.clone();
            let param_tys = sig.params.iter()
                .map(|(t, _)| t.clone())
                .collect::<Vec<Type>>();
            let args = args.into_iter()
                .zip(param_tys.iter())
                .map(|(a, pty)| coerce(a, pty))
                .collect::<CompileResult<Vec<Expr>>>()?;
            Ok(Expr::Call {target: None, id: resolved, args, ty: ret, i})
        },
        Expr::Intrinsic {func, args, i, ..} => {
            let args = args.smap_result(|a| type_check_expr(env, a))?;
            let ty = check_intrinsic(func, &args, &i)?;
            Ok(Expr::Intrinsic {func, args, ty, i})
        },
        Expr::Sequence {exprs, i, ..} => {
            let exprs = exprs.smap_result(|e| type_check_expr(env, e))?;
            let ty = exprs.last()
                .map(|e| e.get_type().clone())
                .unwrap_or(Type::Void);
            Ok(Expr::Sequence {exprs, ty, i})
        },
        Expr::InitList {elems, i, ..} => {
            let elems = elems.smap_result(|e| type_check_expr(env, e))?;
            // The surrounding declaration assigns the final type.
            Ok(Expr::InitList {elems, ty: Type::Unknown, i})
        },
    }
}

fn init_list_matches(env: &TcEnv, ty: &Type, elems: &[Expr]) -> bool {
    match ty {
        Type::Array {dims, ..} => {
            dims.first().map(|d| *d == 0 || *d == elems.len() as i64).unwrap_or(false)
        },
        Type::Data(t) => {
            let want = ctor_component_count(*t);
            let have = elems.iter()
                .map(|e| match e.get_type() {
                    Type::Data(t) => ctor_component_count(*t),
                    _ => 0,
                })
                .sum::<usize>();
            want == have
        },
        Type::Struct {id} => {
            env.structs.get(id)
                .map(|s| s.fields.len() == elems.len())
                .unwrap_or(false)
        },
        _ => false,
    }
}

fn type_check_var_init(
    env: &TcEnv,
    spec: &TypeSpec,
    v: VarInit
) -> CompileResult<(TcEnv, VarInit)> {
    let VarInit {id, dims, semantic, pack_offset, init, i} = v;
    let dims = dims.smap_result(|d| type_check_expr(env, d))?;
    let ty = declared_type(env, &spec.ty, &dims)?;
    let dims = fold_dims(env, dims)?;
    let init = match init {
        Some(Expr::InitList {elems, i: li, ..}) => {
            let elems = elems.smap_result(|e| type_check_expr(env, e))?;
            if !init_list_matches(env, &ty, &elems) {
                return scx_type_error!(li, "Initializer list does not match type {ty}");
            }
            Some(Expr::InitList {elems, ty: ty.clone(), i: li})
        },
        Some(e) => {
            let e = type_check_expr(env, e)?;
            Some(coerce(e, &ty)?)
        },
        None => None,
    };
    let mut env = env.clone();
    if spec.is_const() {
        if let Some(Expr::IntLit {v, ..}) = &init {
            env.consts.insert(id.clone(), *v);
        }
    }
    env.vars.insert(id.clone(), ty);
    Ok((env, VarInit {id, dims, semantic, pack_offset, init, i}))
}

fn type_check_stmt(env: TcEnv, s: Stmt) -> CompileResult<(TcEnv, Stmt)> {
    match s {
        Stmt::Decl {spec, vars, i} => {
            let (env, vars) = vars.into_iter()
                .fold(Ok((env, vec![])), |acc: CompileResult<_>, v| {
                    let (env, mut vars) = acc?;
                    let (env, v) = type_check_var_init(&env, &spec, v)?;
                    vars.push(v);
                    Ok((env, vars))
                })?;
            Ok((env, Stmt::Decl {spec, vars, i}))
        },
        Stmt::Expr {e, i} => {
            let e = type_check_expr(&env, e)?;
            Ok((env, Stmt::Expr {e, i}))
        },
        Stmt::Block {body, i} => {
            let body = type_check_stmts(&env, body)?;
            Ok((env, Stmt::Block {body, i}))
        },
        Stmt::If {cond, thn, els, i} => {
            let cond = check_condition(&env, cond)?;
            let thn = type_check_stmts(&env, thn)?;
            let els = type_check_stmts(&env, els)?;
            Ok((env, Stmt::If {cond, thn, els, i}))
        },
        Stmt::While {cond, body, attrs, i} => {
            let cond = check_condition(&env, cond)?;
            let body = type_check_stmts(&env, body)?;
            Ok((env, Stmt::While {cond, body, attrs, i}))
        },
        Stmt::DoWhile {body, cond, i} => {
            let body = type_check_stmts(&env, body)?;
            let cond = check_condition(&env, cond)?;
            Ok((env, Stmt::DoWhile {body, cond, i}))
        },
        Stmt::For {init, cond, incr, body, attrs, i} => {
            let (loop_env, init) = init.into_iter()
                .fold(Ok((env.clone(), vec![])), |acc: CompileResult<_>, s| {
                    let (env, mut stmts) = acc?;
                    let (env, s) = type_check_stmt(env, s)?;
                    stmts.push(s);
                    Ok((env, stmts))
                })?;
            let cond = match cond {
                Some(c) => Some(check_condition(&loop_env, c)?),
                None => None,
            };
            let incr = match incr {
                Some(e) => Some(type_check_expr(&loop_env, e)?),
                None => None,
            };
            let body = type_check_stmts(&loop_env, body)?;
            Ok((env, Stmt::For {init, cond, incr, body, attrs, i}))
        },
        Stmt::Switch {cond, cases, i} => {
            let cond = type_check_expr(&env, cond)?;
            match cond.get_type() {
                Type::Data(t) if t.is_integral() && t.is_scalar() => (),
                ty => {
                    return scx_type_error!(
                        i, "Switch condition must be a scalar integer, found {ty}"
                    );
                },
            }
            let cases = cases.into_iter()
                .map(|SwitchCase {value, body, i}| {
                    let value = match value {
                        Some(e) => Some(type_check_expr(&env, e)?),
                        None => None,
                    };
                    let body = type_check_stmts(&env, body)?;
                    Ok(SwitchCase {value, body, i})
                })
                .collect::<CompileResult<Vec<SwitchCase>>>()?;
            Ok((env, Stmt::Switch {cond, cases, i}))
        },
        Stmt::Return {value, i} => {
            let ret_ty = env.ret_ty.clone();
            let value = match (value, &ret_ty) {
                (None, Type::Void) => None,
                (None, ty) => {
                    return scx_type_error!(
                        i, "Missing return value in function returning {ty}"
                    );
                },
                (Some(_), Type::Void) => {
                    return scx_type_error!(i, "Cannot return a value from a void function");
                },
                (Some(e), _) => {
                    let e = type_check_expr(&env, e)?;
                    Some(coerce(e, &ret_ty)?)
                },
            };
            Ok((env, Stmt::Return {value, i}))
        },
        Stmt::Break {..} | Stmt::Continue {..} | Stmt::Discard {..} |
        Stmt::Empty {..} => Ok((env, s)),
    }
}

fn check_condition(env: &TcEnv, cond: Expr) -> CompileResult<Expr> {
    let cond = type_check_expr(env, cond)?;
    match cond.get_type() {
        Type::Data(t) if t.is_scalar() => Ok(cond),
        ty => {
            let i = cond.get_info();
            scx_type_error!(i, "Condition must be a scalar value, found {ty}")
        },
    }
}

fn type_check_stmts(env: &TcEnv, stmts: Vec<Stmt>) -> CompileResult<Vec<Stmt>> {
    let (_, stmts) = stmts.into_iter()
        .fold(Ok((env.clone(), vec![])), |acc: CompileResult<_>, s| {
            let (env, mut stmts) = acc?;
            let (env, s) = type_check_stmt(env, s)?;
            stmts.push(s);
            Ok((env, stmts))
        })?;
    Ok(stmts)
}

fn type_check_top(env: &TcEnv, t: Top) -> CompileResult<Top> {
    match t {
        Top::FunDef {attrs, ret, id, params, ret_semantic, body, i} => {
            let mut fun_env = env.clone();
            let params = params.into_iter()
                .map(|p| {
                    let ty = declared_type(env, &p.spec.ty, &p.dims)?;
                    fun_env.vars.insert(p.id.clone(), ty);
                    let dims = fold_dims(env, p.dims)?;
                    Ok(Param {dims, ..p})
                })
                .collect::<CompileResult<Vec<Param>>>()?;
            fun_env.ret_ty = ret.ty.clone();
            let body = match body {
                Some(stmts) => Some(type_check_stmts(&fun_env, stmts)?),
                None => None,
            };
            let attrs = attrs.into_iter()
                .map(|Attribute {id, args, i}| {
                    let args = args.smap_result(|a| type_check_expr(&fun_env, a))?;
                    Ok(Attribute {id, args, i})
                })
                .collect::<CompileResult<Vec<Attribute>>>()?;
            Ok(Top::FunDef {attrs, ret, id, params, ret_semantic, body, i})
        },
        Top::GlobalVar {spec, vars, i} => {
            let vars = vars.smap_result(|v| {
                let (_, v) = type_check_var_init(env, &spec, v)?;
                Ok(v)
            })?;
            Ok(Top::GlobalVar {spec, vars, i})
        },
        Top::BufferDecl {..} | Top::SamplerDecl {..} | Top::StructDef {..} |
        Top::ConstantBuffer {..} | Top::AliasDef {..} => Ok(t),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hlsl::{lexer, parser, symbolize};

    fn check_str(src: &str) -> CompileResult<Ast> {
        type_check(symbolize::symbolize(parser::parse(lexer::tokenize(
            src, "test.hlsl"
        )?)?)?)
    }

    fn first_fun_body(ast: &Ast) -> &Vec<Stmt> {
        for t in ast {
            if let Top::FunDef {body: Some(b), ..} = t {
                return b;
            }
        }
        panic!("no function body in AST");
    }

    #[test]
    fn literal_suffixes_drive_types() {
        let ast = check_str(
            "void f() { float a = 1.0f; }"
        ).unwrap();
        match &first_fun_body(&ast)[0] {
            Stmt::Decl {vars, ..} => {
                match vars[0].init.as_ref().unwrap() {
                    Expr::FloatLit {ty, ..} => {
                        assert_eq!(*ty, Type::Data(DataType::Float));
                    },
                    e => panic!("unexpected initializer {e:?}"),
                }
            },
            s => panic!("unexpected statement {s:?}"),
        }
    }

    #[test]
    fn unsuffixed_float_literal_is_double() {
        let ast = check_str("void f() { double d = 1.5; }").unwrap();
        match &first_fun_body(&ast)[0] {
            Stmt::Decl {vars, ..} => {
                match vars[0].init.as_ref().unwrap() {
                    Expr::FloatLit {ty, ..} => {
                        assert_eq!(*ty, Type::Data(DataType::Double));
                    },
                    e => panic!("unexpected initializer {e:?}"),
                }
            },
            s => panic!("unexpected statement {s:?}"),
        }
    }

    #[test]
    fn swizzle_on_scalar_is_limited() {
        assert!(check_str("void f() { float x = 1.0f; float y = x.x; }").is_ok());
        let r = check_str("void f() { float x = 1.0f; float4 y = x.xyzw; }");
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Type);
    }

    #[test]
    fn mixed_matrix_subscript_bases_rejected() {
        let r = check_str(
            "void f() { float4x4 m = (float4x4)0; float2 v = m._m00_11; }"
        );
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Type);
    }

    #[test]
    fn member_lookup_walks_inheritance_chain() {
        let ast = check_str(
            "struct B { float3 n; };\n\
             struct D : B { float2 uv; };\n\
             float3 f(D d) { return d.n; }"
        );
        assert!(ast.is_ok());
    }

    #[test]
    fn mul_shapes() {
        let ast = check_str(
            "float4x4 M;\n\
             float4 f(float4 v) { return mul(M, v); }"
        ).unwrap();
        match &first_fun_body(&ast)[0] {
            Stmt::Return {value: Some(Expr::Intrinsic {func, ty, ..}), ..} => {
                assert_eq!(*func, Intrinsic::Mul);
                assert_eq!(*ty, Type::Data(DataType::Float4));
            },
            s => panic!("unexpected statement {s:?}"),
        }
    }

    #[test]
    fn overload_resolution_prefers_lossless() {
        let ast = check_str(
            "float g(int x) { return 1.0f; }\n\
             float g(float x) { return 2.0f; }\n\
             float f() { return g(1u); }"
        ).unwrap();
        let int_id = match &ast[0] {
            Top::FunDef {id, ..} => id.clone(),
            t => panic!("unexpected top {t:?}"),
        };
        match &ast[2] {
            Top::FunDef {body: Some(b), ..} => match &b[0] {
                Stmt::Return {value: Some(Expr::Call {id, ..}), ..} => {
                    assert_eq!(*id, int_id);
                },
                s => panic!("unexpected statement {s:?}"),
            },
            t => panic!("unexpected top {t:?}"),
        }
    }

    #[test]
    fn ambiguous_overload_is_rejected() {
        let r = check_str(
            "float g(float2 v) { return v.x; }\n\
             float g(float3 v) { return v.x; }\n\
             float f() { return g(1.0f); }"
        );
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Type);
    }

    #[test]
    fn default_arguments_extend_short_calls() {
        assert!(check_str(
            "float g(float x, float s = 2.0f) { return x * s; }\n\
             float f() { return g(3.0f); }"
        ).is_ok());
    }

    #[test]
    fn texture_method_call_becomes_intrinsic() {
        let ast = check_str(
            "Texture2D t;\nSamplerState s;\n\
             float4 f(float2 uv) { return t.Sample(s, uv); }"
        ).unwrap();
        match &first_fun_body(&ast)[0] {
            Stmt::Return {value: Some(Expr::Intrinsic {func, args, ty, ..}), ..} => {
                assert_eq!(*func, Intrinsic::TexSample);
                assert_eq!(args.len(), 3);
                assert_eq!(*ty, Type::Data(DataType::Float4));
            },
            s => panic!("unexpected statement {s:?}"),
        }
    }

    #[test]
    fn sample_cmp_yields_scalar_and_requires_comparison_sampler() {
        let ast = check_str(
            "Texture2D shadowMap;\nSamplerComparisonState cmp;\n\
             float f(float2 uv) { return shadowMap.SampleCmp(cmp, uv, 0.5f); }"
        ).unwrap();
        match &first_fun_body(&ast)[0] {
            Stmt::Return {value: Some(Expr::Intrinsic {func, ty, ..}), ..} => {
                assert_eq!(*func, Intrinsic::TexSampleCmp);
                assert_eq!(*ty, Type::Data(DataType::Float));
            },
            s => panic!("unexpected statement {s:?}"),
        }
        let r = check_str(
            "Texture2D shadowMap;\nSamplerState s;\n\
             float f(float2 uv) { return shadowMap.SampleCmp(s, uv, 0.5f); }"
        );
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Type);
    }

    #[test]
    fn sample_accepts_matching_texel_offset() {
        assert!(check_str(
            "Texture2D t;\nSamplerState s;\n\
             float4 f(float2 uv) { return t.Sample(s, uv, int2(1, 2)); }"
        ).is_ok());
        let r = check_str(
            "Texture2D t;\nSamplerState s;\n\
             float4 f(float2 uv) { return t.Sample(s, uv, float2(1.0f, 2.0f)); }"
        );
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Type);
        let r = check_str(
            "Texture2D t;\nSamplerState s;\n\
             float4 f(float2 uv) { return t.Sample(s, uv, int3(1, 2, 3)); }"
        );
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Type);
    }

    #[test]
    fn sample_level_accepts_offset_after_level() {
        assert!(check_str(
            "Texture2D t;\nSamplerState s;\n\
             float4 f(float2 uv) { return t.SampleLevel(s, uv, 2.0f, int2(1, 1)); }"
        ).is_ok());
    }

    #[test]
    fn clip_with_bad_type_is_rejected() {
        let r = check_str(
            "float4x4 M;\nvoid f() { clip(M); }"
        );
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Type);
    }

    #[test]
    fn array_dims_must_be_constant() {
        assert!(check_str("void f() { float a[4]; a[0] = 1.0f; }").is_ok());
        let r = check_str("void f(int n) { float a[n]; }");
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Type);
    }

    #[test]
    fn const_globals_fold_in_array_dims() {
        assert!(check_str(
            "static const int N = 4;\nvoid f() { float a[N * 2]; a[7] = 0.0f; }"
        ).is_ok());
    }

    #[test]
    fn negative_constant_index_rejected() {
        let r = check_str("void f() { float a[4]; a[-1] = 1.0f; }");
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Type);
    }

    #[test]
    fn non_integral_index_rejected() {
        let r = check_str("void f() { float a[4]; a[1.5f] = 1.0f; }");
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Type);
    }

    #[test]
    fn interlocked_requires_integer_destination() {
        let r = check_str(
            "RWStructuredBuffer<float> b;\nvoid f() { InterlockedAdd(b[0], 1); }"
        );
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Type);
    }

    #[test]
    fn vector_comparison_yields_bool_vector() {
        let ast = check_str(
            "bool3 f(float3 a, float3 b) { return a < b; }"
        ).unwrap();
        match &first_fun_body(&ast)[0] {
            Stmt::Return {value: Some(Expr::BinOp {ty, ..}), ..} => {
                assert_eq!(*ty, Type::Data(DataType::Bool3));
            },
            s => panic!("unexpected statement {s:?}"),
        }
    }

    #[test]
    fn assignment_coerces_compatible_types() {
        let ast = check_str("void f() { float x = 1; }").unwrap();
        match &first_fun_body(&ast)[0] {
            Stmt::Decl {vars, ..} => {
                assert!(matches!(vars[0].init, Some(Expr::Cast {..})));
            },
            s => panic!("unexpected statement {s:?}"),
        }
    }
}
