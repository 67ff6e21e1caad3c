use crate::utils::info::*;
use crate::utils::name::Name;
use crate::utils::smap::*;

pub use crate::utils::ast::{AssignOp, BinOp, ExprType, PostUnOp, UnOp};
pub use crate::utils::data_type::DataType;

use std::cmp::Ordering;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BufferType {
    Buffer, StructuredBuffer, ByteAddressBuffer,
    RWBuffer, RWStructuredBuffer, RWByteAddressBuffer,
    AppendStructuredBuffer, ConsumeStructuredBuffer,

    RWTexture1D, RWTexture1DArray, RWTexture2D, RWTexture2DArray, RWTexture3D,

    Texture1D, Texture1DArray, Texture2D, Texture2DArray, Texture3D,
    TextureCube, TextureCubeArray, Texture2DMS, Texture2DMSArray,

    InputPatch, OutputPatch,

    PointStream, LineStream, TriangleStream,
}

impl BufferType {
    pub fn is_storage(&self) -> bool {
        *self >= BufferType::Buffer && *self <= BufferType::ConsumeStructuredBuffer
    }

    pub fn is_rw(&self) -> bool {
        *self >= BufferType::RWBuffer && *self <= BufferType::RWTexture3D
    }

    pub fn is_rw_texture(&self) -> bool {
        *self >= BufferType::RWTexture1D && *self <= BufferType::RWTexture3D
    }

    pub fn is_texture(&self) -> bool {
        *self >= BufferType::RWTexture1D && *self <= BufferType::Texture2DMSArray
    }

    pub fn is_multisampled(&self) -> bool {
        *self >= BufferType::Texture2DMS && *self <= BufferType::Texture2DMSArray
    }

    pub fn is_patch(&self) -> bool {
        *self >= BufferType::InputPatch && *self <= BufferType::OutputPatch
    }

    pub fn is_stream(&self) -> bool {
        *self >= BufferType::PointStream && *self <= BufferType::TriangleStream
    }
}

pub static BUFFER_TYPES: phf::Map<&'static str, BufferType> = phf::phf_map! {
    "Buffer" => BufferType::Buffer,
    "StructuredBuffer" => BufferType::StructuredBuffer,
    "ByteAddressBuffer" => BufferType::ByteAddressBuffer,
    "RWBuffer" => BufferType::RWBuffer,
    "RWStructuredBuffer" => BufferType::RWStructuredBuffer,
    "RWByteAddressBuffer" => BufferType::RWByteAddressBuffer,
    "AppendStructuredBuffer" => BufferType::AppendStructuredBuffer,
    "ConsumeStructuredBuffer" => BufferType::ConsumeStructuredBuffer,
    "RWTexture1D" => BufferType::RWTexture1D,
    "RWTexture1DArray" => BufferType::RWTexture1DArray,
    "RWTexture2D" => BufferType::RWTexture2D,
    "RWTexture2DArray" => BufferType::RWTexture2DArray,
    "RWTexture3D" => BufferType::RWTexture3D,
    "Texture1D" => BufferType::Texture1D,
    "Texture1DArray" => BufferType::Texture1DArray,
    "Texture2D" => BufferType::Texture2D,
    "Texture2DArray" => BufferType::Texture2DArray,
    "Texture3D" => BufferType::Texture3D,
    "TextureCube" => BufferType::TextureCube,
    "TextureCubeArray" => BufferType::TextureCubeArray,
    "Texture2DMS" => BufferType::Texture2DMS,
    "Texture2DMSArray" => BufferType::Texture2DMSArray,
    "InputPatch" => BufferType::InputPatch,
    "OutputPatch" => BufferType::OutputPatch,
    "PointStream" => BufferType::PointStream,
    "LineStream" => BufferType::LineStream,
    "TriangleStream" => BufferType::TriangleStream,
};

impl fmt::Display for BufferType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = BUFFER_TYPES.entries()
            .find(|(_, v)| *v == self)
            .map(|(k, _)| *k)
            .unwrap_or("<buffer>");
        write!(f, "{s}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplerType {
    SamplerState, SamplerComparisonState,
}

impl fmt::Display for SamplerType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SamplerType::SamplerState => write!(f, "SamplerState"),
            SamplerType::SamplerComparisonState => write!(f, "SamplerComparisonState"),
        }
    }
}

// Register classes of the source language's binding annotations: b = uniform buffer, t = texture,
// c = buffer offset, s = sampler, u = unordered access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterType {
    ConstantBuffer, TextureBuffer, BufferOffset, Sampler, UnorderedAccess,
}

impl RegisterType {
    pub fn from_char(c: char) -> Option<RegisterType> {
        match c {
            'b' => Some(RegisterType::ConstantBuffer),
            't' => Some(RegisterType::TextureBuffer),
            'c' => Some(RegisterType::BufferOffset),
            's' => Some(RegisterType::Sampler),
            'u' => Some(RegisterType::UnorderedAccess),
            _ => None,
        }
    }

    pub fn to_char(&self) -> char {
        match self {
            RegisterType::ConstantBuffer => 'b',
            RegisterType::TextureBuffer => 't',
            RegisterType::BufferOffset => 'c',
            RegisterType::Sampler => 's',
            RegisterType::UnorderedAccess => 'u',
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Register {
    pub ty: RegisterType,
    pub slot: usize,
    pub i: Info,
}

// Uniform-buffer member placement annotation "packoffset(c#.x)".
#[derive(Clone, Debug, PartialEq)]
pub struct PackOffset {
    pub row: usize,
    pub component: Option<char>,
    pub i: Info,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Semantic {
    ClipDistance, CullDistance, Coverage, Depth, DepthGreaterEqual, DepthLessEqual,
    DispatchThreadID, DomainLocation, GroupID, GroupIndex, GroupThreadID, GSInstanceID,
    InsideTessFactor, InstanceID, IsFrontFace, OutputControlPointID, Position, PrimitiveID,
    RenderTargetArrayIndex, SampleIndex, StencilRef, Target, TessFactor, VertexID,
    ViewportArrayIndex,
    UserDefined,
}

static SYSTEM_SEMANTICS: phf::Map<&'static str, Semantic> = phf::phf_map! {
    "sv_clipdistance" => Semantic::ClipDistance,
    "sv_culldistance" => Semantic::CullDistance,
    "sv_coverage" => Semantic::Coverage,
    "sv_depth" => Semantic::Depth,
    "sv_depthgreaterequal" => Semantic::DepthGreaterEqual,
    "sv_depthlessequal" => Semantic::DepthLessEqual,
    "sv_dispatchthreadid" => Semantic::DispatchThreadID,
    "sv_domainlocation" => Semantic::DomainLocation,
    "sv_groupid" => Semantic::GroupID,
    "sv_groupindex" => Semantic::GroupIndex,
    "sv_groupthreadid" => Semantic::GroupThreadID,
    "sv_gsinstanceid" => Semantic::GSInstanceID,
    "sv_insidetessfactor" => Semantic::InsideTessFactor,
    "sv_instanceid" => Semantic::InstanceID,
    "sv_isfrontface" => Semantic::IsFrontFace,
    "sv_outputcontrolpointid" => Semantic::OutputControlPointID,
    "sv_position" => Semantic::Position,
    "sv_primitiveid" => Semantic::PrimitiveID,
    "sv_rendertargetarrayindex" => Semantic::RenderTargetArrayIndex,
    "sv_sampleindex" => Semantic::SampleIndex,
    "sv_stencilref" => Semantic::StencilRef,
    "sv_target" => Semantic::Target,
    "sv_tessfactor" => Semantic::TessFactor,
    "sv_vertexid" => Semantic::VertexID,
    "sv_viewportarrayindex" => Semantic::ViewportArrayIndex,
};

impl Semantic {
    pub fn is_system_value(&self) -> bool {
        *self != Semantic::UserDefined
    }

    fn to_str(&self) -> &'static str {
        match self {
            Semantic::ClipDistance => "SV_ClipDistance",
            Semantic::CullDistance => "SV_CullDistance",
            Semantic::Coverage => "SV_Coverage",
            Semantic::Depth => "SV_Depth",
            Semantic::DepthGreaterEqual => "SV_DepthGreaterEqual",
            Semantic::DepthLessEqual => "SV_DepthLessEqual",
            Semantic::DispatchThreadID => "SV_DispatchThreadID",
            Semantic::DomainLocation => "SV_DomainLocation",
            Semantic::GroupID => "SV_GroupID",
            Semantic::GroupIndex => "SV_GroupIndex",
            Semantic::GroupThreadID => "SV_GroupThreadID",
            Semantic::GSInstanceID => "SV_GSInstanceID",
            Semantic::InsideTessFactor => "SV_InsideTessFactor",
            Semantic::InstanceID => "SV_InstanceID",
            Semantic::IsFrontFace => "SV_IsFrontFace",
            Semantic::OutputControlPointID => "SV_OutputControlPointID",
            Semantic::Position => "SV_Position",
            Semantic::PrimitiveID => "SV_PrimitiveID",
            Semantic::RenderTargetArrayIndex => "SV_RenderTargetArrayIndex",
            Semantic::SampleIndex => "SV_SampleIndex",
            Semantic::StencilRef => "SV_StencilRef",
            Semantic::Target => "SV_Target",
            Semantic::TessFactor => "SV_TessFactor",
            Semantic::VertexID => "SV_VertexID",
            Semantic::ViewportArrayIndex => "SV_ViewportArrayIndex",
            Semantic::UserDefined => "",
        }
    }
}

// A semantic together with its index. Parsing splits the right-most digit run off a user-defined
// name ("TEXCOORD3" becomes TEXCOORD with index 3); user-defined names are normalized to upper
// case so interface names agree between stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedSemantic {
    pub semantic: Semantic,
    pub index: usize,
    pub user_defined: String,
}

impl IndexedSemantic {
    pub fn new(semantic: Semantic, index: usize) -> IndexedSemantic {
        IndexedSemantic {semantic, index, user_defined: String::new()}
    }

    pub fn parse(text: &str) -> IndexedSemantic {
        let split = text.len() - text.chars()
            .rev()
            .take_while(|c| c.is_ascii_digit())
            .count();
        let (head, digits) = text.split_at(split);
        let index = if digits.is_empty() || digits.len() >= 10 {
            0
        } else {
            digits.parse::<usize>().unwrap_or(0)
        };
        let (head, index) = if digits.is_empty() {
            (text, 0)
        } else {
            (head, index)
        };
        if let Some(sys) = SYSTEM_SEMANTICS.get(head.to_ascii_lowercase().as_str()) {
            IndexedSemantic::new(*sys, index)
        } else {
            IndexedSemantic {
                semantic: Semantic::UserDefined,
                index,
                user_defined: head.to_ascii_uppercase(),
            }
        }
    }

    pub fn is_system_value(&self) -> bool {
        self.semantic.is_system_value()
    }
}

impl fmt::Display for IndexedSemantic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.semantic == Semantic::UserDefined {
            write!(f, "{0}{1}", self.user_defined, self.index)
        } else {
            write!(f, "{0}{1}", self.semantic.to_str(), self.index)
        }
    }
}

impl Ord for IndexedSemantic {
    fn cmp(&self, other: &Self) -> Ordering {
        self.semantic.cmp(&other.semantic)
            .then(self.index.cmp(&other.index))
            .then(self.user_defined.cmp(&other.user_defined))
    }
}

impl PartialOrd for IndexedSemantic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageClass {
    Extern, Precise, Shared, Static, Uniform, Volatile,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpModifier {
    Linear, Centroid, NoInterpolation, NoPerspective, Sample,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeModifier {
    Const, RowMajor, ColumnMajor, SNorm, UNorm,
}

// The type denoter. Unknown is the parser's placeholder; the type-check pass replaces it on every
// expression. Array dimension 0 denotes a dynamic (runtime-sized) dimension.
#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Unknown,
    Void,
    Data(DataType),
    Buffer {kind: BufferType, elem: Box<Type>},
    Sampler {kind: SamplerType},
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

    pub fn is_scalar(&self) -> bool {
        self.data_type().map(|dt| dt.is_scalar()).unwrap_or(false)
    }

    pub fn is_vector(&self) -> bool {
        self.data_type().map(|dt| dt.is_vector()).unwrap_or(false)
    }

    pub fn is_matrix(&self) -> bool {
        self.data_type().map(|dt| dt.is_matrix()).unwrap_or(false)
    }

    pub fn is_integral(&self) -> bool {
        self.data_type().map(|dt| dt.is_integral()).unwrap_or(false)
    }

    pub fn is_void(&self) -> bool {
        *self == Type::Void
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Unknown => write!(f, "<unknown>"),
            Type::Void => write!(f, "void"),
            Type::Data(dt) => write!(f, "{dt}"),
            Type::Buffer {kind, elem} => write!(f, "{kind}<{elem}>"),
            Type::Sampler {kind} => write!(f, "{kind}"),
            Type::Struct {id} => write!(f, "{id}"),
            Type::Array {elem, dims} => {
                write!(f, "{elem}")?;
                for d in dims {
                    if *d == 0 {
                        write!(f, "[]")?;
                    } else {
                        write!(f, "[{d}]")?;
                    }
                }
                Ok(())
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeSpec {
    pub ty: Type,
    pub storage: Vec<StorageClass>,
    pub interp: Vec<InterpModifier>,
    pub modifiers: Vec<TypeModifier>,
    pub i: Info,
}

impl TypeSpec {
    pub fn plain(ty: Type, i: Info) -> TypeSpec {
        TypeSpec {ty, storage: vec![], interp: vec![], modifiers: vec![], i}
    }

    pub fn is_const(&self) -> bool {
        self.modifiers.contains(&TypeModifier::Const)
            || self.storage.contains(&StorageClass::Static)
    }
}

// Built-in functions of the source language. Texture-object methods live here as well; the
// type-check pass turns a method call on a texture value into one of these with the receiver as
// the first argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Intrinsic {
    Abs, Acos, All, Any, Asin, Atan, Atan2, Ceil, Clamp, Clip, Cos, Cosh, Cross,
    Ddx, Ddy, Degrees, Determinant, Distance, Dot, Exp, Exp2, Floor, Fmod, Frac,
    GroupMemoryBarrierWithGroupSync, IsInf, IsNan, Length, Lerp, Log, Log2, Max,
    Min, Mul, Normalize, Pow, Radians, Rcp, Reflect, Refract, Round, Rsqrt,
    Saturate, Sign, Sin, Sinh, SmoothStep, Sqrt, Step, Tan, Tanh, Transpose, Trunc,

    InterlockedAdd, InterlockedAnd, InterlockedOr, InterlockedXor, InterlockedMin,
    InterlockedMax, InterlockedExchange, InterlockedCompareExchange,
    InterlockedCompareStore,

    TexSample, TexSampleBias, TexSampleGrad, TexSampleLevel, TexSampleCmp,
    TexLoad, TexGetDimensions,
}

impl Intrinsic {
    pub fn is_interlocked(&self) -> bool {
        *self >= Intrinsic::InterlockedAdd && *self <= Intrinsic::InterlockedCompareStore
    }

    pub fn is_texture_method(&self) -> bool {
        *self >= Intrinsic::TexSample && *self <= Intrinsic::TexGetDimensions
    }
}

pub static INTRINSICS: phf::Map<&'static str, Intrinsic> = phf::phf_map! {
    "abs" => Intrinsic::Abs,
    "acos" => Intrinsic::Acos,
    "all" => Intrinsic::All,
    "any" => Intrinsic::Any,
    "asin" => Intrinsic::Asin,
    "atan" => Intrinsic::Atan,
    "atan2" => Intrinsic::Atan2,
    "ceil" => Intrinsic::Ceil,
    "clamp" => Intrinsic::Clamp,
    "clip" => Intrinsic::Clip,
    "cos" => Intrinsic::Cos,
    "cosh" => Intrinsic::Cosh,
    "cross" => Intrinsic::Cross,
    "ddx" => Intrinsic::Ddx,
    "ddy" => Intrinsic::Ddy,
    "degrees" => Intrinsic::Degrees,
    "determinant" => Intrinsic::Determinant,
    "distance" => Intrinsic::Distance,
    "dot" => Intrinsic::Dot,
    "exp" => Intrinsic::Exp,
    "exp2" => Intrinsic::Exp2,
    "floor" => Intrinsic::Floor,
    "fmod" => Intrinsic::Fmod,
    "frac" => Intrinsic::Frac,
    "GroupMemoryBarrierWithGroupSync" => Intrinsic::GroupMemoryBarrierWithGroupSync,
    "isinf" => Intrinsic::IsInf,
    "isnan" => Intrinsic::IsNan,
    "length" => Intrinsic::Length,
    "lerp" => Intrinsic::Lerp,
    "log" => Intrinsic::Log,
    "log2" => Intrinsic::Log2,
    "max" => Intrinsic::Max,
    "min" => Intrinsic::Min,
    "mul" => Intrinsic::Mul,
    "normalize" => Intrinsic::Normalize,
    "pow" => Intrinsic::Pow,
    "radians" => Intrinsic::Radians,
    "rcp" => Intrinsic::Rcp,
    "reflect" => Intrinsic::Reflect,
    "refract" => Intrinsic::Refract,
    "round" => Intrinsic::Round,
    "rsqrt" => Intrinsic::Rsqrt,
    "saturate" => Intrinsic::Saturate,
    "sign" => Intrinsic::Sign,
    "sin" => Intrinsic::Sin,
    "sinh" => Intrinsic::Sinh,
    "smoothstep" => Intrinsic::SmoothStep,
    "sqrt" => Intrinsic::Sqrt,
    "step" => Intrinsic::Step,
    "tan" => Intrinsic::Tan,
    "tanh" => Intrinsic::Tanh,
    "transpose" => Intrinsic::Transpose,
    "trunc" => Intrinsic::Trunc,
    "InterlockedAdd" => Intrinsic::InterlockedAdd,
    "InterlockedAnd" => Intrinsic::InterlockedAnd,
    "InterlockedOr" => Intrinsic::InterlockedOr,
    "InterlockedXor" => Intrinsic::InterlockedXor,
    "InterlockedMin" => Intrinsic::InterlockedMin,
    "InterlockedMax" => Intrinsic::InterlockedMax,
    "InterlockedExchange" => Intrinsic::InterlockedExchange,
    "InterlockedCompareExchange" => Intrinsic::InterlockedCompareExchange,
    "InterlockedCompareStore" => Intrinsic::InterlockedCompareStore,
};

pub static TEXTURE_METHODS: phf::Map<&'static str, Intrinsic> = phf::phf_map! {
    "Sample" => Intrinsic::TexSample,
    "SampleBias" => Intrinsic::TexSampleBias,
    "SampleGrad" => Intrinsic::TexSampleGrad,
    "SampleLevel" => Intrinsic::TexSampleLevel,
    "SampleCmp" => Intrinsic::TexSampleCmp,
    "Load" => Intrinsic::TexLoad,
    "GetDimensions" => Intrinsic::TexGetDimensions,
};

impl fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let found = INTRINSICS.entries()
            .chain(TEXTURE_METHODS.entries())
            .find(|(_, v)| *v == self)
            .map(|(k, _)| *k);
        write!(f, "{0}", found.unwrap_or("<intrinsic>"))
    }
}

#[derive(Clone, Debug)]
pub enum Expr {
    Var {id: Name, ty: Type, i: Info},
    IntLit {text: String, v: i64, ty: Type, i: Info},
    FloatLit {text: String, ty: Type, i: Info},
    BoolLit {v: bool, ty: Type, i: Info},
    StringLit {v: String, ty: Type, i: Info},
    UnOp {op: UnOp, arg: Box<Expr>, ty: Type, i: Info},
    PostUnOp {op: PostUnOp, arg: Box<Expr>, ty: Type, i: Info},
    BinOp {lhs: Box<Expr>, op: BinOp, rhs: Box<Expr>, ty: Type, i: Info},
    Assign {lhs: Box<Expr>, op: AssignOp, rhs: Box<Expr>, ty: Type, i: Info},
    Ternary {cond: Box<Expr>, thn: Box<Expr>, els: Box<Expr>, ty: Type, i: Info},

    // A named call. Before type checking this covers intrinsics and texture-object methods as
    // well; the type-check pass replaces those with Intrinsic nodes.
    Call {target: Option<Box<Expr>>, id: Name, args: Vec<Expr>, ty: Type, i: Info},
    Intrinsic {func: Intrinsic, args: Vec<Expr>, ty: Type, i: Info},

    // Type constructor such as "float4(p, 1.0)".
    Ctor {dt: DataType, args: Vec<Expr>, ty: Type, i: Info},
    Cast {to: Type, arg: Box<Expr>, ty: Type, i: Info},

    // Struct member access, vector swizzle or matrix subscript; which one is decided during type
    // checking based on the target's type.
    Member {target: Box<Expr>, member: String, ty: Type, i: Info},
    Index {target: Box<Expr>, idx: Box<Expr>, ty: Type, i: Info},

    Sequence {exprs: Vec<Expr>, ty: Type, i: Info},
    InitList {elems: Vec<Expr>, ty: Type, i: Info},
}

impl Expr {
    pub fn with_type(self, new_ty: Type) -> Expr {
        match self {
            Expr::Var {id, i, ..} => Expr::Var {id, ty: new_ty, i},
            Expr::IntLit {text, v, i, ..} => Expr::IntLit {text, v, ty: new_ty, i},
            Expr::FloatLit {text, i, ..} => Expr::FloatLit {text, ty: new_ty, i},
            Expr::BoolLit {v, i, ..} => Expr::BoolLit {v, ty: new_ty, i},
            Expr::StringLit {v, i, ..} => Expr::StringLit {v, ty: new_ty, i},
            Expr::UnOp {op, arg, i, ..} => Expr::UnOp {op, arg, ty: new_ty, i},
            Expr::PostUnOp {op, arg, i, ..} => Expr::PostUnOp {op, arg, ty: new_ty, i},
            Expr::BinOp {lhs, op, rhs, i, ..} => Expr::BinOp {lhs, op, rhs, ty: new_ty, i},
            Expr::Assign {lhs, op, rhs, i, ..} => Expr::Assign {lhs, op, rhs, ty: new_ty, i},
            Expr::Ternary {cond, thn, els, i, ..} =>
                Expr::Ternary {cond, thn, els, ty: new_ty, i},
            Expr::Call {target, id, args, i, ..} =>
                Expr::Call {target, id, args, ty: new_ty, i},
            Expr::Intrinsic {func, args, i, ..} =>
                Expr::Intrinsic {func, args, ty: new_ty, i},
            Expr::Ctor {dt, args, i, ..} => Expr::Ctor {dt, args, ty: new_ty, i},
            Expr::Cast {to, arg, i, ..} => Expr::Cast {to, arg, ty: new_ty, i},
            Expr::Member {target, member, i, ..} =>
                Expr::Member {target, member, ty: new_ty, i},
            Expr::Index {target, idx, i, ..} => Expr::Index {target, idx, ty: new_ty, i},
            Expr::Sequence {exprs, i, ..} => Expr::Sequence {exprs, ty: new_ty, i},
            Expr::InitList {elems, i, ..} => Expr::InitList {elems, ty: new_ty, i},
        }
    }
}

impl ExprType<Type> for Expr {
    fn get_type<'a>(&'a self) -> &'a Type {
        match self {
            Expr::Var {ty, ..} => ty,
            Expr::IntLit {ty, ..} => ty,
            Expr::FloatLit {ty, ..} => ty,
            Expr::BoolLit {ty, ..} => ty,
            Expr::StringLit {ty, ..} => ty,
            Expr::UnOp {ty, ..} => ty,
            Expr::PostUnOp {ty, ..} => ty,
            Expr::BinOp {ty, ..} => ty,
            Expr::Assign {ty, ..} => ty,
            Expr::Ternary {ty, ..} => ty,
            Expr::Call {ty, ..} => ty,
            Expr::Intrinsic {ty, ..} => ty,
            Expr::Ctor {ty, ..} => ty,
            Expr::Cast {ty, ..} => ty,
            Expr::Member {ty, ..} => ty,
            Expr::Index {ty, ..} => ty,
            Expr::Sequence {ty, ..} => ty,
            Expr::InitList {ty, ..} => ty,
        }
    }

    fn is_leaf_node(&self) -> bool {
        match self {
            Expr::Var {..} | Expr::IntLit {..} | Expr::FloatLit {..} |
            Expr::BoolLit {..} | Expr::StringLit {..} | Expr::Call {..} |
            Expr::Intrinsic {..} | Expr::Ctor {..} | Expr::Member {..} |
            Expr::Index {..} => true,
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
            Expr::StringLit {i, ..} => i.clone(),
            Expr::UnOp {i, ..} => i.clone(),
            Expr::PostUnOp {i, ..} => i.clone(),
            Expr::BinOp {i, ..} => i.clone(),
            Expr::Assign {i, ..} => i.clone(),
            Expr::Ternary {i, ..} => i.clone(),
            Expr::Call {i, ..} => i.clone(),
            Expr::Intrinsic {i, ..} => i.clone(),
            Expr::Ctor {i, ..} => i.clone(),
            Expr::Cast {i, ..} => i.clone(),
            Expr::Member {i, ..} => i.clone(),
            Expr::Index {i, ..} => i.clone(),
            Expr::Sequence {i, ..} => i.clone(),
            Expr::InitList {i, ..} => i.clone(),
        }
    }
}

impl SMapAccum<Expr> for Expr {
    fn smap_accum_l_result<A, E>(
        self,
        acc: Result<A, E>,
        f: impl Fn(A, Expr) -> Result<(A, Expr), E>
    ) -> Result<(A, Expr), E> {
        match self {
            Expr::UnOp {op, arg, ty, i} => {
                let (acc, arg) = f(acc?, *arg)?;
                Ok((acc, Expr::UnOp {op, arg: Box::new(arg), ty, i}))
            },
            Expr::PostUnOp {op, arg, ty, i} => {
                let (acc, arg) = f(acc?, *arg)?;
                Ok((acc, Expr::PostUnOp {op, arg: Box::new(arg), ty, i}))
            },
            Expr::BinOp {lhs, op, rhs, ty, i} => {
                let (acc, lhs) = f(acc?, *lhs)?;
                let (acc, rhs) = f(acc, *rhs)?;
                Ok((acc, Expr::BinOp {
                    lhs: Box::new(lhs), op, rhs: Box::new(rhs), ty, i
                }))
            },
            Expr::Assign {lhs, op, rhs, ty, i} => {
                let (acc, lhs) = f(acc?, *lhs)?;
                let (acc, rhs) = f(acc, *rhs)?;
                Ok((acc, Expr::Assign {
                    lhs: Box::new(lhs), op, rhs: Box::new(rhs), ty, i
                }))
            },
            Expr::Ternary {cond, thn, els, ty, i} => {
                let (acc, cond) = f(acc?, *cond)?;
                let (acc, thn) = f(acc, *thn)?;
                let (acc, els) = f(acc, *els)?;
                Ok((acc, Expr::Ternary {
                    cond: Box::new(cond), thn: Box::new(thn), els: Box::new(els), ty, i
                }))
            },
            Expr::Call {target, id, args, ty, i} => {
                let (acc, target) = match target {
                    Some(t) => {
                        let (acc, t) = f(acc?, *t)?;
                        (Ok(acc), Some(Box::new(t)))
                    },
                    None => (acc, None),
                };
                let (acc, args) = args.smap_accum_l_result(acc, &f)?;
                Ok((acc, Expr::Call {target, id, args, ty, i}))
            },
            Expr::Intrinsic {func, args, ty, i} => {
                let (acc, args) = args.smap_accum_l_result(acc, &f)?;
                Ok((acc, Expr::Intrinsic {func, args, ty, i}))
            },
            Expr::Ctor {dt, args, ty, i} => {
                let (acc, args) = args.smap_accum_l_result(acc, &f)?;
                Ok((acc, Expr::Ctor {dt, args, ty, i}))
            },
            Expr::Cast {to, arg, ty, i} => {
                let (acc, arg) = f(acc?, *arg)?;
                Ok((acc, Expr::Cast {to, arg: Box::new(arg), ty, i}))
            },
            Expr::Member {target, member, ty, i} => {
                let (acc, target) = f(acc?, *target)?;
                Ok((acc, Expr::Member {target: Box::new(target), member, ty, i}))
            },
            Expr::Index {target, idx, ty, i} => {
                let (acc, target) = f(acc?, *target)?;
                let (acc, idx) = f(acc, *idx)?;
                Ok((acc, Expr::Index {
                    target: Box::new(target), idx: Box::new(idx), ty, i
                }))
            },
            Expr::Sequence {exprs, ty, i} => {
                let (acc, exprs) = exprs.smap_accum_l_result(acc, &f)?;
                Ok((acc, Expr::Sequence {exprs, ty, i}))
            },
            Expr::InitList {elems, ty, i} => {
                let (acc, elems) = elems.smap_accum_l_result(acc, &f)?;
                Ok((acc, Expr::InitList {elems, ty, i}))
            },
            Expr::Var {..} | Expr::IntLit {..} | Expr::FloatLit {..} |
            Expr::BoolLit {..} | Expr::StringLit {..} => Ok((acc?, self)),
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
            Expr::Call {target, args, ..} => {
                let acc = match target {
                    Some(t) => f(acc?, t),
                    None => acc,
                };
                args.sfold_result(acc, &f)
            },
            Expr::Intrinsic {args, ..} => args.sfold_result(acc, &f),
            Expr::Ctor {args, ..} => args.sfold_result(acc, &f),
            Expr::Cast {arg, ..} => f(acc?, arg),
            Expr::Member {target, ..} => f(acc?, target),
            Expr::Index {target, idx, ..} => f(f(acc?, target)?, idx),
            Expr::Sequence {exprs, ..} => exprs.sfold_result(acc, &f),
            Expr::InitList {elems, ..} => elems.sfold_result(acc, &f),
            Expr::Var {..} | Expr::IntLit {..} | Expr::FloatLit {..} |
            Expr::BoolLit {..} | Expr::StringLit {..} => acc,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Attribute {
    pub id: String,
    pub args: Vec<Expr>,
    pub i: Info,
}

#[derive(Clone, Debug)]
pub struct VarInit {
    pub id: Name,
    pub dims: Vec<Expr>,
    pub semantic: Option<IndexedSemantic>,
    pub pack_offset: Option<PackOffset>,
    pub init: Option<Expr>,
    pub i: Info,
}

#[derive(Clone, Debug)]
pub struct SwitchCase {
    pub value: Option<Expr>,
    pub body: Vec<Stmt>,
    pub i: Info,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Decl {spec: TypeSpec, vars: Vec<VarInit>, i: Info},
    Expr {e: Expr, i: Info},
    Block {body: Vec<Stmt>, i: Info},
    If {cond: Expr, thn: Vec<Stmt>, els: Vec<Stmt>, i: Info},
    While {cond: Expr, body: Vec<Stmt>, attrs: Vec<Attribute>, i: Info},
    DoWhile {body: Vec<Stmt>, cond: Expr, i: Info},
    For {
        init: Vec<Stmt>, cond: Option<Expr>, incr: Option<Expr>,
        body: Vec<Stmt>, attrs: Vec<Attribute>, i: Info
    },
    Switch {cond: Expr, cases: Vec<SwitchCase>, i: Info},
    Return {value: Option<Expr>, i: Info},
    Break {i: Info},
    Continue {i: Info},
    Discard {i: Info},
    Empty {i: Info},
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
            Stmt::Empty {i} => i.clone(),
        }
    }
}

impl SMapAccum<Stmt> for Stmt {
    fn smap_accum_l_result<A, E>(
        self,
        acc: Result<A, E>,
        f: impl Fn(A, Stmt) -> Result<(A, Stmt), E>
    ) -> Result<(A, Stmt), E> {
        match self {
            Stmt::Block {body, i} => {
                let (acc, body) = body.smap_accum_l_result(acc, &f)?;
                Ok((acc, Stmt::Block {body, i}))
            },
            Stmt::If {cond, thn, els, i} => {
                let (acc, thn) = thn.smap_accum_l_result(acc, &f)?;
                let (acc, els) = els.smap_accum_l_result(Ok(acc), &f)?;
                Ok((acc, Stmt::If {cond, thn, els, i}))
            },
            Stmt::While {cond, body, attrs, i} => {
                let (acc, body) = body.smap_accum_l_result(acc, &f)?;
                Ok((acc, Stmt::While {cond, body, attrs, i}))
            },
            Stmt::DoWhile {body, cond, i} => {
                let (acc, body) = body.smap_accum_l_result(acc, &f)?;
                Ok((acc, Stmt::DoWhile {body, cond, i}))
            },
            Stmt::For {init, cond, incr, body, attrs, i} => {
                let (acc, init) = init.smap_accum_l_result(acc, &f)?;
                let (acc, body) = body.smap_accum_l_result(Ok(acc), &f)?;
                Ok((acc, Stmt::For {init, cond, incr, body, attrs, i}))
            },
            Stmt::Switch {cond, cases, i} => {
                let (acc, cases) = cases.into_iter()
                    .fold(Ok((acc?, vec![])), |acc: Result<(A, Vec<SwitchCase>), E>, c| {
                        let (acc, mut cases) = acc?;
                        let SwitchCase {value, body, i} = c;
                        let (acc, body) = body.smap_accum_l_result(Ok(acc), &f)?;
                        cases.push(SwitchCase {value, body, i});
                        Ok((acc, cases))
                    })?;
                Ok((acc, Stmt::Switch {cond, cases, i}))
            },
            Stmt::Decl {..} | Stmt::Expr {..} | Stmt::Return {..} | Stmt::Break {..} |
            Stmt::Continue {..} | Stmt::Discard {..} | Stmt::Empty {..} => Ok((acc?, self)),
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
            Stmt::Decl {..} | Stmt::Expr {..} | Stmt::Return {..} | Stmt::Break {..} |
            Stmt::Continue {..} | Stmt::Discard {..} | Stmt::Empty {..} => acc,
        }
    }
}

impl SMapAccum<Expr> for Stmt {
    fn smap_accum_l_result<A, E>(
        self,
        acc: Result<A, E>,
        f: impl Fn(A, Expr) -> Result<(A, Expr), E>
    ) -> Result<(A, Stmt), E> {
        match self {
            Stmt::Decl {spec, vars, i} => {
                let (acc, vars) = vars.into_iter()
                    .fold(Ok((acc?, vec![])), |acc: Result<(A, Vec<VarInit>), E>, v| {
                        let (acc, mut vars) = acc?;
                        let VarInit {id, dims, semantic, pack_offset, init, i} = v;
                        let (acc, init) = match init {
                            Some(e) => {
                                let (acc, e) = f(acc, e)?;
                                (acc, Some(e))
                            },
                            None => (acc, None),
                        };
                        vars.push(VarInit {id, dims, semantic, pack_offset, init, i});
                        Ok((acc, vars))
                    })?;
                Ok((acc, Stmt::Decl {spec, vars, i}))
            },
            Stmt::Expr {e, i} => {
                let (acc, e) = f(acc?, e)?;
                Ok((acc, Stmt::Expr {e, i}))
            },
            Stmt::If {cond, thn, els, i} => {
                let (acc, cond) = f(acc?, cond)?;
                Ok((acc, Stmt::If {cond, thn, els, i}))
            },
            Stmt::While {cond, body, attrs, i} => {
                let (acc, cond) = f(acc?, cond)?;
                Ok((acc, Stmt::While {cond, body, attrs, i}))
            },
            Stmt::DoWhile {body, cond, i} => {
                let (acc, cond) = f(acc?, cond)?;
                Ok((acc, Stmt::DoWhile {body, cond, i}))
            },
            Stmt::For {init, cond, incr, body, attrs, i} => {
                let (acc, cond) = match cond {
                    Some(e) => {
                        let (acc, e) = f(acc?, e)?;
                        (Ok(acc), Some(e))
                    },
                    None => (acc, None),
                };
                let (acc, incr) = match incr {
                    Some(e) => {
                        let (acc, e) = f(acc?, e)?;
                        (Ok(acc), Some(e))
                    },
                    None => (acc, None),
                };
                Ok((acc?, Stmt::For {init, cond, incr, body, attrs, i}))
            },
            Stmt::Switch {cond, cases, i} => {
                let (acc, cond) = f(acc?, cond)?;
                Ok((acc, Stmt::Switch {cond, cases, i}))
            },
            Stmt::Return {value, i} => {
                let (acc, value) = match value {
                    Some(e) => {
                        let (acc, e) = f(acc?, e)?;
                        (acc, Some(e))
                    },
                    None => (acc?, None),
                };
                Ok((acc, Stmt::Return {value, i}))
            },
            Stmt::Block {..} | Stmt::Break {..} | Stmt::Continue {..} |
            Stmt::Discard {..} | Stmt::Empty {..} => Ok((acc?, self)),
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
            Stmt::Decl {vars, ..} => {
                vars.iter().fold(acc, |acc, v| {
                    let acc = v.dims.sfold_result(acc, &f);
                    match &v.init {
                        Some(e) => f(acc?, e),
                        None => acc,
                    }
                })
            },
            Stmt::Expr {e, ..} => f(acc?, e),
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
            Stmt::Switch {cond, cases, ..} => {
                let acc = f(acc?, cond);
                cases.iter().fold(acc, |acc, c| {
                    match &c.value {
                        Some(e) => f(acc?, e),
                        None => acc,
                    }
                })
            },
            Stmt::Return {value: Some(e), ..} => f(acc?, e),
            Stmt::Return {value: None, ..} | Stmt::Block {..} | Stmt::Break {..} |
            Stmt::Continue {..} | Stmt::Discard {..} | Stmt::Empty {..} => acc,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamDir {
    In, Out, InOut,
}

#[derive(Clone, Debug)]
pub struct Param {
    pub spec: TypeSpec,
    pub id: Name,
    pub dims: Vec<Expr>,
    pub semantic: Option<IndexedSemantic>,
    pub dir: ParamDir,
    pub default: Option<Expr>,
    pub i: Info,
}

#[derive(Clone, Debug)]
pub struct StructField {
    pub interp: Vec<InterpModifier>,
    pub ty: Type,
    pub id: String,
    pub dims: Vec<Expr>,
    pub semantic: Option<IndexedSemantic>,
    pub i: Info,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformBufferType {
    CBuffer, TBuffer,
}

#[derive(Clone, Debug)]
pub struct CBufferField {
    pub ty: Type,
    pub id: Name,
    pub dims: Vec<Expr>,
    pub pack_offset: Option<PackOffset>,
    pub i: Info,
}

// Effect-style sampler state entry, e.g. "Filter = MIN_MAG_MIP_LINEAR;".
#[derive(Clone, Debug)]
pub struct SamplerValue {
    pub key: String,
    pub value: String,
    pub i: Info,
}

#[derive(Clone, Debug)]
pub enum Top {
    FunDef {
        attrs: Vec<Attribute>,
        ret: TypeSpec,
        id: Name,
        params: Vec<Param>,
        ret_semantic: Option<IndexedSemantic>,
        body: Option<Vec<Stmt>>,
        i: Info,
    },
    StructDef {id: Name, base: Option<Name>, fields: Vec<StructField>, i: Info},
    ConstantBuffer {
        kind: UniformBufferType,
        id: Name,
        register: Option<Register>,
        fields: Vec<CBufferField>,
        i: Info,
    },
    BufferDecl {
        kind: BufferType,
        elem: Type,
        id: Name,
        dims: Vec<Expr>,
        register: Option<Register>,
        i: Info,
    },
    SamplerDecl {
        kind: SamplerType,
        id: Name,
        register: Option<Register>,
        state: Vec<SamplerValue>,
        i: Info,
    },
    AliasDef {id: Name, ty: Type, i: Info},
    GlobalVar {spec: TypeSpec, vars: Vec<VarInit>, i: Info},
}

impl InfoNode for Top {
    fn get_info(&self) -> Info {
        match self {
            Top::FunDef {i, ..} => i.clone(),
            Top::StructDef {i, ..} => i.clone(),
            Top::ConstantBuffer {i, ..} => i.clone(),
            Top::BufferDecl {i, ..} => i.clone(),
            Top::SamplerDecl {i, ..} => i.clone(),
            Top::AliasDef {i, ..} => i.clone(),
            Top::GlobalVar {i, ..} => i.clone(),
        }
    }
}

pub type Ast = Vec<Top>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn indexed_semantic_round_trip() {
        let cases = [
            IndexedSemantic::new(Semantic::Position, 0),
            IndexedSemantic::new(Semantic::Target, 3),
            IndexedSemantic::parse("TEXCOORD7"),
            IndexedSemantic::parse("COLOR"),
        ];
        for s in cases {
            let printed = format!("{s}");
            assert_eq!(IndexedSemantic::parse(&printed), s, "round trip of {printed}");
        }
    }

    #[test]
    fn user_defined_semantic_splits_trailing_digits() {
        let s = IndexedSemantic::parse("TEXCOORD12");
        assert_eq!(s.semantic, Semantic::UserDefined);
        assert_eq!(s.user_defined, "TEXCOORD");
        assert_eq!(s.index, 12);
    }

    #[test]
    fn system_semantics_parse_case_insensitively() {
        assert_eq!(
            IndexedSemantic::parse("SV_POSITION").semantic,
            Semantic::Position
        );
        assert_eq!(IndexedSemantic::parse("sv_target2").index, 2);
        assert_eq!(
            IndexedSemantic::parse("SV_DispatchThreadID").semantic,
            Semantic::DispatchThreadID
        );
    }

    #[test]
    fn user_defined_names_normalize_to_upper_case() {
        let s = IndexedSemantic::parse("texcoord0");
        assert_eq!(s.user_defined, "TEXCOORD");
    }

    #[test]
    fn semantic_ordering_is_kind_then_index() {
        let a = IndexedSemantic::new(Semantic::Position, 0);
        let b = IndexedSemantic::new(Semantic::Target, 0);
        let c = IndexedSemantic::new(Semantic::Target, 1);
        assert!(a < b && b < c);
    }

    #[test]
    fn buffer_type_classification() {
        assert!(BufferType::RWStructuredBuffer.is_storage());
        assert!(BufferType::RWTexture2D.is_rw_texture());
        assert!(BufferType::Texture2DMS.is_multisampled());
        assert!(BufferType::TriangleStream.is_stream());
        assert!(!BufferType::Texture2D.is_rw());
    }

    #[test]
    fn register_type_char_round_trip() {
        for c in ['b', 't', 'c', 's', 'u'] {
            let r = RegisterType::from_char(c).unwrap();
            assert_eq!(r.to_char(), c);
        }
        assert_eq!(RegisterType::from_char('x'), None);
    }
}
