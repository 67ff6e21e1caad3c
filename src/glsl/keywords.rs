use super::ast::Type;
use crate::hlsl::ast::{BufferType, Intrinsic, Semantic};
use crate::option::ShaderStage;
use crate::utils::data_type::DataType;

// Name tables for the target language: data types, combined sampler types, image types, stage
// built-in variables and intrinsic function renames.

pub fn data_type_name(dt: DataType) -> String {
    if dt.is_scalar() {
        return match dt {
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::UInt => "uint",
            DataType::Half | DataType::Float => "float",
            DataType::Double => "double",
            _ => unreachable!(),
        }.to_string();
    }
    let prefix = match dt.base() {
        DataType::Bool => "b",
        DataType::Int => "i",
        DataType::UInt => "u",
        DataType::Half | DataType::Float => "",
        DataType::Double => "d",
        _ => unreachable!(),
    };
    if dt.is_vector() {
        format!("{prefix}vec{0}", dt.vector_dim())
    } else {
        let (r, c) = dt.matrix_dim();
        // Matrices only exist for single and double precision in the target language.
        let prefix = if dt.base() == DataType::Double { "d" } else { "" };
        if r == c {
            format!("{prefix}mat{r}")
        } else {
            format!("{prefix}mat{r}x{c}")
        }
    }
}

pub fn type_name(ty: &Type) -> String {
    match ty {
        Type::Void => "void".to_string(),
        Type::Data(dt) => data_type_name(*dt),
        Type::Sampler {kind, base, shadow} => sampler_type_name(*kind, *base, *shadow)
            .unwrap_or_else(|| "sampler2D".to_string()),
        Type::Image {kind, base} => image_type_name(*kind, *base)
            .unwrap_or_else(|| "image2D".to_string()),
        Type::Struct {id} => id.get_str().clone(),
        Type::Array {elem, ..} => type_name(elem),
    }
}

fn sampler_prefix(base: DataType) -> &'static str {
    match base.base() {
        DataType::Int => "i",
        DataType::UInt => "u",
        _ => "",
    }
}

pub fn sampler_type_name(kind: BufferType, elem: DataType, shadow: bool) -> Option<String> {
    if shadow {
        // Comparison sampling implies a depth texture; shadow samplers have no int/uint forms.
        let name = match kind {
            BufferType::Texture1D => "sampler1DShadow",
            BufferType::Texture1DArray => "sampler1DArrayShadow",
            BufferType::Texture2D => "sampler2DShadow",
            BufferType::Texture2DArray => "sampler2DArrayShadow",
            BufferType::TextureCube => "samplerCubeShadow",
            BufferType::TextureCubeArray => "samplerCubeArrayShadow",
            _ => return None,
        };
        return Some(name.to_string());
    }
    let suffix = match kind {
        BufferType::Texture1D => "sampler1D",
        BufferType::Texture1DArray => "sampler1DArray",
        BufferType::Texture2D => "sampler2D",
        BufferType::Texture2DArray => "sampler2DArray",
        BufferType::Texture3D => "sampler3D",
        BufferType::TextureCube => "samplerCube",
        BufferType::TextureCubeArray => "samplerCubeArray",
        BufferType::Texture2DMS => "sampler2DMS",
        BufferType::Texture2DMSArray => "sampler2DMSArray",
        BufferType::Buffer => "samplerBuffer",
        _ => return None,
    };
    Some(format!("{0}{suffix}", sampler_prefix(elem)))
}

pub fn image_type_name(kind: BufferType, elem: DataType) -> Option<String> {
    let suffix = match kind {
        BufferType::RWTexture1D => "image1D",
        BufferType::RWTexture1DArray => "image1DArray",
        BufferType::RWTexture2D => "image2D",
        BufferType::RWTexture2DArray => "image2DArray",
        BufferType::RWTexture3D => "image3D",
        BufferType::RWBuffer => "imageBuffer",
        _ => return None,
    };
    Some(format!("{0}{suffix}", sampler_prefix(elem)))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoDir {
    Input, Output,
}

// The built-in variable a system-value semantic maps onto for a given stage and direction,
// together with the built-in's type. A None entry means the semantic has no counterpart in that
// position and must be reported against the stage.
pub fn semantic_builtin(
    semantic: Semantic,
    stage: ShaderStage,
    dir: IoDir
) -> Option<(&'static str, DataType)> {
    use IoDir::*;
    use ShaderStage::*;
    match (semantic, dir) {
        (Semantic::Position, Output) => match stage {
            Vertex | TessControl | TessEvaluation | Geometry => {
                Some(("gl_Position", DataType::Float4))
            },
            _ => None,
        },
        (Semantic::Position, Input) => match stage {
            Fragment => Some(("gl_FragCoord", DataType::Float4)),
            _ => None,
        },
        (Semantic::VertexID, Input) if stage == Vertex => {
            Some(("gl_VertexID", DataType::Int))
        },
        (Semantic::InstanceID, Input) if stage == Vertex => {
            Some(("gl_InstanceID", DataType::Int))
        },
        (Semantic::Depth, Output) if stage == Fragment => {
            Some(("gl_FragDepth", DataType::Float))
        },
        (Semantic::DepthGreaterEqual, Output) if stage == Fragment => {
            Some(("gl_FragDepth", DataType::Float))
        },
        (Semantic::DepthLessEqual, Output) if stage == Fragment => {
            Some(("gl_FragDepth", DataType::Float))
        },
        (Semantic::IsFrontFace, Input) if stage == Fragment => {
            Some(("gl_FrontFacing", DataType::Bool))
        },
        (Semantic::SampleIndex, Input) if stage == Fragment => {
            Some(("gl_SampleID", DataType::Int))
        },
        (Semantic::PrimitiveID, Input) => match stage {
            Fragment | TessControl | TessEvaluation | Geometry => {
                Some(("gl_PrimitiveID", DataType::Int))
            },
            _ => None,
        },
        (Semantic::DispatchThreadID, Input) if stage == Compute => {
            Some(("gl_GlobalInvocationID", DataType::UInt3))
        },
        (Semantic::GroupID, Input) if stage == Compute => {
            Some(("gl_WorkGroupID", DataType::UInt3))
        },
        (Semantic::GroupThreadID, Input) if stage == Compute => {
            Some(("gl_LocalInvocationID", DataType::UInt3))
        },
        (Semantic::GroupIndex, Input) if stage == Compute => {
            Some(("gl_LocalInvocationIndex", DataType::UInt))
        },
        (Semantic::DomainLocation, Input) if stage == TessEvaluation => {
            Some(("gl_TessCoord", DataType::Float3))
        },
        (Semantic::OutputControlPointID, Input) if stage == TessControl => {
            Some(("gl_InvocationID", DataType::Int))
        },
        (Semantic::GSInstanceID, Input) if stage == Geometry => {
            Some(("gl_InvocationID", DataType::Int))
        },
        (Semantic::RenderTargetArrayIndex, Output) if stage == Geometry => {
            Some(("gl_Layer", DataType::Int))
        },
        (Semantic::ViewportArrayIndex, Output) if stage == Geometry => {
            Some(("gl_ViewportIndex", DataType::Int))
        },
        _ => None,
    }
}

// Direct function renames. Intrinsics that need structural rewriting (mul, rcp, the texture
// methods, the interlocked family, clip and saturate) are handled by the converter instead.
pub fn intrinsic_fn_name(func: Intrinsic) -> Option<&'static str> {
    use Intrinsic::*;
    let s = match func {
        Abs => "abs",
        Acos => "acos",
        All => "all",
        Any => "any",
        Asin => "asin",
        Atan | Atan2 => "atan",
        Ceil => "ceil",
        Clamp => "clamp",
        Cos => "cos",
        Cosh => "cosh",
        Cross => "cross",
        Ddx => "dFdx",
        Ddy => "dFdy",
        Degrees => "degrees",
        Determinant => "determinant",
        Distance => "distance",
        Dot => "dot",
        Exp => "exp",
        Exp2 => "exp2",
        Floor => "floor",
        Fmod => "mod",
        Frac => "fract",
        GroupMemoryBarrierWithGroupSync => "barrier",
        IsInf => "isinf",
        IsNan => "isnan",
        Length => "length",
        Lerp => "mix",
        Log => "log",
        Log2 => "log2",
        Max => "max",
        Min => "min",
        Normalize => "normalize",
        Pow => "pow",
        Radians => "radians",
        Reflect => "reflect",
        Refract => "refract",
        Round => "round",
        Rsqrt => "inversesqrt",
        Sign => "sign",
        Sin => "sin",
        Sinh => "sinh",
        SmoothStep => "smoothstep",
        Sqrt => "sqrt",
        Step => "step",
        Tan => "tan",
        Tanh => "tanh",
        Transpose => "transpose",
        Trunc => "trunc",
        _ => return None,
    };
    Some(s)
}

pub fn interlocked_fn_name(func: Intrinsic) -> Option<&'static str> {
    use Intrinsic::*;
    let s = match func {
        InterlockedAdd => "atomicAdd",
        InterlockedAnd => "atomicAnd",
        InterlockedOr => "atomicOr",
        InterlockedXor => "atomicXor",
        InterlockedMin => "atomicMin",
        InterlockedMax => "atomicMax",
        InterlockedExchange => "atomicExchange",
        InterlockedCompareExchange | InterlockedCompareStore => "atomicCompSwap",
        _ => return None,
    };
    Some(s)
}

// Built-in variable names are reserved so symbolized locals can never shadow them in the output.
pub const RESERVED_BUILTINS: &[&str] = &[
    "gl_Position", "gl_FragCoord", "gl_FragDepth", "gl_FrontFacing", "gl_VertexID",
    "gl_InstanceID", "gl_PrimitiveID", "gl_SampleID", "gl_GlobalInvocationID",
    "gl_WorkGroupID", "gl_LocalInvocationID", "gl_LocalInvocationIndex",
    "gl_TessCoord", "gl_InvocationID", "gl_Layer", "gl_ViewportIndex",
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn data_type_names() {
        assert_eq!(data_type_name(DataType::Float4), "vec4");
        assert_eq!(data_type_name(DataType::Int3), "ivec3");
        assert_eq!(data_type_name(DataType::UInt2), "uvec2");
        assert_eq!(data_type_name(DataType::Bool4), "bvec4");
        assert_eq!(data_type_name(DataType::Float4x4), "mat4");
        assert_eq!(data_type_name(DataType::Float2x3), "mat2x3");
        assert_eq!(data_type_name(DataType::Double3), "dvec3");
        assert_eq!(data_type_name(DataType::Half2), "vec2");
    }

    #[test]
    fn sampler_names_follow_element_type() {
        assert_eq!(
            sampler_type_name(BufferType::Texture2D, DataType::Float4, false),
            Some("sampler2D".to_string())
        );
        assert_eq!(
            sampler_type_name(BufferType::Texture2D, DataType::Int4, false),
            Some("isampler2D".to_string())
        );
        assert_eq!(
            sampler_type_name(BufferType::TextureCube, DataType::Float4, false),
            Some("samplerCube".to_string())
        );
        assert_eq!(
            sampler_type_name(BufferType::RWTexture2D, DataType::Float4, false),
            None
        );
    }

    #[test]
    fn shadow_sampler_names() {
        assert_eq!(
            sampler_type_name(BufferType::Texture2D, DataType::Float4, true),
            Some("sampler2DShadow".to_string())
        );
        assert_eq!(
            sampler_type_name(BufferType::TextureCube, DataType::Float4, true),
            Some("samplerCubeShadow".to_string())
        );
        assert_eq!(
            sampler_type_name(BufferType::Texture2DMS, DataType::Float4, true),
            None
        );
    }

    #[test]
    fn image_names() {
        assert_eq!(
            image_type_name(BufferType::RWTexture2D, DataType::UInt),
            Some("uimage2D".to_string())
        );
        assert_eq!(image_type_name(BufferType::Texture2D, DataType::Float4), None);
    }

    #[test]
    fn position_maps_by_stage_and_direction() {
        use crate::option::ShaderStage::*;
        assert_eq!(
            semantic_builtin(Semantic::Position, Vertex, IoDir::Output),
            Some(("gl_Position", DataType::Float4))
        );
        assert_eq!(
            semantic_builtin(Semantic::Position, Fragment, IoDir::Input),
            Some(("gl_FragCoord", DataType::Float4))
        );
        assert_eq!(semantic_builtin(Semantic::Position, Compute, IoDir::Input), None);
    }

    #[test]
    fn compute_semantics_map_to_invocation_builtins() {
        use crate::option::ShaderStage::Compute;
        assert_eq!(
            semantic_builtin(Semantic::DispatchThreadID, Compute, IoDir::Input),
            Some(("gl_GlobalInvocationID", DataType::UInt3))
        );
        assert_eq!(
            semantic_builtin(Semantic::GroupIndex, Compute, IoDir::Input),
            Some(("gl_LocalInvocationIndex", DataType::UInt))
        );
    }

    #[test]
    fn intrinsic_renames() {
        assert_eq!(intrinsic_fn_name(Intrinsic::Frac), Some("fract"));
        assert_eq!(intrinsic_fn_name(Intrinsic::Lerp), Some("mix"));
        assert_eq!(intrinsic_fn_name(Intrinsic::Rsqrt), Some("inversesqrt"));
        assert_eq!(intrinsic_fn_name(Intrinsic::Mul), None);
        assert_eq!(
            interlocked_fn_name(Intrinsic::InterlockedAdd),
            Some("atomicAdd")
        );
    }
}
