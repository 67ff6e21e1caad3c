mod glsl;
mod hlsl;
mod option;
mod utils;

pub use crate::option::{
    Binding, CompileOptions, CompileOutput, InputDialect, ShaderStage, Statistics,
};
pub use crate::utils::err::{CompileError, CompileResult, ErrorKind, Warning};

use crate::utils::debug;
use crate::utils::pprint::{PrettyPrint, PrettyPrintEnv};

// Compiles one preprocessed source buffer to target-language text. Each call owns its token
// stream, ASTs and symbol state; the passes run to completion in order and the first error
// unwinds the pipeline.
pub fn compile(
    source: &str,
    filename: &str,
    opts: &CompileOptions
) -> CompileResult<CompileOutput> {
    let debug_env = debug::init(opts.debug_print);

    let tokens = hlsl::lexer::tokenize(source, filename)?;
    let ast = hlsl::parser::parse_dialect(tokens, opts.dialect)?;
    debug_env.print_debug("Parsed AST", &ast);

    let ast = hlsl::symbolize::symbolize(ast)?;
    let ast = hlsl::type_check::type_check(ast)?;
    debug_env.print_debug("Typed AST", &ast);

    let prog = hlsl::reachable::analyze(
        ast, &opts.entry, opts.secondary_entry.as_deref()
    )?;
    debug_env.print_debug("Analyzed program", &prog);

    let (mut program, stats, warnings) = glsl::from_hlsl::convert(prog, opts)?;
    glsl::version::infer(&mut program, opts.stage, opts.version)?;
    debug_env.print("Converted program", &program);

    let env = PrettyPrintEnv::with_indent_size(opts.indent);
    let (_, code) = program.pprint(env);
    Ok(CompileOutput {code, stats, warnings})
}

#[cfg(test)]
mod test {
    use super::*;
    use regex::Regex;

    fn compile_stage(src: &str, stage: ShaderStage, version: u32) -> CompileOutput {
        let opts = CompileOptions {stage, version, ..CompileOptions::default()};
        match compile(src, "test.hlsl", &opts) {
            Ok(out) => out,
            Err(e) => panic!("compilation failed: {e}"),
        }
    }

    fn assert_error_matches(r: CompileResult<CompileOutput>, pat: &str) {
        let err_msg = format!("{0}", r.unwrap_err());
        let re = Regex::new(pat).unwrap();
        assert!(
            re.is_match(&err_msg),
            "Error message \"{0}\" did not match expected pattern \"{1}\"",
            err_msg, pat
        );
    }

    #[test]
    fn vertex_passthrough() {
        let out = compile_stage(
            "float4 main(float4 p : POSITION) : SV_POSITION { return p; }",
            ShaderStage::Vertex,
            330,
        );
        assert!(out.code.contains("#version 330"));
        assert!(out.code.contains("in vec4 v_POSITION0;"));
        assert!(out.code.contains("void main()"));
        assert!(out.code.contains("gl_Position = v_POSITION0;"));
    }

    #[test]
    fn fragment_texture_sample_folds_sampler() {
        let out = compile_stage(
            "Texture2D t;\nSamplerState s;\n\
             float4 main(float2 uv : TEXCOORD) : SV_Target {\n\
                 return t.Sample(s, uv);\n\
             }",
            ShaderStage::Fragment,
            330,
        );
        assert!(out.code.contains("uniform sampler2D t;"));
        assert!(out.code.contains("texture(t, v_TEXCOORD0)"));
        assert!(!out.code.contains("SamplerState"));
    }

    #[test]
    fn compute_numthreads_and_dispatch_id() {
        let out = compile_stage(
            "RWStructuredBuffer<float> data : register(u0);\n\
             [numthreads(8, 8, 1)]\n\
             void main(uint3 id : SV_DispatchThreadID) {\n\
                 data[id.x] = 1.0f;\n\
             }",
            ShaderStage::Compute,
            430,
        );
        assert!(out.code.contains(
            "layout(local_size_x=8, local_size_y=8, local_size_z=1) in;"
        ));
        assert!(out.code.contains("uvec3 id = gl_GlobalInvocationID;"));
    }

    #[test]
    fn mul_becomes_parenthesized_operator() {
        let out = compile_stage(
            "float4x4 M;\nfloat4 v;\n\
             float4 main(float4 p : POSITION) : SV_POSITION {\n\
                 float4 r = mul(M, v);\n\
                 return r + p;\n\
             }",
            ShaderStage::Vertex,
            330,
        );
        assert!(out.code.contains("vec4 r = (M * v);"));
        assert!(out.code.contains("uniform mat4 M;"));
    }

    #[test]
    fn interlocked_add_with_original_value() {
        let out = compile_stage(
            "RWStructuredBuffer<uint> counter : register(u0);\n\
             [numthreads(64, 1, 1)]\n\
             void main(uint3 id : SV_DispatchThreadID) {\n\
                 uint prev = 0u;\n\
                 InterlockedAdd(counter[0], 1, prev);\n\
             }",
            ShaderStage::Compute,
            430,
        );
        assert!(out.code.contains("prev = atomicAdd(counter[0], 1);"));
    }

    #[test]
    fn unreachable_function_is_omitted() {
        let out = compile_stage(
            "float unused(float x) { return rsqrt(x); }\n\
             float4 main(float4 p : POSITION) : SV_POSITION { return p; }",
            ShaderStage::Vertex,
            330,
        );
        assert!(!out.code.contains("unused"));
        assert!(!out.code.contains("inversesqrt"));
    }

    #[test]
    fn cbuffer_register_becomes_binding() {
        let out = compile_stage(
            "cbuffer Camera : register(b2) { float4x4 viewProj; };\n\
             float4 main(float4 p : POSITION) : SV_POSITION {\n\
                 return mul(viewProj, p);\n\
             }",
            ShaderStage::Vertex,
            420,
        );
        assert!(out.code.contains("layout(std140, binding=2) uniform Camera {"));
        assert!(out.code.contains("mat4 viewProj;"));
        assert_eq!(out.stats.uniform_bindings.len(), 1);
        assert_eq!(out.stats.uniform_bindings[0].slot, 2);
    }

    #[test]
    fn binding_below_420_enables_pack_extension() {
        let out = compile_stage(
            "cbuffer Camera : register(b0) { float4x4 viewProj; };\n\
             float4 main(float4 p : POSITION) : SV_POSITION {\n\
                 return mul(viewProj, p);\n\
             }",
            ShaderStage::Vertex,
            330,
        );
        assert!(out.code.contains(
            "#extension GL_ARB_shading_language_420pack : enable"
        ));
    }

    #[test]
    fn clip_emits_helper_overloads() {
        let out = compile_stage(
            "float4 main(float4 c : COLOR) : SV_Target {\n\
                 clip(c.a - 0.5f);\n\
                 return c;\n\
             }",
            ShaderStage::Fragment,
            330,
        );
        assert!(out.code.contains("void clip(float x)"));
        assert!(out.code.contains("clip(c.a - 0.5f);") || out.code.contains("clip("));
    }

    #[test]
    fn fragment_target_gets_explicit_location() {
        let out = compile_stage(
            "float4 main(float2 uv : TEXCOORD) : SV_Target2 { return (float4)0; }",
            ShaderStage::Fragment,
            330,
        );
        assert!(out.code.contains("layout(location=2) out vec4"));
    }

    #[test]
    fn struct_input_flattens_for_vertex_stage() {
        let out = compile_stage(
            "struct VsIn {\n\
                 float4 pos : POSITION;\n\
                 float2 uv : TEXCOORD0;\n\
             };\n\
             float4 main(VsIn input) : SV_POSITION {\n\
                 return input.pos;\n\
             }",
            ShaderStage::Vertex,
            330,
        );
        assert!(out.code.contains("in vec4 v_POSITION0;"));
        assert!(out.code.contains("in vec2 v_TEXCOORD0;"));
        assert!(out.code.contains("gl_Position = v_POSITION0;"));
    }

    #[test]
    fn struct_output_fans_out_members() {
        let out = compile_stage(
            "struct VsOut {\n\
                 float4 pos : SV_Position;\n\
                 float2 uv : TEXCOORD0;\n\
             };\n\
             VsOut main(float4 p : POSITION, float2 t : TEXCOORD) {\n\
                 VsOut o;\n\
                 o.pos = p;\n\
                 o.uv = t;\n\
                 return o;\n\
             }",
            ShaderStage::Vertex,
            330,
        );
        assert!(out.code.contains("gl_Position = o.pos;"));
        assert!(out.code.contains(".uv = o.uv;") || out.code.contains("uv = o.uv;"));
    }

    #[test]
    fn struct_inheritance_flattens_in_order() {
        let out = compile_stage(
            "struct Base { float3 n; };\n\
             struct Derived : Base { float2 uv; };\n\
             uniform float3 lightDir;\n\
             float score(Derived d) { return dot(d.n, lightDir) + d.uv.x; }\n\
             float4 main(float4 p : POSITION) : SV_POSITION {\n\
                 Derived d;\n\
                 d.n = p.xyz;\n\
                 d.uv = p.xy;\n\
                 return p * score(d);\n\
             }",
            ShaderStage::Vertex,
            330,
        );
        let re = Regex::new(
            r"struct Derived \{\n    vec3 n;\n    vec2 uv;\n\};"
        ).unwrap();
        assert!(re.is_match(&out.code), "struct not flattened:\n{0}", out.code);
    }

    #[test]
    fn texture_with_wrong_register_prefix_is_target_error() {
        let opts = CompileOptions {
            stage: ShaderStage::Fragment,
            ..CompileOptions::default()
        };
        let r = compile(
            "Texture2D t : register(b0);\nSamplerState s;\n\
             float4 main(float2 uv : TEXCOORD) : SV_Target { return t.Sample(s, uv); }",
            "test.hlsl",
            &opts,
        );
        assert_error_matches(r, "Target error: Invalid register prefix 'b'");
    }

    #[test]
    fn system_value_in_wrong_stage_is_semantic_error() {
        let opts = CompileOptions {
            stage: ShaderStage::Vertex,
            ..CompileOptions::default()
        };
        let r = compile(
            "float4 main(uint3 id : SV_DispatchThreadID) : SV_POSITION {\n\
                 return (float4)0;\n\
             }",
            "test.hlsl",
            &opts,
        );
        assert_error_matches(r, "Semantic error: System value SV_DispatchThreadID0");
    }

    #[test]
    fn missing_entry_point_reports_semantic_error() {
        let r = compile(
            "float4 notMain(float4 p : POSITION) : SV_POSITION { return p; }",
            "test.hlsl",
            &CompileOptions::default(),
        );
        assert_error_matches(r, "Semantic error: Entry point 'main' was not found");
    }

    #[test]
    fn sample_cmp_lowers_to_shadow_sampler() {
        let out = compile_stage(
            "Texture2D shadowMap : register(t0);\n\
             SamplerComparisonState cmpSampler : register(s0);\n\
             float main(float2 uv : TEXCOORD) : SV_Target {\n\
                 return shadowMap.SampleCmp(cmpSampler, uv, 0.5f);\n\
             }",
            ShaderStage::Fragment,
            330,
        );
        assert!(out.code.contains("uniform sampler2DShadow shadowMap;"));
        assert!(out.code.contains("texture(shadowMap, vec3(v_TEXCOORD0, 0.5f))"));
        assert!(!out.code.contains("SamplerComparisonState"));
    }

    #[test]
    fn sample_with_offset_lowers_to_texture_offset() {
        let out = compile_stage(
            "Texture2D t;\nSamplerState s;\n\
             float4 main(float2 uv : TEXCOORD) : SV_Target {\n\
                 return t.Sample(s, uv, int2(1, 2));\n\
             }",
            ShaderStage::Fragment,
            330,
        );
        assert!(out.code.contains("textureOffset(t, v_TEXCOORD0, ivec2(1, 2))"));
    }

    #[test]
    fn sample_level_with_offset_lowers_to_lod_offset() {
        let out = compile_stage(
            "Texture2D t;\nSamplerState s;\n\
             float4 main(float2 uv : TEXCOORD) : SV_Target {\n\
                 return t.SampleLevel(s, uv, 2.0f, int2(-1, 1));\n\
             }",
            ShaderStage::Fragment,
            330,
        );
        assert!(out.code.contains(
            "textureLodOffset(t, v_TEXCOORD0, 2.0f, ivec2(-1, 1))"
        ));
    }

    #[test]
    fn helper_sampler_parameters_fold_away() {
        let out = compile_stage(
            "Texture2D tex;\nSamplerState smp;\n\
             float4 fetch(Texture2D t, SamplerState s, float2 uv) {\n\
                 return t.Sample(s, uv);\n\
             }\n\
             float4 main(float2 uv : TEXCOORD) : SV_Target {\n\
                 return fetch(tex, smp, uv);\n\
             }",
            ShaderStage::Fragment,
            330,
        );
        assert!(out.code.contains("vec4 fetch(sampler2D t, vec2 uv)"));
        assert!(out.code.contains("fetch(tex, v_TEXCOORD0)"));
    }

    #[test]
    fn saturate_becomes_clamp() {
        let out = compile_stage(
            "float4 main(float4 c : COLOR) : SV_Target { return saturate(c); }",
            ShaderStage::Fragment,
            330,
        );
        assert!(out.code.contains("clamp(v_COLOR0, 0.0, 1.0)"));
    }

    #[test]
    fn intrinsic_renames_apply() {
        let out = compile_stage(
            "float4 main(float4 c : COLOR) : SV_Target {\n\
                 float3 a = frac(c.xyz);\n\
                 float3 b = lerp(a, c.xyz, 0.5f);\n\
                 return float4(normalize(b), rsqrt(c.w));\n\
             }",
            ShaderStage::Fragment,
            330,
        );
        assert!(out.code.contains("fract("));
        assert!(out.code.contains("mix("));
        assert!(out.code.contains("inversesqrt("));
    }

    #[test]
    fn half_literals_and_types_become_float() {
        let out = compile_stage(
            "half4 main(half4 c : COLOR) : SV_Target { return c * 2.0h; }",
            ShaderStage::Fragment,
            330,
        );
        assert!(out.code.contains("in vec4 v_COLOR0;"));
        assert!(out.code.contains("2.0"));
        assert!(!out.code.contains("2.0h"));
    }

    #[test]
    fn statistics_track_texture_bindings() {
        let out = compile_stage(
            "Texture2D albedo : register(t3);\nSamplerState s;\n\
             float4 main(float2 uv : TEXCOORD) : SV_Target {\n\
                 return albedo.Sample(s, uv);\n\
             }",
            ShaderStage::Fragment,
            420,
        );
        assert_eq!(out.stats.texture_bindings.len(), 1);
        assert_eq!(out.stats.texture_bindings[0].slot, 3);
        assert!(out.code.contains("layout(binding=3) uniform sampler2D albedo;"));
    }

    #[test]
    fn line_markers_precede_top_level_declarations() {
        let opts = CompileOptions {
            stage: ShaderStage::Vertex,
            line_markers: true,
            ..CompileOptions::default()
        };
        let out = compile(
            "float4 main(float4 p : POSITION) : SV_POSITION { return p; }",
            "test.hlsl",
            &opts,
        ).unwrap();
        assert!(out.code.contains("#line 1"));
    }

    #[test]
    fn emission_is_deterministic() {
        let src = "Texture2D t;\nSamplerState s;\n\
                   float4 main(float2 uv : TEXCOORD) : SV_Target {\n\
                       return t.Sample(s, uv) * 0.5f;\n\
                   }";
        let a = compile_stage(src, ShaderStage::Fragment, 330);
        let b = compile_stage(src, ShaderStage::Fragment, 330);
        assert_eq!(a.code, b.code);
    }

    #[test]
    fn output_uses_unix_line_endings() {
        let out = compile_stage(
            "float4 main(float4 p : POSITION) : SV_POSITION { return p; }",
            ShaderStage::Vertex,
            330,
        );
        assert!(!out.code.contains('\r'));
        assert!(out.code.ends_with('\n'));
    }
}
