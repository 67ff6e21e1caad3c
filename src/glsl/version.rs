use super::ast::*;
use crate::option::ShaderStage;
use crate::scx_target_error;
use crate::utils::data_type::DataType;
use crate::utils::err::*;
use crate::utils::info::Info;
use crate::utils::smap::SFold;

// Version and extension inference. The converted program is scanned for features with a version
// floor above the requested output version; each such feature either enables a compatibility
// extension or fails compilation.
struct Requirement {
    feature: &'static str,
    floor: u32,
    extension: Option<&'static str>,
}

pub fn infer(program: &mut Program, stage: ShaderStage, requested: u32) -> CompileResult<()> {
    let mut reqs = vec![];
    match stage {
        ShaderStage::Compute => {
            reqs.push(Requirement {
                feature: "compute shaders",
                floor: 430,
                extension: Some("GL_ARB_compute_shader"),
            });
        },
        ShaderStage::Geometry => {
            reqs.push(Requirement {
                feature: "geometry shaders",
                floor: 150,
                extension: Some("GL_ARB_geometry_shader4"),
            });
        },
        ShaderStage::TessControl | ShaderStage::TessEvaluation => {
            reqs.push(Requirement {
                feature: "tessellation shaders",
                floor: 400,
                extension: Some("GL_ARB_tessellation_shader"),
            });
        },
        _ => (),
    }
    let reqs = program.tops.iter().fold(reqs, collect_top);

    let mut extensions = vec![];
    for r in reqs {
        if r.floor > requested {
            match r.extension {
                Some(ext) => {
                    if !extensions.contains(&ext.to_string()) {
                        extensions.push(ext.to_string());
                    }
                },
                None => {
                    let i = Info::default();
                    return scx_target_error!(
                        i,
                        "Feature '{0}' requires version {1} but version {requested} \
                         was requested and no extension covers it",
                        r.feature, r.floor
                    );
                },
            }
        }
    }
    program.version = requested;
    program.extensions = extensions;
    Ok(())
}

fn binding_requirement() -> Requirement {
    Requirement {
        feature: "explicit binding points",
        floor: 420,
        extension: Some("GL_ARB_shading_language_420pack"),
    }
}

fn collect_top(mut reqs: Vec<Requirement>, t: &Top) -> Vec<Requirement> {
    match t {
        Top::StorageBlock {binding, ..} => {
            reqs.push(Requirement {
                feature: "shader storage blocks",
                floor: 430,
                extension: Some("GL_ARB_shader_storage_buffer_object"),
            });
            if binding.is_some() {
                reqs.push(binding_requirement());
            }
            reqs
        },
        Top::UniformImage {binding, ty, ..} => {
            reqs.push(Requirement {
                feature: "image load/store",
                floor: 420,
                extension: Some("GL_ARB_shader_image_load_store"),
            });
            if binding.is_some() {
                reqs.push(binding_requirement());
            }
            check_type(reqs, ty)
        },
        Top::UniformBlock {binding, fields, ..} => {
            reqs.push(Requirement {
                feature: "uniform blocks",
                floor: 140,
                extension: Some("GL_ARB_uniform_buffer_object"),
            });
            if binding.is_some() {
                reqs.push(binding_requirement());
            }
            fields.iter().fold(reqs, |reqs, f| check_type(reqs, &f.ty))
        },
        Top::UniformSampler {binding, ..} => {
            if binding.is_some() {
                reqs.push(binding_requirement());
            }
            reqs
        },
        Top::GlobalIn {location, ty, ..} | Top::GlobalOut {location, ty, ..} => {
            if location.is_some() {
                reqs.push(Requirement {
                    feature: "explicit interface locations",
                    floor: 330,
                    extension: Some("GL_ARB_explicit_attrib_location"),
                });
            }
            check_type(reqs, ty)
        },
        Top::InterfaceBlock {fields, ..} => {
            reqs.push(Requirement {
                feature: "interface blocks",
                floor: 150,
                extension: None,
            });
            fields.iter().fold(reqs, |reqs, f| check_type(reqs, &f.ty))
        },
        Top::StructDef {fields, ..} => {
            fields.iter().fold(reqs, |reqs, f| check_type(reqs, &f.ty))
        },
        Top::UniformVar {ty, ..} => check_type(reqs, ty),
        Top::GlobalVar {ty, ..} => check_type(reqs, ty),
        Top::FunDef {ret, params, body, ..} => {
            let reqs = check_type(reqs, ret);
            let reqs = params.iter().fold(reqs, |reqs, p| check_type(reqs, &p.ty));
            body.iter().fold(reqs, collect_stmt)
        },
    }
}

fn collect_stmt(reqs: Vec<Requirement>, s: &Stmt) -> Vec<Requirement> {
    let reqs = match s {
        Stmt::Decl {ty, ..} => check_type(reqs, ty),
        _ => reqs,
    };
    SFold::<Stmt>::sfold(s, reqs, collect_stmt)
}

fn check_type(mut reqs: Vec<Requirement>, ty: &Type) -> Vec<Requirement> {
    let is_double = match ty {
        Type::Data(dt) => dt.base() == DataType::Double,
        Type::Array {elem, ..} => matches!(
            elem.as_ref(), Type::Data(dt) if dt.base() == DataType::Double
        ),
        _ => false,
    };
    if is_double {
        reqs.push(Requirement {
            feature: "double precision",
            floor: 400,
            extension: Some("GL_ARB_gpu_shader_fp64"),
        });
    }
    reqs
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::name::Name;

    fn empty_program() -> Program {
        Program {
            version: 330,
            extensions: vec![],
            layout_decls: vec![],
            helpers: vec![],
            tops: vec![],
            layouts: StageLayouts::default(),
            header: "vertex shader".to_string(),
            line_markers: false,
        }
    }

    #[test]
    fn plain_program_needs_no_extensions() {
        let mut p = empty_program();
        infer(&mut p, ShaderStage::Vertex, 330).unwrap();
        assert!(p.extensions.is_empty());
        assert_eq!(p.version, 330);
    }

    #[test]
    fn compute_below_430_enables_extension() {
        let mut p = empty_program();
        infer(&mut p, ShaderStage::Compute, 420).unwrap();
        assert_eq!(p.extensions, vec!["GL_ARB_compute_shader".to_string()]);
    }

    #[test]
    fn compute_at_430_is_native() {
        let mut p = empty_program();
        infer(&mut p, ShaderStage::Compute, 430).unwrap();
        assert!(p.extensions.is_empty());
    }

    #[test]
    fn interface_blocks_below_150_are_rejected() {
        let mut p = empty_program();
        p.tops.push(Top::InterfaceBlock {
            dir: BlockDir::In,
            name: Name::new("_IVsOut".to_string()),
            alias: Name::new("inp".to_string()),
            fields: vec![],
            i: Info::default(),
        });
        let r = infer(&mut p, ShaderStage::Fragment, 140);
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Target);
    }

    #[test]
    fn bindings_below_420_enable_pack_extension() {
        let mut p = empty_program();
        p.tops.push(Top::UniformSampler {
            binding: Some(0),
            ty: Type::Sampler {
                kind: BufferType::Texture2D,
                base: DataType::Float,
                shadow: false,
            },
            id: Name::new("t".to_string()),
            i: Info::default(),
        });
        infer(&mut p, ShaderStage::Fragment, 330).unwrap();
        assert_eq!(
            p.extensions,
            vec!["GL_ARB_shading_language_420pack".to_string()]
        );
    }

    #[test]
    fn doubles_below_400_enable_fp64() {
        let mut p = empty_program();
        p.tops.push(Top::GlobalVar {
            is_const: true,
            ty: Type::Data(DataType::Double2),
            id: Name::new("k".to_string()),
            init: None,
            i: Info::default(),
        });
        infer(&mut p, ShaderStage::Vertex, 330).unwrap();
        assert_eq!(p.extensions, vec!["GL_ARB_gpu_shader_fp64".to_string()]);
    }
}
