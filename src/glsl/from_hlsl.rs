use super::ast::*;
use super::keywords::*;
use crate::hlsl::ast as src;
use crate::hlsl::ast::{IndexedSemantic, Intrinsic, Semantic};
use crate::hlsl::reachable::Program as SrcProgram;
use crate::option::{Binding, CompileOptions, ShaderStage, Statistics};
use crate::scx_internal_error;
use crate::scx_semantic_error;
use crate::scx_target_error;
use crate::utils::ast::ExprType;
use crate::utils::data_type as dtu;
use crate::utils::err::*;
use crate::utils::info::Info;
use crate::utils::name::Name;
use crate::utils::smap::SFold;

use std::collections::{BTreeMap, BTreeSet};

// The semantic converter: rewrites the analyzed source program into the target-language AST.
// Entry-point parameters and returns become stage interface variables or built-ins, intrinsics
// are lowered to their target forms, registers become layout bindings, attributes become layout
// declarations, and struct inheritance is flattened away.
pub fn convert(
    prog: SrcProgram,
    opts: &CompileOptions
) -> CompileResult<(Program, Statistics, Vec<Warning>)> {
    let mut cx = Conv::new(opts);
    cx.collect_structs(&prog.tops);
    cx.shadow_receivers = collect_shadow_receivers(&prog.tops);

    let helpers = if prog.used_intrinsics.contains_key(&Intrinsic::Clip) {
        vec![Helper::Clip]
    } else {
        vec![]
    };

    let mut rest = vec![];
    let mut entry = None;
    for t in prog.tops {
        match &t {
            src::Top::FunDef {id, body: Some(_), ..} if *id == prog.entry => {
                entry = Some(t);
            },
            _ => rest.push(t),
        }
    }
    let entry = match entry {
        Some(t) => t,
        None => {
            let i = Info::default();
            return scx_internal_error!(i, "Entry point disappeared during analysis");
        },
    };

    let mut blocks = vec![];
    let mut uniforms = vec![];
    let mut structs = vec![];
    let mut globals = vec![];
    let mut funs = vec![];
    for t in rest {
        match t {
            src::Top::StructDef {id, fields: _, base: _, i} => {
                structs.push(cx.conv_struct(&id, i)?);
            },
            src::Top::ConstantBuffer {kind: _, id, register, fields, i} => {
                blocks.push(cx.conv_cbuffer(id, register, fields, i)?);
            },
            src::Top::BufferDecl {kind, elem, id, dims: _, register, i} => {
                let top = cx.conv_buffer(kind, elem, id, register, i)?;
                match &top {
                    Top::StorageBlock {..} => blocks.push(top),
                    _ => uniforms.push(top),
                }
            },
            src::Top::SamplerDecl {register, state, ..} => {
                // Samplers fold into the textures they sample; the register class and any
                // effect-style state values are still validated here.
                if let Some(reg) = register {
                    if reg.ty != src::RegisterType::Sampler {
                        let c = reg.ty.to_char();
                        return scx_target_error!(
                            reg.i, "Invalid register prefix '{c}' for a sampler"
                        );
                    }
                }
                crate::hlsl::sampler_state::validate(&state)?;
            },
            src::Top::AliasDef {..} => (),
            src::Top::GlobalVar {spec, vars, i} => {
                cx.conv_global_var(spec, vars, i, &mut uniforms, &mut globals)?;
            },
            src::Top::FunDef {attrs: _, ret, id, params, ret_semantic: _, body, i} => {
                if let Some(body) = body {
                    funs.push(cx.conv_fun(ret, id, params, body, i)?);
                }
            },
        }
    }

    let entry_fun = match entry {
        src::Top::FunDef {attrs, ret, id: _, params, ret_semantic, body, i} => {
            cx.conv_entry(attrs, ret, params, ret_semantic, body.unwrap(), i)?
        },
        _ => unreachable!(),
    };
    funs.push(entry_fun);

    let mut tops = vec![];
    tops.append(&mut blocks);
    tops.append(&mut uniforms);
    tops.append(&mut structs);
    tops.append(&mut cx.io_tops);
    tops.append(&mut globals);
    tops.append(&mut funs);

    let program = Program {
        version: opts.version,
        extensions: vec![],
        layout_decls: cx.layout_decls,
        helpers,
        tops,
        layouts: cx.layouts,
        header: format!("{0} shader", opts.stage),
        line_markers: opts.line_markers,
    };
    Ok((program, cx.stats, cx.warnings))
}

type FieldInfo = (String, src::Type, Option<IndexedSemantic>);

struct Conv<'a> {
    opts: &'a CompileOptions,
    narrow_double: bool,
    // Struct fields with the inheritance chain flattened, base members first.
    structs: BTreeMap<Name, Vec<FieldInfo>>,
    substs: BTreeMap<Name, IfcRef>,
    member_substs: BTreeMap<(Name, String), IfcRef>,
    struct_params: BTreeSet<Name>,
    // Textures sampled with a comparison sampler anywhere in the program; these are declared as
    // shadow samplers.
    shadow_receivers: BTreeSet<Name>,
    ret_targets: Vec<IfcRef>,
    ret_struct: Option<Name>,
    epilogue: Vec<Stmt>,
    in_entry: bool,
    stats: Statistics,
    warnings: Vec<Warning>,
    layouts: StageLayouts,
    layout_decls: Vec<LayoutDecl>,
    io_tops: Vec<Top>,
}

#[derive(Clone, Debug)]
enum IfcRef {
    Global {id: Name, ty: Type},
    Builtin {name: &'static str, ty: DataType},
    BlockMember {alias: Name, field: String, ty: Type},
}

impl IfcRef {
    fn to_expr(&self, i: &Info) -> Expr {
        match self {
            IfcRef::Global {id, ty} => {
                Expr::Var {id: id.clone(), ty: ty.clone(), i: i.clone()}
            },
            IfcRef::Builtin {name, ty} => Expr::Var {
                id: Name::new(name.to_string()),
                ty: Type::Data(*ty),
                i: i.clone(),
            },
            IfcRef::BlockMember {alias, field, ty} => Expr::Member {
                target: Box::new(Expr::Var {
                    id: alias.clone(),
                    ty: Type::Struct {id: alias.clone()},
                    i: i.clone(),
                }),
                member: field.clone(),
                ty: ty.clone(),
                i: i.clone(),
            },
        }
    }

    fn ty(&self) -> Type {
        match self {
            IfcRef::Global {ty, ..} => ty.clone(),
            IfcRef::Builtin {ty, ..} => Type::Data(*ty),
            IfcRef::BlockMember {ty, ..} => ty.clone(),
        }
    }
}

impl<'a> Conv<'a> {
    fn new(opts: &'a CompileOptions) -> Conv<'a> {
        Conv {
            opts,
            narrow_double: opts.version < 400,
            structs: BTreeMap::new(),
            substs: BTreeMap::new(),
            member_substs: BTreeMap::new(),
            struct_params: BTreeSet::new(),
            shadow_receivers: BTreeSet::new(),
            ret_targets: vec![],
            ret_struct: None,
            epilogue: vec![],
            in_entry: false,
            stats: Statistics::default(),
            warnings: vec![],
            layouts: StageLayouts::default(),
            layout_decls: vec![],
            io_tops: vec![],
        }
    }

    fn warn(&mut self, msg: String) {
        self.warnings.push(Warning {msg});
    }

    fn collect_structs(&mut self, tops: &[src::Top]) {
        for t in tops {
            if let src::Top::StructDef {id, base, fields, ..} = t {
                let mut all = match base.as_ref().and_then(|b| self.structs.get(b)) {
                    Some(base_fields) => base_fields.clone(),
                    None => vec![],
                };
                for f in fields {
                    all.push((f.id.clone(), f.ty.clone(), f.semantic.clone()));
                }
                self.structs.insert(id.clone(), all);
            }
        }
    }

    ///////////////////////////
    // TYPES                 //
    ///////////////////////////

    fn conv_dt(&mut self, t: DataType) -> DataType {
        let t = if t.base() == DataType::Half {
            half_to_float(t)
        } else {
            t
        };
        if self.narrow_double && t.base() == DataType::Double {
            dtu::double_to_float(t)
        } else {
            t
        }
    }

    fn conv_type(&mut self, ty: &src::Type, i: &Info) -> CompileResult<Type> {
        match ty {
            src::Type::Void => Ok(Type::Void),
            src::Type::Data(dt) => Ok(Type::Data(self.conv_dt(*dt))),
            src::Type::Struct {id} => Ok(Type::Struct {id: id.clone()}),
            src::Type::Array {elem, dims} => {
                let elem = self.conv_type(elem, i)?;
                Ok(Type::Array {elem: Box::new(elem), dims: dims.clone()})
            },
            src::Type::Buffer {kind, elem} => {
                let base = elem_base(elem);
                if kind.is_rw_texture() {
                    Ok(Type::Image {kind: *kind, base})
                } else if kind.is_texture() || *kind == src::BufferType::Buffer {
                    Ok(Type::Sampler {kind: *kind, base, shadow: false})
                } else if kind.is_storage() {
                    // A storage buffer reads as the runtime array inside its block, which is
                    // declared under the buffer variable's own name.
                    let elem = match kind {
                        src::BufferType::ByteAddressBuffer |
                        src::BufferType::RWByteAddressBuffer => {
                            Type::Data(DataType::UInt)
                        },
                        _ => self.conv_type(elem, i)?,
                    };
                    Ok(Type::Array {elem: Box::new(elem), dims: vec![0]})
                } else {
                    scx_target_error!(
                        i, "Buffer type {kind} cannot be used in this position"
                    )
                }
            },
            src::Type::Sampler {..} => {
                scx_target_error!(
                    i, "Separate sampler state objects fold into combined samplers and \
                        cannot appear as a value type"
                )
            },
            src::Type::Unknown => {
                scx_internal_error!(i, "Untyped expression reached the converter")
            },
        }
    }

    ///////////////////////////
    // TOP-LEVEL DECLS       //
    ///////////////////////////

    fn conv_struct(&mut self, id: &Name, i: Info) -> CompileResult<Top> {
        let all = self.structs.get(id).cloned().unwrap_or_default();
        let fields = all.into_iter()
            .map(|(fid, ty, _)| {
                let ty = self.conv_type(&ty, &i)?;
                Ok(Field {ty, id: Name::new(fid), i: i.clone()})
            })
            .collect::<CompileResult<Vec<Field>>>()?;
        Ok(Top::StructDef {id: id.clone(), fields, i})
    }

    fn conv_cbuffer(
        &mut self,
        id: Name,
        register: Option<src::Register>,
        fields: Vec<src::CBufferField>,
        i: Info
    ) -> CompileResult<Top> {
        let binding = match &register {
            Some(reg) if reg.ty == src::RegisterType::ConstantBuffer => Some(reg.slot),
            Some(reg) => {
                let c = reg.ty.to_char();
                return scx_target_error!(
                    reg.i, "Invalid register prefix '{c}' for a uniform buffer"
                );
            },
            None => None,
        };
        if let Some(slot) = binding {
            self.stats.uniform_bindings.push(Binding {
                name: id.get_str().clone(),
                slot,
            });
        }
        let fields = fields.into_iter()
            .map(|f| {
                let base = self.conv_type(&f.ty, &f.i)?;
                let ty = wrap_array(base, &f.dims);
                Ok(Field {ty, id: f.id, i: f.i})
            })
            .collect::<CompileResult<Vec<Field>>>()?;
        Ok(Top::UniformBlock {binding, id, fields, i})
    }

    fn conv_buffer(
        &mut self,
        kind: src::BufferType,
        elem: src::Type,
        id: Name,
        register: Option<src::Register>,
        i: Info
    ) -> CompileResult<Top> {
        use src::BufferType as BT;
        use src::RegisterType as RT;
        let check_register = |expected: RT| -> CompileResult<Option<usize>> {
            match &register {
                Some(reg) if reg.ty == expected => Ok(Some(reg.slot)),
                Some(reg) => {
                    let c = reg.ty.to_char();
                    scx_target_error!(
                        reg.i, "Invalid register prefix '{c}' for {kind}"
                    )
                },
                None => Ok(None),
            }
        };
        if kind.is_rw_texture() {
            let binding = check_register(RT::UnorderedAccess)?;
            if let Some(slot) = binding {
                self.stats.texture_bindings.push(Binding {
                    name: id.get_str().clone(),
                    slot,
                });
            }
            let ty = Type::Image {kind, base: elem_base(&elem)};
            Ok(Top::UniformImage {binding, ty, id, i})
        } else if kind.is_texture() || kind == BT::Buffer {
            let binding = check_register(RT::TextureBuffer)?;
            if let Some(slot) = binding {
                self.stats.texture_bindings.push(Binding {
                    name: id.get_str().clone(),
                    slot,
                });
            }
            let shadow = self.shadow_receivers.contains(&id);
            let ty = Type::Sampler {kind, base: elem_base(&elem), shadow};
            Ok(Top::UniformSampler {binding, ty, id, i})
        } else if kind.is_storage() {
            let readonly = !kind.is_rw();
            let binding = if readonly {
                check_register(RT::TextureBuffer)?
            } else {
                check_register(RT::UnorderedAccess)?
            };
            if let Some(slot) = binding {
                self.stats.uniform_bindings.push(Binding {
                    name: id.get_str().clone(),
                    slot,
                });
            }
            let elem_ty = match kind {
                BT::ByteAddressBuffer | BT::RWByteAddressBuffer => {
                    Type::Data(DataType::UInt)
                },
                _ => self.conv_type(&elem, &i)?,
            };
            let block_id = Name::new(format!("_B{0}", id.get_str()));
            Ok(Top::StorageBlock {binding, readonly, id: block_id, elem_ty, field_id: id, i})
        } else {
            scx_target_error!(i, "Buffer type {kind} cannot be mapped to the target")
        }
    }

    fn conv_global_var(
        &mut self,
        spec: src::TypeSpec,
        vars: Vec<src::VarInit>,
        i: Info,
        uniforms: &mut Vec<Top>,
        globals: &mut Vec<Top>
    ) -> CompileResult<()> {
        let is_static = spec.storage.contains(&src::StorageClass::Static);
        let is_const = spec.is_const();
        for v in vars {
            let base = self.conv_type(&spec.ty, &v.i)?;
            let ty = wrap_array(base, &v.dims);
            if is_static || is_const {
                let init = match v.init {
                    Some(e) => Some(self.conv_init(e, &ty)?),
                    None => None,
                };
                globals.push(Top::GlobalVar {is_const, ty, id: v.id, init, i: i.clone()});
            } else {
                // Globals without a storage class are uniforms in the source language.
                uniforms.push(Top::UniformVar {ty, id: v.id, i: i.clone()});
            }
        }
        Ok(())
    }

    fn conv_fun(
        &mut self,
        ret: src::TypeSpec,
        id: Name,
        params: Vec<src::Param>,
        body: Vec<src::Stmt>,
        i: Info
    ) -> CompileResult<Top> {
        let ret_ty = self.conv_type(&ret.ty, &ret.i)?;
        // Separate sampler-state parameters vanish with the combined-sampler rewrite; call
        // sites drop the matching arguments.
        let params = params.into_iter()
            .filter(|p| !matches!(p.spec.ty, src::Type::Sampler {..}))
            .map(|p| {
                let qual = match p.dir {
                    src::ParamDir::In => ParamQual::In,
                    src::ParamDir::Out => ParamQual::Out,
                    src::ParamDir::InOut => ParamQual::InOut,
                };
                let base = self.conv_type(&p.spec.ty, &p.i)?;
                // A texture parameter that is comparison-sampled inside the body must itself be
                // a shadow sampler.
                let base = match base {
                    Type::Sampler {kind, base, ..}
                        if self.shadow_receivers.contains(&p.id) =>
                    {
                        Type::Sampler {kind, base, shadow: true}
                    },
                    ty => ty,
                };
                let ty = wrap_array(base, &p.dims);
                Ok(Param {qual, ty, id: p.id, i: p.i})
            })
            .collect::<CompileResult<Vec<Param>>>()?;
        let body = self.conv_stmts(body)?;
        Ok(Top::FunDef {ret: ret_ty, id, params, body, i})
    }

    ///////////////////////////
    // ENTRY POINT LOWERING  //
    ///////////////////////////

    fn conv_entry(
        &mut self,
        attrs: Vec<src::Attribute>,
        ret: src::TypeSpec,
        params: Vec<src::Param>,
        ret_semantic: Option<IndexedSemantic>,
        body: Vec<src::Stmt>,
        i: Info
    ) -> CompileResult<Top> {
        self.conv_entry_attrs(&attrs, &params)?;
        let mut prologue = vec![];
        for p in &params {
            self.bind_entry_param(p, &mut prologue)?;
        }
        self.setup_ret_targets(&ret.ty, &ret_semantic, &i)?;

        self.in_entry = true;
        let mut body = self.conv_stmts(body)?;
        self.in_entry = false;

        let ends_in_return = matches!(body.last(), Some(Stmt::Return {..}));
        let mut full = prologue;
        full.append(&mut body);
        if !ends_in_return {
            let mut tail = self.epilogue.clone();
            full.append(&mut tail);
        }
        Ok(Top::FunDef {
            ret: Type::Void,
            id: Name::new("main".to_string()),
            params: vec![],
            body: full,
            i,
        })
    }

    fn block_form_allowed(&self, dir: IoDir) -> bool {
        if self.opts.version < 150 {
            return false;
        }
        match (self.opts.stage, dir) {
            (ShaderStage::Compute, _) => false,
            (ShaderStage::Vertex, IoDir::Input) => false,
            (ShaderStage::Fragment, IoDir::Output) => false,
            _ => true,
        }
    }

    // Creates the interface variable (or resolves the built-in) for one loose input/output with
    // the given semantic.
    fn make_io_target(
        &mut self,
        sem: &IndexedSemantic,
        ty: &src::Type,
        dir: IoDir,
        interp: Vec<InterpModifier>,
        i: &Info
    ) -> CompileResult<IfcRef> {
        let stage = self.opts.stage;
        if sem.is_system_value() {
            if sem.semantic == Semantic::Target && dir == IoDir::Output {
                if stage != ShaderStage::Fragment {
                    return scx_semantic_error!(
                        i, "SV_Target output is only valid in the fragment stage"
                    );
                }
                let gty = self.conv_type(ty, i)?;
                let id = Name::new(format!("{0}TARGET{1}", self.opts.prefix, sem.index));
                self.stats.interface_locations.push(Binding {
                    name: id.get_str().clone(),
                    slot: sem.index,
                });
                self.io_tops.push(Top::GlobalOut {
                    location: Some(sem.index),
                    ty: gty.clone(),
                    id: id.clone(),
                    i: i.clone(),
                });
                return Ok(IfcRef::Global {id, ty: gty});
            }
            match semantic_builtin(sem.semantic, stage, dir) {
                Some((name, dt)) => Ok(IfcRef::Builtin {name, ty: dt}),
                None => {
                    let d = match dir {
                        IoDir::Input => "input",
                        IoDir::Output => "output",
                    };
                    scx_semantic_error!(
                        i, "System value {sem} is not a valid {d} in the {stage} stage"
                    )
                },
            }
        } else {
            if stage == ShaderStage::Compute {
                return scx_semantic_error!(
                    i, "Compute shaders have no user-defined interface variables"
                );
            }
            if stage == ShaderStage::Fragment && dir == IoDir::Output {
                return scx_semantic_error!(
                    i, "Fragment outputs must use system-value semantics"
                );
            }
            let gty = self.conv_type(ty, i)?;
            let id = Name::new(format!("{0}{sem}", self.opts.prefix));
            let location = self.stats.interface_locations.len();
            self.stats.interface_locations.push(Binding {
                name: id.get_str().clone(),
                slot: location,
            });
            let top = match dir {
                IoDir::Input => Top::GlobalIn {
                    location: None,
                    interp,
                    ty: gty.clone(),
                    id: id.clone(),
                    i: i.clone(),
                },
                IoDir::Output => Top::GlobalOut {
                    location: None,
                    ty: gty.clone(),
                    id: id.clone(),
                    i: i.clone(),
                },
            };
            self.io_tops.push(top);
            Ok(IfcRef::Global {id, ty: gty})
        }
    }

    // Binds one entry-point parameter: inputs become substitutions or prologue locals, outputs
    // become locals whose values fan out to the interface in the epilogue.
    fn bind_entry_param(
        &mut self,
        p: &src::Param,
        prologue: &mut Vec<Stmt>
    ) -> CompileResult<()> {
        match p.dir {
            src::ParamDir::In | src::ParamDir::InOut => self.bind_input_param(p, prologue),
            src::ParamDir::Out => self.bind_output_param(p, prologue),
        }
    }

    fn bind_input_param(
        &mut self,
        p: &src::Param,
        prologue: &mut Vec<Stmt>
    ) -> CompileResult<()> {
        if let src::Type::Struct {id: sid} = &p.spec.ty {
            return self.bind_input_struct(p, sid.clone());
        }
        let sem = match &p.semantic {
            Some(sem) => sem.clone(),
            None => {
                return scx_semantic_error!(
                    p.i, "Entry-point parameter {0} requires a semantic", p.id
                );
            },
        };
        let interp = p.spec.interp.clone();
        let target = self.make_io_target(&sem, &p.spec.ty, IoDir::Input, interp, &p.i)?;
        match &target {
            IfcRef::Builtin {..} => {
                // System values materialize as prologue locals so the body can keep using the
                // parameter name.
                let want = self.conv_type(&p.spec.ty, &p.i)?;
                let src_expr = target.to_expr(&p.i);
                let init = if target.ty() == want {
                    src_expr
                } else {
                    Expr::Ctor {
                        to: want.clone(),
                        args: vec![src_expr],
                        ty: want.clone(),
                        i: p.i.clone(),
                    }
                };
                prologue.push(Stmt::Decl {
                    is_const: false,
                    ty: want,
                    id: p.id.clone(),
                    init: Some(init),
                    i: p.i.clone(),
                });
            },
            _ => {
                self.substs.insert(p.id.clone(), target);
            },
        }
        Ok(())
    }

    fn bind_input_struct(&mut self, p: &src::Param, sid: Name) -> CompileResult<()> {
        self.struct_params.insert(p.id.clone());
        let fields = match self.structs.get(&sid) {
            Some(f) => f.clone(),
            None => {
                return scx_internal_error!(p.i, "Unknown input struct {sid}");
            },
        };
        let use_block = self.block_form_allowed(IoDir::Input);
        let mut block_fields = vec![];
        for (fid, fty, fsem) in fields {
            let sem = match fsem {
                Some(sem) => sem,
                None => {
                    return scx_semantic_error!(
                        p.i, "Member '{fid}' of shader input {sid} requires a semantic"
                    );
                },
            };
            let target = if sem.is_system_value() || !use_block {
                self.make_io_target(&sem, &fty, IoDir::Input, vec![], &p.i)?
            } else {
                let ty = self.conv_type(&fty, &p.i)?;
                block_fields.push(Field {
                    ty: ty.clone(),
                    id: Name::new(fid.clone()),
                    i: p.i.clone(),
                });
                IfcRef::BlockMember {alias: p.id.clone(), field: fid.clone(), ty}
            };
            self.member_substs.insert((p.id.clone(), fid), target);
        }
        if !block_fields.is_empty() {
            self.io_tops.push(Top::InterfaceBlock {
                dir: BlockDir::In,
                name: Name::new(format!("_I{0}", sid.get_str())),
                alias: p.id.clone(),
                fields: block_fields,
                i: p.i.clone(),
            });
        }
        Ok(())
    }

    fn bind_output_param(
        &mut self,
        p: &src::Param,
        prologue: &mut Vec<Stmt>
    ) -> CompileResult<()> {
        let ty = self.conv_type(&p.spec.ty, &p.i)?;
        prologue.push(Stmt::Decl {
            is_const: false,
            ty: ty.clone(),
            id: p.id.clone(),
            init: None,
            i: p.i.clone(),
        });
        let local = Expr::Var {id: p.id.clone(), ty, i: p.i.clone()};
        if let src::Type::Struct {id: sid} = &p.spec.ty {
            let sid = sid.clone();
            let stores = self.struct_output_stores(&sid, &local, &p.i)?;
            self.epilogue.extend(stores);
            return Ok(());
        }
        let sem = match &p.semantic {
            Some(sem) => sem.clone(),
            None => {
                return scx_semantic_error!(
                    p.i, "Entry-point output {0} requires a semantic", p.id
                );
            },
        };
        let target = self.make_io_target(&sem, &p.spec.ty, IoDir::Output, vec![], &p.i)?;
        self.epilogue.push(assign_stmt(target.to_expr(&p.i), local, &p.i));
        Ok(())
    }

    // Assignments that fan a struct value out to the per-member interface targets.
    fn struct_output_stores(
        &mut self,
        sid: &Name,
        value: &Expr,
        i: &Info
    ) -> CompileResult<Vec<Stmt>> {
        let fields = match self.structs.get(sid) {
            Some(f) => f.clone(),
            None => {
                return scx_internal_error!(i, "Unknown output struct {sid}");
            },
        };
        let use_block = self.block_form_allowed(IoDir::Output);
        let mut block_fields = vec![];
        let block_alias = Name::new(format!("{0}output", self.opts.prefix));
        let mut stores = vec![];
        for (fid, fty, fsem) in fields {
            let sem = match fsem {
                Some(sem) => sem,
                None => {
                    return scx_semantic_error!(
                        i, "Member '{fid}' of shader output {sid} requires a semantic"
                    );
                },
            };
            let target = if sem.is_system_value() || !use_block {
                self.make_io_target(&sem, &fty, IoDir::Output, vec![], i)?
            } else {
                let ty = self.conv_type(&fty, i)?;
                block_fields.push(Field {
                    ty: ty.clone(),
                    id: Name::new(fid.clone()),
                    i: i.clone(),
                });
                IfcRef::BlockMember {alias: block_alias.clone(), field: fid.clone(), ty}
            };
            let member = Expr::Member {
                target: Box::new(value.clone()),
                member: fid,
                ty: target.ty(),
                i: i.clone(),
            };
            stores.push(assign_stmt(target.to_expr(i), member, i));
        }
        if !block_fields.is_empty() {
            self.io_tops.push(Top::InterfaceBlock {
                dir: BlockDir::Out,
                name: Name::new(format!("_I{0}", sid.get_str())),
                alias: block_alias,
                fields: block_fields,
                i: i.clone(),
            });
        }
        Ok(stores)
    }

    fn setup_ret_targets(
        &mut self,
        ret_ty: &src::Type,
        ret_semantic: &Option<IndexedSemantic>,
        i: &Info
    ) -> CompileResult<()> {
        match ret_ty {
            src::Type::Void => Ok(()),
            src::Type::Struct {id} => {
                self.ret_struct = Some(id.clone());
                Ok(())
            },
            ty => {
                let sem = match ret_semantic {
                    Some(sem) => sem.clone(),
                    None => {
                        return scx_semantic_error!(
                            i, "Entry-point return value requires a semantic"
                        );
                    },
                };
                let target = self.make_io_target(&sem, ty, IoDir::Output, vec![], i)?;
                self.ret_targets.push(target);
                Ok(())
            },
        }
    }

    // Lowers "return e;" inside the entry point into interface stores followed by a bare return.
    fn conv_entry_return(
        &mut self,
        value: Option<src::Expr>,
        i: Info
    ) -> CompileResult<Vec<Stmt>> {
        let mut out = vec![];
        match value {
            None => (),
            Some(e) => {
                let e = self.conv_expr(e)?;
                if let Some(sid) = self.ret_struct.clone() {
                    let (value, tmp_decl) = match &e {
                        Expr::Var {..} => (e, None),
                        _ => {
                            let id = Name::sym_str("output");
                            let ty = Type::Struct {id: sid.clone()};
                            let var = Expr::Var {
                                id: id.clone(), ty: ty.clone(), i: i.clone()
                            };
                            let decl = Stmt::Decl {
                                is_const: false, ty, id, init: Some(e), i: i.clone()
                            };
                            (var, Some(decl))
                        },
                    };
                    if let Some(d) = tmp_decl {
                        out.push(d);
                    }
                    let stores = self.struct_output_stores(&sid, &value, &i)?;
                    out.extend(stores);
                } else {
                    match self.ret_targets.first().cloned() {
                        Some(target) => {
                            out.push(assign_stmt(target.to_expr(&i), e, &i));
                        },
                        None => {
                            return scx_internal_error!(
                                i, "Return value without an interface target"
                            );
                        },
                    }
                }
            },
        }
        out.extend(self.epilogue.clone());
        out.push(Stmt::Return {value: None, i});
        Ok(out)
    }

    ///////////////////////////
    // ATTRIBUTES            //
    ///////////////////////////

    fn conv_entry_attrs(
        &mut self,
        attrs: &[src::Attribute],
        params: &[src::Param]
    ) -> CompileResult<()> {
        let stage = self.opts.stage;
        let mut tes_domain = None;
        let mut tes_partitioning = None;
        let mut tes_topology = None;
        for a in attrs {
            match a.id.as_str() {
                "numthreads" if stage == ShaderStage::Compute => {
                    let x = attr_int(a, 0)?;
                    let y = attr_int(a, 1)?;
                    let z = attr_int(a, 2)?;
                    self.layouts.compute = Some(ComputeLayout {local_size: (x, y, z)});
                    self.layout_decls.push(LayoutDecl::LocalSize {x, y, z});
                },
                "earlydepthstencil" if stage == ShaderStage::Fragment => {
                    self.layouts.fragment = Some(FragmentLayout {
                        early_depth_stencil: true,
                    });
                    self.layout_decls.push(LayoutDecl::EarlyFragmentTests);
                },
                "maxvertexcount" if stage == ShaderStage::Geometry => {
                    let n = attr_int(a, 0)?;
                    self.layouts.geometry = Some(GeometryLayout {max_vertex_count: n});
                    let topology = params.iter()
                        .find_map(|p| match &p.spec.ty {
                            src::Type::Buffer {kind, ..} if kind.is_stream() => {
                                Some(stream_topology(*kind))
                            },
                            _ => None,
                        })
                        .unwrap_or("triangle_strip");
                    self.layout_decls.push(LayoutDecl::GeometryIn {
                        primitive: "triangles".to_string(),
                    });
                    self.layout_decls.push(LayoutDecl::GeometryOut {
                        topology: topology.to_string(),
                        max_vertices: n,
                    });
                },
                "outputcontrolpoints" if stage == ShaderStage::TessControl => {
                    let n = attr_int(a, 0)?;
                    let layout = self.layouts.tess_control.get_or_insert(
                        TessControlLayout {
                            output_control_points: n,
                            patch_constant_fn: None,
                            max_tess_factor: None,
                        }
                    );
                    layout.output_control_points = n;
                    self.layout_decls.push(LayoutDecl::TessControlOut {vertices: n});
                },
                "patchconstantfunc" if stage == ShaderStage::TessControl => {
                    let f = attr_string(a)?;
                    let layout = self.layouts.tess_control.get_or_insert(
                        TessControlLayout {
                            output_control_points: 0,
                            patch_constant_fn: None,
                            max_tess_factor: None,
                        }
                    );
                    layout.patch_constant_fn = Some(f);
                },
                "maxtessfactor" if stage == ShaderStage::TessControl => {
                    let v = attr_float(a)?;
                    if let Some(layout) = self.layouts.tess_control.as_mut() {
                        layout.max_tess_factor = Some(v);
                    }
                },
                "domain" if stage == ShaderStage::TessEvaluation => {
                    tes_domain = Some(domain_name(&attr_string(a)?));
                },
                "partitioning" if stage == ShaderStage::TessEvaluation => {
                    tes_partitioning = Some(partitioning_name(&attr_string(a)?));
                },
                "outputtopology" if stage == ShaderStage::TessEvaluation => {
                    tes_topology = Some(topology_name(&attr_string(a)?));
                },
                "domain" | "partitioning" | "outputtopology"
                    if stage == ShaderStage::TessControl => (),
                "unroll" | "loop" | "branch" | "flatten" => (),
                other => {
                    self.warn(format!(
                        "Attribute [{other}] has no equivalent in the {stage} stage \
                         and was dropped"
                    ));
                },
            }
        }
        if stage == ShaderStage::TessEvaluation {
            let domain = tes_domain.unwrap_or_else(|| "triangles".to_string());
            let partitioning = tes_partitioning
                .unwrap_or_else(|| "equal_spacing".to_string());
            let topology = tes_topology.unwrap_or_else(|| "ccw".to_string());
            self.layouts.tess_evaluation = Some(TessEvaluationLayout {
                domain: domain.clone(),
                partitioning: partitioning.clone(),
                output_topology: topology.clone(),
            });
            self.layout_decls.push(LayoutDecl::TessEvaluationIn {
                domain, partitioning, topology,
            });
        }
        Ok(())
    }

    ///////////////////////////
    // STATEMENTS            //
    ///////////////////////////

    fn conv_stmts(&mut self, stmts: Vec<src::Stmt>) -> CompileResult<Vec<Stmt>> {
        let mut out = vec![];
        for s in stmts {
            out.extend(self.conv_stmt(s)?);
        }
        Ok(out)
    }

    fn conv_stmt(&mut self, s: src::Stmt) -> CompileResult<Vec<Stmt>> {
        match s {
            src::Stmt::Decl {spec, vars, i} => {
                let is_const = spec.is_const();
                let mut out = vec![];
                for v in vars {
                    let base = self.conv_type(&spec.ty, &v.i)?;
                    let ty = wrap_array(base, &v.dims);
                    let init = match v.init {
                        Some(e) => Some(self.conv_init(e, &ty)?),
                        None => None,
                    };
                    out.push(Stmt::Decl {is_const, ty, id: v.id, init, i: i.clone()});
                }
                Ok(out)
            },
            src::Stmt::Expr {e, i} => self.conv_expr_stmt(e, i),
            src::Stmt::Block {body, i} => {
                let body = self.conv_stmts(body)?;
                Ok(vec![Stmt::Block {body, i}])
            },
            src::Stmt::If {cond, thn, els, i} => {
                let cond = self.conv_expr(cond)?;
                let thn = self.conv_stmts(thn)?;
                let els = self.conv_stmts(els)?;
                Ok(vec![Stmt::If {cond, thn, els, i}])
            },
            src::Stmt::While {cond, body, attrs: _, i} => {
                let cond = self.conv_expr(cond)?;
                let body = self.conv_stmts(body)?;
                Ok(vec![Stmt::While {cond, body, i}])
            },
            src::Stmt::DoWhile {body, cond, i} => {
                let body = self.conv_stmts(body)?;
                let cond = self.conv_expr(cond)?;
                Ok(vec![Stmt::DoWhile {body, cond, i}])
            },
            src::Stmt::For {init, cond, incr, body, attrs: _, i} => {
                let init = self.conv_stmts(init)?;
                let cond = match cond {
                    Some(e) => Some(self.conv_expr(e)?),
                    None => None,
                };
                let incr = match incr {
                    Some(e) => Some(self.conv_expr(e)?),
                    None => None,
                };
                let body = self.conv_stmts(body)?;
                Ok(vec![Stmt::For {init, cond, incr, body, i}])
            },
            src::Stmt::Switch {cond, cases, i} => {
                let cond = self.conv_expr(cond)?;
                let cases = cases.into_iter()
                    .map(|src::SwitchCase {value, body, i}| {
                        let value = match value {
                            Some(e) => Some(self.conv_expr(e)?),
                            None => None,
                        };
                        let body = self.conv_stmts(body)?;
                        Ok(SwitchCase {value, body, i})
                    })
                    .collect::<CompileResult<Vec<SwitchCase>>>()?;
                Ok(vec![Stmt::Switch {cond, cases, i}])
            },
            src::Stmt::Return {value, i} => {
                if self.in_entry {
                    self.conv_entry_return(value, i)
                } else {
                    let value = match value {
                        Some(e) => Some(self.conv_expr(e)?),
                        None => None,
                    };
                    Ok(vec![Stmt::Return {value, i}])
                }
            },
            src::Stmt::Break {i} => Ok(vec![Stmt::Break {i}]),
            src::Stmt::Continue {i} => Ok(vec![Stmt::Continue {i}]),
            src::Stmt::Discard {i} => Ok(vec![Stmt::Discard {i}]),
            src::Stmt::Empty {..} => Ok(vec![]),
        }
    }

    // Expression statements need special handling for the intrinsics whose lowered form is a
    // statement rather than an expression.
    fn conv_expr_stmt(&mut self, e: src::Expr, i: Info) -> CompileResult<Vec<Stmt>> {
        match e {
            src::Expr::Intrinsic {func, args, ..} if func.is_interlocked() => {
                self.conv_interlocked(func, args, i)
            },
            src::Expr::Intrinsic {func: Intrinsic::TexGetDimensions, args, ..} => {
                self.conv_get_dimensions(args, i)
            },
            e => {
                let e = self.conv_expr(e)?;
                Ok(vec![Stmt::Expr {e, i}])
            },
        }
    }

    // The interlocked family becomes atomic functions; a trailing output argument becomes an
    // assignment of the atomic's return value.
    fn conv_interlocked(
        &mut self,
        func: Intrinsic,
        args: Vec<src::Expr>,
        i: Info
    ) -> CompileResult<Vec<Stmt>> {
        let fn_name = match interlocked_fn_name(func) {
            Some(n) => n,
            None => {
                return scx_internal_error!(i, "Unmapped interlocked intrinsic {func}");
            },
        };
        let (call_arg_count, original_out) = match func {
            Intrinsic::InterlockedCompareExchange => (3, args.len() > 3),
            Intrinsic::InterlockedCompareStore => (3, false),
            _ => (2, args.len() > 2),
        };
        let mut args = args.into_iter()
            .map(|a| self.conv_expr(a))
            .collect::<CompileResult<Vec<Expr>>>()?;
        let out_arg = if original_out {
            Some(args.pop().unwrap())
        } else {
            None
        };
        if args.len() != call_arg_count {
            return scx_target_error!(i, "Wrong number of arguments for {func}");
        }
        let ty = args[0].get_type().clone();
        let call = Expr::Call {
            id: Name::new(fn_name.to_string()),
            args,
            ty: ty.clone(),
            i: i.clone(),
        };
        match out_arg {
            Some(dst) => Ok(vec![Stmt::Expr {
                e: Expr::Assign {
                    lhs: Box::new(dst),
                    op: AssignOp::Set,
                    rhs: Box::new(call),
                    ty,
                    i: i.clone(),
                },
                i,
            }]),
            None => Ok(vec![Stmt::Expr {e: call, i}]),
        }
    }

    // GetDimensions(tex, w, h, ...) becomes a textureSize temporary plus one assignment per
    // output argument.
    fn conv_get_dimensions(
        &mut self,
        args: Vec<src::Expr>,
        i: Info
    ) -> CompileResult<Vec<Stmt>> {
        let mut it = args.into_iter();
        let tex = match it.next() {
            Some(t) => self.conv_expr(t)?,
            None => {
                return scx_internal_error!(i, "GetDimensions without a receiver");
            },
        };
        let outs = it.map(|a| self.conv_expr(a)).collect::<CompileResult<Vec<Expr>>>()?;
        let n = outs.len();
        let tmp_ty = match n {
            1 => Type::Data(DataType::Int),
            2 => Type::Data(DataType::Int2),
            3 => Type::Data(DataType::Int3),
            _ => {
                return scx_target_error!(
                    i, "GetDimensions with {n} output arguments cannot be mapped"
                );
            },
        };
        let tmp = Name::sym_str("size");
        let call = Expr::Call {
            id: Name::new("textureSize".to_string()),
            args: vec![tex, int_lit("0", &i)],
            ty: tmp_ty.clone(),
            i: i.clone(),
        };
        let mut stmts = vec![Stmt::Decl {
            is_const: false,
            ty: tmp_ty.clone(),
            id: tmp.clone(),
            init: Some(call),
            i: i.clone(),
        }];
        let comps = ["x", "y", "z"];
        for (idx, dst) in outs.into_iter().enumerate() {
            let dst_ty = dst.get_type().clone();
            let src_expr = if n == 1 {
                Expr::Var {id: tmp.clone(), ty: tmp_ty.clone(), i: i.clone()}
            } else {
                Expr::Member {
                    target: Box::new(Expr::Var {
                        id: tmp.clone(), ty: tmp_ty.clone(), i: i.clone()
                    }),
                    member: comps[idx].to_string(),
                    ty: Type::Data(DataType::Int),
                    i: i.clone(),
                }
            };
            let value = if dst_ty == Type::Data(DataType::Int) {
                src_expr
            } else {
                Expr::Ctor {
                    to: dst_ty.clone(),
                    args: vec![src_expr],
                    ty: dst_ty.clone(),
                    i: i.clone(),
                }
            };
            stmts.push(assign_stmt(dst, value, &i));
        }
        Ok(stmts)
    }

    ///////////////////////////
    // EXPRESSIONS           //
    ///////////////////////////

    fn conv_init(&mut self, e: src::Expr, ty: &Type) -> CompileResult<Expr> {
        match e {
            src::Expr::InitList {elems, i, ..} => {
                let args = elems.into_iter()
                    .map(|e| self.conv_expr(e))
                    .collect::<CompileResult<Vec<Expr>>>()?;
                Ok(Expr::Ctor {to: ty.clone(), args, ty: ty.clone(), i})
            },
            e => self.conv_expr(e),
        }
    }

    fn conv_expr(&mut self, e: src::Expr) -> CompileResult<Expr> {
        match e {
            src::Expr::Var {id, ty, i} => {
                if self.struct_params.contains(&id) {
                    return scx_target_error!(
                        i, "Shader interface structs may only be accessed member-wise"
                    );
                }
                match self.substs.get(&id) {
                    Some(target) => Ok(target.to_expr(&i)),
                    None => {
                        let ty = self.conv_type(&ty, &i)?;
                        Ok(Expr::Var {id, ty, i})
                    },
                }
            },
            src::Expr::Member {target, member, ty, i} => {
                if let src::Expr::Var {id, ..} = target.as_ref() {
                    let key = (id.clone(), member.clone());
                    if let Some(t) = self.member_substs.get(&key) {
                        return Ok(t.to_expr(&i));
                    }
                }
                let target = Box::new(self.conv_expr(*target)?);
                let ty = self.conv_type(&ty, &i)?;
                Ok(Expr::Member {target, member, ty, i})
            },
            src::Expr::IntLit {text, ty, i, ..} => {
                let ty = self.conv_type(&ty, &i)?;
                Ok(Expr::IntLit {text, ty, i})
            },
            src::Expr::FloatLit {text, ty, i} => {
                let dt = match ty {
                    src::Type::Data(dt) => dt,
                    _ => DataType::Float,
                };
                let text = self.conv_float_text(&text, dt);
                let ty = self.conv_type(&ty, &i)?;
                Ok(Expr::FloatLit {text, ty, i})
            },
            src::Expr::BoolLit {v, ty, i} => {
                let ty = self.conv_type(&ty, &i)?;
                Ok(Expr::BoolLit {v, ty, i})
            },
            src::Expr::StringLit {i, ..} => {
                scx_internal_error!(i, "String literal outside an attribute")
            },
            src::Expr::UnOp {op, arg, ty, i} => {
                let arg = Box::new(self.conv_expr(*arg)?);
                let ty = self.conv_type(&ty, &i)?;
                Ok(Expr::UnOp {op, arg, ty, i})
            },
            src::Expr::PostUnOp {op, arg, ty, i} => {
                let arg = Box::new(self.conv_expr(*arg)?);
                let ty = self.conv_type(&ty, &i)?;
                Ok(Expr::PostUnOp {op, arg, ty, i})
            },
            src::Expr::BinOp {lhs, op, rhs, ty, i} => {
                let vector_operands = lhs.get_type().is_vector()
                    || rhs.get_type().is_vector();
                let lhs = self.conv_expr(*lhs)?;
                let rhs = self.conv_expr(*rhs)?;
                let ty = self.conv_type(&ty, &i)?;
                if op.is_comparison() && vector_operands {
                    let fn_name = comparison_fn(op);
                    Ok(Expr::Call {
                        id: Name::new(fn_name.to_string()),
                        args: vec![lhs, rhs],
                        ty,
                        i,
                    })
                } else {
                    Ok(Expr::BinOp {
                        lhs: Box::new(lhs), op, rhs: Box::new(rhs), ty, i
                    })
                }
            },
            src::Expr::Assign {lhs, op, rhs, ty, i} => {
                let lhs = Box::new(self.conv_expr(*lhs)?);
                let rhs = Box::new(self.conv_expr(*rhs)?);
                let ty = self.conv_type(&ty, &i)?;
                Ok(Expr::Assign {lhs, op, rhs, ty, i})
            },
            src::Expr::Ternary {cond, thn, els, ty, i} => {
                let cond = Box::new(self.conv_expr(*cond)?);
                let thn = Box::new(self.conv_expr(*thn)?);
                let els = Box::new(self.conv_expr(*els)?);
                let ty = self.conv_type(&ty, &i)?;
                Ok(Expr::Ternary {cond, thn, els, ty, i})
            },
            src::Expr::Call {target: _, id, args, ty, i} => {
                let args = args.into_iter()
                    .filter(|a| !matches!(a.get_type(), src::Type::Sampler {..}))
                    .map(|a| self.conv_expr(a))
                    .collect::<CompileResult<Vec<Expr>>>()?;
                let ty = self.conv_type(&ty, &i)?;
                Ok(Expr::Call {id, args, ty, i})
            },
            src::Expr::Intrinsic {func, args, ty, i} => {
                self.conv_intrinsic(func, args, ty, i)
            },
            src::Expr::Ctor {dt, args, ty, i} => {
                let args = args.into_iter()
                    .map(|a| self.conv_expr(a))
                    .collect::<CompileResult<Vec<Expr>>>()?;
                let to = Type::Data(self.conv_dt(dt));
                let ty = self.conv_type(&ty, &i)?;
                Ok(Expr::Ctor {to, args, ty, i})
            },
            src::Expr::Cast {to, arg, ty, i} => {
                let arg = self.conv_expr(*arg)?;
                let to = self.conv_type(&to, &i)?;
                let ty = self.conv_type(&ty, &i)?;
                Ok(Expr::Ctor {to, args: vec![arg], ty, i})
            },
            src::Expr::Index {target, idx, ty, i} => {
                let target = Box::new(self.conv_expr(*target)?);
                let idx = Box::new(self.conv_expr(*idx)?);
                let ty = self.conv_type(&ty, &i)?;
                Ok(Expr::Index {target, idx, ty, i})
            },
            src::Expr::Sequence {exprs, ty, i} => {
                let exprs = exprs.into_iter()
                    .map(|e| self.conv_expr(e))
                    .collect::<CompileResult<Vec<Expr>>>()?;
                let ty = self.conv_type(&ty, &i)?;
                Ok(Expr::Sequence {exprs, ty, i})
            },
            src::Expr::InitList {i, ..} => {
                scx_target_error!(
                    i, "Initializer lists are only supported in declarations"
                )
            },
        }
    }

    fn conv_intrinsic(
        &mut self,
        func: Intrinsic,
        args: Vec<src::Expr>,
        ty: src::Type,
        i: Info
    ) -> CompileResult<Expr> {
        let res_ty = self.conv_type(&ty, &i)?;
        match func {
            Intrinsic::Mul => {
                let mut it = args.into_iter();
                let lhs = self.conv_expr(it.next().unwrap())?;
                let rhs = self.conv_expr(it.next().unwrap())?;
                let e = Expr::BinOp {
                    lhs: Box::new(lhs),
                    op: BinOp::Mul,
                    rhs: Box::new(rhs),
                    ty: res_ty.clone(),
                    i: i.clone(),
                };
                Ok(Expr::Paren {e: Box::new(e), ty: res_ty, i})
            },
            Intrinsic::Rcp => {
                let arg = self.conv_expr(args.into_iter().next().unwrap())?;
                let one = Expr::Ctor {
                    to: res_ty.clone(),
                    args: vec![float_lit("1.0", &i)],
                    ty: res_ty.clone(),
                    i: i.clone(),
                };
                let div = Expr::BinOp {
                    lhs: Box::new(one),
                    op: BinOp::Div,
                    rhs: Box::new(arg),
                    ty: res_ty.clone(),
                    i: i.clone(),
                };
                Ok(Expr::Paren {e: Box::new(div), ty: res_ty, i})
            },
            Intrinsic::Saturate => {
                let arg = self.conv_expr(args.into_iter().next().unwrap())?;
                Ok(Expr::Call {
                    id: Name::new("clamp".to_string()),
                    args: vec![arg, float_lit("0.0", &i), float_lit("1.0", &i)],
                    ty: res_ty,
                    i,
                })
            },
            Intrinsic::Clip => {
                let arg = self.conv_expr(args.into_iter().next().unwrap())?;
                Ok(Expr::Call {
                    id: Name::new("clip".to_string()),
                    args: vec![arg],
                    ty: Type::Void,
                    i,
                })
            },
            Intrinsic::TexSample | Intrinsic::TexSampleBias |
            Intrinsic::TexSampleLevel | Intrinsic::TexSampleGrad => {
                let mut it = args.into_iter();
                let tex = self.conv_expr(it.next().unwrap())?;
                // The separate sampler-state argument folds into the combined sampler.
                let _sampler = it.next();
                let mut rest = it.map(|a| self.conv_expr(a))
                    .collect::<CompileResult<Vec<Expr>>>()?;
                // A trailing argument beyond the method's base signature is a texel offset,
                // which selects the Offset form of the lookup function.
                let base_n = match func {
                    Intrinsic::TexSample => 1,
                    Intrinsic::TexSampleBias | Intrinsic::TexSampleLevel => 2,
                    _ => 3,
                };
                let offset = if rest.len() > base_n {
                    rest.pop()
                } else {
                    None
                };
                let fn_name = match (func, &offset) {
                    (Intrinsic::TexSample, None) |
                    (Intrinsic::TexSampleBias, None) => "texture",
                    (Intrinsic::TexSample, Some(_)) |
                    (Intrinsic::TexSampleBias, Some(_)) => "textureOffset",
                    (Intrinsic::TexSampleLevel, None) => "textureLod",
                    (Intrinsic::TexSampleLevel, Some(_)) => "textureLodOffset",
                    (Intrinsic::TexSampleGrad, None) => "textureGrad",
                    (_, _) => "textureGradOffset",
                };
                let mut call_args = vec![tex];
                match (func, offset) {
                    // The target language puts the offset before the bias argument.
                    (Intrinsic::TexSampleBias, Some(off)) => {
                        let bias = rest.pop().unwrap();
                        call_args.append(&mut rest);
                        call_args.push(off);
                        call_args.push(bias);
                    },
                    (_, Some(off)) => {
                        call_args.append(&mut rest);
                        call_args.push(off);
                    },
                    (_, None) => {
                        call_args.append(&mut rest);
                    },
                }
                Ok(Expr::Call {
                    id: Name::new(fn_name.to_string()),
                    args: call_args,
                    ty: res_ty,
                    i,
                })
            },
            Intrinsic::TexSampleCmp => {
                let mut it = args.into_iter();
                let tex_src = it.next().unwrap();
                let tex_dim = match tex_src.get_type() {
                    src::Type::Buffer {kind, ..} => texture_dim(*kind),
                    _ => 2,
                };
                let tex = self.conv_expr(tex_src)?;
                let _sampler = it.next();
                let coords = self.conv_expr(it.next().unwrap())?;
                let cmp = self.conv_expr(it.next().unwrap())?;
                // The compare value rides in the last coordinate component of the shadow
                // sampler lookup.
                let packed_ty = dtu::vector_data_type(DataType::Float, tex_dim + 1)
                    .map(Type::Data)
                    .unwrap_or(Type::Data(DataType::Float3));
                let packed = Expr::Ctor {
                    to: packed_ty.clone(),
                    args: vec![coords, cmp],
                    ty: packed_ty,
                    i: i.clone(),
                };
                Ok(Expr::Call {
                    id: Name::new("texture".to_string()),
                    args: vec![tex, packed],
                    ty: res_ty,
                    i,
                })
            },
            Intrinsic::TexLoad => {
                let mut it = args.into_iter();
                let tex = it.next().unwrap();
                let tex_dim = match tex.get_type() {
                    src::Type::Buffer {kind, ..} => texture_dim(*kind),
                    _ => 2,
                };
                let tex = self.conv_expr(tex)?;
                let loc = self.conv_expr(it.next().unwrap())?;
                let offset = match it.next() {
                    Some(off) => Some(self.conv_expr(off)?),
                    None => None,
                };
                let loc_dim = match loc.get_type() {
                    Type::Data(t) => t.vector_dim(),
                    _ => 0,
                };
                // The source coordinate carries the mip level in its last component.
                let mut call_args = if loc_dim == tex_dim + 1 {
                    let loc = Expr::Paren {
                        ty: loc.get_type().clone(),
                        i: i.clone(),
                        e: Box::new(loc),
                    };
                    let xy: String = ["x", "y", "z"][..tex_dim].concat();
                    let coord_ty = dtu::vector_data_type(DataType::Int, tex_dim)
                        .map(Type::Data)
                        .unwrap_or(Type::Data(DataType::Int));
                    let coords = Expr::Member {
                        target: Box::new(loc.clone()),
                        member: xy,
                        ty: coord_ty,
                        i: i.clone(),
                    };
                    let level = Expr::Member {
                        target: Box::new(loc),
                        member: ["x", "y", "z", "w"][tex_dim].to_string(),
                        ty: Type::Data(DataType::Int),
                        i: i.clone(),
                    };
                    vec![tex, coords, level]
                } else {
                    vec![tex, loc, int_lit("0", &i)]
                };
                let fn_name = match offset {
                    Some(off) => {
                        call_args.push(off);
                        "texelFetchOffset"
                    },
                    None => "texelFetch",
                };
                Ok(Expr::Call {
                    id: Name::new(fn_name.to_string()),
                    args: call_args,
                    ty: res_ty,
                    i,
                })
            },
            Intrinsic::TexGetDimensions => {
                scx_target_error!(
                    i, "GetDimensions may only be used as a statement"
                )
            },
            f if f.is_interlocked() => {
                scx_target_error!(
                    i, "Interlocked intrinsics may only be used as statements"
                )
            },
            f => {
                let fn_name = match intrinsic_fn_name(f) {
                    Some(n) => n,
                    None => {
                        return scx_internal_error!(i, "Unmapped intrinsic {f}");
                    },
                };
                let args = args.into_iter()
                    .map(|a| self.conv_expr(a))
                    .collect::<CompileResult<Vec<Expr>>>()?;
                Ok(Expr::Call {
                    id: Name::new(fn_name.to_string()),
                    args,
                    ty: res_ty,
                    i,
                })
            },
        }
    }

    // Rewrites a numeric literal's suffix for the target language. Half literals lose their
    // suffix and become single precision; double literals gain the "lf" suffix when doubles
    // survive, and lose any suffix when they were narrowed.
    fn conv_float_text(&self, text: &str, dt: DataType) -> String {
        let stripped = text.trim_end_matches(|c| {
            c == 'f' || c == 'F' || c == 'h' || c == 'H'
        });
        let with_point = if stripped.contains('.')
            || stripped.contains('e')
            || stripped.contains('E')
        {
            stripped.to_string()
        } else {
            format!("{stripped}.0")
        };
        match dt.base() {
            DataType::Double if !self.narrow_double => format!("{with_point}lf"),
            DataType::Half | DataType::Double => with_point,
            _ => {
                if text.ends_with('f') || text.ends_with('F') {
                    format!("{with_point}f")
                } else {
                    with_point
                }
            },
        }
    }
}

fn collect_shadow_receivers(tops: &[src::Top]) -> BTreeSet<Name> {
    tops.iter().fold(BTreeSet::new(), |acc, t| match t {
        src::Top::FunDef {body: Some(body), ..} => {
            body.sfold(acc, collect_shadow_stmt)
        },
        _ => acc,
    })
}

fn collect_shadow_stmt(acc: BTreeSet<Name>, s: &src::Stmt) -> BTreeSet<Name> {
    let acc = SFold::<src::Expr>::sfold(s, acc, collect_shadow_expr);
    SFold::<src::Stmt>::sfold(s, acc, collect_shadow_stmt)
}

fn collect_shadow_expr(acc: BTreeSet<Name>, e: &src::Expr) -> BTreeSet<Name> {
    let acc = match e {
        src::Expr::Intrinsic {func: Intrinsic::TexSampleCmp, args, ..} => {
            let mut acc = acc;
            if let Some(src::Expr::Var {id, ..}) = args.first() {
                acc.insert(id.clone());
            }
            acc
        },
        _ => acc,
    };
    e.sfold(acc, collect_shadow_expr)
}

fn half_to_float(t: DataType) -> DataType {
    if t.is_scalar() {
        DataType::Float
    } else if t.is_vector() {
        dtu::vector_data_type(DataType::Float, t.vector_dim()).unwrap()
    } else {
        let (r, c) = t.matrix_dim();
        dtu::matrix_data_type(DataType::Float, r, c).unwrap()
    }
}

fn elem_base(elem: &src::Type) -> DataType {
    match elem {
        src::Type::Data(dt) => dt.base(),
        _ => DataType::Float,
    }
}

fn wrap_array(base: Type, dims: &[src::Expr]) -> Type {
    if dims.is_empty() {
        base
    } else {
        let dims = dims.iter()
            .map(|d| match d {
                src::Expr::IntLit {v, ..} => *v,
                _ => 0,
            })
            .collect();
        Type::Array {elem: Box::new(base), dims}
    }
}

fn assign_stmt(lhs: Expr, rhs: Expr, i: &Info) -> Stmt {
    let ty = lhs.get_type().clone();
    Stmt::Expr {
        e: Expr::Assign {
            lhs: Box::new(lhs),
            op: AssignOp::Set,
            rhs: Box::new(rhs),
            ty,
            i: i.clone(),
        },
        i: i.clone(),
    }
}

fn int_lit(text: &str, i: &Info) -> Expr {
    Expr::IntLit {
        text: text.to_string(),
        ty: Type::Data(DataType::Int),
        i: i.clone(),
    }
}

fn float_lit(text: &str, i: &Info) -> Expr {
    Expr::FloatLit {
        text: text.to_string(),
        ty: Type::Data(DataType::Float),
        i: i.clone(),
    }
}

fn comparison_fn(op: BinOp) -> &'static str {
    match op {
        BinOp::Lt => "lessThan",
        BinOp::Leq => "lessThanEqual",
        BinOp::Gt => "greaterThan",
        BinOp::Geq => "greaterThanEqual",
        BinOp::Eq => "equal",
        BinOp::Neq => "notEqual",
        _ => unreachable!(),
    }
}

fn texture_dim(kind: src::BufferType) -> usize {
    use src::BufferType as BT;
    match kind {
        BT::Texture1D | BT::RWTexture1D | BT::Buffer => 1,
        BT::Texture1DArray | BT::RWTexture1DArray | BT::Texture2D |
        BT::RWTexture2D | BT::Texture2DMS => 2,
        _ => 3,
    }
}

fn stream_topology(kind: src::BufferType) -> &'static str {
    match kind {
        src::BufferType::PointStream => "points",
        src::BufferType::LineStream => "line_strip",
        _ => "triangle_strip",
    }
}

fn domain_name(s: &str) -> String {
    match s {
        "tri" => "triangles",
        "quad" => "quads",
        "isoline" => "isolines",
        _ => "triangles",
    }.to_string()
}

fn partitioning_name(s: &str) -> String {
    match s {
        "integer" | "pow2" => "equal_spacing",
        "fractional_even" => "fractional_even_spacing",
        "fractional_odd" => "fractional_odd_spacing",
        _ => "equal_spacing",
    }.to_string()
}

fn topology_name(s: &str) -> String {
    match s {
        "triangle_cw" => "cw",
        "triangle_ccw" => "ccw",
        _ => "ccw",
    }.to_string()
}

fn attr_int(a: &src::Attribute, idx: usize) -> CompileResult<i64> {
    match a.args.get(idx) {
        Some(src::Expr::IntLit {v, ..}) => Ok(*v),
        _ => {
            scx_semantic_error!(a.i, "Attribute [{0}] expects integer arguments", a.id)
        },
    }
}

fn attr_float(a: &src::Attribute) -> CompileResult<f64> {
    match a.args.first() {
        Some(src::Expr::FloatLit {text, ..}) => {
            let digits = text.trim_end_matches(|c| {
                c == 'f' || c == 'F' || c == 'h' || c == 'H'
            });
            Ok(digits.parse::<f64>().unwrap_or(0.0))
        },
        Some(src::Expr::IntLit {v, ..}) => Ok(*v as f64),
        _ => {
            scx_semantic_error!(a.i, "Attribute [{0}] expects a numeric argument", a.id)
        },
    }
}

fn attr_string(a: &src::Attribute) -> CompileResult<String> {
    match a.args.first() {
        Some(src::Expr::StringLit {v, ..}) => Ok(v.clone()),
        Some(src::Expr::Var {id, ..}) => Ok(id.get_str().clone()),
        _ => {
            scx_semantic_error!(a.i, "Attribute [{0}] expects a name argument", a.id)
        },
    }
}
