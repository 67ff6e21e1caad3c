use super::ast::*;
use crate::scx_name_error;
use crate::utils::err::*;
use crate::utils::info::Info;
use crate::utils::name::Name;
use crate::utils::smap::*;

use std::collections::BTreeMap;

// Scoped renaming. Every declaration receives a unique symbol; variable references resolve to the
// symbol of the declaration in the innermost enclosing scope. Function names keep per-identifier
// overload sets, which the type checker resolves once argument types are known. Aliases resolve
// eagerly to their target type, and a struct may only extend an already-declared struct, so alias
// and inheritance chains cannot form cycles.
pub fn symbolize(ast: Ast) -> CompileResult<Ast> {
    let (_, ast) = ast.into_iter()
        .fold(Ok((SymEnv::default(), vec![])), |acc: CompileResult<_>, t| {
            let (env, mut tops) = acc?;
            let (env, t) = symbolize_top(env, t)?;
            tops.push(t);
            Ok((env, tops))
        })?;
    Ok(ast)
}

#[derive(Clone, Debug, Default)]
struct SymEnv {
    vars: BTreeMap<String, Name>,
    structs: BTreeMap<String, Name>,
    aliases: BTreeMap<String, Type>,
    funs: BTreeMap<String, Vec<FunHeader>>,
}

#[derive(Clone, Debug)]
struct FunHeader {
    id: Name,
    params: Vec<Type>,
    has_body: bool,
}

impl SymEnv {
    fn get_var(&self, i: &Info, id: Name) -> CompileResult<Name> {
        if id.has_sym() {
            Ok(id)
        } else if let Some(n) = self.vars.get(id.get_str()) {
            Ok(n.clone())
        } else {
            scx_name_error!(i, "Found reference to undeclared identifier {id}")
        }
    }

    // Declarations shadow any earlier binding of the same identifier. Each scope works on its own
    // clone of the environment, so bindings made inside a block are dropped on exit.
    fn declare_var(mut self, _i: &Info, id: Name) -> CompileResult<(Self, Name)> {
        let id = id.with_new_sym();
        self.vars.insert(id.get_str().clone(), id.clone());
        Ok((self, id))
    }

    fn resolve_named_type(&self, i: &Info, id: &Name) -> CompileResult<Type> {
        if let Some(ty) = self.aliases.get(id.get_str()) {
            Ok(ty.clone())
        } else if let Some(sym) = self.structs.get(id.get_str()) {
            Ok(Type::Struct {id: sym.clone()})
        } else {
            scx_name_error!(i, "Unknown type name '{id}'")
        }
    }

    fn resolve_type(&self, i: &Info, ty: Type) -> CompileResult<Type> {
        match ty {
            Type::Struct {id} if !id.has_sym() => self.resolve_named_type(i, &id),
            Type::Buffer {kind, elem} => {
                let elem = self.resolve_type(i, *elem)?;
                Ok(Type::Buffer {kind, elem: Box::new(elem)})
            },
            Type::Array {elem, dims} => {
                let elem = self.resolve_type(i, *elem)?;
                Ok(Type::Array {elem: Box::new(elem), dims})
            },
            _ => Ok(ty),
        }
    }
}

fn symbolize_vec<T>(
    env: SymEnv,
    nodes: Vec<T>,
    f: impl Fn(SymEnv, T) -> CompileResult<(SymEnv, T)>
) -> CompileResult<(SymEnv, Vec<T>)> {
    nodes.into_iter()
        .fold(Ok((env, vec![])), |acc, v| {
            let (env, mut vec) = acc?;
            let (env, v) = f(env, v)?;
            vec.push(v);
            Ok((env, vec))
        })
}

fn symbolize_expr(env: &SymEnv, e: Expr) -> CompileResult<Expr> {
    match e {
        Expr::Var {id, ty, i} => {
            let id = env.get_var(&i, id)?;
            Ok(Expr::Var {id, ty, i})
        },
        Expr::Cast {to, arg, ty, i} => {
            let to = env.resolve_type(&i, to)?;
            let arg = Box::new(symbolize_expr(env, *arg)?);
            Ok(Expr::Cast {to, arg, ty, i})
        },
        // Call identifiers resolve during type checking, when the argument types that drive
        // overload selection are known. Only the argument expressions are renamed here.
        Expr::Call {target, id, args, ty, i} => {
            let target = match target {
                Some(t) => Some(Box::new(symbolize_expr(env, *t)?)),
                None => None,
            };
            let args = args.smap_result(|a| symbolize_expr(env, a))?;
            Ok(Expr::Call {target, id, args, ty, i})
        },
        _ => e.smap_result(|e| symbolize_expr(env, e)),
    }
}

fn symbolize_var_init(env: SymEnv, v: VarInit) -> CompileResult<(SymEnv, VarInit)> {
    let VarInit {id, dims, semantic, pack_offset, init, i} = v;
    let dims = dims.smap_result(|d| symbolize_expr(&env, d))?;
    let init = match init {
        Some(e) => Some(symbolize_expr(&env, e)?),
        None => None,
    };
    let (env, id) = env.declare_var(&i, id)?;
    Ok((env, VarInit {id, dims, semantic, pack_offset, init, i}))
}

fn symbolize_stmt(env: SymEnv, s: Stmt) -> CompileResult<(SymEnv, Stmt)> {
    match s {
        Stmt::Decl {spec, vars, i} => {
            let ty = env.resolve_type(&spec.i, spec.ty)?;
            let spec = TypeSpec {ty, ..spec};
            let (env, vars) = symbolize_vec(env, vars, symbolize_var_init)?;
            Ok((env, Stmt::Decl {spec, vars, i}))
        },
        Stmt::Block {body, i} => {
            let body = symbolize_stmts(&env, body)?;
            Ok((env, Stmt::Block {body, i}))
        },
        Stmt::If {cond, thn, els, i} => {
            let cond = symbolize_expr(&env, cond)?;
            let thn = symbolize_stmts(&env, thn)?;
            let els = symbolize_stmts(&env, els)?;
            Ok((env, Stmt::If {cond, thn, els, i}))
        },
        Stmt::While {cond, body, attrs, i} => {
            let cond = symbolize_expr(&env, cond)?;
            let body = symbolize_stmts(&env, body)?;
            Ok((env, Stmt::While {cond, body, attrs, i}))
        },
        Stmt::DoWhile {body, cond, i} => {
            let body = symbolize_stmts(&env, body)?;
            let cond = symbolize_expr(&env, cond)?;
            Ok((env, Stmt::DoWhile {body, cond, i}))
        },
        Stmt::For {init, cond, incr, body, attrs, i} => {
            // The loop header introduces its own scope covering the body.
            let (loop_env, init) = symbolize_vec(env.clone(), init, symbolize_stmt)?;
            let cond = match cond {
                Some(e) => Some(symbolize_expr(&loop_env, e)?),
                None => None,
            };
            let incr = match incr {
                Some(e) => Some(symbolize_expr(&loop_env, e)?),
                None => None,
            };
            let body = symbolize_stmts(&loop_env, body)?;
            Ok((env, Stmt::For {init, cond, incr, body, attrs, i}))
        },
        Stmt::Switch {cond, cases, i} => {
            let cond = symbolize_expr(&env, cond)?;
            let cases = cases.into_iter()
                .map(|SwitchCase {value, body, i}| {
                    let value = match value {
                        Some(e) => Some(symbolize_expr(&env, e)?),
                        None => None,
                    };
                    let body = symbolize_stmts(&env, body)?;
                    Ok(SwitchCase {value, body, i})
                })
                .collect::<CompileResult<Vec<SwitchCase>>>()?;
            Ok((env, Stmt::Switch {cond, cases, i}))
        },
        Stmt::Expr {e, i} => {
            let e = symbolize_expr(&env, e)?;
            Ok((env, Stmt::Expr {e, i}))
        },
        Stmt::Return {value, i} => {
            let value = match value {
                Some(e) => Some(symbolize_expr(&env, e)?),
                None => None,
            };
            Ok((env, Stmt::Return {value, i}))
        },
        Stmt::Break {..} | Stmt::Continue {..} | Stmt::Discard {..} |
        Stmt::Empty {..} => Ok((env, s)),
    }
}

fn symbolize_stmts(env: &SymEnv, stmts: Vec<Stmt>) -> CompileResult<Vec<Stmt>> {
    let (_, stmts) = symbolize_vec(env.clone(), stmts, symbolize_stmt)?;
    Ok(stmts)
}

fn symbolize_fields(env: &SymEnv, fields: Vec<StructField>) -> CompileResult<Vec<StructField>> {
    fields.into_iter()
        .map(|f| {
            let ty = env.resolve_type(&f.i, f.ty)?;
            let dims = f.dims.smap_result(|d| symbolize_expr(env, d))?;
            Ok(StructField {ty, dims, ..f})
        })
        .collect()
}

fn signatures_match(l: &[Type], r: &[Type]) -> bool {
    l.len() == r.len() && l.iter().zip(r.iter()).all(|(a, b)| a == b)
}

fn symbolize_params(env: SymEnv, params: Vec<Param>) -> CompileResult<(SymEnv, Vec<Param>)> {
    symbolize_vec(env, params, |env, p| {
        let Param {spec, id, dims, semantic, dir, default, i} = p;
        let ty = env.resolve_type(&spec.i, spec.ty)?;
        let spec = TypeSpec {ty, ..spec};
        let default = match default {
            Some(e) => Some(symbolize_expr(&env, e)?),
            None => None,
        };
        let dims = dims.smap_result(|d| symbolize_expr(&env, d))?;
        let (env, id) = env.declare_var(&i, id)?;
        Ok((env, Param {spec, id, dims, semantic, dir, default, i}))
    })
}

fn symbolize_fun_def(
    mut env: SymEnv,
    attrs: Vec<Attribute>,
    ret: TypeSpec,
    id: Name,
    params: Vec<Param>,
    ret_semantic: Option<IndexedSemantic>,
    body: Option<Vec<Stmt>>,
    i: Info
) -> CompileResult<(SymEnv, Top)> {
    let ret_ty = env.resolve_type(&ret.i, ret.ty)?;
    let ret = TypeSpec {ty: ret_ty, ..ret};
    let (fun_env, params) = symbolize_params(env.clone(), params)?;
    let param_tys = params.iter()
        .map(|p| p.spec.ty.clone())
        .collect::<Vec<Type>>();

    let overloads = env.funs.entry(id.get_str().clone()).or_default();
    let existing = overloads.iter_mut()
        .find(|h| signatures_match(&h.params, &param_tys));
    let id = match existing {
        // A definition may complete an earlier forward declaration under the same symbol; a
        // second body for the same signature is a redefinition.
        Some(h) if !h.has_body => {
            h.has_body = body.is_some();
            h.id.clone()
        },
        Some(h) if body.is_none() => h.id.clone(),
        Some(_) => {
            return scx_name_error!(i, "Redefinition of function {id}");
        },
        None => {
            let id = id.with_new_sym();
            overloads.push(FunHeader {
                id: id.clone(),
                params: param_tys,
                has_body: body.is_some(),
            });
            id
        },
    };

    let body = match body {
        Some(stmts) => Some(symbolize_stmts(&fun_env, stmts)?),
        None => None,
    };
    let attrs = attrs.into_iter()
        .map(|Attribute {id, args, i}| {
            let args = args.smap_result(|a| symbolize_expr(&fun_env, a))?;
            Ok(Attribute {id, args, i})
        })
        .collect::<CompileResult<Vec<Attribute>>>()?;
    Ok((env, Top::FunDef {attrs, ret, id, params, ret_semantic, body, i}))
}

fn symbolize_top(mut env: SymEnv, t: Top) -> CompileResult<(SymEnv, Top)> {
    match t {
        Top::StructDef {id, base, fields, i} => {
            let base = match base {
                Some(b) => match env.structs.get(b.get_str()) {
                    Some(sym) => Some(sym.clone()),
                    None => {
                        return scx_name_error!(
                            i, "Struct {id} extends undeclared struct {b}"
                        );
                    },
                },
                None => None,
            };
            let fields = symbolize_fields(&env, fields)?;
            if env.structs.contains_key(id.get_str()) {
                return scx_name_error!(i, "Redefinition of struct {id}");
            }
            let id = id.with_new_sym();
            env.structs.insert(id.get_str().clone(), id.clone());
            Ok((env, Top::StructDef {id, base, fields, i}))
        },
        Top::AliasDef {id, ty, i} => {
            let ty = env.resolve_type(&i, ty)?;
            if env.aliases.contains_key(id.get_str()) {
                return scx_name_error!(i, "Redefinition of type alias {id}");
            }
            env.aliases.insert(id.get_str().clone(), ty.clone());
            let id = id.with_new_sym();
            Ok((env, Top::AliasDef {id, ty, i}))
        },
        Top::ConstantBuffer {kind, id, register, fields, i} => {
            // Uniform-buffer members live in the global scope, not behind the buffer name.
            let (env, fields) = symbolize_vec(env, fields, |env, f| {
                let CBufferField {ty, id, dims, pack_offset, i} = f;
                let ty = env.resolve_type(&i, ty)?;
                let dims = dims.smap_result(|d| symbolize_expr(&env, d))?;
                let (env, id) = env.declare_var(&i, id)?;
                Ok((env, CBufferField {ty, id, dims, pack_offset, i}))
            })?;
            let id = id.with_new_sym();
            Ok((env, Top::ConstantBuffer {kind, id, register, fields, i}))
        },
        Top::BufferDecl {kind, elem, id, dims, register, i} => {
            let elem = env.resolve_type(&i, elem)?;
            let dims = dims.smap_result(|d| symbolize_expr(&env, d))?;
            let (env, id) = env.declare_var(&i, id)?;
            Ok((env, Top::BufferDecl {kind, elem, id, dims, register, i}))
        },
        Top::SamplerDecl {kind, id, register, state, i} => {
            let (env, id) = env.declare_var(&i, id)?;
            Ok((env, Top::SamplerDecl {kind, id, register, state, i}))
        },
        Top::GlobalVar {spec, vars, i} => {
            let ty = env.resolve_type(&spec.i, spec.ty)?;
            let spec = TypeSpec {ty, ..spec};
            let (env, vars) = symbolize_vec(env, vars, symbolize_var_init)?;
            Ok((env, Top::GlobalVar {spec, vars, i}))
        },
        Top::FunDef {attrs, ret, id, params, ret_semantic, body, i} => {
            symbolize_fun_def(env, attrs, ret, id, params, ret_semantic, body, i)
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hlsl::{lexer, parser};

    fn symbolize_str(src: &str) -> CompileResult<Ast> {
        symbolize(parser::parse(lexer::tokenize(src, "test.hlsl")?)?)
    }

    #[test]
    fn locals_get_symbols() {
        let ast = symbolize_str("float f() { float x = 1.0f; return x; }").unwrap();
        match &ast[0] {
            Top::FunDef {body, ..} => {
                let body = body.as_ref().unwrap();
                let decl_sym = match &body[0] {
                    Stmt::Decl {vars, ..} => vars[0].id.clone(),
                    s => panic!("expected declaration, found {s:?}"),
                };
                assert!(decl_sym.has_sym());
                match &body[1] {
                    Stmt::Return {value: Some(Expr::Var {id, ..}), ..} => {
                        assert_eq!(*id, decl_sym);
                    },
                    s => panic!("expected return of variable, found {s:?}"),
                }
            },
            t => panic!("expected function, found {t:?}"),
        }
    }

    #[test]
    fn undeclared_identifier_is_name_error() {
        let r = symbolize_str("float f() { return missing; }");
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Name);
    }

    #[test]
    fn shadowing_in_nested_scope_resolves_innermost() {
        let ast = symbolize_str(
            "float f() { float x = 1.0f; { float x = 2.0f; x = 3.0f; } return x; }"
        ).unwrap();
        match &ast[0] {
            Top::FunDef {body, ..} => {
                let body = body.as_ref().unwrap();
                let outer = match &body[0] {
                    Stmt::Decl {vars, ..} => vars[0].id.clone(),
                    s => panic!("unexpected {s:?}"),
                };
                let (inner, assigned) = match &body[1] {
                    Stmt::Block {body, ..} => {
                        let inner = match &body[0] {
                            Stmt::Decl {vars, ..} => vars[0].id.clone(),
                            s => panic!("unexpected {s:?}"),
                        };
                        let assigned = match &body[1] {
                            Stmt::Expr {e: Expr::Assign {lhs, ..}, ..} => {
                                match lhs.as_ref() {
                                    Expr::Var {id, ..} => id.clone(),
                                    e => panic!("unexpected {e:?}"),
                                }
                            },
                            s => panic!("unexpected {s:?}"),
                        };
                        (inner, assigned)
                    },
                    s => panic!("unexpected {s:?}"),
                };
                assert!(outer != inner);
                assert_eq!(inner, assigned);
                match &body[2] {
                    Stmt::Return {value: Some(Expr::Var {id, ..}), ..} => {
                        assert_eq!(*id, outer);
                    },
                    s => panic!("unexpected {s:?}"),
                }
            },
            t => panic!("expected function, found {t:?}"),
        }
    }

    #[test]
    fn alias_resolves_transparently() {
        let ast = symbolize_str(
            "typedef float3 Normal;\nNormal g;\nfloat f() { return g.x; }"
        ).unwrap();
        match &ast[1] {
            Top::GlobalVar {spec, ..} => {
                assert_eq!(spec.ty, Type::Data(DataType::Float3));
            },
            t => panic!("expected global, found {t:?}"),
        }
    }

    #[test]
    fn self_referential_struct_base_is_rejected() {
        let r = symbolize_str("struct S : S { float x; };");
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Name);
    }

    #[test]
    fn unknown_type_name_is_rejected() {
        let r = symbolize_str("Unseen g;");
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Name);
    }

    #[test]
    fn forward_declaration_shares_symbol_with_definition() {
        let ast = symbolize_str(
            "float helper(float x);\n\
             float helper(float x) { return x; }\n\
             float helper(float x, float y) { return x + y; }"
        ).unwrap();
        let ids = ast.iter()
            .map(|t| match t {
                Top::FunDef {id, ..} => id.clone(),
                t => panic!("expected function, found {t:?}"),
            })
            .collect::<Vec<Name>>();
        assert_eq!(ids[0], ids[1]);
        assert!(ids[1] != ids[2]);
    }

    #[test]
    fn duplicate_function_body_is_rejected() {
        let r = symbolize_str(
            "float f(float x) { return x; } float f(float x) { return x; }"
        );
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Name);
    }

    #[test]
    fn cbuffer_members_enter_global_scope() {
        let ast = symbolize_str(
            "cbuffer C { float4x4 m; };\nfloat4 f(float4 v) { return m[0]; }"
        ).unwrap();
        assert_eq!(ast.len(), 2);
    }
}
