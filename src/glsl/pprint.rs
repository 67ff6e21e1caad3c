use super::ast::*;
use super::keywords::{RESERVED_BUILTINS, data_type_name, type_name};
use crate::utils::info::InfoNode;
use crate::utils::pprint::*;

use itertools::Itertools;

// The emitter. Walks the converted AST and produces the final text: header comment, version
// directive, extensions, layout declarations, synthesized helpers, then the top-level
// declarations separated by blank lines.

impl PrettyPrint for Type {
    fn pprint(&self, env: PrettyPrintEnv) -> (PrettyPrintEnv, String) {
        (env, type_name(self))
    }
}

// Array dimensions print after the declarator name, so declarations split the type into its base
// name and a dimension suffix.
fn split_decl_type(ty: &Type) -> (String, String) {
    match ty {
        Type::Array {elem, dims} => {
            let dims = dims.iter()
                .map(|d| {
                    if *d == 0 {
                        "[]".to_string()
                    } else {
                        format!("[{d}]")
                    }
                })
                .join("");
            (type_name(elem), dims)
        },
        ty => (type_name(ty), String::new()),
    }
}

impl PrettyPrintUnOp<Type> for Expr {
    fn extract_unop<'a>(&'a self) -> Option<(&'a UnOp, &'a Expr)> {
        if let Expr::UnOp {op, arg, ..} = self {
            Some((op, arg))
        } else {
            None
        }
    }

    fn print_unop(op: &UnOp) -> String {
        format!("{op}")
    }
}

impl PrettyPrintBinOp<Type> for Expr {
    fn extract_binop<'a>(&'a self) -> Option<(&'a Expr, &'a BinOp, &'a Expr, &'a Type)> {
        if let Expr::BinOp {lhs, op, rhs, ty, ..} = self {
            Some((lhs, op, rhs, ty))
        } else {
            None
        }
    }

    // Vector comparisons are rewritten to relational functions by the converter, so every
    // operator that survives to emission is infix.
    fn is_infix(_op: &BinOp, _argty: &Type) -> bool {
        true
    }

    fn print_binop(op: &BinOp, _argty: &Type) -> String {
        format!("{op}")
    }

    fn associativity(_op: &BinOp) -> Assoc {
        Assoc::Left
    }
}

impl PrettyPrint for Expr {
    fn pprint(&self, env: PrettyPrintEnv) -> (PrettyPrintEnv, String) {
        match self {
            Expr::Var {id, ..} => id.pprint(env),
            Expr::IntLit {text, ..} => (env, text.clone()),
            Expr::FloatLit {text, ..} => (env, text.clone()),
            Expr::BoolLit {v, ..} => (env, v.to_string()),
            Expr::UnOp {..} => self.print_parenthesized_unop(env),
            Expr::PostUnOp {op, arg, ..} => {
                let (env, arg_str) = arg.pprint(env);
                if arg.is_leaf_node() {
                    (env, format!("{arg_str}{op}"))
                } else {
                    (env, format!("({arg_str}){op}"))
                }
            },
            Expr::BinOp {..} => self.print_parenthesized_binop(env),
            Expr::Assign {lhs, op, rhs, ..} => {
                let (env, lhs) = lhs.pprint(env);
                let (env, rhs) = rhs.pprint(env);
                (env, format!("{lhs} {op} {rhs}"))
            },
            Expr::Ternary {cond, thn, els, ..} => {
                let (env, cond_str) = cond.pprint(env);
                let (env, thn_str) = thn.pprint(env);
                let (env, els_str) = els.pprint(env);
                let cond_str = if cond.is_leaf_node() {
                    cond_str
                } else {
                    format!("({cond_str})")
                };
                (env, format!("{cond_str} ? {thn_str} : {els_str}"))
            },
            Expr::Call {id, args, ..} => {
                let (env, id) = id.pprint(env);
                let (env, args) = pprint_iter(args.iter(), env, ", ");
                (env, format!("{id}({args})"))
            },
            Expr::Ctor {to, args, ..} => {
                let (env, args) = pprint_iter(args.iter(), env, ", ");
                let name = match to {
                    Type::Array {elem, dims} => {
                        let dims = dims.iter()
                            .map(|d| {
                                if *d == 0 {
                                    "[]".to_string()
                                } else {
                                    format!("[{d}]")
                                }
                            })
                            .join("");
                        format!("{0}{dims}", type_name(elem))
                    },
                    ty => type_name(ty),
                };
                (env, format!("{name}({args})"))
            },
            Expr::Member {target, member, ..} => {
                let (env, target_str) = target.pprint(env);
                if target.is_leaf_node() {
                    (env, format!("{target_str}.{member}"))
                } else {
                    (env, format!("({target_str}).{member}"))
                }
            },
            Expr::Index {target, idx, ..} => {
                let (env, target_str) = target.pprint(env);
                let (env, idx_str) = idx.pprint(env);
                if target.is_leaf_node() {
                    (env, format!("{target_str}[{idx_str}]"))
                } else {
                    (env, format!("({target_str})[{idx_str}]"))
                }
            },
            Expr::Sequence {exprs, ..} => pprint_iter(exprs.iter(), env, ", "),
            Expr::Paren {e, ..} => {
                let (env, s) = e.pprint(env);
                (env, format!("({s})"))
            },
        }
    }
}

impl PrettyPrint for Stmt {
    fn pprint(&self, env: PrettyPrintEnv) -> (PrettyPrintEnv, String) {
        let indent = env.print_indent();
        match self {
            Stmt::Decl {is_const, ty, id, init, ..} => {
                let (base, dims) = split_decl_type(ty);
                let (env, id) = id.pprint(env);
                let prefix = if *is_const { "const " } else { "" };
                match init {
                    Some(e) => {
                        let (env, e) = e.pprint(env);
                        (env, format!("{indent}{prefix}{base} {id}{dims} = {e};"))
                    },
                    None => (env, format!("{indent}{prefix}{base} {id}{dims};")),
                }
            },
            Stmt::Expr {e, ..} => {
                let (env, e) = e.pprint(env);
                (env, format!("{indent}{e};"))
            },
            Stmt::Block {body, ..} => {
                let env = env.incr_indent();
                let (env, body) = pprint_iter(body.iter(), env, "\n");
                let env = env.decr_indent();
                (env, format!("{indent}{{\n{body}\n{indent}}}"))
            },
            Stmt::If {cond, thn, els, ..} => print_if(env, cond, thn, els),
            Stmt::While {cond, body, ..} => {
                let (env, cond) = cond.pprint(env);
                let env = env.incr_indent();
                let (env, body) = pprint_iter(body.iter(), env, "\n");
                let env = env.decr_indent();
                (env, format!("{indent}while ({cond}) {{\n{body}\n{indent}}}"))
            },
            Stmt::DoWhile {body, cond, ..} => {
                let env = env.incr_indent();
                let (env, body) = pprint_iter(body.iter(), env, "\n");
                let env = env.decr_indent();
                let (env, cond) = cond.pprint(env);
                (env, format!("{indent}do {{\n{body}\n{indent}}} while ({cond});"))
            },
            Stmt::For {init, cond, incr, body, ..} => {
                let (env, init_str) = pprint_iter(init.iter(), env, " ");
                let init_str = init_str.trim_start().trim_end_matches(';').to_string();
                let (env, cond_str) = match cond {
                    Some(e) => e.pprint(env),
                    None => (env, String::new()),
                };
                let (env, incr_str) = match incr {
                    Some(e) => e.pprint(env),
                    None => (env, String::new()),
                };
                let env = env.incr_indent();
                let (env, body) = pprint_iter(body.iter(), env, "\n");
                let env = env.decr_indent();
                let s = format!(
                    "{indent}for ({init_str}; {cond_str}; {incr_str}) {{\n{body}\n{indent}}}"
                );
                (env, s)
            },
            Stmt::Switch {cond, cases, ..} => {
                let (env, cond) = cond.pprint(env);
                let env = env.incr_indent();
                let (env, cases) = pprint_iter(cases.iter(), env, "\n");
                let env = env.decr_indent();
                (env, format!("{indent}switch ({cond}) {{\n{cases}\n{indent}}}"))
            },
            Stmt::Return {value: Some(e), ..} => {
                let (env, e) = e.pprint(env);
                (env, format!("{indent}return {e};"))
            },
            Stmt::Return {value: None, ..} => (env, format!("{indent}return;")),
            Stmt::Break {..} => (env, format!("{indent}break;")),
            Stmt::Continue {..} => (env, format!("{indent}continue;")),
            Stmt::Discard {..} => (env, format!("{indent}discard;")),
        }
    }
}

// Prints an if-statement, flattening a sole nested if in the else branch into "else if".
fn print_if(
    env: PrettyPrintEnv,
    cond: &Expr,
    thn: &[Stmt],
    els: &[Stmt]
) -> (PrettyPrintEnv, String) {
    let indent = env.print_indent();
    let (env, cond) = cond.pprint(env);
    let env = env.incr_indent();
    let (env, thn_str) = pprint_iter(thn.iter(), env, "\n");
    let env = env.decr_indent();
    if els.is_empty() {
        return (env, format!("{indent}if ({cond}) {{\n{thn_str}\n{indent}}}"));
    }
    if let [Stmt::If {cond: econd, thn: ethn, els: eels, ..}] = els {
        let (env, chained) = print_if(env, econd, ethn, eels);
        let chained = chained.trim_start().to_string();
        return (env, format!(
            "{indent}if ({cond}) {{\n{thn_str}\n{indent}}} else {chained}"
        ));
    }
    let env = env.incr_indent();
    let (env, els_str) = pprint_iter(els.iter(), env, "\n");
    let env = env.decr_indent();
    (env, format!(
        "{indent}if ({cond}) {{\n{thn_str}\n{indent}}} else {{\n{els_str}\n{indent}}}"
    ))
}

impl PrettyPrint for SwitchCase {
    fn pprint(&self, env: PrettyPrintEnv) -> (PrettyPrintEnv, String) {
        let indent = env.print_indent();
        let (env, label) = match &self.value {
            Some(e) => {
                let (env, e) = e.pprint(env);
                (env, format!("case {e}:"))
            },
            None => (env, "default:".to_string()),
        };
        let env = env.incr_indent();
        let (env, body) = pprint_iter(self.body.iter(), env, "\n");
        let env = env.decr_indent();
        if self.body.is_empty() {
            (env, format!("{indent}{label}"))
        } else {
            (env, format!("{indent}{label}\n{body}"))
        }
    }
}

impl PrettyPrint for Param {
    fn pprint(&self, env: PrettyPrintEnv) -> (PrettyPrintEnv, String) {
        let qual = match self.qual {
            ParamQual::In => "",
            ParamQual::Out => "out ",
            ParamQual::InOut => "inout ",
        };
        let (base, dims) = split_decl_type(&self.ty);
        let (env, id) = self.id.pprint(env);
        (env, format!("{qual}{base} {id}{dims}"))
    }
}

impl PrettyPrint for Field {
    fn pprint(&self, env: PrettyPrintEnv) -> (PrettyPrintEnv, String) {
        let indent = env.print_indent();
        let (base, dims) = split_decl_type(&self.ty);
        let (env, id) = self.id.pprint(env);
        (env, format!("{indent}{base} {id}{dims};"))
    }
}

fn binding_layout(prefix: &str, binding: &Option<usize>) -> String {
    match binding {
        Some(slot) if prefix.is_empty() => format!("layout(binding={slot}) "),
        Some(slot) => format!("layout({prefix}, binding={slot}) "),
        None if prefix.is_empty() => String::new(),
        None => format!("layout({prefix}) "),
    }
}

fn image_format(base: DataType) -> &'static str {
    match base.base() {
        DataType::Int => "rgba32i",
        DataType::UInt => "rgba32ui",
        _ => "rgba32f",
    }
}

fn interp_qualifiers(interp: &[InterpModifier]) -> String {
    interp.iter()
        .filter_map(|m| match m {
            InterpModifier::NoInterpolation => Some("flat "),
            InterpModifier::NoPerspective => Some("noperspective "),
            InterpModifier::Centroid => Some("centroid "),
            InterpModifier::Sample => Some("sample "),
            InterpModifier::Linear => None,
        })
        .collect()
}

impl PrettyPrint for Top {
    fn pprint(&self, env: PrettyPrintEnv) -> (PrettyPrintEnv, String) {
        match self {
            Top::UniformBlock {binding, id, fields, ..} => {
                let layout = binding_layout("std140", binding);
                let (env, id) = id.pprint(env);
                let env = env.incr_indent();
                let (env, fields) = pprint_iter(fields.iter(), env, "\n");
                let env = env.decr_indent();
                (env, format!("{layout}uniform {id} {{\n{fields}\n}};"))
            },
            Top::StorageBlock {binding, readonly, id, elem_ty, field_id, ..} => {
                let layout = binding_layout("std430", binding);
                let qual = if *readonly { "readonly " } else { "" };
                let (env, id) = id.pprint(env);
                let (env, field_id) = field_id.pprint(env);
                let elem = type_name(elem_ty);
                let env = env.incr_indent();
                let member_indent = env.print_indent();
                let env = env.decr_indent();
                (env, format!(
                    "{layout}{qual}buffer {id} {{\n{member_indent}{elem} {field_id}[];\n}};"
                ))
            },
            Top::UniformSampler {binding, ty, id, ..} => {
                let layout = binding_layout("", binding);
                let (env, id) = id.pprint(env);
                (env, format!("{layout}uniform {0} {id};", type_name(ty)))
            },
            Top::UniformImage {binding, ty, id, ..} => {
                let base = match ty {
                    Type::Image {base, ..} => *base,
                    _ => DataType::Float,
                };
                let layout = match binding {
                    Some(slot) => {
                        format!("layout({0}, binding={slot}) ", image_format(base))
                    },
                    None => format!("layout({0}) ", image_format(base)),
                };
                let (env, id) = id.pprint(env);
                (env, format!("{layout}uniform {0} {id};", type_name(ty)))
            },
            Top::UniformVar {ty, id, ..} => {
                let (base, dims) = split_decl_type(ty);
                let (env, id) = id.pprint(env);
                (env, format!("uniform {base} {id}{dims};"))
            },
            Top::GlobalIn {location, interp, ty, id, ..} => {
                let layout = match location {
                    Some(n) => format!("layout(location={n}) "),
                    None => String::new(),
                };
                let interp = interp_qualifiers(interp);
                let (env, id) = id.pprint(env);
                (env, format!("{layout}{interp}in {0} {id};", type_name(ty)))
            },
            Top::GlobalOut {location, ty, id, ..} => {
                let layout = match location {
                    Some(n) => format!("layout(location={n}) "),
                    None => String::new(),
                };
                let (env, id) = id.pprint(env);
                (env, format!("{layout}out {0} {id};", type_name(ty)))
            },
            Top::InterfaceBlock {dir, name, alias, fields, ..} => {
                let dir = match dir {
                    BlockDir::In => "in",
                    BlockDir::Out => "out",
                };
                let (env, name) = name.pprint(env);
                let (env, alias) = alias.pprint(env);
                let env = env.incr_indent();
                let (env, fields) = pprint_iter(fields.iter(), env, "\n");
                let env = env.decr_indent();
                (env, format!("{dir} {name} {{\n{fields}\n}} {alias};"))
            },
            Top::StructDef {id, fields, ..} => {
                let (env, id) = id.pprint(env);
                let env = env.incr_indent();
                let (env, fields) = pprint_iter(fields.iter(), env, "\n");
                let env = env.decr_indent();
                if fields.is_empty() {
                    (env, format!("struct {id} {{\n}};"))
                } else {
                    (env, format!("struct {id} {{\n{fields}\n}};"))
                }
            },
            Top::GlobalVar {is_const, ty, id, init, ..} => {
                let prefix = if *is_const { "const " } else { "" };
                let (base, dims) = split_decl_type(ty);
                let (env, id) = id.pprint(env);
                match init {
                    Some(e) => {
                        let (env, e) = e.pprint(env);
                        (env, format!("{prefix}{base} {id}{dims} = {e};"))
                    },
                    None => (env, format!("{prefix}{base} {id}{dims};")),
                }
            },
            Top::FunDef {ret, id, params, body, ..} => {
                let (env, id) = id.pprint(env);
                let (env, params) = pprint_iter(params.iter(), env, ", ");
                let env = env.incr_indent();
                let (env, body_str) = pprint_iter(body.iter(), env, "\n");
                let env = env.decr_indent();
                let ret = type_name(ret);
                if body.is_empty() {
                    (env, format!("{ret} {id}({params}) {{\n}}"))
                } else {
                    (env, format!("{ret} {id}({params}) {{\n{body_str}\n}}"))
                }
            },
        }
    }
}

impl PrettyPrint for LayoutDecl {
    fn pprint(&self, env: PrettyPrintEnv) -> (PrettyPrintEnv, String) {
        let s = match self {
            LayoutDecl::LocalSize {x, y, z} => format!(
                "layout(local_size_x={x}, local_size_y={y}, local_size_z={z}) in;"
            ),
            LayoutDecl::EarlyFragmentTests => {
                "layout(early_fragment_tests) in;".to_string()
            },
            LayoutDecl::TessControlOut {vertices} => {
                format!("layout(vertices={vertices}) out;")
            },
            LayoutDecl::TessEvaluationIn {domain, partitioning, topology} => {
                format!("layout({domain}, {partitioning}, {topology}) in;")
            },
            LayoutDecl::GeometryIn {primitive} => format!("layout({primitive}) in;"),
            LayoutDecl::GeometryOut {topology, max_vertices} => {
                format!("layout({topology}, max_vertices={max_vertices}) out;")
            },
        };
        (env, s)
    }
}

impl PrettyPrint for Helper {
    fn pprint(&self, env: PrettyPrintEnv) -> (PrettyPrintEnv, String) {
        match self {
            Helper::Clip => {
                let mut parts = vec![
                    "void clip(float x) {\n    if (x < 0.0) {\n        discard;\n    \
                     }\n}".to_string(),
                ];
                for dim in 2..=4 {
                    let ty = data_type_name(
                        crate::utils::data_type::vector_data_type(DataType::Float, dim)
                            .unwrap()
                    );
                    parts.push(format!(
                        "void clip({ty} x) {{\n    if (any(lessThan(x, {ty}(0.0)))) \
                         {{\n        discard;\n    }}\n}}"
                    ));
                }
                (env, parts.join("\n\n"))
            },
        }
    }
}

impl PrettyPrint for Program {
    fn pprint(&self, env: PrettyPrintEnv) -> (PrettyPrintEnv, String) {
        let env = RESERVED_BUILTINS.iter()
            .fold(env, |env, name| env.reserve_string(name));
        let env = env.reserve_string("main");

        let mut sections = vec![];
        let mut head = format!("// {0}\n#version {1}", self.header, self.version);
        for ext in &self.extensions {
            head.push_str(&format!("\n#extension {ext} : enable"));
        }
        let (env, layout_strs) = pprint_iter(self.layout_decls.iter(), env, "\n");
        if !layout_strs.is_empty() {
            sections.push(layout_strs);
        }
        let (env, helper_strs) = pprint_iter(self.helpers.iter(), env, "\n\n");
        if !helper_strs.is_empty() {
            sections.push(helper_strs);
        }
        let (env, tops) = self.tops.iter()
            .fold((env, vec![]), |(env, mut strs), t| {
                let (env, s) = t.pprint(env);
                if self.line_markers && t.get_info().start_line() > 0 {
                    strs.push(format!("#line {0}\n{s}", t.get_info().start_line()));
                } else {
                    strs.push(s);
                }
                (env, strs)
            });
        sections.extend(tops);

        // The version directive hugs the header comment; every later section is separated by
        // one blank line.
        let rest = sections.join("\n\n");
        let text = if rest.is_empty() {
            format!("{head}\n")
        } else {
            format!("{head}\n\n{rest}\n")
        };
        (env, text)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::glsl::ast_builder::*;
    use crate::utils::name::Name;

    #[test]
    fn binary_operators_get_single_spaces() {
        let e = binop(
            var("a", scalar(DataType::Float)),
            BinOp::Add,
            var("b", scalar(DataType::Float)),
        );
        assert_eq!(e.pprint_default(), "a + b");
    }

    #[test]
    fn precedence_parenthesization() {
        let sum = binop(
            var("a", scalar(DataType::Float)),
            BinOp::Add,
            var("b", scalar(DataType::Float)),
        );
        let e = binop(sum, BinOp::Mul, var("c", scalar(DataType::Float)));
        assert_eq!(e.pprint_default(), "(a + b) * c");
    }

    #[test]
    fn paren_node_forces_grouping() {
        let prod = binop(
            var("M", scalar(DataType::Float4x4)),
            BinOp::Mul,
            var("v", scalar(DataType::Float4)),
        );
        let e = Expr::Paren {
            ty: scalar(DataType::Float4),
            i: crate::utils::info::Info::default(),
            e: Box::new(prod),
        };
        assert_eq!(e.pprint_default(), "(M * v)");
    }

    #[test]
    fn declaration_with_array_dims() {
        let s = decl(
            Type::Array {elem: Box::new(scalar(DataType::Float)), dims: vec![4]},
            "weights",
            Expr::Ctor {
                to: Type::Array {
                    elem: Box::new(scalar(DataType::Float)),
                    dims: vec![4],
                },
                args: vec![float("0.0"), float("1.0"), float("2.0"), float("3.0")],
                ty: scalar(DataType::Float),
                i: crate::utils::info::Info::default(),
            },
        );
        assert_eq!(
            s.pprint_default(),
            "float weights[4] = float[4](0.0, 1.0, 2.0, 3.0);"
        );
    }

    #[test]
    fn function_layout() {
        let body = vec![expr_stmt(assign(
            var("gl_Position", scalar(DataType::Float4)),
            var("v_POSITION0", scalar(DataType::Float4)),
        ))];
        let f = fun(Type::Void, "main", vec![], body);
        let p = program(vec![f]);
        let text = p.pprint_default();
        assert!(text.starts_with("// vertex shader\n#version 330\n\n"));
        assert!(text.contains("void main() {\n    gl_Position = v_POSITION0;\n}"));
    }

    #[test]
    fn uniform_block_layout_precedes_storage_qualifier() {
        let block = Top::UniformBlock {
            binding: Some(2),
            id: Name::new("Camera".to_string()),
            fields: vec![Field {
                ty: scalar(DataType::Float4x4),
                id: Name::new("viewProj".to_string()),
                i: crate::utils::info::Info::default(),
            }],
            i: crate::utils::info::Info::default(),
        };
        let p = program(vec![block]);
        let text = p.pprint_default();
        assert!(text.contains(
            "layout(std140, binding=2) uniform Camera {\n    mat4 viewProj;\n};"
        ));
    }

    #[test]
    fn local_size_layout_line() {
        let mut p = program(vec![]);
        p.layout_decls.push(LayoutDecl::LocalSize {x: 8, y: 8, z: 1});
        let text = p.pprint_default();
        assert!(text.contains(
            "layout(local_size_x=8, local_size_y=8, local_size_z=1) in;"
        ));
    }

    #[test]
    fn clip_helper_is_emitted_once() {
        let mut p = program(vec![]);
        p.helpers.push(Helper::Clip);
        let text = p.pprint_default();
        assert!(text.contains("void clip(float x)"));
        assert!(text.contains("void clip(vec4 x)"));
        assert_eq!(text.matches("void clip(vec2 x)").count(), 1);
    }

    #[test]
    fn else_if_chains_flatten() {
        let s = Stmt::If {
            cond: var("a", scalar(DataType::Bool)),
            thn: vec![expr_stmt(assign(
                var("x", scalar(DataType::Float)),
                float("1.0"),
            ))],
            els: vec![Stmt::If {
                cond: var("b", scalar(DataType::Bool)),
                thn: vec![expr_stmt(assign(
                    var("x", scalar(DataType::Float)),
                    float("2.0"),
                ))],
                els: vec![],
                i: crate::utils::info::Info::default(),
            }],
            i: crate::utils::info::Info::default(),
        };
        let text = s.pprint_default();
        assert!(text.contains("} else if (b) {"));
    }
}
