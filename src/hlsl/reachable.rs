use super::ast::*;
use crate::scx_semantic_error;
use crate::utils::err::*;
use crate::utils::info::Info;
use crate::utils::name::Name;
use crate::utils::smap::*;

use std::collections::{BTreeMap, BTreeSet};

// The analyzed program: declarations in source order with unreachable functions removed, plus
// the table of intrinsics the reachable code uses keyed by argument base types. Non-function
// declarations are the shader's resource interface and stay regardless of reachability.
#[derive(Debug)]
pub struct Program {
    pub tops: Ast,
    pub entry: Name,
    pub patch_entry: Option<Name>,
    pub used_intrinsics: BTreeMap<Intrinsic, BTreeSet<Vec<DataType>>>,
}

// Reachability from the entry point. Functions never called from the entry point (or the
// patch-constant function, for tessellation control shaders) are removed, statements following an
// unconditional control transfer are dropped, and every intrinsic call that survives is recorded
// with the base types of its arguments.
pub fn analyze(
    ast: Ast,
    entry_name: &str,
    patch_entry_name: Option<&str>
) -> CompileResult<Program> {
    let entry = find_entry(&ast, entry_name)?;
    let patch_entry = match patch_entry_name.or_else(|| patch_attr_name(&ast, &entry)) {
        Some(name) => Some(find_entry(&ast, name)?),
        None => None,
    };

    let mut reachable = BTreeSet::new();
    let mut work = vec![entry.clone()];
    if let Some(p) = &patch_entry {
        work.push(p.clone());
    }
    while let Some(id) = work.pop() {
        if !reachable.insert(id.clone()) {
            continue;
        }
        if let Some(body) = fun_body(&ast, &id) {
            let called = body.sfold(BTreeSet::new(), collect_calls_stmt);
            work.extend(called.into_iter());
        }
    }

    let tops = ast.into_iter()
        .filter(|t| match t {
            Top::FunDef {id, ..} => reachable.contains(id),
            _ => true,
        })
        .map(strip_dead_top)
        .collect::<Ast>();

    let used_intrinsics = tops.iter()
        .fold(BTreeMap::new(), |acc, t| match t {
            Top::FunDef {body: Some(body), ..} => {
                body.sfold(acc, collect_intrinsics_stmt)
            },
            _ => acc,
        });

    Ok(Program {tops, entry, patch_entry, used_intrinsics})
}

fn find_entry<'a>(ast: &'a Ast, name: &str) -> CompileResult<Name> {
    let mut found: Option<(&Name, &Info)> = None;
    for t in ast {
        if let Top::FunDef {id, body: Some(_), i, ..} = t {
            if id.get_str() == name {
                if let Some((prev, _)) = found {
                    if prev != id {
                        return scx_semantic_error!(
                            i, "Multiple entry point candidates named '{name}'"
                        );
                    }
                }
                found = Some((id, i));
            }
        }
    }
    match found {
        Some((id, _)) => Ok(id.clone()),
        None => {
            let i = Info::default();
            scx_semantic_error!(i, "Entry point '{name}' was not found")
        },
    }
}

fn patch_attr_name<'a>(ast: &'a Ast, entry: &Name) -> Option<&'a str> {
    for t in ast {
        if let Top::FunDef {id, attrs, ..} = t {
            if id == entry {
                for a in attrs {
                    if a.id == "patchconstantfunc" {
                        if let Some(Expr::StringLit {v, ..}) = a.args.first() {
                            return Some(v.as_str());
                        }
                    }
                }
            }
        }
    }
    None
}

fn fun_body<'a>(ast: &'a Ast, id: &Name) -> Option<&'a Vec<Stmt>> {
    ast.iter().find_map(|t| match t {
        Top::FunDef {id: fid, body: Some(body), ..} if fid == id => Some(body),
        _ => None,
    })
}

fn collect_calls_expr(acc: BTreeSet<Name>, e: &Expr) -> BTreeSet<Name> {
    let acc = match e {
        Expr::Call {id, ..} => {
            let mut acc = acc;
            acc.insert(id.clone());
            acc
        },
        _ => acc,
    };
    e.sfold(acc, collect_calls_expr)
}

fn collect_calls_stmt(acc: BTreeSet<Name>, s: &Stmt) -> BTreeSet<Name> {
    let acc = SFold::<Expr>::sfold(s, acc, collect_calls_expr);
    SFold::<Stmt>::sfold(s, acc, collect_calls_stmt)
}

type IntrinsicTable = BTreeMap<Intrinsic, BTreeSet<Vec<DataType>>>;

fn collect_intrinsics_expr(acc: IntrinsicTable, e: &Expr) -> IntrinsicTable {
    let acc = match e {
        Expr::Intrinsic {func, args, ..} => {
            let mut acc = acc;
            let sig = args.iter()
                .filter_map(|a| match a.get_type() {
                    Type::Data(t) => Some(t.base()),
                    _ => None,
                })
                .collect::<Vec<DataType>>();
            acc.entry(*func).or_default().insert(sig);
            acc
        },
        _ => acc,
    };
    e.sfold(acc, collect_intrinsics_expr)
}

fn collect_intrinsics_stmt(acc: IntrinsicTable, s: &Stmt) -> IntrinsicTable {
    let acc = SFold::<Expr>::sfold(s, acc, collect_intrinsics_expr);
    SFold::<Stmt>::sfold(s, acc, collect_intrinsics_stmt)
}

fn is_terminator(s: &Stmt) -> bool {
    match s {
        Stmt::Return {..} | Stmt::Discard {..} | Stmt::Break {..} |
        Stmt::Continue {..} => true,
        _ => false,
    }
}

fn strip_dead_top(t: Top) -> Top {
    match t {
        Top::FunDef {attrs, ret, id, params, ret_semantic, body, i} => {
            let body = body.map(strip_dead_stmts_deep);
            Top::FunDef {attrs, ret, id, params, ret_semantic, body, i}
        },
        _ => t,
    }
}

// Truncates a statement list after the first unconditional control transfer and recurses into
// nested blocks.
fn strip_dead_stmts_deep(stmts: Vec<Stmt>) -> Vec<Stmt> {
    let mut out = vec![];
    for s in stmts {
        let done = is_terminator(&s);
        out.push(strip_dead_children(s));
        if done {
            break;
        }
    }
    out
}

fn strip_dead_children(s: Stmt) -> Stmt {
    match s {
        Stmt::Block {body, i} => Stmt::Block {body: strip_dead_stmts_deep(body), i},
        Stmt::If {cond, thn, els, i} => Stmt::If {
            cond,
            thn: strip_dead_stmts_deep(thn),
            els: strip_dead_stmts_deep(els),
            i,
        },
        Stmt::While {cond, body, attrs, i} => Stmt::While {
            cond, body: strip_dead_stmts_deep(body), attrs, i,
        },
        Stmt::DoWhile {body, cond, i} => Stmt::DoWhile {
            body: strip_dead_stmts_deep(body), cond, i,
        },
        Stmt::For {init, cond, incr, body, attrs, i} => Stmt::For {
            init, cond, incr, body: strip_dead_stmts_deep(body), attrs, i,
        },
        Stmt::Switch {cond, cases, i} => Stmt::Switch {
            cond,
            cases: cases.into_iter()
                .map(|SwitchCase {value, body, i}| SwitchCase {
                    value, body: strip_dead_stmts_deep(body), i,
                })
                .collect(),
            i,
        },
        s => s,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hlsl::{lexer, parser, symbolize, type_check};

    fn analyze_str(src: &str, entry: &str) -> CompileResult<Program> {
        let ast = type_check::type_check(symbolize::symbolize(parser::parse(
            lexer::tokenize(src, "test.hlsl")?
        )?)?)?;
        analyze(ast, entry, None)
    }

    fn fun_count(p: &Program) -> usize {
        p.tops.iter()
            .filter(|t| matches!(t, Top::FunDef {..}))
            .count()
    }

    #[test]
    fn unreachable_function_is_removed() {
        let p = analyze_str(
            "float used(float x) { return x; }\n\
             float unused(float x) { return sqrt(x); }\n\
             float4 main(float4 v : POSITION) : SV_POSITION { return v * used(2.0f); }",
            "main"
        ).unwrap();
        assert_eq!(fun_count(&p), 2);
        assert!(p.used_intrinsics.is_empty());
    }

    #[test]
    fn transitive_calls_are_reachable() {
        let p = analyze_str(
            "float a(float x) { return x; }\n\
             float b(float x) { return a(x); }\n\
             float4 main(float4 v : POSITION) : SV_POSITION { return v * b(1.0f); }",
            "main"
        ).unwrap();
        assert_eq!(fun_count(&p), 3);
    }

    #[test]
    fn missing_entry_point_is_semantic_error() {
        let r = analyze_str("float f() { return 1.0f; }", "main");
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Semantic);
    }

    #[test]
    fn used_intrinsics_record_argument_base_types() {
        let p = analyze_str(
            "float4 main(float4 v : POSITION) : SV_POSITION {\n\
                 return normalize(v) * dot(v.xyz, v.xyz);\n\
             }",
            "main"
        ).unwrap();
        let norm = p.used_intrinsics.get(&Intrinsic::Normalize).unwrap();
        assert!(norm.contains(&vec![DataType::Float]));
        let dot = p.used_intrinsics.get(&Intrinsic::Dot).unwrap();
        assert!(dot.contains(&vec![DataType::Float, DataType::Float]));
    }

    #[test]
    fn statements_after_return_are_dropped() {
        let p = analyze_str(
            "float4 main(float4 v : POSITION) : SV_POSITION {\n\
                 return v;\n\
                 v = v * 2.0f;\n\
             }",
            "main"
        ).unwrap();
        match &p.tops[0] {
            Top::FunDef {body: Some(b), ..} => assert_eq!(b.len(), 1),
            t => panic!("unexpected top {t:?}"),
        }
    }

    #[test]
    fn dead_code_in_nested_blocks_is_dropped() {
        let p = analyze_str(
            "float f(float x) {\n\
                 if (x > 0.0f) { return x; x = 1.0f; }\n\
                 return 0.0f;\n\
             }\n\
             float4 main(float4 v : POSITION) : SV_POSITION { return v * f(1.0f); }",
            "main"
        ).unwrap();
        match &p.tops[0] {
            Top::FunDef {body: Some(b), ..} => match &b[0] {
                Stmt::If {thn, ..} => assert_eq!(thn.len(), 1),
                s => panic!("unexpected statement {s:?}"),
            },
            t => panic!("unexpected top {t:?}"),
        }
    }

    #[test]
    fn intrinsics_in_unreachable_code_are_not_recorded() {
        let p = analyze_str(
            "float unused(float x) { return rsqrt(x); }\n\
             float4 main(float4 v : POSITION) : SV_POSITION { return v; }",
            "main"
        ).unwrap();
        assert!(!p.used_intrinsics.contains_key(&Intrinsic::Rsqrt));
    }
}
