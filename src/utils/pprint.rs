use crate::utils::ast::{ExprType, BinOp, UnOp};
use crate::utils::name::Name;

use itertools::Itertools;
use rand::distributions::{Alphanumeric, DistString};

use std::collections::{BTreeMap, BTreeSet};
use std::cmp::Ordering;

pub const DEFAULT_INDENT: usize = 4;

#[derive(Debug)]
pub struct PrettyPrintEnv {
    strs: BTreeSet<String>,
    vars: BTreeMap<Name, String>,
    indent: usize,
    indent_increment: usize,
}

impl PrettyPrintEnv {
    pub fn new() -> Self {
        PrettyPrintEnv::default()
    }

    pub fn with_indent_size(indent_increment: usize) -> Self {
        PrettyPrintEnv {indent_increment, ..PrettyPrintEnv::default()}
    }

    pub fn incr_indent(self) -> Self {
        let indent = self.indent + self.indent_increment;
        PrettyPrintEnv {indent, ..self}
    }

    pub fn decr_indent(self) -> Self {
        let indent = self.indent - self.indent_increment;
        PrettyPrintEnv {indent, ..self}
    }

    pub fn print_indent(&self) -> String {
        " ".repeat(self.indent)
    }

    // Claims an identifier that must keep its exact spelling in the output (target built-ins,
    // interface names, the entry point). Unsymbolized names equal to it print verbatim;
    // symbolized locals that would collide get renamed.
    pub fn reserve_string(mut self, s: &str) -> Self {
        self.strs.insert(s.to_string());
        self.vars.insert(Name::new(s.to_string()), s.to_string());
        self
    }
}

impl Default for PrettyPrintEnv {
    fn default() -> PrettyPrintEnv {
        PrettyPrintEnv {
            strs: BTreeSet::new(),
            vars: BTreeMap::new(),
            indent: 0,
            indent_increment: DEFAULT_INDENT,
        }
    }
}

pub trait PrettyPrint {
    fn pprint(&self, env: PrettyPrintEnv) -> (PrettyPrintEnv, String);

    fn pprint_default(&self) -> String {
        let (_, s) = self.pprint(PrettyPrintEnv::new());
        s
    }
}

fn rand_alphanum(n: usize) -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), n)
}

fn alloc_free_string(mut env: PrettyPrintEnv, id: &Name) -> (PrettyPrintEnv, String) {
    let mut s = id.get_str().clone();
    if env.strs.contains(&s) {
        s = id.print_with_sym();
        while env.strs.contains(&s) {
            s = format!("{0}_{1}", id.get_str(), rand_alphanum(5));
        }
    }
    env.strs.insert(s.clone());
    env.vars.insert(id.clone(), s.clone());
    (env, s)
}

impl PrettyPrint for Name {
    fn pprint(&self, env: PrettyPrintEnv) -> (PrettyPrintEnv, String) {
        if let Some(s) = env.vars.get(self) {
            let s = s.clone();
            (env, s)
        } else {
            alloc_free_string(env, self)
        }
    }
}

pub fn pprint_iter<'a, T: PrettyPrint + 'a, I: Iterator<Item=&'a T>>(
    it: I,
    env: PrettyPrintEnv,
    separator: &str
) -> (PrettyPrintEnv, String) {
    let (env, strs) = it.fold((env, vec![]), |(env, mut strs), v| {
            let (env, v) = v.pprint(env);
            strs.push(v);
            (env, strs)
        });
    (env, strs.into_iter().join(separator))
}

fn parenthesize_if_predicate(
    inner_op_opt: Option<BinOp>,
    outer_op: &BinOp,
    s: String,
    p: impl Fn(Ordering) -> bool
) -> String {
    match inner_op_opt {
        Some(inner_op) if p(BinOp::precedence(&inner_op, outer_op)) => {
            format!("({s})")
        },
        _ => s
    }
}

pub fn parenthesize_if_lt_precedence(
    inner_op_opt: Option<BinOp>,
    outer_op: &BinOp,
    s: String
) -> String {
    parenthesize_if_predicate(inner_op_opt, outer_op, s, |p| p == Ordering::Less)
}

pub fn parenthesize_if_le_precedence(
    inner_op_opt: Option<BinOp>,
    outer_op: &BinOp,
    s: String
) -> String {
    parenthesize_if_predicate(inner_op_opt, outer_op, s, |p| p != Ordering::Greater)
}

pub trait PrettyPrintUnOp<T>: PrettyPrint + ExprType<T> + Sized {
    fn extract_unop<'a>(&'a self) -> Option<(&'a UnOp, &'a Self)>;
    fn print_unop(op: &UnOp) -> String;

    fn print_parenthesized_unop(&self, env: PrettyPrintEnv) -> (PrettyPrintEnv, String) {
        let (op, arg) = self.extract_unop().unwrap();
        let op_str = Self::print_unop(op);
        let (env, arg_str) = arg.pprint(env);
        if arg.is_leaf_node() {
            (env, format!("{op_str}{arg_str}"))
        } else {
            (env, format!("{op_str}({arg_str})"))
        }
    }
}

pub enum Assoc { Left, Right }

pub trait PrettyPrintBinOp<T>: PrettyPrint + ExprType<T> + Sized {
    fn extract_binop<'a>(&'a self) -> Option<(&'a Self, &'a BinOp, &'a Self, &'a T)>;
    fn is_infix(op: &BinOp, argty: &T) -> bool;
    fn print_binop(op: &BinOp, argty: &T) -> String;
    fn associativity(op: &BinOp) -> Assoc;

    fn try_get_binop<'a>(&'a self) -> Option<BinOp> {
        if let Some((_, op, _, _)) = self.extract_binop() {
            Some(op.clone())
        } else {
            None
        }
    }

    fn print_parenthesized_binop(&self, env: PrettyPrintEnv) -> (PrettyPrintEnv, String) {
        let (lhs, op, rhs, _) = self.extract_binop().unwrap();
        let argty = lhs.get_type();
        let (env, lhs_str) = lhs.pprint(env);
        let op_str = Self::print_binop(op, argty);
        let (env, rhs_str) = rhs.pprint(env);
        if Self::is_infix(op, argty) {
            let lhs_op = lhs.try_get_binop();
            let rhs_op = rhs.try_get_binop();
            let (lstr, rstr) = match Self::associativity(op) {
                Assoc::Left => {
                    ( parenthesize_if_lt_precedence(lhs_op, op, lhs_str)
                    , parenthesize_if_le_precedence(rhs_op, op, rhs_str) )
                },
                Assoc::Right => {
                    ( parenthesize_if_le_precedence(lhs_op, op, lhs_str)
                    , parenthesize_if_lt_precedence(rhs_op, op, rhs_str) )
                }
            };
            (env, format!("{lstr} {op_str} {rstr}"))
        } else {
            (env, format!("{op_str}({lhs_str}, {rhs_str})"))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn root_indent_is_empty() {
        let env = PrettyPrintEnv::new();
        assert_eq!(env.print_indent(), "");
    }

    #[test]
    fn incr_indent_uses_increment() {
        let env = PrettyPrintEnv::with_indent_size(2).incr_indent();
        assert_eq!(env.print_indent(), "  ");
    }

    #[test]
    fn incr_decr_indent_balances() {
        let env = PrettyPrintEnv::new().incr_indent().incr_indent().decr_indent();
        assert_eq!(env.print_indent(), " ".repeat(DEFAULT_INDENT));
    }

    #[test]
    fn distinct_names_get_distinct_strings() {
        let n1 = Name::sym_str("tmp");
        let n2 = n1.clone().with_new_sym();
        let (env, s1) = n1.pprint(PrettyPrintEnv::new());
        let (env, s2) = n2.pprint(env);
        assert!(s1 != s2);
        let (_, s3) = n2.pprint(env);
        assert_eq!(s2, s3);
    }

    #[test]
    fn reserved_strings_are_avoided() {
        let env = PrettyPrintEnv::new().reserve_string("gl_Position");
        let n = Name::sym_str("gl_Position");
        let (_, s) = n.pprint(env);
        assert!(s != "gl_Position");
    }

    #[test]
    fn parenthesizes_lower_precedence_operand() {
        let s = "a + b".to_string();
        let s = parenthesize_if_lt_precedence(Some(BinOp::Add), &BinOp::Mul, s);
        assert_eq!(s, "(a + b)");
    }

    #[test]
    fn equal_precedence_right_operand_parenthesized() {
        let s = "a - b".to_string();
        let s = parenthesize_if_le_precedence(Some(BinOp::Sub), &BinOp::Sub, s);
        assert_eq!(s, "(a - b)");
    }
}
