use std::sync::atomic;
use std::cmp;
use std::fmt;
use std::hash;

pub type Sym = i64;

static COUNTER: atomic::AtomicI64 = atomic::AtomicI64::new(0);

fn gensym() -> Sym {
    COUNTER.fetch_add(1, atomic::Ordering::Relaxed)
}

// An identifier paired with an optional unique symbol. Symbolization gives every declaration its
// own symbol; two names with symbols compare by symbol alone, so shadowed identifiers stay
// distinct through the remaining passes.
#[derive(Clone, Debug)]
pub struct Name {
    s: String,
    sym: Option<Sym>,
}

impl Name {
    pub fn new(s: String) -> Name {
        Name {s, sym: None}
    }

    pub fn sym_str(s: &str) -> Name {
        Name::new(s.to_string()).with_new_sym()
    }

    pub fn with_new_sym(self) -> Name {
        let Name {s, ..} = self;
        let sym = Some(gensym());
        Name {s, sym}
    }

    pub fn has_sym(&self) -> bool {
        self.sym.is_some()
    }

    pub fn get_str<'a>(&'a self) -> &'a String {
        &self.s
    }

    pub fn print_with_sym(&self) -> String {
        if let Some(sym) = self.sym {
            format!("{0}_{1}", self.s, sym)
        } else {
            self.s.clone()
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{0}", self.s)
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        match (self.sym, other.sym) {
            (Some(l), Some(r)) => l.cmp(&r),
            (Some(_), None) => cmp::Ordering::Greater,
            (None, Some(_)) => cmp::Ordering::Less,
            (None, None) => self.s.cmp(&other.s),
        }
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        match (self.sym, other.sym) {
            (Some(l), Some(r)) => l.eq(&r),
            (None, None) => self.s.eq(&other.s),
            _ => false,
        }
    }
}

impl Eq for Name {}

impl hash::Hash for Name {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        match self.sym {
            Some(sym) => sym.hash(state),
            None => self.s.hash(state),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_symbols_are_distinct() {
        let a = Name::sym_str("x");
        let b = Name::sym_str("x");
        assert!(a != b);
        assert_eq!(a.get_str(), b.get_str());
    }

    #[test]
    fn unsymbolized_names_compare_by_string() {
        let a = Name::new("uv".to_string());
        let b = Name::new("uv".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn with_new_sym_keeps_string() {
        let a = Name::new("color".to_string()).with_new_sym();
        assert!(a.has_sym());
        assert_eq!(a.get_str(), "color");
        assert!(a.print_with_sym().starts_with("color_"));
    }
}
