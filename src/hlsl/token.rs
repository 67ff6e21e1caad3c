use crate::utils::data_type::{DataType, matrix_data_type, vector_data_type};
use crate::utils::info::{Info, InfoNode};

use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub i: Info,
}

impl Token {
    pub fn new(kind: TokenKind, i: Info) -> Token {
        Token {kind, i}
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl InfoNode for Token {
    fn get_info(&self) -> Info {
        self.i.clone()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Declaration and control-flow keywords.
    Break, Case, CBuffer, Const, Continue, Default, Discard, Do, Else, For,
    If, In, InOut, Out, Register, Return, Struct, Switch, TBuffer, Typedef,
    Void, While,

    // Storage classes, interpolation and type modifiers. These are carried through to the
    // declaration parser as-is.
    Extern, Precise, Shared, Static, Uniform, Volatile,
    Linear, Centroid, NoInterpolation, NoPerspective, Sample,
    RowMajor, ColumnMajor, SNorm, UNorm,
    PackOffset,

    Ident(String),
    IntLit(String),
    FloatLit(String),
    BoolLit(bool),
    StringLit(String),

    LParen, RParen, LBrace, RBrace, LBracket, RBracket,
    Comma, Semicolon, Colon, Dot, Question,

    Assign, AddAssign, SubAssign, MulAssign, DivAssign, RemAssign,
    AndAssign, OrAssign, XorAssign, ShlAssign, ShrAssign,

    Plus, Minus, Star, Slash, Percent,
    AmpAmp, PipePipe, Amp, Pipe, Caret, Shl, Shr,
    EqEq, NotEq, Lt, Gt, Leq, Geq,
    Not, Tilde, Inc, Dec,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "identifier '{s}'"),
            TokenKind::IntLit(s) => write!(f, "integer literal '{s}'"),
            TokenKind::FloatLit(s) => write!(f, "float literal '{s}'"),
            TokenKind::BoolLit(v) => write!(f, "boolean literal '{v}'"),
            TokenKind::StringLit(_) => write!(f, "string literal"),
            TokenKind::Eof => write!(f, "end of input"),
            t => write!(f, "'{0}'", spell(t)),
        }
    }
}

fn spell(t: &TokenKind) -> &'static str {
    match t {
        TokenKind::Break => "break",
        TokenKind::Case => "case",
        TokenKind::CBuffer => "cbuffer",
        TokenKind::Const => "const",
        TokenKind::Continue => "continue",
        TokenKind::Default => "default",
        TokenKind::Discard => "discard",
        TokenKind::Do => "do",
        TokenKind::Else => "else",
        TokenKind::For => "for",
        TokenKind::If => "if",
        TokenKind::In => "in",
        TokenKind::InOut => "inout",
        TokenKind::Out => "out",
        TokenKind::Register => "register",
        TokenKind::Return => "return",
        TokenKind::Struct => "struct",
        TokenKind::Switch => "switch",
        TokenKind::TBuffer => "tbuffer",
        TokenKind::Typedef => "typedef",
        TokenKind::Void => "void",
        TokenKind::While => "while",
        TokenKind::Extern => "extern",
        TokenKind::Precise => "precise",
        TokenKind::Shared => "shared",
        TokenKind::Static => "static",
        TokenKind::Uniform => "uniform",
        TokenKind::Volatile => "volatile",
        TokenKind::Linear => "linear",
        TokenKind::Centroid => "centroid",
        TokenKind::NoInterpolation => "nointerpolation",
        TokenKind::NoPerspective => "noperspective",
        TokenKind::Sample => "sample",
        TokenKind::RowMajor => "row_major",
        TokenKind::ColumnMajor => "column_major",
        TokenKind::SNorm => "snorm",
        TokenKind::UNorm => "unorm",
        TokenKind::PackOffset => "packoffset",
        TokenKind::LParen => "(",
        TokenKind::RParen => ")",
        TokenKind::LBrace => "{",
        TokenKind::RBrace => "}",
        TokenKind::LBracket => "[",
        TokenKind::RBracket => "]",
        TokenKind::Comma => ",",
        TokenKind::Semicolon => ";",
        TokenKind::Colon => ":",
        TokenKind::Dot => ".",
        TokenKind::Question => "?",
        TokenKind::Assign => "=",
        TokenKind::AddAssign => "+=",
        TokenKind::SubAssign => "-=",
        TokenKind::MulAssign => "*=",
        TokenKind::DivAssign => "/=",
        TokenKind::RemAssign => "%=",
        TokenKind::AndAssign => "&=",
        TokenKind::OrAssign => "|=",
        TokenKind::XorAssign => "^=",
        TokenKind::ShlAssign => "<<=",
        TokenKind::ShrAssign => ">>=",
        TokenKind::Plus => "+",
        TokenKind::Minus => "-",
        TokenKind::Star => "*",
        TokenKind::Slash => "/",
        TokenKind::Percent => "%",
        TokenKind::AmpAmp => "&&",
        TokenKind::PipePipe => "||",
        TokenKind::Amp => "&",
        TokenKind::Pipe => "|",
        TokenKind::Caret => "^",
        TokenKind::Shl => "<<",
        TokenKind::Shr => ">>",
        TokenKind::EqEq => "==",
        TokenKind::NotEq => "!=",
        TokenKind::Lt => "<",
        TokenKind::Gt => ">",
        TokenKind::Leq => "<=",
        TokenKind::Geq => ">=",
        TokenKind::Not => "!",
        TokenKind::Tilde => "~",
        TokenKind::Inc => "++",
        TokenKind::Dec => "--",
        _ => "",
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "break" => TokenKind::Break,
    "case" => TokenKind::Case,
    "cbuffer" => TokenKind::CBuffer,
    "const" => TokenKind::Const,
    "continue" => TokenKind::Continue,
    "default" => TokenKind::Default,
    "discard" => TokenKind::Discard,
    "do" => TokenKind::Do,
    "else" => TokenKind::Else,
    "for" => TokenKind::For,
    "if" => TokenKind::If,
    "in" => TokenKind::In,
    "inout" => TokenKind::InOut,
    "out" => TokenKind::Out,
    "register" => TokenKind::Register,
    "return" => TokenKind::Return,
    "struct" => TokenKind::Struct,
    "switch" => TokenKind::Switch,
    "tbuffer" => TokenKind::TBuffer,
    "typedef" => TokenKind::Typedef,
    "void" => TokenKind::Void,
    "while" => TokenKind::While,
    "extern" => TokenKind::Extern,
    "precise" => TokenKind::Precise,
    "shared" => TokenKind::Shared,
    "static" => TokenKind::Static,
    "uniform" => TokenKind::Uniform,
    "volatile" => TokenKind::Volatile,
    "linear" => TokenKind::Linear,
    "centroid" => TokenKind::Centroid,
    "nointerpolation" => TokenKind::NoInterpolation,
    "noperspective" => TokenKind::NoPerspective,
    "sample" => TokenKind::Sample,
    "row_major" => TokenKind::RowMajor,
    "column_major" => TokenKind::ColumnMajor,
    "snorm" => TokenKind::SNorm,
    "unorm" => TokenKind::UNorm,
    "packoffset" => TokenKind::PackOffset,
    "true" => TokenKind::BoolLit(true),
    "false" => TokenKind::BoolLit(false),
};

// Scalar, vector and matrix type names are ordinary identifiers to the lexer; the parser decides
// whether an identifier denotes a type. "float4" and friends are decomposed here instead of being
// tabulated, since the grid is regular.
pub fn data_type_from_str(s: &str) -> Option<DataType> {
    let (base, rest) = if let Some(r) = s.strip_prefix("bool") {
        (DataType::Bool, r)
    } else if let Some(r) = s.strip_prefix("int") {
        (DataType::Int, r)
    } else if let Some(r) = s.strip_prefix("uint") {
        (DataType::UInt, r)
    } else if let Some(r) = s.strip_prefix("dword") {
        (DataType::UInt, r)
    } else if let Some(r) = s.strip_prefix("half") {
        (DataType::Half, r)
    } else if let Some(r) = s.strip_prefix("float") {
        (DataType::Float, r)
    } else if let Some(r) = s.strip_prefix("double") {
        (DataType::Double, r)
    } else {
        return None;
    };
    let b = rest.as_bytes();
    let digit = |c: u8| {
        if c >= b'1' && c <= b'4' { Some((c - b'0') as usize) } else { None }
    };
    match b {
        [] => Some(base),
        [n] => vector_data_type(base, digit(*n)?),
        [r, b'x', c] => matrix_data_type(base, digit(*r)?, digit(*c)?),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn keywords_resolve() {
        assert_eq!(KEYWORDS.get("cbuffer"), Some(&TokenKind::CBuffer));
        assert_eq!(KEYWORDS.get("true"), Some(&TokenKind::BoolLit(true)));
        assert_eq!(KEYWORDS.get("float4"), None);
    }

    #[test]
    fn type_names_decompose() {
        assert_eq!(data_type_from_str("float"), Some(DataType::Float));
        assert_eq!(data_type_from_str("float4"), Some(DataType::Float4));
        assert_eq!(data_type_from_str("float4x4"), Some(DataType::Float4x4));
        assert_eq!(data_type_from_str("uint3"), Some(DataType::UInt3));
        assert_eq!(data_type_from_str("dword"), Some(DataType::UInt));
        assert_eq!(data_type_from_str("half2x3"), Some(DataType::Half2x3));
    }

    #[test]
    fn bad_type_names_are_rejected()  {
        assert_eq!(data_type_from_str("float5"), None);
        assert_eq!(data_type_from_str("float0"), None);
        assert_eq!(data_type_from_str("float4x5"), None);
        assert_eq!(data_type_from_str("vec4"), None);
    }
}
