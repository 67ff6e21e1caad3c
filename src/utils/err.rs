use std::error;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    Name,
    Type,
    Semantic,
    Target,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Lexical => write!(f, "Lexical error"),
            ErrorKind::Syntax => write!(f, "Syntax error"),
            ErrorKind::Name => write!(f, "Name error"),
            ErrorKind::Type => write!(f, "Type error"),
            ErrorKind::Semantic => write!(f, "Semantic error"),
            ErrorKind::Target => write!(f, "Target error"),
            ErrorKind::Internal => write!(f, "Internal error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompileError {
    msg: String,
    kind: ErrorKind,
}

impl CompileError {
    pub fn lexical_err(msg: String) -> Self {
        CompileError {msg, kind: ErrorKind::Lexical}
    }

    pub fn syntax_err(msg: String) -> Self {
        CompileError {msg, kind: ErrorKind::Syntax}
    }

    pub fn name_err(msg: String) -> Self {
        CompileError {msg, kind: ErrorKind::Name}
    }

    pub fn type_err(msg: String) -> Self {
        CompileError {msg, kind: ErrorKind::Type}
    }

    pub fn semantic_err(msg: String) -> Self {
        CompileError {msg, kind: ErrorKind::Semantic}
    }

    pub fn target_err(msg: String) -> Self {
        CompileError {msg, kind: ErrorKind::Target}
    }

    pub fn internal_err(msg: String) -> Self {
        CompileError {msg, kind: ErrorKind::Internal}
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl error::Error for CompileError {}
impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{0}: {1}", self.kind, &self.msg)
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

// A warning never aborts the pipeline; warnings are accumulated by the driver and handed to the
// caller next to the generated code.
#[derive(Clone, Debug, PartialEq)]
pub struct Warning {
    pub msg: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Warning: {0}", &self.msg)
    }
}

#[macro_export]
macro_rules! scx_lexical_error {
    ($i:expr,$($t:tt)*) => {{
        Err(CompileError::lexical_err($i.error_msg(format!($($t)*))))
    }}
}

#[macro_export]
macro_rules! scx_syntax_error {
    ($i:expr,$($t:tt)*) => {{
        Err(CompileError::syntax_err($i.error_msg(format!($($t)*))))
    }}
}

#[macro_export]
macro_rules! scx_name_error {
    ($i:expr,$($t:tt)*) => {{
        Err(CompileError::name_err($i.error_msg(format!($($t)*))))
    }}
}

#[macro_export]
macro_rules! scx_type_error {
    ($i:expr,$($t:tt)*) => {{
        Err(CompileError::type_err($i.error_msg(format!($($t)*))))
    }}
}

#[macro_export]
macro_rules! scx_semantic_error {
    ($i:expr,$($t:tt)*) => {{
        Err(CompileError::semantic_err($i.error_msg(format!($($t)*))))
    }}
}

#[macro_export]
macro_rules! scx_target_error {
    ($i:expr,$($t:tt)*) => {{
        Err(CompileError::target_err($i.error_msg(format!($($t)*))))
    }}
}

#[macro_export]
macro_rules! scx_internal_error {
    ($i:expr,$($t:tt)*) => {{
        Err(CompileError::internal_err($i.error_msg(format!($($t)*))))
    }}
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::info::Info;

    #[test]
    fn error_display_includes_kind() {
        let e = CompileError::type_err("mismatched operands".to_string());
        assert_eq!(format!("{e}"), "Type error: mismatched operands");
    }

    #[test]
    fn macro_produces_err_value() {
        let i = Info::default();
        let r: CompileResult<()> = scx_name_error!(i, "undeclared identifier {0}", "foo");
        let e = r.unwrap_err();
        assert_eq!(e.kind(), &ErrorKind::Name);
        assert!(e.message().contains("foo"));
    }
}
