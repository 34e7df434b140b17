//! Two-kind error design: user-facing semantic errors carry a source
//! position, internal invariant violations carry file/line metadata and
//! always indicate a compiler bug.

use crate::common::Span;
use crate::front::lex::LexError;
use crate::front::parse::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("{0}")]
    Lex(#[from] LexError),

    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("{span}: {msg}")]
    Semantic { span: Span, msg: String },

    #[error("internal error at {file}:{line}: {msg}")]
    Internal {
        file: &'static str,
        line: u32,
        msg: String,
    },
}

impl CompileError {
    pub fn semantic(span: Span, msg: impl Into<String>) -> Self {
        CompileError::Semantic {
            span,
            msg: msg.into(),
        }
    }

    /// Exit code this error should surface to the CLI as.
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::Internal { .. } => 2,
            _ => 1,
        }
    }
}

/// Raise an internal invariant violation, capturing the call site.
macro_rules! internal_error {
    ($($arg:tt)*) => {
        return Err($crate::error::CompileError::Internal {
            file: file!(),
            line: line!(),
            msg: format!($($arg)*),
        })
    };
}

pub(crate) use internal_error;

pub type Result<T> = std::result::Result<T, CompileError>;
