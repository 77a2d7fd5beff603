// ABOUTME: Error types and diagnostics for the Starling interpreter

use thiserror::Error;

/// Result alias used throughout the interpreter.
pub type Result<T> = std::result::Result<T, Diagnostic>;

/// The kind of failure, grouped the way the language reports them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // ===== Lexical =====
    #[error("unknown character: '{0}'")]
    UnknownCharacter(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unclosed block comment")]
    UnclosedBlockComment,

    #[error("{0}")]
    Lexical(String),

    // ===== Syntactic =====
    #[error("expected {expected} but found {found} ('{lexeme}')")]
    UnexpectedToken {
        expected: String,
        found: String,
        lexeme: String,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("{0}")]
    Syntax(String),

    // ===== Types =====
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    // ===== Names =====
    #[error("variable '{0}' is not declared")]
    UndeclaredVariable(String),

    #[error("variable '{0}' is already declared in this scope")]
    DuplicateVariable(String),

    #[error("function '{0}' is already defined")]
    DuplicateFunction(String),

    #[error("'{0}' is a built-in function name and cannot be redefined")]
    BuiltinNameClash(String),

    #[error("no function or built-in named '{0}'")]
    UnknownFunction(String),

    // ===== Ranges =====
    #[error("{0}")]
    Range(String),

    #[error("array index out of bounds: {name}[{index}] (size: {size})")]
    IndexOutOfBounds {
        name: String,
        index: i64,
        size: usize,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("modulo by zero")]
    ModuloByZero,

    // ===== Resources =====
    #[error("{0} limit exceeded")]
    LimitExceeded(&'static str),

    #[error("{0}")]
    Io(String),

    // ===== Semantics =====
    #[error("variable '{0}' used before it was assigned")]
    Uninitialized(String),

    #[error("{0}")]
    Semantic(String),

    // ===== Built-in argument errors =====
    #[error("'{function}': {message}")]
    Builtin {
        function: &'static str,
        message: String,
    },
}

impl ErrorKind {
    /// Create a type mismatch error.
    pub fn type_error(message: impl Into<String>) -> Self {
        ErrorKind::TypeMismatch(message.into())
    }

    /// Create a built-in argument error with the function name attached.
    pub fn builtin(function: &'static str, message: impl Into<String>) -> Self {
        ErrorKind::Builtin {
            function,
            message: message.into(),
        }
    }
}

/// A fatal diagnostic: an [`ErrorKind`] pinned to a source position.
///
/// Rendered as `error (file: PATH, line N, token I 'LEX'): MESSAGE`, matching
/// what the CLI prints before exiting nonzero.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("error (file: {path}, line {line}, token {token_index} '{lexeme}'): {kind}")]
pub struct Diagnostic {
    pub path: String,
    pub line: u32,
    pub token_index: usize,
    pub lexeme: String,
    pub kind: ErrorKind,
}
