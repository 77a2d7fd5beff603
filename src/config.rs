// ABOUTME: Configuration and limits for the Starling interpreter
// This module contains version info, REPL messages, and resource bounds

pub const VERSION: &str = "1.0.0";
pub const WELCOME_MESSAGE: &str = "Starling Interpreter v1.0";
pub const WELCOME_SUBTITLE: &str = "A small statically-typed language in Rust";
pub const WELCOME_FOOTER: &str = "Type a statement, or 'exit' to leave.";

pub const PROMPT: &str = "starling> ";
pub const HISTORY_FILE: &str = ".starling_history";

// ============================================================================
// Resource bounds
// ============================================================================
//
// Every bound fails with a Resource diagnostic when exceeded; nothing is
// silently truncated.

/// Maximum size of a source file in bytes (also bounds `read_file_text`).
pub const MAX_SOURCE_SIZE: usize = 10240;

/// Maximum number of tokens in a single file.
pub const MAX_TOKENS: usize = 8192;

/// Maximum identifier length in characters.
pub const MAX_IDENT_LEN: usize = 64;

/// String value capacity; string contents are bounded at `MAX_STRING_LEN - 1`.
pub const MAX_STRING_LEN: usize = 256;

/// Maximum number of live variables across all scopes.
pub const MAX_VARIABLES: usize = 512;

/// Maximum nesting of `for` headers that declare a loop variable.
pub const MAX_LOOP_NESTING: usize = 10;

/// Maximum number of distinct imported files.
pub const MAX_IMPORTS: usize = 10;

/// Maximum number of user-defined functions.
pub const MAX_FUNCTIONS: usize = 100;

/// Maximum parameter count per function (and argument count per call).
pub const MAX_PARAMETERS: usize = 10;

/// Maximum user-function call depth.
pub const MAX_CALL_STACK_DEPTH: usize = 100;

/// Maximum scope nesting depth.
pub const MAX_SCOPE_DEPTH: usize = 100;
