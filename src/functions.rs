// ABOUTME: User-defined function table and the built-in name set

use std::rc::Rc;

use crate::config::MAX_FUNCTIONS;
use crate::error::ErrorKind;
use crate::token::Token;
use crate::value::Type;

/// Names resolved by the expression evaluator to native operations. A user
/// function may not take any of these names.
pub const BUILTIN_NAMES: [&str; 13] = [
    "length",
    "int_to_string",
    "concat",
    "sqrt",
    "to_upper",
    "to_lower",
    "read_file_text",
    "write_file_text",
    "substring",
    "string_to_int",
    "string_to_float",
    "type_of",
    "pow",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

/// A user-defined function. The body is not compiled: it is re-parsed from
/// `tokens` starting at `body_start` (the opening brace) on every call.
/// Keeping an `Rc` of the defining buffer means functions declared by an
/// imported file, or an earlier REPL line, stay callable after the caller's
/// buffer is swapped back in.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Type,
    pub body_start: usize,
    pub tokens: Rc<Vec<Token>>,
    pub path: Rc<str>,
}

/// Flat name-to-definition table with linear lookup. Definitions accumulate
/// monotonically: imports add to the set, nothing is ever removed.
#[derive(Debug, Default)]
pub struct FunctionTable {
    funcs: Vec<FunctionDef>,
}

impl FunctionTable {
    pub fn new() -> Self {
        FunctionTable::default()
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.funcs.iter().position(|f| f.name == name)
    }

    pub fn get(&self, index: usize) -> &FunctionDef {
        &self.funcs[index]
    }

    pub fn define(&mut self, def: FunctionDef) -> Result<(), ErrorKind> {
        if self.find(&def.name).is_some() {
            return Err(ErrorKind::DuplicateFunction(def.name));
        }
        if is_builtin(&def.name) {
            return Err(ErrorKind::BuiltinNameClash(def.name));
        }
        if self.funcs.len() >= MAX_FUNCTIONS {
            return Err(ErrorKind::LimitExceeded("function"));
        }
        self.funcs.push(def);
        Ok(())
    }
}
