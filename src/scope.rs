// ABOUTME: Symbol table and lexical scope management

use crate::config::{MAX_SCOPE_DEPTH, MAX_VARIABLES};
use crate::error::ErrorKind;
use crate::value::{Type, Value};

/// Element storage for an array variable. The buffer is owned by the
/// declaring variable and dropped when its scope exits.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

impl ArrayData {
    /// Allocate a default-initialized buffer. `None` when the element type
    /// cannot form an array (array-of-array, void).
    pub fn new(element_type: Type, size: usize) -> Option<ArrayData> {
        let data = match element_type {
            Type::Int => ArrayData::Int(vec![0; size]),
            Type::Float => ArrayData::Float(vec![0.0; size]),
            Type::Boolean => ArrayData::Bool(vec![false; size]),
            Type::String => ArrayData::Str(vec![String::new(); size]),
            Type::Array | Type::Void => return None,
        };
        Some(data)
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayData::Int(v) => v.len(),
            ArrayData::Float(v) => v.len(),
            ArrayData::Bool(v) => v.len(),
            ArrayData::Str(v) => v.len(),
        }
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> Type {
        match self {
            ArrayData::Int(_) => Type::Int,
            ArrayData::Float(_) => Type::Float,
            ArrayData::Bool(_) => Type::Boolean,
            ArrayData::Str(_) => Type::String,
        }
    }

    /// Read one element. The index must already be bounds-checked.
    pub fn get(&self, index: usize) -> Value {
        match self {
            ArrayData::Int(v) => Value::Int(v[index]),
            ArrayData::Float(v) => Value::Float(v[index]),
            ArrayData::Bool(v) => Value::Bool(v[index]),
            ArrayData::Str(v) => Value::Str(v[index].clone()),
        }
    }

    /// Write one element. The value must already match the element type
    /// (after int-to-float promotion) and the index must be in bounds.
    pub fn set(&mut self, index: usize, value: Value) {
        match (self, value) {
            (ArrayData::Int(v), Value::Int(i)) => v[index] = i,
            (ArrayData::Float(v), Value::Float(f)) => v[index] = f,
            (ArrayData::Bool(v), Value::Bool(b)) => v[index] = b,
            (ArrayData::Str(v), Value::Str(s)) => v[index] = s,
            _ => unreachable!("array element type checked before store"),
        }
    }
}

/// Typed payload of a variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Array(ArrayData),
}

impl Slot {
    fn new(ty: Type, array: Option<ArrayData>) -> Slot {
        match ty {
            Type::Int => Slot::Int(0),
            Type::Float => Slot::Float(0.0),
            Type::String => Slot::Str(String::new()),
            Type::Boolean => Slot::Bool(false),
            Type::Array => Slot::Array(array.expect("array declaration carries its buffer")),
            Type::Void => unreachable!("void variables are rejected at declaration"),
        }
    }
}

/// Named storage: declared type, definedness, and the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: Type,
    pub is_defined: bool,
    pub is_loop_var: bool,
    #[allow(dead_code)]
    pub scope_level: usize,
    pub data: Slot,
}

impl Variable {
    /// Current value of a non-array variable.
    pub fn read(&self) -> Value {
        match &self.data {
            Slot::Int(i) => Value::Int(*i),
            Slot::Float(f) => Value::Float(*f),
            Slot::Str(s) => Value::Str(s.clone()),
            Slot::Bool(b) => Value::Bool(*b),
            Slot::Array(_) => unreachable!("array reads go through ArrayData"),
        }
    }

    /// Store a value whose type was already checked against the declaration.
    pub fn write(&mut self, value: Value) {
        self.is_defined = true;
        match (&mut self.data, value) {
            (Slot::Int(slot), Value::Int(i)) => *slot = i,
            (Slot::Float(slot), Value::Float(f)) => *slot = f,
            (Slot::Str(slot), Value::Str(s)) => *slot = s,
            (Slot::Bool(slot), Value::Bool(b)) => *slot = b,
            _ => unreachable!("assignment type checked before store"),
        }
    }

    pub fn array(&self) -> &ArrayData {
        match &self.data {
            Slot::Array(data) => data,
            _ => unreachable!("array access on non-array checked by caller"),
        }
    }

    pub fn array_mut(&mut self) -> &mut ArrayData {
        match &mut self.data {
            Slot::Array(data) => data,
            _ => unreachable!("array access on non-array checked by caller"),
        }
    }
}

/// A flat symbol table plus a stack of scope start indices.
///
/// Lookup scans newest to oldest so inner declarations shadow outer ones;
/// leaving a scope truncates the table back to the scope's start, dropping
/// any owned array buffers with it.
#[derive(Debug, Default)]
pub struct SymbolTable {
    vars: Vec<Variable>,
    scope_starts: Vec<usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn depth(&self) -> usize {
        self.scope_starts.len()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn enter_scope(&mut self) -> Result<(), ErrorKind> {
        if self.scope_starts.len() >= MAX_SCOPE_DEPTH {
            return Err(ErrorKind::LimitExceeded("scope depth"));
        }
        self.scope_starts.push(self.vars.len());
        Ok(())
    }

    pub fn exit_scope(&mut self) {
        if let Some(start) = self.scope_starts.pop() {
            self.vars.truncate(start);
        }
    }

    /// Index of the innermost variable with this name, if any.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.vars.iter().rposition(|v| v.name == name)
    }

    pub fn var(&self, index: usize) -> &Variable {
        &self.vars[index]
    }

    pub fn var_mut(&mut self, index: usize) -> &mut Variable {
        &mut self.vars[index]
    }

    /// Declare a variable in the innermost scope. Fails on a duplicate name
    /// in the same scope or when the table is full.
    pub fn declare(
        &mut self,
        name: &str,
        ty: Type,
        is_loop_var: bool,
        array: Option<ArrayData>,
    ) -> Result<usize, ErrorKind> {
        if self.vars.len() >= MAX_VARIABLES {
            return Err(ErrorKind::LimitExceeded("variable"));
        }
        let scope_start = self.scope_starts.last().copied().unwrap_or(0);
        if self.vars[scope_start..].iter().any(|v| v.name == name) {
            return Err(ErrorKind::DuplicateVariable(name.to_string()));
        }
        // Arrays are defined on declaration; everything else waits for its
        // first assignment.
        let is_defined = ty == Type::Array;
        self.vars.push(Variable {
            name: name.to_string(),
            ty,
            is_defined,
            is_loop_var,
            scope_level: self.scope_starts.len().saturating_sub(1),
            data: Slot::new(ty, array),
        });
        Ok(self.vars.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_and_find() {
        let mut table = SymbolTable::new();
        table.enter_scope().unwrap();
        let idx = table.declare("x", Type::Int, false, None).unwrap();
        table.var_mut(idx).write(Value::Int(42));
        assert_eq!(table.var(table.find("x").unwrap()).read(), Value::Int(42));
    }

    #[test]
    fn test_missing_name() {
        let table = SymbolTable::new();
        assert!(table.find("nope").is_none());
    }

    #[test]
    fn test_shadowing_and_scope_exit() {
        let mut table = SymbolTable::new();
        table.enter_scope().unwrap();
        let outer = table.declare("x", Type::Int, false, None).unwrap();
        table.var_mut(outer).write(Value::Int(1));

        table.enter_scope().unwrap();
        let inner = table.declare("x", Type::Int, false, None).unwrap();
        table.var_mut(inner).write(Value::Int(2));
        assert_eq!(table.var(table.find("x").unwrap()).read(), Value::Int(2));

        table.exit_scope();
        assert_eq!(table.var(table.find("x").unwrap()).read(), Value::Int(1));
    }

    #[test]
    fn test_duplicate_in_same_scope_rejected() {
        let mut table = SymbolTable::new();
        table.enter_scope().unwrap();
        table.declare("x", Type::Int, false, None).unwrap();
        assert_eq!(
            table.declare("x", Type::Float, false, None),
            Err(ErrorKind::DuplicateVariable("x".to_string()))
        );
    }

    #[test]
    fn test_scope_exit_restores_table_exactly() {
        let mut table = SymbolTable::new();
        table.enter_scope().unwrap();
        table.declare("a", Type::Int, false, None).unwrap();
        let len_before = table.len();
        let depth_before = table.depth();

        table.enter_scope().unwrap();
        table
            .declare("b", Type::Array, false, ArrayData::new(Type::Int, 4))
            .unwrap();
        table.declare("c", Type::String, false, None).unwrap();
        table.exit_scope();

        assert_eq!(table.len(), len_before);
        assert_eq!(table.depth(), depth_before);
    }

    #[test]
    fn test_array_default_initialization() {
        let data = ArrayData::new(Type::String, 3).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data.get(2), Value::Str(String::new()));
        assert!(ArrayData::new(Type::Void, 3).is_none());
    }

    #[test]
    fn test_array_get_set() {
        let mut data = ArrayData::new(Type::Int, 2).unwrap();
        data.set(1, Value::Int(7));
        assert_eq!(data.get(1), Value::Int(7));
        assert_eq!(data.get(0), Value::Int(0));
        assert_eq!(data.element_type(), Type::Int);
    }
}
