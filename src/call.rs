// ABOUTME: Call stack and user-function invocation

use std::rc::Rc;

use crate::config::MAX_CALL_STACK_DEPTH;
use crate::error::{ErrorKind, Result};
use crate::interp::Interpreter;
use crate::stmt::Flow;
use crate::token::{Token, TokenKind};
use crate::value::{Type, Value};

/// One frame per active user-function call: everything needed to resume the
/// caller, plus the callee's cleanup marks.
#[derive(Debug)]
pub struct CallFrame {
    pub return_tokens: Rc<Vec<Token>>,
    pub return_cursor: usize,
    pub return_path: Rc<str>,
    /// Symbol-table length at entry; the callee's locals live above it.
    pub locals_start: usize,
    pub saved_loop_depth: usize,
    pub saved_for_vars: usize,
    /// Index of the called function in the function table.
    #[allow(dead_code)]
    pub func: usize,
}

impl Interpreter {
    /// Call a user-defined function: bind parameters in a fresh scope, jump
    /// the cursor into the body (switching to the body's token buffer),
    /// execute, then restore the caller and type-check the returned value.
    pub(crate) fn invoke_function(&mut self, func: usize, args: Vec<Value>) -> Result<Value> {
        let def = self.functions.get(func);
        let (name, return_type, body_start) = (def.name.clone(), def.return_type, def.body_start);
        let (body_tokens, body_path) = (Rc::clone(&def.tokens), Rc::clone(&def.path));

        if args.len() != def.params.len() {
            return Err(self.fail(ErrorKind::Semantic(format!(
                "function '{}' expects {} argument(s) but {} were given",
                name,
                def.params.len(),
                args.len()
            ))));
        }
        if self.call_stack.len() >= MAX_CALL_STACK_DEPTH {
            return Err(self.fail(ErrorKind::LimitExceeded("call stack")));
        }

        self.call_stack.push(CallFrame {
            return_tokens: Rc::clone(&self.tokens),
            return_cursor: self.cursor,
            return_path: Rc::clone(&self.path),
            locals_start: self.scopes.len(),
            saved_loop_depth: self.loop_depth,
            saved_for_vars: self.for_loop_vars.len(),
            func,
        });
        self.loop_depth = 0;

        self.scopes.enter_scope().map_err(|kind| {
            self.unwind_frame();
            self.fail(kind)
        })?;
        if let Err(diag) = self.bind_parameters(func, args) {
            self.scopes.exit_scope();
            self.unwind_frame();
            return Err(diag);
        }

        self.tokens = body_tokens;
        self.cursor = body_start;
        self.path = body_path;
        self.return_flag = false;
        self.return_value = Value::Null;

        // The parameter scope doubles as the body's scope.
        let mut flow = Flow::default();
        let body_result = if *self.peek_kind() == TokenKind::LBrace {
            self.parse_block(true, &mut flow, true, false)
        } else {
            Err(self.unexpected("'{' to open the function body"))
        };
        if let Err(diag) = body_result {
            self.scopes.exit_scope();
            self.unwind_frame();
            return Err(diag);
        }

        if !self.return_flag && return_type != Type::Void {
            let diag = self.fail(ErrorKind::Semantic(format!(
                "function '{}' must return a {} value but reached the end of its body",
                name, return_type
            )));
            self.scopes.exit_scope();
            self.unwind_frame();
            return Err(diag);
        }

        let returned = std::mem::replace(&mut self.return_value, Value::Null);
        let had_return = self.return_flag;
        // The unwind stops at the call boundary: the caller's statement list
        // must keep running.
        self.return_flag = false;

        self.scopes.exit_scope();
        self.unwind_frame();

        if return_type == Type::Void {
            if had_return && returned != Value::Null {
                return Err(self.fail(ErrorKind::type_error(format!(
                    "void function '{}' cannot return a value",
                    name
                ))));
            }
            return Ok(Value::Null);
        }
        self.check_return_type(&name, return_type, returned)
    }

    /// Declare each parameter as a local of the callee's scope and assign
    /// its argument, promoting int to float where the parameter is a float.
    fn bind_parameters(&mut self, func: usize, args: Vec<Value>) -> Result<()> {
        for (position, arg) in args.into_iter().enumerate() {
            let param = &self.functions.get(func).params[position];
            let (param_name, param_type) = (param.name.clone(), param.ty);
            let value = match (param_type, arg) {
                (Type::Float, Value::Int(i)) => Value::Float(i as f64),
                (Type::Int, v @ Value::Int(_))
                | (Type::Float, v @ Value::Float(_))
                | (Type::String, v @ Value::Str(_))
                | (Type::Boolean, v @ Value::Bool(_)) => v,
                (_, v) => {
                    let fname = &self.functions.get(func).name;
                    return Err(self.fail(ErrorKind::type_error(format!(
                        "parameter '{}' of function '{}' expects {}, got {}",
                        param_name,
                        fname,
                        param_type,
                        v.type_name()
                    ))));
                }
            };
            let index = self
                .scopes
                .declare(&param_name, param_type, false, None)
                .map_err(|kind| self.fail(kind))?;
            self.scopes.var_mut(index).write(value);
        }
        Ok(())
    }

    /// Pop the current frame, restoring the caller's cursor, buffer, and
    /// loop counters.
    fn unwind_frame(&mut self) {
        let frame = self
            .call_stack
            .pop()
            .expect("unwind_frame is only called with an active frame");
        debug_assert!(self.scopes.len() >= frame.locals_start);
        self.tokens = frame.return_tokens;
        self.cursor = frame.return_cursor;
        self.path = frame.return_path;
        self.loop_depth = frame.saved_loop_depth;
        self.for_loop_vars.truncate(frame.saved_for_vars);
    }

    fn check_return_type(&self, name: &str, expected: Type, value: Value) -> Result<Value> {
        let value = match (expected, value) {
            (Type::Float, Value::Int(i)) => Value::Float(i as f64),
            (Type::Int, v @ Value::Int(_))
            | (Type::Float, v @ Value::Float(_))
            | (Type::String, v @ Value::Str(_))
            | (Type::Boolean, v @ Value::Bool(_)) => v,
            (_, v) => {
                return Err(self.fail(ErrorKind::type_error(format!(
                    "function '{}' must return {}, got {}",
                    name,
                    expected,
                    v.type_name()
                ))));
            }
        };
        Ok(value)
    }
}
