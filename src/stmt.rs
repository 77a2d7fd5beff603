// ABOUTME: Statement executor: declarations, assignments, control flow, loops

use std::io::Write;
use std::rc::Rc;

use crate::config::{MAX_LOOP_NESTING, MAX_PARAMETERS};
use crate::error::{ErrorKind, Result};
use crate::functions::{is_builtin, FunctionDef, Param};
use crate::interp::Interpreter;
use crate::scope::ArrayData;
use crate::token::TokenKind;
use crate::value::{Type, Value};

/// Break/continue flags threaded out of a statement list; the enclosing loop
/// clears and handles them.
#[derive(Debug, Default)]
pub struct Flow {
    pub break_hit: bool,
    pub continue_hit: bool,
}

impl Interpreter {
    // ========================================================================
    // Statement dispatch
    // ========================================================================

    pub(crate) fn parse_statement(
        &mut self,
        execute: bool,
        flow: &mut Flow,
        in_function: bool,
    ) -> Result<()> {
        match self.peek_kind() {
            TokenKind::Var => self.parse_var_declaration(execute, false),
            TokenKind::Identifier(_) => {
                if self.identifier_starts_assignment() {
                    self.parse_assignment(execute)
                } else {
                    // Expression statement (typically a call); value discarded.
                    self.evaluate_expression(execute)?;
                    self.expect(TokenKind::Semicolon)?;
                    Ok(())
                }
            }
            TokenKind::Out => self.parse_out_display(execute),
            TokenKind::If => self.parse_if_statement(execute, flow, in_function),
            TokenKind::While => self.parse_while_statement(execute, in_function),
            TokenKind::For => self.parse_for_statement(execute, in_function),
            TokenKind::LBrace => self.parse_block(execute, flow, in_function, true),
            TokenKind::Import => self.parse_import_statement(execute),
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                if execute {
                    if self.loop_depth == 0 {
                        return Err(self.fail(ErrorKind::Semantic(
                            "'break' is only allowed inside a loop".to_string(),
                        )));
                    }
                    flow.break_hit = true;
                }
                Ok(())
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                if execute {
                    if self.loop_depth == 0 {
                        return Err(self.fail(ErrorKind::Semantic(
                            "'continue' is only allowed inside a loop".to_string(),
                        )));
                    }
                    flow.continue_hit = true;
                }
                Ok(())
            }
            TokenKind::Fun => Err(self.fail(ErrorKind::Syntax(
                "function declarations ('fun') are only allowed at the top level".to_string(),
            ))),
            TokenKind::Return => self.parse_return_statement(execute, in_function),
            TokenKind::Semicolon => {
                self.advance();
                Ok(())
            }
            _ => Err(self.unexpected("a statement")),
        }
    }

    /// Run statements until the closing brace; once return/break/continue is
    /// active the rest of the list is consumed without effect.
    pub(crate) fn parse_statement_list(
        &mut self,
        execute: bool,
        flow: &mut Flow,
        in_function: bool,
    ) -> Result<()> {
        while !matches!(self.peek_kind(), TokenKind::RBrace | TokenKind::Eof) {
            self.parse_statement(execute, flow, in_function)?;
            if execute && (self.return_flag || flow.break_hit || flow.continue_hit) {
                while !matches!(self.peek_kind(), TokenKind::RBrace | TokenKind::Eof) {
                    let mut skipped = Flow::default();
                    self.parse_statement(false, &mut skipped, in_function)?;
                }
                return Ok(());
            }
        }
        Ok(())
    }

    /// `{ stmt* }`. `scoped` is false only for the immediate body of a
    /// function being entered, whose scope already holds the parameters.
    pub(crate) fn parse_block(
        &mut self,
        execute: bool,
        flow: &mut Flow,
        in_function: bool,
        scoped: bool,
    ) -> Result<()> {
        if scoped && execute {
            self.scopes.enter_scope().map_err(|kind| self.fail(kind))?;
        }
        self.expect(TokenKind::LBrace)?;
        self.parse_statement_list(execute, flow, in_function)?;
        self.expect(TokenKind::RBrace)?;
        if scoped && execute {
            self.scopes.exit_scope();
        }
        Ok(())
    }

    // ========================================================================
    // Declarations and assignments
    // ========================================================================

    fn parse_type_specifier(&mut self) -> Result<Type> {
        let ty = match self.peek_kind() {
            TokenKind::IntType => Type::Int,
            TokenKind::StringType => Type::String,
            TokenKind::FloatType => Type::Float,
            TokenKind::BooleanType => Type::Boolean,
            TokenKind::VoidType => Type::Void,
            _ => return Err(self.unexpected("a type name")),
        };
        self.advance();
        Ok(ty)
    }

    /// `var name : type [ '[' size ']' ] [ '=' expr ] ;`
    ///
    /// In a `for` header the terminating semicolon belongs to the header and
    /// the declared variable is marked as a loop variable.
    pub(crate) fn parse_var_declaration(&mut self, execute: bool, in_for_init: bool) -> Result<()> {
        self.expect(TokenKind::Var)?;
        let name = self.expect_identifier()?;
        self.expect(TokenKind::Colon)?;
        let base_type = self.parse_type_specifier()?;
        if base_type == Type::Void {
            return Err(self.fail(ErrorKind::type_error(
                "variables cannot be declared 'void'".to_string(),
            )));
        }

        let mut is_array = false;
        let mut sized = false;
        let mut array_size = 0usize;
        if *self.peek_kind() == TokenKind::LBracket {
            is_array = true;
            self.advance();
            if *self.peek_kind() != TokenKind::RBracket {
                sized = true;
                let size_value = self.evaluate_expression(execute)?;
                if execute {
                    let Value::Int(size) = size_value else {
                        return Err(self.fail(ErrorKind::type_error(
                            "array size must be an integer".to_string(),
                        )));
                    };
                    if size <= 0 {
                        return Err(self
                            .fail(ErrorKind::Range("array size must be positive".to_string())));
                    }
                    array_size = size as usize;
                }
            }
            self.expect(TokenKind::RBracket)?;
        }

        // The initializer diagnosis comes before the size diagnosis so that
        // `var a: int[] = ...` reports the unsupported initializer.
        let has_initializer = *self.peek_kind() == TokenKind::Assign;
        if is_array && has_initializer {
            return Err(self.fail(ErrorKind::Syntax(
                "direct assignment in an array declaration is not supported; \
                 assign elements individually"
                    .to_string(),
            )));
        }
        if is_array && !sized {
            return Err(self.fail(ErrorKind::Syntax(
                "array declaration requires a size".to_string(),
            )));
        }

        let mut var_index = None;
        if execute {
            let (ty, buffer) = if is_array {
                let data = ArrayData::new(base_type, array_size).ok_or_else(|| {
                    self.fail(ErrorKind::type_error(
                        "invalid array element type".to_string(),
                    ))
                })?;
                (Type::Array, Some(data))
            } else {
                (base_type, None)
            };
            let index = self
                .scopes
                .declare(&name, ty, in_for_init, buffer)
                .map_err(|kind| self.fail(kind))?;
            var_index = Some(index);
        }
        if in_for_init {
            self.push_for_loop_var(&name)?;
        }

        if has_initializer {
            self.expect(TokenKind::Assign)?;
            let rhs = self.parse_assignment_rhs(Some(base_type), execute)?;
            if let Some(index) = var_index {
                self.scopes.var_mut(index).write(rhs);
            }
        }
        if !in_for_init {
            self.expect(TokenKind::Semicolon)?;
        }
        Ok(())
    }

    fn push_for_loop_var(&mut self, name: &str) -> Result<()> {
        if self.for_loop_vars.len() >= MAX_LOOP_NESTING {
            return Err(self.fail(ErrorKind::LimitExceeded("loop nesting")));
        }
        self.for_loop_vars.push(name.to_string());
        Ok(())
    }

    /// Evaluate and type-check the right-hand side of an assignment.
    /// `expected` is `None` only in skip mode.
    fn parse_assignment_rhs(&mut self, expected: Option<Type>, execute: bool) -> Result<Value> {
        let rhs = self.evaluate_expression(execute)?;
        if !execute {
            return Ok(rhs);
        }
        match expected {
            Some(ty) => self.coerce_assign(ty, rhs),
            None => Ok(rhs),
        }
    }

    /// Assignment compatibility: exact type match, with int promoted for a
    /// float target. Whole arrays are never assignable.
    fn coerce_assign(&self, expected: Type, value: Value) -> Result<Value> {
        if expected == Type::Array {
            return Err(self.fail(ErrorKind::type_error(
                "arrays cannot be assigned as a whole; assign elements individually".to_string(),
            )));
        }
        let compatible = match (expected, &value) {
            (Type::Int, Value::Int(_)) => true,
            (Type::Float, Value::Float(_)) => true,
            (Type::Float, Value::Int(i)) => return Ok(Value::Float(*i as f64)),
            (Type::String, Value::Str(_)) => true,
            (Type::Boolean, Value::Bool(_)) => true,
            _ => false,
        };
        if compatible {
            Ok(value)
        } else {
            Err(self.fail(ErrorKind::type_error(format!(
                "cannot assign a {} value to a {} target",
                value.type_name(),
                expected
            ))))
        }
    }

    /// `name = expr ;` or `name[index] = expr ;`
    ///
    /// The index is evaluated and bounds-checked before the right-hand side
    /// runs.
    fn parse_assignment(&mut self, execute: bool) -> Result<()> {
        let name = self.expect_identifier()?;
        let target = if execute {
            Some(
                self.scopes
                    .find(&name)
                    .ok_or_else(|| self.fail(ErrorKind::UndeclaredVariable(name.clone())))?,
            )
        } else {
            None
        };

        let mut element = None;
        let mut expected = None;
        if *self.peek_kind() == TokenKind::LBracket {
            if let Some(index) = target {
                if self.scopes.var(index).ty != Type::Array {
                    return Err(self.fail(ErrorKind::type_error(format!(
                        "'{}' is not an array and cannot be indexed",
                        name
                    ))));
                }
            }
            self.advance();
            let index_value = self.evaluate_expression(execute)?;
            self.expect(TokenKind::RBracket)?;
            if let Some(var_index) = target {
                let Value::Int(index) = index_value else {
                    return Err(self.fail(ErrorKind::type_error(
                        "array index must be an integer".to_string(),
                    )));
                };
                let data = self.scopes.var(var_index).array();
                if index < 0 || index as usize >= data.len() {
                    let size = data.len();
                    return Err(self.fail(ErrorKind::IndexOutOfBounds { name, index, size }));
                }
                element = Some(index as usize);
                expected = Some(data.element_type());
            }
        } else if let Some(index) = target {
            expected = Some(self.scopes.var(index).ty);
        }

        self.expect(TokenKind::Assign)?;
        let rhs = self.parse_assignment_rhs(expected, execute)?;
        if let Some(var_index) = target {
            match element {
                Some(slot) => self.scopes.var_mut(var_index).array_mut().set(slot, rhs),
                None => self.scopes.var_mut(var_index).write(rhs),
            }
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    /// Lookahead distinguishing `name [...] =` assignment targets from
    /// expression statements that merely start with an identifier.
    fn identifier_starts_assignment(&self) -> bool {
        let mut offset = 1;
        if *self.peek_kind_at(offset) == TokenKind::LBracket {
            let mut nesting = 1usize;
            offset += 1;
            while nesting > 0 {
                match self.peek_kind_at(offset) {
                    TokenKind::Eof => return false,
                    TokenKind::LBracket | TokenKind::LParen => nesting += 1,
                    TokenKind::RBracket | TokenKind::RParen => nesting -= 1,
                    _ => {}
                }
                offset += 1;
            }
        }
        *self.peek_kind_at(offset) == TokenKind::Assign
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// `out.display(expr);` — print the value followed by a newline.
    fn parse_out_display(&mut self, execute: bool) -> Result<()> {
        self.expect(TokenKind::Out)?;
        self.expect(TokenKind::Dot)?;
        self.expect(TokenKind::Display)?;
        self.expect(TokenKind::LParen)?;
        let value = self.evaluate_expression(execute)?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semicolon)?;
        if execute {
            let text = self.render_value(&value);
            writeln!(self.out, "{}", text)
                .and_then(|_| self.out.flush())
                .map_err(|e| self.fail(ErrorKind::Io(format!("cannot write output: {}", e))))?;
        }
        Ok(())
    }

    /// Display form of any value; arrays render their elements recursively.
    pub(crate) fn render_value(&self, value: &Value) -> String {
        match value.display_scalar() {
            Some(text) => text,
            None => {
                let Value::ArrayRef(index) = value else {
                    unreachable!("only array references lack a scalar display form");
                };
                let data = self.scopes.var(*index).array();
                let parts: Vec<String> = (0..data.len())
                    .map(|i| self.render_value(&data.get(i)))
                    .collect();
                format!("[{}]", parts.join(", "))
            }
        }
    }

    // ========================================================================
    // Control flow
    // ========================================================================

    fn parse_if_statement(
        &mut self,
        execute: bool,
        flow: &mut Flow,
        in_function: bool,
    ) -> Result<()> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let condition = self.evaluate_expression(execute)?;
        self.expect(TokenKind::RParen)?;

        let condition_true = if execute {
            match condition {
                Value::Bool(b) => b,
                other => {
                    return Err(self.fail(ErrorKind::type_error(format!(
                        "'if' condition must be a boolean, got {}",
                        other.type_name()
                    ))));
                }
            }
        } else {
            false
        };

        self.parse_block(execute && condition_true, flow, in_function, true)?;
        // The else branch is always parsed so both modes consume the same
        // span; it only executes when the condition was false.
        if *self.peek_kind() == TokenKind::Else {
            self.advance();
            self.parse_block(execute && !condition_true, flow, in_function, true)?;
        }
        Ok(())
    }

    /// Loops rewind the cursor to the saved condition position on every
    /// iteration; break and continue from the body are consumed here rather
    /// than propagated outward.
    fn parse_while_statement(&mut self, execute: bool, in_function: bool) -> Result<()> {
        self.expect(TokenKind::While)?;
        let condition_start = self.cursor;
        self.loop_depth += 1;

        if execute {
            loop {
                self.cursor = condition_start;
                self.expect(TokenKind::LParen)?;
                let condition = self.evaluate_expression(true)?;
                self.expect(TokenKind::RParen)?;
                let Value::Bool(keep_going) = condition else {
                    return Err(self.fail(ErrorKind::type_error(format!(
                        "'while' condition must be a boolean, got {}",
                        condition.type_name()
                    ))));
                };
                if !keep_going {
                    break;
                }
                let mut body_flow = Flow::default();
                self.parse_block(true, &mut body_flow, in_function, true)?;
                if self.return_flag {
                    // Unwinding out of the loop; the cursor already sits past
                    // the body just executed.
                    self.loop_depth -= 1;
                    return Ok(());
                }
                if body_flow.break_hit {
                    break;
                }
                // continue_hit simply re-evaluates the condition.
            }
        }

        // Consume the condition and body once without effect to leave the
        // cursor just past the loop.
        self.cursor = condition_start;
        self.expect(TokenKind::LParen)?;
        self.evaluate_expression(false)?;
        self.expect(TokenKind::RParen)?;
        let mut skipped = Flow::default();
        self.parse_block(false, &mut skipped, in_function, true)?;
        self.loop_depth -= 1;
        Ok(())
    }

    fn parse_for_statement(&mut self, execute: bool, in_function: bool) -> Result<()> {
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::LParen)?;

        // Initializer: declaration, assignment/expression, or empty.
        let mut declared_loop_var = false;
        if *self.peek_kind() == TokenKind::Var {
            if execute {
                self.scopes.enter_scope().map_err(|kind| self.fail(kind))?;
            }
            self.parse_var_declaration(execute, true)?;
            declared_loop_var = true;
        } else if *self.peek_kind() != TokenKind::Semicolon {
            self.parse_for_assign_or_expr(execute)?;
        }
        self.expect(TokenKind::Semicolon)?;

        // Condition: record its position; empty means true.
        let condition_start = self.cursor;
        let condition_empty = *self.peek_kind() == TokenKind::Semicolon;
        if !condition_empty {
            self.evaluate_expression(false)?;
        }
        self.expect(TokenKind::Semicolon)?;

        // Increment: record its position, consume without effect.
        let increment_start = self.cursor;
        let increment_empty = *self.peek_kind() == TokenKind::RParen;
        if !increment_empty {
            self.parse_for_assign_or_expr(false)?;
        }
        self.expect(TokenKind::RParen)?;
        let body_start = self.cursor;

        self.loop_depth += 1;
        if execute {
            loop {
                self.cursor = condition_start;
                let keep_going = if condition_empty {
                    true
                } else {
                    match self.evaluate_expression(true)? {
                        Value::Bool(b) => b,
                        other => {
                            return Err(self.fail(ErrorKind::type_error(format!(
                                "'for' condition must be a boolean, got {}",
                                other.type_name()
                            ))));
                        }
                    }
                };
                if !keep_going {
                    break;
                }

                self.cursor = body_start;
                let mut body_flow = Flow::default();
                self.parse_block(true, &mut body_flow, in_function, true)?;
                if self.return_flag {
                    if declared_loop_var {
                        self.scopes.exit_scope();
                        self.for_loop_vars.pop();
                    }
                    self.loop_depth -= 1;
                    return Ok(());
                }
                if body_flow.break_hit {
                    break;
                }

                // The increment runs even after continue.
                self.cursor = increment_start;
                if !increment_empty {
                    self.parse_for_assign_or_expr(true)?;
                }
            }
        }

        // Leave the cursor just past the body.
        self.cursor = body_start;
        let mut skipped = Flow::default();
        self.parse_block(false, &mut skipped, in_function, true)?;
        self.loop_depth -= 1;
        if declared_loop_var {
            if execute {
                self.scopes.exit_scope();
            }
            self.for_loop_vars.pop();
        }
        Ok(())
    }

    /// A `for` header piece: `ident = expr` or a bare expression.
    fn parse_for_assign_or_expr(&mut self, execute: bool) -> Result<()> {
        let is_assignment = matches!(self.peek_kind(), TokenKind::Identifier(_))
            && *self.peek_kind_at(1) == TokenKind::Assign;
        if is_assignment {
            let name = self.expect_identifier()?;
            self.expect(TokenKind::Assign)?;
            if execute {
                let index = self
                    .scopes
                    .find(&name)
                    .ok_or_else(|| self.fail(ErrorKind::UndeclaredVariable(name.clone())))?;
                let ty = self.scopes.var(index).ty;
                let rhs = self.parse_assignment_rhs(Some(ty), true)?;
                self.scopes.var_mut(index).write(rhs);
            } else {
                self.parse_assignment_rhs(None, false)?;
            }
        } else {
            self.evaluate_expression(execute)?;
        }
        Ok(())
    }

    fn parse_return_statement(&mut self, execute: bool, in_function: bool) -> Result<()> {
        self.expect(TokenKind::Return)?;
        // Legal lexically inside a function body, or dynamically while a
        // call is active (a file imported from inside a call).
        if !in_function && self.call_stack.is_empty() {
            return Err(self.fail(ErrorKind::Semantic(
                "'return' is only allowed inside a function body".to_string(),
            )));
        }
        let mut value = Value::Null;
        if *self.peek_kind() != TokenKind::Semicolon {
            value = self.evaluate_expression(execute)?;
        }
        self.expect(TokenKind::Semicolon)?;
        if execute {
            self.return_value = value;
            self.return_flag = true;
        }
        Ok(())
    }

    // ========================================================================
    // Function declarations (first pass) and their structural skip (second)
    // ========================================================================

    /// `fun name(params) [: type] { body }` — registers the definition and
    /// records where the body starts; the body itself is only consumed.
    pub(crate) fn parse_fun_declaration(&mut self) -> Result<()> {
        self.expect(TokenKind::Fun)?;
        let name = self.expect_identifier()?;
        if self.functions.find(&name).is_some() {
            return Err(self.fail(ErrorKind::DuplicateFunction(name)));
        }
        if is_builtin(&name) {
            return Err(self.fail(ErrorKind::BuiltinNameClash(name)));
        }

        self.expect(TokenKind::LParen)?;
        let mut params: Vec<Param> = Vec::new();
        if *self.peek_kind() != TokenKind::RParen {
            loop {
                if params.len() >= MAX_PARAMETERS {
                    return Err(self.fail(ErrorKind::LimitExceeded("parameter")));
                }
                let param_name = self.expect_identifier()?;
                self.expect(TokenKind::Colon)?;
                let param_type = self.parse_type_specifier()?;
                if param_type == Type::Void {
                    return Err(self.fail(ErrorKind::type_error(
                        "function parameters cannot be 'void'".to_string(),
                    )));
                }
                if params.iter().any(|p| p.name == param_name) {
                    return Err(self.fail(ErrorKind::Syntax(format!(
                        "parameter '{}' is declared twice",
                        param_name
                    ))));
                }
                params.push(Param {
                    name: param_name,
                    ty: param_type,
                });
                if *self.peek_kind() == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        let return_type = if *self.peek_kind() == TokenKind::Colon {
            self.advance();
            self.parse_type_specifier()?
        } else {
            Type::Void
        };

        if *self.peek_kind() != TokenKind::LBrace {
            return Err(self.unexpected("'{' to open the function body"));
        }
        let body_start = self.cursor;
        self.functions
            .define(FunctionDef {
                name,
                params,
                return_type,
                body_start,
                tokens: Rc::clone(&self.tokens),
                path: Rc::clone(&self.path),
            })
            .map_err(|kind| self.fail(kind))?;

        let mut flow = Flow::default();
        self.parse_block(false, &mut flow, true, false)
    }

    /// Second-pass skip over an already-registered declaration.
    pub(crate) fn skip_fun_declaration(&mut self) -> Result<()> {
        self.expect(TokenKind::Fun)?;
        self.expect_identifier()?;
        self.expect(TokenKind::LParen)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek_kind() {
                TokenKind::Eof => return Err(self.unexpected("')' to close the parameter list")),
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth -= 1,
                _ => {}
            }
            self.advance();
        }
        if *self.peek_kind() == TokenKind::Colon {
            self.advance();
            self.parse_type_specifier()?;
        }
        if *self.peek_kind() != TokenKind::LBrace {
            return Err(self.unexpected("'{' to open the function body"));
        }
        let mut flow = Flow::default();
        self.parse_block(false, &mut flow, true, false)
    }
}
