// ABOUTME: Expression evaluator: precedence climb, primaries, user input

use crate::builtins;
use crate::config::{MAX_PARAMETERS, MAX_STRING_LEN};
use crate::error::{ErrorKind, Result};
use crate::interp::Interpreter;
use crate::token::TokenKind;
use crate::value::{Type, Value};

/// Tolerance for `==` between floats (and int/float after promotion).
const FLOAT_EQ_EPSILON: f64 = 1e-9;

impl Interpreter {
    /// Evaluate (or, with `execute` false, merely consume) one expression.
    ///
    /// Both modes traverse exactly the same tokens; skip mode performs no
    /// lookups, calls, or I/O and yields `Null`.
    pub(crate) fn evaluate_expression(&mut self, execute: bool) -> Result<Value> {
        self.parse_logical_or(execute)
    }

    fn parse_logical_or(&mut self, execute: bool) -> Result<Value> {
        let mut left = self.parse_logical_and(execute)?;
        while *self.peek_kind() == TokenKind::OrOr {
            self.advance();
            // A true left side decides the result; the right side is then
            // consumed without effect.
            let short_circuit = execute && matches!(left, Value::Bool(true));
            let right = self.parse_logical_and(execute && !short_circuit)?;
            left = if execute {
                match (left, right) {
                    (Value::Bool(true), _) => Value::Bool(true),
                    (Value::Bool(lb), Value::Bool(rb)) => Value::Bool(lb || rb),
                    (Value::Bool(_), other) | (other, _) => {
                        return Err(self.fail(ErrorKind::type_error(format!(
                            "'||' expects boolean operands, got {}",
                            other.type_name()
                        ))));
                    }
                }
            } else {
                Value::Null
            };
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self, execute: bool) -> Result<Value> {
        let mut left = self.parse_equality(execute)?;
        while *self.peek_kind() == TokenKind::AndAnd {
            self.advance();
            let short_circuit = execute && matches!(left, Value::Bool(false));
            let right = self.parse_equality(execute && !short_circuit)?;
            left = if execute {
                match (left, right) {
                    (Value::Bool(false), _) => Value::Bool(false),
                    (Value::Bool(lb), Value::Bool(rb)) => Value::Bool(lb && rb),
                    (Value::Bool(_), other) | (other, _) => {
                        return Err(self.fail(ErrorKind::type_error(format!(
                            "'&&' expects boolean operands, got {}",
                            other.type_name()
                        ))));
                    }
                }
            } else {
                Value::Null
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self, execute: bool) -> Result<Value> {
        let mut left = self.parse_relational(execute)?;
        while matches!(self.peek_kind(), TokenKind::EqEq | TokenKind::NotEq) {
            let negate = *self.peek_kind() == TokenKind::NotEq;
            self.advance();
            let right = self.parse_relational(execute)?;
            left = if execute {
                let equal = values_equal(&left, &right);
                Value::Bool(if negate { !equal } else { equal })
            } else {
                Value::Null
            };
        }
        Ok(left)
    }

    fn parse_relational(&mut self, execute: bool) -> Result<Value> {
        let mut left = self.parse_additive(execute)?;
        while matches!(
            self.peek_kind(),
            TokenKind::Greater | TokenKind::Less | TokenKind::GreaterEq | TokenKind::LessEq
        ) {
            let op = self.advance();
            let right = self.parse_additive(execute)?;
            left = if execute {
                let ordering = if left.is_numeric() && right.is_numeric() {
                    let (lv, rv) = (left.as_f64().unwrap(), right.as_f64().unwrap());
                    lv.partial_cmp(&rv)
                } else if let (Value::Str(ls), Value::Str(rs)) = (&left, &right) {
                    Some(ls.cmp(rs))
                } else {
                    return Err(self.fail(ErrorKind::type_error(format!(
                        "comparison '{}' applies to numbers or strings, got {} and {}",
                        op.lexeme,
                        left.type_name(),
                        right.type_name()
                    ))));
                };
                let result = match (op.kind, ordering) {
                    (_, None) => false,
                    (TokenKind::Greater, Some(o)) => o.is_gt(),
                    (TokenKind::Less, Some(o)) => o.is_lt(),
                    (TokenKind::GreaterEq, Some(o)) => o.is_ge(),
                    (_, Some(o)) => o.is_le(),
                };
                Value::Bool(result)
            } else {
                Value::Null
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self, execute: bool) -> Result<Value> {
        let mut left = self.parse_multiplicative(execute)?;
        while matches!(self.peek_kind(), TokenKind::Plus | TokenKind::Minus) {
            let op = self.advance();
            let right = self.parse_multiplicative(execute)?;
            if !execute {
                left = Value::Null;
                continue;
            }
            left = if op.kind == TokenKind::Plus
                && (matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)))
            {
                self.concat_values(&left, &right)?
            } else if left.is_numeric() && right.is_numeric() {
                match (&left, &right) {
                    (Value::Int(li), Value::Int(ri)) => {
                        let result = if op.kind == TokenKind::Plus {
                            li.checked_add(*ri)
                        } else {
                            li.checked_sub(*ri)
                        };
                        Value::Int(self.checked(result, &op.lexeme)?)
                    }
                    _ => {
                        let (lv, rv) = (left.as_f64().unwrap(), right.as_f64().unwrap());
                        Value::Float(if op.kind == TokenKind::Plus {
                            lv + rv
                        } else {
                            lv - rv
                        })
                    }
                }
            } else {
                return Err(self.fail(ErrorKind::type_error(format!(
                    "'{}' cannot combine {} and {}",
                    op.lexeme,
                    left.type_name(),
                    right.type_name()
                ))));
            };
        }
        Ok(left)
    }

    /// String concatenation for `+`: the non-string side is coerced using
    /// its display form, and the result must fit the string capacity.
    fn concat_values(&self, left: &Value, right: &Value) -> Result<Value> {
        let ls = left.display_scalar().ok_or_else(|| {
            self.fail(ErrorKind::type_error(format!(
                "'+' cannot concatenate a value of type {}",
                left.type_name()
            )))
        })?;
        let rs = right.display_scalar().ok_or_else(|| {
            self.fail(ErrorKind::type_error(format!(
                "'+' cannot concatenate a value of type {}",
                right.type_name()
            )))
        })?;
        if ls.chars().count() + rs.chars().count() >= MAX_STRING_LEN {
            return Err(self.fail(ErrorKind::Range(
                "string concatenation result exceeds the string capacity".to_string(),
            )));
        }
        Ok(Value::Str(ls + &rs))
    }

    fn parse_multiplicative(&mut self, execute: bool) -> Result<Value> {
        let mut left = self.parse_unary(execute)?;
        while matches!(
            self.peek_kind(),
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent
        ) {
            let op = self.advance();
            let right = self.parse_unary(execute)?;
            if !execute {
                left = Value::Null;
                continue;
            }
            if op.kind == TokenKind::Percent {
                let (Value::Int(li), Value::Int(ri)) = (&left, &right) else {
                    return Err(self.fail(ErrorKind::type_error(format!(
                        "'%' requires integer operands, got {} and {}",
                        left.type_name(),
                        right.type_name()
                    ))));
                };
                if *ri == 0 {
                    return Err(self.fail(ErrorKind::ModuloByZero));
                }
                left = Value::Int(self.checked(li.checked_rem(*ri), "%")?);
                continue;
            }
            if !(left.is_numeric() && right.is_numeric()) {
                return Err(self.fail(ErrorKind::type_error(format!(
                    "'{}' requires numeric operands, got {} and {}",
                    op.lexeme,
                    left.type_name(),
                    right.type_name()
                ))));
            }
            left = match op.kind {
                TokenKind::Star => match (&left, &right) {
                    (Value::Int(li), Value::Int(ri)) => {
                        Value::Int(self.checked(li.checked_mul(*ri), "*")?)
                    }
                    _ => Value::Float(left.as_f64().unwrap() * right.as_f64().unwrap()),
                },
                _ => {
                    let rv = right.as_f64().unwrap();
                    if rv == 0.0 {
                        return Err(self.fail(ErrorKind::DivisionByZero));
                    }
                    match (&left, &right) {
                        // Exact integer division stays an int.
                        (Value::Int(li), Value::Int(ri)) if li.checked_rem(*ri) == Some(0) => {
                            Value::Int(self.checked(li.checked_div(*ri), "/")?)
                        }
                        _ => Value::Float(left.as_f64().unwrap() / rv),
                    }
                }
            };
        }
        Ok(left)
    }

    fn checked(&self, result: Option<i64>, op: &str) -> Result<i64> {
        result.ok_or_else(|| self.fail(ErrorKind::Range(format!("integer overflow in '{}'", op))))
    }

    fn parse_unary(&mut self, execute: bool) -> Result<Value> {
        match self.peek_kind() {
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_unary(execute)?;
                if !execute {
                    return Ok(Value::Null);
                }
                match operand {
                    Value::Bool(b) => Ok(Value::Bool(!b)),
                    other => Err(self.fail(ErrorKind::type_error(format!(
                        "'!' expects a boolean operand, got {}",
                        other.type_name()
                    )))),
                }
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary(execute)?;
                if !execute {
                    return Ok(Value::Null);
                }
                match operand {
                    Value::Int(i) => Ok(Value::Int(self.checked(i.checked_neg(), "-")?)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    other => Err(self.fail(ErrorKind::type_error(format!(
                        "unary '-' expects a numeric operand, got {}",
                        other.type_name()
                    )))),
                }
            }
            _ => self.parse_primary(execute),
        }
    }

    fn parse_primary(&mut self, execute: bool) -> Result<Value> {
        match self.peek_kind().clone() {
            TokenKind::IntLiteral(v) => {
                self.advance();
                Ok(if execute { Value::Int(v) } else { Value::Null })
            }
            TokenKind::FloatLiteral(v) => {
                self.advance();
                Ok(if execute { Value::Float(v) } else { Value::Null })
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                Ok(if execute { Value::Str(s) } else { Value::Null })
            }
            TokenKind::True => {
                self.advance();
                Ok(if execute { Value::Bool(true) } else { Value::Null })
            }
            TokenKind::False => {
                self.advance();
                Ok(if execute { Value::Bool(false) } else { Value::Null })
            }
            TokenKind::Identifier(name) => {
                self.advance();
                match self.peek_kind() {
                    TokenKind::LParen => self.parse_call(name, execute),
                    TokenKind::LBracket => self.parse_index_read(name, execute),
                    _ => self.read_variable(name, execute),
                }
            }
            TokenKind::LParen => {
                self.advance();
                let value = self.evaluate_expression(execute)?;
                self.expect(TokenKind::RParen)?;
                Ok(value)
            }
            TokenKind::User => self.parse_user_input(execute),
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// `name(args...)` — built-ins first, then user functions.
    fn parse_call(&mut self, name: String, execute: bool) -> Result<Value> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if *self.peek_kind() != TokenKind::RParen {
            loop {
                if args.len() >= MAX_PARAMETERS {
                    return Err(self.fail(ErrorKind::LimitExceeded("call argument")));
                }
                args.push(self.evaluate_expression(execute)?);
                if *self.peek_kind() == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        if !execute {
            return Ok(Value::Null);
        }
        if let Some(result) = builtins::dispatch(self, &name, &args) {
            return result.map_err(|kind| self.fail(kind));
        }
        match self.functions.find(&name) {
            Some(index) => self.invoke_function(index, args),
            None => Err(self.fail(ErrorKind::UnknownFunction(name))),
        }
    }

    /// `name[index]` as an r-value.
    fn parse_index_read(&mut self, name: String, execute: bool) -> Result<Value> {
        let var_index = if execute {
            let index = self
                .scopes
                .find(&name)
                .ok_or_else(|| self.fail(ErrorKind::UndeclaredVariable(name.clone())))?;
            if self.scopes.var(index).ty != Type::Array {
                return Err(self.fail(ErrorKind::type_error(format!(
                    "'{}' is not an array and cannot be indexed",
                    name
                ))));
            }
            Some(index)
        } else {
            None
        };
        self.expect(TokenKind::LBracket)?;
        let index_value = self.evaluate_expression(execute)?;
        self.expect(TokenKind::RBracket)?;
        let Some(var_index) = var_index else {
            return Ok(Value::Null);
        };
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
        Ok(data.get(index as usize))
    }

    fn read_variable(&mut self, name: String, execute: bool) -> Result<Value> {
        if !execute {
            return Ok(Value::Null);
        }
        let index = self
            .scopes
            .find(&name)
            .ok_or_else(|| self.fail(ErrorKind::UndeclaredVariable(name.clone())))?;
        let var = self.scopes.var(index);
        if var.ty == Type::Array {
            return Ok(Value::ArrayRef(index));
        }
        if !var.is_defined {
            return Err(self.fail(ErrorKind::Uninitialized(name)));
        }
        Ok(var.read())
    }

    /// `user.in`, `user.in_float`, `user.in_string`, `user.in_boolean`.
    fn parse_user_input(&mut self, execute: bool) -> Result<Value> {
        self.expect(TokenKind::User)?;
        self.expect(TokenKind::Dot)?;
        let op = self.expect_identifier()?;
        if !execute {
            return Ok(Value::Null);
        }
        match op.as_str() {
            "in" => {
                let line = self.prompt_line("> ")?;
                line.trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| self.fail(ErrorKind::Semantic("invalid integer input".into())))
            }
            "in_float" => {
                let line = self.prompt_line("> ")?;
                line.trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| self.fail(ErrorKind::Semantic("invalid float input".into())))
            }
            "in_string" => {
                let line = self.prompt_line("> ")?;
                if line.chars().count() >= MAX_STRING_LEN {
                    return Err(self.fail(ErrorKind::Range(
                        "input line exceeds the string capacity".to_string(),
                    )));
                }
                Ok(Value::Str(line))
            }
            "in_boolean" => {
                let line = self.prompt_line("(true/false)> ")?;
                match line.trim() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(self.fail(ErrorKind::Semantic(
                        "invalid boolean input, expected 'true' or 'false'".to_string(),
                    ))),
                }
            }
            other => Err(self.fail(ErrorKind::Syntax(format!(
                "unknown user input command: user.{}",
                other
            )))),
        }
    }

    fn prompt_line(&mut self, prompt: &str) -> Result<String> {
        write!(self.out, "{}", prompt)
            .and_then(|_| self.out.flush())
            .map_err(|e| self.fail(ErrorKind::Io(format!("cannot write prompt: {}", e))))?;
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .map_err(|e| self.fail(ErrorKind::Io(format!("cannot read input: {}", e))))?;
        if read == 0 {
            return Err(self.fail(ErrorKind::Io("unexpected end of input".to_string())));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }
}

/// `==` semantics: same-typed comparison, int/float after promotion with an
/// epsilon, null equal to null, arrays by reference identity, everything
/// else unequal.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => (a - b).abs() < FLOAT_EQ_EPSILON,
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
            ((*a as f64) - b).abs() < FLOAT_EQ_EPSILON
        }
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Null, Value::Null) => true,
        (Value::ArrayRef(a), Value::ArrayRef(b)) => a == b,
        _ => false,
    }
}
