// ABOUTME: Runtime values and declared types for the Starling interpreter

use std::fmt;

/// A declared type: what a variable, parameter, or return slot is allowed to
/// hold. `Void` is only legal as a function return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Int,
    Float,
    String,
    Boolean,
    Array,
    Void,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Int => "int",
            Type::Float => "float",
            Type::String => "string",
            Type::Boolean => "boolean",
            Type::Array => "array",
            Type::Void => "void",
        };
        write!(f, "{}", name)
    }
}

/// A runtime value.
///
/// `ArrayRef` is a non-owning handle: an index into the interpreter's symbol
/// table. Arrays cannot be assigned whole, passed as arguments, or returned,
/// so a reference never outlives the variable it points at.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    ArrayRef(usize),
}

impl Value {
    /// The name `type_of` reports, also used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
            Value::ArrayRef(_) => "array",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Numeric value widened to a float, if numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Display form of a scalar: the text `out.display` prints and the text
    /// `+` concatenation coerces to. `None` for array references, which need
    /// the symbol table to render.
    pub fn display_scalar(&self) -> Option<String> {
        match self {
            Value::Null => Some("null".to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(format_float(*f)),
            Value::Str(s) => Some(s.clone()),
            Value::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
            Value::ArrayRef(_) => None,
        }
    }
}

/// Format a float the way C's `printf("%g", x)` does: six significant
/// digits, trailing zeros stripped, scientific notation when the decimal
/// exponent is below -4 or at least 6.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Round to six significant digits first so the notation choice sees the
    // rounded exponent (999999.5 must become "1e+06", not "1000000").
    let sci = format!("{:.5e}", value);
    let (mantissa, exponent) = sci.split_once('e').unwrap();
    let exponent: i32 = exponent.parse().unwrap();

    if !(-4..6).contains(&exponent) {
        let mantissa = strip_trailing_zeros(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        let precision = (5 - exponent).max(0) as usize;
        let fixed = format!("{:.*}", precision, value);
        strip_trailing_zeros(&fixed).to_string()
    }
}

fn strip_trailing_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}
