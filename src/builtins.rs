// ABOUTME: Built-in functions resolved inline by the expression evaluator

use std::fs;
use std::num::IntErrorKind;

use crate::config::{MAX_SOURCE_SIZE, MAX_STRING_LEN};
use crate::error::ErrorKind;
use crate::interp::Interpreter;
use crate::value::Value;

type BuiltinResult = Result<Value, ErrorKind>;

/// Resolve a call to a built-in. `None` means the name is not a built-in and
/// should be looked up in the user function table instead.
///
/// Built-ins run inline: they never push a call frame.
pub(crate) fn dispatch(interp: &Interpreter, name: &str, args: &[Value]) -> Option<BuiltinResult> {
    let result = match name {
        "length" => builtin_length(interp, args),
        "int_to_string" => builtin_int_to_string(args),
        "concat" => builtin_concat(args),
        "sqrt" => builtin_sqrt(args),
        "to_upper" => builtin_to_upper(args),
        "to_lower" => builtin_to_lower(args),
        "read_file_text" => builtin_read_file_text(args),
        "write_file_text" => builtin_write_file_text(args),
        "substring" => builtin_substring(args),
        "string_to_int" => builtin_string_to_int(args),
        "string_to_float" => builtin_string_to_float(args),
        "type_of" => builtin_type_of(args),
        "pow" => builtin_pow(args),
        _ => return None,
    };
    Some(result)
}

fn expect_arity(function: &'static str, args: &[Value], count: usize) -> Result<(), ErrorKind> {
    if args.len() != count {
        return Err(ErrorKind::builtin(
            function,
            format!("expects {} argument(s), got {}", count, args.len()),
        ));
    }
    Ok(())
}

/// Length of a string (in characters) or of an array.
fn builtin_length(interp: &Interpreter, args: &[Value]) -> BuiltinResult {
    expect_arity("length", args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        Value::ArrayRef(index) => Ok(Value::Int(interp.scopes.var(*index).array().len() as i64)),
        other => Err(ErrorKind::builtin(
            "length",
            format!("expects a string or array argument, got {}", other.type_name()),
        )),
    }
}

fn builtin_int_to_string(args: &[Value]) -> BuiltinResult {
    expect_arity("int_to_string", args, 1)?;
    match &args[0] {
        Value::Int(i) => Ok(Value::Str(i.to_string())),
        other => Err(ErrorKind::builtin(
            "int_to_string",
            format!("expects an int argument, got {}", other.type_name()),
        )),
    }
}

fn builtin_concat(args: &[Value]) -> BuiltinResult {
    expect_arity("concat", args, 2)?;
    let (Value::Str(a), Value::Str(b)) = (&args[0], &args[1]) else {
        return Err(ErrorKind::builtin("concat", "expects two string arguments"));
    };
    if a.chars().count() + b.chars().count() >= MAX_STRING_LEN {
        return Err(ErrorKind::Range(
            "string concatenation result exceeds the string capacity".to_string(),
        ));
    }
    Ok(Value::Str(format!("{}{}", a, b)))
}

fn builtin_sqrt(args: &[Value]) -> BuiltinResult {
    expect_arity("sqrt", args, 1)?;
    let Some(x) = args[0].as_f64() else {
        return Err(ErrorKind::builtin(
            "sqrt",
            format!("expects a numeric argument, got {}", args[0].type_name()),
        ));
    };
    if x < 0.0 {
        return Err(ErrorKind::Range(
            "'sqrt' cannot take a negative argument".to_string(),
        ));
    }
    Ok(Value::Float(x.sqrt()))
}

fn builtin_to_upper(args: &[Value]) -> BuiltinResult {
    expect_arity("to_upper", args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Str(s.to_ascii_uppercase())),
        other => Err(ErrorKind::builtin(
            "to_upper",
            format!("expects a string argument, got {}", other.type_name()),
        )),
    }
}

fn builtin_to_lower(args: &[Value]) -> BuiltinResult {
    expect_arity("to_lower", args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Str(s.to_ascii_lowercase())),
        other => Err(ErrorKind::builtin(
            "to_lower",
            format!("expects a string argument, got {}", other.type_name()),
        )),
    }
}

/// Read a text file from the host filesystem, bounded by the source buffer
/// size and the string capacity.
fn builtin_read_file_text(args: &[Value]) -> BuiltinResult {
    expect_arity("read_file_text", args, 1)?;
    let Value::Str(path) = &args[0] else {
        return Err(ErrorKind::builtin(
            "read_file_text",
            "expects a string file path",
        ));
    };
    let content = fs::read_to_string(path)
        .map_err(|e| ErrorKind::Io(format!("cannot read file '{}': {}", path, e)))?;
    if content.len() >= MAX_SOURCE_SIZE {
        return Err(ErrorKind::Range(format!(
            "file '{}' exceeds the source buffer size",
            path
        )));
    }
    if content.chars().count() >= MAX_STRING_LEN {
        return Err(ErrorKind::Range(
            "file content exceeds the string capacity".to_string(),
        ));
    }
    Ok(Value::Str(content))
}

/// Write a text file; returns true on success, fails when the file cannot
/// be opened.
fn builtin_write_file_text(args: &[Value]) -> BuiltinResult {
    expect_arity("write_file_text", args, 2)?;
    let (Value::Str(path), Value::Str(content)) = (&args[0], &args[1]) else {
        return Err(ErrorKind::builtin(
            "write_file_text",
            "expects a string file path and string content",
        ));
    };
    fs::write(path, content)
        .map_err(|e| ErrorKind::Io(format!("cannot write file '{}': {}", path, e)))?;
    Ok(Value::Bool(true))
}

/// `substring(s, start, len)`: start must lie within the string, a negative
/// length is rejected, and a range running past the end is truncated.
fn builtin_substring(args: &[Value]) -> BuiltinResult {
    expect_arity("substring", args, 3)?;
    let Value::Str(s) = &args[0] else {
        return Err(ErrorKind::builtin(
            "substring",
            "expects a string as its first argument",
        ));
    };
    let Value::Int(start) = args[1] else {
        return Err(ErrorKind::builtin(
            "substring",
            "expects an int start index as its second argument",
        ));
    };
    let Value::Int(len) = args[2] else {
        return Err(ErrorKind::builtin(
            "substring",
            "expects an int length as its third argument",
        ));
    };
    let char_count = s.chars().count() as i64;
    if start < 0 || start > char_count || len < 0 {
        return Err(ErrorKind::Range(format!(
            "'substring' invalid start ({}) or length ({}) (string length: {})",
            start, len, char_count
        )));
    }
    let result: String = s.chars().skip(start as usize).take(len as usize).collect();
    Ok(Value::Str(result))
}

fn builtin_string_to_int(args: &[Value]) -> BuiltinResult {
    expect_arity("string_to_int", args, 1)?;
    let Value::Str(s) = &args[0] else {
        return Err(ErrorKind::builtin(
            "string_to_int",
            "expects a string argument",
        ));
    };
    match s.trim().parse::<i64>() {
        Ok(value) => Ok(Value::Int(value)),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => Err(ErrorKind::Range(
                format!("'{}' is outside the integer range", s),
            )),
            _ => Err(ErrorKind::builtin(
                "string_to_int",
                format!("cannot convert '{}' to an integer", s),
            )),
        },
    }
}

fn builtin_string_to_float(args: &[Value]) -> BuiltinResult {
    expect_arity("string_to_float", args, 1)?;
    let Value::Str(s) = &args[0] else {
        return Err(ErrorKind::builtin(
            "string_to_float",
            "expects a string argument",
        ));
    };
    s.trim()
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|_| {
            ErrorKind::builtin(
                "string_to_float",
                format!("cannot convert '{}' to a float", s),
            )
        })
}

fn builtin_type_of(args: &[Value]) -> BuiltinResult {
    expect_arity("type_of", args, 1)?;
    Ok(Value::Str(args[0].type_name().to_string()))
}

fn builtin_pow(args: &[Value]) -> BuiltinResult {
    expect_arity("pow", args, 2)?;
    let Some(base) = args[0].as_f64() else {
        return Err(ErrorKind::builtin(
            "pow",
            format!("expects a numeric base, got {}", args[0].type_name()),
        ));
    };
    let Some(exponent) = args[1].as_f64() else {
        return Err(ErrorKind::builtin(
            "pow",
            format!("expects a numeric exponent, got {}", args[1].type_name()),
        ));
    };
    Ok(Value::Float(base.powf(exponent)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_to_string_round_trip() {
        let out = builtin_int_to_string(&[Value::Int(-42)]).unwrap();
        assert_eq!(out, Value::Str("-42".into()));
        let back = builtin_string_to_int(&[out]).unwrap();
        assert_eq!(back, Value::Int(-42));
    }

    #[test]
    fn test_concat_and_capacity() {
        let out = builtin_concat(&[Value::Str("ab".into()), Value::Str("cd".into())]).unwrap();
        assert_eq!(out, Value::Str("abcd".into()));

        let big = "x".repeat(200);
        let err = builtin_concat(&[Value::Str(big.clone()), Value::Str(big)]).unwrap_err();
        assert!(err.to_string().contains("string capacity"));
    }

    #[test]
    fn test_sqrt_boundaries() {
        assert_eq!(builtin_sqrt(&[Value::Int(0)]).unwrap(), Value::Float(0.0));
        assert_eq!(
            builtin_sqrt(&[Value::Float(16.0)]).unwrap(),
            Value::Float(4.0)
        );
        assert!(builtin_sqrt(&[Value::Int(-1)]).is_err());
        assert!(builtin_sqrt(&[Value::Str("4".into())]).is_err());
    }

    #[test]
    fn test_case_conversion_is_ascii_only() {
        let out = builtin_to_upper(&[Value::Str("abc ünï".into())]).unwrap();
        assert_eq!(out, Value::Str("ABC ünï".into()));
        let out = builtin_to_lower(&[Value::Str("ABCÜ".into())]).unwrap();
        assert_eq!(out, Value::Str("abcÜ".into()));
    }

    #[test]
    fn test_to_upper_is_idempotent() {
        let once = builtin_to_upper(&[Value::Str("MiXeD".into())]).unwrap();
        let twice = builtin_to_upper(&[once.clone()]).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_substring_laws() {
        let s = Value::Str("hello world".into());
        let whole = builtin_substring(&[s.clone(), Value::Int(0), Value::Int(11)]).unwrap();
        assert_eq!(whole, s);

        let tail = builtin_substring(&[s.clone(), Value::Int(11), Value::Int(5)]).unwrap();
        assert_eq!(tail, Value::Str("".into()));

        let word = builtin_substring(&[s.clone(), Value::Int(6), Value::Int(5)]).unwrap();
        assert_eq!(word, Value::Str("world".into()));

        // Truncated, not an error, when start+len passes the end.
        let clipped = builtin_substring(&[s.clone(), Value::Int(6), Value::Int(50)]).unwrap();
        assert_eq!(clipped, Value::Str("world".into()));

        assert!(builtin_substring(&[s.clone(), Value::Int(12), Value::Int(1)]).is_err());
        assert!(builtin_substring(&[s, Value::Int(0), Value::Int(-1)]).is_err());
    }

    #[test]
    fn test_string_to_int_rejects_garbage_and_overflow() {
        assert_eq!(
            builtin_string_to_int(&[Value::Str(" 42 ".into())]).unwrap(),
            Value::Int(42)
        );
        assert!(builtin_string_to_int(&[Value::Str("".into())]).is_err());
        assert!(builtin_string_to_int(&[Value::Str("12ab".into())]).is_err());
        let err = builtin_string_to_int(&[Value::Str("99999999999999999999".into())]).unwrap_err();
        assert!(err.to_string().contains("integer range"));
    }

    #[test]
    fn test_string_to_float() {
        assert_eq!(
            builtin_string_to_float(&[Value::Str("456.78".into())]).unwrap(),
            Value::Float(456.78)
        );
        assert!(builtin_string_to_float(&[Value::Str("abc".into())]).is_err());
    }

    #[test]
    fn test_type_of_names() {
        for (value, name) in [
            (Value::Int(1), "int"),
            (Value::Float(1.0), "float"),
            (Value::Str("s".into()), "string"),
            (Value::Bool(true), "boolean"),
            (Value::Null, "null"),
            (Value::ArrayRef(0), "array"),
        ] {
            assert_eq!(builtin_type_of(&[value]).unwrap(), Value::Str(name.into()));
        }
    }

    #[test]
    fn test_pow() {
        assert_eq!(
            builtin_pow(&[Value::Float(2.0), Value::Float(3.0)]).unwrap(),
            Value::Float(8.0)
        );
        assert_eq!(
            builtin_pow(&[Value::Int(5), Value::Int(0)]).unwrap(),
            Value::Float(1.0)
        );
    }

    #[test]
    fn test_arity_errors_name_the_function() {
        let err = builtin_pow(&[Value::Int(1)]).unwrap_err();
        assert_eq!(err.to_string(), "'pow': expects 2 argument(s), got 1");
    }
}
