// ABOUTME: End-to-end tests for built-in functions and user input

use starling::error::{Diagnostic, ErrorKind};
use starling::interp::Interpreter;
use std::cell::RefCell;
use std::io::{Cursor, Write};
use std::rc::Rc;

#[derive(Clone)]
struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn run_with_input(source: &str, input: &str) -> String {
    let buffer = SharedBuf(Rc::new(RefCell::new(Vec::new())));
    let mut interp = Interpreter::with_io(
        Box::new(buffer.clone()),
        Box::new(Cursor::new(input.as_bytes().to_vec())),
    );
    interp
        .run_source("test.src", source)
        .expect("program should run to completion");
    let bytes = buffer.0.borrow().clone();
    String::from_utf8(bytes).unwrap()
}

fn run_program(source: &str) -> String {
    run_with_input(source, "")
}

fn run_err_with_input(source: &str, input: &str) -> Diagnostic {
    let buffer = SharedBuf(Rc::new(RefCell::new(Vec::new())));
    let mut interp = Interpreter::with_io(
        Box::new(buffer.clone()),
        Box::new(Cursor::new(input.as_bytes().to_vec())),
    );
    interp
        .run_source("test.src", source)
        .expect_err("program should fail")
}

fn run_err(source: &str) -> Diagnostic {
    run_err_with_input(source, "")
}

// ============================================================================
// Built-ins through the language
// ============================================================================

#[test]
fn test_length_of_string_and_array() {
    let out = run_program(
        "out.display(length(\"hello\"));\n\
         var a: int[4];\n\
         out.display(length(a));",
    );
    assert_eq!(out, "5\n4\n");
}

#[test]
fn test_int_string_round_trip() {
    let out = run_program("out.display(string_to_int(int_to_string(-37)) == -37);");
    assert_eq!(out, "true\n");
}

#[test]
fn test_concat_and_case_conversion() {
    let out = run_program(
        "out.display(concat(\"foo\", \"bar\"));\n\
         out.display(to_upper(\"mixed Case\"));\n\
         out.display(to_lower(\"MIXED Case\"));\n\
         out.display(to_upper(to_lower(\"AbC\")));",
    );
    assert_eq!(out, "foobar\nMIXED CASE\nmixed case\nABC\n");
}

#[test]
fn test_sqrt_and_pow() {
    let out = run_program(
        "out.display(sqrt(16.0));\n\
         out.display(sqrt(0));\n\
         out.display(pow(2.0, 3.0));\n\
         out.display(pow(9, 0));",
    );
    assert_eq!(out, "4\n0\n8\n1\n");
}

#[test]
fn test_sqrt_of_negative_fails() {
    let err = run_err("out.display(sqrt(-1));");
    assert!(matches!(err.kind, ErrorKind::Range(_)));
}

#[test]
fn test_substring_through_the_language() {
    let out = run_program(
        "var s: string = \"hello world\";\n\
         out.display(substring(s, 6, 5));\n\
         out.display(substring(s, 0, length(s)) == s);\n\
         out.display(substring(s, length(s), 3));",
    );
    assert_eq!(out, "world\ntrue\n\n");
}

#[test]
fn test_type_of_through_the_language() {
    let out = run_program(
        "fun nothing() { }\n\
         var a: float[1];\n\
         out.display(type_of(123));\n\
         out.display(type_of(1.5));\n\
         out.display(type_of(\"s\"));\n\
         out.display(type_of(true));\n\
         out.display(type_of(a));\n\
         out.display(type_of(nothing()));",
    );
    assert_eq!(out, "int\nfloat\nstring\nboolean\narray\nnull\n");
}

#[test]
fn test_string_to_float() {
    let out = run_program("out.display(string_to_float(\"456.78\"));");
    assert_eq!(out, "456.78\n");
}

#[test]
fn test_string_to_int_garbage_fails() {
    let err = run_err("out.display(string_to_int(\"12ab\"));");
    assert!(matches!(err.kind, ErrorKind::Builtin { .. }));
}

#[test]
fn test_builtin_arity_checked() {
    let err = run_err("out.display(length());");
    assert!(err.to_string().contains("expects 1 argument(s), got 0"));
}

#[test]
fn test_builtins_work_in_expressions() {
    let out = run_program("out.display(length(\"abc\") * 2 + length(\"z\"));");
    assert_eq!(out, "7\n");
}

// ============================================================================
// User input
// ============================================================================

#[test]
fn test_user_in_reads_an_int() {
    let out = run_with_input("var n: int = user.in; out.display(n * 2);", "21\n");
    assert_eq!(out, "> 42\n");
}

#[test]
fn test_user_in_float() {
    let out = run_with_input("out.display(user.in_float + 0.5);", "2.25\n");
    assert_eq!(out, "> 2.75\n");
}

#[test]
fn test_user_in_string_keeps_spaces() {
    let out = run_with_input("out.display(\"[\" + user.in_string + \"]\");", "  padded  \n");
    assert_eq!(out, "> [  padded  ]\n");
}

#[test]
fn test_user_in_boolean_prompt_and_parse() {
    let out = run_with_input("out.display(!user.in_boolean);", "true\n");
    assert_eq!(out, "(true/false)> false\n");
}

#[test]
fn test_malformed_int_input_fails() {
    let err = run_err_with_input("var n: int = user.in;", "twelve\n");
    assert!(err.to_string().contains("invalid integer input"));
}

#[test]
fn test_malformed_boolean_input_fails() {
    let err = run_err_with_input("var b: boolean = user.in_boolean;", "yes\n");
    assert!(err.to_string().contains("invalid boolean input"));
}

#[test]
fn test_unknown_user_command_fails() {
    let err = run_err("var n: int = user.in_number;");
    assert!(err.to_string().contains("unknown user input command"));
}

#[test]
fn test_input_in_skipped_branch_is_not_read() {
    // No input is available; the skipped branch must not prompt for any.
    let out = run_program("if (false) { out.display(user.in); } out.display(\"ok\");");
    assert_eq!(out, "ok\n");
}
