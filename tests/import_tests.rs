// ABOUTME: End-to-end tests for imports and the file I/O built-ins

use serial_test::serial;
use starling::error::{Diagnostic, ErrorKind};
use starling::interp::Interpreter;
use std::cell::RefCell;
use std::fs;
use std::io::{Cursor, Write};
use std::rc::Rc;
use tempfile::tempdir;

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

fn run_program(source: &str) -> String {
    let buffer = SharedBuf(Rc::new(RefCell::new(Vec::new())));
    let mut interp = Interpreter::with_io(
        Box::new(buffer.clone()),
        Box::new(Cursor::new(Vec::<u8>::new())),
    );
    interp
        .run_source("main.src", source)
        .expect("program should run to completion");
    let bytes = buffer.0.borrow().clone();
    String::from_utf8(bytes).unwrap()
}

fn run_err(source: &str) -> Diagnostic {
    let buffer = SharedBuf(Rc::new(RefCell::new(Vec::new())));
    let mut interp = Interpreter::with_io(
        Box::new(buffer.clone()),
        Box::new(Cursor::new(Vec::<u8>::new())),
    );
    interp
        .run_source("main.src", source)
        .expect_err("program should fail")
}

// ============================================================================
// Imports
// ============================================================================

#[test]
fn test_import_makes_functions_callable() {
    let dir = tempdir().unwrap();
    let lib = dir.path().join("lib.src");
    fs::write(&lib, "fun pi(): float { return 3.14; }\n").unwrap();

    let out = run_program(&format!("import \"{}\";\nout.display(pi());", lib.display()));
    assert_eq!(out, "3.14\n");
}

#[test]
fn test_import_runs_top_level_statements() {
    let dir = tempdir().unwrap();
    let lib = dir.path().join("noisy.src");
    fs::write(&lib, "out.display(\"loading\");\n").unwrap();

    let out = run_program(&format!(
        "out.display(\"before\");\nimport \"{}\";\nout.display(\"after\");",
        lib.display()
    ));
    assert_eq!(out, "before\nloading\nafter\n");
}

#[test]
fn test_import_is_idempotent() {
    let dir = tempdir().unwrap();
    let lib = dir.path().join("once.src");
    fs::write(&lib, "out.display(\"once\");\nfun lib_fn(): int { return 1; }\n").unwrap();

    let import = format!("import \"{}\";\n", lib.display());
    let out = run_program(&format!("{}{}out.display(lib_fn());", import, import));
    assert_eq!(out, "once\n1\n");
}

#[test]
fn test_circular_imports_terminate() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.src");
    let b = dir.path().join("b.src");
    fs::write(
        &a,
        format!("import \"{}\";\nout.display(\"a loaded\");\n", b.display()),
    )
    .unwrap();
    fs::write(
        &b,
        format!("import \"{}\";\nout.display(\"b loaded\");\n", a.display()),
    )
    .unwrap();

    let out = run_program(&format!("import \"{}\";\nout.display(\"main\");", a.display()));
    assert_eq!(out, "b loaded\na loaded\nmain\n");
}

#[test]
fn test_imported_globals_persist_in_the_importer() {
    let dir = tempdir().unwrap();
    let lib = dir.path().join("vars.src");
    fs::write(&lib, "var shared: int = 41;\n").unwrap();

    let out = run_program(&format!(
        "import \"{}\";\nout.display(shared + 1);",
        lib.display()
    ));
    assert_eq!(out, "42\n");
}

#[test]
fn test_import_resumes_caller_exactly_after_statement() {
    let dir = tempdir().unwrap();
    let lib = dir.path().join("mid.src");
    fs::write(&lib, "fun mid(): string { return \"mid\"; }\n").unwrap();

    let out = run_program(&format!(
        "var before: int = 1;\nimport \"{}\";\nout.display(before);\nout.display(mid());",
        lib.display()
    ));
    assert_eq!(out, "1\nmid\n");
}

#[test]
fn test_missing_import_fails() {
    let err = run_err("import \"no_such_file_anywhere.src\";");
    assert!(matches!(err.kind, ErrorKind::Io(_)));
}

#[test]
fn test_import_error_reports_imported_file() {
    let dir = tempdir().unwrap();
    let lib = dir.path().join("broken.src");
    fs::write(&lib, "var x: int = ;\n").unwrap();

    let err = run_err(&format!("import \"{}\";", lib.display()));
    assert_eq!(err.path, lib.display().to_string());
}

#[test]
fn test_import_inside_skipped_branch_does_nothing() {
    let out = run_program(
        "if (false) { import \"would_not_parse_anyway.src\"; }\nout.display(\"ok\");",
    );
    assert_eq!(out, "ok\n");
}

#[test]
#[serial]
fn test_import_resolves_against_current_directory() {
    let dir = tempdir().unwrap();
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    fs::write("rel_lib.src", "fun from_lib(): int { return 7; }\n").unwrap();
    let out = run_program("import \"rel_lib.src\";\nout.display(from_lib());");

    std::env::set_current_dir(previous).unwrap();
    assert_eq!(out, "7\n");
}

#[test]
fn test_import_functions_survive_buffer_swap_in_loops() {
    // Calling an imported function repeatedly re-parses its body from the
    // imported file's token buffer each time.
    let dir = tempdir().unwrap();
    let lib = dir.path().join("sq.src");
    fs::write(&lib, "fun square(x: int): int { return x * x; }\n").unwrap();

    let out = run_program(&format!(
        "import \"{}\";\nfor (var i: int = 1; i <= 3; i = i + 1) {{ out.display(square(i)); }}",
        lib.display()
    ));
    assert_eq!(out, "1\n4\n9\n");
}

// ============================================================================
// File I/O built-ins
// ============================================================================

#[test]
fn test_write_then_read_round_trip() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("note.txt");

    let out = run_program(&format!(
        "var ok: boolean = write_file_text(\"{path}\", \"line one\\nline two\");\n\
         out.display(ok);\n\
         out.display(read_file_text(\"{path}\"));",
        path = file.display()
    ));
    assert_eq!(out, "true\nline one\nline two\n");
}

#[test]
fn test_read_missing_file_fails() {
    let err = run_err("out.display(read_file_text(\"missing_file.txt\"));");
    assert!(matches!(err.kind, ErrorKind::Io(_)));
}

#[test]
fn test_read_oversized_file_fails() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("big.txt");
    fs::write(&file, "x".repeat(500)).unwrap();

    let err = run_err(&format!(
        "out.display(read_file_text(\"{}\"));",
        file.display()
    ));
    assert!(matches!(err.kind, ErrorKind::Range(_)));
}
