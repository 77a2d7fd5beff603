// ABOUTME: Interpreter context, token cursor helpers, two-pass driver, imports

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::rc::Rc;

use crate::call::CallFrame;
use crate::config::{MAX_IMPORTS, MAX_SOURCE_SIZE};
use crate::error::{Diagnostic, ErrorKind, Result};
use crate::functions::FunctionTable;
use crate::lexer::tokenize;
use crate::scope::SymbolTable;
use crate::stmt::Flow;
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// The whole interpreter state: token cursor, scopes, functions, call stack,
/// and the flags the statement executor threads through loops and returns.
///
/// Control flow is implemented by saving and restoring `cursor` over the
/// current token buffer; function calls and imports additionally swap the
/// buffer itself (each buffer is shared via `Rc` with the functions defined
/// from it).
pub struct Interpreter {
    pub(crate) tokens: Rc<Vec<Token>>,
    pub(crate) cursor: usize,
    pub(crate) path: Rc<str>,
    pub(crate) scopes: SymbolTable,
    pub(crate) functions: FunctionTable,
    pub(crate) call_stack: Vec<CallFrame>,
    pub(crate) loop_depth: usize,
    pub(crate) for_loop_vars: Vec<String>,
    pub(crate) return_flag: bool,
    pub(crate) return_value: Value,
    pub(crate) imported: Vec<String>,
    pub(crate) out: Box<dyn Write>,
    pub(crate) input: Box<dyn BufRead>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter wired to the process stdout/stdin.
    pub fn new() -> Self {
        Self::with_io(
            Box::new(io::stdout()),
            Box::new(io::BufReader::new(io::stdin())),
        )
    }

    /// Interpreter with injected I/O handles, used by the tests to capture
    /// `out.display` output and to script `user.*` input.
    pub fn with_io(out: Box<dyn Write>, input: Box<dyn BufRead>) -> Self {
        Interpreter {
            tokens: Rc::new(vec![Token::eof(1)]),
            cursor: 0,
            path: Rc::from("<none>"),
            scopes: SymbolTable::new(),
            functions: FunctionTable::new(),
            call_stack: Vec::new(),
            loop_depth: 0,
            for_loop_vars: Vec::new(),
            return_flag: false,
            return_value: Value::Null,
            imported: Vec::new(),
            out,
            input,
        }
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Read, lex, and interpret a source file.
    pub fn run_file(&mut self, path: &Path) -> Result<()> {
        let display = path.display().to_string();
        let source = fs::read_to_string(path).map_err(|e| {
            self.file_error(&display, ErrorKind::Io(format!("cannot read '{}': {}", display, e)))
        })?;
        self.run_source(&display, &source)
    }

    /// Lex and interpret a source text under the given display path.
    pub fn run_source(&mut self, path: &str, source: &str) -> Result<()> {
        if source.len() >= MAX_SOURCE_SIZE {
            return Err(self.file_error(path, ErrorKind::LimitExceeded("source size")));
        }
        self.tokens = Rc::new(tokenize(source, path)?);
        self.cursor = 0;
        self.path = Rc::from(path);
        self.interpret_current_tokens()
    }

    /// Interpret one REPL line against the persistent global scope.
    pub fn eval_line(&mut self, line: &str) -> Result<()> {
        if self.scopes.depth() == 0 {
            self.scopes
                .enter_scope()
                .map_err(|kind| self.fail(kind))?;
        }
        self.tokens = Rc::new(tokenize(line, "<repl>")?);
        self.cursor = 0;
        self.path = Rc::from("<repl>");
        self.interpret_current_tokens()
    }

    /// Reset transient state after a diagnostic so the REPL can continue:
    /// flags cleared, call frames dropped, scopes unwound to the global one.
    pub fn recover(&mut self) {
        self.return_flag = false;
        self.return_value = Value::Null;
        self.loop_depth = 0;
        self.for_loop_vars.clear();
        self.call_stack.clear();
        while self.scopes.depth() > 1 {
            self.scopes.exit_scope();
        }
    }

    // ========================================================================
    // Two-pass interpretation of the current token buffer
    // ========================================================================

    /// Pass 1 registers every top-level `fun`; pass 2 rewinds and executes
    /// the remaining top-level statements.
    pub(crate) fn interpret_current_tokens(&mut self) -> Result<()> {
        let prev_loop_depth = self.loop_depth;
        self.loop_depth = 0;
        let start = self.cursor;

        while !self.at_eof() {
            if *self.peek_kind() == TokenKind::Fun {
                self.parse_fun_declaration()?;
            } else {
                let mut flow = Flow::default();
                self.parse_statement(false, &mut flow, false)?;
            }
        }

        self.cursor = start;
        let opened_file_scope = self.scopes.depth() == 0;
        if opened_file_scope {
            self.scopes.enter_scope().map_err(|kind| self.fail(kind))?;
        }
        self.return_flag = false;

        while !self.at_eof() {
            if *self.peek_kind() == TokenKind::Fun {
                self.skip_fun_declaration()?;
            } else {
                let mut flow = Flow::default();
                self.parse_statement(true, &mut flow, false)?;
                if self.return_flag {
                    return Err(self.fail(ErrorKind::Semantic(
                        "'return' is only allowed inside a function body".to_string(),
                    )));
                }
                if flow.break_hit || flow.continue_hit {
                    return Err(self.fail(ErrorKind::Semantic(
                        "'break' and 'continue' are only allowed inside a loop".to_string(),
                    )));
                }
            }
        }

        if opened_file_scope {
            self.scopes.exit_scope();
        }
        self.loop_depth = prev_loop_depth;
        Ok(())
    }

    // ========================================================================
    // Imports
    // ========================================================================

    /// `import "path";` — lex and interpret another file, then resume.
    ///
    /// The imported file's functions and top-level variables merge into the
    /// current global state; a path is only ever imported once.
    pub(crate) fn parse_import_statement(&mut self, execute: bool) -> Result<()> {
        self.expect(TokenKind::Import)?;
        let file = self.expect_string_literal()?;
        self.expect(TokenKind::Semicolon)?;
        if !execute {
            return Ok(());
        }
        if self.imported.iter().any(|p| *p == file) {
            return Ok(());
        }
        if self.imported.len() >= MAX_IMPORTS {
            return Err(self.fail(ErrorKind::LimitExceeded("import")));
        }
        self.imported.push(file.clone());

        let source = fs::read_to_string(&file).map_err(|e| {
            self.fail(ErrorKind::Io(format!(
                "cannot read imported file '{}': {}",
                file, e
            )))
        })?;
        if source.len() >= MAX_SOURCE_SIZE {
            return Err(self.fail(ErrorKind::LimitExceeded("source size")));
        }
        let imported_tokens = Rc::new(tokenize(&source, &file)?);

        let saved_tokens = Rc::clone(&self.tokens);
        let saved_cursor = self.cursor;
        let saved_path = Rc::clone(&self.path);

        self.tokens = imported_tokens;
        self.cursor = 0;
        self.path = Rc::from(file.as_str());
        let result = self.interpret_current_tokens();

        self.tokens = saved_tokens;
        self.cursor = saved_cursor;
        self.path = saved_path;
        result
    }

    // ========================================================================
    // Token cursor
    // ========================================================================

    pub(crate) fn peek(&self) -> &Token {
        let idx = self.cursor.min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn peek_kind_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.cursor + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.cursor < self.tokens.len() - 1 {
            self.cursor += 1;
        }
        token
    }

    /// Consume a token of exactly this kind or fail.
    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if *self.peek_kind() == kind {
            return Ok(self.advance());
        }
        Err(self.unexpected(kind.name()))
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<String> {
        if let TokenKind::Identifier(name) = self.peek_kind() {
            let name = name.clone();
            self.advance();
            return Ok(name);
        }
        Err(self.unexpected("identifier"))
    }

    pub(crate) fn expect_string_literal(&mut self) -> Result<String> {
        if let TokenKind::StringLiteral(text) = self.peek_kind() {
            let text = text.clone();
            self.advance();
            return Ok(text);
        }
        Err(self.unexpected("string literal"))
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Pin an error kind to the current token position.
    pub(crate) fn fail(&self, kind: ErrorKind) -> Diagnostic {
        let token = self.peek();
        Diagnostic {
            path: self.path.to_string(),
            line: token.line,
            token_index: self.cursor,
            lexeme: token.lexeme.clone(),
            kind,
        }
    }

    pub(crate) fn unexpected(&self, expected: &str) -> Diagnostic {
        let token = self.peek();
        let kind = if matches!(token.kind, TokenKind::Eof) {
            ErrorKind::UnexpectedEof {
                expected: expected.to_string(),
            }
        } else {
            ErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                found: token.kind.name().to_string(),
                lexeme: token.lexeme.clone(),
            }
        };
        self.fail(kind)
    }

    fn file_error(&self, path: &str, kind: ErrorKind) -> Diagnostic {
        Diagnostic {
            path: path.to_string(),
            line: 1,
            token_index: 0,
            lexeme: String::new(),
            kind,
        }
    }
}
