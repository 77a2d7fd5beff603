// ABOUTME: Lexer turning source text into a linear token sequence

use crate::config::{MAX_IDENT_LEN, MAX_STRING_LEN, MAX_TOKENS};
use crate::error::{Diagnostic, ErrorKind, Result};
use crate::token::{Token, TokenKind};

/// Lex a whole source text into tokens, terminated by an `Eof` token.
///
/// `path` is only used for diagnostics.
pub fn tokenize(source: &str, path: &str) -> Result<Vec<Token>> {
    Lexer::new(source, path).run()
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    path: &'a str,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(source: &str, path: &'a str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            path,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                if c == '\n' {
                    self.line += 1;
                }
                self.pos += 1;
            } else if c == '/' && self.peek_at(1) == Some('/') {
                self.skip_line_comment();
            } else if c == '#' {
                self.skip_line_comment();
            } else if c == '/' && self.peek_at(1) == Some('*') {
                self.skip_block_comment()?;
            } else if c.is_ascii_alphabetic() || c == '_' {
                self.lex_identifier()?;
            } else if c.is_ascii_digit()
                || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()))
            {
                self.lex_number()?;
            } else if c == '"' {
                self.lex_string()?;
            } else {
                self.lex_operator()?;
            }
        }
        let eof = Token::eof(self.line);
        self.push(eof)?;
        Ok(self.tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, token: Token) -> Result<()> {
        if self.tokens.len() >= MAX_TOKENS {
            return Err(self.fail(ErrorKind::LimitExceeded("token"), String::new()));
        }
        self.tokens.push(token);
        Ok(())
    }

    fn fail(&self, kind: ErrorKind, lexeme: String) -> Diagnostic {
        Diagnostic {
            path: self.path.to_string(),
            line: self.line,
            token_index: self.tokens.len(),
            lexeme,
            kind,
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        let start_line = self.line;
        self.pos += 2;
        loop {
            match self.peek() {
                None => {
                    self.line = start_line;
                    return Err(self.fail(ErrorKind::UnclosedBlockComment, "/*".to_string()));
                }
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.pos += 2;
                    return Ok(());
                }
                Some(c) => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    self.pos += 1;
                }
            }
        }
    }

    fn lex_identifier(&mut self) -> Result<()> {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            if ident.len() >= MAX_IDENT_LEN - 1 {
                return Err(self.fail(
                    ErrorKind::Lexical("identifier too long".to_string()),
                    ident,
                ));
            }
            ident.push(c);
            self.pos += 1;
        }
        let line = self.line;
        let token = match TokenKind::keyword(&ident) {
            Some(kind) => Token::new(kind, ident, line),
            None => Token::new(TokenKind::Identifier(ident.clone()), ident, line),
        };
        self.push(token)
    }

    fn lex_number(&mut self) -> Result<()> {
        let mut text = String::new();
        let mut is_float = false;
        if self.peek() == Some('.') {
            is_float = true;
            text.push('.');
            self.pos += 1;
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.push_number_char(&mut text, c)?;
            } else if c == '.' && !is_float {
                is_float = true;
                self.push_number_char(&mut text, c)?;
            } else {
                break;
            }
        }
        let line = self.line;
        let token = if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| self.fail(ErrorKind::Range("invalid float literal".into()), text.clone()))?;
            Token::new(TokenKind::FloatLiteral(value), text, line)
        } else {
            let value: i64 = text.parse().map_err(|_| {
                self.fail(
                    ErrorKind::Range("integer literal out of range".into()),
                    text.clone(),
                )
            })?;
            Token::new(TokenKind::IntLiteral(value), text, line)
        };
        self.push(token)
    }

    fn push_number_char(&mut self, text: &mut String, c: char) -> Result<()> {
        if text.len() >= MAX_STRING_LEN - 1 {
            return Err(self.fail(
                ErrorKind::Lexical("number literal too long".to_string()),
                text.clone(),
            ));
        }
        text.push(c);
        self.pos += 1;
        Ok(())
    }

    fn lex_string(&mut self) -> Result<()> {
        self.pos += 1;
        let mut content = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(self.fail(ErrorKind::UnterminatedString, content));
            };
            if c == '"' {
                self.pos += 1;
                break;
            }
            if content.chars().count() >= MAX_STRING_LEN - 1 {
                return Err(self.fail(
                    ErrorKind::Lexical("string literal too long".to_string()),
                    content,
                ));
            }
            if c == '\\' && self.peek_at(1).is_some() {
                self.pos += 1;
                let escaped = self.peek().unwrap();
                content.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    '"' => '"',
                    '\\' => '\\',
                    other => other,
                });
                self.pos += 1;
            } else {
                content.push(c);
                self.pos += 1;
            }
        }
        let line = self.line;
        let lexeme = quoted_lexeme(&content);
        self.push(Token::new(TokenKind::StringLiteral(content), lexeme, line))
    }

    fn lex_operator(&mut self) -> Result<()> {
        let c = self.peek().unwrap();
        let next = self.peek_at(1);
        let (kind, len) = match (c, next) {
            ('=', Some('=')) => (TokenKind::EqEq, 2),
            ('=', _) => (TokenKind::Assign, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('{', _) => (TokenKind::LBrace, 1),
            ('}', _) => (TokenKind::RBrace, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            (':', _) => (TokenKind::Colon, 1),
            (';', _) => (TokenKind::Semicolon, 1),
            ('.', _) => (TokenKind::Dot, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('>', Some('=')) => (TokenKind::GreaterEq, 2),
            ('>', _) => (TokenKind::Greater, 1),
            ('<', Some('=')) => (TokenKind::LessEq, 2),
            ('<', _) => (TokenKind::Less, 1),
            ('!', Some('=')) => (TokenKind::NotEq, 2),
            ('!', _) => (TokenKind::Bang, 1),
            ('&', Some('&')) => (TokenKind::AndAnd, 2),
            ('&', _) => {
                return Err(self.fail(
                    ErrorKind::Lexical("unexpected '&', did you mean '&&'?".to_string()),
                    "&".to_string(),
                ));
            }
            ('|', Some('|')) => (TokenKind::OrOr, 2),
            ('|', _) => {
                return Err(self.fail(
                    ErrorKind::Lexical("unexpected '|', did you mean '||'?".to_string()),
                    "|".to_string(),
                ));
            }
            (other, _) => {
                return Err(self.fail(ErrorKind::UnknownCharacter(other), other.to_string()));
            }
        };
        let lexeme: String = self.chars[self.pos..self.pos + len].iter().collect();
        self.pos += len;
        let line = self.line;
        self.push(Token::new(kind, lexeme, line))
    }
}

/// Quoted, possibly shortened lexeme for a string literal diagnostic.
fn quoted_lexeme(content: &str) -> String {
    let count = content.chars().count();
    if count > MAX_IDENT_LEN - 3 {
        let head: String = content.chars().take(MAX_IDENT_LEN - 6).collect();
        format!("\"{}...\"", head)
    } else {
        format!("\"{}\"", content)
    }
}
