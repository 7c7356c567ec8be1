use crate::diagnostic::Diagnostic;
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

pub(crate) struct Lexer<'src> {
    source: &'src [u8],
    file_id: u16,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    pub(crate) fn new(source: &'src str, file_id: u16) -> Self {
        Self {
            source: source.as_bytes(),
            file_id,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn tokenize(mut self) -> (Vec<Spanned<Lexeme>>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.node == Lexeme::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn next_token(&mut self) -> Spanned<Lexeme> {
        loop {
            self.skip_whitespace_and_comments();

            if self.pos >= self.source.len() {
                return self.make_token(Lexeme::Eof, self.pos, self.pos);
            }

            let start = self.pos;
            let ch = self.source[self.pos];

            if is_ident_start(ch) {
                return self.scan_ident_or_keyword();
            }

            if ch.is_ascii_digit() {
                return self.scan_number();
            }

            if ch == b'"' {
                if let Some(tok) = self.scan_string(start) {
                    return tok;
                }
                continue;
            }

            if let Some(tok) = self.scan_symbol(start) {
                return tok;
            }
            // scan_symbol returned None → error was recorded, try again
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if self.pos + 1 < self.source.len()
                && self.source[self.pos] == b'/'
                && self.source[self.pos + 1] == b'/'
            {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    fn text(&self, start: usize, end: usize) -> String {
        String::from_utf8_lossy(&self.source[start..end]).into_owned()
    }

    /// Identifiers may carry a `.N` disambiguation suffix (`t.12`).
    fn scan_ident_or_keyword(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
        let text = self.text(start, self.pos);
        let token = Lexeme::from_keyword(&text).unwrap_or(Lexeme::Ident(text));
        self.make_token(token, start, self.pos)
    }

    fn scan_number(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let is_real =
            self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit());
        if is_real {
            self.pos += 1;
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
            let text = self.text(start, self.pos);
            let value = text.parse::<f64>().unwrap_or(0.0);
            return self.make_token(Lexeme::Real(value), start, self.pos);
        }
        let text = self.text(start, self.pos);
        match text.parse::<u64>() {
            Ok(n) => self.make_token(Lexeme::Integer(n), start, self.pos),
            Err(_) => {
                self.diagnostics.push(
                    Diagnostic::error(
                        format!("integer literal '{}' is too large", text),
                        Span::new(self.file_id, start as u32, self.pos as u32),
                    )
                    .with_help(format!("maximum integer value is {}", i64::MAX)),
                );
                self.make_token(Lexeme::Integer(0), start, self.pos)
            }
        }
    }

    fn scan_string(&mut self, start: usize) -> Option<Spanned<Lexeme>> {
        self.pos += 1; // opening quote
        let mut value = String::new();
        let mut chunk_start = self.pos;
        while self.pos < self.source.len() {
            match self.source[self.pos] {
                b'"' => {
                    value.push_str(&self.text(chunk_start, self.pos));
                    self.pos += 1;
                    return Some(self.make_token(Lexeme::Str(value), start, self.pos));
                }
                b'\\' => {
                    value.push_str(&self.text(chunk_start, self.pos));
                    let escaped = match self.peek_at(1) {
                        Some(b'n') => '\n',
                        Some(b't') => '\t',
                        Some(b'"') => '"',
                        Some(b'\\') => '\\',
                        _ => {
                            self.diagnostics.push(Diagnostic::error(
                                "unknown escape sequence in string literal".to_string(),
                                Span::new(self.file_id, self.pos as u32, self.pos as u32 + 2),
                            ));
                            '?'
                        }
                    };
                    value.push(escaped);
                    self.pos += 2;
                    chunk_start = self.pos;
                }
                b'\n' => break,
                _ => self.pos += 1,
            }
        }
        self.diagnostics.push(
            Diagnostic::error(
                "unterminated string literal".to_string(),
                Span::new(self.file_id, start as u32, self.pos as u32),
            )
            .with_help("close the string with '\"' before the end of the line".to_string()),
        );
        None
    }

    fn scan_symbol(&mut self, start: usize) -> Option<Spanned<Lexeme>> {
        let ch = self.source[self.pos];
        self.pos += 1;

        let token = match ch {
            b'(' => Lexeme::LParen,
            b')' => Lexeme::RParen,
            b'{' => Lexeme::LBrace,
            b'}' => Lexeme::RBrace,
            b'[' => Lexeme::LBracket,
            b']' => Lexeme::RBracket,
            b',' => Lexeme::Comma,
            b';' => Lexeme::Semicolon,
            b'@' => Lexeme::At,
            b'~' => Lexeme::Tilde,
            b':' => self.with_eq(Lexeme::Colon, Lexeme::ColonEq),
            b'=' => self.with_eq(Lexeme::Eq, Lexeme::EqEq),
            b'!' => self.with_eq(Lexeme::Bang, Lexeme::NotEq),
            b'+' => self.with_eq(Lexeme::Plus, Lexeme::PlusEq),
            b'-' => self.with_eq(Lexeme::Minus, Lexeme::MinusEq),
            b'*' => self.with_eq(Lexeme::Star, Lexeme::StarEq),
            b'/' => self.with_eq(Lexeme::Slash, Lexeme::SlashEq),
            b'%' => self.with_eq(Lexeme::Percent, Lexeme::PercentEq),
            b'&' => self.with_eq(Lexeme::Amp, Lexeme::AmpEq),
            b'|' => self.with_eq(Lexeme::Pipe, Lexeme::PipeEq),
            b'^' => self.with_eq(Lexeme::Caret, Lexeme::CaretEq),
            b'<' => {
                if self.peek() == Some(b'<') {
                    self.pos += 1;
                    self.with_eq(Lexeme::Shl, Lexeme::ShlEq)
                } else {
                    self.with_eq(Lexeme::Lt, Lexeme::Le)
                }
            }
            b'>' => {
                if self.peek() == Some(b'>') {
                    self.pos += 1;
                    self.with_eq(Lexeme::Shr, Lexeme::ShrEq)
                } else {
                    self.with_eq(Lexeme::Gt, Lexeme::Ge)
                }
            }
            _ => {
                self.diagnostics.push(
                    Diagnostic::error(
                        format!("unexpected character '{}' (U+{:04X})", ch as char, ch),
                        Span::new(self.file_id, start as u32, self.pos as u32),
                    )
                    .with_help("this character is not part of the offload IR syntax".to_string()),
                );
                return None;
            }
        };

        Some(self.make_token(token, start, self.pos))
    }

    /// `plain`, or `with_eq` if the next byte is `=`.
    fn with_eq(&mut self, plain: Lexeme, with_eq: Lexeme) -> Lexeme {
        if self.peek() == Some(b'=') {
            self.pos += 1;
            with_eq
        } else {
            plain
        }
    }

    fn peek(&self) -> Option<u8> {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.source.get(self.pos + ahead).copied()
    }

    fn make_token(&self, token: Lexeme, start: usize, end: usize) -> Spanned<Lexeme> {
        Spanned::new(token, Span::new(self.file_id, start as u32, end as u32))
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}
