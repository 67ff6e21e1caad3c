use super::token::{Token, TokenKind, KEYWORDS};
use crate::scx_lexical_error;
use crate::utils::err::*;
use crate::utils::info::{FilePos, Info};

pub struct Lexer<'src> {
    src: &'src [u8],
    filename: &'src str,
    pos: usize,
    line: usize,
    col: usize,
}

// Tokenizes the whole preprocessed source up front. The parser indexes into the resulting vector,
// which makes unbounded lookahead for declaration/expression disambiguation cheap.
pub fn tokenize(src: &str, filename: &str) -> CompileResult<Vec<Token>> {
    Lexer::new(src, filename).run()
}

impl<'src> Lexer<'src> {
    fn new(src: &'src str, filename: &'src str) -> Lexer<'src> {
        Lexer {src: src.as_bytes(), filename, pos: 0, line: 1, col: 1}
    }

    fn run(mut self) -> CompileResult<Vec<Token>> {
        let mut tokens = vec![];
        loop {
            self.skip_trivia()?;
            let start = self.file_pos();
            if self.at_end() {
                tokens.push(Token::new(TokenKind::Eof, self.info_from(start)));
                return Ok(tokens);
            }
            let kind = self.scan_token()?;
            tokens.push(Token::new(kind, self.info_from(start)));
        }
    }

    fn file_pos(&self) -> FilePos {
        FilePos::new(self.line, self.col, self.pos)
    }

    fn info_from(&self, start: FilePos) -> Info {
        Info::new(self.filename, start, self.file_pos())
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> u8 {
        *self.src.get(self.pos).unwrap_or(&0)
    }

    fn peek2(&self) -> u8 {
        *self.src.get(self.pos + 1).unwrap_or(&0)
    }

    fn advance(&mut self) -> u8 {
        let c = self.peek();
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        c
    }

    fn advance_with(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn skip_trivia(&mut self) -> CompileResult<()> {
        loop {
            match (self.peek(), self.peek2()) {
                (c, _) if (c as char).is_ascii_whitespace() && c != 0 => {
                    self.advance();
                },
                (b'/', b'/') => {
                    while !self.at_end() && self.peek() != b'\n' {
                        self.advance();
                    }
                },
                (b'/', b'*') => {
                    let start = self.file_pos();
                    self.advance();
                    self.advance();
                    loop {
                        if self.at_end() {
                            let i = self.info_from(start);
                            return scx_lexical_error!(i, "Unterminated block comment");
                        }
                        if self.advance() == b'*' && self.peek() == b'/' {
                            self.advance();
                            break;
                        }
                    }
                },
                _ => return Ok(()),
            }
        }
    }

    fn scan_token(&mut self) -> CompileResult<TokenKind> {
        use TokenKind::*;
        let start = self.file_pos();
        let c = self.peek();
        match c {
            b'(' => Ok(self.advance_with(LParen)),
            b')' => Ok(self.advance_with(RParen)),
            b'{' => Ok(self.advance_with(LBrace)),
            b'}' => Ok(self.advance_with(RBrace)),
            b'[' => Ok(self.advance_with(LBracket)),
            b']' => Ok(self.advance_with(RBracket)),
            b',' => Ok(self.advance_with(Comma)),
            b';' => Ok(self.advance_with(Semicolon)),
            b':' => Ok(self.advance_with(Colon)),
            b'?' => Ok(self.advance_with(Question)),
            b'~' => Ok(self.advance_with(Tilde)),
            b'.' if !self.peek2().is_ascii_digit() => Ok(self.advance_with(Dot)),
            b'+' => {
                self.advance();
                match self.peek() {
                    b'+' => Ok(self.advance_with(Inc)),
                    b'=' => Ok(self.advance_with(AddAssign)),
                    _ => Ok(Plus),
                }
            },
            b'-' => {
                self.advance();
                match self.peek() {
                    b'-' => Ok(self.advance_with(Dec)),
                    b'=' => Ok(self.advance_with(SubAssign)),
                    _ => Ok(Minus),
                }
            },
            b'*' => {
                self.advance();
                match self.peek() {
                    b'=' => Ok(self.advance_with(MulAssign)),
                    _ => Ok(Star),
                }
            },
            b'/' => {
                self.advance();
                match self.peek() {
                    b'=' => Ok(self.advance_with(DivAssign)),
                    _ => Ok(Slash),
                }
            },
            b'%' => {
                self.advance();
                match self.peek() {
                    b'=' => Ok(self.advance_with(RemAssign)),
                    _ => Ok(Percent),
                }
            },
            b'&' => {
                self.advance();
                match self.peek() {
                    b'&' => Ok(self.advance_with(AmpAmp)),
                    b'=' => Ok(self.advance_with(AndAssign)),
                    _ => Ok(Amp),
                }
            },
            b'|' => {
                self.advance();
                match self.peek() {
                    b'|' => Ok(self.advance_with(PipePipe)),
                    b'=' => Ok(self.advance_with(OrAssign)),
                    _ => Ok(Pipe),
                }
            },
            b'^' => {
                self.advance();
                match self.peek() {
                    b'=' => Ok(self.advance_with(XorAssign)),
                    _ => Ok(Caret),
                }
            },
            b'=' => {
                self.advance();
                match self.peek() {
                    b'=' => Ok(self.advance_with(EqEq)),
                    _ => Ok(Assign),
                }
            },
            b'!' => {
                self.advance();
                match self.peek() {
                    b'=' => Ok(self.advance_with(NotEq)),
                    _ => Ok(Not),
                }
            },
            b'<' => {
                self.advance();
                match (self.peek(), self.peek2()) {
                    (b'<', b'=') => {
                        self.advance();
                        Ok(self.advance_with(ShlAssign))
                    },
                    (b'<', _) => Ok(self.advance_with(Shl)),
                    (b'=', _) => Ok(self.advance_with(Leq)),
                    _ => Ok(Lt),
                }
            },
            b'>' => {
                self.advance();
                match (self.peek(), self.peek2()) {
                    (b'>', b'=') => {
                        self.advance();
                        Ok(self.advance_with(ShrAssign))
                    },
                    (b'>', _) => Ok(self.advance_with(Shr)),
                    (b'=', _) => Ok(self.advance_with(Geq)),
                    _ => Ok(Gt),
                }
            },
            b'"' => self.scan_string(start),
            c if c.is_ascii_digit() || c == b'.' => self.scan_number(start),
            c if c.is_ascii_alphabetic() || c == b'_' => Ok(self.scan_identifier()),
            c => {
                let i = self.info_from(start);
                scx_lexical_error!(i, "Unexpected character '{0}'", c as char)
            },
        }
    }

    fn scan_string(&mut self, start: FilePos) -> CompileResult<TokenKind> {
        self.advance();
        let lit_start = self.pos;
        loop {
            if self.at_end() || self.peek() == b'\n' {
                let i = self.info_from(start);
                return scx_lexical_error!(i, "Unterminated string literal");
            }
            if self.peek() == b'"' {
                let text = self.substr(lit_start, self.pos);
                self.advance();
                return Ok(TokenKind::StringLit(text));
            }
            self.advance();
        }
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }
        let text = self.substr(start, self.pos);
        match KEYWORDS.get(text.as_str()) {
            Some(kind) => kind.clone(),
            None => TokenKind::Ident(text),
        }
    }

    fn scan_number(&mut self, start: FilePos) -> CompileResult<TokenKind> {
        let lit_start = self.pos;
        if self.peek() == b'0' && (self.peek2() == b'x' || self.peek2() == b'X') {
            self.advance();
            self.advance();
            while self.peek().is_ascii_hexdigit() {
                self.advance();
            }
            return self.finish_number(start, lit_start, false);
        }
        let mut is_float = false;
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == b'.' {
            is_float = true;
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        if self.peek() == b'e' || self.peek() == b'E' {
            let after = self.peek2();
            if after.is_ascii_digit() || after == b'+' || after == b'-' {
                is_float = true;
                self.advance();
                self.advance();
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
            }
        }
        self.finish_number(start, lit_start, is_float)
    }

    // The suffix decides the literal's data type later on; here it only has to be legal. A
    // trailing alphanumeric run beyond a single valid suffix character is a lexical error.
    fn finish_number(
        &mut self,
        start: FilePos,
        lit_start: usize,
        mut is_float: bool
    ) -> CompileResult<TokenKind> {
        match self.peek() {
            b'u' | b'U' => {
                if is_float {
                    let i = self.info_from(start);
                    return scx_lexical_error!(i, "Invalid suffix 'u' on float literal");
                }
                self.advance();
            },
            b'f' | b'F' | b'h' | b'H' => {
                is_float = true;
                self.advance();
            },
            _ => (),
        }
        if self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            let c = self.peek() as char;
            let i = self.info_from(start);
            return scx_lexical_error!(i, "Invalid character '{c}' in numeric literal");
        }
        let text = self.substr(lit_start, self.pos);
        if is_float {
            Ok(TokenKind::FloatLit(text))
        } else {
            Ok(TokenKind::IntLit(text))
        }
    }

    fn substr(&self, lo: usize, hi: usize) -> String {
        String::from_utf8_lossy(&self.src[lo..hi]).to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src, "test.hlsl").unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn scans_declaration() {
        use TokenKind::*;
        assert_eq!(
            kinds("float4 p = 1.0f;"),
            vec![
                Ident("float4".to_string()),
                Ident("p".to_string()),
                Assign,
                FloatLit("1.0f".to_string()),
                Semicolon,
                Eof
            ]
        );
    }

    #[test]
    fn literal_suffixes() {
        use TokenKind::*;
        assert_eq!(
            kinds("1u 2.5 3.5h 0x1F"),
            vec![
                IntLit("1u".to_string()),
                FloatLit("2.5".to_string()),
                FloatLit("3.5h".to_string()),
                IntLit("0x1F".to_string()),
                Eof
            ]
        );
    }

    #[test]
    fn multi_char_operators() {
        use TokenKind::*;
        assert_eq!(
            kinds("a <<= b >> c <= d ++"),
            vec![
                Ident("a".to_string()),
                ShlAssign,
                Ident("b".to_string()),
                Shr,
                Ident("c".to_string()),
                Leq,
                Ident("d".to_string()),
                Inc,
                Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        use TokenKind::*;
        let src = "// line\nx /* block\nspanning */ y";
        assert_eq!(
            kinds(src),
            vec![Ident("x".to_string()), Ident("y".to_string()), Eof]
        );
    }

    #[test]
    fn line_tracking() {
        let tokens = tokenize("a\n  b", "t.hlsl").unwrap();
        assert_eq!(tokens[0].i.start_line(), 1);
        assert_eq!(tokens[1].i.start_line(), 2);
    }

    #[test]
    fn unterminated_block_comment_is_lexical_error() {
        let r = tokenize("x /* no end", "t.hlsl");
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Lexical);
    }

    #[test]
    fn bad_numeric_suffix_is_lexical_error() {
        let r = tokenize("1.0q", "t.hlsl");
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Lexical);
        let r = tokenize("2.5u", "t.hlsl");
        assert_eq!(r.unwrap_err().kind(), &ErrorKind::Lexical);
    }

    #[test]
    fn leading_dot_float() {
        use TokenKind::*;
        assert_eq!(kinds(".5f"), vec![FloatLit(".5f".to_string()), Eof]);
    }

    #[test]
    fn member_access_is_not_a_float() {
        use TokenKind::*;
        assert_eq!(
            kinds("v.xyz"),
            vec![Ident("v".to_string()), Dot, Ident("xyz".to_string()), Eof]
        );
    }
}
