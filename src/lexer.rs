use std::{iter::Peekable, num::ParseIntError};

use crate::token::{Span, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 1_024;

/// Lexes the provided string, producing the tokens into the provided buffer.
///
/// The produced sequence is always terminated by a [`TokenKind::Eof`] token.
/// Characters outside of the language's alphabet become
/// [`TokenKind::ErrorUnexpectedChar`] tokens; it is up to the caller to report
/// them.
pub fn lex(src: &str, tokens: &mut Vec<Token>) {
    Lexer::new(src, tokens).lex();
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, &mut tokens);
    tokens
}

struct Lexer<'src, 'tok> {
    src: &'src str,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    line: u32,
    tokens: &'tok mut Vec<Token>,
}

impl Lexer<'_, '_> {
    /// Scans the source string until the input is exhausted.
    fn lex(mut self) {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");
        loop {
            let next = self.scan_token_kind();
            self.produce(next);
            if next == TokenKind::Eof {
                break;
            }
        }
    }

    /// Scans the next token, skipping any whitespace before it.
    fn scan_token_kind(&mut self) -> TokenKind {
        use TokenKind::*;
        loop {
            let Some(c) = self.mark_advance() else {
                return Eof;
            };
            let kind = match c {
                '\n' => {
                    self.line += 1;
                    continue;
                }
                c if c.is_ascii_whitespace() => continue,
                '.' => Dot,
                '=' => Eq,
                ',' => Comma,
                ';' => Semicolon,
                ':' => match self.peek() {
                    '=' => self.advance_with(Assign),
                    _ => ErrorUnexpectedChar,
                },
                '?' => Question,
                '!' => Bang,
                '#' => Hash,
                '<' => match self.peek() {
                    '=' => self.advance_with(LessEq),
                    _ => Less,
                },
                '>' => match self.peek() {
                    '=' => self.advance_with(GreaterEq),
                    _ => Greater,
                },
                '+' => Plus,
                '-' => Minus,
                '*' => Star,
                '/' => Slash,
                '(' => LParen,
                ')' => RParen,
                c if c.is_ascii_digit() => self.number(),
                c if c.is_ascii_alphabetic() => self.identifier_or_keyword(),
                _ => ErrorUnexpectedChar,
            };
            return kind;
        }
    }

    /// Keywords are case sensitive and only recognized once the whole run has
    /// been scanned, so `constant` is an identifier.
    fn identifier_or_keyword(&mut self) -> TokenKind {
        while self.peek().is_ascii_alphanumeric() {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        TokenKind::Number
    }
}

impl Lexer<'_, '_> {
    fn new<'src, 'tok>(src: &'src str, tokens: &'tok mut Vec<Token>) -> Lexer<'src, 'tok> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
            line: 1,
            tokens,
        }
    }

    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> Option<char> {
        self.current_lo = self.cursor;
        self.advance()
    }

    /// Returns the next character and advances the iterator.
    fn advance(&mut self) -> Option<char> {
        self.iter.next().inspect(|c| self.cursor += c.len_utf8())
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next character without advancing the iterator. Returns NUL
    /// once the input is exhausted.
    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor, self.line)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        self.span().substr(self.src)
    }

    /// Produces a token using the marked bounds.
    fn produce(&mut self, kind: TokenKind) {
        let token = Token::new(kind, self.span());
        self.tokens.push(token);
    }
}

pub mod extract {
    use super::*;

    pub fn int(token: Token, src: &str) -> Result<i32, ParseIntError> {
        debug_assert_eq!(token.kind, TokenKind::Number);
        token.lexeme(src).parse()
    }

    pub fn ident(token: Token, src: &str) -> &str {
        debug_assert_eq!(token.kind, TokenKind::Identifier);
        token.lexeme(src)
    }

    pub fn unexpected_char(token: Token, src: &str) -> char {
        debug_assert_eq!(token.kind, TokenKind::ErrorUnexpectedChar);
        token.lexeme(src).chars().next().unwrap_or('\0')
    }
}
