use std::{fmt, ops::Range};

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    lo: usize,
    len: u32,
    line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Token {
        Token {
            kind,
            lo: span.lo,
            len: span.len,
            line: span.line,
        }
    }

    pub fn span(&self) -> Span {
        Span {
            lo: self.lo,
            len: self.len,
            line: self.line,
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// Returns the lexeme, as a view into the source it was lexed from.
    pub fn lexeme<'src>(&self, src: &'src str) -> &'src str {
        self.span().substr(src)
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {})", self.kind, self.span())
    }
}

/// A byte range into the source, plus the line it starts at.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub lo: usize,
    pub len: u32,
    pub line: u32,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>, line: u32) -> Span {
        debug_assert!(hi >= lo);
        let len = u32::try_from(hi - lo).expect("token longer than u32::MAX bytes");
        Self::new_of_length(lo, len, line)
    }

    pub fn new_of_length(lo: usize, len: u32, line: u32) -> Span {
        Span { lo, len, line }
    }

    pub fn hi(&self) -> usize {
        self.lo + self.len as usize
    }

    /// Returns a span covering both `self` and `other`. The line is taken from
    /// the first one.
    pub fn to(self, other: Span) -> Span {
        let lo = self.lo.min(other.lo);
        let hi = self.hi().max(other.hi());
        Span::new_of_bounds(lo..hi, self.line)
    }

    pub fn substr(self, src: &str) -> &str {
        &src[self.lo..self.hi()]
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { span: self, inner }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, line: {})", self.line)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.lo;
        let hi = self.hi();
        write!(f, "{lo}..{hi}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub inner: T,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Const,
    Var,
    Procedure,
    Call,
    Begin,
    End,
    If,
    Then,
    While,
    Do,
    Odd,

    Dot,
    Eq,
    Comma,
    Semicolon,
    /// `:=`
    Assign,
    /// Reads an integer into a variable.
    ///
    /// `?`
    Question,
    /// Prints the value of an expression.
    ///
    /// `!`
    Bang,
    /// Not equal.
    ///
    /// `#`
    Hash,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,

    Identifier,
    Number,

    Eof,
    ErrorUnexpectedChar,
}

impl TokenKind {
    pub fn is_error(self) -> bool {
        matches!(self, TokenKind::ErrorUnexpectedChar)
    }

    /// Tokens at which the parser may resume after a syntax error.
    pub fn is_sync_point(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Const
                | Var
                | Procedure
                | Call
                | Begin
                | End
                | If
                | Then
                | While
                | Do
                | Question
                | Bang
                | Identifier
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;
        let s = match self {
            Const => "'const'",
            Var => "'var'",
            Procedure => "'procedure'",
            Call => "'call'",
            Begin => "'begin'",
            End => "'end'",
            If => "'if'",
            Then => "'then'",
            While => "'while'",
            Do => "'do'",
            Odd => "'odd'",
            Dot => "'.'",
            Eq => "'='",
            Comma => "','",
            Semicolon => "';'",
            Assign => "':='",
            Question => "'?'",
            Bang => "'!'",
            Hash => "'#'",
            Less => "'<'",
            LessEq => "'<='",
            Greater => "'>'",
            GreaterEq => "'>='",
            Plus => "'+'",
            Minus => "'-'",
            Star => "'*'",
            Slash => "'/'",
            LParen => "'('",
            RParen => "')'",
            Identifier => "identifier",
            Number => "number",
            Eof => "end of input",
            ErrorUnexpectedChar => "unexpected character",
        };
        f.write_str(s)
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "const" => TokenKind::Const,
    "var" => TokenKind::Var,
    "procedure" => TokenKind::Procedure,
    "call" => TokenKind::Call,
    "begin" => TokenKind::Begin,
    "end" => TokenKind::End,
    "if" => TokenKind::If,
    "then" => TokenKind::Then,
    "while" => TokenKind::While,
    "do" => TokenKind::Do,
    "odd" => TokenKind::Odd,
};
