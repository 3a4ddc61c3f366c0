use std::num::IntErrorKind;

use crate::{
    ast::{
        BinaryOperator, Block, ConstDecl, Expr, ExprKind, Ident, Procedure, Program, Stmt,
        StmtKind, UnaryOperator,
    },
    lexer::{self, extract},
    token::{Spanned, Token, TokenKind},
    util::intern::Interner,
};

type Result<T, E = ()> = std::result::Result<T, E>;

pub type ParseResult<T> = Result<T, Vec<Spanned<Error>>>;

const RELATIONAL_OPERATORS: &[TokenKind] = &[
    TokenKind::Eq,
    TokenKind::Hash,
    TokenKind::Less,
    TokenKind::LessEq,
    TokenKind::Greater,
    TokenKind::GreaterEq,
];

/// Statements, procedures and parenthesized expressions may nest this deep.
/// Reaching the limit stops the parse.
pub const MAX_NESTING_DEPTH: usize = 256;

/// Lexes and parses a whole program.
///
/// If the source contains characters outside of the language's alphabet,
/// each one is reported and parsing doesn't start. Otherwise the parser
/// collects as many independent syntax errors as it can find in one pass.
/// The tree is only returned if no error was recorded.
pub fn parse_program(
    src: &str,
    tokens: &mut Vec<Token>,
    ident_interner: &mut Interner<str>,
) -> ParseResult<Program> {
    assert!(tokens.is_empty());
    lexer::lex(src, tokens);

    let lexer_errors: Vec<_> = tokens
        .iter()
        .filter(|token| token.kind.is_error())
        .map(|&token| {
            let c = extract::unexpected_char(token, src);
            token.span().wrap(Error::UnexpectedChar(c))
        })
        .collect();
    if !lexer_errors.is_empty() {
        return Err(lexer_errors);
    }

    let mut p = Parser::new(src, tokens, ident_interner);
    let parse_result = p.parse_program();
    match parse_result {
        Ok(program) if p.errors.is_empty() => Ok(program),
        _ => {
            debug_assert!(!p.errors.is_empty(), "failed without reporting");
            Err(p.errors)
        }
    }
}

struct Parser<'src, 'tok, 'ident> {
    src: &'src str,
    tokens: &'tok [Token],
    ident_interner: &'ident mut Interner<str>,
    cursor: usize,
    /// Set by the first error of a broken construct. While set, further errors
    /// are not recorded.
    panicking: bool,
    /// Current nesting of statements, procedures and parentheses.
    depth: usize,
    /// Set once the nesting limit is reached. Nothing is recorded after it.
    halted: bool,
    errors: Vec<Spanned<Error>>,
}

impl Parser<'_, '_, '_> {
    fn parse_program(&mut self) -> Result<Program> {
        let block = self.parse_block();
        let dot = self.consume(TokenKind::Dot);
        let block = block?;
        dot?;
        self.consume(TokenKind::Eof)?;
        Ok(Program { block })
    }

    /// Parses a block. A failing section doesn't stop the block from parsing
    /// its remaining sections, but the block itself fails.
    fn parse_block(&mut self) -> Result<Block> {
        let mut failed = false;

        let consts = if self.take(TokenKind::Const) {
            self.parse_const_decls().unwrap_or_else(|()| {
                failed = true;
                Vec::new()
            })
        } else {
            Vec::new()
        };
        self.synchronize();

        let vars = if self.take(TokenKind::Var) {
            self.parse_var_decls().unwrap_or_else(|()| {
                failed = true;
                Vec::new()
            })
        } else {
            Vec::new()
        };
        self.synchronize();

        let mut procedures = Vec::new();
        while self.take(TokenKind::Procedure) {
            match self.parse_procedure() {
                Ok(procedure) => procedures.push(procedure),
                Err(()) => failed = true,
            }
            self.synchronize();
        }

        let body = self.parse_stmt()?;
        if failed {
            return Err(());
        }
        Ok(Block {
            consts,
            vars,
            procedures,
            body,
        })
    }

    fn parse_const_decls(&mut self) -> Result<Vec<ConstDecl>> {
        let mut decls = Vec::with_capacity(4);
        loop {
            let name = self.parse_ident()?;
            self.consume(TokenKind::Eq)?;
            let value = self.parse_int()?;
            decls.push(ConstDecl { name, value });
            if !self.take(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::Semicolon)?;
        Ok(decls)
    }

    fn parse_var_decls(&mut self) -> Result<Vec<Ident>> {
        let mut names = Vec::with_capacity(4);
        loop {
            names.push(self.parse_ident()?);
            if !self.take(TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::Semicolon)?;
        Ok(names)
    }

    fn parse_procedure(&mut self) -> Result<Procedure> {
        let name = self.parse_ident()?;
        self.consume(TokenKind::Semicolon)?;
        let body = self.nested(Self::parse_block)?;
        self.consume(TokenKind::Semicolon)?;
        Ok(Procedure { name, body })
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        self.synchronize();

        let token = self.peek();
        if !Self::starts_stmt(token.kind) {
            self.error(token.span().wrap(Error::InvalidStatement { actual: token.kind }));
            return Err(());
        }
        self.advance();

        let (kind, span) = match token.kind {
            // Assignment: ID := expr
            TokenKind::Identifier => {
                let target = self.ident(token);
                self.consume(TokenKind::Assign)?;
                let value = self.parse_expr()?;
                let span = token.span().to(value.span);
                (StmtKind::Assign { target, value }, span)
            }

            // Call: call ID
            TokenKind::Call => {
                let callee = self.parse_ident()?;
                (StmtKind::Call(callee), token.span().to(callee.span))
            }

            // Input: ? ID
            TokenKind::Question => {
                let destination = self.parse_ident()?;
                (StmtKind::Input(destination), token.span().to(destination.span))
            }

            // Print: ! expr
            TokenKind::Bang => {
                let argument = self.parse_expr()?;
                let span = token.span().to(argument.span);
                (StmtKind::Print(argument), span)
            }

            // Sequence: begin stmt [; stmt]* end
            TokenKind::Begin => {
                let mut body = Vec::with_capacity(4);
                let mut failed = false;
                loop {
                    match self.nested(Self::parse_stmt) {
                        Ok(stmt) => body.push(stmt),
                        Err(()) => failed = true,
                    }
                    if self.take(TokenKind::Semicolon) {
                        continue;
                    }
                    if !self.panicking {
                        break;
                    }
                    // Resume at the statement following the broken one.
                    self.synchronize();
                    if !Self::starts_stmt(self.peek().kind) {
                        break;
                    }
                }
                let end = self.consume(TokenKind::End)?;
                if failed {
                    return Err(());
                }
                (StmtKind::Begin(body), token.span().to(end.span()))
            }

            // Conditional: if condition then stmt
            TokenKind::If => {
                let condition = self.parse_condition()?;
                self.consume(TokenKind::Then)?;
                let body = self.nested(Self::parse_stmt)?;
                let span = token.span().to(body.span);
                let body = Box::new(body);
                (StmtKind::If { condition, body }, span)
            }

            // Loop: while condition do stmt
            TokenKind::While => {
                let condition = self.parse_condition()?;
                self.consume(TokenKind::Do)?;
                let body = self.nested(Self::parse_stmt)?;
                let span = token.span().to(body.span);
                let body = Box::new(body);
                (StmtKind::While { condition, body }, span)
            }

            _ => unreachable!("checked above"),
        };

        Ok(Stmt { kind, span })
    }

    /// Relational operators don't chain: a condition has exactly one of them,
    /// or is an `odd` test.
    fn parse_condition(&mut self) -> Result<Expr> {
        if self.is(TokenKind::Odd) {
            let odd = self.advance();
            let operand = self.parse_expr()?;
            let span = odd.span().to(operand.span);
            return Ok(Expr {
                kind: ExprKind::Odd(Box::new(operand)),
                span,
            });
        }

        let lhs = self.parse_expr()?;
        let op_token = self.consume_any(RELATIONAL_OPERATORS)?;
        let rhs = self.parse_expr()?;
        let op = match op_token.kind {
            TokenKind::Eq => BinaryOperator::Eq,
            TokenKind::Hash => BinaryOperator::Ne,
            TokenKind::Less => BinaryOperator::Lt,
            TokenKind::LessEq => BinaryOperator::Le,
            TokenKind::Greater => BinaryOperator::Gt,
            TokenKind::GreaterEq => BinaryOperator::Ge,
            _ => unreachable!(),
        };
        Ok(Self::binary(op, lhs, rhs))
    }

    /// A leading sign applies to the whole chain of terms that follows it.
    fn parse_expr(&mut self) -> Result<Expr> {
        let sign = if self.is(TokenKind::Plus) || self.is(TokenKind::Minus) {
            Some(self.advance())
        } else {
            None
        };

        let mut lhs = self.parse_term()?;
        while let Some(op_token) = self.take_any(&[TokenKind::Plus, TokenKind::Minus]) {
            let rhs = self.parse_term()?;
            let op = match op_token.kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => unreachable!(),
            };
            lhs = Self::binary(op, lhs, rhs);
        }

        let Some(sign) = sign else {
            return Ok(lhs);
        };
        let op = match sign.kind {
            TokenKind::Plus => UnaryOperator::Plus,
            TokenKind::Minus => UnaryOperator::Minus,
            _ => unreachable!(),
        };
        let span = sign.span().to(lhs.span);
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                expr: Box::new(lhs),
            },
            span,
        })
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_factor()?;
        while let Some(op_token) = self.take_any(&[TokenKind::Star, TokenKind::Slash]) {
            let rhs = self.parse_factor()?;
            let op = match op_token.kind {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                _ => unreachable!(),
            };
            lhs = Self::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let token = self.peek();
        let kind = match token.kind {
            TokenKind::Identifier => {
                self.advance();
                ExprKind::Id(self.ident(token))
            }
            TokenKind::Number => ExprKind::Int(self.parse_int()?),
            // Grouping: ( expr )
            TokenKind::LParen => {
                self.advance();
                let expr = self.nested(Self::parse_expr)?;
                self.consume(TokenKind::RParen)?;
                return Ok(expr);
            }
            other => {
                self.error(token.span().wrap(Error::InvalidExpression { actual: other }));
                return Err(());
            }
        };
        Ok(Expr {
            kind,
            span: token.span(),
        })
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.consume(TokenKind::Identifier)?;
        Ok(self.ident(token))
    }

    /// Literals are range checked against the 32-bit integer type.
    fn parse_int(&mut self) -> Result<i32> {
        let token = self.consume(TokenKind::Number)?;
        match extract::int(token, self.src) {
            Ok(value) => Ok(value),
            Err(error) => {
                let lexeme = Box::from(token.lexeme(self.src));
                let error = match error.kind() {
                    IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                        Error::IntegerOutOfRange(lexeme)
                    }
                    _ => Error::InvalidInteger(lexeme),
                };
                self.error(token.span().wrap(error));
                Err(())
            }
        }
    }

    fn starts_stmt(kind: TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::Identifier
                | TokenKind::Call
                | TokenKind::Question
                | TokenKind::Bang
                | TokenKind::Begin
                | TokenKind::If
                | TokenKind::While
        )
    }

    fn binary(op: BinaryOperator, lhs: Expr, rhs: Expr) -> Expr {
        let span = lhs.span.to(rhs.span);
        Expr {
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        }
    }
}

impl Parser<'_, '_, '_> {
    fn new<'src, 'tok, 'ident>(
        src: &'src str,
        tokens: &'tok [Token],
        ident_interner: &'ident mut Interner<str>,
    ) -> Parser<'src, 'tok, 'ident> {
        debug_assert!(tokens.last().is_some_and(Token::is_eof));
        Parser {
            src,
            tokens,
            ident_interner,
            cursor: 0,
            panicking: false,
            depth: 0,
            halted: false,
            errors: Vec::with_capacity(8),
        }
    }

    /// Records an error and enters panic mode. Nothing is recorded if the
    /// parser is already panicking.
    fn error(&mut self, error: Spanned<Error>) {
        if !self.panicking && !self.halted {
            self.errors.push(error);
        }
        self.panicking = true;
    }

    /// Runs `parse` one nesting level deeper. At the nesting limit, reports the
    /// current token and skips to the end of input.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth == MAX_NESTING_DEPTH {
            let token = self.peek();
            self.error(token.span().wrap(Error::NestingTooDeep));
            self.halted = true;
            self.cursor = self.tokens.len() - 1;
            return Err(());
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// If panicking, discards tokens until a synchronization point (or the end
    /// of input) is reached and leaves panic mode.
    fn synchronize(&mut self) {
        if !self.panicking {
            return;
        }
        loop {
            let c = self.peek().kind;
            if c == TokenKind::Eof || c.is_sync_point() {
                break;
            }
            self.advance();
        }
        self.panicking = false;
    }

    /// Returns the current token.
    #[inline]
    fn peek(&self) -> Token {
        self.tokens[self.cursor]
    }

    /// Returns the current token and advances. Never advances past the
    /// [`TokenKind::Eof`] token.
    fn advance(&mut self) -> Token {
        let c = self.peek();
        if !c.is_eof() {
            self.cursor += 1;
        }
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Like [`Parser::take`], but for any of the provided tokens. Returns the
    /// matched token.
    fn take_any(&mut self, expect: &[TokenKind]) -> Option<Token> {
        expect
            .iter()
            .any(|&t| self.is(t))
            .then(|| self.advance())
    }

    /// Advances if the current token matches the provided one. If not, records
    /// an error.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        let c = self.peek();
        if self.is(expect) {
            self.advance();
            Ok(c)
        } else {
            self.error(c.span().wrap(Error::Unexpected {
                actual: c.kind,
                expected: expect,
            }));
            Err(())
        }
    }

    /// Advances if the current token matches any of the provided tokens. If
    /// not, records an error.
    fn consume_any(&mut self, expect: &'static [TokenKind]) -> Result<Token> {
        if let Some(token) = self.take_any(expect) {
            return Ok(token);
        }
        let c = self.peek();
        self.error(c.span().wrap(Error::UnexpectedAny {
            actual: c.kind,
            expected: Box::from(expect),
        }));
        Err(())
    }

    fn ident(&mut self, token: Token) -> Ident {
        Ident {
            name: self.ident_interner.intern(extract::ident(token, self.src)),
            span: token.span(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Unexpected {
        actual: TokenKind,
        expected: TokenKind,
    },
    UnexpectedAny {
        actual: TokenKind,
        expected: Box<[TokenKind]>,
    },
    InvalidStatement {
        actual: TokenKind,
    },
    InvalidExpression {
        actual: TokenKind,
    },
    IntegerOutOfRange(Box<str>),
    InvalidInteger(Box<str>),
    UnexpectedChar(char),
    NestingTooDeep,
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{test_utils::parse_program, MAX_NESTING_DEPTH};
    use crate::{
        ast::StmtKind,
        util::{
            intern::Interner,
            test_utils::{format_errors, tree_tests},
        },
    };

    #[test]
    fn test_tree_shape() {
        let (i, prog) = parse_program("const a = 5; var b; b := a + 1 .");
        let block = &prog.block;
        assert_eq!(block.consts.len(), 1);
        assert_eq!(i.get(block.consts[0].name), "a");
        assert_eq!(block.consts[0].value, 5);
        assert_eq!(block.vars.len(), 1);
        assert_eq!(i.get(block.vars[0]), "b");
        assert!(block.procedures.is_empty());
        assert!(matches!(block.body.kind, StmtKind::Assign { .. }));
    }

    fn nesting_errors(src: &str) -> Vec<String> {
        let i = &mut Interner::with_capacity(8);
        match crate::parser::parse_program(src, &mut Vec::new(), i) {
            Ok(_) => vec![],
            Err(errors) => format_errors(i, &errors),
        }
    }

    #[test]
    fn test_nesting_limit() {
        let parens = |n| format!("!{}1{}.", "(".repeat(n), ")".repeat(n));
        assert_eq!(nesting_errors(&parens(MAX_NESTING_DEPTH)), Vec::<String>::new());
        assert_eq!(
            nesting_errors(&parens(20_000)),
            ["line 1: nesting is too deep, the limit is 256"]
        );

        let begins = |n| format!("{} !1 {}.", "begin ".repeat(n), " end".repeat(n));
        assert_eq!(nesting_errors(&begins(MAX_NESTING_DEPTH)), Vec::<String>::new());
        assert_eq!(
            nesting_errors(&begins(20_000)),
            ["line 1: nesting is too deep, the limit is 256"]
        );
    }

    tree_tests!(
        use parser;

        fn test_declarations_and_assignment() {
            let program = "const a = 5; var b; b := a + 1 .";
            let tree_ok = "
                block
                  const a = 5 (line 1)
                  var b (line 1)
                  assign b (line 1)
                    binary Add (line 1)
                      ident a (line 1)
                      int 1 (line 1)
            ";
        }

        fn test_precedence_and_associativity() {
            let program = "!(1 - 2 - 3) * 4 / x + 5.";
            let tree_ok = "
                block
                  print (line 1)
                    binary Add (line 1)
                      binary Div (line 1)
                        binary Mul (line 1)
                          binary Sub (line 1)
                            binary Sub (line 1)
                              int 1 (line 1)
                              int 2 (line 1)
                            int 3 (line 1)
                          int 4 (line 1)
                        ident x (line 1)
                      int 5 (line 1)
            ";
        }

        fn test_leading_sign_wraps_chain() {
            let program = "!-a + b * c.";
            let tree_ok = "
                block
                  print (line 1)
                    unary Minus (line 1)
                      binary Add (line 1)
                        ident a (line 1)
                        binary Mul (line 1)
                          ident b (line 1)
                          ident c (line 1)
            ";
        }

        fn test_procedures_and_statements() {
            let program = "
                const max = 10;
                var x, y;
                procedure p;
                    var z;
                    begin
                        ?z;
                        if odd z then !z
                    end;
                procedure q;
                    call p;
                while x < max do
                    begin
                        call q;
                        x := x + 1
                    end
                .
            ";
            let tree_ok = "
                block
                  const max = 10 (line 2)
                  var x (line 3)
                  var y (line 3)
                  procedure p (line 4)
                    block
                      var z (line 5)
                      begin (line 6)
                        input z (line 7)
                        if (line 8)
                          odd (line 8)
                            ident z (line 8)
                          print (line 8)
                            ident z (line 8)
                  procedure q (line 10)
                    block
                      call p (line 11)
                  while (line 12)
                    binary Lt (line 12)
                      ident x (line 12)
                      ident max (line 12)
                    begin (line 13)
                      call q (line 14)
                      assign x (line 15)
                        binary Add (line 15)
                          ident x (line 15)
                          int 1 (line 15)
            ";
        }

        fn test_all_relational_operators() {
            let program = "
                begin
                    if 1 = 2 then !1;
                    if 1 # 2 then !1;
                    if 1 < 2 then !1;
                    if 1 <= 2 then !1;
                    if 1 > 2 then !1;
                    if 1 >= 2 then !1
                end.
            ";
            let tree_ok = "
                block
                  begin (line 2)
                    if (line 3)
                      binary Eq (line 3)
                        int 1 (line 3)
                        int 2 (line 3)
                      print (line 3)
                        int 1 (line 3)
                    if (line 4)
                      binary Ne (line 4)
                        int 1 (line 4)
                        int 2 (line 4)
                      print (line 4)
                        int 1 (line 4)
                    if (line 5)
                      binary Lt (line 5)
                        int 1 (line 5)
                        int 2 (line 5)
                      print (line 5)
                        int 1 (line 5)
                    if (line 6)
                      binary Le (line 6)
                        int 1 (line 6)
                        int 2 (line 6)
                      print (line 6)
                        int 1 (line 6)
                    if (line 7)
                      binary Gt (line 7)
                        int 1 (line 7)
                        int 2 (line 7)
                      print (line 7)
                        int 1 (line 7)
                    if (line 8)
                      binary Ge (line 8)
                        int 1 (line 8)
                        int 2 (line 8)
                      print (line 8)
                        int 1 (line 8)
            ";
        }

        fn test_missing_dot() {
            let program = "x := 1";
            let expected_errors = &["line 1: expected '.', but got end of input"];
        }

        fn test_trailing_tokens() {
            let program = "x := 1. y";
            let expected_errors = &["line 1: expected end of input, but got identifier"];
        }

        fn test_unexpected_characters_stop_before_parsing() {
            let program = "var x;\nx := 1 % 2;\n@.";
            let expected_errors = &[
                "line 2: unexpected character '%'",
                "line 3: unexpected character '@'",
            ];
        }

        fn test_lone_colon() {
            let program = "x : 1.";
            let expected_errors = &["line 1: unexpected character ':'"];
        }

        fn test_chained_relational_operators() {
            let program = "if 1 < 2 < 3 then !1.";
            let expected_errors = &["line 1: expected 'then', but got '<'"];
        }

        fn test_missing_relational_operator() {
            let program = "while x do x := 0.";
            let expected_errors = &[
                "line 1: expected one of '=', '#', '<', '<=', '>', '>=', but got 'do'",
            ];
        }

        fn test_integer_literal_out_of_range() {
            let program = "
                var x;
                begin
                    x := 2147483648;
                    x := 2147483647
                end.
            ";
            let expected_errors = &["line 4: integer literal 2147483648 is out of range"];
        }

        fn test_constant_out_of_range() {
            let program = "const big = 99999999999; !big.";
            let expected_errors = &["line 1: integer literal 99999999999 is out of range"];
        }

        fn test_recovers_inside_begin() {
            let program = "
                var x, y;
                begin
                    x := ;
                    y := 1;
                    y := * 2;
                    x := y
                end.
            ";
            let expected_errors = &[
                "line 4: expected an expression, but got ';'",
                "line 6: expected an expression, but got '*'",
            ];
        }

        fn test_recovers_across_procedures() {
            let program = "
                procedure p;
                    x := (1;
                procedure q;
                    !2 +;
                call p.
            ";
            let expected_errors = &[
                "line 3: expected ')', but got ';'",
                "line 5: expected an expression, but got ';'",
            ];
        }

        fn test_recovers_after_bad_declarations() {
            let program = "
                const a = ;
                var 1;
                !a.
            ";
            let expected_errors = &[
                "line 2: expected number, but got ';'",
                "line 3: expected identifier, but got number",
            ];
        }

        fn test_invalid_statement() {
            let program = "begin end.";
            let expected_errors = &["line 1: expected a statement, but got 'end'"];
        }

        fn test_empty_program() {
            let program = "";
            let expected_errors = &["line 1: expected a statement, but got end of input"];
        }

        fn test_missing_procedure_semicolon() {
            let program = "procedure p; !1 call p.";
            let expected_errors = &["line 1: expected ';', but got 'call'"];
        }
    );
}
