use std::fmt::{self, Formatter};

use crate::{
    codegen, parser,
    token::{Span, Spanned},
    util::fmt::{Context, Show},
};

/// The alternate form prefixes the message with its line.
fn location(f: &mut Formatter<'_>, span: Span) -> fmt::Result {
    if f.alternate() {
        write!(f, "line {}: ", span.line)?;
    }
    Ok(())
}

impl Show for Spanned<parser::Error> {
    fn show(&self, f: &mut Formatter<'_>, _: &Context<'_>) -> fmt::Result {
        let Spanned { span, inner: error } = self;
        location(f, *span)?;

        use parser::Error::*;
        match error {
            Unexpected { actual, expected } => {
                write!(f, "expected {expected}, but got {actual}")
            }
            UnexpectedAny { actual, expected } => {
                write!(f, "expected one of ")?;
                for (i, kind) in expected.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{kind}")?;
                }
                write!(f, ", but got {actual}")
            }
            InvalidStatement { actual } => write!(f, "expected a statement, but got {actual}"),
            InvalidExpression { actual } => write!(f, "expected an expression, but got {actual}"),
            IntegerOutOfRange(lexeme) => write!(f, "integer literal {lexeme} is out of range"),
            InvalidInteger(lexeme) => write!(f, "invalid integer literal {lexeme}"),
            UnexpectedChar(c) => write!(f, "unexpected character '{c}'"),
            NestingTooDeep => write!(
                f,
                "nesting is too deep, the limit is {}",
                parser::MAX_NESTING_DEPTH
            ),
        }
    }
}

impl Show for Spanned<codegen::Error> {
    fn show(&self, f: &mut Formatter<'_>, ctx: &Context<'_>) -> fmt::Result {
        let i = ctx.ident_interner;
        let Spanned { span, inner: error } = self;
        location(f, *span)?;

        use codegen::Error::*;
        match error {
            UndeclaredIdentifier(name) => {
                write!(f, "undeclared identifier '{}'", i.get(*name))
            }
            DuplicateDeclaration {
                name,
                other_definition_span,
            } => {
                let name = i.get(*name);
                let line = other_definition_span.line;
                write!(
                    f,
                    "duplicate declaration of '{name}', first declared at line {line}"
                )
            }
            CannotAssign { name, kind } => {
                write!(f, "cannot assign to a {kind} '{}'", i.get(*name))
            }
            CannotRead { name, kind } => {
                write!(f, "cannot read into a {kind} '{}'", i.get(*name))
            }
            NotCallable { name, kind } => {
                write!(f, "cannot call a {kind} '{}'", i.get(*name))
            }
            ProcedureAsValue(name) => {
                write!(f, "procedure '{}' cannot be used as a value", i.get(*name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{token::TokenKind, util::intern::Interner};

    #[test]
    fn test_plain_form_has_no_location() {
        let i = Interner::with_capacity(0);
        let ctx = Context::new(&i);
        let error = Span::new_of_length(3, 1, 7).wrap(parser::Error::Unexpected {
            actual: TokenKind::Comma,
            expected: TokenKind::Semicolon,
        });
        assert_eq!(
            error.display(&ctx).to_string(),
            "expected ';', but got ','"
        );
        assert_eq!(
            format!("{:#}", error.display(&ctx)),
            "line 7: expected ';', but got ','"
        );
    }
}
