use crate::{
    ast::Program,
    codegen::{self, ir::Unit},
    lexer, parser,
    token::Spanned,
    util::{fmt::Context, intern::Interner},
};

/// Everything reported by the first failing stage. Later stages don't run once
/// a stage reports an error.
#[derive(Debug)]
pub enum Diagnostics {
    Parser(Vec<Spanned<parser::Error>>),
    Codegen(Vec<Spanned<codegen::Error>>),
}

impl Diagnostics {
    /// Renders each diagnostic as `line N: message`, in the order reported.
    pub fn render(&self, ident_interner: &Interner<str>) -> Vec<String> {
        let ctx = Context::new(ident_interner);
        match self {
            Diagnostics::Parser(errors) => ctx.render_all(errors),
            Diagnostics::Codegen(errors) => ctx.render_all(errors),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Diagnostics::Parser(errors) => errors.len(),
            Diagnostics::Codegen(errors) => errors.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn parse(src: &str, ident_interner: &mut Interner<str>) -> Result<Program, Diagnostics> {
    let mut tokens = Vec::with_capacity(lexer::SUGGESTED_TOKENS_CAPACITY);
    parser::parse_program(src, &mut tokens, ident_interner).map_err(Diagnostics::Parser)
}

/// Runs the front end over `src`, producing a unit ready to be handed to a
/// backend.
pub fn compile(src: &str, ident_interner: &mut Interner<str>) -> Result<Unit, Diagnostics> {
    let program = parse(src, ident_interner)?;
    codegen::generate(&program, ident_interner).map_err(Diagnostics::Codegen)
}

/// Splits `text` right after the `.` that ends a program, returning the
/// program and whatever follows it. Without a `.`, all of `text` is program.
pub fn split_program(text: &str) -> (&str, &str) {
    match text.find('.') {
        Some(dot) => text.split_at(dot + 1),
        None => (text, ""),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::backend::{interp::Interpreter, Backend};

    #[test]
    fn test_syntax_errors_stop_before_codegen() {
        let i = &mut Interner::with_capacity(8);
        // `y` is undeclared too, but generation never runs.
        let diags = compile("begin y := ; x := 1 end.", i).unwrap_err();
        assert!(matches!(diags, Diagnostics::Parser(_)));
        assert_eq!(
            diags.render(i),
            ["line 1: expected an expression, but got ';'"]
        );
    }

    #[test]
    fn test_semantic_errors() {
        let i = &mut Interner::with_capacity(8);
        let diags = compile("const a = 1;\na := 2.", i).unwrap_err();
        assert!(matches!(diags, Diagnostics::Codegen(_)));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.render(i), ["line 2: cannot assign to a constant 'a'"]);
    }

    #[test]
    fn test_split_program() {
        let (program, input) = split_program("var x;\nbegin ?x; !x end.\n5\n");
        assert_eq!(program, "var x;\nbegin ?x; !x end.");
        assert_eq!(input, "\n5\n");

        let i = &mut Interner::with_capacity(8);
        let unit = compile(program, i).unwrap();
        let mut interp = Interpreter::new(input.as_bytes(), Vec::new());
        interp.consume(&unit).unwrap();
        assert_eq!(interp.into_output(), b"5\n");

        assert_eq!(split_program("!1"), ("!1", ""));
        assert_eq!(split_program("!1."), ("!1.", ""));
    }

    #[test]
    fn test_demo_programs() {
        let i = &mut Interner::with_capacity(64);
        let unit = compile(include_str!("../demos/primes.pl0"), i).unwrap();
        let mut interp = Interpreter::new("30\n".as_bytes(), Vec::new());
        interp.consume(&unit).unwrap();
        let out = String::from_utf8(interp.into_output()).unwrap();
        assert_eq!(out, "2\n3\n5\n7\n11\n13\n17\n19\n23\n29\n");

        let i = &mut Interner::with_capacity(64);
        let unit = compile(include_str!("../demos/big.pl0"), i).unwrap();
        assert_eq!(unit.verify(), Ok(()));
    }
}
