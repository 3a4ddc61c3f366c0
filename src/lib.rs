/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The code generator takes an AST, resolves its names, and lowers it into a
/// control-flow-graph IR unit.
pub mod codegen;

/// Backends consume IR units.
pub mod backend;

/// Drives the front end stages, stopping at the first one that fails.
pub mod driver;

pub mod ast;
pub mod scope;
pub mod token;

pub mod util {
    pub mod fmt;
    pub mod intern;
    #[cfg(test)]
    pub(crate) mod test_utils;
}
