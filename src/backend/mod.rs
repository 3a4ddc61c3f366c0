use thiserror::Error;

use crate::codegen::ir::{Unit, VerifyError};

pub mod interp;
pub mod text;

/// A consumer of complete, error-free IR units.
pub trait Backend {
    fn name(&self) -> &'static str;
    fn consume(&mut self, unit: &Unit) -> Result<(), Error>;
}

/// Errors raised while a backend consumes a unit.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed unit: {0}")]
    InvalidUnit(#[from] VerifyError),
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid input: expected an integer, but got '{0}'")]
    InvalidInput(String),
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error("maximum call depth of {depth} exceeded")]
    StackOverflow { depth: usize },
    #[error("local of @{0} accessed without a live activation")]
    NoActivation(Box<str>),
    #[error("unsupported call to external function @{0}")]
    UnsupportedExtern(&'static str),
}
