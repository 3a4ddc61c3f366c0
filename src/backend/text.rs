use std::io::Write;

use crate::{
    backend::{Backend, Error},
    codegen::ir::Unit,
    util::fmt::ir,
};

/// Writes the textual form of each unit it consumes.
pub struct TextBackend<W> {
    writer: W,
}

impl<W: Write> TextBackend<W> {
    pub fn new(writer: W) -> TextBackend<W> {
        TextBackend { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Backend for TextBackend<W> {
    fn name(&self) -> &'static str {
        "text"
    }

    fn consume(&mut self, unit: &Unit) -> Result<(), Error> {
        ir::print_unit(&mut self.writer, unit)?;
        self.writer.flush()?;
        Ok(())
    }
}
