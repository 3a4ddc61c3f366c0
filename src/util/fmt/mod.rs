use std::fmt;

use crate::util::intern::Interner;

pub mod error;
pub mod ir;
pub mod tree;

/// What a [`Show`] implementation may need besides the value itself.
#[derive(Copy, Clone)]
pub struct Context<'ident> {
    pub ident_interner: &'ident Interner<str>,
}

impl Context<'_> {
    pub fn new(ident_interner: &Interner<str>) -> Context<'_> {
        Context { ident_interner }
    }

    /// Renders each item in its alternate form (`line N: message`).
    pub fn render_all<T: Show>(&self, items: &[T]) -> Vec<String> {
        items
            .iter()
            .map(|item| format!("{:#}", item.display(self)))
            .collect()
    }
}

/// Like [`fmt::Display`], but interned names are resolved through the
/// [`Context`].
pub trait Show {
    fn show(&self, f: &mut fmt::Formatter<'_>, ctx: &Context<'_>) -> fmt::Result;

    fn display(&self, ctx: &Context<'_>) -> impl fmt::Display
    where
        Self: Sized,
    {
        Display(self, ctx)
    }
}

struct Display<'this, 'ctx, 'ident, T: Show>(&'this T, &'ctx Context<'ident>);

impl<T: Show> fmt::Display for Display<'_, '_, '_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Display(this, ctx) = self;
        this.show(f, ctx)
    }
}
