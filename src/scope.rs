use std::collections::HashMap;

use crate::{
    codegen::ir::{FuncId, Storage},
    token::Span,
    util::intern::Interned,
};

/// A resolved symbol. Entries are created when their declaration is processed
/// and never change afterwards.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Entry {
    /// A folded constant. No storage exists for it.
    Constant(i32),
    Variable(Storage),
    Procedure(FuncId),
}

impl Entry {
    /// Describes the entry kind, for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Entry::Constant(_) => "constant",
            Entry::Variable(_) => "variable",
            Entry::Procedure(_) => "procedure",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScopeId(u32);

struct Frame {
    parent: Option<ScopeId>,
    entries: HashMap<Interned<str>, (Entry, Span)>,
}

/// The chain of active scopes, stored as an arena of frames. Each frame only
/// refers to its parent by index.
///
/// Frames follow block nesting: a block pushes a frame on entry and pops it on
/// exit, so the active frame is always the last one.
pub struct Scopes {
    frames: Vec<Frame>,
}

impl Scopes {
    pub fn with_capacity(capacity: usize) -> Scopes {
        Scopes {
            frames: Vec::with_capacity(capacity),
        }
    }

    /// Enters a new scope whose parent is the current one.
    pub fn push(&mut self) -> ScopeId {
        let parent = self.current();
        let id = u32::try_from(self.frames.len()).expect("scopes nested too deeply");
        self.frames.push(Frame {
            parent,
            entries: HashMap::new(),
        });
        ScopeId(id)
    }

    /// Leaves the current scope, discarding its entries.
    pub fn pop(&mut self) {
        self.frames.pop().expect("no scope to pop");
    }

    pub fn current(&self) -> Option<ScopeId> {
        let len = u32::try_from(self.frames.len()).ok()?;
        len.checked_sub(1).map(ScopeId)
    }

    /// The number of active scopes.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Whether the current scope is the outermost one.
    pub fn is_root(&self) -> bool {
        self.depth() == 1
    }

    /// Declares `name` in the current scope.
    ///
    /// Fails if the current scope already declares `name`, returning the span
    /// of that earlier declaration. Names of enclosing scopes may be shadowed.
    pub fn insert(&mut self, name: Interned<str>, span: Span, entry: Entry) -> Result<(), Span> {
        if let Some(other_span) = self.lookup_here(name) {
            return Err(other_span);
        }
        let frame = self.frames.last_mut().expect("no active scope");
        frame.entries.insert(name, (entry, span));
        Ok(())
    }

    /// Returns the span of the declaration of `name` in the current scope, if
    /// any. Enclosing scopes are not searched.
    pub fn lookup_here(&self, name: Interned<str>) -> Option<Span> {
        let frame = self.frames.last()?;
        frame.entries.get(&name).map(|&(_, span)| span)
    }

    /// Resolves `name`, searching the current scope and then each enclosing
    /// one, outwards.
    pub fn lookup(&self, name: Interned<str>) -> Option<Entry> {
        let mut cursor = self.current();
        while let Some(ScopeId(id)) = cursor {
            let frame = &self.frames[id as usize];
            if let Some(&(entry, _)) = frame.entries.get(&name) {
                return Some(entry);
            }
            cursor = frame.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codegen::ir::LocalId, util::intern::Interner};

    fn span(line: u32) -> Span {
        Span::new_of_length(0, 0, line)
    }

    #[test]
    fn test_lookup_walks_outwards() {
        let i = &mut Interner::with_capacity(4);
        let (a, b) = (i.intern("a"), i.intern("b"));
        let mut scopes = Scopes::with_capacity(4);

        scopes.push();
        assert!(scopes.is_root());
        scopes.insert(a, span(1), Entry::Constant(1)).unwrap();

        scopes.push();
        assert_eq!(scopes.depth(), 2);
        scopes.insert(b, span(2), Entry::Constant(2)).unwrap();
        assert_eq!(scopes.lookup(a), Some(Entry::Constant(1)));
        assert_eq!(scopes.lookup(b), Some(Entry::Constant(2)));

        scopes.pop();
        assert_eq!(scopes.lookup(a), Some(Entry::Constant(1)));
        assert_eq!(scopes.lookup(b), None);
    }

    #[test]
    fn test_shadowing_is_allowed_but_redeclaration_is_not() {
        let i = &mut Interner::with_capacity(4);
        let x = i.intern("x");
        let var = Entry::Variable(Storage::Local {
            owner: FuncId(1),
            slot: LocalId(0),
        });
        let mut scopes = Scopes::with_capacity(4);

        scopes.push();
        scopes.insert(x, span(1), Entry::Constant(7)).unwrap();
        assert_eq!(scopes.insert(x, span(2), Entry::Constant(8)), Err(span(1)));
        assert_eq!(scopes.lookup(x), Some(Entry::Constant(7)));

        scopes.push();
        assert_eq!(scopes.lookup_here(x), None);
        scopes.insert(x, span(3), var).unwrap();
        assert_eq!(scopes.lookup(x), Some(var));

        scopes.pop();
        assert_eq!(scopes.lookup(x), Some(Entry::Constant(7)));
    }

    #[test]
    fn test_siblings_are_invisible_to_each_other() {
        let i = &mut Interner::with_capacity(4);
        let y = i.intern("y");
        let mut scopes = Scopes::with_capacity(4);

        scopes.push();
        scopes.push();
        scopes.insert(y, span(1), Entry::Constant(1)).unwrap();
        scopes.pop();
        scopes.push();
        assert_eq!(scopes.lookup(y), None);
    }

    #[test]
    fn test_empty_chain_resolves_nothing() {
        let i = &mut Interner::with_capacity(1);
        let scopes = Scopes::with_capacity(0);
        assert_eq!(scopes.current(), None);
        assert_eq!(scopes.lookup(i.intern("z")), None);
    }
}
