use std::{collections::HashMap, fmt, hash::Hash, marker::PhantomData, num::NonZeroU32, rc::Rc};

/// A handle to some interned value of type `T`. To retrieve a `&T`, use
/// [`Interner::get`].
///
/// Identifiers are interned once by the parser; every later stage compares
/// and hashes these handles instead of strings.
pub struct Interned<T: ?Sized> {
    // NonZeroU32 so that `Option<Interned<T>>` stays four bytes wide.
    handle: NonZeroU32,
    _ty: PhantomData<T>,
}

impl<T: ?Sized> Copy for Interned<T> {}

impl<T: ?Sized> Clone for Interned<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Hash for Interned<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl<T: ?Sized> PartialEq for Interned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<T: ?Sized> Eq for Interned<T> {}

impl<T: ?Sized> fmt::Debug for Interned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interned({})", self.handle)
    }
}

pub struct Interner<T: ?Sized> {
    map: HashMap<Rc<T>, NonZeroU32>,
    vec: Vec<Rc<T>>,
}

impl<T: ?Sized> Interner<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Interner {
            map: HashMap::with_capacity(capacity),
            vec: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    /// Interns the provided value, returning a handle which can be used to
    /// retrieve it later. Interning an equal value twice yields the same
    /// handle.
    pub fn intern(&mut self, value: &T) -> Interned<T>
    where
        T: Eq + Hash + ToOwned,
        T::Owned: Into<Rc<T>>,
    {
        if let Some(&handle) = self.map.get(value) {
            return Interned {
                handle,
                _ty: PhantomData,
            };
        }
        let len = u32::try_from(self.vec.len()).expect("interner out of capacity");
        let handle = NonZeroU32::MIN.saturating_add(len);
        let key: Rc<T> = value.to_owned().into();
        self.vec.push(Rc::clone(&key));
        self.map.insert(key, handle);
        Interned {
            handle,
            _ty: PhantomData,
        }
    }

    /// Returns the corresponding value for the provided [`Interned`] handle.
    /// Panics if the handle was produced by another interner.
    pub fn get(&self, handle: impl Into<Interned<T>>) -> &T {
        let handle: Interned<T> = handle.into();
        &self.vec[handle.handle.get() as usize - 1]
    }
}

impl fmt::Debug for Interner<str> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.vec.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interner() {
        let mut i = Interner::<str>::with_capacity(3);

        let x1 = i.intern("x");
        let count1 = i.intern("count");
        let x2 = i.intern("x");

        assert_eq!(x1, x2);
        assert_ne!(x1, count1);
        assert_eq!(i.get(x1), "x");
        assert_eq!(i.get(count1), "count");
        assert_eq!(i.len(), 2);
    }
}
