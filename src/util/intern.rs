use std::{collections::HashMap, fmt, num::NonZeroU32, rc::Rc};

/// A handle to an interned identifier. To retrieve the text, use
/// [`Interner::get`].
///
/// Comparing two symbols is a single integer comparison, which is what the
/// code generator relies on when resolving variables.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(NonZeroU32);

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

impl From<&Symbol> for Symbol {
    fn from(value: &Symbol) -> Self {
        *value
    }
}

pub struct Interner {
    map: HashMap<Rc<str>, Symbol>,
    vec: Vec<Rc<str>>,
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (i, name) in self.vec.iter().enumerate() {
            map.entry(&(i + 1), name);
        }
        map.finish()
    }
}

impl Default for Interner {
    fn default() -> Self {
        Interner::with_capacity(0)
    }
}

impl Interner {
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

    pub fn clear(&mut self) {
        self.map.clear();
        self.vec.clear();
    }

    /// Interns the provided name, returning a symbol which can be used to
    /// retrieve it later. Interning the same text twice yields equal symbols.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(symbol) = self.map.get(name) {
            return *symbol;
        }
        let len = u32::try_from(self.vec.len()).expect("interner out of capacity");
        let symbol = Symbol(NonZeroU32::MIN.saturating_add(len));
        let key: Rc<str> = Rc::from(name);
        self.vec.push(Rc::clone(&key));
        self.map.insert(key, symbol);
        symbol
    }

    /// Returns the text of the provided symbol.
    ///
    /// Panics if the symbol was produced by another interner.
    pub fn get(&self, symbol: impl Into<Symbol>) -> &str {
        let Symbol(handle) = symbol.into();
        &self.vec[handle.get() as usize - 1]
    }
}
