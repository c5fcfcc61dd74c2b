use std::fmt;

use crate::util::intern::{Interner, Symbol};

pub mod error;
pub mod tree;

/// What formatting needs beyond the value itself. Semantic errors only
/// carry symbols, so their names are looked up here.
#[derive(Copy, Clone)]
pub struct Context<'ident> {
    pub ident_interner: &'ident Interner,
}

impl<'ident> Context<'ident> {
    pub fn new(ident_interner: &'ident Interner) -> Self {
        Context { ident_interner }
    }

    /// Name of an interned identifier.
    pub fn ident(&self, symbol: impl Into<Symbol>) -> &'ident str {
        self.ident_interner.get(symbol)
    }
}

/// Like [`fmt::Display`], with access to a [`Context`].
///
/// The alternate flag (`{:#}`) asks implementors to prefix the source span.
pub trait Show {
    fn show(&self, f: &mut fmt::Formatter<'_>, ctx: &Context<'_>) -> fmt::Result;

    fn display<'a>(&'a self, ctx: &'a Context<'_>) -> impl fmt::Display + 'a
    where
        Self: Sized,
    {
        Shown { value: self, ctx }
    }
}

struct Shown<'a, 'ident, T> {
    value: &'a T,
    ctx: &'a Context<'ident>,
}

impl<T: Show> fmt::Display for Shown<'_, '_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.show(f, self.ctx)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    struct Var(Symbol);

    impl Show for Var {
        fn show(&self, f: &mut fmt::Formatter<'_>, ctx: &Context<'_>) -> fmt::Result {
            if f.alternate() {
                f.write_str("var ")?;
            }
            f.write_str(ctx.ident(self.0))
        }
    }

    #[test]
    fn test_show_resolves_symbols() {
        let mut i = Interner::default();
        let counter = Var(i.intern("counter"));
        let ctx = Context::new(&i);
        assert_eq!(format!("{}", counter.display(&ctx)), "counter");
        assert_eq!(format!("{:#}", counter.display(&ctx)), "var counter");
    }
}
