use crate::{
    codegen::{self, Target},
    lexer::{self, SUGGESTED_TOKENS_CAPACITY},
    parser,
    token::{Span, Spanned},
    util::intern::Interner,
};

/// The first fatal error met while compiling a source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Lex(Spanned<lexer::Error>),
    Parse(Spanned<parser::Error>),
    Codegen(Spanned<codegen::Error>),
}

impl Error {
    pub fn span(&self) -> Span {
        match self {
            Error::Lex(e) => e.span,
            Error::Parse(e) => e.span,
            Error::Codegen(e) => e.span,
        }
    }

    /// A short name for the kind of error, used in diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Lex(_) => "lexical",
            Error::Parse(_) => "syntax",
            Error::Codegen(_) => "semantic",
        }
    }
}

impl From<Spanned<parser::Error>> for Error {
    fn from(Spanned { span, inner }: Spanned<parser::Error>) -> Self {
        // The parser drives the lexer, but lexical errors keep their own kind.
        match inner {
            parser::Error::Lexer(inner) => Error::Lex(Spanned { span, inner }),
            inner => Error::Parse(Spanned { span, inner }),
        }
    }
}

impl From<Spanned<codegen::Error>> for Error {
    fn from(error: Spanned<codegen::Error>) -> Self {
        Error::Codegen(error)
    }
}

/// Compiles the source into assembly text for the provided target.
///
/// Identifiers are interned into `ident_interner`, which the caller needs
/// to format semantic errors.
pub fn compile(src: &str, target: Target, ident_interner: &mut Interner) -> Result<String, Error> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY.min(src.len() + 1));

    let program = parser::parse_program(src, &mut tokens, ident_interner)?;
    log::debug!(
        "parsed {} token(s) into {} top-level statement(s)",
        tokens.len(),
        program.stmts.len()
    );

    let asm = codegen::generate(target, &program)?;
    log::debug!("generated {} line(s) of assembly for {target}", asm.lines().count());

    Ok(asm)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn compile_linux(src: &str) -> (Result<String, Error>, Interner) {
        let mut i = Interner::with_capacity(16);
        let result = compile(src, Target::x86_64_linux, &mut i);
        (result, i)
    }

    #[test]
    fn test_compile_exit() {
        let (asm, _) = compile_linux("exit(42);");
        let expected = indoc! {"
            global _start
            _start:
                mov rax, 42
                push rax
                mov rax, 60
                pop rdi
                syscall
                mov rax, 60
                mov rdi, 0
                syscall
        "};
        assert_eq!(asm.unwrap(), expected);
    }

    #[test]
    fn test_compile_darwin_entry_point() {
        let mut i = Interner::default();
        let asm = compile("exit(0);", Target::x86_64_darwin, &mut i).unwrap();
        assert!(asm.starts_with("global _main\n_main:\n"));
        assert!(asm.contains("mov rax, 0x2000001"));
    }

    #[test]
    fn test_error_stages() {
        let (result, _) = compile_linux("exit(1) $");
        let error = result.unwrap_err();
        assert_eq!(error.stage(), "lexical");
        assert_eq!(error, Error::Lex(Span::new_of_bounds(8..9).wrap(lexer::Error::UnexpectedChar('$'))));

        let (result, _) = compile_linux("exit(1");
        let error = result.unwrap_err();
        assert_eq!(error.stage(), "syntax");
        assert_eq!(error.span(), Span::new_of_bounds(6..6));

        let (result, i) = compile_linux("exit(y);");
        let error = result.unwrap_err();
        assert_eq!(error.stage(), "semantic");
        let Error::Codegen(Spanned { span, inner: codegen::Error::UnknownIdentifier(name) }) = error else {
            panic!("unexpected error {error:?}");
        };
        assert_eq!(span, Span::new_of_bounds(5..6));
        assert_eq!(i.get(name), "y");
    }
}
