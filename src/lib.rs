/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The code generator takes an AST and lowers it into stack-machine
/// assembly for a given target.
pub mod codegen;

/// Runs the three stages above in sequence.
pub mod pipeline;

pub mod ast;
pub mod token;

pub mod util {
    pub mod fmt;
    pub mod intern;
    #[cfg(test)]
    pub(crate) mod test_utils;
}

pub use pipeline::{compile, Error};
