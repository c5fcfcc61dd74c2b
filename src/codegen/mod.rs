use crate::{
    ast::Program,
    codegen::{x86_64::Generator, x86_64_env::Env},
    token::Spanned,
    util::intern::Symbol,
};

pub mod x86_64;
pub mod x86_64_env;

/// Lowers the program into NASM assembly for the provided target.
///
/// Nothing is returned on error, so a failed compilation never produces a
/// partial artifact.
pub fn generate(target: Target, program: &Program) -> Result<String, Spanned<Error>> {
    type DarwinGenerator = Generator<x86_64_env::Darwin>;
    type LinuxGenerator = Generator<x86_64_env::Linux>;

    match target {
        Target::x86_64_darwin => DarwinGenerator::new().generate(program),
        Target::x86_64_linux => LinuxGenerator::new().generate(program),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UnknownIdentifier(Symbol),
    IdentifierAlreadyUsed(Symbol),
}

#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Target {
    x86_64_darwin,
    x86_64_linux,
}

impl Target {
    /// The `nasm -f` output format for this target.
    pub const fn object_format(&self) -> &'static str {
        match self {
            Target::x86_64_darwin => x86_64_env::Darwin::OBJECT_FORMAT,
            Target::x86_64_linux => x86_64_env::Linux::OBJECT_FORMAT,
        }
    }

    pub const fn entry_point(&self) -> &'static str {
        match self {
            Target::x86_64_darwin => x86_64_env::Darwin::ENTRY_POINT,
            Target::x86_64_linux => x86_64_env::Linux::ENTRY_POINT,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::x86_64_darwin => f.write_str("x86_64_darwin"),
            Target::x86_64_linux => f.write_str("x86_64_linux"),
        }
    }
}
