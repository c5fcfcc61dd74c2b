#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "snake_case")]
pub enum Target {
    x86_64_darwin,
    x86_64_linux,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        hydro::codegen::Target::from(*self).fmt(f)
    }
}

impl Target {
    /// Extra arguments `ld` needs to produce an executable for this target.
    pub const fn linker_args(&self) -> &'static [&'static str] {
        match self {
            Target::x86_64_darwin => &["-lSystem"],
            Target::x86_64_linux => &[],
        }
    }
}

impl From<Target> for hydro::codegen::Target {
    fn from(value: Target) -> Self {
        match value {
            Target::x86_64_darwin => hydro::codegen::Target::x86_64_darwin,
            Target::x86_64_linux => hydro::codegen::Target::x86_64_linux,
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "macos")] {
        pub const DEFAULT_TARGET: Target = Target::x86_64_darwin;
    } else {
        pub const DEFAULT_TARGET: Target = Target::x86_64_linux;
    }
}
