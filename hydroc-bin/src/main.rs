use std::{
    error::Error,
    fs,
    path::{Path, PathBuf},
    process::{Command, ExitCode},
};

use clap::Parser;
use hydro::util::{
    fmt::{error::Diagnostic, Context, Show},
    intern::Interner,
};
use log::LevelFilter;

use crate::target::{Target, DEFAULT_TARGET};

mod target;

/// Compiles a hydro source file into an x86-64 executable.
#[derive(Parser, Debug)]
#[command(name = "hydroc", version)]
struct Args {
    /// Source file to compile.
    input: PathBuf,

    /// Where to write the assembly. Defaults to the input with an `.asm`
    /// extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = DEFAULT_TARGET)]
    target: Target,

    /// Stop after writing the assembly, without running `nasm` and `ld`.
    #[arg(long)]
    emit_asm_only: bool,

    /// Increases logging verbosity; may be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(error) = simple_logger::SimpleLogger::new().with_level(level).init() {
        eprintln!("failed to initialize logger: {error}");
    }

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("hydroc: {error}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` if the source was rejected by the compiler.
fn run(args: &Args) -> Result<bool, Box<dyn Error>> {
    let src = fs::read_to_string(&args.input)
        .map_err(|e| format!("can't read {}: {e}", args.input.display()))?;

    let mut interner = Interner::with_capacity(64);
    let asm = match hydro::compile(&src, args.target.into(), &mut interner) {
        Ok(asm) => asm,
        Err(error) => {
            let diagnostic = Diagnostic {
                path: &args.input,
                src: &src,
                error: &error,
            };
            eprintln!("{}", diagnostic.display(&Context::new(&interner)));
            return Ok(false);
        }
    };

    let asm_path = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("asm"));
    fs::write(&asm_path, asm)
        .map_err(|e| format!("can't write {}: {e}", asm_path.display()))?;
    log::info!("wrote {}", asm_path.display());

    if !args.emit_asm_only {
        let mut exe_path = asm_path.with_extension("");
        if exe_path == args.input {
            exe_path.set_extension("out");
        }
        assemble_and_link(&asm_path, &exe_path, args.target)?;
    }
    Ok(true)
}

fn assemble_and_link(asm_path: &Path, exe_path: &Path, target: Target) -> Result<(), Box<dyn Error>> {
    let codegen_target = hydro::codegen::Target::from(target);
    let obj_path = asm_path.with_extension("o");

    let mut nasm = Command::new("nasm");
    nasm.arg("-f")
        .arg(codegen_target.object_format())
        .arg(asm_path)
        .arg("-o")
        .arg(&obj_path);
    exec(nasm)?;

    let mut ld = Command::new("ld");
    ld.arg("-e")
        .arg(codegen_target.entry_point())
        .args(target.linker_args())
        .arg("-o")
        .arg(exe_path)
        .arg(&obj_path);
    exec(ld)?;

    log::info!("linked {}", exe_path.display());
    Ok(())
}

fn exec(mut command: Command) -> Result<(), Box<dyn Error>> {
    let program = command.get_program().to_string_lossy().into_owned();
    log::debug!("running {command:?}");
    let output = command
        .output()
        .map_err(|e| format!("failed to run {program}: {e}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{program} failed ({}):\n{}", output.status, stderr.trim_end()).into());
    }
    Ok(())
}
