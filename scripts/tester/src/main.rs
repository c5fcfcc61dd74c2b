//! Compiles every fixture case with `hydro`, assembles and links it with
//! `nasm` and `ld`, runs it and compares the exit status. Cases expected to
//! be rejected are compared against the formatted diagnostic instead.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::{exit, Command},
};

use pretty_assertions::assert_str_eq;

use hydro::{
    codegen::Target,
    util::{
        fmt::{Context, Show},
        intern::Interner,
    },
};

const FIXTURE_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures");
const CASE_SEPARATOR: &str = "%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%";
const CASE_PREFIX: &str = "%% CASE ";
const EXIT_WITH_PREFIX: &str = "%% EXIT WITH:";
const ERROR_WITH_PREFIX: &str = "%% ERROR WITH:";

#[derive(Debug, PartialEq)]
enum Expected {
    Exit(i32),
    Error(String),
}

#[derive(Debug)]
struct TestCase<'a> {
    fixture_path: PathBuf,
    name: &'a str,
    input: &'a str,
    expected: Expected,
}

fn main() {
    let mut fixture_files = Vec::new();
    if let Err(e) = find_fixtures(Path::new(FIXTURE_DIR), &mut fixture_files) {
        eprintln!("error reading fixture directory {FIXTURE_DIR}: {e}");
        exit(1);
    }
    fixture_files.sort();

    let work_dir = std::env::temp_dir().join(format!("hydro-tester-{}", std::process::id()));
    if let Err(e) = fs::create_dir_all(&work_dir) {
        eprintln!("error creating {}: {e}", work_dir.display());
        exit(1);
    }

    let mut passed = 0;
    let mut failed = 0;

    for path in &fixture_files {
        println!("---> {}", path.display());
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("     error reading fixture: {e}");
                failed += 1;
                continue;
            }
        };
        let cases = match parse_fixture_file(&content, path) {
            Ok(cases) => cases,
            Err(e) => {
                eprintln!("     error parsing fixture: {e}");
                failed += 1;
                continue;
            }
        };
        for (i, case) in cases.iter().enumerate() {
            print!("     {}... ", case.name);
            _ = io::stdout().flush();

            let result = std::panic::catch_unwind(|| run_test_case(case, &work_dir, i));
            match result {
                Ok(Ok(())) => {
                    println!("PASS");
                    passed += 1;
                }
                Ok(Err(e)) => {
                    println!("FAIL\n        {e}");
                    failed += 1;
                }
                Err(_) => {
                    println!("FAIL");
                    failed += 1;
                }
            }
        }
    }

    _ = fs::remove_dir_all(&work_dir);

    println!("\npassed: {passed}, failed: {failed}");
    if failed > 0 {
        exit(1);
    }
}

fn find_fixtures(dir: &Path, fixtures: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            find_fixtures(&path, fixtures)?;
        } else if path.extension().is_some_and(|ext| ext == "txt") {
            fixtures.push(path);
        }
    }
    Ok(())
}

fn parse_fixture_file<'a>(content: &'a str, path: &Path) -> Result<Vec<TestCase<'a>>, String> {
    content
        .split(CASE_SEPARATOR)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| parse_case(block, path))
        .collect()
}

/// A case is a `%% CASE <name>` header, the source, and an outcome line.
/// Error outcomes are followed by the expected diagnostic.
fn parse_case<'a>(block: &'a str, path: &Path) -> Result<TestCase<'a>, String> {
    let (header, body) = block.split_once('\n').unwrap_or((block, ""));
    let name = header
        .trim()
        .strip_prefix(CASE_PREFIX)
        .ok_or_else(|| format!("case does not start with {CASE_PREFIX:?}: {header}"))?;

    let outcome_start = body
        .find(EXIT_WITH_PREFIX)
        .or_else(|| body.find(ERROR_WITH_PREFIX))
        .ok_or_else(|| format!("missing outcome line for case {name:?}"))?;
    let (input, outcome) = body.split_at(outcome_start);

    let expected = if let Some(status) = outcome.strip_prefix(EXIT_WITH_PREFIX) {
        let status = status
            .trim()
            .parse()
            .map_err(|e| format!("bad exit status for case {name:?}: {e}"))?;
        Expected::Exit(status)
    } else {
        let message = outcome.strip_prefix(ERROR_WITH_PREFIX).unwrap_or_default();
        Expected::Error(message.trim().to_owned())
    };

    Ok(TestCase {
        fixture_path: path.to_path_buf(),
        name: name.trim(),
        input: input.trim(),
        expected,
    })
}

fn run_test_case(case: &TestCase, work_dir: &Path, index: usize) -> Result<(), String> {
    let target = Target::x86_64_linux;
    let mut interner = Interner::with_capacity(64);

    let actual = match hydro::compile(case.input, target, &mut interner) {
        Ok(asm) => Expected::Exit(build_and_run(&asm, target, work_dir, index)?),
        Err(error) => {
            let ctx = Context::new(&interner);
            Expected::Error(format!("{} error: {:#}", error.stage(), error.display(&ctx)))
        }
    };

    match (&actual, &case.expected) {
        (Expected::Error(actual), Expected::Error(expected)) => {
            assert_str_eq!(
                actual,
                expected,
                "\n\ndiagnostic mismatch for case {:?} in {}\n",
                case.name,
                case.fixture_path.display(),
            );
            Ok(())
        }
        _ if actual == case.expected => Ok(()),
        _ => Err(format!("expected {:?}, got {actual:?}", case.expected)),
    }
}

fn build_and_run(asm: &str, target: Target, work_dir: &Path, index: usize) -> Result<i32, String> {
    let asm_path = work_dir.join(format!("case{index}.asm"));
    let obj_path = asm_path.with_extension("o");
    let exe_path = asm_path.with_extension("");
    fs::write(&asm_path, asm).map_err(|e| e.to_string())?;

    let mut nasm = Command::new("nasm");
    nasm.arg("-f")
        .arg(target.object_format())
        .arg(&asm_path)
        .arg("-o")
        .arg(&obj_path);
    check(nasm)?;

    let mut ld = Command::new("ld");
    ld.arg("-e")
        .arg(target.entry_point())
        .arg("-o")
        .arg(&exe_path)
        .arg(&obj_path);
    check(ld)?;

    let status = Command::new(&exe_path)
        .status()
        .map_err(|e| format!("failed to run {}: {e}", exe_path.display()))?;
    status
        .code()
        .ok_or_else(|| format!("{} was killed: {status}", exe_path.display()))
}

fn check(mut command: Command) -> Result<(), String> {
    let output = command
        .output()
        .map_err(|e| format!("failed to run {:?}: {e}", command.get_program()))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(format!(
            "{:?} failed: {}",
            command.get_program(),
            String::from_utf8_lossy(&output.stderr).trim_end()
        ))
    }
}
