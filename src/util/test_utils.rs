use crate::{
    codegen::{self, Target},
    parser,
    token::Spanned,
    util::{
        self,
        fmt::{tree, Show},
        intern::Interner,
    },
};

pub mod emu;

pub fn format_errors<E>(i: &Interner, e: &[Spanned<E>]) -> Vec<String>
where
    Spanned<E>: Show,
{
    let ctx = util::fmt::Context::new(i);
    e.iter().map(|e| format!("{:#}", e.display(&ctx))).collect()
}

/// Each variant contains the input.
pub enum Test {
    ParserProgram(&'static str),
    ParserExpr(&'static str),
    CodegenProgram(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    AsmOk(&'static str),
    ExitStatus(i64),
    ExpectedErrors(&'static [&'static str]),
}

/// Runs the stages selected by the test, returning the formatted output (an
/// AST tree or the generated assembly) and the formatted errors.
#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    let tokens_buf = &mut Vec::with_capacity(1024);
    let interner = &mut Interner::with_capacity(128);

    match test {
        Test::ParserProgram(input) => match parser::parse_program(input, tokens_buf, interner) {
            Ok(prog) => (tree::print_program_string(interner, &prog), vec![]),
            Err(error) => (String::new(), format_errors(interner, &[error])),
        },
        Test::ParserExpr(input) => match parser::parse_expr(input, tokens_buf, interner) {
            Ok(expr) => (tree::print_expr_string(interner, &expr), vec![]),
            Err(error) => (String::new(), format_errors(interner, &[error])),
        },
        Test::CodegenProgram(input) => {
            let prog = match parser::parse_program(input, tokens_buf, interner) {
                Ok(prog) => prog,
                Err(error) => return (String::new(), format_errors(interner, &[error])),
            };
            match codegen::generate(Target::x86_64_linux, &prog) {
                Ok(asm) => (asm, vec![]),
                Err(error) => (String::new(), format_errors(interner, &[error])),
            }
        }
    }
}

#[track_caller]
pub fn run_assertion(assertion: Assertion, formatted_output: &str, formatted_errors: &[String]) {
    let no_errors: &[&str] = &[];
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            ::pretty_assertions::assert_eq!(formatted_errors, no_errors);
            ::pretty_assertions::assert_eq!(formatted_output.trim(), expected_tree.trim());
        }
        Assertion::AsmOk(expected_asm) => {
            ::pretty_assertions::assert_eq!(formatted_errors, no_errors);
            ::pretty_assertions::assert_eq!(formatted_output, expected_asm);
        }
        Assertion::ExitStatus(expected_status) => {
            ::pretty_assertions::assert_eq!(formatted_errors, no_errors);
            let status = emu::run(formatted_output).expect("program faulted");
            ::pretty_assertions::assert_eq!(status, expected_status);
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_errors, expected_errors);
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
                let (formatted_output, formatted_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_output, &formatted_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, asm_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::AsmOk(::indoc::indoc! { $expected })
    };
    (@@assertion, exit_status, $expected:expr) => {
        crate::util::test_utils::Assertion::ExitStatus($expected)
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser, program), $source:expr) => {
        crate::util::test_utils::Test::ParserProgram($source)
    };
    (@@get_test(parser, expr), $source:expr) => {
        crate::util::test_utils::Test::ParserExpr($source)
    };
    (@@get_test(codegen, program), $source:expr) => {
        crate::util::test_utils::Test::CodegenProgram($source)
    };
}
pub(crate) use tree_tests;
