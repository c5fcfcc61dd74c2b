#![allow(clippy::items_after_statements)]

use std::path::Path;

use crate::{codegen, lexer, parser, pipeline, token::Spanned, util::fmt::Show};

/// A compile error located in its source file, rendered as
/// `path:line:col: <stage> error: <message>`.
pub struct Diagnostic<'a> {
    pub path: &'a Path,
    pub src: &'a str,
    pub error: &'a pipeline::Error,
}

impl Show for Diagnostic<'_> {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &super::Context<'_>) -> std::fmt::Result {
        let (line, col) = self.error.span().line_col(self.src);
        let path = self.path.display();
        let stage = self.error.stage();
        write!(f, "{path}:{line}:{col}: {stage} error: {}", self.error.display(ctx))
    }
}

impl Show for Spanned<lexer::Error> {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, _: &super::Context<'_>) -> std::fmt::Result {
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }

        match error {
            lexer::Error::UnexpectedChar(c) => write!(f, "unexpected character {c:?}"),
        }
    }
}

impl Show for Spanned<parser::Error> {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &super::Context<'_>) -> std::fmt::Result {
        let Spanned { span, inner: error } = self;

        use parser::Error::*;
        match error {
            Lexer(inner) => return span.wrap(inner.clone()).show(f, ctx),
            _ if f.alternate() => write!(f, "{span}: ")?,
            _ => (),
        }

        match error {
            Unexpected { actual, expected } => {
                write!(f, "expected token {expected:?}, but got {actual:?}")
            }
            UnexpectedTokenInExpr { token } => {
                write!(f, "unexpected token {token:?} in expression")
            }
            InvalidStatementStart { token } => {
                write!(f, "unexpected token {token:?} at start of statement")
            }
            ParseInt => write!(f, "integer literal out of range"),
            NestingTooDeep => write!(
                f,
                "nesting exceeds the limit of {} levels",
                parser::MAX_NESTING_DEPTH
            ),
            Lexer(_) => unreachable!("handled above"),
        }
    }
}

impl Show for Spanned<codegen::Error> {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &super::Context<'_>) -> std::fmt::Result {
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }

        match error {
            codegen::Error::UnknownIdentifier(name) => {
                write!(f, "unknown identifier `{}`", ctx.ident(name))
            }
            codegen::Error::IdentifierAlreadyUsed(name) => {
                write!(f, "identifier `{}` already used", ctx.ident(name))
            }
        }
    }
}

impl Show for pipeline::Error {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &super::Context<'_>) -> std::fmt::Result {
        match self {
            pipeline::Error::Lex(e) => e.show(f, ctx),
            pipeline::Error::Parse(e) => e.show(f, ctx),
            pipeline::Error::Codegen(e) => e.show(f, ctx),
        }
    }
}
