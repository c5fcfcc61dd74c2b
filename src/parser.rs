use crate::{
    ast::{BinaryOperator, Branch, Expr, ExprKind, Ident, Program, Scope, Stmt, StmtKind},
    lexer::{self, extract},
    token::{Spanned, Token, TokenKind},
    util::intern::Interner,
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// How deeply scopes, parentheses and operator chains may nest. Later stages
/// walk the tree recursively, so the limit keeps them within the native stack.
pub const MAX_NESTING_DEPTH: usize = 256;

pub fn parse_program(
    src: &str,
    tokens: &mut Vec<Token>,
    ident_interner: &mut Interner,
) -> Result<Program> {
    parse(src, tokens, ident_interner, Parser::parse_program)
}

/// Parses a source consisting of a single expression.
pub fn parse_expr(
    src: &str,
    tokens: &mut Vec<Token>,
    ident_interner: &mut Interner,
) -> Result<Expr> {
    parse(src, tokens, ident_interner, |p| {
        let expr = p.parse_expr()?;
        p.consume(TokenKind::Eof)?;
        Ok(expr)
    })
}

fn parse<'src, 'tok, 'ident, T>(
    src: &'src str,
    tokens: &'tok mut Vec<Token>,
    ident_interner: &'ident mut Interner,
    f: impl for<'a> FnOnce(&'a mut Parser<'src, 'tok, 'ident>) -> Result<T>,
) -> Result<T> {
    assert!(tokens.is_empty());

    lexer::lex(src, tokens).map_err(|e| e.span.wrap(Error::Lexer(e.inner)))?;
    let mut p = Parser::new(src, tokens, ident_interner);
    f(&mut p)
}

struct Parser<'src, 'tok, 'ident> {
    src: &'src str,
    tokens: &'tok [Token],
    ident_interner: &'ident mut Interner,
    cursor: usize,
    depth: usize,
}

impl Parser<'_, '_, '_> {
    fn parse_program(&mut self) -> Result<Program> {
        let mut stmts = Vec::with_capacity(16);
        while !self.is(TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        Ok(Program { stmts })
    }

    /// Dispatches on the statement's leading token. Forms that need more
    /// lookahead (`exit (`, `let x =`, `x =`) are validated by consuming the
    /// remaining tokens, which reports the precise missing one.
    fn parse_stmt(&mut self) -> Result<Stmt> {
        let start = self.peek();
        match start.kind {
            TokenKind::Exit => self.parse_exit(),
            TokenKind::Let => self.parse_let(),
            TokenKind::Identifier => self.parse_assign(),
            TokenKind::LBrace => {
                let scope = self.parse_scope()?;
                Ok(Stmt {
                    span: scope.span,
                    kind: StmtKind::Scope(scope),
                })
            }
            TokenKind::If => self.parse_if(),
            other => {
                let error = Error::InvalidStatementStart { token: other };
                Err(start.span().wrap(error))
            }
        }
    }

    fn parse_exit(&mut self) -> Result<Stmt> {
        let start = self.consume(TokenKind::Exit)?;
        self.consume(TokenKind::LParen)?;
        let expr = self.parse_expr()?;
        self.consume(TokenKind::RParen)?;
        let end = self.consume(TokenKind::Semicolon)?;
        Ok(Stmt {
            kind: StmtKind::Exit(expr),
            span: start.span().to(end.span()),
        })
    }

    fn parse_let(&mut self) -> Result<Stmt> {
        let start = self.consume(TokenKind::Let)?;
        let name = self.parse_ident()?;
        self.consume(TokenKind::Eq)?;
        let initializer = self.parse_expr()?;
        let end = self.consume(TokenKind::Semicolon)?;
        Ok(Stmt {
            kind: StmtKind::Let { name, initializer },
            span: start.span().to(end.span()),
        })
    }

    fn parse_assign(&mut self) -> Result<Stmt> {
        let target = self.parse_ident()?;
        self.consume(TokenKind::Eq)?;
        let value = self.parse_expr()?;
        let end = self.consume(TokenKind::Semicolon)?;
        Ok(Stmt {
            kind: StmtKind::Assign { target, value },
            span: target.span.to(end.span()),
        })
    }

    fn parse_scope(&mut self) -> Result<Scope> {
        let start = self.consume(TokenKind::LBrace)?;
        self.enter(start)?;
        let mut stmts = Vec::new();
        while !self.is(TokenKind::RBrace) && !self.is(TokenKind::Eof) {
            stmts.push(self.parse_stmt()?);
        }
        let end = self.consume(TokenKind::RBrace)?;
        self.leave(1);
        Ok(Scope {
            stmts,
            span: start.span().to(end.span()),
        })
    }

    // Conditional: if (expr) scope [elif (expr) scope]* [else scope]
    fn parse_if(&mut self) -> Result<Stmt> {
        let start = self.consume(TokenKind::If)?;
        let mut branches = vec![self.parse_branch()?];
        while self.take(TokenKind::Elif) {
            branches.push(self.parse_branch()?);
        }
        let else_arm = if self.take(TokenKind::Else) {
            Some(self.parse_scope()?)
        } else {
            None
        };

        let end = match (&else_arm, branches.last()) {
            (Some(else_arm), _) => else_arm.span,
            (None, Some(last)) => last.body.span,
            (None, None) => unreachable!("if without branches"),
        };
        Ok(Stmt {
            kind: StmtKind::If { branches, else_arm },
            span: start.span().to(end),
        })
    }

    /// Parses the `(expr) scope` part shared by `if` and `elif`.
    fn parse_branch(&mut self) -> Result<Branch> {
        self.consume(TokenKind::LParen)?;
        let predicate = self.parse_expr()?;
        self.consume(TokenKind::RParen)?;
        let body = self.parse_scope()?;
        Ok(Branch { predicate, body })
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.consume(TokenKind::Identifier)?;
        Ok(self.ident(token))
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_prec(0)
    }

    /// Precedence climbing. The right operand of an operator is parsed with a
    /// minimum precedence one above the operator's, which makes operators of
    /// the same level associate to the left.
    fn parse_expr_prec(&mut self, min_prec: u8) -> Result<Expr> {
        let mut lhs = self.parse_term()?;
        // Each folded operator wraps `lhs` one level deeper.
        let mut chain = 0;

        loop {
            let Some(op) = Self::binary_operator(self.peek().kind) else {
                // Not an infix operator
                break;
            };
            let prec = op.precedence();
            if prec < min_prec {
                // Operator binds less tightly than the minimum required
                break;
            }

            let op_token = self.advance();
            self.enter(op_token)?;
            chain += 1;
            let rhs = self.parse_expr_prec(prec + 1)?;

            let span = lhs.span.to(rhs.span);
            lhs = Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            };
        }

        self.leave(chain);
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::Identifier => ExprKind::Id(self.ident(token)),
            TokenKind::Int => {
                let Ok(parsed) = extract::int(token, self.src) else {
                    return Err(token.span().wrap(Error::ParseInt));
                };
                ExprKind::Int(parsed)
            }

            // Grouping: ( expr )
            TokenKind::LParen => {
                self.enter(token)?;
                let expr = self.parse_expr()?;
                let end = self.consume(TokenKind::RParen)?;
                self.leave(1);
                return Ok(Expr {
                    kind: ExprKind::Paren(Box::new(expr)),
                    span: token.span().to(end.span()),
                });
            }

            other => {
                let error = Error::UnexpectedTokenInExpr { token: other };
                return Err(token.span().wrap(error));
            }
        };

        Ok(Expr {
            kind,
            span: token.span(),
        })
    }

    fn binary_operator(kind: TokenKind) -> Option<BinaryOperator> {
        let op = match kind {
            TokenKind::Plus => BinaryOperator::Add,
            TokenKind::Minus => BinaryOperator::Sub,
            TokenKind::Star => BinaryOperator::Mul,
            TokenKind::Slash => BinaryOperator::Div,
            _ => return None,
        };
        Some(op)
    }
}

impl Parser<'_, '_, '_> {
    fn new<'src, 'tok, 'ident>(
        src: &'src str,
        tokens: &'tok [Token],
        ident_interner: &'ident mut Interner,
    ) -> Parser<'src, 'tok, 'ident> {
        Parser {
            src,
            tokens,
            ident_interner,
            cursor: 0,
            depth: 0,
        }
    }

    /// Opens a nesting level at `token`, failing past [`MAX_NESTING_DEPTH`].
    fn enter(&mut self, token: Token) -> Result<()> {
        if self.depth == MAX_NESTING_DEPTH {
            return Err(token.span().wrap(Error::NestingTooDeep));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn ident(&mut self, token: Token) -> Ident {
        Ident {
            name: self.ident_interner.intern(extract::ident(token, self.src)),
            span: token.span(),
        }
    }

    /// Returns the current token.
    #[inline]
    fn peek(&self) -> Token {
        match self.tokens.get(self.cursor) {
            Some(token) => *token,
            None => Token::eof_for(self.src),
        }
    }

    /// Returns the current token and advances. Never moves past the end.
    fn advance(&mut self) -> Token {
        let c = self.peek();
        if !c.is_eof() {
            self.cursor += 1;
        }
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one, returning it.
    /// If not, fails with the current token.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        let c = self.peek();
        if self.is(expect) {
            self.advance();
            Ok(c)
        } else {
            Err(c.span().wrap(Error::Unexpected {
                actual: c.kind,
                expected: expect,
            }))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Unexpected {
        actual: TokenKind,
        expected: TokenKind,
    },
    UnexpectedTokenInExpr {
        token: TokenKind,
    },
    InvalidStatementStart {
        token: TokenKind,
    },
    ParseInt,
    NestingTooDeep,
    Lexer(lexer::Error),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::util::test_utils::{format_errors, tree_tests};

    fn nesting_errors(program: &str) -> Vec<String> {
        let mut interner = Interner::default();
        match parse_program(program, &mut Vec::new(), &mut interner) {
            Ok(_) => vec![],
            Err(error) => format_errors(&interner, &[error]),
        }
    }

    #[test]
    fn test_nesting_limit_scopes() {
        let depth = MAX_NESTING_DEPTH;
        let ok = format!("{}{}", "{".repeat(depth), "}".repeat(depth));
        assert_eq!(nesting_errors(&ok), Vec::<String>::new());

        let deep = format!("{}{}", "{".repeat(depth + 1), "}".repeat(depth + 1));
        assert_eq!(
            nesting_errors(&deep),
            ["256..257: nesting exceeds the limit of 256 levels"]
        );
    }

    #[test]
    fn test_nesting_limit_parens() {
        let ok = format!("exit({}1{});", "(".repeat(255), ")".repeat(255));
        assert_eq!(nesting_errors(&ok), Vec::<String>::new());

        // Far beyond the limit, must fail cleanly instead of exhausting the stack.
        let deep = format!("exit({}1", "(".repeat(300_000));
        assert_eq!(
            nesting_errors(&deep),
            ["261..262: nesting exceeds the limit of 256 levels"]
        );
    }

    #[test]
    fn test_nesting_limit_operator_chain() {
        let ok = format!("exit(1{});", " + 1".repeat(256));
        assert_eq!(nesting_errors(&ok), Vec::<String>::new());

        let long = format!("exit(1{});", " - 1".repeat(257));
        assert_eq!(
            nesting_errors(&long),
            ["1031..1032: nesting exceeds the limit of 256 levels"]
        );
    }

    tree_tests!(
        use parser;

        fn test_simple_expression() {
            let expr = "(1 * 2 + 3) - (1 + 2 * 3)";
            let tree_ok = "
                binary Sub (0..25)
                  paren (0..11)
                    binary Add (1..10)
                      binary Mul (1..6)
                        int 1 (1..2)
                        int 2 (5..6)
                      int 3 (9..10)
                  paren (14..25)
                    binary Add (15..24)
                      int 1 (15..16)
                      binary Mul (19..24)
                        int 2 (19..20)
                        int 3 (23..24)
            ";
        }

        fn test_identifier_expr() {
            let expr = "myVar1";
            let tree_ok = "ident myVar1 (0..6)";
        }

        fn test_integer_literal_expr() {
            let expr = "12345";
            let tree_ok = "int 12345 (0..5)";
        }

        fn test_parenthesized_expr() {
            let expr = "((x))";
            let tree_ok = "
                paren (0..5)
                  paren (1..4)
                    ident x (2..3)
            ";
        }

        fn test_binary_division_expr() {
            let expr = "a / b";
            let tree_ok = "
                binary Div (0..5)
                  ident a (0..1)
                  ident b (4..5)
            ";
        }

        fn test_precedence_mul_plus() {
            let expr = "1 + 2 * 3";
            let tree_ok = "
                binary Add (0..9)
                  int 1 (0..1)
                  binary Mul (4..9)
                    int 2 (4..5)
                    int 3 (8..9)
            ";
        }

        fn test_precedence_plus_mul() {
            let expr = "1 * 2 + 3";
            let tree_ok = "
                binary Add (0..9)
                  binary Mul (0..5)
                    int 1 (0..1)
                    int 2 (4..5)
                  int 3 (8..9)
            ";
        }

        fn test_precedence_two_products() {
            let expr = "1 * 2 + 3 * 4";
            let tree_ok = "
                binary Add (0..13)
                  binary Mul (0..5)
                    int 1 (0..1)
                    int 2 (4..5)
                  binary Mul (8..13)
                    int 3 (8..9)
                    int 4 (12..13)
            ";
        }

        fn test_sub_is_left_associative() {
            let expr = "8 - 3 - 2";
            let tree_ok = "
                binary Sub (0..9)
                  binary Sub (0..5)
                    int 8 (0..1)
                    int 3 (4..5)
                  int 2 (8..9)
            ";
        }

        fn test_div_is_left_associative() {
            let expr = "a / b * c";
            let tree_ok = "
                binary Mul (0..9)
                  binary Div (0..5)
                    ident a (0..1)
                    ident b (4..5)
                  ident c (8..9)
            ";
        }

        fn test_paren_overrides_precedence() {
            let expr = "8 - (3 - 2)";
            let tree_ok = "
                binary Sub (0..11)
                  int 8 (0..1)
                  paren (4..11)
                    binary Sub (5..10)
                      int 3 (5..6)
                      int 2 (9..10)
            ";
        }

        fn test_exit_stmt() {
            let program = "exit(42);";
            let tree_ok = "
                exit (0..9)
                  int 42 (5..7)
            ";
        }

        fn test_let_stmt() {
            let program = "let x = y + 1;";
            let tree_ok = "
                let x (0..14)
                  binary Add (8..13)
                    ident y (8..9)
                    int 1 (12..13)
            ";
        }

        fn test_assign_stmt() {
            let program = "x = 2;";
            let tree_ok = "
                assign x (0..6)
                  int 2 (4..5)
            ";
        }

        fn test_nested_scopes() {
            let program = "{ let a = 1; { } }";
            let tree_ok = "
                scope (0..18)
                  let a (2..12)
                    int 1 (10..11)
                  scope (13..16)
            ";
        }

        fn test_if_alone() {
            let program = "if (x) { exit(1); }";
            let tree_ok = "
                if (0..19)
                  branch
                    ident x (4..5)
                    scope (7..19)
                      exit (9..17)
                        int 1 (14..15)
            ";
        }

        fn test_if_elif_else_chain() {
            let program = "if (0) {} elif (a - 1) {} elif (2) {} else { a = 3; }";
            let tree_ok = "
                if (0..53)
                  branch
                    int 0 (4..5)
                    scope (7..9)
                  branch
                    binary Sub (16..21)
                      ident a (16..17)
                      int 1 (20..21)
                    scope (23..25)
                  branch
                    int 2 (32..33)
                    scope (35..37)
                  else
                    scope (43..53)
                      assign a (45..51)
                        int 3 (49..50)
            ";
        }

        fn test_else_ends_chain() {
            let program = "if (1) {} else {} exit(0);";
            let tree_ok = "
                if (0..17)
                  branch
                    int 1 (4..5)
                    scope (7..9)
                  else
                    scope (15..17)
                exit (18..26)
                  int 0 (23..24)
            ";
        }

        fn test_program_multiple_stmts() {
            let program = "
                // declares
                let x = 2;
                /* and exits */
                exit(x);
            ";
            let tree_ok = "
                let x (45..55)
                  int 2 (53..54)
                exit (104..112)
                  ident x (109..110)
            ";
        }

        fn test_empty_program() {
            let program = "  // nothing\n";
            let tree_ok = "";
        }

        fn test_error_exit_unclosed() {
            let program = "exit(1";
            let expected_errors = &["6..6: expected token RParen, but got Eof"];
        }

        fn test_error_missing_semicolon() {
            let program = "let x = 1 exit(x);";
            let expected_errors = &["10..14: expected token Semicolon, but got Exit"];
        }

        fn test_error_exit_without_paren() {
            let program = "exit 1;";
            let expected_errors = &["5..6: expected token LParen, but got Int"];
        }

        fn test_error_let_without_eq() {
            let program = "let x 1;";
            let expected_errors = &["6..7: expected token Eq, but got Int"];
        }

        fn test_error_let_without_name() {
            let program = "let = 1;";
            let expected_errors = &["4..5: expected token Identifier, but got Eq"];
        }

        fn test_error_bare_identifier() {
            let program = "x;";
            let expected_errors = &["1..2: expected token Eq, but got Semicolon"];
        }

        fn test_error_invalid_statement_start() {
            let program = "1 + 2;";
            let expected_errors = &["0..1: unexpected token Int at start of statement"];
        }

        fn test_error_else_without_if() {
            let program = "else {}";
            let expected_errors = &["0..4: unexpected token Else at start of statement"];
        }

        fn test_error_unclosed_scope() {
            let program = "{ let x = 1;";
            let expected_errors = &["12..12: expected token RBrace, but got Eof"];
        }

        fn test_error_if_without_scope() {
            let program = "if (1) exit(1);";
            let expected_errors = &["7..11: expected token LBrace, but got Exit"];
        }

        fn test_error_else_chained_twice() {
            let program = "if (1) {} else {} else {}";
            let expected_errors = &["18..22: unexpected token Else at start of statement"];
        }

        fn test_error_missing_operand() {
            let program = "let x = 1 + ;";
            let expected_errors = &["12..13: unexpected token Semicolon in expression"];
        }

        fn test_error_empty_initializer() {
            let program = "let x = ;";
            let expected_errors = &["8..9: unexpected token Semicolon in expression"];
        }

        fn test_error_unmatched_paren_open() {
            let expr = "(1 + 2";
            let expected_errors = &["6..6: expected token RParen, but got Eof"];
        }

        fn test_error_unmatched_paren_close() {
            let expr = "1 + 2)";
            let expected_errors = &["5..6: expected token Eof, but got RParen"];
        }

        fn test_error_parse_int_too_large() {
            let expr = "999999999999999999999999999999";
            let expected_errors = &["0..30: integer literal out of range"];
        }

        fn test_error_lexer_unexpected_char() {
            let program = "exit($);";
            let expected_errors = &["5..6: unexpected character '$'"];
        }
    );
}
